//! Escrow transaction protocol engine for peer-to-peer service payments.
//!
//! This crate models a two-party payment escrow between a **buyer** (the
//! party who posted a service request and pays) and a **seller** (the party
//! who performs the work and is paid). Payment itself happens off-band via a
//! UPI payment request rendered as a scannable code; the engine only tracks
//! proof of payment, work submission, and the buyer's approval or dispute.
//!
//! # Architecture
//!
//! ```text
//! caller action --> EscrowEngine --> RoleResolver (who may act?)
//!                        |
//!                        v
//!                  FallbackStore --> SQLite / in-memory / local-only
//!                        |
//!                        v
//!                  Transaction (status drives the next allowed action)
//! ```
//!
//! # Key Concepts
//!
//! - **Transaction**: the single shared record both parties act on
//! - **`TransactionStatus`**: the authoritative protocol state
//! - **Role**: `Buyer`, `Seller`, or `Unknown` (no action surfaced)
//! - **Local-only transaction**: synthesized when the backing store is not
//!   provisioned; the flow completes in memory for the current session
//!
//! # Example
//!
//! ```rust,ignore
//! use escrow_core::engine::{EscrowEngine, InitiateRequest};
//!
//! let engine = EscrowEngine::in_memory();
//! let outcome = engine.initiate(&InitiateRequest {
//!     buyer_id: "buyer-1",
//!     seller_id: "seller-1",
//!     post_id: None,
//!     amount: 500.0,
//!     payee: "helper@bank",
//!     work_description: None,
//!     context: Some(&context),
//! })?;
//! ```

pub mod config;
pub mod engine;
pub mod payment;
pub mod role;
pub mod store;
pub mod sync;
pub mod transaction;

pub use config::EscrowConfig;
pub use engine::{EscrowEngine, EscrowError, Initiated, InitiateRequest, WorkFile};
pub use role::{ConversationContext, Role};
pub use store::{StoreError, TransactionPatch, TransactionStore};
pub use sync::{PollTick, StopReason, TransactionWatcher};
pub use transaction::{Actor, EscrowAction, Transaction, TransactionStatus};
