//! Transaction data model and protocol state machine.
//!
//! This module provides the central [`Transaction`] entity and the
//! state-transition rules that govern it. The status field is the single
//! source of truth for protocol state; everything a caller may do next is a
//! pure function of status plus the caller's role.
//!
//! # Architecture
//!
//! ```text
//! Initiate --> PaymentPending
//!                  |
//!                  v  SubmitPaymentProof (buyer)
//!                Paid
//!                  |
//!                  v  SubmitWork (seller)
//!            WorkSubmitted
//!              |        |
//!   Approve (buyer)   Dispute (buyer)
//!              v        v
//!          Approved   Disputed
//! ```
//!
//! Cancel is legal for either party from any non-terminal status.

mod id;
mod state;

#[cfg(test)]
mod tests;

pub use id::generate_transaction_id;
pub use state::{
    Actor, EscrowAction, Transaction, TransactionStatus, UnknownStatus, next_status, required_actor,
};

/// Prefix marking a record that exists only in the current session's memory
/// because the backing store was unavailable at creation time.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Returns `true` if a record id denotes a local-only transaction.
#[must_use]
pub fn is_local_record(record_id: &str) -> bool {
    record_id.starts_with(LOCAL_ID_PREFIX)
}
