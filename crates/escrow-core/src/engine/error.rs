//! Protocol engine error types.

use thiserror::Error;

use crate::payment::PaymentError;
use crate::store::StoreError;
use crate::transaction::{Actor, EscrowAction, TransactionStatus};

/// Errors surfaced by the escrow engine's caller-facing operations.
///
/// `StoreError::Unavailable` never appears here: the fallback adapter
/// absorbs it and the flow continues on a session-local record.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EscrowError {
    /// Malformed caller input: bad payee identifier, non-positive amount,
    /// empty dispute reason, no work files.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong.
        reason: String,
    },

    /// The acting user does not hold the role the action requires.
    #[error("{user_id} is not permitted to {action} on this transaction")]
    Unauthorized {
        /// The acting user.
        user_id: String,
        /// The attempted action.
        action: EscrowAction,
        /// The role the action requires; `None` when any party would do
        /// but the user is not a party at all.
        required: Option<Actor>,
    },

    /// The action is not legal from the transaction's current status
    /// (including attempts on an expired transaction).
    #[error("{action} is not legal from status {status}")]
    InvalidTransition {
        /// The status the transaction is in.
        status: TransactionStatus,
        /// The attempted action.
        action: EscrowAction,
    },

    /// The requesting user is not a party to the transaction at all.
    #[error("{user_id} is not a party to transaction {record_id}")]
    AccessDenied {
        /// The requesting user.
        user_id: String,
        /// The transaction record.
        record_id: String,
    },

    /// No transaction record with the given id.
    #[error("transaction not found: {record_id}")]
    NotFound {
        /// The missing record id.
        record_id: String,
    },

    /// A non-terminal transaction already exists for this pair; initiating
    /// another would create concurrent escrows.
    #[error("a transaction is already active for this pair: {transaction_id}")]
    AlreadyActive {
        /// The existing transaction's id.
        transaction_id: String,
    },

    /// The payment instrument could not be rendered.
    #[error("payment instrument error: {0}")]
    Instrument(#[source] PaymentError),

    /// A store failure not attributable to a missing store. The operation
    /// was aborted and the transaction left unchanged.
    #[error("store operation failed: {0}")]
    Upstream(#[source] StoreError),
}
