//! Persistence boundary for transactions and uploaded artifacts.
//!
//! The protocol engine talks to a [`TransactionStore`] and an
//! [`ArtifactStore`]; both expose a distinguishable "not provisioned"
//! error ([`StoreError::Unavailable`]) separate from ordinary failures.
//! The [`FallbackStore`](fallback::FallbackStore) wrapper absorbs that one
//! error class and degrades to session-local records so the flow still
//! completes; every other error propagates to the caller.
//!
//! # Optimistic concurrency
//!
//! [`TransactionStore::update`] is conditional: the write only applies if
//! the persisted status still equals the status of the record the caller
//! fetched. A mismatch returns [`StoreError::StaleStatus`] instead of
//! silently losing the concurrent update.

pub mod artifacts;
pub mod fallback;
pub mod memory;
pub mod sqlite;

#[cfg(test)]
mod tests;

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::transaction::{Transaction, TransactionStatus};

pub use artifacts::{ArtifactStore, FallbackArtifactStore, FsArtifactStore, InlineArtifactStore};
pub use fallback::FallbackStore;
pub use memory::{InMemoryStore, UnprovisionedStore};
pub use sqlite::SqliteTransactionStore;

/// Storage representations of the terminal statuses, shared by the SQL and
/// in-memory filters.
pub(crate) const TERMINAL_STATUSES: [&str; 4] = ["approved", "released", "cancelled", "refunded"];

/// Errors from the persistence boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backing store/table/bucket does not exist. Absorbed by the
    /// fallback adapter, never surfaced to the protocol caller.
    #[error("backing store not provisioned: {what}")]
    Unavailable {
        /// Which store is missing.
        what: String,
    },

    /// No record with the given id.
    #[error("transaction record not found: {record_id}")]
    RecordNotFound {
        /// The missing record id.
        record_id: String,
    },

    /// Conditional update failed: the persisted status moved underneath the
    /// caller. The caller should re-fetch and re-evaluate.
    #[error("concurrent update on {record_id}: expected status {expected}, found {actual}")]
    StaleStatus {
        /// The record that changed.
        record_id: String,
        /// The status the caller fetched.
        expected: TransactionStatus,
        /// The status currently persisted.
        actual: TransactionStatus,
    },

    /// A transaction with this human-readable id already exists.
    #[error("duplicate transaction id: {transaction_id}")]
    DuplicateTransactionId {
        /// The colliding id.
        transaction_id: String,
    },

    /// Database error not attributable to a missing table.
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    /// I/O error during artifact operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored row could not be decoded.
    #[error("corrupt record: {reason}")]
    CorruptRecord {
        /// What failed to decode.
        reason: String,
    },
}

impl StoreError {
    /// Returns `true` for the "not provisioned" error class that triggers
    /// the local fallback.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    /// Classifies SQLite errors once, here, instead of per call site: a
    /// missing table is the "not provisioned" class, everything else is a
    /// real database failure.
    fn from(err: rusqlite::Error) -> Self {
        let message = err.to_string();
        if message.contains("no such table") {
            Self::Unavailable { what: message }
        } else {
            Self::Database(err)
        }
    }
}

/// Partial update applied to a transaction record.
///
/// Unset fields are left untouched. `updated_at` is always refreshed by the
/// store on a successful update.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    /// New protocol status.
    pub status: Option<TransactionStatus>,
    /// Payment proof reference.
    pub payment_proof_url: Option<String>,
    /// Work artifact references.
    pub work_files: Option<Vec<String>>,
    /// Work preview link.
    pub work_preview_url: Option<String>,
    /// Buyer approval flag.
    pub buyer_approval: Option<bool>,
    /// Buyer feedback supplied at approval.
    pub buyer_feedback: Option<String>,
    /// Dispute reason.
    pub dispute_reason: Option<String>,
    /// Approval timestamp.
    pub buyer_approval_at: Option<DateTime<Utc>>,
    /// Release timestamp.
    pub released_at: Option<DateTime<Utc>>,
}

impl TransactionPatch {
    /// Applies the patch to a transaction in place, refreshing
    /// `updated_at`.
    pub fn apply(&self, txn: &mut Transaction, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            txn.status = status;
        }
        if let Some(url) = &self.payment_proof_url {
            txn.payment_proof_url = Some(url.clone());
        }
        if let Some(files) = &self.work_files {
            txn.work_files = files.clone();
        }
        if let Some(url) = &self.work_preview_url {
            txn.work_preview_url = Some(url.clone());
        }
        if let Some(approval) = self.buyer_approval {
            txn.buyer_approval = approval;
        }
        if let Some(feedback) = &self.buyer_feedback {
            txn.buyer_feedback = Some(feedback.clone());
        }
        if let Some(reason) = &self.dispute_reason {
            txn.dispute_reason = Some(reason.clone());
        }
        if let Some(at) = self.buyer_approval_at {
            txn.buyer_approval_at = Some(at);
        }
        if let Some(at) = self.released_at {
            txn.released_at = Some(at);
        }
        txn.updated_at = now;
    }
}

/// Table-like store for transaction records.
///
/// Implementations assign the `record_id` on create; any caller-provided
/// value is replaced.
pub trait TransactionStore: Send + Sync {
    /// Persists a new transaction and returns it with its assigned
    /// `record_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTransactionId`] on id collision, or
    /// [`StoreError::Unavailable`] when the store is not provisioned.
    fn create(&self, txn: &Transaction) -> Result<Transaction, StoreError>;

    /// Fetches a record by id. `Ok(None)` when no such record exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store is not
    /// provisioned.
    fn get(&self, record_id: &str) -> Result<Option<Transaction>, StoreError>;

    /// Conditionally updates a record: the write applies only while the
    /// persisted status still equals `current.status`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StaleStatus`] when the record moved,
    /// [`StoreError::RecordNotFound`] when it is gone, or
    /// [`StoreError::Unavailable`] when the store is not provisioned.
    fn update(
        &self,
        current: &Transaction,
        patch: &TransactionPatch,
    ) -> Result<Transaction, StoreError>;

    /// Returns the most recent transaction between the two users (either
    /// orientation), optionally scoped to a post.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store is not
    /// provisioned.
    fn find_latest_for_pair(
        &self,
        user_a: &str,
        user_b: &str,
        post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Returns the most recent non-terminal transaction between the two
    /// users, optionally scoped to a post.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store is not
    /// provisioned.
    fn find_active_for_pair(
        &self,
        user_a: &str,
        user_b: &str,
        post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Checks whether a human-readable transaction id is already taken.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store is not
    /// provisioned.
    fn transaction_id_exists(&self, transaction_id: &str) -> Result<bool, StoreError>;
}

/// Generates a fresh storage record id from the wall clock.
pub(crate) fn fresh_record_id(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{prefix}{nanos}")
}
