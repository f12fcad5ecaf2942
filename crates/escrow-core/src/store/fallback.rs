//! Local fallback wrapper around a transaction store.
//!
//! The original flow must complete even when the backing table was never
//! provisioned. This wrapper centralizes that policy: a "not provisioned"
//! error on create or update degrades to a session-local record with a
//! `local-` id prefix, while every other error propagates unchanged. Reads
//! treat an unprovisioned store as empty.
//!
//! Local records never reach the backing store and are skipped by polling
//! (see [`crate::sync`]).

use std::sync::Mutex;

use chrono::Utc;
use tracing::warn;

use super::{StoreError, TransactionPatch, TransactionStore};
use crate::transaction::{LOCAL_ID_PREFIX, Transaction};

/// A [`TransactionStore`] that absorbs [`StoreError::Unavailable`] by
/// keeping records in session memory.
pub struct FallbackStore {
    inner: Box<dyn TransactionStore>,
    local: Mutex<Vec<Transaction>>,
}

impl FallbackStore {
    /// Wraps a backing store.
    #[must_use]
    pub fn new(inner: Box<dyn TransactionStore>) -> Self {
        Self {
            inner,
            local: Mutex::new(Vec::new()),
        }
    }

    /// Number of session-local records created so far.
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.local.lock().unwrap().len()
    }

    fn synthesize_local(&self, txn: &Transaction) -> Transaction {
        let mut local_txn = txn.clone();
        local_txn.record_id = super::fresh_record_id(LOCAL_ID_PREFIX);
        self.local.lock().unwrap().push(local_txn.clone());
        local_txn
    }

    fn find_local(
        &self,
        user_a: &str,
        user_b: &str,
        post_id: Option<&str>,
        active_only: bool,
    ) -> Option<Transaction> {
        let local = self.local.lock().unwrap();
        local
            .iter()
            .filter(|t| {
                let pair = (t.buyer_id == user_a && t.seller_id == user_b)
                    || (t.buyer_id == user_b && t.seller_id == user_a);
                let post = post_id.map_or(true, |id| t.post_id.as_deref() == Some(id));
                let active = !active_only || !t.status.is_terminal();
                pair && post && active
            })
            .max_by_key(|t| t.created_at)
            .cloned()
    }
}

impl TransactionStore for FallbackStore {
    fn create(&self, txn: &Transaction) -> Result<Transaction, StoreError> {
        match self.inner.create(txn) {
            Ok(stored) => Ok(stored),
            Err(err) if err.is_unavailable() => {
                warn!(
                    transaction_id = %txn.transaction_id,
                    "transaction store not provisioned; holding record in session memory"
                );
                Ok(self.synthesize_local(txn))
            }
            Err(err) => Err(err),
        }
    }

    fn get(&self, record_id: &str) -> Result<Option<Transaction>, StoreError> {
        if record_id.starts_with(LOCAL_ID_PREFIX) {
            let local = self.local.lock().unwrap();
            return Ok(local.iter().find(|t| t.record_id == record_id).cloned());
        }

        match self.inner.get(record_id) {
            Ok(found) => Ok(found),
            Err(err) if err.is_unavailable() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// On an unavailable backing store, migrates the record to a fresh
    /// `local-` id and applies the patch in session memory. The returned
    /// transaction is the only handle to the migrated record: a watcher
    /// created against the old record id will never observe it again, so
    /// callers must re-watch from the returned transaction (which reports
    /// itself local-only).
    fn update(
        &self,
        current: &Transaction,
        patch: &TransactionPatch,
    ) -> Result<Transaction, StoreError> {
        if current.is_local() {
            let mut local = self.local.lock().unwrap();
            let stored = local
                .iter_mut()
                .find(|t| t.record_id == current.record_id)
                .ok_or_else(|| StoreError::RecordNotFound {
                    record_id: current.record_id.clone(),
                })?;

            if stored.status != current.status {
                return Err(StoreError::StaleStatus {
                    record_id: current.record_id.clone(),
                    expected: current.status,
                    actual: stored.status,
                });
            }

            patch.apply(stored, Utc::now());
            return Ok(stored.clone());
        }

        match self.inner.update(current, patch) {
            Ok(updated) => Ok(updated),
            Err(err) if err.is_unavailable() => {
                // The store vanished mid-flow. Absorb the record and apply
                // the patch locally so the session can still finish.
                warn!(
                    record_id = %current.record_id,
                    "transaction store became unavailable on update; continuing locally"
                );
                let mut local_txn = current.clone();
                local_txn.record_id = super::fresh_record_id(LOCAL_ID_PREFIX);
                patch.apply(&mut local_txn, Utc::now());
                self.local.lock().unwrap().push(local_txn.clone());
                Ok(local_txn)
            }
            Err(err) => Err(err),
        }
    }

    fn find_latest_for_pair(
        &self,
        user_a: &str,
        user_b: &str,
        post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError> {
        match self.inner.find_latest_for_pair(user_a, user_b, post_id) {
            Ok(Some(found)) => Ok(Some(found)),
            Ok(None) => Ok(self.find_local(user_a, user_b, post_id, false)),
            Err(err) if err.is_unavailable() => {
                Ok(self.find_local(user_a, user_b, post_id, false))
            }
            Err(err) => Err(err),
        }
    }

    fn find_active_for_pair(
        &self,
        user_a: &str,
        user_b: &str,
        post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError> {
        match self.inner.find_active_for_pair(user_a, user_b, post_id) {
            Ok(Some(found)) => Ok(Some(found)),
            Ok(None) => Ok(self.find_local(user_a, user_b, post_id, true)),
            Err(err) if err.is_unavailable() => Ok(self.find_local(user_a, user_b, post_id, true)),
            Err(err) => Err(err),
        }
    }

    fn transaction_id_exists(&self, transaction_id: &str) -> Result<bool, StoreError> {
        let locally = self
            .local
            .lock()
            .unwrap()
            .iter()
            .any(|t| t.transaction_id == transaction_id);
        if locally {
            return Ok(true);
        }

        match self.inner.transaction_id_exists(transaction_id) {
            Ok(exists) => Ok(exists),
            Err(err) if err.is_unavailable() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
