//! In-memory transaction store for tests and single-session use.

use std::sync::Mutex;

use chrono::Utc;

use super::{StoreError, TransactionPatch, TransactionStore, fresh_record_id};
use crate::transaction::Transaction;

/// Vec-backed store with the same conditional-update semantics as the
/// SQLite backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<Transaction>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

fn pair_matches(txn: &Transaction, user_a: &str, user_b: &str, post_id: Option<&str>) -> bool {
    let pair = (txn.buyer_id == user_a && txn.seller_id == user_b)
        || (txn.buyer_id == user_b && txn.seller_id == user_a);
    let post = post_id.map_or(true, |id| txn.post_id.as_deref() == Some(id));
    pair && post
}

impl TransactionStore for InMemoryStore {
    fn create(&self, txn: &Transaction) -> Result<Transaction, StoreError> {
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|t| t.transaction_id == txn.transaction_id)
        {
            return Err(StoreError::DuplicateTransactionId {
                transaction_id: txn.transaction_id.clone(),
            });
        }

        let mut stored = txn.clone();
        stored.record_id = fresh_record_id("mem-");
        records.push(stored.clone());
        Ok(stored)
    }

    fn get(&self, record_id: &str) -> Result<Option<Transaction>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().find(|t| t.record_id == record_id).cloned())
    }

    fn update(
        &self,
        current: &Transaction,
        patch: &TransactionPatch,
    ) -> Result<Transaction, StoreError> {
        let mut records = self.records.lock().unwrap();
        let stored = records
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
        Ok(stored.clone())
    }

    fn find_latest_for_pair(
        &self,
        user_a: &str,
        user_b: &str,
        post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|t| pair_matches(t, user_a, user_b, post_id))
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    fn find_active_for_pair(
        &self,
        user_a: &str,
        user_b: &str,
        post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|t| pair_matches(t, user_a, user_b, post_id) && !t.status.is_terminal())
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    fn transaction_id_exists(&self, transaction_id: &str) -> Result<bool, StoreError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().any(|t| t.transaction_id == transaction_id))
    }
}

/// Store that reports every operation as not provisioned. Stands in for a
/// backend whose table was never migrated.
#[derive(Debug, Default)]
pub struct UnprovisionedStore;

impl UnprovisionedStore {
    fn unavailable() -> StoreError {
        StoreError::Unavailable {
            what: "transactions table does not exist".to_string(),
        }
    }
}

impl TransactionStore for UnprovisionedStore {
    fn create(&self, _txn: &Transaction) -> Result<Transaction, StoreError> {
        Err(Self::unavailable())
    }

    fn get(&self, _record_id: &str) -> Result<Option<Transaction>, StoreError> {
        Err(Self::unavailable())
    }

    fn update(
        &self,
        _current: &Transaction,
        _patch: &TransactionPatch,
    ) -> Result<Transaction, StoreError> {
        Err(Self::unavailable())
    }

    fn find_latest_for_pair(
        &self,
        _user_a: &str,
        _user_b: &str,
        _post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError> {
        Err(Self::unavailable())
    }

    fn find_active_for_pair(
        &self,
        _user_a: &str,
        _user_b: &str,
        _post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError> {
        Err(Self::unavailable())
    }

    fn transaction_id_exists(&self, _transaction_id: &str) -> Result<bool, StoreError> {
        Err(Self::unavailable())
    }
}
