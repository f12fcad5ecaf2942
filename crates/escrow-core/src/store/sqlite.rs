//! `SQLite`-backed transaction store.
//!
//! Uses WAL mode so the non-acting party's polling reads do not block the
//! acting party's writes. The conditional update is a single `UPDATE ...
//! WHERE record_id = ? AND status = ?`, which SQLite applies atomically.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};

use super::{StoreError, TransactionPatch, TransactionStore, fresh_record_id};
use crate::transaction::{Transaction, TransactionStatus};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

const SELECT_COLUMNS: &str = "record_id, transaction_id, buyer_id, seller_id, post_id, amount, \
                              status, payee, payment_payload, payment_proof_url, work_files, \
                              work_preview_url, work_description, buyer_approval, buyer_feedback, \
                              dispute_reason, created_at, updated_at, expires_at, \
                              buyer_approval_at, released_at";

/// `SQLite` transaction store.
#[derive(Debug, Clone)]
pub struct SqliteTransactionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTransactionStore {
    /// Opens or creates a store at the given path, applying the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database without applying the schema, so every
    /// query fails with the "not provisioned" error class. Used to exercise
    /// the fallback path against the real backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn in_memory_unprovisioned() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::CorruptRecord {
            reason: format!("bad timestamp {value:?}: {err}"),
        })
}

fn parse_opt_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.as_deref().map(parse_timestamp).transpose()
}

fn row_to_transaction(row: &Row<'_>) -> Result<Transaction, StoreError> {
    let status_str: String = row.get(6)?;
    let status: TransactionStatus =
        status_str
            .parse()
            .map_err(|_| StoreError::CorruptRecord {
                reason: format!("bad status {status_str:?}"),
            })?;

    let work_files_json: String = row.get(10)?;
    let work_files: Vec<String> =
        serde_json::from_str(&work_files_json).map_err(|err| StoreError::CorruptRecord {
            reason: format!("bad work_files: {err}"),
        })?;

    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;
    let expires_at: String = row.get(18)?;

    Ok(Transaction {
        record_id: row.get(0)?,
        transaction_id: row.get(1)?,
        buyer_id: row.get(2)?,
        seller_id: row.get(3)?,
        post_id: row.get(4)?,
        amount: row.get(5)?,
        status,
        payee: row.get(7)?,
        payment_payload: row.get(8)?,
        payment_proof_url: row.get(9)?,
        work_files,
        work_preview_url: row.get(11)?,
        work_description: row.get(12)?,
        buyer_approval: row.get::<_, i64>(13)? != 0,
        buyer_feedback: row.get(14)?,
        dispute_reason: row.get(15)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        expires_at: parse_timestamp(&expires_at)?,
        buyer_approval_at: parse_opt_timestamp(row.get(19)?)?,
        released_at: parse_opt_timestamp(row.get(20)?)?,
    })
}

fn terminal_status_list() -> String {
    super::TERMINAL_STATUSES
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl TransactionStore for SqliteTransactionStore {
    fn create(&self, txn: &Transaction) -> Result<Transaction, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stored = txn.clone();
        stored.record_id = fresh_record_id("rec-");
        let work_files_json = serde_json::to_string(&stored.work_files).map_err(|err| {
            StoreError::CorruptRecord {
                reason: format!("unencodable work_files: {err}"),
            }
        })?;

        let result = conn.execute(
            "INSERT INTO transactions (
                record_id, transaction_id, buyer_id, seller_id, post_id, amount, status,
                payee, payment_payload, payment_proof_url, work_files, work_preview_url,
                work_description, buyer_approval, buyer_feedback, dispute_reason,
                created_at, updated_at, expires_at, buyer_approval_at, released_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                stored.record_id,
                stored.transaction_id,
                stored.buyer_id,
                stored.seller_id,
                stored.post_id,
                stored.amount,
                stored.status.as_str(),
                stored.payee,
                stored.payment_payload,
                stored.payment_proof_url,
                work_files_json,
                stored.work_preview_url,
                stored.work_description,
                i64::from(stored.buyer_approval),
                stored.buyer_feedback,
                stored.dispute_reason,
                stored.created_at.to_rfc3339(),
                stored.updated_at.to_rfc3339(),
                stored.expires_at.to_rfc3339(),
                stored.buyer_approval_at.map(|t| t.to_rfc3339()),
                stored.released_at.map(|t| t.to_rfc3339()),
            ],
        );

        match result {
            Ok(_) => Ok(stored),
            Err(err) if err.to_string().contains("UNIQUE constraint failed") => {
                Err(StoreError::DuplicateTransactionId {
                    transaction_id: stored.transaction_id,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, record_id: &str) -> Result<Option<Transaction>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {SELECT_COLUMNS} FROM transactions WHERE record_id = ?1");

        conn.query_row(&sql, params![record_id], |row| {
            Ok(row_to_transaction(row))
        })
        .optional()?
        .transpose()
    }

    fn update(
        &self,
        current: &Transaction,
        patch: &TransactionPatch,
    ) -> Result<Transaction, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut updated = current.clone();
        patch.apply(&mut updated, Utc::now());
        let work_files_json = serde_json::to_string(&updated.work_files).map_err(|err| {
            StoreError::CorruptRecord {
                reason: format!("unencodable work_files: {err}"),
            }
        })?;

        // Conditional write: only applies while the persisted status still
        // equals the status the caller fetched.
        let rows = conn.execute(
            "UPDATE transactions SET
                status = ?1, payment_proof_url = ?2, work_files = ?3, work_preview_url = ?4,
                buyer_approval = ?5, buyer_feedback = ?6, dispute_reason = ?7, updated_at = ?8,
                buyer_approval_at = ?9, released_at = ?10
             WHERE record_id = ?11 AND status = ?12",
            params![
                updated.status.as_str(),
                updated.payment_proof_url,
                work_files_json,
                updated.work_preview_url,
                i64::from(updated.buyer_approval),
                updated.buyer_feedback,
                updated.dispute_reason,
                updated.updated_at.to_rfc3339(),
                updated.buyer_approval_at.map(|t| t.to_rfc3339()),
                updated.released_at.map(|t| t.to_rfc3339()),
                current.record_id,
                current.status.as_str(),
            ],
        )?;

        if rows == 0 {
            let actual: Option<String> = conn
                .query_row(
                    "SELECT status FROM transactions WHERE record_id = ?1",
                    params![current.record_id],
                    |row| row.get(0),
                )
                .optional()?;

            return match actual {
                Some(status_str) => {
                    let actual =
                        status_str
                            .parse()
                            .map_err(|_| StoreError::CorruptRecord {
                                reason: format!("bad status {status_str:?}"),
                            })?;
                    Err(StoreError::StaleStatus {
                        record_id: current.record_id.clone(),
                        expected: current.status,
                        actual,
                    })
                }
                None => Err(StoreError::RecordNotFound {
                    record_id: current.record_id.clone(),
                }),
            };
        }

        Ok(updated)
    }

    fn find_latest_for_pair(
        &self,
        user_a: &str,
        user_b: &str,
        post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut sql = format!(
            "SELECT {SELECT_COLUMNS} FROM transactions
             WHERE ((buyer_id = ?1 AND seller_id = ?2) OR (buyer_id = ?2 AND seller_id = ?1))"
        );
        if post_id.is_some() {
            sql.push_str(" AND post_id = ?3");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT 1");

        let result = if let Some(post) = post_id {
            conn.query_row(&sql, params![user_a, user_b, post], |row| {
                Ok(row_to_transaction(row))
            })
            .optional()?
        } else {
            conn.query_row(&sql, params![user_a, user_b], |row| {
                Ok(row_to_transaction(row))
            })
            .optional()?
        };
        result.transpose()
    }

    fn find_active_for_pair(
        &self,
        user_a: &str,
        user_b: &str,
        post_id: Option<&str>,
    ) -> Result<Option<Transaction>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut sql = format!(
            "SELECT {SELECT_COLUMNS} FROM transactions
             WHERE ((buyer_id = ?1 AND seller_id = ?2) OR (buyer_id = ?2 AND seller_id = ?1))
               AND status NOT IN ({})",
            terminal_status_list()
        );
        if post_id.is_some() {
            sql.push_str(" AND post_id = ?3");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT 1");

        let result = if let Some(post) = post_id {
            conn.query_row(&sql, params![user_a, user_b, post], |row| {
                Ok(row_to_transaction(row))
            })
            .optional()?
        } else {
            conn.query_row(&sql, params![user_a, user_b], |row| {
                Ok(row_to_transaction(row))
            })
            .optional()?
        };
        result.transpose()
    }

    fn transaction_id_exists(&self, transaction_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE transaction_id = ?1",
            params![transaction_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
