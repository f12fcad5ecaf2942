//! Polling synchronization for the non-acting party.
//!
//! The party not currently acting discovers state changes by re-fetching
//! the shared record on a fixed interval. The watcher is tick-driven: the
//! caller owns the clock (a UI timer, a thread sleep, an async interval)
//! and calls [`TransactionWatcher::poll`] once per tick. A failed fetch is
//! "no update this tick", never fatal.
//!
//! Polling stops on its own when a terminal status is observed or when the
//! record is local-only (there is no store to poll).
//!
//! A watcher is bound to one record id. If a fallback update migrates the
//! record to a `local-` id mid-flow (see
//! [`FallbackStore::update`](crate::store::FallbackStore)), the old id is
//! gone; watch the transaction returned by that update instead.


use std::time::Duration;

use tracing::{debug, warn};

use crate::store::TransactionStore;
use crate::transaction::{Transaction, TransactionStatus};

/// Why a watcher stopped polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The transaction reached a terminal status.
    Terminal(TransactionStatus),
    /// The record exists only in session memory; there is nothing to poll.
    LocalOnly,
}

/// Outcome of a single poll tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PollTick {
    /// The persisted record changed since the last observation.
    Updated(Transaction),
    /// No change (including fetch failures, which retry next tick).
    Unchanged,
    /// Polling has stopped; no further ticks will observe anything.
    Stopped(StopReason),
}

/// Tick-driven observer of a single transaction record.
#[derive(Debug)]
pub struct TransactionWatcher {
    record_id: String,
    interval: Duration,
    last_observed: Transaction,
    stopped: Option<StopReason>,
}

impl TransactionWatcher {
    /// Creates a watcher for the given transaction. A local-only record
    /// starts out already stopped.
    #[must_use]
    pub fn new(txn: &Transaction, interval: Duration) -> Self {
        let stopped = if txn.is_local() {
            Some(StopReason::LocalOnly)
        } else if txn.status.is_terminal() {
            Some(StopReason::Terminal(txn.status))
        } else {
            None
        };

        Self {
            record_id: txn.record_id.clone(),
            interval,
            last_observed: txn.clone(),
            stopped,
        }
    }

    /// The interval the caller should wait between ticks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` once polling has stopped.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    /// The most recently observed state of the transaction.
    #[must_use]
    pub const fn last_observed(&self) -> &Transaction {
        &self.last_observed
    }

    /// Performs one poll tick against the store.
    ///
    /// Returns the freshest state when it changed, and stops permanently
    /// once a terminal status is seen (the terminal update itself is still
    /// delivered as [`PollTick::Updated`]; the next tick reports
    /// [`PollTick::Stopped`]).
    pub fn poll(&mut self, store: &dyn TransactionStore) -> PollTick {
        if let Some(reason) = self.stopped {
            return PollTick::Stopped(reason);
        }

        let fetched = match store.get(&self.record_id) {
            Ok(Some(txn)) => txn,
            Ok(None) => return PollTick::Unchanged,
            Err(err) => {
                // Treat a failed poll as no update this tick.
                warn!(record_id = %self.record_id, %err, "poll failed; will retry");
                return PollTick::Unchanged;
            }
        };

        if fetched.status.is_terminal() {
            self.stopped = Some(StopReason::Terminal(fetched.status));
        }

        if fetched.status == self.last_observed.status
            && fetched.updated_at == self.last_observed.updated_at
        {
            return PollTick::Unchanged;
        }

        debug!(
            record_id = %self.record_id,
            status = %fetched.status,
            "observed transaction update"
        );
        self.last_observed = fetched.clone();
        PollTick::Updated(fetched)
    }
}
