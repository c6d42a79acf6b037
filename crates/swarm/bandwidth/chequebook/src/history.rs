//! Cheque history and daily statistics.
//!
//! Every accepted (received) or committed (sent) cheque is appended to a
//! per-counterparty log. Records live at consecutive indices in
//! `[min_index, max_index)`; appends grow `max_index`, pruning deletes
//! expired records from the low end and advances `min_index`. Records are
//! appended in time order, so pruning stops at the first live record.
//!
//! Alongside the log each append bumps the per-day, per-token aggregate for
//! its direction. A day's aggregate stops changing once the day is over.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, U256};
use chrono::{DateTime, NaiveDate};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vertex_storage::{DatabaseError, SharedStateStore, StateStoreExt};

use crate::keys;

/// Records older than this are pruned.
pub const DEFAULT_HISTORY_RETENTION: Duration = Duration::from_secs(180 * 24 * 60 * 60);

/// Which side of the cheque the local node is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// Source of the current Unix time in seconds.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// One cheque in the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChequeRecord {
    pub token: Address,
    pub chequebook: Address,
    pub beneficiary: Address,
    /// Increment over the previous cheque.
    pub amount: U256,
    pub cumulative_payout: U256,
    /// Unix seconds.
    pub timestamp: u64,
}

/// Live index window of a history log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub min_index: u64,
    pub max_index: u64,
}

impl IndexRange {
    pub const fn len(&self) -> u64 {
        self.max_index.saturating_sub(self.min_index)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Aggregate of one day's cheques in one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub token: Address,
    pub amount: U256,
    pub count: u64,
}

/// History log and daily stats for one direction.
pub struct ChequeHistory {
    store: SharedStateStore,
    direction: Direction,
    retention: Duration,
    /// Serialises the read-modify-write of ranges and stats.
    lock: Mutex<()>,
}

impl ChequeHistory {
    pub fn new(store: SharedStateStore, direction: Direction) -> Self {
        Self {
            store,
            direction,
            retention: DEFAULT_HISTORY_RETENTION,
            lock: Mutex::new(()),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub fn index_range(&self, counterparty: Address) -> Result<IndexRange, DatabaseError> {
        Ok(self
            .store
            .get_optional(&keys::history_range(self.direction, counterparty))?
            .unwrap_or_default())
    }

    /// Appends `record`, updates the day's stats and prunes expired records.
    /// Returns the index the record was stored at.
    pub fn append(
        &self,
        counterparty: Address,
        record: &ChequeRecord,
        now: u64,
    ) -> Result<u64, DatabaseError> {
        let _guard = self.lock.lock();

        let mut range = self.index_range(counterparty)?;
        let index = range.max_index;
        self.store.put(
            &keys::history_record(self.direction, counterparty, index),
            record,
        )?;
        range.max_index += 1;
        self.store
            .put(&keys::history_range(self.direction, counterparty), &range)?;

        self.record_stats(record)?;
        self.prune_range(counterparty, range, now)?;
        Ok(index)
    }

    /// Deletes expired records for `counterparty`. Safe to repeat.
    pub fn prune(&self, counterparty: Address, now: u64) -> Result<IndexRange, DatabaseError> {
        let _guard = self.lock.lock();
        let range = self.index_range(counterparty)?;
        self.prune_range(counterparty, range, now)
    }

    fn prune_range(
        &self,
        counterparty: Address,
        mut range: IndexRange,
        now: u64,
    ) -> Result<IndexRange, DatabaseError> {
        let cutoff = now.saturating_sub(self.retention.as_secs());
        let start = range.min_index;

        while range.min_index < range.max_index {
            let key = keys::history_record(self.direction, counterparty, range.min_index);
            match self.store.get::<ChequeRecord>(&key) {
                Ok(record) if record.timestamp >= cutoff => break,
                Ok(_) => self.store.delete(&key)?,
                // Already deleted by an interrupted prune.
                Err(DatabaseError::NotFound) => {}
                Err(e) => return Err(e),
            }
            range.min_index += 1;
        }

        if range.min_index != start {
            self.store
                .put(&keys::history_range(self.direction, counterparty), &range)?;
            debug!(
                direction = %self.direction,
                %counterparty,
                pruned = range.min_index - start,
                "Pruned cheque history"
            );
        }
        Ok(range)
    }

    /// Live records for `counterparty`, oldest first.
    pub fn records(&self, counterparty: Address) -> Result<Vec<ChequeRecord>, DatabaseError> {
        let range = self.index_range(counterparty)?;
        let mut records = Vec::with_capacity(usize::try_from(range.len()).unwrap_or_default());
        for index in range.min_index..range.max_index {
            let key = keys::history_record(self.direction, counterparty, index);
            if let Some(record) = self.store.get_optional(&key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn record_stats(&self, record: &ChequeRecord) -> Result<(), DatabaseError> {
        let date = date_of(record.timestamp);
        let key = keys::daily_stats(self.direction, date, record.token);
        let mut stats = self.store.get_optional::<DailyStats>(&key)?.unwrap_or(DailyStats {
            date,
            token: record.token,
            amount: U256::ZERO,
            count: 0,
        });
        stats.amount = stats.amount.saturating_add(record.amount);
        stats.count += 1;
        self.store.put(&key, &stats)
    }

    pub fn daily_stats(
        &self,
        date: NaiveDate,
        token: Address,
    ) -> Result<Option<DailyStats>, DatabaseError> {
        self.store
            .get_optional(&keys::daily_stats(self.direction, date, token))
    }

    /// Every stored day, ordered by date.
    pub fn all_daily_stats(&self) -> Result<Vec<DailyStats>, DatabaseError> {
        let mut all = Vec::new();
        self.store.iterate_values::<DailyStats, _>(
            &keys::daily_stats_prefix(self.direction),
            |_, stats| {
                all.push(stats);
                Ok(true)
            },
        )?;
        Ok(all)
    }
}

/// UTC calendar date of a Unix timestamp.
pub(crate) fn date_of(timestamp: u64) -> NaiveDate {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.date_naive())
        .unwrap_or(NaiveDate::MIN)
}
