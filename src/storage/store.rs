//! In-memory opportunity store.
//!
//! Holds the latest computed set (replaced wholesale every cycle) and a
//! bounded history of notable records. Shared between the refresh driver
//! and the dashboard behind an `Arc`.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{OpportunityFilter, OpportunityRecord};

/// Aggregate figures for the `/api/stats` endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreStats {
    pub latest_count: usize,
    pub profitable_count: usize,
    pub history_count: usize,
    /// Mean `net_profit_pct` across history, `None` when history is empty.
    pub average_net_profit_pct: Option<Decimal>,
    pub best: Option<OpportunityRecord>,
    /// Latest record count per pair.
    pub by_pair: BTreeMap<String, usize>,
    pub cycles: u64,
    pub last_updated_ms: Option<i64>,
}

#[derive(Debug, Default)]
struct Inner {
    latest: Vec<OpportunityRecord>,
    history: VecDeque<OpportunityRecord>,
    cycles: u64,
    last_updated_ms: Option<i64>,
}

#[derive(Debug)]
pub struct OpportunityStore {
    inner: RwLock<Inner>,
    history_limit: usize,
}

impl OpportunityStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            history_limit,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Replace the latest set. Order is preserved as given.
    pub async fn replace_all(&self, records: Vec<OpportunityRecord>) {
        let mut inner = self.inner.write().await;
        debug!(records = records.len(), "Replacing latest opportunities");
        inner.latest = records;
        inner.last_updated_ms = Some(Utc::now().timestamp_millis());
    }

    /// Push one record to history, evicting the oldest beyond the limit.
    pub async fn append_to_history(&self, record: OpportunityRecord) {
        if self.history_limit == 0 {
            return;
        }
        let mut inner = self.inner.write().await;
        inner.history.push_back(record);
        while inner.history.len() > self.history_limit {
            inner.history.pop_front();
        }
    }

    /// Seed history from persisted records, keeping the newest that fit.
    pub async fn restore_history(&self, records: Vec<OpportunityRecord>) {
        let skip = records.len().saturating_sub(self.history_limit);
        let mut inner = self.inner.write().await;
        inner.history = records.into_iter().skip(skip).collect();
    }

    pub async fn latest(&self) -> Vec<OpportunityRecord> {
        self.inner.read().await.latest.clone()
    }

    pub async fn latest_filtered(&self, filter: &OpportunityFilter) -> Vec<OpportunityRecord> {
        self.inner
            .read()
            .await
            .latest
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// First `n` records of the latest set (already ranked).
    pub async fn top(&self, n: usize) -> Vec<OpportunityRecord> {
        self.inner.read().await.latest.iter().take(n).cloned().collect()
    }

    /// Up to `limit` most recent history entries, oldest first.
    pub async fn history(&self, limit: usize) -> Vec<OpportunityRecord> {
        let inner = self.inner.read().await;
        let skip = inner.history.len().saturating_sub(limit);
        inner.history.iter().skip(skip).cloned().collect()
    }

    pub async fn record_cycle(&self) -> u64 {
        let mut inner = self.inner.write().await;
        inner.cycles += 1;
        inner.cycles
    }

    pub async fn cycles(&self) -> u64 {
        self.inner.read().await.cycles
    }

    pub async fn last_updated_ms(&self) -> Option<i64> {
        self.inner.read().await.last_updated_ms
    }

    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;

        let average_net_profit_pct = if inner.history.is_empty() {
            None
        } else {
            let sum: Decimal = inner.history.iter().map(|r| r.net_profit_pct).sum();
            Some((sum / Decimal::from(inner.history.len())).round_dp(6))
        };

        // First maximum wins on ties.
        let best = inner
            .history
            .iter()
            .fold(None::<&OpportunityRecord>, |best, r| match best {
                Some(b) if b.net_profit_pct >= r.net_profit_pct => Some(b),
                _ => Some(r),
            })
            .cloned();

        let mut by_pair = BTreeMap::new();
        for r in &inner.latest {
            *by_pair.entry(r.pair.clone()).or_insert(0) += 1;
        }

        StoreStats {
            latest_count: inner.latest.len(),
            profitable_count: inner.latest.iter().filter(|r| r.is_profitable()).count(),
            history_count: inner.history.len(),
            average_net_profit_pct,
            best,
            by_pair,
            cycles: inner.cycles,
            last_updated_ms: inner.last_updated_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
