//! Refresh driver.
//!
//! One cycle: fetch prices → compute opportunities → replace the store's
//! latest set → record notable ones to history → broadcast the top N.
//! The binary calls [`Refresher::run_cycle`] on a fixed interval.

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::calculator::OpportunityEngine;
use crate::config::{decimal_from_config, RefreshConfig};
use crate::prices::PriceSource;
use crate::storage::OpportunityStore;
use crate::types::{ArbError, DashboardEvent};

/// Per-cycle parameters, converted from `[refresh]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub capital_base: Decimal,
    pub broadcast_top_n: usize,
    pub history_min_net_profit_pct: Decimal,
}

impl RefreshSettings {
    pub fn from_config(cfg: &RefreshConfig) -> Result<Self, ArbError> {
        let capital_base = decimal_from_config("refresh.capital_base", cfg.capital_base)?;
        if capital_base <= Decimal::ZERO {
            return Err(ArbError::InvalidCapital(capital_base));
        }
        Ok(Self {
            capital_base,
            broadcast_top_n: cfg.broadcast_top_n,
            history_min_net_profit_pct: decimal_from_config(
                "refresh.history_min_net_profit_pct",
                cfg.history_min_net_profit_pct,
            )?,
        })
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            capital_base: Decimal::ONE_HUNDRED,
            broadcast_top_n: 20,
            history_min_net_profit_pct: Decimal::ZERO,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CycleSummary {
    pub cycle: u64,
    pub pairs: usize,
    pub samples: usize,
    pub records: usize,
    pub profitable: usize,
    /// Records appended to history this cycle.
    pub recorded: usize,
    /// Subscribers that received the update.
    pub receivers: usize,
    pub elapsed_ms: u64,
}

pub struct Refresher {
    source: Arc<dyn PriceSource>,
    engine: Arc<OpportunityEngine>,
    store: Arc<OpportunityStore>,
    events: broadcast::Sender<DashboardEvent>,
    settings: RefreshSettings,
}

impl Refresher {
    pub fn new(
        source: Arc<dyn PriceSource>,
        engine: Arc<OpportunityEngine>,
        store: Arc<OpportunityStore>,
        events: broadcast::Sender<DashboardEvent>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            source,
            engine,
            store,
            events,
            settings,
        }
    }

    pub fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    /// Run one refresh cycle. A fetch failure leaves the store untouched.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let started = Instant::now();

        let samples = self
            .source
            .fetch_prices()
            .await
            .context("Price fetch failed")?;
        let sample_count: usize = samples.values().map(Vec::len).sum();

        let records = self
            .engine
            .compute_opportunities(&samples, self.settings.capital_base)?;

        let profitable = records.iter().filter(|r| r.is_profitable()).count();
        let notable: Vec<_> = records
            .iter()
            .filter(|r| r.net_profit_pct > self.settings.history_min_net_profit_pct)
            .cloned()
            .collect();
        let recorded = notable.len();

        let event = DashboardEvent::update(
            &records,
            self.settings.broadcast_top_n,
            Utc::now().timestamp_millis(),
        );
        let record_count = records.len();

        self.store.replace_all(records).await;
        for record in notable {
            self.store.append_to_history(record).await;
        }

        // Err only means nobody is listening.
        let receivers = self.events.send(event).unwrap_or(0);
        debug!(receivers, "Broadcast opportunities update");

        let cycle = self.store.record_cycle().await;
        let summary = CycleSummary {
            cycle,
            pairs: samples.len(),
            samples: sample_count,
            records: record_count,
            profitable,
            recorded,
            receivers,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            cycle = summary.cycle,
            pairs = summary.pairs,
            opportunities = summary.records,
            profitable = summary.profitable,
            recorded = summary.recorded,
            elapsed_ms = summary.elapsed_ms,
            "Refresh cycle complete"
        );
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
