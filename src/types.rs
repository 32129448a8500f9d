//! Shared types for ARBSCOPE.
//!
//! These types form the data model used across all modules.
//! They are kept free of behaviour that needs I/O so that the engine,
//! storage, price source, and dashboard can depend on them without
//! circular references.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Exchanges
// ---------------------------------------------------------------------------

/// Whether a venue holds customer funds or settles on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    /// Centralised exchange; moving funds between two of these costs a
    /// withdrawal.
    Custodial,
    /// Decentralised exchange; every leg pays a flat network fee.
    OnChain,
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueKind::Custodial => write!(f, "CEX"),
            VenueKind::OnChain => write!(f, "DEX"),
        }
    }
}

/// Static per-exchange metadata. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeProfile {
    pub id: String,
    pub name: String,
    pub venue: VenueKind,
    /// Proportional trading fee per fill, in percent of notional (0.1 = 0.1%).
    pub fee_pct: Decimal,
    /// Flat USD cost per leg. Only set for on-chain venues.
    pub network_fee: Option<Decimal>,
    /// Offset applied by the simulated price source, in percent.
    pub price_bias_pct: Decimal,
}

impl ExchangeProfile {
    pub fn is_on_chain(&self) -> bool {
        self.venue == VenueKind::OnChain
    }

    /// Network fee charged for one leg on this venue.
    pub fn leg_network_fee(&self) -> Decimal {
        match self.venue {
            VenueKind::OnChain => self.network_fee.unwrap_or(Decimal::ZERO),
            VenueKind::Custodial => Decimal::ZERO,
        }
    }
}

impl fmt::Display for ExchangeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] fee={}%", self.name, self.venue, self.fee_pct)?;
        if let Some(fee) = self.network_fee {
            write!(f, " network=${fee}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pairs & prices
// ---------------------------------------------------------------------------

/// A supported trading pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    /// Canonical symbol, e.g. "BTC/USDT".
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub name: String,
    /// CoinGecko coin id used to fetch the reference price.
    pub coingecko_id: String,
}

/// One quoted price for a pair on one exchange, captured in one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub exchange_id: String,
    pub pair: String,
    pub price: Decimal,
    #[serde(default)]
    pub volume_24h: Option<Decimal>,
    pub observed_at_ms: i64,
}

impl PriceSample {
    pub fn new(exchange_id: &str, pair: &str, price: Decimal, observed_at_ms: i64) -> Self {
        Self {
            exchange_id: exchange_id.to_string(),
            pair: pair.to_string(),
            price,
            volume_24h: None,
            observed_at_ms,
        }
    }
}

impl fmt::Display for PriceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}: {}", self.pair, self.exchange_id, self.price)
    }
}

/// Price samples grouped by pair symbol.
///
/// Ordered so that the engine walks pairs in the same order on every call.
pub type SamplesByPair = BTreeMap<String, Vec<PriceSample>>;

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// A priced buy-low/sell-high combination with its full cost breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub id: String,
    pub pair: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub buy_venue: VenueKind,
    pub sell_venue: VenueKind,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// (sell - buy) / buy * 100. Always positive.
    pub spread_pct: Decimal,
    pub gross_profit: Decimal,
    pub trading_fee_cost: Decimal,
    pub network_fee_cost: Decimal,
    pub slippage_cost: Decimal,
    pub net_profit: Decimal,
    pub net_profit_pct: Decimal,
    pub observed_at_ms: i64,
    pub execution_steps: Vec<String>,
}

impl OpportunityRecord {
    /// Sum of every cost component.
    pub fn total_costs(&self) -> Decimal {
        self.trading_fee_cost + self.network_fee_cost + self.slippage_cost
    }

    /// Whether the trade still makes money once all costs are paid.
    pub fn is_profitable(&self) -> bool {
        self.net_profit > Decimal::ZERO
    }

    /// Whether either leg trades on the given exchange.
    pub fn involves_exchange(&self, exchange_id: &str) -> bool {
        self.buy_exchange == exchange_id || self.sell_exchange == exchange_id
    }

    /// Whether either leg trades on a venue of the given kind.
    pub fn involves_venue(&self, venue: VenueKind) -> bool {
        self.buy_venue == venue || self.sell_venue == venue
    }
}

impl fmt::Display for OpportunityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buy {} @ {} -> sell {} @ {} | spread={}% net=${} ({}%)",
            self.pair,
            self.buy_exchange,
            self.buy_price,
            self.sell_exchange,
            self.sell_price,
            self.spread_pct.round_dp(3),
            self.net_profit.round_dp(2),
            self.net_profit_pct.round_dp(3),
        )
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Venue-kind selector for the dashboard filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueFilter {
    #[default]
    All,
    Custodial,
    OnChain,
}

impl std::str::FromStr for VenueFilter {
    type Err = ArbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(VenueFilter::All),
            "custodial" | "cex" => Ok(VenueFilter::Custodial),
            "on_chain" | "onchain" | "dex" => Ok(VenueFilter::OnChain),
            _ => Err(ArbError::InvalidFilter(format!("unknown venue filter: {s}"))),
        }
    }
}

/// Caller-side selection over computed opportunities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpportunityFilter {
    pub min_net_profit_pct: Option<Decimal>,
    /// Keep records where either leg is one of these exchanges.
    pub exchanges: Vec<String>,
    pub pairs: Vec<String>,
    pub venue: VenueFilter,
}

impl OpportunityFilter {
    pub fn matches(&self, record: &OpportunityRecord) -> bool {
        if let Some(min) = self.min_net_profit_pct {
            if record.net_profit_pct < min {
                return false;
            }
        }
        if !self.exchanges.is_empty()
            && !self.exchanges.iter().any(|e| record.involves_exchange(e))
        {
            return false;
        }
        if !self.pairs.is_empty() && !self.pairs.iter().any(|p| *p == record.pair) {
            return false;
        }
        match self.venue {
            VenueFilter::All => true,
            VenueFilter::Custodial => record.involves_venue(VenueKind::Custodial),
            VenueFilter::OnChain => record.involves_venue(VenueKind::OnChain),
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcast events
// ---------------------------------------------------------------------------

/// Messages pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    ConnectionEstablished {
        message: String,
    },
    OpportunitiesUpdate {
        count: usize,
        profitable_count: usize,
        opportunities: Vec<OpportunityRecord>,
        timestamp: i64,
    },
}

impl DashboardEvent {
    /// Build an update event carrying at most `top_n` of `records`.
    pub fn update(records: &[OpportunityRecord], top_n: usize, timestamp: i64) -> Self {
        DashboardEvent::OpportunitiesUpdate {
            count: records.len(),
            profitable_count: records.iter().filter(|r| r.is_profitable()).count(),
            opportunities: records.iter().take(top_n).cloned().collect(),
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for ARBSCOPE.
#[derive(Debug, thiserror::Error)]
pub enum ArbError {
    #[error("Invalid capital base: {0} (must be positive)")]
    InvalidCapital(Decimal),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Price source error ({source_name}): {message}")]
    PriceSource { source_name: String, message: String },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
