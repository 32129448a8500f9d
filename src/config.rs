//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Monetary values are written as plain floats in the file and converted
//! to `Decimal` at the point of use via [`decimal_from_config`].

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::str::FromStr;

use crate::types::{ArbError, TradingPair, VenueKind};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub app: AppSection,
    pub refresh: RefreshConfig,
    pub costs: CostsConfig,
    pub price_source: PriceSourceConfig,
    pub storage: StorageConfig,
    pub dashboard: DashboardConfig,
    pub exchanges: Vec<ExchangeConfig>,
    pub pairs: Vec<TradingPair>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    /// Notional traded per leg, in USD.
    pub capital_base: f64,
    #[serde(default = "default_broadcast_top_n")]
    pub broadcast_top_n: usize,
    /// Records strictly above this net profit percentage go to history.
    #[serde(default)]
    pub history_min_net_profit_pct: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CostsConfig {
    /// Expected market impact as a percentage of capital.
    pub slippage_pct: f64,
    /// Flat USD cost of moving funds between two custodial venues.
    pub custodial_transfer_fee: f64,
    #[serde(default)]
    pub slippage_jitter_pct: f64,
    #[serde(default)]
    pub slippage_seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PriceSourceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Total width of the random per-venue price variance, in percent.
    pub jitter_range_pct: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub history_file: String,
    pub history_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

/// Raw exchange entry as written in `config.toml`.
/// Validated into an `ExchangeProfile` by the registry.
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    pub id: String,
    pub name: String,
    pub venue: VenueKind,
    pub fee_pct: f64,
    #[serde(default)]
    pub network_fee: Option<f64>,
    #[serde(default)]
    pub price_bias_pct: f64,
}

fn default_broadcast_top_n() -> usize {
    20
}

fn default_event_buffer() -> usize {
    64
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }
}

/// Convert a float read from the config file into a `Decimal`.
///
/// Goes through the shortest decimal representation of the float so
/// `0.1` becomes exactly `0.1` rather than its binary expansion.
pub fn decimal_from_config(field: &str, value: f64) -> Result<Decimal, ArbError> {
    if !value.is_finite() {
        return Err(ArbError::Config(format!("{field} must be a finite number, got {value}")));
    }
    Decimal::from_str(&value.to_string())
        .map_err(|e| ArbError::Config(format!("{field} is not representable as a decimal: {e}")))
}
