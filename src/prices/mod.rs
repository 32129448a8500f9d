//! Price sources.
//!
//! Defines the `PriceSource` trait consumed by the refresh driver and
//! provides the CoinGecko-backed implementation.

pub mod coingecko;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::SamplesByPair;

/// Abstraction over market data feeds.
///
/// Implementors return a best-effort snapshot: pairs that could not be
/// priced are simply absent from the map.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch one snapshot of price samples, grouped by pair symbol.
    async fn fetch_prices(&self) -> Result<SamplesByPair>;
}
