//! CoinGecko price source.
//!
//! Fetches one USD reference price per configured pair from the public
//! `simple/price` endpoint, then derives a quote for every registered
//! exchange by applying that venue's configured bias plus a small random
//! variance. The variance RNG is seedable so simulated runs can be
//! replayed.
//!
//! API: `https://api.coingecko.com/api/v3/simple/price`
//! Auth: none (public tier). Rate limit: roughly 10–30 req/min.
//!
//! On any HTTP or parse failure the last good snapshot is served instead.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reqwest::Client;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::PriceSource;
use crate::config::PriceSourceConfig;
use crate::exchanges::ExchangeRegistry;
use crate::types::{ArbError, PriceSample, SamplesByPair, TradingPair};

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// One coin entry of the `simple/price` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinQuote {
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub usd_24h_vol: Option<f64>,
}

/// `simple/price` response: coin id -> quote.
pub type SimplePriceResponse = HashMap<String, CoinQuote>;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
    pairs: Vec<TradingPair>,
    registry: Arc<ExchangeRegistry>,
    jitter_range_pct: f64,
    rng: Mutex<ChaCha8Rng>,
    cache: RwLock<SamplesByPair>,
}

impl CoinGeckoClient {
    pub fn new(
        cfg: &PriceSourceConfig,
        pairs: Vec<TradingPair>,
        registry: Arc<ExchangeRegistry>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .user_agent("ARBSCOPE/0.1.0")
            .build()
            .context("Failed to build CoinGecko HTTP client")?;

        let rng = match cfg.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            pairs,
            registry,
            jitter_range_pct: cfg.jitter_range_pct.max(0.0),
            rng: Mutex::new(rng),
            cache: RwLock::new(SamplesByPair::new()),
        })
    }

    /// Comma-separated coin ids for every configured pair.
    fn coin_ids(&self) -> String {
        self.pairs
            .iter()
            .map(|p| p.coingecko_id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    async fn fetch_quotes(&self) -> Result<SimplePriceResponse> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_vol=true",
            self.base_url,
            self.coin_ids()
        );

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("CoinGecko request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ArbError::PriceSource {
                source_name: "coingecko".into(),
                message: format!("HTTP {status}: {body}"),
            }
            .into());
        }

        resp.json::<SimplePriceResponse>()
            .await
            .context("Failed to parse CoinGecko response")
    }

    /// Last snapshot served.
    pub async fn cached(&self) -> SamplesByPair {
        self.cache.read().await.clone()
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_prices(&self) -> Result<SamplesByPair> {
        let quotes = match self.fetch_quotes().await {
            Ok(q) => q,
            Err(e) => {
                warn!(error = %e, "CoinGecko fetch failed, serving cached prices");
                return Ok(self.cached().await);
            }
        };

        let fresh = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            synthesize_samples(
                &quotes,
                &self.pairs,
                &self.registry,
                self.jitter_range_pct,
                &mut *rng,
                Utc::now().timestamp_millis(),
            )
        };

        let mut cache = self.cache.write().await;
        let priced = fresh.len();
        cache.extend(fresh);

        info!(
            pairs = priced,
            exchanges = self.registry.len(),
            "Fetched market prices from CoinGecko"
        );
        Ok(cache.clone())
    }
}

// ---------------------------------------------------------------------------
// Quote synthesis
// ---------------------------------------------------------------------------

/// Derive per-exchange samples from one reference quote per pair.
///
/// Each venue quotes `reference * (1 + bias/100 + jitter)`, with jitter
/// uniform in `±jitter_range_pct / 200`. Pairs without a positive USD
/// quote are left out.
pub fn synthesize_samples<R: Rng>(
    quotes: &SimplePriceResponse,
    pairs: &[TradingPair],
    registry: &ExchangeRegistry,
    jitter_range_pct: f64,
    rng: &mut R,
    observed_at_ms: i64,
) -> SamplesByPair {
    let mut out = SamplesByPair::new();

    for pair in pairs {
        let Some(quote) = quotes.get(&pair.coingecko_id) else {
            warn!(pair = %pair.symbol, coin = %pair.coingecko_id, "No price data for pair");
            continue;
        };
        let Some(reference) = quote
            .usd
            .and_then(Decimal::from_f64)
            .map(|d| d.round_dp(8))
            .filter(|d| *d > Decimal::ZERO)
        else {
            warn!(pair = %pair.symbol, "Missing or non-positive USD price");
            continue;
        };
        let volume = quote
            .usd_24h_vol
            .and_then(Decimal::from_f64)
            .map(|v| v.round_dp(2));

        let samples: Vec<PriceSample> = registry
            .profiles()
            .iter()
            .filter_map(|exchange| {
                let jitter = if jitter_range_pct > 0.0 {
                    (rng.gen::<f64>() - 0.5) * jitter_range_pct / 100.0
                } else {
                    0.0
                };
                let jitter = Decimal::from_f64(jitter).unwrap_or(Decimal::ZERO).round_dp(10);
                let factor = Decimal::ONE + exchange.price_bias_pct / dec!(100) + jitter;
                let price = (reference * factor).round_dp(8);
                if price <= Decimal::ZERO {
                    return None;
                }
                Some(PriceSample {
                    exchange_id: exchange.id.clone(),
                    pair: pair.symbol.clone(),
                    price,
                    volume_24h: volume,
                    observed_at_ms,
                })
            })
            .collect();

        debug!(pair = %pair.symbol, %reference, samples = samples.len(), "Synthesized exchange quotes");
        out.insert(pair.symbol.clone(), samples);
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
