//! Slippage models.
//!
//! The calculator asks an injected [`SlippageModel`] for the expected
//! market-impact cost of each candidate. The default is a fixed fraction
//! of capital. [`JitteredSlippage`] adds bounded noise drawn from a ChaCha
//! RNG that is reseeded at the start of every calculation, so the same
//! input always sees the same sequence.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use crate::config::{decimal_from_config, CostsConfig};
use crate::types::{ArbError, ExchangeProfile};

/// Reference slippage: 0.2% of capital.
pub const DEFAULT_SLIPPAGE_PCT: Decimal = dec!(0.2);

/// Per-calculation cost function: `(capital, buy, sell) -> cost`.
/// `None` means the cost is not representable and the candidate is dropped.
pub type SlippageFn<'a> =
    Box<dyn FnMut(Decimal, &ExchangeProfile, &ExchangeProfile) -> Option<Decimal> + Send + 'a>;

/// Expected execution-price deviation for one opportunity.
pub trait SlippageModel: Send + Sync {
    /// Start one calculation. Every call starts from the same state, so
    /// the model itself never changes between calculations.
    fn begin(&self) -> SlippageFn<'_>;
}

/// `pct` percent of `amount`, or `None` on overflow.
pub(crate) fn percent_of(amount: Decimal, pct: Decimal) -> Option<Decimal> {
    amount.checked_mul(pct)?.checked_div(dec!(100))
}

// ---------------------------------------------------------------------------
// Fixed
// ---------------------------------------------------------------------------

/// Constant proportion of capital.
#[derive(Debug, Clone)]
pub struct FixedSlippage {
    rate_pct: Decimal,
}

impl FixedSlippage {
    pub fn new(rate_pct: Decimal) -> Self {
        Self {
            rate_pct: rate_pct.max(Decimal::ZERO),
        }
    }

    pub fn rate_pct(&self) -> Decimal {
        self.rate_pct
    }
}

impl Default for FixedSlippage {
    fn default() -> Self {
        Self::new(DEFAULT_SLIPPAGE_PCT)
    }
}

impl SlippageModel for FixedSlippage {
    fn begin(&self) -> SlippageFn<'_> {
        let rate = self.rate_pct;
        Box::new(move |capital: Decimal, _: &ExchangeProfile, _: &ExchangeProfile| {
            percent_of(capital, rate)
        })
    }
}

// ---------------------------------------------------------------------------
// Jittered
// ---------------------------------------------------------------------------

/// Base rate plus uniform noise in `[-jitter_pct, +jitter_pct]`.
#[derive(Debug, Clone)]
pub struct JitteredSlippage {
    base_pct: Decimal,
    jitter_pct: f64,
    seed: u64,
}

impl JitteredSlippage {
    pub fn new(base_pct: Decimal, jitter_pct: Decimal, seed: u64) -> Self {
        Self {
            base_pct,
            jitter_pct: jitter_pct.abs().to_f64().unwrap_or(0.0),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl SlippageModel for JitteredSlippage {
    fn begin(&self) -> SlippageFn<'_> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let (base, jitter) = (self.base_pct, self.jitter_pct);

        Box::new(move |capital: Decimal, _: &ExchangeProfile, _: &ExchangeProfile| {
            let offset = if jitter == 0.0 {
                Decimal::ZERO
            } else {
                let draw: f64 = rng.gen_range(-jitter..=jitter);
                Decimal::from_f64(draw).unwrap_or(Decimal::ZERO).round_dp(8)
            };
            let rate = base.checked_add(offset)?.max(Decimal::ZERO);
            percent_of(capital, rate)
        })
    }
}

/// Build the slippage model described by the `[costs]` section.
pub fn from_config(costs: &CostsConfig) -> Result<Box<dyn SlippageModel>, ArbError> {
    let base = decimal_from_config("costs.slippage_pct", costs.slippage_pct)?;
    if base < Decimal::ZERO {
        return Err(ArbError::Config("costs.slippage_pct must not be negative".into()));
    }
    let jitter = decimal_from_config("costs.slippage_jitter_pct", costs.slippage_jitter_pct)?;

    if jitter.is_zero() {
        Ok(Box::new(FixedSlippage::new(base)))
    } else {
        // An unseeded model still picks its seed once, at startup.
        let seed = costs.slippage_seed.unwrap_or_else(rand::random);
        Ok(Box::new(JitteredSlippage::new(base, jitter, seed)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
