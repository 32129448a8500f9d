//! Opportunity calculator.
//!
//! Turns one refresh cycle's price samples into ranked opportunity
//! records. For each pair every directed (buy venue, sell venue)
//! combination with a positive spread is priced: proportional trading
//! fees on both legs, flat network fees for on-chain legs (or the
//! custodial transfer fee when both legs are custodial), and slippage
//! from the injected model.
//!
//! The calculator holds no mutable state and does no I/O. Incomplete
//! input (single-sample pairs, unknown exchange ids) and combinations
//! whose figures overflow yield fewer records, never an error.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::debug;

use super::slippage::{percent_of, FixedSlippage, SlippageFn, SlippageModel};
use crate::config::{decimal_from_config, CostsConfig};
use crate::exchanges::ExchangeRegistry;
use crate::types::{ArbError, ExchangeProfile, OpportunityRecord, PriceSample, SamplesByPair, VenueKind};

/// Flat cost of moving funds between two custodial venues.
pub const DEFAULT_CUSTODIAL_TRANSFER_FEE: Decimal = dec!(2);

// ---------------------------------------------------------------------------
// Cost model
// ---------------------------------------------------------------------------

/// Caller-tunable constants of the fee model.
#[derive(Debug, Clone)]
pub struct CostModel {
    pub custodial_transfer_fee: Decimal,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            custodial_transfer_fee: DEFAULT_CUSTODIAL_TRANSFER_FEE,
        }
    }
}

impl CostModel {
    pub fn from_config(costs: &CostsConfig) -> Result<Self, ArbError> {
        let fee = decimal_from_config("costs.custodial_transfer_fee", costs.custodial_transfer_fee)?;
        if fee < Decimal::ZERO {
            return Err(ArbError::Config("costs.custodial_transfer_fee must not be negative".into()));
        }
        Ok(Self { custodial_transfer_fee: fee })
    }

    /// Proportional fees, charged independently on each leg against the
    /// same notional. `None` on overflow.
    pub fn trading_fees(&self, capital: Decimal, buy: &ExchangeProfile, sell: &ExchangeProfile) -> Option<Decimal> {
        percent_of(capital, buy.fee_pct)?.checked_add(percent_of(capital, sell.fee_pct)?)
    }

    /// Flat network costs for moving the asset between the two venues.
    pub fn network_fees(&self, buy: &ExchangeProfile, sell: &ExchangeProfile) -> Option<Decimal> {
        if buy.venue == VenueKind::Custodial && sell.venue == VenueKind::Custodial {
            Some(self.custodial_transfer_fee)
        } else {
            buy.leg_network_fee().checked_add(sell.leg_network_fee())
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct Figures {
    spread_pct: Decimal,
    gross_profit: Decimal,
    trading_fee_cost: Decimal,
    network_fee_cost: Decimal,
    slippage_cost: Decimal,
    net_profit: Decimal,
    net_profit_pct: Decimal,
}

/// Computes arbitrage opportunities from price samples.
pub struct OpportunityEngine {
    registry: Arc<ExchangeRegistry>,
    costs: CostModel,
    slippage: Box<dyn SlippageModel>,
}

impl OpportunityEngine {
    pub fn new(registry: Arc<ExchangeRegistry>, costs: CostModel, slippage: Box<dyn SlippageModel>) -> Self {
        Self {
            registry,
            costs,
            slippage,
        }
    }

    /// Engine with the reference constants: $2 custodial transfer, 0.2% slippage.
    pub fn with_defaults(registry: Arc<ExchangeRegistry>) -> Self {
        Self::new(registry, CostModel::default(), Box::new(FixedSlippage::default()))
    }

    /// Compute every admissible opportunity, stamped with the current time.
    pub fn compute_opportunities(
        &self,
        samples_by_pair: &SamplesByPair,
        capital_base: Decimal,
    ) -> Result<Vec<OpportunityRecord>, ArbError> {
        self.compute_opportunities_at(samples_by_pair, capital_base, Utc::now().timestamp_millis())
    }

    /// Compute every admissible opportunity, stamped with `observed_at_ms`.
    ///
    /// Output is sorted by `net_profit_pct` descending; ties keep the
    /// order in which they were produced (pair order, then sample order).
    pub fn compute_opportunities_at(
        &self,
        samples_by_pair: &SamplesByPair,
        capital_base: Decimal,
        observed_at_ms: i64,
    ) -> Result<Vec<OpportunityRecord>, ArbError> {
        if capital_base <= Decimal::ZERO {
            return Err(ArbError::InvalidCapital(capital_base));
        }

        let mut slippage = self.slippage.begin();
        let mut opportunities = Vec::new();
        let mut evaluated = 0usize;

        for (pair, samples) in samples_by_pair {
            if samples.len() < 2 {
                continue;
            }

            for (buy, sell) in directed_pairs(samples) {
                evaluated += 1;
                if let Some(record) = self.price_combination(pair, buy, sell, capital_base, observed_at_ms, &mut slippage) {
                    opportunities.push(record);
                }
            }
        }

        // `sort_by` is stable, so equal percentages keep insertion order.
        opportunities.sort_by(|a, b| b.net_profit_pct.cmp(&a.net_profit_pct));

        debug!(
            pairs = samples_by_pair.len(),
            combinations = evaluated,
            opportunities = opportunities.len(),
            "Opportunities computed"
        );

        Ok(opportunities)
    }

    /// Price one directed combination, or `None` if it is not admissible
    /// or its figures overflow.
    fn price_combination(
        &self,
        pair: &str,
        buy: &PriceSample,
        sell: &PriceSample,
        capital: Decimal,
        observed_at_ms: i64,
        slippage: &mut SlippageFn<'_>,
    ) -> Option<OpportunityRecord> {
        if buy.price <= Decimal::ZERO || sell.price <= buy.price {
            return None;
        }

        let (Some(buy_venue), Some(sell_venue)) =
            (self.registry.get(&buy.exchange_id), self.registry.get(&sell.exchange_id))
        else {
            debug!(
                pair,
                buy = %buy.exchange_id,
                sell = %sell.exchange_id,
                "Skipping combination with unregistered exchange"
            );
            return None;
        };

        let Some(f) = self.figures(buy.price, sell.price, capital, buy_venue, sell_venue, slippage) else {
            debug!(pair, buy = %buy.exchange_id, sell = %sell.exchange_id, "Skipping combination that overflows");
            return None;
        };

        Some(OpportunityRecord {
            id: uuid::Uuid::new_v4().to_string(),
            pair: pair.to_string(),
            buy_exchange: buy_venue.id.clone(),
            sell_exchange: sell_venue.id.clone(),
            buy_venue: buy_venue.venue,
            sell_venue: sell_venue.venue,
            buy_price: buy.price,
            sell_price: sell.price,
            spread_pct: f.spread_pct,
            gross_profit: f.gross_profit,
            trading_fee_cost: f.trading_fee_cost,
            network_fee_cost: f.network_fee_cost,
            slippage_cost: f.slippage_cost,
            net_profit: f.net_profit,
            net_profit_pct: f.net_profit_pct,
            observed_at_ms,
            execution_steps: execution_steps(pair, buy_venue, sell_venue, buy.price, sell.price),
        })
    }

    /// Spread, costs and profit for one combination, all checked.
    fn figures(
        &self,
        buy_price: Decimal,
        sell_price: Decimal,
        capital: Decimal,
        buy: &ExchangeProfile,
        sell: &ExchangeProfile,
        slippage: &mut SlippageFn<'_>,
    ) -> Option<Figures> {
        let spread_pct = sell_price
            .checked_sub(buy_price)?
            .checked_div(buy_price)?
            .checked_mul(dec!(100))?;
        let gross_profit = percent_of(capital, spread_pct)?;

        let trading_fee_cost = self.costs.trading_fees(capital, buy, sell)?;
        let network_fee_cost = self.costs.network_fees(buy, sell)?;
        let slippage_cost = slippage(capital, buy, sell)?;

        let net_profit = gross_profit
            .checked_sub(trading_fee_cost)?
            .checked_sub(network_fee_cost)?
            .checked_sub(slippage_cost)?;
        let net_profit_pct = net_profit.checked_div(capital)?.checked_mul(dec!(100))?;

        Some(Figures {
            spread_pct,
            gross_profit,
            trading_fee_cost,
            network_fee_cost,
            slippage_cost,
            net_profit,
            net_profit_pct,
        })
    }
}

/// Every ordered `(buy, sell)` combination of distinct samples.
///
/// Both directions of each unordered pair are produced, since asymmetric
/// fees can make one direction profitable and not the other.
pub(crate) fn directed_pairs(
    samples: &[PriceSample],
) -> impl Iterator<Item = (&PriceSample, &PriceSample)> + '_ {
    samples.iter().enumerate().flat_map(move |(i, buy)| {
        samples
            .iter()
            .enumerate()
            .filter(move |(j, _)| *j != i)
            .map(move |(_, sell)| (buy, sell))
    })
}

/// Human-readable walkthrough of the trade.
fn execution_steps(
    pair: &str,
    buy: &ExchangeProfile,
    sell: &ExchangeProfile,
    buy_price: Decimal,
    sell_price: Decimal,
) -> Vec<String> {
    let mut steps = vec![format!("Buy {pair} on {} at ${}", buy.name, usd(buy_price))];

    if buy.venue == VenueKind::Custodial && sell.venue == VenueKind::Custodial {
        steps.push(format!("Transfer {pair} from {} to {}", buy.name, sell.name));
    }

    steps.push(format!("Sell {pair} on {} at ${}", sell.name, usd(sell_price)));
    steps.push("Realize profit from price difference".to_string());
    steps
}

/// Two-decimal rendering for narrative text.
fn usd(value: Decimal) -> String {
    let mut v = value;
    v.rescale(2);
    v.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
