//! Exchange registry.
//!
//! Validates the `[[exchanges]]` entries from the config once at startup
//! and serves O(1) lookups by exchange id for the rest of the process.
//! An invalid entry is a fatal configuration error.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

use crate::config::{decimal_from_config, ExchangeConfig};
use crate::types::{ArbError, ExchangeProfile, VenueKind};

/// Immutable set of known venues, keyed by id.
#[derive(Debug, Clone)]
pub struct ExchangeRegistry {
    profiles: Vec<ExchangeProfile>,
    index: HashMap<String, usize>,
}

impl ExchangeRegistry {
    /// Validate raw config entries and build the registry.
    pub fn from_config(entries: &[ExchangeConfig]) -> Result<Self, ArbError> {
        let profiles = entries
            .iter()
            .map(Self::validate_entry)
            .collect::<Result<Vec<_>, _>>()?;
        let registry = Self::from_profiles(profiles)?;

        info!(
            exchanges = registry.len(),
            on_chain = registry.profiles.iter().filter(|p| p.is_on_chain()).count(),
            "Exchange registry loaded"
        );
        Ok(registry)
    }

    /// Build a registry from already-typed profiles.
    pub fn from_profiles(profiles: Vec<ExchangeProfile>) -> Result<Self, ArbError> {
        if profiles.is_empty() {
            return Err(ArbError::Config("no exchanges configured".into()));
        }

        let mut index = HashMap::with_capacity(profiles.len());
        for (i, profile) in profiles.iter().enumerate() {
            Self::check_profile(profile)?;
            if index.insert(profile.id.clone(), i).is_some() {
                return Err(ArbError::Config(format!("duplicate exchange id: {}", profile.id)));
            }
        }

        Ok(Self { profiles, index })
    }

    fn validate_entry(entry: &ExchangeConfig) -> Result<ExchangeProfile, ArbError> {
        let field = |name: &str| format!("exchanges.{}.{name}", entry.id);

        let network_fee = entry
            .network_fee
            .map(|fee| decimal_from_config(&field("network_fee"), fee))
            .transpose()?;

        Ok(ExchangeProfile {
            id: entry.id.trim().to_string(),
            name: entry.name.clone(),
            venue: entry.venue,
            fee_pct: decimal_from_config(&field("fee_pct"), entry.fee_pct)?,
            network_fee,
            price_bias_pct: decimal_from_config(&field("price_bias_pct"), entry.price_bias_pct)?,
        })
    }

    fn check_profile(profile: &ExchangeProfile) -> Result<(), ArbError> {
        if profile.id.is_empty() {
            return Err(ArbError::Config("exchange id must not be empty".into()));
        }
        if profile.fee_pct < Decimal::ZERO {
            return Err(ArbError::Config(format!(
                "exchange {}: fee_pct must not be negative",
                profile.id
            )));
        }
        match (profile.venue, profile.network_fee) {
            (VenueKind::OnChain, None) => Err(ArbError::Config(format!(
                "exchange {}: on-chain venues require network_fee",
                profile.id
            ))),
            (VenueKind::OnChain, Some(fee)) if fee < Decimal::ZERO => Err(ArbError::Config(
                format!("exchange {}: network_fee must not be negative", profile.id),
            )),
            (VenueKind::Custodial, Some(_)) => Err(ArbError::Config(format!(
                "exchange {}: network_fee is only valid for on-chain venues",
                profile.id
            ))),
            _ => Ok(()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ExchangeProfile> {
        self.index.get(id).map(|&i| &self.profiles[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All profiles in configuration order.
    pub fn profiles(&self) -> &[ExchangeProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(id: &str, venue: VenueKind, fee_pct: f64, network_fee: Option<f64>) -> ExchangeConfig {
        ExchangeConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            venue,
            fee_pct,
            network_fee,
            price_bias_pct: 0.0,
        }
    }

    #[test]
    fn test_from_config_valid() {
        let registry = ExchangeRegistry::from_config(&[
            entry("binance", VenueKind::Custodial, 0.1, None),
            entry("uniswap", VenueKind::OnChain, 0.3, Some(15.0)),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        let uni = registry.get("uniswap").unwrap();
        assert_eq!(uni.fee_pct, dec!(0.3));
        assert_eq!(uni.network_fee, Some(dec!(15)));
        assert_eq!(registry.profiles()[0].id, "binance");
    }

    #[test]
    fn test_unknown_id_is_none() {
        let registry =
            ExchangeRegistry::from_config(&[entry("binance", VenueKind::Custodial, 0.1, None)]).unwrap();
        assert!(registry.get("ftx").is_none());
        assert!(!registry.contains("ftx"));
        assert!(registry.contains("binance"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = ExchangeRegistry::from_config(&[
            entry("binance", VenueKind::Custodial, 0.1, None),
            entry("binance", VenueKind::Custodial, 0.2, None),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_on_chain_requires_network_fee() {
        let err = ExchangeRegistry::from_config(&[entry("uniswap", VenueKind::OnChain, 0.3, None)])
            .unwrap_err();
        assert!(matches!(err, ArbError::Config(_)));
    }

    #[test]
    fn test_custodial_with_network_fee_rejected() {
        let result =
            ExchangeRegistry::from_config(&[entry("binance", VenueKind::Custodial, 0.1, Some(1.0))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_fee_rejected() {
        assert!(ExchangeRegistry::from_config(&[entry("x", VenueKind::Custodial, -0.1, None)]).is_err());
        assert!(ExchangeRegistry::from_config(&[entry("y", VenueKind::OnChain, 0.1, Some(-2.0))]).is_err());
    }

    #[test]
    fn test_non_finite_fee_rejected() {
        assert!(ExchangeRegistry::from_config(&[entry("x", VenueKind::Custodial, f64::INFINITY, None)]).is_err());
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(ExchangeRegistry::from_config(&[]).is_err());
    }

    #[test]
    fn test_blank_id_rejected() {
        assert!(ExchangeRegistry::from_config(&[entry("  ", VenueKind::Custodial, 0.1, None)]).is_err());
    }

    #[test]
    fn test_shipped_config_builds() {
        let cfg = crate::config::AppConfig::load("config.toml").unwrap();
        let registry = ExchangeRegistry::from_config(&cfg.exchanges).unwrap();
        assert_eq!(registry.len(), 7);
        assert_eq!(registry.get("pancakeswap").unwrap().network_fee, Some(dec!(2)));
    }
}
