//! # Contract Configuration & Constants
//!
//! Every fixed number the EVA contracts rely on lives here, together with
//! the constructor parameter shapes used when a market is deployed.
//!
//! The defaults mirror the live deployments: the USDT market quotes 35 units
//! of counter-asset per 100 EVA with a 1% sell fee, and the WBTC market
//! quotes 443 satoshi per precision unit of EVA.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Precision
// ---------------------------------------------------------------------------

/// EVA is an 18-decimal token. All market math normalizes into this precision.
pub const EVA_DECIMALS: u8 = 18;

/// Counter-asset precision assumed when a deployment does not state one.
pub const DEFAULT_COUNTER_DECIMALS: u8 = 18;

/// Largest exponent for which `10^n` still fits in a `U256`.
pub const MAX_POW10_EXPONENT: u8 = 77;

// ---------------------------------------------------------------------------
// Rates & Fees
// ---------------------------------------------------------------------------

/// Fees are expressed in parts-per-thousand. 10 = 1%.
pub const FEE_DENOMINATOR: u16 = 1000;

/// Rate denominator for the "counter-asset per 100 EVA" convention.
pub const PERCENT_RATE_BASE: u64 = 100;

/// Rate denominator for the "counter-asset per precision unit" convention.
/// Used for low-decimal assets such as WBTC, where a per-100 quote would
/// round most trades to nothing.
pub const PRECISION_RATE_BASE: u64 = 100_000_000;

/// Default rate of the percent market: 35 counter units per 100 EVA.
pub const DEFAULT_PERCENT_RATE: u64 = 35;

/// Default rate of the precision market: 443 counter units per 10^8 EVA units.
pub const DEFAULT_PRECISION_RATE: u64 = 443;

/// Default sell fee, in parts-per-thousand.
pub const DEFAULT_FEE: u16 = 10;

// ---------------------------------------------------------------------------
// Supply
// ---------------------------------------------------------------------------

/// Whole EVA tokens minted at genesis.
pub const EVA_GENESIS_TOKENS: u64 = 21_000_000;

/// EVA total supply in raw units (21,000,000 x 10^18).
pub fn eva_total_supply() -> U256 {
    U256::from(EVA_GENESIS_TOKENS) * U256::from(10u64).pow(U256::from(EVA_DECIMALS))
}

// ---------------------------------------------------------------------------
// Market parameters
// ---------------------------------------------------------------------------

/// Which denominator a market's `rate` is expressed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateConvention {
    /// `rate` counter-asset units buy 100 EVA units.
    PerHundredEva,
    /// `rate` counter-asset units buy [`PRECISION_RATE_BASE`] EVA units.
    PerPrecisionUnit,
}

impl RateConvention {
    /// The `RATE_BASE` denominator for this convention.
    pub fn rate_base(self) -> U256 {
        match self {
            RateConvention::PerHundredEva => U256::from(PERCENT_RATE_BASE),
            RateConvention::PerPrecisionUnit => U256::from(PRECISION_RATE_BASE),
        }
    }
}

impl std::fmt::Display for RateConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateConvention::PerHundredEva => write!(f, "per-100-eva"),
            RateConvention::PerPrecisionUnit => write!(f, "per-precision-unit"),
        }
    }
}

/// Constructor arguments of a fixed-rate market, minus the two asset
/// references. Validation happens in the market constructor, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    /// Rate denominator convention.
    pub convention: RateConvention,
    /// Counter-asset raw units per `RATE_BASE` EVA units.
    pub rate: U256,
    /// Sell fee in parts-per-thousand.
    pub fee: u16,
    /// Precision of the counter-asset.
    #[serde(default = "default_counter_decimals")]
    pub counter_decimals: u8,
}

impl MarketParams {
    /// Parameters of a percent-convention market with 18-decimal counter-asset.
    pub fn per_hundred(rate: u64, fee: u16) -> Self {
        Self {
            convention: RateConvention::PerHundredEva,
            rate: U256::from(rate),
            fee,
            counter_decimals: DEFAULT_COUNTER_DECIMALS,
        }
    }

    /// Parameters of a precision-convention market with 18-decimal counter-asset.
    pub fn per_precision_unit(rate: u64, fee: u16) -> Self {
        Self {
            convention: RateConvention::PerPrecisionUnit,
            rate: U256::from(rate),
            fee,
            counter_decimals: DEFAULT_COUNTER_DECIMALS,
        }
    }

    /// Overrides the counter-asset precision.
    pub fn with_counter_decimals(mut self, decimals: u8) -> Self {
        self.counter_decimals = decimals;
        self
    }
}

impl Default for MarketParams {
    fn default() -> Self {
        Self::per_hundred(DEFAULT_PERCENT_RATE, DEFAULT_FEE)
    }
}

const fn default_counter_decimals() -> u8 {
    DEFAULT_COUNTER_DECIMALS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_supply_is_21_million_tokens() {
        let expected = U256::from(21_000_000u64) * U256::from(1_000_000_000_000_000_000u64);
        assert_eq!(eva_total_supply(), expected);
    }

    #[test]
    fn rate_bases_match_conventions() {
        assert_eq!(RateConvention::PerHundredEva.rate_base(), U256::from(100u64));
        assert_eq!(
            RateConvention::PerPrecisionUnit.rate_base(),
            U256::from(100_000_000u64)
        );
    }

    #[test]
    fn default_params_follow_live_deployment() {
        let params = MarketParams::default();
        assert_eq!(params.rate, U256::from(35u64));
        assert_eq!(params.fee, 10);
        assert_eq!(params.convention, RateConvention::PerHundredEva);
    }

    #[test]
    fn omitted_counter_decimals_deserialize_as_eighteen() {
        let params: MarketParams = serde_json::from_str(
            r#"{ "convention": "per_precision_unit", "rate": "0x1bb", "fee": 10 }"#,
        )
        .unwrap();
        assert_eq!(params.counter_decimals, 18);
        assert_eq!(params, MarketParams::per_precision_unit(443, 10));
    }
}
