//! # Scenario Files
//!
//! A scenario is a JSON document describing a local deployment and an
//! ordered list of calls against it:
//!
//! ```json
//! {
//!   "name": "usdt market",
//!   "tokens":    [{ "address": "0x…e01", "symbol": "EVA", "decimals": 18,
//!                   "supply": "21000000000000000000000000", "holder": "0x…a01" }],
//!   "markets":   [{ "address": "0x…f01", "owner": "0x…a01", "eva": "0x…e01",
//!                   "counter": "0x…e02", "rate": "35", "fee": 10 }],
//!   "vaults":    [{ "address": "0x…f03", "eva": "0x…e01", "backing": "0x…e03" }],
//!   "transfers": [{ "token": "0x…e01", "from": "0x…a01", "to": "0x…f01", "amount": "1000000" }],
//!   "approvals": [{ "token": "0x…e02", "owner": "0x…b01", "spender": "0x…f01", "amount": "max" }],
//!   "steps":     [{ "op": "buy", "market": "0x…f01", "caller": "0x…b01", "amount": "1000" }]
//! }
//! ```
//!
//! Amounts are strings (decimal, `0x` hex, or `max`) so 256-bit values
//! survive JSON. Small amounts may also be given as plain numbers.

use std::collections::BTreeSet;
use std::path::Path;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use eva_contracts::config::{MarketParams, RateConvention, DEFAULT_COUNTER_DECIMALS};
use serde::Deserialize;

/// A raw token amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "AmountRepr")]
pub struct Amount(pub U256);

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Number(u64),
}

impl TryFrom<AmountRepr> for Amount {
    type Error = String;

    fn try_from(repr: AmountRepr) -> Result<Self, Self::Error> {
        match repr {
            AmountRepr::Text(text) => parse_amount(&text).map(Amount),
            AmountRepr::Number(n) => Ok(Amount(U256::from(n))),
        }
    }
}

/// Parses a decimal, `0x`-prefixed hex, or `max` amount. Underscores are
/// ignored.
pub fn parse_amount(input: &str) -> Result<U256, String> {
    let cleaned: String = input.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err("empty amount".to_string());
    }
    if cleaned.eq_ignore_ascii_case("max") {
        return Ok(U256::MAX);
    }
    let parsed = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(&cleaned, 10),
    };
    parsed.map_err(|e| format!("invalid amount {input:?}: {e}"))
}

/// A whole scenario document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Free-form label printed in the report header.
    #[serde(default)]
    pub name: Option<String>,
    pub tokens: Vec<TokenSpec>,
    #[serde(default)]
    pub markets: Vec<MarketSpec>,
    #[serde(default)]
    pub vaults: Vec<VaultSpec>,
    /// Applied before the first step; a failure here aborts the run.
    #[serde(default)]
    pub transfers: Vec<TransferSpec>,
    /// Applied after `transfers`; a failure here aborts the run.
    #[serde(default)]
    pub approvals: Vec<ApprovalSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A token ledger whose whole supply is minted to `holder`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSpec {
    pub address: Address,
    /// Defaults to the symbol.
    #[serde(default)]
    pub name: Option<String>,
    pub symbol: String,
    pub decimals: u8,
    pub supply: Amount,
    pub holder: Address,
}

/// A fixed-rate market deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketSpec {
    pub address: Address,
    /// Deployer, and therefore initial owner.
    pub owner: Address,
    pub eva: Address,
    pub counter: Address,
    #[serde(default = "default_convention")]
    pub convention: RateConvention,
    pub rate: Amount,
    pub fee: u16,
    #[serde(default = "default_counter_decimals")]
    pub counter_decimals: u8,
}

fn default_convention() -> RateConvention {
    RateConvention::PerHundredEva
}

fn default_counter_decimals() -> u8 {
    DEFAULT_COUNTER_DECIMALS
}

impl MarketSpec {
    /// Constructor parameters for [`eva_contracts::FixedRateMarket::new`].
    pub fn params(&self) -> MarketParams {
        MarketParams {
            convention: self.convention,
            rate: self.rate.0,
            fee: self.fee,
            counter_decimals: self.counter_decimals,
        }
    }
}

/// A burn vault deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultSpec {
    pub address: Address,
    pub eva: Address,
    pub backing: Address,
}

/// A plain token transfer initiated by `from`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferSpec {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
}

/// An allowance set by `owner` for `spender`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalSpec {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
}

/// One call in the scenario, tagged by `op`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Buy {
        market: Address,
        caller: Address,
        amount: Amount,
    },
    Sell {
        market: Address,
        caller: Address,
        amount: Amount,
    },
    SetRate {
        market: Address,
        caller: Address,
        rate: Amount,
    },
    SetFee {
        market: Address,
        caller: Address,
        fee: u16,
    },
    WithdrawAll {
        market: Address,
        caller: Address,
    },
    TransferOwnership {
        market: Address,
        caller: Address,
        new_owner: Address,
    },
    BackingWithdraw {
        vault: Address,
        caller: Address,
        amount: Amount,
    },
    Approve(ApprovalSpec),
    Transfer(TransferSpec),
}

impl Step {
    /// The `op` tag this step was parsed from.
    pub fn op(&self) -> &'static str {
        match self {
            Step::Buy { .. } => "buy",
            Step::Sell { .. } => "sell",
            Step::SetRate { .. } => "set_rate",
            Step::SetFee { .. } => "set_fee",
            Step::WithdrawAll { .. } => "withdraw_all",
            Step::TransferOwnership { .. } => "transfer_ownership",
            Step::BackingWithdraw { .. } => "backing_withdraw",
            Step::Approve(_) => "approve",
            Step::Transfer(_) => "transfer",
        }
    }

    fn accounts(&self) -> Vec<Address> {
        match self {
            Step::Buy { caller, .. }
            | Step::Sell { caller, .. }
            | Step::SetRate { caller, .. }
            | Step::SetFee { caller, .. }
            | Step::WithdrawAll { caller, .. }
            | Step::BackingWithdraw { caller, .. } => vec![*caller],
            Step::TransferOwnership {
                caller, new_owner, ..
            } => vec![*caller, *new_owner],
            Step::Approve(a) => vec![a.owner],
            Step::Transfer(t) => vec![t.from, t.to],
        }
    }
}

impl Scenario {
    /// Reads and parses a scenario file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Parses a scenario document.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Every account the scenario mentions, in address order. Final
    /// balances are reported for these.
    pub fn accounts(&self) -> BTreeSet<Address> {
        let mut accounts = BTreeSet::new();
        accounts.extend(self.tokens.iter().map(|t| t.holder));
        for m in &self.markets {
            accounts.insert(m.address);
            accounts.insert(m.owner);
        }
        accounts.extend(self.vaults.iter().map(|v| v.address));
        for t in &self.transfers {
            accounts.insert(t.from);
            accounts.insert(t.to);
        }
        accounts.extend(self.approvals.iter().map(|a| a.owner));
        accounts.extend(self.steps.iter().flat_map(Step::accounts));
        accounts
    }
}
