//! # Scenario Runner
//!
//! Deploys a [`Scenario`] against in-memory ledgers, executes its steps in
//! order and collects a [`RunReport`].
//!
//! Deployment, seed transfers and seed approvals must all succeed; any
//! failure there aborts the run. A failing step is recorded with its error
//! and the run moves on to the next step, unless `fail_fast` is set.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use eva_contracts::ledger::{Ledger, TokenLedger};
use eva_contracts::{BurnVault, FixedRateMarket, MarketEvent, VaultEvent};
use serde::Serialize;

use crate::scenario::{ApprovalSpec, Scenario, Step, TransferSpec};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// An event emitted by one of the scenario's contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContractEvent {
    Market(MarketEvent),
    Vault(VaultEvent),
}

impl std::fmt::Display for ContractEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractEvent::Market(e) => std::fmt::Display::fmt(e, f),
            ContractEvent::Vault(e) => std::fmt::Display::fmt(e, f),
        }
    }
}

/// What a successful step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Emitting contract and event, when the call emits one.
    pub event: Option<(Address, ContractEvent)>,
    /// Human-readable summary.
    pub detail: String,
}

/// The result of one step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// 1-based position in the scenario.
    pub index: usize,
    pub op: &'static str,
    /// The error chain, rendered, when the step failed.
    pub result: Result<Outcome, String>,
}

/// A non-zero balance at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceLine {
    pub symbol: String,
    pub account: Address,
    pub balance: U256,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub name: Option<String>,
    pub steps: Vec<StepReport>,
    pub balances: Vec<BalanceLine>,
}

/// One line of `--events-only` output.
#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    step: usize,
    contract: Address,
    event: &'a ContractEvent,
}

impl RunReport {
    /// Number of failed steps.
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.result.is_err()).count()
    }

    /// Every emitted event in step order, with the step index.
    pub fn events(&self) -> impl Iterator<Item = (usize, Address, &ContractEvent)> {
        self.steps.iter().filter_map(|s| match &s.result {
            Ok(Outcome {
                event: Some((contract, event)),
                ..
            }) => Some((s.index, *contract, event)),
            _ => None,
        })
    }

    /// Writes the report. With `events_only`, writes one JSON object per
    /// emitted event and nothing else.
    pub fn write_to(&self, out: &mut impl Write, events_only: bool) -> std::io::Result<()> {
        if events_only {
            for (step, contract, event) in self.events() {
                let record = EventRecord {
                    step,
                    contract,
                    event,
                };
                serde_json::to_writer(&mut *out, &record)?;
                writeln!(out)?;
            }
            return Ok(());
        }

        if let Some(name) = &self.name {
            writeln!(out, "scenario: {name}")?;
        }
        for step in &self.steps {
            match &step.result {
                Ok(outcome) => match &outcome.event {
                    Some((contract, event)) => writeln!(
                        out,
                        "[{:>3}] {:<18} ok      {} @ {}",
                        step.index, step.op, event, contract
                    )?,
                    None => writeln!(
                        out,
                        "[{:>3}] {:<18} ok      {}",
                        step.index, step.op, outcome.detail
                    )?,
                },
                Err(err) => writeln!(
                    out,
                    "[{:>3}] {:<18} FAILED  {}",
                    step.index, step.op, err
                )?,
            }
        }
        if !self.balances.is_empty() {
            writeln!(out, "final balances:")?;
            for line in &self.balances {
                writeln!(out, "  {:<8} {}  {}", line.symbol, line.account, line.balance)?;
            }
        }
        writeln!(
            out,
            "{} step(s), {} failed",
            self.steps.len(),
            self.failures()
        )
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The deployed ledgers and contracts of one run.
pub struct World {
    tokens: BTreeMap<Address, Arc<TokenLedger>>,
    markets: BTreeMap<Address, FixedRateMarket>,
    vaults: BTreeMap<Address, BurnVault>,
}

impl World {
    /// Mints every token, deploys every contract and applies the seed
    /// transfers and approvals.
    pub fn deploy(scenario: &Scenario) -> Result<Self> {
        let mut world = Self {
            tokens: BTreeMap::new(),
            markets: BTreeMap::new(),
            vaults: BTreeMap::new(),
        };

        for spec in &scenario.tokens {
            if world.tokens.contains_key(&spec.address) {
                anyhow::bail!("duplicate token address {}", spec.address);
            }
            let name = spec.name.clone().unwrap_or_else(|| spec.symbol.clone());
            let ledger = TokenLedger::new(
                spec.address,
                name,
                spec.symbol.clone(),
                spec.decimals,
                spec.holder,
                spec.supply.0,
            );
            tracing::info!(
                token = %spec.address,
                symbol = %spec.symbol,
                decimals = spec.decimals,
                supply = %spec.supply.0,
                "token minted"
            );
            world.tokens.insert(spec.address, Arc::new(ledger));
        }

        for spec in &scenario.markets {
            world.ensure_free(spec.address)?;
            let eva = world.ledger(spec.eva)?;
            let counter = world.ledger(spec.counter)?;
            let market = FixedRateMarket::new(spec.address, spec.owner, eva, counter, spec.params())
                .with_context(|| format!("failed to deploy market {}", spec.address))?;
            world.markets.insert(spec.address, market);
        }

        for spec in &scenario.vaults {
            world.ensure_free(spec.address)?;
            let eva = world.ledger(spec.eva)?;
            let backing = world.ledger(spec.backing)?;
            let vault = BurnVault::new(spec.address, eva, backing)
                .with_context(|| format!("failed to deploy vault {}", spec.address))?;
            world.vaults.insert(spec.address, vault);
        }

        for (i, spec) in scenario.transfers.iter().enumerate() {
            world
                .transfer(spec)
                .with_context(|| format!("seed transfer #{} failed", i + 1))?;
        }
        for (i, spec) in scenario.approvals.iter().enumerate() {
            world
                .approve(spec)
                .with_context(|| format!("seed approval #{} failed", i + 1))?;
        }

        Ok(world)
    }

    /// Executes one step against the deployed contracts.
    pub fn execute(&mut self, step: &Step) -> Result<Outcome> {
        match step {
            Step::Buy {
                market,
                caller,
                amount,
            } => {
                let event = self.market_mut(*market)?.buy(*caller, amount.0)?;
                Ok(market_outcome(*market, event))
            }
            Step::Sell {
                market,
                caller,
                amount,
            } => {
                let event = self.market_mut(*market)?.sell(*caller, amount.0)?;
                Ok(market_outcome(*market, event))
            }
            Step::SetRate {
                market,
                caller,
                rate,
            } => {
                self.market_mut(*market)?.set_rate(*caller, rate.0)?;
                Ok(detail(format!("rate = {}", rate.0)))
            }
            Step::SetFee {
                market,
                caller,
                fee,
            } => {
                self.market_mut(*market)?.set_fee(*caller, *fee)?;
                Ok(detail(format!("fee = {fee}")))
            }
            Step::WithdrawAll { market, caller } => {
                let (eva, counter) = self.market_mut(*market)?.withdraw_all(*caller)?;
                Ok(detail(format!("swept {eva} EVA and {counter} counter-asset")))
            }
            Step::TransferOwnership {
                market,
                caller,
                new_owner,
            } => {
                let event = self
                    .market_mut(*market)?
                    .transfer_ownership(*caller, *new_owner)?;
                Ok(market_outcome(*market, event))
            }
            Step::BackingWithdraw {
                vault,
                caller,
                amount,
            } => {
                let event = self
                    .vaults
                    .get_mut(vault)
                    .with_context(|| format!("unknown vault {vault}"))?
                    .backing_withdraw(*caller, amount.0)?;
                Ok(Outcome {
                    event: Some((*vault, ContractEvent::Vault(event))),
                    detail: String::new(),
                })
            }
            Step::Approve(spec) => {
                self.approve(spec)?;
                Ok(detail(format!("{} may spend {}", spec.spender, spec.amount.0)))
            }
            Step::Transfer(spec) => {
                self.transfer(spec)?;
                Ok(detail(format!("{} -> {}: {}", spec.from, spec.to, spec.amount.0)))
            }
        }
    }

    /// Non-zero balances of `accounts` on every token, token by token.
    pub fn balances(&self, accounts: &BTreeSet<Address>) -> Vec<BalanceLine> {
        let mut lines = Vec::new();
        for ledger in self.tokens.values() {
            for account in accounts {
                let balance = ledger.balance_of(*account);
                if !balance.is_zero() {
                    lines.push(BalanceLine {
                        symbol: ledger.symbol().to_string(),
                        account: *account,
                        balance,
                    });
                }
            }
        }
        lines
    }

    fn token(&self, address: Address) -> Result<&Arc<TokenLedger>> {
        self.tokens
            .get(&address)
            .with_context(|| format!("unknown token {address}"))
    }

    fn ledger(&self, address: Address) -> Result<Arc<dyn Ledger>> {
        let ledger: Arc<dyn Ledger> = self.token(address)?.clone();
        Ok(ledger)
    }

    fn market_mut(&mut self, address: Address) -> Result<&mut FixedRateMarket> {
        self.markets
            .get_mut(&address)
            .with_context(|| format!("unknown market {address}"))
    }

    fn ensure_free(&self, address: Address) -> Result<()> {
        if self.tokens.contains_key(&address)
            || self.markets.contains_key(&address)
            || self.vaults.contains_key(&address)
        {
            anyhow::bail!("address {address} is already deployed");
        }
        Ok(())
    }

    fn transfer(&self, spec: &TransferSpec) -> Result<()> {
        let token = self.token(spec.token)?;
        if !token.transfer(spec.from, spec.to, spec.amount.0)? {
            anyhow::bail!("token {} rejected the transfer", spec.token);
        }
        Ok(())
    }

    fn approve(&self, spec: &ApprovalSpec) -> Result<()> {
        self.token(spec.token)?
            .approve(spec.owner, spec.spender, spec.amount.0)?;
        Ok(())
    }
}

fn market_outcome(market: Address, event: MarketEvent) -> Outcome {
    Outcome {
        event: Some((market, ContractEvent::Market(event))),
        detail: String::new(),
    }
}

fn detail(detail: String) -> Outcome {
    Outcome {
        event: None,
        detail,
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Deploys `scenario` and runs every step.
///
/// # Errors
///
/// Only deployment and seeding failures; step failures are part of the
/// report.
pub fn run(scenario: &Scenario, fail_fast: bool) -> Result<RunReport> {
    let mut world = World::deploy(scenario)?;
    let mut steps = Vec::with_capacity(scenario.steps.len());

    for (i, step) in scenario.steps.iter().enumerate() {
        let index = i + 1;
        let result = world.execute(step).map_err(|e| format!("{e:#}"));
        match &result {
            Ok(_) => tracing::debug!(step = index, op = step.op(), "step ok"),
            Err(err) => tracing::warn!(step = index, op = step.op(), error = %err, "step failed"),
        }
        let failed = result.is_err();
        steps.push(StepReport {
            index,
            op: step.op(),
            result,
        });
        if failed && fail_fast {
            tracing::warn!(step = index, "stopping at first failure");
            break;
        }
    }

    Ok(RunReport {
        name: scenario.name.clone(),
        steps,
        balances: world.balances(&scenario.accounts()),
    })
}
