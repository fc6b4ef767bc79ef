//! # CLI Interface
//!
//! Defines the command-line argument structure for `eva` using `clap`
//! derive. Supports three subcommands: `run`, `quote`, and `version`.

use alloy_primitives::U256;
use clap::{Parser, Subcommand, ValueEnum};
use eva_contracts::config::{
    RateConvention, DEFAULT_COUNTER_DECIMALS, DEFAULT_FEE, DEFAULT_PERCENT_RATE,
};
use std::path::PathBuf;

use crate::scenario::parse_amount;

/// EVA contract simulator.
///
/// Runs the fixed-rate market and burn vault against in-memory ledgers.
/// Nothing here talks to a network.
#[derive(Parser, Debug)]
#[command(
    name = "eva",
    about = "EVA market and burn-vault simulator",
    version,
    propagate_version = true
)]
pub struct EvaCli {
    /// Log output format: `pretty` or `json`. Logs go to stderr.
    #[arg(long, global = true, env = "EVA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `eva` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a JSON scenario and print every step's outcome.
    Run(RunArgs),
    /// Price a single buy or sell without any ledger.
    Quote(QuoteArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the scenario file (JSON).
    #[arg(env = "EVA_SCENARIO")]
    pub scenario: PathBuf,

    /// Print only the emitted events, one JSON object per line.
    #[arg(long)]
    pub events_only: bool,

    /// Stop at the first failing step and exit non-zero.
    #[arg(long)]
    pub fail_fast: bool,
}

/// Trade direction for `quote`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Counter-asset in, EVA out.
    Buy,
    /// EVA in, counter-asset out (net of fee).
    Sell,
}

/// Rate convention for `quote`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConventionArg {
    /// `rate` counter units per 100 EVA units.
    PerHundredEva,
    /// `rate` counter units per 10^8 EVA units.
    PerPrecisionUnit,
}

impl From<ConventionArg> for RateConvention {
    fn from(arg: ConventionArg) -> Self {
        match arg {
            ConventionArg::PerHundredEva => RateConvention::PerHundredEva,
            ConventionArg::PerPrecisionUnit => RateConvention::PerPrecisionUnit,
        }
    }
}

/// Arguments for the `quote` subcommand.
#[derive(Parser, Debug)]
pub struct QuoteArgs {
    /// Which side of the market to price.
    #[arg(value_enum)]
    pub side: Side,

    /// Amount in raw units of the input asset (decimal or 0x-hex).
    #[arg(value_parser = parse_amount)]
    pub amount: U256,

    /// Counter-asset raw units per `RATE_BASE` EVA units.
    #[arg(long, value_parser = parse_amount, default_value_t = U256::from(DEFAULT_PERCENT_RATE))]
    pub rate: U256,

    /// Sell fee in parts-per-thousand.
    #[arg(long, default_value_t = DEFAULT_FEE)]
    pub fee: u16,

    /// Denominator the rate is expressed against.
    #[arg(long, value_enum, default_value_t = ConventionArg::PerHundredEva)]
    pub convention: ConventionArg,

    /// Decimal precision of the counter-asset.
    #[arg(long, default_value_t = DEFAULT_COUNTER_DECIMALS)]
    pub counter_decimals: u8,
}
