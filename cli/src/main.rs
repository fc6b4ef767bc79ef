// Copyright (c) 2026 EverValue Contributors. MIT License.
// See LICENSE for details.

//! # EVA Simulator
//!
//! Entry point for the `eva` binary. Parses CLI arguments, initializes
//! logging, and dispatches to a subcommand:
//!
//! - `run`: execute a JSON scenario against in-memory ledgers
//! - `quote`: price a single buy or sell from rate, fee and decimals
//! - `version`: print build version information

mod cli;
mod logging;
mod runner;
mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;

use eva_contracts::config::{eva_total_supply, FEE_DENOMINATOR};
use eva_contracts::market::{buy_quote, sell_quote};
use eva_contracts::MarketParams;

use cli::{Commands, EvaCli, Side};
use logging::LogFormat;
use scenario::Scenario;

fn main() -> Result<()> {
    let cli = EvaCli::parse();
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&cli.log_format),
    );

    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::Quote(args) => quote(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads, executes and reports a scenario.
fn run_scenario(args: cli::RunArgs) -> Result<()> {
    let scenario = Scenario::from_path(&args.scenario)?;
    tracing::info!(
        path = %args.scenario.display(),
        tokens = scenario.tokens.len(),
        markets = scenario.markets.len(),
        vaults = scenario.vaults.len(),
        steps = scenario.steps.len(),
        "running scenario"
    );

    let report = runner::run(&scenario, args.fail_fast)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report
        .write_to(&mut out, args.events_only)
        .context("failed to write report")?;
    out.flush().context("failed to flush report")?;

    let failures = report.failures();
    if args.fail_fast && failures > 0 {
        anyhow::bail!("scenario stopped after {failures} failed step(s)");
    }
    Ok(())
}

/// Prices one trade with the market formulas and no ledger.
fn quote(args: cli::QuoteArgs) -> Result<()> {
    let params = MarketParams {
        convention: args.convention.into(),
        rate: args.rate,
        fee: args.fee,
        counter_decimals: args.counter_decimals,
    };

    let out = match args.side {
        Side::Buy => buy_quote(&params, args.amount).context("buy quote failed")?,
        Side::Sell => sell_quote(&params, args.amount).context("sell quote failed")?,
    };

    let (input, output) = match args.side {
        Side::Buy => ("counter-asset", "EVA"),
        Side::Sell => ("EVA", "counter-asset"),
    };
    println!("{:<12} {:?}", "side", args.side);
    println!("{:<12} {} {}", "in", args.amount, input);
    println!("{:<12} {} {}", "out", out, output);
    println!("{:<12} {} ({})", "rate", params.rate, params.convention);
    println!("{:<12} {}/{}", "fee", params.fee, FEE_DENOMINATOR);
    println!("{:<12} {}", "decimals", params.counter_decimals);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("eva            {}", env!("CARGO_PKG_VERSION"));
    println!("eva supply     {}", eva_total_supply());
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
