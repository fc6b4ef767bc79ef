// Copyright (c) 2026 EverValue Contributors. MIT License.
// See LICENSE for details.

//! # EVA Contracts
//!
//! The two on-chain primitives built around the EVA token:
//!
//! - **Fixed-Rate Market**: swaps a counter-asset for EVA and back at an
//!   owner-set rate and sell fee, normalizing between decimal precisions.
//! - **Burn Vault**: lets any EVA holder permanently retire EVA for a
//!   proportional share of a backing-asset reserve.
//!
//! Both consume token ledgers through the [`ledger::Ledger`] trait, so any
//! implementation (the in-memory [`ledger::TokenLedger`], or a deliberately
//! misbehaving test double) can be injected.
//!
//! ## Design Principles
//!
//! 1. All amounts are `U256`. Products are checked before every division,
//!    because 21,000,000 x 10^18 times a reserve does not fit in 128 bits.
//! 2. Every guard is a named error variant, checked before any transfer.
//! 3. Reserves are never cached: balances are read from the ledger at the
//!    top of each call.
//! 4. A call either lands completely or moves nothing.

pub mod access;
pub mod config;
pub mod events;
pub mod ledger;
pub mod market;
pub mod math;
pub mod vault;

pub use access::{AccessError, Ownable};
pub use config::{MarketParams, RateConvention};
pub use events::{MarketEvent, VaultEvent};
pub use ledger::{Ledger, LedgerError, TokenLedger};
pub use market::{FixedRateMarket, MarketError};
pub use math::MathError;
pub use vault::{BurnVault, VaultError};
