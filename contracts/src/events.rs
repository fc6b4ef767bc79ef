//! # Contract Events
//!
//! Each successful call emits exactly one event carrying the final,
//! post-normalization and post-fee amounts. Contracts append events to their
//! own log and also hand them back to the caller.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Events emitted by a fixed-rate market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MarketEvent {
    /// A user paid `counter_in` counter-asset for `eva_out` EVA.
    Bought {
        /// Counter-asset pulled from the buyer, in raw units.
        counter_in: U256,
        /// EVA paid out from the market reserve.
        eva_out: U256,
    },
    /// A user paid `eva_in` EVA for `counter_out` counter-asset, net of fee.
    Sold {
        /// Counter-asset paid out from the market reserve.
        counter_out: U256,
        /// EVA pulled from the seller.
        eva_in: U256,
    },
    /// The owner capability moved.
    OwnershipTransferred {
        /// Previous owner; zero at construction.
        previous: Address,
        /// New owner.
        new: Address,
    },
}

/// Events emitted by a burn vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VaultEvent {
    /// `eva_in` EVA was burned in exchange for `backing_out` backing-asset.
    BurnMade {
        /// EVA burned.
        eva_in: U256,
        /// Backing-asset paid out.
        backing_out: U256,
    },
}

impl std::fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketEvent::Bought { counter_in, eva_out } => {
                write!(f, "userBought({counter_in}, {eva_out})")
            }
            MarketEvent::Sold { counter_out, eva_in } => {
                write!(f, "userSold({counter_out}, {eva_in})")
            }
            MarketEvent::OwnershipTransferred { previous, new } => {
                write!(f, "OwnershipTransferred({previous}, {new})")
            }
        }
    }
}

impl std::fmt::Display for VaultEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VaultEvent::BurnMade {
                eva_in,
                backing_out,
            } => write!(f, "burnMade({eva_in}, {backing_out})"),
        }
    }
}
