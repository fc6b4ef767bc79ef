//! # Fixed-Rate Market
//!
//! Swaps a counter-asset for EVA and back at an owner-configured rate.
//! The market holds a reserve of both assets; proceeds of every trade go
//! straight to the owner and never accumulate in the market:
//!
//! - **buy**: counter-asset moves from the buyer to the owner, EVA moves from
//!   the market reserve to the buyer.
//! - **sell**: EVA moves from the seller to the owner, counter-asset (net of
//!   the sell fee) moves from the market reserve to the seller.
//!
//! The EVA reserve therefore only shrinks through `buy` and the owner sweep.
//!
//! ## Rate conventions
//!
//! `rate` is the amount of counter-asset (raw units) paid for `RATE_BASE`
//! raw units of EVA, see [`RateConvention`]. The percent convention
//! (`RATE_BASE = 100`) suits 18- and 6-decimal stablecoins; the precision
//! convention (`RATE_BASE = 10^8`) suits low-decimal assets such as WBTC.
//!
//! ## Call discipline
//!
//! Every guard runs against balances read fresh from the ledgers at the top
//! of the call, before any transfer. Transfers run inside
//! [`atomically`], so a failing leg leaves no partial effect.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::access::{AccessError, Ownable};
use crate::config::{MarketParams, RateConvention, EVA_DECIMALS, FEE_DENOMINATOR};
use crate::events::MarketEvent;
use crate::ledger::{atomically, safe_transfer, safe_transfer_from, Ledger, LedgerError};
use crate::math::{self, MathError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during market construction, trading or admin calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    /// An asset reference is the zero address.
    #[error("cannot set {0} to zero address")]
    ZeroAddress(&'static str),

    /// A rate of zero was supplied.
    #[error("rate must be greater than 0")]
    RateMustBePositive,

    /// A fee of 1000 or more parts-per-thousand was supplied.
    #[error("fee must be lesser than 1000, got {0}")]
    FeeTooHigh(u16),

    /// The buyer holds less counter-asset than they offered.
    #[error("user doesn't have enough balance: has {balance}, offered {needed}")]
    InsufficientCallerBalance {
        /// Buyer's counter-asset balance.
        balance: U256,
        /// Counter-asset offered.
        needed: U256,
    },

    /// The trade would pay out zero after rounding.
    #[error("amount too small")]
    AmountTooSmall,

    /// The market's EVA reserve cannot cover the purchase.
    #[error("market doesn't have enough EVA: reserve {reserve}, needed {needed}")]
    InsufficientMarketReserve {
        /// Market EVA balance.
        reserve: U256,
        /// EVA the buyer would receive.
        needed: U256,
    },

    /// The seller holds less EVA than they offered.
    #[error("user doesn't have enough EVA: has {balance}, offered {needed}")]
    InsufficientCallerEva {
        /// Seller's EVA balance.
        balance: U256,
        /// EVA offered.
        needed: U256,
    },

    /// The market's counter-asset reserve cannot cover the sale.
    #[error("market doesn't have enough balance: reserve {reserve}, needed {needed}")]
    InsufficientMarketCounterReserve {
        /// Market counter-asset balance.
        reserve: U256,
        /// Counter-asset the seller would receive.
        needed: U256,
    },

    /// Owner-only call from another account, or an invalid owner.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Arithmetic overflow in a quote.
    #[error(transparent)]
    Math(#[from] MathError),

    /// A ledger rejected a transfer.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// EVA paid for `counter_in` raw units of counter-asset:
/// `normalize(counter_in, counter_decimals, 18) * RATE_BASE / rate`.
///
/// # Errors
///
/// [`MathError::DivisionByZero`] for a zero rate, [`MathError::Overflow`]
/// when the normalized product does not fit in 256 bits.
pub fn buy_quote(params: &MarketParams, counter_in: U256) -> Result<U256, MathError> {
    let normalized = math::normalize(counter_in, params.counter_decimals, EVA_DECIMALS)?;
    math::mul_div(normalized, params.convention.rate_base(), params.rate)
}

/// Counter-asset paid for `eva_in` raw units of EVA:
/// `normalize(eva_in * rate / RATE_BASE, 18, counter_decimals)` minus the
/// fee, each step flooring.
pub fn sell_quote(params: &MarketParams, eva_in: U256) -> Result<U256, MathError> {
    let gross = math::mul_div(eva_in, params.rate, params.convention.rate_base())?;
    let normalized = math::normalize(gross, EVA_DECIMALS, params.counter_decimals)?;
    math::apply_fee(normalized, params.fee)
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// A fixed-rate exchange between EVA and one counter-asset.
pub struct FixedRateMarket {
    /// The market's own account on both ledgers.
    address: Address,
    eva: Arc<dyn Ledger>,
    counter: Arc<dyn Ledger>,
    convention: RateConvention,
    counter_decimals: u8,
    rate: U256,
    fee: u16,
    ownable: Ownable,
    events: Vec<MarketEvent>,
}

impl FixedRateMarket {
    /// Deploys a market at `address`, owned by `deployer`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::ZeroAddress`] if either ledger sits at the zero
    /// address, [`MarketError::RateMustBePositive`] for a zero rate and
    /// [`MarketError::FeeTooHigh`] for a fee of 1000 or more.
    pub fn new(
        address: Address,
        deployer: Address,
        eva: Arc<dyn Ledger>,
        counter: Arc<dyn Ledger>,
        params: MarketParams,
    ) -> Result<Self, MarketError> {
        if eva.address().is_zero() {
            return Err(MarketError::ZeroAddress("EVA"));
        }
        if counter.address().is_zero() {
            return Err(MarketError::ZeroAddress("market token"));
        }
        if params.rate.is_zero() {
            return Err(MarketError::RateMustBePositive);
        }
        if params.fee >= FEE_DENOMINATOR {
            return Err(MarketError::FeeTooHigh(params.fee));
        }
        let ownable = Ownable::new(deployer)?;

        tracing::info!(
            market = %address,
            eva = %eva.address(),
            counter = %counter.address(),
            convention = %params.convention,
            rate = %params.rate,
            fee = params.fee,
            counter_decimals = params.counter_decimals,
            "market deployed"
        );

        Ok(Self {
            address,
            eva,
            counter,
            convention: params.convention,
            counter_decimals: params.counter_decimals,
            rate: params.rate,
            fee: params.fee,
            ownable,
            events: vec![MarketEvent::OwnershipTransferred {
                previous: Address::ZERO,
                new: deployer,
            }],
        })
    }

    // -- views ---------------------------------------------------------------

    /// The market's own address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.ownable.owner()
    }

    /// Counter-asset raw units per `RATE_BASE` EVA units.
    pub fn rate(&self) -> U256 {
        self.rate
    }

    /// Sell fee in parts-per-thousand.
    pub fn fee(&self) -> u16 {
        self.fee
    }

    /// The rate denominator convention.
    pub fn convention(&self) -> RateConvention {
        self.convention
    }

    /// Precision the counter-asset was declared with at construction.
    pub fn counter_decimals(&self) -> u8 {
        self.counter_decimals
    }

    /// Address of the EVA ledger.
    pub fn eva_token(&self) -> Address {
        self.eva.address()
    }

    /// Address of the counter-asset ledger.
    pub fn counter_token(&self) -> Address {
        self.counter.address()
    }

    /// Live EVA reserve.
    pub fn eva_reserve(&self) -> U256 {
        self.eva.balance_of(self.address)
    }

    /// Live counter-asset reserve.
    pub fn counter_reserve(&self) -> U256 {
        self.counter.balance_of(self.address)
    }

    /// Every event emitted so far, oldest first.
    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    /// The market's current parameters.
    pub fn params(&self) -> MarketParams {
        MarketParams {
            convention: self.convention,
            rate: self.rate,
            fee: self.fee,
            counter_decimals: self.counter_decimals,
        }
    }

    /// EVA paid for `counter_in` raw units of counter-asset, see [`buy_quote`].
    pub fn quote_buy(&self, counter_in: U256) -> Result<U256, MarketError> {
        let eva_out = buy_quote(&self.params(), counter_in)?;
        tracing::debug!(%counter_in, %eva_out, "buy quote");
        Ok(eva_out)
    }

    /// Counter-asset paid, net of fee, for `eva_in` raw units of EVA, see
    /// [`sell_quote`].
    pub fn quote_sell(&self, eva_in: U256) -> Result<U256, MarketError> {
        let counter_out = sell_quote(&self.params(), eva_in)?;
        tracing::debug!(%eva_in, %counter_out, "sell quote");
        Ok(counter_out)
    }

    // -- trading -------------------------------------------------------------

    /// Buys EVA with `counter_in` raw units of counter-asset.
    ///
    /// The caller must have approved the market for `counter_in` on the
    /// counter-asset ledger.
    ///
    /// # Errors
    ///
    /// In guard order: [`MarketError::InsufficientCallerBalance`],
    /// [`MarketError::AmountTooSmall`], [`MarketError::InsufficientMarketReserve`].
    /// Ledger failures surface as [`MarketError::Ledger`].
    pub fn buy(&mut self, caller: Address, counter_in: U256) -> Result<MarketEvent, MarketError> {
        let balance = self.counter.balance_of(caller);
        if balance < counter_in {
            tracing::debug!(%caller, %balance, %counter_in, "buy rejected: caller balance");
            return Err(MarketError::InsufficientCallerBalance {
                balance,
                needed: counter_in,
            });
        }

        let eva_out = self.quote_buy(counter_in)?;
        if eva_out.is_zero() {
            return Err(MarketError::AmountTooSmall);
        }

        let reserve = self.eva_reserve();
        if reserve < eva_out {
            tracing::debug!(%reserve, %eva_out, "buy rejected: eva reserve");
            return Err(MarketError::InsufficientMarketReserve {
                reserve,
                needed: eva_out,
            });
        }

        let owner = self.owner();
        let (counter, eva) = (self.counter.as_ref(), self.eva.as_ref());
        atomically(&[counter, eva], || -> Result<(), MarketError> {
            safe_transfer_from(counter, self.address, caller, owner, counter_in)?;
            safe_transfer(eva, self.address, caller, eva_out)?;
            Ok(())
        })?;

        tracing::info!(market = %self.address, %caller, %counter_in, %eva_out, "user bought");
        Ok(self.emit(MarketEvent::Bought {
            counter_in,
            eva_out,
        }))
    }

    /// Sells `eva_in` raw units of EVA for counter-asset, net of fee.
    ///
    /// The caller must have approved the market for `eva_in` on the EVA
    /// ledger. The EVA goes to the owner, not to the market reserve.
    ///
    /// # Errors
    ///
    /// In guard order: [`MarketError::InsufficientCallerEva`],
    /// [`MarketError::AmountTooSmall`],
    /// [`MarketError::InsufficientMarketCounterReserve`].
    pub fn sell(&mut self, caller: Address, eva_in: U256) -> Result<MarketEvent, MarketError> {
        let balance = self.eva.balance_of(caller);
        if balance < eva_in {
            tracing::debug!(%caller, %balance, %eva_in, "sell rejected: caller balance");
            return Err(MarketError::InsufficientCallerEva {
                balance,
                needed: eva_in,
            });
        }

        let counter_out = self.quote_sell(eva_in)?;
        if counter_out.is_zero() {
            return Err(MarketError::AmountTooSmall);
        }

        let reserve = self.counter_reserve();
        if reserve < counter_out {
            tracing::debug!(%reserve, %counter_out, "sell rejected: counter reserve");
            return Err(MarketError::InsufficientMarketCounterReserve {
                reserve,
                needed: counter_out,
            });
        }

        let owner = self.owner();
        let (counter, eva) = (self.counter.as_ref(), self.eva.as_ref());
        atomically(&[eva, counter], || -> Result<(), MarketError> {
            safe_transfer_from(eva, self.address, caller, owner, eva_in)?;
            safe_transfer(counter, self.address, caller, counter_out)?;
            Ok(())
        })?;

        tracing::info!(market = %self.address, %caller, %eva_in, %counter_out, "user sold");
        Ok(self.emit(MarketEvent::Sold {
            counter_out,
            eva_in,
        }))
    }

    // -- owner operations ----------------------------------------------------

    /// Replaces the rate.
    pub fn set_rate(&mut self, caller: Address, rate: U256) -> Result<(), MarketError> {
        self.ownable.ensure_owner(caller)?;
        if rate.is_zero() {
            return Err(MarketError::RateMustBePositive);
        }
        tracing::info!(market = %self.address, old = %self.rate, new = %rate, "rate updated");
        self.rate = rate;
        Ok(())
    }

    /// Replaces the sell fee.
    pub fn set_fee(&mut self, caller: Address, fee: u16) -> Result<(), MarketError> {
        self.ownable.ensure_owner(caller)?;
        if fee >= FEE_DENOMINATOR {
            return Err(MarketError::FeeTooHigh(fee));
        }
        tracing::info!(market = %self.address, old = self.fee, new = fee, "fee updated");
        self.fee = fee;
        Ok(())
    }

    /// Sweeps both reserves to the owner. Returns `(eva, counter)` swept.
    pub fn withdraw_all(&mut self, caller: Address) -> Result<(U256, U256), MarketError> {
        self.ownable.ensure_owner(caller)?;

        let owner = self.owner();
        let (counter, eva) = (self.counter.as_ref(), self.eva.as_ref());
        let swept = atomically(&[eva, counter], || -> Result<(U256, U256), MarketError> {
            let eva_amount = eva.balance_of(self.address);
            safe_transfer(eva, self.address, owner, eva_amount)?;
            // Re-read after the first leg in case both references share a ledger.
            let counter_amount = counter.balance_of(self.address);
            safe_transfer(counter, self.address, owner, counter_amount)?;
            Ok((eva_amount, counter_amount))
        })?;

        tracing::info!(
            market = %self.address,
            eva = %swept.0,
            counter = %swept.1,
            "reserves withdrawn"
        );
        Ok(swept)
    }

    /// Hands the owner capability to `new_owner`.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<MarketEvent, MarketError> {
        let previous = self.ownable.transfer_ownership(caller, new_owner)?;
        tracing::info!(market = %self.address, %previous, new = %new_owner, "ownership transferred");
        Ok(self.emit(MarketEvent::OwnershipTransferred {
            previous,
            new: new_owner,
        }))
    }

    fn emit(&mut self, event: MarketEvent) -> MarketEvent {
        self.events.push(event.clone());
        event
    }
}

impl std::fmt::Debug for FixedRateMarket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedRateMarket")
            .field("address", &self.address)
            .field("eva", &self.eva.address())
            .field("counter", &self.counter.address())
            .field("convention", &self.convention)
            .field("counter_decimals", &self.counter_decimals)
            .field("rate", &self.rate)
            .field("fee", &self.fee)
            .field("owner", &self.ownable.owner())
            .finish()
    }
}
