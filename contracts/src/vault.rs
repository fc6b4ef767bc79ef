//! # Burn Vault
//!
//! Holds a reserve of one backing asset and lets any EVA holder retire EVA
//! for a pro-rata share of it:
//!
//! ```text
//! payout = floor(eva_in * backing_reserve / eva_total_supply)
//! ```
//!
//! The share is computed against the supply *before* the caller's own burn,
//! and the burn lands in the same call, so every later redeemer divides by
//! a smaller supply. The vault has no owner and no configuration.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::events::VaultEvent;
use crate::ledger::{atomically, safe_transfer, safe_transfer_from, Ledger, LedgerError};
use crate::math::{self, MathError};

/// Errors that can occur during vault construction or redemption.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// An asset reference is the zero address.
    #[error("cannot set {0} to zero address")]
    ZeroAddress(&'static str),

    /// EVA total supply is zero, so no share can be computed.
    #[error("unable to withdraw with 0 total supply of EVA tokens")]
    NoSupply,

    /// The share rounds to zero, or the vault is empty.
    #[error("nothing to withdraw")]
    NothingToWithdraw,

    /// Arithmetic overflow in the share computation.
    #[error(transparent)]
    Math(#[from] MathError),

    /// A ledger rejected a transfer or the burn.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// EVA burn-for-backing redemption vault.
pub struct BurnVault {
    address: Address,
    eva: Arc<dyn Ledger>,
    backing: Arc<dyn Ledger>,
    events: Vec<VaultEvent>,
}

impl BurnVault {
    /// Deploys a vault at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ZeroAddress`] if either ledger sits at the zero
    /// address.
    pub fn new(
        address: Address,
        eva: Arc<dyn Ledger>,
        backing: Arc<dyn Ledger>,
    ) -> Result<Self, VaultError> {
        if eva.address().is_zero() {
            return Err(VaultError::ZeroAddress("EVA"));
        }
        if backing.address().is_zero() {
            return Err(VaultError::ZeroAddress("backing asset"));
        }
        tracing::info!(
            vault = %address,
            eva = %eva.address(),
            backing = %backing.address(),
            "burn vault deployed"
        );
        Ok(Self {
            address,
            eva,
            backing,
            events: Vec::new(),
        })
    }

    /// The vault's own address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Address of the EVA ledger.
    pub fn eva_token(&self) -> Address {
        self.eva.address()
    }

    /// Address of the backing-asset ledger.
    pub fn backing_token(&self) -> Address {
        self.backing.address()
    }

    /// Live backing-asset reserve.
    pub fn backing_reserve(&self) -> U256 {
        self.backing.balance_of(self.address)
    }

    /// Every event emitted so far, oldest first.
    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Backing-asset a burn of `eva_in` would pay against current state.
    ///
    /// # Errors
    ///
    /// [`VaultError::NoSupply`] when EVA supply is zero. A zero share is
    /// returned as `Ok(0)`; only [`backing_withdraw`](Self::backing_withdraw)
    /// rejects it.
    pub fn quote_withdraw(&self, eva_in: U256) -> Result<U256, VaultError> {
        let supply = self.eva.total_supply();
        if supply.is_zero() {
            return Err(VaultError::NoSupply);
        }
        let reserve = self.backing_reserve();
        Ok(math::mul_div(eva_in, reserve, supply)?)
    }

    /// Burns `eva_in` of the caller's EVA and pays out the pro-rata backing.
    ///
    /// The caller must have approved the vault for `eva_in` on the EVA ledger.
    ///
    /// # Errors
    ///
    /// [`VaultError::NoSupply`], then [`VaultError::NothingToWithdraw`];
    /// ledger failures (missing balance or allowance) surface as
    /// [`VaultError::Ledger`] with no tokens moved.
    pub fn backing_withdraw(
        &mut self,
        caller: Address,
        eva_in: U256,
    ) -> Result<VaultEvent, VaultError> {
        let payout = self.quote_withdraw(eva_in)?;
        if payout.is_zero() {
            tracing::debug!(%caller, %eva_in, "withdraw rejected: zero share");
            return Err(VaultError::NothingToWithdraw);
        }

        let (eva, backing) = (self.eva.as_ref(), self.backing.as_ref());
        atomically(&[eva, backing], || -> Result<(), VaultError> {
            safe_transfer_from(eva, self.address, caller, self.address, eva_in)?;
            eva.burn(self.address, eva_in)?;
            safe_transfer(backing, self.address, caller, payout)?;
            Ok(())
        })?;

        tracing::info!(vault = %self.address, %caller, %eva_in, %payout, "burn made");
        let event = VaultEvent::BurnMade {
            eva_in,
            backing_out: payout,
        };
        self.events.push(event.clone());
        Ok(event)
    }
}

impl std::fmt::Debug for BurnVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BurnVault")
            .field("address", &self.address)
            .field("eva", &self.eva.address())
            .field("backing", &self.backing.address())
            .finish()
    }
}
