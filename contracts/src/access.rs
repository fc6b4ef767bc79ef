//! # Single-Owner Access Control
//!
//! One account holds the capability to reconfigure a contract and sweep
//! its reserves. The check is an explicit guard at the top of each
//! privileged operation: there is no role hierarchy and no multi-sig.

use alloy_primitives::Address;
use thiserror::Error;

/// Access-control failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The caller is not the owner.
    #[error("unauthorized account: {caller}")]
    Unauthorized {
        /// The account that attempted the privileged call.
        caller: Address,
    },

    /// Ownership cannot be handed to the zero address.
    #[error("invalid owner: {0}")]
    InvalidOwner(Address),
}

/// The owner capability of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownable {
    owner: Address,
}

impl Ownable {
    /// Grants ownership to `owner`, normally the deploying account.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InvalidOwner`] for the zero address.
    pub fn new(owner: Address) -> Result<Self, AccessError> {
        if owner.is_zero() {
            return Err(AccessError::InvalidOwner(owner));
        }
        Ok(Self { owner })
    }

    /// The current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Fails unless `caller` is the owner.
    pub fn ensure_owner(&self, caller: Address) -> Result<(), AccessError> {
        if caller != self.owner {
            return Err(AccessError::Unauthorized { caller });
        }
        Ok(())
    }

    /// Hands ownership to `new_owner` and returns the previous owner.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Unauthorized`] if `caller` is not the owner,
    /// or [`AccessError::InvalidOwner`] if `new_owner` is the zero address.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<Address, AccessError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(AccessError::InvalidOwner(new_owner));
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        Ok(previous)
    }
}
