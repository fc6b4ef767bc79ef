//! # Ledger Interface
//!
//! The fungible-token collaborator the market and vault move value through.
//! Contracts never cache a balance: every reserve read goes to the ledger,
//! so the ledger stays the single source of truth.
//!
//! All methods take `&self`; implementations guard their state internally.
//! Because arguments are explicit, `from` in [`Ledger::transfer`] is the
//! account *initiating* the token call (the `msg.sender` of an ERC-20
//! `transfer`), and `spender` in [`Ledger::transfer_from`] is the account
//! spending an allowance.
//!
//! ## Journal
//!
//! [`Ledger::checkpoint`], [`Ledger::commit`] and [`Ledger::revert`] give a
//! contract call all-or-nothing semantics across every ledger it touches:
//! either the whole body lands or no balance moves.
//!
//! [`TokenLedger`] is the reference implementation used by the simulator and
//! the tests.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::config::{eva_total_supply, EVA_DECIMALS};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures reported by a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The debited account holds less than the amount.
    #[error("insufficient balance: {account} has {balance}, needs {needed}")]
    InsufficientBalance {
        /// Account being debited.
        account: Address,
        /// Its current balance.
        balance: U256,
        /// Amount requested.
        needed: U256,
    },

    /// The spender's allowance is below the amount.
    #[error("insufficient allowance: {spender} may spend {allowance}, needs {needed}")]
    InsufficientAllowance {
        /// Account spending the allowance.
        spender: Address,
        /// Remaining allowance.
        allowance: U256,
        /// Amount requested.
        needed: U256,
    },

    /// Transfers from the zero address are not allowed.
    #[error("invalid sender: {0}")]
    InvalidSender(Address),

    /// Transfers to the zero address are not allowed; use burn.
    #[error("invalid receiver: {0}")]
    InvalidReceiver(Address),

    /// Approvals for the zero address are not allowed.
    #[error("invalid spender: {0}")]
    InvalidSpender(Address),

    /// A credit would push a balance or the supply past 2^256.
    #[error("supply overflow")]
    SupplyOverflow,

    /// The ledger returned `false` instead of moving tokens.
    #[error("transfer rejected by token {token}")]
    TransferRejected {
        /// Address of the ledger that declined the transfer.
        token: Address,
    },
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Opaque journal position returned by [`Ledger::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checkpoint(pub usize);

/// A fungible-token ledger.
pub trait Ledger: Send + Sync {
    /// The ledger's own address.
    fn address(&self) -> Address;

    /// Decimal precision.
    fn decimals(&self) -> u8;

    /// Total supply in raw units.
    fn total_supply(&self) -> U256;

    /// Balance of `account` in raw units.
    fn balance_of(&self, account: Address) -> U256;

    /// Moves `amount` from `from` (the initiating account) to `to`.
    fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<bool, LedgerError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
    /// `spender`'s allowance.
    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, LedgerError>;

    /// Destroys `amount` of `holder`'s balance, reducing total supply.
    fn burn(&self, holder: Address, amount: U256) -> Result<(), LedgerError>;

    /// Opens a journal entry.
    fn checkpoint(&self) -> Checkpoint;

    /// Keeps every change made since `checkpoint`.
    fn commit(&self, checkpoint: Checkpoint);

    /// Discards every change made since `checkpoint`.
    fn revert(&self, checkpoint: Checkpoint);
}

/// [`Ledger::transfer`] that treats a `false` return as a failure.
pub fn safe_transfer(
    ledger: &dyn Ledger,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), LedgerError> {
    if ledger.transfer(from, to, amount)? {
        Ok(())
    } else {
        Err(LedgerError::TransferRejected {
            token: ledger.address(),
        })
    }
}

/// [`Ledger::transfer_from`] that treats a `false` return as a failure.
pub fn safe_transfer_from(
    ledger: &dyn Ledger,
    spender: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), LedgerError> {
    if ledger.transfer_from(spender, from, to, amount)? {
        Ok(())
    } else {
        Err(LedgerError::TransferRejected {
            token: ledger.address(),
        })
    }
}

/// Runs `body` inside one checkpoint per ledger. Changes are committed when
/// `body` succeeds and reverted in reverse order when it fails.
pub fn atomically<T, E>(
    ledgers: &[&dyn Ledger],
    body: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let checkpoints: Vec<(&dyn Ledger, Checkpoint)> =
        ledgers.iter().map(|l| (*l, l.checkpoint())).collect();

    match body() {
        Ok(value) => {
            for (ledger, checkpoint) in checkpoints.into_iter().rev() {
                ledger.commit(checkpoint);
            }
            Ok(value)
        }
        Err(err) => {
            for (ledger, checkpoint) in checkpoints.into_iter().rev() {
                tracing::debug!(token = %ledger.address(), "reverting ledger changes");
                ledger.revert(checkpoint);
            }
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Reference implementation
// ---------------------------------------------------------------------------

/// Balances, allowances and supply of a [`TokenLedger`].
#[derive(Debug, Clone, Default)]
struct TokenState {
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<Address, HashMap<Address, U256>>,
}

impl TokenState {
    fn balance(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(owner)
            .and_then(|a| a.get(spender))
            .copied()
            .unwrap_or_default()
    }

    fn debit(&mut self, account: Address, amount: U256) -> Result<(), LedgerError> {
        let balance = self.balance(&account);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                account,
                balance,
                needed: amount,
            })?;
        self.balances.insert(account, remaining);
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: U256) -> Result<(), LedgerError> {
        let updated = self
            .balance(&account)
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow)?;
        self.balances.insert(account, updated);
        Ok(())
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        if from.is_zero() {
            return Err(LedgerError::InvalidSender(from));
        }
        if to.is_zero() {
            return Err(LedgerError::InvalidReceiver(to));
        }
        self.debit(from, amount)?;
        self.credit(to, amount)
    }
}

/// An in-memory ERC-20 ledger with a fixed genesis supply and burn support.
///
/// The whole initial supply is minted to one holder at construction; after
/// that the supply can only shrink.
#[derive(Debug)]
pub struct TokenLedger {
    address: Address,
    name: String,
    symbol: String,
    decimals: u8,
    state: RwLock<TokenState>,
    journal: Mutex<Vec<TokenState>>,
}

impl TokenLedger {
    /// Creates a token and mints `supply` raw units to `holder`.
    pub fn new(
        address: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        holder: Address,
        supply: U256,
    ) -> Self {
        let mut state = TokenState {
            total_supply: supply,
            ..TokenState::default()
        };
        if !supply.is_zero() {
            state.balances.insert(holder, supply);
        }
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            state: RwLock::new(state),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// The EverValue Coin: 21,000,000 EVA with 18 decimals, minted to `holder`.
    pub fn eva(address: Address, holder: Address) -> Self {
        Self::new(
            address,
            "EverValue Coin",
            "EVA",
            EVA_DECIMALS,
            holder,
            eva_total_supply(),
        )
    }

    /// Token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Sets `spender`'s allowance over `owner`'s balance to `amount`.
    pub fn approve(&self, owner: Address, spender: Address, amount: U256) -> Result<bool, LedgerError> {
        if owner.is_zero() {
            return Err(LedgerError::InvalidSender(owner));
        }
        if spender.is_zero() {
            return Err(LedgerError::InvalidSpender(spender));
        }
        self.state
            .write()
            .allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
        tracing::trace!(token = %self.symbol, %owner, %spender, %amount, "approval");
        Ok(true)
    }

    /// Remaining allowance of `spender` over `owner`'s balance.
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.state.read().allowance(&owner, &spender)
    }
}

impl Ledger for TokenLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn total_supply(&self) -> U256 {
        self.state.read().total_supply
    }

    fn balance_of(&self, account: Address) -> U256 {
        self.state.read().balance(&account)
    }

    fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<bool, LedgerError> {
        self.state.write().move_balance(from, to, amount)?;
        tracing::trace!(token = %self.symbol, %from, %to, %amount, "transfer");
        Ok(true)
    }

    fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<bool, LedgerError> {
        let mut state = self.state.write();
        let allowance = state.allowance(&from, &spender);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                spender,
                allowance,
                needed: amount,
            });
        }
        state.move_balance(from, to, amount)?;
        // An unlimited approval is never consumed.
        if allowance != U256::MAX {
            state
                .allowances
                .entry(from)
                .or_default()
                .insert(spender, allowance - amount);
        }
        tracing::trace!(token = %self.symbol, %spender, %from, %to, %amount, "transfer_from");
        Ok(true)
    }

    fn burn(&self, holder: Address, amount: U256) -> Result<(), LedgerError> {
        if holder.is_zero() {
            return Err(LedgerError::InvalidSender(holder));
        }
        let mut state = self.state.write();
        state.debit(holder, amount)?;
        state.total_supply -= amount;
        tracing::trace!(token = %self.symbol, %holder, %amount, "burn");
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        let mut journal = self.journal.lock();
        journal.push(self.state.read().clone());
        Checkpoint(journal.len() - 1)
    }

    fn commit(&self, checkpoint: Checkpoint) {
        self.journal.lock().truncate(checkpoint.0);
    }

    fn revert(&self, checkpoint: Checkpoint) {
        let mut journal = self.journal.lock();
        if let Some(snapshot) = journal.get(checkpoint.0).cloned() {
            *self.state.write() = snapshot;
        }
        journal.truncate(checkpoint.0);
    }
}
