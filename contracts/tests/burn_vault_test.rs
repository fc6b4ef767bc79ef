//! Integration tests for the burn vault.

use std::sync::Arc;

use alloy_primitives::{address, Address, U256};
use eva_contracts::config::eva_total_supply;
use eva_contracts::ledger::{Ledger, LedgerError, TokenLedger};
use eva_contracts::vault::{BurnVault, VaultError};
use eva_contracts::VaultEvent;

const OWNER: Address = address!("0x0000000000000000000000000000000000000a01");
const VAULT: Address = address!("0x0000000000000000000000000000000000000f03");
const EVA: Address = address!("0x0000000000000000000000000000000000000e01");
const BACKING: Address = address!("0x0000000000000000000000000000000000000e03");

const ONE: u128 = 1_000_000_000_000_000_000;

fn u(v: u128) -> U256 {
    U256::from(v)
}

fn wallet(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[18] = 0x0c;
    bytes[19] = n;
    Address::from(bytes)
}

fn setup(reserve: U256) -> (Arc<TokenLedger>, Arc<TokenLedger>, BurnVault) {
    let eva = Arc::new(TokenLedger::eva(EVA, OWNER));
    let backing = Arc::new(TokenLedger::new(
        BACKING,
        "Wrapped BTC",
        "WBTC",
        18,
        OWNER,
        u(1_000_000 * ONE),
    ));
    if !reserve.is_zero() {
        backing.transfer(OWNER, VAULT, reserve).unwrap();
    }
    let vault = BurnVault::new(VAULT, eva.clone(), backing.clone()).unwrap();
    (eva, backing, vault)
}

fn give(eva: &TokenLedger, holder: Address, amount: U256) {
    eva.transfer(OWNER, holder, amount).unwrap();
    eva.approve(holder, VAULT, amount).unwrap();
}

#[test]
fn construction_rejects_zero_addresses() {
    let eva = Arc::new(TokenLedger::eva(EVA, OWNER));
    let zero_backing = Arc::new(TokenLedger::new(Address::ZERO, "X", "X", 18, OWNER, u(1)));
    assert_eq!(
        BurnVault::new(VAULT, eva, zero_backing).unwrap_err(),
        VaultError::ZeroAddress("backing asset")
    );

    let zero_eva = Arc::new(TokenLedger::eva(Address::ZERO, OWNER));
    let backing = Arc::new(TokenLedger::new(BACKING, "X", "X", 18, OWNER, u(1)));
    assert_eq!(
        BurnVault::new(VAULT, zero_eva, backing).unwrap_err(),
        VaultError::ZeroAddress("EVA")
    );
}

#[test]
fn burn_pays_pro_rata_share() {
    let (eva, backing, mut vault) = setup(u(100 * ONE));
    let holder = wallet(1);
    give(&eva, holder, u(10 * ONE));

    let event = vault.backing_withdraw(holder, u(10 * ONE)).unwrap();

    // 10e18 * 100e18 / 21_000_000e18
    let expected = u(47_619_047_619_047);
    assert_eq!(
        event,
        VaultEvent::BurnMade {
            eva_in: u(10 * ONE),
            backing_out: expected
        }
    );
    assert_eq!(backing.balance_of(holder), expected);
    assert_eq!(eva.balance_of(holder), U256::ZERO);
    assert_eq!(eva.total_supply(), eva_total_supply() - u(10 * ONE));
    assert_eq!(vault.backing_reserve(), u(100 * ONE) - expected);
    // The burned EVA does not linger in the vault.
    assert_eq!(eva.balance_of(VAULT), U256::ZERO);
    assert_eq!(vault.events(), &[event]);
}

#[test]
fn sequential_wallets_redeem_against_shrinking_supply() {
    let (eva, backing, mut vault) = setup(u(100 * ONE));
    let burns = [10u128, 10, 20, 20, 40];

    for (i, amount) in burns.iter().enumerate() {
        let holder = wallet(i as u8 + 1);
        let eva_in = u(amount * ONE);
        give(&eva, holder, eva_in);

        let expected = eva_in * vault.backing_reserve() / eva.total_supply();
        let per_token_before = vault.quote_withdraw(u(ONE)).unwrap();

        vault.backing_withdraw(holder, eva_in).unwrap();

        assert_eq!(backing.balance_of(holder), expected);
        assert!(!expected.is_zero());
        // Flooring leaves dust behind, so later redeemers never get less per token.
        assert!(vault.quote_withdraw(u(ONE)).unwrap() >= per_token_before);
    }

    assert_eq!(eva.total_supply(), eva_total_supply() - u(100 * ONE));
    assert_eq!(vault.events().len(), burns.len());
}

#[test]
fn last_holder_sweeps_remaining_dust() {
    let eva = Arc::new(TokenLedger::new(EVA, "EverValue Coin", "EVA", 18, OWNER, u(1000)));
    let backing = Arc::new(TokenLedger::new(BACKING, "Backing", "BCK", 18, OWNER, u(999)));
    backing.transfer(OWNER, VAULT, u(999)).unwrap();
    let mut vault = BurnVault::new(VAULT, eva.clone(), backing.clone()).unwrap();

    let mut paid = U256::ZERO;
    for (i, amount) in [300u128, 300, 400].into_iter().enumerate() {
        let holder = wallet(i as u8 + 1);
        give(&eva, holder, u(amount));
        vault.backing_withdraw(holder, u(amount)).unwrap();
        paid += backing.balance_of(holder);
    }

    assert_eq!(backing.balance_of(wallet(1)), u(299));
    assert_eq!(backing.balance_of(wallet(2)), u(300));
    assert_eq!(backing.balance_of(wallet(3)), u(400));
    assert_eq!(paid, u(999));
    assert_eq!(vault.backing_reserve(), U256::ZERO);
    assert_eq!(eva.total_supply(), U256::ZERO);
}

#[test]
fn payout_is_monotone_in_eva_in() {
    let (_, _, vault) = setup(u(100 * ONE));
    let mut previous = U256::ZERO;
    for amount in [1u128, 10_000, ONE, 7 * ONE, 1_000 * ONE, 21_000_000 * ONE] {
        let quote = vault.quote_withdraw(u(amount)).unwrap();
        assert!(quote >= previous);
        previous = quote;
    }
    // Redeeming the whole supply would pay the whole reserve.
    assert_eq!(previous, u(100 * ONE));
}

#[test]
fn withdraw_with_no_supply_fails() {
    let (eva, _, mut vault) = setup(u(100 * ONE));
    eva.burn(OWNER, eva_total_supply()).unwrap();

    assert_eq!(
        vault.backing_withdraw(wallet(1), u(10 * ONE)),
        Err(VaultError::NoSupply)
    );
    assert_eq!(vault.quote_withdraw(u(ONE)), Err(VaultError::NoSupply));
}

#[test]
fn share_rounding_to_zero_is_nothing_to_withdraw() {
    let (eva, _, mut vault) = setup(u(100 * ONE));
    let holder = wallet(1);
    give(&eva, holder, u(10));

    // 10 * 100e18 / 21_000_000e18 floors to zero
    assert_eq!(
        vault.backing_withdraw(holder, u(10)),
        Err(VaultError::NothingToWithdraw)
    );
    assert_eq!(eva.balance_of(holder), u(10));
    assert_eq!(eva.total_supply(), eva_total_supply());
}

#[test]
fn empty_vault_has_nothing_to_withdraw() {
    let (eva, _, mut vault) = setup(U256::ZERO);
    let holder = wallet(1);
    give(&eva, holder, u(10 * ONE));

    assert_eq!(
        vault.backing_withdraw(holder, u(10 * ONE)),
        Err(VaultError::NothingToWithdraw)
    );
}

#[test]
fn burn_without_allowance_moves_nothing() {
    let (eva, backing, mut vault) = setup(u(100 * ONE));
    let holder = wallet(1);
    eva.transfer(OWNER, holder, u(10 * ONE)).unwrap();

    let err = vault.backing_withdraw(holder, u(10 * ONE)).unwrap_err();
    assert!(matches!(
        err,
        VaultError::Ledger(LedgerError::InsufficientAllowance { .. })
    ));
    assert_eq!(eva.balance_of(holder), u(10 * ONE));
    assert_eq!(backing.balance_of(holder), U256::ZERO);
    assert_eq!(vault.backing_reserve(), u(100 * ONE));
}

#[test]
fn burn_beyond_balance_moves_nothing() {
    let (eva, _, mut vault) = setup(u(100 * ONE));
    let holder = wallet(1);
    give(&eva, holder, u(ONE));
    eva.approve(holder, VAULT, U256::MAX).unwrap();

    let err = vault.backing_withdraw(holder, u(10 * ONE)).unwrap_err();
    assert!(matches!(
        err,
        VaultError::Ledger(LedgerError::InsufficientBalance { .. })
    ));
    assert_eq!(eva.total_supply(), eva_total_supply());
    assert_eq!(vault.backing_reserve(), u(100 * ONE));
    assert!(vault.events().is_empty());
}

#[test]
fn donations_raise_the_share() {
    let (eva, backing, vault) = setup(u(100 * ONE));
    let before = vault.quote_withdraw(u(1_000 * ONE)).unwrap();
    backing.transfer(OWNER, VAULT, u(100 * ONE)).unwrap();
    let after = vault.quote_withdraw(u(1_000 * ONE)).unwrap();

    assert!(after > before);
    assert_eq!(vault.eva_token(), eva.address());
    assert_eq!(vault.backing_token(), BACKING);
}
