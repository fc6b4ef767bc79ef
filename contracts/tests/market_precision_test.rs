//! Integration tests for a market quoted per precision unit.
//!
//! The counter-asset is an 8-decimal bitcoin wrapper and the rate is the
//! number of satoshi per whole EVA (`RATE_BASE = 10^8`).

use std::sync::Arc;

use alloy_primitives::{address, Address, U256};
use eva_contracts::config::{
    MarketParams, RateConvention, DEFAULT_FEE, DEFAULT_PRECISION_RATE, PRECISION_RATE_BASE,
};
use eva_contracts::ledger::{Ledger, TokenLedger};
use eva_contracts::market::{FixedRateMarket, MarketError};
use eva_contracts::MarketEvent;

const OWNER: Address = address!("0x0000000000000000000000000000000000000a01");
const USER: Address = address!("0x0000000000000000000000000000000000000b01");
const MARKET: Address = address!("0x0000000000000000000000000000000000000f02");
const EVA: Address = address!("0x0000000000000000000000000000000000000e01");
const WBTC: Address = address!("0x0000000000000000000000000000000000000e03");

const ONE_EVA: u128 = 1_000_000_000_000_000_000;

fn u(v: u128) -> U256 {
    U256::from(v)
}

fn setup() -> (Arc<TokenLedger>, Arc<TokenLedger>, FixedRateMarket) {
    let eva = Arc::new(TokenLedger::eva(EVA, OWNER));
    let wbtc = Arc::new(TokenLedger::new(
        WBTC,
        "Wrapped BTC",
        "WBTC",
        8,
        OWNER,
        u(21_000_000 * 100_000_000),
    ));
    let market = FixedRateMarket::new(
        MARKET,
        OWNER,
        eva.clone(),
        wbtc.clone(),
        MarketParams::per_precision_unit(DEFAULT_PRECISION_RATE, DEFAULT_FEE)
            .with_counter_decimals(8),
    )
    .unwrap();
    (eva, wbtc, market)
}

#[test]
fn market_reports_precision_convention() {
    let (_, _, market) = setup();
    assert_eq!(market.convention(), RateConvention::PerPrecisionUnit);
    assert_eq!(market.convention().rate_base(), U256::from(PRECISION_RATE_BASE));
    assert_eq!(market.rate(), u(443));
    assert_eq!(market.counter_decimals(), 8);
}

#[test]
fn buy_one_eva_for_rate_satoshi() {
    let (eva, wbtc, mut market) = setup();
    eva.transfer(OWNER, MARKET, u(2 * ONE_EVA)).unwrap();
    wbtc.transfer(OWNER, USER, u(1000)).unwrap();
    wbtc.approve(USER, MARKET, u(1000)).unwrap();

    let event = market.buy(USER, u(443)).unwrap();
    assert_eq!(
        event,
        MarketEvent::Bought {
            counter_in: u(443),
            eva_out: u(ONE_EVA)
        }
    );

    market.buy(USER, u(443)).unwrap();
    assert_eq!(eva.balance_of(USER), u(2 * ONE_EVA));
    assert_eq!(market.eva_reserve(), U256::ZERO);
    assert_eq!(wbtc.balance_of(USER), u(1000 - 886));

    // The reserve is empty now.
    assert_eq!(
        market.buy(USER, u(100)),
        Err(MarketError::InsufficientMarketReserve {
            reserve: U256::ZERO,
            needed: u(225_733_634_311_512_415),
        })
    );
}

#[test]
fn buy_single_satoshi_floors_fractional_eva() {
    let (eva, wbtc, mut market) = setup();
    eva.transfer(OWNER, MARKET, u(ONE_EVA)).unwrap();
    wbtc.transfer(OWNER, USER, u(1)).unwrap();
    wbtc.approve(USER, MARKET, u(1)).unwrap();

    // 10^18 / 443, floored
    market.buy(USER, u(1)).unwrap();
    assert_eq!(eva.balance_of(USER), u(2_257_336_343_115_124));
}

#[test]
fn sell_one_eva_pays_rate_minus_fee() {
    let (eva, wbtc, mut market) = setup();
    wbtc.transfer(OWNER, MARKET, u(100_000)).unwrap();
    eva.transfer(OWNER, USER, u(10 * ONE_EVA)).unwrap();
    eva.approve(USER, MARKET, U256::MAX).unwrap();

    // 443 satoshi gross, 1% fee floors to 438
    let event = market.sell(USER, u(ONE_EVA)).unwrap();
    assert_eq!(
        event,
        MarketEvent::Sold {
            counter_out: u(438),
            eva_in: u(ONE_EVA)
        }
    );
    assert_eq!(wbtc.balance_of(USER), u(438));
    assert_eq!(market.counter_reserve(), u(100_000 - 438));
}

#[test]
fn sell_just_under_a_thousand_satoshi() {
    let (eva, wbtc, mut market) = setup();
    wbtc.transfer(OWNER, MARKET, u(2000)).unwrap();
    eva.transfer(OWNER, USER, u(10 * ONE_EVA)).unwrap();
    eva.approve(USER, MARKET, U256::MAX).unwrap();

    // floor(10^14 / 438570) * 10^10: 1010 satoshi gross, 999 after the 1% fee
    let eva_in = u(100_000_000_000_000 / 438_570 * 10_000_000_000);
    assert_eq!(eva_in, u(2_280_137_720_000_000_000));

    let event = market.sell(USER, eva_in).unwrap();
    assert_eq!(
        event,
        MarketEvent::Sold {
            counter_out: u(999),
            eva_in
        }
    );
    assert_eq!(wbtc.balance_of(USER), u(999));
    assert_eq!(market.counter_reserve(), u(2000 - 999));
}

#[test]
fn sell_floors_at_each_step() {
    let (eva, wbtc, mut market) = setup();
    wbtc.transfer(OWNER, MARKET, u(100_000)).unwrap();
    eva.transfer(OWNER, USER, u(10 * ONE_EVA)).unwrap();
    eva.approve(USER, MARKET, U256::MAX).unwrap();

    // 2.5 EVA: 1107.5 satoshi floors to 1107, then 1095.93 floors to 1095
    market.sell(USER, u(5 * ONE_EVA / 2)).unwrap();
    assert_eq!(wbtc.balance_of(USER), u(1095));
}

#[test]
fn sell_below_one_satoshi_is_too_small() {
    let (eva, wbtc, mut market) = setup();
    wbtc.transfer(OWNER, MARKET, u(100_000)).unwrap();
    eva.transfer(OWNER, USER, u(ONE_EVA)).unwrap();
    eva.approve(USER, MARKET, U256::MAX).unwrap();

    assert_eq!(
        market.sell(USER, u(10_000_000_000)),
        Err(MarketError::AmountTooSmall)
    );
    assert_eq!(eva.balance_of(USER), u(ONE_EVA));
}

#[test]
fn rate_change_applies_to_next_quote() {
    let (_, _, mut market) = setup();
    assert_eq!(market.quote_buy(u(443)).unwrap(), u(ONE_EVA));

    market.set_rate(OWNER, u(886)).unwrap();
    assert_eq!(market.quote_buy(u(443)).unwrap(), u(ONE_EVA / 2));
    assert_eq!(market.quote_sell(u(ONE_EVA)).unwrap(), u(877));
}

#[test]
fn withdraw_all_sweeps_both_reserves() {
    let (eva, wbtc, mut market) = setup();
    eva.transfer(OWNER, MARKET, u(3 * ONE_EVA)).unwrap();
    wbtc.transfer(OWNER, MARKET, u(5_000)).unwrap();

    assert_eq!(market.withdraw_all(OWNER).unwrap(), (u(3 * ONE_EVA), u(5_000)));
    assert_eq!(market.eva_reserve(), U256::ZERO);
    assert_eq!(market.counter_reserve(), U256::ZERO);
    assert_eq!(wbtc.balance_of(OWNER), u(21_000_000 * 100_000_000));
}
