// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::Bus;
use crate::test_support::fake_ctx;
use indexmap::IndexMap;
use tbot_adapters::FakeExchange;
use tbot_core::Operation;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn tsl_task(args: &[&str], kwargs: &[(&str, &str)]) -> Arc<Task> {
    let op = Operation::new(
        "crypto_tsl",
        args.iter().map(|s| s.to_string()).collect(),
        kwargs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<IndexMap<_, _>>(),
    );
    Arc::new(Task::new(1, op, "crypto_tsl", Bus::new()))
}

// --- evaluate() unit tests ---

fn data_with(stop_offset: &str) -> TslData {
    TslData {
        stop_offset_price: dec(stop_offset),
        ..TslData::default()
    }
}

#[test]
fn first_observation_arms_the_stop() {
    let mut d = data_with("10");
    let eval = evaluate(&mut d, dec("100"));
    assert_eq!(d.initial_price, dec("100"));
    assert_eq!(eval.last_high, dec("100"));
    assert_eq!(eval.stop_price, dec("90"));
    assert!(eval.trigger.is_none());
}

#[test]
fn stop_trails_the_high_water_mark() {
    let mut d = data_with("10");
    evaluate(&mut d, dec("100"));
    let eval = evaluate(&mut d, dec("120"));
    assert_eq!(eval.last_high, dec("120"));
    assert_eq!(eval.stop_price, dec("110"));
    assert!(eval.trigger.is_none());

    // A dip below the high does not lower the stop
    let eval = evaluate(&mut d, dec("115"));
    assert_eq!(eval.last_high, dec("120"));
    assert_eq!(eval.stop_price, dec("110"));
    assert!(eval.trigger.is_none());
}

#[test]
fn falling_through_the_stop_triggers() {
    let mut d = data_with("10");
    evaluate(&mut d, dec("100"));
    evaluate(&mut d, dec("120"));
    let eval = evaluate(&mut d, dec("109"));
    assert!(matches!(eval.trigger, Some(Trigger::StopLoss)));
}

#[test]
fn percent_offset_scales_with_the_high() {
    let mut d = TslData {
        stop_offset_price_pct: dec("10"),
        ..TslData::default()
    };
    let eval = evaluate(&mut d, dec("200"));
    assert_eq!(eval.stop_price, dec("180"));
}

#[test]
fn above_initial_price_floors_the_stop() {
    let mut d = data_with("50");
    d.above_initial_price = true;
    d.initial_price = dec("100");
    // High 120 would put the stop at 70; the floor holds it at entry
    evaluate(&mut d, dec("120"));
    let eval = evaluate(&mut d, dec("119"));
    assert_eq!(eval.stop_price, dec("100"));
}

#[test]
fn take_profit_triggers_above_target() {
    let mut d = data_with("10");
    d.take_profit = dec("150");
    evaluate(&mut d, dec("100"));
    let eval = evaluate(&mut d, dec("151"));
    assert!(matches!(eval.trigger, Some(Trigger::TakeProfit)));
}

#[test]
fn take_profit_pct_uses_the_entry_price() {
    let mut d = data_with("10");
    d.take_profit_pct = dec("5");
    evaluate(&mut d, dec("100"));
    let eval = evaluate(&mut d, dec("106"));
    assert!(matches!(eval.trigger, Some(Trigger::TakeProfit)));
}

#[test]
fn std2_claws_the_offset_back_on_each_new_high() {
    let mut d = data_with("10");
    d.algo = "std2".into();

    let eval = evaluate(&mut d, dec("100"));
    assert_eq!(eval.stop_price, dec("90"));

    // First new high: offset shrinks by reduceStopOffsetPriceBy (0.5%)
    let eval = evaluate(&mut d, dec("110"));
    assert_eq!(d.offset_pct_raised_by, dec("0.5"));
    assert_eq!(eval.stop_price, dec("100.05"));

    // Second new high: another 0.5%
    let eval = evaluate(&mut d, dec("120"));
    assert_eq!(d.offset_pct_raised_by, dec("1.0"));
    assert_eq!(eval.stop_price, dec("110.1"));

    // A flat tick raises nothing
    let eval = evaluate(&mut d, dec("115"));
    assert_eq!(d.offset_pct_raised_by, dec("1.0"));
    assert_eq!(eval.stop_price, dec("110.1"));
}

#[test]
fn std2_claw_back_stops_at_the_cap() {
    let mut d = data_with("10");
    d.algo = "std2".into();
    d.reduce_stop_offset_price_by = dec("50");
    d.reduce_stop_offset_price_by_max = dec("80");

    evaluate(&mut d, dec("100"));
    evaluate(&mut d, dec("110"));
    assert_eq!(d.offset_pct_raised_by, dec("50"));

    // 50 + 50 would exceed the cap of 80, so the claw-back stops
    evaluate(&mut d, dec("120"));
    assert_eq!(d.offset_pct_raised_by, dec("50"));
}

#[test]
fn std2_pins_a_pct_offset_to_the_entry_price() {
    let mut d = TslData {
        algo: "std2".into(),
        stop_offset_price_pct: dec("10"),
        ..TslData::default()
    };

    let eval = evaluate(&mut d, dec("200"));
    assert_eq!(d.stop_offset_price, dec("20"));
    assert_eq!(eval.stop_price, dec("180"));

    // The base offset stays entry-derived even as the high moves
    let eval = evaluate(&mut d, dec("300"));
    assert_eq!(d.stop_offset_price, dec("20"));
    assert_eq!(eval.stop_price, dec("280.1"));
}

#[test]
fn user_supplied_last_high_seeds_the_trail() {
    let mut d = data_with("10");
    d.last_high_by_user = Some(dec("130"));
    let eval = evaluate(&mut d, dec("100"));
    assert_eq!(eval.last_high, dec("130"));
    // 100 <= 120: the inherited stop triggers immediately
    assert!(matches!(eval.trigger, Some(Trigger::StopLoss)));
}

// --- job-level tests ---

#[tokio::test]
async fn missing_stop_offset_finishes_immediately() {
    let test = fake_ctx();
    let task = tsl_task(&[], &[("symbol", "BTC/USDT")]);

    job_crypto_tsl(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert!(task.is_finished());
    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("stopOffsetPrice(Pct) must be > 0")));
}

#[tokio::test(start_paused = true)]
async fn simulated_trail_sells_on_the_drop() {
    let test = fake_ctx();
    for price in ["100", "120", "109"] {
        test.exchange
            .push_ticker(FakeExchange::ticker("BTC/USDT", dec(price)));
    }
    let task = tsl_task(
        &["simulate"],
        &[
            ("symbol", "BTC/USDT"),
            ("quantity", "1"),
            ("stopOffsetPrice", "10"),
            ("interval", "1"),
        ],
    );

    job_crypto_tsl(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert!(task.is_finished());
    // No real order in simulate mode, but the operator is notified
    assert!(test.exchange.orders().is_empty());
    assert_eq!(test.mailer.sent().len(), 1);
    assert!(test.mailer.sent()[0].contains("Stop-loss triggered"));
}

#[tokio::test(start_paused = true)]
async fn live_trail_places_a_market_sell() {
    let test = fake_ctx();
    for price in ["100", "89"] {
        test.exchange
            .push_ticker(FakeExchange::ticker("BTC/USDT", dec(price)));
    }
    let task = tsl_task(
        &[],
        &[
            ("symbol", "BTC/USDT"),
            ("quantity", "2"),
            ("stopOffsetPrice", "10"),
            ("interval", "1"),
        ],
    );

    job_crypto_tsl(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    let orders = test.exchange.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Sell);
    assert_eq!(orders[0].quantity, dec("2"));
}

#[tokio::test(start_paused = true)]
async fn buy_flag_enters_before_trailing() {
    let test = fake_ctx();
    for price in ["100", "89"] {
        test.exchange
            .push_ticker(FakeExchange::ticker("BTC/USDT", dec(price)));
    }
    let task = tsl_task(
        &["buy"],
        &[
            ("symbol", "BTC/USDT"),
            ("quantity", "1"),
            ("stopOffsetPrice", "10"),
            ("interval", "1"),
        ],
    );

    job_crypto_tsl(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    let orders = test.exchange.orders();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[1].side, OrderSide::Sell);
}

#[tokio::test(start_paused = true)]
async fn ticker_failure_is_soft_and_retries() {
    let test = fake_ctx();
    test.exchange
        .push_ticker(FakeExchange::ticker("BTC/USDT", dec("100")));
    // Next fetch fails once, then the drop arrives
    let task = tsl_task(
        &["simulate"],
        &[
            ("symbol", "BTC/USDT"),
            ("quantity", "1"),
            ("stopOffsetPrice", "10"),
            ("interval", "1"),
        ],
    );

    let job_task = Arc::clone(&task);
    let ctx = test.ctx.clone();
    let handle = tokio::spawn(async move { job_crypto_tsl(ctx, job_task).await });

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    test.exchange.fail_next("blip");
    test.exchange
        .push_ticker(FakeExchange::ticker("BTC/USDT", dec("85")));

    handle.await.unwrap().unwrap();
    assert!(task.is_finished());
    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("ExchangeError")));
}
