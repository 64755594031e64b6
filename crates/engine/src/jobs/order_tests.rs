// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::Bus;
use crate::test_support::fake_ctx;
use indexmap::IndexMap;
use tbot_core::{EventName, Operation, OrderSide};

fn order_task(args: &[&str], kwargs: &[(&str, &str)]) -> Arc<Task> {
    let op = Operation::new(
        "crypto_order",
        args.iter().map(|s| s.to_string()).collect(),
        kwargs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<IndexMap<_, _>>(),
    );
    Arc::new(Task::new(1, op, "crypto_order", Bus::new()))
}

#[tokio::test]
async fn missing_side_is_rejected() {
    let test = fake_ctx();
    let task = order_task(&[], &[("symbol", "BTC/USDT"), ("quantity", "1")]);

    job_crypto_order(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert!(task.is_finished());
    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("Order side BUY or SELL is required")));
    assert!(test.exchange.orders().is_empty());
}

#[tokio::test]
async fn stop_type_requires_stop_price() {
    let test = fake_ctx();
    let task = order_task(
        &["buy", "orderTypeStopLoss"],
        &[("symbol", "BTC/USDT"), ("quantity", "1")],
    );

    job_crypto_order(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("stopPrice is required")));
    assert!(test.exchange.orders().is_empty());
}

#[tokio::test]
async fn market_order_places_and_mails() {
    let test = fake_ctx();
    let mut events = test.bus.subscribe(EventName::CryptoOrder);
    let task = order_task(&["buy"], &[("symbol", "BTC/USDT"), ("quantity", "0.5")]);

    job_crypto_order(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    let orders = test.exchange.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[0].symbol, "BTC/USDT");

    assert_eq!(events.recv().await.unwrap().payload["taskId"], 1);
    assert_eq!(test.mailer.sent().len(), 1);
    assert!(task.is_finished());

    // The payload records completion for snapshots
    task.with_data(|data| match data {
        Some(JobPayload::CryptoOrder(d)) => assert!(d.order_completed),
        other => panic!("unexpected payload: {other:?}"),
    });
}

#[tokio::test]
async fn simulate_skips_the_exchange() {
    let test = fake_ctx();
    let task = order_task(
        &["sell", "simulate"],
        &[("symbol", "BTC/USDT"), ("quantity", "1")],
    );

    job_crypto_order(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert!(test.exchange.orders().is_empty());
    assert_eq!(test.mailer.sent().len(), 1);
    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("Simulated order")));
}

#[tokio::test]
async fn market_order_accepts_quote_order_qty() {
    let test = fake_ctx();
    let task = order_task(
        &["buy"],
        &[("symbol", "BTC/USDT"), ("quoteOrderQty", "1000")],
    );

    job_crypto_order(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert_eq!(test.exchange.orders().len(), 1);
}

#[tokio::test]
async fn limit_order_requires_an_explicit_quantity() {
    let test = fake_ctx();
    // quoteOrderQty is not a substitute outside MARKET
    let task = order_task(
        &["buy", "orderTypeLimit"],
        &[
            ("symbol", "BTC/USDT"),
            ("price", "25000"),
            ("quoteOrderQty", "1000"),
        ],
    );

    job_crypto_order(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("quantity is required for this order type")));
    assert!(test.exchange.orders().is_empty());
}
