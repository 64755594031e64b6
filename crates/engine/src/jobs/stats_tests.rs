// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::Bus;
use crate::test_support::fake_ctx;
use indexmap::IndexMap;
use tbot_core::Operation;

#[test]
fn rsi_needs_enough_candles() {
    assert!(rsi(&[1.0; 10], 14).is_none());
    assert!(rsi(&[1.0; 15], 14).is_some());
}

#[test]
fn rsi_is_100_when_only_gains() {
    let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
    assert_eq!(rsi(&closes, 14), Some(100.0));
}

#[test]
fn rsi_is_low_when_only_losses() {
    let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
    let value = rsi(&closes, 14).unwrap();
    assert!(value < 1.0, "rsi = {value}");
}

#[test]
fn rsi_is_balanced_on_alternation() {
    let closes: Vec<f64> = (0..30)
        .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
        .collect();
    let value = rsi(&closes, 14).unwrap();
    assert!((30.0..70.0).contains(&value), "rsi = {value}");
}

#[test]
fn macd_advice_flags_a_reversal() {
    // Long decline then a sharp rally: expect at least one BUY after the turn
    let mut closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
    closes.extend((0..20).map(|i| 160.0 + (i as f64) * 3.0));
    let advice = macd_advice(&closes);
    assert_eq!(advice.len(), closes.len());
    assert!(advice.iter().any(|a| *a == "BUY"));
}

#[test]
fn macd_advice_on_short_series() {
    assert_eq!(macd_advice(&[1.0]), ["No data"]);
}

#[tokio::test]
async fn job_prints_rsi_and_stores_ohlcv() {
    let test = fake_ctx();
    let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64).sin()).collect();
    test.exchange.set_candles(candles_from_closes(&closes));

    let op = Operation::new("crypto_stats", vec![], IndexMap::new());
    let task = Arc::new(Task::new(1, op, "crypto_stats", Bus::new()));

    job_crypto_stats(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert!(task.is_finished());
    assert!(test.memstore.get_ohlcv("fake", "BTC/USDT").is_some());
    let output = task.get_output(None);
    assert!(output.iter().any(|l| l.msg.starts_with("RSI = ")));
    assert!(output.iter().any(|l| l.msg.starts_with("MACD advice = ")));
}

#[tokio::test]
async fn job_survives_short_series() {
    let test = fake_ctx();
    test.exchange.set_candles(candles_from_closes(&[1.0, 2.0]));

    let op = Operation::new("crypto_stats", vec![], IndexMap::new());
    let task = Arc::new(Task::new(1, op, "crypto_stats", Bus::new()));

    job_crypto_stats(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert!(task.is_finished());
    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("Not enough candles")));
}
