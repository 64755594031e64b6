// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::Bus;
use crate::test_support::fake_ctx;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::json;
use tbot_adapters::FakeExchange;
use tbot_core::Operation;

fn live_task(kwargs: &[(&str, &str)]) -> Arc<Task> {
    let op = Operation::new(
        "bin_live",
        vec![],
        kwargs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<IndexMap<_, _>>(),
    );
    Arc::new(Task::new(1, op, "bin_live", Bus::new()))
}

// --- momentum scoring ---

fn history_of(symbol: &str, samples: &[(f64, f64)]) -> History {
    let mut history = History::new();
    history.insert(symbol.to_string(), samples.iter().copied().collect());
    history
}

#[test]
fn rising_series_scores_full_points() {
    let history = history_of("BTC/USDT", &[(0.0, 100.0), (30.0, 101.0), (60.0, 102.0)]);
    let table = momentum_table(&history, "5m");
    let row = &table[0];
    assert_eq!(row["s"], "BTC/USDT");
    // Every horizon sees the same 100 -> 102 move
    assert_eq!(row["1m"], 2.0);
    assert_eq!(row["5m"], 2.0);
    assert_eq!(row["15m"], 2.0);
    // 1m + 3m + 5m + 10m positive: 1 + 2 + 3 + 4
    assert_eq!(row["pts"], 10);
}

#[test]
fn falling_series_scores_zero_points() {
    let history = history_of("BTC/USDT", &[(0.0, 100.0), (60.0, 95.0)]);
    let table = momentum_table(&history, "5m");
    assert_eq!(table[0]["pts"], 0);
    assert_eq!(table[0]["1m"], -5.0);
}

#[test]
fn single_sample_is_flat() {
    let history = history_of("BTC/USDT", &[(0.0, 100.0)]);
    let table = momentum_table(&history, "5m");
    assert_eq!(table[0]["1m"], 0.0);
    assert_eq!(table[0]["pts"], 0);
}

#[test]
fn table_sorts_by_the_requested_column() {
    let mut history = history_of("UP/USDT", &[(0.0, 100.0), (60.0, 110.0)]);
    history.insert(
        "DOWN/USDT".to_string(),
        [(0.0, 100.0), (60.0, 90.0)].into_iter().collect(),
    );
    let table = momentum_table(&history, "5m");
    assert_eq!(table[0]["s"], "UP/USDT");
    assert_eq!(table[1]["s"], "DOWN/USDT");
}

#[test]
fn horizons_use_the_oldest_sample_inside_the_window() {
    // 200s of history: 1m sees only the recent flat leg, 5m the climb
    let history = history_of(
        "BTC/USDT",
        &[(0.0, 100.0), (150.0, 110.0), (200.0, 110.0)],
    );
    let table = momentum_table(&history, "5m");
    assert_eq!(table[0]["1m"], 0.0);
    assert_eq!(table[0]["5m"], 10.0);
}

#[test]
fn record_sample_prunes_old_entries() {
    let mut history = History::new();
    record_sample(&mut history, "BTC/USDT", 0.0, 100.0);
    record_sample(&mut history, "BTC/USDT", 2000.0, 101.0);
    assert_eq!(history["BTC/USDT"].len(), 1);
    assert_eq!(history["BTC/USDT"][0], (2000.0, 101.0));
}

// --- job behavior ---

#[tokio::test]
async fn no_symbols_finishes_immediately() {
    let test = fake_ctx();
    let task = live_task(&[]);

    job_bin_live(test.ctx.clone(), Arc::clone(&task))
        .await
        .unwrap();

    assert!(task.is_finished());
    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("No symbols given")));
}

#[tokio::test(start_paused = true)]
async fn stream_updates_feed_memstore_and_scoreboard() {
    let test = fake_ctx();
    let (tx, rx) = mpsc::channel(8);
    test.exchange.set_stream(rx);

    let task = live_task(&[("symbol", "BTC/USDT")]);
    let token = task.cancel_token();
    let job_task = Arc::clone(&task);
    let ctx = test.ctx.clone();
    let handle = tokio::spawn(async move {
        let job = job_bin_live(ctx, job_task);
        tokio::select! {
            _ = token.cancelled() => {}
            _ = job => {}
        }
    });

    tx.send(FakeExchange::ticker("BTC/USDT", Decimal::new(30_000, 0)))
        .await
        .unwrap();
    tx.send(FakeExchange::ticker("BTC/USDT", Decimal::new(30_100, 0)))
        .await
        .unwrap();

    // Let the consumer drain both messages
    tokio::time::sleep(Duration::from_secs(1)).await;

    let stored = test.memstore.get_ticker("fake", "BTC/USDT").unwrap();
    assert_eq!(stored["last"], "30100");

    // The scored table is published and stored
    let table = test.memstore.get("bin_live").unwrap();
    assert_eq!(table[0]["s"], "BTC/USDT");
    assert_eq!(table[0]["pts"], 10);

    task.cancel_token().cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn falls_back_to_the_stored_movers_list() {
    let test = fake_ctx();
    test.memstore
        .add("cmc_latest_symbols", json!(["BTC/USDT", "ETH/USDT"]));
    let (_tx, rx) = mpsc::channel::<tbot_adapters::Ticker>(8);
    test.exchange.set_stream(rx);

    let task = live_task(&[]);
    let token = task.cancel_token();
    let job_task = Arc::clone(&task);
    let ctx = test.ctx.clone();
    let handle = tokio::spawn(async move {
        let job = job_bin_live(ctx, job_task);
        tokio::select! {
            _ = token.cancelled() => {}
            _ = job => {}
        }
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg == "Symbols = BTC/USDT,ETH/USDT"));

    task.cancel_token().cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cmc_update_swaps_the_watched_symbols() {
    let test = fake_ctx();
    let (tx, rx) = mpsc::channel(8);
    test.exchange.set_stream(rx);

    let task = live_task(&[("symbol", "BTC/USDT")]);
    let token = task.cancel_token();
    let job_task = Arc::clone(&task);
    let ctx = test.ctx.clone();
    let handle = tokio::spawn(async move {
        let job = job_bin_live(ctx, job_task);
        tokio::select! {
            _ = token.cancelled() => {}
            _ = job => {}
        }
    });

    // Let the job subscribe and park in recv
    tokio::time::sleep(Duration::from_millis(300)).await;
    test.bus
        .emit(EventName::CmcLatestUpdate, json!(["ETH/USDT"]));
    // Unblock the in-flight recv so the next step applies the refresh
    tx.send(FakeExchange::ticker("BTC/USDT", Decimal::new(30_000, 0)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("Updating symbols from cmc_latest (1)")));
    task.with_data(|data| match data {
        Some(JobPayload::BinLive(d)) => assert_eq!(d.symbols, ["ETH/USDT"]),
        other => panic!("unexpected payload: {other:?}"),
    });

    task.cancel_token().cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn track_add_keeps_requested_symbols_in_the_mix() {
    let test = fake_ctx();
    test.memstore.add("cmc_latest_symbols", json!(["SOL/USDT"]));
    let (_tx, rx) = mpsc::channel::<tbot_adapters::Ticker>(8);
    test.exchange.set_stream(rx);

    let task = live_task(&[("symbol", "BTC/USDT"), ("symbolsTrackAdd", "true")]);
    let token = task.cancel_token();
    let job_task = Arc::clone(&task);
    let ctx = test.ctx.clone();
    let handle = tokio::spawn(async move {
        let job = job_bin_live(ctx, job_task);
        tokio::select! {
            _ = token.cancelled() => {}
            _ = job => {}
        }
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    // The movers list leads; the requested symbol is appended
    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg == "Symbols = SOL/USDT,BTC/USDT"));

    task.cancel_token().cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn upstream_timeout_is_soft_and_reconnects() {
    let test = fake_ctx();
    let (_tx, rx) = mpsc::channel::<tbot_adapters::Ticker>(8);
    test.exchange.set_stream(rx);

    let task = live_task(&[("symbol", "BTC/USDT")]);
    let token = task.cancel_token();
    let job_task = Arc::clone(&task);
    let ctx = test.ctx.clone();
    let handle = tokio::spawn(async move {
        let job = job_bin_live(ctx, job_task);
        tokio::select! {
            _ = token.cancelled() => {}
            _ = job => {}
        }
    });

    // No messages arrive; the 10s recv timeout trips and the job retries
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(task
        .get_output(None)
        .iter()
        .any(|l| l.msg.contains("recv timeout")));
    assert!(!task.is_finished());

    task.cancel_token().cancel();
    handle.await.unwrap();
}
