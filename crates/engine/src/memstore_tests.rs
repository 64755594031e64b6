// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn store() -> (MemStore, Bus) {
    let bus = Bus::new();
    (MemStore::new(bus.clone()), bus)
}

#[test]
fn reserved_sections_exist() {
    let (memstore, _bus) = store();
    let mut keys = memstore.get_keys();
    keys.sort();
    assert_eq!(keys, ["ohlcv", "symbols", "tickers"]);
}

#[test]
fn add_and_get() {
    let (memstore, _bus) = store();
    memstore.add("custom", json!(42));
    assert_eq!(memstore.get("custom"), Some(json!(42)));
    assert_eq!(memstore.get("missing"), None);
}

#[test]
fn add_ohlcv_nests_by_exchange_and_symbol() {
    let (memstore, _bus) = store();
    memstore.add_ohlcv("binance", "BTC/USDT", json!([[1, 2, 3]]));
    assert_eq!(
        memstore.get_ohlcv("binance", "BTC/USDT"),
        Some(json!([[1, 2, 3]]))
    );
    assert_eq!(memstore.get_ohlcv("binance", "ETH/USDT"), None);
    assert_eq!(memstore.get_ohlcv("kraken", "BTC/USDT"), None);
}

#[test]
fn add_ticker_emits_ticker_update_with_full_section() {
    let (memstore, bus) = store();
    let mut sub = bus.subscribe(EventName::TickerUpdate);

    memstore.add_ticker("binance", json!({"symbol": "BTC/USDT", "last": 30000}));

    let msg = sub.try_recv().unwrap();
    assert_eq!(msg.event, EventName::TickerUpdate);
    assert_eq!(msg.payload["binance"]["BTC/USDT"]["last"], 30000);

    // get_ticker returns the stored value
    assert_eq!(
        memstore.get_ticker("binance", "BTC/USDT"),
        Some(json!({"symbol": "BTC/USDT", "last": 30000}))
    );
}

#[test]
fn ticker_without_symbol_is_dropped() {
    let (memstore, bus) = store();
    let mut sub = bus.subscribe(EventName::TickerUpdate);

    memstore.add_ticker("binance", json!({"last": 1}));

    assert!(sub.try_recv().is_none());
    assert_eq!(memstore.get("tickers"), Some(json!({})));
}

#[test]
fn second_ticker_keeps_the_first() {
    let (memstore, bus) = store();
    let mut sub = bus.subscribe(EventName::TickerUpdate);

    memstore.add_ticker("binance", json!({"symbol": "BTC/USDT", "last": 1}));
    memstore.add_ticker("binance", json!({"symbol": "ETH/USDT", "last": 2}));

    sub.try_recv();
    let msg = sub.try_recv().unwrap();
    assert_eq!(msg.payload["binance"]["BTC/USDT"]["last"], 1);
    assert_eq!(msg.payload["binance"]["ETH/USDT"]["last"], 2);
}

#[test]
fn snapshot_and_restore_round_trip() {
    let (memstore, _bus) = store();
    memstore.add("custom", json!("v"));
    memstore.add_ticker("binance", json!({"symbol": "BTC/USDT", "last": 1}));

    let snapshot = memstore.snapshot();

    let (other, _bus2) = store();
    other.restore(snapshot.clone());
    assert_eq!(other.snapshot(), snapshot);
    assert_eq!(other.get("custom"), Some(json!("v")));
}
