// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide key/value store shared by jobs.
//!
//! The three reserved sections (`symbols`, `ohlcv`, `tickers`) are nested
//! maps keyed by exchange and symbol. Writing a ticker publishes
//! `TICKER_UPDATE` with the whole tickers section as payload, which is
//! what drives the condition scanner.

use crate::bus::Bus;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tbot_core::EventName;
use tracing::warn;

pub const KEY_SYMBOLS: &str = "symbols";
pub const KEY_OHLCV: &str = "ohlcv";
pub const KEY_TICKERS: &str = "tickers";

pub struct MemStore {
    bus: Bus,
    store: Mutex<Map<String, Value>>,
}

impl MemStore {
    pub fn new(bus: Bus) -> Self {
        let mut store = Map::new();
        store.insert(KEY_SYMBOLS.into(), Value::Object(Map::new()));
        store.insert(KEY_OHLCV.into(), Value::Object(Map::new()));
        store.insert(KEY_TICKERS.into(), Value::Object(Map::new()));
        Self {
            bus,
            store: Mutex::new(store),
        }
    }

    pub fn get_keys(&self) -> Vec<String> {
        self.store.lock().keys().cloned().collect()
    }

    pub fn add(&self, key: impl Into<String>, value: Value) {
        self.store.lock().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.lock().get(key).cloned()
    }

    /// Store a candle series under `ohlcv[exchange][symbol]`.
    pub fn add_ohlcv(&self, exchange: &str, symbol: &str, value: Value) {
        let mut store = self.store.lock();
        if let Some(section) = nested_entry(&mut store, KEY_OHLCV, exchange) {
            section.insert(symbol.to_string(), value);
        }
    }

    pub fn get_ohlcv(&self, exchange: &str, symbol: &str) -> Option<Value> {
        self.store
            .lock()
            .get(KEY_OHLCV)?
            .get(exchange)?
            .get(symbol)
            .cloned()
    }

    /// Store a ticker under `tickers[exchange][ticker.symbol]` and publish
    /// `TICKER_UPDATE` with the full tickers section.
    pub fn add_ticker(&self, exchange: &str, ticker: Value) {
        let Some(symbol) = ticker.get("symbol").and_then(Value::as_str).map(String::from)
        else {
            warn!("dropping ticker without a symbol: {}", ticker);
            return;
        };

        let tickers = {
            let mut store = self.store.lock();
            if let Some(section) = nested_entry(&mut store, KEY_TICKERS, exchange) {
                section.insert(symbol, ticker);
            }
            store.get(KEY_TICKERS).cloned().unwrap_or(Value::Null)
        };

        self.bus.emit(EventName::TickerUpdate, tickers);
    }

    pub fn get_ticker(&self, exchange: &str, symbol: &str) -> Option<Value> {
        self.store
            .lock()
            .get(KEY_TICKERS)?
            .get(exchange)?
            .get(symbol)
            .cloned()
    }

    /// Whole-store clone for `MEMSTORE` queries and savegames.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.store.lock().clone()
    }

    /// Replace the backing map wholesale (savegame load only; callers
    /// must not race this with mutators).
    pub fn restore(&self, contents: Map<String, Value>) {
        *self.store.lock() = contents;
    }
}

/// `store[section][exchange]` as a mutable map, creating levels as needed.
fn nested_entry<'a>(
    store: &'a mut Map<String, Value>,
    section: &str,
    exchange: &str,
) -> Option<&'a mut Map<String, Value>> {
    let section = store
        .entry(section.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !section.is_object() {
        *section = Value::Object(Map::new());
    }
    let by_exchange = section.as_object_mut()?;
    let entry = by_exchange
        .entry(exchange.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut()
}

#[cfg(test)]
#[path = "memstore_tests.rs"]
mod tests;
