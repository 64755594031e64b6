// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exchange adapters.

mod paper;
mod registry;

pub use paper::PaperExchange;
pub use registry::{ExchangeRegistry, SharedExchange};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeExchange;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tbot_core::{OrderSide, OrderType, TimeInForce};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from exchange operations
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("no exchange selected")]
    NoExchangeSelected,

    #[error("missing {0} config")]
    MissingConfig(String),

    #[error("exchange not available: {0}")]
    NotAvailable(String),

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// A tradable market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub active: bool,
    pub price_precision: u32,
    pub amount_precision: u32,
}

/// A point-in-time ticker.
///
/// Prices are decimals so they serialize as strings on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    #[serde(rename = "baseVolume")]
    pub base_volume: Decimal,
    /// Unix seconds.
    pub timestamp: f64,
}

/// One OHLCV candle. Floats, as exchanges report them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Unix milliseconds.
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Account balance: currency code to amount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub total: BTreeMap<String, Decimal>,
    pub free: BTreeMap<String, Decimal>,
}

/// A new-order request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub quote_order_qty: Option<Decimal>,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Filled,
    Canceled,
    Rejected,
}

/// An order as reported back by the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Decimal,
    pub amount: Decimal,
    pub filled: Decimal,
    /// Unix seconds.
    pub timestamp: f64,
}

/// Adapter for a trading venue.
///
/// One shared instance serves every job addressing that venue.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync + 'static {
    /// Venue identifier (`binance`, `paper`, ...).
    fn id(&self) -> &str;

    /// Active markets on this venue.
    async fn load_markets(&self) -> Result<Vec<Market>, ExchangeError>;

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError>;

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<Vec<Ticker>, ExchangeError>;

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, ExchangeError>;

    async fn fetch_balance(&self) -> Result<Balance, ExchangeError>;

    async fn create_order(&self, req: &OrderRequest) -> Result<Order, ExchangeError>;

    /// Subscribe to a live ticker stream. The sender side is dropped when
    /// the adapter closes, so a `recv` returning `None` means the upstream
    /// is gone. Consumers put a timeout on each `recv` to catch dead
    /// streams that never close.
    async fn watch_tickers(
        &self,
        symbols: &[String],
    ) -> Result<mpsc::Receiver<Ticker>, ExchangeError>;

    /// Release any live connections. Idempotent.
    async fn close(&self) -> Result<(), ExchangeError>;

    /// Market metadata for a symbol, used by the precision helpers.
    fn market(&self, symbol: &str) -> Option<Market>;

    /// Round a price to the market's price precision.
    fn price_to_precision(&self, symbol: &str, price: Decimal) -> Decimal {
        let dp = self.market(symbol).map(|m| m.price_precision).unwrap_or(8);
        price.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
    }

    /// Truncate an amount to the market's amount precision.
    fn amount_to_precision(&self, symbol: &str, amount: Decimal) -> Decimal {
        let dp = self.market(symbol).map(|m| m.amount_precision).unwrap_or(8);
        amount.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
    }
}

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod tests;
