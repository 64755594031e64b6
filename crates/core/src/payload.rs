// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job typed payloads.
//!
//! Each job kind carries one variant. `map_options` builds the payload in
//! place from stringly-typed command inputs: bare words become boolean
//! flags, `key=value` pairs set fields, `desc` is display-only and
//! ignored, and anything unknown is logged and skipped.

use crate::market::{OrderSide, OrderType, TimeInForce};
use crate::util::parse_bool;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::error;

/// Tagged payload, one variant per job kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum JobPayload {
    Ping(PingData),
    BinLive(BinLiveData),
    CmcLatest(CmcLatestData),
    CryptoOrder(OrderData),
    CryptoPf(PfData),
    CryptoStats(StatsData),
    CryptoTicker(TickerJobData),
    CryptoTsl(TslData),
}

impl JobPayload {
    /// Apply string options to whichever variant this is.
    pub fn map_options(&mut self, args: &[String], kwargs: &IndexMap<String, String>) {
        match self {
            JobPayload::Ping(d) => d.map_options(args, kwargs),
            JobPayload::BinLive(d) => d.map_options(args, kwargs),
            JobPayload::CmcLatest(d) => d.map_options(args, kwargs),
            JobPayload::CryptoOrder(d) => d.map_options(args, kwargs),
            JobPayload::CryptoPf(d) => d.map_options(args, kwargs),
            JobPayload::CryptoStats(d) => d.map_options(args, kwargs),
            JobPayload::CryptoTicker(d) => d.map_options(args, kwargs),
            JobPayload::CryptoTsl(d) => d.map_options(args, kwargs),
        }
    }

    /// Step interval in seconds, for payloads that drive a periodic loop.
    pub fn interval(&self) -> Option<u64> {
        match self {
            JobPayload::Ping(d) => Some(d.interval),
            JobPayload::CryptoTsl(d) => Some(d.interval),
            _ => None,
        }
    }
}

fn bad_arg(key: &str) {
    error!("Invalid call argument: {}", key);
}

fn parse_u64(key: &str, value: &str) -> Option<u64> {
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            error!("Invalid value for {}: {}", key, value);
            None
        }
    }
}

fn parse_usize(key: &str, value: &str) -> Option<usize> {
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            error!("Invalid value for {}: {}", key, value);
            None
        }
    }
}

fn parse_dec(key: &str, value: &str) -> Option<Decimal> {
    match Decimal::from_str(value) {
        Ok(d) => Some(d),
        Err(_) => {
            error!("Invalid value for {}: {}", key, value);
            None
        }
    }
}

fn parse_flag(key: &str, value: &str) -> bool {
    match parse_bool(value) {
        Some(b) => b,
        None => {
            error!("Invalid bool argument for {}: {}", key, value);
            false
        }
    }
}

/// `ping [max_iter] [interval=N] [max_iter=N]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingData {
    pub interval: u64,
    pub iteration: u64,
    pub max_iter: Option<u64>,
}

impl Default for PingData {
    fn default() -> Self {
        Self {
            interval: 5,
            iteration: 0,
            max_iter: None,
        }
    }
}

impl PingData {
    pub fn map_options(&mut self, args: &[String], kwargs: &IndexMap<String, String>) {
        for arg in args {
            if let Some(n) = parse_u64("max_iter", arg) {
                self.max_iter = Some(n);
            }
        }
        for (k, v) in kwargs {
            match k.as_str() {
                "max_iter" => self.max_iter = parse_u64(k, v).or(self.max_iter),
                "interval" => self.interval = parse_u64(k, v).unwrap_or(self.interval),
                "desc" => {}
                _ => bad_arg(k),
            }
        }
    }
}

/// `crypto_ticker [exchange=] [symbol=]` (comma list allowed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerJobData {
    pub exchange: Option<String>,
    pub symbol: String,
}

impl Default for TickerJobData {
    fn default() -> Self {
        Self {
            exchange: None,
            symbol: "BTC/USDT".into(),
        }
    }
}

impl TickerJobData {
    pub fn map_options(&mut self, args: &[String], kwargs: &IndexMap<String, String>) {
        for arg in args {
            bad_arg(arg);
        }
        for (k, v) in kwargs {
            match k.as_str() {
                "exchange" => self.exchange = Some(v.clone()),
                "symbol" => self.symbol = v.clone(),
                "desc" => {}
                _ => bad_arg(k),
            }
        }
    }
}

/// `crypto_stats [exchange=] [symbol=] [timeframe=] [limit=]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsData {
    pub exchange: Option<String>,
    pub symbol: String,
    pub timeframe: String,
    pub limit: Option<usize>,
}

impl Default for StatsData {
    fn default() -> Self {
        Self {
            exchange: None,
            symbol: "BTC/USDT".into(),
            timeframe: "1h".into(),
            limit: None,
        }
    }
}

impl StatsData {
    pub fn map_options(&mut self, args: &[String], kwargs: &IndexMap<String, String>) {
        for arg in args {
            bad_arg(arg);
        }
        for (k, v) in kwargs {
            match k.as_str() {
                "exchange" => self.exchange = Some(v.clone()),
                "symbol" => self.symbol = v.clone(),
                "timeframe" => {
                    self.timeframe = if v.is_empty() { "1h".into() } else { v.clone() }
                }
                "limit" => self.limit = parse_usize(k, v).or(self.limit),
                "desc" => {}
                _ => bad_arg(k),
            }
        }
    }
}

/// `crypto_pf [exchange=] [symbol=]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PfData {
    pub exchange: Option<String>,
    pub symbol: Option<String>,
}

impl PfData {
    pub fn map_options(&mut self, args: &[String], kwargs: &IndexMap<String, String>) {
        for arg in args {
            bad_arg(arg);
        }
        for (k, v) in kwargs {
            match k.as_str() {
                "exchange" => self.exchange = Some(v.clone()),
                "symbol" => self.symbol = Some(v.clone()),
                "desc" => {}
                _ => bad_arg(k),
            }
        }
    }
}

/// `crypto_order buy|sell orderType* [symbol=] [quantity=] ...`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub exchange: Option<String>,
    pub order_completed: bool,
    pub order_side: Option<OrderSide>,
    pub order_type: OrderType,
    pub price: Decimal,
    pub quantity: Decimal,
    pub quote_order_qty: Option<Decimal>,
    pub simulate: bool,
    pub stop_price: Decimal,
    pub symbol: Option<String>,
    pub time_in_force: TimeInForce,
}

impl OrderData {
    pub fn map_options(&mut self, args: &[String], kwargs: &IndexMap<String, String>) {
        for arg in args {
            match arg.as_str() {
                "simulate" | "dry" => self.simulate = true,
                "buy" => self.order_side = Some(OrderSide::Buy),
                "sell" => self.order_side = Some(OrderSide::Sell),
                "orderTypeLimit" => self.order_type = OrderType::Limit,
                "orderTypeMarket" => self.order_type = OrderType::Market,
                "orderTypeStopLoss" => self.order_type = OrderType::StopLoss,
                "orderTypeStopLossLimit" => self.order_type = OrderType::StopLossLimit,
                "orderTypeTakeProfit" => self.order_type = OrderType::TakeProfit,
                "orderTypeTakeProfitLimit" => self.order_type = OrderType::TakeProfitLimit,
                _ => bad_arg(arg),
            }
        }
        for (k, v) in kwargs {
            match k.as_str() {
                "simulate" | "dry" => self.simulate = parse_flag(k, v),
                "exchange" => self.exchange = Some(v.clone()),
                "symbol" => self.symbol = Some(v.clone()),
                "quantity" => self.quantity = parse_dec(k, v).unwrap_or(self.quantity),
                "price" => self.price = parse_dec(k, v).unwrap_or(self.price),
                "quoteOrderQty" => self.quote_order_qty = parse_dec(k, v).or(self.quote_order_qty),
                "stopPrice" => self.stop_price = parse_dec(k, v).unwrap_or(self.stop_price),
                "desc" => {}
                _ => bad_arg(k),
            }
        }
    }
}

/// `crypto_tsl symbol= quantity= stopOffsetPrice(Pct)= ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TslData {
    pub above_initial_price: bool,
    pub above_initial_price_offset: Decimal,
    pub above_initial_price_offset_pct: Decimal,
    /// Trailing algorithm: `std1` (fixed offset) or `std2` (offset
    /// progressively tightened on every new high).
    pub algo: String,
    pub buy: bool,
    pub buy_completed: bool,
    pub exchange: Option<String>,
    pub initial_price: Decimal,
    pub interval: u64,
    pub iteration: u64,
    pub last_high: Option<Decimal>,
    pub last_high_by_user: Option<Decimal>,
    /// How far the `std2` offset has been clawed back so far, in percent
    /// of the base offset.
    pub offset_pct_raised_by: Decimal,
    pub quantity: Decimal,
    pub quote_order_qty: Option<Decimal>,
    pub reduce_stop_offset_price_by: Decimal,
    pub reduce_stop_offset_price_by_max: Decimal,
    pub simulate: bool,
    pub simulate_endless: bool,
    pub stop_loss: bool,
    pub stop_offset_price: Decimal,
    pub stop_offset_price_pct: Decimal,
    pub stop_price: Option<Decimal>,
    pub symbol: Option<String>,
    pub take_profit: Decimal,
    pub take_profit_pct: Decimal,
}

impl Default for TslData {
    fn default() -> Self {
        Self {
            above_initial_price: false,
            above_initial_price_offset: Decimal::ZERO,
            above_initial_price_offset_pct: Decimal::ZERO,
            algo: "std1".into(),
            buy: false,
            buy_completed: false,
            exchange: None,
            initial_price: Decimal::ZERO,
            interval: 60,
            iteration: 0,
            last_high: None,
            last_high_by_user: None,
            offset_pct_raised_by: Decimal::ZERO,
            quantity: Decimal::ZERO,
            quote_order_qty: None,
            reduce_stop_offset_price_by: Decimal::new(5, 1),
            reduce_stop_offset_price_by_max: Decimal::new(80, 0),
            simulate: false,
            simulate_endless: false,
            stop_loss: false,
            stop_offset_price: Decimal::ZERO,
            stop_offset_price_pct: Decimal::ZERO,
            stop_price: None,
            symbol: None,
            take_profit: Decimal::ZERO,
            take_profit_pct: Decimal::ZERO,
        }
    }
}

impl TslData {
    pub fn map_options(&mut self, args: &[String], kwargs: &IndexMap<String, String>) {
        for arg in args {
            match arg.as_str() {
                "simulate" | "dry" => self.simulate = true,
                "endless" => self.simulate_endless = true,
                "aboveInitialPrice" => self.above_initial_price = true,
                "buy" => self.buy = true,
                "stopLoss" => self.stop_loss = true,
                _ => bad_arg(arg),
            }
        }
        for (k, v) in kwargs {
            match k.as_str() {
                "simulate" | "dry" => self.simulate = parse_flag(k, v),
                "endless" => self.simulate_endless = parse_flag(k, v),
                "buy" => self.buy = parse_flag(k, v),
                "stopLoss" => self.stop_loss = parse_flag(k, v),
                "aboveInitialPrice" => {
                    self.above_initial_price = parse_flag(k, v)
                }
                "aboveInitialPriceOffset" => {
                    self.above_initial_price = true;
                    self.above_initial_price_offset =
                        parse_dec(k, v).unwrap_or(self.above_initial_price_offset);
                }
                "aboveInitialPriceOffsetPct" => {
                    self.above_initial_price = true;
                    self.above_initial_price_offset_pct =
                        parse_dec(k, v).unwrap_or(self.above_initial_price_offset_pct);
                }
                "algo" => self.algo = v.clone(),
                "exchange" => self.exchange = Some(v.clone()),
                "interval" => self.interval = parse_u64(k, v).unwrap_or(self.interval),
                "symbol" => self.symbol = Some(v.clone()),
                "quantity" => self.quantity = parse_dec(k, v).unwrap_or(self.quantity),
                "initialPrice" => self.initial_price = parse_dec(k, v).unwrap_or(self.initial_price),
                "lastHigh" => self.last_high_by_user = parse_dec(k, v).or(self.last_high_by_user),
                "stopOffsetPrice" => {
                    self.stop_offset_price = parse_dec(k, v).unwrap_or(self.stop_offset_price)
                }
                "stopOffsetPricePct" => {
                    self.stop_offset_price_pct =
                        parse_dec(k, v).unwrap_or(self.stop_offset_price_pct)
                }
                "takeProfit" => self.take_profit = parse_dec(k, v).unwrap_or(self.take_profit),
                "takeProfitPct" => {
                    self.take_profit_pct = parse_dec(k, v).unwrap_or(self.take_profit_pct)
                }
                "quoteOrderQty" => self.quote_order_qty = parse_dec(k, v).or(self.quote_order_qty),
                "desc" => {}
                _ => bad_arg(k),
            }
        }
    }
}

/// `cmc_latest [num=] [quote=] [sortby=]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmcLatestData {
    pub num: usize,
    pub quote: String,
    pub sortby: String,
}

impl Default for CmcLatestData {
    fn default() -> Self {
        Self {
            num: 50,
            quote: "BTC".into(),
            sortby: "percent_change_1h".into(),
        }
    }
}

impl CmcLatestData {
    pub fn map_options(&mut self, args: &[String], kwargs: &IndexMap<String, String>) {
        // `keys` / `raw` style bare flags are handled by the dispatcher
        for (k, v) in kwargs {
            match k.as_str() {
                "num" => self.num = parse_usize(k, v).unwrap_or(self.num),
                "quote" => self.quote = v.clone(),
                "sortby" => self.sortby = v.clone(),
                "desc" => {}
                _ => bad_arg(k),
            }
        }
        let _ = args;
    }
}

/// `bin_live [symbol=A,B] [streamAllTickers] [symbolsTrackAdd] [sortby=]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinLiveData {
    pub exchange: Option<String>,
    /// Momentum column the scored table is ordered by.
    pub sortby: String,
    pub stream_all_tickers: bool,
    pub symbols: Vec<String>,
    /// The explicitly-requested symbols, kept when `symbolsTrackAdd`
    /// merges them into refreshed lists.
    pub symbols_orig: Vec<String>,
    pub symbols_track_add: bool,
    pub track_cmc_latest: bool,
}

impl Default for BinLiveData {
    fn default() -> Self {
        Self {
            exchange: None,
            sortby: "5m".into(),
            stream_all_tickers: false,
            symbols: Vec::new(),
            symbols_orig: Vec::new(),
            symbols_track_add: false,
            track_cmc_latest: true,
        }
    }
}

impl BinLiveData {
    pub fn map_options(&mut self, args: &[String], kwargs: &IndexMap<String, String>) {
        for arg in args {
            match arg.as_str() {
                "streamAllTickers" => self.stream_all_tickers = true,
                "symbolsTrackAdd" => self.symbols_track_add = true,
                _ => bad_arg(arg),
            }
        }
        for (k, v) in kwargs {
            match k.as_str() {
                "exchange" => self.exchange = Some(v.clone()),
                "symbol" => {
                    self.symbols = v.split(',').map(|s| s.trim().to_string()).collect();
                }
                "sortby" => self.sortby = v.clone(),
                "streamAllTickers" => {
                    self.stream_all_tickers = parse_flag(k, v)
                }
                "symbolsTrackAdd" => self.symbols_track_add = parse_flag(k, v),
                "trackCmcLatest" => self.track_cmc_latest = parse_flag(k, v),
                "desc" => {}
                _ => bad_arg(k),
            }
        }
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
