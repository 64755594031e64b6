// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake exchange adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    Balance, Candle, ExchangeAdapter, ExchangeError, Market, Order, OrderRequest, OrderStatus,
    Ticker,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use tbot_core::util;
use tokio::sync::mpsc;

struct FakeExchangeState {
    tickers: VecDeque<Ticker>,
    candles: Vec<Candle>,
    balance: Balance,
    orders: Vec<OrderRequest>,
    stream: Option<mpsc::Receiver<Ticker>>,
    fail_next: Option<String>,
    closed: bool,
}

/// Fake exchange adapter recording every call.
#[derive(Clone)]
pub struct FakeExchange {
    id: String,
    inner: Arc<Mutex<FakeExchangeState>>,
}

impl FakeExchange {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Arc::new(Mutex::new(FakeExchangeState {
                tickers: VecDeque::new(),
                candles: Vec::new(),
                balance: Balance::default(),
                orders: Vec::new(),
                stream: None,
                fail_next: None,
                closed: false,
            })),
        }
    }

    /// Simple ticker with the given last price.
    pub fn ticker(symbol: &str, last: Decimal) -> Ticker {
        Ticker {
            symbol: symbol.to_string(),
            last,
            bid: last,
            ask: last,
            high: last,
            low: last,
            base_volume: Decimal::ZERO,
            timestamp: util::unix_now(),
        }
    }

    /// Queue a ticker to be served by the next fetch.
    pub fn push_ticker(&self, ticker: Ticker) {
        self.inner.lock().tickers.push_back(ticker);
    }

    pub fn set_candles(&self, candles: Vec<Candle>) {
        self.inner.lock().candles = candles;
    }

    pub fn set_balance(&self, balance: Balance) {
        self.inner.lock().balance = balance;
    }

    /// Hand the receiver that `watch_tickers` will return.
    pub fn set_stream(&self, rx: mpsc::Receiver<Ticker>) {
        self.inner.lock().stream = Some(rx);
    }

    /// Make the next call fail with `NotAvailable(msg)`.
    pub fn fail_next(&self, msg: impl Into<String>) {
        self.inner.lock().fail_next = Some(msg.into());
    }

    /// Orders placed so far.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.inner.lock().orders.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn take_failure(&self) -> Result<(), ExchangeError> {
        match self.inner.lock().fail_next.take() {
            Some(msg) => Err(ExchangeError::NotAvailable(msg)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for FakeExchange {
    fn id(&self) -> &str {
        &self.id
    }

    async fn load_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        self.take_failure()?;
        Ok(vec![Market {
            symbol: "BTC/USDT".into(),
            base: "BTC".into(),
            quote: "USDT".into(),
            active: true,
            price_precision: 2,
            amount_precision: 6,
        }])
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        self.take_failure()?;
        self.inner
            .lock()
            .tickers
            .pop_front()
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<Vec<Ticker>, ExchangeError> {
        let mut out = Vec::new();
        for symbol in symbols {
            out.push(self.fetch_ticker(symbol).await?);
        }
        Ok(out)
    }

    async fn fetch_ohlcv(
        &self,
        _symbol: &str,
        _timeframe: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.take_failure()?;
        let candles = self.inner.lock().candles.clone();
        Ok(match limit {
            Some(n) if n < candles.len() => candles[candles.len() - n..].to_vec(),
            _ => candles,
        })
    }

    async fn fetch_balance(&self) -> Result<Balance, ExchangeError> {
        self.take_failure()?;
        Ok(self.inner.lock().balance.clone())
    }

    async fn create_order(&self, req: &OrderRequest) -> Result<Order, ExchangeError> {
        self.take_failure()?;
        let mut state = self.inner.lock();
        state.orders.push(req.clone());
        Ok(Order {
            id: format!("fake-{}", state.orders.len()),
            symbol: req.symbol.clone(),
            side: req.side,
            order_type: req.order_type,
            status: OrderStatus::Filled,
            price: req.price.unwrap_or(Decimal::ZERO),
            amount: req.quantity,
            filled: req.quantity,
            timestamp: util::unix_now(),
        })
    }

    async fn watch_tickers(
        &self,
        _symbols: &[String],
    ) -> Result<mpsc::Receiver<Ticker>, ExchangeError> {
        self.take_failure()?;
        self.inner
            .lock()
            .stream
            .take()
            .ok_or_else(|| ExchangeError::Stream("no fake stream queued".into()))
    }

    async fn close(&self) -> Result<(), ExchangeError> {
        self.inner.lock().closed = true;
        Ok(())
    }

    fn market(&self, symbol: &str) -> Option<Market> {
        Some(Market {
            symbol: symbol.to_string(),
            base: symbol.split('/').next().unwrap_or("").to_string(),
            quote: symbol.split('/').nth(1).unwrap_or("").to_string(),
            active: true,
            price_precision: 2,
            amount_precision: 6,
        })
    }
}
