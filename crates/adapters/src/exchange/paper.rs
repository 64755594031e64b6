// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulated in-process exchange.
//!
//! Prices follow a seeded random walk around reference levels, market
//! orders fill instantly at the simulated price, and balances update
//! accordingly. Used when no real venue is configured and for dry runs.

use super::{
    Balance, Candle, ExchangeAdapter, ExchangeError, Market, Order, OrderRequest, OrderStatus,
    Ticker,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tbot_core::{util, OrderSide, OrderType};
use tokio::sync::mpsc;

/// Walk step bound per tick, as a fraction of the current price.
const WALK_STEP: f64 = 0.005;

/// Stream tick period.
const STREAM_TICK: std::time::Duration = std::time::Duration::from_secs(1);

struct PaperState {
    rng: StdRng,
    prices: BTreeMap<String, Decimal>,
    balances: BTreeMap<String, Decimal>,
    order_seq: u64,
}

/// Deterministic simulated exchange.
#[derive(Clone)]
pub struct PaperExchange {
    id: String,
    markets: Vec<Market>,
    state: Arc<Mutex<PaperState>>,
}

impl PaperExchange {
    /// Create with a seed derived from the id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let seed = id.bytes().fold(0u64, |acc, b| {
            acc.wrapping_mul(31).wrapping_add(b as u64)
        });
        Self::with_seed(id, seed)
    }

    pub fn with_seed(id: impl Into<String>, seed: u64) -> Self {
        let mut prices = BTreeMap::new();
        prices.insert("BTC/USDT".to_string(), Decimal::new(30_000, 0));
        prices.insert("ETH/USDT".to_string(), Decimal::new(2_000, 0));
        prices.insert("SOL/USDT".to_string(), Decimal::new(150, 0));
        prices.insert("ETH/BTC".to_string(), Decimal::new(66, 3));

        let mut balances = BTreeMap::new();
        balances.insert("USDT".to_string(), Decimal::new(100_000, 0));
        balances.insert("BTC".to_string(), Decimal::ONE);
        balances.insert("ETH".to_string(), Decimal::TEN);

        let markets = prices
            .keys()
            .map(|symbol| {
                let (base, quote) = symbol.split_once('/').unwrap_or((symbol.as_str(), ""));
                Market {
                    symbol: symbol.clone(),
                    base: base.to_string(),
                    quote: quote.to_string(),
                    active: true,
                    price_precision: 2,
                    amount_precision: 6,
                }
            })
            .collect();

        Self {
            id: id.into(),
            markets,
            state: Arc::new(Mutex::new(PaperState {
                rng: StdRng::seed_from_u64(seed),
                prices,
                balances,
                order_seq: 0,
            })),
        }
    }

    /// Pin a symbol's simulated price (tests and dry-run setups).
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.state.lock().prices.insert(symbol.to_string(), price);
    }

    fn step_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let mut state = self.state.lock();
        let current = *state
            .prices
            .get(symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?;
        let step: f64 = state.rng.random_range(-WALK_STEP..WALK_STEP);
        let factor = Decimal::from_f64(1.0 + step).unwrap_or(Decimal::ONE);
        let next = (current * factor).round_dp(8);
        state.prices.insert(symbol.to_string(), next);
        Ok(next)
    }

    fn ticker_at(&self, symbol: &str, last: Decimal) -> Ticker {
        let spread = (last * Decimal::new(1, 3)).round_dp(8); // 0.1%
        Ticker {
            symbol: symbol.to_string(),
            last,
            bid: last - spread,
            ask: last + spread,
            high: last + spread * Decimal::TWO,
            low: last - spread * Decimal::TWO,
            base_volume: Decimal::new(1_000, 0),
            timestamp: util::unix_now(),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchange {
    fn id(&self) -> &str {
        &self.id
    }

    async fn load_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        Ok(self.markets.clone())
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let last = self.step_price(symbol)?;
        Ok(self.ticker_at(symbol, last))
    }

    async fn fetch_tickers(&self, symbols: &[String]) -> Result<Vec<Ticker>, ExchangeError> {
        let mut tickers = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            tickers.push(self.fetch_ticker(symbol).await?);
        }
        Ok(tickers)
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        _timeframe: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let count = limit.unwrap_or(100);
        let mut candles = Vec::with_capacity(count);
        let now_ms = (util::unix_now() * 1000.0) as i64;

        for i in 0..count {
            let close = self.step_price(symbol)?.to_f64().unwrap_or(0.0);
            let open = close * 0.999;
            candles.push(Candle {
                ts: now_ms - ((count - i) as i64) * 60_000,
                open,
                high: close * 1.002,
                low: open * 0.998,
                close,
                volume: 100.0,
            });
        }
        Ok(candles)
    }

    async fn fetch_balance(&self) -> Result<Balance, ExchangeError> {
        let state = self.state.lock();
        Ok(Balance {
            total: state.balances.clone(),
            free: state.balances.clone(),
        })
    }

    async fn create_order(&self, req: &OrderRequest) -> Result<Order, ExchangeError> {
        let market = self
            .market(&req.symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(req.symbol.clone()))?;

        let last = self.step_price(&req.symbol)?;
        let fill_price = match req.order_type {
            OrderType::Market => last,
            _ => req.price.unwrap_or(last),
        };

        // quoteOrderQty buys spend quote currency instead of naming an amount
        let amount = match req.quote_order_qty {
            Some(quote_qty) if req.quantity.is_zero() && !fill_price.is_zero() => {
                (quote_qty / fill_price).round_dp(market.amount_precision)
            }
            _ => req.quantity,
        };

        let mut state = self.state.lock();
        state.order_seq += 1;
        let id = format!("paper-{}", state.order_seq);

        // Only market orders fill instantly; everything else rests
        let status = match req.order_type {
            OrderType::Market => OrderStatus::Filled,
            _ => OrderStatus::New,
        };

        if status == OrderStatus::Filled {
            let quote_spent = fill_price * amount;
            let (base_delta, quote_delta) = match req.side {
                OrderSide::Buy => (amount, -quote_spent),
                OrderSide::Sell => (-amount, quote_spent),
            };
            *state.balances.entry(market.base.clone()).or_default() += base_delta;
            *state.balances.entry(market.quote.clone()).or_default() += quote_delta;
        }

        Ok(Order {
            id,
            symbol: req.symbol.clone(),
            side: req.side,
            order_type: req.order_type,
            status,
            price: fill_price,
            amount,
            filled: if status == OrderStatus::Filled {
                amount
            } else {
                Decimal::ZERO
            },
            timestamp: util::unix_now(),
        })
    }

    async fn watch_tickers(
        &self,
        symbols: &[String],
    ) -> Result<mpsc::Receiver<Ticker>, ExchangeError> {
        let (tx, rx) = mpsc::channel(64);
        let this = self.clone();
        let symbols = symbols.to_vec();

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(STREAM_TICK);
            loop {
                tick.tick().await;
                for symbol in &symbols {
                    let ticker = match this.step_price(symbol) {
                        Ok(last) => this.ticker_at(symbol, last),
                        Err(_) => continue,
                    };
                    if tx.send(ticker).await.is_err() {
                        return; // consumer gone
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn close(&self) -> Result<(), ExchangeError> {
        Ok(())
    }

    fn market(&self, symbol: &str) -> Option<Market> {
        self.markets.iter().find(|m| m.symbol == symbol).cloned()
    }
}

#[cfg(test)]
#[path = "paper_tests.rs"]
mod tests;
