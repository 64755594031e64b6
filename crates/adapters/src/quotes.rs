// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Market-wide quotes feed (latest listings).

use crate::exchange::ExchangeError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One listing row from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub symbol: String,
    pub name: String,
    pub price_usd: Decimal,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
    pub market_cap: f64,
}

impl Listing {
    /// Sort key by field name; unknown fields sort by 1h change.
    pub fn sort_value(&self, field: &str) -> f64 {
        match field {
            "percent_change_24h" => self.percent_change_24h,
            "market_cap" => self.market_cap,
            _ => self.percent_change_1h,
        }
    }
}

/// Adapter for the latest-listings upstream.
#[async_trait]
pub trait QuotesFeed: Send + Sync + 'static {
    async fn latest_listings(&self) -> Result<Vec<Listing>, ExchangeError>;
}

/// Static in-process listings, used when no real feed is configured.
#[derive(Clone, Default)]
pub struct PaperQuotes;

#[async_trait]
impl QuotesFeed for PaperQuotes {
    async fn latest_listings(&self) -> Result<Vec<Listing>, ExchangeError> {
        Ok(vec![
            Listing {
                symbol: "BTC".into(),
                name: "Bitcoin".into(),
                price_usd: Decimal::new(30_000, 0),
                percent_change_1h: 0.4,
                percent_change_24h: 2.1,
                market_cap: 6.0e11,
            },
            Listing {
                symbol: "ETH".into(),
                name: "Ethereum".into(),
                price_usd: Decimal::new(2_000, 0),
                percent_change_1h: 1.2,
                percent_change_24h: -0.8,
                market_cap: 2.4e11,
            },
            Listing {
                symbol: "SOL".into(),
                name: "Solana".into(),
                price_usd: Decimal::new(150, 0),
                percent_change_1h: -0.3,
                percent_change_24h: 5.6,
                market_cap: 6.5e10,
            },
        ])
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fake quotes feed serving scripted listings.
    #[derive(Clone, Default)]
    pub struct FakeQuotes {
        listings: Arc<Mutex<Vec<Listing>>>,
    }

    impl FakeQuotes {
        pub fn new(listings: Vec<Listing>) -> Self {
            Self {
                listings: Arc::new(Mutex::new(listings)),
            }
        }
    }

    #[async_trait]
    impl QuotesFeed for FakeQuotes {
        async fn latest_listings(&self) -> Result<Vec<Listing>, ExchangeError> {
            Ok(self.listings.lock().clone())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeQuotes;

#[cfg(test)]
#[path = "quotes_tests.rs"]
mod tests;
