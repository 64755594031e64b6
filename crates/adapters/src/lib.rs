// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tbot-adapters: external collaborators behind traits.
//!
//! Exchanges, the quotes feed, and the mail notifier are out-of-process
//! services. Each gets a trait, a production-shaped implementation, and a
//! fake (behind the `test-support` feature) that records calls.

pub mod exchange;
pub mod mail;
pub mod quotes;

pub use exchange::{
    Balance, Candle, ExchangeAdapter, ExchangeError, ExchangeRegistry, Market, Order,
    OrderRequest, OrderStatus, PaperExchange, SharedExchange, Ticker,
};
pub use mail::{MailError, Mailer, NoopMailer};
pub use quotes::{Listing, PaperQuotes, QuotesFeed};

#[cfg(any(test, feature = "test-support"))]
pub use exchange::FakeExchange;
#[cfg(any(test, feature = "test-support"))]
pub use mail::FakeMailer;
#[cfg(any(test, feature = "test-support"))]
pub use quotes::FakeQuotes;
