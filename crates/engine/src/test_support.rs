// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake-backed wiring for runtime tests.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::bus::Bus;
use crate::jobs::{JobCtx, JobRegistry};
use crate::manager::TaskManager;
use crate::memstore::MemStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use tbot_adapters::{ExchangeRegistry, FakeExchange, FakeMailer, FakeQuotes, Listing};

/// A JobCtx wired to fakes, with handles onto each fake.
pub struct TestCtx {
    pub ctx: JobCtx,
    pub bus: Bus,
    pub memstore: Arc<MemStore>,
    pub exchange: FakeExchange,
    pub mailer: FakeMailer,
    pub quotes: FakeQuotes,
}

/// Build a ctx whose exchange registry serves one shared [`FakeExchange`]
/// under any id, with `fake` as the default exchange.
pub fn fake_ctx() -> TestCtx {
    let bus = Bus::new();
    let memstore = Arc::new(MemStore::new(bus.clone()));
    let exchange = FakeExchange::new("fake");
    let mailer = FakeMailer::new();
    let quotes = FakeQuotes::new(sample_listings());

    let registry_exchange = exchange.clone();
    let exchanges = Arc::new(ExchangeRegistry::new(Some("fake".into()), move |_| {
        Ok(Arc::new(registry_exchange.clone()))
    }));

    let ctx = JobCtx {
        bus: bus.clone(),
        memstore: Arc::clone(&memstore),
        exchanges,
        quotes: Arc::new(quotes.clone()),
        mailer: Arc::new(mailer.clone()),
    };

    TestCtx {
        ctx,
        bus,
        memstore,
        exchange,
        mailer,
        quotes,
    }
}

/// The listings the fake quotes feed serves: BTC, ETH (best 1h), SOL
/// (best 24h).
pub fn sample_listings() -> Vec<Listing> {
    vec![
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
    ]
}

/// A manager over the fake ctx and the builtin job table.
pub fn fake_manager() -> (Arc<TaskManager>, TestCtx) {
    let test_ctx = fake_ctx();
    let manager = TaskManager::new(test_ctx.ctx.clone(), JobRegistry::builtin());
    (manager, test_ctx)
}
