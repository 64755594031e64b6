// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::{FakeExchange, PaperExchange};
use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn paper_registry(default: Option<&str>) -> ExchangeRegistry {
    ExchangeRegistry::new(default.map(String::from), |id| {
        Ok(Arc::new(PaperExchange::new(id)))
    })
}

#[test]
fn resolves_explicit_id() {
    let registry = paper_registry(None);
    let exch = registry.get_or_create(Some("binance")).unwrap();
    assert_eq!(exch.id(), "binance");
}

#[test]
fn falls_back_to_default_exchange() {
    let registry = paper_registry(Some("paper"));
    assert_eq!(registry.get_or_create(None).unwrap().id(), "paper");
    assert_eq!(registry.get_or_create(Some("")).unwrap().id(), "paper");
}

#[test]
fn no_default_is_an_error() {
    let registry = paper_registry(None);
    assert!(matches!(
        registry.get_or_create(None),
        Err(ExchangeError::NoExchangeSelected)
    ));
}

#[test]
fn instances_are_shared() {
    static BUILDS: AtomicUsize = AtomicUsize::new(0);
    let registry = ExchangeRegistry::new(None, |id| {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(PaperExchange::new(id)))
    });

    let a = registry.get_or_create(Some("x")).unwrap();
    let b = registry.get_or_create(Some("x")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn close_all_closes_and_drops() {
    let fake = FakeExchange::new("fake");
    let fake_for_factory = fake.clone();
    let registry = ExchangeRegistry::new(None, move |_| Ok(Arc::new(fake_for_factory.clone())));

    registry.get_or_create(Some("fake")).unwrap();
    registry.close_all().await;
    assert!(fake.is_closed());

    // A later lookup builds a fresh instance
    let again = registry.get_or_create(Some("fake")).unwrap();
    assert_eq!(again.id(), "fake");
}
