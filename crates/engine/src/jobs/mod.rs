// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job implementations and the name → function registry.
//!
//! A job is an async function `(JobCtx, Arc<Task>) -> Result<(), JobError>`
//! boxed behind [`JobFn`]. The registry late-binds command names to
//! implementations; `reload` re-installs the builtin entry atomically so
//! subsequent starts pick it up while running tasks are untouched.

pub mod bin_live;
pub mod cmc_latest;
pub mod order;
pub mod pf;
pub mod ping;
pub mod stats;
pub mod ticker;
pub mod tsl;

use crate::bus::Bus;
use crate::error::JobError;
use crate::memstore::MemStore;
use crate::task::Task;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tbot_adapters::{ExchangeRegistry, Mailer, QuotesFeed, SharedExchange};

/// Everything a job can reach: the application container, passed by
/// reference instead of process-wide globals.
#[derive(Clone)]
pub struct JobCtx {
    pub bus: Bus,
    pub memstore: Arc<MemStore>,
    pub exchanges: Arc<ExchangeRegistry>,
    pub quotes: Arc<dyn QuotesFeed>,
    pub mailer: Arc<dyn Mailer>,
}

impl JobCtx {
    /// Resolve an exchange, load its markets, and record the symbols in
    /// the MemStore (`symbols` and `<id>:symbols` sections).
    pub async fn exchange(&self, id: Option<&str>) -> Result<SharedExchange, JobError> {
        let exch = self.exchanges.get_or_create(id)?;

        let markets = exch.load_markets().await?;
        let mut symbols = self
            .memstore
            .get("symbols")
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        let mut pairs = serde_json::Map::new();

        for market in markets.iter().filter(|m| m.active) {
            for currency in [&market.base, &market.quote] {
                let venues = symbols
                    .entry(currency.clone())
                    .or_insert_with(|| serde_json::Value::Array(vec![]));
                if let Some(list) = venues.as_array_mut() {
                    let id = serde_json::Value::String(exch.id().to_string());
                    if !list.contains(&id) {
                        list.push(id);
                    }
                }
            }
            let quotes = pairs
                .entry(market.base.clone())
                .or_insert_with(|| serde_json::Value::Array(vec![]));
            if let Some(list) = quotes.as_array_mut() {
                list.push(serde_json::Value::String(market.quote.clone()));
            }
        }

        self.memstore.add("symbols", serde_json::Value::Object(symbols));
        self.memstore.add(
            format!("{}:symbols", exch.id()),
            serde_json::Value::Object(pairs),
        );
        Ok(exch)
    }
}

/// Boxed job future.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>>;

/// A runnable job implementation.
pub type JobFn = fn(JobCtx, Arc<Task>) -> JobFuture;

/// The compiled-in jobs, by lower-case command name.
fn builtin_table() -> &'static [(&'static str, JobFn)] {
    &[
        ("ping", ping::job_ping),
        ("bin_live", bin_live::job_bin_live),
        ("cmc_latest", cmc_latest::job_cmc_latest),
        ("crypto_order", order::job_crypto_order),
        ("crypto_pf", pf::job_crypto_pf),
        ("crypto_stats", stats::job_crypto_stats),
        ("crypto_ticker", ticker::job_crypto_ticker),
        ("crypto_tsl", tsl::job_crypto_tsl),
    ]
}

/// Name → implementation mapping.
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobFn>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl JobRegistry {
    /// Registry with every compiled-in job installed.
    pub fn builtin() -> Self {
        let jobs = builtin_table()
            .iter()
            .map(|(name, f)| (name.to_string(), *f))
            .collect();
        Self {
            jobs: Mutex::new(jobs),
        }
    }

    pub fn get(&self, name: &str) -> Option<JobFn> {
        self.jobs.lock().get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.lock().contains_key(name)
    }

    /// Install (or replace) an entry. Used by tests to stub jobs.
    pub fn register(&self, name: impl Into<String>, job: JobFn) {
        self.jobs.lock().insert(name.into(), job);
    }

    /// Re-install the builtin implementation for `name`. Tasks already
    /// running keep the function they started with.
    pub fn reload(&self, name: &str) -> Result<(), String> {
        match builtin_table().iter().find(|(n, _)| *n == name) {
            Some((n, f)) => {
                self.jobs.lock().insert(n.to_string(), *f);
                Ok(())
            }
            None => Err(format!("unknown job: {name}")),
        }
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
