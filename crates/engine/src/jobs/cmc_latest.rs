// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cmc_latest`: pull the latest listings from the quotes feed, filter
//! to symbols known to the MemStore, and print the movers.

use super::{JobCtx, JobFuture};
use crate::task::Task;
use serde_json::{json, Value};
use std::sync::Arc;
use tbot_core::payload::{CmcLatestData, JobPayload};
use tbot_core::EventName;

pub fn job_cmc_latest(ctx: JobCtx, task: Arc<Task>) -> JobFuture {
    Box::pin(async move {
        task.printer(format!("Launching task #{} {}", task.id, task.name));
        task.init_data(JobPayload::CmcLatest(CmcLatestData::default()));

        let data = task.with_data(|data| match data {
            Some(JobPayload::CmcLatest(d)) => d.clone(),
            _ => CmcLatestData::default(),
        });

        task.printer(format!("Quote = {}", data.quote));
        task.printer(format!("Sort by = {}", data.sortby));

        let mut listings = match ctx.quotes.latest_listings().await {
            Ok(listings) => listings,
            Err(e) => {
                task.printer_error(format!("cmc_latest: {e}"));
                task.set_finished();
                return Ok(());
            }
        };

        listings.sort_by(|a, b| {
            b.sort_value(&data.sortby)
                .total_cmp(&a.sort_value(&data.sortby))
        });

        // Keep only symbols some tracked exchange actually lists
        let symbols = ctx
            .memstore
            .get("symbols")
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        if symbols.is_empty() {
            task.printer_warning("cmc_latest: memstore symbols are empty");
        } else {
            listings.retain(|l| {
                symbols
                    .get(&l.symbol)
                    .and_then(Value::as_array)
                    .is_some_and(|venues| !venues.is_empty())
            });
        }

        task.printer(format!("TOP {}", data.sortby));
        let mut top_symbols: Vec<String> = Vec::new();
        for (idx, listing) in listings.iter().take(data.num).enumerate() {
            let venues = listed_venues(&ctx, &symbols, &listing.symbol);
            let markets: Vec<String> = venues
                .iter()
                .map(|(venue, quotes)| format!("{}: {}", venue, quotes.join(",")))
                .collect();
            task.printer(format!(
                "{}) {} {:+.2}% (USD {}) [{}]",
                idx + 1,
                listing.symbol,
                listing.sort_value(&data.sortby),
                listing.price_usd,
                markets.join("; "),
            ));

            // Only symbols actually listed on a tracked venue become
            // pairs, quoted per what that venue carries
            if let Some((_, quotes)) = venues.first() {
                let quote = pick_quote(&data.quote, quotes);
                top_symbols.push(format!("{}/{}", listing.symbol, quote));
            }
        }

        ctx.memstore
            .add("cmc_latest_symbols", json!(top_symbols));
        ctx.bus
            .emit(EventName::CmcLatestUpdate, json!(top_symbols));

        task.set_finished();
        Ok(())
    })
}

/// Venues tracking `symbol`, each with the quote currencies it lists the
/// symbol against (from the `<venue>:symbols` MemStore sections).
fn listed_venues(
    ctx: &JobCtx,
    symbols: &serde_json::Map<String, Value>,
    symbol: &str,
) -> Vec<(String, Vec<String>)> {
    let Some(venues) = symbols.get(symbol).and_then(Value::as_array) else {
        return Vec::new();
    };
    venues
        .iter()
        .filter_map(Value::as_str)
        .map(|venue| {
            let quotes = ctx
                .memstore
                .get(&format!("{venue}:symbols"))
                .and_then(|pairs| pairs.get(symbol).cloned())
                .and_then(|quotes| quotes.as_array().cloned())
                .map(|quotes| {
                    quotes
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            (venue.to_string(), quotes)
        })
        .collect()
}

/// The configured quote when the venue lists it, else the first of
/// BTC/USDT/BUSD it does list, else the configured quote as-is.
fn pick_quote(preferred: &str, quotes: &[String]) -> String {
    if quotes.iter().any(|q| q == preferred) {
        return preferred.to_string();
    }
    for fallback in ["BTC", "USDT", "BUSD"] {
        if quotes.iter().any(|q| q == fallback) {
            return fallback.to_string();
        }
    }
    preferred.to_string()
}

#[cfg(test)]
#[path = "cmc_latest_tests.rs"]
mod tests;
