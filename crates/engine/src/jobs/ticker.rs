// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `crypto_ticker`: one-shot ticker fetch into the MemStore.

use super::{JobCtx, JobFuture};
use crate::task::Task;
use std::sync::Arc;
use tbot_core::payload::{JobPayload, TickerJobData};
use tracing::debug;

pub fn job_crypto_ticker(ctx: JobCtx, task: Arc<Task>) -> JobFuture {
    Box::pin(async move {
        task.printer(format!("Launching task #{} {}", task.id, task.name));
        task.init_data(JobPayload::CryptoTicker(TickerJobData::default()));

        let (exchange, symbol) = task.with_data(|data| match data {
            Some(JobPayload::CryptoTicker(d)) => (d.exchange.clone(), d.symbol.clone()),
            _ => (None, TickerJobData::default().symbol),
        });

        let exch = match ctx.exchange(exchange.as_deref()).await {
            Ok(exch) => exch,
            Err(e) => {
                task.printer_error(format!("ExchangeError: {e}"));
                task.set_finished();
                return Ok(());
            }
        };

        // Remember which venue actually served us
        task.with_data(|data| {
            if let Some(JobPayload::CryptoTicker(d)) = data {
                d.exchange = Some(exch.id().to_string());
            }
        });

        let result = if symbol.contains(',') {
            task.printer_warning("crypto_ticker: Using multiple tickers (weight=40)");
            let symbols: Vec<String> = symbol.split(',').map(|s| s.trim().to_string()).collect();
            exch.fetch_tickers(&symbols).await
        } else {
            exch.fetch_ticker(&symbol).await.map(|t| vec![t])
        };

        match result {
            Ok(tickers) => {
                for ticker in tickers {
                    debug!("crypto_ticker = {:?}", ticker);
                    if let Ok(value) = serde_json::to_value(&ticker) {
                        ctx.memstore.add_ticker(exch.id(), value);
                    }
                }
            }
            Err(e) => {
                task.printer_error(format!("ExchangeError: {e}"));
            }
        }

        task.set_finished();
        Ok(())
    })
}

#[cfg(test)]
#[path = "ticker_tests.rs"]
mod tests;
