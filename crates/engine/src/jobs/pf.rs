// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `crypto_pf`: print the non-zero balance totals.

use super::{JobCtx, JobFuture};
use crate::task::Task;
use std::sync::Arc;
use tbot_core::payload::{JobPayload, PfData};

pub fn job_crypto_pf(ctx: JobCtx, task: Arc<Task>) -> JobFuture {
    Box::pin(async move {
        task.printer(format!("Launching task #{} {}", task.id, task.name));
        task.init_data(JobPayload::CryptoPf(PfData::default()));

        let exchange = task.with_data(|data| match data {
            Some(JobPayload::CryptoPf(d)) => d.exchange.clone(),
            _ => None,
        });

        let exch = match ctx.exchange(exchange.as_deref()).await {
            Ok(exch) => exch,
            Err(e) => {
                task.printer_error(format!("ExchangeError: {e}"));
                task.set_finished();
                return Ok(());
            }
        };

        match exch.fetch_balance().await {
            Ok(balance) => {
                for (currency, total) in &balance.total {
                    if !total.is_zero() {
                        task.printer(format!("{currency}: {total}"));
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
