// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `crypto_order`: validate and place (or simulate) a single order.

use super::{JobCtx, JobFuture};
use crate::task::Task;
use serde_json::json;
use std::sync::Arc;
use tbot_adapters::OrderRequest;
use tbot_core::payload::{JobPayload, OrderData};
use tbot_core::{EventName, OrderType};

pub fn job_crypto_order(ctx: JobCtx, task: Arc<Task>) -> JobFuture {
    Box::pin(async move {
        task.printer(format!("Launching task #{} {}", task.id, task.name));
        task.init_data(JobPayload::CryptoOrder(OrderData::default()));

        let data = task.with_data(|data| match data {
            Some(JobPayload::CryptoOrder(d)) => d.clone(),
            _ => OrderData::default(),
        });

        let Some(side) = data.order_side else {
            task.printer_error("Order side BUY or SELL is required!");
            task.set_finished();
            return Ok(());
        };

        if data.order_type.needs_stop_price() && data.stop_price.is_zero() {
            task.printer_error("stopPrice is required for this order type");
            task.set_finished();
            return Ok(());
        }

        if data.order_type.needs_price() && data.price.is_zero() {
            task.printer_error("price is required for this order type");
            task.set_finished();
            return Ok(());
        }

        // Market orders may size by quote spend; everything else needs an
        // explicit base amount
        if data.order_type == OrderType::Market {
            if data.quantity.is_zero() && data.quote_order_qty.is_none() {
                task.printer_error("quantity or quoteOrderQty is required");
                task.set_finished();
                return Ok(());
            }
        } else if data.quantity.is_zero() {
            task.printer_error("quantity is required for this order type");
            task.set_finished();
            return Ok(());
        }

        let Some(symbol) = data.symbol.clone() else {
            task.printer_error("symbol is required");
            task.set_finished();
            return Ok(());
        };

        let request = OrderRequest {
            symbol: symbol.clone(),
            side,
            order_type: data.order_type,
            quantity: data.quantity,
            quote_order_qty: data.quote_order_qty,
            price: (!data.price.is_zero()).then_some(data.price),
            stop_price: (!data.stop_price.is_zero()).then_some(data.stop_price),
            time_in_force: data.time_in_force,
        };

        task.printer(format!(
            "{} {} {} {} (tif {})",
            side, data.order_type, data.quantity, symbol, data.time_in_force
        ));

        if data.simulate {
            let body = task.printer("Simulated order, nothing sent");
            let _ = ctx.mailer.send(&body).await;
            task.set_finished();
            return Ok(());
        }

        let exch = match ctx.exchange(data.exchange.as_deref()).await {
            Ok(exch) => exch,
            Err(e) => {
                task.printer_error(format!("ExchangeError: {e}"));
                task.set_finished();
                return Ok(());
            }
        };

        match exch.create_order(&request).await {
            Ok(order) => {
                let body = task.printer(format!(
                    "Order {}: {} {} {} @ {} ({:?})",
                    order.id, order.side, order.amount, order.symbol, order.price, order.status
                ));
                task.with_data(|data| {
                    if let Some(JobPayload::CryptoOrder(d)) = data {
                        d.order_completed = true;
                    }
                });
                ctx.bus.emit(
                    EventName::CryptoOrder,
                    json!({
                        "taskId": task.id,
                        "order": serde_json::to_value(&order).unwrap_or_default(),
                    }),
                );
                if let Err(e) = ctx.mailer.send(&body).await {
                    task.printer_error(format!("mail: {e}"));
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
#[path = "order_tests.rs"]
mod tests;
