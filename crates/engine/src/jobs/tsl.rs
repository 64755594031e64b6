// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `crypto_tsl`: trailing stop-loss loop.
//!
//! Tracks the high-water mark of the symbol and keeps a stop price one
//! offset below it. When the price falls through the stop (or reaches
//! the take-profit level) the position is sold, or in simulate mode the
//! sale is only printed, and the loop ends.

use super::{JobCtx, JobFuture};
use crate::error::JobError;
use crate::periodic::{Periodic, RunStatus};
use crate::task::Task;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tbot_adapters::{OrderRequest, SharedExchange};
use tbot_core::payload::{JobPayload, TslData};
use tbot_core::{EventName, OrderSide, OrderType, TimeInForce};

pub fn job_crypto_tsl(ctx: JobCtx, task: Arc<Task>) -> JobFuture {
    Box::pin(async move {
        task.printer(format!("Launching task #{} {}", task.id, task.name));
        task.init_data(JobPayload::CryptoTsl(TslData::default()));

        let data = snapshot(&task);

        if data.stop_offset_price.is_zero() && data.stop_offset_price_pct.is_zero() {
            task.printer_error("stopOffsetPrice(Pct) must be > 0");
            task.set_finished();
            return Ok(());
        }
        let Some(symbol) = data.symbol.clone() else {
            task.printer_error("symbol is required");
            task.set_finished();
            return Ok(());
        };

        let exch = match ctx.exchange(data.exchange.as_deref()).await {
            Ok(exch) => exch,
            Err(e) => {
                task.printer_error(format!("ExchangeError: {e}"));
                task.set_finished();
                return Ok(());
            }
        };

        // Optional entry: buy first, then trail the stop from the fill
        if data.buy && !data.buy_completed {
            match enter_position(&ctx, &task, &exch, &symbol, &data).await {
                Ok(()) => {}
                Err(e) => {
                    task.printer_error(format!("ExchangeError: {e}"));
                    task.set_finished();
                    return Ok(());
                }
            }
        }

        let step_ctx = ctx.clone();
        let step_task = Arc::clone(&task);
        let step_exch = Arc::clone(&exch);
        let step_symbol = symbol.clone();
        Periodic::new(None)
            .run(Some(&task), move || {
                let ctx = step_ctx.clone();
                let task = Arc::clone(&step_task);
                let exch = Arc::clone(&step_exch);
                let symbol = step_symbol.clone();
                async move { tsl_step(&ctx, &task, &exch, &symbol).await }
            })
            .await;

        task.set_finished();
        Ok(())
    })
}

fn snapshot(task: &Task) -> TslData {
    task.with_data(|data| match data {
        Some(JobPayload::CryptoTsl(d)) => d.clone(),
        _ => TslData::default(),
    })
}

fn update<R>(task: &Task, f: impl FnOnce(&mut TslData) -> R) -> Option<R> {
    task.with_data(|data| match data {
        Some(JobPayload::CryptoTsl(d)) => Some(f(d)),
        _ => None,
    })
}

async fn enter_position(
    ctx: &JobCtx,
    task: &Task,
    exch: &SharedExchange,
    symbol: &str,
    data: &TslData,
) -> Result<(), JobError> {
    if data.simulate {
        task.printer("Simulated buy, nothing sent");
        update(task, |d| d.buy_completed = true);
        return Ok(());
    }

    let order = exch
        .create_order(&OrderRequest {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: data.quantity,
            quote_order_qty: data.quote_order_qty,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
        })
        .await?;

    let body = task.printer(format!(
        "Bought {} {} @ {}",
        order.filled, order.symbol, order.price
    ));
    update(task, |d| {
        d.buy_completed = true;
        d.initial_price = order.price;
        if d.quantity.is_zero() {
            d.quantity = order.filled;
        }
    });
    let _ = ctx.mailer.send(&body).await;
    Ok(())
}

async fn tsl_step(
    ctx: &JobCtx,
    task: &Task,
    exch: &SharedExchange,
    symbol: &str,
) -> Result<RunStatus, JobError> {
    let price = match exch.fetch_ticker(symbol).await {
        Ok(ticker) => ticker.last,
        Err(e) => {
            task.printer_error(format!("ExchangeError: {e}"));
            return Ok(RunStatus::ErrorSoft);
        }
    };

    let Some(eval) = update(task, |d| evaluate(d, price)) else {
        return Ok(RunStatus::ErrorHard);
    };

    ctx.bus.emit(
        EventName::CryptoTslUpdate,
        json!({
            "taskId": task.id,
            "symbol": symbol,
            "price": price,
            "lastHigh": eval.last_high,
            "stopPrice": eval.stop_price,
            "iteration": eval.iteration,
        }),
    );

    task.printer(format!(
        "#{} {} price={} high={} stop={}",
        eval.iteration, symbol, price, eval.last_high, eval.stop_price
    ));

    let trigger = match eval.trigger {
        Some(trigger) => trigger,
        None => return Ok(RunStatus::Continue),
    };

    let data = snapshot(task);
    let reason = match trigger {
        Trigger::StopLoss => "Stop-loss triggered",
        Trigger::TakeProfit => "Take-profit triggered",
    };

    if data.simulate {
        let body = task.printer(format!("{reason} at {price} (simulated sell)"));
        let _ = ctx.mailer.send(&body).await;
        if data.simulate_endless {
            // Endless dry runs rearm and keep trailing
            update(task, |d| {
                d.last_high = None;
                d.stop_price = None;
                d.initial_price = Decimal::ZERO;
            });
            return Ok(RunStatus::Continue);
        }
        return Ok(RunStatus::Done);
    }

    let order = exch
        .create_order(&OrderRequest {
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::Market,
            quantity: data.quantity,
            quote_order_qty: None,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
        })
        .await;

    match order {
        Ok(order) => {
            let body = task.printer(format!(
                "{}: sold {} {} @ {}",
                reason, order.filled, order.symbol, order.price
            ));
            if let Err(e) = ctx.mailer.send(&body).await {
                task.printer_error(format!("mail: {e}"));
            }
            Ok(RunStatus::Done)
        }
        Err(e) => {
            // Missing the exit is the worst case; keep retrying
            task.printer_error(format!("ExchangeError: {e}"));
            Ok(RunStatus::ErrorSoft)
        }
    }
}

enum Trigger {
    StopLoss,
    TakeProfit,
}

struct StepEval {
    iteration: u64,
    last_high: Decimal,
    stop_price: Decimal,
    trigger: Option<Trigger>,
}

/// Advance the trailing state by one observation.
fn evaluate(d: &mut TslData, price: Decimal) -> StepEval {
    d.iteration += 1;

    if d.initial_price.is_zero() {
        d.initial_price = price;
    }

    let mut last_high = d
        .last_high
        .or(d.last_high_by_user)
        .unwrap_or(d.initial_price);
    let new_high = price > last_high;
    if new_high {
        last_high = price;
    }
    d.last_high = Some(last_high);

    let offset = if d.algo == "std2" {
        std2_offset(d, new_high)
    } else if !d.stop_offset_price.is_zero() {
        d.stop_offset_price
    } else {
        last_high * d.stop_offset_price_pct / Decimal::ONE_HUNDRED
    };
    let mut stop_price = last_high - offset;

    // Keep the stop at or above the entry level when asked to
    if d.above_initial_price {
        let floor = if !d.above_initial_price_offset.is_zero() {
            d.initial_price + d.above_initial_price_offset
        } else if !d.above_initial_price_offset_pct.is_zero() {
            d.initial_price * (Decimal::ONE + d.above_initial_price_offset_pct / Decimal::ONE_HUNDRED)
        } else {
            d.initial_price
        };
        if stop_price < floor {
            stop_price = floor;
        }
    }
    d.stop_price = Some(stop_price);

    let take_profit_at = if !d.take_profit.is_zero() {
        Some(d.take_profit)
    } else if !d.take_profit_pct.is_zero() {
        Some(d.initial_price * (Decimal::ONE + d.take_profit_pct / Decimal::ONE_HUNDRED))
    } else {
        None
    };

    let trigger = if price <= stop_price {
        Some(Trigger::StopLoss)
    } else if take_profit_at.is_some_and(|tp| price >= tp) {
        Some(Trigger::TakeProfit)
    } else {
        None
    };

    StepEval {
        iteration: d.iteration,
        last_high,
        stop_price,
        trigger,
    }
}

/// `std2`: the offset is fixed at entry, then clawed back by
/// `reduceStopOffsetPriceBy` percent on every new high (capped at
/// `reduceStopOffsetPriceByMax`), so the trail tightens as the trend
/// extends.
fn std2_offset(d: &mut TslData, new_high: bool) -> Decimal {
    if d.stop_offset_price.is_zero() && !d.stop_offset_price_pct.is_zero() {
        // Pct offsets are pinned to the entry price once, not re-derived
        // from each high
        d.stop_offset_price = d.initial_price * d.stop_offset_price_pct / Decimal::ONE_HUNDRED;
    }

    if new_high
        && !d.reduce_stop_offset_price_by.is_zero()
        && d.offset_pct_raised_by + d.reduce_stop_offset_price_by
            <= d.reduce_stop_offset_price_by_max
    {
        d.offset_pct_raised_by += d.reduce_stop_offset_price_by;
    }

    d.stop_offset_price * (Decimal::ONE - d.offset_pct_raised_by / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
#[path = "tsl_tests.rs"]
mod tests;
