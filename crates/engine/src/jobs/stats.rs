// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `crypto_stats`: fetch OHLCV and print RSI-14 plus MACD crossover
//! advice over the series.

use super::{JobCtx, JobFuture};
use crate::task::Task;
use serde_json::json;
use std::sync::Arc;
use tbot_core::payload::{JobPayload, StatsData};
use tbot_core::EventName;

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

pub fn job_crypto_stats(ctx: JobCtx, task: Arc<Task>) -> JobFuture {
    Box::pin(async move {
        task.printer(format!("Launching task #{} {}", task.id, task.name));
        task.init_data(JobPayload::CryptoStats(StatsData::default()));

        let data = task.with_data(|data| match data {
            Some(JobPayload::CryptoStats(d)) => d.clone(),
            _ => StatsData::default(),
        });

        let exch = match ctx.exchange(data.exchange.as_deref()).await {
            Ok(exch) => exch,
            Err(e) => {
                task.printer_error(format!("ExchangeError: {e}"));
                task.set_finished();
                return Ok(());
            }
        };

        task.printer(format!("Exchange = {}", exch.id()));
        task.printer(format!("Symbol = {}", data.symbol));
        task.printer(format!("Timeframe = {}", data.timeframe));

        let candles = match exch
            .fetch_ohlcv(&data.symbol, &data.timeframe, data.limit)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                task.printer_error(format!("ExchangeError: {e}"));
                task.set_finished();
                return Ok(());
            }
        };

        if let Ok(value) = serde_json::to_value(&candles) {
            ctx.memstore.add_ohlcv(exch.id(), &data.symbol, value);
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        if let Some(rsi) = rsi(&closes, RSI_PERIOD) {
            task.printer(format!("RSI = {rsi:.2}"));
        } else {
            task.printer_warning(format!(
                "Not enough candles for RSI ({} < {})",
                closes.len(),
                RSI_PERIOD + 1
            ));
        }

        let advice = macd_advice(&closes);
        if let Some(latest) = advice.last() {
            task.printer(format!("MACD advice = {latest}"));
        }

        ctx.bus.emit(
            EventName::CryptoStats,
            json!({
                "taskId": task.id,
                "exchange": exch.id(),
                "symbol": data.symbol,
                "candles": candles.len(),
            }),
        );

        task.set_finished();
        Ok(())
    })
}

/// Wilder-smoothed relative strength index over the last `period` moves.
pub(crate) fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < period + 1 {
        return None;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for w in closes[..period + 1].windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    for w in closes[period..].windows(2) {
        let change = w[1] - w[0];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(v) => *v,
        None => return out,
    };
    for v in values {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// BUY/SELL/HOLD per candle from MACD crossing its signal line.
pub(crate) fn macd_advice(closes: &[f64]) -> Vec<&'static str> {
    if closes.len() < 2 {
        return vec!["No data"];
    }

    let fast = ema(closes, MACD_FAST);
    let slow = ema(closes, MACD_SLOW);
    let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&macd, MACD_SIGNAL);

    let mut advice = vec!["No data"];
    for i in 1..macd.len() {
        if macd[i] > signal[i] && macd[i - 1] <= signal[i - 1] {
            advice.push("BUY");
        } else if macd[i] < signal[i] && macd[i - 1] >= signal[i - 1] {
            advice.push("SELL");
        } else {
            advice.push("HOLD");
        }
    }
    advice
}

/// Test helper: a flat candle series at the given closes.
#[cfg(test)]
pub(crate) fn candles_from_closes(closes: &[f64]) -> Vec<tbot_adapters::Candle> {
    use tbot_adapters::Candle;
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Candle {
            ts: i as i64 * 60_000,
            open: *close,
            high: *close,
            low: *close,
            close: *close,
            volume: 1.0,
        })
        .collect()
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
