// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bin_live`: live ticker stream consumer with momentum scoring.
//!
//! Subscribes to the exchange ticker stream, writes every update through
//! the MemStore (each write publishes `TICKER_UPDATE`), and keeps a
//! short price history per symbol. Every update re-scores the watched
//! symbols over 1m/3m/5m/10m/15m percent changes; the ranked table goes
//! out on `BIN_LIVE_UPDATE` and lands under `bin_live` in the MemStore.
//!
//! When `trackCmcLatest` is on, a `CMC_LATEST_UPDATE` swaps the watched
//! symbol set for the fresh movers (`symbolsTrackAdd` keeps the
//! explicitly-requested symbols in the mix) and the stream resubscribes.
//! A recv timeout catches dead upstreams: the stream is dropped and
//! reopened on the next soft-error retry. Runs until killed.

use super::{JobCtx, JobFuture};
use crate::bus::Subscription;
use crate::periodic::{Periodic, RunStatus};
use crate::task::Task;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tbot_core::payload::{BinLiveData, JobPayload};
use tbot_core::{util, EventName};
use tokio::sync::mpsc;

/// Per-recv timeout for detecting dead upstreams.
const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Pace between reconnect attempts. Healthy recvs are message-paced.
const RETRY_PACE: Duration = Duration::from_millis(100);

/// Momentum horizons, in seconds. The first four score points.
const TIMEFRAMES: [(&str, u64); 5] = [
    ("1m", 60),
    ("3m", 180),
    ("5m", 300),
    ("10m", 600),
    ("15m", 900),
];

/// Samples older than this fall off the per-symbol history.
const HISTORY_SECS: f64 = 960.0;

type Stream = mpsc::Receiver<tbot_adapters::Ticker>;

/// Per-symbol `(unix seconds, last price)` samples, oldest first.
type History = HashMap<String, VecDeque<(f64, f64)>>;

/// Options fixed for the lifetime of the loop.
struct StepCfg {
    sortby: String,
    track_add: bool,
    symbols_orig: Vec<String>,
}

/// State threaded between steps. The lock is never held across an await.
struct LiveState {
    stream: Option<Stream>,
    refresh: Option<Subscription>,
    symbols: Vec<String>,
    history: History,
}

pub fn job_bin_live(ctx: JobCtx, task: Arc<Task>) -> JobFuture {
    Box::pin(async move {
        task.printer(format!("Launching task #{} {}", task.id, task.name));
        task.init_data(JobPayload::BinLive(BinLiveData::default()));

        let data = task.with_data(|data| match data {
            Some(JobPayload::BinLive(d)) => d.clone(),
            _ => BinLiveData::default(),
        });

        let exch = match ctx.exchange(data.exchange.as_deref()).await {
            Ok(exch) => exch,
            Err(e) => {
                task.printer_error(format!("ExchangeError: {e}"));
                task.set_finished();
                return Ok(());
            }
        };

        let mut symbols = data.symbols.clone();
        let mut symbols_orig = data.symbols_orig.clone();

        if data.stream_all_tickers {
            symbols = match exch.load_markets().await {
                Ok(markets) => markets
                    .into_iter()
                    .filter(|m| m.active)
                    .map(|m| m.symbol)
                    .collect(),
                Err(e) => {
                    task.printer_error(format!("ExchangeError: {e}"));
                    task.set_finished();
                    return Ok(());
                }
            };
        } else {
            // Tracking mode parks the requested symbols aside and starts
            // from the last published movers list
            if !symbols.is_empty() && data.symbols_track_add && symbols_orig.is_empty() {
                symbols_orig = symbols.clone();
                symbols.clear();
            }
            if symbols.is_empty() {
                symbols = stored_symbols(&ctx);
                merge_tracked(&mut symbols, data.symbols_track_add, &symbols_orig);
            }
        }

        if symbols.is_empty() {
            task.printer_error("bin_live: No symbols given!");
            task.set_finished();
            return Ok(());
        }

        // Persist the resolved lists so a restored task resumes them
        task.with_data(|payload| {
            if let Some(JobPayload::BinLive(d)) = payload {
                d.symbols = symbols.clone();
                d.symbols_orig = symbols_orig.clone();
            }
        });

        task.printer(format!("Symbols = {}", symbols.join(",")));
        task.printer(format!("Sort by = {}", data.sortby));

        let cfg = Arc::new(StepCfg {
            sortby: data.sortby.clone(),
            track_add: data.symbols_track_add,
            symbols_orig,
        });
        let state = Arc::new(Mutex::new(LiveState {
            stream: None,
            refresh: data
                .track_cmc_latest
                .then(|| ctx.bus.subscribe(EventName::CmcLatestUpdate)),
            symbols,
            history: History::new(),
        }));

        let step_ctx = ctx.clone();
        let step_task = Arc::clone(&task);
        let step_exch = Arc::clone(&exch);

        Periodic::new(Some(RETRY_PACE))
            .run(Some(&task), move || {
                let ctx = step_ctx.clone();
                let task = Arc::clone(&step_task);
                let exch = Arc::clone(&step_exch);
                let cfg = Arc::clone(&cfg);
                let state = Arc::clone(&state);
                async move { stream_step(&ctx, &task, &exch, &cfg, &state).await }
            })
            .await;

        task.set_finished();
        Ok(())
    })
}

async fn stream_step(
    ctx: &JobCtx,
    task: &Task,
    exch: &tbot_adapters::SharedExchange,
    cfg: &StepCfg,
    state: &Mutex<LiveState>,
) -> Result<RunStatus, crate::error::JobError> {
    let (current, symbols) = {
        let mut st = state.lock();
        apply_refresh(task, cfg, &mut st);
        (st.stream.take(), st.symbols.clone())
    };

    let mut rx = match current {
        Some(rx) => rx,
        None => match exch.watch_tickers(&symbols).await {
            Ok(rx) => {
                task.printer(format!("Streaming {} symbols", symbols.len()));
                rx
            }
            Err(e) => {
                task.printer_error(format!("stream: {e}"));
                return Ok(RunStatus::ErrorSoft);
            }
        },
    };

    match tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await {
        Ok(Some(ticker)) => {
            let last = ticker.last.to_f64().unwrap_or(0.0);
            let table = {
                let mut st = state.lock();
                record_sample(&mut st.history, &ticker.symbol, util::unix_now(), last);
                momentum_table(&st.history, &cfg.sortby)
            };
            ctx.memstore.add("bin_live", table.clone());
            ctx.bus.emit(EventName::BinLiveUpdate, table);

            if let Ok(value) = serde_json::to_value(&ticker) {
                ctx.memstore.add_ticker(exch.id(), value);
            }
            state.lock().stream = Some(rx);
            Ok(RunStatus::Continue)
        }
        Ok(None) => {
            task.printer_error("stream closed by upstream");
            Ok(RunStatus::ErrorSoft)
        }
        Err(_) => {
            task.printer_error("stream recv timeout, reconnecting");
            Ok(RunStatus::ErrorSoft)
        }
    }
}

/// Swap in a fresh symbol set published by `cmc_latest`. The stream is
/// dropped so the next step resubscribes, and the history restarts.
fn apply_refresh(task: &Task, cfg: &StepCfg, st: &mut LiveState) {
    let mut latest = None;
    if let Some(sub) = st.refresh.as_mut() {
        while let Some(msg) = sub.try_recv() {
            latest = Some(msg.payload);
        }
    }
    let Some(payload) = latest else { return };

    let mut fresh: Vec<String> = payload
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    merge_tracked(&mut fresh, cfg.track_add, &cfg.symbols_orig);

    if fresh.is_empty() {
        return;
    }

    task.printer(format!(
        "bin_live: Updating symbols from cmc_latest ({})",
        fresh.len()
    ));
    task.with_data(|payload| {
        if let Some(JobPayload::BinLive(d)) = payload {
            d.symbols = fresh.clone();
        }
    });
    st.symbols = fresh;
    st.stream = None;
    st.history.clear();
}

/// The last movers list published by `cmc_latest`, if any.
fn stored_symbols(ctx: &JobCtx) -> Vec<String> {
    ctx.memstore
        .get("cmc_latest_symbols")
        .and_then(|v| v.as_array().cloned())
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn merge_tracked(symbols: &mut Vec<String>, track_add: bool, orig: &[String]) {
    if !track_add {
        return;
    }
    for symbol in orig {
        if !symbols.contains(symbol) {
            symbols.push(symbol.clone());
        }
    }
}

fn record_sample(history: &mut History, symbol: &str, ts: f64, last: f64) {
    let samples = history.entry(symbol.to_string()).or_default();
    samples.push_back((ts, last));
    while samples
        .front()
        .is_some_and(|(oldest, _)| *oldest < ts - HISTORY_SECS)
    {
        samples.pop_front();
    }
}

/// Score every watched symbol: percent change per horizon against the
/// oldest sample inside it, points for each positive short horizon
/// (1m=1 ... 10m=4; 15m is informational), table ordered by `sortby`
/// descending.
pub(crate) fn momentum_table(history: &History, sortby: &str) -> Value {
    let mut rows: Vec<Value> = Vec::new();

    for (symbol, samples) in history {
        let Some(&(now, last)) = samples.back() else {
            continue;
        };
        let mut row = serde_json::Map::new();
        row.insert("s".into(), Value::String(symbol.clone()));

        let mut pts = 0i64;
        for (rank, (name, secs)) in TIMEFRAMES.iter().enumerate() {
            let cutoff = now - *secs as f64;
            let base = samples
                .iter()
                .find(|(ts, _)| *ts >= cutoff)
                .map(|(_, price)| *price);
            let pct = match base {
                Some(base) if base != 0.0 => round2((last - base) / base * 100.0),
                _ => 0.0,
            };
            if *name != "15m" && pct > 0.0 {
                pts += rank as i64 + 1;
            }
            row.insert((*name).into(), Value::from(pct));
        }
        row.insert("pts".into(), Value::from(pts));
        rows.push(Value::Object(row));
    }

    rows.sort_by(|a, b| {
        let key = |row: &Value| row.get(sortby).and_then(Value::as_f64).unwrap_or(0.0);
        key(b).total_cmp(&key(a))
    });
    Value::Array(rows)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "bin_live_tests.rs"]
mod tests;
