// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A supervised unit of work.
//!
//! Tasks carry identity, lifecycle flags, a bounded output buffer, the
//! operation that created them, and a typed payload. The job function
//! runs as a child future raced against the task's cancellation token;
//! killing a task cancels that token and finalizes the flags.

use crate::bus::Bus;
use chrono::DateTime;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fmt;
use tbot_core::{util, EventName, JobPayload, LogLine, Operation, TaskSnapshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const MAX_OUTPUT_LINES: usize = 1000;

struct TaskState {
    op: Operation,
    is_paused: bool,
    is_finished: bool,
    output: VecDeque<LogLine>,
    data: Option<JobPayload>,
    /// Unix seconds.
    start_time: f64,
}

pub struct Task {
    pub id: u32,
    pub name: String,
    bus: Bus,
    cancel: CancellationToken,
    state: Mutex<TaskState>,
}

impl Task {
    pub fn new(id: u32, op: Operation, name: impl Into<String>, bus: Bus) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            cancel: CancellationToken::new(),
            state: Mutex::new(TaskState {
                op,
                is_paused: false,
                is_finished: false,
                output: VecDeque::new(),
                data: None,
                start_time: util::unix_now(),
            }),
        }
    }

    /// Rebuild a task from a savegame. The restored task keeps its id,
    /// start time, output, operation, and payload; it gets a fresh
    /// cancellation token.
    pub fn from_snapshot(snapshot: TaskSnapshot, bus: Bus) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            bus,
            cancel: CancellationToken::new(),
            state: Mutex::new(TaskState {
                op: snapshot.op,
                is_paused: snapshot.is_paused,
                is_finished: snapshot.is_finished,
                output: snapshot.output.into(),
                data: snapshot.data,
                start_time: snapshot.start_time,
            }),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().is_paused
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().is_finished
    }

    pub fn op(&self) -> Operation {
        self.state.lock().op.clone()
    }

    /// Token the supervisor races the job future against.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the child without finalizing (shutdown path: the task must
    /// restart on the next launch).
    pub fn cancel_for_shutdown(&self) {
        self.cancel.cancel();
    }

    /// Read or initialize the payload through a closure.
    pub fn with_data<R>(&self, f: impl FnOnce(&mut Option<JobPayload>) -> R) -> R {
        f(&mut self.state.lock().data)
    }

    /// Interval carried by the payload, if any.
    pub fn data_interval(&self) -> Option<u64> {
        self.state.lock().data.as_ref().and_then(JobPayload::interval)
    }

    /// Initialize the payload on first run: construct the default variant
    /// and map the operation's options onto it. No-op when restored data
    /// is already present.
    pub fn init_data(&self, default: JobPayload) {
        let mut state = self.state.lock();
        if state.data.is_none() {
            let mut payload = default;
            payload.map_options(&state.op.args, &state.op.kwargs);
            state.data = Some(payload);
        }
    }

    fn append_output(&self, msg: &str) -> Option<LogLine> {
        let mut state = self.state.lock();
        if state.is_finished {
            // Finished tasks take no more output; late writers race here
            return None;
        }
        while state.output.len() >= MAX_OUTPUT_LINES {
            state.output.pop_front();
        }
        let line = LogLine::new(self.id, msg);
        state.output.push_back(line.clone());
        Some(line)
    }

    fn print_line(&self, msg: String) -> String {
        if let Some(line) = self.append_output(&msg) {
            if let Ok(payload) = serde_json::to_value(&line) {
                self.bus.emit(EventName::Logger, payload);
            }
        }
        msg
    }

    /// Append a line, publish `LOGGER`, and log at info level. Returns the
    /// formatted string so callers can compose notification bodies.
    pub fn printer(&self, msg: impl Into<String>) -> String {
        let msg = self.print_line(msg.into());
        info!("{}", msg);
        msg
    }

    pub fn printer_warning(&self, msg: impl Into<String>) -> String {
        let msg = self.print_line(msg.into());
        warn!("{}", msg);
        msg
    }

    pub fn printer_error(&self, msg: impl Into<String>) -> String {
        let msg = self.print_line(msg.into());
        error!("{}", msg);
        msg
    }

    /// Last `n` lines, or everything.
    pub fn get_output(&self, n: Option<usize>) -> Vec<LogLine> {
        let state = self.state.lock();
        match n {
            Some(n) if n < state.output.len() => {
                state.output.iter().skip(state.output.len() - n).cloned().collect()
            }
            _ => state.output.iter().cloned().collect(),
        }
    }

    /// Summary fields; `full` adds the operation and payload.
    pub fn to_info_dict(&self, full: bool) -> Value {
        let state = self.state.lock();
        let mut info = json!({
            "id": self.id,
            "name": self.name,
            "start_time": state.start_time as i64,
            "is_paused": state.is_paused,
            "is_finished": state.is_finished,
            "desc": state.op.kwargs.get("desc"),
        });
        if full {
            info["op"] = serde_json::to_value(&state.op).unwrap_or(Value::Null);
            info["data"] = serde_json::to_value(&state.data).unwrap_or(Value::Null);
        }
        info
    }

    /// Full info dict; also publishes `TASK_INFO`.
    pub fn get_info(&self) -> Value {
        let info = self.to_info_dict(true);
        self.bus.emit(
            EventName::TaskInfo,
            json!({"taskId": self.id, "info": info}),
        );
        info
    }

    /// Cancel and finalize. Idempotent.
    pub fn kill(&self) {
        if !self.is_finished() {
            info!("Killing task #{}", self.id);
            self.cancel.cancel();
            self.set_finished();
        }
    }

    /// Flip the finished flag and publish `TASK_FINISHED`. The cancel
    /// token is released so late `kill()` calls are no-ops.
    pub fn set_finished(&self) {
        self.state.lock().is_finished = true;
        self.bus
            .emit(EventName::TaskFinished, json!({"taskId": self.id}));
    }

    /// Toggle pause. The periodic driver observes the flag on its next
    /// tick boundary.
    pub fn pause(&self) -> &'static str {
        let paused = {
            let mut state = self.state.lock();
            state.is_paused = !state.is_paused;
            state.is_paused
        };
        info!(
            "{} task #{}",
            if paused { "Pausing" } else { "Unpausing" },
            self.id
        );
        "OK"
    }

    /// Replace the operation kwargs, remap the payload, publish
    /// `TASK_MODIFIED`.
    pub fn modify_data(&self, kwargs: indexmap::IndexMap<String, String>) -> &'static str {
        {
            let mut state = self.state.lock();
            state.op.kwargs = kwargs.clone();
            if let Some(data) = state.data.as_mut() {
                data.map_options(&[], &kwargs);
            }
        }
        self.bus
            .emit(EventName::TaskModified, json!({"taskId": self.id}));
        "OK"
    }

    pub fn to_savegame(&self) -> TaskSnapshot {
        let state = self.state.lock();
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            is_finished: state.is_finished,
            is_paused: state.is_paused,
            output: state.output.iter().cloned().collect(),
            op: state.op.clone(),
            start_time: state.start_time,
            data: state.data.clone(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let started = DateTime::from_timestamp(state.start_time as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        write!(f, "#{} ({}), started {}", self.id, self.name, started)?;
        if let Some(desc) = state.op.kwargs.get("desc") {
            write!(f, " [{}]", desc)?;
        }
        if state.is_paused {
            write!(f, " (paused)")?;
        } else if state.is_finished {
            write!(f, " (finished)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
