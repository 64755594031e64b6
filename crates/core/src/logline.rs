// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task output records.

use serde::{Deserialize, Serialize};

/// A single line of task output.
///
/// Appended to the owning task's bounded buffer and published on the
/// `LOGGER` event. `ts` is unix seconds with sub-second precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub ts: f64,
    #[serde(rename = "taskId")]
    pub task_id: u32,
    pub msg: String,
}

impl LogLine {
    /// Record a line stamped with the current time.
    pub fn new(task_id: u32, msg: impl Into<String>) -> Self {
        Self {
            ts: crate::util::unix_now(),
            task_id,
            msg: msg.into(),
        }
    }

    /// Placeholder record used when a lookup fails (task id 0, ts 0).
    pub fn orphan(msg: impl Into<String>) -> Self {
        Self {
            ts: 0.0,
            task_id: 0,
            msg: msg.into(),
        }
    }
}

#[cfg(test)]
#[path = "logline_tests.rs"]
mod tests;
