// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled and event-triggered list entries, plus the task snapshot
//! shape persisted in savegames.

use crate::cron::Schedule;
use crate::logline::LogLine;
use crate::operation::Operation;
use crate::payload::JobPayload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A crontab-scheduled operation. Position in the owning list is the
/// external key used by modify/pause/remove.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronEntry {
    pub schedule: Schedule,
    pub op: Operation,
    #[serde(default)]
    pub is_paused: bool,
}

impl CronEntry {
    pub fn new(schedule: Schedule, op: Operation) -> Self {
        Self {
            schedule,
            op,
            is_paused: false,
        }
    }
}

impl fmt::Display for CronEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}",
            self.schedule,
            self.op,
            if self.is_paused { " (paused)" } else { "" }
        )
    }
}

/// A condition-triggered operation. Fires at most once: the scanner
/// removes the entry before starting the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IftttEntry {
    pub condition: String,
    pub op: Operation,
    #[serde(default)]
    pub is_paused: bool,
}

impl IftttEntry {
    pub fn new(condition: impl Into<String>, op: Operation) -> Self {
        Self {
            condition: condition.into(),
            op,
            is_paused: false,
        }
    }
}

impl fmt::Display for IftttEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}",
            self.condition,
            self.op,
            if self.is_paused { " (paused)" } else { "" }
        )
    }
}

/// Everything a restored task needs to resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: u32,
    pub name: String,
    pub is_finished: bool,
    pub is_paused: bool,
    pub output: Vec<LogLine>,
    pub op: Operation,
    /// Unix seconds.
    pub start_time: f64,
    pub data: Option<JobPayload>,
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
