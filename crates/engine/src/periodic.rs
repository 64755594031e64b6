// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cooperative periodic driver.
//!
//! Repeatedly invokes a job step, classifies its result, and sleeps the
//! per-job interval between invocations. A paused task gets no step
//! invocations, but its timer keeps ticking. The loop runs inside the
//! job future, so task cancellation interrupts the sleep promptly.

use crate::error::JobError;
use crate::task::Task;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

/// Classification of one step's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Keep looping.
    Continue,
    /// Work complete; stop the loop.
    Done,
    /// Transient failure; log and retry next interval.
    ErrorSoft,
    /// Fatal failure; stop the loop.
    ErrorHard,
}

/// Drives a step function on an interval.
///
/// The interval resolves in order: explicit interval, the attached
/// task's payload interval, one second.
pub struct Periodic {
    interval: Option<Duration>,
}

impl Periodic {
    pub fn new(interval: Option<Duration>) -> Self {
        Self { interval }
    }

    /// Loop until the step says stop or errors.
    ///
    /// An `Err` from the step stops the loop after logging; `ErrorSoft`
    /// retries on the next tick.
    pub async fn run<F, Fut>(&self, task: Option<&Task>, mut step: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RunStatus, JobError>>,
    {
        loop {
            let paused = task.map(Task::is_paused).unwrap_or(false);
            if !paused {
                match step().await {
                    Ok(RunStatus::Continue) => {}
                    Ok(RunStatus::ErrorSoft) => {
                        debug!("periodic step soft-failed, retrying next interval")
                    }
                    Ok(RunStatus::Done) | Ok(RunStatus::ErrorHard) => {
                        info!("Stopping periodic run.");
                        break;
                    }
                    Err(e) => {
                        error!("periodic step failed: {}", e);
                        break;
                    }
                }
            }
            tokio::time::sleep(self.resolve_interval(task)).await;
        }
    }

    fn resolve_interval(&self, task: Option<&Task>) -> Duration {
        self.interval
            .or_else(|| task.and_then(Task::data_interval).map(Duration::from_secs))
            .unwrap_or(Duration::from_secs(1))
    }
}

#[cfg(test)]
#[path = "periodic_tests.rs"]
mod tests;
