// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ping`: print a counter on an interval, optionally N times.

use super::{JobCtx, JobFuture};
use crate::periodic::{Periodic, RunStatus};
use crate::task::Task;
use std::sync::Arc;
use tbot_core::payload::{JobPayload, PingData};

pub fn job_ping(_ctx: JobCtx, task: Arc<Task>) -> JobFuture {
    Box::pin(async move {
        task.init_data(JobPayload::Ping(PingData::default()));

        let step_task = Arc::clone(&task);
        Periodic::new(None)
            .run(Some(&task), move || {
                let task = Arc::clone(&step_task);
                async move { ping_step(&task) }
            })
            .await;

        task.set_finished();
        Ok(())
    })
}

fn ping_step(task: &Task) -> Result<RunStatus, crate::error::JobError> {
    let (iteration, max_iter) = task.with_data(|data| match data {
        Some(JobPayload::Ping(d)) => {
            d.iteration += 1;
            (d.iteration, d.max_iter)
        }
        _ => (0, None),
    });

    task.printer(format!("Ping #{iteration}"));

    match max_iter {
        Some(max) if max <= iteration => Ok(RunStatus::Done),
        _ => Ok(RunStatus::Continue),
    }
}

#[cfg(test)]
#[path = "ping_tests.rs"]
mod tests;
