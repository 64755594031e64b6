// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::Bus;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tbot_core::payload::{JobPayload, PingData};
use tbot_core::Operation;

fn ping_task(interval_kwarg: Option<&str>) -> Arc<Task> {
    let mut kwargs = IndexMap::new();
    if let Some(interval) = interval_kwarg {
        kwargs.insert("interval".to_string(), interval.to_string());
    }
    let task = Arc::new(Task::new(
        1,
        Operation::new("ping", vec![], kwargs),
        "ping",
        Bus::new(),
    ));
    task.init_data(JobPayload::Ping(PingData::default()));
    task
}

#[tokio::test(start_paused = true)]
async fn done_stops_the_loop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    Periodic::new(Some(Duration::from_secs(1)))
        .run(None, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                Ok(if n >= 3 {
                    RunStatus::Done
                } else {
                    RunStatus::Continue
                })
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn soft_error_keeps_looping() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    Periodic::new(Some(Duration::from_secs(1)))
        .run(None, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                Ok(match n {
                    1 | 2 => RunStatus::ErrorSoft,
                    _ => RunStatus::Done,
                })
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn hard_error_stops_immediately() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    Periodic::new(Some(Duration::from_secs(1)))
        .run(None, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(RunStatus::ErrorHard) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn step_error_stops_the_loop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    Periodic::new(Some(Duration::from_secs(1)))
        .run(None, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Err(JobError::other("boom")) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn paused_task_gets_no_steps_but_timer_ticks() {
    let task = ping_task(Some("1"));
    task.pause();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let driver_task = Arc::clone(&task);

    let handle = tokio::spawn(async move {
        Periodic::new(None)
            .run(Some(&driver_task), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(RunStatus::Continue) }
            })
            .await;
    });

    // Timer keeps ticking while paused, but no step runs
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Unpause: steps resume on the next tick boundary
    task.pause();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(calls.load(Ordering::SeqCst) >= 2);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn interval_resolves_from_payload() {
    let task = ping_task(Some("10"));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let driver_task = Arc::clone(&task);

    let handle = tokio::spawn(async move {
        Periodic::new(None)
            .run(Some(&driver_task), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(RunStatus::Continue) }
            })
            .await;
    });

    tokio::time::sleep(Duration::from_secs(25)).await;
    // t=0, t=10, t=20
    let seen = calls.load(Ordering::SeqCst);
    assert!((2..=3).contains(&seen), "saw {seen} steps");

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn default_interval_is_one_second() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let handle = tokio::spawn(async move {
        Periodic::new(None)
            .run(None, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(RunStatus::Continue) }
            })
            .await;
    });

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let seen = calls.load(Ordering::SeqCst);
    assert!((3..=4).contains(&seen), "saw {seen} steps");

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_sleep() {
    let task = ping_task(Some("1000"));
    let token = task.cancel_token();
    let driver_task = Arc::clone(&task);

    let handle = tokio::spawn(async move {
        let child = token.child_token();
        let periodic = Periodic::new(None);
        tokio::select! {
            _ = child.cancelled() => {}
            _ = periodic.run(Some(&driver_task), || async { Ok(RunStatus::Continue) }) => {}
        }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;
    task.cancel_token().cancel();

    // The join completes promptly despite the 1000s interval
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
