// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::Bus;
use crate::test_support::fake_ctx;
use indexmap::IndexMap;
use std::time::Duration;
use tbot_core::Operation;

fn ping_task(args: &[&str], kwargs: &[(&str, &str)]) -> Arc<Task> {
    let op = Operation::new(
        "ping",
        args.iter().map(|s| s.to_string()).collect(),
        kwargs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<IndexMap<_, _>>(),
    );
    Arc::new(Task::new(1, op, "ping", Bus::new()))
}

#[tokio::test(start_paused = true)]
async fn finite_ping_prints_n_lines_and_finishes() {
    let test = fake_ctx();
    let task = ping_task(&["3"], &[("interval", "1")]);

    job_ping(test.ctx.clone(), Arc::clone(&task)).await.unwrap();

    let output = task.get_output(None);
    let messages: Vec<&str> = output.iter().map(|l| l.msg.as_str()).collect();
    assert_eq!(messages, ["Ping #1", "Ping #2", "Ping #3"]);
    assert!(task.is_finished());
}

#[tokio::test(start_paused = true)]
async fn indefinite_ping_runs_until_cancelled() {
    let test = fake_ctx();
    let task = ping_task(&[], &[("interval", "1")]);
    let token = task.cancel_token();

    let job_task = Arc::clone(&task);
    let handle = tokio::spawn(async move {
        let job = job_ping(test.ctx.clone(), Arc::clone(&job_task));
        tokio::select! {
            _ = token.cancelled() => {}
            _ = job => {}
        }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(task.get_output(None).len() >= 4);
    assert!(!task.is_finished());

    task.cancel_token().cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn paused_ping_stops_counting() {
    let test = fake_ctx();
    let task = ping_task(&[], &[("interval", "1")]);

    let job_task = Arc::clone(&task);
    let token = task.cancel_token();
    let handle = tokio::spawn(async move {
        let job = job_ping(test.ctx.clone(), Arc::clone(&job_task));
        tokio::select! {
            _ = token.cancelled() => {}
            _ = job => {}
        }
    });

    tokio::time::sleep(Duration::from_millis(2500)).await;
    task.pause();
    let seen = task.get_output(None).len();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(task.get_output(None).len(), seen);

    task.pause();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(task.get_output(None).len() > seen);

    task.cancel_token().cancel();
    handle.await.unwrap();
}
