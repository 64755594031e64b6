// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use indexmap::IndexMap;
use tbot_core::payload::PingData;

fn task_with_bus() -> (Task, Bus) {
    let bus = Bus::new();
    let op = Operation::new("ping", vec!["3".into()], IndexMap::new());
    (Task::new(1, op, "ping", bus.clone()), bus)
}

#[test]
fn printer_appends_and_emits_logger() {
    let (task, bus) = task_with_bus();
    let mut sub = bus.subscribe(EventName::Logger);

    let returned = task.printer("Ping #1");
    assert_eq!(returned, "Ping #1");

    let output = task.get_output(None);
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].msg, "Ping #1");
    assert_eq!(output[0].task_id, 1);

    let msg = sub.try_recv().unwrap();
    assert_eq!(msg.payload["msg"], "Ping #1");
    assert_eq!(msg.payload["taskId"], 1);
}

#[test]
fn output_caps_at_1000_dropping_oldest() {
    let (task, _bus) = task_with_bus();
    for i in 0..1001 {
        task.printer(format!("line {i}"));
    }
    let output = task.get_output(None);
    assert_eq!(output.len(), MAX_OUTPUT_LINES);
    assert_eq!(output[0].msg, "line 1");
    assert_eq!(output[999].msg, "line 1000");
}

#[test]
fn output_is_fifo_ordered() {
    let (task, _bus) = task_with_bus();
    for i in 0..10 {
        task.printer(format!("{i}"));
    }
    let output = task.get_output(None);
    assert!(output.windows(2).all(|w| w[0].ts <= w[1].ts));
}

#[test]
fn get_output_returns_last_n() {
    let (task, _bus) = task_with_bus();
    for i in 0..5 {
        task.printer(format!("{i}"));
    }
    let last_two = task.get_output(Some(2));
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[0].msg, "3");
    assert_eq!(last_two[1].msg, "4");
    // Asking for more than exists returns everything
    assert_eq!(task.get_output(Some(100)).len(), 5);
}

#[test]
fn finished_task_takes_no_more_output() {
    let (task, _bus) = task_with_bus();
    task.printer("before");
    task.set_finished();
    task.printer("after");
    let output = task.get_output(None);
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].msg, "before");
}

#[test]
fn set_finished_emits_event() {
    let (task, bus) = task_with_bus();
    let mut sub = bus.subscribe(EventName::TaskFinished);
    task.set_finished();
    assert_eq!(sub.try_recv().unwrap().payload["taskId"], 1);
}

#[test]
fn kill_cancels_and_finishes_idempotently() {
    let (task, bus) = task_with_bus();
    let token = task.cancel_token();
    let mut sub = bus.subscribe(EventName::TaskFinished);

    task.kill();
    assert!(token.is_cancelled());
    assert!(task.is_finished());
    assert!(sub.try_recv().is_some());

    // Second kill is a no-op
    task.kill();
    assert!(sub.try_recv().is_none());
}

#[test]
fn pause_toggles() {
    let (task, _bus) = task_with_bus();
    assert!(!task.is_paused());
    assert_eq!(task.pause(), "OK");
    assert!(task.is_paused());
    task.pause();
    assert!(!task.is_paused());
}

#[test]
fn init_data_maps_options_once() {
    let (task, _bus) = task_with_bus();
    task.init_data(JobPayload::Ping(PingData::default()));
    assert_eq!(task.data_interval(), Some(5));
    task.with_data(|data| match data {
        Some(JobPayload::Ping(d)) => assert_eq!(d.max_iter, Some(3)),
        other => panic!("unexpected payload: {other:?}"),
    });

    // Restored data is left alone
    task.with_data(|data| {
        if let Some(JobPayload::Ping(d)) = data {
            d.iteration = 9;
        }
    });
    task.init_data(JobPayload::Ping(PingData::default()));
    task.with_data(|data| match data {
        Some(JobPayload::Ping(d)) => assert_eq!(d.iteration, 9),
        other => panic!("unexpected payload: {other:?}"),
    });
}

#[test]
fn modify_data_replaces_kwargs_and_emits() {
    let (task, bus) = task_with_bus();
    task.init_data(JobPayload::Ping(PingData::default()));
    let mut sub = bus.subscribe(EventName::TaskModified);

    let mut kwargs = IndexMap::new();
    kwargs.insert("interval".to_string(), "2".to_string());
    assert_eq!(task.modify_data(kwargs), "OK");

    assert_eq!(task.data_interval(), Some(2));
    assert_eq!(task.op().kwargs.get("interval").map(String::as_str), Some("2"));
    assert_eq!(sub.try_recv().unwrap().payload["taskId"], 1);
}

#[test]
fn get_info_emits_task_info() {
    let (task, bus) = task_with_bus();
    task.init_data(JobPayload::Ping(PingData::default()));
    let mut sub = bus.subscribe(EventName::TaskInfo);

    let info = task.get_info();
    assert_eq!(info["id"], 1);
    assert_eq!(info["name"], "ping");
    assert_eq!(info["op"]["cmd"], "ping");
    assert_eq!(info["data"]["kind"], "ping");

    let msg = sub.try_recv().unwrap();
    assert_eq!(msg.payload["taskId"], 1);
    assert_eq!(msg.payload["info"]["id"], 1);
}

#[test]
fn snapshot_round_trip_keeps_identity() {
    let (task, bus) = task_with_bus();
    task.init_data(JobPayload::Ping(PingData::default()));
    task.printer("Ping #1");
    task.pause();

    let snapshot = task.to_savegame();
    let restored = Task::from_snapshot(snapshot.clone(), bus);

    assert_eq!(restored.id, task.id);
    assert_eq!(restored.name, task.name);
    assert!(restored.is_paused());
    assert!(!restored.is_finished());
    assert_eq!(restored.get_output(None), task.get_output(None));
    assert_eq!(restored.to_savegame(), snapshot);
}

#[test]
fn display_shows_state() {
    let (task, _bus) = task_with_bus();
    let repr = task.to_string();
    assert!(repr.starts_with("#1 (ping), started "));

    task.pause();
    assert!(task.to_string().ends_with("(paused)"));
    task.pause();
    task.set_finished();
    assert!(task.to_string().ends_with("(finished)"));
}

#[test]
fn display_includes_desc() {
    let bus = Bus::new();
    let mut kwargs = IndexMap::new();
    kwargs.insert("desc".to_string(), "smoke".to_string());
    let task = Task::new(2, Operation::new("ping", vec![], kwargs), "ping", bus);
    assert!(task.to_string().contains("[smoke]"));
}
