// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task manager: registry of tasks, cron schedule list, condition
//! list, and the command dispatcher that feeds them.
//!
//! One instance owns all runtime state. The minute-tick cron loop and
//! the ticker-driven condition scan run as spawned listeners against the
//! shared bus.

use crate::bus::Bus;
use crate::jobs::{JobCtx, JobFn, JobRegistry};
use crate::periodic::{Periodic, RunStatus};
use crate::task::Task;
use chrono::{DateTime, Local, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tbot_core::{
    cond, format_elapsed, shellwords, CronEntry, EventName, IftttEntry, LogLine, Operation,
    Schedule, TaskSnapshot,
};
use tbot_storage::Savegame;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const RESP_OK: &str = "OK";

pub struct TaskManager {
    ctx: JobCtx,
    registry: JobRegistry,
    counter: Mutex<u32>,
    tasks: Mutex<Vec<Arc<Task>>>,
    cron_list: Mutex<Vec<CronEntry>>,
    ifttt_list: Mutex<Vec<IftttEntry>>,
    start_time: DateTime<Utc>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskManager {
    pub fn new(ctx: JobCtx, registry: JobRegistry) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            registry,
            counter: Mutex::new(0),
            tasks: Mutex::new(Vec::new()),
            cron_list: Mutex::new(Vec::new()),
            ifttt_list: Mutex::new(Vec::new()),
            start_time: Utc::now(),
            background: Mutex::new(Vec::new()),
        })
    }

    pub fn bus(&self) -> &Bus {
        &self.ctx.bus
    }

    pub fn ctx(&self) -> &JobCtx {
        &self.ctx
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Spawn the bus listeners: the ticker-driven condition scan and the
    /// list refresh on task completion.
    pub fn spawn_listeners(self: Arc<Self>) {
        let scanner = Arc::clone(&self);
        let mut tickers = self.ctx.bus.subscribe(EventName::TickerUpdate);
        let scan = tokio::spawn(async move {
            while let Some(msg) = tickers.recv().await {
                scanner.ifttt_scan(&msg.payload);
            }
        });

        let refresher = Arc::clone(&self);
        let mut finished = self.ctx.bus.subscribe(EventName::TaskFinished);
        let refresh = tokio::spawn(async move {
            while finished.recv().await.is_some() {
                refresher.emit_lists();
            }
        });

        self.background.lock().extend([scan, refresh]);
    }

    /// Spawn the cron loop: one tick per minute, entries checked against
    /// the local wall clock.
    pub fn start_scheduler(self: Arc<Self>) {
        let manager = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            Periodic::new(Some(Duration::from_secs(60)))
                .run(None, move || {
                    let manager = Arc::clone(&manager);
                    async move {
                        manager.scheduler_tick();
                        Ok(RunStatus::Continue)
                    }
                })
                .await;
        });
        self.background.lock().push(handle);
    }

    /// One cron pass: start every non-paused entry matching this minute,
    /// in list order.
    pub fn scheduler_tick(&self) {
        let now = Local::now();
        let due: Vec<CronEntry> = self
            .cron_list
            .lock()
            .iter()
            .filter(|entry| !entry.is_paused && entry.schedule.matches(&now))
            .cloned()
            .collect();
        for entry in due {
            info!(
                "Executing cron job ({}): {}",
                entry.schedule, entry.op.cmd
            );
            self.start(entry.op);
        }
    }

    // --- task admission ---

    fn next_id(&self) -> u32 {
        let mut counter = self.counter.lock();
        *counter += 1;
        *counter
    }

    /// Admit a new task: assign its id, register it, launch its job.
    fn admit(&self, op: Operation, job: JobFn, name: &str) -> Arc<Task> {
        let task = Arc::new(Task::new(self.next_id(), op, name, self.ctx.bus.clone()));
        self.tasks.lock().push(Arc::clone(&task));
        self.spawn_job(Arc::clone(&task), job);
        task
    }

    /// Re-admit a restored task. Finished tasks are kept for inspection
    /// only; live ones get their job relaunched with the restored payload.
    fn admit_restored(&self, snapshot: TaskSnapshot, job: JobFn) {
        let task = Arc::new(Task::from_snapshot(snapshot, self.ctx.bus.clone()));
        let live = !task.is_finished();
        self.tasks.lock().push(Arc::clone(&task));
        if live {
            self.spawn_job(task, job);
        }
    }

    /// Supervise the job future: race it against the cancel token, log
    /// failures, never finalize on the job's behalf.
    fn spawn_job(&self, task: Arc<Task>, job: JobFn) {
        let token = task.cancel_token();
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("task #{} cancelled", task.id);
                }
                result = job(ctx, Arc::clone(&task)) => {
                    if let Err(e) = result {
                        error!("task #{} ({}) failed: {}", task.id, task.name, e);
                    }
                }
            }
        });
    }

    /// Dispatch an operation: `ifttt=` beats `cron=` beats the job table.
    pub fn start(&self, mut op: Operation) {
        if let Some(conditions) = op.kwargs.shift_remove("ifttt") {
            self.ifttt_add(&conditions, op);
            return;
        }
        if let Some(schedule) = op.kwargs.shift_remove("cron") {
            match schedule.parse::<Schedule>() {
                Ok(schedule) => self.cron_add(schedule, op),
                Err(e) => error!("bad cron schedule '{}': {}", schedule, e),
            }
            return;
        }
        match self.registry.get(&op.cmd) {
            Some(job) => {
                let name = op.cmd.clone();
                self.admit(op, job, &name);
                self.emit_lists();
            }
            None => error!("Non-callable job: {}", op.cmd),
        }
    }

    fn find(&self, task_id: u32) -> Option<Arc<Task>> {
        self.tasks.lock().iter().find(|t| t.id == task_id).cloned()
    }

    fn last_task_id(&self) -> u32 {
        self.tasks.lock().last().map(|t| t.id).unwrap_or(0)
    }

    // --- list snapshots ---

    pub fn tasks_get_info_list(&self) -> Value {
        Value::Array(
            self.tasks
                .lock()
                .iter()
                .map(|t| t.to_info_dict(false))
                .collect(),
        )
    }

    fn tasks_display_list(&self) -> Vec<String> {
        self.tasks.lock().iter().map(|t| t.to_string()).collect()
    }

    pub fn get_all_lists(&self) -> Value {
        json!({
            "cron_list": self.cron_list.lock().clone(),
            "ifttt_list": self.ifttt_list.lock().clone(),
            "tasks": self.tasks_get_info_list(),
        })
    }

    /// Publish the full registry snapshot on `TASK_MANAGER`.
    pub fn emit_lists(&self) {
        self.ctx.bus.emit(EventName::TaskManager, self.get_all_lists());
    }

    // --- cron list ---

    pub fn cron_add(&self, schedule: Schedule, op: Operation) {
        self.cron_list.lock().push(CronEntry::new(schedule, op));
        self.emit_lists();
    }

    pub fn cron_modify(&self, position: usize, schedule: Schedule) -> String {
        let mut list = self.cron_list.lock();
        match list.get_mut(position) {
            Some(entry) => {
                *entry = CronEntry::new(schedule, entry.op.clone());
                RESP_OK.into()
            }
            None => index_error(position),
        }
    }

    pub fn cron_pause(&self, position: usize) -> String {
        let result = {
            let mut list = self.cron_list.lock();
            match list.get_mut(position) {
                Some(entry) => {
                    entry.is_paused = !entry.is_paused;
                    Ok(())
                }
                None => Err(index_error(position)),
            }
        };
        match result {
            Ok(()) => {
                self.emit_lists();
                RESP_OK.into()
            }
            Err(msg) => msg,
        }
    }

    pub fn cron_delete(&self, position: usize) -> String {
        let result = {
            let mut list = self.cron_list.lock();
            if position < list.len() {
                list.remove(position);
                Ok(())
            } else {
                Err(index_error(position))
            }
        };
        match result {
            Ok(()) => {
                self.emit_lists();
                RESP_OK.into()
            }
            Err(msg) => msg,
        }
    }

    pub fn cron_get_list(&self) -> Vec<CronEntry> {
        self.cron_list.lock().clone()
    }

    // --- condition list ---

    /// Add one entry per `;`-separated clause.
    pub fn ifttt_add(&self, conditions: &str, op: Operation) {
        {
            let mut list = self.ifttt_list.lock();
            for clause in conditions.split(';') {
                let clause = clause.trim();
                if !clause.is_empty() {
                    list.push(IftttEntry::new(clause, op.clone()));
                }
            }
        }
        self.emit_lists();
    }

    pub fn ifttt_pause(&self, position: usize) -> String {
        let result = {
            let mut list = self.ifttt_list.lock();
            match list.get_mut(position) {
                Some(entry) => {
                    entry.is_paused = !entry.is_paused;
                    Ok(())
                }
                None => Err(index_error(position)),
            }
        };
        match result {
            Ok(()) => {
                self.emit_lists();
                RESP_OK.into()
            }
            Err(msg) => msg,
        }
    }

    pub fn ifttt_delete(&self, position: usize) -> String {
        let result = {
            let mut list = self.ifttt_list.lock();
            if position < list.len() {
                list.remove(position);
                Ok(())
            } else {
                Err(index_error(position))
            }
        };
        match result {
            Ok(()) => {
                self.emit_lists();
                RESP_OK.into()
            }
            Err(msg) => msg,
        }
    }

    pub fn ifttt_get_list(&self) -> Vec<IftttEntry> {
        self.ifttt_list.lock().clone()
    }

    /// Scan conditions against a fresh ticker map. Iterates a snapshot of
    /// the list; every match or evaluation error removes the entry from
    /// the live list before anything else happens, so an entry can never
    /// fire twice.
    pub fn ifttt_scan(&self, tickers: &Value) {
        let namespace = eval_namespace(tickers);
        let snapshot = self.ifttt_list.lock().clone();

        for entry in snapshot {
            if entry.is_paused {
                continue;
            }
            match cond::eval_str(&entry.condition, &namespace) {
                Ok(true) => {
                    info!(
                        "Executing ifttt job ({}): {}",
                        entry.condition, entry.op
                    );
                    self.remove_ifttt_entry(&entry);
                    self.start(entry.op.clone());
                }
                Ok(false) => {
                    debug!("IFTTT no match: {}", entry.condition);
                }
                Err(e) => {
                    error!("IFTTT eval ({}): {}", entry.condition, e);
                    self.remove_ifttt_entry(&entry);
                }
            }
        }
    }

    fn remove_ifttt_entry(&self, entry: &IftttEntry) {
        let mut list = self.ifttt_list.lock();
        if let Some(pos) = list.iter().position(|e| e == entry) {
            list.remove(pos);
        }
    }

    // --- task operations ---

    /// Kill a single task.
    pub fn kill(&self, task_id: u32) -> String {
        match self.find(task_id) {
            Some(task) => {
                task.kill();
                self.emit_lists();
                RESP_OK.into()
            }
            None => format!("kill: unknown task id #{task_id}"),
        }
    }

    /// Kill every task.
    pub fn kill_all(&self) {
        for task in self.tasks.lock().iter() {
            task.kill();
        }
        self.emit_lists();
    }

    /// Pause or unpause a single task.
    pub fn pause_task(&self, task_id: u32) -> String {
        match self.find(task_id) {
            Some(task) => {
                let ret = task.pause();
                self.emit_lists();
                ret.into()
            }
            None => format!("pause: unknown task id #{task_id}"),
        }
    }

    /// Remove finished tasks from the registry.
    pub fn clean(&self) {
        self.tasks.lock().retain(|t| !t.is_finished());
        self.emit_lists();
    }

    /// Output of one task (`Some(id)`), the latest task (`None`), or all
    /// tasks concatenated (`Some(-1)`).
    pub fn get_output(&self, task_id: Option<i64>, num: Option<usize>) -> Vec<LogLine> {
        if task_id == Some(-1) {
            let tasks = self.tasks.lock().clone();
            return tasks.iter().flat_map(|t| t.get_output(num)).collect();
        }

        let task_id = match task_id {
            Some(id) => id as u32,
            None => self.last_task_id(),
        };
        match self.find(task_id) {
            Some(task) => task.get_output(num),
            None => vec![LogLine::orphan(format!(
                "get_output: unknown task id #{task_id}"
            ))],
        }
    }

    /// Full info of one task (or the latest), publishing `TASK_INFO`.
    pub fn get_info(&self, task_id: Option<u32>) -> Result<Value, String> {
        let task_id = task_id.unwrap_or_else(|| self.last_task_id());
        match self.find(task_id) {
            Some(task) => Ok(task.get_info()),
            None => Err(format!("get_info: unknown task id #{task_id}")),
        }
    }

    pub fn modify_task_data(&self, task_id: u32, op: &Operation) -> String {
        match self.find(task_id) {
            Some(task) => {
                let ret = task.modify_data(op.kwargs.clone());
                self.emit_lists();
                ret.into()
            }
            None => format!("modify_task_data: unknown task id #{task_id}"),
        }
    }

    /// Re-bind a job name to its (re)compiled implementation.
    pub fn reload(&self, cmd: &str) -> String {
        match self.registry.reload(cmd) {
            Ok(()) => format!("Reloaded job {cmd}"),
            Err(e) => e,
        }
    }

    // --- persistence ---

    pub fn to_savegame(&self) -> Savegame {
        Savegame::new(
            *self.counter.lock(),
            self.tasks.lock().iter().map(|t| t.to_savegame()).collect(),
            self.cron_list.lock().clone(),
            self.ifttt_list.lock().clone(),
            self.ctx.memstore.snapshot(),
        )
    }

    /// Restore registry state. Live tasks are relaunched with their
    /// restored payloads; the counter never goes backwards.
    pub fn from_savegame(&self, savegame: Savegame) {
        let max_id = savegame.tasks.iter().map(|t| t.id).max().unwrap_or(0);
        {
            let mut counter = self.counter.lock();
            *counter = savegame.counter.max(max_id).max(*counter);
        }
        *self.cron_list.lock() = savegame.cron_list;
        *self.ifttt_list.lock() = savegame.ifttt_list;
        self.ctx.memstore.restore(savegame.memstore);

        for snapshot in savegame.tasks {
            match self.registry.get(&snapshot.op.cmd) {
                Some(job) => self.admit_restored(snapshot, job),
                None => error!("Non-callable job: {}", snapshot.op.cmd),
            }
        }
    }

    /// Shutdown path: stop the background loops and cancel every live
    /// task without finalizing, so they resume on the next launch.
    pub fn shutdown(&self) {
        for handle in self.background.lock().drain(..) {
            handle.abort();
        }
        for task in self.tasks.lock().iter() {
            if !task.is_finished() {
                task.cancel_for_shutdown();
            }
        }
    }

    pub fn get_stats(&self) -> Value {
        let now = Utc::now();
        let uptime = (now - self.start_time).num_seconds().max(0) as u64;
        let savegame_last_update = self
            .ctx
            .memstore
            .get("savegame_last_update")
            .unwrap_or(Value::Null);
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "start_time": self.start_time.to_rfc3339(),
            "start_time_ts": self.start_time.timestamp(),
            "savegame_last_update": savegame_last_update,
            "uptime": format_elapsed(uptime),
            "uptime_ts": uptime,
        })
    }

    // --- request routing ---

    /// Parse one control frame into an operation, dispatch it, and shape
    /// the response. Raw input keeps `output`; structured input gets only
    /// `data` and `resp_code`.
    pub async fn process_request(&self, request: &str) -> Operation {
        let mut op = Operation::new("", vec![], IndexMap::new());
        if request.trim().is_empty() {
            return op;
        }

        let raw_used = match parse_request(request, &mut op) {
            Ok(raw_used) => raw_used,
            Err(msg) => {
                error!("bad request: {}", msg);
                op.set_error(format!("ERR: {msg}"));
                return op;
            }
        };

        self.process_cmd(&mut op).await;

        if !raw_used {
            op.output = Value::Null;
        }
        op
    }

    /// Execute a cooked operation, filling its response fields.
    pub async fn process_cmd(&self, op: &mut Operation) {
        let cmd = op.cmd.to_uppercase();
        match cmd.as_str() {
            "PS" => {
                op.data = self.tasks_get_info_list();
                op.output = json!(self.tasks_display_list());
                self.emit_lists();
            }
            "INFO" => match parse_optional_id(&op.args) {
                Ok(task_id) => match self.get_info(task_id) {
                    Ok(info) => {
                        op.output = Value::String(info.to_string());
                        op.data = info;
                    }
                    Err(msg) => op.set_output(msg),
                },
                Err(msg) => op.set_output(msg),
            },
            "MODIFY" => match parse_required_id(&op.args) {
                Ok(task_id) => {
                    let output = self.modify_task_data(task_id, op);
                    op.set_output(output);
                }
                Err(msg) => op.set_output(msg),
            },
            "PAUSE" => match parse_required_id(&op.args) {
                Ok(task_id) => {
                    let output = self.pause_task(task_id);
                    op.set_output(output);
                }
                Err(msg) => op.set_output(msg),
            },
            "RELOAD" => match op.args.first() {
                Some(name) => {
                    let output = self.reload(name);
                    op.set_output(output);
                }
                None => op.set_output("Argument missing"),
            },
            "STATS" => {
                let stats = self.get_stats();
                op.output = Value::String(stats.to_string());
                op.data = stats;
            }
            "KILL" => {
                let args = op.args.join("");
                if args == "all" {
                    self.kill_all();
                } else if let Ok(task_id) = args.parse::<u32>() {
                    let output = self.kill(task_id);
                    op.set_output(output);
                } else {
                    op.set_output("Argument missing");
                }
            }
            "CLEAN" => self.clean(),
            "GET" => {
                let parsed = (
                    op.args.first().map(|a| a.parse::<i64>()),
                    op.args.get(1).map(|a| a.parse::<usize>()),
                );
                match parsed {
                    (Some(Err(_)), _) | (_, Some(Err(_))) => {
                        op.data = json!([LogLine::orphan("invalid argument")]);
                    }
                    (task_id, num) => {
                        let lines = self.get_output(
                            task_id.and_then(Result::ok),
                            num.and_then(Result::ok),
                        );
                        op.data = json!(lines);
                    }
                }
            }
            "CRON" => self.cron_cmd(op),
            "IFTTT" => self.ifttt_cmd(op),
            "SAVEGAME" => {
                self.ctx.bus.emit(EventName::Savegame, Value::Null);
            }
            "MEMSTORE" => {
                let value = if op.args.iter().any(|a| a == "keys") {
                    json!(self.ctx.memstore.get_keys())
                } else if let Some(key) = op.kwargs.get("get") {
                    self.ctx.memstore.get(key).unwrap_or(Value::Null)
                } else {
                    Value::Object(self.ctx.memstore.snapshot())
                };
                op.output = if op.args.iter().any(|a| a == "raw") {
                    Value::String(value.to_string())
                } else {
                    Value::String(
                        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
                    )
                };
                op.data = value;
            }
            "SENDMAIL" => {
                if let Err(e) = self.ctx.mailer.send("Hello World!").await {
                    error!("mail: {}", e);
                }
                op.set_output("Email sent");
            }
            "QUIT" => op.set_output("Goodbye!"),
            _ if self.registry.contains(&op.cmd) => {
                self.start(op.clone());
            }
            _ => {
                op.set_error("Unknown command");
            }
        }
    }

    fn cron_cmd(&self, op: &mut Operation) {
        if let Some(position) = op.kwargs.get("rm") {
            let output = match parse_index(position) {
                Ok(position) => self.cron_delete(position),
                Err(msg) => msg,
            };
            op.set_output(output);
        } else if let Some(position) = op.kwargs.get("pause") {
            let output = match parse_index(position) {
                Ok(position) => self.cron_pause(position),
                Err(msg) => msg,
            };
            op.set_output(output);
        } else if op.kwargs.contains_key("modify") && op.kwargs.contains_key("cron") {
            let position = op.kwargs.get("modify").cloned().unwrap_or_default();
            let schedule = op.kwargs.get("cron").cloned().unwrap_or_default();
            let output = match (parse_index(&position), schedule.parse::<Schedule>()) {
                (Ok(position), Ok(schedule)) => self.cron_modify(position, schedule),
                (Err(msg), _) => msg,
                (_, Err(e)) => e.to_string(),
            };
            op.set_output(output);
        } else {
            let listing: Vec<String> = self
                .cron_get_list()
                .iter()
                .enumerate()
                .map(|(i, entry)| format!("{i}) {entry}"))
                .collect();
            op.output = Value::String(listing.join("\n"));
            op.data = json!(listing);
        }
    }

    fn ifttt_cmd(&self, op: &mut Operation) {
        if let Some(position) = op.kwargs.get("rm") {
            let output = match parse_index(position) {
                Ok(position) => self.ifttt_delete(position),
                Err(msg) => msg,
            };
            op.set_output(output);
        } else if let Some(position) = op.kwargs.get("pause") {
            let output = match parse_index(position) {
                Ok(position) => self.ifttt_pause(position),
                Err(msg) => msg,
            };
            op.set_output(output);
        } else {
            let listing: Vec<String> = self
                .ifttt_get_list()
                .iter()
                .enumerate()
                .map(|(i, entry)| format!("{i}) {entry}"))
                .collect();
            op.output = Value::String(listing.join("\n"));
            op.data = json!(listing);
        }
    }
}

/// `{tickers: map, <exchange>: ...}`: expressions may address the map
/// either through the `tickers` name or through a bare exchange name.
fn eval_namespace(tickers: &Value) -> Value {
    let mut namespace = match tickers {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    namespace.insert("tickers".to_string(), tickers.clone());
    Value::Object(namespace)
}

fn index_error(position: usize) -> String {
    format!("list index out of range: {position}")
}

fn parse_index(value: &str) -> Result<usize, String> {
    value
        .parse()
        .map_err(|_| format!("invalid index '{value}'"))
}

fn parse_optional_id(args: &[String]) -> Result<Option<u32>, String> {
    match args.first() {
        None => Ok(None),
        Some(arg) => arg
            .parse()
            .map(Some)
            .map_err(|_| format!("invalid task id '{arg}'")),
    }
}

fn parse_required_id(args: &[String]) -> Result<u32, String> {
    match args.first() {
        None => Err("Argument missing".into()),
        Some(arg) => arg.parse().map_err(|_| format!("invalid task id '{arg}'")),
    }
}

/// Fill `op` from one request frame; true when `raw_input` was used.
fn parse_request(request: &str, op: &mut Operation) -> Result<bool, String> {
    let data: Value = serde_json::from_str(request).map_err(|e| e.to_string())?;
    debug!("Incoming data: {}", data);

    if let Some(raw) = data.get("raw_input") {
        let line = raw.as_str().ok_or("raw_input must be a string")?;
        let (args, kwargs) = shellwords::parse_line(line).map_err(|e| e.to_string())?;
        let mut args = args.into_iter();
        op.cmd = args
            .next()
            .ok_or("empty command")?
            .to_lowercase();
        op.args = args.collect();
        op.kwargs = kwargs;
        return Ok(true);
    }

    let cmd = data
        .get("cmd")
        .and_then(Value::as_str)
        .ok_or("missing cmd")?;
    op.cmd = cmd.to_lowercase();
    op.args = match data.get("args") {
        Some(Value::Array(items)) => items.iter().map(stringify).collect(),
        _ => Vec::new(),
    };
    op.kwargs = match data.get("kwargs") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), stringify(v)))
            .collect(),
        _ => IndexMap::new(),
    };
    Ok(false)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
