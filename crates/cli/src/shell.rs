// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive shell: each line goes to the server as `raw_input` and
//! the response `output` is printed, lists line by line. `GET` results
//! render their log records with human timestamps, like the server logs
//! themselves.

use crate::client::Client;
use anyhow::Result;
use chrono::DateTime;
use serde_json::Value;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(client: &mut Client) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt()?;
            continue;
        }

        let response = client.call_raw(line).await?;
        print_response(line, &response);

        if line.eq_ignore_ascii_case("quit") {
            break;
        }
        prompt()?;
    }
    Ok(())
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Render one response for the terminal.
pub fn print_response(line: &str, response: &Value) {
    let cmd = line.split_whitespace().next().unwrap_or("");
    if cmd.eq_ignore_ascii_case("get") {
        if let Some(records) = response.get("data").and_then(Value::as_array) {
            for record in records {
                println!("{}", format_log_record(record));
            }
            return;
        }
    }

    match response.get("output") {
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(s) => println!("{s}"),
                    other => println!("{other}"),
                }
            }
        }
        Some(Value::String(s)) => {
            if !s.is_empty() {
                println!("{s}");
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => println!("{other}"),
    }
}

/// `2026-01-05 12:00:00 3 - Ping #1`
fn format_log_record(record: &Value) -> String {
    let ts = record.get("ts").and_then(Value::as_f64).unwrap_or(0.0);
    let task_id = record.get("taskId").and_then(Value::as_u64).unwrap_or(0);
    let msg = record.get("msg").and_then(Value::as_str).unwrap_or("");
    let stamp = DateTime::from_timestamp(ts as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    format!("{stamp} {task_id} - {msg}")
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
