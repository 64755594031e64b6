// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations: the unit of work routed through the system.
//!
//! An Operation carries a command, its free-form arguments, and the
//! response fields filled in by the dispatcher. The same shape is
//! serialized back to control clients.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Response code for a processed operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RespCode {
    #[default]
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERR")]
    Err,
}

impl fmt::Display for RespCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespCode::Ok => write!(f, "OK"),
            RespCode::Err => write!(f, "ERR"),
        }
    }
}

/// A command plus its response fields.
///
/// Commands are case-insensitive on the wire; the dispatcher canonicalizes
/// `cmd` to lower case on ingest and matches upper-case internally.
/// Kwargs keep insertion order so listings render the way the caller
/// typed them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub kwargs: IndexMap<String, String>,
    #[serde(default)]
    pub resp_code: RespCode,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub data: Value,
}

impl Operation {
    /// Create an operation with empty response fields.
    pub fn new(
        cmd: impl Into<String>,
        args: Vec<String>,
        kwargs: IndexMap<String, String>,
    ) -> Self {
        Self {
            cmd: cmd.into(),
            args,
            kwargs,
            resp_code: RespCode::Ok,
            output: Value::String(String::new()),
            data: Value::Null,
        }
    }

    /// Mark the operation failed with a message in `output`.
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.resp_code = RespCode::Err;
        self.output = Value::String(msg.into());
    }

    /// Set `output` to a plain string.
    pub fn set_output(&mut self, msg: impl Into<String>) {
        self.output = Value::String(msg.into());
    }

    /// Response frame for the unary control channel.
    pub fn to_response(&self) -> Response {
        Response {
            resp_code: self.resp_code,
            output: self.output.clone(),
            data: self.data.clone(),
        }
    }

    /// Response frame for the streaming channel.
    pub fn to_stream_response(&self) -> StreamResponse {
        StreamResponse {
            stream: "RESULT",
            data: StreamResult {
                cmd: self.cmd.clone(),
                resp_code: self.resp_code,
                output: self.output.clone(),
                data: self.data.clone(),
            },
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cmd)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        for (k, v) in &self.kwargs {
            write!(f, " {}={}", k, v)?;
        }
        Ok(())
    }
}

/// `{resp_code, output, data}` answer on the unary channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub resp_code: RespCode,
    pub output: Value,
    pub data: Value,
}

/// `{"stream": "RESULT", "data": {...}}` answer on the streaming channel.
#[derive(Debug, Clone, Serialize)]
pub struct StreamResponse {
    pub stream: &'static str,
    pub data: StreamResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamResult {
    pub cmd: String,
    pub resp_code: RespCode,
    pub output: Value,
    pub data: Value,
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
