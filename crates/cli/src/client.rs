// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP control client.
//!
//! Line-framed JSON request/response. A call retries up to three times
//! on connection reset before surfacing a hard failure; the connection
//! is reused across calls within a shell session.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

const CALL_RETRIES: usize = 3;

pub struct Client {
    server: String,
    verbose: bool,
    conn: Option<Conn>,
}

struct Conn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub fn new(server: String, verbose: bool) -> Self {
        Self {
            server,
            verbose,
            conn: None,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        if self.verbose {
            eprintln!("Connecting to {}", self.server);
        }
        let stream = TcpStream::connect(&self.server)
            .await
            .map_err(|e| anyhow!("Cannot connect. {e}"))?;
        let (read, writer) = stream.into_split();
        self.conn = Some(Conn {
            reader: BufReader::new(read),
            writer,
        });
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.conn = None;
    }

    /// Send a free-form command line as `raw_input`.
    pub async fn call_raw(&mut self, line: &str) -> Result<Value> {
        self.call(&json!({"raw_input": line})).await
    }

    /// Send one request frame and await its response.
    pub async fn call(&mut self, request: &Value) -> Result<Value> {
        let blob = serde_json::to_string(request)?;

        let mut last_err = anyhow!("call failed");
        for _ in 0..CALL_RETRIES {
            if let Err(e) = self.connect().await {
                last_err = e;
                continue;
            }
            if self.verbose {
                eprintln!("SEND {blob}");
            }
            match self.roundtrip(&blob).await {
                Ok(response) => {
                    if self.verbose {
                        eprintln!("GOT {response}");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    // Reset mid-call: reconnect and retry
                    self.disconnect();
                    last_err = e;
                }
            }
        }
        Err(last_err.context("tbot call failed"))
    }

    async fn roundtrip(&mut self, blob: &str) -> Result<Value> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| anyhow!("not connected"))?;
        conn.writer.write_all(blob.as_bytes()).await?;
        conn.writer.write_all(b"\r\n").await?;
        conn.writer.flush().await?;

        let mut line = String::new();
        let n = conn.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(anyhow!("connection closed"));
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }
}
