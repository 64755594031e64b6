// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unary control channel: line-terminated JSON over TCP.
//!
//! One request per line, one `{resp_code, output, data}` response per
//! request, both `\r\n`-terminated. The read loop ends on `QUIT` or EOF;
//! malformed requests answer an error and keep the connection open.

use std::net::SocketAddr;
use std::sync::Arc;
use tbot_engine::TaskManager;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

pub struct TcpControlServer {
    listener: TcpListener,
    manager: Arc<TaskManager>,
}

impl TcpControlServer {
    pub async fn bind(addr: &str, manager: Arc<TaskManager>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening at {}", listener.local_addr()?);
        Ok(Self { listener, manager })
    }

    /// The actually-bound address (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop; each connection is served by its own task.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("Received connection from {}", peer);
                    let manager = Arc::clone(&self.manager);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, manager).await {
                            debug!("connection with {} ended: {}", peer, e);
                        }
                        debug!("Closing connection with {}", peer);
                    });
                }
                Err(e) => error!("Accept error: {}", e),
            }
        }
    }
}

/// Serve one connection: requests are processed strictly in order.
async fn handle_client(
    stream: TcpStream,
    manager: Arc<TaskManager>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let op = manager.process_request(&line).await;
        let payload = serde_json::to_string(&op.to_response())
            .unwrap_or_else(|e| format!(r#"{{"resp_code":"ERR","output":"ERR: {e}","data":null}}"#));
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;

        if op.cmd == "quit" {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tcp_tests.rs"]
mod tests;
