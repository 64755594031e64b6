// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming channel: WebSocket on control port + 1.
//!
//! Clients send the same request frames as on the unary channel and get
//! `{"stream": "RESULT", "data": ...}` responses. In addition every bus
//! event is pushed as `{"stream": "<EVENT>", "data": <payload>}`.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tbot_core::EventName;
use tbot_engine::{Bus, TaskManager};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

pub struct WsStreamServer {
    listener: TcpListener,
    manager: Arc<TaskManager>,
    bus: Bus,
}

impl WsStreamServer {
    pub async fn bind(addr: &str, manager: Arc<TaskManager>, bus: Bus) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening websocket at {}", listener.local_addr()?);
        Ok(Self {
            listener,
            manager,
            bus,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("Received connection from {}", peer);
                    let manager = Arc::clone(&self.manager);
                    let bus = self.bus.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, manager, bus).await {
                            debug!("ws connection with {} ended: {}", peer, e);
                        }
                        debug!("Closing connection with {}", peer);
                    });
                }
                Err(e) => error!("Accept error: {}", e),
            }
        }
    }
}

/// Serve one socket: interleave request handling with event push.
async fn handle_client(
    stream: TcpStream,
    manager: Arc<TaskManager>,
    bus: Bus,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();
    let mut events = bus.subscribe(EventName::All);

    loop {
        tokio::select! {
            incoming = source.next() => {
                match incoming {
                    Some(Ok(Message::Text(request))) => {
                        let op = manager.process_request(request.as_str()).await;
                        let payload = serde_json::to_string(&op.to_stream_response())
                            .unwrap_or_default();
                        sink.send(Message::text(payload)).await?;
                        if op.cmd == "quit" {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ignore pings/binary
                    Some(Err(e)) => return Err(e),
                }
            }
            event = events.recv() => {
                let Some(msg) = event else { break };
                let frame = json!({
                    "stream": msg.event.as_str(),
                    "data": msg.payload,
                });
                sink.send(Message::text(frame.to_string())).await?;
            }
        }
    }

    let _ = sink.close().await;
    Ok(())
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
