// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::Value;
use tbot_engine::test_support::fake_manager;

async fn start_server() -> (SocketAddr, Arc<TaskManager>, Bus) {
    let (manager, ctx) = fake_manager();
    let server = WsStreamServer::bind("127.0.0.1:0", Arc::clone(&manager), ctx.bus.clone())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (addr, manager, ctx.bus)
}

async fn connect(
    addr: SocketAddr,
) -> tokio_tungstenite::WebSocketStream<TcpStream> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (ws, _resp) = tokio_tungstenite::client_async(format!("ws://{addr}/"), stream)
        .await
        .unwrap();
    ws
}

async fn next_json(
    ws: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn requests_get_result_envelopes() {
    let (addr, _manager, _bus) = start_server().await;
    let mut ws = connect(addr).await;

    ws.send(Message::text(r#"{"raw_input": "stats"}"#))
        .await
        .unwrap();

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["stream"], "RESULT");
    assert_eq!(frame["data"]["cmd"], "stats");
    assert_eq!(frame["data"]["resp_code"], "OK");
}

#[tokio::test]
async fn bus_events_are_pushed_to_clients() {
    let (addr, _manager, bus) = start_server().await;
    let mut ws = connect(addr).await;

    // Give the connection task a beat to subscribe
    tokio::task::yield_now().await;
    ws.send(Message::text(r#"{"raw_input": "stats"}"#))
        .await
        .unwrap();
    let _ = next_json(&mut ws).await;

    bus.emit(EventName::Logger, json!({"msg": "hello"}));

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["stream"], "LOGGER");
    assert_eq!(frame["data"]["msg"], "hello");
}

#[tokio::test]
async fn quit_closes_the_stream() {
    let (addr, _manager, _bus) = start_server().await;
    let mut ws = connect(addr).await;

    ws.send(Message::text(r#"{"raw_input": "quit"}"#))
        .await
        .unwrap();
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["data"]["output"], "Goodbye!");

    // Server closes after answering
    loop {
        match ws.next().await {
            None => break,
            Some(Ok(Message::Close(_))) => break,
            Some(Ok(_)) => continue,
            Some(Err(_)) => break,
        }
    }
}
