//! End-to-end tests against a mock chat server
//!
//! Runs the real binary, feeds it chat frames over WebSocket and checks the
//! replies that come back on the same socket.

mod common;

use std::net::SocketAddr;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage, WebSocketStream};

use common::Workspace;

const GRUB_FINGERPRINT: &str = "0000000000000000000000000000Grub";

/// Kills the responder process when the test ends
struct Responder(Child);

impl Drop for Responder {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_responder(ws: &Workspace, addr: SocketAddr, extra: &str) -> Responder {
    let config = ws.write_config(&format!(
        r#"
[transport]
api_key = "test-key"
address = "ws://{addr}"
reconnect_interval_ms = 100

[dispatch]
{extra}

[personas]
dir = {dir:?}

[logging]
level = "debug"
"#,
        addr = addr,
        extra = extra,
        dir = ws.monsters_arg(),
    ));

    let child = Command::new(assert_cmd::cargo::cargo_bin("meatmonsters"))
        .args(["run", "--config", &config])
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    Responder(child)
}

fn grub_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.add_persona(
        "grub",
        "Grub",
        &[("greet", &["hello", "hi"], &["Hey there!"]), ("wave", &["bye"], &["Later."])],
    );
    ws.add_image("grub", "greet.gif", b"GIF89a");
    ws
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = tokio::time::timeout(Duration::from_secs(30), listener.accept())
        .await
        .expect("responder never connected")
        .unwrap();
    accept_async(stream).await.unwrap()
}

fn chat(message: &str) -> WsMessage {
    WsMessage::Text(
        serde_json::json!({
            "chat": { "key": "sender-1", "value": { "message": message } }
        })
        .to_string(),
    )
}

/// Next text frame as JSON, or None if nothing arrives within `wait`
async fn next_reply(ws: &mut WebSocketStream<TcpStream>, wait: Duration) -> Option<serde_json::Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Ok(Some(Ok(WsMessage::Text(text)))) => return Some(serde_json::from_str(&text).unwrap()),
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => panic!("websocket error: {e}"),
            Ok(None) | Err(_) => return None,
        }
    }
}

#[tokio::test]
async fn test_reply_over_websocket() {
    let ws = grub_workspace();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let _responder = spawn_responder(&ws, listener.local_addr().unwrap(), "warmup_events = 0\ncooldown_secs = 0");

    let mut socket = accept(&listener).await;
    socket.send(chat("hi friend")).await.unwrap();

    let reply = next_reply(&mut socket, Duration::from_secs(10))
        .await
        .expect("no reply received");
    assert_eq!(reply["apiKey"], "test-key");
    assert_eq!(reply["message"], "Hey there!");
    assert_eq!(reply["fingerprint"], GRUB_FINGERPRINT);
    assert_eq!(reply["picture"], "data:image/gif;base64,R0lGODlh");
}

#[tokio::test]
async fn test_malformed_and_unmatched_frames_are_ignored() {
    let ws = grub_workspace();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let _responder = spawn_responder(&ws, listener.local_addr().unwrap(), "warmup_events = 0\ncooldown_secs = 0");

    let mut socket = accept(&listener).await;
    socket.send(WsMessage::Text("not json".to_string())).await.unwrap();
    socket.send(WsMessage::Text(r#"{"chat": {"key": "k"}}"#.to_string())).await.unwrap();
    socket.send(chat("good morning")).await.unwrap();
    socket.send(chat("ok bye")).await.unwrap();

    let reply = next_reply(&mut socket, Duration::from_secs(10))
        .await
        .expect("no reply received");
    assert_eq!(reply["message"], "Later.");
    assert_eq!(reply["picture"], "");
}

#[tokio::test]
async fn test_warmup_and_cooldown() {
    let ws = grub_workspace();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let _responder = spawn_responder(&ws, listener.local_addr().unwrap(), "warmup_events = 2\ncooldown_secs = 0");

    let mut socket = accept(&listener).await;

    // Swallowed by the warm-up
    socket.send(chat("hello")).await.unwrap();
    socket.send(chat("hello")).await.unwrap();
    assert!(next_reply(&mut socket, Duration::from_millis(500)).await.is_none());

    socket.send(chat("hello")).await.unwrap();
    assert!(next_reply(&mut socket, Duration::from_secs(10)).await.is_some());
}

#[tokio::test]
async fn test_cooldown_suppresses_second_reply() {
    let ws = grub_workspace();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let _responder = spawn_responder(&ws, listener.local_addr().unwrap(), "warmup_events = 0\ncooldown_secs = 1");

    let mut socket = accept(&listener).await;

    // The cooldown window opens at startup
    tokio::time::sleep(Duration::from_millis(1500)).await;
    socket.send(chat("hi friend")).await.unwrap();
    assert!(next_reply(&mut socket, Duration::from_secs(10)).await.is_some());

    socket.send(chat("hi again")).await.unwrap();
    assert!(next_reply(&mut socket, Duration::from_millis(300)).await.is_none());
}
