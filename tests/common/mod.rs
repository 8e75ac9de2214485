#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use gatewire::gateway::events::GatewayEvent;
use gatewire::gateway::reconnect::ReconnectConfig;
use gatewire::gateway::{GatewayClient, GatewayConfig};
use gatewire::rest::RestClient;

pub const SESSION_ID: &str = "sess-abc";
pub const TEST_TOKEN: &str = "test-token";

/// Behavior knobs for the scripted gateway.
#[derive(Clone)]
pub struct MockOptions {
    pub heartbeat_interval_ms: u64,
    pub ack_heartbeats: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            // Long enough that no timer fires unless a test asks for it
            heartbeat_interval_ms: 60_000,
            ack_heartbeats: true,
        }
    }
}

/// An inbound frame observed by the mock, tagged with the connection
/// (1-based) it arrived on.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub conn: u32,
    pub frame: serde_json::Value,
}

#[derive(Debug, Clone)]
enum Control {
    Send(serde_json::Value),
    Close,
}

#[derive(Clone)]
struct MockState {
    options: MockOptions,
    ws_url: String,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    control_tx: broadcast::Sender<Control>,
    connections: Arc<AtomicU32>,
    messages: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

/// A scripted gateway + REST directory, bound to an ephemeral port. Plays
/// the server side of the handshake (HELLO, READY, RESUMED, heartbeat
/// acks) and records everything the client sends.
pub struct MockGateway {
    pub http_url: String,
    pub ws_url: String,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    control_tx: broadcast::Sender<Control>,
    connections: Arc<AtomicU32>,
    messages: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl MockGateway {
    pub async fn spawn(options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let http_url = format!("http://{addr}");
        let ws_url = format!("ws://{addr}");

        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (control_tx, _) = broadcast::channel(64);
        let connections = Arc::new(AtomicU32::new(0));
        let messages = Arc::new(Mutex::new(Vec::new()));

        let state = MockState {
            options,
            ws_url: ws_url.clone(),
            inbound_tx,
            control_tx: control_tx.clone(),
            connections: Arc::clone(&connections),
            messages: Arc::clone(&messages),
        };

        let app = Router::new()
            .route("/", get(ws_upgrade))
            .route("/gateway/bot", get(get_gateway))
            .route("/users/@me", get(current_user))
            .route("/users/@me/guilds", get(list_guilds))
            .route(
                "/channels/{channel_id}/messages",
                get(get_messages).post(create_message),
            )
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            http_url,
            ws_url,
            inbound,
            control_tx,
            connections,
            messages,
        }
    }

    /// Number of websocket connections accepted so far.
    pub fn connections(&self) -> u32 {
        self.connections.load(Ordering::SeqCst)
    }

    /// Push a frame to every live connection. Dispatch frames without an
    /// `s` field get the server's next sequence number.
    pub fn send_frame(&self, frame: serde_json::Value) {
        let _ = self.control_tx.send(Control::Send(frame));
    }

    /// Close every live connection from the server side.
    pub fn close_connections(&self) {
        let _ = self.control_tx.send(Control::Close);
    }

    /// Messages posted to the REST messages endpoint: `(channel_id, body)`.
    pub fn posted_messages(&self) -> Vec<(String, serde_json::Value)> {
        self.messages.lock().unwrap().clone()
    }

    /// Next frame the client sent, within a deadline.
    pub async fn recv(&mut self) -> Inbound {
        tokio::time::timeout(Duration::from_secs(5), self.inbound.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("mock inbound channel closed")
    }

    /// Next frame with the given opcode, skipping others.
    pub async fn recv_op(&mut self, op: u8) -> Inbound {
        loop {
            let inbound = self.recv().await;
            if inbound.frame["op"] == op {
                return inbound;
            }
        }
    }

    /// Everything the client sends within `window`.
    pub async fn frames_for(&mut self, window: Duration) -> Vec<Inbound> {
        let mut frames = Vec::new();
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.inbound.recv()).await {
                Ok(Some(inbound)) => frames.push(inbound),
                Ok(None) | Err(_) => return frames,
            }
        }
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<MockState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: MockState) {
    let conn = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    let mut control_rx = state.control_tx.subscribe();

    let hello = serde_json::json!({
        "op": 10,
        "d": { "heartbeat_interval": state.options.heartbeat_interval_ms }
    });
    if socket
        .send(Message::Text(hello.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    let mut seq: u64 = 0;
    loop {
        tokio::select! {
            ctl = control_rx.recv() => match ctl {
                Ok(Control::Send(mut frame)) => {
                    if frame["op"] == 0 && frame.get("s").is_none() {
                        seq += 1;
                        frame["s"] = serde_json::json!(seq);
                    }
                    if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Ok(Control::Close) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                Err(_) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let frame: serde_json::Value = match serde_json::from_str(&text) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    let op = frame["op"].as_u64().unwrap_or(255);
                    let _ = state.inbound_tx.send(Inbound { conn, frame: frame.clone() });

                    match op {
                        // HEARTBEAT
                        1 => {
                            if state.options.ack_heartbeats {
                                let ack = serde_json::json!({ "op": 11 });
                                if socket.send(Message::Text(ack.to_string().into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        // IDENTIFY -> READY
                        2 => {
                            seq += 1;
                            let ready = serde_json::json!({
                                "op": 0,
                                "s": seq,
                                "t": "READY",
                                "d": {
                                    "session_id": SESSION_ID,
                                    "resume_gateway_url": state.ws_url,
                                    "user": { "id": "42", "username": "mockbot" }
                                }
                            });
                            if socket.send(Message::Text(ready.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        // RESUME -> RESUMED
                        6 => {
                            seq += 1;
                            let resumed = serde_json::json!({
                                "op": 0,
                                "s": seq,
                                "t": "RESUMED",
                                "d": {}
                            });
                            if socket.send(Message::Text(resumed.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}

async fn get_gateway(State(state): State<MockState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "url": state.ws_url,
        "shards": 1
    }))
}

async fn current_user() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "id": "42",
        "username": "mockbot",
        "discriminator": "0001"
    }))
}

async fn list_guilds() -> Json<serde_json::Value> {
    Json(serde_json::json!([
        { "id": "g1", "name": "Test Guild" },
        { "id": "g2", "name": "Other Guild" }
    ]))
}

async fn create_message(
    Path(channel_id): Path<String>,
    State(state): State<MockState>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if channel_id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "message": "Unknown Channel", "code": 10003 })),
        )
            .into_response();
    }
    state
        .messages
        .lock()
        .unwrap()
        .push((channel_id.clone(), body.clone()));
    Json(serde_json::json!({
        "id": "m1",
        "channel_id": channel_id,
        "content": body["content"],
        "author": { "id": "42", "username": "mockbot", "bot": true }
    }))
    .into_response()
}

async fn get_messages(Path(channel_id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!([
        {
            "id": "m2",
            "channel_id": channel_id,
            "content": "second",
            "author": { "id": "7", "username": "someone" }
        },
        {
            "id": "m1",
            "channel_id": channel_id,
            "content": "first",
            "author": { "id": "7", "username": "someone" }
        }
    ]))
}

/// Short, deterministic delays so reconnect paths run inside test budgets.
pub fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        backoff_multiplier: 2.0,
        max_attempts: 5,
        resume_delay_min: Duration::from_millis(10),
        resume_delay_max: Duration::from_millis(10),
    }
}

/// A client wired to the mock, not yet connected.
pub fn spawn_client(
    mock: &MockGateway,
) -> (GatewayClient, mpsc::UnboundedReceiver<GatewayEvent>) {
    let rest = RestClient::new(mock.http_url.clone(), TEST_TOKEN);
    let mut config = GatewayConfig::new(TEST_TOKEN);
    config.reconnect = fast_reconnect();
    GatewayClient::new(rest, config)
}

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<GatewayEvent>) -> GatewayEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a gateway event")
        .expect("event channel closed")
}

/// Skip lifecycle events until READY completes.
pub async fn wait_for_ready(
    events: &mut mpsc::UnboundedReceiver<GatewayEvent>,
) -> serde_json::Value {
    loop {
        if let GatewayEvent::Ready(data) = next_event(events).await {
            return data;
        }
    }
}

/// Skip events until the named dispatch arrives.
pub async fn wait_for_dispatch(
    events: &mut mpsc::UnboundedReceiver<GatewayEvent>,
    wanted: &str,
) -> serde_json::Value {
    loop {
        if let GatewayEvent::Dispatch { name, data } = next_event(events).await {
            if name == wanted {
                return data;
            }
        }
    }
}
