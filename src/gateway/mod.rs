pub mod events;
pub mod heartbeat;
pub mod intents;
pub mod machine;
pub mod reconnect;
pub mod session;
pub mod state;

use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::rest::RestClient;
use events::{GatewayEvent, GatewayMessage};
use machine::{Action, GatewayMachine, Input};
use reconnect::ReconnectConfig;
use state::{AtomicConnectionState, ConnectionState};

/// Protocol version appended to every connection endpoint.
pub const GATEWAY_VERSION: u8 = 10;

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub token: String,
    pub intents: u32,
    pub gateway_version: u8,
    pub reconnect: ReconnectConfig,
}

impl GatewayConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            intents: intents::DEFAULT,
            gateway_version: GATEWAY_VERSION,
            reconnect: ReconnectConfig::default(),
        }
    }
}

enum Command {
    Connect,
    Send(GatewayMessage),
    Destroy,
}

/// Handle to one gateway connection task.
///
/// Construction spawns the connection task; `connect()` asks it to establish
/// the transport. All protocol state lives inside the task (see
/// [`machine::GatewayMachine`]); this handle only carries the command
/// channel and a read-only state mirror, so clones are cheap and multiple
/// clients are fully independent.
pub struct GatewayClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: Arc<AtomicConnectionState>,
}

impl GatewayClient {
    /// Spawn the connection task. Returns the client handle and the event
    /// stream the consumer reads lifecycle and dispatch events from.
    pub fn new(
        rest: RestClient,
        config: GatewayConfig,
    ) -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));

        let machine = GatewayMachine::new(
            config.token.clone(),
            config.intents,
            config.reconnect.clone(),
        );
        let mirror = Arc::clone(&state);
        tokio::spawn(run(
            machine,
            rest,
            config.gateway_version,
            cmd_rx,
            event_tx,
            mirror,
        ));

        (Self { cmd_tx, state }, event_rx)
    }

    /// Begin connection establishment. Idempotent: a no-op while a
    /// connection is live or pending. Success is observable through the
    /// event stream (`Ready`), not a return value.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    /// Transmit a control-plane frame. Logged and dropped when the
    /// transport is not open; callers get no delivery guarantee.
    pub fn send(&self, frame: GatewayMessage) {
        let _ = self.cmd_tx.send(Command::Send(frame));
    }

    /// Tear the connection down and suppress all further reconnection.
    /// Terminal; the client cannot be reused afterwards.
    pub fn destroy(&self) {
        let _ = self.cmd_tx.send(Command::Destroy);
    }

    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Shared read-only view of the connection state, for observers like
    /// the health endpoint.
    pub fn state_handle(&self) -> Arc<AtomicConnectionState> {
        Arc::clone(&self.state)
    }
}

enum Wake {
    Command(Option<Command>),
    Established(Result<Transport, String>),
    Transport(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
    HeartbeatTick,
    DelayElapsed,
}

/// The connection task: translates transport/timer/command events into
/// machine inputs and carries out the resulting actions. All transitions
/// run to completion here before the next event is looked at.
async fn run(
    mut machine: GatewayMachine,
    rest: RestClient,
    version: u8,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<GatewayEvent>,
    mirror: Arc<AtomicConnectionState>,
) {
    let mut ws: Option<Transport> = None;
    let mut connecting: Option<BoxFuture<'static, Result<Transport, String>>> = None;
    let mut heartbeat: Option<tokio::time::Interval> = None;
    let mut reconnect_delay: Option<Pin<Box<tokio::time::Sleep>>> = None;

    loop {
        let wake = tokio::select! {
            cmd = cmd_rx.recv() => Wake::Command(cmd),
            res = async {
                match connecting.as_mut() {
                    Some(fut) => fut.as_mut().await,
                    None => std::future::pending().await,
                }
            } => Wake::Established(res),
            msg = async {
                match ws.as_mut() {
                    Some(stream) => stream.next().await,
                    None => std::future::pending().await,
                }
            } => Wake::Transport(msg),
            _ = async {
                match heartbeat.as_mut() {
                    Some(interval) => { interval.tick().await; }
                    None => std::future::pending().await,
                }
            } => Wake::HeartbeatTick,
            _ = async {
                match reconnect_delay.as_mut() {
                    Some(sleep) => sleep.as_mut().await,
                    None => std::future::pending().await,
                }
            } => Wake::DelayElapsed,
        };

        let input = match wake {
            // Destroy (or a dropped handle) ends the task; any in-flight
            // directory lookup or connect attempt is dropped with it.
            Wake::Command(None) | Wake::Command(Some(Command::Destroy)) => break,
            Wake::Command(Some(Command::Connect)) => Some(Input::ConnectRequested),
            Wake::Command(Some(Command::Send(frame))) => {
                send_frame(&mut ws, &frame).await;
                None
            }
            Wake::Established(Ok(stream)) => {
                connecting = None;
                ws = Some(stream);
                Some(Input::TransportOpened)
            }
            Wake::Established(Err(reason)) => {
                connecting = None;
                Some(Input::TransportFailed { reason })
            }
            Wake::Transport(Some(Ok(Message::Text(text)))) => {
                match serde_json::from_str::<GatewayMessage>(text.as_str()) {
                    Ok(frame) => Some(Input::Frame(frame)),
                    Err(e) => {
                        tracing::warn!("dropping malformed frame: {e}");
                        None
                    }
                }
            }
            Wake::Transport(Some(Ok(Message::Close(frame)))) => {
                ws = None;
                Some(Input::TransportFailed {
                    reason: format!("closed by server: {frame:?}"),
                })
            }
            Wake::Transport(Some(Ok(_))) => None, // ping/pong/binary
            Wake::Transport(Some(Err(e))) => {
                ws = None;
                Some(Input::TransportFailed {
                    reason: format!("websocket error: {e}"),
                })
            }
            Wake::Transport(None) => {
                ws = None;
                Some(Input::TransportFailed {
                    reason: "connection closed".to_string(),
                })
            }
            Wake::HeartbeatTick => Some(Input::HeartbeatDue),
            Wake::DelayElapsed => {
                reconnect_delay = None;
                Some(Input::ConnectRequested)
            }
        };

        let Some(input) = input else { continue };

        for action in machine.handle(input) {
            match action {
                Action::OpenTransport { endpoint } => {
                    let rest = rest.clone();
                    connecting = Some(Box::pin(establish(rest, endpoint, version)));
                }
                Action::SendFrame(frame) => send_frame(&mut ws, &frame).await,
                Action::StartHeartbeat(interval) => {
                    // The HELLO beat just went out; the first tick lands one
                    // full interval from now.
                    let start = tokio::time::Instant::now() + interval;
                    heartbeat = Some(tokio::time::interval_at(start, interval));
                }
                Action::StopHeartbeat => heartbeat = None,
                Action::CloseTransport => {
                    if let Some(mut stream) = ws.take() {
                        let _ = stream.close(None).await;
                    }
                }
                Action::ScheduleReconnect(delay) => {
                    reconnect_delay = Some(Box::pin(tokio::time::sleep(delay)));
                }
                Action::Emit(event) => {
                    let _ = event_tx.send(event);
                }
            }
        }

        mirror.store(machine.state());
        if machine.state() == ConnectionState::Failed {
            break;
        }
    }

    if let Some(mut stream) = ws.take() {
        let _ = stream.close(None).await;
    }
    if machine.state() != ConnectionState::Failed {
        mirror.store(ConnectionState::Disconnected);
    }
    tracing::debug!("gateway connection task stopped");
}

/// Resolve the endpoint (directory service unless resuming) and open the
/// websocket. Errors come back as strings: every failure here is a
/// transient transport failure as far as the machine is concerned.
async fn establish(
    rest: RestClient,
    endpoint: Option<String>,
    version: u8,
) -> Result<Transport, String> {
    let base = match endpoint {
        Some(url) => url,
        None => {
            rest.get_gateway()
                .await
                .map_err(|e| format!("gateway endpoint lookup failed: {e}"))?
                .url
        }
    };
    let url = format!("{base}/?v={version}&encoding=json");
    tracing::debug!(%url, "opening gateway connection");
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| format!("websocket connect failed: {e}"))?;
    Ok(stream)
}

async fn send_frame(ws: &mut Option<Transport>, frame: &GatewayMessage) {
    let Some(stream) = ws.as_mut() else {
        tracing::warn!(op = frame.op, "transport not open, dropping outbound frame");
        return;
    };
    match serde_json::to_string(frame) {
        Ok(json) => {
            if let Err(e) = stream.send(Message::Text(json.into())).await {
                tracing::warn!("failed to send frame: {e}");
            }
        }
        Err(e) => tracing::warn!("failed to serialize frame: {e}"),
    }
}
