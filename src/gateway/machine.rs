use std::time::Duration;

use serde_json::Value;

use super::events::{opcode, GatewayEvent, GatewayMessage, HelloData, ReadyData};
use super::heartbeat::Heartbeat;
use super::reconnect::ReconnectConfig;
use super::session::Session;
use super::state::ConnectionState;

/// Inputs fed to the state machine by the IO driver (or by tests).
#[derive(Debug)]
pub enum Input {
    /// `connect()` was called, or a scheduled reconnect delay elapsed.
    ConnectRequested,
    /// The websocket handshake completed.
    TransportOpened,
    /// A decoded frame arrived.
    Frame(GatewayMessage),
    /// The transport closed, errored, or could not be established.
    /// Directory-service failures land here too.
    TransportFailed { reason: String },
    /// The heartbeat interval fired.
    HeartbeatDue,
}

/// Side effects for the IO driver to carry out, in order.
#[derive(Debug)]
pub enum Action {
    /// Establish a transport. `endpoint` is the resume endpoint when a
    /// session is being resumed; `None` means resolve via the directory
    /// service.
    OpenTransport { endpoint: Option<String> },
    SendFrame(GatewayMessage),
    StartHeartbeat(Duration),
    StopHeartbeat,
    CloseTransport,
    ScheduleReconnect(Duration),
    Emit(GatewayEvent),
}

/// The connection state machine. Owns all protocol state (session,
/// heartbeat, retry counter) and is the single writer of it. Pure of I/O:
/// every transition is `handle(input) -> actions`, so the whole protocol is
/// testable without a socket.
pub struct GatewayMachine {
    state: ConnectionState,
    session: Session,
    heartbeat: Heartbeat,
    reconnect: ReconnectConfig,
    attempts: u32,
    token: String,
    intents: u32,
}

impl GatewayMachine {
    pub fn new(token: impl Into<String>, intents: u32, reconnect: ReconnectConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: Session::default(),
            heartbeat: Heartbeat::default(),
            reconnect,
            attempts: 0,
            token: token.into(),
            intents,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        if self.state == ConnectionState::Failed {
            return Vec::new();
        }
        match input {
            Input::ConnectRequested => self.on_connect_requested(),
            Input::TransportOpened => self.on_transport_opened(),
            Input::Frame(frame) => self.on_frame(frame),
            Input::TransportFailed { reason } => self.on_transport_failed(reason),
            Input::HeartbeatDue => self.on_heartbeat_due(),
        }
    }

    fn on_connect_requested(&mut self) -> Vec<Action> {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                self.state = ConnectionState::Connecting;
                let endpoint = if self.session.can_resume() {
                    self.session.resume_gateway_url().map(str::to_owned)
                } else {
                    None
                };
                vec![Action::OpenTransport { endpoint }]
            }
            // connect() is idempotent while a connection is live or pending
            _ => Vec::new(),
        }
    }

    fn on_transport_opened(&mut self) -> Vec<Action> {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::AwaitingHello;
        }
        Vec::new()
    }

    fn on_frame(&mut self, frame: GatewayMessage) -> Vec<Action> {
        if let Some(seq) = frame.seq {
            self.session.observe_seq(seq);
        }
        match frame.op {
            opcode::HELLO => self.on_hello(frame),
            opcode::HEARTBEAT_ACK => {
                self.heartbeat.ack_received();
                Vec::new()
            }
            opcode::DISPATCH => self.on_dispatch(frame),
            opcode::RECONNECT => {
                tracing::info!("server requested reconnect");
                self.recycle_connection(false)
            }
            opcode::INVALID_SESSION => {
                let resumable = frame.data.as_ref().and_then(Value::as_bool).unwrap_or(false);
                tracing::info!(resumable, "server invalidated the session");
                self.recycle_connection(!resumable)
            }
            other => {
                // Unknown opcodes are tolerated for forward compatibility.
                tracing::debug!(op = other, "ignoring unknown opcode");
                Vec::new()
            }
        }
    }

    fn on_hello(&mut self, frame: GatewayMessage) -> Vec<Action> {
        let interval = frame
            .data
            .and_then(|d| serde_json::from_value::<HelloData>(d).ok())
            .map(|hello| Duration::from_millis(hello.heartbeat_interval));
        let Some(interval) = interval else {
            tracing::warn!("HELLO without a heartbeat interval, ignoring frame");
            return Vec::new();
        };

        tracing::debug!(?interval, "HELLO received, starting heartbeat");
        self.heartbeat.start(interval);
        // One beat goes out right away; it does not arm the ack check.
        let mut actions = vec![
            Action::StartHeartbeat(interval),
            Action::SendFrame(GatewayMessage::heartbeat(self.session.sequence())),
        ];
        if self.session.can_resume() {
            let session_id = self.session.session_id().unwrap_or_default().to_owned();
            tracing::info!(session_id = %session_id, "resuming session");
            self.state = ConnectionState::Resuming;
            actions.push(Action::SendFrame(GatewayMessage::resume(
                &self.token,
                &session_id,
                self.session.sequence(),
            )));
        } else {
            tracing::info!("identifying");
            self.state = ConnectionState::Identifying;
            actions.push(Action::SendFrame(GatewayMessage::identify(
                &self.token,
                self.intents,
            )));
        }
        actions
    }

    fn on_dispatch(&mut self, frame: GatewayMessage) -> Vec<Action> {
        let name = frame.event_type.unwrap_or_default();
        let data = frame.data.unwrap_or(Value::Null);
        match name.as_str() {
            "READY" => match serde_json::from_value::<ReadyData>(data.clone()) {
                Ok(ready) => {
                    tracing::info!(session_id = %ready.session_id, "gateway ready");
                    self.session
                        .establish(ready.session_id, ready.resume_gateway_url);
                    self.attempts = 0;
                    self.state = ConnectionState::Connected;
                    vec![Action::Emit(GatewayEvent::Ready(data))]
                }
                Err(e) => {
                    tracing::warn!("malformed READY payload: {e}");
                    Vec::new()
                }
            },
            "RESUMED" => {
                tracing::info!("session resumed");
                self.attempts = 0;
                self.state = ConnectionState::Connected;
                vec![Action::Emit(GatewayEvent::Dispatch { name, data })]
            }
            _ => vec![Action::Emit(GatewayEvent::Dispatch { name, data })],
        }
    }

    /// Server-requested teardown (RECONNECT or INVALID_SESSION). Re-enters
    /// `Connecting` after a jittered delay; the retry counter is untouched
    /// because nothing failed.
    fn recycle_connection(&mut self, clear_session: bool) -> Vec<Action> {
        if clear_session {
            self.session.invalidate();
        }
        self.heartbeat.stop();
        self.state = ConnectionState::Reconnecting;
        let delay = self.reconnect.resume_delay();
        vec![
            Action::StopHeartbeat,
            Action::CloseTransport,
            Action::ScheduleReconnect(delay),
            Action::Emit(GatewayEvent::Reconnecting {
                attempt: self.attempts,
                delay,
            }),
        ]
    }

    fn on_transport_failed(&mut self, reason: String) -> Vec<Action> {
        match self.state {
            // idle, or already tearing down: a trailing close event is
            // expected after a forced close and must not double-schedule
            ConnectionState::Disconnected | ConnectionState::Reconnecting => Vec::new(),
            _ => {
                self.heartbeat.stop();
                self.attempts += 1;
                let mut actions = vec![
                    Action::StopHeartbeat,
                    Action::Emit(GatewayEvent::Disconnected {
                        reason: reason.clone(),
                    }),
                ];
                if self.reconnect.should_reconnect(self.attempts) {
                    let delay = self.reconnect.delay_for_attempt(self.attempts);
                    tracing::warn!(
                        attempt = self.attempts,
                        ?delay,
                        "connection lost ({reason}), reconnecting"
                    );
                    self.state = ConnectionState::Reconnecting;
                    actions.push(Action::ScheduleReconnect(delay));
                    actions.push(Action::Emit(GatewayEvent::Reconnecting {
                        attempt: self.attempts,
                        delay,
                    }));
                } else {
                    tracing::error!(attempts = self.attempts, "reconnect budget exhausted");
                    self.state = ConnectionState::Failed;
                    actions.push(Action::Emit(GatewayEvent::Fatal {
                        attempts: self.attempts,
                    }));
                }
                actions
            }
        }
    }

    fn on_heartbeat_due(&mut self) -> Vec<Action> {
        if !self.heartbeat.is_running() {
            return Vec::new();
        }
        if self.heartbeat.fire() {
            vec![Action::SendFrame(GatewayMessage::heartbeat(
                self.session.sequence(),
            ))]
        } else {
            tracing::warn!("heartbeat ack missed, recycling the connection");
            let mut actions = vec![Action::CloseTransport];
            actions.extend(self.on_transport_failed("missed heartbeat ack".to_string()));
            actions
        }
    }
}
