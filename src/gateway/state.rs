use std::sync::atomic::{AtomicU32, Ordering};

/// State of the gateway connection.
///
/// Exactly one authoritative instance exists per client, owned and mutated
/// only by the connection task's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to be.
    Disconnected,
    /// Resolving the endpoint / websocket handshake in progress.
    Connecting,
    /// Transport open, waiting for the server's HELLO frame.
    AwaitingHello,
    /// IDENTIFY sent, waiting for READY.
    Identifying,
    /// RESUME sent, waiting for the replay to complete.
    Resuming,
    /// Handshake complete, dispatch events flowing.
    Connected,
    /// Connection lost, retry scheduled.
    Reconnecting,
    /// Retry budget exhausted. Terminal.
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingHello => "awaiting_hello",
            ConnectionState::Identifying => "identifying",
            ConnectionState::Resuming => "resuming",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }
}

/// Read-only mirror of the connection state for observers outside the
/// connection task (e.g. the health endpoint).
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU32);

impl AtomicConnectionState {
    pub const fn new(state: ConnectionState) -> Self {
        Self(AtomicU32::new(state as u32))
    }

    pub fn load(&self) -> ConnectionState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::AwaitingHello,
            3 => ConnectionState::Identifying,
            4 => ConnectionState::Resuming,
            5 => ConnectionState::Connected,
            6 => ConnectionState::Reconnecting,
            _ => ConnectionState::Failed,
        }
    }

    pub fn store(&self, state: ConnectionState) {
        self.0.store(state as u32, Ordering::SeqCst);
    }
}
