use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Opcodes for gateway control frames. Wire-exact; these values belong to
/// the remote protocol and are not negotiable.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Gateway frame envelope. Wire field names are single letters: `d` is the
/// payload, `s` the sequence number, `t` the dispatch event name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(rename = "d", skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl GatewayMessage {
    /// Heartbeat frame carrying the last observed sequence number
    /// (`null` before the first dispatch).
    pub fn heartbeat(seq: Option<u64>) -> Self {
        Self {
            op: opcode::HEARTBEAT,
            data: Some(json!(seq)),
            seq: None,
            event_type: None,
        }
    }

    /// IDENTIFY frame with credentials and the capability bitmask.
    pub fn identify(token: &str, intents: u32) -> Self {
        Self {
            op: opcode::IDENTIFY,
            data: Some(json!({
                "token": token,
                "intents": intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "gatewire",
                    "device": "gatewire",
                }
            })),
            seq: None,
            event_type: None,
        }
    }

    /// RESUME frame requesting replay of everything after `seq`.
    pub fn resume(token: &str, session_id: &str, seq: Option<u64>) -> Self {
        Self {
            op: opcode::RESUME,
            data: Some(json!({
                "token": token,
                "session_id": session_id,
                "seq": seq,
            })),
            seq: None,
            event_type: None,
        }
    }
}

/// HELLO payload data.
#[derive(Debug, Deserialize)]
pub struct HelloData {
    pub heartbeat_interval: u64,
}

/// READY payload fields the client itself consumes. The full payload is
/// forwarded to the event sink untouched.
#[derive(Debug, Deserialize)]
pub struct ReadyData {
    pub session_id: String,
    pub resume_gateway_url: String,
}

/// Events delivered to the consumer.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// An IDENTIFY handshake completed. Carries the full READY payload.
    /// Fires exactly once per successful handshake.
    Ready(serde_json::Value),
    /// A dispatch frame, in arrival order. Event names are forwarded as
    /// received on the wire; unrecognized names flow through unchanged.
    Dispatch {
        name: String,
        data: serde_json::Value,
    },
    /// Transport lost. The client reconnects on its own.
    Disconnected { reason: String },
    /// A reconnect attempt has been scheduled.
    Reconnecting { attempt: u32, delay: Duration },
    /// The retry budget is exhausted. Fires exactly once; the client is
    /// inert afterwards and the owning process decides what to do.
    Fatal { attempts: u32 },
}
