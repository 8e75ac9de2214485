use std::time::Duration;

/// Bookkeeping for the keep-alive exchange. The interval is dictated by the
/// server in HELLO and is never configured client-side.
///
/// Invariant: at most one heartbeat is awaiting acknowledgement at any time.
/// `fire()` refuses to send a second one; the caller tears the connection
/// down instead.
#[derive(Debug, Default)]
pub struct Heartbeat {
    interval: Option<Duration>,
    awaiting_ack: bool,
}

impl Heartbeat {
    /// Start beating on `interval`. The beat sent immediately on HELLO does
    /// not arm the ack check; only interval-fired beats do.
    pub fn start(&mut self, interval: Duration) {
        self.interval = Some(interval);
        self.awaiting_ack = false;
    }

    pub fn stop(&mut self) {
        self.interval = None;
        self.awaiting_ack = false;
    }

    pub fn ack_received(&mut self) {
        self.awaiting_ack = false;
    }

    /// The timer fired. Returns `true` when a beat should go out (and arms
    /// the ack check), `false` when the previous beat was never
    /// acknowledged and the connection must be treated as dead.
    pub fn fire(&mut self) -> bool {
        if self.awaiting_ack {
            return false;
        }
        self.awaiting_ack = true;
        true
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}
