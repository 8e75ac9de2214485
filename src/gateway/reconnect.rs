use std::time::Duration;

use rand::Rng;

/// Reconnection policy: capped exponential backoff for transport failures,
/// plus a jittered short delay for server-requested session retries. All
/// delays come from this one place so tests can pin them.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f64,
    /// Attempts after which the client gives up permanently.
    pub max_attempts: u32,
    /// Jitter window for retrying after RECONNECT / INVALID_SESSION, so a
    /// fleet of clients does not stampede the service after a mass
    /// disconnect.
    pub resume_delay_min: Duration,
    pub resume_delay_max: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            max_attempts: 5,
            resume_delay_min: Duration::from_secs(1),
            resume_delay_max: Duration::from_secs(5),
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for the given attempt number (1-based):
    /// `min(initial * multiplier^(n-1), max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay_millis = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(delay_millis).min(self.max_delay)
    }

    /// Whether the given attempt number is still within budget.
    pub fn should_reconnect(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Randomized delay before retrying a server-invalidated handshake.
    pub fn resume_delay(&self) -> Duration {
        let min = self.resume_delay_min.as_millis() as u64;
        let max = self.resume_delay_max.as_millis() as u64;
        if max <= min {
            return self.resume_delay_min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}
