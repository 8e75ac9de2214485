use std::time::Duration;

use crate::gateway::intents;
use crate::gateway::reconnect::ReconnectConfig;
use crate::rest;

pub struct Config {
    pub token: String,
    pub application_id: Option<String>,
    pub api_base: String,
    pub port: u16,
    pub intents: u32,
    pub reconnect: ReconnectConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let token = std::env::var("DISCORD_API_TOKEN").expect("DISCORD_API_TOKEN is required");

        let mut reconnect = ReconnectConfig::default();
        if let Some(ms) = env_u64("GATEWAY_BACKOFF_BASE_MS") {
            reconnect.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("GATEWAY_BACKOFF_CAP_MS") {
            reconnect.max_delay = Duration::from_millis(ms);
        }
        if let Some(n) = env_u64("GATEWAY_MAX_RECONNECTS") {
            reconnect.max_attempts = n as u32;
        }

        Self {
            token,
            application_id: std::env::var("DISCORD_APPLICATION_ID").ok(),
            api_base: std::env::var("DISCORD_API_BASE")
                .unwrap_or_else(|_| rest::DEFAULT_API_BASE.to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            intents: env_u64("GATEWAY_INTENTS")
                .map(|v| v as u32)
                .unwrap_or(intents::DEFAULT),
            reconnect,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
