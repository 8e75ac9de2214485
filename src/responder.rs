use crate::gateway::events::GatewayEvent;
use crate::rest::{ChannelMessage, RestClient};

const HELP_TEXT: &str = "Available commands:\n\
    !ping - Check if the bot is responsive\n\
    !help - Show this help message";

/// Answers chat commands through the HTTP API. Messages authored by bots
/// (including our own replies) are ignored.
pub struct Responder {
    rest: RestClient,
}

impl Responder {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// The canned reply for a message body, if it is a known command.
    pub fn reply_for(content: &str) -> Option<&'static str> {
        match content.trim().to_ascii_lowercase().as_str() {
            "!ping" => Some("Pong!"),
            "!help" => Some(HELP_TEXT),
            _ => None,
        }
    }

    pub async fn handle_message(&self, message: &ChannelMessage) {
        if message.author.bot {
            return;
        }
        let Some(reply) = Self::reply_for(&message.content) else {
            return;
        };
        tracing::info!(
            channel_id = %message.channel_id,
            author = %message.author.username,
            "answering {}",
            message.content.trim()
        );
        if let Err(e) = self.rest.create_message(&message.channel_id, reply).await {
            tracing::error!("failed to send reply: {e}");
        }
    }

    /// Route a gateway event. Only MESSAGE_CREATE dispatches can produce a
    /// reply; everything else passes through untouched.
    pub async fn handle_event(&self, event: &GatewayEvent) {
        if let GatewayEvent::Dispatch { name, data } = event {
            if name == "MESSAGE_CREATE" {
                match serde_json::from_value::<ChannelMessage>(data.clone()) {
                    Ok(message) => self.handle_message(&message).await,
                    Err(e) => tracing::debug!("unparsable MESSAGE_CREATE payload: {e}"),
                }
            }
        }
    }
}
