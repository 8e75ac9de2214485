use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/gatewire/gatewire, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

#[derive(Debug)]
pub enum RestError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::Http(e) => write!(f, "HTTP error: {e}"),
            RestError::Api { status, body } => {
                write!(f, "API returned {status}: {body}")
            }
        }
    }
}

impl std::error::Error for RestError {}

impl From<reqwest::Error> for RestError {
    fn from(e: reqwest::Error) -> Self {
        RestError::Http(e)
    }
}

/// Connection info from the gateway directory endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
    #[serde(default)]
    pub shards: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageAuthor {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelMessage {
    pub id: String,
    pub channel_id: String,
    pub content: String,
    pub author: MessageAuthor,
}

/// Authenticated client for the HTTP API. Also serves as the directory
/// service the gateway client resolves its endpoint through.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    token: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Bot {}", self.token))
            .header("User-Agent", USER_AGENT)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, RestError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RestError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<T>().await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self.apply_auth(self.client.get(&url)).send().await?;
        Self::read_json(resp).await
    }

    /// Resolve the gateway websocket endpoint for this bot.
    pub async fn get_gateway(&self) -> Result<GatewayInfo, RestError> {
        self.get_json("/gateway/bot").await
    }

    pub async fn current_user(&self) -> Result<CurrentUser, RestError> {
        self.get_json("/users/@me").await
    }

    pub async fn list_guilds(&self) -> Result<Vec<Guild>, RestError> {
        self.get_json("/users/@me/guilds").await
    }

    /// Post a message to a channel.
    pub async fn create_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<ChannelMessage, RestError> {
        let url = format!("{}/channels/{channel_id}/messages", self.base_url);
        let builder = self.client.post(&url).json(&json!({ "content": content }));
        let resp = self.apply_auth(builder).send().await?;
        Self::read_json(resp).await
    }

    /// Fetch the most recent messages in a channel.
    pub async fn get_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<ChannelMessage>, RestError> {
        self.get_json(&format!("/channels/{channel_id}/messages?limit={limit}"))
            .await
    }
}
