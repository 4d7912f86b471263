//! Telegram Bot API notifier.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::UserId;

use super::error::DeliveryError;
use super::message::Message;
use super::Notifier;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Configuration for the Telegram notifier.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub token: String,
    /// Bot API base URL
    pub api_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 10,
        }
    }

    /// Set a custom API URL (for testing or a local Bot API server).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages through a Telegram bot. User ids are chat ids.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    send_url: String,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            send_url: format!(
                "{}/bot{}/sendMessage",
                config.api_url.trim_end_matches('/'),
                config.token
            ),
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, user: &UserId, message: &Message) -> Result<(), DeliveryError> {
        if user.as_str().parse::<i64>().is_err() {
            return Err(DeliveryError::Recipient(format!(
                "{user} is not a Telegram chat id"
            )));
        }

        let body = SendMessage {
            chat_id: user.as_str(),
            text: &message.text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self.http.post(&self.send_url).json(&body).send().await?;
        let status = response.status();
        let reply: ApiResponse = response.json().await?;

        if !status.is_success() || !reply.ok {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message: reply.description.unwrap_or_default(),
            });
        }

        debug!(user = %user, route = %message.route, "Sent Telegram message");
        Ok(())
    }
}
