//! Telegram channel: webhook update payloads and sendMessage via Bot API.

use crate::channels::inbound::{InboundMessage, Platform};
use crate::channels::registry::ChannelSender;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT_SECS: u64 = 10;

/// Telegram update payload (webhook POST body).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

/// Normalize a webhook update: Some only when the update carries non-empty message text.
pub fn normalize_update(update: &TelegramUpdate) -> Option<InboundMessage> {
    let msg = update.message.as_ref()?;
    let text = msg.text.as_deref().unwrap_or("");
    if text.is_empty() {
        return None;
    }
    Some(InboundMessage {
        platform: Platform::Telegram,
        user_id: msg.chat.id.to_string(),
        text: text.to_string(),
    })
}

/// sendMessage body. Numeric-looking chat ids are sent as JSON numbers,
/// matching the Bot API convention for chat_id.
fn send_message_body(chat_id: &str, text: &str) -> serde_json::Value {
    match chat_id.parse::<i64>() {
        Ok(n) => serde_json::json!({ "chat_id": n, "text": text }),
        Err(_) => serde_json::json!({ "chat_id": chat_id, "text": text }),
    }
}

/// Telegram channel connector: replies via sendMessage, registers/removes the webhook URL.
pub struct TelegramChannel {
    token: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: String) -> Self {
        Self::with_api_base(token, TELEGRAM_API_BASE.to_string())
    }

    /// Custom API base, for tests or proxies.
    pub fn with_api_base(token: String, api_base: String) -> Self {
        Self {
            token,
            api_base,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Point Telegram at the webhook URL. When set, Telegram POSTs updates to it.
    pub async fn set_webhook(&self, url: &str) -> Result<(), String> {
        let api_url = format!("{}/bot{}/setWebhook", self.api_base, self.token);
        let body = serde_json::json!({ "url": url });
        let res = self
            .client
            .post(&api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("setWebhook failed: {} {}", status, body));
        }
        Ok(())
    }

    /// Remove the webhook (used on shutdown).
    pub async fn delete_webhook(&self) -> Result<(), String> {
        let url = format!("{}/bot{}/deleteWebhook", self.api_base, self.token);
        let res = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("deleteWebhook failed: {} {}", status, body));
        }
        Ok(())
    }

    /// Send a text message to a chat via sendMessage API.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), String> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let body = send_message_body(chat_id, text);
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("sendMessage failed: {} {}", status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelSender for TelegramChannel {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn send_message(&self, user_id: &str, text: &str) -> Result<(), String> {
        TelegramChannel::send_message(self, user_id, text).await
    }
}
