//! Viber channel: signed callback payloads and send_message via the REST API.
//!
//! Viber signs every callback with HMAC-SHA256 keyed by the bot auth token;
//! the hex digest of the raw body arrives in `X-Viber-Content-Signature`.

use crate::channels::inbound::{InboundMessage, Platform};
use crate::channels::registry::ChannelSender;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

const VIBER_API_BASE: &str = "https://chatapi.viber.com";
const SEND_TIMEOUT_SECS: u64 = 10;

/// Verify `X-Viber-Content-Signature` against the raw request body.
pub fn verify_signature(auth_token: &str, body: &[u8], signature: &str) -> bool {
    let mut mac = match Hmac::<Sha256>::new_from_slice(auth_token.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());
    computed == signature.trim().to_lowercase()
}

/// Viber callback body. `event` distinguishes message callbacks from
/// delivery reports, subscriptions, and the initial webhook ping.
#[derive(Debug, Deserialize)]
pub struct ViberCallback {
    pub event: String,
    #[serde(default)]
    pub sender: Option<ViberUser>,
    #[serde(default)]
    pub message: Option<ViberMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ViberUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ViberMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Normalize a verified callback: Some only for message events with a sender.
pub fn normalize_callback(callback: &ViberCallback) -> Option<InboundMessage> {
    if callback.event != "message" {
        return None;
    }
    let sender = callback.sender.as_ref()?;
    let message = callback.message.as_ref()?;
    Some(InboundMessage {
        platform: Platform::Viber,
        user_id: sender.id.clone(),
        text: message.text.clone().unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    status: i64,
    #[serde(default)]
    status_message: Option<String>,
}

/// Viber channel connector: replies with text messages via send_message.
pub struct ViberChannel {
    auth_token: String,
    bot_name: String,
    avatar_url: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl ViberChannel {
    pub fn new(auth_token: String, bot_name: String, avatar_url: Option<String>) -> Self {
        Self::with_api_base(auth_token, bot_name, avatar_url, VIBER_API_BASE.to_string())
    }

    /// Custom API base, for tests or proxies.
    pub fn with_api_base(
        auth_token: String,
        bot_name: String,
        avatar_url: Option<String>,
        api_base: String,
    ) -> Self {
        Self {
            auth_token,
            bot_name,
            avatar_url,
            api_base,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Send a text message to a Viber user id.
    pub async fn send_message(&self, user_id: &str, text: &str) -> Result<(), String> {
        let url = format!("{}/pa/send_message", self.api_base);
        let mut sender = serde_json::json!({ "name": self.bot_name });
        if let Some(ref avatar) = self.avatar_url {
            sender["avatar"] = serde_json::Value::String(avatar.clone());
        }
        let body = serde_json::json!({
            "receiver": user_id,
            "type": "text",
            "text": text,
            "sender": sender,
        });
        let res = self
            .client
            .post(&url)
            .header("X-Viber-Auth-Token", &self.auth_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("send_message failed: {} {}", status, body));
        }
        // Viber reports API errors in the body with HTTP 200.
        let data: SendMessageResponse = res.json().await.map_err(|e| e.to_string())?;
        if data.status != 0 {
            return Err(format!(
                "send_message returned status {}: {}",
                data.status,
                data.status_message.unwrap_or_default()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelSender for ViberChannel {
    fn platform(&self) -> Platform {
        Platform::Viber
    }

    async fn send_message(&self, user_id: &str, text: &str) -> Result<(), String> {
        ViberChannel::send_message(self, user_id, text).await
    }
}
