//! Instagram channel: Graph API event-envelope payloads.
//!
//! The sender is a stub: replying through the Graph send API needs a page
//! access token that is not part of the configuration yet, so replies to
//! Instagram users are logged and dropped.

use crate::channels::inbound::{InboundMessage, Platform};
use crate::channels::registry::ChannelSender;
use async_trait::async_trait;
use serde::Deserialize;

/// Graph webhook envelope: `object` names the product, entries carry messaging events.
#[derive(Debug, Deserialize)]
pub struct InstagramEnvelope {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<InstagramEntry>,
}

#[derive(Debug, Deserialize)]
pub struct InstagramEntry {
    #[serde(default)]
    pub messaging: Vec<InstagramMessagingEvent>,
}

#[derive(Debug, Deserialize)]
pub struct InstagramMessagingEvent {
    pub sender: InstagramUser,
    #[serde(default)]
    pub message: Option<InstagramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InstagramUser {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InstagramMessage {
    #[serde(default)]
    pub text: Option<String>,
}

/// Normalize an envelope: one message per messaging event carrying a `message` field.
/// Envelopes for other Graph objects yield nothing.
pub fn normalize_envelope(envelope: &InstagramEnvelope) -> Vec<InboundMessage> {
    if envelope.object != "instagram" {
        return Vec::new();
    }
    let mut messages = Vec::new();
    for entry in &envelope.entry {
        for event in &entry.messaging {
            if let Some(ref message) = event.message {
                messages.push(InboundMessage {
                    platform: Platform::Instagram,
                    user_id: event.sender.id.clone(),
                    text: message.text.clone().unwrap_or_default(),
                });
            }
        }
    }
    messages
}

/// Stub connector: no outbound call until a Graph access token is configured.
pub struct InstagramChannel;

#[async_trait]
impl ChannelSender for InstagramChannel {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn send_message(&self, user_id: &str, _text: &str) -> Result<(), String> {
        log::debug!(
            "instagram send not configured, dropping reply to user {}",
            user_id
        );
        Ok(())
    }
}
