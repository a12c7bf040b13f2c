//! Inbound message from a webhook: delivered to the dispatcher for reply handling.

use std::fmt;

/// Messaging platform a webhook belongs to. Keys the sender registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Telegram,
    Viber,
    Instagram,
}

impl Platform {
    /// Lowercase platform name used in logs and the reply template.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::Viber => "viber",
            Platform::Instagram => "instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized message from a platform webhook, to be answered by the dispatcher.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub platform: Platform,
    /// Platform-scoped opaque user/chat identifier (e.g. Telegram chat id).
    pub user_id: String,
    pub text: String,
}
