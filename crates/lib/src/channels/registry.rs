//! Sender registry: register and look up platform senders.

use crate::channels::inbound::Platform;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outbound side of a channel: one send call per reply.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Platform this sender replies through.
    fn platform(&self) -> Platform;
    /// Send a text message to a user/conversation (e.g. Telegram chat_id).
    async fn send_message(&self, user_id: &str, text: &str) -> Result<(), String>;
}

/// Registry of platforms to senders. Shared between the server and the dispatcher task.
pub struct ChannelRegistry {
    inner: Arc<RwLock<HashMap<Platform, Arc<dyn ChannelSender>>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, sender: Arc<dyn ChannelSender>) {
        let mut g = self.inner.write().await;
        g.insert(sender.platform(), sender);
    }

    pub async fn get(&self, platform: Platform) -> Option<Arc<dyn ChannelSender>> {
        let g = self.inner.read().await;
        g.get(&platform).cloned()
    }

    pub async fn platforms(&self) -> Vec<Platform> {
        let g = self.inner.read().await;
        g.keys().copied().collect()
    }
}
