//! Reply dispatcher: logs each inbound message and sends the canned reply
//! back through the originating platform's sender.
//!
//! Runs on its own task fed by an mpsc receiver, so sends never block the
//! webhook response path. Send failures are logged and dropped.

use crate::channels::{ChannelRegistry, InboundMessage};

/// Fixed reply template embedding the platform name and original text.
pub fn reply_text(msg: &InboundMessage) -> String {
    format!(
        "Привіт! Я отримав твоє повідомлення з {}: {}",
        msg.platform, msg.text
    )
}

/// Process one inbound message: log it, format the reply, send it through
/// the matching sender. Failures are observable in the log only.
pub async fn process_inbound_message(registry: &ChannelRegistry, msg: InboundMessage) {
    log::info!(
        "received message from {} (user {}): {}",
        msg.platform,
        msg.user_id,
        msg.text
    );
    let reply = reply_text(&msg);
    match registry.get(msg.platform).await {
        Some(sender) => {
            if let Err(e) = sender.send_message(&msg.user_id, &reply).await {
                log::warn!("{} send to user {} failed: {}", msg.platform, msg.user_id, e);
            }
        }
        None => {
            log::warn!("no sender registered for {}, dropping reply", msg.platform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelSender, Platform};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[test]
    fn reply_embeds_platform_and_text() {
        let msg = InboundMessage {
            platform: Platform::Telegram,
            user_id: "42".to_string(),
            text: "hi".to_string(),
        };
        assert_eq!(
            reply_text(&msg),
            "Привіт! Я отримав твоє повідомлення з telegram: hi"
        );
    }

    struct RecordingSender {
        platform: Platform,
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl ChannelSender for RecordingSender {
        fn platform(&self) -> Platform {
            self.platform
        }
        async fn send_message(&self, user_id: &str, text: &str) -> Result<(), String> {
            self.sent
                .lock()
                .await
                .push((user_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_routes_to_matching_sender() {
        let registry = ChannelRegistry::new();
        let sent = Arc::new(Mutex::new(Vec::new()));
        registry
            .register(Arc::new(RecordingSender {
                platform: Platform::Viber,
                sent: sent.clone(),
            }))
            .await;

        process_inbound_message(
            &registry,
            InboundMessage {
                platform: Platform::Viber,
                user_id: "u1".to_string(),
                text: "hello".to_string(),
            },
        )
        .await;

        let sent = sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "u1");
        assert_eq!(sent[0].1, "Привіт! Я отримав твоє повідомлення з viber: hello");
    }

    #[tokio::test]
    async fn dispatch_without_sender_drops_message() {
        let registry = ChannelRegistry::new();
        // No panic, nothing to assert beyond completion.
        process_inbound_message(
            &registry,
            InboundMessage {
                platform: Platform::Instagram,
                user_id: "ig1".to_string(),
                text: "hello".to_string(),
            },
        )
        .await;
    }
}
