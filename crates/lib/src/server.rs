//! Webhook HTTP server: one route per platform plus a liveness route.
//!
//! Handlers validate and parse each platform's request shape, normalize to
//! an InboundMessage, and hand it to the dispatcher task over an mpsc
//! channel. Webhook responses never wait on outbound sends; platforms treat
//! non-2xx as a redelivery signal, so parse failures are answered with 200
//! and ignored.

use crate::channels::{
    normalize_callback, normalize_envelope, normalize_update, verify_signature, ChannelRegistry,
    InboundMessage, InstagramChannel, InstagramEnvelope, TelegramChannel, TelegramUpdate,
    ViberCallback, ViberChannel,
};
use crate::config::{
    resolve_instagram_verify_token, resolve_port, resolve_telegram_token, resolve_viber_token,
    Config,
};
use crate::dispatch;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

const VIBER_SIGNATURE_HEADER: &str = "X-Viber-Content-Signature";
const HEALTH_BODY: &str = "Bot Server is Running!";

/// Immutable per-process state shared by all handlers. Credentials are
/// resolved once at startup and never re-read.
#[derive(Clone)]
pub struct AppState {
    /// Keys Viber callback signature verification. None = channel not configured.
    pub viber_auth_token: Option<String>,
    /// Shared secret for the GET /instagram handshake.
    pub instagram_verify_token: Option<String>,
    /// Sender for normalized messages; the dispatcher task receives.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
}

/// Build the route table. Separated from run_server so tests can drive it.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/telegram", post(telegram_webhook))
        .route("/viber", post(viber_webhook))
        .route("/instagram", get(instagram_verify).post(instagram_webhook))
        .with_state(state)
}

/// Resolve credentials, register channels, spawn the dispatcher task, and
/// serve until SIGINT/SIGTERM.
pub async fn run_server(config: Config) -> Result<()> {
    let telegram_token = resolve_telegram_token(&config);
    let viber_token = resolve_viber_token(&config);
    let instagram_verify_token = resolve_instagram_verify_token(&config);
    let port = resolve_port(&config);

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(64);
    let registry = Arc::new(ChannelRegistry::new());

    // Telegram: keep the channel handle around for the webhook dance.
    let telegram: Option<Arc<TelegramChannel>> = match telegram_token {
        Some(token) => {
            let channel = Arc::new(TelegramChannel::new(token));
            registry.register(channel.clone()).await;
            log::info!("telegram channel registered");
            Some(channel)
        }
        None => {
            log::warn!("telegram bot token not configured, /telegram messages will be dropped");
            None
        }
    };
    match viber_token.clone() {
        Some(token) => {
            let viber = ViberChannel::new(
                token,
                config.channels.viber.bot_name.clone(),
                config.channels.viber.avatar_url.clone(),
            );
            registry.register(Arc::new(viber)).await;
            log::info!("viber channel registered");
        }
        None => {
            log::warn!("viber auth token not configured, /viber requests will be rejected");
        }
    }
    registry.register(Arc::new(InstagramChannel)).await;

    let state = AppState {
        viber_auth_token: viber_token,
        instagram_verify_token,
        inbound_tx,
    };

    {
        let registry = registry.clone();
        tokio::spawn(async move {
            while let Some(msg) = inbound_rx.recv().await {
                dispatch::process_inbound_message(&registry, msg).await;
            }
        });
    }

    // Webhook registration: point Telegram at /telegram when a public URL is configured.
    let telegram_for_shutdown = match (&telegram, &config.channels.telegram.webhook_url) {
        (Some(channel), Some(url)) => {
            if let Err(e) = channel.set_webhook(url).await {
                log::warn!("telegram set_webhook failed: {}", e);
            } else {
                log::info!("telegram webhook registered: {}", url);
            }
            Some(channel.clone())
        }
        _ => None,
    };

    let app = router(state);
    let bind_addr = format!("{}:{}", config.server.bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("webhook server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(telegram_for_shutdown))
        .await
        .context("webhook server exited")?;
    log::info!("webhook server stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Removes the Telegram webhook if one was registered at startup.
async fn shutdown_signal(telegram: Option<Arc<TelegramChannel>>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");

    if let Some(t) = telegram {
        if let Err(e) = t.delete_webhook().await {
            log::debug!("telegram delete_webhook on shutdown: {}", e);
        }
    }
}

/// Hand a normalized message to the dispatcher task. A closed channel is
/// logged, not surfaced: the webhook response stays 200 either way.
async fn forward(state: &AppState, msg: InboundMessage) {
    if state.inbound_tx.send(msg).await.is_err() {
        log::warn!("inbound channel closed, dropping message");
    }
}

/// GET / — liveness probe.
async fn health_http() -> &'static str {
    HEALTH_BODY
}

/// POST /telegram — receives Telegram update JSON. Malformed or message-less
/// bodies are accepted and ignored. Note: sender authenticity is not checked
/// on this route (known limitation, callers must rely on URL secrecy).
async fn telegram_webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, &'static str) {
    match serde_json::from_slice::<TelegramUpdate>(&body) {
        Ok(update) => {
            if let Some(msg) = normalize_update(&update) {
                forward(&state, msg).await;
            }
        }
        Err(e) => {
            log::debug!("ignoring malformed telegram update: {}", e);
        }
    }
    (StatusCode::OK, "OK")
}

/// POST /viber — verifies X-Viber-Content-Signature over the raw body, then
/// processes message events. Unverifiable requests get 403; verified
/// non-message callbacks (delivered, seen, subscribed, webhook ping) get 200.
async fn viber_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let Some(ref token) = state.viber_auth_token else {
        return (StatusCode::FORBIDDEN, "Invalid signature");
    };
    let signature = headers
        .get(VIBER_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_signature(token, &body, signature) {
        return (StatusCode::FORBIDDEN, "Invalid signature");
    }
    match serde_json::from_slice::<ViberCallback>(&body) {
        Ok(callback) => {
            if let Some(msg) = normalize_callback(&callback) {
                forward(&state, msg).await;
            }
        }
        Err(e) => {
            log::debug!("ignoring malformed viber callback: {}", e);
        }
    }
    (StatusCode::OK, "OK")
}

/// GET /instagram — subscription handshake: echo hub.challenge when
/// hub.verify_token matches the configured secret.
async fn instagram_verify(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    let provided = params.get("hub.verify_token").map(String::as_str);
    match state.instagram_verify_token.as_deref() {
        Some(expected) if provided == Some(expected) => {
            let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
            (StatusCode::OK, challenge)
        }
        _ => (
            StatusCode::FORBIDDEN,
            "Invalid verification token".to_string(),
        ),
    }
}

/// POST /instagram — Graph event envelope; one message per messaging event
/// carrying a `message` field. Always acknowledged with EVENT_RECEIVED.
async fn instagram_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    match serde_json::from_slice::<InstagramEnvelope>(&body) {
        Ok(envelope) => {
            for msg in normalize_envelope(&envelope) {
                forward(&state, msg).await;
            }
        }
        Err(e) => {
            log::debug!("ignoring malformed instagram envelope: {}", e);
        }
    }
    (StatusCode::OK, "EVENT_RECEIVED")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Platform;

    const VIBER_TOKEN: &str = "viber-auth-token";

    fn test_state() -> (AppState, mpsc::Receiver<InboundMessage>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let state = AppState {
            viber_auth_token: Some(VIBER_TOKEN.to_string()),
            instagram_verify_token: Some("SECRET".to_string()),
            inbound_tx,
        };
        (state, inbound_rx)
    }

    fn viber_headers(signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(VIBER_SIGNATURE_HEADER, signature.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn health_returns_static_body() {
        assert_eq!(health_http().await, "Bot Server is Running!");
    }

    #[tokio::test]
    async fn telegram_update_with_text_is_normalized() {
        let (state, mut rx) = test_state();
        let body = Bytes::from_static(br#"{"message":{"chat":{"id":42},"text":"hi"}}"#);
        let (status, body) = telegram_webhook(State(state), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
        let msg = rx.try_recv().expect("message expected");
        assert_eq!(msg.platform, Platform::Telegram);
        assert_eq!(msg.user_id, "42");
        assert_eq!(msg.text, "hi");
    }

    #[tokio::test]
    async fn telegram_malformed_body_is_still_accepted() {
        let (state, mut rx) = test_state();
        let (status, body) = telegram_webhook(State(state), Bytes::from_static(b"not json")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn telegram_update_without_text_is_ignored() {
        let (state, mut rx) = test_state();
        let body = Bytes::from_static(br#"{"message":{"chat":{"id":42}}}"#);
        let (status, _) = telegram_webhook(State(state), body).await;
        assert_eq!(status, StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn viber_invalid_signature_is_forbidden() {
        let (state, mut rx) = test_state();
        let body = Bytes::from_static(br#"{"event":"message","sender":{"id":"u1"},"message":{"type":"text","text":"hi"}}"#);
        let (status, text) =
            viber_webhook(State(state), viber_headers("deadbeef"), body).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(text, "Invalid signature");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn viber_missing_signature_is_forbidden() {
        let (state, mut rx) = test_state();
        let (status, _) =
            viber_webhook(State(state), HeaderMap::new(), Bytes::from_static(b"{}")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn viber_valid_message_is_normalized() {
        let (state, mut rx) = test_state();
        let body = Bytes::from_static(
            br#"{"event":"message","timestamp":1,"sender":{"id":"u1","name":"N"},"message":{"type":"text","text":"hi"}}"#,
        );
        // hex(hmac_sha256(VIBER_TOKEN, body))
        let sig = "1425f9cfc23ad54e74a166dcde06ba77d66c5355aa191479ceac96fd2fb9009d";
        let (status, text) = viber_webhook(State(state), viber_headers(sig), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "OK");
        let msg = rx.try_recv().expect("message expected");
        assert_eq!(msg.platform, Platform::Viber);
        assert_eq!(msg.user_id, "u1");
        assert_eq!(msg.text, "hi");
    }

    #[tokio::test]
    async fn viber_valid_non_message_event_sends_nothing() {
        let (state, mut rx) = test_state();
        let body =
            Bytes::from_static(br#"{"event":"delivered","user_id":"u1","message_token":1}"#);
        // hex(hmac_sha256(VIBER_TOKEN, body))
        let sig = "1398ecebbc61bc2371198855a2a0b309dfe7544156420715685c87565f11d18b";
        let (status, text) = viber_webhook(State(state), viber_headers(sig), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "OK");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn instagram_handshake_echoes_challenge() {
        let (state, _rx) = test_state();
        let params: HashMap<String, String> = [
            ("hub.verify_token".to_string(), "SECRET".to_string()),
            ("hub.challenge".to_string(), "abc123".to_string()),
        ]
        .into();
        let (status, body) = instagram_verify(State(state), Query(params)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "abc123");
    }

    #[tokio::test]
    async fn instagram_handshake_rejects_wrong_token() {
        let (state, _rx) = test_state();
        let params: HashMap<String, String> = [
            ("hub.verify_token".to_string(), "WRONG".to_string()),
            ("hub.challenge".to_string(), "abc123".to_string()),
        ]
        .into();
        let (status, body) = instagram_verify(State(state), Query(params)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Invalid verification token");
    }

    #[tokio::test]
    async fn instagram_handshake_without_configured_secret_is_forbidden() {
        let (mut state, _rx) = test_state();
        state.instagram_verify_token = None;
        let params: HashMap<String, String> =
            [("hub.verify_token".to_string(), "SECRET".to_string())].into();
        let (status, _) = instagram_verify(State(state), Query(params)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn instagram_envelope_emits_one_message_per_event() {
        let (state, mut rx) = test_state();
        let body = Bytes::from_static(
            br#"{"object":"instagram","entry":[{"messaging":[{"sender":{"id":"ig1"},"message":{"text":"yo"}}]}]}"#,
        );
        let (status, text) = instagram_webhook(State(state), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "EVENT_RECEIVED");
        let msg = rx.try_recv().expect("message expected");
        assert_eq!(msg.platform, Platform::Instagram);
        assert_eq!(msg.user_id, "ig1");
        assert_eq!(msg.text, "yo");
    }

    #[tokio::test]
    async fn instagram_wrong_object_is_acknowledged_without_messages() {
        let (state, mut rx) = test_state();
        let body = Bytes::from_static(
            br#"{"object":"page","entry":[{"messaging":[{"sender":{"id":"ig1"},"message":{"text":"yo"}}]}]}"#,
        );
        let (status, text) = instagram_webhook(State(state), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "EVENT_RECEIVED");
        assert!(rx.try_recv().is_err());
    }
}
