//! LINE Messaging API client and webhook types.
//!
//! Covers the three touch points with the platform: webhook signature
//! verification (HMAC-SHA256 over the raw body, base64-compared against the
//! `x-line-signature` header), inbound event deserialization, and outbound
//! push/reply delivery.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;

use crate::channels::MessageSink;
use crate::config::LineConfig;
use crate::error::ChannelError;

const API_BASE: &str = "https://api.line.me";

/// Verify a webhook body against the `x-line-signature` header value.
///
/// The signature is base64(HMAC-SHA256(channel_secret, body)). Comparison
/// happens inside the MAC (constant time).
pub fn verify_signature(channel_secret: &str, body: &[u8], signature_b64: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature_b64) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Top-level webhook payload: a batch of events.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One inbound event. Only text messages are acted on; everything else is
/// ignored by the router.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

impl WebhookEvent {
    /// Sender id and text, when this is a text-message event.
    pub fn text_message(&self) -> Option<(&str, &str)> {
        if self.kind != "message" {
            return None;
        }
        let user_id = self.source.as_ref()?.user_id.as_deref()?;
        let message = self.message.as_ref()?;
        if message.kind != "text" {
            return None;
        }
        Some((user_id, message.text.as_deref()?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Messaging API client for push and reply delivery.
pub struct LineClient {
    http: Client,
    token: SecretString,
    base_url: String,
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            token: config.channel_access_token.clone(),
            base_url: API_BASE.to_string(),
        }
    }

    /// Point the client at a different API base (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post_messages(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), ChannelError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Api { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSink for LineClient {
    async fn push(&self, to: &str, text: &str) -> Result<(), ChannelError> {
        self.post_messages(
            "/v2/bot/message/push",
            serde_json::json!({
                "to": to,
                "messages": [{ "type": "text", "text": text }],
            }),
        )
        .await
    }

    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError> {
        self.post_messages(
            "/v2/bot/message/reply",
            serde_json::json!({
                "replyToken": reply_token,
                "messages": [{ "type": "text", "text": text }],
            }),
        )
        .await
    }
}
