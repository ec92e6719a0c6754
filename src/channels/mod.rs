//! Messaging channel abstractions.
//!
//! The rest of the daemon talks to recipients through [`MessageSink`] so the
//! reminder engine, care service, and attendance worker can be tested with a
//! recording sink instead of the live Messaging API.

use async_trait::async_trait;

use crate::error::ChannelError;

pub mod line;

pub use line::{LineClient, WebhookEvent, WebhookPayload, verify_signature};

/// Outbound message delivery.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Push a plain-text message to a recipient id.
    async fn push(&self, to: &str, text: &str) -> Result<(), ChannelError>;

    /// Reply through a one-shot reply token tied to an inbound event.
    ///
    /// Tokens are single-use and expire; callers must treat failures as
    /// final and never retry.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError>;
}
