//! HTTP surface: the LINE webhook plus status and manual-trigger routes.
//!
//! The webhook verifies the `x-line-signature` header over the raw body
//! before any JSON parsing; a mismatch is a 400 with no side effects. The
//! manual-trigger routes exist for an external cron service and mirror what
//! the scheduler does on its own.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use secrecy::{ExposeSecret, SecretString};
use tower_http::trace::TraceLayer;

use crate::attendance::{ScrapeHandle, ScrapeRequest};
use crate::care::CareService;
use crate::channels::{MessageSink, WebhookPayload, verify_signature};
use crate::clock::{Clock, format_timestamp};
use crate::holidays::HOLIDAYS;
use crate::reminders::ReminderEngine;
use crate::router::Router as MessageRouter;
use crate::state::BotState;

/// Everything the handlers need, shared via `Arc`s.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<BotState>,
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn MessageSink>,
    pub message_router: Arc<MessageRouter>,
    pub care: Arc<CareService>,
    pub reminders: Arc<ReminderEngine>,
    pub scrape: ScrapeHandle,
    pub channel_secret: SecretString,
}

/// Build the route table.
pub fn build_router(context: AppContext) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/status", get(status))
        .route("/callback", post(callback))
        .route("/manual_check", get(manual_check))
        .route("/manual_attendance", get(manual_attendance))
        .route("/manual_care", get(manual_care))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn banner(State(context): State<AppContext>) -> String {
    format!(
        "🦢 gander 運作中\n台灣時間：{}",
        format_timestamp(context.clock.now())
    )
}

async fn status(State(context): State<AppContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "taipei_time": format_timestamp(context.clock.now()),
        "holiday_count": HOLIDAYS.len(),
        "reminder_marks": context.state.reminder_mark_count(),
        "welcome_marks": context.state.welcome_mark_count(),
    }))
}

async fn callback(
    State(context): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_signature(context.channel_secret.expose_secret(), &body, signature) {
        tracing::warn!("webhook signature mismatch");
        return (StatusCode::BAD_REQUEST, "bad signature");
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "unparseable webhook payload");
            return (StatusCode::BAD_REQUEST, "bad payload");
        }
    };

    for event in &payload.events {
        let Some((user_id, text)) = event.text_message() else {
            tracing::debug!(kind = %event.kind, "ignoring non-text event");
            continue;
        };
        tracing::info!(user = %user_id, "inbound message");

        context.care.on_contact(user_id).await;
        let reply = context.message_router.respond(user_id, text).await;

        match &event.reply_token {
            Some(token) => {
                // Reply tokens are single-use; a failed reply is final.
                if let Err(err) = context.sink.reply(token, &reply).await {
                    tracing::error!(error = %err, "reply delivery failed");
                }
            }
            None => {
                tracing::debug!("text event without a reply token");
            }
        }
    }

    (StatusCode::OK, "OK")
}

async fn manual_check(State(context): State<AppContext>) -> String {
    let sent = context.reminders.run_check().await;
    format!("checked, {sent} reminder(s) sent")
}

async fn manual_attendance(State(context): State<AppContext>) -> (StatusCode, &'static str) {
    match context.scrape.request() {
        ScrapeRequest::Queued => (StatusCode::OK, "attendance query queued"),
        ScrapeRequest::Busy => (StatusCode::OK, "attendance query already running"),
        ScrapeRequest::Unavailable => {
            (StatusCode::INTERNAL_SERVER_ERROR, "attendance worker unavailable")
        }
    }
}

async fn manual_care(State(context): State<AppContext>) -> &'static str {
    context.care.run_inactivity_check().await;
    "care check done"
}
