//! Chat platform webhook (LINE Messaging API envelope)

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::assistant::{HandleOutcome, InboundEvent, InboundMessage};
use crate::messenger::verify_signature;

/// Header carrying the base64 HMAC-SHA256 of the raw body
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Webhook envelope
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<LineEvent>,
}

/// One platform event
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    /// Epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<LineSource>,
    #[serde(default)]
    pub message: Option<LineMessage>,
}

/// Event source
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Message payload of a `message` event
#[derive(Debug, Deserialize)]
pub struct LineMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl LineEvent {
    /// Convert to the assistant's event shape
    ///
    /// Anything other than a text `message` event becomes
    /// [`InboundMessage::Unsupported`] and is later ignored.
    #[must_use]
    pub fn into_inbound(self) -> InboundEvent {
        let event_id = self
            .webhook_event_id
            .or_else(|| self.message.as_ref().and_then(|m| m.id.clone()))
            .unwrap_or_default();

        let message = match (self.kind.as_str(), self.message) {
            ("message", Some(LineMessage { kind, text, .. })) if kind == "text" => InboundMessage::Text {
                text: text.unwrap_or_default(),
            },
            ("message", Some(LineMessage { kind, .. })) => InboundMessage::Unsupported { kind },
            (other, _) => InboundMessage::Unsupported {
                kind: other.to_string(),
            },
        };

        InboundEvent {
            event_id,
            received_at_ms: self.timestamp,
            user_id: self.source.and_then(|s| s.user_id),
            message,
            reply_token: self.reply_token,
        }
    }
}

/// Webhook response
#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    const fn ok() -> Json<Self> {
        Json(Self { ok: true, error: None })
    }

    fn error(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            ok: false,
            error: Some(message.into()),
        })
    }
}

/// Handle a webhook delivery
///
/// Verifies the signature, acknowledges immediately, and processes the
/// events in a background task in delivery order.
pub async fn handle_webhook(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    if let Some(secret) = &state.channel_secret {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(secret.expose_secret(), &body, signature) {
            tracing::warn!(error = %e, "rejecting webhook delivery");
            return (StatusCode::UNAUTHORIZED, WebhookResponse::error("invalid signature"));
        }
    } else {
        tracing::warn!("channel secret not configured - accepting unsigned webhook");
    }

    let envelope: WebhookBody = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "malformed webhook body");
            return (StatusCode::BAD_REQUEST, WebhookResponse::error("malformed body"));
        }
    };

    let events: Vec<InboundEvent> = envelope.events.into_iter().map(LineEvent::into_inbound).collect();
    tracing::debug!(
        destination = envelope.destination.as_deref().unwrap_or(""),
        count = events.len(),
        "webhook received"
    );

    if !events.is_empty() {
        tokio::spawn(process_events(state, events));
    }

    (StatusCode::OK, WebhookResponse::ok())
}

/// Run events through the assistant one at a time and deliver replies
///
/// Failures are logged per event and never retried; redelivery is the
/// platform's job and is safe thanks to dedupe.
pub async fn process_events(state: Arc<ApiState>, events: Vec<InboundEvent>) -> Vec<Option<HandleOutcome>> {
    let mut outcomes = Vec::with_capacity(events.len());
    for event in events {
        match state.assistant.handle(&event).await {
            Ok(outcome) => {
                deliver(&state, &event, &outcome).await;
                outcomes.push(Some(outcome));
            }
            Err(e) => {
                tracing::error!(event_id = %event.event_id, error = %e, "event processing failed");
                outcomes.push(None);
            }
        }
    }
    outcomes
}

async fn deliver(state: &ApiState, event: &InboundEvent, outcome: &HandleOutcome) {
    let Some(text) = outcome.deliverable_reply() else {
        return;
    };
    let Some(reply_token) = event.reply_token.as_deref() else {
        tracing::debug!(event_id = %event.event_id, "no reply token, reply not sent");
        return;
    };
    let Some(messenger) = &state.messenger else {
        tracing::debug!(event_id = %event.event_id, "messenger not configured, reply not sent");
        return;
    };

    if let Err(e) = messenger.reply(reply_token, text).await {
        tracing::error!(event_id = %event.event_id, error = %e, "reply delivery failed");
    }
}

/// Build webhook router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .with_state(state)
}
