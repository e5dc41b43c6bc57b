//! Inbound events and per-event outcomes

use serde::{Deserialize, Serialize};

use super::Action;
use crate::classifier::Classification;
use crate::db::EscalationItem;

/// Message payload carried by an inbound event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Plain text; may be empty
    Text { text: String },
    /// Stickers, images, follows and anything else without text
    Unsupported { kind: String },
}

/// One webhook delivery, as seen by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Unique per source platform; redeliveries reuse it
    pub event_id: String,
    pub received_at_ms: i64,
    pub user_id: Option<String>,
    pub message: InboundMessage,
    /// Opaque handle for replying on the source platform
    pub reply_token: Option<String>,
}

impl InboundEvent {
    /// Text message from a known user
    #[must_use]
    pub fn text(
        event_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
        received_at_ms: i64,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            received_at_ms,
            user_id: Some(user_id.into()),
            message: InboundMessage::Text { text: text.into() },
            reply_token: None,
        }
    }

    /// Attach a reply handle
    #[must_use]
    pub fn with_reply_token(mut self, token: impl Into<String>) -> Self {
        self.reply_token = Some(token.into());
        self
    }

    /// User id and text when this is a text message from a recognized source
    pub(crate) fn user_text(&self) -> Option<(&str, &str)> {
        let user_id = self.user_id.as_deref().filter(|u| !u.trim().is_empty())?;
        if self.event_id.trim().is_empty() {
            return None;
        }
        match &self.message {
            InboundMessage::Text { text } => Some((user_id, text.as_str())),
            InboundMessage::Unsupported { .. } => None,
        }
    }
}

/// How an event was disposed of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Processed,
    Duplicate,
    Ignored,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Processed => "processed",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
        };
        f.write_str(s)
    }
}

/// Structured result of handling one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandleOutcome {
    pub event_id: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationItem>,
    /// Open escalations after this one was recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<usize>,
}

impl HandleOutcome {
    fn bare(event_id: &str, status: Status) -> Self {
        Self {
            event_id: event_id.to_string(),
            status,
            action: None,
            reply_text: None,
            classification: None,
            escalation: None,
            queue_length: None,
        }
    }

    pub(crate) fn ignored(event_id: &str) -> Self {
        Self::bare(event_id, Status::Ignored)
    }

    pub(crate) fn duplicate(event_id: &str) -> Self {
        Self::bare(event_id, Status::Duplicate)
    }

    /// Reply to deliver, if any
    #[must_use]
    pub fn deliverable_reply(&self) -> Option<&str> {
        if self.status != Status::Processed {
            return None;
        }
        self.reply_text.as_deref().filter(|t| !t.trim().is_empty())
    }
}
