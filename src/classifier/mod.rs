//! Intent classification
//!
//! Two interchangeable implementations sit behind the [`Classifier`] trait:
//! - [`KeywordClassifier`]: local heuristics, no network, never fails
//! - [`RemoteClassifier`]: OpenAI-compatible chat completions endpoint
//!
//! The keyword classifier doubles as the fallback whenever the remote
//! model errors out.

mod keyword;
mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use keyword::KeywordClassifier;
pub(crate) use keyword::tokenize;
pub use remote::RemoteClassifier;

use crate::Result;
use crate::db::{ConversationEntry, Profile};

/// Detected user intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Hello / thanks
    Greeting,
    /// Looking for talent to cast
    TalentSearch,
    /// Contract terms, rights, licensing
    Contract,
    /// Wants an introduction to an expert
    Expert,
    /// Availability and booking
    Schedule,
    /// Fees and budgets
    Pricing,
    /// Understandable but not tied to a domain intent
    General,
    /// Could not tell
    Unknown,
    /// Synthetic label for the identity-echo command
    UserId,
}

impl Intent {
    /// Stable string form used in storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::TalentSearch => "talent_search",
            Self::Contract => "contract",
            Self::Expert => "expert",
            Self::Schedule => "schedule",
            Self::Pricing => "pricing",
            Self::General => "general",
            Self::Unknown => "unknown",
            Self::UserId => "user_id",
        }
    }

    /// Parse the storage form, returning `None` for unrecognised labels
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "greeting" => Some(Self::Greeting),
            "talent_search" => Some(Self::TalentSearch),
            "contract" => Some(Self::Contract),
            "expert" => Some(Self::Expert),
            "schedule" => Some(Self::Schedule),
            "pricing" => Some(Self::Pricing),
            "general" => Some(Self::General),
            "unknown" => Some(Self::Unknown),
            "user_id" => Some(Self::UserId),
            _ => None,
        }
    }

    /// Whether this intent maps to a concrete casting topic
    #[must_use]
    pub const fn is_domain(self) -> bool {
        matches!(
            self,
            Self::TalentSearch | Self::Contract | Self::Expert | Self::Schedule | Self::Pricing
        )
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of classifying one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Certainty in `[0, 1]`
    pub confidence: f32,
    /// Sensitive matters always go to a human
    pub is_sensitive: bool,
    pub reason: String,
}

impl Classification {
    /// Build a classification, clamping confidence into `[0, 1]`
    #[must_use]
    pub fn new(intent: Intent, confidence: f32, is_sensitive: bool, reason: impl Into<String>) -> Self {
        Self {
            intent,
            confidence: clamp_confidence(confidence),
            is_sensitive,
            reason: reason.into(),
        }
    }
}

/// Clamp to `[0, 1]`, mapping NaN to 0
#[must_use]
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Everything a classifier may look at
#[derive(Debug, Clone, Copy)]
pub struct ClassifyRequest<'a> {
    pub message: &'a str,
    pub profile: Option<&'a Profile>,
    /// Recent turns, oldest first
    pub recent: &'a [ConversationEntry],
}

/// Intent classification capability
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Implementation name for logs
    fn name(&self) -> &'static str;

    /// Classify a message
    ///
    /// # Errors
    ///
    /// Returns error if the underlying model cannot produce a verdict
    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert!((Classification::new(Intent::General, 1.7, false, "").confidence - 1.0).abs() < f32::EPSILON);
        assert!(Classification::new(Intent::General, -0.2, false, "").confidence.abs() < f32::EPSILON);
        assert!(Classification::new(Intent::General, f32::NAN, false, "").confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn intent_round_trips_storage_form() {
        for intent in [
            Intent::Greeting,
            Intent::TalentSearch,
            Intent::Contract,
            Intent::Expert,
            Intent::Schedule,
            Intent::Pricing,
            Intent::General,
            Intent::Unknown,
            Intent::UserId,
        ] {
            assert_eq!(Intent::from_str_value(intent.as_str()), Some(intent));
        }
        assert_eq!(Intent::from_str_value("weather"), None);
    }

    #[test]
    fn intent_serializes_snake_case() {
        let json = serde_json::to_string(&Intent::TalentSearch).unwrap();
        assert_eq!(json, "\"talent_search\"");
    }
}
