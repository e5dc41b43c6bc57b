//! Confidence-threshold decisioning

use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::{Error, Result};

/// Default minimum confidence for an automated answer
pub const DEFAULT_ANSWER_THRESHOLD: f32 = 0.70;

/// Default minimum confidence for a clarifying question
pub const DEFAULT_CLARIFY_THRESHOLD: f32 = 0.45;

/// What the assistant does with a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Answer,
    Clarify,
    Escalate,
}

impl Action {
    /// Stable string form used in storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Clarify => "clarify",
            Self::Escalate => "escalate",
        }
    }

    /// Parse the storage form
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "answer" => Some(Self::Answer),
            "clarify" => Some(Self::Clarify),
            "escalate" => Some(Self::Escalate),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps a classification to an action
///
/// Rules apply in order: sensitive escalates, then confidence at or above
/// `answer_threshold` answers, at or above `clarify_threshold` clarifies,
/// and anything lower escalates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    answer_threshold: f32,
    clarify_threshold: f32,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            answer_threshold: DEFAULT_ANSWER_THRESHOLD,
            clarify_threshold: DEFAULT_CLARIFY_THRESHOLD,
        }
    }
}

impl DecisionPolicy {
    /// Create a policy
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` unless `0 <= clarify <= answer <= 1`
    pub fn new(answer_threshold: f32, clarify_threshold: f32) -> Result<Self> {
        let in_range = |v: f32| (0.0..=1.0).contains(&v);
        if !in_range(answer_threshold) || !in_range(clarify_threshold) {
            return Err(Error::Config(format!(
                "thresholds must lie in [0, 1] (answer={answer_threshold}, clarify={clarify_threshold})"
            )));
        }
        if clarify_threshold > answer_threshold {
            return Err(Error::Config(format!(
                "clarify threshold {clarify_threshold} exceeds answer threshold {answer_threshold}"
            )));
        }
        Ok(Self {
            answer_threshold,
            clarify_threshold,
        })
    }

    #[must_use]
    pub const fn answer_threshold(&self) -> f32 {
        self.answer_threshold
    }

    #[must_use]
    pub const fn clarify_threshold(&self) -> f32 {
        self.clarify_threshold
    }

    /// Decide what to do with a classification
    #[must_use]
    pub fn decide(&self, classification: &Classification) -> Action {
        if classification.is_sensitive {
            Action::Escalate
        } else if classification.confidence >= self.answer_threshold {
            Action::Answer
        } else if classification.confidence >= self.clarify_threshold {
            Action::Clarify
        } else {
            Action::Escalate
        }
    }
}
