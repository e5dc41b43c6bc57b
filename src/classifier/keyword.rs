//! Heuristic keyword classifier
//!
//! Zero-cost rules over a normalized token stream. Used directly when no
//! remote model is configured and as the fallback when one fails.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{Classification, Classifier, ClassifyRequest, Intent};
use crate::Result;

/// Word tokens (letters, digits, apostrophes)
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("token pattern is valid"));

/// Terms that force human review
const SENSITIVE_TERMS: &[&str] = &[
    "legal", "lawyer", "attorney", "lawsuit", "sue", "suing", "dispute", "litigation",
    "harass", "harassment", "harassed", "abuse", "abused", "assault", "threat", "threatened",
    "breach", "unpaid", "not paid", "refund", "police", "discrimination", "injury", "injured",
];

/// Keyword table per domain intent, in priority order for ties
const INTENT_TERMS: &[(Intent, &[&str])] = &[
    (
        Intent::TalentSearch,
        &[
            "talent", "talents", "actor", "actors", "actress", "model", "models", "cast",
            "casting", "voice actor", "influencer", "influencers", "performer", "performers",
            "audition", "dancer", "dancers", "singer", "singers",
        ],
    ),
    (
        Intent::Contract,
        &[
            "contract", "contracts", "agreement", "terms", "rights", "royalty", "royalties",
            "license", "licensing", "clause", "nda", "usage rights",
        ],
    ),
    (
        Intent::Expert,
        &[
            "expert", "experts", "consultant", "advisor", "adviser", "coach", "specialist",
            "mentor", "introduce", "introduction",
        ],
    ),
    (
        Intent::Schedule,
        &[
            "schedule", "availability", "available", "booking", "book", "calendar", "shoot",
            "reschedule", "appointment",
        ],
    ),
    (
        Intent::Pricing,
        &["price", "pricing", "fee", "fees", "cost", "costs", "rate", "rates", "budget", "quote"],
    ),
];

const GREETING_TERMS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "good morning", "good afternoon", "good evening",
];

/// Follow-ups shorter than this inherit the previous turn's intent
const FOLLOW_UP_MAX_WORDS: usize = 6;

/// Heuristic classifier with zero latency
#[derive(Debug, Default, Clone)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    /// Create a keyword classifier
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classify synchronously
    #[must_use]
    pub fn classify_sync(&self, request: &ClassifyRequest<'_>) -> Classification {
        let tokens = tokenize(request.message);
        let normalized = normalize(&tokens);
        let sensitive = first_match(&normalized, SENSITIVE_TERMS);

        if tokens.is_empty() {
            return Classification::new(Intent::Unknown, 0.0, false, "empty message");
        }

        let mut best: Option<(Intent, usize)> = None;
        for (intent, terms) in INTENT_TERMS {
            let mut hits = count_matches(&normalized, terms);
            if *intent == Intent::TalentSearch {
                hits += profile_interest_hits(request, &normalized);
            }
            if hits > 0 && best.is_none_or(|(_, h)| hits > h) {
                best = Some((*intent, hits));
            }
        }

        let mut classification = if let Some((intent, hits)) = best {
            #[allow(clippy::cast_precision_loss)]
            let confidence = 0.1f32.mul_add((hits - 1) as f32, 0.75).min(0.95);
            Classification::new(intent, confidence, false, format!("matched {hits} {intent} keyword(s)"))
        } else if first_match(&normalized, GREETING_TERMS).is_some() {
            Classification::new(Intent::Greeting, 0.9, false, "greeting")
        } else if tokens.len() <= 2 {
            Classification::new(Intent::Unknown, 0.3, false, "too short to classify")
        } else if let Some(previous) = follow_up_intent(request, tokens.len()) {
            Classification::new(previous, 0.55, false, "follow-up to previous turn")
        } else {
            Classification::new(Intent::General, 0.5, false, "no intent keywords matched")
        };

        if let Some(term) = sensitive {
            classification.is_sensitive = true;
            classification.reason = format!("sensitive keyword: {term}");
        }

        classification
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification> {
        Ok(self.classify_sync(request))
    }
}

/// Lowercased word tokens
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Space-padded token string so phrase lookups respect word boundaries
fn normalize(tokens: &[String]) -> String {
    format!(" {} ", tokens.join(" "))
}

fn contains_term(normalized: &str, term: &str) -> bool {
    normalized.contains(&format!(" {term} "))
}

fn count_matches(normalized: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|t| contains_term(normalized, t)).count()
}

fn first_match(normalized: &str, terms: &[&'static str]) -> Option<&'static str> {
    terms.iter().copied().find(|t| contains_term(normalized, t))
}

/// Whether the text carries a sensitive term
pub(crate) fn has_sensitive_term(text: &str) -> bool {
    first_match(&normalize(&tokenize(text)), SENSITIVE_TERMS).is_some()
}

/// Profile interest tags mentioned in the message count as talent hits
fn profile_interest_hits(request: &ClassifyRequest<'_>, normalized: &str) -> usize {
    request.profile.map_or(0, |p| {
        p.interests
            .iter()
            .filter(|tag| {
                let tag = normalize(&tokenize(tag));
                tag.trim().len() > 1 && normalized.contains(tag.as_str())
            })
            .count()
    })
}

fn follow_up_intent(request: &ClassifyRequest<'_>, word_count: usize) -> Option<Intent> {
    if word_count > FOLLOW_UP_MAX_WORDS {
        return None;
    }
    request
        .recent
        .last()
        .map(|entry| entry.intent)
        .filter(|intent| intent.is_domain())
}
