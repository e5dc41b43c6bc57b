//! Remote model classifier (OpenAI-compatible chat completions)

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::keyword::has_sensitive_term;
use super::{Classification, Classifier, ClassifyRequest, Intent};
use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "You classify messages sent to a talent-casting assistant. \
Reply with a single JSON object: {\"intent\": one of greeting|talent_search|contract|expert|schedule|pricing|general|unknown, \
\"confidence\": number between 0 and 1, \"is_sensitive\": true for legal, safety, harassment or payment disputes, \
\"reason\": short explanation}. No other text.";

/// Verdict the model is asked to emit
#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    intent: String,
    confidence: f32,
    #[serde(default)]
    is_sensitive: bool,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Classifier backed by a hosted language model
pub struct RemoteClassifier {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl std::fmt::Debug for RemoteClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClassifier")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl RemoteClassifier {
    /// Create a remote classifier
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    fn user_payload(request: &ClassifyRequest<'_>) -> serde_json::Value {
        let recent: Vec<_> = request
            .recent
            .iter()
            .map(|e| json!({ "user": e.user_text, "assistant": e.assistant_text, "intent": e.intent }))
            .collect();
        let profile = request.profile.map(|p| {
            json!({
                "display_name": p.display_name,
                "language": p.language,
                "interests": p.interests,
                "location": p.location,
                "goal": p.goal,
            })
        });
        json!({
            "message": request.message,
            "profile": profile,
            "recent": recent,
        })
    }
}

/// Parse the model's reply into a classification
///
/// Unknown intent labels degrade to [`Intent::Unknown`]. The local
/// sensitive-term check is OR'ed in so a lenient model cannot clear it.
pub(crate) fn parse_verdict(content: &str, message: &str) -> Result<Classification> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let verdict: RemoteVerdict = serde_json::from_str(trimmed)
        .map_err(|e| Error::Classifier(format!("unparseable model output: {e}")))?;

    let intent = Intent::from_str_value(&verdict.intent).unwrap_or(Intent::Unknown);
    let is_sensitive = verdict.is_sensitive || has_sensitive_term(message);
    Ok(Classification::new(intent, verdict.confidence, is_sensitive, verdict.reason))
}

#[async_trait]
impl Classifier for RemoteClassifier {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": Self::user_payload(request).to_string() },
            ],
        });

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Classifier(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Classifier(format!("model returned {status}: {text}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Classifier(format!("invalid response body: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Classifier("empty completion".to_string()))?;

        let classification = parse_verdict(&content, request.message)?;
        tracing::debug!(
            intent = %classification.intent,
            confidence = classification.confidence,
            "remote classification"
        );
        Ok(classification)
    }
}
