//! Chat platform delivery and webhook signature verification

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Platform limit on one text message, in characters
pub const MAX_REPLY_CHARS: usize = 5000;

/// Outbound reply delivery
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `text` using the platform's reply handle
    ///
    /// # Errors
    ///
    /// Returns error if the platform rejects or cannot be reached
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage>,
}

#[derive(Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

/// LINE Messaging API reply client
pub struct LinePlatform {
    client: reqwest::Client,
    api_base: String,
    access_token: SecretString,
}

impl std::fmt::Debug for LinePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinePlatform")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl LinePlatform {
    #[must_use]
    pub fn new(api_base: impl Into<String>, access_token: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token,
        }
    }
}

#[async_trait]
impl Messenger for LinePlatform {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let request = ReplyRequest {
            reply_token,
            messages: vec![TextMessage {
                kind: "text",
                text: truncate_chars(text, MAX_REPLY_CHARS),
            }],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Messenger(format!("reply API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Messenger(format!("reply API returned {status}: {body}")));
        }

        tracing::debug!(chars = text.chars().count(), "reply delivered");
        Ok(())
    }
}

/// Keep at most `max` characters
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Compute the base64 HMAC-SHA256 signature of a body
///
/// # Errors
///
/// Returns error if the secret cannot key the MAC
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Signature(e.to_string()))?;
    mac.update(body);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify a webhook body against its `x-line-signature` header value
///
/// # Errors
///
/// Returns `Error::Signature` if the header is missing, malformed or does
/// not match
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> Result<()> {
    let signature = signature.ok_or_else(|| Error::Signature("missing signature header".to_string()))?;
    let provided = STANDARD
        .decode(signature.trim())
        .map_err(|_| Error::Signature("signature is not base64".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Signature(e.to_string()))?;
    mac.update(body);

    // Constant-time comparison via `verify_slice`
    mac.verify_slice(&provided)
        .map_err(|_| Error::Signature("signature mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"events":[]}"#;
        let signature = sign("channel-secret", body).unwrap();
        verify_signature("channel-secret", body, Some(&signature)).unwrap();
    }

    #[test]
    fn test_signature_rejects_tampering() {
        let signature = sign("channel-secret", b"original").unwrap();
        assert!(matches!(
            verify_signature("channel-secret", b"tampered", Some(&signature)),
            Err(Error::Signature(_))
        ));
        assert!(matches!(
            verify_signature("other-secret", b"original", Some(&signature)),
            Err(Error::Signature(_))
        ));
    }

    #[test]
    fn test_signature_rejects_missing_or_garbage() {
        assert!(verify_signature("s", b"x", None).is_err());
        assert!(verify_signature("s", b"x", Some("not base64!!")).is_err());
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 10), "short");
        let long = "あ".repeat(MAX_REPLY_CHARS + 10);
        assert_eq!(truncate_chars(&long, MAX_REPLY_CHARS).chars().count(), MAX_REPLY_CHARS);
    }

    #[tokio::test]
    async fn test_unreachable_platform_errors() {
        let platform = LinePlatform::new("http://127.0.0.1:9", SecretString::from("token"));
        assert!(matches!(
            platform.reply("rt", "hello").await,
            Err(Error::Messenger(_))
        ));
    }
}
