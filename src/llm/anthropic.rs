//! Anthropic Claude integration.
//!
//! Implements the `Reasoner` trait using the Anthropic Messages API.
//! The Messages API has no JSON mode, so the system prompt pins the
//! output format and the caller strips any code fences.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{classify_status, Reasoner};
use crate::error::ReasonerError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_LARGE_CONTEXT_MODEL: &str = "claude-opus-4-20250514";

const SYSTEM_PROMPT: &str = "You are a precise prediction-market analyst. \
     Respond with a single JSON object and nothing else: \
     no markdown, no commentary.";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AnthropicClient {
    http: Client,
    model: String,
    large_context_model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(
        model: Option<String>,
        large_context_model: Option<String>,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build Anthropic HTTP client")?;

        Ok(Self {
            http,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            large_context_model: large_context_model
                .unwrap_or_else(|| DEFAULT_LARGE_CONTEXT_MODEL.to_string()),
            max_tokens,
        })
    }

    /// Concatenate the text blocks of a Messages response.
    fn collect_text(body: MessagesResponse) -> Result<String, ReasonerError> {
        if body.stop_reason.as_deref() == Some("max_tokens") {
            debug!("Anthropic response truncated at max_tokens");
        }
        let text = body
            .content
            .iter()
            .filter(|b| b.content_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            Err(ReasonerError::EmptyResponse("no text blocks".into()))
        } else {
            Ok(text)
        }
    }
}

#[async_trait]
impl Reasoner for AnthropicClient {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, ReasonerError> {
        let request = MessagesRequest {
            model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model, prompt_len = prompt.len(), "Anthropic messages request");

        let response = self
            .http
            .post(format!("{ANTHROPIC_API_URL}/messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ReasonerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ReasonerError::EmptyResponse(e.to_string()))?;

        Self::collect_text(body)
    }

    async fn probe(&self, api_key: &str) -> Result<(), ReasonerError> {
        let response = self
            .http
            .get(format!("{ANTHROPIC_API_URL}/models"))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(|e| ReasonerError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status.as_u16(), &body))
        }
    }

    fn primary_model(&self) -> &str {
        &self.model
    }

    fn large_context_model(&self) -> &str {
        &self.large_context_model
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let client = AnthropicClient::new(None, None, 1024, 60).unwrap();
        assert_eq!(client.primary_model(), DEFAULT_MODEL);
        assert_eq!(client.large_context_model(), DEFAULT_LARGE_CONTEXT_MODEL);
        assert_eq!(client.name(), "anthropic");
    }

    #[test]
    fn test_client_custom_model() {
        let client =
            AnthropicClient::new(Some("claude-haiku-4".into()), None, 2048, 60).unwrap();
        assert_eq!(client.primary_model(), "claude-haiku-4");
    }

    #[test]
    fn test_collect_text_joins_blocks() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"{\"a\":"},{"type":"text","text":"1}"}],"stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(AnthropicClient::collect_text(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_collect_text_skips_non_text_blocks() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"thinking"},{"type":"text","text":"{}"}]}"#,
        )
        .unwrap();
        assert_eq!(AnthropicClient::collect_text(body).unwrap(), "{}");
    }

    #[test]
    fn test_collect_text_empty_is_error() {
        let body: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(matches!(
            AnthropicClient::collect_text(body),
            Err(ReasonerError::EmptyResponse(_))
        ));
    }
}
