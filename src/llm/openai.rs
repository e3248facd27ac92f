//! OpenAI Chat Completions integration.
//!
//! Serves both OpenAI itself and OpenRouter, which exposes the same
//! OpenAI-compatible chat completions format behind a different base
//! URL and model namespace. Responses are requested in JSON mode.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{classify_status, Provider, Reasoner};
use crate::error::ReasonerError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

const OPENAI_PRIMARY_MODEL: &str = "gpt-4o";
const OPENAI_LARGE_CONTEXT_MODEL: &str = "gpt-4.1";

const OPENROUTER_PRIMARY_MODEL: &str = "openai/gpt-4o";
const OPENROUTER_LARGE_CONTEXT_MODEL: &str = "openai/gpt-4.1";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiClient {
    http: Client,
    provider: Provider,
    base_url: String,
    primary_model: String,
    large_context_model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Create a client for `provider` (OpenAI or OpenRouter).
    ///
    /// `model` / `large_context_model` override the provider defaults.
    pub fn new(
        provider: Provider,
        model: Option<String>,
        large_context_model: Option<String>,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        let (base_url, primary, large) = match provider {
            Provider::OpenRouter => (
                OPENROUTER_BASE_URL,
                OPENROUTER_PRIMARY_MODEL,
                OPENROUTER_LARGE_CONTEXT_MODEL,
            ),
            _ => (OPENAI_BASE_URL, OPENAI_PRIMARY_MODEL, OPENAI_LARGE_CONTEXT_MODEL),
        };

        Ok(Self {
            http,
            provider,
            base_url: base_url.to_string(),
            primary_model: model.unwrap_or_else(|| primary.to_string()),
            large_context_model: large_context_model.unwrap_or_else(|| large.to_string()),
            max_tokens,
        })
    }

    /// Endpoint used to check whether a key is live.
    fn probe_url(&self) -> String {
        match self.provider {
            // OpenRouter's model list is public, so it proves nothing about the key.
            Provider::OpenRouter => format!("{}/auth/key", self.base_url),
            _ => format!("{}/models", self.base_url),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        let builder = builder.header("Authorization", format!("Bearer {api_key}"));
        match self.provider {
            Provider::OpenRouter => builder
                .header("HTTP-Referer", "https://github.com/arbscan/arbscan")
                .header("X-Title", "ARBSCAN"),
            _ => builder,
        }
    }
}

#[async_trait]
impl Reasoner for OpenAiClient {
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, ReasonerError> {
        let request = ChatRequest {
            model,
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat { kind: "json_object" },
        };

        debug!(provider = %self.provider, model, prompt_len = prompt.len(), "Chat completion request");

        let response = self
            .request(
                self.http.post(format!("{}/chat/completions", self.base_url)),
                api_key,
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| ReasonerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReasonerError::EmptyResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ReasonerError::EmptyResponse("no message content".into()))
    }

    async fn probe(&self, api_key: &str) -> Result<(), ReasonerError> {
        let response = self
            .request(self.http.get(self.probe_url()), api_key)
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
        &self.primary_model
    }

    fn large_context_model(&self) -> &str {
        &self.large_context_model
    }

    fn name(&self) -> &str {
        match self.provider {
            Provider::OpenRouter => "openrouter",
            _ => "openai",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_defaults() {
        let client = OpenAiClient::new(Provider::OpenAi, None, None, 1024, 30).unwrap();
        assert_eq!(client.primary_model(), OPENAI_PRIMARY_MODEL);
        assert_eq!(client.large_context_model(), OPENAI_LARGE_CONTEXT_MODEL);
        assert_eq!(client.name(), "openai");
        assert_eq!(client.probe_url(), "https://api.openai.com/v1/models");
    }

    #[test]
    fn test_openrouter_defaults() {
        let client = OpenAiClient::new(Provider::OpenRouter, None, None, 1024, 30).unwrap();
        assert_eq!(client.primary_model(), OPENROUTER_PRIMARY_MODEL);
        assert_eq!(client.name(), "openrouter");
        assert!(client.probe_url().ends_with("/auth/key"));
    }

    #[test]
    fn test_model_overrides() {
        let client = OpenAiClient::new(
            Provider::OpenAi,
            Some("gpt-4o-mini".into()),
            Some("gpt-4.1-mini".into()),
            2048,
            30,
        )
        .unwrap();
        assert_eq!(client.primary_model(), "gpt-4o-mini");
        assert_eq!(client.large_context_model(), "gpt-4.1-mini");
        assert_eq!(client.max_tokens, 2048);
    }

    #[test]
    fn test_request_serialization() {
        let req = ChatRequest {
            model: "gpt-4o",
            max_tokens: 100,
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            response_format: ResponseFormat { kind: "json_object" },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"opportunities\":[]}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let text = parsed.choices[0].message.as_ref().unwrap().content.as_deref();
        assert_eq!(text, Some("{\"opportunities\":[]}"));
    }
}
