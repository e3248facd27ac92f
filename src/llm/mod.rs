//! Reasoning-service integration.
//!
//! Defines the `Reasoner` trait and provides implementations for
//! OpenAI, OpenRouter (OpenAI-compatible) and Anthropic. Providers only
//! perform single calls and classify failures; retries, credential
//! rotation and the large-context fallback live in [`dispatch`].

pub mod anthropic;
pub mod dispatch;
pub mod openai;
pub mod prompts;

#[cfg(test)]
pub(crate) mod scripted;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::ReasonerError;

pub use dispatch::{Dispatcher, RetryAction, RetryPolicy};

/// Which reasoning backend to target. Selected with `--model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[value(name = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
    #[value(name = "openrouter")]
    #[serde(rename = "openrouter")]
    OpenRouter,
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::OpenRouter => write!(f, "openrouter"),
            Provider::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Abstraction over a JSON-answering reasoning service.
///
/// The API key is supplied per call so a single client can serve a
/// whole rotating credential pool.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Send one prompt to `model` and return the raw response text.
    async fn complete(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<String, ReasonerError>;

    /// Cheap capability check used to validate a credential.
    async fn probe(&self, api_key: &str) -> std::result::Result<(), ReasonerError>;

    /// Model used for ordinary calls.
    fn primary_model(&self) -> &str;

    /// Model retried once when a prompt is too large for the primary.
    fn large_context_model(&self) -> &str;

    fn name(&self) -> &str;
}

/// Build the reasoner selected by `provider`.
pub fn build_reasoner(provider: Provider, cfg: &LlmConfig) -> Result<Arc<dyn Reasoner>> {
    let reasoner: Arc<dyn Reasoner> = match provider {
        Provider::OpenAi | Provider::OpenRouter => Arc::new(openai::OpenAiClient::new(
            provider,
            cfg.model.clone(),
            cfg.large_context_model.clone(),
            cfg.max_tokens,
            cfg.timeout_secs,
        )?),
        Provider::Anthropic => Arc::new(anthropic::AnthropicClient::new(
            cfg.model.clone(),
            cfg.large_context_model.clone(),
            cfg.max_tokens,
            cfg.timeout_secs,
        )?),
    };
    Ok(reasoner)
}

/// Map a non-success HTTP response onto the error taxonomy.
///
/// Shared by every provider so the retry policy sees the same classes
/// regardless of backend.
pub fn classify_status(status: u16, body: &str) -> ReasonerError {
    let lower = body.to_lowercase();
    match status {
        429 => ReasonerError::RateLimited,
        413 => ReasonerError::PayloadTooLarge(truncate(body)),
        400 if mentions_context_limit(&lower) => ReasonerError::PayloadTooLarge(truncate(body)),
        401 | 403 => ReasonerError::Unauthorized(truncate(body)),
        _ => ReasonerError::Http {
            status,
            body: truncate(body),
        },
    }
}

fn mentions_context_limit(lower_body: &str) -> bool {
    [
        "context_length_exceeded",
        "context length",
        "maximum context",
        "prompt is too long",
        "too many tokens",
        "request too large",
    ]
    .iter()
    .any(|needle| lower_body.contains(needle))
}

/// Error bodies can echo the whole prompt back; keep logs readable.
fn truncate(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}
