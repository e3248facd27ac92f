//! Polymarket Gamma API event lookup.
//!
//! Gamma API: https://gamma-api.polymarket.com
//!
//! `GET /events?id=<id>` is free and unauthenticated. It answers with a
//! JSON array that holds the event when it exists and is empty when it
//! does not.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::PolymarketConfig;
use crate::error::FetchError;
use crate::platforms::EventSource;

pub struct GammaClient {
    http: Client,
    base_url: String,
}

impl GammaClient {
    pub fn new(config: &PolymarketConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build Polymarket HTTP client")?;

        Ok(Self {
            http,
            base_url: config.gamma_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn events_url(&self) -> String {
        format!("{}/events", self.base_url)
    }

    /// Pick the event out of a Gamma `/events` body.
    ///
    /// Arrays yield their first element; a bare object is accepted as-is.
    pub fn first_event(body: Value, event_id: &str) -> Result<Value, FetchError> {
        match body {
            Value::Array(events) => events
                .into_iter()
                .next()
                .ok_or_else(|| FetchError::NotFound(event_id.to_string())),
            obj @ Value::Object(_) => Ok(obj),
            other => Err(FetchError::Decode(format!(
                "expected array of events, got {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl EventSource for GammaClient {
    async fn fetch_event(&self, event_id: &str) -> Result<Value, FetchError> {
        debug!(event_id, "Fetching fresh event from Gamma API");

        let resp = self
            .http
            .get(self.events_url())
            .query(&[("id", event_id)])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        Self::first_event(body, event_id)
    }

    fn name(&self) -> String {
        "polymarket-gamma".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
