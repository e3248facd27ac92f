//! In-memory doubles for integration testing.
//!
//! `MockReasoner` answers detection and validation prompts with canned
//! text and records which kind of prompt it saw. `MockSource` serves
//! fresh event data from a map, or a forced error.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arbscan::error::{FetchError, ReasonerError};
use arbscan::llm::Reasoner;
use arbscan::platforms::EventSource;

// ---------------------------------------------------------------------------
// Reasoner
// ---------------------------------------------------------------------------

/// Which prompt a call carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Detection,
    Validation,
}

pub struct MockReasoner {
    detection: String,
    verdict: String,
    /// If set, every call fails with this error.
    force_error: Option<ReasonerError>,
    calls: Arc<Mutex<Vec<PromptKind>>>,
}

impl MockReasoner {
    /// Detection finds nothing; every candidate is confirmed.
    pub fn confirming() -> Self {
        Self::new(r#"{"opportunities": []}"#, r#"{"validation_status": 1, "reason": "still open"}"#)
    }

    pub fn new(detection: &str, verdict: &str) -> Self {
        Self {
            detection: detection.to_string(),
            verdict: verdict.to_string(),
            force_error: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(error: ReasonerError) -> Self {
        Self {
            force_error: Some(error),
            ..Self::confirming()
        }
    }

    pub fn calls(&self) -> Vec<PromptKind> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: PromptKind) -> usize {
        self.calls().into_iter().filter(|k| *k == kind).count()
    }
}

#[async_trait]
impl Reasoner for MockReasoner {
    async fn complete(&self, _api_key: &str, _model: &str, prompt: &str) -> Result<String, ReasonerError> {
        let kind = if prompt.contains("arbitrage validator") {
            PromptKind::Validation
        } else {
            PromptKind::Detection
        };
        self.calls.lock().unwrap().push(kind);

        if let Some(err) = &self.force_error {
            return Err(err.clone());
        }
        Ok(match kind {
            PromptKind::Detection => self.detection.clone(),
            PromptKind::Validation => self.verdict.clone(),
        })
    }

    async fn probe(&self, _api_key: &str) -> Result<(), ReasonerError> {
        match &self.force_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn primary_model(&self) -> &str {
        "mock-primary"
    }

    fn large_context_model(&self) -> &str {
        "mock-large"
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Event source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockSource {
    events: HashMap<String, Value>,
    force_error: Mutex<Option<FetchError>>,
    fetched: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn with_event(mut self, id: &str, event: Value) -> Self {
        self.events.insert(id.to_string(), event);
        self
    }

    /// Force all subsequent fetches to return an error.
    pub fn set_error(&self, err: FetchError) {
        *self.force_error.lock().unwrap() = Some(err);
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for MockSource {
    async fn fetch_event(&self, event_id: &str) -> Result<Value, FetchError> {
        self.fetched.lock().unwrap().push(event_id.to_string());
        if let Some(err) = self.force_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.events
            .get(event_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(event_id.to_string()))
    }

    fn name(&self) -> String {
        "mock-source".to_string()
    }
}
