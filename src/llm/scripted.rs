//! Scripted in-memory `Reasoner` for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::Reasoner;
use crate::error::ReasonerError;

/// Replays queued responses in order; once the queue is empty every call
/// gets `fallback`. Records `(api_key, model)` for each call.
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<Result<String, ReasonerError>>>,
    fallback: Result<String, ReasonerError>,
    calls: Mutex<Vec<(String, String)>>,
    prompts: Mutex<Vec<String>>,
    bad_keys: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(script: Vec<Result<String, ReasonerError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Err(ReasonerError::Http {
                status: 500,
                body: "script exhausted".into(),
            }),
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            bad_keys: HashSet::new(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Every call returns `text`.
    pub fn always(text: &str) -> Self {
        Self::new(Vec::new()).with_fallback(Ok(text.to_string()))
    }

    pub fn with_fallback(mut self, fallback: Result<String, ReasonerError>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_bad_keys(mut self, keys: &[&str]) -> Self {
        self.bad_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn complete(&self, api_key: &str, model: &str, prompt: &str) -> Result<String, ReasonerError> {
        self.calls.lock().push((api_key.to_string(), model.to_string()));
        self.prompts.lock().push(prompt.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    async fn probe(&self, api_key: &str) -> Result<(), ReasonerError> {
        if self.bad_keys.contains(api_key) {
            Err(ReasonerError::Unauthorized("scripted bad key".into()))
        } else {
            Ok(())
        }
    }

    fn primary_model(&self) -> &str {
        "primary"
    }

    fn large_context_model(&self) -> &str {
        "large"
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
