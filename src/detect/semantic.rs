//! Reasoning-service-backed detection.
//!
//! Sends one batch per category file and parses whatever opportunities
//! come back. Every failure resolves to "no result" for this batch; the
//! rule-based candidates are unaffected.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, ParseError};
use crate::llm::prompts;
use crate::llm::Dispatcher;
use crate::types::{MarketEvent, OpportunityCandidate};

/// Result of one semantic pass.
#[derive(Debug)]
pub enum SemanticOutcome {
    Candidates(Vec<OpportunityCandidate>),
    /// Dispatch gave up.
    NoResult(DispatchError),
    /// The service answered but the text was not the expected JSON.
    Unparseable { raw: String, error: ParseError },
}

impl SemanticOutcome {
    /// Candidates, or an empty list for either failure.
    pub fn into_candidates(self) -> Vec<OpportunityCandidate> {
        match self {
            SemanticOutcome::Candidates(c) => c,
            _ => Vec::new(),
        }
    }
}

pub struct SemanticDetector {
    dispatcher: Arc<Dispatcher>,
    max_records: usize,
}

impl SemanticDetector {
    pub fn new(dispatcher: Arc<Dispatcher>, max_records: usize) -> Self {
        Self {
            dispatcher,
            max_records: max_records.max(1),
        }
    }

    /// Analyse the first `max_records` events of a category.
    pub async fn detect(&self, category: &str, events: &[MarketEvent]) -> SemanticOutcome {
        if events.is_empty() {
            return SemanticOutcome::Candidates(Vec::new());
        }

        let batch = &events[..events.len().min(self.max_records)];
        let prompt = prompts::detection_prompt(batch);
        debug!(category, records = batch.len(), prompt_len = prompt.len(), "Semantic detection");

        let raw = match self.dispatcher.dispatch(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(category, error = %e, "Semantic detection got no result");
                return SemanticOutcome::NoResult(e);
            }
        };

        match prompts::parse_opportunities(&raw) {
            Ok(mut candidates) => {
                attach_event_ids(&mut candidates, batch);
                info!(category, count = candidates.len(), "Semantic candidates parsed");
                SemanticOutcome::Candidates(candidates)
            }
            Err(error) => {
                warn!(category, %error, "Semantic response could not be parsed");
                SemanticOutcome::Unparseable { raw, error }
            }
        }
    }
}

/// Fill missing `event_id`s by matching titles against the batch: an
/// exact (case-insensitive) match on an event title or market question
/// first, then containment either way.
pub fn attach_event_ids(candidates: &mut [OpportunityCandidate], batch: &[MarketEvent]) {
    for candidate in candidates.iter_mut().filter(|c| c.event_id.is_none()) {
        let wanted = candidate.market_title.trim().to_lowercase();
        if wanted.is_empty() {
            continue;
        }

        let titles_of = |e: &MarketEvent| -> Vec<String> {
            std::iter::once(e.title.to_lowercase())
                .chain(e.markets.iter().map(|m| m.question.to_lowercase()))
                .filter(|t| !t.is_empty())
                .collect()
        };

        let exact = batch
            .iter()
            .find(|e| titles_of(e).iter().any(|t| *t == wanted));
        let found = exact.or_else(|| {
            batch.iter().find(|e| {
                titles_of(e)
                    .iter()
                    .any(|t| wanted.contains(t.as_str()) || t.contains(wanted.as_str()))
            })
        });

        if let Some(event) = found {
            candidate.event_id = event.id.clone();
        }
    }
}
