//! Candidate re-validation.
//!
//! Each candidate is checked against the freshest data for its source
//! event before it is trusted. A verdict of confirmed is only possible
//! after a successful fetch followed by a well-formed `1` from the
//! reasoning service; every failure along the way is inconclusive.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::{prompts, Dispatcher};
use crate::platforms::EventSource;
use crate::types::{OpportunityCandidate, ValidatedOpportunity, ValidationStatus};

pub struct Validator {
    source: Arc<dyn EventSource>,
    dispatcher: Arc<Dispatcher>,
}

impl Validator {
    pub fn new(source: Arc<dyn EventSource>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { source, dispatcher }
    }

    /// Fetch fresh data, then ask for a verdict. Never fails.
    pub async fn validate(&self, candidate: OpportunityCandidate) -> ValidatedOpportunity {
        let Some(event_id) = candidate.event_id.clone() else {
            debug!(title = %candidate.market_title, "No event id, cannot validate");
            return ValidatedOpportunity::inconclusive(candidate, "No event id, cannot validate");
        };

        let fresh = match self.source.fetch_event(&event_id).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(%event_id, source = %self.source.name(), error = %e, "Fresh data fetch failed");
                return ValidatedOpportunity::inconclusive(candidate, format!("Fetch failed: {e}"));
            }
        };

        let prompt = prompts::validation_prompt(&candidate, &fresh);
        let raw = match self.dispatcher.dispatch(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%event_id, error = %e, "Validation call got no result");
                return ValidatedOpportunity::inconclusive(candidate, format!("Validation call failed: {e}"));
            }
        };

        match prompts::parse_verdict(&raw) {
            Ok((status, reason)) => {
                match status {
                    ValidationStatus::Confirmed => {
                        info!(title = %candidate.market_title, "Validated")
                    }
                    ValidationStatus::Rejected => {
                        info!(title = %candidate.market_title, %reason, "Rejected")
                    }
                    ValidationStatus::Inconclusive => {
                        debug!(title = %candidate.market_title, "Verdict out of range")
                    }
                }
                ValidatedOpportunity::new(candidate, status, reason)
            }
            Err(e) => {
                warn!(%event_id, error = %e, "Verdict could not be parsed");
                ValidatedOpportunity::inconclusive(candidate, format!("Unparseable verdict: {e}"))
            }
        }
    }

    /// Validate a batch with at most `limit` candidates in flight.
    /// Output order is completion order.
    pub async fn validate_batch(
        &self,
        candidates: Vec<OpportunityCandidate>,
        limit: usize,
    ) -> Vec<ValidatedOpportunity> {
        stream::iter(candidates)
            .map(|c| self.validate(c))
            .buffer_unordered(limit.max(1))
            .collect()
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
