//! Candidate merge.

use crate::types::{OpportunityCandidate, Source};

/// Rule-based candidates followed by semantic ones. Every semantic
/// candidate is tagged `LLM` regardless of what the service claimed.
/// No de-duplication: the validator sees both if they overlap.
pub fn merge(
    algorithmic: Vec<OpportunityCandidate>,
    semantic: Vec<OpportunityCandidate>,
) -> Vec<OpportunityCandidate> {
    let mut merged = algorithmic;
    merged.reserve(semantic.len());
    merged.extend(semantic.into_iter().map(|mut c| {
        c.source = Source::Llm;
        c
    }));
    merged
}
