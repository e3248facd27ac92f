//! Opportunity detection.
//!
//! Rule-based detectors are pure functions over one batch of events and
//! report every record they had to leave out. The semantic detector is
//! the async, reasoning-service-backed counterpart; [`merge`] joins the
//! two candidate lists.

pub mod exclusive_no;
pub mod merge;
pub mod negative_risk;
pub mod semantic;
pub mod spread;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::types::{Market, MarketEvent, OpportunityCandidate, SkippedRecord};

pub use merge::merge;
pub use semantic::{SemanticDetector, SemanticOutcome};

/// Candidates from one detector pass plus the records it skipped.
#[derive(Debug, Default)]
pub struct Detection {
    pub candidates: Vec<OpportunityCandidate>,
    pub skipped: Vec<SkippedRecord>,
}

impl Detection {
    fn extend(&mut self, other: Detection) {
        self.candidates.extend(other.candidates);
        self.skipped.extend(other.skipped);
    }
}

/// Deterministic arbitrage detectors. No I/O.
pub struct RuleDetector {
    threshold: Decimal,
}

impl Default for RuleDetector {
    fn default() -> Self {
        Self::new(dec!(0.01))
    }
}

impl RuleDetector {
    /// `threshold` is the slack below 1.0 a price sum must clear.
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Run all sub-detectors over one batch.
    pub fn detect(&self, events: &[MarketEvent]) -> Detection {
        let mut detection = Detection::default();
        detection.extend(spread::detect(events));
        detection.extend(exclusive_no::detect(events));
        detection.extend(negative_risk::detect(events, self.threshold));

        debug!(
            events = events.len(),
            candidates = detection.candidates.len(),
            skipped = detection.skipped.len(),
            "Rule-based detection complete"
        );
        detection
    }
}

/// Markets of `event` whose title parses with `parse`.
///
/// A market's own question is preferred; the event title stands in for
/// the first market only. Each market yields at most one entry.
pub(crate) fn titled_markets<'a, T>(
    event: &'a MarketEvent,
    parse: impl Fn(&str) -> Option<T>,
) -> Vec<(T, &'a str, &'a Market)> {
    let mut out = Vec::new();
    for (i, market) in event.markets.iter().enumerate() {
        if let Some(parsed) = parse(&market.question) {
            out.push((parsed, market.question.as_str(), market));
        } else if i == 0 {
            if let Some(parsed) = parse(&event.title) {
                out.push((parsed, event.title.as_str(), market));
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn binary(question: &str, yes: Decimal, no: Decimal) -> Market {
        Market {
            question: question.to_string(),
            outcomes: vec!["Yes".into(), "No".into()],
            outcome_prices: vec![yes, no],
            best_ask: None,
        }
    }

    pub fn with_ask(mut market: Market, ask: Decimal) -> Market {
        market.best_ask = Some(ask);
        market
    }

    pub fn event(id: &str, title: &str, neg_risk: Option<bool>, markets: Vec<Market>) -> MarketEvent {
        MarketEvent {
            id: Some(id.to_string()),
            title: title.to_string(),
            tags: Vec::new(),
            neg_risk,
            markets,
            malformed_markets: 0,
        }
    }
}
