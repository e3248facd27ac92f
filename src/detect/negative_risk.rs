//! Negative-risk detection.
//!
//! A market whose outcome prices sum below 1.0 can be bought out
//! entirely for a guaranteed profit. The same holds across the
//! sub-markets of a mutually exclusive event: buying Yes on every
//! outcome pays exactly 1.0.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::Detection;
use crate::error::SkipReason;
use crate::types::{MarketEvent, OpportunityCandidate, OpportunityType, SkippedRecord};

const EXCLUSIVE_KEYWORDS: &[&str] = &[
    "winner", "champion", "next", "who", "most", "nominee", "president", "ceo", "mayor",
    "governor", "senator",
];

const CUMULATIVE_KEYWORDS: &[&str] = &["released by", "reach", ">", "<", "market cap", "price", "hit"];

pub fn detect(events: &[MarketEvent], threshold: Decimal) -> Detection {
    let mut out = Detection::default();
    let limit = Decimal::ONE - threshold;

    for event in events {
        market_level(event, limit, &mut out);
        event_level(event, limit, &mut out);
    }
    out
}

/// Whether the sub-markets of `event` are mutually exclusive. An explicit
/// flag wins; otherwise the title must read like a single-winner question.
pub fn is_mutually_exclusive(event: &MarketEvent) -> bool {
    match event.neg_risk {
        Some(flag) => flag,
        None => {
            let title = event.title.to_lowercase();
            EXCLUSIVE_KEYWORDS.iter().any(|k| title.contains(k))
                && !CUMULATIVE_KEYWORDS.iter().any(|k| title.contains(k))
        }
    }
}

fn market_level(event: &MarketEvent, limit: Decimal, out: &mut Detection) {
    for market in &event.markets {
        let Some(sum) = market.price_sum() else {
            out.skipped.push(SkippedRecord::market(
                event.id.clone(),
                market.question.clone(),
                SkipReason::NoPrices,
            ));
            continue;
        };
        if sum >= limit {
            continue;
        }

        let profit = (Decimal::ONE - sum) * dec!(100);
        let title = if market.question.is_empty() {
            event.title.as_str()
        } else {
            market.question.as_str()
        };
        out.candidates.push(OpportunityCandidate::algorithmic(
            title,
            OpportunityType::Real,
            format!(
                "Market risk: sum of {:?} is {:.4} (< 1.0). Profit: {:.2}%.",
                market.outcomes, sum, profit
            ),
            profit,
            event.id.clone(),
        ));
    }
}

fn event_level(event: &MarketEvent, limit: Decimal, out: &mut Detection) {
    if event.markets.len() + event.malformed_markets < 2 || !is_mutually_exclusive(event) {
        return;
    }

    let yes_prices: Vec<Option<Decimal>> = event.markets.iter().map(|m| m.yes_price()).collect();
    let missing = event.malformed_markets + yes_prices.iter().filter(|p| p.is_none()).count();
    if missing > 0 {
        debug!(event_id = ?event.id, missing, "Exclusive event has unpriced outcomes");
        out.skipped.push(SkippedRecord::event(
            event.id.clone(),
            SkipReason::IncompleteEvent { missing },
        ));
        return;
    }

    let total: Decimal = yes_prices.into_iter().flatten().sum();
    if total >= limit {
        return;
    }

    let profit = (Decimal::ONE - total) * dec!(100);
    out.candidates.push(OpportunityCandidate::algorithmic(
        event.title.as_str(),
        OpportunityType::Real,
        format!(
            "Event risk: sum of all 'Yes' outcomes across {} markets is {:.4} (< 1.0). Profit: {:.2}%.",
            event.markets.len(),
            total,
            profit
        ),
        profit,
        event.id.clone(),
    ));
}
