//! Spread / interval detection.
//!
//! Threshold ladders like "Market Cap > 26B" and "Market Cap > 28B" must
//! be priced monotonically: anything above 28B is also above 26B, so the
//! higher rung can never be worth more than the lower one. Ceilings
//! ("< X") are the mirror image.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::str::FromStr;

use super::{titled_markets, Detection};
use crate::error::SkipReason;
use crate::types::{MarketEvent, OpportunityCandidate, OpportunityType, SkippedRecord};

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(.+?)\s*(>=|<=|>|<)\s*\$?([\d,]*\.?\d+)([kmbt])?\b").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Direction {
    /// `>` / `>=`: a higher threshold is harder to reach.
    Above,
    /// `<` / `<=`: a lower threshold is harder to reach.
    Below,
}

/// A parsed `<subject> <comparator> <threshold>` title.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub subject: String,
    pub direction: Direction,
    pub threshold: Decimal,
}

#[derive(Debug)]
struct Rung<'a> {
    threshold: Decimal,
    price: Decimal,
    title: &'a str,
    event_id: Option<String>,
}

/// Parse a title. `Err` means it matched the shape but the number was bad.
pub fn parse_comparison(title: &str) -> Option<Result<Comparison, SkipReason>> {
    let lower = title.to_lowercase();
    let caps = COMPARISON.captures(&lower)?;

    let subject = caps[1].trim().to_string();
    let direction = match &caps[2] {
        ">" | ">=" => Direction::Above,
        _ => Direction::Below,
    };
    let number = caps[3].replace(',', "");
    let scale: i64 = match caps.get(4).map(|m| m.as_str()) {
        Some("k") => 1_000,
        Some("m") => 1_000_000,
        Some("b") => 1_000_000_000,
        Some("t") => 1_000_000_000_000,
        _ => 1,
    };

    let threshold = Decimal::from_str(&number)
        .ok()
        .and_then(|n| n.checked_mul(Decimal::from(scale)));
    Some(match threshold {
        Some(threshold) => Ok(Comparison {
            subject,
            direction,
            threshold,
        }),
        None => Err(SkipReason::BadThreshold(caps[3].to_string())),
    })
}

pub fn detect(events: &[MarketEvent]) -> Detection {
    let mut out = Detection::default();
    let mut groups: BTreeMap<(String, Direction), Vec<Rung<'_>>> = BTreeMap::new();

    for event in events {
        for (parsed, title, market) in titled_markets(event, parse_comparison) {
            let comparison = match parsed {
                Ok(c) => c,
                Err(reason) => {
                    out.skipped
                        .push(SkippedRecord::market(event.id.clone(), title, reason));
                    continue;
                }
            };
            let Some(price) = market.yes_price() else {
                out.skipped.push(SkippedRecord::market(
                    event.id.clone(),
                    title,
                    SkipReason::NoYesPrice,
                ));
                continue;
            };
            groups
                .entry((comparison.subject, comparison.direction))
                .or_default()
                .push(Rung {
                    threshold: comparison.threshold,
                    price,
                    title,
                    event_id: event.id.clone(),
                });
        }
    }

    for ((_, direction), mut rungs) in groups {
        rungs.sort_by(|a, b| a.threshold.cmp(&b.threshold));
        for i in 0..rungs.len() {
            for j in (i + 1)..rungs.len() {
                let (low, high) = (&rungs[i], &rungs[j]);
                if low.threshold >= high.threshold {
                    continue;
                }
                if let Some(c) = check_pair(direction, low, high) {
                    out.candidates.push(c);
                }
            }
        }
    }
    out
}

/// One candidate if the pair is priced against its implication.
fn check_pair(direction: Direction, low: &Rung<'_>, high: &Rung<'_>) -> Option<OpportunityCandidate> {
    // `strict` implies `loose`, so Yes(strict) must not cost more than Yes(loose).
    let (strict, loose) = match direction {
        Direction::Above => (high, low),
        Direction::Below => (low, high),
    };
    if strict.price <= loose.price {
        return None;
    }

    let profit = (strict.price - loose.price) * dec!(100);
    let cost = loose.price + (Decimal::ONE - strict.price);
    Some(OpportunityCandidate::algorithmic(
        format!("{} vs {}", low.title, high.title),
        OpportunityType::Logic,
        format!(
            "Spread arb: {} ({}) > {} ({}). Buy Yes on \"{}\", No on \"{}\". Cost {:.2}.",
            strict.title, strict.price, loose.title, loose.price, loose.title, strict.title, cost
        ),
        profit,
        low.event_id.clone(),
    ))
}
