//! Mutually-exclusive "No" detection.
//!
//! "X #1" and "X #2" cannot both resolve Yes, so at least one of the two
//! No sides always pays out. Buying both for less than 1.0 locks in the
//! difference.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use super::{titled_markets, Detection};
use crate::error::SkipReason;
use crate::types::{MarketEvent, OpportunityCandidate, OpportunityType, SkippedRecord};

static RANKED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)\s*(#|rank)\s*(\d+)").expect("valid regex"));

#[derive(Debug)]
struct Ranked<'a> {
    rank: u32,
    no_price: Decimal,
    title: &'a str,
    event_id: Option<String>,
}

/// `(subject, rank)` from a `<subject> #<n>` / `<subject> rank <n>` title.
pub fn parse_rank(title: &str) -> Option<Result<(String, u32), SkipReason>> {
    let lower = title.to_lowercase();
    let caps = RANKED.captures(&lower)?;
    let subject = caps[1].trim().to_string();
    Some(
        caps[3]
            .parse::<u32>()
            .map(|rank| (subject, rank))
            .map_err(|_| SkipReason::BadField {
                field: "rank",
                value: caps[3].to_string(),
            }),
    )
}

pub fn detect(events: &[MarketEvent]) -> Detection {
    let mut out = Detection::default();
    let mut groups: BTreeMap<String, Vec<Ranked<'_>>> = BTreeMap::new();

    for event in events {
        for (parsed, title, market) in titled_markets(event, parse_rank) {
            let (subject, rank) = match parsed {
                Ok(v) => v,
                Err(reason) => {
                    out.skipped
                        .push(SkippedRecord::market(event.id.clone(), title, reason));
                    continue;
                }
            };
            let Some(no_price) = market.no_price() else {
                out.skipped.push(SkippedRecord::market(
                    event.id.clone(),
                    title,
                    SkipReason::NoNoPrice,
                ));
                continue;
            };
            groups.entry(subject).or_default().push(Ranked {
                rank,
                no_price,
                title,
                event_id: event.id.clone(),
            });
        }
    }

    for items in groups.values().filter(|items| items.len() >= 2) {
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let (a, b) = (&items[i], &items[j]);
                if a.rank == b.rank {
                    continue;
                }
                let cost = a.no_price + b.no_price;
                if cost >= Decimal::ONE {
                    continue;
                }
                let profit = (Decimal::ONE - cost) * dec!(100);
                out.candidates.push(OpportunityCandidate::algorithmic(
                    format!("{} + {}", a.title, b.title),
                    OpportunityType::Real,
                    format!(
                        "Mutually exclusive No arb: buy No on both. Total cost {:.2} (< 1.0).",
                        cost
                    ),
                    profit,
                    a.event_id.clone(),
                ));
            }
        }
    }
    out
}
