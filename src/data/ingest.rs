//! Defensive ingestion of snapshot records.
//!
//! Snapshot files come straight from the collector and are loosely
//! typed: list fields may arrive as JSON-encoded strings, prices as
//! strings or numbers, ids as numbers. Everything is normalised here so
//! the detectors only ever see typed `MarketEvent`s.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::debug;

use crate::error::SkipReason;
use crate::types::{Market, MarketEvent, SkippedRecord};

/// Typed events from one file, plus everything that was left out.
#[derive(Debug, Default)]
pub struct Ingested {
    pub events: Vec<MarketEvent>,
    pub skipped: Vec<SkippedRecord>,
}

/// Ingest a whole category file. Never fails; bad records become skips.
pub fn ingest_records(records: &[Value]) -> Ingested {
    let mut out = Ingested::default();
    for record in records {
        match parse_event(record) {
            Ok((event, skipped)) => {
                out.skipped.extend(skipped);
                out.events.push(event);
            }
            Err(reason) => {
                let event_id = record.get("id").and_then(id_string);
                debug!(event_id = ?event_id, %reason, "Skipping record");
                out.skipped.push(SkippedRecord::event(event_id, reason));
            }
        }
    }
    out
}

/// Parse one event. Malformed sub-markets are dropped individually and
/// reported alongside the event; only a non-object record fails outright.
pub fn parse_event(record: &Value) -> Result<(MarketEvent, Vec<SkippedRecord>), SkipReason> {
    let obj = record.as_object().ok_or(SkipReason::NotAnObject)?;

    let id = obj.get("id").and_then(id_string);
    let title = str_field(obj, "title").unwrap_or_default();
    let tags = obj.get("tags").map(parse_tags).unwrap_or_default();
    let neg_risk = obj.get("negRisk").and_then(Value::as_bool);

    let mut markets = Vec::new();
    let mut skipped = Vec::new();
    if let Some(Value::Array(raw_markets)) = obj.get("markets") {
        for raw in raw_markets {
            match parse_market(raw) {
                Ok(m) => markets.push(m),
                Err(reason) => {
                    let question = raw
                        .get("question")
                        .and_then(Value::as_str)
                        .unwrap_or("?")
                        .to_string();
                    debug!(event_id = ?id, market = %question, %reason, "Skipping market");
                    skipped.push(SkippedRecord::market(id.clone(), question, reason));
                }
            }
        }
    }

    let event = MarketEvent {
        id,
        title,
        tags,
        neg_risk,
        markets,
        malformed_markets: skipped.len(),
    };
    Ok((event, skipped))
}

/// Parse one market record.
pub fn parse_market(record: &Value) -> Result<Market, SkipReason> {
    let obj = record.as_object().ok_or(SkipReason::NotAnObject)?;

    let question = str_field(obj, "question").unwrap_or_default();

    let outcomes = match obj.get("outcomes") {
        None | Some(Value::Null) => vec!["Yes".to_string(), "No".to_string()],
        Some(v) => string_list(v).ok_or_else(|| bad("outcomes", v))?,
    };

    let outcome_prices = match obj.get("outcomePrices") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
        Some(v) => price_list(v).ok_or_else(|| bad("outcomePrices", v))?,
    };

    if !outcome_prices.is_empty() && outcome_prices.len() != outcomes.len() {
        return Err(SkipReason::LengthMismatch {
            outcomes: outcomes.len(),
            prices: outcome_prices.len(),
        });
    }

    // An unreadable bestAsk just means "no live ask".
    let best_ask = obj.get("bestAsk").and_then(decimal_value);

    Ok(Market {
        question,
        outcomes,
        outcome_prices,
        best_ask,
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn bad(field: &'static str, value: &Value) -> SkipReason {
    let value: String = value.to_string().chars().take(80).collect();
    SkipReason::BadField { field, value }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(|s| s.trim().to_string())
}

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A list given either as a JSON array or as a string holding one.
fn list_value(v: &Value) -> Option<Vec<Value>> {
    match v {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn string_list(v: &Value) -> Option<Vec<String>> {
    list_value(v)?
        .into_iter()
        .map(|item| item.as_str().map(|s| s.trim().to_string()))
        .collect()
}

fn price_list(v: &Value) -> Option<Vec<Decimal>> {
    list_value(v)?.iter().map(decimal_value).collect()
}

fn decimal_value(v: &Value) -> Option<Decimal> {
    let text = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn parse_tags(v: &Value) -> Vec<String> {
    let Some(items) = list_value(v) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|t| match t {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o
                .get("label")
                .or_else(|| o.get("slug"))
                .and_then(Value::as_str)
                .map(String::from),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
