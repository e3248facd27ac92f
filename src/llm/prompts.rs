//! Prompt construction and response parsing.
//!
//! Both prompts ask for a single JSON object. Responses are read
//! defensively: code fences are stripped, the outermost `{...}` is
//! extracted, and each opportunity entry is parsed on its own so one
//! malformed entry does not cost the rest.

use serde_json::Value;
use tracing::warn;

use crate::error::ParseError;
use crate::types::{
    MarketEvent, OpportunityCandidate, OpportunityType, ProfitPotential, Source, ValidationStatus,
};

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Detection prompt for one batch of events.
pub fn detection_prompt(events: &[MarketEvent]) -> String {
    let data = serde_json::to_string(events).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = String::with_capacity(data.len() + 2048);
    prompt.push_str(
        "Analyze the following Polymarket data for arbitrage opportunities, relying on ASK PRICES.\n\n",
    );
    prompt.push_str("Strategies to look for:\n");
    prompt.push_str(
        "1. Real Arbitrage (Negative Risk): sum of outcome prices < 1.0, or sum of Yes asks \
         across mutually exclusive markets of one event < 1.0.\n",
    );
    prompt.push_str(
        "2. Cross-Market Arbitrage: correlated markets priced inconsistently, e.g. a state \
         result versus the national result it implies. Look for balanced trades that hedge \
         one outcome with a basket of related outcomes.\n",
    );
    prompt.push_str(
        "3. Value Arbitrage: implied probability clearly off real-world odds.\n",
    );
    prompt.push_str(
        "4. Mutually Exclusive \"No\" Arbitrage: \"X #1\" and \"X #2\" cannot both be true, so \
         if Price(No #1) + Price(No #2) < 1.0, buying both No sides is guaranteed profit.\n",
    );
    prompt.push_str(
        "5. Spread/Interval Arbitrage: if \"> 28B\" resolves Yes then \"> 26B\" must too, so \
         Price(>26B) >= Price(>28B). If not, buy Yes(>26B) and No(>28B).\n\n",
    );
    prompt.push_str(&format!("Data: {data}\n\n"));
    prompt.push_str(
        "Copy the event `id` of the record each opportunity comes from into `event_id`.\n\n",
    );
    prompt.push_str("Response Format (JSON only):\n");
    prompt.push_str(
        r#"{
  "opportunities": [
    {
      "market_title": "...",
      "type": "Real" | "Value" | "Logic",
      "description": "...",
      "profit_potential": "High" | "Medium" | "Low",
      "confidence": 0.0-1.0,
      "event_id": "..."
    }
  ]
}"#,
    );
    prompt
}

/// Verification prompt for one candidate against fresh event data.
pub fn validation_prompt(candidate: &OpportunityCandidate, fresh: &Value) -> String {
    let claim = serde_json::to_string_pretty(candidate).unwrap_or_default();
    let data = serde_json::to_string_pretty(fresh).unwrap_or_default();

    let mut prompt = String::with_capacity(claim.len() + data.len() + 1024);
    prompt.push_str("You are a high-precision arbitrage validator.\n\n");
    prompt.push_str(&format!(
        "A potential arbitrage opportunity was identified:\n{claim}\n\n"
    ));
    prompt.push_str(&format!(
        "Here is the LATEST data from the API for this event:\n{data}\n\n"
    ));
    prompt.push_str("Task:\n");
    prompt.push_str("1. Check whether the arbitrage still exists in the fresh data.\n");
    prompt.push_str("2. Re-check the arithmetic and the logic against the fresh prices.\n");
    prompt.push_str(
        "3. NEGATIVE RISK: if the sum of Yes ask prices for mutually exclusive outcomes is \
         still < 1.0 it IS a valid arbitrage. Return 1. Do not reject it because the margin \
         changed; reject only if the sum is now >= 1.0.\n",
    );
    prompt.push_str("4. If it is a valid, profitable arbitrage, return 1.\n");
    prompt.push_str("5. If it is invalid, outdated or risky, return -1.\n\n");
    prompt.push_str("Response (JSON only):\n");
    prompt.push_str(r#"{"validation_status": 1 or -1, "reason": "short explanation"}"#);
    prompt
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Remove markdown code fences a model may wrap its JSON in.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the language tag line, if any.
        text = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest,
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse the outermost JSON object in `raw`.
pub fn extract_object(raw: &str) -> Result<serde_json::Map<String, Value>, ParseError> {
    let text = strip_code_fences(raw);
    let start = text.find('{').ok_or(ParseError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(ParseError::NoJsonObject)?;
    if end < start {
        return Err(ParseError::NoJsonObject);
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParseError::NoJsonObject),
        Err(e) => Err(ParseError::Malformed(e.to_string())),
    }
}

/// Parse a detection response into candidates tagged `source = LLM`.
///
/// Fails only if the response has no readable `opportunities` array.
/// Individual malformed entries are dropped with a warning.
pub fn parse_opportunities(raw: &str) -> Result<Vec<OpportunityCandidate>, ParseError> {
    let mut object = extract_object(raw)?;
    let entries = match object.remove("opportunities") {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => return Err(ParseError::MissingField("opportunities")),
    };

    let total = entries.len();
    let parsed: Vec<OpportunityCandidate> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| match parse_entry(entry) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(index = i, error = %e, "Dropping malformed semantic opportunity");
                None
            }
        })
        .collect();

    if parsed.len() < total {
        warn!(kept = parsed.len(), total, "Some semantic opportunities were dropped");
    }
    Ok(parsed)
}

fn parse_entry(entry: &Value) -> Result<OpportunityCandidate, ParseError> {
    let obj = entry.as_object().ok_or(ParseError::NoJsonObject)?;

    let market_title = obj
        .get("market_title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingField("market_title"))?
        .to_string();

    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .and_then(parse_kind)
        .ok_or(ParseError::MissingField("type"))?;

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let profit_potential = obj
        .get("profit_potential")
        .and_then(Value::as_str)
        .and_then(parse_potential)
        .unwrap_or(ProfitPotential::Low);

    let confidence = obj.get("confidence").and_then(number_like).unwrap_or(0.0);

    let event_id = obj.get("event_id").and_then(id_like);

    Ok(OpportunityCandidate {
        market_title,
        kind,
        description,
        profit_potential,
        confidence: clamp_confidence(confidence),
        source: Source::Llm,
        event_id,
        profit_pct: None,
    })
}

/// Parse a validation response into a verdict and reason.
///
/// Anything other than `1` or `-1` (as a number or numeric string) is
/// inconclusive.
pub fn parse_verdict(raw: &str) -> Result<(ValidationStatus, String), ParseError> {
    let object = extract_object(raw)?;

    let status = match object.get("validation_status").and_then(number_like) {
        Some(v) if v == 1.0 => ValidationStatus::Confirmed,
        Some(v) if v == -1.0 => ValidationStatus::Rejected,
        _ => ValidationStatus::Inconclusive,
    };

    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("No reason provided")
        .to_string();

    Ok((status, reason))
}

fn parse_kind(s: &str) -> Option<OpportunityType> {
    match s.trim().to_ascii_lowercase().as_str() {
        "real" => Some(OpportunityType::Real),
        "value" => Some(OpportunityType::Value),
        "logic" => Some(OpportunityType::Logic),
        _ => None,
    }
}

fn parse_potential(s: &str) -> Option<ProfitPotential> {
    match s.trim().to_ascii_lowercase().as_str() {
        "high" => Some(ProfitPotential::High),
        "medium" => Some(ProfitPotential::Medium),
        "low" => Some(ProfitPotential::Low),
        _ => None,
    }
}

fn number_like(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn id_like(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn clamp_confidence(c: f64) -> f64 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
