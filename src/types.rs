//! Shared types for the arbitrage scanner.
//!
//! These types form the data model used across all modules: the
//! read-only snapshot records a detector consumes, the candidates the
//! detectors produce, and the verdicts the validator attaches to them.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SkipReason;

// ---------------------------------------------------------------------------
// Snapshot records
// ---------------------------------------------------------------------------

/// One logical question, possibly split into mutually-exclusive sub-markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Upstream marker that sub-markets are mutually exclusive and exhaustive.
    /// `None` when the snapshot did not carry the flag at all.
    #[serde(rename = "negRisk", default)]
    pub neg_risk: Option<bool>,
    #[serde(default)]
    pub markets: Vec<Market>,
    /// Sub-markets dropped at ingestion. A non-zero count means `markets`
    /// is not the complete outcome set.
    #[serde(skip)]
    pub malformed_markets: usize,
}

/// A single binary (or n-ary) market inside an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub question: String,
    /// Outcome labels, index-aligned with `outcome_prices`.
    pub outcomes: Vec<String>,
    #[serde(rename = "outcomePrices")]
    pub outcome_prices: Vec<Decimal>,
    #[serde(rename = "bestAsk", default, skip_serializing_if = "Option::is_none")]
    pub best_ask: Option<Decimal>,
}

impl Market {
    /// Snapshot price of the named outcome (case-insensitive label match).
    pub fn outcome_price(&self, label: &str) -> Option<Decimal> {
        let idx = self
            .outcomes
            .iter()
            .position(|o| o.eq_ignore_ascii_case(label))?;
        self.outcome_prices.get(idx).copied()
    }

    /// Best available "Yes" price: a positive `bestAsk` wins over the
    /// recorded outcome price because it reflects live liquidity.
    pub fn yes_price(&self) -> Option<Decimal> {
        match self.best_ask {
            Some(ask) if ask > Decimal::ZERO => Some(ask),
            _ => self.outcome_price("Yes"),
        }
    }

    pub fn no_price(&self) -> Option<Decimal> {
        self.outcome_price("No")
    }

    /// Sum of all outcome prices, or `None` when there are none.
    pub fn price_sum(&self) -> Option<Decimal> {
        if self.outcome_prices.is_empty() {
            return None;
        }
        Some(self.outcome_prices.iter().copied().sum())
    }
}

impl fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} markets{})",
            self.id.as_deref().unwrap_or("?"),
            self.title,
            self.markets.len(),
            if self.neg_risk == Some(true) { ", negRisk" } else { "" },
        )
    }
}

/// A record left out of a batch, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub event_id: Option<String>,
    pub market: Option<String>,
    pub reason: SkipReason,
}

impl SkippedRecord {
    pub fn event(event_id: Option<String>, reason: SkipReason) -> Self {
        Self {
            event_id,
            market: None,
            reason,
        }
    }

    pub fn market(event_id: Option<String>, market: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            event_id,
            market: Some(market.into()),
            reason,
        }
    }
}

impl fmt::Display for SkippedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {}", self.event_id.as_deref().unwrap_or("?"))?;
        if let Some(m) = &self.market {
            write!(f, " / \"{m}\"")?;
        }
        write!(f, ": {}", self.reason)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of arbitrage a candidate claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpportunityType {
    /// Guaranteed profit regardless of outcome.
    Real,
    /// Mispricing against real-world odds; not risk-free.
    Value,
    /// Inconsistency between logically related markets.
    Logic,
}

impl fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpportunityType::Real => write!(f, "Real"),
            OpportunityType::Value => write!(f, "Value"),
            OpportunityType::Logic => write!(f, "Logic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfitPotential {
    High,
    Medium,
    Low,
}

/// Profit percentage above which an algorithmic candidate is rated `High`.
pub const HIGH_PROFIT_PCT: Decimal = dec!(5);

impl ProfitPotential {
    /// Rating for an algorithmically computed profit percentage.
    /// Never yields `Low`; that rating only comes from the semantic detector.
    pub fn from_profit_pct(profit_pct: Decimal) -> Self {
        if profit_pct > HIGH_PROFIT_PCT {
            ProfitPotential::High
        } else {
            ProfitPotential::Medium
        }
    }
}

impl fmt::Display for ProfitPotential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitPotential::High => write!(f, "High"),
            ProfitPotential::Medium => write!(f, "Medium"),
            ProfitPotential::Low => write!(f, "Low"),
        }
    }
}

/// Which detector produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Algorithm,
    #[serde(rename = "LLM")]
    Llm,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Algorithm => write!(f, "Algorithm"),
            Source::Llm => write!(f, "LLM"),
        }
    }
}

/// Ternary verdict from the validator. Serialized as `1`, `-1` or `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i64")]
pub enum ValidationStatus {
    Confirmed,
    Rejected,
    Inconclusive,
}

impl From<ValidationStatus> for i8 {
    fn from(status: ValidationStatus) -> Self {
        match status {
            ValidationStatus::Confirmed => 1,
            ValidationStatus::Rejected => -1,
            ValidationStatus::Inconclusive => 0,
        }
    }
}

impl TryFrom<i64> for ValidationStatus {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ValidationStatus::Confirmed),
            -1 => Ok(ValidationStatus::Rejected),
            0 => Ok(ValidationStatus::Inconclusive),
            other => Err(format!("invalid validation_status: {other}")),
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Confirmed => write!(f, "confirmed"),
            ValidationStatus::Rejected => write!(f, "rejected"),
            ValidationStatus::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// An arbitrage claim produced by one of the detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityCandidate {
    pub market_title: String,
    #[serde(rename = "type")]
    pub kind: OpportunityType,
    pub description: String,
    pub profit_potential: ProfitPotential,
    /// Detector confidence, 0.0–1.0.
    pub confidence: f64,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Computed profit percentage (algorithmic candidates only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_pct: Option<Decimal>,
}

impl OpportunityCandidate {
    /// Build a rule-based candidate. Confidence is always 1.0 and the
    /// profit rating follows the computed percentage.
    pub fn algorithmic(
        market_title: impl Into<String>,
        kind: OpportunityType,
        description: impl Into<String>,
        profit_pct: Decimal,
        event_id: Option<String>,
    ) -> Self {
        Self {
            market_title: market_title.into(),
            kind,
            description: description.into(),
            profit_potential: ProfitPotential::from_profit_pct(profit_pct),
            confidence: 1.0,
            source: Source::Algorithm,
            event_id,
            profit_pct: Some(profit_pct),
        }
    }
}

impl fmt::Display for OpportunityCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {} ({} | conf={:.0}%",
            self.source,
            self.kind,
            self.market_title,
            self.profit_potential,
            self.confidence * 100.0,
        )?;
        if let Some(p) = self.profit_pct {
            write!(f, " | profit={}%", p.round_dp(2))?;
        }
        write!(f, ")")
    }
}

/// A candidate with the validator's verdict attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedOpportunity {
    #[serde(flatten)]
    pub candidate: OpportunityCandidate,
    pub validation_status: ValidationStatus,
    pub reason: String,
}

impl ValidatedOpportunity {
    pub fn new(
        candidate: OpportunityCandidate,
        validation_status: ValidationStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            candidate,
            validation_status,
            reason: reason.into(),
        }
    }

    /// Shorthand for a verdict of "could not validate".
    pub fn inconclusive(candidate: OpportunityCandidate, reason: impl Into<String>) -> Self {
        Self::new(candidate, ValidationStatus::Inconclusive, reason)
    }

    pub fn is_confirmed(&self) -> bool {
        self.validation_status == ValidationStatus::Confirmed
    }
}

/// Body of a per-category output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityReport {
    pub opportunities: Vec<ValidatedOpportunity>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
