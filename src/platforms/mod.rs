//! Live market-data sources.
//!
//! Defines the `EventSource` trait the validator uses to re-fetch an
//! event just before asking for a verdict. The concrete implementation
//! is the Polymarket Gamma API.

pub mod polymarket;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

/// Abstraction over a venue that can return fresh data for one event.
///
/// The payload is passed to the reasoning service verbatim, so it is
/// kept as raw JSON rather than the snapshot's typed model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Freshest data for `event_id`.
    async fn fetch_event(&self, event_id: &str) -> Result<Value, FetchError>;

    /// Source name for logging.
    fn name(&self) -> String;
}
