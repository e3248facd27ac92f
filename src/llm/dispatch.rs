//! Shared call path to the reasoning service.
//!
//! Every prompt, from the semantic detector or the validator, goes
//! through [`Dispatcher::dispatch`]. It holds a global permit for the
//! whole call, draws a credential per attempt, and lets the
//! [`RetryPolicy`] decide what each failure class means.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::Reasoner;
use crate::credentials::{Credential, CredentialPool};
use crate::error::{DispatchError, ReasonerError};

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Sleep, then retry with a fresh credential.
    Backoff(Duration),
    /// Retry once on the larger-context model; no further attempts.
    EscalateContext,
    /// Remove the credential from the pool, then retry.
    DropCredential,
    /// Retry after an optional pause.
    Retry(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub rate_limit_backoff: Duration,
    pub retry_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_backoff: Duration::from_millis(500),
            retry_backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn action_for(&self, error: &ReasonerError) -> RetryAction {
        match error {
            ReasonerError::RateLimited => RetryAction::Backoff(self.rate_limit_backoff),
            ReasonerError::PayloadTooLarge(_) => RetryAction::EscalateContext,
            ReasonerError::Unauthorized(_) => RetryAction::DropCredential,
            _ => RetryAction::Retry(self.retry_backoff),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    reasoner: Arc<dyn Reasoner>,
    pool: Arc<CredentialPool>,
    policy: RetryPolicy,
    limiter: Semaphore,
    max_in_flight: usize,
}

impl Dispatcher {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        pool: Arc<CredentialPool>,
        policy: RetryPolicy,
        max_in_flight: usize,
    ) -> Self {
        let max_in_flight = max_in_flight.max(1);
        info!(
            provider = reasoner.name(),
            max_in_flight,
            max_attempts = policy.max_attempts,
            "Dispatcher ready"
        );
        Self {
            reasoner,
            pool,
            policy,
            limiter: Semaphore::new(max_in_flight),
            max_in_flight,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Send `prompt` and return the raw response text.
    pub async fn dispatch(&self, prompt: &str) -> Result<String, DispatchError> {
        // The semaphore is never closed, so acquisition cannot fail.
        let _permit = self.limiter.acquire().await.ok();

        let max_attempts = self.policy.max_attempts.max(1);
        let model = self.reasoner.primary_model();
        let mut last = ReasonerError::EmptyResponse("no attempt made".into());

        for attempt in 1..=max_attempts {
            let credential = self.pool.pick()?;
            debug!(attempt, key = %credential.fingerprint(), model, "Dispatching prompt");

            let err = match self.reasoner.complete(credential.expose(), model, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            let action = self.policy.action_for(&err);
            warn!(attempt, max_attempts, error = %err, ?action, "Reasoner call failed");

            match action {
                RetryAction::EscalateContext => {
                    return self.escalate(&credential, prompt).await;
                }
                RetryAction::DropCredential => self.pool.mark_bad(&credential),
                RetryAction::Backoff(pause) | RetryAction::Retry(pause) => {
                    if attempt < max_attempts && !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }
            last = err;
        }

        Err(DispatchError::AttemptsExhausted {
            attempts: max_attempts,
            last,
        })
    }

    /// One immediate retry on the larger-context model.
    async fn escalate(&self, credential: &Credential, prompt: &str) -> Result<String, DispatchError> {
        let model = self.reasoner.large_context_model();
        info!(model, "Prompt too large, retrying on large-context model");
        self.reasoner
            .complete(credential.expose(), model, prompt)
            .await
            .map_err(|source| DispatchError::ContextFallbackFailed {
                model: model.to_string(),
                source,
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
