//! Typed errors for the detection / validation path.
//!
//! None of these abort a run. Each one is resolved at the boundary
//! where it occurs: a call becomes "no result", a candidate becomes
//! inconclusive, or a record is skipped.

use thiserror::Error;

/// Classified failure of a single reasoning-service call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReasonerError {
    /// HTTP 429. Transient; retry after a short backoff.
    #[error("rate limited")]
    RateLimited,

    /// Prompt exceeds the model's context window.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The credential was refused (revoked, wrong scope, no quota).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success HTTP status.
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport-level failure (DNS, TLS, timeout, reset).
    #[error("network error: {0}")]
    Network(String),

    /// 2xx response that carried no usable text.
    #[error("empty or undecodable response: {0}")]
    EmptyResponse(String),
}

/// Outcome of a whole dispatch once the retry policy has given up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The credential pool ran dry mid-call.
    #[error("no credentials available")]
    CredentialExhausted,

    #[error("gave up after {attempts} attempts: {last}")]
    AttemptsExhausted { attempts: u32, last: ReasonerError },

    /// Oversized payload and the larger-context model failed too.
    #[error("large-context fallback ({model}) failed: {source}")]
    ContextFallbackFailed {
        model: String,
        #[source]
        source: ReasonerError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no credentials available")]
    NoCredentialsAvailable,
}

impl From<CredentialError> for DispatchError {
    fn from(_: CredentialError) -> Self {
        DispatchError::CredentialExhausted
    }
}

/// Failure to obtain fresh data for an event during validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("event {0} not found")]
    NotFound(String),

    #[error("event source returned http {status}")]
    Http { status: u16 },

    #[error("event source request failed: {0}")]
    Transport(String),

    #[error("event source body could not be decoded: {0}")]
    Decode(String),
}

/// Reasoning-service text that could not be read as the expected JSON.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no JSON object in response")]
    NoJsonObject,

    #[error("malformed JSON: {0}")]
    Malformed(String),

    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),
}

/// Why a single record was left out of a detector batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("unparseable {field}: {value}")]
    BadField { field: &'static str, value: String },

    #[error("{outcomes} outcomes but {prices} prices")]
    LengthMismatch { outcomes: usize, prices: usize },

    #[error("no outcome prices")]
    NoPrices,

    #[error("no usable Yes price")]
    NoYesPrice,

    #[error("no usable No price")]
    NoNoPrice,

    #[error("unparseable threshold: {0}")]
    BadThreshold(String),

    /// Mutually exclusive event whose outcome set cannot be fully priced.
    #[error("{missing} sub-markets unpriced, event sum would undercount")]
    IncompleteEvent { missing: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_error_maps_to_exhausted() {
        let e: DispatchError = CredentialError::NoCredentialsAvailable.into();
        assert_eq!(e, DispatchError::CredentialExhausted);
    }

    #[test]
    fn test_dispatch_error_messages() {
        let e = DispatchError::AttemptsExhausted {
            attempts: 3,
            last: ReasonerError::RateLimited,
        };
        assert_eq!(e.to_string(), "gave up after 3 attempts: rate limited");

        let e = DispatchError::ContextFallbackFailed {
            model: "gpt-4.1".into(),
            source: ReasonerError::PayloadTooLarge("still too big".into()),
        };
        assert!(e.to_string().contains("gpt-4.1"));
    }

    #[test]
    fn test_skip_reason_display() {
        let r = SkipReason::LengthMismatch { outcomes: 2, prices: 3 };
        assert_eq!(r.to_string(), "2 outcomes but 3 prices");
    }
}
