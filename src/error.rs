//! Failure taxonomy for the generation client.
//!
//! # Design Decisions
//! - One enum for the whole subsystem; callers match on variants, not strings
//! - Configuration problems are fatal at construction, everything else is
//!   recoverable inside the orchestrator's retry loop
//! - Parse failures carry enough of the raw response for offline diagnosis
//!   without re-calling the backend

use crate::backend::BackendId;
use thiserror::Error;

/// Errors surfaced by adapters and the orchestrator.
#[derive(Debug, Error)]
pub enum GenError {
    /// No backend has credentials or an endpoint configured.
    /// Fatal at orchestrator construction, never per call.
    #[error("no generation backend is configured")]
    NoBackends,

    /// Invalid configuration value (bad endpoint URL, zero retry budget).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The backend has no credential/endpoint and cannot be called.
    #[error("backend {0} is not configured")]
    NotConfigured(BackendId),

    /// The backend's circuit breaker is open; the call was not attempted.
    #[error("backend {0} circuit is open")]
    CircuitOpen(BackendId),

    /// Network/HTTP-level failure, including timeouts.
    #[error("transport failure on {backend}: {message}")]
    Transport { backend: BackendId, message: String },

    /// The backend answered with a non-success HTTP status.
    #[error("backend {backend} returned HTTP {status}: {body}")]
    BackendStatus {
        backend: BackendId,
        status: u16,
        body: String,
    },

    /// Response text did not yield valid structured output, even after
    /// the repair pipeline ran both tiers.
    #[error(
        "structured output parse failed ({response_len} bytes): light: {light_error}; aggressive: {aggressive_error}"
    )]
    ParseFailure {
        /// Length of the raw response text.
        response_len: usize,
        /// Prefix of the raw text, for diagnosis.
        raw_prefix: String,
        /// Parser error from the light tier.
        light_error: String,
        /// Parser error from the aggressive tier.
        aggressive_error: String,
    },

    /// The parsed value did not match the caller's expected shape.
    #[error("structured output did not match expected shape: {0}")]
    Shape(#[from] serde_json::Error),

    /// All candidates tried or the retry budget was consumed.
    #[error("generation failed after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl GenError {
    /// Whether this error should count against the retry budget.
    /// Circuit-open candidates are filtered before being attempted, so
    /// they never consume an attempt.
    pub fn consumes_attempt(&self) -> bool {
        !matches!(self, GenError::CircuitOpen(_) | GenError::NotConfigured(_))
    }
}
