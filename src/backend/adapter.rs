//! Backend adapter contract and shared per-backend bookkeeping.
//!
//! # Responsibilities
//! - Define the uniform `GenerationBackend` contract all backends implement
//! - Bundle the rate limiter, circuit breaker and usage counters every
//!   adapter wraps around its transport call
//! - Provide the structured-output default built on plain generation
//!
//! # Design Decisions
//! - No inheritance chain: shared behavior composes via an embedded
//!   `AdapterCore`, one per adapter, instead of a base class
//! - `generate_structured` returns `serde_json::Value`; the orchestrator's
//!   public API deserializes into the caller's type, keeping this trait
//!   object-safe
//! - Cost is accumulated in integer micro-dollars so counters stay atomic

use crate::backend::BackendId;
use crate::error::GenError;
use crate::repair;
use crate::resilience::{CircuitBreaker, RateLimiter};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-call generation options.
#[derive(Debug, Clone, Default)]
pub struct GenOptions {
    /// Sampling randomness; backend default when unset.
    pub temperature: Option<f32>,
    /// Response length ceiling in tokens.
    pub max_tokens: Option<u32>,
    /// Optional prefix instruction.
    pub system_prompt: Option<String>,
    /// Caller's backend hint; consumed by the orchestrator, not adapters.
    pub preferred_backend: Option<BackendId>,
}

/// One produced generation. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub backend: BackendId,
    pub model: String,
    /// Estimated token count (provider-reported when available).
    pub tokens: u64,
    /// Estimated cost in USD; zero for free backends.
    pub cost: f64,
}

/// Point-in-time usage counters for one adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendStatsSnapshot {
    pub backend: BackendId,
    pub requests: u64,
    pub failures: u64,
    pub tokens: u64,
    pub cost: f64,
}

/// Shared bookkeeping embedded in every adapter: the backend's rate
/// limiter, circuit breaker and usage counters, alive for the process
/// lifetime.
#[derive(Debug)]
pub struct AdapterCore {
    id: BackendId,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    requests: AtomicU64,
    failures: AtomicU64,
    tokens: AtomicU64,
    cost_micros: AtomicU64,
}

impl AdapterCore {
    /// Build the core for `id`, optionally overriding the declared
    /// requests-per-minute ceiling.
    pub fn new(id: BackendId, rpm_override: Option<u32>) -> Self {
        let rpm = rpm_override.unwrap_or_else(|| id.requests_per_minute());
        Self {
            id,
            limiter: RateLimiter::with_min_delay(
                rpm as usize,
                Duration::from_secs(60),
                id.min_request_gap(),
            ),
            breaker: CircuitBreaker::default(),
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            tokens: AtomicU64::new(0),
            cost_micros: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> BackendId {
        self.id
    }

    /// Rate-limiter admission followed by the circuit-breaker gate.
    /// Counts the attempt once admitted.
    pub async fn admit(&self) -> Result<(), GenError> {
        self.limiter.acquire().await;
        if self.breaker.is_open() {
            return Err(GenError::CircuitOpen(self.id));
        }
        self.requests.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn circuit_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// Record a successful transport call and its usage.
    pub fn record_success(&self, tokens: u64) -> f64 {
        self.breaker.record_success();
        self.tokens.fetch_add(tokens, Ordering::Relaxed);
        let cost = tokens as f64 / 1000.0 * self.id.cost_per_1k_tokens();
        self.cost_micros
            .fetch_add((cost * 1_000_000.0) as u64, Ordering::Relaxed);
        cost
    }

    /// Record a failed transport call.
    pub fn record_failure(&self) {
        self.breaker.record_failure();
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BackendStatsSnapshot {
        BackendStatsSnapshot {
            backend: self.id,
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            tokens: self.tokens.load(Ordering::Relaxed),
            cost: self.cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }

    /// Zero the usage counters. Breaker and limiter state are untouched.
    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.tokens.store(0, Ordering::Relaxed);
        self.cost_micros.store(0, Ordering::Relaxed);
    }
}

/// Rough token estimate for backends that do not report usage:
/// four characters per token, at least one for non-empty text.
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() as u64).div_ceil(4).max(1)
}

/// Uniform contract every backend variant implements.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Model identifier this adapter sends to the backend.
    fn model(&self) -> &str;

    /// Whether the adapter's circuit breaker currently refuses calls.
    fn circuit_open(&self) -> bool;

    fn stats(&self) -> BackendStatsSnapshot;

    /// Zero usage counters; resilience state is untouched.
    fn reset_stats(&self);

    /// One transport call: limiter admission, breaker gate, request,
    /// bookkeeping. Errors propagate to the orchestrator's retry loop.
    async fn generate(&self, prompt: &str, options: &GenOptions)
        -> Result<GenerationResult, GenError>;

    /// How this backend's free text becomes a structured value. Backends
    /// that reliably emit valid JSON use the strict fenced parse; the
    /// local adapter overrides this with the repair pipeline.
    fn parse_structured(&self, raw: &str) -> Result<Value, GenError> {
        repair::parse_fenced(raw).map_err(|e| GenError::ParseFailure {
            response_len: raw.len(),
            raw_prefix: raw.chars().take(200).collect(),
            light_error: e.to_string(),
            aggressive_error: "aggressive tier not attempted for this backend".to_string(),
        })
    }

    /// Structured output layered on `generate`: append the JSON-only
    /// instruction, then parse the response text.
    async fn generate_structured(
        &self,
        prompt: &str,
        schema_description: &str,
        options: &GenOptions,
    ) -> Result<Value, GenError> {
        let full_prompt = format!(
            "{prompt}\n\nRespond only with JSON matching this schema, no other text:\n{schema_description}"
        );
        let result = self.generate(&full_prompt, options).await?;
        self.parse_structured(&result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("ab"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_core_counts_attempts_and_outcomes() {
        let core = AdapterCore::new(BackendId::DeepSeek, Some(100));
        core.admit().await.unwrap();
        core.record_success(1000);
        core.admit().await.unwrap();
        core.record_failure();

        let snap = core.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.tokens, 1000);
        assert!((snap.cost - BackendId::DeepSeek.cost_per_1k_tokens()).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admit_refuses_when_circuit_open() {
        let core = AdapterCore::new(BackendId::Glm, Some(100));
        for _ in 0..3 {
            core.record_failure();
        }
        let err = core.admit().await.unwrap_err();
        assert!(matches!(err, GenError::CircuitOpen(BackendId::Glm)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_counters_not_breaker() {
        let core = AdapterCore::new(BackendId::Qwen, Some(100));
        for _ in 0..3 {
            core.record_failure();
        }
        core.reset();
        assert_eq!(core.snapshot().failures, 0);
        assert!(core.circuit_open(), "reset must not close the circuit");
    }
}
