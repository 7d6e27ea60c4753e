//! Generation orchestrator.
//!
//! # Data Flow
//! ```text
//! caller → generate / generate_structured
//!     → candidate list (preferred-first, or round-robin rotation)
//!     → per candidate: breaker filter → adapter call
//!     → first success returns; failures consume the retry budget
//!     → exhaustion surfaces one aggregated error
//! ```
//!
//! # Design Decisions
//! - The orchestrator is the sole entry point for callers; they never see
//!   which backend served a request unless they look at the result
//! - The rotation cursor advances once per top-level call, not per retry,
//!   so uncorrelated calls spread load across backends
//! - Open circuits are filtered before attempting, so a skipped backend
//!   never consumes an attempt from the budget
//! - No overall wall-clock deadline across the retry loop; callers who
//!   need one impose it externally

pub mod stats;

use crate::backend::{
    BackendId, GenOptions, GenerationBackend, GenerationResult, HostedBackend, LocalBackend,
};
use crate::config::{validation::validate_config, RelayConfig};
use crate::error::GenError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub use stats::OrchestratorStats;

/// Entry point for all generation callers. Process-wide singleton in the
/// host application; tests construct isolated instances.
pub struct Orchestrator {
    /// Configured backends, ascending priority.
    backends: Vec<Arc<dyn GenerationBackend>>,
    /// Rotation cursor for round-robin selection.
    cursor: AtomicUsize,
    retry_budget: u32,
    total_calls: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    failed_attempts: AtomicU64,
}

impl Orchestrator {
    /// Build an orchestrator from configuration: one adapter per
    /// configured backend, priority order. Zero configured backends is a
    /// fatal construction error, not a per-call one.
    pub fn new(config: &RelayConfig) -> Result<Self, GenError> {
        validate_config(config).map_err(|errors| {
            GenError::InvalidConfig(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

        let mut backends: Vec<Arc<dyn GenerationBackend>> = Vec::new();
        if let Some(entry) = &config.backends.deepseek {
            backends.push(Arc::new(HostedBackend::new(
                BackendId::DeepSeek,
                entry,
                &config.transport,
            )));
        }
        if let Some(entry) = &config.backends.glm {
            backends.push(Arc::new(HostedBackend::new(
                BackendId::Glm,
                entry,
                &config.transport,
            )));
        }
        if let Some(entry) = &config.backends.qwen {
            backends.push(Arc::new(HostedBackend::new(
                BackendId::Qwen,
                entry,
                &config.transport,
            )));
        }
        if let Some(entry) = &config.backends.ollama {
            backends.push(Arc::new(LocalBackend::new(entry, &config.transport)));
        }

        for id in BackendId::ALL {
            if !backends.iter().any(|b| b.id() == id) {
                info!(backend = %id, "backend not configured, excluded from candidates");
            }
        }

        Self::with_backends(backends, config.orchestrator.retry_budget)
    }

    /// Build from pre-constructed adapters. This is the seam tests use to
    /// inject scripted backends.
    pub fn with_backends(
        mut backends: Vec<Arc<dyn GenerationBackend>>,
        retry_budget: u32,
    ) -> Result<Self, GenError> {
        if backends.is_empty() {
            return Err(GenError::NoBackends);
        }
        backends.sort_by_key(|b| b.id().priority());
        Ok(Self {
            backends,
            cursor: AtomicUsize::new(0),
            retry_budget: retry_budget.max(1),
            total_calls: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
        })
    }

    /// The process-wide shared orchestrator, built lazily from the
    /// environment on first use so circuit and statistics state is shared
    /// across all callers.
    pub fn shared() -> Result<Arc<Orchestrator>, GenError> {
        static SHARED: OnceLock<Mutex<Option<Arc<Orchestrator>>>> = OnceLock::new();
        let slot = SHARED.get_or_init(|| Mutex::new(None));
        let mut guard = slot.lock().expect("shared orchestrator mutex poisoned");
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }
        let orchestrator = Arc::new(Orchestrator::new(&RelayConfig::from_env())?);
        *guard = Some(orchestrator.clone());
        Ok(orchestrator)
    }

    /// Backends available to this orchestrator, in priority order.
    pub fn available_backends(&self) -> Vec<BackendId> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    /// Candidate order for one top-level call.
    ///
    /// A preferred backend that is actually available goes first,
    /// followed by the rest in priority order. Without a preference the
    /// priority list is rotated by the cursor.
    fn candidates(&self, preferred: Option<BackendId>) -> Vec<Arc<dyn GenerationBackend>> {
        if let Some(preferred) = preferred {
            if let Some(pos) = self.backends.iter().position(|b| b.id() == preferred) {
                let mut list = Vec::with_capacity(self.backends.len());
                list.push(self.backends[pos].clone());
                list.extend(
                    self.backends
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != pos)
                        .map(|(_, b)| b.clone()),
                );
                return list;
            }
            debug!(backend = %preferred, "preferred backend unavailable, falling back to rotation");
        }

        let offset = self.cursor.fetch_add(1, Ordering::Relaxed);
        let len = self.backends.len();
        (0..len)
            .map(|i| self.backends[(offset + i) % len].clone())
            .collect()
    }

    /// Generate free text, failing over across backends.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenOptions,
    ) -> Result<GenerationResult, GenError> {
        let call_id = Uuid::new_v4();
        let span = info_span!("generate", %call_id);
        async {
            self.run_failover(options, |backend| async move {
                backend.generate(prompt, options).await
            })
            .await
        }
        .instrument(span)
        .await
    }

    /// Generate structured output conforming to `schema_description`,
    /// deserialized into the caller's type.
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        schema_description: &str,
        options: &GenOptions,
    ) -> Result<T, GenError> {
        let value = self
            .generate_structured_value(prompt, schema_description, options)
            .await?;
        serde_json::from_value(value).map_err(GenError::Shape)
    }

    /// Structured generation returning the raw JSON value.
    pub async fn generate_structured_value(
        &self,
        prompt: &str,
        schema_description: &str,
        options: &GenOptions,
    ) -> Result<Value, GenError> {
        let call_id = Uuid::new_v4();
        let span = info_span!("generate_structured", %call_id);
        async {
            self.run_failover(options, |backend| async move {
                backend
                    .generate_structured(prompt, schema_description, options)
                    .await
            })
            .await
        }
        .instrument(span)
        .await
    }

    /// The cross-backend retry loop shared by both call shapes.
    async fn run_failover<T, F, Fut>(
        &self,
        options: &GenOptions,
        mut call: F,
    ) -> Result<T, GenError>
    where
        F: FnMut(Arc<dyn GenerationBackend>) -> Fut,
        Fut: std::future::Future<Output = Result<T, GenError>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let candidates = self.candidates(options.preferred_backend);
        let mut attempts = 0u32;
        let mut last_error: Option<GenError> = None;

        for backend in &candidates {
            if attempts >= self.retry_budget {
                break;
            }
            if backend.circuit_open() {
                debug!(backend = %backend.id(), "skipping backend with open circuit");
                continue;
            }

            attempts += 1;
            metrics::counter!("gen_requests_total", "backend" => backend.id().to_string())
                .increment(1);
            match call(backend.clone()).await {
                Ok(result) => {
                    self.succeeded.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("gen_success_total", "backend" => backend.id().to_string())
                        .increment(1);
                    return Ok(result);
                }
                Err(e) => {
                    // A breaker can open between the filter above and the
                    // adapter's own gate; that refusal costs no budget.
                    if !e.consumes_attempt() {
                        attempts -= 1;
                        debug!(backend = %backend.id(), error = %e, "backend refused without attempt");
                        last_error = Some(e);
                        continue;
                    }
                    warn!(backend = %backend.id(), attempt = attempts, error = %e, "backend attempt failed");
                    self.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("gen_failures_total", "backend" => backend.id().to_string())
                        .increment(1);
                    last_error = Some(e);
                }
            }
        }

        self.failed.fetch_add(1, Ordering::Relaxed);
        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no backend could be attempted".to_string());
        Err(GenError::Exhausted {
            attempts,
            last_error,
        })
    }

    /// Snapshot of orchestrator and per-backend counters.
    pub fn get_stats(&self) -> OrchestratorStats {
        let backends: Vec<_> = self.backends.iter().map(|b| b.stats()).collect();
        let total_cost = backends.iter().map(|s| s.cost).sum();
        OrchestratorStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            total_cost,
            backends,
        }
    }

    /// Zero every statistics counter. Circuit-breaker and rate-limiter
    /// state is deliberately untouched.
    pub fn reset_stats(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.succeeded.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.failed_attempts.store(0, Ordering::Relaxed);
        for backend in &self.backends {
            backend.reset_stats();
        }
    }
}
