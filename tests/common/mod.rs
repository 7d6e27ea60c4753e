//! Shared utilities for integration testing: scripted in-memory backends
//! driven by atomic counters, so orchestrator policy can be asserted
//! without any network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use textgen_relay::backend::{
    BackendId, BackendStatsSnapshot, GenOptions, GenerationBackend, GenerationResult,
};
use textgen_relay::GenError;

/// What a scripted backend does when called.
#[derive(Clone)]
pub enum Behavior {
    /// Always answer with this text.
    Succeed(String),
    /// Always fail with a transport error.
    Fail,
    /// Fail the first `n` calls, then succeed with the text.
    FailFirst(u64, String),
}

/// An in-memory backend whose behavior is scripted per test.
pub struct ScriptedBackend {
    id: BackendId,
    model: String,
    behavior: Behavior,
    circuit_open: AtomicBool,
    calls: AtomicU64,
    failures: AtomicU64,
    /// Shared across backends so tests can assert attempt order.
    call_log: Arc<Mutex<Vec<BackendId>>>,
}

impl ScriptedBackend {
    pub fn new(id: BackendId, behavior: Behavior, call_log: Arc<Mutex<Vec<BackendId>>>) -> Self {
        Self {
            id,
            model: format!("scripted-{id}"),
            behavior,
            circuit_open: AtomicBool::new(false),
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            call_log,
        }
    }

    /// Simulate a tripped circuit breaker.
    pub fn set_circuit_open(&self, open: bool) {
        self.circuit_open.store(open, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn circuit_open(&self) -> bool {
        self.circuit_open.load(Ordering::SeqCst)
    }

    fn stats(&self) -> BackendStatsSnapshot {
        BackendStatsSnapshot {
            backend: self.id,
            requests: self.calls.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
            tokens: 0,
            cost: 0.0,
        }
    }

    fn reset_stats(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.failures.store(0, Ordering::SeqCst);
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenOptions,
    ) -> Result<GenerationResult, GenError> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_log.lock().unwrap().push(self.id);

        let text = match &self.behavior {
            Behavior::Succeed(text) => text.clone(),
            Behavior::Fail => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                return Err(GenError::Transport {
                    backend: self.id,
                    message: "scripted transport failure".to_string(),
                });
            }
            Behavior::FailFirst(n, text) => {
                if call_index < *n {
                    self.failures.fetch_add(1, Ordering::SeqCst);
                    return Err(GenError::Transport {
                        backend: self.id,
                        message: "scripted transport failure".to_string(),
                    });
                }
                text.clone()
            }
        };

        Ok(GenerationResult {
            text,
            backend: self.id,
            model: self.model.clone(),
            tokens: 1,
            cost: 0.0,
        })
    }
}

/// Fresh shared call log for one test.
pub fn call_log() -> Arc<Mutex<Vec<BackendId>>> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Install the test log subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
