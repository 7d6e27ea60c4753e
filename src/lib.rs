//! Resilient multi-backend text generation client.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │              GENERATION CLIENT                    │
//!                    │                                                   │
//!   caller ──────────┼─▶ orchestrator ──▶ candidate selection            │
//!   (translator,     │        │           (preferred-first / rotation)   │
//!    tag extractor,  │        ▼                                          │
//!    content gen)    │   backend adapter ──▶ rate limiter (FIFO wait)    │
//!                    │        │          ──▶ circuit breaker gate        │
//!                    │        ▼                                          │
//!                    │   transport (hosted chat API / local Ollama)      │
//!                    │        │                                          │
//!   typed value ◀────┼── repair pipeline (structured output)             │
//!                    │                                                   │
//!                    │  cross-cutting: config, errors, stats, tracing    │
//!                    └──────────────────────────────────────────────────┘
//! ```
//!
//! Several independent callers share one orchestrator so circuit state,
//! rate limits and statistics are shared rather than duplicated. A call
//! fails over across backends up to a retry budget; callers treat a
//! surfaced error as "generation unavailable right now" and apply their
//! own fallback.

// Core subsystems
pub mod backend;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod repair;
pub mod resilience;

pub use backend::{BackendId, GenOptions, GenerationBackend, GenerationResult};
pub use config::RelayConfig;
pub use error::GenError;
pub use orchestrator::{Orchestrator, OrchestratorStats};
