//! Backend subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator picks a candidate
//!     → adapter.rs (limiter admission → breaker gate → bookkeeping)
//!     → hosted.rs / local.rs (transport with its own timeout)
//!     → GenerationResult, or an error fed back into the retry loop
//! ```
//!
//! # Design Decisions
//! - One adapter instance per configured backend, constructed once and
//!   shared; limiter/breaker state lives inside the adapter
//! - All hosted providers share one transport implementation; only the
//!   local adapter differs (no credential, repair-pipeline parsing)

pub mod adapter;
pub mod hosted;
pub mod id;
pub mod local;

pub use adapter::{
    estimate_tokens, AdapterCore, BackendStatsSnapshot, GenOptions, GenerationBackend,
    GenerationResult,
};
pub use hosted::HostedBackend;
pub use id::BackendId;
pub use local::LocalBackend;
