//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to backend:
//!     → rate_limiter.rs (wait for admission: window, count, min delay)
//!     → circuit_breaker.rs (skip the call entirely if the circuit is open)
//!     → transport (own timeout; outcome feeds the breaker)
//! ```
//!
//! # Design Decisions
//! - One limiter and one breaker per backend, shared by every caller and
//!   alive for the process lifetime
//! - State is deliberately discarded on process restart; cooldowns are
//!   short relative to restart frequency
//! - The limiter delays, the breaker refuses; neither retries — retrying
//!   across backends is the orchestrator's job

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::CircuitBreaker;
pub use rate_limiter::RateLimiter;
