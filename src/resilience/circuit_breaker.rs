//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls are skipped without being attempted
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= threshold
//! Open → Closed: cooldown elapsed, discovered lazily on the next is_open()
//! any → Closed: a single recorded success
//! ```
//!
//! # Design Decisions
//! - Per-backend breaker (not global)
//! - Lazy query-time cooldown evaluation instead of a background timer:
//!   the breaker only needs wall-clock time, no scheduling
//! - Failures must be consecutive; one success resets the count

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Per-backend failure gate. One instance per backend, process lifetime.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            state: Mutex::new(BreakerState {
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Whether calls should currently be refused.
    ///
    /// Auto-closes once the cooldown has elapsed; that is the only side
    /// effect this query has.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        match state.opened_at {
            None => false,
            Some(opened) => {
                if opened.elapsed() >= self.cooldown {
                    info!("circuit cooldown elapsed, closing");
                    state.opened_at = None;
                    state.consecutive_failures = 0;
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Clear the failure count and close the circuit immediately.
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    /// Count one failure; trips the circuit at the threshold.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker mutex poisoned");
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold && state.opened_at.is_none() {
            warn!(
                failures = state.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "failure threshold reached, opening circuit"
            );
            state.opened_at = Some(Instant::now());
        }
    }

    /// Current consecutive-failure count (for stats and tests).
    pub fn consecutive_failures(&self) -> u32 {
        self.state
            .lock()
            .expect("circuit breaker mutex poisoned")
            .consecutive_failures
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_trips_after_threshold() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(600));
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open(), "two failures must not trip a threshold of 3");
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_count() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(600));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open(), "failures were not consecutive");
        assert_eq!(cb.consecutive_failures(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_closes_open_circuit() {
        let cb = CircuitBreaker::new(1, Duration::from_secs(600));
        cb.record_failure();
        assert!(cb.is_open());
        cb.record_success();
        assert!(!cb.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_closes_lazily() {
        let cb = CircuitBreaker::new(1, Duration::from_secs(600));
        cb.record_failure();
        assert!(cb.is_open());

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(!cb.is_open(), "cooldown elapsed, must self-close");
        assert_eq!(cb.consecutive_failures(), 0, "counter cleared on close");
    }
}
