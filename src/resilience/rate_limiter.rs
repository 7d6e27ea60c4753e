//! Sliding-window rate limiter with a minimum inter-request delay.
//!
//! # Responsibilities
//! - Admit at most `max_requests` calls per `window` against one backend
//! - Enforce a minimum gap between consecutive admissions
//! - Serve concurrent callers strictly in FIFO order
//!
//! # Design Decisions
//! - `acquire` never rejects; it only delays the caller
//! - One async mutex guards the whole admission loop and is held across
//!   the sleeps: tokio's mutex queues waiters fairly, which is exactly
//!   the FIFO guarantee the limiter needs, and it means admissions can
//!   never race each other past the window
//! - A small buffer is added to computed waits to avoid re-waking exactly
//!   on the window boundary and losing the race to the clock
//! - `max_requests == 0` means the backend is disabled: the caller parks
//!   forever instead of dividing by zero somewhere downstream

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{trace, warn};

const DEFAULT_BUFFER: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct LimiterState {
    /// Admission timestamps still inside the current window, oldest first.
    admissions: VecDeque<Instant>,
    /// When the most recent admission happened.
    last_admit: Option<Instant>,
    /// Total admissions over the limiter's lifetime.
    total_admitted: u64,
}

/// Shared per-backend rate limiter. One instance per backend, held for
/// the process lifetime.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    min_delay: Duration,
    buffer: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `window` with no
    /// minimum gap and the default boundary buffer.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self::with_min_delay(max_requests, window, Duration::ZERO)
    }

    /// Create a limiter that additionally enforces `min_delay` between
    /// consecutive admissions.
    pub fn with_min_delay(max_requests: usize, window: Duration, min_delay: Duration) -> Self {
        Self {
            max_requests,
            window,
            min_delay,
            buffer: DEFAULT_BUFFER,
            state: Mutex::new(LimiterState {
                admissions: VecDeque::new(),
                last_admit: None,
                total_admitted: 0,
            }),
        }
    }

    /// Override the boundary buffer (tests use zero for exact timing).
    pub fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    /// Wait until admitting one call would not violate the window or
    /// minimum-delay constraints, then record the admission.
    ///
    /// Callers are admitted strictly in the order they called `acquire`.
    pub async fn acquire(&self) {
        if self.max_requests == 0 {
            warn!("rate limiter configured with max_requests = 0; backend is disabled");
            std::future::pending::<()>().await;
            unreachable!();
        }

        // Holding the lock across the sleeps serializes admissions and
        // gives FIFO order via the mutex's fair wait queue.
        let mut state = self.state.lock().await;
        loop {
            let now = Instant::now();
            Self::prune(&mut state.admissions, now, self.window);

            if state.admissions.len() >= self.max_requests {
                // Oldest retained admission leaves the window first.
                let oldest = *state.admissions.front().unwrap_or(&now);
                let wait = self.window.saturating_sub(now - oldest) + self.buffer;
                trace!(wait_ms = wait.as_millis() as u64, "rate limit window full, waiting");
                sleep(wait).await;
                continue;
            }

            if !self.min_delay.is_zero() {
                if let Some(last) = state.last_admit {
                    let elapsed = now - last;
                    if elapsed < self.min_delay {
                        sleep(self.min_delay - elapsed).await;
                        continue;
                    }
                }
            }

            break;
        }

        let now = Instant::now();
        state.admissions.push_back(now);
        state.last_admit = Some(now);
        state.total_admitted += 1;
    }

    fn prune(admissions: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = admissions.front() {
            if now.duration_since(*oldest) >= window {
                admissions.pop_front();
            } else {
                break;
            }
        }
    }

    /// Total admissions since construction.
    pub async fn total_admitted(&self) -> u64 {
        self.state.lock().await.total_admitted
    }
}
