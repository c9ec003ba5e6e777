//! # Circuit Breaker Module
//!
//! Circuit breaker guarding calls to the commerce backend. When the backend
//! fails repeatedly the breaker opens and calls fail fast with
//! `GatewayUnavailable` until the reset window elapses. The breaker never
//! retries anything itself.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::GatewayConfig;

/// Circuit breaker for backend calls
///
/// # State Machine
///
/// - **Closed**: Normal operation, requests pass through
/// - **Open**: Failure threshold exceeded, requests fail fast
/// - **Half-Open**: Reset window elapsed, the next request is let through
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_count: Mutex<u32>,
    last_failure_time: Mutex<Option<Instant>>,
    threshold: u32,
    reset_after: Duration,
}

impl CircuitBreaker {
    /// Create a new circuit breaker from the gateway configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pizzeria_bot::config::GatewayConfig;
    /// use pizzeria_bot::circuit_breaker::CircuitBreaker;
    ///
    /// let circuit_breaker = CircuitBreaker::new(&GatewayConfig::default());
    /// assert!(!circuit_breaker.is_open());
    /// ```
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            failure_count: Mutex::new(0),
            last_failure_time: Mutex::new(None),
            threshold: config.circuit_breaker_threshold,
            reset_after: Duration::from_secs(config.circuit_breaker_reset_secs),
        }
    }

    /// Check if the circuit is open (blocking requests)
    ///
    /// Resets to closed automatically once the reset window has elapsed.
    pub fn is_open(&self) -> bool {
        let mut failure_count = self
            .failure_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut last_failure = self
            .last_failure_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if *failure_count >= self.threshold {
            if let Some(last_time) = *last_failure {
                if last_time.elapsed() < self.reset_after {
                    return true;
                }
                *failure_count = 0;
                *last_failure = None;
            }
        }
        false
    }

    /// Record a failed backend call
    pub fn record_failure(&self) {
        *self
            .failure_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        *self
            .last_failure_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    /// Record a successful backend call, closing the circuit
    pub fn record_success(&self) {
        *self
            .failure_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = 0;
        *self
            .last_failure_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}
