//! Per-client request rate limiting.
//!
//! The rate limiter keeps a sliding
//! [`RequestWindow`](crate::domain::window::RequestWindow) per client
//! identifier in a [`WindowStorage`] backend and decides whether each
//! request is admitted.
//! Infrastructure trouble never blocks a client: unreadable state, a panic
//! inside the backend, or an open circuit breaker all admit the request.

use crate::application::circuit_breaker::CircuitBreaker;
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, StorageError, WindowStorage};
use crate::domain::window::WindowDecision;
use std::panic;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rate limit settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per client within the timeframe
    pub max_requests: u32,
    /// Length of the sliding window in seconds
    pub timeframe_secs: u64,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, timeframe_secs: u64) -> Self {
        Self {
            max_requests,
            timeframe_secs,
        }
    }

    /// Rate limiting is off when either setting is zero.
    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0 && self.timeframe_secs > 0
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(10, 60)
    }
}

/// Decision about a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    /// Let the request through
    Admit,
    /// Refuse the request (HTTP 429)
    Reject,
}

impl LimitDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, LimitDecision::Admit)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, LimitDecision::Reject)
    }
}

impl From<WindowDecision> for LimitDecision {
    fn from(decision: WindowDecision) -> Self {
        match decision {
            WindowDecision::Admit => LimitDecision::Admit,
            WindowDecision::Reject => LimitDecision::Reject,
        }
    }
}

/// Coordinates rate limiting decisions.
#[derive(Debug, Clone)]
pub struct RateLimiter<S>
where
    S: WindowStorage + Clone,
{
    storage: S,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
    metrics: Metrics,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl<S> RateLimiter<S>
where
    S: WindowStorage + Clone,
{
    /// Create a new rate limiter with a default circuit breaker.
    ///
    /// # Arguments
    /// * `storage` - Backend holding one window per client
    /// * `clock` - Source of the current time for [`admit`](Self::admit)
    /// * `config` - Window size and request budget
    pub fn new(storage: S, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self {
            storage,
            clock,
            config,
            metrics: Metrics::new(),
            circuit_breaker: Arc::new(CircuitBreaker::new()),
        }
    }

    /// Replace the circuit breaker guarding the storage backend.
    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    /// Decide whether a request from `client` is admitted now.
    pub fn admit(&self, client: &str) -> LimitDecision {
        self.admit_at(client, self.clock.unix_seconds())
    }

    /// Decide whether a request from `client` at Unix time `now` is admitted.
    ///
    /// # Fail-Open Behavior
    /// Returns `Admit` without consulting the window when rate limiting is
    /// disabled, when the circuit breaker is open, when the backend reports
    /// an error, or when it panics.
    pub fn admit_at(&self, client: &str, now: i64) -> LimitDecision {
        if !self.config.is_enabled() {
            self.metrics.record_admitted();
            return LimitDecision::Admit;
        }

        if !self.circuit_breaker.allow_request() {
            self.metrics.record_failed_open();
            return LimitDecision::Admit;
        }

        let RateLimitConfig {
            max_requests,
            timeframe_secs,
        } = self.config;

        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.storage
                .admit_window(client, now, max_requests, timeframe_secs)
        }));

        let decision = match result {
            Ok(Ok(decision)) => {
                self.circuit_breaker.record_success();
                LimitDecision::from(decision)
            }
            Ok(Err(e)) => {
                self.circuit_breaker.record_failure();
                warn!(client = %client, error = %e, "rate limit state unavailable, admitting request");
                self.metrics.record_failed_open();
                return LimitDecision::Admit;
            }
            Err(_) => {
                self.circuit_breaker.record_failure();
                warn!(client = %client, "rate limit storage panicked, admitting request");
                self.metrics.record_failed_open();
                return LimitDecision::Admit;
            }
        };

        match decision {
            LimitDecision::Admit => self.metrics.record_admitted(),
            LimitDecision::Reject => {
                debug!(client = %client, max_requests, timeframe_secs, "rate limit exceeded");
                self.metrics.record_rejected();
            }
        }

        decision
    }

    /// Prune every tracked window and drop the ones left empty.
    ///
    /// Returns the number of clients removed.
    pub fn prune_idle(&self) -> Result<usize, StorageError> {
        if !self.config.is_enabled() {
            return Ok(0);
        }

        let now = self.clock.unix_seconds();
        let timeframe_secs = self.config.timeframe_secs;
        let before = self.storage.len()?;

        self.storage.retain(|_, window| {
            window.prune(now, timeframe_secs);
            !window.is_empty()
        })?;

        let after = self.storage.len()?;
        Ok(before.saturating_sub(after))
    }

    /// Number of clients with a stored window (including empty ones not yet swept).
    pub fn tracked_clients(&self) -> Result<usize, StorageError> {
        self.storage.len()
    }

    /// Get the rate limit settings.
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Get a reference to the storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Get a reference to the circuit breaker.
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }
}
