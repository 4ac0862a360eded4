//! Generation-based circuit breaker
//!
//! The breaker tracks request outcomes in [`Counts`] that belong to a
//! *generation*. A new generation starts on every state change and, while
//! closed, every time the rolling `interval` elapses. Results that complete
//! after their generation ended are discarded, so a slow call that started
//! before the breaker opened cannot close it again.
//!
//! State machine:
//! - `Closed → Open` when `ready_to_trip(&counts)` returns true after a failure
//!   (default: at least `min_requests` requests and a failure ratio of at
//!   least `failure_ratio` inside the current window)
//! - `Open → HalfOpen` once `timeout` has elapsed since opening
//! - `HalfOpen` admits at most `max_requests` trial calls; any failure reopens
//!   the circuit, `success_threshold` consecutive successes close it

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::time::{Clock, SystemClock};

/// Configuration validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced by [`CircuitBreaker::execute`].
///
/// Generic over the wrapped operation's error so callers keep the original
/// failure when the call was actually attempted.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Rejected without invoking the operation
    #[error("Circuit breaker '{name}' is open")]
    CircuitOpen { name: String },

    /// Half-open trial budget exhausted; rejected without invoking the operation
    #[error("Circuit breaker '{name}' has no half-open trial slots left")]
    TooManyRequests { name: String },

    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Whether the breaker refused the call without running it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::TooManyRequests { .. })
    }

    /// The operation's own error, if it ran.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::OperationFailed { source } => Some(source),
            _ => None,
        }
    }
}

pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Request outcome counters for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    /// Failure ratio in `[0, 1]`; zero when no request has completed.
    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        f64::from(self.total_failures) / f64::from(self.requests)
    }

    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Custom trip predicate, evaluated after every failure while closed
pub type ReadyToTrip = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

/// Transition observer: `(name, from, to)`
pub type StateChangeListener = Arc<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

/// Circuit breaker configuration.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    /// Dependency name, used in errors, logs and transition callbacks
    pub name: String,
    /// Half-open trial budget
    pub max_requests: u32,
    /// Rolling window for closed-state counts; zero never clears them
    pub interval: Duration,
    /// Open → half-open cooldown
    pub timeout: Duration,
    pub min_requests: u32,
    pub failure_ratio: f64,
    /// Consecutive half-open successes required to close
    pub success_threshold: u32,
    pub ready_to_trip: Option<ReadyToTrip>,
    pub on_state_change: Option<StateChangeListener>,
}

impl fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("min_requests", &self.min_requests)
            .field("failure_ratio", &self.failure_ratio)
            .field("success_threshold", &self.success_threshold)
            .field("ready_to_trip", &self.ready_to_trip.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_requests: 3,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            min_requests: 5,
            failure_ratio: 0.5,
            success_threshold: 1,
            ready_to_trip: None,
            on_state_change: None,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid { message: "name must not be empty".to_string() });
        }

        if self.max_requests == 0 {
            return Err(ConfigError::Invalid {
                message: "max_requests must be greater than 0".to_string(),
            });
        }

        if self.success_threshold == 0 || self.success_threshold > self.max_requests {
            return Err(ConfigError::Invalid {
                message: format!(
                    "success_threshold must be in 1..={} (max_requests), got {}",
                    self.max_requests, self.success_threshold
                ),
            });
        }

        if !(self.failure_ratio > 0.0 && self.failure_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                message: format!("failure_ratio must be in (0, 1], got {}", self.failure_ratio),
            });
        }

        Ok(())
    }

    fn should_trip(&self, counts: &Counts) -> bool {
        match &self.ready_to_trip {
            Some(predicate) => predicate(counts),
            None => {
                counts.requests >= self.min_requests
                    && counts.failure_ratio() >= self.failure_ratio
            }
        }
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.config.max_requests = max_requests;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn min_requests(mut self, min_requests: u32) -> Self {
        self.config.min_requests = min_requests;
        self
    }

    pub fn failure_ratio(mut self, ratio: f64) -> Self {
        self.config.failure_ratio = ratio;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn ready_to_trip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        self.config.ready_to_trip = Some(Arc::new(predicate));
        self
    }

    pub fn on_state_change<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.config.on_state_change = Some(Arc::new(listener));
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Point-in-time view of a breaker, for health and metadata surfaces
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    pub generation: u64,
    pub counts: Counts,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    /// End of the closed window or of the open cooldown
    expiry: Option<Instant>,
}

type Transition = (CircuitState, CircuitState);

/// Circuit breaker guarding one logical dependency.
///
/// Cheap to clone; clones share state.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .field("counts", &inner.counts)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;

        let now = clock.now();
        let expiry = (!config.interval.is_zero()).then(|| now + config.interval);

        Ok(Self {
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            })),
            clock: Arc::new(clock),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, applying any time-based transition that is due.
    pub fn state(&self) -> CircuitState {
        let (state, transition) = {
            let mut inner = self.inner.lock();
            let transition = self.refresh(&mut inner, self.clock.now());
            (inner.state, transition)
        };
        self.notify(transition);
        state
    }

    pub fn counts(&self) -> Counts {
        let (counts, transition) = {
            let mut inner = self.inner.lock();
            let transition = self.refresh(&mut inner, self.clock.now());
            (inner.counts, transition)
        };
        self.notify(transition);
        counts
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let (metrics, transition) = {
            let mut inner = self.inner.lock();
            let transition = self.refresh(&mut inner, self.clock.now());
            let metrics = CircuitBreakerMetrics {
                name: self.config.name.clone(),
                state: inner.state,
                generation: inner.generation,
                counts: inner.counts,
            };
            (metrics, transition)
        };
        self.notify(transition);
        metrics
    }

    /// Run `operation` under breaker protection; every error counts as a
    /// failure.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.execute_filtered(operation, |_| true).await
    }

    /// Run `operation` under breaker protection, counting only the errors for
    /// which `is_failure` returns true. Other errors are returned to the
    /// caller but recorded as successes: the dependency answered.
    #[instrument(skip_all, fields(breaker = %self.config.name))]
    pub async fn execute_filtered<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        P: FnOnce(&E) -> bool,
    {
        let generation = self.before_request()?;
        let trial = TrialGuard { breaker: self, generation: Some(generation) };

        match operation().await {
            Ok(value) => {
                trial.complete(true);
                Ok(value)
            }
            Err(error) => {
                let failed = is_failure(&error);
                if failed {
                    debug!(error = %error, "operation failed");
                }
                trial.complete(!failed);
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Force the breaker back to a fresh closed generation.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            let now = self.clock.now();
            let transition = self.set_state(&mut inner, CircuitState::Closed, now);
            if transition.is_none() {
                self.new_generation(&mut inner, now);
            }
            transition
        };
        info!(breaker = %self.config.name, "circuit breaker manually reset");
        self.notify(transition);
    }

    fn before_request<E>(&self) -> ResilienceResult<u64, E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let (outcome, transition) = {
            let mut inner = self.inner.lock();
            let transition = self.refresh(&mut inner, self.clock.now());

            let outcome = match inner.state {
                CircuitState::Open => {
                    Err(ResilienceError::CircuitOpen { name: self.config.name.clone() })
                }
                CircuitState::HalfOpen if inner.counts.requests >= self.config.max_requests => {
                    Err(ResilienceError::TooManyRequests { name: self.config.name.clone() })
                }
                _ => {
                    inner.counts.on_request();
                    Ok(inner.generation)
                }
            };
            (outcome, transition)
        };
        self.notify(transition);

        if outcome.is_err() {
            debug!(breaker = %self.config.name, "circuit breaker rejected call");
        }
        outcome
    }

    fn after_request(&self, generation: u64, success: bool) {
        let transition = {
            let mut inner = self.inner.lock();
            let now = self.clock.now();
            let refreshed = self.refresh(&mut inner, now);

            if inner.generation != generation {
                refreshed
            } else if success {
                self.on_success(&mut inner, now).or(refreshed)
            } else {
                self.on_failure(&mut inner, now).or(refreshed)
            }
        };
        self.notify(transition);
    }

    fn on_success(&self, inner: &mut BreakerState, now: Instant) -> Option<Transition> {
        inner.counts.on_success();
        if inner.state == CircuitState::HalfOpen
            && inner.counts.consecutive_successes >= self.config.success_threshold
        {
            return self.set_state(inner, CircuitState::Closed, now);
        }
        None
    }

    fn on_failure(&self, inner: &mut BreakerState, now: Instant) -> Option<Transition> {
        inner.counts.on_failure();
        match inner.state {
            CircuitState::Closed if self.config.should_trip(&inner.counts) => {
                self.set_state(inner, CircuitState::Open, now)
            }
            CircuitState::HalfOpen => self.set_state(inner, CircuitState::Open, now),
            _ => None,
        }
    }

    /// Settle a request whose future was dropped or panicked before it
    /// produced an outcome. A half-open trial counts as a failure so the
    /// breaker reopens instead of holding the slot forever; a closed-state
    /// request only gives back its request count.
    fn abandon_request(&self, generation: u64) {
        let transition = {
            let mut inner = self.inner.lock();
            let now = self.clock.now();
            let refreshed = self.refresh(&mut inner, now);

            if inner.generation != generation {
                refreshed
            } else if inner.state == CircuitState::HalfOpen {
                self.on_failure(&mut inner, now).or(refreshed)
            } else {
                inner.counts.requests = inner.counts.requests.saturating_sub(1);
                refreshed
            }
        };
        debug!(breaker = %self.config.name, generation, "abandoned request released");
        self.notify(transition);
    }

    /// Apply time-driven transitions: window roll-over while closed and
    /// cooldown expiry while open.
    fn refresh(&self, inner: &mut BreakerState, now: Instant) -> Option<Transition> {
        match inner.state {
            CircuitState::Closed => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
                None
            }
            CircuitState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.set_state(inner, CircuitState::HalfOpen, now)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => None,
        }
    }

    fn set_state(
        &self,
        inner: &mut BreakerState,
        state: CircuitState,
        now: Instant,
    ) -> Option<Transition> {
        if inner.state == state {
            return None;
        }
        let from = inner.state;
        inner.state = state;
        self.new_generation(inner, now);
        Some((from, state))
    }

    fn new_generation(&self, inner: &mut BreakerState, now: Instant) {
        inner.generation = inner.generation.wrapping_add(1);
        inner.counts.clear();
        inner.expiry = match inner.state {
            CircuitState::Closed => {
                (!self.config.interval.is_zero()).then(|| now + self.config.interval)
            }
            CircuitState::Open => Some(now + self.config.timeout),
            CircuitState::HalfOpen => None,
        };
    }

    /// Log and publish a transition. Called with the state lock released so
    /// listeners may query the breaker.
    fn notify(&self, transition: Option<Transition>) {
        let Some((from, to)) = transition else {
            return;
        };

        match to {
            CircuitState::Open => {
                warn!(breaker = %self.config.name, %from, %to, "circuit breaker opened")
            }
            _ => info!(breaker = %self.config.name, %from, %to, "circuit breaker state changed"),
        }

        if let Some(listener) = &self.config.on_state_change {
            listener(&self.config.name, from, to);
        }
    }
}

/// Admission taken by `before_request`, settled exactly once.
struct TrialGuard<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    generation: Option<u64>,
}

impl<C: Clock> TrialGuard<'_, C> {
    fn complete(mut self, success: bool) {
        if let Some(generation) = self.generation.take() {
            self.breaker.after_request(generation, success);
        }
    }
}

impl<C: Clock> Drop for TrialGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(generation) = self.generation.take() {
            self.breaker.abandon_request(generation);
        }
    }
}
