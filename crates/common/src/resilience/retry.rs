//! Retry executor with exponential backoff and cancellation
//!
//! The delay before retry `i` (0-based) is
//! `min(max_delay, initial_delay × backoff_factor^i)`, optionally jittered.
//! Every attempt and every wait is raced against a [`CancellationToken`], so
//! a cancelled caller never sits out a backoff.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Errors produced by [`RetryExecutor`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last error
    #[error("Retry exhausted after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },

    /// The policy refused to retry the most recent error
    #[error("Non-retryable error after {attempts} attempt(s): {source}")]
    NonRetryable { attempts: u32, source: E },

    #[error("Retry cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl<E> RetryError<E> {
    /// Attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::NonRetryable { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
            Self::InvalidConfiguration { .. } => 0,
        }
    }

    /// The last operation error, if any attempt ran to completion.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source, .. } => Some(source),
            Self::Cancelled { .. } | Self::InvalidConfiguration { .. } => None,
        }
    }
}

pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Decides whether a failed attempt should be retried.
pub trait RetryPolicy<E> {
    /// `attempt` is the 1-based number of the attempt that just failed.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the configured backoff
    Retry,
    /// Retry after a server-specified delay (e.g. `Retry-After`)
    RetryAfter(Duration),
    Stop,
}

/// Delay schedule between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    Fixed(Duration),
    Linear { initial_delay: Duration, increment: Duration },
    Exponential { initial_delay: Duration, factor: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Delay before retry `retry` (0 = the wait after the first failure).
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Linear { initial_delay, increment } => {
                initial_delay.saturating_add(increment.saturating_mul(retry))
            }
            BackoffStrategy::Exponential { initial_delay, factor, max_delay } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let scaled = initial_delay.as_nanos() as f64 * factor.powi(exponent);
                if !scaled.is_finite() || scaled >= max_delay.as_nanos() as f64 {
                    *max_delay
                } else {
                    Duration::from_nanos(scaled.max(0.0).round() as u64)
                }
            }
        }
    }
}

/// Randomization applied on top of the backoff delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    #[default]
    None,
    /// Uniform in `[0, delay]`
    Full,
    /// Uniform in `[delay / 2, delay]`
    Equal,
}

impl Jitter {
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Full => delay.mul_f64(rand::thread_rng().gen_range(0.0..=1.0)),
            Jitter::Equal => {
                let half = delay / 2;
                half + half.mul_f64(rand::thread_rng().gen_range(0.0..=1.0))
            }
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(100), Duration::from_secs(10), 2.0)
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Exponential backoff without jitter.
    pub fn exponential(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        factor: f64,
    ) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Exponential { initial_delay, factor, max_delay },
            jitter: Jitter::None,
        }
    }

    pub fn validate(&self) -> Result<(), RetryError<()>> {
        if self.max_attempts == 0 {
            return Err(RetryError::InvalidConfiguration {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }

        if let BackoffStrategy::Exponential { initial_delay, factor, max_delay } = &self.backoff {
            if *factor <= 0.0 || !factor.is_finite() {
                return Err(RetryError::InvalidConfiguration {
                    message: format!("backoff factor must be a positive number, got {factor}"),
                });
            }
            if max_delay < initial_delay {
                return Err(RetryError::InvalidConfiguration {
                    message: "max_delay must not be shorter than initial_delay".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Delay before retry `retry`, with jitter applied.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.jitter.apply(self.backoff.calculate_delay(retry))
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn linear_backoff(mut self, initial_delay: Duration, increment: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Linear { initial_delay, increment };
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        factor: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, factor, max_delay };
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryError<()>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Runs an operation until it succeeds, the policy stops it, attempts run
/// out, or the caller cancels.
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(RetryError::InvalidConfiguration { message }) = self.config.validate() {
            return Err(RetryError::InvalidConfiguration { message });
        }

        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                result = operation() => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(attempt, error = %error, "error is not retryable");
                    return Err(RetryError::NonRetryable { attempts: attempt, source: error });
                }
                _ if attempt >= self.config.max_attempts => {
                    warn!(attempts = attempt, error = %error, "retry attempts exhausted");
                    return Err(RetryError::Exhausted { attempts: attempt, source: error });
                }
                RetryDecision::Retry => self.config.delay_for(attempt - 1),
                RetryDecision::RetryAfter(delay) => delay,
            };

            warn!(attempt, ?delay, error = %error, "operation failed, retrying");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// One-shot convenience over [`RetryExecutor`].
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    config: RetryConfig,
    policy: P,
    cancel: &CancellationToken,
    operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: RetryPolicy<E>,
    E: fmt::Display,
{
    RetryExecutor::new(config, policy).execute(operation, cancel).await
}

/// Pre-defined retry policies
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Retries every error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Retries while `predicate(error)` holds
    #[derive(Debug, Clone, Copy)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E) -> bool,
    {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if (self.predicate)(error) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
