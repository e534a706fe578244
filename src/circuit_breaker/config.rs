use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::hooks::Hooks;
use super::{CircuitBreaker, ConfigError};
use crate::clock::{Clock, MonotonicClock};
use crate::schedule::scale;

/// How a closed breaker decides to open.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum OpeningStrategy {
    /// Open on the `max_failures + 1`-th consecutive failure.
    ///
    /// Any success resets the count.
    Count {
        /// Consecutive failures tolerated while staying closed.
        max_failures: u32,
    },
    /// Open when more than `max_failures` failures happened within `window`.
    ///
    /// Successes do not clear the window; old failures simply age out.
    /// A successful trial call that closes the breaker does clear it.
    SlidingWindow {
        /// How far back failures count.
        #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
        window: Duration,
        /// Failures tolerated within the window while staying closed.
        max_failures: u32,
    },
}

impl Default for OpeningStrategy {
    fn default() -> Self {
        OpeningStrategy::Count { max_failures: 5 }
    }
}

/// Circuit breaker configuration.
///
/// With the `serde` feature, durations are read and written in humantime
/// format:
///
/// ```toml
/// reset_timeout = "30s"
/// exponential_backoff_factor = 2.0
/// max_reset_timeout = "5m"
///
/// [opening_strategy]
/// kind = "count"
/// max_failures = 5
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CircuitBreakerConfig {
    /// When to open.
    #[cfg_attr(feature = "serde", serde(default))]
    pub opening_strategy: OpeningStrategy,

    /// How long the first open episode lasts.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub reset_timeout: Duration,

    /// Multiplier applied to the reset timeout each time a trial call fails.
    #[cfg_attr(feature = "serde", serde(default = "default_backoff_factor"))]
    pub exponential_backoff_factor: f64,

    /// Upper bound for the grown reset timeout; `None` means unbounded.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde", default))]
    pub max_reset_timeout: Option<Duration>,
}

fn default_backoff_factor() -> f64 {
    1.0
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            opening_strategy: OpeningStrategy::default(),
            reset_timeout: Duration::from_secs(60),
            exponential_backoff_factor: default_backoff_factor(),
            max_reset_timeout: None,
        }
    }
}

impl CircuitBreakerConfig {
    /// Check the configuration, reporting the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reset_timeout.is_zero() {
            return Err(ConfigError::ZeroResetTimeout);
        }
        let factor = self.exponential_backoff_factor;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ConfigError::InvalidBackoffFactor(factor));
        }
        if self.max_reset_timeout.is_some_and(|max| max.is_zero()) {
            return Err(ConfigError::ZeroMaxResetTimeout);
        }
        if let OpeningStrategy::SlidingWindow { window, .. } = self.opening_strategy {
            if window.is_zero() {
                return Err(ConfigError::ZeroWindow);
            }
        }
        Ok(())
    }

    /// The reset timeout after a failed trial of an episode that lasted `current`.
    pub fn next_reset_timeout(&self, current: Duration) -> Duration {
        let grown = scale(current, self.exponential_backoff_factor);
        match self.max_reset_timeout {
            Some(max) => grown.min(max),
            None => grown,
        }
    }
}

/// Builder for [`CircuitBreaker`].
///
/// Hooks registered here run synchronously on the calling task and must
/// not panic.
///
/// # Example
///
/// ```rust
/// use breakwater::CircuitBreaker;
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::builder()
///     .max_failures(3)
///     .reset_timeout(Duration::from_secs(10))
///     .exponential_backoff_factor(2.0)
///     .max_reset_timeout(Duration::from_secs(300))
///     .on_open(|| eprintln!("upstream unavailable"))
///     .build()
///     .unwrap();
///
/// assert!(breaker.state().is_closed());
/// ```
#[derive(Debug, Default)]
pub struct CircuitBreakerBuilder {
    config: CircuitBreakerConfig,
    clock: Option<Arc<dyn Clock>>,
    hooks: Hooks,
}

impl CircuitBreakerBuilder {
    /// A builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Open on the `max_failures + 1`-th consecutive failure.
    pub fn max_failures(mut self, max_failures: u32) -> Self {
        self.config.opening_strategy = OpeningStrategy::Count { max_failures };
        self
    }

    /// Open when more than `max_failures` failures happen within `window`.
    pub fn sliding_window(mut self, window: Duration, max_failures: u32) -> Self {
        self.config.opening_strategy = OpeningStrategy::SlidingWindow {
            window,
            max_failures,
        };
        self
    }

    /// Set the opening strategy directly.
    pub fn opening_strategy(mut self, strategy: OpeningStrategy) -> Self {
        self.config.opening_strategy = strategy;
        self
    }

    /// How long the first open episode lasts.
    pub fn reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.config.reset_timeout = reset_timeout;
        self
    }

    /// Multiply the reset timeout by `factor` after every failed trial call.
    pub fn exponential_backoff_factor(mut self, factor: f64) -> Self {
        self.config.exponential_backoff_factor = factor;
        self
    }

    /// Cap the grown reset timeout.
    pub fn max_reset_timeout(mut self, max: Duration) -> Self {
        self.config.max_reset_timeout = Some(max);
        self
    }

    /// Read time from `clock` instead of tokio's monotonic clock.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Call `hook` whenever a call is rejected.
    pub fn on_rejected<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_rejected.push(Arc::new(hook));
        self
    }

    /// Call `hook` whenever the breaker closes after a successful trial.
    pub fn on_closed<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_closed.push(Arc::new(hook));
        self
    }

    /// Call `hook` whenever the breaker lets a trial call through.
    pub fn on_half_open<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_half_open.push(Arc::new(hook));
        self
    }

    /// Call `hook` whenever the breaker opens.
    pub fn on_open<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.on_open.push(Arc::new(hook));
        self
    }

    /// Validate the configuration and build the breaker.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock));
        CircuitBreaker::from_parts(self.config, clock, self.hooks)
    }
}
