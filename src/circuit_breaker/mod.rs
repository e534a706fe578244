//! A lock-free circuit breaker.
//!
//! A [`CircuitBreaker`] wraps calls to an unreliable dependency and fails
//! fast once the dependency looks unhealthy:
//!
//! - **Closed**: calls pass through. Failures are tallied according to the
//!   [`OpeningStrategy`]; once it trips, the breaker opens.
//! - **Open**: calls are rejected with [`ExecutionRejected`] without running.
//!   After the reset timeout, the next call becomes a trial.
//! - **HalfOpen**: exactly one trial call is in flight; everything else is
//!   rejected. If the trial succeeds the breaker closes. If it fails, is
//!   cancelled or panics, the breaker opens again with the reset timeout
//!   multiplied by the backoff factor (capped by `max_reset_timeout`).
//!
//! The state lives in a single atomic cell and only changes by
//! compare-and-swap, so no lock is held while the protected operation runs.
//! Expiry of the open state is checked when a call arrives; no timer task
//! is spawned.
//!
//! # Example
//!
//! ```rust
//! use breakwater::{CircuitBreaker, CircuitBreakerError};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreaker::new(2, Duration::from_secs(30)).unwrap();
//!
//! for _ in 0..3 {
//!     let result = breaker.protect(|| async { Err::<(), _>("connection refused") }).await;
//!     assert!(matches!(result, Err(CircuitBreakerError::Operation("connection refused"))));
//! }
//!
//! // The third consecutive failure opened the breaker.
//! assert!(breaker.state().is_open());
//!
//! let result = breaker.protect(|| async { Ok::<_, &str>("never runs") }).await;
//! assert!(result.unwrap_err().is_rejected());
//! # });
//! ```

mod config;
mod error;
mod hooks;
mod state;

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

pub use config::{CircuitBreakerBuilder, CircuitBreakerConfig, OpeningStrategy};
pub use error::{CircuitBreakerError, ConfigError, ExecutionRejected, IntoRejection};
pub use state::{AwaitClose, Failures, State};

use crate::clock::Clock;
use hooks::Hooks;

/// A circuit breaker guarding calls to one dependency.
///
/// Clones share the same state, so a breaker can be handed to every task
/// that talks to the dependency.
#[derive(Clone)]
pub struct CircuitBreaker {
    state: Arc<ArcSwap<State>>,
    config: Arc<CircuitBreakerConfig>,
    clock: Arc<dyn Clock>,
    hooks: Arc<Hooks>,
}

impl CircuitBreaker {
    /// A breaker that opens on the `max_failures + 1`-th consecutive failure
    /// and stays open for `reset_timeout`.
    ///
    /// Uses a backoff factor of `1.0`, so the reset timeout never grows.
    pub fn new(max_failures: u32, reset_timeout: Duration) -> Result<Self, ConfigError> {
        Self::builder()
            .max_failures(max_failures)
            .reset_timeout(reset_timeout)
            .build()
    }

    /// Start building a breaker.
    pub fn builder() -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new()
    }

    /// Build a breaker from a configuration value.
    pub fn from_config(config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        CircuitBreakerBuilder::from_config(config).build()
    }

    pub(crate) fn from_parts(
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        hooks: Hooks,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let initial = State::Closed {
            failures: Failures::empty(&config.opening_strategy),
        };
        Ok(Self {
            state: Arc::new(ArcSwap::from_pointee(initial)),
            config: Arc::new(config),
            clock,
            hooks: Arc::new(hooks),
        })
    }

    /// The configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// A snapshot of the current state.
    ///
    /// An expired `Open` state is reported as `Open` until the next call
    /// arrives and turns it into a trial.
    pub fn state(&self) -> State {
        State::clone(&self.state.load())
    }

    /// Wait until the breaker is closed.
    ///
    /// Returns immediately when it already is. Otherwise completes when the
    /// current open episode ends with a successful trial; failed trials keep
    /// waiting.
    pub async fn await_close(&self) {
        let await_close = match &**self.state.load() {
            State::Closed { .. } => return,
            State::Open { await_close, .. } | State::HalfOpen { await_close, .. } => {
                await_close.clone()
            }
        };
        await_close.wait().await;
    }

    /// Run `op` through the breaker.
    ///
    /// The operation's own error comes back as
    /// [`CircuitBreakerError::Operation`]; a short-circuited call as
    /// [`CircuitBreakerError::Rejected`].
    pub async fn protect<T, E, F, Fut>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.protect_either(op).await {
            Ok(result) => result.map_err(CircuitBreakerError::Operation),
            Err(rejected) => Err(CircuitBreakerError::Rejected(rejected)),
        }
    }

    /// Run `op` through the breaker, keeping rejection and the operation's
    /// own outcome apart.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::CircuitBreaker;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let breaker = CircuitBreaker::new(5, Duration::from_secs(1)).unwrap();
    ///
    /// let outcome = breaker.protect_either(|| async { "42".parse::<u32>() }).await;
    ///
    /// assert_eq!(outcome.unwrap(), Ok(42));
    /// # });
    /// ```
    pub async fn protect_either<T, E, F, Fut>(
        &self,
        op: F,
    ) -> Result<Result<T, E>, ExecutionRejected>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        loop {
            let current = self.state.load_full();
            match &*current {
                State::Closed { .. } => {
                    let result = op().await;
                    match &result {
                        Ok(_) => self.record_success(),
                        Err(_) => self.record_failure(),
                    }
                    return Ok(result);
                }
                State::Open {
                    started_at,
                    reset_timeout,
                    await_close,
                } => {
                    let elapsed = self.clock.elapsed_since(*started_at);
                    if elapsed < *reset_timeout {
                        let remaining = *reset_timeout - elapsed;
                        return Err(self.reject(ExecutionRejected::open(
                            State::clone(&current),
                            remaining,
                        )));
                    }

                    let half_open = State::HalfOpen {
                        reset_timeout: *reset_timeout,
                        await_close: await_close.clone(),
                    };
                    if self.transition(&current, half_open) {
                        tracing::info!(
                            reset_timeout = ?reset_timeout,
                            "circuit breaker half-open, running trial call"
                        );
                        return Ok(self
                            .attempt_reset(op, *reset_timeout, await_close.clone())
                            .await);
                    }
                    // Another caller won the trial; look again.
                }
                State::HalfOpen { .. } => {
                    return Err(self.reject(ExecutionRejected::half_open(State::clone(&current))));
                }
            }
        }
    }

    /// Register a hook called on every rejected call.
    ///
    /// The returned breaker shares state with `self`; only the hooks differ.
    /// Hooks run synchronously on the calling task and must not panic.
    pub fn do_on_rejected<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.hooks).on_rejected.push(Arc::new(hook));
        self
    }

    /// Register a hook called whenever the breaker closes.
    pub fn do_on_closed<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.hooks).on_closed.push(Arc::new(hook));
        self
    }

    /// Register a hook called whenever a trial call is let through.
    pub fn do_on_half_open<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.hooks).on_half_open.push(Arc::new(hook));
        self
    }

    /// Register a hook called whenever the breaker opens.
    pub fn do_on_open<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.hooks).on_open.push(Arc::new(hook));
        self
    }

    async fn attempt_reset<T, E, F, Fut>(
        &self,
        op: F,
        reset_timeout: Duration,
        await_close: AwaitClose,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let trial = Trial {
            breaker: self,
            reset_timeout,
            await_close,
            settled: false,
        };
        self.hooks.half_open();

        let result = op().await;
        if result.is_ok() {
            trial.succeed();
        }
        // A failed trial reopens the breaker when `trial` drops.
        result
    }

    fn record_success(&self) {
        loop {
            let current = self.state.load_full();
            let State::Closed { failures } = &*current else {
                return;
            };
            let Some(reset) = failures.after_success() else {
                return;
            };
            if self.transition(&current, State::Closed { failures: reset }) {
                return;
            }
        }
    }

    fn record_failure(&self) {
        let strategy = &self.config.opening_strategy;
        loop {
            let current = self.state.load_full();
            let State::Closed { failures } = &*current else {
                return;
            };

            let now = self.clock.now();
            let failures = failures.record(now, strategy);
            let count = failures.count();

            if failures.should_open(now, strategy) {
                let open = State::Open {
                    started_at: now,
                    reset_timeout: self.config.reset_timeout,
                    await_close: AwaitClose::new(),
                };
                if self.transition(&current, open) {
                    tracing::warn!(
                        failures = count,
                        reset_timeout = ?self.config.reset_timeout,
                        "circuit breaker opened"
                    );
                    self.hooks.opened();
                    return;
                }
            } else if self.transition(&current, State::Closed { failures }) {
                tracing::debug!(failures = count, "circuit breaker recorded failure");
                return;
            }
        }
    }

    fn reject(&self, rejected: ExecutionRejected) -> ExecutionRejected {
        tracing::debug!(
            state = %rejected.state(),
            remaining = ?rejected.remaining(),
            "circuit breaker rejected call"
        );
        self.hooks.rejected();
        rejected
    }

    /// Swap in `next` if the cell still holds `current`.
    fn transition(&self, current: &Arc<State>, next: State) -> bool {
        let previous = self.state.compare_and_swap(current, Arc::new(next));
        Arc::ptr_eq(current, &previous)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &**self.state.load())
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Owns the half-open state for the duration of one trial call.
///
/// Unless the trial is marked successful, dropping it reopens the breaker.
/// That covers failures, cancellation of the calling future, and panics.
struct Trial<'a> {
    breaker: &'a CircuitBreaker,
    reset_timeout: Duration,
    await_close: AwaitClose,
    settled: bool,
}

impl Trial<'_> {
    fn succeed(mut self) {
        self.settled = true;
        let breaker = self.breaker;
        breaker.state.store(Arc::new(State::Closed {
            failures: Failures::empty(&breaker.config.opening_strategy),
        }));
        self.await_close.complete();
        tracing::info!("circuit breaker closed");
        breaker.hooks.closed();
    }
}

impl Drop for Trial<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let breaker = self.breaker;
        let reset_timeout = breaker.config.next_reset_timeout(self.reset_timeout);
        breaker.state.store(Arc::new(State::Open {
            started_at: breaker.clock.now(),
            reset_timeout,
            await_close: self.await_close.clone(),
        }));
        tracing::warn!(reset_timeout = ?reset_timeout, "circuit breaker reopened after failed trial");
        if std::thread::panicking() {
            // A second panic while unwinding would abort the process.
            let hooks = &breaker.hooks;
            if panic::catch_unwind(AssertUnwindSafe(|| hooks.opened())).is_err() {
                tracing::error!("on_open hook panicked while a trial was unwinding");
            }
        } else {
            breaker.hooks.opened();
        }
    }
}
