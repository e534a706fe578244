//! Errors produced by the circuit breaker.

use std::time::Duration;

use super::State;

/// A call short-circuited by the breaker; the operation was never invoked.
///
/// # Example
///
/// ```rust
/// use breakwater::{CircuitBreaker, CircuitBreakerError};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let breaker = CircuitBreaker::new(0, Duration::from_secs(30)).unwrap();
/// let _ = breaker.protect(|| async { Err::<(), _>("refused") }).await;
///
/// match breaker.protect(|| async { Ok::<_, &str>(()) }).await {
///     Err(CircuitBreakerError::Rejected(rejected)) => {
///         assert!(rejected.state().is_open());
///         assert!(rejected.remaining().unwrap() <= Duration::from_secs(30));
///         assert!(rejected.to_string().contains("Open state"));
///     }
///     other => panic!("expected a rejection, got {:?}", other),
/// }
/// # });
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct ExecutionRejected {
    reason: String,
    state: State,
    remaining: Option<Duration>,
}

impl ExecutionRejected {
    pub(crate) fn open(state: State, remaining: Duration) -> Self {
        Self {
            reason: format!(
                "Rejected because the CircuitBreaker is in the Open state, attempting to close in {} millis",
                remaining.as_millis()
            ),
            state,
            remaining: Some(remaining),
        }
    }

    pub(crate) fn half_open(state: State) -> Self {
        Self {
            reason: "Rejected because the CircuitBreaker is in the HalfOpen state".to_string(),
            state,
            remaining: None,
        }
    }

    /// Human-readable reason for the rejection.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The state the breaker was observed in.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Estimated time until the breaker lets a trial call through.
    ///
    /// `None` while a trial call is already in flight.
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }
}

/// The outcome of a failed [`protect`](super::CircuitBreaker::protect) call.
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The breaker short-circuited the call.
    #[error(transparent)]
    Rejected(#[from] ExecutionRejected),
    /// The operation ran and failed with its own error.
    #[error("{0}")]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns `true` if the breaker short-circuited the call.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CircuitBreakerError::Rejected(_))
    }

    /// The rejection, if the breaker short-circuited the call.
    pub fn rejected(&self) -> Option<&ExecutionRejected> {
        match self {
            CircuitBreakerError::Rejected(rejected) => Some(rejected),
            CircuitBreakerError::Operation(_) => None,
        }
    }

    /// The operation's own error, if it ran and failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            CircuitBreakerError::Rejected(_) => None,
            CircuitBreakerError::Operation(error) => Some(error),
        }
    }
}

/// Invalid circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// `reset_timeout` was zero.
    #[error("reset timeout must be greater than zero")]
    ZeroResetTimeout,
    /// The backoff factor was zero, negative or not finite.
    #[error("exponential backoff factor must be positive and finite, got {0}")]
    InvalidBackoffFactor(f64),
    /// `max_reset_timeout` was zero.
    #[error("max reset timeout must be greater than zero")]
    ZeroMaxResetTimeout,
    /// The sliding window was zero.
    #[error("sliding window must be greater than zero")]
    ZeroWindow,
}

/// Extract the rejection from the result of a protected call.
///
/// Implemented for the results of both
/// [`protect`](super::CircuitBreaker::protect) and
/// [`protect_either`](super::CircuitBreaker::protect_either); used by
/// [`assert_rejected!`](crate::assert_rejected).
pub trait IntoRejection {
    /// The rejection, or `None` if the operation ran.
    fn into_rejection(self) -> Option<ExecutionRejected>;
}

impl<T, E> IntoRejection for Result<T, CircuitBreakerError<E>> {
    fn into_rejection(self) -> Option<ExecutionRejected> {
        match self {
            Err(CircuitBreakerError::Rejected(rejected)) => Some(rejected),
            _ => None,
        }
    }
}

impl<T, E> IntoRejection for Result<Result<T, E>, ExecutionRejected> {
    fn into_rejection(self) -> Option<ExecutionRejected> {
        self.err()
    }
}
