//! Composable retry and repeat policies.
//!
//! A [`Schedule<I, O>`] is a step function: it receives the latest input
//! (the value a repeated block produced, or the error a retried action
//! failed with) and answers with a [`Decision`]: either [`Decision::Done`],
//! or [`Decision::Continue`] with an output, a delay to wait before the next
//! attempt, and the schedule to consult next time.
//!
//! Schedules are plain values:
//!
//! - **Immutable**: stepping a schedule never changes it; counters and
//!   accumulators live in the `next` schedule a step hands back.
//! - **Composable**: combinators build new step functions out of existing
//!   ones, sequentially ([`Schedule::and_then`], [`Schedule::pipe`]) or in
//!   parallel ([`Schedule::and`], [`Schedule::or`]).
//! - **Inspectable**: a schedule can be stepped by hand, so policies are
//!   testable without running anything.
//!
//! # Quick Start
//!
//! ```rust
//! use breakwater::Schedule;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! // Exponential backoff, at most 3 retries.
//! let policy: Schedule<String, Duration> =
//!     Schedule::exponential(Duration::from_millis(1), 2.0).zip_left(Schedule::recurs(3));
//!
//! let mut calls = 0;
//! let result: Result<u32, String> = policy
//!     .retry(|| {
//!         calls += 1;
//!         let attempt = calls;
//!         async move {
//!             if attempt < 3 {
//!                 Err("transient".to_string())
//!             } else {
//!                 Ok(attempt)
//!             }
//!         }
//!     })
//!     .await;
//!
//! assert_eq!(result, Ok(3));
//! # });
//! ```
//!
//! # Generators
//!
//! | Constructor | Output | Delay |
//! |-------------|--------|-------|
//! | [`identity`](Schedule::identity) | the input | zero |
//! | [`recurs(n)`](Schedule::recurs) | step count, `Done(n)` on step `n + 1` | zero |
//! | [`spaced(d)`](Schedule::spaced) | step count | `d` |
//! | [`linear(base)`](Schedule::linear) | delay | `base * 1, base * 2, ...` |
//! | [`exponential(base, f)`](Schedule::exponential) | delay | `base * f^n` |
//! | [`fibonacci(one)`](Schedule::fibonacci) | delay | `one, one, 2 one, 3 one, 5 one, ...` |
//!
//! The delay generators never stop on their own; bound them with
//! [`Schedule::and`]/[`Schedule::zip_left`] against [`Schedule::recurs`],
//! or with a predicate via [`Schedule::check`].

mod combinators;
mod constructors;
mod decision;
mod driver;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use decision::Decision;

type StepFn<I, O> = dyn Fn(&I) -> Decision<I, O> + Send + Sync;

/// A retry/repeat policy: a step function from the latest input to a [`Decision`].
///
/// Cloning is cheap: the step function is shared behind an `Arc`.
pub struct Schedule<I, O> {
    step: Arc<StepFn<I, O>>,
}

impl<I, O> Schedule<I, O> {
    /// Build a schedule from a raw step function.
    ///
    /// Most schedules are assembled from the constructors and combinators;
    /// this is the escape hatch for policies they cannot express.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::{Decision, Schedule};
    /// use std::time::Duration;
    ///
    /// // Keep going while the input is positive, waiting that many millis.
    /// fn countdown() -> Schedule<u64, u64> {
    ///     Schedule::new(|n: &u64| {
    ///         if *n == 0 {
    ///             Decision::Done(0)
    ///         } else {
    ///             Decision::Continue {
    ///                 output: *n,
    ///                 delay: Duration::from_millis(*n),
    ///                 next: countdown(),
    ///             }
    ///         }
    ///     })
    /// }
    ///
    /// assert!(countdown().step(&0).is_done());
    /// assert_eq!(countdown().step(&5).delay(), Some(Duration::from_millis(5)));
    /// ```
    pub fn new<F>(step: F) -> Self
    where
        F: Fn(&I) -> Decision<I, O> + Send + Sync + 'static,
    {
        Schedule {
            step: Arc::new(step),
        }
    }

    /// Run one step of the schedule against `input`.
    pub fn step(&self, input: &I) -> Decision<I, O> {
        (self.step)(input)
    }
}

impl<I, O> Clone for Schedule<I, O> {
    fn clone(&self) -> Self {
        Schedule {
            step: Arc::clone(&self.step),
        }
    }
}

impl<I, O> fmt::Debug for Schedule<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("step", &"<function>")
            .finish()
    }
}

/// Multiply a duration by a floating factor, rounding to the nearest
/// nanosecond and saturating at both ends.
pub(crate) fn scale(duration: Duration, factor: f64) -> Duration {
    if factor.is_nan() || factor <= 0.0 {
        return Duration::ZERO;
    }
    let nanos = (duration.as_nanos() as f64 * factor).round();
    if nanos >= u64::MAX as f64 {
        Duration::from_nanos(u64::MAX)
    } else {
        Duration::from_nanos(nanos as u64)
    }
}

/// Multiply a duration by a step count, saturating instead of overflowing.
pub(crate) fn saturating_mul(duration: Duration, n: u64) -> Duration {
    let nanos = duration.as_nanos().saturating_mul(u128::from(n));
    u64::try_from(nanos)
        .map(Duration::from_nanos)
        .unwrap_or(Duration::from_nanos(u64::MAX))
}
