//! Testing utilities for schedules and circuit breakers.
//!
//! Schedules are pure values, so most policies can be tested by stepping them
//! by hand with [`steps`] and [`delays`]. Circuit breakers read time from a
//! [`Clock`](crate::Clock); [`ManualClock`] lets a test move time forward
//! explicitly instead of sleeping.
//!
//! # Examples
//!
//! ## Stepping a schedule
//!
//! ```rust
//! use breakwater::Schedule;
//! use breakwater::testing::delays;
//! use std::time::Duration;
//!
//! let schedule: Schedule<(), Duration> = Schedule::linear(Duration::from_millis(100));
//!
//! assert_eq!(
//!     delays(&schedule, &(), 3),
//!     vec![
//!         Duration::from_millis(100),
//!         Duration::from_millis(200),
//!         Duration::from_millis(300),
//!     ]
//! );
//! ```
//!
//! ## Assertion macros
//!
//! ```rust
//! use breakwater::{assert_continue, assert_done, Schedule};
//!
//! let schedule: Schedule<(), u64> = Schedule::recurs(1);
//!
//! let next = assert_continue!(schedule.step(&()));
//! assert_done!(next.step(&()));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::{Clock, Decision, Schedule};

/// A [`Clock`] that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// # Example
///
/// ```rust
/// use breakwater::testing::ManualClock;
/// use breakwater::Clock;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let clock = ManualClock::new();
/// let start = clock.now();
///
/// clock.advance(Duration::from_secs(30));
///
/// assert_eq!(clock.elapsed_since(start), Duration::from_secs(30));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        ManualClock {
            base: Instant::now(),
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Total time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

/// Step `schedule` with the same `input` until it is done or `limit` steps
/// were taken.
///
/// The returned decisions are in order; a `Done`, if reached, is the last one.
pub fn steps<I, O>(schedule: &Schedule<I, O>, input: &I, limit: usize) -> Vec<Decision<I, O>> {
    let mut decisions = Vec::with_capacity(limit);
    let mut current = schedule.clone();

    while decisions.len() < limit {
        let decision = current.step(input);
        match decision.next() {
            Some(next) => {
                current = next.clone();
                decisions.push(decision);
            }
            None => {
                decisions.push(decision);
                break;
            }
        }
    }
    decisions
}

/// The delays of the continuing steps among the first `limit` steps.
pub fn delays<I, O>(schedule: &Schedule<I, O>, input: &I, limit: usize) -> Vec<Duration> {
    steps(schedule, input, limit)
        .iter()
        .filter_map(Decision::delay)
        .collect()
}

/// Assert that a decision continues, evaluating to its `next` schedule.
///
/// # Example
///
/// ```rust
/// use breakwater::{assert_continue, Schedule};
///
/// let schedule: Schedule<(), u64> = Schedule::forever();
/// let next = assert_continue!(schedule.step(&()));
/// assert_continue!(next.step(&()));
/// ```
#[macro_export]
macro_rules! assert_continue {
    ($decision:expr) => {
        match $decision {
            $crate::Decision::Continue { next, .. } => next,
            $crate::Decision::Done(output) => {
                panic!("Expected Continue, got Done({:?})", output);
            }
        }
    };
}

/// Assert that a decision is done, evaluating to its output.
///
/// # Example
///
/// ```rust
/// use breakwater::{assert_done, Schedule};
///
/// let schedule: Schedule<(), u64> = Schedule::recurs(0);
/// assert_eq!(assert_done!(schedule.step(&())), 0);
/// ```
#[macro_export]
macro_rules! assert_done {
    ($decision:expr) => {
        match $decision {
            $crate::Decision::Done(output) => output,
            $crate::Decision::Continue { output, delay, .. } => {
                panic!(
                    "Expected Done, got Continue {{ output: {:?}, delay: {:?} }}",
                    output, delay
                );
            }
        }
    };
}

/// Assert that a protected call was rejected by the breaker, evaluating to
/// the [`ExecutionRejected`](crate::ExecutionRejected) error.
///
/// Accepts the result of either
/// [`protect`](crate::CircuitBreaker::protect) or
/// [`protect_either`](crate::CircuitBreaker::protect_either).
///
/// # Example
///
/// ```rust
/// use breakwater::{assert_rejected, CircuitBreaker};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let breaker = CircuitBreaker::new(0, Duration::from_secs(60)).unwrap();
///
/// let _ = breaker.protect(|| async { Err::<(), _>("boom") }).await;
///
/// let rejected = assert_rejected!(breaker.protect(|| async { Ok::<_, &str>(1) }).await);
/// assert!(rejected.state().is_open());
/// # });
/// ```
#[macro_export]
macro_rules! assert_rejected {
    ($result:expr) => {
        match $crate::circuit_breaker::IntoRejection::into_rejection($result) {
            Some(rejected) => rejected,
            None => panic!("Expected the circuit breaker to reject the call"),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_shared_time() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let clock = ManualClock::new();
            let handle = clock.clone();
            let start = clock.now();

            handle.advance(Duration::from_millis(1500));

            assert_eq!(clock.elapsed_since(start), Duration::from_millis(1500));
            assert_eq!(clock.elapsed(), Duration::from_millis(1500));
        });
    }

    #[test]
    fn test_steps_stops_at_done() {
        let schedule: Schedule<(), u64> = Schedule::recurs(2);
        let decisions = steps(&schedule, &(), 10);

        assert_eq!(decisions.len(), 3);
        assert!(decisions[2].is_done());
    }

    #[test]
    fn test_steps_respects_limit() {
        let schedule: Schedule<(), u64> = Schedule::forever();
        assert_eq!(steps(&schedule, &(), 4).len(), 4);
    }

    #[test]
    fn test_delays_skips_done() {
        let schedule: Schedule<(), u64> = Schedule::spaced(Duration::from_secs(1)).zip_left(Schedule::recurs(1));
        assert_eq!(delays(&schedule, &(), 10), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_assert_macros() {
        let schedule: Schedule<(), u64> = Schedule::recurs(1);
        let next = assert_continue!(schedule.step(&()));
        assert_eq!(assert_done!(next.step(&())), 1);
    }

    #[test]
    #[should_panic(expected = "Expected Done, got Continue")]
    fn test_assert_done_panics_on_continue() {
        let schedule: Schedule<(), u64> = Schedule::forever();
        assert_done!(schedule.step(&()));
    }

    #[test]
    #[should_panic(expected = "Expected Continue, got Done")]
    fn test_assert_continue_panics_on_done() {
        let schedule: Schedule<(), u64> = Schedule::recurs(0);
        assert_continue!(schedule.step(&()));
    }
}
