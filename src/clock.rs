//! Monotonic time sources.
//!
//! The circuit breaker never spawns a timer: whether an `Open` state has
//! expired is decided by comparing the clock against the moment the breaker
//! opened. Anything implementing [`Clock`] can stand in for wall time, which
//! is how tests drive the breaker without sleeping (see
//! [`ManualClock`](crate::testing::ManualClock)).

use std::fmt;

use tokio::time::Instant;

/// A source of monotonic instants.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current instant.
    fn now(&self) -> Instant;

    /// Time elapsed since `earlier`, saturating at zero.
    fn elapsed_since(&self, earlier: Instant) -> std::time::Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// The default clock, backed by [`tokio::time::Instant`].
///
/// Because it reads tokio's clock, it also follows `tokio::time::pause`
/// and `tokio::time::advance` in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
