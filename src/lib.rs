//! # Breakwater
//!
//! > *"A breakwater doesn't stop the sea; it decides when the harbour sees it."*
//!
//! Composable retry schedules and a lock-free circuit breaker for async Rust.
//!
//! ## Two tools
//!
//! - [`Schedule`]: a retry/repeat policy as a plain value. Build one from
//!   generators ([`Schedule::recurs`], [`Schedule::exponential`], ...),
//!   combine them ([`Schedule::and`], [`Schedule::or`], [`Schedule::and_then`],
//!   [`Schedule::jittered_by`], ...) and run it with the async drivers
//!   ([`Schedule::retry`], [`Schedule::repeat`] and friends).
//! - [`CircuitBreaker`]: fails fast once a dependency looks unhealthy, lets a
//!   single trial call through after a reset timeout, and backs off
//!   exponentially while the dependency stays down.
//!
//! ## Quick Example
//!
//! ```rust
//! use breakwater::{CircuitBreaker, CircuitBreakerError, Schedule};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreaker::new(5, Duration::from_secs(30)).unwrap();
//!
//! // Retry transient failures with exponential backoff, at most 3 times.
//! let policy = Schedule::<CircuitBreakerError<String>, Duration>::exponential(
//!     Duration::from_millis(1),
//!     2.0,
//! )
//! .zip_left(Schedule::recurs(3))
//! // Retrying a rejected call only hammers the breaker.
//! .until_input(|error| error.is_rejected());
//!
//! let mut attempts = 0;
//! let body = policy
//!     .retry(|| {
//!         attempts += 1;
//!         let attempt = attempts;
//!         let breaker = breaker.clone();
//!         async move {
//!             breaker
//!                 .protect(|| async move {
//!                     if attempt < 2 {
//!                         Err("503 Service Unavailable".to_string())
//!                     } else {
//!                         Ok("200 OK")
//!                     }
//!                 })
//!                 .await
//!         }
//!     })
//!     .await;
//!
//! assert_eq!(body.unwrap(), "200 OK");
//! # });
//! ```
//!
//! ## Features
//!
//! - `jitter` (default): random jitter via `rand` ([`Schedule::jittered`]).
//! - `serde`: (de)serialize [`CircuitBreakerConfig`] with humantime durations.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod circuit_breaker;
pub mod clock;
pub mod either;
pub mod schedule;
pub mod testing;

// Re-exports
pub use circuit_breaker::{
    AwaitClose, CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig, CircuitBreakerError,
    ConfigError, ExecutionRejected, Failures, OpeningStrategy, State,
};
pub use clock::{Clock, MonotonicClock};
pub use either::Either;
pub use schedule::{Decision, Schedule};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::circuit_breaker::{
        CircuitBreaker, CircuitBreakerError, ExecutionRejected, OpeningStrategy,
    };
    pub use crate::clock::Clock;
    pub use crate::either::Either;
    pub use crate::schedule::{Decision, Schedule};
}
