use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::OpeningStrategy;

/// A snapshot of a [`CircuitBreaker`](crate::CircuitBreaker)'s state.
///
/// States are immutable values; the breaker moves between them by swapping
/// the whole value atomically.
#[derive(Debug, Clone)]
pub enum State {
    /// Calls pass through; failures are tallied.
    Closed {
        /// Failures recorded since the breaker last closed or succeeded.
        failures: Failures,
    },
    /// Calls are rejected until `reset_timeout` has elapsed since `started_at`.
    Open {
        /// When the breaker opened.
        started_at: Instant,
        /// How long this episode stays open.
        reset_timeout: Duration,
        /// Completes when the breaker closes again.
        await_close: AwaitClose,
    },
    /// A single trial call is in flight; other calls are rejected.
    HalfOpen {
        /// The timeout of the open episode that led here.
        reset_timeout: Duration,
        /// Shared with the open episode that led here.
        await_close: AwaitClose,
    },
}

impl State {
    /// Returns `true` for [`State::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, State::Closed { .. })
    }

    /// Returns `true` for [`State::Open`].
    pub fn is_open(&self) -> bool {
        matches!(self, State::Open { .. })
    }

    /// Returns `true` for [`State::HalfOpen`].
    pub fn is_half_open(&self) -> bool {
        matches!(self, State::HalfOpen { .. })
    }

    /// The instant an open breaker allows its next trial call.
    ///
    /// `None` unless open, or when the deadline is past what an `Instant`
    /// can represent.
    pub fn expires_at(&self) -> Option<Instant> {
        match self {
            State::Open {
                started_at,
                reset_timeout,
                ..
            } => started_at.checked_add(*reset_timeout),
            _ => None,
        }
    }

    /// The reset timeout of the current open episode, if any.
    pub fn reset_timeout(&self) -> Option<Duration> {
        match self {
            State::Closed { .. } => None,
            State::Open { reset_timeout, .. } | State::HalfOpen { reset_timeout, .. } => {
                Some(*reset_timeout)
            }
        }
    }

    /// Number of failures tracked while closed; zero otherwise.
    pub fn failure_count(&self) -> usize {
        match self {
            State::Closed { failures } => failures.count(),
            _ => 0,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Closed { .. } => write!(f, "Closed"),
            State::Open { .. } => write!(f, "Open"),
            State::HalfOpen { .. } => write!(f, "HalfOpen"),
        }
    }
}

/// The failure tally of a closed breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failures {
    /// Consecutive failures, reset by any success.
    Consecutive(u32),
    /// Instants of the most recent failures, oldest first.
    Window(VecDeque<Instant>),
}

impl Failures {
    pub(crate) fn empty(strategy: &OpeningStrategy) -> Self {
        match strategy {
            OpeningStrategy::Count { .. } => Failures::Consecutive(0),
            OpeningStrategy::SlidingWindow { max_failures, .. } => {
                Failures::Window(VecDeque::with_capacity(retained(*max_failures)))
            }
        }
    }

    /// Number of failures currently tracked.
    pub fn count(&self) -> usize {
        match self {
            Failures::Consecutive(n) => *n as usize,
            Failures::Window(instants) => instants.len(),
        }
    }

    /// The tally after one more failure at `now`.
    pub(crate) fn record(&self, now: Instant, strategy: &OpeningStrategy) -> Self {
        match (self, strategy) {
            (Failures::Window(instants), OpeningStrategy::SlidingWindow { max_failures, .. }) => {
                let mut instants = instants.clone();
                instants.push_back(now);
                while instants.len() > retained(*max_failures) {
                    instants.pop_front();
                }
                Failures::Window(instants)
            }
            (Failures::Consecutive(n), _) => Failures::Consecutive(n.saturating_add(1)),
            (Failures::Window(_), OpeningStrategy::Count { .. }) => Failures::Consecutive(1),
        }
    }

    /// Whether this tally trips the breaker at `now`.
    pub(crate) fn should_open(&self, now: Instant, strategy: &OpeningStrategy) -> bool {
        match (self, strategy) {
            (Failures::Consecutive(n), OpeningStrategy::Count { max_failures }) => n > max_failures,
            (
                Failures::Window(instants),
                OpeningStrategy::SlidingWindow {
                    window,
                    max_failures,
                },
            ) => {
                instants.len() > *max_failures as usize
                    && instants
                        .front()
                        .is_some_and(|oldest| now.saturating_duration_since(*oldest) < *window)
            }
            _ => false,
        }
    }

    /// The tally after a success, or `None` when it does not change.
    pub(crate) fn after_success(&self) -> Option<Self> {
        match self {
            Failures::Consecutive(0) | Failures::Window(_) => None,
            Failures::Consecutive(_) => Some(Failures::Consecutive(0)),
        }
    }
}

fn retained(max_failures: u32) -> usize {
    (max_failures as usize).saturating_add(1)
}

/// Completion signal for one open episode.
///
/// Completed exactly once, when the breaker closes again. Any number of
/// tasks may wait on it; clones share the same signal.
#[derive(Clone)]
pub struct AwaitClose {
    signal: Arc<watch::Sender<bool>>,
}

impl AwaitClose {
    pub(crate) fn new() -> Self {
        let (signal, _) = watch::channel(false);
        AwaitClose {
            signal: Arc::new(signal),
        }
    }

    /// Whether the breaker has closed since this episode began.
    pub fn is_complete(&self) -> bool {
        *self.signal.borrow()
    }

    /// Wait until the breaker closes. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut closed = self.signal.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Whether `self` and `other` belong to the same open episode.
    pub fn same_episode(&self, other: &AwaitClose) -> bool {
        Arc::ptr_eq(&self.signal, &other.signal)
    }

    pub(crate) fn complete(&self) {
        self.signal.send_replace(true);
    }
}

impl fmt::Debug for AwaitClose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitClose")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_consecutive_opens_after_max_failures() {
        let strategy = OpeningStrategy::Count { max_failures: 2 };
        let now = Instant::now();

        let mut failures = Failures::empty(&strategy);
        for _ in 0..2 {
            failures = failures.record(now, &strategy);
            assert!(!failures.should_open(now, &strategy));
        }
        failures = failures.record(now, &strategy);

        assert!(failures.should_open(now, &strategy));
        assert_eq!(failures.count(), 3);
    }

    #[test]
    fn test_success_resets_consecutive_only() {
        assert_eq!(
            Failures::Consecutive(3).after_success(),
            Some(Failures::Consecutive(0))
        );
        assert_eq!(Failures::Consecutive(0).after_success(), None);
        assert_eq!(Failures::Window(VecDeque::new()).after_success(), None);
    }

    #[test]
    fn test_window_retains_most_recent_failures() {
        let strategy = OpeningStrategy::SlidingWindow {
            window: Duration::from_secs(1),
            max_failures: 1,
        };
        let base = Instant::now();

        let failures = Failures::empty(&strategy)
            .record(at(base, 0), &strategy)
            .record(at(base, 10), &strategy)
            .record(at(base, 20), &strategy);

        assert_eq!(
            failures,
            Failures::Window(VecDeque::from(vec![at(base, 10), at(base, 20)]))
        );
    }

    #[test]
    fn test_window_opens_only_when_failures_are_dense() {
        let strategy = OpeningStrategy::SlidingWindow {
            window: Duration::from_millis(100),
            max_failures: 2,
        };
        let base = Instant::now();

        let sparse = Failures::empty(&strategy)
            .record(at(base, 0), &strategy)
            .record(at(base, 80), &strategy)
            .record(at(base, 160), &strategy);
        assert!(!sparse.should_open(at(base, 160), &strategy));

        let dense = sparse.record(at(base, 170), &strategy);
        assert!(dense.should_open(at(base, 170), &strategy));
    }

    #[tokio::test]
    async fn test_await_close_wakes_all_waiters() {
        let signal = AwaitClose::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        assert!(!signal.is_complete());

        signal.complete();

        for waiter in waiters {
            waiter.await.unwrap();
        }
        assert!(signal.is_complete());
        signal.wait().await;
    }

    #[test]
    fn test_same_episode() {
        let first = AwaitClose::new();
        assert!(first.same_episode(&first.clone()));
        assert!(!first.same_episode(&AwaitClose::new()));
    }

    #[test]
    fn test_state_display() {
        let closed = State::Closed {
            failures: Failures::Consecutive(0),
        };
        let half_open = State::HalfOpen {
            reset_timeout: Duration::from_secs(1),
            await_close: AwaitClose::new(),
        };

        assert_eq!(closed.to_string(), "Closed");
        assert_eq!(half_open.to_string(), "HalfOpen");
        assert_eq!(half_open.reset_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(closed.failure_count(), 0);
    }
}
