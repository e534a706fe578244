//! Integration tests for the circuit breaker lifecycle.
//!
//! These drive a breaker through whole open/half-open/closed episodes the
//! way a service would: shared between tasks, configured from a config
//! value, and observed through hooks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use breakwater::testing::ManualClock;
use breakwater::{
    assert_rejected, CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig,
    CircuitBreakerError, Clock, OpeningStrategy,
};
use futures::future::join_all;

#[derive(Debug, Clone, PartialEq)]
enum UpstreamError {
    Unavailable,
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream unavailable")
    }
}

/// A fake dependency whose health the test flips.
#[derive(Clone, Default)]
struct Upstream {
    healthy: Arc<std::sync::atomic::AtomicBool>,
    calls: Arc<AtomicU32>,
}

impl Upstream {
    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn call(&self) -> Result<&'static str, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok("pong")
        } else {
            Err(UpstreamError::Unavailable)
        }
    }
}

async fn call_through(
    breaker: &CircuitBreaker,
    upstream: &Upstream,
) -> Result<&'static str, CircuitBreakerError<UpstreamError>> {
    breaker.protect(|| upstream.call()).await
}

// ============================================================================
// Full lifecycle
// ============================================================================

#[tokio::test]
async fn breaker_recovers_after_outage_with_backoff() {
    let clock = ManualClock::new();
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let record = |name: &'static str| {
        let events = events.clone();
        move || events.lock().unwrap().push(name)
    };

    let breaker = CircuitBreaker::builder()
        .max_failures(2)
        .reset_timeout(Duration::from_secs(5))
        .exponential_backoff_factor(2.0)
        .max_reset_timeout(Duration::from_secs(15))
        .clock(clock.clone())
        .on_open(record("open"))
        .on_half_open(record("half_open"))
        .on_closed(record("closed"))
        .build()
        .unwrap();
    let upstream = Upstream::default();

    // Outage: three failures open the breaker.
    for _ in 0..3 {
        assert!(matches!(
            call_through(&breaker, &upstream).await,
            Err(CircuitBreakerError::Operation(UpstreamError::Unavailable))
        ));
    }
    assert!(breaker.state().is_open());

    // Calls are short-circuited while open.
    let rejected = assert_rejected!(call_through(&breaker, &upstream).await);
    assert_eq!(rejected.remaining(), Some(Duration::from_secs(5)));
    assert_eq!(upstream.calls(), 3);

    // First trial fails: the reset timeout doubles.
    clock.advance(Duration::from_secs(5));
    call_through(&breaker, &upstream).await.unwrap_err();
    assert_eq!(breaker.state().reset_timeout(), Some(Duration::from_secs(10)));

    // Second trial fails: capped at 15s.
    clock.advance(Duration::from_secs(10));
    call_through(&breaker, &upstream).await.unwrap_err();
    assert_eq!(breaker.state().reset_timeout(), Some(Duration::from_secs(15)));

    // Upstream recovers; the next trial closes the breaker.
    upstream.set_healthy(true);
    clock.advance(Duration::from_secs(15));
    assert_eq!(call_through(&breaker, &upstream).await.unwrap(), "pong");
    assert!(breaker.state().is_closed());
    assert_eq!(breaker.state().failure_count(), 0);

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "open",
            "half_open",
            "open",
            "half_open",
            "open",
            "half_open",
            "closed"
        ]
    );
}

#[tokio::test]
async fn closing_resets_backoff_for_the_next_outage() {
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder()
        .max_failures(0)
        .reset_timeout(Duration::from_secs(1))
        .exponential_backoff_factor(3.0)
        .clock(clock.clone())
        .build()
        .unwrap();
    let upstream = Upstream::default();

    call_through(&breaker, &upstream).await.unwrap_err();
    clock.advance(Duration::from_secs(1));
    call_through(&breaker, &upstream).await.unwrap_err();
    assert_eq!(breaker.state().reset_timeout(), Some(Duration::from_secs(3)));

    upstream.set_healthy(true);
    clock.advance(Duration::from_secs(3));
    call_through(&breaker, &upstream).await.unwrap();

    upstream.set_healthy(false);
    call_through(&breaker, &upstream).await.unwrap_err();
    assert_eq!(breaker.state().reset_timeout(), Some(Duration::from_secs(1)));
}

// ============================================================================
// Sharing between tasks
// ============================================================================

#[tokio::test]
async fn clones_share_state_across_tasks() {
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder()
        .max_failures(3)
        .reset_timeout(Duration::from_secs(30))
        .clock(clock.clone())
        .build()
        .unwrap();
    let upstream = Upstream::default();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let breaker = breaker.clone();
            let upstream = upstream.clone();
            tokio::spawn(async move { call_through(&breaker, &upstream).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap_err();
    }

    assert!(breaker.state().is_open());
    assert_rejected!(call_through(&breaker, &upstream).await);
}

#[tokio::test]
async fn waiters_resume_when_breaker_closes() {
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::builder()
        .max_failures(0)
        .reset_timeout(Duration::from_secs(60))
        .clock(clock.clone())
        .build()
        .unwrap();
    let upstream = Upstream::default();
    call_through(&breaker, &upstream).await.unwrap_err();

    let resumed = Arc::new(AtomicU32::new(0));
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let breaker = breaker.clone();
            let resumed = resumed.clone();
            tokio::spawn(async move {
                breaker.await_close().await;
                resumed.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    tokio::task::yield_now().await;
    assert_eq!(resumed.load(Ordering::SeqCst), 0);

    upstream.set_healthy(true);
    clock.advance(Duration::from_secs(60));
    call_through(&breaker, &upstream).await.unwrap();

    for waiter in join_all(waiters).await {
        waiter.unwrap();
    }
    assert_eq!(resumed.load(Ordering::SeqCst), 3);

    // Already closed: returns at once.
    breaker.await_close().await;
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn sliding_window_from_config() {
    let clock = ManualClock::new();
    let config = CircuitBreakerConfig {
        opening_strategy: OpeningStrategy::SlidingWindow {
            window: Duration::from_secs(10),
            max_failures: 2,
        },
        reset_timeout: Duration::from_secs(30),
        ..Default::default()
    };
    let breaker = CircuitBreakerBuilder::from_config(config)
        .clock(clock.clone())
        .build()
        .unwrap();
    let upstream = Upstream::default();

    // Failures 6s apart never pack three into a 10s window.
    for _ in 0..4 {
        call_through(&breaker, &upstream).await.unwrap_err();
        clock.advance(Duration::from_secs(6));
    }
    assert!(breaker.state().is_closed());
    clock.advance(Duration::from_secs(20));

    // Three in quick succession do.
    for _ in 0..3 {
        assert!(breaker.state().is_closed());
        call_through(&breaker, &upstream).await.unwrap_err();
        clock.advance(Duration::from_secs(1));
    }
    assert!(breaker.state().is_open());
    assert_eq!(upstream.calls(), 7);
    assert!(breaker.state().expires_at().is_some_and(|at| at > clock.now()));
}

#[test]
fn invalid_config_is_rejected() {
    let config = CircuitBreakerConfig {
        reset_timeout: Duration::ZERO,
        ..Default::default()
    };

    let err = CircuitBreaker::from_config(config).unwrap_err();

    assert!(!err.to_string().is_empty());
}
