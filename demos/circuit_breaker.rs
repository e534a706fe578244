//! Circuit Breaker Example
//!
//! Walks a breaker through an outage of a flaky upstream:
//! - Failures open the breaker
//! - Open calls are rejected without touching the upstream
//! - Trial calls back off exponentially while the upstream stays down
//! - A successful trial closes the breaker and wakes waiting tasks
//! - Retries stop as soon as the breaker rejects
//!
//! Transitions are logged through `tracing`.
//!
//! Run with: cargo run --example circuit_breaker

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use breakwater::{CircuitBreaker, CircuitBreakerError, Schedule};

/// An upstream that is down until told otherwise.
#[derive(Clone, Default)]
struct FlakyUpstream {
    healthy: Arc<AtomicBool>,
    calls: Arc<AtomicU32>,
}

impl FlakyUpstream {
    async fn fetch(&self) -> Result<String, String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.healthy.load(Ordering::SeqCst) {
            Ok(format!("payload #{}", call))
        } else {
            Err("connection refused".to_string())
        }
    }
}

async fn call(breaker: &CircuitBreaker, upstream: &FlakyUpstream) {
    match breaker.protect(|| upstream.fetch()).await {
        Ok(body) => println!("  ok: {}", body),
        Err(CircuitBreakerError::Operation(error)) => println!("  upstream error: {}", error),
        Err(CircuitBreakerError::Rejected(rejected)) => println!("  rejected: {}", rejected),
    }
}

/// Example 1: Open, back off, recover
async fn example_lifecycle() {
    println!("\n=== Example 1: Breaker Lifecycle ===");

    let upstream = FlakyUpstream::default();
    let breaker = CircuitBreaker::builder()
        .max_failures(2)
        .reset_timeout(Duration::from_millis(100))
        .exponential_backoff_factor(2.0)
        .max_reset_timeout(Duration::from_millis(400))
        .on_open(|| println!("  [hook] opened"))
        .on_half_open(|| println!("  [hook] trial call"))
        .on_closed(|| println!("  [hook] closed"))
        .build()
        .expect("valid configuration");

    println!("Outage begins:");
    for _ in 0..4 {
        call(&breaker, &upstream).await;
    }
    println!("State: {}", breaker.state());

    println!("Trial after the reset timeout, still down:");
    tokio::time::sleep(Duration::from_millis(110)).await;
    call(&breaker, &upstream).await;
    println!("Next reset timeout: {:?}", breaker.state().reset_timeout());

    let waiter = {
        let breaker = breaker.clone();
        tokio::spawn(async move {
            breaker.await_close().await;
            println!("  [waiter] breaker closed, resuming work");
        })
    };

    println!("Upstream recovers:");
    upstream.healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(210)).await;
    call(&breaker, &upstream).await;
    waiter.await.expect("waiter task");

    println!(
        "State: {}, upstream saw {} calls",
        breaker.state(),
        upstream.calls.load(Ordering::SeqCst)
    );
}

/// Example 2: Retry through a breaker
///
/// The retry loop stops at the first rejection instead of hammering an
/// open breaker.
async fn example_retry_through_breaker() {
    println!("\n=== Example 2: Retry Through a Breaker ===");

    let upstream = FlakyUpstream::default();
    let breaker = CircuitBreaker::new(2, Duration::from_secs(30)).expect("valid configuration");

    let policy = Schedule::<CircuitBreakerError<String>, Duration>::exponential(
        Duration::from_millis(10),
        2.0,
    )
    .zip_left(Schedule::recurs(10))
    .until_input(|error| error.is_rejected());

    let result = policy
        .retry(|| {
            let breaker = breaker.clone();
            let upstream = upstream.clone();
            async move { breaker.protect(|| upstream.fetch()).await }
        })
        .await;

    match result {
        Ok(body) => println!("Got: {}", body),
        Err(error) => println!(
            "Stopped after {} upstream calls: {}",
            upstream.calls.load(Ordering::SeqCst),
            error
        ),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("======================================");
    println!("      Circuit Breaker Example         ");
    println!("======================================");

    example_lifecycle().await;
    example_retry_through_breaker().await;

    println!("\n======================================");
    println!("           Examples Complete           ");
    println!("======================================");
}
