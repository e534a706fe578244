//! Retry Patterns Example
//!
//! Demonstrates building retry policies out of schedules. Shows:
//! - Exponential backoff capped by a retry count
//! - Inspecting a policy's delays without running anything
//! - Conditional retry (retry_if)
//! - Jitter and delay caps
//! - Falling back once the schedule gives up
//! - Polling with repeat until a condition holds
//!
//! Run with: cargo run --example retry_patterns

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use breakwater::testing::delays;
use breakwater::Schedule;

// ==================== Basic Retry ====================

/// Example 1: Exponential backoff with a retry limit
///
/// The action fails twice before succeeding.
async fn example_basic_retry() {
    println!("\n=== Example 1: Basic Retry ===");

    let attempts = AtomicU32::new(0);
    let policy: Schedule<&'static str, Duration> =
        Schedule::exponential(Duration::from_millis(50), 2.0).zip_left(Schedule::recurs(5));

    let result = policy
        .retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            println!("  Attempt {}", n + 1);
            async move {
                if n < 2 {
                    Err("transient failure")
                } else {
                    Ok("success!")
                }
            }
        })
        .await;

    match result {
        Ok(value) => println!(
            "Success after {} attempts: {}",
            attempts.load(Ordering::SeqCst),
            value
        ),
        Err(error) => println!("Gave up: {}", error),
    }
}

// ==================== Inspecting Policies ====================

/// Example 2: Comparing backoff generators
///
/// Schedules are values, so their delays can be listed up front.
fn example_backoff_strategies() {
    println!("\n=== Example 2: Backoff Strategies ===");

    let base = Duration::from_millis(100);

    let spaced: Schedule<(), u64> = Schedule::spaced(base);
    let linear: Schedule<(), Duration> = Schedule::linear(base);
    let exponential: Schedule<(), Duration> = Schedule::exponential(base, 2.0);
    let fibonacci: Schedule<(), Duration> = Schedule::fibonacci(base);

    println!("Spaced:      {:?}", delays(&spaced, &(), 5));
    println!("Linear:      {:?}", delays(&linear, &(), 5));
    println!("Exponential: {:?}", delays(&exponential, &(), 5));
    println!("Fibonacci:   {:?}", delays(&fibonacci, &(), 5));
}

// ==================== Conditional Retry ====================

#[derive(Debug, PartialEq)]
enum HttpError {
    ServiceUnavailable,
    NotFound,
}

/// Example 3: Only retry errors that can heal
async fn example_conditional_retry() {
    println!("\n=== Example 3: Conditional Retry ===");

    let attempts = AtomicU32::new(0);
    let policy: Schedule<HttpError, Duration> =
        Schedule::exponential(Duration::from_millis(20), 2.0).zip_left(Schedule::recurs(5));

    let result: Result<(), HttpError> = policy
        .retry_if(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(HttpError::ServiceUnavailable)
                    } else {
                        Err(HttpError::NotFound)
                    }
                }
            },
            |error| *error == HttpError::ServiceUnavailable,
        )
        .await;

    println!(
        "Result: {:?} after {} attempts (404 is not retried)",
        result,
        attempts.load(Ordering::SeqCst)
    );
}

// ==================== Jitter and Caps ====================

/// Example 4: Capped, jittered backoff
///
/// `delayed` caps each delay; `jittered` spreads retries from many clients.
#[cfg(feature = "jitter")]
fn example_jitter() {
    println!("\n=== Example 4: Jitter and Delay Cap ===");

    let policy: Schedule<(), Duration> = Schedule::exponential(Duration::from_millis(100), 2.0)
        .delayed(|_, delay| delay.min(Duration::from_secs(1)))
        .jittered(0.5, 1.5)
        .zip_left(Schedule::recurs(6));

    for (i, delay) in delays(&policy, &(), 10).iter().enumerate() {
        println!("  Retry {}: wait {:?}", i + 1, delay);
    }
}

#[cfg(not(feature = "jitter"))]
fn example_jitter() {
    println!("\n=== Example 4: Jitter (requires the `jitter` feature) ===");
}

// ==================== Fallback ====================

/// Example 5: Recover once the schedule is exhausted
async fn example_fallback() {
    println!("\n=== Example 5: Fallback ===");

    let policy: Schedule<String, u64> = Schedule::spaced(Duration::from_millis(10))
        .zip_left(Schedule::recurs(3));

    let config = policy
        .retry_or_else(
            || async { Err::<String, _>("config server unreachable".to_string()) },
            |error, retries| {
                println!("  Giving up after {} retries: {}", retries, error);
                "cached-config".to_string()
            },
        )
        .await;

    println!("Using: {}", config);
}

// ==================== Repeat ====================

/// Example 6: Poll a job until it finishes
async fn example_polling() {
    println!("\n=== Example 6: Polling with repeat ===");

    let progress = AtomicU32::new(0);
    let policy = Schedule::<u32, u32>::identity()
        .until_input(|percent| *percent >= 100)
        .zip_left(Schedule::spaced(Duration::from_millis(25)))
        .log(|percent, _| println!("  Job at {}%", percent));

    let result: Result<u32, String> = policy
        .repeat(|| {
            let percent = progress.fetch_add(25, Ordering::SeqCst) + 25;
            async move { Ok(percent) }
        })
        .await;

    println!("Final: {:?}", result);
}

#[tokio::main]
async fn main() {
    println!("======================================");
    println!("       Retry Patterns Example         ");
    println!("======================================");

    example_basic_retry().await;
    example_backoff_strategies();
    example_conditional_retry().await;
    example_jitter();
    example_fallback().await;
    example_polling().await;

    println!("\n======================================");
    println!("           Examples Complete           ");
    println!("======================================");
}
