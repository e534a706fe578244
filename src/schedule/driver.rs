//! Async loops that run a block under a schedule.
//!
//! `repeat*` feeds successful values into the schedule and stops on the
//! first error; `retry*` feeds errors into the schedule and stops on the
//! first success. Every iteration yields to the runtime before running the
//! block again, so dropping the returned future cancels the loop promptly.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{Decision, Schedule};
use crate::Either;

impl<I: 'static, O: 'static> Schedule<I, O> {
    /// Run `block` repeatedly, feeding each value to the schedule.
    ///
    /// Returns the schedule's final output once it is done, or the block's
    /// first error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::Schedule;
    ///
    /// # tokio_test::block_on(async {
    /// let mut polls = 0;
    /// let result: Result<u64, String> = Schedule::<u32, u64>::recurs(3)
    ///     .repeat(|| {
    ///         polls += 1;
    ///         async { Ok(0) }
    ///     })
    ///     .await;
    ///
    /// assert_eq!(result, Ok(3));
    /// assert_eq!(polls, 4);
    /// # });
    /// ```
    pub async fn repeat<E, F, Fut>(self, block: F) -> Result<O, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<I, E>>,
    {
        self.repeat_or_else_either(block, |error, _| error)
            .await
            .into_result()
    }

    /// Like [`repeat`](Schedule::repeat), recovering from the block's error
    /// with `or_else(error, last_output)`.
    ///
    /// `last_output` is `None` when the block fails before the schedule
    /// produced any output.
    pub async fn repeat_or_else<E, F, Fut, G>(self, block: F, or_else: G) -> O
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<I, E>>,
        G: FnOnce(E, Option<O>) -> O,
    {
        self.repeat_or_else_either(block, or_else).await.merge()
    }

    /// Like [`repeat_or_else`](Schedule::repeat_or_else), keeping the
    /// fallback in `Left` and the schedule's output in `Right`.
    pub async fn repeat_or_else_either<E, A, F, Fut, G>(self, mut block: F, or_else: G) -> Either<A, O>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<I, E>>,
        G: FnOnce(E, Option<O>) -> A,
    {
        let mut schedule = self;
        let mut last_output = None;
        let mut iteration: u64 = 0;

        loop {
            tokio::task::yield_now().await;
            iteration += 1;

            let input = match block().await {
                Ok(input) => input,
                Err(error) => {
                    tracing::debug!(iteration, "repeat stopped by error");
                    return Either::Left(or_else(error, last_output));
                }
            };

            match schedule.step(&input) {
                Decision::Done(output) => {
                    tracing::debug!(iteration, "repeat schedule finished");
                    return Either::Right(output);
                }
                Decision::Continue {
                    output,
                    delay,
                    next,
                } => {
                    tracing::trace!(iteration, ?delay, "repeating");
                    pause(delay).await;
                    last_output = Some(output);
                    schedule = next;
                }
            }
        }
    }

    /// Run `action` until it succeeds, feeding each error to the schedule.
    ///
    /// Returns the first success, or the last error once the schedule is done.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::Schedule;
    ///
    /// # tokio_test::block_on(async {
    /// let policy: Schedule<String, u64> = Schedule::recurs(2);
    ///
    /// let mut attempts = 0;
    /// let result: Result<(), String> = policy
    ///     .retry(|| {
    ///         attempts += 1;
    ///         let attempt = attempts;
    ///         async move { Err(format!("attempt {} failed", attempt)) }
    ///     })
    ///     .await;
    ///
    /// // One initial attempt plus two retries.
    /// assert_eq!(result, Err("attempt 3 failed".to_string()));
    /// # });
    /// ```
    pub async fn retry<T, F, Fut>(self, action: F) -> Result<T, I>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, I>>,
    {
        self.retry_or_else_either(action, |error, _| error)
            .await
            .into_result()
    }

    /// Like [`retry`](Schedule::retry), recovering with
    /// `or_else(last_error, schedule_output)` once the schedule is done.
    pub async fn retry_or_else<T, F, Fut, G>(self, action: F, or_else: G) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, I>>,
        G: FnOnce(I, O) -> T,
    {
        self.retry_or_else_either(action, or_else).await.merge()
    }

    /// Like [`retry_or_else`](Schedule::retry_or_else), keeping the fallback
    /// in `Left` and the success in `Right`.
    pub async fn retry_or_else_either<T, A, F, Fut, G>(self, mut action: F, or_else: G) -> Either<A, T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, I>>,
        G: FnOnce(I, O) -> A,
    {
        let mut schedule = self;
        let mut attempt: u64 = 0;

        loop {
            tokio::task::yield_now().await;
            attempt += 1;

            let error = match action().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "retry succeeded");
                    }
                    return Either::Right(value);
                }
                Err(error) => error,
            };

            match schedule.step(&error) {
                Decision::Done(output) => {
                    tracing::debug!(attempt, "retry schedule exhausted");
                    return Either::Left(or_else(error, output));
                }
                Decision::Continue { delay, next, .. } => {
                    tracing::trace!(attempt, ?delay, "retrying");
                    pause(delay).await;
                    schedule = next;
                }
            }
        }
    }

    /// Like [`retry`](Schedule::retry), but errors for which `should_retry`
    /// returns `false` are returned immediately, without consulting the
    /// schedule.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::Schedule;
    ///
    /// #[derive(Debug, PartialEq)]
    /// enum FetchError {
    ///     Timeout,
    ///     NotFound,
    /// }
    ///
    /// # tokio_test::block_on(async {
    /// let mut attempts = 0;
    /// let result: Result<(), FetchError> = Schedule::<FetchError, u64>::recurs(5)
    ///     .retry_if(
    ///         || {
    ///             attempts += 1;
    ///             async { Err(FetchError::NotFound) }
    ///         },
    ///         |error| *error == FetchError::Timeout,
    ///     )
    ///     .await;
    ///
    /// assert_eq!(result, Err(FetchError::NotFound));
    /// assert_eq!(attempts, 1);
    /// # });
    /// ```
    pub async fn retry_if<T, F, Fut, P>(self, action: F, should_retry: P) -> Result<T, I>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, I>>,
        P: Fn(&I) -> bool + Send + Sync + 'static,
    {
        self.gate(Arc::new(should_retry)).retry(action).await
    }

    /// Stop without stepping `self` when `should_retry` rejects the input.
    fn gate(self, should_retry: Arc<dyn Fn(&I) -> bool + Send + Sync>) -> Schedule<I, Option<O>> {
        Schedule::new(move |input: &I| {
            if !should_retry(input) {
                tracing::debug!("error is not retryable");
                return Decision::Done(None);
            }
            match self.step(input) {
                Decision::Done(output) => Decision::Done(Some(output)),
                Decision::Continue {
                    output,
                    delay,
                    next,
                } => Decision::Continue {
                    output: Some(output),
                    delay,
                    next: next.gate(Arc::clone(&should_retry)),
                },
            }
        })
    }
}

/// Wait out a schedule delay. `Duration::MAX` means never resume.
async fn pause(delay: Duration) {
    if delay == Duration::MAX {
        std::future::pending::<()>().await;
    } else if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
