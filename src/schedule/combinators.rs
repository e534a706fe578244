//! Combinators building new schedules out of existing ones.
//!
//! Every combinator wraps the step function of its receiver. The `next`
//! schedule of each emitted [`Decision`] is rebuilt from the inner schedule's
//! `next`, so a long-running schedule never nests deeper than the chain of
//! combinators it was written with.

use std::sync::Arc;
use std::time::Duration;

use super::{scale, Decision, Schedule};
use crate::Either;

type Predicate<I, O> = dyn Fn(&I, &O) -> bool + Send + Sync;
type Combine<O, A, B> = dyn Fn(O, A) -> B + Send + Sync;
type CombineDuration = dyn Fn(Duration, Duration) -> Duration + Send + Sync;
type CombineEither<O, A, B> = dyn Fn(Option<O>, Option<A>) -> B + Send + Sync;
type CombineEitherDuration = dyn Fn(Option<Duration>, Option<Duration>) -> Duration + Send + Sync;

impl<I: 'static, O: 'static> Schedule<I, O> {
    /// Transform every output; delays and stopping are unchanged.
    pub fn map<B, F>(self, f: F) -> Schedule<I, B>
    where
        B: 'static,
        F: Fn(O) -> B + Send + Sync + 'static,
    {
        self.map_shared(Arc::new(f))
    }

    fn map_shared<B: 'static>(self, f: Arc<dyn Fn(O) -> B + Send + Sync>) -> Schedule<I, B> {
        Schedule::new(move |input: &I| match self.step(input) {
            Decision::Done(output) => Decision::Done(f(output)),
            Decision::Continue {
                output,
                delay,
                next,
            } => Decision::Continue {
                output: f(output),
                delay,
                next: next.map_shared(Arc::clone(&f)),
            },
        })
    }

    /// Adapt the input type by converting each new input before stepping.
    ///
    /// ```rust
    /// use breakwater::Schedule;
    ///
    /// // Reuse a schedule over `u32` for a block that produces strings.
    /// let by_length = Schedule::<u32, u32>::identity()
    ///     .do_while(|n, _| *n < 5)
    ///     .contramap(|s: &String| s.len() as u32);
    ///
    /// assert!(by_length.step(&"abc".to_string()).is_continue());
    /// assert!(by_length.step(&"abcdef".to_string()).is_done());
    /// ```
    pub fn contramap<I2, F>(self, f: F) -> Schedule<I2, O>
    where
        I2: 'static,
        F: Fn(&I2) -> I + Send + Sync + 'static,
    {
        self.contramap_shared(Arc::new(f))
    }

    fn contramap_shared<I2: 'static>(
        self,
        f: Arc<dyn Fn(&I2) -> I + Send + Sync>,
    ) -> Schedule<I2, O> {
        Schedule::new(move |input: &I2| match self.step(&f(input)) {
            Decision::Done(output) => Decision::Done(output),
            Decision::Continue {
                output,
                delay,
                next,
            } => Decision::Continue {
                output,
                delay,
                next: next.contramap_shared(Arc::clone(&f)),
            },
        })
    }

    /// Run `self` to completion, then hand over to `other`.
    ///
    /// Outputs of `self` are tagged `Left`, outputs of `other` `Right`. The
    /// step on which `self` finishes is emitted as a continuation with zero
    /// delay, so its output is still observed and `other` starts on the
    /// following input.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::{Either, Schedule};
    /// use std::time::Duration;
    ///
    /// // Two quick retries, then slow down.
    /// let schedule = Schedule::<(), u64>::recurs(2)
    ///     .and_then(Schedule::<(), u64>::spaced(Duration::from_secs(1)));
    ///
    /// let outputs: Vec<_> = breakwater::testing::steps(&schedule, &(), 5)
    ///     .into_iter()
    ///     .map(|decision| decision.into_output())
    ///     .collect();
    ///
    /// assert_eq!(
    ///     outputs,
    ///     vec![
    ///         Either::Left(0),
    ///         Either::Left(1),
    ///         Either::Left(2),
    ///         Either::Right(0),
    ///         Either::Right(1),
    ///     ]
    /// );
    /// ```
    pub fn and_then<A: 'static>(self, other: Schedule<I, A>) -> Schedule<I, Either<O, A>> {
        self.and_then_with(other, Either::Left, Either::Right)
    }

    /// Like [`and_then`](Schedule::and_then), folding both sides into one output type.
    pub fn and_then_with<A, B, L, R>(self, other: Schedule<I, A>, if_left: L, if_right: R) -> Schedule<I, B>
    where
        A: 'static,
        B: 'static,
        L: Fn(O) -> B + Send + Sync + 'static,
        R: Fn(A) -> B + Send + Sync + 'static,
    {
        self.followed_by(other.map(if_right), Arc::new(if_left))
    }

    fn followed_by<B: 'static>(
        self,
        other: Schedule<I, B>,
        f: Arc<dyn Fn(O) -> B + Send + Sync>,
    ) -> Schedule<I, B> {
        Schedule::new(move |input: &I| match self.step(input) {
            Decision::Done(output) => Decision::Continue {
                output: f(output),
                delay: Duration::ZERO,
                next: other.clone(),
            },
            Decision::Continue {
                output,
                delay,
                next,
            } => Decision::Continue {
                output: f(output),
                delay,
                next: next.followed_by(other.clone(), Arc::clone(&f)),
            },
        })
    }

    /// Feed every output of `self` into `other` as its input.
    ///
    /// Continues only while both continue; the delays of the two sides are
    /// added. The output is `other`'s.
    pub fn pipe<B: 'static>(self, other: Schedule<O, B>) -> Schedule<I, B> {
        Schedule::new(move |input: &I| match self.step(input) {
            Decision::Done(output) => Decision::Done(other.step(&output).into_output()),
            Decision::Continue {
                output,
                delay,
                next,
            } => match other.step(&output) {
                Decision::Done(piped) => Decision::Done(piped),
                Decision::Continue {
                    output: piped,
                    delay: piped_delay,
                    next: piped_next,
                } => Decision::Continue {
                    output: piped,
                    delay: delay.saturating_add(piped_delay),
                    next: next.pipe(piped_next),
                },
            },
        })
    }

    /// Keep going only while `predicate(input, output)` holds.
    ///
    /// The predicate is consulted on every step that would continue; when it
    /// returns `false` the schedule stops with that step's output.
    pub fn check<P>(self, predicate: P) -> Self
    where
        P: Fn(&I, &O) -> bool + Send + Sync + 'static,
    {
        self.check_shared(Arc::new(predicate))
    }

    fn check_shared(self, predicate: Arc<Predicate<I, O>>) -> Self {
        Schedule::new(move |input: &I| match self.step(input) {
            Decision::Done(output) => Decision::Done(output),
            Decision::Continue {
                output,
                delay,
                next,
            } => {
                if predicate(input, &output) {
                    Decision::Continue {
                        output,
                        delay,
                        next: next.check_shared(Arc::clone(&predicate)),
                    }
                } else {
                    Decision::Done(output)
                }
            }
        })
    }

    /// Alias for [`check`](Schedule::check).
    pub fn do_while<P>(self, predicate: P) -> Self
    where
        P: Fn(&I, &O) -> bool + Send + Sync + 'static,
    {
        self.check(predicate)
    }

    /// Keep going until `predicate(input, output)` holds.
    pub fn do_until<P>(self, predicate: P) -> Self
    where
        P: Fn(&I, &O) -> bool + Send + Sync + 'static,
    {
        self.check(move |input, output| !predicate(input, output))
    }

    /// Keep going while the input satisfies `predicate`.
    pub fn while_input<P>(self, predicate: P) -> Self
    where
        P: Fn(&I) -> bool + Send + Sync + 'static,
    {
        self.check(move |input, _| predicate(input))
    }

    /// Keep going until the input satisfies `predicate`.
    ///
    /// With `retry`, this stops at the first error matching `predicate`:
    ///
    /// ```rust
    /// use breakwater::Schedule;
    ///
    /// let schedule = Schedule::<&str, u64>::recurs(10).until_input(|e| *e == "fatal");
    ///
    /// assert!(schedule.step(&"timeout").is_continue());
    /// assert!(schedule.step(&"fatal").is_done());
    /// ```
    pub fn until_input<P>(self, predicate: P) -> Self
    where
        P: Fn(&I) -> bool + Send + Sync + 'static,
    {
        self.check(move |input, _| !predicate(input))
    }

    /// Keep going while the output satisfies `predicate`.
    pub fn while_output<P>(self, predicate: P) -> Self
    where
        P: Fn(&O) -> bool + Send + Sync + 'static,
    {
        self.check(move |_, output| predicate(output))
    }

    /// Keep going until the output satisfies `predicate`.
    pub fn until_output<P>(self, predicate: P) -> Self
    where
        P: Fn(&O) -> bool + Send + Sync + 'static,
    {
        self.check(move |_, output| !predicate(output))
    }

    /// Call `action` with the input and output of every continuing step.
    pub fn log<F>(self, action: F) -> Self
    where
        F: Fn(&I, &O) + Send + Sync + 'static,
    {
        self.check(move |input, output| {
            action(input, output);
            true
        })
    }

    /// Run both schedules on the same input; continue only while both do.
    ///
    /// The delay is the longer of the two. The schedule stops as soon as
    /// either side stops, with both sides' outputs from that step.
    pub fn and<A: 'static>(self, other: Schedule<I, A>) -> Schedule<I, (O, A)> {
        self.and_with(other, |output, other| (output, other))
    }

    /// Like [`and`](Schedule::and), combining the outputs with `combine`.
    pub fn and_with<A, B, F>(self, other: Schedule<I, A>, combine: F) -> Schedule<I, B>
    where
        A: 'static,
        B: 'static,
        F: Fn(O, A) -> B + Send + Sync + 'static,
    {
        self.and_with_duration(other, combine, Duration::max)
    }

    /// Like [`and_with`](Schedule::and_with), also choosing how to merge the delays.
    pub fn and_with_duration<A, B, F, D>(
        self,
        other: Schedule<I, A>,
        combine: F,
        combine_duration: D,
    ) -> Schedule<I, B>
    where
        A: 'static,
        B: 'static,
        F: Fn(O, A) -> B + Send + Sync + 'static,
        D: Fn(Duration, Duration) -> Duration + Send + Sync + 'static,
    {
        self.and_shared(other, Arc::new(combine), Arc::new(combine_duration))
    }

    fn and_shared<A: 'static, B: 'static>(
        self,
        other: Schedule<I, A>,
        combine: Arc<Combine<O, A, B>>,
        combine_duration: Arc<CombineDuration>,
    ) -> Schedule<I, B> {
        Schedule::new(move |input: &I| match (self.step(input), other.step(input)) {
            (
                Decision::Continue {
                    output: left,
                    delay: left_delay,
                    next: left_next,
                },
                Decision::Continue {
                    output: right,
                    delay: right_delay,
                    next: right_next,
                },
            ) => Decision::Continue {
                output: combine(left, right),
                delay: combine_duration(left_delay, right_delay),
                next: left_next.and_shared(
                    right_next,
                    Arc::clone(&combine),
                    Arc::clone(&combine_duration),
                ),
            },
            (left, right) => Decision::Done(combine(left.into_output(), right.into_output())),
        })
    }

    /// [`and`](Schedule::and), keeping only this schedule's output.
    ///
    /// The usual way to cap an unbounded backoff:
    ///
    /// ```rust
    /// use breakwater::Schedule;
    /// use std::time::Duration;
    ///
    /// let capped: Schedule<(), Duration> =
    ///     Schedule::exponential(Duration::from_millis(50), 2.0).zip_left(Schedule::recurs(2));
    ///
    /// // Two continuations, then done.
    /// assert_eq!(breakwater::testing::steps(&capped, &(), 10).len(), 3);
    /// ```
    pub fn zip_left<A: 'static>(self, other: Schedule<I, A>) -> Self {
        self.and_with(other, |output, _| output)
    }

    /// [`and`](Schedule::and), keeping only the other schedule's output.
    pub fn zip_right<A: 'static>(self, other: Schedule<I, A>) -> Schedule<I, A> {
        self.and_with(other, |_, other| other)
    }

    /// Run both schedules on the same input; continue while either does.
    ///
    /// A side that has stopped is reported as `None` and is not stepped
    /// again. The delay is the shorter of the sides still running.
    pub fn or<A: 'static>(self, other: Schedule<I, A>) -> Schedule<I, (Option<O>, Option<A>)> {
        self.or_with(
            other,
            |output, other| (output, other),
            |left, right| match (left, right) {
                (Some(left), Some(right)) => left.min(right),
                (Some(delay), None) | (None, Some(delay)) => delay,
                (None, None) => Duration::ZERO,
            },
        )
    }

    /// Like [`or`](Schedule::or), with custom output and delay combiners.
    ///
    /// Both combiners receive `None` for a side that has stopped.
    pub fn or_with<A, B, F, D>(self, other: Schedule<I, A>, combine: F, combine_duration: D) -> Schedule<I, B>
    where
        A: 'static,
        B: 'static,
        F: Fn(Option<O>, Option<A>) -> B + Send + Sync + 'static,
        D: Fn(Option<Duration>, Option<Duration>) -> Duration + Send + Sync + 'static,
    {
        self.or_shared(other, Arc::new(combine), Arc::new(combine_duration))
    }

    fn or_shared<A: 'static, B: 'static>(
        self,
        other: Schedule<I, A>,
        combine: Arc<CombineEither<O, A, B>>,
        combine_duration: Arc<CombineEitherDuration>,
    ) -> Schedule<I, B> {
        Schedule::new(move |input: &I| match (self.step(input), other.step(input)) {
            (Decision::Done(left), Decision::Done(right)) => {
                Decision::Done(combine(Some(left), Some(right)))
            }
            (
                Decision::Continue {
                    output: left,
                    delay: left_delay,
                    next: left_next,
                },
                Decision::Continue {
                    output: right,
                    delay: right_delay,
                    next: right_next,
                },
            ) => Decision::Continue {
                output: combine(Some(left), Some(right)),
                delay: combine_duration(Some(left_delay), Some(right_delay)),
                next: left_next.or_shared(
                    right_next,
                    Arc::clone(&combine),
                    Arc::clone(&combine_duration),
                ),
            },
            (
                Decision::Continue {
                    output,
                    delay,
                    next,
                },
                Decision::Done(_),
            ) => Decision::Continue {
                output: combine(Some(output), None),
                delay: combine_duration(Some(delay), None),
                next: left_only(next, Arc::clone(&combine), Arc::clone(&combine_duration)),
            },
            (
                Decision::Done(_),
                Decision::Continue {
                    output,
                    delay,
                    next,
                },
            ) => Decision::Continue {
                output: combine(None, Some(output)),
                delay: combine_duration(None, Some(delay)),
                next: right_only(next, Arc::clone(&combine), Arc::clone(&combine_duration)),
            },
        })
    }

    /// Rewrite every delay with `f(output, delay)`.
    ///
    /// ```rust
    /// use breakwater::Schedule;
    /// use std::time::Duration;
    ///
    /// // Cap an exponential backoff at one second.
    /// let capped: Schedule<(), Duration> = Schedule::exponential(Duration::from_millis(300), 2.0)
    ///     .delayed(|_, delay| delay.min(Duration::from_secs(1)));
    ///
    /// assert_eq!(
    ///     breakwater::testing::delays(&capped, &(), 4),
    ///     vec![
    ///         Duration::from_millis(300),
    ///         Duration::from_millis(600),
    ///         Duration::from_secs(1),
    ///         Duration::from_secs(1),
    ///     ]
    /// );
    /// ```
    pub fn delayed<F>(self, f: F) -> Self
    where
        F: Fn(&O, Duration) -> Duration + Send + Sync + 'static,
    {
        self.delayed_shared(Arc::new(f))
    }

    fn delayed_shared(self, f: Arc<dyn Fn(&O, Duration) -> Duration + Send + Sync>) -> Self {
        Schedule::new(move |input: &I| match self.step(input) {
            Decision::Done(output) => Decision::Done(output),
            Decision::Continue {
                output,
                delay,
                next,
            } => Decision::Continue {
                delay: f(&output, delay),
                output,
                next: next.delayed_shared(Arc::clone(&f)),
            },
        })
    }

    /// Multiply every delay by a random factor in `[min, max)`.
    ///
    /// Factors come from the thread-local generator. With `jittered(0.0, 1.0)`
    /// a delay can only shrink; use a range above `1.0` to spread delays out.
    ///
    /// # Panics
    ///
    /// Panics if `min >= max`, or either bound is not finite.
    #[cfg(feature = "jitter")]
    pub fn jittered(self, min: f64, max: f64) -> Self {
        use rand::Rng;

        assert_jitter_range(min, max);
        self.jittered_by(move || rand::rng().random_range(min..max))
    }

    /// Full jitter: `jittered(0.0, 1.0)`.
    #[cfg(feature = "jitter")]
    pub fn full_jitter(self) -> Self {
        self.jittered(0.0, 1.0)
    }

    /// Like [`jittered`](Schedule::jittered), drawing factors from `rng`.
    ///
    /// Pass a seeded generator to make jittered delays reproducible.
    ///
    /// # Panics
    ///
    /// Panics if `min >= max`, or either bound is not finite.
    #[cfg(feature = "jitter")]
    pub fn jittered_with<R>(self, min: f64, max: f64, rng: R) -> Self
    where
        R: rand::Rng + Send + 'static,
    {
        use rand::Rng;
        use std::sync::{Mutex, PoisonError};

        assert_jitter_range(min, max);
        let rng = Mutex::new(rng);
        self.jittered_by(move || {
            rng.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .random_range(min..max)
        })
    }

    /// Multiply every delay by a factor produced by `factor`.
    ///
    /// Negative or NaN factors yield a zero delay.
    pub fn jittered_by<G>(self, factor: G) -> Self
    where
        G: Fn() -> f64 + Send + Sync + 'static,
    {
        self.delayed(move |_, delay| scale(delay, factor()))
    }

    /// Accumulate outputs of continuing steps with `f`, starting from `seed`.
    ///
    /// Each continuing step outputs the running value. When the inner
    /// schedule stops, its final output is dropped and the last running
    /// value is returned instead.
    pub fn fold<B, F>(self, seed: B, f: F) -> Schedule<I, B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(B, O) -> B + Send + Sync + 'static,
    {
        self.fold_shared(seed, Arc::new(f))
    }

    fn fold_shared<B>(self, acc: B, f: Arc<dyn Fn(B, O) -> B + Send + Sync>) -> Schedule<I, B>
    where
        B: Clone + Send + Sync + 'static,
    {
        Schedule::new(move |input: &I| match self.step(input) {
            Decision::Done(_) => Decision::Done(acc.clone()),
            Decision::Continue {
                output,
                delay,
                next,
            } => {
                let acc = f(acc.clone(), output);
                Decision::Continue {
                    output: acc.clone(),
                    delay,
                    next: next.fold_shared(acc, Arc::clone(&f)),
                }
            }
        })
    }

    /// Collect the outputs of continuing steps into a `Vec`.
    pub fn collect(self) -> Schedule<I, Vec<O>>
    where
        O: Clone + Send + Sync,
    {
        self.fold(Vec::new(), |mut outputs, output| {
            outputs.push(output);
            outputs
        })
    }

    /// Discard outputs.
    pub fn void(self) -> Schedule<I, ()> {
        self.map(|_| ())
    }
}

/// `or` after the right-hand side has stopped.
fn left_only<I, O, A, B>(
    left: Schedule<I, O>,
    combine: Arc<CombineEither<O, A, B>>,
    combine_duration: Arc<CombineEitherDuration>,
) -> Schedule<I, B>
where
    I: 'static,
    O: 'static,
    A: 'static,
    B: 'static,
{
    Schedule::new(move |input: &I| match left.step(input) {
        Decision::Done(output) => Decision::Done(combine(Some(output), None)),
        Decision::Continue {
            output,
            delay,
            next,
        } => Decision::Continue {
            output: combine(Some(output), None),
            delay: combine_duration(Some(delay), None),
            next: left_only(next, Arc::clone(&combine), Arc::clone(&combine_duration)),
        },
    })
}

/// `or` after the left-hand side has stopped.
fn right_only<I, O, A, B>(
    right: Schedule<I, A>,
    combine: Arc<CombineEither<O, A, B>>,
    combine_duration: Arc<CombineEitherDuration>,
) -> Schedule<I, B>
where
    I: 'static,
    O: 'static,
    A: 'static,
    B: 'static,
{
    Schedule::new(move |input: &I| match right.step(input) {
        Decision::Done(output) => Decision::Done(combine(None, Some(output))),
        Decision::Continue {
            output,
            delay,
            next,
        } => Decision::Continue {
            output: combine(None, Some(output)),
            delay: combine_duration(None, Some(delay)),
            next: right_only(next, Arc::clone(&combine), Arc::clone(&combine_duration)),
        },
    })
}

#[cfg(feature = "jitter")]
fn assert_jitter_range(min: f64, max: f64) {
    assert!(
        min.is_finite() && max.is_finite() && min < max,
        "jitter range must be finite and non-empty, got [{}, {})",
        min,
        max
    );
}
