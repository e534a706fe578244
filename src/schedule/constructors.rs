//! Base generators.
//!
//! Generators are split across impl blocks by output type so that
//! `Schedule::recurs(3)` and `Schedule::exponential(..)` infer their output
//! without turbofish.

use std::sync::Arc;
use std::time::Duration;

use super::{saturating_mul, scale, Decision, Schedule};

impl<I: Clone + 'static> Schedule<I, I> {
    /// A schedule that never stops and outputs its input unchanged.
    ///
    /// Useful as the starting point for predicate-driven policies:
    ///
    /// ```rust
    /// use breakwater::Schedule;
    ///
    /// // Repeat while the block keeps producing values below 10.
    /// let schedule = Schedule::<u32, u32>::identity().do_while(|input, _| *input < 10);
    ///
    /// assert!(schedule.step(&3).is_continue());
    /// assert!(schedule.step(&10).is_done());
    /// ```
    pub fn identity() -> Self {
        Schedule::new(|input: &I| Decision::Continue {
            output: input.clone(),
            delay: Duration::ZERO,
            next: Schedule::identity(),
        })
    }
}

impl<I: Clone + Send + Sync + 'static> Schedule<I, Vec<I>> {
    /// A schedule that never stops and outputs every input seen so far.
    pub fn collect_inputs() -> Self {
        Schedule::identity().collect()
    }
}

impl<I: 'static> Schedule<I, u64> {
    /// Continue exactly `n` times, then stop.
    ///
    /// Outputs the step count `0, 1, ..., n - 1` with zero delay; the
    /// `n + 1`-th step answers `Done(n)`. Combined with a retry driver this
    /// means one initial attempt plus `n` retries.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::Schedule;
    ///
    /// let schedule: Schedule<(), u64> = Schedule::recurs(2);
    ///
    /// let first = schedule.step(&());
    /// assert_eq!(first.output(), &0);
    ///
    /// let second = first.next().unwrap().step(&());
    /// assert_eq!(second.output(), &1);
    ///
    /// let third = second.next().unwrap().step(&());
    /// assert!(third.is_done());
    /// assert_eq!(third.into_output(), 2);
    /// ```
    pub fn recurs(n: u64) -> Self {
        Self::recurs_from(0, n)
    }

    fn recurs_from(count: u64, n: u64) -> Self {
        Schedule::new(move |_: &I| {
            if count < n {
                Decision::Continue {
                    output: count,
                    delay: Duration::ZERO,
                    next: Self::recurs_from(count + 1, n),
                }
            } else {
                Decision::Done(count)
            }
        })
    }

    /// Never stop; output the step count with zero delay.
    pub fn forever() -> Self {
        Schedule::unfold(0, |n: &u64| n.saturating_add(1))
    }

    /// Never stop; output the step count and wait `duration` every time.
    pub fn spaced(duration: Duration) -> Self {
        Self::forever().delayed(move |_, _| duration)
    }
}

impl<I: 'static> Schedule<I, Duration> {
    /// Delays growing linearly: `base, 2 * base, 3 * base, ...`.
    ///
    /// The output is the delay itself.
    pub fn linear(base: Duration) -> Self {
        Schedule::<I, u64>::forever()
            .map(move |n| saturating_mul(base, n.saturating_add(1)))
            .delayed(|output, _| *output)
    }

    /// Delays growing geometrically: `base * factor^n` for `n = 0, 1, ...`.
    ///
    /// The output is the delay itself. Results saturate rather than
    /// overflow.
    ///
    /// # Example
    ///
    /// ```rust
    /// use breakwater::Schedule;
    /// use std::time::Duration;
    ///
    /// let schedule: Schedule<(), Duration> =
    ///     Schedule::exponential(Duration::from_millis(10), 2.0);
    ///
    /// let delays: Vec<_> = breakwater::testing::delays(&schedule, &(), 4);
    /// assert_eq!(
    ///     delays,
    ///     vec![
    ///         Duration::from_millis(10),
    ///         Duration::from_millis(20),
    ///         Duration::from_millis(40),
    ///         Duration::from_millis(80),
    ///     ]
    /// );
    /// ```
    pub fn exponential(base: Duration, factor: f64) -> Self {
        Schedule::<I, u64>::forever()
            .map(move |n| scale(base, factor.powi(i32::try_from(n).unwrap_or(i32::MAX))))
            .delayed(|output, _| *output)
    }

    /// Delays following the Fibonacci sequence: `one, one, 2 * one, 3 * one, 5 * one, ...`.
    pub fn fibonacci(one: Duration) -> Self {
        Schedule::<I, (Duration, Duration)>::unfold((Duration::ZERO, one), |(prev, curr)| {
            (*curr, prev.saturating_add(*curr))
        })
        .map(|(_, curr)| curr)
        .delayed(|output, _| *output)
    }
}

impl<I: 'static> Schedule<I, ()> {
    /// Continue forever with an unbounded delay.
    ///
    /// Drivers never resume after a step of this schedule, so
    /// `Schedule::never().repeat(..)` runs the block once and then suspends
    /// until the surrounding future is dropped.
    pub fn never() -> Self {
        Schedule::new(|_: &I| Decision::Continue {
            output: (),
            delay: Duration::MAX,
            next: Schedule::never(),
        })
    }

    /// Continue once, then stop.
    pub fn once() -> Self {
        Schedule::<I, u64>::recurs(1).void()
    }
}

impl<I: 'static, O: Clone + Send + Sync + 'static> Schedule<I, O> {
    /// Never stop; output `seed`, then `next(seed)`, `next(next(seed))`, ...
    ///
    /// All delays are zero.
    pub fn unfold<F>(seed: O, next: F) -> Self
    where
        F: Fn(&O) -> O + Send + Sync + 'static,
    {
        Self::unfold_shared(seed, Arc::new(next))
    }

    fn unfold_shared(seed: O, next: Arc<dyn Fn(&O) -> O + Send + Sync>) -> Self {
        Schedule::new(move |_: &I| Decision::Continue {
            output: seed.clone(),
            delay: Duration::ZERO,
            next: Self::unfold_shared(next(&seed), Arc::clone(&next)),
        })
    }
}
