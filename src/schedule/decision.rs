//! The outcome of a single schedule step.

use std::fmt;
use std::time::Duration;

use super::Schedule;

/// What a [`Schedule`] decided after seeing one input.
///
/// Once a schedule answers `Done`, the driver stops and no further steps are
/// taken on that schedule instance.
pub enum Decision<I, O> {
    /// Stop, with a final output.
    Done(O),
    /// Go again after `delay`, consulting `next` for the following input.
    Continue {
        /// The output of this step.
        output: O,
        /// How long to wait before the next attempt.
        delay: Duration,
        /// The schedule that decides the next step.
        next: Schedule<I, O>,
    },
}

impl<I, O> Decision<I, O> {
    /// Returns `true` for [`Decision::Done`].
    pub fn is_done(&self) -> bool {
        matches!(self, Decision::Done(_))
    }

    /// Returns `true` for [`Decision::Continue`].
    pub fn is_continue(&self) -> bool {
        matches!(self, Decision::Continue { .. })
    }

    /// The output of this step, whichever variant it is.
    pub fn output(&self) -> &O {
        match self {
            Decision::Done(output) | Decision::Continue { output, .. } => output,
        }
    }

    /// Consume the decision, keeping only its output.
    pub fn into_output(self) -> O {
        match self {
            Decision::Done(output) | Decision::Continue { output, .. } => output,
        }
    }

    /// The delay before the next attempt, `None` when done.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Decision::Done(_) => None,
            Decision::Continue { delay, .. } => Some(*delay),
        }
    }

    /// The schedule to consult next, `None` when done.
    pub fn next(&self) -> Option<&Schedule<I, O>> {
        match self {
            Decision::Done(_) => None,
            Decision::Continue { next, .. } => Some(next),
        }
    }
}

impl<I, O: fmt::Debug> fmt::Debug for Decision<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Done(output) => f.debug_tuple("Done").field(output).finish(),
            Decision::Continue { output, delay, .. } => f
                .debug_struct("Continue")
                .field("output", output)
                .field("delay", delay)
                .finish_non_exhaustive(),
        }
    }
}
