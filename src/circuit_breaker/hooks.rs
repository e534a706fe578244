use std::fmt;
use std::sync::Arc;

pub(crate) type Hook = Arc<dyn Fn() + Send + Sync>;

/// Observers of state transitions, called in registration order.
///
/// Hooks must not panic. A panicking `on_half_open` hook fails the trial
/// call; an `on_open` hook that panics while a trial is unwinding is caught
/// and logged.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) on_rejected: Vec<Hook>,
    pub(crate) on_closed: Vec<Hook>,
    pub(crate) on_half_open: Vec<Hook>,
    pub(crate) on_open: Vec<Hook>,
}

impl Hooks {
    pub(crate) fn rejected(&self) {
        run(&self.on_rejected);
    }

    pub(crate) fn closed(&self) {
        run(&self.on_closed);
    }

    pub(crate) fn half_open(&self) {
        run(&self.on_half_open);
    }

    pub(crate) fn opened(&self) {
        run(&self.on_open);
    }
}

fn run(hooks: &[Hook]) {
    for hook in hooks {
        hook();
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_rejected", &self.on_rejected.len())
            .field("on_closed", &self.on_closed.len())
            .field("on_half_open", &self.on_half_open.len())
            .field("on_open", &self.on_open.len())
            .finish()
    }
}
