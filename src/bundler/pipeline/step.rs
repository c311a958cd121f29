//! Forward steps and their completion signal.

use super::StepControl;
use crate::bundler::Result;
use std::future::Future;
use std::pin::Pin;

/// Owned, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Successful completion of a step.
///
/// A step signals failure by returning `Err`. Returning is the only way to
/// complete, so a step completes exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The step did its work.
    Done,
    /// The step had nothing to do. Sequenced like success, reported as skip.
    Skipped,
}

/// Body of a forward step.
///
/// Receives the shared context and the control surface of the running
/// pipeline for the duration of the step only.
pub type StepAction<C> = Box<
    dyn for<'a> FnOnce(&'a mut C, &'a mut StepControl<C>) -> BoxFuture<'a, Result<Completion>>
        + Send,
>;

/// A named unit of forward work. Identified by position; titles may repeat.
pub struct Step<C> {
    pub(crate) title: String,
    pub(crate) action: StepAction<C>,
}

impl<C> Step<C> {
    /// Title shown in progress output.
    pub fn title(&self) -> &str {
        &self.title
    }
}

impl<C> std::fmt::Debug for Step<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}
