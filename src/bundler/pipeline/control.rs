//! What a running step sees of its pipeline.

use super::cleanup::{CleanupRegistry, CleanupStep};
use super::step::{BoxFuture, Completion, Step};
use super::suspension::Suspender;
use crate::bundler::{Error, Result};
use std::collections::VecDeque;
use std::future::Future;

/// Counters and failure flag of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionState {
    /// Declared units of work: added steps plus reserved slots.
    pub total_steps: usize,
    /// Units begun so far, forward steps and cleanups alike.
    pub current_step: usize,
    /// Set once the run has a primary failure.
    pub has_errored: bool,
}

/// Registry and counters of a pipeline, lent to each step while it runs.
///
/// Before the run this is owned by [`Pipeline`](super::Pipeline); during the
/// run by the executor. Steps never see it concurrently.
pub struct StepControl<C> {
    pub(crate) steps: VecDeque<Step<C>>,
    pub(crate) cleanups: CleanupRegistry,
    pub(crate) state: ExecutionState,
    pub(crate) suspender: Suspender,
}

impl<C> Default for StepControl<C> {
    fn default() -> Self {
        Self {
            steps: VecDeque::new(),
            cleanups: CleanupRegistry::default(),
            state: ExecutionState::default(),
            suspender: Suspender::default(),
        }
    }
}

impl<C> std::fmt::Debug for StepControl<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepControl")
            .field("pending_steps", &self.steps.len())
            .field("cleanups", &self.cleanups.len())
            .field("state", &self.state)
            .finish()
    }
}

impl<C> StepControl<C> {
    /// Appends a forward step and counts it toward the total.
    pub fn add_step<F>(&mut self, title: impl Into<String>, action: F)
    where
        F: for<'a> FnOnce(&'a mut C, &'a mut StepControl<C>) -> BoxFuture<'a, Result<Completion>>
            + Send
            + 'static,
    {
        self.state.total_steps += 1;
        self.steps.push_back(Step {
            title: title.into(),
            action: Box::new(action),
        });
    }

    /// Registers a compensating action under a unique id.
    ///
    /// Cleanups run most recent first when the run fails, and as trailing
    /// pseudo-steps when it succeeds. They do not count toward the total;
    /// reserve slots for them with [`expect_additional`](Self::expect_additional).
    ///
    /// # Panics
    ///
    /// If `id` is registered and not yet consumed.
    pub fn add_cleanup_step<F, Fut>(&mut self, id: impl Into<String>, title: impl Into<String>, action: F)
    where
        F: FnOnce(bool) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.cleanups
            .register(id.into(), CleanupStep::new(title.into(), action));
    }

    /// Reserves `n` more progress slots without adding steps.
    pub fn expect_additional(&mut self, n: usize) {
        self.state.total_steps += n;
    }

    /// Runs and removes the cleanup registered under `id` right away.
    ///
    /// Used to release a resource as soon as it is no longer needed. No
    /// progress is reported; the work belongs to the calling step.
    ///
    /// # Panics
    ///
    /// If `id` is unknown or already consumed.
    pub async fn run_cleanup(&mut self, id: &str) -> Result<()> {
        let cleanup = self.cleanups.take(id);
        log::debug!("Running cleanup `{id}` on demand");
        (cleanup.action)(self.state.has_errored).await
    }

    /// Whether cleanup `id` is still registered.
    pub fn has_cleanup(&self, id: &str) -> bool {
        self.cleanups.contains(id)
    }

    /// Holds the pipeline after this step until `operation` settles.
    pub fn wait_for<F>(&self, operation: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.suspender.wait_for(operation);
    }

    /// Fails the run at the next drain point.
    pub fn abort(&self, err: Error) {
        self.suspender.abort(err);
    }

    /// Handle for registering suspensions from other tasks.
    pub fn suspender(&self) -> Suspender {
        self.suspender.clone()
    }

    /// Whether the run has already failed.
    pub fn has_errored(&self) -> bool {
        self.state.has_errored
    }

    /// Snapshot of the run counters.
    pub fn state(&self) -> ExecutionState {
        self.state
    }
}
