//! Step pipeline with a compensating cleanup stack.
//!
//! A [`Pipeline`] is an ordered list of named async steps run strictly one
//! at a time against one exclusively owned context value. Steps register
//! cleanup actions as they acquire resources (temporary images, mounted
//! volumes). Whether the run succeeds or fails, every cleanup still
//! registered at the end runs in reverse registration order.
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_dmg::bundler::pipeline::{Completion, Pipeline};
//!
//! # async fn example() {
//! let mut pipeline = Pipeline::<Vec<String>>::new();
//! pipeline.add_step("Creating resource", |log, ctl| {
//!     Box::pin(async move {
//!         log.push("created".into());
//!         ctl.add_cleanup_step("resource", "Removing resource", |_has_errored| async { Ok(()) });
//!         Ok(Completion::Done)
//!     })
//! });
//! pipeline.expect_additional(1);
//!
//! let handle = pipeline.run(Vec::new());
//! handle.outcome().await.expect("pipeline failed");
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`step`] - forward steps and their completion signal
//! - [`cleanup`] - the undo stack
//! - [`control`] - what a running step may do to its pipeline
//! - [`suspension`] - operations the executor waits for between steps
//! - [`progress`] - begin/end events
//! - [`handle`] - events, abort and outcome of a started run

pub mod cleanup;
pub mod control;
mod executor;
pub mod handle;
pub mod progress;
pub mod step;
pub mod suspension;

pub use cleanup::CleanupStep;
pub use control::{ExecutionState, StepControl};
pub use handle::{Outcome, PipelineHandle};
pub use progress::{PipelineEvent, ProgressEvent, ProgressKind, ProgressListener, StepStatus};
pub use step::{BoxFuture, Completion, Step};
pub use suspension::Suspender;

use crate::bundler::Result;
use executor::Executor;
use progress::ProgressChannel;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};

/// Locks a mutex, ignoring poisoning. Critical sections here never leave
/// data half-updated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for one run. Not reusable: [`run`](Self::run) consumes it.
pub struct Pipeline<C> {
    control: StepControl<C>,
    listeners: Vec<ProgressListener>,
}

impl<C> Default for Pipeline<C> {
    fn default() -> Self {
        Self {
            control: StepControl::default(),
            listeners: Vec::new(),
        }
    }
}

impl<C> std::fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("control", &self.control)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<C: Send + 'static> Pipeline<C> {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step. See [`StepControl::add_step`].
    pub fn add_step<F>(&mut self, title: impl Into<String>, action: F)
    where
        F: for<'a> FnOnce(&'a mut C, &'a mut StepControl<C>) -> BoxFuture<'a, Result<Completion>>
            + Send
            + 'static,
    {
        self.control.add_step(title, action);
    }

    /// Registers a cleanup. See [`StepControl::add_cleanup_step`].
    pub fn add_cleanup_step<F, Fut>(&mut self, id: impl Into<String>, title: impl Into<String>, action: F)
    where
        F: FnOnce(bool) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.control.add_cleanup_step(id, title, action);
    }

    /// Reserves progress slots. See [`StepControl::expect_additional`].
    pub fn expect_additional(&mut self, n: usize) {
        self.control.expect_additional(n);
    }

    /// Adds a synchronous progress listener.
    ///
    /// Listeners run on the executor between a step's events, so a listener
    /// that registers a suspension (through a [`Suspender`] from
    /// [`suspender`](Self::suspender)) holds back the next step.
    pub fn on_progress<F>(&mut self, listener: F)
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Handle for suspending or aborting the run once started.
    pub fn suspender(&self) -> Suspender {
        self.control.suspender()
    }

    /// Counters as declared so far.
    pub fn state(&self) -> ExecutionState {
        self.control.state()
    }

    /// Titles of the forward steps added so far, in run order.
    pub fn step_titles(&self) -> impl Iterator<Item = &str> {
        self.control.steps.iter().map(Step::title)
    }

    /// Starts the run on the current tokio runtime.
    pub fn run(self, context: C) -> PipelineHandle {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let suspender = self.control.suspender();

        log::debug!(
            "Starting pipeline with {} declared steps",
            self.control.state.total_steps
        );
        let executor = Executor::new(
            context,
            self.control,
            ProgressChannel::new(self.listeners, event_tx),
            outcome_tx,
        );
        let task = tokio::spawn(executor.run());

        PipelineHandle::new(suspender, event_rx, outcome_rx, task)
    }
}
