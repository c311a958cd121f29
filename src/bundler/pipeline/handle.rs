//! Handle to a running pipeline.

use super::lock;
use super::progress::PipelineEvent;
use super::suspension::Suspender;
use crate::bundler::{Error, Result};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Settled result of a run. The error is shared so the outcome can be
/// queried any number of times.
pub type Outcome = std::result::Result<(), Arc<Error>>;

/// Returned by [`Pipeline::run`](super::Pipeline::run).
///
/// Dropping the handle does not cancel the run: steps and cleanups still run
/// to completion in the background.
pub struct PipelineHandle {
    suspender: Suspender,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    outcome: watch::Receiver<Option<Outcome>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    /// Message of an executor panic, re-raised by every later `outcome()`.
    panic: Mutex<Option<String>>,
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("suspender", &self.suspender)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

impl PipelineHandle {
    pub(crate) fn new(
        suspender: Suspender,
        events: mpsc::UnboundedReceiver<PipelineEvent>,
        outcome: watch::Receiver<Option<Outcome>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            suspender,
            events,
            outcome,
            task: tokio::sync::Mutex::new(Some(task)),
            panic: Mutex::new(None),
        }
    }

    /// Next progress or terminal event. `None` after the stream ended.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Fails the run with `err` at the earliest safe point.
    pub fn abort(&self, err: Error) {
        self.suspender.abort(err);
    }

    /// Holds the pipeline after the current step until `operation` settles.
    pub fn wait_for<F>(&self, operation: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.suspender.wait_for(operation);
    }

    /// Cloneable handle for aborting or suspending from other tasks.
    pub fn suspender(&self) -> Suspender {
        self.suspender.clone()
    }

    /// Whether the outcome has been published.
    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Waits for the run to terminate and returns its outcome.
    ///
    /// Repeated calls return the same outcome without running anything.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the executor, which signals a contract
    /// violation such as running an unknown cleanup id.
    pub async fn outcome(&self) -> Outcome {
        let mut receiver = self.outcome.clone();
        let settled = match receiver.wait_for(Option::is_some).await {
            Ok(value) => value.as_ref().cloned(),
            Err(_) => None,
        };
        if let Some(outcome) = settled {
            return outcome;
        }

        // The sender only goes away without an outcome if the task died.
        // The lock is held while joining so concurrent callers see the
        // recorded panic.
        let mut task = self.task.lock().await;
        if let Some(joining) = task.take() {
            if let Err(join) = joining.await {
                if join.is_panic() {
                    let payload = join.into_panic();
                    *lock(&self.panic) = Some(panic_message(&*payload));
                    drop(task);
                    std::panic::resume_unwind(payload);
                }
            }
        }
        drop(task);
        let message = lock(&self.panic).clone();
        if let Some(message) = message {
            panic!("{message}");
        }
        Err(Arc::new(Error::GenericError(
            "pipeline task ended without an outcome".into(),
        )))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "pipeline task panicked".to_string()
    }
}
