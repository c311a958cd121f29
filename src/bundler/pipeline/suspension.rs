//! Suspension queue: pending operations the executor must wait for.
//!
//! Any holder of a [`Suspender`] can enqueue work. Only the executor drains
//! the queue, and it keeps draining until the queue stays empty, so entries
//! added while it waits are awaited too.

use super::lock;
use crate::bundler::{Error, Result};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

enum Pending {
    /// Operation running on the runtime.
    Task(JoinHandle<Result<()>>),
    /// Already settled with a failure (how `abort` is expressed).
    Failed(Error),
}

#[derive(Default)]
struct Queue {
    pending: Vec<Pending>,
    closed: bool,
}

/// Cloneable handle for registering suspensions and aborting a run.
#[derive(Clone, Default)]
pub struct Suspender {
    queue: Arc<Mutex<Queue>>,
}

impl std::fmt::Debug for Suspender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = lock(&self.queue);
        f.debug_struct("Suspender")
            .field("pending", &queue.pending.len())
            .field("closed", &queue.closed)
            .finish()
    }
}

impl Suspender {
    /// Holds the pipeline at its next drain point until `operation` settles.
    ///
    /// The operation is spawned immediately onto the current tokio runtime
    /// and runs alongside the current step. If it fails, the step it is
    /// attached to fails with the same error.
    ///
    /// Ignored once the run has terminated.
    pub fn wait_for<F>(&self, operation: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let mut queue = lock(&self.queue);
        if queue.closed {
            log::debug!("Ignoring suspension registered after the pipeline terminated");
            return;
        }
        queue.pending.push(Pending::Task(tokio::spawn(operation)));
    }

    /// Fails the run with `err` at the next drain point.
    ///
    /// A step that is already running is not interrupted. Once it returns,
    /// no further forward step starts and registered cleanups unwind.
    /// Ignored once the run has terminated.
    pub fn abort(&self, err: Error) {
        let mut queue = lock(&self.queue);
        if queue.closed {
            log::debug!("Ignoring abort after the pipeline terminated: {err}");
            return;
        }
        log::info!("Pipeline abort requested: {err}");
        queue.pending.push(Pending::Failed(err));
    }

    /// Whether the run has terminated.
    pub fn is_closed(&self) -> bool {
        lock(&self.queue).closed
    }

    /// Waits for every queued entry, including ones added meanwhile.
    ///
    /// All entries settle before this returns. The first failure in queue
    /// order is returned; later failures are logged.
    pub(crate) async fn drain(&self) -> Result<()> {
        let mut first_failure = None;
        loop {
            let batch = std::mem::take(&mut lock(&self.queue).pending);
            if batch.is_empty() {
                break;
            }
            for entry in batch {
                if let Err(err) = settle(entry).await {
                    match first_failure {
                        None => first_failure = Some(err),
                        Some(_) => log::warn!("Additional suspended operation failed: {err}"),
                    }
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Stops accepting entries and settles what is left. Failures are only
    /// logged because the outcome is already decided.
    pub(crate) async fn close(&self) {
        let leftovers = {
            let mut queue = lock(&self.queue);
            queue.closed = true;
            std::mem::take(&mut queue.pending)
        };
        for entry in leftovers {
            if let Err(err) = settle(entry).await {
                log::warn!("Suspended operation failed after the pipeline terminated: {err}");
            }
        }
    }
}

async fn settle(entry: Pending) -> Result<()> {
    match entry {
        Pending::Failed(err) => Err(err),
        Pending::Task(task) => match task.await {
            Ok(result) => result,
            Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Err(join) => Err(Error::GenericError(format!(
                "suspended operation was cancelled: {join}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn drain_on_empty_queue_is_ok() {
        let suspender = Suspender::default();
        assert!(suspender.drain().await.is_ok());
    }

    #[tokio::test]
    async fn drain_waits_for_entries_added_while_waiting() {
        let suspender = Suspender::default();
        let settled = Arc::new(AtomicUsize::new(0));

        let inner = suspender.clone();
        let counter = Arc::clone(&settled);
        suspender.wait_for(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let late = Arc::clone(&counter);
            inner.wait_for(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                late.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        suspender.drain().await.unwrap();
        assert_eq!(settled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_failure_in_queue_order_wins() {
        let suspender = Suspender::default();
        suspender.wait_for(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(Error::GenericError("first".into()))
        });
        suspender.abort(Error::Aborted("second".into()));

        let err = suspender.drain().await.unwrap_err();
        assert_eq!(err.to_string(), "first");
        // Everything settled, nothing left behind.
        assert!(suspender.drain().await.is_ok());
    }

    #[tokio::test]
    async fn closed_queue_ignores_new_entries() {
        let suspender = Suspender::default();
        suspender.close().await;
        assert!(suspender.is_closed());

        suspender.abort(Error::Aborted("late".into()));
        assert!(suspender.drain().await.is_ok());
    }
}
