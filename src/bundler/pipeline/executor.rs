//! Sequential executor and cleanup unwinder.
//!
//! The run has three phases. Forward: steps are popped and run one at a time,
//! with the suspension queue drained after each one. Unwinding: once the
//! forward phase ends, for success or failure, every cleanup still
//! registered runs as a pseudo-step, most recent first. Terminal: the
//! outcome is published and never changes again.
//!
//! The first error is the outcome. Cleanup failures after it are logged
//! and do not stop the remaining cleanups.

use super::cleanup::{CleanupAction, CleanupStep};
use super::control::StepControl;
use super::handle::Outcome;
use super::progress::{ProgressChannel, ProgressEvent, ProgressKind, StepStatus};
use super::step::{Completion, Step, StepAction};
use crate::bundler::{Error, Result};
use std::sync::Arc;
use tokio::sync::watch;

/// A unit the executor can run with progress bookkeeping.
enum Work<C> {
    Forward(StepAction<C>),
    Cleanup(CleanupAction),
}

pub(crate) struct Executor<C> {
    context: C,
    control: StepControl<C>,
    progress: ProgressChannel,
    outcome: watch::Sender<Option<Outcome>>,
}

impl<C: Send + 'static> Executor<C> {
    pub(crate) fn new(
        context: C,
        control: StepControl<C>,
        progress: ProgressChannel,
        outcome: watch::Sender<Option<Outcome>>,
    ) -> Self {
        Self {
            context,
            control,
            progress,
            outcome,
        }
    }

    /// Runs to the terminal state and publishes the outcome.
    pub(crate) async fn run(mut self) {
        let failure = self.run_forward().await.err();
        let result = self.unwind(failure).await;
        self.control.suspender.close().await;

        let outcome = result.map_err(Arc::new);
        match &outcome {
            Ok(()) => log::info!(
                "Pipeline finished ({} of {} steps)",
                self.control.state.current_step,
                self.control.state.total_steps
            ),
            Err(err) => log::error!("Pipeline failed: {err}"),
        }
        self.progress.terminate(&outcome);
        self.outcome.send_replace(Some(outcome));
    }

    async fn run_forward(&mut self) -> Result<()> {
        loop {
            // Picks up aborts and suspensions registered by progress
            // listeners after the previous step ended.
            self.control.suspender.drain().await?;

            let Some(Step { title, action }) = self.control.steps.pop_front() else {
                return Ok(());
            };
            self.run_unit(title, Work::Forward(action)).await?;
        }
    }

    async fn unwind(&mut self, mut failure: Option<Error>) -> Result<()> {
        if let Some(err) = &failure {
            self.control.state.has_errored = true;
            log::warn!(
                "Unwinding {} cleanup step(s) after failure: {err}",
                self.control.cleanups.len()
            );
        }

        while let Some((id, CleanupStep { title, action })) = self.control.cleanups.pop_latest() {
            if let Err(err) = self.run_unit(title, Work::Cleanup(action)).await {
                match failure {
                    None => failure = Some(err),
                    Some(_) => log::error!("Cleanup `{id}` failed: {err}"),
                }
            }
        }

        failure.map_or(Ok(()), Err)
    }

    /// Runs one step or cleanup between a begin and an end event.
    ///
    /// Suspensions queued while a forward step ran are settled before the
    /// end event, so their failure is reported as the step's failure. A
    /// cleanup's status comes from its action alone; failures drained after
    /// it are logged.
    async fn run_unit(&mut self, title: String, work: Work<C>) -> Result<Completion> {
        self.control.state.current_step += 1;
        self.emit(ProgressKind::StepBegin {
            title: title.clone(),
        });

        let result = match work {
            Work::Forward(action) => {
                let result = action(&mut self.context, &mut self.control).await;
                let settled = self.control.suspender.drain().await;
                match (result, settled) {
                    (Ok(completion), Ok(())) => Ok(completion),
                    (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
                    (Err(err), Err(secondary)) => {
                        log::warn!("Suspended operation of `{title}` also failed: {secondary}");
                        Err(err)
                    }
                }
            }
            Work::Cleanup(action) => {
                let result = action(self.control.state.has_errored).await;
                if let Err(err) = self.control.suspender.drain().await {
                    log::warn!("Ignoring failure raised while `{title}` ran: {err}");
                }
                result.map(|()| Completion::Done)
            }
        };

        let status = match &result {
            Ok(Completion::Done) => StepStatus::Ok,
            Ok(Completion::Skipped) => StepStatus::Skip,
            Err(err) => {
                log::debug!("`{title}` failed: {err}");
                self.control.state.has_errored = true;
                StepStatus::Error
            }
        };
        self.emit(ProgressKind::StepEnd { status });

        result
    }

    fn emit(&mut self, kind: ProgressKind) {
        let event = ProgressEvent {
            kind,
            current: self.control.state.current_step,
            total: self.control.state.total_steps,
        };
        self.progress.emit(event);
    }
}
