//! Progress events emitted while the pipeline runs.

use crate::bundler::Error;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// How a step (or cleanup pseudo-step) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Completed successfully.
    Ok,
    /// Had nothing to do.
    Skip,
    /// Failed; the pipeline unwinds (or, for a cleanup, keeps unwinding).
    Error,
}

impl StepStatus {
    /// Four-column label used by the progress printer.
    pub fn label(self) -> &'static str {
        match self {
            StepStatus::Ok => " OK ",
            StepStatus::Skip => "SKIP",
            StepStatus::Error => "FAIL",
        }
    }
}

/// Kind of a progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressKind {
    /// A step is about to run.
    StepBegin {
        /// Title of the step.
        title: String,
    },
    /// The step that last began has finished.
    StepEnd {
        /// Outcome of the step.
        status: StepStatus,
    },
}

/// One progress report.
///
/// `total` is advisory: it grows when steps are added or reserved while the
/// run is in flight, so `current` may exceed a previously observed `total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Begin or end.
    pub kind: ProgressKind,
    /// Number of units (steps and cleanups) begun so far.
    pub current: usize,
    /// Declared number of units at emission time.
    pub total: usize,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ProgressKind::StepBegin { title } => {
                write!(f, "[{:>2}/{}] {}...", self.current, self.total, title)
            }
            ProgressKind::StepEnd { status } => write!(f, "[{}]", status.label()),
        }
    }
}

/// Everything a [`PipelineHandle`](super::PipelineHandle) stream yields.
///
/// A run yields any number of `Progress` events followed by exactly one
/// `Finish` or `Error`.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A step began or ended.
    Progress(ProgressEvent),
    /// All steps and cleanups completed.
    Finish,
    /// The run failed with the first error encountered.
    Error(Arc<Error>),
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::Progress(event) => event.fmt(f),
            PipelineEvent::Finish => f.write_str("finished"),
            PipelineEvent::Error(err) => write!(f, "failed: {err}"),
        }
    }
}

/// Synchronous progress observer. Runs on the executor task, so it may
/// register suspensions that the executor will wait for before moving on.
pub type ProgressListener = Box<dyn FnMut(&ProgressEvent) + Send>;

/// Fans progress out to listeners and the handle's event stream.
pub(crate) struct ProgressChannel {
    listeners: Vec<ProgressListener>,
    events: UnboundedSender<PipelineEvent>,
}

impl ProgressChannel {
    pub(crate) fn new(listeners: Vec<ProgressListener>, events: UnboundedSender<PipelineEvent>) -> Self {
        Self { listeners, events }
    }

    pub(crate) fn emit(&mut self, event: ProgressEvent) {
        log::debug!("{event}");
        for listener in &mut self.listeners {
            listener(&event);
        }
        // The handle may have been dropped; the run still completes.
        let _ = self.events.send(PipelineEvent::Progress(event));
    }

    pub(crate) fn terminate(&self, outcome: &Result<(), Arc<Error>>) {
        let event = match outcome {
            Ok(()) => PipelineEvent::Finish,
            Err(err) => PipelineEvent::Error(Arc::clone(err)),
        };
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_line_pads_single_digit_counter() {
        let event = ProgressEvent {
            kind: ProgressKind::StepBegin {
                title: "Looking for target".into(),
            },
            current: 1,
            total: 21,
        };
        assert_eq!(event.to_string(), "[ 1/21] Looking for target...");
    }

    #[test]
    fn end_line_uses_status_label() {
        let event = ProgressEvent {
            kind: ProgressKind::StepEnd {
                status: StepStatus::Skip,
            },
            current: 12,
            total: 21,
        };
        assert_eq!(event.to_string(), "[SKIP]");
    }
}
