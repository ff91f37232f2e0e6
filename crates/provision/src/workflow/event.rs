use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::{sync::mpsc, task::AbortHandle};

use crate::commands::OutputLine;

use super::error::{StepError, WorkflowFailure};

pub type EventStream = Pin<Box<dyn Stream<Item = WorkflowEvent> + Send>>;

/// Everything a front end needs to follow a workflow run
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// The run has begun
    Started { workflow: String, total_steps: usize },

    /// A new stage has begun; `index` is 1-based
    StageStarted {
        index: usize,
        total: usize,
        title: String,
    },

    /// A step is about to run; `index` is 1-based across the whole workflow
    StepStarted {
        index: usize,
        total: usize,
        title: String,
        command: Option<String>,
    },

    /// A line of child output, in the order it was read
    Output(OutputLine),

    /// The step's pre-check said there was nothing to do
    StepSkipped { title: String, reason: String },

    StepSucceeded { title: String, note: Option<String> },

    /// `critical` is `false` for best-effort steps, after which the run continues
    StepFailed {
        title: String,
        error: StepError,
        critical: bool,
    },

    /// Always the last event of a run
    Completed(Result<WorkflowSummary, WorkflowFailure>),
}

impl WorkflowEvent {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Counts reported when a workflow finishes without a critical failure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowSummary {
    pub(crate) workflow: String,
    pub(crate) executed: usize,
    pub(crate) skipped: usize,
    pub(crate) best_effort_failures: Vec<String>,
}

impl WorkflowSummary {
    #[must_use]
    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    #[must_use]
    pub fn executed(&self) -> usize {
        self.executed
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Titles of best-effort steps that failed
    #[must_use]
    pub fn best_effort_failures(&self) -> &[String] {
        &self.best_effort_failures
    }
}

/// Sending half of a run's event channel
///
/// The channel is unbounded: output lines arrive from a synchronous observer
/// callback, which can neither wait for capacity nor drop a line.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<WorkflowEvent>,
}

impl EventSender {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        Self { tx }
    }

    /// Create a sender together with the stream that drains it
    #[must_use]
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), into_stream(rx))
    }

    pub(crate) fn send_started(&self, workflow: &str, total_steps: usize) {
        tracing::info!(workflow, total_steps, "workflow started");
        self.send(WorkflowEvent::Started {
            workflow: workflow.to_string(),
            total_steps,
        });
    }

    pub(crate) fn send_stage_started(&self, index: usize, total: usize, title: &str) {
        tracing::info!(stage = index, total, title, "stage started");
        self.send(WorkflowEvent::StageStarted {
            index,
            total,
            title: title.to_string(),
        });
    }

    pub(crate) fn send_step_started(
        &self,
        index: usize,
        total: usize,
        title: &str,
        command: Option<String>,
    ) {
        tracing::debug!(step = index, total, title, command = ?command, "step started");
        self.send(WorkflowEvent::StepStarted {
            index,
            total,
            title: title.to_string(),
            command,
        });
    }

    pub(crate) fn send_output(&self, line: OutputLine) {
        tracing::trace!(stderr = line.is_stderr(), line = line.text());
        self.send(WorkflowEvent::Output(line));
    }

    pub(crate) fn send_step_skipped(&self, title: &str, reason: String) {
        tracing::info!(title, reason = %reason, "step skipped");
        self.send(WorkflowEvent::StepSkipped {
            title: title.to_string(),
            reason,
        });
    }

    pub(crate) fn send_step_succeeded(&self, title: &str, note: Option<String>) {
        tracing::info!(title, note = ?note, "step succeeded");
        self.send(WorkflowEvent::StepSucceeded {
            title: title.to_string(),
            note,
        });
    }

    pub(crate) fn send_step_failed(&self, title: &str, error: StepError, critical: bool) {
        if critical {
            tracing::error!(title, error = %error, "step failed");
        } else {
            tracing::warn!(title, error = %error, "best-effort step failed");
        }
        self.send(WorkflowEvent::StepFailed {
            title: title.to_string(),
            error,
            critical,
        });
    }

    pub(crate) fn send_completed(&self, result: Result<WorkflowSummary, WorkflowFailure>) {
        match &result {
            Ok(summary) => tracing::info!(
                workflow = summary.workflow(),
                executed = summary.executed(),
                skipped = summary.skipped(),
                "workflow completed"
            ),
            Err(failure) => tracing::error!(step = failure.step(), "workflow aborted"),
        }
        self.send(WorkflowEvent::Completed(result));
    }

    fn send(&self, event: WorkflowEvent) {
        // Closed only once the stream is dropped, which also cancels a started run
        let _ = self.tx.send(event);
    }
}

pub(crate) fn into_stream(rx: mpsc::UnboundedReceiver<WorkflowEvent>) -> EventStream {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    }))
}

/// Events of a run started on a background task
///
/// Dropping the stream aborts that task, and with it the step in progress.
pub(crate) struct RunEvents {
    rx: mpsc::UnboundedReceiver<WorkflowEvent>,
    run: AbortHandle,
}

impl RunEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<WorkflowEvent>, run: AbortHandle) -> Self {
        Self { rx, run }
    }
}

impl Stream for RunEvents {
    type Item = WorkflowEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for RunEvents {
    fn drop(&mut self) {
        self.run.abort();
    }
}
