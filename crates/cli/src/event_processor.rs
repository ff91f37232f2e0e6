//! Event processing utilities for CLI commands
//!
//! This module turns the [`WorkflowEvent`] stream of a running workflow into
//! terminal output and a process exit code. Both workflows use the same
//! processor; the form-based chat-server front end uses [`log_line`] to render
//! the same events as plain text for its log pane.
//!
//! # Usage
//!
//! ```rust,ignore
//! let processor = EventProcessor::new(reporter);
//! let exit_code = processor
//!     .process_events_with_handler(stream, |event, reporter| match event {
//!         WorkflowEvent::Output(_) if quiet => Some(true), // swallow output
//!         _ => None,                                      // default handling
//!     })
//!     .await;
//! ```
//!
//! The custom handler should return:
//! - `Some(true)` to continue processing after handling the event
//! - `Some(false)` to stop processing after handling the event
//! - `None` to use the default handling for the event

use futures::StreamExt;
use provision::workflow::{EventStream, StepError, WorkflowEvent, WorkflowFailure};

use crate::terminal_progress_reporter::TerminalProgressReporter;

/// Reported when a stream ends before its `Completed` event
pub(crate) const NO_RESULT: &str = "The workflow stopped without reporting a result.";

/// A reusable event processor for workflow runs
#[derive(Debug)]
pub struct EventProcessor {
    reporter: TerminalProgressReporter,
    verbose: bool,
}

impl EventProcessor {
    pub fn new(reporter: TerminalProgressReporter) -> Self {
        Self {
            reporter,
            verbose: false,
        }
    }

    /// Also print the command line of every step
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Drain `stream`, printing every event; returns 0 only if the run completed
    /// without a critical failure.
    pub async fn process_events(self, stream: EventStream) -> i32 {
        self.process_events_with_handler(stream, |_, _| None).await
    }

    /// Process events from the stream with a custom event handler
    pub async fn process_events_with_handler<F>(
        self,
        mut stream: EventStream,
        mut custom_handler: F,
    ) -> i32
    where
        F: FnMut(&WorkflowEvent, &TerminalProgressReporter) -> Option<bool>,
    {
        let mut exit_code = 0;

        while let Some(event) = stream.next().await {
            if let Some(should_continue) = custom_handler(&event, &self.reporter) {
                if !should_continue {
                    return exit_code;
                }
                continue;
            }

            if self.handle_event(event, &mut exit_code) {
                return exit_code;
            }
        }

        self.reporter.report_error(NO_RESULT);
        1
    }

    /// Handle a single event and update the exit code as needed
    ///
    /// Returns true if processing should stop
    fn handle_event(&self, event: WorkflowEvent, exit_code: &mut i32) -> bool {
        match event {
            WorkflowEvent::Started {
                workflow,
                total_steps,
            } => {
                tracing::debug!(workflow, total_steps, "processing workflow events");
            }

            WorkflowEvent::StageStarted {
                index,
                total,
                title,
            } => {
                self.reporter.report_header(index, total, title);
            }

            WorkflowEvent::StepStarted {
                index,
                total,
                title,
                command,
            } => {
                self.reporter
                    .report_progress(format!("[{index}/{total}] {title}"));
                if let Some(command) = command.filter(|_| self.verbose) {
                    TerminalProgressReporter::report(4, format!("$ {command}"));
                }
            }

            WorkflowEvent::Output(line) => self.reporter.report_output(&line),

            WorkflowEvent::StepSkipped { title, reason } => {
                self.reporter
                    .report_info(format!("Skipped '{title}': {reason}"));
            }

            WorkflowEvent::StepSucceeded { title, note } => {
                if let Some(note) = note {
                    self.reporter.report_info(note);
                }
                tracing::debug!(step = title, "step succeeded");
            }

            WorkflowEvent::StepFailed {
                title,
                error,
                critical: false,
            } => {
                self.reporter
                    .report_warning(format!("'{title}' failed, continuing: {error}"));
            }

            // Reported once, from `Completed`
            WorkflowEvent::StepFailed { critical: true, .. } => {}

            WorkflowEvent::Completed(Ok(summary)) => {
                for step in summary.best_effort_failures() {
                    self.reporter
                        .report_warning(format!("Needs manual attention: {step}"));
                }
                return true;
            }

            WorkflowEvent::Completed(Err(failure)) => {
                self.report_failure(&failure);
                *exit_code = 1;
                return true;
            }
        }

        false
    }

    fn report_failure(&self, failure: &WorkflowFailure) {
        self.reporter.report_error(failure);

        if let Some(diagnostic) = failure.error().diagnostic() {
            for line in diagnostic.lines() {
                TerminalProgressReporter::report(4, line);
            }
        }

        if failure.is_missing_tool() {
            self.reporter.report_suggestion(format!(
                "Install the program that '{}' needs and run again.",
                failure.step()
            ));
        }
    }
}

/// Plain-text rendering of an event, for the form's log pane
///
/// Returns `None` for events that carry nothing worth a line.
pub(crate) fn log_line(event: &WorkflowEvent) -> Option<String> {
    match event {
        WorkflowEvent::Started {
            workflow,
            total_steps,
        } => Some(format!("Starting {workflow} ({total_steps} steps)")),
        WorkflowEvent::StageStarted {
            index,
            total,
            title,
        } => Some(format!("--- {index}/{total}: {title} ---")),
        WorkflowEvent::StepStarted {
            index,
            total,
            title,
            command,
        } => Some(match command {
            Some(command) => format!("[{index}/{total}] {title}\n$ {command}"),
            None => format!("[{index}/{total}] {title}"),
        }),
        WorkflowEvent::Output(line) => Some(format!("    {}", line.text())),
        WorkflowEvent::StepSkipped { title, reason } => {
            Some(format!("Skipped '{title}': {reason}"))
        }
        WorkflowEvent::StepSucceeded { note, .. } => note.clone(),
        WorkflowEvent::StepFailed {
            title,
            error,
            critical,
        } => Some(describe_step_failure(title, error, *critical)),
        WorkflowEvent::Completed(Ok(summary)) => Some(format!(
            "Finished: {} steps run, {} skipped",
            summary.executed(),
            summary.skipped()
        )),
        WorkflowEvent::Completed(Err(failure)) => Some(format!("ABORTED: {failure}")),
    }
}

fn describe_step_failure(title: &str, error: &StepError, critical: bool) -> String {
    let mut text = if critical {
        format!("ERROR: '{title}' failed: {error}")
    } else {
        format!("WARNING: '{title}' failed, continuing: {error}")
    };
    if let Some(diagnostic) = error.diagnostic() {
        text.push('\n');
        text.push_str(diagnostic);
    }
    text
}
