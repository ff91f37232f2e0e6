use std::{path::Path, sync::Arc};

use tokio::sync::mpsc;
use tracing::instrument;

use crate::{
    commands::{CommandRunner, OutputLine},
    fs::{FileSystem, FileSystemError},
};

use super::{
    error::{StepError, WorkflowFailure},
    event::{EventSender, EventStream, RunEvents, WorkflowSummary},
    step::{Criticality, Precheck, Step, StepAction, Workflow},
};

/// Runs a [`Workflow`] step by step against a command runner and a file system
///
/// Steps execute strictly in order. The first failing `Critical` step ends the
/// run; a failing `BestEffort` step is reported and the run continues.
pub struct WorkflowRunner<CR, FS> {
    runner: Arc<CR>,
    fs: Arc<FS>,
}

impl<CR, FS> Clone for WorkflowRunner<CR, FS> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            fs: Arc::clone(&self.fs),
        }
    }
}

impl<CR, FS> WorkflowRunner<CR, FS>
where
    CR: CommandRunner + 'static,
    FS: FileSystem + 'static,
{
    pub fn new(runner: CR, fs: FS) -> Self {
        Self::from_shared(Arc::new(runner), Arc::new(fs))
    }

    pub fn from_shared(runner: Arc<CR>, fs: Arc<FS>) -> Self {
        Self { runner, fs }
    }

    /// Run `workflow` on a background task and return its event stream
    ///
    /// The stream ends after the single `Completed` event. Dropping it earlier
    /// cancels the run: the step in progress is killed and no later step starts.
    #[must_use]
    pub fn start(&self, workflow: Workflow) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = EventSender::new(tx);
        let this = self.clone();

        let run = tokio::spawn(async move {
            let _ = this.execute(&workflow, &events).await;
        });

        Box::pin(RunEvents::new(rx, run.abort_handle()))
    }

    /// Run `workflow` on the current task, sending events to `events`
    ///
    /// Emits `Started`, the per-stage and per-step events, and finally one
    /// `Completed` carrying the same value this returns.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowFailure`] for the first critical step that fails.
    #[instrument(skip_all, fields(workflow = workflow.name()))]
    pub async fn execute(
        &self,
        workflow: &Workflow,
        events: &EventSender,
    ) -> Result<WorkflowSummary, WorkflowFailure> {
        let result = self.drive(workflow, events).await;
        events.send_completed(result.clone());
        result
    }

    async fn drive(
        &self,
        workflow: &Workflow,
        events: &EventSender,
    ) -> Result<WorkflowSummary, WorkflowFailure> {
        let total_steps = workflow.total_steps();
        let total_stages = workflow.stages().len();
        let mut summary = WorkflowSummary {
            workflow: workflow.name().to_string(),
            ..WorkflowSummary::default()
        };

        events.send_started(workflow.name(), total_steps);

        let mut index = 0;
        for (stage_index, stage) in workflow.stages().iter().enumerate() {
            events.send_stage_started(stage_index + 1, total_stages, stage.title());

            for step in stage.steps() {
                index += 1;
                events.send_step_started(
                    index,
                    total_steps,
                    step.title(),
                    step.action().command().map(ToString::to_string),
                );

                if let Some(reason) = self.skip_reason(step).await {
                    summary.skipped += 1;
                    events.send_step_skipped(step.title(), reason);
                    continue;
                }

                match self.perform(step.action(), events).await {
                    Ok(note) => {
                        summary.executed += 1;
                        events.send_step_succeeded(step.title(), note);
                    }
                    Err(error) => match step.criticality() {
                        Criticality::Critical => {
                            events.send_step_failed(step.title(), error.clone(), true);
                            return Err(WorkflowFailure::new(step.title(), error));
                        }
                        Criticality::BestEffort => {
                            summary.executed += 1;
                            summary.best_effort_failures.push(step.title().to_string());
                            events.send_step_failed(step.title(), error, false);
                        }
                    },
                }
            }
        }

        Ok(summary)
    }

    async fn skip_reason(&self, step: &Step) -> Option<String> {
        match step.precheck() {
            Precheck::Always => None,
            Precheck::SkipIfPathExists(path) => self
                .fs
                .path_exists(path)
                .then(|| format!("{} already exists", path.display())),
            Precheck::SkipIfPathMissing(path) => (!self.fs.path_exists(path))
                .then(|| format!("{} does not exist", path.display())),
            Precheck::SkipIfCommandSucceeds(probe) => self
                .runner
                .probe(probe)
                .await
                .then(|| format!("`{probe}` succeeded")),
        }
    }

    /// Carry out one action; `Ok(Some(_))` is a note for the success event.
    async fn perform(
        &self,
        action: &StepAction,
        events: &EventSender,
    ) -> Result<Option<String>, StepError> {
        match action {
            StepAction::Run(command) => {
                let mut relay = |line: OutputLine| events.send_output(line);
                self.runner.run(command, &mut relay).await?;
                Ok(None)
            }
            StepAction::WriteFile {
                path,
                contents,
                mode,
            } => {
                self.fs.write_file(path, contents.as_bytes())?;
                self.apply_mode(path, *mode)?;
                Ok(None)
            }
            StepAction::AppendFile { path, contents } => {
                self.fs.append_file(path, contents.as_bytes())?;
                Ok(None)
            }
            StepAction::AppendLineUnlessPresent { path, needle, line } => {
                let existing = self.fs.read_file(path)?;
                if existing.contains(needle.as_str()) {
                    return Ok(Some(format!(
                        "'{needle}' already present in {}",
                        path.display()
                    )));
                }
                self.fs.append_file(path, format!("\n{line}\n").as_bytes())?;
                Ok(None)
            }
            StepAction::Concatenate {
                inputs,
                output,
                mode,
            } => {
                let mut bundle = String::new();
                for input in inputs {
                    bundle.push_str(&self.fs.read_file(input)?);
                }
                self.fs.write_file(output, bundle.as_bytes())?;
                self.apply_mode(output, *mode)?;
                Ok(None)
            }
        }
    }

    fn apply_mode(&self, path: &Path, mode: Option<u32>) -> Result<(), FileSystemError> {
        match mode {
            Some(mode) => self.fs.set_permissions(path, mode),
            None => Ok(()),
        }
    }
}
