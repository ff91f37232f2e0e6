//! A [`CommandRunner`] that records invocations instead of spawning processes.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use provision::commands::{
    CommandError, CommandRunner, CommandSpec, OutputLine, OutputObserver, RunResult,
};

type Hook = Arc<dyn Fn(&CommandSpec) + Send + Sync>;

/// Records every command it is asked to run and answers from a script
///
/// By default every program is available and every command exits 0 without
/// output. Failures, missing programs, output, and side effects are configured
/// with the builder methods.
///
/// # Example
/// ```rust
/// let runner = RecordingCommandRunner::new().fail_with("apt upgrade -y", 100);
/// ```
#[derive(Default)]
pub struct RecordingCommandRunner {
    invocations: Mutex<Vec<CommandSpec>>,
    failures: HashMap<String, (i32, String)>,
    missing: HashSet<String>,
    output: HashMap<String, Vec<OutputLine>>,
    hooks: HashMap<String, Hook>,
}

impl fmt::Debug for RecordingCommandRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingCommandRunner")
            .field("invocations", &self.rendered())
            .field("failures", &self.failures)
            .field("missing", &self.missing)
            .finish_non_exhaustive()
    }
}

impl RecordingCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` (rendered as the space-joined argv) exit with `exit_code`.
    #[must_use]
    pub fn fail_with(self, command: &str, exit_code: i32) -> Self {
        self.fail_with_diagnostic(command, exit_code, "")
    }

    #[must_use]
    pub fn fail_with_diagnostic(mut self, command: &str, exit_code: i32, stderr: &str) -> Self {
        self.failures
            .insert(command.to_string(), (exit_code, stderr.to_string()));
        self
    }

    /// Make `program` unavailable: availability checks fail and running it is
    /// a `CannotStart` with `NotFound`.
    #[must_use]
    pub fn missing_program(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    /// Lines `command` writes before exiting.
    #[must_use]
    pub fn with_output(mut self, command: &str, lines: Vec<OutputLine>) -> Self {
        self.output.insert(command.to_string(), lines);
        self
    }

    /// Run `hook` whenever `program` is invoked, e.g. to create the files a real
    /// tool would have written.
    #[must_use]
    pub fn with_hook<F>(mut self, program: &str, hook: F) -> Self
    where
        F: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.hooks.insert(program.to_string(), Arc::new(hook));
        self
    }

    #[must_use]
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Every invocation rendered as its space-joined argv
    #[must_use]
    pub fn rendered(&self) -> Vec<String> {
        self.invocations().iter().map(ToString::to_string).collect()
    }

    /// How many invocations ran `program`
    #[must_use]
    pub fn count_program(&self, program: &str) -> usize {
        self.invocations()
            .iter()
            .filter(|spec| spec.program() == program)
            .count()
    }
}

#[async_trait]
impl CommandRunner for RecordingCommandRunner {
    async fn is_command_available(&self, program: &str) -> bool {
        !self.missing.contains(program)
    }

    async fn run(
        &self,
        command: &CommandSpec,
        observer: &mut dyn OutputObserver,
    ) -> Result<RunResult, CommandError> {
        let rendered = command.to_string();
        let working_directory = command
            .working_directory()
            .map_or_else(|| PathBuf::from("."), PathBuf::from);

        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(command.clone());
        }

        if self.missing.contains(command.program()) {
            return Err(CommandError::CannotStart {
                command: rendered,
                working_directory,
                source: Arc::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "No such file or directory",
                )),
            });
        }

        for line in self.output.get(&rendered).into_iter().flatten() {
            observer.on_line(line.clone());
        }

        if let Some(hook) = self.hooks.get(command.program()) {
            hook(command);
        }

        match self.failures.get(&rendered) {
            Some((exit_code, diagnostic)) => {
                if !diagnostic.is_empty() {
                    observer.on_line(OutputLine::Stderr(diagnostic.clone()));
                }
                Err(CommandError::NonZeroExit {
                    command: rendered,
                    exit_code: *exit_code,
                    diagnostic: diagnostic.clone(),
                    working_directory,
                    duration: Duration::ZERO,
                })
            }
            None => Ok(RunResult::new(0, Duration::ZERO)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision::commands::NullObserver;

    #[tokio::test]
    async fn test_records_and_fails_by_rendered_command() {
        let runner = RecordingCommandRunner::new().fail_with("apt upgrade -y", 100);

        let ok = runner
            .run(&CommandSpec::new("apt").arg("update"), &mut NullObserver)
            .await;
        let err = runner
            .run(&CommandSpec::new("apt").args(["upgrade", "-y"]), &mut NullObserver)
            .await;

        assert!(ok.is_ok());
        assert_eq!(err.unwrap_err().exit_code(), Some(100));
        assert_eq!(runner.rendered(), vec!["apt update", "apt upgrade -y"]);
        assert_eq!(runner.count_program("apt"), 2);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = RecordingCommandRunner::new().missing_program("snap");

        assert!(!runner.is_command_available("snap").await);
        assert!(runner.is_command_available("apt").await);

        let err = runner
            .run(&CommandSpec::new("snap").arg("install"), &mut NullObserver)
            .await
            .unwrap_err();
        assert!(err.is_missing_tool());
    }

    #[tokio::test]
    async fn test_output_and_hooks() {
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        let runner = RecordingCommandRunner::new()
            .with_output("make", vec![OutputLine::Stdout("CC main.o".into())])
            .with_hook("make", move |_| *counter.lock().unwrap() += 1);

        let mut lines = Vec::new();
        runner
            .run(&CommandSpec::new("make"), &mut |line: OutputLine| {
                lines.push(line)
            })
            .await
            .unwrap();

        assert_eq!(lines, vec![OutputLine::Stdout("CC main.o".into())]);
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
