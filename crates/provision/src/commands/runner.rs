//! Command execution abstractions and types
//!
//! This module provides the port for running external programs. A [`CommandSpec`]
//! describes one invocation (argv, working directory, environment overrides and an
//! optional timeout); a [`CommandRunner`] executes it, forwarding every output line to
//! an [`OutputObserver`] while the child is still running, and returns exactly one
//! terminal outcome.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use thiserror::Error;

/// A single line of output from a running command
///
/// Lines are delivered without their trailing newline. Bytes that are not valid
/// UTF-8 are replaced rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    /// A line read from standard output
    Stdout(String),
    /// A line read from standard error
    Stderr(String),
}

impl OutputLine {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Stdout(s) | Self::Stderr(s) => s,
        }
    }

    #[must_use]
    pub fn is_stderr(&self) -> bool {
        matches!(self, Self::Stderr(_))
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Sink for output produced by a running command
///
/// Implemented for any `FnMut(OutputLine) + Send` closure, so most callers never
/// name this trait directly.
pub trait OutputObserver: Send {
    fn on_line(&mut self, line: OutputLine);
}

impl<F> OutputObserver for F
where
    F: FnMut(OutputLine) + Send,
{
    fn on_line(&mut self, line: OutputLine) {
        self(line);
    }
}

/// Observer that discards everything; used for pre-check probes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl OutputObserver for NullObserver {
    fn on_line(&mut self, _line: OutputLine) {}
}

/// One external program invocation
///
/// The argument list is passed to the program as-is: there is no shell in between,
/// so spaces and metacharacters inside an argument are never reinterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    working_directory: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: None,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    /// Build a spec from a full argv, program first. Returns `None` for an empty argv.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next()?;
        Some(Self::new(program).args(argv))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Set an environment variable for the child, overriding any inherited value.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    #[must_use]
    pub fn envs(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().collect::<Vec<_>>().join(" "))
    }
}

/// Result of a successful command execution
///
/// Output is streamed to the observer, not stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub(crate) exit_code: i32,
    pub(crate) duration: Duration,
}

impl RunResult {
    #[must_use]
    pub fn new(exit_code: i32, duration: Duration) -> Self {
        Self {
            exit_code,
            duration,
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Lifecycle of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Succeeded,
    FailedExitCode,
    FailedToStart,
    TimedOut,
}

impl RunState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::NotStarted | Self::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not_started"),
            Self::Running => f.write_str("running"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::FailedExitCode => f.write_str("failed_exit_code"),
            Self::FailedToStart => f.write_str("failed_to_start"),
            Self::TimedOut => f.write_str("timed_out"),
        }
    }
}

/// Errors that can occur during command execution
///
/// `CannotStart` and `NonZeroExit` are kept apart on purpose: the first means the
/// underlying tool is missing or unusable, the second means the tool ran and
/// rejected what it was asked to do.
#[derive(Error, Debug, Clone)]
pub enum CommandError {
    /// The program could not be spawned
    #[error("Cannot start '{command}': {source}")]
    CannotStart {
        command: String,
        working_directory: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The program ran and exited with a non-zero code
    #[error("Command failed with exit code {exit_code}: {command}")]
    NonZeroExit {
        command: String,
        exit_code: i32,
        diagnostic: String,
        working_directory: PathBuf,
        duration: Duration,
    },

    /// The program was killed after exceeding its timeout
    #[error("Command timed out after {timeout:?}: {command}")]
    Timeout {
        command: String,
        timeout: Duration,
        working_directory: PathBuf,
    },

    /// Reading the program's output or waiting for it failed
    #[error("IO error while running '{command}': {source}")]
    Io {
        command: String,
        working_directory: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl CommandError {
    #[must_use]
    pub fn command(&self) -> &str {
        match self {
            Self::CannotStart { command, .. }
            | Self::NonZeroExit { command, .. }
            | Self::Timeout { command, .. }
            | Self::Io { command, .. } => command,
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Captured standard-error tail for a non-zero exit.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { diagnostic, .. } if !diagnostic.is_empty() => Some(diagnostic),
            _ => None,
        }
    }

    /// `true` when the executable itself could not be found.
    #[must_use]
    pub fn is_missing_tool(&self) -> bool {
        matches!(
            self,
            Self::CannotStart { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        match self {
            Self::CannotStart { .. } => RunState::FailedToStart,
            Self::NonZeroExit { .. } | Self::Io { .. } => RunState::FailedExitCode,
            Self::Timeout { .. } => RunState::TimedOut,
        }
    }
}

/// Port for command execution (Hexagonal Architecture)
///
/// Abstracts process spawning so workflows can be driven against a recording fake
/// in tests and against real processes in production.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Check whether `program` resolves to an executable on `PATH`
    ///
    /// Used before a workflow starts, so a missing package manager is reported as a
    /// missing tool instead of failing halfway through.
    async fn is_command_available(&self, program: &str) -> bool;

    /// Run a command to completion, streaming its output
    ///
    /// Every line the child writes is passed to `observer` as soon as it is read.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if:
    /// - The program cannot be started (`CannotStart`)
    /// - The program exits with a non-zero status (`NonZeroExit`)
    /// - The command's timeout expires (`Timeout`)
    /// - Relaying output fails (`Io`)
    async fn run(
        &self,
        command: &CommandSpec,
        observer: &mut dyn OutputObserver,
    ) -> Result<RunResult, CommandError>;

    /// Run a command silently and report whether it exited 0
    ///
    /// Any failure, including a failure to start, counts as `false`.
    async fn probe(&self, command: &CommandSpec) -> bool {
        self.run(command, &mut NullObserver).await.is_ok()
    }

    /// Kill every command this runner has started that is still running
    ///
    /// Their `run` calls return as failed. Runners without real children have
    /// nothing to kill.
    fn kill_running(&self) {}
}
