use thiserror::Error;

use crate::{commands::CommandError, fs::FileSystemError};

/// Why a single step failed
#[derive(Error, Debug, Clone)]
pub enum StepError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    FileSystem(#[from] FileSystemError),
}

impl StepError {
    #[must_use]
    pub fn is_missing_tool(&self) -> bool {
        matches!(self, Self::Command(e) if e.is_missing_tool())
    }

    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Command(e) => e.exit_code(),
            Self::FileSystem(_) => None,
        }
    }

    /// Captured stderr tail, for failed commands
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Command(e) => e.diagnostic(),
            Self::FileSystem(_) => None,
        }
    }
}

/// A critical step failed and the workflow was aborted
#[derive(Error, Debug, Clone)]
#[error("Step '{step}' failed: {error}")]
pub struct WorkflowFailure {
    pub(crate) step: String,
    #[source]
    pub(crate) error: StepError,
}

impl WorkflowFailure {
    #[must_use]
    pub fn new(step: impl Into<String>, error: StepError) -> Self {
        Self {
            step: step.into(),
            error,
        }
    }

    #[must_use]
    pub fn step(&self) -> &str {
        &self.step
    }

    #[must_use]
    pub fn error(&self) -> &StepError {
        &self.error
    }

    #[must_use]
    pub fn is_missing_tool(&self) -> bool {
        self.error.is_missing_tool()
    }
}
