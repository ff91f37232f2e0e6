use std::{fmt, path::PathBuf};

use crate::commands::CommandSpec;

/// What happens when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Criticality {
    /// Abort the workflow
    #[default]
    Critical,
    /// Report the failure as a warning and move on
    BestEffort,
}

/// Condition checked right before a step runs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Precheck {
    #[default]
    Always,
    SkipIfPathExists(PathBuf),
    SkipIfPathMissing(PathBuf),
    SkipIfCommandSucceeds(CommandSpec),
}

/// The unit of work a step performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Run an external program
    Run(CommandSpec),

    /// Create or replace a file, optionally setting its mode afterwards
    WriteFile {
        path: PathBuf,
        contents: String,
        mode: Option<u32>,
    },

    /// Append to a file that must already exist
    AppendFile { path: PathBuf, contents: String },

    /// Append `line` on its own line unless `needle` already occurs in the file
    AppendLineUnlessPresent {
        path: PathBuf,
        needle: String,
        line: String,
    },

    /// Write the concatenation of `inputs` to `output`
    Concatenate {
        inputs: Vec<PathBuf>,
        output: PathBuf,
        mode: Option<u32>,
    },
}

impl StepAction {
    /// The command line this action runs, if it runs one
    #[must_use]
    pub fn command(&self) -> Option<&CommandSpec> {
        match self {
            Self::Run(spec) => Some(spec),
            _ => None,
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(spec) => write!(f, "{spec}"),
            Self::WriteFile { path, .. } => write!(f, "write {}", path.display()),
            Self::AppendFile { path, .. } | Self::AppendLineUnlessPresent { path, .. } => {
                write!(f, "append to {}", path.display())
            }
            Self::Concatenate { output, .. } => write!(f, "concatenate into {}", output.display()),
        }
    }
}

/// One entry in a workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub(crate) title: String,
    pub(crate) action: StepAction,
    pub(crate) precheck: Precheck,
    pub(crate) criticality: Criticality,
}

impl Step {
    #[must_use]
    pub fn new(title: impl Into<String>, action: StepAction) -> Self {
        Self {
            title: title.into(),
            action,
            precheck: Precheck::Always,
            criticality: Criticality::Critical,
        }
    }

    #[must_use]
    pub fn run(title: impl Into<String>, command: CommandSpec) -> Self {
        Self::new(title, StepAction::Run(command))
    }

    #[must_use]
    pub fn write_file(
        title: impl Into<String>,
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
        mode: Option<u32>,
    ) -> Self {
        Self::new(
            title,
            StepAction::WriteFile {
                path: path.into(),
                contents: contents.into(),
                mode,
            },
        )
    }

    #[must_use]
    pub fn append_file(
        title: impl Into<String>,
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
    ) -> Self {
        Self::new(
            title,
            StepAction::AppendFile {
                path: path.into(),
                contents: contents.into(),
            },
        )
    }

    #[must_use]
    pub fn append_line_unless_present(
        title: impl Into<String>,
        path: impl Into<PathBuf>,
        needle: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        Self::new(
            title,
            StepAction::AppendLineUnlessPresent {
                path: path.into(),
                needle: needle.into(),
                line: line.into(),
            },
        )
    }

    #[must_use]
    pub fn concatenate(
        title: impl Into<String>,
        inputs: Vec<PathBuf>,
        output: impl Into<PathBuf>,
        mode: Option<u32>,
    ) -> Self {
        Self::new(
            title,
            StepAction::Concatenate {
                inputs,
                output: output.into(),
                mode,
            },
        )
    }

    #[must_use]
    pub fn skip_if_path_exists(mut self, path: impl Into<PathBuf>) -> Self {
        self.precheck = Precheck::SkipIfPathExists(path.into());
        self
    }

    #[must_use]
    pub fn skip_if_path_missing(mut self, path: impl Into<PathBuf>) -> Self {
        self.precheck = Precheck::SkipIfPathMissing(path.into());
        self
    }

    #[must_use]
    pub fn skip_if_command_succeeds(mut self, probe: CommandSpec) -> Self {
        self.precheck = Precheck::SkipIfCommandSucceeds(probe);
        self
    }

    #[must_use]
    pub fn best_effort(mut self) -> Self {
        self.criticality = Criticality::BestEffort;
        self
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn action(&self) -> &StepAction {
        &self.action
    }

    #[must_use]
    pub fn precheck(&self) -> &Precheck {
        &self.precheck
    }

    #[must_use]
    pub fn criticality(&self) -> Criticality {
        self.criticality
    }
}

/// A titled group of steps, e.g. `Installing 15 apt packages`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub(crate) title: String,
    pub(crate) steps: Vec<Step>,
}

impl Stage {
    #[must_use]
    pub fn new(title: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            title: title.into(),
            steps,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// An ordered list of stages, executed strictly in sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub(crate) name: String,
    pub(crate) stages: Vec<Stage>,
}

impl Workflow {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Add a stage. Stages without steps are dropped.
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        if !stage.steps.is_empty() {
            self.stages.push(stage);
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.stages.iter().flat_map(|stage| stage.steps.iter())
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.stages.iter().map(|stage| stage.steps.len()).sum()
    }
}
