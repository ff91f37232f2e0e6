//! Terminal progress reporting and output formatting
//!
//! Every user-facing line goes through [`TerminalProgressReporter::status_line`],
//! which picks an emoji prefix (with a plain-text fallback for terminals that
//! can't render Unicode) and, when enabled, a color for the message level.
//!
//! # Examples
//!
//! ```rust
//! use crate::terminal_progress_reporter::TerminalProgressReporter;
//!
//! let reporter = TerminalProgressReporter::new(true); // Enable colors
//! reporter.report_success("Desktop provisioning complete");
//! reporter.report_error("Step 'Running make' failed");
//! ```

use std::fmt::Display;

use console::{Emoji, style};
use provision::commands::OutputLine;

// Define emojis with fallbacks for terminals that don't support Unicode
static ERROR_EMOJI: Emoji<'_, '_> = Emoji("❌ ", "[E] ");
static INFO_EMOJI: Emoji<'_, '_> = Emoji("ℹ️ ", "[I] ");
static PROGRESS_EMOJI: Emoji<'_, '_> = Emoji("• ", " • ");
static SUGGESTION_EMOJI: Emoji<'_, '_> = Emoji("✨ ", "[S] ");
static SUCCESS_EMOJI: Emoji<'_, '_> = Emoji("✅ ", "OK ");
static WARN_EMOJI: Emoji<'_, '_> = Emoji("⚠️ ", "[W] ");

/// Severity of a status line
///
/// Each level has its own prefix and color so the nature of a line is clear
/// at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusLevel {
    Error,
    Info,
    Progress,
    Success,
    Suggestion,
    Warning,
}

/// Terminal progress reporter for consistent CLI output formatting
#[derive(Debug, Clone, Copy)]
pub struct TerminalProgressReporter {
    /// Whether to use colored output (respects user preference and terminal capabilities)
    use_colors: bool,
}

impl TerminalProgressReporter {
    #[must_use]
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format a status line with the prefix and styling for `level`
    ///
    /// Pure: returns the decorated string and prints nothing.
    pub(crate) fn status_line(self, level: StatusLevel, message: impl Display) -> String {
        let prefix = match level {
            StatusLevel::Error => ERROR_EMOJI,
            StatusLevel::Info => INFO_EMOJI,
            StatusLevel::Progress => PROGRESS_EMOJI,
            StatusLevel::Success => SUCCESS_EMOJI,
            StatusLevel::Suggestion => SUGGESTION_EMOJI,
            StatusLevel::Warning => WARN_EMOJI,
        };

        let formatted_message = if self.use_colors {
            match level {
                StatusLevel::Error => style(message).for_stderr().red().bold().to_string(),
                StatusLevel::Info => style(message).blue().to_string(),
                StatusLevel::Progress => style(message).dim().to_string(),
                StatusLevel::Success => style(message).green().to_string(),
                StatusLevel::Suggestion => {
                    return format!(
                        "{prefix}{}: {}",
                        style("Suggestion").yellow().bold(),
                        &message
                    );
                }
                StatusLevel::Warning => style(message).for_stderr().yellow().bold().to_string(),
            }
        } else {
            message.to_string()
        };

        format!("{prefix}{formatted_message}")
    }

    /// Format a message with the specified indentation
    pub(crate) fn format(indent: usize, message: impl Display) -> String {
        format!("{:indent$}{}", "", message, indent = indent)
    }

    /// `--- 2/4: Installing 15 apt packages ---`
    pub(crate) fn format_header(self, index: usize, total: usize, title: impl Display) -> String {
        let header = format!("--- {index}/{total}: {title} ---");
        if self.use_colors {
            style(header).cyan().bold().to_string()
        } else {
            header
        }
    }

    pub(crate) fn format_error(self, message: impl Display) -> String {
        self.status_line(StatusLevel::Error, message)
    }

    pub(crate) fn format_info(self, message: impl Display) -> String {
        self.status_line(StatusLevel::Info, message)
    }

    pub(crate) fn format_progress(self, message: impl Display) -> String {
        self.status_line(StatusLevel::Progress, message)
    }

    pub(crate) fn format_suggestion(self, message: impl Display) -> String {
        self.status_line(StatusLevel::Suggestion, message)
    }

    pub(crate) fn format_success(self, message: impl Display) -> String {
        self.status_line(StatusLevel::Success, message)
    }

    pub(crate) fn format_warning(self, message: impl Display) -> String {
        self.status_line(StatusLevel::Warning, message)
    }

    /// Print a message with the specified indentation to stdout
    pub(crate) fn report(indent: usize, message: impl Display) {
        println!("{}", Self::format(indent, message));
    }

    pub(crate) fn report_header(self, index: usize, total: usize, title: impl Display) {
        println!();
        println!("{}", self.format_header(index, total, title));
    }

    /// Relay one line of child output, keeping stdout and stderr apart
    pub(crate) fn report_output(self, line: &OutputLine) {
        match line {
            OutputLine::Stdout(text) => println!("{}", Self::format(4, text)),
            OutputLine::Stderr(text) if self.use_colors => {
                eprintln!("{}", Self::format(4, style(text).for_stderr().dim()));
            }
            OutputLine::Stderr(text) => eprintln!("{}", Self::format(4, text)),
        }
    }

    pub(crate) fn report_progress(self, message: impl Display) {
        println!("{}", self.format_progress(message));
    }

    pub(crate) fn report_success(self, message: impl Display) {
        println!("{}", self.format_success(message));
    }

    pub(crate) fn report_suggestion(self, message: impl Display) {
        println!("{}", self.format_suggestion(message));
    }

    pub(crate) fn report_info(self, message: impl Display) {
        println!("{}", self.format_info(message));
    }

    /// Print a formatted warning message to stderr
    pub(crate) fn report_warning(self, message: impl Display) {
        eprintln!("{}", self.format_warning(message));
    }

    /// Print a formatted error message to stderr
    ///
    /// Uses stderr for proper error stream handling in scripts and pipelines.
    pub(crate) fn report_error(self, message: impl Display) {
        eprintln!("{}", self.format_error(message));
    }
}
