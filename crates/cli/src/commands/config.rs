use std::path::PathBuf;

use provision::config::AppConfig;
use tracing::info;

use crate::{tables::ValidationTableReporter, terminal_progress_reporter::TerminalProgressReporter};

pub(crate) fn handle_validate(
    original_config: &AppConfig,
    config_file_path: Option<PathBuf>,
    reporter: TerminalProgressReporter,
) -> i32 {
    info!("Validating configuration");

    let result = original_config.validate(config_file_path);

    match result.config_file_path() {
        Some(path) => reporter.report_info(format!("Config file: {}", path.display())),
        None => reporter.report_info("No config file found; checking the built-in defaults."),
    }

    let issues = result.issues();
    if issues.is_empty() {
        reporter.report_success("Configuration is valid.");
        return 0;
    }

    let mut table_reporter = ValidationTableReporter::new();
    table_reporter
        .setup(vec!["Category", "Field", "Message", "Suggestion"])
        .add_validation_errors(&issues.errors(), reporter)
        .add_validation_warnings(&issues.warnings(), reporter);
    table_reporter.print();

    if issues.has_errors() {
        reporter.report_error("Validation failed.");
        1
    } else {
        reporter.report_success("Configuration is valid (with warnings).");
        0
    }
}
