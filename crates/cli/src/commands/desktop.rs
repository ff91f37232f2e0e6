use std::sync::Arc;

use provision::{
    commands::CommandRunner,
    config::AppConfig,
    desktop::{desktop_workflow, plan_summary, required_tools},
    fs::real::RealFileSystem,
    privilege::PrivilegeCheck,
    workflow::WorkflowRunner,
};
use tracing::info;

use crate::{
    confirm::Confirmer, event_processor::EventProcessor,
    terminal_progress_reporter::TerminalProgressReporter,
};

/// Update the system and install the configured packages
///
/// Privilege and tool checks come first, then the plan and the prompt; nothing
/// is executed until the user agrees (or `assume_yes` is set).
pub(crate) async fn handle_desktop<P, CR, C>(
    config: &AppConfig,
    privilege: &P,
    runner: Arc<CR>,
    confirmer: &C,
    reporter: TerminalProgressReporter,
) -> i32
where
    P: PrivilegeCheck,
    CR: CommandRunner + 'static,
    C: Confirmer,
{
    info!("Provisioning the desktop");

    if !privilege.is_elevated() {
        reporter.report_error("The desktop setup needs root privileges.");
        reporter.report_suggestion("Run it again with sudo: `sudo provision-cli desktop`");
        return 1;
    }

    for tool in required_tools(config.desktop()) {
        if !runner.is_command_available(tool.program()).await {
            reporter.report_error(format!("Required tool '{tool}' was not found on PATH."));
            return 1;
        }
    }

    reporter.report_info("The following will be run:");
    for line in plan_summary(config.desktop()) {
        TerminalProgressReporter::report(2, format!("- {line}"));
    }

    if !config.assume_yes() && !confirmer.confirm("Continue with the installation?") {
        reporter.report_warning("Installation cancelled. Nothing was changed.");
        return 0;
    }

    let workflow = desktop_workflow(config.desktop(), config.command_timeout());
    let stream = WorkflowRunner::from_shared(runner, Arc::new(RealFileSystem)).start(workflow);

    let exit_code = EventProcessor::new(reporter)
        .verbose(config.verbose())
        .process_events(stream)
        .await;

    if exit_code == 0 {
        reporter.report_success("Desktop setup finished.");
    }

    exit_code
}
