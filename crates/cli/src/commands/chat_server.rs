use std::{sync::Arc, time::Duration};

use anyhow::{Context, bail};
use provision::{
    chat_server::{ChatServerConfig, ChatServerPaths, REQUIRED_TOOL, chat_server_workflow},
    commands::CommandRunner,
    config::AppConfig,
    fs::real::RealFileSystem,
    log_sink::LogSink,
    privilege::{PrivilegeCheck, invoking_user_home},
    workflow::{Workflow, WorkflowRunner},
};
use tracing::info;

use crate::{
    confirm::Confirmer, event_processor::EventProcessor, tables::key_value_table,
    terminal_progress_reporter::TerminalProgressReporter, tui,
};

/// A validated chat-server run, ready to start
pub(crate) struct ChatServerPlan {
    pub(crate) paths: ChatServerPaths,
    pub(crate) workflow: Workflow,
}

/// Check everything that must hold before the first step runs
///
/// Resolves the target paths, validates the domain and renders the templates.
/// `source_home` is consulted only when the config names no source directory.
pub(crate) async fn plan<CR: CommandRunner>(
    config: &ChatServerConfig,
    runner: &CR,
    timeout: Option<Duration>,
    source_home: Option<std::path::PathBuf>,
) -> anyhow::Result<ChatServerPlan> {
    if !runner.is_command_available(REQUIRED_TOOL).await {
        bail!("Required tool '{REQUIRED_TOOL}' was not found on PATH.");
    }

    let paths = ChatServerPaths::resolve(config, source_home.as_deref())?;
    let workflow = chat_server_workflow(config, &paths, timeout)
        .with_context(|| format!("Cannot set up '{}'", config.domain()))?;

    Ok(ChatServerPlan { paths, workflow })
}

fn not_root(reporter: TerminalProgressReporter) -> i32 {
    reporter.report_error("The ejabberd installation needs root privileges.");
    reporter.report_suggestion("Run it again with sudo: `sudo provision-cli chat-server`");
    1
}

/// Plain-terminal chat-server installation
pub(crate) async fn handle_chat_server<P, CR, C>(
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
    info!("Installing the chat server");

    if !privilege.is_elevated() {
        return not_root(reporter);
    }

    let chat_server = config.chat_server();
    let plan = match plan(
        chat_server,
        runner.as_ref(),
        config.command_timeout(),
        invoking_user_home(),
    )
    .await
    {
        Ok(plan) => plan,
        Err(e) => {
            reporter.report_error(format!("{e:#}"));
            return 1;
        }
    };

    let summary = key_value_table([
        ("Domain", chat_server.domain().to_string()),
        ("Sources", plan.paths.source_dir.display().to_string()),
        ("Install prefix", plan.paths.install_prefix.display().to_string()),
        ("Certificate", plan.paths.bundle.display().to_string()),
        (
            "Hosts alias",
            if chat_server.update_hosts() {
                format!("added to {}", plan.paths.hosts_file.display())
            } else {
                "not requested".to_string()
            },
        ),
        ("Service unit", plan.paths.unit_file.display().to_string()),
    ]);
    reporter.report_info(format!(
        "ejabberd will be built and installed in {} steps:",
        plan.workflow.total_steps()
    ));
    println!("{summary}");

    if !config.assume_yes() && !confirmer.confirm("Continue with the installation?") {
        reporter.report_warning("Installation cancelled. Nothing was changed.");
        return 0;
    }

    let stream = WorkflowRunner::from_shared(runner, Arc::new(RealFileSystem)).start(plan.workflow);
    let exit_code = EventProcessor::new(reporter)
        .verbose(config.verbose())
        .process_events(stream)
        .await;

    if exit_code == 0 {
        reporter.report_success(format!(
            "ejabberd is installed and serving '{}'.",
            chat_server.domain()
        ));
    }

    exit_code
}

/// Form-based chat-server installation
///
/// The privilege check happens before the terminal is taken over, so its error
/// stays visible after exit.
pub(crate) async fn handle_chat_server_tui<P, CR>(
    config: AppConfig,
    privilege: &P,
    runner: Arc<CR>,
    log_sink: LogSink,
    reporter: TerminalProgressReporter,
) -> i32
where
    P: PrivilegeCheck,
    CR: CommandRunner + 'static,
{
    if !privilege.is_elevated() {
        return not_root(reporter);
    }

    match tui::run(config, runner, log_sink).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            reporter.report_error(format!("The installer window failed: {e:#}"));
            1
        }
    }
}
