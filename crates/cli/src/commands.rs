pub(crate) mod chat_server;
pub(crate) mod config;
pub(crate) mod desktop;

use std::{future::Future, path::PathBuf, sync::Arc};

use provision::{
    commands::{CommandRunner, ProcessCommandRunner},
    config::AppConfig,
    log_sink::LogSink,
    privilege::EffectiveUser,
};
use tracing::{debug, warn};

use crate::{
    cli::{ClapCommands, ConfigSubcommands},
    confirm::DialoguerConfirmer,
    terminal_progress_reporter::TerminalProgressReporter,
};

/// Everything a command handler needs from `main`
pub(crate) struct CommandContext {
    /// File config with CLI flags applied
    pub(crate) config: AppConfig,
    /// File config only, for `config` commands
    pub(crate) original_config: AppConfig,
    pub(crate) config_file_path: Option<PathBuf>,
    pub(crate) reporter: TerminalProgressReporter,
    /// Receives log output while the form owns the terminal
    pub(crate) log_sink: LogSink,
    pub(crate) use_tui: bool,
}

/// Exit code after Ctrl+C, the one a shell reports for SIGINT
pub(crate) const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Primary command dispatcher that routes to the appropriate command handler
///
/// Ctrl+C kills whatever command is running and exits with
/// [`INTERRUPTED_EXIT_CODE`]. The form puts the terminal in raw mode and
/// handles Ctrl+C itself, so it is not raced against the signal.
pub(crate) async fn dispatch_command(command: &ClapCommands, context: CommandContext) -> i32 {
    debug!("Dispatching command: {:?}", command);

    let runner = Arc::new(ProcessCommandRunner::new(context.config.command_timeout()));
    let reporter = context.reporter;

    if context.use_tui {
        return route(command, context, runner).await;
    }

    let work = route(command, context, Arc::clone(&runner));
    until_interrupted(work, ctrl_c(), runner.as_ref(), reporter).await
}

/// Drive `work` to its exit code unless `interrupt` resolves first, in which case
/// every command `runner` still has running is killed
async fn until_interrupted<CR>(
    work: impl Future<Output = i32>,
    interrupt: impl Future<Output = ()>,
    runner: &CR,
    reporter: TerminalProgressReporter,
) -> i32
where
    CR: CommandRunner + ?Sized,
{
    tokio::select! {
        exit_code = work => exit_code,
        () = interrupt => {
            warn!("Interrupted, stopping the running command");
            runner.kill_running();
            reporter.report_error("Interrupted. The system may be partially set up.");
            INTERRUPTED_EXIT_CODE
        }
    }
}

/// Resolves on Ctrl+C, or never if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

async fn route(
    command: &ClapCommands,
    context: CommandContext,
    runner: Arc<ProcessCommandRunner>,
) -> i32 {
    match command {
        ClapCommands::Desktop => {
            desktop::handle_desktop(
                &context.config,
                &EffectiveUser,
                runner,
                &DialoguerConfirmer,
                context.reporter,
            )
            .await
        }
        ClapCommands::ChatServer(_) if context.use_tui => {
            chat_server::handle_chat_server_tui(
                context.config,
                &EffectiveUser,
                runner,
                context.log_sink,
                context.reporter,
            )
            .await
        }
        ClapCommands::ChatServer(_) => {
            chat_server::handle_chat_server(
                &context.config,
                &EffectiveUser,
                runner,
                &DialoguerConfirmer,
                context.reporter,
            )
            .await
        }
        ClapCommands::Config(config_cmd) => match config_cmd.command {
            ConfigSubcommands::Validate => config::handle_validate(
                &context.original_config,
                context.config_file_path,
                context.reporter,
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision::commands::{CommandSpec, NullObserver};
    use std::time::{Duration, Instant};
    use test_common::ConfigDir;

    #[tokio::test]
    async fn test_interrupt_kills_the_running_command() {
        let scratch = ConfigDir::empty();
        let marker = scratch.path().join("late");
        let runner = ProcessCommandRunner::default();
        let spec = CommandSpec::new("sh").args([
            "-c".to_string(),
            format!("(sleep 0.5; touch '{}') & wait", marker.display()),
        ]);
        let work = async {
            let _ = runner.run(&spec, &mut NullObserver).await;
            0
        };

        let started = Instant::now();
        let exit_code = until_interrupted(
            work,
            tokio::time::sleep(Duration::from_millis(150)),
            &runner,
            TerminalProgressReporter::new(false),
        )
        .await;

        assert_eq!(exit_code, INTERRUPTED_EXIT_CODE);
        assert!(started.elapsed() < Duration::from_millis(500));
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_finished_work_keeps_its_exit_code() {
        let runner = ProcessCommandRunner::default();

        let exit_code = until_interrupted(
            async { 1 },
            std::future::pending::<()>(),
            &runner,
            TerminalProgressReporter::new(false),
        )
        .await;

        assert_eq!(exit_code, 1);
    }
}
