mod cli;
mod commands;
mod config;
mod confirm;
mod event_processor;
mod logging;
mod tables;
mod terminal_progress_reporter;
mod tui;

use std::{
    io::{self, IsTerminal},
    process,
};

use clap::Parser;
use provision::{
    config::{ApplyToConfig, ConfigLoader, YamlLoader},
    fs::real::RealFileSystem,
    log_sink::LogSink,
};
use terminal_progress_reporter::TerminalProgressReporter;
use tracing::debug;

use crate::{
    cli::ClapCli,
    commands::{CommandContext, dispatch_command},
    logging::{LogTarget, init_logging},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ClapCli::parse();

    // The form owns the terminal, so logs go to its pane instead of stderr.
    let use_tui = args.requests_tui() && io::stdout().is_terminal();
    let log_sink = LogSink::new();
    let target = if use_tui {
        LogTarget::Sink(log_sink.clone())
    } else {
        LogTarget::Stderr
    };
    init_logging(args.log_level, target)?;

    debug!("CLI arguments: {:#?}", &args);

    let fs = RealFileSystem;
    let loader = YamlLoader::new(&fs);

    // Use `config` for most things; use `original_config` for `config` commands, where we want to
    // deal strictly with the config file.
    let (config, original_config) = {
        // 1. Load config.yaml, or the defaults if there is none
        let config = loader.load_config_or_default()?;

        // 2. Apply CLI args to config (overriding)
        (args.apply_to_config(config.clone()), config)
    };
    let config_file_path = loader
        .find_config_file_paths()
        .ok()
        .and_then(|paths| paths.into_iter().next());

    debug!("Final config: {:#?}", &config);

    let reporter = TerminalProgressReporter::new(config.use_colors());

    // 3. Dispatch and execute the requested command
    let context = CommandContext {
        config,
        original_config,
        config_file_path,
        reporter,
        log_sink,
        use_tui,
    };
    let exit_code = dispatch_command(&args.command, context).await;

    process::exit(exit_code)
}
