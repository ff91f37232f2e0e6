// src/cli.rs
use clap::{Args, Parser, Subcommand, ValueEnum};

/// provision - Ubuntu desktop setup and ejabberd installation
///
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct ClapCli {
    /// Show detailed output
    ///
    #[clap(long, short = 'v', global = true, default_value_t = false)]
    pub(crate) verbose: bool,

    /// Disable colored output
    ///
    #[clap(long, global = true, default_value_t = false)]
    pub(crate) no_color: bool,

    /// Kill any single command that runs longer than this many seconds (0 disables)
    ///
    #[clap(long, global = true, value_name = "SECONDS")]
    pub(crate) timeout: Option<u64>,

    /// Don't ask for confirmation before changing the system
    ///
    #[clap(long, short = 'y', global = true, default_value_t = false)]
    pub(crate) yes: bool,

    /// Log level (overrides PROVISION_LOG)
    ///
    #[clap(long, global = true, value_enum)]
    pub(crate) log_level: Option<LogLevel>,

    /// Subcommand to execute
    ///
    #[clap(subcommand)]
    pub(crate) command: ClapCommands,
}

impl ClapCli {
    /// The chat-server form is used unless `--no-tui` was given.
    ///
    /// Whether a terminal is attached is checked separately.
    pub(crate) fn requests_tui(&self) -> bool {
        matches!(&self.command, ClapCommands::ChatServer(args) if !args.no_tui)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum ClapCommands {
    /// Update the system and install the configured apt and snap packages
    ///
    Desktop,

    /// Build, install and register the ejabberd XMPP server
    ///
    ChatServer(ChatServerArgs),

    /// Configuration management commands
    ///
    Config(ConfigCommands),
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ChatServerArgs {
    /// XMPP domain to serve (overrides the config file)
    #[clap(long)]
    pub(crate) domain: Option<String>,

    /// Map the domain to 127.0.0.1 in the hosts file
    #[clap(long, default_value_t = false)]
    pub(crate) update_hosts: bool,

    /// Print progress to the terminal instead of opening the form
    #[clap(long, default_value_t = false)]
    pub(crate) no_tui: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ConfigCommands {
    #[clap(subcommand)]
    pub(crate) command: ConfigSubcommands,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum ConfigSubcommands {
    /// Validate the provision configuration
    Validate,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
