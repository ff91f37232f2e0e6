pub mod loader;
pub mod validate;

pub use loader::{ApplyToConfig, ConfigLoadError, ConfigLoader, Yaml as YamlLoader};
pub use validate::ValidationResult;

use std::{num::NonZeroU64, time::Duration};

use serde::Deserialize;

use crate::{chat_server::ChatServerConfig, desktop::DesktopConfig};

const VERBOSE_DEFAULT: bool = false;
const USE_COLORS_DEFAULT: bool = true;
const ASSUME_YES_DEFAULT: bool = false;

/// Application configuration: the config file with CLI flags applied on top
///
/// Every field has a default, so an absent or partial config file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // UI settings
    pub(crate) verbose: bool,
    pub(crate) use_colors: bool,
    pub(crate) assume_yes: bool,

    // Execution settings
    /// Per-command timeout in seconds; unset means commands may run forever
    pub(crate) command_timeout: Option<NonZeroU64>,

    // Workflows
    pub(crate) desktop: DesktopConfig,
    pub(crate) chat_server: ChatServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfigBuilder::default().build()
    }
}

impl AppConfig {
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    #[must_use]
    pub fn use_colors(&self) -> bool {
        self.use_colors
    }

    #[must_use]
    pub fn assume_yes(&self) -> bool {
        self.assume_yes
    }

    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout.map(|secs| Duration::from_secs(secs.get()))
    }

    #[must_use]
    pub fn desktop(&self) -> &DesktopConfig {
        &self.desktop
    }

    #[must_use]
    pub fn chat_server(&self) -> &ChatServerConfig {
        &self.chat_server
    }

    pub fn verbose_mut(&mut self) -> &mut bool {
        &mut self.verbose
    }

    pub fn use_colors_mut(&mut self) -> &mut bool {
        &mut self.use_colors
    }

    pub fn assume_yes_mut(&mut self) -> &mut bool {
        &mut self.assume_yes
    }

    pub fn command_timeout_mut(&mut self) -> &mut Option<NonZeroU64> {
        &mut self.command_timeout
    }

    pub fn desktop_mut(&mut self) -> &mut DesktopConfig {
        &mut self.desktop
    }

    pub fn chat_server_mut(&mut self) -> &mut ChatServerConfig {
        &mut self.chat_server
    }
}

/// Builder pattern for `AppConfig`
///
#[derive(Default, Debug)]
pub struct AppConfigBuilder {
    verbose: Option<bool>,
    use_colors: Option<bool>,
    assume_yes: Option<bool>,
    command_timeout: Option<NonZeroU64>,
    desktop: Option<DesktopConfig>,
    chat_server: Option<ChatServerConfig>,
}

impl AppConfigBuilder {
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    #[must_use]
    pub fn use_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = Some(use_colors);
        self
    }

    #[must_use]
    pub fn assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = Some(assume_yes);
        self
    }

    /// A zero timeout leaves commands unbounded.
    #[must_use]
    pub fn command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout = NonZeroU64::new(secs);
        self
    }

    #[must_use]
    pub fn desktop(mut self, desktop: DesktopConfig) -> Self {
        self.desktop = Some(desktop);
        self
    }

    #[must_use]
    pub fn chat_server(mut self, chat_server: ChatServerConfig) -> Self {
        self.chat_server = Some(chat_server);
        self
    }

    #[must_use]
    pub fn build(self) -> AppConfig {
        AppConfig {
            verbose: self.verbose.unwrap_or(VERBOSE_DEFAULT),
            use_colors: self.use_colors.unwrap_or(USE_COLORS_DEFAULT),
            assume_yes: self.assume_yes.unwrap_or(ASSUME_YES_DEFAULT),
            command_timeout: self.command_timeout,
            desktop: self.desktop.unwrap_or_default(),
            chat_server: self.chat_server.unwrap_or_default(),
        }
    }
}
