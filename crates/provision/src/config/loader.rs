pub mod yaml;

pub use self::yaml::Yaml;

use std::path::PathBuf;

use thiserror::Error;

use crate::{config::AppConfig, fs::FileSystemError};

/// Port for loading configuration from disk
///
pub trait ConfigLoader: Send + Sync {
    /// Load configuration from standard locations
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError`] if no file, or more than one, is found, or the
    /// file cannot be read or parsed.
    fn load_config(&self) -> Result<AppConfig, ConfigLoadError>;

    /// Find possible configuration file paths
    ///
    /// # Errors
    ///
    /// Returns the searched directory if it holds no configuration file.
    fn find_config_file_paths(&self) -> Result<Vec<PathBuf>, PathBuf>;

    /// Like [`ConfigLoader::load_config`], but a missing file yields the defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError`] for every failure except `NotFound`.
    fn load_config_or_default(&self) -> Result<AppConfig, ConfigLoadError> {
        match self.load_config() {
            Err(ConfigLoadError::NotFound { searched }) => {
                tracing::debug!(
                    searched = %searched.display(),
                    "no config file found, using defaults"
                );
                Ok(AppConfig::default())
            }
            other => other,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error(transparent)]
    FileSystemError(#[from] FileSystemError),

    #[error("No configuration file found in: {}", searched.display())]
    NotFound { searched: PathBuf },

    #[error("Multiple configuration files found: {}", .0.join(", "))]
    MultipleFound(Vec<String>),

    #[error(transparent)]
    ConfigError(#[from] ::config::ConfigError),
}

/// Applies runtime CLI arguments on top of the configuration read from the config file.
///
pub trait ApplyToConfig {
    /// Implement this method such that the arguments in `self` override the
    /// matching values in `config`.
    ///
    fn apply_to_config(&self, config: AppConfig) -> AppConfig;
}
