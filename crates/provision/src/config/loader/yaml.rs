use std::path::{Path, PathBuf};

use config::FileFormat;

use crate::{config::AppConfig, fs::FileSystem};

use super::{ConfigLoadError, ConfigLoader};

/// Loads `config.yaml` or `config.yml` from the file system's config directory
pub struct Yaml<'a, F: FileSystem> {
    fs: &'a F,
}

impl<'a, F: FileSystem> Yaml<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self { fs }
    }

    /// Expand a leading `~`; other paths are returned untouched.
    fn expand(&self, path: &mut PathBuf) {
        if !path.starts_with("~") {
            return;
        }
        match self.fs.expand_path(path) {
            Ok(expanded) => *path = expanded,
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot expand path"),
        }
    }
}

impl<F: FileSystem> ConfigLoader for Yaml<'_, F> {
    fn load_config(&self) -> Result<AppConfig, ConfigLoadError> {
        let config_paths = match self.find_config_file_paths() {
            Ok(paths) => paths,
            Err(searched) => {
                return Err(ConfigLoadError::NotFound { searched });
            }
        };

        let config_path: &Path = match config_paths.as_slice() {
            [] => {
                return Err(ConfigLoadError::NotFound {
                    searched: PathBuf::new(),
                });
            }
            [single] => single,
            _ => {
                return Err(ConfigLoadError::MultipleFound(
                    config_paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect(),
                ));
            }
        };

        tracing::debug!(path = %config_path.display(), "loading config");
        let file_contents = self.fs.read_file(config_path)?;

        let config = config::Config::builder()
            .add_source(config::File::from_str(&file_contents, FileFormat::Yaml))
            .build()?;

        let mut app_config: AppConfig = config.try_deserialize()?;

        let chat_server = app_config.chat_server_mut();
        self.expand(chat_server.install_prefix_mut());
        self.expand(chat_server.service_home_mut());
        self.expand(chat_server.hosts_file_mut());
        self.expand(chat_server.unit_file_mut());
        if let Some(source_dir) = chat_server.source_dir_mut() {
            self.expand(source_dir);
        }

        Ok(app_config)
    }

    fn find_config_file_paths(&self) -> Result<Vec<PathBuf>, PathBuf> {
        let mut paths = Vec::new();

        if let Ok(config_dir) = self.fs.config_dir() {
            let config_yaml = config_dir.join("config.yaml");
            let config_yml = config_dir.join("config.yml");

            if self.fs.path_exists(&config_yaml) {
                paths.push(config_yaml);
            }
            if self.fs.path_exists(&config_yml) {
                paths.push(config_yml);
            }

            if paths.is_empty() {
                return Err(config_dir);
            }
        }

        Ok(paths)
    }
}
