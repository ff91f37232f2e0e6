//! File system fixtures.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::TempDir;

/// A temporary config directory, for pointing the CLI at via `PROVISION_CONFIG_DIR`
pub struct ConfigDir {
    dir: TempDir,
}

impl ConfigDir {
    /// An empty config directory (the CLI falls back to defaults).
    ///
    /// # Panics
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// A config directory holding `config.yaml` with `yaml` as its contents.
    ///
    /// # Panics
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn with_yaml(yaml: &str) -> Self {
        let config = Self::empty();
        fs::write(config.path().join("config.yaml"), yaml).expect("Failed to write config");
        config
    }

    /// A config directory whose `config.yaml` is the YAML form of `value`.
    ///
    /// # Panics
    /// Panics if serialization or writing fails.
    #[must_use]
    pub fn with_value(value: &serde_yaml::Value) -> Self {
        let yaml = serde_yaml::to_string(value).expect("Failed to serialize config");
        Self::with_yaml(&yaml)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Lay out the files the chat-server workflow expects to already exist under
/// `root`: the installed `ejabberd.yml` and a hosts file.
///
/// # Panics
/// Panics if any file cannot be written.
pub fn fake_chat_server_root(root: &Path) -> PathBuf {
    let config_dir = root.join("usr/local/ejabberd/etc/ejabberd");
    fs::create_dir_all(&config_dir).expect("Failed to create config dir");
    fs::write(config_dir.join("ejabberd.yml"), "loglevel: info\n").expect("Failed to write yml");

    let etc = root.join("etc");
    fs::create_dir_all(&etc).expect("Failed to create etc");
    fs::write(etc.join("hosts"), "127.0.0.1\tlocalhost\n").expect("Failed to write hosts");

    config_dir.join("ejabberd.yml")
}
