//! File system abstraction layer
//!
//! This module provides a trait-based abstraction for the file operations the
//! workflows perform: reading and writing generated files, appending to existing
//! ones, tightening permissions, and locating the configuration directory.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;

/// Port for file system operations (Hexagonal Architecture)
///
/// All file access made by workflow steps and the configuration loader goes through
/// this trait, so tests can substitute a mock or point a real implementation at a
/// temporary directory.
#[cfg_attr(any(test, feature = "with_mocks"), mockall::automock)]
pub trait FileSystem: Send + Sync {
    /// Read a file and return its contents as a string
    ///
    /// # Errors
    ///
    /// Returns [`FileSystemError`] if the file cannot be read or is not valid UTF-8.
    fn read_file(&self, path: &Path) -> Result<String, FileSystemError>;

    /// Write data to a file, replacing any previous contents
    ///
    /// # Errors
    ///
    /// Returns [`FileSystemError`] if the file cannot be created or written.
    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), FileSystemError>;

    /// Append data to the end of an existing file
    ///
    /// The file must already exist; appending never creates it.
    ///
    /// # Errors
    ///
    /// Returns [`FileSystemError`] if the file is missing or cannot be written.
    fn append_file(&self, path: &Path, data: &[u8]) -> Result<(), FileSystemError>;

    /// Set the Unix permission bits of a path (e.g. `0o600`)
    ///
    /// # Errors
    ///
    /// Returns [`FileSystemError`] if the permissions cannot be changed.
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<(), FileSystemError>;

    /// Check if a path exists
    fn path_exists(&self, path: &Path) -> bool;

    /// Expand a leading `~` to the user's home directory
    ///
    /// # Errors
    ///
    /// Returns [`FileSystemError`] if the home directory cannot be determined.
    fn expand_path(&self, path: &Path) -> Result<PathBuf, FileSystemError>;

    /// Get the directory the configuration file is searched in
    ///
    /// # Errors
    ///
    /// Returns [`FileSystemError`] if the user's home directory cannot be determined.
    fn config_dir(&self) -> Result<PathBuf, FileSystemError>;
}

/// Errors that can occur during file system operations
#[derive(Error, Debug, Clone)]
pub enum FileSystemError {
    /// General IO error, with the path it happened on
    #[error("IO error on {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// Home directory could not be determined (needed for path expansion)
    #[error("Home directory not found")]
    HomeDirNotFound,
}

impl FileSystemError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::IoError {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// `true` for permission failures, which usually mean the tool isn't running as root.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Self::IoError { source, .. } if source.kind() == io::ErrorKind::PermissionDenied
        )
    }
}

#[cfg(test)]
impl MockFileSystem {
    /// Set up a mock for reading a file with specific content
    pub(crate) fn mock_read_file<P, S>(&mut self, path: P, content: S)
    where
        PathBuf: From<P>,
        S: ToString,
    {
        let path_buf = PathBuf::from(path);
        let content_string = content.to_string();
        self.expect_read_file()
            .with(mockall::predicate::eq(path_buf))
            .returning(move |_| Ok(content_string.clone()));
    }

    /// Set up a mock for path existence checking
    pub(crate) fn mock_path_exists<P>(&mut self, path: P, exists: bool)
    where
        PathBuf: From<P>,
    {
        self.expect_path_exists()
            .with(mockall::predicate::eq(PathBuf::from(path)))
            .returning(move |_| exists);
    }

    /// Set up a mock for getting the configuration directory
    pub(crate) fn mock_config_dir_ok<P>(&mut self, path: P)
    where
        PathBuf: From<P>,
    {
        let p = PathBuf::from(path);
        self.expect_config_dir().return_once(|| Ok(p));
    }

    /// Set up a complete mock configuration file scenario
    ///
    /// The config directory resolves to `config_dir`, `config.yaml` exists there with
    /// `config_yaml` as its contents, and `config.yml` does not.
    pub(crate) fn mock_config_file(&mut self, config_dir: &Path, config_yaml: &str) {
        let config_dir_owned = PathBuf::from(config_dir);
        let config_path = config_dir.join("config.yaml");

        self.expect_config_dir()
            .return_once(|| Ok(config_dir_owned));
        self.mock_path_exists(&config_path, true);
        self.mock_read_file(&config_path, config_yaml);

        self.mock_path_exists(&config_dir.join("config.yml"), false);
    }

    /// Set up a mock for path expansion
    pub(crate) fn mock_expand_path<P>(&mut self, input: P, output: P)
    where
        PathBuf: From<P>,
    {
        let input = PathBuf::from(input);
        let output = PathBuf::from(output);

        self.expect_expand_path()
            .with(mockall::predicate::eq(input))
            .return_once(|_| Ok(output));
    }
}
