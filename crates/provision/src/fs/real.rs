// Real file system adapter implementation

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use etcetera::{AppStrategy, AppStrategyArgs, choose_app_strategy};

use super::filesystem::{FileSystem, FileSystemError};

/// Environment variable that overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "PROVISION_CONFIG_DIR";

/// Real file system implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_file(&self, path: &Path) -> Result<String, FileSystemError> {
        fs::read_to_string(path).map_err(|e| FileSystemError::io(path, e))
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), FileSystemError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| FileSystemError::io(parent, e))?;
        }
        fs::write(path, data).map_err(|e| FileSystemError::io(path, e))
    }

    fn append_file(&self, path: &Path, data: &[u8]) -> Result<(), FileSystemError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| FileSystemError::io(path, e))?;

        file.write_all(data)
            .and_then(|()| file.flush())
            .map_err(|e| FileSystemError::io(path, e))
    }

    #[cfg(unix)]
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<(), FileSystemError> {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| FileSystemError::io(path, e))
    }

    #[cfg(not(unix))]
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<(), FileSystemError> {
        let mut permissions = fs::metadata(path)
            .map_err(|e| FileSystemError::io(path, e))?
            .permissions();
        permissions.set_readonly(mode & 0o200 == 0);
        fs::set_permissions(path, permissions).map_err(|e| FileSystemError::io(path, e))
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn expand_path(&self, path: &Path) -> Result<PathBuf, FileSystemError> {
        let binding = path.to_string_lossy();
        let expanded =
            shellexpand::full(&binding).map_err(|_| FileSystemError::HomeDirNotFound)?;

        Ok(PathBuf::from(expanded.as_ref()))
    }

    fn config_dir(&self) -> Result<PathBuf, FileSystemError> {
        // Check for environment variable override first
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        choose_app_strategy(AppStrategyArgs {
            top_level_domain: "org".to_string(),
            author: "provision".to_string(),
            app_name: "provision".to_string(),
        })
        .map(|xdg| xdg.config_dir())
        .map_err(|_| FileSystemError::HomeDirNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_path_exists() {
        let fs = RealFileSystem;
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");

        assert!(!fs.path_exists(&file_path));
        fs::write(&file_path, "content").unwrap();
        assert!(fs.path_exists(&file_path));
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let fs = RealFileSystem;
        let dir = tempdir().unwrap();
        let nested = dir.path().join("etc").join("systemd").join("unit.service");

        fs.write_file(&nested, b"[Unit]\n").unwrap();

        assert_eq!(fs.read_file(&nested).unwrap(), "[Unit]\n");
    }

    #[test]
    fn test_append_keeps_existing_content() {
        let fs = RealFileSystem;
        let dir = tempdir().unwrap();
        let path = dir.path().join("hosts");
        fs::write(&path, "127.0.0.1\tlocalhost\n").unwrap();

        fs.append_file(&path, b"127.0.0.1\tchat.lab\n").unwrap();

        assert_eq!(
            fs.read_file(&path).unwrap(),
            "127.0.0.1\tlocalhost\n127.0.0.1\tchat.lab\n"
        );
    }

    #[test]
    fn test_append_to_missing_file_fails() {
        let fs = RealFileSystem;
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.yml");

        let error = fs.append_file(&path, b"hosts: []\n").unwrap_err();

        assert!(matches!(error, FileSystemError::IoError { .. }));
        assert!(error.to_string().contains("missing.yml"));
        assert!(!fs.path_exists(&path));
    }

    #[cfg(unix)]
    #[test]
    fn test_set_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let fs = RealFileSystem;
        let dir = tempdir().unwrap();
        let path = dir.path().join("server.pem");
        fs.write_file(&path, b"secret").unwrap();

        fs.set_permissions(&path, 0o600).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_expand_path_leaves_absolute_paths_alone() {
        let fs = RealFileSystem;

        let expanded = fs.expand_path(Path::new("/usr/local/ejabberd")).unwrap();

        assert_eq!(expanded, PathBuf::from("/usr/local/ejabberd"));
    }
}
