//! Effective-user checks and invoking-user lookup

use std::path::PathBuf;

/// Port for the "are we root?" check
#[cfg_attr(any(test, feature = "with_mocks"), mockall::automock)]
pub trait PrivilegeCheck: Send + Sync {
    fn is_elevated(&self) -> bool;
}

/// Checks the effective user id of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectiveUser;

impl PrivilegeCheck for EffectiveUser {
    #[cfg(unix)]
    fn is_elevated(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    #[cfg(not(unix))]
    fn is_elevated(&self) -> bool {
        false
    }
}

/// The user who ran the tool, looking through `sudo`
#[must_use]
pub fn invoking_user() -> Option<String> {
    select_invoking_user(
        std::env::var("SUDO_USER").ok(),
        std::env::var("USER").ok(),
    )
}

fn select_invoking_user(sudo_user: Option<String>, user: Option<String>) -> Option<String> {
    sudo_user
        .filter(|name| !name.is_empty())
        .or_else(|| user.filter(|name| !name.is_empty()))
}

/// Home directory of the invoking user
///
/// Under `sudo` this is the home of the account that called `sudo`, not `/root`.
/// Falls back to the current process's home directory.
#[must_use]
pub fn invoking_user_home() -> Option<PathBuf> {
    invoking_user()
        .and_then(|name| home_of(&name))
        .or_else(|| etcetera::home_dir().ok())
}

#[cfg(unix)]
fn home_of(name: &str) -> Option<PathBuf> {
    match nix::unistd::User::from_name(name) {
        Ok(user) => user.map(|u| u.dir),
        Err(e) => {
            tracing::debug!(user = name, error = %e, "user lookup failed");
            None
        }
    }
}

#[cfg(not(unix))]
fn home_of(_name: &str) -> Option<PathBuf> {
    None
}
