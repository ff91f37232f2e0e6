//! `AppConfig` test helpers.

use std::path::Path;

use provision::{
    chat_server::ChatServerConfig,
    config::{AppConfig, AppConfigBuilder},
    desktop::DesktopConfig,
};

use crate::constants::TEST_DOMAIN;

/// Standard test configuration: colors off, no prompt.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfigBuilder::default()
        .use_colors(false)
        .assume_yes(true)
        .build()
}

/// Test configuration with explicit package lists.
#[must_use]
pub fn test_config_with_packages(apt: &[&str], snap: &[&str]) -> AppConfig {
    AppConfigBuilder::default()
        .use_colors(false)
        .assume_yes(true)
        .desktop(DesktopConfig::new(
            apt.iter().map(ToString::to_string).collect(),
            snap.iter().map(ToString::to_string).collect(),
        ))
        .build()
}

/// Chat-server configuration whose every path lives under `root`.
///
/// Pair with [`crate::fixtures::fake_chat_server_root`] to get a tree the
/// workflow can run against without root privileges.
pub fn test_config_for_chat_server<P: AsRef<Path>>(root: P, update_hosts: bool) -> AppConfig {
    let root = root.as_ref();
    let mut chat_server = ChatServerConfig::default();
    *chat_server.domain_mut() = TEST_DOMAIN.to_string();
    *chat_server.update_hosts_mut() = update_hosts;
    *chat_server.install_prefix_mut() = root.join("usr/local/ejabberd");
    *chat_server.source_dir_mut() = Some(root.join("home/dev/ejabberd"));
    *chat_server.service_home_mut() = root.join("var/lib/ejabberd");
    *chat_server.hosts_file_mut() = root.join("etc/hosts");
    *chat_server.unit_file_mut() = root.join("etc/systemd/system/ejabberd.service");

    AppConfigBuilder::default()
        .use_colors(false)
        .assume_yes(true)
        .chat_server(chat_server)
        .build()
}
