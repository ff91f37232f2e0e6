// crates/cli/tests/cli_tests.rs

use assert_cmd::Command;
use predicates::prelude::*;
use provision::privilege::{EffectiveUser, PrivilegeCheck};
use test_common::{CONFIG_DIR_ENV, ConfigDir};

// Helper function to get a command instance pointed at `config_dir`
fn command_with_config(config_dir: &ConfigDir) -> Command {
    let mut cmd = Command::cargo_bin("provision-cli").unwrap();
    cmd.env(CONFIG_DIR_ENV, config_dir.path())
        .env_remove("PROVISION_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("provision-cli").unwrap();
    cmd.arg("--help");
    cmd.assert().success().stdout(predicate::str::contains(
        "provision - Ubuntu desktop setup and ejabberd installation",
    ));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("provision-cli").unwrap();
    cmd.arg("--version");
    cmd.assert().success();
}

#[test]
fn test_cli_invalid_command() {
    let mut cmd = Command::cargo_bin("provision-cli").unwrap();
    cmd.arg("invalid-command");
    cmd.assert().failure();
}

#[test]
fn test_cli_invalid_log_level() {
    let mut cmd = Command::cargo_bin("provision-cli").unwrap();
    cmd.args(["--log-level", "loud", "config", "validate"]);
    cmd.assert().failure();
}

#[test]
fn test_validate_without_config_file_uses_defaults() {
    let config_dir = ConfigDir::empty();
    let mut cmd = command_with_config(&config_dir);
    cmd.args(["--no-color", "config", "validate"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_validate_valid_config() {
    let config_dir = ConfigDir::with_yaml(
        r#"
verbose: true
desktop:
  apt_packages: ["vim", "git"]
  snap_packages: ["code --classic"]
chat_server:
  domain: "chat.lab.local"
  update_hosts: true
"#,
    );
    let mut cmd = command_with_config(&config_dir);
    cmd.args(["config", "validate"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_validate_invalid_domain() {
    let config_dir = ConfigDir::with_yaml(
        r#"
chat_server:
  domain: "not a domain!"
"#,
    );
    let mut cmd = command_with_config(&config_dir);
    cmd.args(["--no-color", "config", "validate"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Validation failed"));
}

#[test]
fn test_malformed_config_fails_to_load() {
    let config_dir = ConfigDir::with_yaml("desktop: [unclosed");
    let mut cmd = command_with_config(&config_dir);
    cmd.args(["config", "validate"]);

    cmd.assert().failure();
}

#[test]
fn test_desktop_requires_root() {
    if EffectiveUser.is_elevated() {
        return;
    }

    let config_dir = ConfigDir::empty();
    let mut cmd = command_with_config(&config_dir);
    cmd.args(["--no-color", "--yes", "desktop"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("needs root privileges"));
}

#[test]
fn test_chat_server_without_tui_requires_root() {
    if EffectiveUser.is_elevated() {
        return;
    }

    let config_dir = ConfigDir::empty();
    let mut cmd = command_with_config(&config_dir);
    cmd.args(["--no-color", "chat-server", "--no-tui", "--domain", "chat.lab.local"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("needs root privileges"));
}

#[test]
fn test_chat_server_rejects_bad_domain() {
    let config_dir = ConfigDir::empty();
    let mut cmd = command_with_config(&config_dir);
    cmd.args(["--no-color", "chat-server", "--no-tui", "--domain", "bad domain!"]);

    cmd.assert().failure().code(1);
}
