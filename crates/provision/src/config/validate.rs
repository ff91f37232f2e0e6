use std::path::{Path, PathBuf};

use crate::{
    chat_server::{ChatServerConfig, validate_domain},
    desktop::DesktopConfig,
    validation::{ValidationErrorCategory, ValidationIssue, ValidationIssues},
};

use super::AppConfig;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    /// The config file that was validated, if one was found
    ///
    pub(crate) config_file_path: Option<PathBuf>,

    /// List of validation issues found
    ///
    pub(crate) issues: ValidationIssues,
}

impl ValidationResult {
    #[must_use]
    pub fn config_file_path(&self) -> Option<&PathBuf> {
        self.config_file_path.as_ref()
    }

    #[must_use]
    pub fn issues(&self) -> &ValidationIssues {
        &self.issues
    }
}

impl AppConfig {
    /// Full validation for the `AppConfig`
    ///
    #[must_use]
    pub fn validate(&self, config_file_path: Option<PathBuf>) -> ValidationResult {
        let mut issues = Vec::new();

        issues.extend(validate_desktop(self.desktop()));
        issues.extend(validate_chat_server(self.chat_server()));

        ValidationResult {
            config_file_path,
            issues: issues.into(),
        }
    }
}

fn validate_desktop(desktop: &DesktopConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (field, list) in [
        ("desktop.apt_packages", desktop.apt_packages()),
        ("desktop.snap_packages", desktop.snap_packages()),
    ] {
        if list.iter().any(|entry| entry.trim().is_empty()) {
            issues.push(ValidationIssue::warning(
                ValidationErrorCategory::InvalidValue,
                field,
                "The list contains a blank entry, which will be ignored",
                Some("Remove the empty item from the list"),
            ));
        }
    }

    issues
}

fn validate_chat_server(chat_server: &ChatServerConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Err(e) = validate_domain(chat_server.domain()) {
        issues.push(ValidationIssue::error(
            ValidationErrorCategory::InvalidValue,
            "chat_server.domain",
            &e.to_string(),
            Some("Use a hostname such as `chat.lab.local`"),
        ));
    }

    if let Err(e) = url::Url::parse(chat_server.repo_url()) {
        issues.push(ValidationIssue::error(
            ValidationErrorCategory::UrlFormat,
            "chat_server.repo_url",
            &format!("The repository URL is not valid: {e}"),
            Some("Ex. `repo_url: https://github.com/processone/ejabberd.git`"),
        ));
    }

    if chat_server.service_user().trim().is_empty() {
        issues.push(ValidationIssue::error(
            ValidationErrorCategory::RequiredField,
            "chat_server.service_user",
            "The `service_user` field exists, but has no value",
            Some("Set a value for `service_user`. Ex. `service_user: ejabberd`"),
        ));
    }

    for (field, path) in [
        ("chat_server.install_prefix", Some(chat_server.install_prefix())),
        ("chat_server.service_home", Some(chat_server.service_home())),
        ("chat_server.hosts_file", Some(chat_server.hosts_file())),
        ("chat_server.unit_file", Some(chat_server.unit_file())),
        ("chat_server.source_dir", chat_server.source_dir()),
    ] {
        if let Some(issue) = path.and_then(|p| validate_absolute(field, p)) {
            issues.push(issue);
        }
    }

    issues
}

fn validate_absolute(field: &str, path: &Path) -> Option<ValidationIssue> {
    (!path.is_absolute()).then(|| {
        ValidationIssue::error(
            ValidationErrorCategory::PathFormat,
            field,
            &format!("The path `{}` is not absolute", path.display()),
            Some("Provide an absolute path, or one starting with `~`"),
        )
    })
}
