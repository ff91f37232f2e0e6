//! Desktop package installation workflow
//!
//! Four stages: refresh and upgrade the system, install the apt list, install
//! the snap list, clean up. A package entry may carry extra installer flags
//! (`code --classic`); entries are split on whitespace into argv tokens.

use std::{fmt, time::Duration};

use serde::Deserialize;

use crate::{
    commands::CommandSpec,
    workflow::{Stage, Step, Workflow},
};

pub const WORKFLOW_NAME: &str = "desktop";

const DEFAULT_APT_PACKAGES: &[&str] = &[
    "apt-transport-https",
    "build-essential",
    "curl",
    "flameshot",
    "git",
    "gnome-sushi",
    "gnome-tweaks",
    "gparted",
    "htop",
    "nodejs",
    "npm",
    "python3-pip",
    "ubuntu-restricted-extras",
    "vim",
    "wget",
];

const DEFAULT_SNAP_PACKAGES: &[&str] = &["spotify", "postman", "insomnia", "code --classic"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Snap,
}

impl PackageManager {
    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            Self::Apt => "apt",
            Self::Snap => "snap",
        }
    }

    /// Flag that answers the manager's own confirmation prompt, if it has one
    fn assume_yes_flag(self) -> Option<&'static str> {
        match self {
            Self::Apt => Some("-y"),
            Self::Snap => None,
        }
    }

    /// `<manager> install [-y] <tokens...>`
    #[must_use]
    pub fn install_command(self, entry: &PackageEntry) -> CommandSpec {
        CommandSpec::new(self.program())
            .arg("install")
            .args(self.assume_yes_flag())
            .args(entry.tokens())
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// One configured package: its name followed by any installer flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    tokens: Vec<String>,
}

impl PackageEntry {
    /// Split an entry on whitespace. Blank entries yield `None`.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let tokens: Vec<String> = entry.split_whitespace().map(ToString::to_string).collect();
        (!tokens.is_empty()).then_some(Self { tokens })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.tokens[0]
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl fmt::Display for PackageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub(crate) apt_packages: Vec<String>,
    pub(crate) snap_packages: Vec<String>,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            apt_packages: DEFAULT_APT_PACKAGES.iter().map(ToString::to_string).collect(),
            snap_packages: DEFAULT_SNAP_PACKAGES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl DesktopConfig {
    #[must_use]
    pub fn new(apt_packages: Vec<String>, snap_packages: Vec<String>) -> Self {
        Self {
            apt_packages,
            snap_packages,
        }
    }

    #[must_use]
    pub fn apt_packages(&self) -> &[String] {
        &self.apt_packages
    }

    #[must_use]
    pub fn snap_packages(&self) -> &[String] {
        &self.snap_packages
    }

    fn entries(list: &[String]) -> Vec<PackageEntry> {
        list.iter().filter_map(|e| PackageEntry::parse(e)).collect()
    }

    #[must_use]
    pub fn apt_entries(&self) -> Vec<PackageEntry> {
        Self::entries(&self.apt_packages)
    }

    #[must_use]
    pub fn snap_entries(&self) -> Vec<PackageEntry> {
        Self::entries(&self.snap_packages)
    }
}

/// Package managers that must be on `PATH` before the workflow can start
#[must_use]
pub fn required_tools(config: &DesktopConfig) -> Vec<PackageManager> {
    let mut tools = vec![PackageManager::Apt];
    if !config.snap_entries().is_empty() {
        tools.push(PackageManager::Snap);
    }
    tools
}

/// Human-readable list of what the workflow is about to do
#[must_use]
pub fn plan_summary(config: &DesktopConfig) -> Vec<String> {
    let apt = config.apt_entries().len();
    let snap = config.snap_entries().len();

    let mut plan = vec!["Update the system (apt update & upgrade)".to_string()];
    if apt > 0 {
        plan.push(format!("Install {apt} packages with apt"));
    }
    if snap > 0 {
        plan.push(format!("Install {snap} packages with snap"));
    }
    plan.push("Remove unneeded packages (apt autoclean & autoremove)".to_string());
    plan
}

#[must_use]
pub fn desktop_workflow(config: &DesktopConfig, timeout: Option<Duration>) -> Workflow {
    let apt = |args: &[&str]| {
        CommandSpec::new(PackageManager::Apt.program())
            .args(args.iter().copied())
            .with_timeout(timeout)
    };

    let install_stage = |manager: PackageManager, entries: Vec<PackageEntry>| {
        let steps = entries
            .iter()
            .map(|entry| {
                Step::run(
                    format!("Installing '{entry}' with {manager}"),
                    manager.install_command(entry).with_timeout(timeout),
                )
            })
            .collect::<Vec<_>>();
        Stage::new(
            format!("Installing {} {manager} packages", steps.len()),
            steps,
        )
    };

    Workflow::new(WORKFLOW_NAME)
        .stage(Stage::new(
            "Updating the system",
            vec![
                Step::run("Refreshing package lists (apt update)", apt(&["update"])),
                Step::run(
                    "Upgrading installed packages (apt upgrade)",
                    apt(&["upgrade", "-y"]),
                ),
            ],
        ))
        .stage(install_stage(PackageManager::Apt, config.apt_entries()))
        .stage(install_stage(PackageManager::Snap, config.snap_entries()))
        .stage(Stage::new(
            "Cleaning up",
            vec![
                Step::run(
                    "Clearing the package cache (apt autoclean)",
                    apt(&["autoclean", "-y"]),
                ),
                Step::run(
                    "Removing unused dependencies (apt autoremove)",
                    apt(&["autoremove", "-y"]),
                ),
            ],
        ))
}
