//! ejabberd build-from-source workflow
//!
//! Installs build dependencies, clones and compiles the server, creates its
//! service account, appends a marked block to `ejabberd.yml`, generates a
//! self-signed certificate, and registers a systemd unit. Every target path
//! comes from [`ChatServerPaths`], resolved once before the workflow is built.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    commands::CommandSpec,
    template::{ConfigBlock, HostsEntry, SystemdUnit, Template, TemplateError},
    workflow::{Stage, Step, Workflow},
};

pub const WORKFLOW_NAME: &str = "chat-server";

/// Program that must be on `PATH` before the workflow starts; everything else
/// it calls is installed by its first stage.
pub const REQUIRED_TOOL: &str = "apt-get";

const DEFAULT_DOMAIN: &str = "my.lab.local";
const DEFAULT_REPO_URL: &str = "https://github.com/processone/ejabberd.git";
const DEFAULT_INSTALL_PREFIX: &str = "/usr/local/ejabberd";
const DEFAULT_SERVICE_USER: &str = "ejabberd";
const DEFAULT_SERVICE_HOME: &str = "/var/lib/ejabberd";
const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";
const DEFAULT_UNIT_FILE: &str = "/etc/systemd/system/ejabberd.service";
const DEFAULT_CFLAGS: &str = "-O2 -std=gnu17";

const ERLANG_PPA: &str = "ppa:rabbitmq/rabbitmq-erlang";

const BUILD_DEPENDENCIES: &[&str] = &[
    "build-essential",
    "libexpat1-dev",
    "libyaml-dev",
    "libssl-dev",
    "automake",
    "git",
    "erlang-dev",
    "erlang-reltool",
    "erlang-asn1",
    "erlang-public-key",
    "erlang-ssl",
    "erlang-syntax-tools",
    "erlang-runtime-tools",
    "erlang-nox",
    "erlang-observer",
    "erlang-inets",
    "erlang-debugger",
    "erlang-wx",
    "erlang-os-mon",
    "elixir",
    "libpam0g-dev",
    "zlib1g-dev",
];

const DOMAIN_PATTERN: &str =
    r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$";
const MAX_DOMAIN_LEN: usize = 253;

static DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DOMAIN_PATTERN).expect("domain pattern is a valid regex"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatServerError {
    #[error("Invalid domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: &'static str },

    #[error("Cannot determine the source directory: the invoking user's home is unknown")]
    NoSourceDirectory,

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Check that `domain` is a plain hostname
///
/// # Errors
///
/// Returns [`ChatServerError::InvalidDomain`] if the domain is empty, too long, or
/// contains anything besides dot-separated letters, digits and inner hyphens.
pub fn validate_domain(domain: &str) -> Result<(), ChatServerError> {
    let invalid = |reason| {
        Err(ChatServerError::InvalidDomain {
            domain: domain.to_string(),
            reason,
        })
    };

    if domain.trim().is_empty() {
        return invalid("the domain is empty");
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return invalid("the domain is longer than 253 characters");
    }
    if !DOMAIN_RE.is_match(domain) {
        return invalid("only letters, digits, '-' and '.' are allowed");
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChatServerConfig {
    pub(crate) domain: String,
    pub(crate) update_hosts: bool,
    pub(crate) repo_url: String,
    pub(crate) install_prefix: PathBuf,

    /// Defaults to `<invoking user's home>/ejabberd`
    pub(crate) source_dir: Option<PathBuf>,

    pub(crate) service_user: String,
    pub(crate) service_home: PathBuf,
    pub(crate) hosts_file: PathBuf,
    pub(crate) unit_file: PathBuf,
    pub(crate) cflags: String,
}

impl Default for ChatServerConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            update_hosts: false,
            repo_url: DEFAULT_REPO_URL.to_string(),
            install_prefix: PathBuf::from(DEFAULT_INSTALL_PREFIX),
            source_dir: None,
            service_user: DEFAULT_SERVICE_USER.to_string(),
            service_home: PathBuf::from(DEFAULT_SERVICE_HOME),
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            unit_file: PathBuf::from(DEFAULT_UNIT_FILE),
            cflags: DEFAULT_CFLAGS.to_string(),
        }
    }
}

impl ChatServerConfig {
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn update_hosts(&self) -> bool {
        self.update_hosts
    }

    #[must_use]
    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    #[must_use]
    pub fn install_prefix(&self) -> &Path {
        &self.install_prefix
    }

    #[must_use]
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    #[must_use]
    pub fn service_user(&self) -> &str {
        &self.service_user
    }

    #[must_use]
    pub fn service_home(&self) -> &Path {
        &self.service_home
    }

    #[must_use]
    pub fn hosts_file(&self) -> &Path {
        &self.hosts_file
    }

    #[must_use]
    pub fn unit_file(&self) -> &Path {
        &self.unit_file
    }

    #[must_use]
    pub fn cflags(&self) -> &str {
        &self.cflags
    }

    pub fn domain_mut(&mut self) -> &mut String {
        &mut self.domain
    }

    pub fn update_hosts_mut(&mut self) -> &mut bool {
        &mut self.update_hosts
    }

    pub fn install_prefix_mut(&mut self) -> &mut PathBuf {
        &mut self.install_prefix
    }

    pub fn source_dir_mut(&mut self) -> &mut Option<PathBuf> {
        &mut self.source_dir
    }

    pub fn service_home_mut(&mut self) -> &mut PathBuf {
        &mut self.service_home
    }

    pub fn hosts_file_mut(&mut self) -> &mut PathBuf {
        &mut self.hosts_file
    }

    pub fn unit_file_mut(&mut self) -> &mut PathBuf {
        &mut self.unit_file
    }
}

/// Every path the workflow touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatServerPaths {
    pub install_prefix: PathBuf,
    pub source_dir: PathBuf,
    pub config_file: PathBuf,
    pub database: PathBuf,
    pub cert_dir: PathBuf,
    pub key_file: PathBuf,
    pub crt_file: PathBuf,
    pub bundle: PathBuf,
    pub service_home: PathBuf,
    pub erlang_cookie: PathBuf,
    pub hosts_file: PathBuf,
    pub unit_file: PathBuf,
}

impl ChatServerPaths {
    /// Derive all paths from `config`
    ///
    /// `invoking_home` is used for the source directory when the configuration
    /// doesn't name one.
    ///
    /// # Errors
    ///
    /// Returns [`ChatServerError::NoSourceDirectory`] if neither is available.
    pub fn resolve(
        config: &ChatServerConfig,
        invoking_home: Option<&Path>,
    ) -> Result<Self, ChatServerError> {
        let source_dir = match (config.source_dir(), invoking_home) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(home)) => home.join("ejabberd"),
            (None, None) => return Err(ChatServerError::NoSourceDirectory),
        };

        let prefix = config.install_prefix().to_path_buf();
        let cert_dir = prefix.join("etc").join("ejabberd");

        Ok(Self {
            source_dir,
            config_file: cert_dir.join("ejabberd.yml"),
            database: prefix
                .join("var")
                .join("lib")
                .join("ejabberd")
                .join("ejabberd.db"),
            key_file: cert_dir.join("ejabberd.key"),
            crt_file: cert_dir.join("ejabberd.crt"),
            bundle: cert_dir.join("server.pem"),
            cert_dir,
            install_prefix: prefix,
            erlang_cookie: config.service_home().join(".erlang.cookie"),
            service_home: config.service_home().to_path_buf(),
            hosts_file: config.hosts_file().to_path_buf(),
            unit_file: config.unit_file().to_path_buf(),
        })
    }

    /// systemd service name, taken from the unit file name
    #[must_use]
    pub fn service_name(&self) -> String {
        self.unit_file
            .file_stem()
            .map_or_else(|| "ejabberd".to_string(), |s| s.to_string_lossy().into_owned())
    }
}

/// Build the chat-server workflow
///
/// The domain is validated and every template rendered here, before a single
/// step can run.
///
/// # Errors
///
/// Returns [`ChatServerError`] for an invalid domain or an empty template field.
pub fn chat_server_workflow(
    config: &ChatServerConfig,
    paths: &ChatServerPaths,
    timeout: Option<Duration>,
) -> Result<Workflow, ChatServerError> {
    validate_domain(config.domain())?;

    let domain = config.domain();
    let user = config.service_user();
    let owner = format!("{user}:{user}");

    let config_block = ConfigBlock {
        domain,
        database_path: &paths.database,
        certificate_path: &paths.bundle,
    }
    .render()?;
    let unit = SystemdUnit {
        install_prefix: &paths.install_prefix,
        user,
    }
    .render()?;
    let hosts_entry = HostsEntry { domain }.render()?;

    let cmd = |program: &str, args: &[&str]| {
        CommandSpec::new(program)
            .args(args.iter().copied())
            .with_timeout(timeout)
    };
    let path_arg = |path: &Path| path.to_string_lossy().into_owned();

    let mut install_deps = vec!["install", "-y"];
    install_deps.extend_from_slice(BUILD_DEPENDENCIES);

    let mut workflow = Workflow::new(WORKFLOW_NAME)
        .stage(Stage::new(
            "Installing dependencies",
            vec![
                Step::run("Refreshing package lists", cmd("apt-get", &["update"])),
                Step::run(
                    "Installing software-properties-common",
                    cmd("apt-get", &["install", "-y", "software-properties-common"]),
                ),
                Step::run(
                    "Adding the Erlang repository",
                    cmd("add-apt-repository", &["-y", ERLANG_PPA]),
                ),
                Step::run("Refreshing package lists", cmd("apt-get", &["update"])),
                Step::run(
                    "Installing build dependencies",
                    CommandSpec::new("apt-get")
                        .args(install_deps)
                        .with_timeout(timeout),
                ),
            ],
        ))
        .stage(Stage::new(
            "Fetching sources",
            vec![
                Step::run(
                    "Cloning the repository",
                    CommandSpec::new("git")
                        .args(["clone", config.repo_url()])
                        .arg(path_arg(&paths.source_dir))
                        .with_timeout(timeout),
                )
                .skip_if_path_exists(&paths.source_dir),
            ],
        ))
        .stage(Stage::new(
            "Configuring the build",
            vec![Step::run(
                "Running ./configure",
                CommandSpec::new("./configure")
                    .arg(format!("--prefix={}", paths.install_prefix.display()))
                    .arg("--enable-sqlite")
                    .arg(format!("--enable-user={user}"))
                    .arg("--enable-all")
                    .current_dir(&paths.source_dir)
                    .env("CFLAGS", config.cflags())
                    .with_timeout(timeout),
            )],
        ))
        .stage(Stage::new(
            "Creating the service user",
            vec![
                Step::run(
                    format!("Creating user '{user}'"),
                    CommandSpec::new("useradd")
                        .args(["-m", "-d"])
                        .arg(path_arg(&paths.service_home))
                        .args(["-s", "/bin/bash", user])
                        .with_timeout(timeout),
                )
                .skip_if_command_succeeds(CommandSpec::new("id").args(["-u", user])),
            ],
        ))
        .stage(Stage::new(
            "Compiling and installing",
            vec![
                Step::run("Running make", cmd("make", &[]).current_dir(&paths.source_dir)),
                Step::run(
                    "Running make install",
                    cmd("make", &["install"]).current_dir(&paths.source_dir),
                ),
            ],
        ))
        .stage(Stage::new(
            "Configuring ejabberd.yml",
            vec![Step::append_file(
                "Appending the server configuration",
                &paths.config_file,
                config_block,
            )],
        ))
        .stage(Stage::new(
            "Generating certificates",
            vec![
                Step::run(
                    "Creating a self-signed certificate",
                    cmd(
                        "openssl",
                        &[
                            "req", "-x509", "-newkey", "rsa:4096", "-sha256", "-days", "365",
                            "-nodes",
                        ],
                    )
                    .arg("-keyout")
                    .arg(path_arg(&paths.key_file))
                    .arg("-out")
                    .arg(path_arg(&paths.crt_file))
                    .arg("-subj")
                    .arg(format!("/CN={domain}"))
                    .arg("-addext")
                    .arg(format!("subjectAltName=DNS:{domain}")),
                ),
                Step::concatenate(
                    "Bundling key and certificate",
                    vec![paths.key_file.clone(), paths.crt_file.clone()],
                    &paths.bundle,
                    Some(0o600),
                ),
            ],
        ))
        .stage(Stage::new(
            "Fixing permissions",
            vec![
                Step::run(
                    format!("Handing {} to {user}", paths.install_prefix.display()),
                    cmd("chown", &["-R", owner.as_str()]).arg(path_arg(&paths.install_prefix)),
                )
                .skip_if_path_missing(&paths.install_prefix)
                .best_effort(),
                Step::run(
                    format!("Handing {} to {user}", paths.service_home.display()),
                    cmd("chown", &["-R", owner.as_str()]).arg(path_arg(&paths.service_home)),
                )
                .skip_if_path_missing(&paths.service_home)
                .best_effort(),
                Step::run(
                    "Handing the Erlang cookie to the service user",
                    cmd("chown", &[owner.as_str()]).arg(path_arg(&paths.erlang_cookie)),
                )
                .skip_if_path_missing(&paths.erlang_cookie)
                .best_effort(),
                Step::run(
                    "Restricting the Erlang cookie",
                    cmd("chmod", &["400"]).arg(path_arg(&paths.erlang_cookie)),
                )
                .skip_if_path_missing(&paths.erlang_cookie)
                .best_effort(),
            ],
        ));

    if config.update_hosts() {
        workflow = workflow.stage(Stage::new(
            format!("Updating {}", paths.hosts_file.display()),
            vec![
                Step::append_line_unless_present(
                    format!("Adding {domain} as a loopback alias"),
                    &paths.hosts_file,
                    domain,
                    hosts_entry,
                )
                .best_effort(),
            ],
        ));
    }

    let service = paths.service_name();
    Ok(workflow.stage(Stage::new(
        "Installing the systemd service",
        vec![
            Step::write_file(
                format!("Writing {}", paths.unit_file.display()),
                &paths.unit_file,
                unit,
                Some(0o644),
            ),
            Step::run("Reloading systemd", cmd("systemctl", &["daemon-reload"])).best_effort(),
            Step::run(
                format!("Enabling and starting {service}"),
                cmd("systemctl", &["enable", "--now", service.as_str()]),
            )
            .best_effort(),
        ],
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Criticality, Precheck, StepAction};

    fn paths(config: &ChatServerConfig) -> ChatServerPaths {
        ChatServerPaths::resolve(config, Some(Path::new("/home/dev"))).unwrap()
    }

    fn config(domain: &str) -> ChatServerConfig {
        ChatServerConfig {
            domain: domain.to_string(),
            ..ChatServerConfig::default()
        }
    }

    fn find<'a>(workflow: &'a Workflow, title: &str) -> &'a Step {
        workflow
            .steps()
            .find(|s| s.title() == title)
            .unwrap_or_else(|| panic!("no step titled {title}"))
    }

    #[test]
    fn test_domain_validation() {
        assert!(validate_domain("chat.lab.local").is_ok());
        assert!(validate_domain("localhost").is_ok());
        assert!(validate_domain("xmpp-1.example.org").is_ok());

        assert!(validate_domain("").is_err());
        assert!(validate_domain("   ").is_err());
        assert!(validate_domain("bad domain").is_err());
        assert!(validate_domain("-leading.example").is_err());
        assert!(validate_domain("a..b").is_err());
        assert!(validate_domain("evil\";rm -rf /").is_err());
        assert!(validate_domain(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_domain_pattern_is_compiled_once_and_reused() {
        let first: *const Regex = &*DOMAIN_RE;

        assert!(validate_domain("chat.lab.local").is_ok());
        assert!(validate_domain("a-.example").is_err());

        assert!(std::ptr::eq(first, &*DOMAIN_RE));
        assert!(DOMAIN_RE.is_match(&format!("{}.local", "a".repeat(63))));
        assert!(!DOMAIN_RE.is_match(&format!("{}.local", "a".repeat(64))));
    }

    #[test]
    fn test_invalid_domain_builds_nothing() {
        let config = config("not a domain");

        let result = chat_server_workflow(&config, &paths(&config), None);

        assert!(matches!(
            result,
            Err(ChatServerError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn test_default_paths() {
        let config = ChatServerConfig::default();
        let paths = paths(&config);

        assert_eq!(paths.source_dir, PathBuf::from("/home/dev/ejabberd"));
        assert_eq!(
            paths.config_file,
            PathBuf::from("/usr/local/ejabberd/etc/ejabberd/ejabberd.yml")
        );
        assert_eq!(
            paths.database,
            PathBuf::from("/usr/local/ejabberd/var/lib/ejabberd/ejabberd.db")
        );
        assert_eq!(
            paths.bundle,
            PathBuf::from("/usr/local/ejabberd/etc/ejabberd/server.pem")
        );
        assert_eq!(
            paths.erlang_cookie,
            PathBuf::from("/var/lib/ejabberd/.erlang.cookie")
        );
        assert_eq!(paths.service_name(), "ejabberd");
    }

    #[test]
    fn test_configured_source_dir_wins() {
        let mut config = ChatServerConfig::default();
        *config.source_dir_mut() = Some(PathBuf::from("/srv/src/ejabberd"));

        let paths = ChatServerPaths::resolve(&config, None).unwrap();

        assert_eq!(paths.source_dir, PathBuf::from("/srv/src/ejabberd"));
    }

    #[test]
    fn test_no_home_and_no_source_dir() {
        assert_eq!(
            ChatServerPaths::resolve(&ChatServerConfig::default(), None),
            Err(ChatServerError::NoSourceDirectory)
        );
    }

    #[test]
    fn test_step_order_and_prechecks() {
        let config = config("chat.lab.local");
        let workflow = chat_server_workflow(&config, &paths(&config), None).unwrap();

        let clone = find(&workflow, "Cloning the repository");
        assert_eq!(
            clone.precheck(),
            &Precheck::SkipIfPathExists(PathBuf::from("/home/dev/ejabberd"))
        );
        assert_eq!(
            clone.action().to_string(),
            "git clone https://github.com/processone/ejabberd.git /home/dev/ejabberd"
        );

        let useradd = find(&workflow, "Creating user 'ejabberd'");
        assert!(matches!(
            useradd.precheck(),
            Precheck::SkipIfCommandSucceeds(probe) if probe.to_string() == "id -u ejabberd"
        ));

        let configure = find(&workflow, "Running ./configure");
        let spec = configure.action().command().unwrap();
        assert_eq!(spec.envs()["CFLAGS"], "-O2 -std=gnu17");
        assert_eq!(spec.working_directory(), Some(Path::new("/home/dev/ejabberd")));
        assert_eq!(
            spec.to_string(),
            "./configure --prefix=/usr/local/ejabberd --enable-sqlite --enable-user=ejabberd --enable-all"
        );

        let stage_titles: Vec<_> = workflow.stages().iter().map(Stage::title).collect();
        assert_eq!(stage_titles.len(), 9);
        assert_eq!(stage_titles[0], "Installing dependencies");
        assert_eq!(stage_titles[8], "Installing the systemd service");
    }

    #[test]
    fn test_criticality() {
        let config = config("chat.lab.local");
        let workflow = chat_server_workflow(&config, &paths(&config), None).unwrap();

        for title in [
            "Appending the server configuration",
            "Bundling key and certificate",
            "Writing /etc/systemd/system/ejabberd.service",
            "Running make install",
        ] {
            assert_eq!(find(&workflow, title).criticality(), Criticality::Critical);
        }
        for title in ["Reloading systemd", "Enabling and starting ejabberd"] {
            assert_eq!(
                find(&workflow, title).criticality(),
                Criticality::BestEffort
            );
        }
    }

    #[test]
    fn test_hosts_stage_is_optional() {
        let mut config = config("chat.lab.local");
        let without = chat_server_workflow(&config, &paths(&config), None).unwrap();
        assert!(!without.steps().any(|s| matches!(
            s.action(),
            StepAction::AppendLineUnlessPresent { .. }
        )));

        *config.update_hosts_mut() = true;
        let with = chat_server_workflow(&config, &paths(&config), None).unwrap();
        let step = find(&with, "Adding chat.lab.local as a loopback alias");

        assert_eq!(step.criticality(), Criticality::BestEffort);
        assert_eq!(
            step.action(),
            &StepAction::AppendLineUnlessPresent {
                path: PathBuf::from("/etc/hosts"),
                needle: "chat.lab.local".to_string(),
                line: "127.0.0.1\tchat.lab.local".to_string(),
            }
        );
    }

    #[test]
    fn test_certificate_steps() {
        let config = config("chat.lab.local");
        let workflow = chat_server_workflow(&config, &paths(&config), None).unwrap();

        let openssl = find(&workflow, "Creating a self-signed certificate");
        let rendered = openssl.action().to_string();
        assert!(rendered.starts_with("openssl req -x509 -newkey rsa:4096"));
        assert!(rendered.contains("-subj /CN=chat.lab.local"));
        assert!(rendered.contains("-addext subjectAltName=DNS:chat.lab.local"));

        let bundle = find(&workflow, "Bundling key and certificate");
        assert!(matches!(
            bundle.action(),
            StepAction::Concatenate { inputs, mode: Some(0o600), .. } if inputs.len() == 2
        ));
    }

    #[test]
    fn test_build_dependencies_are_one_command() {
        let config = config("chat.lab.local");
        let workflow = chat_server_workflow(&config, &paths(&config), None).unwrap();

        let spec = find(&workflow, "Installing build dependencies")
            .action()
            .command()
            .unwrap();

        assert_eq!(spec.arguments()[..2], ["install", "-y"]);
        assert_eq!(spec.arguments().len(), 2 + BUILD_DEPENDENCIES.len());
    }
}
