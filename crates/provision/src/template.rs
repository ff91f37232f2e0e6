//! Renderers for the files the chat-server workflow generates
//!
//! Each template lists its required fields explicitly. [`Template::render`] checks
//! them before anything is substituted, so a blank domain or path can never end up
//! inside a generated file.

use std::{borrow::Cow, path::Path};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template '{template}' is missing a value for '{field}'")]
    MissingField {
        template: &'static str,
        field: &'static str,
    },
}

pub trait Template {
    /// Name used in error messages
    const NAME: &'static str;

    /// Every value the template substitutes, by field name
    fn fields(&self) -> Vec<(&'static str, Cow<'_, str>)>;

    /// Substitute the fields without checking them
    fn render_unchecked(&self) -> String;

    /// Validate every required field, then render
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingField`] for the first field that is empty or
    /// only whitespace.
    fn render(&self) -> Result<String, TemplateError> {
        if let Some((field, _)) = self
            .fields()
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
        {
            return Err(TemplateError::MissingField {
                template: Self::NAME,
                field,
            });
        }

        Ok(self.render_unchecked())
    }
}

/// Server configuration appended to `ejabberd.yml`
///
/// The block is wrapped in [`ConfigBlock::START_MARKER`] and [`ConfigBlock::END_MARKER`]
/// and is appended as-is; running the workflow twice leaves two blocks behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBlock<'a> {
    pub domain: &'a str,
    pub database_path: &'a Path,
    pub certificate_path: &'a Path,
}

impl ConfigBlock<'_> {
    pub const START_MARKER: &'static str = "# --- CONFIG AUTOMATICA START ---";
    pub const END_MARKER: &'static str = "# --- CONFIG AUTOMATICA END ---";
}

impl Template for ConfigBlock<'_> {
    const NAME: &'static str = "config block";

    fn fields(&self) -> Vec<(&'static str, Cow<'_, str>)> {
        vec![
            ("domain", Cow::Borrowed(self.domain)),
            ("database_path", self.database_path.to_string_lossy()),
            ("certificate_path", self.certificate_path.to_string_lossy()),
        ]
    }

    fn render_unchecked(&self) -> String {
        format!(
            r#"
{start}
hosts:
  - "localhost"
  - "{domain}"

default_db: sql
sql_type: sqlite
sql_database: "{database}"
update_sql_schema: true

acme:
  auto: false

certfiles:
  - "{certificate}"
{end}
"#,
            start = Self::START_MARKER,
            end = Self::END_MARKER,
            domain = self.domain,
            database = self.database_path.display(),
            certificate = self.certificate_path.display(),
        )
    }
}

/// systemd service unit for the installed server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemdUnit<'a> {
    pub install_prefix: &'a Path,
    pub user: &'a str,
}

impl Template for SystemdUnit<'_> {
    const NAME: &'static str = "systemd unit";

    fn fields(&self) -> Vec<(&'static str, Cow<'_, str>)> {
        vec![
            ("install_prefix", self.install_prefix.to_string_lossy()),
            ("user", Cow::Borrowed(self.user)),
        ]
    }

    fn render_unchecked(&self) -> String {
        let ctl = self.install_prefix.join("sbin").join("ejabberdctl");

        format!(
            "[Unit]
Description=ejabberd XMPP Server
Requires=network.target
After=network.target

[Service]
Type=forking
User={user}
Group={user}
ExecStart={ctl} start
ExecStop={ctl} stop
Restart=on-failure
StartLimitInterval=3
StartLimitBurst=100

[Install]
WantedBy=multi-user.target
",
            user = self.user,
            ctl = ctl.display(),
        )
    }
}

/// Loopback alias line for the hosts file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsEntry<'a> {
    pub domain: &'a str,
}

impl HostsEntry<'_> {
    pub const ADDRESS: &'static str = "127.0.0.1";
}

impl Template for HostsEntry<'_> {
    const NAME: &'static str = "hosts entry";

    fn fields(&self) -> Vec<(&'static str, Cow<'_, str>)> {
        vec![("domain", Cow::Borrowed(self.domain))]
    }

    fn render_unchecked(&self) -> String {
        format!("{}\t{}", Self::ADDRESS, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_block_is_wrapped_in_markers() {
        let block = ConfigBlock {
            domain: "chat.lab.local",
            database_path: Path::new("/usr/local/ejabberd/var/lib/ejabberd/ejabberd.db"),
            certificate_path: Path::new("/usr/local/ejabberd/etc/ejabberd/server.pem"),
        };

        let rendered = block.render().unwrap();

        assert!(rendered.starts_with(&format!("\n{}\n", ConfigBlock::START_MARKER)));
        assert!(rendered.ends_with(&format!("{}\n", ConfigBlock::END_MARKER)));
        assert!(rendered.contains("  - \"localhost\"\n  - \"chat.lab.local\"\n"));
        assert!(
            rendered.contains("sql_database: \"/usr/local/ejabberd/var/lib/ejabberd/ejabberd.db\"")
        );
        assert!(rendered.contains("  - \"/usr/local/ejabberd/etc/ejabberd/server.pem\"\n"));
        assert!(rendered.contains("acme:\n  auto: false\n"));
    }

    #[test]
    fn test_blank_domain_is_rejected_before_substitution() {
        let block = ConfigBlock {
            domain: "  ",
            database_path: Path::new("/db"),
            certificate_path: Path::new("/cert"),
        };

        assert_eq!(
            block.render(),
            Err(TemplateError::MissingField {
                template: "config block",
                field: "domain",
            })
        );
    }

    #[test]
    fn test_empty_path_is_rejected() {
        let unit = SystemdUnit {
            install_prefix: Path::new(""),
            user: "ejabberd",
        };

        let error = unit.render().unwrap_err();

        assert_eq!(
            error.to_string(),
            "Template 'systemd unit' is missing a value for 'install_prefix'"
        );
    }

    #[test]
    fn test_systemd_unit() {
        let unit = SystemdUnit {
            install_prefix: Path::new("/opt/xmpp"),
            user: "xmpp",
        };

        let rendered = unit.render().unwrap();

        assert!(rendered.contains("Type=forking\n"));
        assert!(rendered.contains("User=xmpp\nGroup=xmpp\n"));
        assert!(rendered.contains("ExecStart=/opt/xmpp/sbin/ejabberdctl start\n"));
        assert!(rendered.contains("ExecStop=/opt/xmpp/sbin/ejabberdctl stop\n"));
        assert!(rendered.contains("Restart=on-failure\n"));
        assert!(rendered.contains("StartLimitInterval=3\nStartLimitBurst=100\n"));
        assert!(rendered.ends_with("WantedBy=multi-user.target\n"));
    }

    #[test]
    fn test_hosts_entry() {
        let entry = HostsEntry {
            domain: "chat.lab.local",
        };

        assert_eq!(entry.render().unwrap(), "127.0.0.1\tchat.lab.local");
    }
}
