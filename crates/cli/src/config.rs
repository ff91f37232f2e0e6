use std::num::NonZeroU64;

use provision::config::{AppConfig, ApplyToConfig};

use crate::cli::{ClapCli, ClapCommands};

impl ApplyToConfig for ClapCli {
    fn apply_to_config(&self, mut config: AppConfig) -> AppConfig {
        // UI flags can only switch things on or colors off; absent flags keep
        // the file's values.
        if self.verbose {
            *config.verbose_mut() = true;
        }
        if self.no_color {
            *config.use_colors_mut() = false;
        }
        if self.yes {
            *config.assume_yes_mut() = true;
        }

        if let Some(secs) = self.timeout {
            *config.command_timeout_mut() = NonZeroU64::new(secs);
        }

        if let ClapCommands::ChatServer(args) = &self.command {
            if let Some(domain) = args.domain.as_ref() {
                *config.chat_server_mut().domain_mut() = domain.clone();
            }
            if args.update_hosts {
                *config.chat_server_mut().update_hosts_mut() = true;
            }
        }

        config
    }
}
