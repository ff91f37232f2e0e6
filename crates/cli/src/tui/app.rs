//! Form state and key handling for the chat-server installer

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use provision::{
    chat_server::{ChatServerConfig, validate_domain},
    log_sink::LogSink,
};

/// Lines moved by PageUp/PageDown in the log pane
const SCROLL_PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Focus {
    Domain,
    UpdateHosts,
    Start,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Self::Domain => Self::UpdateHosts,
            Self::UpdateHosts => Self::Start,
            Self::Start => Self::Domain,
        }
    }

    fn previous(self) -> Self {
        match self {
            Self::Domain => Self::Start,
            Self::UpdateHosts => Self::Domain,
            Self::Start => Self::UpdateHosts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Editing,
    Running,
    Finished { success: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Modal {
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) is_error: bool,
}

/// What the render loop should do after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Start,
    Quit,
    Abort,
}

/// How a started installation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Succeeded,
    Failed(String),
    Aborted,
}

pub(crate) struct App {
    domain: String,
    update_hosts: bool,
    focus: Focus,
    phase: Phase,
    modal: Option<Modal>,
    log: LogSink,
    /// Lines scrolled up from the newest log line
    scroll: usize,
}

impl App {
    pub(crate) fn new(config: &ChatServerConfig, log: LogSink) -> Self {
        Self {
            domain: config.domain().to_string(),
            update_hosts: config.update_hosts(),
            focus: Focus::Domain,
            phase: Phase::Editing,
            modal: None,
            log,
            scroll: 0,
        }
    }

    pub(crate) fn domain(&self) -> &str {
        &self.domain
    }

    pub(crate) fn update_hosts(&self) -> bool {
        self.update_hosts
    }

    pub(crate) fn focus(&self) -> Focus {
        self.focus
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    pub(crate) fn log(&self) -> &LogSink {
        &self.log
    }

    pub(crate) fn scroll(&self) -> usize {
        self.scroll
    }

    /// Copy the form values into the configuration the workflow is built from
    pub(crate) fn apply_to(&self, config: &mut ChatServerConfig) {
        *config.domain_mut() = self.domain.trim().to_string();
        *config.update_hosts_mut() = self.update_hosts;
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return if self.phase == Phase::Running {
                Action::Abort
            } else {
                Action::Quit
            };
        }

        if self.modal.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.modal = None;
            }
            return Action::None;
        }

        match key.code {
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_add(SCROLL_PAGE);
                return Action::None;
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_sub(SCROLL_PAGE);
                return Action::None;
            }
            KeyCode::End => {
                self.scroll = 0;
                return Action::None;
            }
            _ => {}
        }

        match self.phase {
            Phase::Editing => self.handle_form_key(key),
            Phase::Running => Action::None,
            Phase::Finished { .. } => match key.code {
                KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => Action::Quit,
                _ => Action::None,
            },
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Action {
        match (self.focus, key.code) {
            (_, KeyCode::Esc) => Action::Quit,
            (_, KeyCode::Tab | KeyCode::Down) => {
                self.focus = self.focus.next();
                Action::None
            }
            (_, KeyCode::BackTab | KeyCode::Up) => {
                self.focus = self.focus.previous();
                Action::None
            }
            (Focus::Domain, KeyCode::Char(c)) => {
                self.domain.push(c);
                Action::None
            }
            (Focus::Domain, KeyCode::Backspace) => {
                self.domain.pop();
                Action::None
            }
            (Focus::Domain, KeyCode::Enter) => {
                self.focus = Focus::UpdateHosts;
                Action::None
            }
            (Focus::UpdateHosts, KeyCode::Char(' ') | KeyCode::Enter) => {
                self.update_hosts = !self.update_hosts;
                Action::None
            }
            (Focus::Start, KeyCode::Enter) => self.try_start(),
            _ => Action::None,
        }
    }

    fn try_start(&mut self) -> Action {
        let domain = self.domain.trim();
        if let Err(e) = validate_domain(domain) {
            self.modal = Some(Modal {
                title: "Invalid domain".to_string(),
                message: e.to_string(),
                is_error: true,
            });
            self.focus = Focus::Domain;
            return Action::None;
        }

        self.log
            .append(format!("Installing ejabberd for '{domain}'"));
        self.phase = Phase::Running;
        self.scroll = 0;
        Action::Start
    }

    /// Record how the installation ended; the window stays open until the user quits
    pub(crate) fn finish(&mut self, outcome: Outcome) {
        self.scroll = 0;
        let (success, modal) = match outcome {
            Outcome::Succeeded => (
                true,
                Modal {
                    title: "Installation complete".to_string(),
                    message: format!(
                        "ejabberd is installed and serving '{}'.",
                        self.domain.trim()
                    ),
                    is_error: false,
                },
            ),
            Outcome::Failed(message) => (
                false,
                Modal {
                    title: "Installation failed".to_string(),
                    message,
                    is_error: true,
                },
            ),
            Outcome::Aborted => {
                self.log.append("Installation aborted.");
                (
                    false,
                    Modal {
                        title: "Installation aborted".to_string(),
                        message: "The running step was stopped. The system may be partially set up."
                            .to_string(),
                        is_error: true,
                    },
                )
            }
        };

        self.phase = Phase::Finished { success };
        self.modal = Some(modal);
    }

    /// 0 unless an installation was started and did not succeed
    pub(crate) fn exit_code(&self) -> i32 {
        match self.phase {
            Phase::Finished { success: false } => 1,
            _ => 0,
        }
    }
}
