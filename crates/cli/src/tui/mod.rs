//! Interactive form for the chat-server installation
//!
//! The render loop runs on a blocking thread and only reads: it draws snapshots
//! of the [`LogSink`] and drains a completion channel. The workflow itself runs
//! on a tokio task that formats every event into the sink.

mod app;
mod ui;

use std::{
    io::{self, Stdout},
    sync::{Arc, mpsc},
    time::Duration,
};

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use provision::{
    commands::CommandRunner,
    config::AppConfig,
    fs::real::RealFileSystem,
    log_sink::LogSink,
    privilege::invoking_user_home,
    workflow::{WorkflowEvent, WorkflowRunner},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    commands::chat_server::plan,
    event_processor::{NO_RESULT, log_line},
};
use app::{Action, App, Outcome};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run the installer window until the user quits; returns the process exit code
pub(crate) async fn run<CR>(config: AppConfig, runner: Arc<CR>, log: LogSink) -> anyhow::Result<i32>
where
    CR: CommandRunner + 'static,
{
    let handle = Handle::current();

    tokio::task::spawn_blocking(move || {
        let mut guard = TerminalGuard::enter()?;
        render_loop(&mut guard.terminal, config, runner, log, &handle)
    })
    .await?
}

/// Raw mode and the alternate screen, restored on drop
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }

        match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(e) => {
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                let _ = disable_raw_mode();
                Err(e.into())
            }
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

fn render_loop<CR>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut config: AppConfig,
    runner: Arc<CR>,
    log: LogSink,
    handle: &Handle,
) -> anyhow::Result<i32>
where
    CR: CommandRunner + 'static,
{
    let mut app = App::new(config.chat_server(), log.clone());
    let (done_tx, done_rx) = mpsc::channel();
    let mut worker: Option<JoinHandle<()>> = None;

    loop {
        if let Ok(outcome) = done_rx.try_recv() {
            worker = None;
            app.finish(outcome);
        }

        terminal.draw(|frame| ui::draw(frame, &app))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key) {
            Action::None => {}
            Action::Start => {
                app.apply_to(config.chat_server_mut());
                info!(
                    domain = config.chat_server().domain(),
                    update_hosts = config.chat_server().update_hosts(),
                    "Starting chat-server installation"
                );
                worker = Some(handle.spawn(install(
                    config.clone(),
                    Arc::clone(&runner),
                    log.clone(),
                    done_tx.clone(),
                )));
            }
            Action::Abort => {
                if let Some(worker) = worker.take() {
                    warn!("Aborting chat-server installation");
                    // The aborted task may not be dropped before the process exits
                    runner.kill_running();
                    worker.abort();
                }
                app.finish(Outcome::Aborted);
            }
            Action::Quit => return Ok(app.exit_code()),
        }
    }
}

/// Plan and run the workflow, writing every event into `log`
async fn install<CR>(
    config: AppConfig,
    runner: Arc<CR>,
    log: LogSink,
    done: mpsc::Sender<Outcome>,
) where
    CR: CommandRunner + 'static,
{
    let outcome = forward_events(&config, runner, &log).await;
    // The receiver is gone only if the window already closed
    let _ = done.send(outcome);
}

async fn forward_events<CR>(config: &AppConfig, runner: Arc<CR>, log: &LogSink) -> Outcome
where
    CR: CommandRunner + 'static,
{
    let plan = match plan(
        config.chat_server(),
        runner.as_ref(),
        config.command_timeout(),
        invoking_user_home(),
    )
    .await
    {
        Ok(plan) => plan,
        Err(e) => {
            let message = format!("{e:#}");
            log.append(format!("ERROR: {message}"));
            return Outcome::Failed(message);
        }
    };

    let mut events = WorkflowRunner::from_shared(runner, Arc::new(RealFileSystem)).start(plan.workflow);
    while let Some(event) = events.next().await {
        if let Some(line) = log_line(&event) {
            log.extend(line.lines());
        }
        if let WorkflowEvent::Completed(result) = event {
            return match result {
                Ok(_) => Outcome::Succeeded,
                Err(failure) => Outcome::Failed(failure.to_string()),
            };
        }
    }

    Outcome::Failed(NO_RESULT.to_string())
}
