//! Rendering for the chat-server installer window

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::app::{App, Focus, Modal, Phase};

pub(crate) fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(5), // Form
            Constraint::Min(5),    // Log pane
            Constraint::Length(3), // Help bar
        ])
        .split(frame.area());

    draw_title_bar(frame, chunks[0]);
    draw_form(frame, app, chunks[1]);
    draw_log(frame, app, chunks[2]);
    draw_help_bar(frame, app, chunks[3]);

    if let Some(modal) = app.modal() {
        let area = frame.area();
        draw_modal(frame, modal, area);
    }
}

fn draw_title_bar(frame: &mut Frame, area: Rect) {
    let title = Paragraph::new(" provision - ejabberd chat server ")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

    frame.render_widget(title, area);
}

fn field_style(app: &App, focus: Focus) -> Style {
    if app.phase() != Phase::Editing {
        Style::default().fg(Color::DarkGray)
    } else if app.focus() == focus {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn draw_form(frame: &mut Frame, app: &App, area: Rect) {
    let cursor = if app.phase() == Phase::Editing && app.focus() == Focus::Domain {
        "_"
    } else {
        ""
    };
    let checkbox = if app.update_hosts() { "[x]" } else { "[ ]" };

    let lines = vec![
        Line::from(vec![
            Span::raw("Domain:  "),
            Span::styled(
                format!("{}{cursor}", app.domain()),
                field_style(app, Focus::Domain),
            ),
        ]),
        Line::from(Span::styled(
            format!("{checkbox} Add a 127.0.0.1 alias to the hosts file"),
            field_style(app, Focus::UpdateHosts),
        )),
        Line::from(Span::styled("< Start >", field_style(app, Focus::Start))),
    ];

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Settings "),
    );
    frame.render_widget(form, area);
}

/// Start index of the visible window over `len` lines
fn log_window_start(len: usize, height: usize, scroll: usize) -> usize {
    let newest_start = len.saturating_sub(height);
    newest_start.saturating_sub(scroll)
}

fn draw_log(frame: &mut Frame, app: &App, area: Rect) {
    let height = usize::from(area.height.saturating_sub(2));
    let lines = app.log().snapshot();
    let start = log_window_start(lines.len(), height, app.scroll());

    let visible: Vec<Line> = lines
        .iter()
        .skip(start)
        .take(height)
        .map(|line| {
            let style = if line.starts_with("ERROR") || line.starts_with("ABORTED") {
                Style::default().fg(Color::Red)
            } else if line.starts_with("WARNING") {
                Style::default().fg(Color::Yellow)
            } else if line.starts_with("---") {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(Span::styled(line.clone(), style))
        })
        .collect();

    let title = if app.scroll() > 0 {
        format!(" Log ({} lines, scrolled) ", lines.len())
    } else {
        format!(" Log ({} lines) ", lines.len())
    };
    let log = Paragraph::new(visible).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(log, area);
}

fn draw_help_bar(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = if app.modal().is_some() {
        "Enter/Esc: Close"
    } else {
        match app.phase() {
            Phase::Editing => "Tab/↑↓: Move | Space: Toggle | Enter: Start | Esc: Quit",
            Phase::Running => "PgUp/PgDn/End: Scroll log | Ctrl+C: Abort",
            Phase::Finished { .. } => "PgUp/PgDn/End: Scroll log | q/Enter: Quit",
        }
    };

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(help, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn draw_modal(frame: &mut Frame, modal: &Modal, area: Rect) {
    let color = if modal.is_error {
        Color::Red
    } else {
        Color::Green
    };
    let popup = centered_rect(60, 30, area);

    let body = Paragraph::new(vec![
        Line::from(modal.message.as_str()),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to close",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .wrap(Wrap { trim: false })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(Span::styled(
                format!(" {} ", modal.title),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
    );

    frame.render_widget(Clear, popup);
    frame.render_widget(body, popup);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::app::Outcome;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use provision::{chat_server::ChatServerConfig, log_sink::LogSink};
    use ratatui::{Terminal, backend::TestBackend};

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn app(log: LogSink) -> App {
        let mut config = ChatServerConfig::default();
        *config.domain_mut() = "chat.lab.local".to_string();
        App::new(&config, log)
    }

    #[test]
    fn test_log_window_follows_the_newest_lines() {
        assert_eq!(log_window_start(100, 10, 0), 90);
        assert_eq!(log_window_start(100, 10, 15), 75);
        assert_eq!(log_window_start(100, 10, 500), 0);
        assert_eq!(log_window_start(3, 10, 0), 0);
    }

    #[test]
    fn test_form_and_log_are_drawn() {
        let log = LogSink::new();
        log.extend(["--- 1/2: Build ---", "    make[1]: Entering directory"]);

        let screen = render(&app(log));

        assert!(screen.contains("chat.lab.local"));
        assert!(screen.contains("[ ] Add a 127.0.0.1 alias"));
        assert!(screen.contains("make[1]: Entering directory"));
        assert!(screen.contains("Log (2 lines)"));
    }

    #[test]
    fn test_modal_is_drawn_over_the_log() {
        let mut app = app(LogSink::new());
        app.handle_key(KeyEvent::new(KeyCode::BackTab, KeyModifiers::NONE));
        app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        app.finish(Outcome::Failed("apt-get exited with 100".to_string()));

        let screen = render(&app);

        assert!(screen.contains("Installation failed"));
        assert!(screen.contains("apt-get exited with 100"));
        assert!(screen.contains("Enter/Esc: Close"));
    }
}
