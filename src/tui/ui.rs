//! UI rendering for the TUI.

use super::app::{Action, App, Mode};
use crate::connection::ConnectionState;
use crate::log::LogEntry;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};

/// Set up the terminal for TUI rendering.
pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to normal mode.
pub fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Render the entire UI.
pub fn render(app: &App, frame: &mut Frame) {
    let size = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(10),   // Body
            Constraint::Length(1), // Footer
        ])
        .split(size);

    render_header(app, frame, chunks[0]);
    render_body(app, frame, chunks[1]);
    render_footer(app, frame, chunks[2]);

    if app.mode == Mode::Help {
        render_help_overlay(app, frame, size);
    }
    // notices sit on top of everything
    if app.notice.is_some() {
        render_notice(app, frame, size);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let state_color = match app.controller.state() {
        ConnectionState::Connected => app.theme.success_color,
        ConnectionState::Connecting => app.theme.warning_color,
        ConnectionState::Disconnected => app.theme.inactive,
    };

    let header = Line::from(vec![
        Span::styled(
            " Keyboard Controller ",
            Style::default()
                .fg(app.theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(app.status_text(), Style::default().fg(state_color)),
        Span::raw(" | "),
        Span::styled(
            format!("{} baud", app.controller.connection().settings().port.baud_rate),
            Style::default().fg(app.theme.fg),
        ),
        Span::raw(" | "),
        Span::styled(app.uptime_string(), Style::default().fg(app.theme.fg)),
    ]);

    let widget = Paragraph::new(header).style(Style::default().bg(app.theme.selection));
    frame.render_widget(widget, area);
}

fn render_body(app: &App, frame: &mut Frame, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(40)])
        .split(area);

    render_port_list(app, frame, columns[0]);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Text to type
            Constraint::Length(1), // Actions
            Constraint::Min(5),    // Log
        ])
        .split(columns[1]);

    render_text_input(app, frame, rows[0]);
    render_actions(app, frame, rows[1]);
    render_log(app, frame, rows[2]);
}

fn render_port_list(app: &App, frame: &mut Frame, area: Rect) {
    let active_port = app.controller.port_name();

    let items: Vec<ListItem> = app
        .ports
        .iter()
        .enumerate()
        .map(|(i, port)| {
            let is_active = active_port == Some(port.port_name.as_str());
            let style = if i == app.selected_port {
                Style::default()
                    .fg(app.theme.fg)
                    .bg(app.theme.selection)
                    .add_modifier(Modifier::BOLD)
            } else if is_active {
                Style::default().fg(app.theme.success_color)
            } else {
                Style::default().fg(app.theme.fg)
            };

            let prefix = if is_active {
                "● "
            } else if i == app.selected_port {
                "> "
            } else {
                "  "
            };

            ListItem::new(format!("{prefix}{}", port.label())).style(style)
        })
        .collect();

    let title = if app.ports.is_empty() {
        " Ports (none, r to refresh) "
    } else {
        " Ports "
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(app.theme.border))
            .title(title),
    );

    frame.render_widget(list, area);
}

fn render_text_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.mode == Mode::Editing;
    let border_style = if editing {
        Style::default().fg(app.theme.accent)
    } else {
        Style::default().fg(app.theme.border)
    };
    let title = if editing {
        " Text to type [EDITING] "
    } else {
        " Text to type (i to edit) "
    };

    let widget = Paragraph::new(app.text.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title),
    );
    frame.render_widget(widget, area);

    if editing {
        let x = area.x + 1 + app.cursor as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn render_actions(app: &App, frame: &mut Frame, area: Rect) {
    let connect_label = if app.controller.state() == ConnectionState::Disconnected {
        "[Enter] Connect"
    } else {
        "[Enter] Disconnect"
    };
    let type_label = if app.controller.type_pending() {
        "[t] Type (pending)"
    } else {
        "[t] Type"
    };

    let mut spans = vec![Span::raw(" ")];
    for (action, label) in [
        (Action::Connect, connect_label),
        (Action::Type, type_label),
        (Action::Stop, "[x] Stop"),
        (Action::Status, "[s] Status"),
    ] {
        let style = if app.is_enabled(action) {
            Style::default()
                .fg(app.theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(app.theme.inactive)
                .add_modifier(Modifier::DIM)
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw("   "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_log(app: &App, frame: &mut Frame, area: Rect) {
    let entries = app.visible_log();
    let height = area.height.saturating_sub(2) as usize;
    let end = entries.len().saturating_sub(app.scroll_offset);
    let start = end.saturating_sub(height);

    let lines: Vec<Line> = entries[start..end]
        .iter()
        .map(|entry| format_entry(app, entry))
        .collect();

    let title = if app.scroll_offset > 0 {
        format!(" Log (scrolled {}) ", app.scroll_offset)
    } else {
        " Log ".to_string()
    };

    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.border))
                .title(title),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(widget, area);
}

fn format_entry<'a>(app: &App, entry: &LogEntry) -> Line<'a> {
    Line::from(vec![
        Span::styled(
            format!("[{}] ", entry.timestamp().format("%H:%M:%S")),
            Style::default().fg(app.theme.inactive),
        ),
        Span::styled(
            entry.text(),
            Style::default().fg(app.theme.log_color(entry.origin())),
        ),
    ])
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let message = app.status_message.as_deref().unwrap_or("Ready");
    let keybinds = "q:quit  j/k:port  r:refresh  i:edit  l:clear view  F1:help";

    let footer = Line::from(vec![
        Span::styled(format!(" {message} "), Style::default().fg(app.theme.fg)),
        Span::raw(" | "),
        Span::styled(keybinds, Style::default().fg(app.theme.inactive)),
    ]);

    let widget = Paragraph::new(footer).style(Style::default().bg(app.theme.selection));
    frame.render_widget(widget, area);
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };
    let popup_area = centered_rect(50, 30, area);
    frame.render_widget(Clear, popup_area);

    let color = app.theme.notice_color(notice.level);
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            notice.message.clone(),
            Style::default().fg(app.theme.fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press Enter to dismiss",
            Style::default().fg(app.theme.inactive),
        )),
    ];

    let widget = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
                .title(format!(" {} ", notice.title))
                .style(Style::default().bg(app.theme.bg)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(widget, popup_area);
}

fn render_help_overlay(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled(
            "Keybindings",
            Style::default()
                .fg(app.theme.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("  j/k, Up/Down  - Select port"),
        Line::from("  r             - Refresh port list"),
        Line::from("  Enter / c     - Connect or disconnect"),
        Line::from("  i / e / Tab   - Edit the text to type"),
        Line::from("  t             - Type the text (after a delay)"),
        Line::from("  x             - Stop typing"),
        Line::from("  s             - Ask the device for its status"),
        Line::from("  l             - Clear the log view"),
        Line::from("  PgUp/PgDn/End - Scroll the log"),
        Line::from("  q / Ctrl+C    - Quit"),
        Line::from(""),
        Line::from("While editing:"),
        Line::from("  Enter         - Type the text"),
        Line::from("  Esc / Tab     - Stop editing"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc or F1 to close",
            Style::default().fg(app.theme.inactive),
        )),
    ];

    let widget = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.accent))
                .title(" Help ")
                .style(Style::default().bg(app.theme.bg)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(widget, popup_area);
}

/// Create a centered rectangle with the given percentage of the parent area.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tui::app::testing::test_app;
    use ratatui::backend::TestBackend;

    fn draw(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(110, 30)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_render_disconnected() {
        let (app, _, _) = test_app(Config::default());
        let screen = draw(&app);
        assert!(screen.contains("Disconnected"));
        assert!(screen.contains("MOCK0 (ESP32-S3)"));
        assert!(screen.contains("[Enter] Connect"));
        assert!(screen.contains("115200 baud"));
    }

    #[test]
    fn test_render_connected_with_log() {
        let (mut app, _, _) = test_app(Config::default());
        app.controller.connect("MOCK0").unwrap();
        let screen = draw(&app);
        assert!(screen.contains("Connected to MOCK0"));
        assert!(screen.contains("[Enter] Disconnect"));
        assert!(screen.contains("Connected to MOCK0."));
    }

    #[test]
    fn test_render_notice_popup() {
        let (mut app, _, _) = test_app(Config::default());
        app.controller.connect("").unwrap_err();
        app.poll_notice();
        let screen = draw(&app);
        assert!(screen.contains("Please select a serial port"));
        assert!(screen.contains("Press Enter to dismiss"));
    }

    #[test]
    fn test_render_help() {
        let (mut app, _, _) = test_app(Config::default());
        app.mode = Mode::Help;
        assert!(draw(&app).contains("Keybindings"));
    }

    #[test]
    fn test_centered_rect_is_inside() {
        let outer = Rect::new(0, 0, 100, 40);
        let inner = centered_rect(50, 50, outer);
        assert_eq!(inner.width, 50);
        assert_eq!(inner.height, 20);
        assert!(inner.x >= outer.x && inner.right() <= outer.right());
    }
}
