//! TUI application state and main loop.

use crate::command::CommandSession;
use crate::config::Config;
use crate::connection::{ConnectionState, EventReceiver};
use crate::error::CommandError;
use crate::log::{LogEntry, Notice};
use crate::port::{describe_ports, PortSummary};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::io;
use tracing::{debug, warn};

use super::event::{Event, EventHandler};
use super::theme::Theme;
use super::ui;

/// Input mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Keys trigger actions
    #[default]
    Normal,
    /// Keys edit the text-to-type buffer
    Editing,
    /// Help overlay
    Help,
}

/// Whether the main loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Running,
    Quitting,
}

/// Buttons in the action bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Type,
    Stop,
    Status,
}

/// Main TUI application.
pub struct App {
    pub state: AppState,
    pub mode: Mode,
    pub theme: Theme,
    pub config: Config,

    /// The controller everything is routed through
    pub controller: CommandSession,

    /// Ports from the last refresh
    pub ports: Vec<PortSummary>,
    pub selected_port: usize,

    /// Text the Type action sends
    pub text: String,
    /// Cursor position in `text`, in chars
    pub cursor: usize,

    /// Log entries before this index are hidden ("clear view")
    pub log_start: usize,
    /// Lines scrolled back from the newest entry
    pub scroll_offset: usize,

    /// Notice being shown in the popup
    pub notice: Option<Notice>,
    /// Transient one-line feedback in the footer
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: Config, controller: CommandSession) -> Self {
        let theme = Theme::by_name(&config.tui.theme)
            .cloned()
            .unwrap_or_default();

        Self {
            state: AppState::Running,
            mode: Mode::Normal,
            theme,
            config,
            controller,
            ports: Vec::new(),
            selected_port: 0,
            text: String::new(),
            cursor: 0,
            log_start: 0,
            scroll_offset: 0,
            notice: None,
            status_message: None,
        }
    }

    /// Run the application until the user quits.
    ///
    /// `controller_events` is the receiving end of the channel the
    /// controller's reader and scheduler were built with.
    pub async fn run(&mut self, mut controller_events: EventReceiver) -> io::Result<()> {
        let mut terminal = ui::setup_terminal()?;
        let mut events = EventHandler::new(self.config.tui.refresh_interval());

        self.refresh_ports();

        let result = loop {
            self.poll_notice();
            if let Err(e) = terminal.draw(|frame| ui::render(self, frame)) {
                break Err(e);
            }
            if self.state == AppState::Quitting {
                break Ok(());
            }

            tokio::select! {
                ev = events.next() => match ev {
                    Some(ev) => self.handle_event(ev),
                    None => self.state = AppState::Quitting,
                },
                Some(ev) = controller_events.recv() => self.controller.handle(ev),
            }
        };

        // closing the window ends the session
        self.controller.disconnect();
        drop(events);
        ui::restore_terminal(terminal)?;
        result
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Tick | Event::Resize(_, _) => {}
            Event::Error(e) => {
                warn!(error = %e, "terminal input error");
                self.status_message = Some(format!("Input error: {e}"));
            }
        }
    }

    /// Move the next queued notice into the popup slot.
    pub fn poll_notice(&mut self) {
        if self.notice.is_none() {
            self.notice = self.controller.next_notice();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.state = AppState::Quitting;
            return;
        }

        // the popup is modal
        if self.notice.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.notice = None;
                self.poll_notice();
            }
            return;
        }

        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Editing => self.handle_editing_key(key),
            Mode::Help => self.handle_help_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.state = AppState::Quitting,
            KeyCode::F(1) | KeyCode::Char('?') => self.mode = Mode::Help,
            KeyCode::Char('i') | KeyCode::Char('e') | KeyCode::Tab => self.mode = Mode::Editing,
            KeyCode::Up | KeyCode::Char('k') => self.move_selection_up(),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection_down(),
            KeyCode::Char('r') => self.refresh_ports(),
            KeyCode::Enter | KeyCode::Char('c') => self.trigger(Action::Connect),
            KeyCode::Char('t') => self.trigger(Action::Type),
            KeyCode::Char('x') => self.trigger(Action::Stop),
            KeyCode::Char('s') => self.trigger(Action::Status),
            // plain or with Ctrl
            KeyCode::Char('l') => self.clear_view(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::End => self.scroll_offset = 0,
            _ => {}
        }
    }

    fn handle_editing_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Tab => self.mode = Mode::Normal,
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                self.trigger(Action::Type);
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index(self.cursor);
                    self.text.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.text.chars().count() {
                    let at = self.byte_index(self.cursor);
                    self.text.remove(at);
                }
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => {
                if self.cursor < self.text.chars().count() {
                    self.cursor += 1;
                }
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.text.chars().count(),
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.text.insert(at, c);
                self.cursor += 1;
            }
            _ => {}
        }
    }

    fn handle_help_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('q') | KeyCode::Char('?')) {
            self.mode = Mode::Normal;
        }
    }

    fn byte_index(&self, char_pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_pos)
            .map_or(self.text.len(), |(i, _)| i)
    }

    /// Whether an action button is currently usable.
    pub fn is_enabled(&self, action: Action) -> bool {
        match action {
            Action::Connect => {
                self.controller.state() != ConnectionState::Disconnected
                    || !self.ports.is_empty()
            }
            Action::Type => self.controller.can_request_type(),
            Action::Stop | Action::Status => self.controller.state().is_connected(),
        }
    }

    /// Run an action if it is enabled.
    pub fn trigger(&mut self, action: Action) {
        if !self.is_enabled(action) {
            debug!(?action, "ignoring disabled action");
            return;
        }
        let result = match action {
            Action::Connect => {
                self.toggle_connection();
                Ok(())
            }
            Action::Type => {
                let text = self.text.clone();
                self.controller.request_type(&text)
            }
            Action::Stop => self.controller.request_stop(),
            Action::Status => self.controller.request_status(),
        };
        self.status_message = match result {
            Ok(()) => None,
            // surfaced through the notice popup
            Err(CommandError::EmptyInput) | Err(CommandError::Connection(_)) => None,
            Err(e) => Some(e.to_string()),
        };
    }

    fn toggle_connection(&mut self) {
        if self.controller.state() != ConnectionState::Disconnected {
            self.controller.disconnect();
            return;
        }
        let Some(port) = self.ports.get(self.selected_port) else {
            return;
        };
        let port_name = port.port_name.clone();
        // failures are logged and raised as a notice
        let _ = self.controller.connect(&port_name);
    }

    /// Re-enumerate serial ports, keeping the selection where possible.
    pub fn refresh_ports(&mut self) {
        match describe_ports() {
            Ok(ports) => self.set_ports(ports),
            Err(e) => {
                warn!(error = %e, "port enumeration failed");
                self.status_message = Some(format!("Failed to list ports: {e}"));
            }
        }
    }

    /// Replace the port list.
    ///
    /// Keeps the previously selected port if it is still present, otherwise
    /// selects the configured default port, otherwise the first one.
    pub fn set_ports(&mut self, ports: Vec<PortSummary>) {
        let previous = self
            .ports
            .get(self.selected_port)
            .map(|p| p.port_name.clone());
        let default = self
            .config
            .serial
            .default_port
            .as_deref()
            .map(|p| self.config.serial.resolve_port(p));

        let find = |name: &Option<String>| {
            name.as_ref()
                .and_then(|n| ports.iter().position(|p| &p.port_name == n))
        };
        self.selected_port = find(&previous).or_else(|| find(&default)).unwrap_or(0);
        self.ports = ports;
        self.status_message = Some(format!("Found {} port(s)", self.ports.len()));
    }

    pub fn selected_port_name(&self) -> Option<&str> {
        self.ports
            .get(self.selected_port)
            .map(|p| p.port_name.as_str())
    }

    fn move_selection_up(&mut self) {
        self.selected_port = self.selected_port.saturating_sub(1);
    }

    fn move_selection_down(&mut self) {
        if self.selected_port + 1 < self.ports.len() {
            self.selected_port += 1;
        }
    }

    /// Hide everything logged so far. The log itself is untouched.
    pub fn clear_view(&mut self) {
        self.log_start = self.controller.log().len();
        self.scroll_offset = 0;
    }

    /// Entries visible in the log view.
    pub fn visible_log(&self) -> &[LogEntry] {
        self.controller.log().since(self.log_start)
    }

    fn page_up(&mut self) {
        let max = self.visible_log().len().saturating_sub(1);
        self.scroll_offset = (self.scroll_offset + 10).min(max);
    }

    fn page_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(10);
    }

    /// Status line text.
    pub fn status_text(&self) -> String {
        let port = self.controller.port_name().unwrap_or_default();
        match self.controller.state() {
            ConnectionState::Disconnected => "Disconnected".to_string(),
            ConnectionState::Connecting => format!("Connecting to {port}..."),
            ConnectionState::Connected => format!("Connected to {port}"),
        }
    }

    /// Time since the session became connected.
    pub fn uptime_string(&self) -> String {
        match self.controller.connected_since() {
            Some(start) => {
                let secs = start.elapsed().as_secs();
                format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
            }
            None => "--:--:--".to_string(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{summary, test_app};
    use super::*;

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_chars(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_first_port_preselected() {
        let (app, _, _) = test_app(Config::default());
        assert_eq!(app.selected_port_name(), Some("MOCK0"));
    }

    #[test]
    fn test_default_port_preselected() {
        let mut config = Config::default();
        config.serial.default_port = Some("MOCK1".to_string());
        let (app, _, _) = test_app(config);
        assert_eq!(app.selected_port_name(), Some("MOCK1"));
    }

    #[test]
    fn test_refresh_keeps_selection() {
        let (mut app, _, _) = test_app(Config::default());
        press(&mut app, KeyCode::Down);
        app.set_ports(vec![summary("MOCK1"), summary("MOCK2")]);
        assert_eq!(app.selected_port_name(), Some("MOCK1"));
    }

    #[test]
    fn test_actions_disabled_until_connected() {
        let (mut app, mock, _) = test_app(Config::default());
        assert!(app.is_enabled(Action::Connect));
        assert!(!app.is_enabled(Action::Type));
        assert!(!app.is_enabled(Action::Stop));

        press(&mut app, KeyCode::Char('x'));
        assert!(mock.get_write_log().is_empty());

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.status_text(), "Connected to MOCK0");
        assert!(app.is_enabled(Action::Stop));

        press(&mut app, KeyCode::Char('x'));
        assert_eq!(mock.written_bytes(), b"STOP:");
    }

    #[test]
    fn test_connect_key_toggles() {
        let (mut app, _, _) = test_app(Config::default());
        press(&mut app, KeyCode::Char('c'));
        assert!(app.controller.state().is_connected());
        press(&mut app, KeyCode::Char('c'));
        assert_eq!(app.status_text(), "Disconnected");
    }

    #[test]
    fn test_edit_then_type() {
        let (mut app, mock, scheduler) = test_app(Config::default());
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('i'));
        type_chars(&mut app, "hxi");
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.text, "hi");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Normal);
        assert!(!app.is_enabled(Action::Type));
        for (_, event) in scheduler.take() {
            app.controller.handle(event);
        }
        assert_eq!(mock.written_bytes(), b"TYPE:2:hi");
        assert!(app.is_enabled(Action::Type));
    }

    #[test]
    fn test_editing_handles_multibyte_text() {
        let (mut app, _, _) = test_app(Config::default());
        press(&mut app, KeyCode::Char('e'));
        type_chars(&mut app, "é€");
        press(&mut app, KeyCode::Home);
        press(&mut app, KeyCode::Delete);
        assert_eq!(app.text, "€");
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn test_empty_type_raises_notice_popup() {
        let (mut app, _, scheduler) = test_app(Config::default());
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('t'));
        app.poll_notice();

        assert!(scheduler.is_empty());
        let notice = app.notice.clone().unwrap();
        assert_eq!(notice.message, "Please enter some text to type");

        // popup swallows other keys
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.state, AppState::Running);
        press(&mut app, KeyCode::Esc);
        assert!(app.notice.is_none());
    }

    #[test]
    fn test_clear_view_hides_old_entries() {
        let (mut app, _, _) = test_app(Config::default());
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.visible_log().len(), 1);

        press(&mut app, KeyCode::Char('l'));
        assert!(app.visible_log().is_empty());
        assert_eq!(app.controller.log().len(), 1);

        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.visible_log().len(), 1);
    }

    #[test]
    fn test_help_and_quit() {
        let (mut app, _, _) = test_app(Config::default());
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.mode, Mode::Help);
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.state, AppState::Quitting);
    }
}
