//! Line-oriented console front end.
//!
//! Reads commands from stdin and prints the activity log and notices as they
//! arrive. Useful over SSH or when the terminal cannot host the TUI.

use crate::command::CommandSession;
use crate::config::Config;
use crate::connection::{ConnectionState, EventReceiver};
use crate::error::CommandError;
use crate::log::NoticeLevel;
use crate::port::describe_ports;
use std::io::{self, Write};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "\
Commands:
  ports              List serial ports
  connect [port]     Connect (defaults to serial.default_port)
  disconnect         Close the connection
  type <text>        Type <text> after the grace period
  stop               Abort typing in progress
  status             Ask the device for its status
  state              Show the connection state
  help               Show this help
  quit               Disconnect and exit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Ports,
    Connect(Option<String>),
    Disconnect,
    Type(String),
    Stop,
    Status,
    State,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command: '{0}'. Type 'help' for a list.")]
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    ///
    /// Everything after `type ` is kept verbatim, inner and trailing spaces
    /// included.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim_start().trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(' ') {
            Some((word, rest)) => (word, rest),
            None => (line.trim_end(), ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "ports" | "list" => Self::Ports,
            "connect" | "open" => {
                let port = rest.trim();
                Self::Connect((!port.is_empty()).then(|| port.to_string()))
            }
            "disconnect" | "close" => Self::Disconnect,
            "type" => Self::Type(rest.to_string()),
            "stop" => Self::Stop,
            "status" => Self::Status,
            "state" => Self::State,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Whether the console keeps reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Console front end over a [`CommandSession`].
pub struct Console {
    controller: CommandSession,
    config: Config,
    /// Log entries already printed
    printed: usize,
}

impl Console {
    pub fn new(config: Config, controller: CommandSession) -> Self {
        Self {
            controller,
            config,
            printed: 0,
        }
    }

    pub fn controller(&self) -> &CommandSession {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut CommandSession {
        &mut self.controller
    }

    /// Read commands until `quit` or end of input.
    pub async fn run(&mut self, mut controller_events: EventReceiver) -> io::Result<()> {
        let mut out = io::stdout();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        writeln!(out, "Serial keyboard controller. Type 'help' for commands.")?;
        if let Some(port) = self.config.serial.default_port.clone() {
            self.controller.connect(&self.config.serial.resolve_port(&port)).ok();
        }
        self.flush_output(&mut out)?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("stdin closed");
                        break;
                    };
                    if self.execute_line(&line, &mut out)? == Flow::Quit {
                        break;
                    }
                }
                Some(event) = controller_events.recv() => self.controller.handle(event),
            }
            self.flush_output(&mut out)?;
        }

        self.controller.disconnect();
        self.flush_output(&mut out)
    }

    /// Parse and run one line of input.
    pub fn execute_line(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        match ConsoleCommand::parse(line) {
            Ok(Some(command)) => self.execute(command, out),
            Ok(None) => Ok(Flow::Continue),
            Err(e) => {
                writeln!(out, "{e}")?;
                Ok(Flow::Continue)
            }
        }
    }

    pub fn execute(&mut self, command: ConsoleCommand, out: &mut impl Write) -> io::Result<Flow> {
        let result = match command {
            ConsoleCommand::Ports => {
                self.print_ports(out)?;
                Ok(())
            }
            ConsoleCommand::Connect(port) => {
                let port = port
                    .or_else(|| self.config.serial.default_port.clone())
                    .map(|p| self.config.serial.resolve_port(&p))
                    .unwrap_or_default();
                // failures show up in the log and as a notice
                let _ = self.controller.connect(&port);
                Ok(())
            }
            ConsoleCommand::Disconnect => {
                if self.controller.state() == ConnectionState::Disconnected {
                    writeln!(out, "Not connected.")?;
                }
                self.controller.disconnect();
                Ok(())
            }
            ConsoleCommand::Type(text) => self.controller.request_type(&text),
            ConsoleCommand::Stop => self.controller.request_stop(),
            ConsoleCommand::Status => self.controller.request_status(),
            ConsoleCommand::State => {
                writeln!(out, "{}", self.state_line())?;
                Ok(())
            }
            ConsoleCommand::Help => {
                writeln!(out, "{HELP}")?;
                Ok(())
            }
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        };

        match result {
            Err(CommandError::NotConnected) => {
                writeln!(out, "Not connected. Use 'connect <port>' first.")?;
            }
            Err(CommandError::TypePending) => {
                writeln!(out, "{}", CommandError::TypePending)?;
            }
            // the rest arrive as notices
            _ => {}
        }
        Ok(Flow::Continue)
    }

    /// Print log entries and notices that have not been shown yet.
    pub fn flush_output(&mut self, out: &mut impl Write) -> io::Result<()> {
        for entry in self.controller.log().since(self.printed) {
            writeln!(out, "{entry}")?;
        }
        self.printed = self.controller.log().len();

        while let Some(notice) = self.controller.next_notice() {
            let level = match notice.level {
                NoticeLevel::Info => "INFO",
                NoticeLevel::Warning => "WARNING",
                NoticeLevel::Error => "ERROR",
            };
            writeln!(out, "*** {level} {notice}")?;
        }
        out.flush()
    }

    fn state_line(&self) -> String {
        let port = self.controller.port_name().unwrap_or_default();
        match self.controller.state() {
            ConnectionState::Disconnected => "State: Disconnected".to_string(),
            ConnectionState::Connecting => format!("State: Connecting to {port}..."),
            ConnectionState::Connected => {
                let uptime = self
                    .controller
                    .connected_since()
                    .map(|t| t.elapsed().as_secs())
                    .unwrap_or_default();
                let pending = if self.controller.type_pending() {
                    ", typing pending"
                } else {
                    ""
                };
                format!("State: Connected to {port} for {uptime}s{pending}")
            }
        }
    }

    fn print_ports(&self, out: &mut impl Write) -> io::Result<()> {
        match describe_ports() {
            Ok(ports) if ports.is_empty() => writeln!(out, "No serial ports found."),
            Ok(ports) => {
                for port in ports {
                    writeln!(out, "  {}", port.label())?;
                }
                Ok(())
            }
            Err(e) => writeln!(out, "Failed to list ports: {e}"),
        }
    }
}
