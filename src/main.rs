use clap::{Parser, Subcommand};
use serial_keyboard_controller::config::{
    get_default_config_path, Config, ConfigLoader, LogFormat, LoggingConfig,
};
use serial_keyboard_controller::connection::event_channel;
use serial_keyboard_controller::console::Console;
use serial_keyboard_controller::port::{describe_ports, SystemPortOpener};
use serial_keyboard_controller::scheduler::TokioScheduler;
use serial_keyboard_controller::CommandSession;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(
    name = "keyboard-controller",
    version,
    about = "Drive a serial-attached keyboard emulator.",
    long_about = "Connects to a microcontroller that emulates a USB keyboard, sends it TYPE/STOP/STATUS commands and shows what it reports back."
)]
struct Cli {
    /// Configuration file (overrides the standard search path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive terminal UI (default)
    Tui,
    /// Line-oriented console on stdin/stdout
    Console,
    /// List serial ports
    Ports {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration, or write a default one
    Config {
        /// Write a default config file to the standard location (or --config)
        #[arg(long)]
        init: bool,
    },
}

/// Where diagnostics go when no log file is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    /// The terminal belongs to the UI
    FileOnly,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Ports { json }) => list_ports(json),
        Some(Commands::Config { init }) => config_command(cli.config, init),
        Some(Commands::Console) => {
            let config = load_config(cli.config.as_ref())?;
            init_tracing(&config.logging, LogTarget::Stderr)?;
            run_console(config).await
        }
        Some(Commands::Tui) | None => {
            let config = load_config(cli.config.as_ref())?;
            init_tracing(&config.logging, LogTarget::FileOnly)?;
            run_tui(config).await
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, BoxError> {
    let loader = match path {
        Some(path) => ConfigLoader::load_from(path)?,
        None => match ConfigLoader::load() {
            Ok(loader) => loader,
            Err(e) => {
                eprintln!("Warning: Failed to load config, using defaults: {e}");
                ConfigLoader::with_defaults()
            }
        },
    };
    Ok(loader.into_config())
}

fn init_tracing(logging: &LoggingConfig, target: LogTarget) -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?;

    let writer = match (&logging.file, target) {
        (Some(path), _) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        (None, LogTarget::Stderr) => BoxMakeWriter::new(std::io::stderr),
        (None, LogTarget::FileOnly) => return Ok(()),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(logging.file.is_none());

    match logging.format {
        LogFormat::Json => builder.json().try_init()?,
        LogFormat::Pretty => builder.pretty().try_init()?,
        LogFormat::Compact => builder.compact().try_init()?,
    }
    Ok(())
}

fn build_controller(
    config: &Config,
) -> Result<(CommandSession, serial_keyboard_controller::EventReceiver), BoxError> {
    let (tx, rx) = event_channel();
    let scheduler =
        TokioScheduler::try_current(tx.clone()).ok_or("controller must run inside tokio")?;
    let controller =
        CommandSession::from_config(config, Box::new(SystemPortOpener), Arc::new(scheduler), tx);
    Ok((controller, rx))
}

async fn run_console(config: Config) -> Result<(), BoxError> {
    let (controller, events) = build_controller(&config)?;
    info!("starting console");
    let mut console = Console::new(config, controller);
    console.run(events).await?;
    Ok(())
}

#[cfg(feature = "tui")]
async fn run_tui(config: Config) -> Result<(), BoxError> {
    use serial_keyboard_controller::tui::App;

    let (controller, events) = build_controller(&config)?;
    info!("starting tui");
    let mut app = App::new(config, controller);
    app.run(events).await?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
async fn run_tui(config: Config) -> Result<(), BoxError> {
    eprintln!("Built without the terminal UI; using the console instead.");
    run_console(config).await
}

fn list_ports(json: bool) -> Result<(), BoxError> {
    let ports = describe_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    println!("{:<24} {:<10} DESCRIPTION", "PORT", "TYPE");
    for port in ports {
        let description = [port.manufacturer.as_deref(), port.product.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        println!("{:<24} {:<10} {}", port.port_name, port.kind, description);
    }
    Ok(())
}

fn config_command(path: Option<PathBuf>, init: bool) -> Result<(), BoxError> {
    if init {
        let target = path
            .or_else(get_default_config_path)
            .ok_or("no config directory on this platform; pass --config <path>")?;
        if target.exists() {
            return Err(format!("{} already exists", target.display()).into());
        }
        ConfigLoader::with_defaults().save_to(&target)?;
        println!("Wrote default configuration to {}", target.display());
        return Ok(());
    }

    let config = load_config(path.as_ref())?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
