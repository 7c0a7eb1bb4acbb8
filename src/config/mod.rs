//! Configuration for the keyboard controller.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `KBCTL_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. `keyboard-controller/config.toml` under the platform config directory
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Scalars can be overridden with `KBCTL_<SECTION>_<KEY>`, e.g.
//! `KBCTL_SERIAL_BAUD_RATE=9600` or `KBCTL_SESSION_TYPE_DELAY_MS=3000`.
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_keyboard_controller::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load().unwrap_or_else(|_| ConfigLoader::with_defaults());
//! let config = loader.config();
//! println!("typing delay: {:?}", config.session.type_delay());
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, SessionConfig, TuiConfig};
