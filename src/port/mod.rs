//! Port abstraction layer for serial communication.
//!
//! Provides the transport traits, the real `serialport`-backed
//! implementation, a mock for tests, and port enumeration.

pub mod discovery;
pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use discovery::{describe_ports, list_available_ports, PortSummary};
pub use error::PortError;
pub use mock::MockSerialPort;
pub use sync_port::*;
pub use traits::*;
