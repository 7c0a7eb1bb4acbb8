//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` lets real ports and mocks be used interchangeably;
//! `PortOpener` is the seam the connection manager opens ports through.

use super::error::PortError;
use std::time::Duration;

/// Baud rate the keyboard firmware listens on.
pub const DEVICE_BAUD_RATE: u32 = 115_200;

/// Configuration parameters for a serial port.
///
/// Framing is fixed at 8N1 without flow control; only the rate and the read
/// timeout vary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Read timeout. Kept short so the reader notices a stop request quickly.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: DEVICE_BAUD_RATE,
            timeout: Duration::from_millis(100),
        }
    }
}

/// Blocking byte I/O on one open serial device.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Returns the number of bytes accepted, which may be short.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Write the whole buffer, retrying short writes.
    fn write_all_bytes(&mut self, mut data: &[u8]) -> Result<(), PortError> {
        while !data.is_empty() {
            let n = self.write_bytes(data)?;
            if n == 0 {
                return Err(PortError::disconnected("write returned zero bytes"));
            }
            data = &data[n..];
        }
        Ok(())
    }

    /// Blocks for at most the configured read timeout. A timeout is reported
    /// as an error for which [`PortError::is_idle`] holds.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    fn name(&self) -> &str;

    /// Open a second handle onto the same device.
    ///
    /// The background reader owns the clone; writes stay on the original.
    fn try_clone_box(&self) -> Result<Box<dyn SerialPortAdapter>, PortError>;

    /// Bytes waiting in the input buffer.
    ///
    /// `Ok(None)` when the transport cannot tell; callers then just read. An
    /// error here usually means the device is gone.
    fn bytes_to_read(&self) -> Result<Option<usize>, PortError> {
        Ok(None)
    }
}

/// Opens named serial ports.
///
/// Implemented for plain closures so tests can hand the connection manager a
/// mock without a dedicated type.
pub trait PortOpener: Send {
    fn open(
        &self,
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

impl<F> PortOpener for F
where
    F: Fn(&str, &PortConfiguration) -> Result<Box<dyn SerialPortAdapter>, PortError> + Send,
{
    fn open(
        &self,
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        self(port_name, config)
    }
}
