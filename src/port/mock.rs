//! In-memory stand-in for a keyboard device.
//!
//! Reads come from a queue, writes are logged, and an unplugged device can be
//! simulated. Clones share state, so a test can keep one handle while the
//! connection manager and its reader own others.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Read window reported by an injected timeout.
const MOCK_READ_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct DeviceState {
    incoming: VecDeque<u8>,
    /// One entry per successful write call.
    written: Vec<Vec<u8>>,
    time_out_next_read: bool,
    /// Every read, write and byte count fails.
    unplugged: bool,
    fail_next_write: bool,
    max_write_chunk: Option<usize>,
    clone_fails: bool,
    read_calls: u64,
}

/// Mock serial port.
///
/// # Example
/// ```
/// use serial_keyboard_controller::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"READY\n");
///
/// let mut buffer = [0u8; 6];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"READY\n");
///
/// port.write_bytes(b"STATUS:").unwrap();
/// assert_eq!(port.written_bytes(), b"STATUS:");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    device: Arc<Mutex<DeviceState>>,
}

impl MockSerialPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: Arc::default(),
        }
    }

    fn device(&self) -> MutexGuard<'_, DeviceState> {
        self.device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue bytes as if the device had sent them.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.device().incoming.extend(data);
    }

    /// Everything written so far, one entry per write call.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.device().written.clone()
    }

    /// Everything written so far, concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.device().written.concat()
    }

    /// Make the next read report a timeout.
    pub fn time_out_next_read(&mut self) {
        self.device().time_out_next_read = true;
    }

    /// Simulate the device being unplugged (or plugged back in).
    pub fn set_disconnected(&mut self, unplugged: bool) {
        self.device().unplugged = unplugged;
    }

    /// Make only the next write fail as if the device vanished.
    pub fn fail_next_write(&mut self) {
        self.device().fail_next_write = true;
    }

    /// Accept at most `chunk` bytes per write call.
    pub fn set_max_write_chunk(&mut self, chunk: Option<usize>) {
        self.device().max_write_chunk = chunk;
    }

    /// Make `try_clone_box` fail.
    pub fn set_clone_fails(&mut self, fails: bool) {
        self.device().clone_fails = fails;
    }

    pub fn read_calls(&self) -> u64 {
        self.device().read_calls
    }

    /// Number of live handles sharing this mock, this one included.
    pub fn open_handles(&self) -> usize {
        Arc::strong_count(&self.device)
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut device = self.device();

        if device.unplugged {
            return Err(PortError::disconnected("mock device unplugged"));
        }
        if device.fail_next_write {
            device.fail_next_write = false;
            return Err(PortError::disconnected("mock write failure"));
        }

        let n = device.max_write_chunk.map_or(data.len(), |c| c.min(data.len()));
        device.written.push(data[..n].to_vec());
        Ok(n)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut device = self.device();
        device.read_calls += 1;

        if device.unplugged {
            return Err(PortError::disconnected("mock device unplugged"));
        }
        if device.time_out_next_read {
            device.time_out_next_read = false;
            return Err(PortError::timeout(MOCK_READ_TIMEOUT));
        }

        let n = buffer.len().min(device.incoming.len());
        for (slot, byte) in buffer.iter_mut().zip(device.incoming.drain(..n)) {
            *slot = byte;
        }

        if n == 0 {
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "no data queued",
            )))
        } else {
            Ok(n)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_box(&self) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        if self.device().clone_fails {
            return Err(PortError::config("mock clone refused"));
        }
        Ok(Box::new(self.clone()))
    }

    fn bytes_to_read(&self) -> Result<Option<usize>, PortError> {
        let device = self.device();
        if device.unplugged {
            return Err(PortError::disconnected("mock device unplugged"));
        }
        Ok(Some(device.incoming.len()))
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let device = self.device();
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("queued", &device.incoming.len())
            .field("unplugged", &device.unplugged)
            .finish()
    }
}
