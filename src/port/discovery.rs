//! Port enumeration.

use super::error::PortError;
use serde::Serialize;
use serialport::{SerialPortInfo, SerialPortType};

/// A serial port as shown in the port picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSummary {
    pub port_name: String,
    /// "usb", "bluetooth", "pci" or "unknown".
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

impl PortSummary {
    /// One-line label: the port name plus whatever the USB descriptor offers.
    pub fn label(&self) -> String {
        match (&self.manufacturer, &self.product) {
            (_, Some(product)) => format!("{} ({})", self.port_name, product),
            (Some(manufacturer), None) => format!("{} ({})", self.port_name, manufacturer),
            (None, None) => self.port_name.clone(),
        }
    }
}

impl From<SerialPortInfo> for PortSummary {
    fn from(info: SerialPortInfo) -> Self {
        let (kind, manufacturer, product) = match info.port_type {
            SerialPortType::UsbPort(usb) => ("usb", usb.manufacturer, usb.product),
            SerialPortType::BluetoothPort => ("bluetooth", None, None),
            SerialPortType::PciPort => ("pci", None, None),
            SerialPortType::Unknown => ("unknown", None, None),
        };
        Self {
            port_name: info.port_name,
            kind,
            manufacturer,
            product,
        }
    }
}

/// Enumerate the serial ports the OS currently exposes.
pub fn describe_ports() -> Result<Vec<PortSummary>, PortError> {
    let mut ports: Vec<PortSummary> = serialport::available_ports()?
        .into_iter()
        .map(PortSummary::from)
        .collect();
    ports.sort_by(|a, b| a.port_name.cmp(&b.port_name));
    Ok(ports)
}

/// Names of the available serial ports, sorted.
pub fn list_available_ports() -> Result<Vec<String>, PortError> {
    Ok(describe_ports()?.into_iter().map(|p| p.port_name).collect())
}
