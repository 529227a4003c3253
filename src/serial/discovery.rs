//! Serial port discovery.
//!
//! There is no handshake with the board, so discovery is a guess: the first
//! port whose USB descriptor mentions a common USB-UART bridge wins.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::{debug, info, warn};

/// Descriptor substrings that identify a USB-UART bridge or an ESP32 board.
pub const DEFAULT_KEYWORDS: &[&str] = &["USB", "CP210", "CH340", "FTDI", "Silicon Labs", "ESP32"];

/// The human-readable view of one serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Device path (e.g. "/dev/ttyUSB0", "COM3")
    pub device: String,
    /// Product string or port kind
    pub description: String,
    /// USB manufacturer, when reported
    pub manufacturer: Option<String>,
}

impl PortDescriptor {
    pub fn new(
        device: impl Into<String>,
        description: impl Into<String>,
        manufacturer: Option<String>,
    ) -> Self {
        Self {
            device: device.into(),
            description: description.into(),
            manufacturer,
        }
    }

    /// Whether the description or manufacturer contains any keyword, ignoring case.
    pub fn matches<S: AsRef<str>>(&self, keywords: &[S]) -> bool {
        let description = self.description.to_lowercase();
        let manufacturer = self.manufacturer.as_deref().unwrap_or_default().to_lowercase();

        keywords.iter().any(|keyword| {
            let keyword = keyword.as_ref().to_lowercase();
            description.contains(&keyword) || manufacturer.contains(&keyword)
        })
    }
}

impl From<SerialPortInfo> for PortDescriptor {
    fn from(info: SerialPortInfo) -> Self {
        let (description, manufacturer) = match info.port_type {
            SerialPortType::UsbPort(usb) => (
                usb.product.unwrap_or_else(|| info.port_name.clone()),
                usb.manufacturer,
            ),
            SerialPortType::PciPort => ("PCI device".to_string(), None),
            SerialPortType::BluetoothPort => ("Bluetooth device".to_string(), None),
            SerialPortType::Unknown => ("n/a".to_string(), None),
        };

        Self {
            device: info.port_name,
            description,
            manufacturer,
        }
    }
}

impl std::fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.device, self.description)?;
        if let Some(manufacturer) = &self.manufacturer {
            write!(f, " ({})", manufacturer)?;
        }
        Ok(())
    }
}

/// Enumerate the serial ports on this machine.
pub fn list_ports() -> Result<Vec<PortDescriptor>> {
    let ports = tokio_serial::available_ports()?;
    Ok(ports.into_iter().map(PortDescriptor::from).collect())
}

/// Pick the first port matching any keyword.
///
/// When nothing matches, every available port is logged so the user can pass
/// one explicitly.
pub fn find_device<S: AsRef<str>>(ports: &[PortDescriptor], keywords: &[S]) -> Option<String> {
    for port in ports {
        if port.matches(keywords) {
            info!(port = %port.device, description = %port.description, "found device");
            return Some(port.device.clone());
        }
        debug!(port = %port, "port does not match");
    }

    if ports.is_empty() {
        warn!("no serial ports available");
    } else {
        warn!("no port matched; available ports:");
        for port in ports {
            warn!("  {}", port);
        }
    }
    None
}
