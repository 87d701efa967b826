//! Serial port discovery for batch provisioning

use espprov_core::error::{Error, Result};
use serialport::SerialPortType;

/// Enumerate serial ports that look like attached devices.
///
/// Only USB serial adapters are returned; PCI and platform UARTs are the
/// host's own and never a device under provisioning. Results are sorted
/// so batch runs are deterministic.
pub fn detect_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()
        .map_err(|e| Error::PortDiscovery(e.to_string()))?;

    let mut names: Vec<String> = ports
        .into_iter()
        .filter(|p| matches!(p.port_type, SerialPortType::UsbPort(_)))
        .map(|p| p.port_name)
        .collect();
    names.sort();

    log::debug!("detected {} usb serial port(s): {:?}", names.len(), names);
    Ok(names)
}
