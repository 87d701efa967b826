//! Flash tool seam
//!
//! The vendor flash tool (esptool) owns the serial protocol; this crate
//! only needs three operations from it. Keeping them behind a trait lets
//! the handshake and its tests run without a physical device.

use crate::error::Result;
use crate::mac::MacAddr;

/// Auth partition offsets observed across chip revisions.
///
/// The partition table differs per board; the CLI defaults to the C2
/// layout and takes `--offset` for the others.
pub mod offsets {
    /// ESP32-C2 partition layout
    pub const AUTH_OFFSET_C2: u32 = 0x3F0000;
    /// Legacy single-app layout
    pub const AUTH_OFFSET_LEGACY: u32 = 0x100000;
    /// ESP32-S3 large-flash layout
    pub const AUTH_OFFSET_S3: u32 = 0x744000;
}

/// Narrow interface over the external flash tool
pub trait FlashTool {
    /// Read the device MAC address over the serial connection.
    ///
    /// Fails with [`crate::Error::DeviceNotFound`] if the tool exits
    /// non-zero, cannot be launched, or prints no MAC token. No retry;
    /// the caller decides.
    fn read_mac(&self) -> Result<MacAddr>;

    /// Program `data` into flash at `offset`.
    fn write_flash(&self, offset: u32, data: &[u8]) -> Result<()>;

    /// Read `size` bytes of flash starting at `offset`.
    fn read_flash(&self, offset: u32, size: usize) -> Result<Vec<u8>>;
}
