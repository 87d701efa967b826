//! Error types for the provisioning workflow

use thiserror::Error;

/// Provisioning errors
///
/// Validation errors (`InvalidLicenseKeyLength`, `InvalidDeviceIdLength`,
/// `InvalidMac`) are raised before any subprocess or network I/O happens.
#[derive(Debug, Error)]
pub enum Error {
    /// Flash tool could not find or talk to the device
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// MAC report endpoint rejected the device
    #[error("MAC report rejected: {0}")]
    Report(String),

    /// License allocation rejected by the organization endpoint
    #[error("license allocation rejected: {0}")]
    Allocate(String),

    /// License apply failed after all retry attempts
    #[error("license apply failed after {attempts} attempt(s): {body}")]
    Apply {
        /// Number of attempts made before giving up
        attempts: u32,
        /// Last error or response body seen
        body: String,
    },

    /// License confirm endpoint rejected the state change
    #[error("license confirm rejected: {0}")]
    Confirm(String),

    /// Lookup of the license already bound to a device failed
    #[error("existing license lookup failed: {0}")]
    FetchExisting(String),

    /// Service returned a success status but no license record
    #[error("no license available for device")]
    NoLicense,

    /// License key is not exactly 32 characters
    #[error("license key must be 32 characters, got {0}")]
    InvalidLicenseKeyLength(usize),

    /// Device id is not exactly 8 characters
    #[error("device id must be 8 characters, got {0}")]
    InvalidDeviceIdLength(usize),

    /// Input does not normalize to a 12-hex-digit MAC address
    #[error("invalid MAC address: {0:?}")]
    InvalidMac(String),

    /// The two redundant halves of an authorization blob differ
    #[error("authorization blob halves do not match")]
    BlobMismatch,

    /// Stored checksum does not match the record contents
    #[error("authorization blob checksum mismatch: stored {stored}, computed {computed}")]
    BadChecksum {
        /// Checksum read from the blob
        stored: u32,
        /// Checksum computed over the record fields
        computed: u32,
    },

    /// Blob text does not follow the record layout
    #[error("malformed authorization blob: {0}")]
    MalformedBlob(String),

    /// Flash write failed (captured tool stderr)
    #[error("flash write failed: {0}")]
    FlashWrite(String),

    /// Flash read failed (captured tool stderr)
    #[error("flash read failed: {0}")]
    FlashRead(String),

    /// External tool could not be launched
    #[error("failed to launch external tool: {0}")]
    ToolLaunch(String),

    /// Serial port enumeration failed
    #[error("serial port enumeration failed: {0}")]
    PortDiscovery(String),

    /// HTTP transport failure (connect error, timeout, bad body)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for provisioning operations
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_existing_message_names_the_lookup_step() {
        let err = Error::FetchExisting("404 not found".to_string());
        assert_eq!(
            err.to_string(),
            "existing license lookup failed: 404 not found"
        );
    }
}
