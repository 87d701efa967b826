//! Licensing service contract
//!
//! The remote service tracks one state transition per license: allocated →
//! confirmed (3) or released (0). The client holds no persistent state; the
//! four ordered calls plus the fetch-existing fallback are expressed as the
//! [`LicenseService`] trait so the handshake can run against a fake.

use crate::error::Result;
use crate::mac::MacAddr;

/// A license issued by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRecord {
    /// Opaque device id, 8 characters
    pub device_id: String,
    /// Opaque license key, 32 characters
    pub license_key: String,
}

/// License state confirmed back to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    /// Released back to the pool (rollback after a failed flash write)
    Released,
    /// Confirmed as active on the device
    Confirmed,
}

impl LicenseState {
    /// Wire value of the state (`0` released, `3` confirmed)
    pub fn code(self) -> u8 {
        match self {
            Self::Released => 0,
            Self::Confirmed => 3,
        }
    }
}

/// Result of the allocate call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocateOutcome {
    /// A fresh license was allocated for this MAC
    Allocated,
    /// The MAC already consumed a license; callers fall back to
    /// [`LicenseService::fetch_existing`]
    AlreadyAllocated,
}

/// Tenant and product credentials scoping which licenses a device may
/// receive.
///
/// Passed into the license client at construction; there are no baked-in
/// credential constants anywhere in this workspace.
#[derive(Debug, Clone)]
pub struct ProductConfig {
    /// Service base URL, e.g. `http://host:port`
    pub host: String,
    /// Organization (tenant) id, sent as the `X-Org-Id` header
    pub org_id: u32,
    /// Product key
    pub product_key: String,
    /// Product secret
    pub product_secret: String,
}

/// The four ordered licensing calls plus the fetch-existing fallback
pub trait LicenseService {
    /// Register the MAC with the organization. Fatal on failure.
    fn report(&self, mac: &MacAddr) -> Result<()>;

    /// Allocate a license for the MAC from the organization pool.
    fn allocate(&self, mac: &MacAddr) -> Result<AllocateOutcome>;

    /// Apply for the product license; returns the issued record.
    /// Retried by the caller under a [`crate::retry::RetryPolicy`].
    fn apply(&self, mac: &MacAddr) -> Result<LicenseRecord>;

    /// Confirm (state 3) or release (state 0) a previously applied license.
    fn confirm(&self, mac: &MacAddr, record: &LicenseRecord, state: LicenseState) -> Result<()>;

    /// Fetch the license already bound to this MAC, if any.
    fn fetch_existing(&self, mac: &MacAddr) -> Result<LicenseRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_wire_codes() {
        assert_eq!(LicenseState::Released.code(), 0);
        assert_eq!(LicenseState::Confirmed.code(), 3);
    }
}
