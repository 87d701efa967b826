//! espprov-core - Core library for ESP32 device provisioning
//!
//! This crate holds the device-side and service-side vocabulary of the
//! provisioning workflow, independent of any concrete tool or HTTP stack:
//!
//! - the on-flash authorization record format ([`auth`])
//! - the licensing service contract and handshake ([`license`], [`handshake`])
//! - the flash tool seam ([`flash`]) so the handshake runs against a fake
//!   in tests instead of a physical device
//! - the batch worker pool ([`batch`]) and the p3 audio container parser
//!   ([`p3`])
//!
//! # Example
//!
//! ```ignore
//! use espprov_core::handshake::{provision, ProvisionOptions};
//!
//! let outcome = provision(&service, &tool, &ProvisionOptions::default())?;
//! println!("device {} -> license {}", outcome.mac, outcome.record.license_key);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod auth;
pub mod batch;
pub mod error;
pub mod flash;
pub mod handshake;
pub mod license;
pub mod mac;
pub mod p3;
pub mod retry;

pub use error::{Error, Result};
pub use mac::MacAddr;
