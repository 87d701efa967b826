//! CLI command implementations
//!
//! Each module wires arguments into the library crates and formats the
//! result for the console. Commands return boxed errors; `main` turns an
//! `Err` into exit code 1.

pub mod auth;
pub mod batch;
pub mod blob;
pub mod crash;
pub mod mac;
pub mod p3;
