//! espprov - provisioning and firmware tooling for ESP32-class voice devices
//!
//! The main workflow is the device authorization handshake: read the MAC
//! over serial, walk the licensing service's report/allocate/apply calls,
//! write the authorization record to the device's auth partition, and
//! confirm the license. The flash side goes through the external esptool
//! CLI; the HTTP side goes to the organization's licensing service.
//!
//! Ancillary commands cover the surrounding factory/debug chores: batch
//! provisioning over a worker pool, offline auth-record read/write, p3
//! audio container inspection, and crash-log symbolication.

mod cli;
mod commands;
mod crash;

use clap::Parser;
use cli::{Cli, Commands, P3Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Default filter from verbosity; RUST_LOG still overrides.
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Auth { license, tool } => commands::auth::run(&license, &tool),
        Commands::BatchAuth {
            license,
            ports,
            jobs,
            esptool,
            offset,
        } => commands::batch::run(&license, ports, jobs, &esptool, offset),
        Commands::ReadMac { tool } => commands::mac::run(&tool),
        Commands::WriteAuth {
            tool,
            license_key,
            device_id,
            product_key,
            product_secret,
        } => commands::blob::run_write(
            &tool,
            &license_key,
            &device_id,
            product_key.as_deref().zip(product_secret.as_deref()),
        ),
        Commands::ReadAuth { tool, size } => commands::blob::run_read(&tool, size),
        Commands::P3(subcmd) => match subcmd {
            P3Commands::Analyze { input, frames } => commands::p3::run_analyze(&input, frames),
        },
        Commands::Crash {
            log,
            elf,
            addr2line,
        } => commands::crash::run(&log, &elf, &addr2line),
    }
}
