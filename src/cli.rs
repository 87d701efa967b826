//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use espprov_core::license::ProductConfig;
use espprov_esptool::Esptool;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "espprov")]
#[command(author, version, about = "ESP32 device provisioning and firmware tooling", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Licensing service options shared across commands
#[derive(Args, Debug, Clone)]
pub struct LicenseArgs {
    /// Licensing service base URL, e.g. http://host:port
    #[arg(long)]
    pub host: String,

    /// Organization id (sent as the X-Org-Id header)
    #[arg(long)]
    pub org_id: u32,

    /// Product key
    #[arg(long)]
    pub product_key: String,

    /// Product secret
    #[arg(long)]
    pub product_secret: String,

    /// Embed the product key/secret in the on-flash record (newer firmware)
    #[arg(long)]
    pub embed_product: bool,
}

impl LicenseArgs {
    pub fn to_config(&self) -> ProductConfig {
        ProductConfig {
            host: self.host.clone(),
            org_id: self.org_id,
            product_key: self.product_key.clone(),
            product_secret: self.product_secret.clone(),
        }
    }

    /// Product fields to embed in the auth record, when requested
    pub fn embedded_product(&self) -> Option<(String, String)> {
        self.embed_product
            .then(|| (self.product_key.clone(), self.product_secret.clone()))
    }
}

/// esptool options shared across commands
#[derive(Args, Debug, Clone)]
pub struct ToolArgs {
    /// Serial port (esptool auto-detects when omitted)
    #[arg(short, long)]
    pub port: Option<String>,

    /// esptool program to invoke
    #[arg(long, default_value = espprov_esptool::DEFAULT_PROGRAM)]
    pub esptool: PathBuf,

    /// Auth partition offset (hex or decimal; varies by chip revision)
    #[arg(long, value_parser = parse_hex_u32, default_value = "0x3F0000")]
    pub offset: u32,
}

impl ToolArgs {
    pub fn tool(&self) -> Esptool {
        Esptool::with_program(&self.esptool).port(self.port.clone())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision one device: read MAC, obtain a license, write it to flash
    Auth {
        #[command(flatten)]
        license: LicenseArgs,

        #[command(flatten)]
        tool: ToolArgs,
    },

    /// Provision devices on several serial ports in parallel
    BatchAuth {
        #[command(flatten)]
        license: LicenseArgs,

        /// Serial ports (comma-separated); USB ports are auto-detected
        /// when omitted
        #[arg(long, value_delimiter = ',')]
        ports: Vec<String>,

        /// Worker pool size
        #[arg(long, default_value_t = espprov_core::batch::DEFAULT_JOBS)]
        jobs: usize,

        /// esptool program to invoke
        #[arg(long, default_value = espprov_esptool::DEFAULT_PROGRAM)]
        esptool: PathBuf,

        /// Auth partition offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x3F0000")]
        offset: u32,
    },

    /// Read the device MAC address
    ReadMac {
        #[command(flatten)]
        tool: ToolArgs,
    },

    /// Write a known license to flash without contacting the service
    WriteAuth {
        #[command(flatten)]
        tool: ToolArgs,

        /// 32-character license key
        #[arg(long)]
        license_key: String,

        /// 8-character device id
        #[arg(long)]
        device_id: String,

        /// Product key to embed as the third record field
        #[arg(long, requires = "product_secret")]
        product_key: Option<String>,

        /// Product secret to embed as the fourth record field
        #[arg(long, requires = "product_key")]
        product_secret: Option<String>,
    },

    /// Read back and verify the authorization record on flash
    ReadAuth {
        #[command(flatten)]
        tool: ToolArgs,

        /// Number of bytes to read from the auth partition
        #[arg(long, default_value_t = 512)]
        size: usize,
    },

    /// p3 audio container tools
    #[command(subcommand)]
    P3(P3Commands),

    /// Analyze an ESP32 crash log with addr2line
    Crash {
        /// Crash log file
        log: PathBuf,

        /// ELF image matching the crashing firmware
        #[arg(short, long)]
        elf: PathBuf,

        /// addr2line binary for the target toolchain
        #[arg(long, default_value = "riscv32-esp-elf-addr2line")]
        addr2line: PathBuf,
    },
}

/// p3-related subcommands
#[derive(Subcommand)]
pub enum P3Commands {
    /// Print frame structure and aggregate statistics
    Analyze {
        /// Input p3 file
        input: PathBuf,

        /// Print every frame header, not just the summary
        #[arg(long)]
        frames: bool,
    },
}
