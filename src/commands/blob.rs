//! Offline authorization record read/write
//!
//! `write-auth` programs a known license without touching the licensing
//! service (factory re-flash of an already issued license). `read-auth`
//! reads the partition back and verifies the record's checksum and
//! redundant halves.

use crate::cli::ToolArgs;
use espprov_core::auth::{decode_flash_bytes, AuthRecord};
use espprov_core::flash::FlashTool;

pub fn run_write(
    tool_args: &ToolArgs,
    license_key: &str,
    device_id: &str,
    product: Option<(&str, &str)>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Length validation happens before the tool is invoked.
    let record = match product {
        Some((key, secret)) => AuthRecord::with_product(license_key, device_id, key, secret)?,
        None => AuthRecord::new(license_key, device_id)?,
    };

    let tool = tool_args.tool();
    tool.write_flash(tool_args.offset, record.encode().as_bytes())?;

    println!(
        "Wrote authorization record for device {} at {:#x} (checksum {})",
        device_id, tool_args.offset, record.checksum()
    );
    Ok(())
}

pub fn run_read(tool_args: &ToolArgs, size: usize) -> Result<(), Box<dyn std::error::Error>> {
    let tool = tool_args.tool();
    let data = tool.read_flash(tool_args.offset, size)?;
    let record = decode_flash_bytes(&data)?;

    println!("Authorization record at {:#x}:", tool_args.offset);
    println!("  device id:   {}", record.device_id());
    println!("  license key: {}", record.license_key());
    if let Some((key, _secret)) = record.product() {
        println!("  product key: {}", key);
    }
    println!("  checksum:    {} (verified)", record.checksum());
    Ok(())
}
