//! Single-device provisioning

use crate::cli::{LicenseArgs, ToolArgs};
use espprov_core::handshake::{provision, ProvisionOptions};
use espprov_core::retry::RetryPolicy;
use espprov_license::HttpLicenseService;

pub fn run(license: &LicenseArgs, tool_args: &ToolArgs) -> Result<(), Box<dyn std::error::Error>> {
    let svc = HttpLicenseService::new(license.to_config())?;
    let tool = tool_args.tool();
    let opts = ProvisionOptions {
        offset: tool_args.offset,
        retry: RetryPolicy::default(),
        product: license.embedded_product(),
    };

    let outcome = provision(&svc, &tool, &opts)?;

    println!("Provisioned device {}", outcome.mac);
    println!("  device id:   {}", outcome.record.device_id);
    println!("  license key: {}", outcome.record.license_key);
    if outcome.reused_existing {
        println!("  (existing allocation reused)");
    }
    Ok(())
}
