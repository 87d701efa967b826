//! Parallel batch provisioning
//!
//! One handshake per serial port on a fixed-size worker pool. Workers are
//! fully independent: each builds its own HTTP client and esptool handle,
//! so a wedged device only costs its own slot.

use crate::cli::LicenseArgs;
use espprov_core::batch::run_batch;
use espprov_core::handshake::{provision, ProvisionOptions};
use espprov_core::retry::RetryPolicy;
use espprov_esptool::{detect_ports, Esptool};
use espprov_license::HttpLicenseService;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

pub fn run(
    license: &LicenseArgs,
    ports: Vec<String>,
    jobs: usize,
    esptool: &Path,
    offset: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let ports = if ports.is_empty() {
        detect_ports()?
    } else {
        ports
    };
    if ports.is_empty() {
        return Err("no USB serial ports detected; pass --ports explicitly".into());
    }

    println!(
        "Provisioning {} device(s) with {} worker(s)",
        ports.len(),
        jobs
    );

    let config = license.to_config();
    let product = license.embedded_product();

    let pb = ProgressBar::new(ports.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ports")?
            .progress_chars("#>-"),
    );

    let report = run_batch(&ports, jobs, |port| {
        let svc = HttpLicenseService::new(config.clone())?;
        let tool = Esptool::with_program(esptool).port(Some(port.to_string()));
        let opts = ProvisionOptions {
            offset,
            retry: RetryPolicy::default(),
            product: product.clone(),
        };
        let result = provision(&svc, &tool, &opts);
        pb.inc(1);
        result
    });
    pb.finish_and_clear();

    println!(
        "{}/{} port(s) provisioned",
        report.succeeded(),
        report.results.len()
    );
    for entry in &report.results {
        match &entry.result {
            Ok(outcome) => println!("  {}: {} -> {}", entry.port, outcome.mac, outcome.record.device_id),
            Err(e) => println!("  {}: FAILED: {}", entry.port, e),
        }
    }

    if !report.all_succeeded() {
        let failed = report.results.len() - report.succeeded();
        return Err(format!("{} of {} port(s) failed", failed, report.results.len()).into());
    }
    Ok(())
}
