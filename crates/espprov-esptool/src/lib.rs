//! esptool subprocess backend
//!
//! Implements [`FlashTool`] by shelling out to the vendor esptool CLI:
//! `read_mac`, `write_flash <offset> <file>` and
//! `read_flash <offset> <size> <file>`. Success is exit code 0; the MAC is
//! scraped from stdout. Flash data is staged through a [`NamedTempFile`],
//! which is removed on every path (success or failure) when it drops.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod ports;

pub use ports::detect_ports;

use espprov_core::error::{Error, Result};
use espprov_core::flash::FlashTool;
use espprov_core::mac::MacAddr;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

/// Default esptool program name, resolved through `PATH`
pub const DEFAULT_PROGRAM: &str = "esptool.py";

/// Handle to the external esptool program
#[derive(Debug, Clone)]
pub struct Esptool {
    program: PathBuf,
    port: Option<String>,
}

impl Esptool {
    /// esptool from `PATH` with an auto-detected port
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    /// Use a specific esptool binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            port: None,
        }
    }

    /// Pin the serial port (`-p <port>`); `None` lets esptool pick one
    pub fn port(mut self, port: Option<String>) -> Self {
        self.port = port;
        self
    }

    fn run(&self, args: &[OsString]) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        if let Some(port) = &self.port {
            cmd.arg("-p").arg(port);
        }
        cmd.args(args);
        log::debug!("running {:?}", cmd);
        cmd.output().map_err(|e| {
            Error::ToolLaunch(format!("{}: {}", self.program.display(), e))
        })
    }
}

impl Default for Esptool {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashTool for Esptool {
    fn read_mac(&self) -> Result<MacAddr> {
        let out = self.run(&[OsString::from("read_mac")])?;
        if !out.status.success() {
            return Err(Error::DeviceNotFound(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ));
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        parse_mac_output(&stdout).ok_or_else(|| {
            Error::DeviceNotFound("no MAC address in esptool output".to_string())
        })
    }

    fn write_flash(&self, offset: u32, data: &[u8]) -> Result<()> {
        let mut staging = NamedTempFile::new()?;
        staging.write_all(data)?;
        staging.flush()?;

        let out = self.run(&[
            OsString::from("write_flash"),
            OsString::from(format!("{offset:#x}")),
            staging.path().into(),
        ])?;
        // `staging` drops here on all paths, deleting the temp file.
        if !out.status.success() {
            return Err(Error::FlashWrite(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ));
        }
        log::info!("wrote {} bytes at {:#x}", data.len(), offset);
        Ok(())
    }

    fn read_flash(&self, offset: u32, size: usize) -> Result<Vec<u8>> {
        let staging = NamedTempFile::new()?;
        let out = self.run(&[
            OsString::from("read_flash"),
            OsString::from(format!("{offset:#x}")),
            OsString::from(size.to_string()),
            staging.path().into(),
        ])?;
        if !out.status.success() {
            return Err(Error::FlashRead(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ));
        }
        let data = fs::read(staging.path())?;
        log::info!("read {} bytes from {:#x}", data.len(), offset);
        Ok(data)
    }
}

/// Find the MAC token in esptool's stdout.
///
/// esptool prints a line like `MAC: cc:8d:a2:0b:f2:78`; later esptool
/// versions prefix it with the bus name, so any line containing `MAC:`
/// is accepted.
pub fn parse_mac_output(stdout: &str) -> Option<MacAddr> {
    for line in stdout.lines() {
        if let Some((_, rest)) = line.split_once("MAC:") {
            if let Ok(mac) = MacAddr::parse(rest) {
                return Some(mac);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mac_line_from_esptool_output() {
        let stdout = "\
esptool.py v4.7
Serial port /dev/ttyUSB0
Connecting....
Detecting chip type... ESP32-C2
MAC: CC:8D:A2:0B:F2:78
Hard resetting via RTS pin...
";
        let mac = parse_mac_output(stdout).unwrap();
        assert_eq!(mac.as_str(), "cc8da20bf278");
    }

    #[test]
    fn parses_prefixed_mac_line() {
        let stdout = "BASE MAC: 10:51:db:79:b8:68\n";
        let mac = parse_mac_output(stdout).unwrap();
        assert_eq!(mac.as_str(), "1051db79b868");
    }

    #[test]
    fn no_mac_line_yields_none() {
        assert!(parse_mac_output("Connecting...\nfatal error\n").is_none());
    }

    #[test]
    fn garbage_after_mac_token_yields_none() {
        assert!(parse_mac_output("MAC: not-a-mac\n").is_none());
    }

    #[test]
    fn missing_program_maps_to_tool_launch_error() {
        let tool = Esptool::with_program("definitely-not-a-real-esptool");
        let err = tool.read_mac().unwrap_err();
        assert!(matches!(err, Error::ToolLaunch(_)));
    }

    // Points TMPDIR at a private directory so the staging files written by
    // write_flash are observable. /bin/true and /bin/false stand in for a
    // succeeding and a failing esptool run.
    #[test]
    #[cfg(unix)]
    fn staging_file_is_removed_on_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("TMPDIR", dir.path());

        let ok_tool = Esptool::with_program("true");
        ok_tool.write_flash(0x3F0000, b"record").unwrap();

        let failing_tool = Esptool::with_program("false");
        let err = failing_tool.write_flash(0x3F0000, b"record").unwrap_err();
        assert!(matches!(err, Error::FlashWrite(_)));

        std::env::remove_var("TMPDIR");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
