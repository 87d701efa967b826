//! Crash-log address extraction and symbolication
//!
//! ESP32 crash dumps are plain text: an exception frame with a register
//! table, optional annotated backtrace lines, and a raw stack dump. This
//! module scrapes the addresses out with regexes and resolves each one to
//! a source location through the toolchain's `addr2line`. Resolutions are
//! memoized per address string so a log that repeats an address spawns at
//! most one subprocess for it.

use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

/// Where an address was found in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// The faulting program counter
    Pc,
    /// An annotated backtrace line (`--- 0x...: note`)
    Backtrace,
    /// A value from the register dump
    Register,
}

impl AddressKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pc => "PC",
            Self::Backtrace => "backtrace",
            Self::Register => "register",
        }
    }
}

/// One address pulled out of the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAddress {
    pub kind: AddressKind,
    pub addr: String,
    /// Backtrace comment or register name, when present
    pub note: Option<String>,
}

/// Compiled extraction patterns
pub struct LogPatterns {
    pc: Regex,
    backtrace: Regex,
    register: Regex,
    word: Regex,
}

impl LogPatterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pc: Regex::new(r"PC\s+(0x[0-9a-fA-F]+)")?,
            backtrace: Regex::new(r"---\s+(0x[0-9a-fA-F]+):\s+(.+)")?,
            // RISC-V register dump; longer names listed first so S10/S11
            // are not swallowed by S1.
            register: Regex::new(
                r"(MEPC|RA|SP|GP|TP|S0/FP|S10|S11|S[1-9]|A[0-7]|T[3-6])\s+:\s+(0x[0-9a-fA-F]+)",
            )?,
            word: Regex::new(r"0x[0-9a-fA-F]{8}")?,
        })
    }

    /// Extract PC, backtrace and register addresses, in log order per kind
    pub fn extract(&self, log: &str) -> Vec<ExtractedAddress> {
        let mut out = Vec::new();
        for cap in self.pc.captures_iter(log) {
            out.push(ExtractedAddress {
                kind: AddressKind::Pc,
                addr: cap[1].to_string(),
                note: None,
            });
        }
        for cap in self.backtrace.captures_iter(log) {
            out.push(ExtractedAddress {
                kind: AddressKind::Backtrace,
                addr: cap[1].to_string(),
                note: Some(cap[2].trim().to_string()),
            });
        }
        for cap in self.register.captures_iter(log) {
            out.push(ExtractedAddress {
                kind: AddressKind::Register,
                addr: cap[2].to_string(),
                note: Some(format!("{} register", &cap[1])),
            });
        }
        out
    }

    /// All 8-hex-digit words in the log, deduplicated in order of first
    /// appearance (used for the raw stack dump section)
    pub fn stack_words(&self, log: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for m in self.word.find_iter(log) {
            let addr = m.as_str();
            if !seen.iter().any(|s| s == addr) {
                seen.push(addr.to_string());
            }
        }
        seen
    }
}

/// Resolves an address to a source location string
pub trait AddressResolver {
    fn resolve(&self, addr: &str) -> String;
}

/// `addr2line` subprocess resolver
pub struct Addr2Line {
    program: PathBuf,
    elf: PathBuf,
}

impl Addr2Line {
    pub fn new(program: impl Into<PathBuf>, elf: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            elf: elf.into(),
        }
    }

    /// Probe the tool with `--version` before spending time on a log
    pub fn available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

impl AddressResolver for Addr2Line {
    fn resolve(&self, addr: &str) -> String {
        let clean = addr.trim_start_matches("0x");
        match Command::new(&self.program)
            .arg("-e")
            .arg(&self.elf)
            .arg(clean)
            .output()
        {
            Ok(out) if out.status.success() => {
                let location = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if location.is_empty() || location == "??:0" {
                    "unknown location".to_string()
                } else {
                    location
                }
            }
            Ok(out) => format!(
                "addr2line error: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
            Err(e) => format!("addr2line failed: {}", e),
        }
    }
}

/// Memoizing wrapper around a resolver
pub struct CachedResolver<R> {
    inner: R,
    cache: HashMap<String, String>,
}

impl<R: AddressResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, addr: &str) -> String {
        if let Some(hit) = self.cache.get(addr) {
            return hit.clone();
        }
        let location = self.inner.resolve(addr);
        self.cache.insert(addr.to_string(), location.clone());
        location
    }
}
