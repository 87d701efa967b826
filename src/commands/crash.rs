//! Crash-log symbolication against a firmware ELF

use crate::crash::{Addr2Line, AddressKind, CachedResolver, LogPatterns};
use std::fs;
use std::path::Path;

pub fn run(log: &Path, elf: &Path, addr2line: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = Addr2Line::new(addr2line, elf);
    if !resolver.available() {
        return Err(format!(
            "{} not found; install the ESP toolchain or pass --addr2line",
            addr2line.display()
        )
        .into());
    }

    let text = fs::read_to_string(log)?;
    let patterns = LogPatterns::new()?;
    let addresses = patterns.extract(&text);
    let mut cached = CachedResolver::new(resolver);

    if addresses.is_empty() {
        println!("No crash addresses found in {}", log.display());
    } else {
        println!("Crash addresses ({}):", addresses.len());
        for entry in &addresses {
            let location = cached.resolve(&entry.addr);
            match (&entry.kind, &entry.note) {
                (AddressKind::Backtrace, Some(note)) => {
                    println!("  {} [{}] ({}) -> {}", entry.addr, entry.kind.label(), note, location)
                }
                (_, Some(note)) => {
                    println!("  {} [{}] -> {}", entry.addr, note, location)
                }
                _ => println!("  {} [{}] -> {}", entry.addr, entry.kind.label(), location),
            }
        }
    }

    // Raw stack words often hold return addresses the structured sections
    // miss. Cap the list so a large dump stays readable.
    let words = patterns.stack_words(&text);
    let interesting: Vec<_> = words
        .iter()
        .filter(|w| !addresses.iter().any(|a| &a.addr == *w))
        .take(10)
        .collect();
    if !interesting.is_empty() {
        println!("Other addresses seen in the dump:");
        for word in interesting {
            println!("  {} -> {}", word, cached.resolve(word));
        }
    }

    Ok(())
}
