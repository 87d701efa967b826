//! p3 audio container inspection

use espprov_core::p3::{estimated_duration_ms, P3Reader, P3Stats};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub fn run_analyze(input: &Path, show_frames: bool) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(input)?;
    let file_size = file.metadata()?.len();
    println!("File: {} ({} bytes)", input.display(), file_size);

    let mut reader = P3Reader::new(BufReader::new(file));
    let mut stats = P3Stats::default();
    while let Some((header, _payload)) = reader.next_frame()? {
        stats.record(&header);
        if show_frames {
            println!(
                "frame {:4}: type={} reserved={} len={:4} (~{:.1} ms)",
                stats.frames,
                header.frame_type,
                header.reserved,
                header.payload_len,
                header.estimated_duration_ms()
            );
        }
    }
    stats.truncated = reader.truncated();

    if stats.frames == 0 {
        println!("No complete p3 frames found");
    } else {
        println!("Frames:          {}", stats.frames);
        println!("Total payload:   {} bytes", stats.total_payload);
        println!(
            "Mean payload:    {:.1} bytes (~{:.1} ms/frame)",
            stats.mean_payload(),
            estimated_duration_ms(stats.mean_payload() as u16)
        );
        if let (Some(min), Some(max)) = (stats.min_payload, stats.max_payload) {
            println!("Payload range:   {} - {} bytes", min, max);
            if min == max {
                println!("All frames are the same size (fixed frame duration)");
            }
        }
        println!("Payload size distribution:");
        for (size, count) in &stats.size_histogram {
            let pct = *count as f64 / stats.frames as f64 * 100.0;
            println!(
                "  {:4} bytes (~{:.1} ms): {:4} frame(s) ({:5.1}%)",
                size,
                estimated_duration_ms(*size),
                count,
                pct
            );
        }
    }

    if stats.truncated {
        log::warn!("file ends mid-frame; trailing data ignored");
        println!("warning: trailing frame is truncated");
    }
    Ok(())
}
