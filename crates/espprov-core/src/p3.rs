//! p3 audio container parsing
//!
//! A p3 file is a bare sequence of frames with no file header and no
//! frame-count field:
//!
//! ```text
//! [1-byte type][1-byte reserved][2-byte big-endian payload length][payload]
//! ```
//!
//! The reader consumes frames until EOF. A truncated trailing frame is
//! reported via the `truncated` flag rather than an error, since files cut
//! mid-transfer are common and everything before the cut is still valid.

use std::collections::BTreeMap;
use std::io::{self, Read};

/// Frame header size in bytes
pub const HEADER_LEN: usize = 4;

/// Sample rate assumed by the firmware's Opus encoder
pub const SAMPLE_RATE: u32 = 16_000;

/// Rough Opus compression ratio used for duration estimates
pub const OPUS_COMPRESSION_RATIO: f64 = 2.5;

/// A parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Packet type byte
    pub frame_type: u8,
    /// Reserved byte
    pub reserved: u8,
    /// Declared payload length
    pub payload_len: u16,
}

impl FrameHeader {
    fn parse(raw: [u8; HEADER_LEN]) -> Self {
        Self {
            frame_type: raw[0],
            reserved: raw[1],
            payload_len: u16::from_be_bytes([raw[2], raw[3]]),
        }
    }

    /// Estimated frame duration in milliseconds, assuming 16 kHz mono
    /// Opus at a ~2.5:1 compression ratio.
    pub fn estimated_duration_ms(&self) -> f64 {
        estimated_duration_ms(self.payload_len)
    }
}

/// Duration estimate for a payload of `len` bytes
pub fn estimated_duration_ms(len: u16) -> f64 {
    let estimated_samples = len as f64 * OPUS_COMPRESSION_RATIO;
    estimated_samples / SAMPLE_RATE as f64 * 1000.0
}

/// Streaming frame reader over any [`Read`]
pub struct P3Reader<R> {
    inner: R,
    offset: u64,
    truncated: bool,
    done: bool,
}

impl<R: Read> P3Reader<R> {
    /// Wrap a byte source
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            truncated: false,
            done: false,
        }
    }

    /// Byte offset of the next frame
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// True once a truncated trailing frame was encountered
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` at clean EOF, and also when the stream ends in
    /// the middle of a frame; the latter additionally sets
    /// [`P3Reader::truncated`].
    pub fn next_frame(&mut self) -> io::Result<Option<(FrameHeader, Vec<u8>)>> {
        if self.done {
            return Ok(None);
        }

        let mut raw = [0u8; HEADER_LEN];
        let got = read_fully(&mut self.inner, &mut raw)?;
        if got == 0 {
            self.done = true;
            return Ok(None);
        }
        if got < HEADER_LEN {
            self.done = true;
            self.truncated = true;
            return Ok(None);
        }

        let header = FrameHeader::parse(raw);
        let mut payload = vec![0u8; header.payload_len as usize];
        let got = read_fully(&mut self.inner, &mut payload)?;
        if got < payload.len() {
            self.done = true;
            self.truncated = true;
            return Ok(None);
        }

        self.offset += (HEADER_LEN + payload.len()) as u64;
        Ok(Some((header, payload)))
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Aggregate statistics over a p3 stream
#[derive(Debug, Clone, Default)]
pub struct P3Stats {
    /// Number of complete frames
    pub frames: usize,
    /// Sum of declared payload lengths
    pub total_payload: u64,
    /// Smallest payload seen
    pub min_payload: Option<u16>,
    /// Largest payload seen
    pub max_payload: Option<u16>,
    /// Payload size -> frame count
    pub size_histogram: BTreeMap<u16, usize>,
    /// True when the stream ended mid-frame
    pub truncated: bool,
}

impl P3Stats {
    /// Fold one frame into the stats
    pub fn record(&mut self, header: &FrameHeader) {
        self.frames += 1;
        self.total_payload += header.payload_len as u64;
        self.min_payload = Some(match self.min_payload {
            Some(min) => min.min(header.payload_len),
            None => header.payload_len,
        });
        self.max_payload = Some(match self.max_payload {
            Some(max) => max.max(header.payload_len),
            None => header.payload_len,
        });
        *self.size_histogram.entry(header.payload_len).or_default() += 1;
    }

    /// Mean payload length, or 0 for an empty stream
    pub fn mean_payload(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.total_payload as f64 / self.frames as f64
    }
}

/// Scan a whole stream and return aggregate statistics
pub fn analyze<R: Read>(reader: R) -> io::Result<P3Stats> {
    let mut p3 = P3Reader::new(reader);
    let mut stats = P3Stats::default();
    while let Some((header, _payload)) = p3.next_frame()? {
        stats.record(&header);
    }
    stats.truncated = p3.truncated();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(frame_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![frame_type, 0];
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn counts_frames_and_payload_bytes() {
        let mut data = Vec::new();
        data.extend(frame(0, &[1, 2, 3]));
        data.extend(frame(0, &[4; 60]));
        data.extend(frame(1, &[]));

        let stats = analyze(&data[..]).unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.total_payload, 63);
        assert_eq!(stats.min_payload, Some(0));
        assert_eq!(stats.max_payload, Some(60));
        assert!(!stats.truncated);
    }

    #[test]
    fn truncated_payload_reports_complete_frames_only() {
        let mut data = Vec::new();
        data.extend(frame(0, &[7; 40]));
        data.extend(frame(0, &[8; 40]));
        // Header declares 100 bytes, only 10 follow.
        data.extend([0u8, 0, 0, 100]);
        data.extend([9; 10]);

        let stats = analyze(&data[..]).unwrap();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.total_payload, 80);
        assert!(stats.truncated);
    }

    #[test]
    fn truncated_header_is_flagged() {
        let mut data = frame(0, &[1, 2]);
        data.extend([0u8, 0]); // half a header

        let stats = analyze(&data[..]).unwrap();
        assert_eq!(stats.frames, 1);
        assert!(stats.truncated);
    }

    #[test]
    fn empty_stream_is_clean() {
        let stats = analyze(&[][..]).unwrap();
        assert_eq!(stats.frames, 0);
        assert!(!stats.truncated);
        assert_eq!(stats.mean_payload(), 0.0);
    }

    #[test]
    fn reader_yields_payload_bytes() {
        let data = frame(0x42, b"opus");
        let mut reader = P3Reader::new(&data[..]);
        let (header, payload) = reader.next_frame().unwrap().unwrap();
        assert_eq!(header.frame_type, 0x42);
        assert_eq!(header.payload_len, 4);
        assert_eq!(payload, b"opus");
        assert!(reader.next_frame().unwrap().is_none());
        assert!(!reader.truncated());
    }

    #[test]
    fn duration_estimate_matches_constants() {
        // 96 bytes * 2.5 / 16000 Hz = 15 ms
        assert!((estimated_duration_ms(96) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn histogram_groups_equal_sizes() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend(frame(0, &[0; 60]));
        }
        data.extend(frame(0, &[0; 80]));

        let stats = analyze(&data[..]).unwrap();
        assert_eq!(stats.size_histogram.get(&60), Some(&3));
        assert_eq!(stats.size_histogram.get(&80), Some(&1));
    }
}
