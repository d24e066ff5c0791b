//! Line-oriented frame assembly
//!
//! The sniffer prints every bus frame as hex text followed by CR LF. The serial
//! driver hands us that text in chunks of any size, so a frame (or even a single
//! hex pair) may be split across reads. The assembler keeps the partial line
//! between calls and emits complete lines in arrival order.
//!
//! Non-ASCII bytes are stored as `?` so one byte always maps to one character;
//! the decoder then counts them as malformed hex.

use std::fmt;
use tracing::warn;

/// Default cap on a partial frame, in characters
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024;

const LINE_FEED: u8 = 10;
const CARRIAGE_RETURN: u8 = 13;

/// One line-feed terminated frame, CR bytes removed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrame(String);

impl RawFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RawFrame {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// Assembler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub bytes: u64,
    pub frames: u64,
    /// Partial frames dropped because they grew past the length cap
    pub overflows: u64,
}

/// Splits a byte stream into LF-terminated frames
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: String,
    max_frame_len: usize,
    /// Set after an overflow; bytes are dropped until the next LF
    discarding: bool,
    stats: AssemblerStats,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// A `max_frame_len` of zero disables the cap
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: String::with_capacity(256),
            max_frame_len,
            discarding: false,
            stats: AssemblerStats::default(),
        }
    }

    /// Consume one chunk and return every frame it completes, in order.
    ///
    /// Bytes after the last LF stay buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        self.feed_with(chunk, |frame| frames.push(frame));
        frames
    }

    /// Like [`feed`](Self::feed) but hands each frame to `on_frame` as soon as
    /// its terminator is seen.
    pub fn feed_with(&mut self, chunk: &[u8], mut on_frame: impl FnMut(RawFrame)) {
        self.stats.bytes += chunk.len() as u64;

        for &byte in chunk {
            match byte {
                LINE_FEED => {
                    if self.discarding {
                        self.discarding = false;
                        continue;
                    }
                    self.stats.frames += 1;
                    let text = std::mem::replace(&mut self.buffer, String::with_capacity(256));
                    on_frame(RawFrame(text));
                },
                CARRIAGE_RETURN => {},
                _ if self.discarding => {},
                _ => {
                    if self.max_frame_len > 0 && self.buffer.len() >= self.max_frame_len {
                        self.overflow();
                        continue;
                    }
                    self.buffer.push(if byte.is_ascii() { byte as char } else { '?' });
                },
            }
        }
    }

    fn overflow(&mut self) {
        self.stats.overflows += 1;
        warn!(
            target: "frame_diag",
            len = self.buffer.len(),
            "Frame exceeds {} characters without line feed, discarding until next terminator",
            self.max_frame_len
        );
        self.buffer.clear();
        self.discarding = true;
    }

    /// Characters of the frame currently being assembled
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(frames: Vec<RawFrame>) -> Vec<String> {
        frames.into_iter().map(RawFrame::into_string).collect()
    }

    #[test]
    fn test_single_frame_strips_crlf() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed(b"010300000002C40B\r\n");
        assert_eq!(texts(frames), vec!["010300000002C40B"]);
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_frame_split_inside_hex_pair() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.feed(b"01030").is_empty());
        assert!(assembler.feed(b"000000").is_empty());
        assert!(assembler.feed(b"2C40B\r").is_empty());
        assert_eq!(assembler.pending_len(), 16);

        let frames = assembler.feed(b"\n");
        assert_eq!(texts(frames), vec!["010300000002C40B"]);
    }

    #[test]
    fn test_two_frames_across_chunk_boundary() {
        let mut assembler = FrameAssembler::new();
        let first = assembler.feed(b"0103AA\r\n0103");
        let second = assembler.feed(b"BB\r\n");
        assert_eq!(texts(first), vec!["0103AA"]);
        assert_eq!(texts(second), vec!["0103BB"]);
    }

    #[test]
    fn test_many_frames_in_one_chunk_keep_order() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed(b"A\nB\r\nC\n");
        assert_eq!(texts(frames), vec!["A", "B", "C"]);
        assert_eq!(assembler.stats().frames, 3);
    }

    #[test]
    fn test_bare_line_feed_emits_empty_frame() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed(b"\r\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn test_overflow_discards_until_line_feed() {
        let mut assembler = FrameAssembler::with_max_frame_len(4);
        let frames = assembler.feed(b"0123456789");
        assert!(frames.is_empty());
        assert_eq!(assembler.stats().overflows, 1);
        assert_eq!(assembler.pending_len(), 0);

        // tail of the oversized line is dropped, the next line is intact
        let frames = assembler.feed(b"ABC\nBEEF\n");
        assert_eq!(texts(frames), vec!["BEEF"]);
        assert_eq!(assembler.stats().overflows, 1);
    }

    #[test]
    fn test_zero_cap_is_unbounded() {
        let mut assembler = FrameAssembler::with_max_frame_len(0);
        let long = vec![b'F'; 5000];
        assert!(assembler.feed(&long).is_empty());
        assert_eq!(assembler.pending_len(), 5000);
    }

    #[test]
    fn test_non_ascii_byte_becomes_placeholder() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed(&[b'0', 0xFF, b'1', b'\n']);
        assert_eq!(texts(frames), vec!["0?1"]);
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let mut assembler = FrameAssembler::new();
        assembler.feed(b"0103");
        assembler.reset();
        let frames = assembler.feed(b"FF\n");
        assert_eq!(texts(frames), vec!["FF"]);
    }
}
