// Line-oriented parsing of ffmpeg's stderr status output
//
// ffmpeg <  0.8: frame=  413 fps= 48 q=31.0 size=    2139kB time=16.52 bitrate=1060.6kbits/s
// ffmpeg >= 0.8: frame= 4855 fps= 46 q=31.0 size=   45306kB time=00:02:42.28 bitrate=2287.0kbits/
// Only the frame counter and the fatal markers matter here.

use std::io::{self, BufRead, ErrorKind};

pub const FRAME_MARKER: &str = "frame=";
pub const UNSUPPORTED_CODEC_MARKER: &str = "Unsupported codec";

/// Conditions that end an encode as soon as they show up on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalCondition {
    UnsupportedCodec,
}

/// What one diagnostic line told us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineReport {
    pub frame: Option<u64>,
    pub fatal: Option<FatalCondition>,
}

/// Parser for ffmpeg stderr lines. Holds no state between lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgressParser;

impl ProgressParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a single line of ffmpeg diagnostic output
    pub fn parse_line(&self, line: &str) -> LineReport {
        let fatal = line
            .contains(UNSUPPORTED_CODEC_MARKER)
            .then_some(FatalCondition::UnsupportedCodec);

        LineReport {
            frame: parse_frame(line),
            fatal,
        }
    }
}

/// Extract the frame counter following `frame=`.
///
/// The counter is padded with spaces on most ffmpeg versions. When the marker
/// is present but no number follows, the frame defaults to 1.
pub fn parse_frame(line: &str) -> Option<u64> {
    let (_, rest) = line.split_once(FRAME_MARKER)?;
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(rest[..end].parse().unwrap_or(1))
}

/// Progress fraction for `frame` out of `total_frames`, capped at 1.0.
pub fn progress_fraction(frame: u64, total_frames: u64) -> f64 {
    if total_frames == 0 {
        return 0.0;
    }
    (frame as f64 / total_frames as f64).min(1.0)
}

/// Decode a raw stderr line as UTF-8, falling back to ISO-8859-1 for the
/// whole line when it contains invalid sequences.
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        // Latin-1 maps every byte to the code point of the same value
        Err(_) => bytes.iter().copied().map(char::from).collect(),
    }
}

/// Byte lines of a diagnostic stream, split on `\n` and `\r`.
///
/// ffmpeg rewrites its status line in place with carriage returns, so both
/// count as terminators. Empty segments are skipped.
pub struct DiagnosticLines<R> {
    reader: R,
}

impl<R: BufRead> DiagnosticLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Iterator for DiagnosticLines<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            };

            if available.is_empty() {
                return (!line.is_empty()).then_some(Ok(line));
            }

            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    line.extend_from_slice(&available[..pos]);
                    self.reader.consume(pos + 1);
                    if !line.is_empty() {
                        return Some(Ok(line));
                    }
                }
                None => {
                    let len = available.len();
                    line.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }
    }
}
