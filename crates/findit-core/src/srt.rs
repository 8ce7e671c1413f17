//! SRT subtitle sidecar format
//!
//! Standard SRT blocks with `HH:MM:SS,mmm --> HH:MM:SS,mmm` timestamps.
//! Generation and parsing round-trip exactly at millisecond precision.

use crate::error::{FindItError, Result};

/// One subtitle cue
#[derive(Debug, Clone, PartialEq)]
pub struct SrtSegment {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Render segments as an SRT document
pub fn generate_srt(segments: &[SrtSegment]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push_str(&seg.index.to_string());
        out.push('\n');
        out.push_str(&format_timestamp(seg.start));
        out.push_str(" --> ");
        out.push_str(&format_timestamp(seg.end));
        out.push('\n');
        out.push_str(&seg.text);
        out.push_str("\n\n");
    }
    out
}

/// Parse an SRT document, tolerating CRLF and blank-line padding
pub fn parse_srt(input: &str) -> Result<Vec<SrtSegment>> {
    let normalized = input.replace("\r\n", "\n");
    let mut segments = Vec::new();

    for block in normalized.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let mut lines = block.lines();

        let index: usize = lines
            .next()
            .ok_or_else(|| FindItError::InvalidData("srt block missing index".to_string()))?
            .trim()
            .parse()
            .map_err(|_| FindItError::InvalidData("srt index is not a number".to_string()))?;

        let timing = lines
            .next()
            .ok_or_else(|| FindItError::InvalidData("srt block missing timing".to_string()))?;
        let (start_raw, end_raw) = timing
            .split_once("-->")
            .ok_or_else(|| FindItError::InvalidData("srt timing missing arrow".to_string()))?;

        let start = parse_timestamp(start_raw.trim())?;
        let end = parse_timestamp(end_raw.trim())?;
        let text = lines.collect::<Vec<_>>().join("\n");

        segments.push(SrtSegment {
            index,
            start,
            end,
            text,
        });
    }

    Ok(segments)
}

/// `HH:MM:SS,mmm`
fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

fn parse_timestamp(raw: &str) -> Result<f64> {
    let bad = || FindItError::InvalidData(format!("bad srt timestamp: {raw}"));

    let (hms, ms) = raw.split_once(',').ok_or_else(bad)?;
    let mut parts = hms.split(':');
    let h: u64 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let m: u64 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let s: u64 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    if parts.next().is_some() {
        return Err(bad());
    }
    let ms: u64 = ms.trim().parse().map_err(|_| bad())?;

    Ok((h * 3600 + m * 60 + s) as f64 + ms as f64 / 1000.0)
}
