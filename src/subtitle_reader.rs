//! Decodes SRT files with an encoding fallback chain, and slices decoded content into
//! time windows for the matcher.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("could not decode {path} with any known encoding")]
    NoEncodingMatched { path: std::path::PathBuf },
}

static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2})[,.](\d{3})")
        .unwrap()
});

/// One parsed SRT block: a `[start, end]` time span in seconds and its joined text.
struct Block {
    start: f64,
    end: f64,
    text: String,
}

/// Reads `path`, trying encodings in order: a BOM/heuristic-detected guess, then UTF-8,
/// Latin-1, CP1252, ISO-8859-1. Returns `DecodeError` only if every attempt fails.
pub fn read(path: &Path) -> Result<String, DecodeError> {
    let bytes = fs::read(path).map_err(|e| DecodeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let detected = sniff_encoding(&bytes);

    let attempts: Vec<Box<dyn Fn(&[u8]) -> Option<String>>> = vec![
        Box::new(move |b| decode_with(detected, b)),
        Box::new(decode_utf8),
        Box::new(decode_latin1),
        Box::new(decode_windows1252),
        Box::new(decode_latin1),
    ];

    for attempt in attempts {
        if let Some(text) = attempt(&bytes) {
            return Ok(text);
        }
    }

    Err(DecodeError::NoEncodingMatched {
        path: path.to_path_buf(),
    })
}

/// Splits `content` into blank-line-delimited blocks, keeping only blocks whose time span
/// `[s, e]` overlaps `[t0, t1]` (i.e. `e >= t0 && s <= t1`), joined in SRT order.
pub fn slice(content: &str, t0: f64, t1: f64) -> Vec<String> {
    parse_blocks(content)
        .into_iter()
        .filter(|b| b.end >= t0 && b.start <= t1)
        .map(|b| b.text)
        .collect()
}

fn parse_blocks(content: &str) -> Vec<Block> {
    content
        .split("\n\n")
        .filter_map(|raw| {
            let lines: Vec<&str> = raw.trim_matches('\r').lines().collect();
            if lines.len() < 3 {
                return None;
            }
            let caps = TIME_RANGE.captures(lines[1])?;
            let start = parse_timestamp_captures(&caps, 1);
            let end = parse_timestamp_captures(&caps, 5);
            let text = lines[2..].join(" ");
            Some(Block { start, end, text })
        })
        .collect()
}

fn parse_timestamp_captures(caps: &regex::Captures, base: usize) -> f64 {
    let hours: f64 = caps[base].parse().unwrap_or(0.0);
    let minutes: f64 = caps[base + 1].parse().unwrap_or(0.0);
    let seconds: f64 = caps[base + 2].parse().unwrap_or(0.0);
    let millis: f64 = caps[base + 3].parse().unwrap_or(0.0);
    hours * 3600.0 + minutes * 60.0 + seconds + millis / 1000.0
}

fn sniff_encoding(bytes: &[u8]) -> &'static encoding_rs::Encoding {
    let sample = &bytes[..bytes.len().min(4096)];
    if sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return encoding_rs::UTF_8;
    }
    if sample.starts_with(&[0xFF, 0xFE]) {
        return encoding_rs::UTF_16LE;
    }
    if sample.starts_with(&[0xFE, 0xFF]) {
        return encoding_rs::UTF_16BE;
    }
    // No BOM: default guess is UTF-8, validated by the decode attempt itself.
    encoding_rs::UTF_8
}

fn decode_with(encoding: &'static encoding_rs::Encoding, bytes: &[u8]) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    decode_with(encoding_rs::UTF_8, bytes)
}

fn decode_windows1252(bytes: &[u8]) -> Option<String> {
    decode_with(encoding_rs::WINDOWS_1252, bytes)
}

/// Latin-1 / ISO-8859-1 are a direct byte-to-codepoint mapping; `encoding_rs` has no
/// distinct label for it (the WHATWG standard aliases `iso-8859-1` to windows-1252), so we
/// implement the byte-identity mapping explicitly. This never fails.
fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:03,500\nHello, World!\n\n2\n00:00:05,000 --> 00:00:08,000\nThis is\na test subtitle.\n\n";

    #[test]
    fn slices_blocks_overlapping_window() {
        let result = slice(SAMPLE, 0.0, 4.0);
        assert_eq!(result, vec!["Hello, World!".to_string()]);
    }

    #[test]
    fn slices_multiple_overlapping_blocks() {
        let result = slice(SAMPLE, 2.0, 6.0);
        assert_eq!(
            result,
            vec!["Hello, World!".to_string(), "This is a test subtitle.".to_string()]
        );
    }

    #[test]
    fn skips_malformed_blocks_silently() {
        let malformed = "1\n00:00:01,000 --> 00:00:03,000\n\n2\nnotatimestamp\ntext\n\n3\n00:00:05,000 --> 00:00:06,000\nok\n\n";
        let result = slice(malformed, 0.0, 100.0);
        assert_eq!(result, vec!["ok".to_string()]);
    }

    #[test]
    fn accepts_dot_millisecond_separator() {
        let content = "1\n00:00:01.000 --> 00:00:03.000\nDot separated\n\n";
        let result = slice(content, 0.0, 5.0);
        assert_eq!(result, vec!["Dot separated".to_string()]);
    }

    #[test]
    fn empty_window_returns_nothing() {
        let result = slice(SAMPLE, 100.0, 110.0);
        assert!(result.is_empty());
    }

    #[test]
    fn latin1_is_byte_identity() {
        let bytes = vec![0xE9u8]; // 'é' in Latin-1
        let decoded = decode_latin1(&bytes).unwrap();
        assert_eq!(decoded, "\u{00e9}");
    }
}
