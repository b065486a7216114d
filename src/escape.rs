//! Marker/hex escaping used by the legacy directory naming scheme.
//!
//! `escape` keeps characters from a safe set and replaces everything else with
//! one `<marker>XX` group per UTF-8 byte. `unescape` is only a best-effort
//! inverse: any `<marker>` followed by two hex digits is read as a byte, even if
//! the text never went through `escape`.

use std::collections::BTreeSet;
use thiserror::Error;

pub const DEFAULT_MARKER: char = '-';

#[derive(Debug, Error)]
#[error("escaped name does not decode to valid UTF-8 (at decoded byte {valid_up_to})")]
pub struct DecodeError {
    pub valid_up_to: usize,
    #[source]
    pub source: std::string::FromUtf8Error,
}

/// ASCII letters and digits.
pub fn default_safe_chars() -> BTreeSet<char> {
    ('a'..='z').chain('A'..='Z').chain('0'..='9').collect()
}

/// Lowercase ASCII letters and digits, the safe set of the legacy scheme.
pub fn legacy_safe_chars() -> BTreeSet<char> {
    ('a'..='z').chain('0'..='9').collect()
}

#[derive(Debug, Clone)]
pub struct Escaper {
    safe: BTreeSet<char>,
    marker: char,
    marker_dropped: bool,
}

impl Escaper {
    // With allow_collisions the marker is passed through as a safe character and
    // decoding may become ambiguous; otherwise it is always escaped.
    pub fn new(mut safe: BTreeSet<char>, marker: char, allow_collisions: bool) -> Self {
        let mut marker_dropped = false;
        if allow_collisions {
            safe.insert(marker);
        } else if safe.remove(&marker) {
            log::warn!(
                "escape marker {:?} cannot be a safe character; escaping it instead (allow collisions to keep it)",
                marker
            );
            marker_dropped = true;
        }
        Escaper { safe, marker, marker_dropped }
    }

    /// True when the marker had to be removed from the requested safe set.
    pub fn marker_dropped(&self) -> bool { self.marker_dropped }

    pub fn escape(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            if self.safe.contains(&ch) {
                out.push(ch);
                continue;
            }
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push(self.marker);
                out.push_str(&format!("{:02X}", byte));
            }
        }
        out
    }
}

pub fn escape(text: &str, safe: BTreeSet<char>, marker: char, allow_collisions: bool) -> String {
    Escaper::new(safe, marker, allow_collisions).escape(text)
}

/// Encode a name the way legacy directories were named: legacy safe set,
/// `-` marker, whole result lowercased.
pub fn escape_legacy(name: &str) -> String {
    escape(name, legacy_safe_chars(), DEFAULT_MARKER, false).to_ascii_lowercase()
}

/// Reverse `escape`, accepting either case of hex digit.
///
/// Bytes from consecutive marker groups are joined before UTF-8 decoding so
/// multi-byte characters come back whole. A marker not followed by two hex
/// digits is kept as a literal character. Fails when the collected bytes are
/// not valid UTF-8, e.g. a lone continuation byte or a truncated sequence.
pub fn unescape(escaped: &str, marker: char) -> Result<String, DecodeError> {
    let chars: Vec<char> = escaped.chars().collect();
    let mut bytes: Vec<u8> = Vec::with_capacity(escaped.len());
    let mut buf = [0u8; 4];
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == marker {
            if let Some(byte) = hex_pair(chars.get(i + 1), chars.get(i + 2)) {
                bytes.push(byte);
                i += 3;
                continue;
            }
        }
        bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        i += 1;
    }
    String::from_utf8(bytes).map_err(|e| DecodeError { valid_up_to: e.utf8_error().valid_up_to(), source: e })
}

fn hex_pair(hi: Option<&char>, lo: Option<&char>) -> Option<u8> {
    let hi = hi?.to_digit(16)?;
    let lo = lo?.to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
