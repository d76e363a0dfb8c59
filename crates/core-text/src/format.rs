//! On-disk text format: line-ending style and character encoding.
//!
//! Internally every buffer is LF-only; these helpers translate between the
//! on-disk form and that representation in both directions.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    Crlf,
    Cr,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LineEnding::Lf => "unix",
            LineEnding::Crlf => "dos",
            LineEnding::Cr => "mac",
        }
    }
}

/// Result of normalizing line endings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub normalized: String,         // LF-only content
    pub original: LineEnding,       // detected style
    pub had_trailing_newline: bool, // original trailing newline presence
    pub mixed: bool,                // more than one style encountered
}

/// Detect and normalize line endings of `input` to LF.
///
/// Detection is by presence: any CRLF makes the file CRLF, else any lone CR
/// makes it CR, else LF. `mixed` is set when more than one style occurs.
pub fn normalize_line_endings(input: &str) -> NormalizedText {
    let bytes = input.as_bytes();
    let mut i = 0usize;
    let (mut crlf, mut lf, mut cr) = (0usize, 0usize, 0usize);
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                crlf += 1;
                i += 2;
            }
            b'\r' => {
                cr += 1;
                i += 1;
            }
            b'\n' => {
                lf += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    let had_trailing_newline = input.ends_with('\n') || input.ends_with('\r');
    let original = if crlf > 0 {
        LineEnding::Crlf
    } else if cr > 0 {
        LineEnding::Cr
    } else {
        LineEnding::Lf
    };
    let mixed = [crlf, lf, cr].iter().filter(|c| **c > 0).count() > 1;
    if crlf == 0 && cr == 0 {
        return NormalizedText {
            normalized: input.to_string(),
            original,
            had_trailing_newline,
            mixed,
        };
    }
    // Only slice at '\r' boundaries so multi-byte sequences stay intact.
    let mut out = String::with_capacity(input.len());
    let mut seg_start = 0usize;
    let mut j = 0usize;
    while j < bytes.len() {
        if bytes[j] == b'\r' {
            out.push_str(&input[seg_start..j]);
            out.push('\n');
            j += if bytes.get(j + 1) == Some(&b'\n') { 2 } else { 1 };
            seg_start = j;
        } else {
            j += 1;
        }
    }
    out.push_str(&input[seg_start..]);
    debug_assert!(!out.contains('\r'));
    NormalizedText {
        normalized: out,
        original,
        had_trailing_newline,
        mixed,
    }
}

/// Re-expand LF-only text to the given line ending.
pub fn denormalize(text: &str, ending: LineEnding) -> String {
    match ending {
        LineEnding::Lf => text.to_string(),
        other => text.replace('\n', other.as_str()),
    }
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Supported character encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// UTF-8 with a leading byte-order mark, preserved on save.
    Utf8Bom,
    /// ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
}

impl TextEncoding {
    /// Parse a configuration label (`utf-8`, `utf-8-sig`, `latin-1`, ...).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "utf-8-sig" | "utf-8-bom" => Some(Self::Utf8Bom),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Some(Self::Latin1),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Bom => "utf-8-sig",
            Self::Latin1 => "latin-1",
        }
    }

    /// Decode raw bytes. UTF-8 input carrying a BOM reports `Utf8Bom` so the
    /// mark survives a round trip.
    pub fn decode(self, bytes: &[u8]) -> Option<(String, TextEncoding)> {
        match self {
            Self::Utf8 | Self::Utf8Bom => {
                if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
                    std::str::from_utf8(rest)
                        .ok()
                        .map(|s| (s.to_string(), Self::Utf8Bom))
                } else {
                    std::str::from_utf8(bytes)
                        .ok()
                        .map(|s| (s.to_string(), Self::Utf8))
                }
            }
            Self::Latin1 => Some((bytes.iter().map(|&b| b as char).collect(), Self::Latin1)),
        }
    }

    /// Encode text. Fails with the first character the encoding cannot represent.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, UnencodableChar> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Utf8Bom => {
                let mut out = Vec::with_capacity(text.len() + UTF8_BOM.len());
                out.extend_from_slice(UTF8_BOM);
                out.extend_from_slice(text.as_bytes());
                Ok(out)
            }
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| UnencodableChar(c)))
                .collect(),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Character that has no representation in the target encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnencodableChar(pub char);

impl fmt::Display for UnencodableChar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "character U+{:04X} cannot be encoded", u32::from(self.0))
    }
}

impl std::error::Error for UnencodableChar {}

/// Try each encoding in priority order, returning the first successful decode.
pub fn decode_with_fallback(
    bytes: &[u8],
    encodings: &[TextEncoding],
) -> Option<(String, TextEncoding)> {
    encodings.iter().find_map(|enc| enc.decode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lf_only_fast_path() {
        let n = normalize_line_endings("a\nb\n");
        assert_eq!(n.normalized, "a\nb\n");
        assert_eq!(n.original, LineEnding::Lf);
        assert!(n.had_trailing_newline);
        assert!(!n.mixed);
    }

    #[test]
    fn crlf_detected_and_normalized() {
        let n = normalize_line_endings("a\r\nb\r\n");
        assert_eq!(n.normalized, "a\nb\n");
        assert_eq!(n.original, LineEnding::Crlf);
    }

    #[test]
    fn crlf_presence_wins_over_lf_majority() {
        let n = normalize_line_endings("a\nb\nc\r\nd");
        assert_eq!(n.original, LineEnding::Crlf);
        assert!(n.mixed);
        assert!(!n.had_trailing_newline);
    }

    #[test]
    fn lone_cr_detected() {
        let n = normalize_line_endings("a\rb\rc");
        assert_eq!(n.normalized, "a\nb\nc");
        assert_eq!(n.original, LineEnding::Cr);
    }

    #[test]
    fn multibyte_survives_normalization() {
        let n = normalize_line_endings("é\r\n漢\r");
        assert_eq!(n.normalized, "é\n漢\n");
    }

    #[test]
    fn denormalize_restores_crlf() {
        assert_eq!(denormalize("a\nb\n", LineEnding::Crlf), "a\r\nb\r\n");
    }

    #[test]
    fn utf8_falls_back_to_latin1() {
        let bytes = [b'c', b'a', b'f', 0xE9];
        let (text, enc) =
            decode_with_fallback(&bytes, &[TextEncoding::Utf8, TextEncoding::Latin1]).unwrap();
        assert_eq!(text, "café");
        assert_eq!(enc, TextEncoding::Latin1);
        assert_eq!(enc.encode(&text).unwrap(), bytes.to_vec());
    }

    #[test]
    fn bom_is_detected_and_preserved() {
        let bytes = b"\xEF\xBB\xBFhi";
        let (text, enc) = TextEncoding::Utf8.decode(bytes).unwrap();
        assert_eq!(text, "hi");
        assert_eq!(enc, TextEncoding::Utf8Bom);
        assert_eq!(enc.encode(&text).unwrap(), bytes.to_vec());
    }

    #[test]
    fn latin1_rejects_wide_chars() {
        assert_eq!(
            TextEncoding::Latin1.encode("a漢"),
            Err(UnencodableChar('漢'))
        );
    }

    #[test]
    fn labels_parse() {
        assert_eq!(TextEncoding::from_label("UTF-8"), Some(TextEncoding::Utf8));
        assert_eq!(TextEncoding::from_label("latin_1"), Some(TextEncoding::Latin1));
        assert_eq!(TextEncoding::from_label("ebcdic"), None);
    }
}
