// Text encodings used by ID3 frames and ASF strings

use crate::utils::bytes::trim_nul16;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

/// Text encoding types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Iso8859_1 = 0,
    Utf16 = 1,
    Utf16BE = 2,
    Utf8 = 3,
}

impl TextEncoding {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => TextEncoding::Iso8859_1,
            1 => TextEncoding::Utf16,
            2 => TextEncoding::Utf16BE,
            3 => TextEncoding::Utf8,
            _ => TextEncoding::Iso8859_1,
        }
    }

    pub fn is_wide(&self) -> bool {
        matches!(self, TextEncoding::Utf16 | TextEncoding::Utf16BE)
    }

    /// String terminator in this encoding
    pub fn terminator(&self) -> &'static [u8] {
        if self.is_wide() {
            &[0, 0]
        } else {
            &[0]
        }
    }
}

/// Decode text with specified encoding; `legacy` covers the 8-bit case
pub fn decode_text(data: &[u8], encoding: TextEncoding, legacy: &'static Encoding) -> String {
    let text = match encoding {
        TextEncoding::Iso8859_1 => legacy.decode_without_bom_handling(data).0,
        TextEncoding::Utf16 => {
            // Detect BOM
            if data.starts_with(&[0xFF, 0xFE]) {
                UTF_16LE.decode_without_bom_handling(&data[2..]).0
            } else if data.starts_with(&[0xFE, 0xFF]) {
                UTF_16BE.decode_without_bom_handling(&data[2..]).0
            } else {
                UTF_16LE.decode_without_bom_handling(data).0
            }
        }
        TextEncoding::Utf16BE => UTF_16BE.decode_without_bom_handling(data).0,
        TextEncoding::Utf8 => UTF_8.decode_with_bom_removal(data).0,
    };
    text.trim_end_matches('\0').to_string()
}

/// Encode text with specified encoding, without terminator
pub fn encode_text(text: &str, encoding: TextEncoding, legacy: &'static Encoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Iso8859_1 => legacy.encode(text).0.to_vec(),
        TextEncoding::Utf16 => {
            let mut out = vec![0xFF, 0xFE];
            out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
            out
        }
        TextEncoding::Utf16BE => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        TextEncoding::Utf8 => text.as_bytes().to_vec(),
    }
}

/// Split at the first terminator of `encoding`, dropping it
pub fn split_terminated(data: &[u8], encoding: TextEncoding) -> (&[u8], &[u8]) {
    if encoding.is_wide() {
        let mut i = 0;
        while i + 1 < data.len() {
            if data[i] == 0 && data[i + 1] == 0 {
                return (&data[..i], &data[i + 2..]);
            }
            i += 2;
        }
    } else if let Some(i) = data.iter().position(|&b| b == 0) {
        return (&data[..i], &data[i + 1..]);
    }
    (data, &[])
}

/// Decode a UTF-16LE string, stopping at the first NUL
pub fn decode_utf16le(data: &[u8]) -> String {
    UTF_16LE.decode_without_bom_handling(trim_nul16(data)).0.into_owned()
}

/// Encode a UTF-16LE string, optionally NUL-terminated
pub fn encode_utf16le(text: &str, terminated: bool) -> Vec<u8> {
    let mut out: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    if terminated {
        out.extend_from_slice(&[0, 0]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_with_bom() {
        let le = [0xFF, 0xFE, b'h', 0, b'i', 0];
        let be = [0xFE, 0xFF, 0, b'h', 0, b'i'];
        assert_eq!(decode_text(&le, TextEncoding::Utf16, WINDOWS_1252), "hi");
        assert_eq!(decode_text(&be, TextEncoding::Utf16, WINDOWS_1252), "hi");
    }

    #[test]
    fn test_legacy_bytes_use_configured_encoding() {
        assert_eq!(decode_text(&[0xE9], TextEncoding::Iso8859_1, WINDOWS_1252), "é");
        assert_eq!(encode_text("é", TextEncoding::Iso8859_1, WINDOWS_1252), vec![0xE9]);
    }

    #[test]
    fn test_encode_round_trip() {
        for encoding in [
            TextEncoding::Iso8859_1,
            TextEncoding::Utf16,
            TextEncoding::Utf16BE,
            TextEncoding::Utf8,
        ] {
            let bytes = encode_text("Track 7", encoding, WINDOWS_1252);
            assert_eq!(decode_text(&bytes, encoding, WINDOWS_1252), "Track 7");
        }
    }

    #[test]
    fn test_split_terminated() {
        assert_eq!(
            split_terminated(b"eng\0rest", TextEncoding::Iso8859_1),
            (&b"eng"[..], &b"rest"[..])
        );
        // an odd-aligned 00 00 is not a UTF-16 terminator
        let data = [b'a', 0, 0, b'b', 0, 0, b'z'];
        assert_eq!(
            split_terminated(&data, TextEncoding::Utf16BE),
            (&data[..4], &data[6..])
        );
    }

    #[test]
    fn test_utf16le_strings() {
        let encoded = encode_utf16le("Title", true);
        assert_eq!(encoded.len(), 12);
        assert_eq!(decode_utf16le(&encoded), "Title");
    }
}
