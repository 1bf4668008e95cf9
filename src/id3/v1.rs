// ID3v1 tag implementation

use crate::error::Result;
use crate::field_mapping::ValueConverter;
use crate::utils::bytes::trim_nul;
use crate::utils::io::Reader;
use encoding_rs::Encoding;
use serde::Serialize;

/// ID3v1 tag structure
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Id3v1Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub comment: String,
    pub track: Option<u8>,
    pub genre: u8,
}

impl Id3v1Tag {
    pub const TAG_SIZE: u64 = 128;
    const TAG_ID: [u8; 3] = [b'T', b'A', b'G'];

    /// Read the 128-byte trailer, leaving the reader where it was
    pub fn read(reader: &mut Reader, legacy: &'static Encoding) -> Result<Option<Self>> {
        if reader.size() < Self::TAG_SIZE {
            return Ok(None);
        }
        let saved = reader.tell();
        reader.seek(-(Self::TAG_SIZE as i64))?;
        let buffer = reader.read_array::<128>();
        reader.seek_to(saved)?;
        let buffer = buffer?;

        // Check for TAG identifier
        if buffer[0..3] != Self::TAG_ID {
            return Ok(None);
        }

        Ok(Some(Self::parse(&buffer, legacy)))
    }

    /// True when the source ends with an ID3v1 trailer
    pub fn is_present(reader: &mut Reader) -> Result<bool> {
        if reader.size() < Self::TAG_SIZE {
            return Ok(false);
        }
        let saved = reader.tell();
        reader.seek(-(Self::TAG_SIZE as i64))?;
        let found = reader.check_signature(&Self::TAG_ID);
        reader.seek_to(saved)?;
        found
    }

    fn parse(buffer: &[u8; 128], legacy: &'static Encoding) -> Self {
        let text = |bytes: &[u8]| {
            let (decoded, _) = legacy.decode_without_bom_handling(trim_nul(bytes));
            decoded.trim().to_string()
        };

        // ID3v1.1 keeps the track number in the last two comment bytes
        let (comment, track) = if buffer[125] == 0 && buffer[126] != 0 {
            (text(&buffer[97..125]), Some(buffer[126]))
        } else {
            (text(&buffer[97..127]), None)
        };

        Id3v1Tag {
            title: text(&buffer[3..33]),
            artist: text(&buffer[33..63]),
            album: text(&buffer[63..93]),
            year: text(&buffer[93..97]),
            comment,
            track,
            genre: buffer[127],
        }
    }

    pub fn genre_name(&self) -> Option<&'static str> {
        ValueConverter::parse_genre_id3v1(self.genre)
    }
}
