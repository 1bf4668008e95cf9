// ID3v2 frame identifiers, flags and content layouts

use crate::error::{Error, Result};
use crate::tree::Identifier;
use crate::utils::encoding::{decode_text, encode_text, split_terminated, TextEncoding};
use encoding_rs::Encoding;
use std::fmt;

/// Four-character frame identifier such as `TIT2`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub [u8; 4]);

impl FrameId {
    /// Identifier of the tag itself; never appears as a frame
    pub const TAG: FrameId = FrameId(*b"ID3\0");

    pub fn new(id: &str) -> Result<Self> {
        let bytes: [u8; 4] = id
            .as_bytes()
            .try_into()
            .map_err(|_| Error::invalid(format!("frame identifier '{}' is not four bytes", id)))?;
        if !bytes.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return Err(Error::invalid(format!("frame identifier '{}' is not A-Z0-9", id)));
        }
        Ok(FrameId(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn is_text(&self) -> bool {
        self.0[0] == b'T' && self.0 != *b"TXXX"
    }

    pub fn is_url(&self) -> bool {
        self.0[0] == b'W' && self.0 != *b"WXXX"
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter().take_while(|&&b| b != 0) {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({})", self)
    }
}

impl Identifier for FrameId {}

/// Common frame identifiers
pub mod frame_ids {
    use super::FrameId;

    pub const TITLE: FrameId = FrameId(*b"TIT2"); // Title/songname/content description
    pub const ARTIST: FrameId = FrameId(*b"TPE1"); // Lead performer(s)/Soloist(s)
    pub const ALBUM_ARTIST: FrameId = FrameId(*b"TPE2");
    pub const ALBUM: FrameId = FrameId(*b"TALB"); // Album/Movie/Show title
    pub const YEAR: FrameId = FrameId(*b"TYER"); // Year (2.3)
    pub const RECORDING_TIME: FrameId = FrameId(*b"TDRC"); // Recording time (2.4)
    pub const TRACK: FrameId = FrameId(*b"TRCK"); // Track number/Position in set
    pub const DISC: FrameId = FrameId(*b"TPOS");
    pub const GENRE: FrameId = FrameId(*b"TCON"); // Content type
    pub const COMPOSER: FrameId = FrameId(*b"TCOM");
    pub const BPM: FrameId = FrameId(*b"TBPM");
    pub const USER_TEXT: FrameId = FrameId(*b"TXXX");
    pub const USER_URL: FrameId = FrameId(*b"WXXX");
    pub const COMMENT: FrameId = FrameId(*b"COMM"); // Comments
    pub const LYRICS: FrameId = FrameId(*b"USLT");
    pub const PICTURE: FrameId = FrameId(*b"APIC"); // Attached picture
    pub const PLAY_COUNTER: FrameId = FrameId(*b"PCNT");
    pub const POPULARIMETER: FrameId = FrameId(*b"POPM");
    pub const GENERAL_OBJECT: FrameId = FrameId(*b"GEOB");
    pub const SYNCED_LYRICS: FrameId = FrameId(*b"SYLT");
    pub const RELATIVE_VOLUME: FrameId = FrameId(*b"RVA2");
    pub const ENCRYPTION_METHOD: FrameId = FrameId(*b"ENCR");
    pub const GROUP_ID: FrameId = FrameId(*b"GRID");
}

/// Frame status and format flags, independent of the tag revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags {
    pub tag_alter_preservation: bool,
    pub file_alter_preservation: bool,
    pub read_only: bool,
    pub grouping: bool,
    pub compression: bool,
    pub encryption: bool,
    /// 2.4 only
    pub unsynchronisation: bool,
    /// 2.4 only
    pub data_length_indicator: bool,
}

impl FrameFlags {
    pub fn from_raw(raw: u16, major: u8) -> Self {
        let bit = |mask: u16| raw & mask != 0;
        if major >= 4 {
            Self {
                tag_alter_preservation: bit(0x4000),
                file_alter_preservation: bit(0x2000),
                read_only: bit(0x1000),
                grouping: bit(0x0040),
                compression: bit(0x0008),
                encryption: bit(0x0004),
                unsynchronisation: bit(0x0002),
                data_length_indicator: bit(0x0001),
            }
        } else {
            Self {
                tag_alter_preservation: bit(0x8000),
                file_alter_preservation: bit(0x4000),
                read_only: bit(0x2000),
                compression: bit(0x0080),
                encryption: bit(0x0040),
                grouping: bit(0x0020),
                ..Self::default()
            }
        }
    }

    pub fn to_raw(&self, major: u8) -> u16 {
        let set = |flag: bool, mask: u16| if flag { mask } else { 0 };
        if major >= 4 {
            set(self.tag_alter_preservation, 0x4000)
                | set(self.file_alter_preservation, 0x2000)
                | set(self.read_only, 0x1000)
                | set(self.grouping, 0x0040)
                | set(self.compression, 0x0008)
                | set(self.encryption, 0x0004)
                | set(self.unsynchronisation, 0x0002)
                | set(self.data_length_indicator, 0x0001)
        } else {
            set(self.tag_alter_preservation, 0x8000)
                | set(self.file_alter_preservation, 0x4000)
                | set(self.read_only, 0x2000)
                | set(self.compression, 0x0080)
                | set(self.encryption, 0x0040)
                | set(self.grouping, 0x0020)
        }
    }

    /// Compressed or encrypted bodies cannot be interpreted
    pub fn is_protected(&self) -> bool {
        self.compression || self.encryption
    }
}

/// Text in a language, as carried by `COMM` and `USLT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageText {
    pub encoding: TextEncoding,
    pub language: [u8; 3],
    pub description: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub encoding: TextEncoding,
    pub mime_type: String,
    pub picture_type: u8,
    pub description: String,
    pub data: Vec<u8>,
}

impl Picture {
    pub const FRONT_COVER: u8 = 0x03;
}

/// Embedded file carried by `GEOB`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralObject {
    pub encoding: TextEncoding,
    pub mime_type: String,
    pub filename: String,
    pub description: String,
    pub data: Vec<u8>,
}

/// One `SYLT` entry, shown from `timestamp` on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedText {
    pub text: String,
    /// MPEG frames or milliseconds, per [`SyncedLyrics::timestamp_format`]
    pub timestamp: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedLyrics {
    pub encoding: TextEncoding,
    pub language: [u8; 3],
    /// 1 = MPEG frames, 2 = milliseconds
    pub timestamp_format: u8,
    /// 1 = lyrics, 2 = transcription, 3 = part names, ...
    pub content_type: u8,
    pub description: String,
    pub entries: Vec<SyncedText>,
}

/// One channel of an `RVA2` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAdjustment {
    /// 1 = master volume, 2 = front right, ... 8 = subwoofer
    pub channel: u8,
    /// Fixed point, 1/512 dB per step
    pub adjustment: i16,
    pub peak_bits: u8,
    /// Peak volume, `peak_bits` rounded up to whole bytes
    pub peak: Vec<u8>,
}

impl VolumeAdjustment {
    pub fn decibels(&self) -> f64 {
        f64::from(self.adjustment) / 512.0
    }
}

/// Decoded frame body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameContent {
    /// `T***`; 2.4 allows several NUL-separated values
    Text { encoding: TextEncoding, values: Vec<String> },
    UserText { encoding: TextEncoding, description: String, value: String },
    /// `W***`, always ISO-8859-1
    Url(String),
    UserUrl { encoding: TextEncoding, description: String, url: String },
    Comment(LanguageText),
    Lyrics(LanguageText),
    Picture(Picture),
    PlayCounter(u64),
    Popularimeter { email: String, rating: u8, counter: u64 },
    GeneralObject(GeneralObject),
    SyncedLyrics(SyncedLyrics),
    RelativeVolume { identification: String, channels: Vec<VolumeAdjustment> },
    /// `ENCR`: registers the method byte found in encrypted frames
    EncryptionMethod { owner: String, method: u8, data: Vec<u8> },
    /// `GRID`: registers the group byte found in grouped frames
    GroupRegistration { owner: String, group: u8, data: Vec<u8> },
    /// Compressed or encrypted body, kept verbatim with its flag prefix bytes
    Protected(Vec<u8>),
    Opaque(Vec<u8>),
}

impl FrameContent {
    pub fn text(value: impl Into<String>) -> Self {
        FrameContent::Text {
            encoding: TextEncoding::Utf16,
            values: vec![value.into()],
        }
    }

    /// First value rendered as text, when the frame carries any
    pub fn as_text(&self) -> Option<String> {
        match self {
            FrameContent::Text { values, .. } => Some(values.join("/")),
            FrameContent::UserText { value, .. } => Some(value.clone()),
            FrameContent::Url(url) | FrameContent::UserUrl { url, .. } => Some(url.clone()),
            FrameContent::Comment(t) | FrameContent::Lyrics(t) => Some(t.text.clone()),
            FrameContent::PlayCounter(n) => Some(n.to_string()),
            FrameContent::Popularimeter { rating, .. } => Some(rating.to_string()),
            FrameContent::SyncedLyrics(lyrics) => Some(
                lyrics
                    .entries
                    .iter()
                    .map(|entry| entry.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            FrameContent::GeneralObject(object) => Some(object.filename.clone()),
            FrameContent::Picture(_)
            | FrameContent::RelativeVolume { .. }
            | FrameContent::EncryptionMethod { .. }
            | FrameContent::GroupRegistration { .. }
            | FrameContent::Protected(_)
            | FrameContent::Opaque(_) => None,
        }
    }

    /// Interpret the unsynchronised, prefix-free body of frame `id`
    pub fn decode(id: FrameId, data: &[u8], legacy: &'static Encoding) -> Result<Self> {
        let content = match &id.0 {
            b"TXXX" => {
                let (encoding, rest) = split_encoding(data);
                let (description, value) = split_terminated(rest, encoding);
                FrameContent::UserText {
                    encoding,
                    description: decode_text(description, encoding, legacy),
                    value: decode_text(value, encoding, legacy),
                }
            }
            b"WXXX" => {
                let (encoding, rest) = split_encoding(data);
                let (description, url) = split_terminated(rest, encoding);
                FrameContent::UserUrl {
                    encoding,
                    description: decode_text(description, encoding, legacy),
                    url: decode_text(url, TextEncoding::Iso8859_1, legacy),
                }
            }
            b"COMM" => FrameContent::Comment(decode_language_text(data, legacy)?),
            b"USLT" => FrameContent::Lyrics(decode_language_text(data, legacy)?),
            b"APIC" => {
                let (encoding, rest) = split_encoding(data);
                let (mime, rest) = split_terminated(rest, TextEncoding::Iso8859_1);
                let (&picture_type, rest) = rest
                    .split_first()
                    .ok_or_else(|| Error::malformed(0, "APIC frame ends before the picture type"))?;
                let (description, data) = split_terminated(rest, encoding);
                FrameContent::Picture(Picture {
                    encoding,
                    mime_type: decode_text(mime, TextEncoding::Iso8859_1, legacy),
                    picture_type,
                    description: decode_text(description, encoding, legacy),
                    data: data.to_vec(),
                })
            }
            b"PCNT" => FrameContent::PlayCounter(decode_counter(data)),
            b"POPM" => {
                let (email, rest) = split_terminated(data, TextEncoding::Iso8859_1);
                let (rating, counter) = rest.split_first().map(|(r, c)| (*r, c)).unwrap_or((0, &[]));
                FrameContent::Popularimeter {
                    email: decode_text(email, TextEncoding::Iso8859_1, legacy),
                    rating,
                    counter: decode_counter(counter),
                }
            }
            b"GEOB" => {
                let (encoding, rest) = split_encoding(data);
                let (mime, rest) = split_terminated(rest, TextEncoding::Iso8859_1);
                let (filename, rest) = split_terminated(rest, encoding);
                let (description, data) = split_terminated(rest, encoding);
                FrameContent::GeneralObject(GeneralObject {
                    encoding,
                    mime_type: decode_text(mime, TextEncoding::Iso8859_1, legacy),
                    filename: decode_text(filename, encoding, legacy),
                    description: decode_text(description, encoding, legacy),
                    data: data.to_vec(),
                })
            }
            b"SYLT" => FrameContent::SyncedLyrics(decode_synced_lyrics(data, legacy)?),
            b"RVA2" => {
                let (identification, mut rest) = split_terminated(data, TextEncoding::Iso8859_1);
                let mut channels = Vec::new();
                while !rest.is_empty() {
                    let (head, tail) = rest
                        .split_first_chunk::<4>()
                        .ok_or_else(|| Error::malformed(0, "RVA2 frame ends inside a channel"))?;
                    let peak_len = usize::from(head[3]).div_ceil(8);
                    let peak = tail
                        .get(..peak_len)
                        .ok_or_else(|| Error::malformed(0, "RVA2 frame ends inside a peak volume"))?;
                    channels.push(VolumeAdjustment {
                        channel: head[0],
                        adjustment: i16::from_be_bytes([head[1], head[2]]),
                        peak_bits: head[3],
                        peak: peak.to_vec(),
                    });
                    rest = &tail[peak_len..];
                }
                FrameContent::RelativeVolume {
                    identification: decode_text(identification, TextEncoding::Iso8859_1, legacy),
                    channels,
                }
            }
            b"ENCR" | b"GRID" => {
                let (owner, rest) = split_terminated(data, TextEncoding::Iso8859_1);
                let (&symbol, data) = rest
                    .split_first()
                    .ok_or_else(|| Error::malformed(0, format!("{} frame has no symbol byte", id)))?;
                let owner = decode_text(owner, TextEncoding::Iso8859_1, legacy);
                if id.0 == *b"ENCR" {
                    FrameContent::EncryptionMethod { owner, method: symbol, data: data.to_vec() }
                } else {
                    FrameContent::GroupRegistration { owner, group: symbol, data: data.to_vec() }
                }
            }
            _ if id.is_text() => {
                let (encoding, mut rest) = split_encoding(data);
                let mut values = Vec::new();
                while !rest.is_empty() {
                    let (value, tail) = split_terminated(rest, encoding);
                    values.push(decode_text(value, encoding, legacy));
                    rest = tail;
                }
                FrameContent::Text { encoding, values }
            }
            _ if id.is_url() => FrameContent::Url(decode_text(data, TextEncoding::Iso8859_1, legacy)),
            _ => FrameContent::Opaque(data.to_vec()),
        };
        Ok(content)
    }

    pub fn encode(&self, legacy: &'static Encoding) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            FrameContent::Text { encoding, values } => {
                out.push(*encoding as u8);
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.extend_from_slice(encoding.terminator());
                    }
                    out.extend(encode_text(value, *encoding, legacy));
                }
            }
            FrameContent::UserText {
                encoding,
                description,
                value,
            } => {
                out.push(*encoding as u8);
                out.extend(encode_text(description, *encoding, legacy));
                out.extend_from_slice(encoding.terminator());
                out.extend(encode_text(value, *encoding, legacy));
            }
            FrameContent::Url(url) => out.extend(encode_text(url, TextEncoding::Iso8859_1, legacy)),
            FrameContent::UserUrl {
                encoding,
                description,
                url,
            } => {
                out.push(*encoding as u8);
                out.extend(encode_text(description, *encoding, legacy));
                out.extend_from_slice(encoding.terminator());
                out.extend(encode_text(url, TextEncoding::Iso8859_1, legacy));
            }
            FrameContent::Comment(t) | FrameContent::Lyrics(t) => {
                out.push(t.encoding as u8);
                out.extend_from_slice(&t.language);
                out.extend(encode_text(&t.description, t.encoding, legacy));
                out.extend_from_slice(t.encoding.terminator());
                out.extend(encode_text(&t.text, t.encoding, legacy));
            }
            FrameContent::Picture(p) => {
                out.push(p.encoding as u8);
                out.extend(encode_text(&p.mime_type, TextEncoding::Iso8859_1, legacy));
                out.push(0);
                out.push(p.picture_type);
                out.extend(encode_text(&p.description, p.encoding, legacy));
                out.extend_from_slice(p.encoding.terminator());
                out.extend_from_slice(&p.data);
            }
            FrameContent::PlayCounter(n) => out.extend(encode_counter(*n)),
            FrameContent::Popularimeter { email, rating, counter } => {
                out.extend(encode_text(email, TextEncoding::Iso8859_1, legacy));
                out.push(0);
                out.push(*rating);
                out.extend(encode_counter(*counter));
            }
            FrameContent::GeneralObject(object) => {
                out.push(object.encoding as u8);
                out.extend(encode_text(&object.mime_type, TextEncoding::Iso8859_1, legacy));
                out.push(0);
                out.extend(encode_text(&object.filename, object.encoding, legacy));
                out.extend_from_slice(object.encoding.terminator());
                out.extend(encode_text(&object.description, object.encoding, legacy));
                out.extend_from_slice(object.encoding.terminator());
                out.extend_from_slice(&object.data);
            }
            FrameContent::SyncedLyrics(lyrics) => {
                out.push(lyrics.encoding as u8);
                out.extend_from_slice(&lyrics.language);
                out.push(lyrics.timestamp_format);
                out.push(lyrics.content_type);
                out.extend(encode_text(&lyrics.description, lyrics.encoding, legacy));
                out.extend_from_slice(lyrics.encoding.terminator());
                for entry in &lyrics.entries {
                    out.extend(encode_text(&entry.text, lyrics.encoding, legacy));
                    out.extend_from_slice(lyrics.encoding.terminator());
                    out.extend_from_slice(&entry.timestamp.to_be_bytes());
                }
            }
            FrameContent::RelativeVolume { identification, channels } => {
                out.extend(encode_text(identification, TextEncoding::Iso8859_1, legacy));
                out.push(0);
                for channel in channels {
                    out.push(channel.channel);
                    out.extend_from_slice(&channel.adjustment.to_be_bytes());
                    out.push(channel.peak_bits);
                    out.extend_from_slice(&channel.peak);
                }
            }
            FrameContent::EncryptionMethod { owner, method: symbol, data }
            | FrameContent::GroupRegistration { owner, group: symbol, data } => {
                out.extend(encode_text(owner, TextEncoding::Iso8859_1, legacy));
                out.push(0);
                out.push(*symbol);
                out.extend_from_slice(data);
            }
            FrameContent::Protected(data) | FrameContent::Opaque(data) => out.extend_from_slice(data),
        }
        out
    }
}

fn split_encoding(data: &[u8]) -> (TextEncoding, &[u8]) {
    match data.split_first() {
        Some((&byte, rest)) => (TextEncoding::from_byte(byte), rest),
        None => (TextEncoding::Iso8859_1, &[]),
    }
}

fn decode_language_text(data: &[u8], legacy: &'static Encoding) -> Result<LanguageText> {
    let (encoding, rest) = split_encoding(data);
    if rest.len() < 3 {
        return Err(Error::malformed(0, "frame ends inside its language code"));
    }
    let mut language = [0u8; 3];
    language.copy_from_slice(&rest[..3]);
    let (description, text) = split_terminated(&rest[3..], encoding);
    Ok(LanguageText {
        encoding,
        language,
        description: decode_text(description, encoding, legacy),
        text: decode_text(text, encoding, legacy),
    })
}

fn decode_synced_lyrics(data: &[u8], legacy: &'static Encoding) -> Result<SyncedLyrics> {
    let (encoding, rest) = split_encoding(data);
    let (head, rest) = rest
        .split_first_chunk::<5>()
        .ok_or_else(|| Error::malformed(0, "SYLT frame ends inside its header"))?;
    let language = [head[0], head[1], head[2]];
    let (description, mut rest) = split_terminated(rest, encoding);

    let mut entries = Vec::new();
    while !rest.is_empty() {
        let (text, tail) = split_terminated(rest, encoding);
        let (timestamp, tail) = tail
            .split_first_chunk::<4>()
            .ok_or_else(|| Error::malformed(0, "SYLT entry has no timestamp"))?;
        entries.push(SyncedText {
            text: decode_text(text, encoding, legacy),
            timestamp: u32::from_be_bytes(*timestamp),
        });
        rest = tail;
    }
    Ok(SyncedLyrics {
        encoding,
        language,
        timestamp_format: head[3],
        content_type: head[4],
        description: decode_text(description, encoding, legacy),
        entries,
    })
}

/// Big-endian counter of at least four bytes; longer counters saturate at 64 bits
fn decode_counter(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, &b| acc.saturating_mul(256).saturating_add(b as u64))
}

fn encode_counter(value: u64) -> Vec<u8> {
    match u32::try_from(value) {
        Ok(small) => small.to_be_bytes().to_vec(),
        Err(_) => {
            let bytes = value.to_be_bytes();
            let skip = bytes.iter().take_while(|&&b| b == 0).count();
            bytes[skip..].to_vec()
        }
    }
}
