// ASF object bodies and their byte layouts

use super::guids;
use super::stream::{check_stream_number, StreamProperties};
use crate::error::{Error, Result};
use crate::tree::ByteSpan;
use crate::utils::encoding::{decode_utf16le, encode_utf16le};
use crate::utils::guid::Guid;
use crate::utils::io::Reader;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Decoded body of an ASF object
#[derive(Debug, Clone, PartialEq)]
pub enum AsfObject {
    /// Synthetic root spanning the whole source
    File,
    Header(HeaderObject),
    FileProperties(FileProperties),
    StreamProperties(StreamProperties),
    CodecList(CodecList),
    ContentDescription(ContentDescription),
    ExtendedContentDescription(ExtendedContentDescription),
    StreamBitrateProperties(StreamBitrateProperties),
    Metadata(Metadata),
    Marker(Marker),
    ScriptCommand(ScriptCommand),
    Padding(u64),
    /// Body kept as a source range; top-level Data and index objects land here
    Opaque(ByteSpan),
}

impl AsfObject {
    /// GUID implied by the body, if it has a fixed one
    pub fn guid(&self) -> Option<Guid> {
        match self {
            AsfObject::Header(_) => Some(guids::HEADER),
            AsfObject::FileProperties(_) => Some(guids::FILE_PROPERTIES),
            AsfObject::StreamProperties(_) => Some(guids::STREAM_PROPERTIES),
            AsfObject::CodecList(_) => Some(guids::CODEC_LIST),
            AsfObject::ContentDescription(_) => Some(guids::CONTENT_DESCRIPTION),
            AsfObject::ExtendedContentDescription(_) => Some(guids::EXTENDED_CONTENT_DESCRIPTION),
            AsfObject::StreamBitrateProperties(_) => Some(guids::STREAM_BITRATE_PROPERTIES),
            AsfObject::Metadata(m) if m.library => Some(guids::METADATA_LIBRARY),
            AsfObject::Metadata(_) => Some(guids::METADATA),
            AsfObject::Padding(_) => Some(guids::PADDING),
            AsfObject::Marker(_) => Some(guids::MARKER),
            AsfObject::ScriptCommand(_) => Some(guids::SCRIPT_COMMAND),
            AsfObject::File | AsfObject::Opaque(_) => None,
        }
    }
}

/// Header object preamble; the object count is derived from the children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderObject {
    pub reserved1: u8,
    pub reserved2: u8,
}

impl Default for HeaderObject {
    fn default() -> Self {
        Self {
            reserved1: 0x01,
            reserved2: 0x02,
        }
    }
}

impl HeaderObject {
    /// Count, reserved1, reserved2
    pub const PREAMBLE_LEN: u64 = 6;
}

/// 100-nanosecond ticks between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_OFFSET: u64 = 116_444_736_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileProperties {
    pub file_id: Guid,
    pub file_size: u64,
    /// FILETIME: 100 ns ticks since 1601-01-01
    pub creation_date: u64,
    pub data_packets_count: u64,
    /// 100 ns ticks, preroll included
    pub play_duration: u64,
    pub send_duration: u64,
    /// Milliseconds
    pub preroll: u64,
    pub flags: u32,
    pub minimum_data_packet_size: u32,
    pub maximum_data_packet_size: u32,
    pub maximum_bitrate: u32,
}

impl FileProperties {
    pub const BROADCAST: u32 = 0x1;
    pub const SEEKABLE: u32 = 0x2;

    pub fn read(reader: &mut Reader) -> Result<Self> {
        Ok(Self {
            file_id: reader.read_guid()?,
            file_size: reader.read_le_u64()?,
            creation_date: reader.read_le_u64()?,
            data_packets_count: reader.read_le_u64()?,
            play_duration: reader.read_le_u64()?,
            send_duration: reader.read_le_u64()?,
            preroll: reader.read_le_u64()?,
            flags: reader.read_le_u32()?,
            minimum_data_packet_size: reader.read_le_u32()?,
            maximum_data_packet_size: reader.read_le_u32()?,
            maximum_bitrate: reader.read_le_u32()?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.file_id.to_ms_bytes());
        out.extend_from_slice(&self.file_size.to_le_bytes());
        out.extend_from_slice(&self.creation_date.to_le_bytes());
        out.extend_from_slice(&self.data_packets_count.to_le_bytes());
        out.extend_from_slice(&self.play_duration.to_le_bytes());
        out.extend_from_slice(&self.send_duration.to_le_bytes());
        out.extend_from_slice(&self.preroll.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.minimum_data_packet_size.to_le_bytes());
        out.extend_from_slice(&self.maximum_data_packet_size.to_le_bytes());
        out.extend_from_slice(&self.maximum_bitrate.to_le_bytes());
    }

    /// Creation date, or `None` for broadcast files and pre-1970 stamps
    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        let ticks = self.creation_date.checked_sub(FILETIME_UNIX_OFFSET)?;
        let secs = i64::try_from(ticks / 10_000_000).ok()?;
        let nanos = ((ticks % 10_000_000) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    /// Playback length with the preroll removed
    pub fn duration(&self) -> Duration {
        let total = Duration::from_nanos(self.play_duration.saturating_mul(100));
        total.saturating_sub(Duration::from_millis(self.preroll))
    }

    pub fn is_broadcast(&self) -> bool {
        self.flags & Self::BROADCAST != 0
    }

    pub fn is_seekable(&self) -> bool {
        self.flags & Self::SEEKABLE != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Video,
    Audio,
    Unknown(u16),
}

impl From<u16> for CodecKind {
    fn from(value: u16) -> Self {
        match value {
            1 => CodecKind::Video,
            2 => CodecKind::Audio,
            other => CodecKind::Unknown(other),
        }
    }
}

impl From<CodecKind> for u16 {
    fn from(kind: CodecKind) -> u16 {
        match kind {
            CodecKind::Video => 1,
            CodecKind::Audio => 2,
            CodecKind::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecEntry {
    pub kind: CodecKind,
    pub name: String,
    pub description: String,
    pub information: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodecList {
    pub entries: Vec<CodecEntry>,
}

impl CodecList {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        reader.skip(16)?;
        let count = reader.read_le_u32()?;
        let mut entries = Vec::new();
        for _ in 0..count {
            let kind = CodecKind::from(reader.read_le_u16()?);
            // lengths are in UTF-16 code units
            let len = reader.read_le_u16()? as u64 * 2;
            let name = decode_utf16le(&reader.read(len)?);
            let len = reader.read_le_u16()? as u64 * 2;
            let description = decode_utf16le(&reader.read(len)?);
            let len = reader.read_le_u16()? as u64;
            entries.push(CodecEntry {
                kind,
                name,
                description,
                information: reader.read(len)?,
            });
        }
        Ok(Self { entries })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&guids::RESERVED_2.to_ms_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&u16::from(entry.kind).to_le_bytes());
            for text in [&entry.name, &entry.description] {
                let units = encode_utf16le(text, true);
                out.extend_from_slice(&((units.len() / 2) as u16).to_le_bytes());
                out.extend(units);
            }
            out.extend_from_slice(&(entry.information.len() as u16).to_le_bytes());
            out.extend_from_slice(&entry.information);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentDescription {
    pub title: String,
    pub author: String,
    pub copyright: String,
    pub description: String,
    pub rating: String,
}

impl ContentDescription {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let mut lengths = [0u64; 5];
        for len in lengths.iter_mut() {
            *len = reader.read_le_u16()? as u64;
        }
        let mut fields = Vec::with_capacity(5);
        for len in lengths {
            fields.push(decode_utf16le(&reader.read(len)?));
        }
        let mut fields = fields.into_iter();
        let mut next = || fields.next().unwrap_or_default();
        Ok(Self {
            title: next(),
            author: next(),
            copyright: next(),
            description: next(),
            rating: next(),
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let fields: Vec<Vec<u8>> = [&self.title, &self.author, &self.copyright, &self.description, &self.rating]
            .iter()
            .map(|text| {
                if text.is_empty() {
                    Vec::new()
                } else {
                    encode_utf16le(text, true)
                }
            })
            .collect();
        for field in &fields {
            out.extend_from_slice(&(field.len() as u16).to_le_bytes());
        }
        for field in fields {
            out.extend(field);
        }
    }
}

/// Typed value of a content descriptor or metadata record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Unicode(String),
    Bytes(Vec<u8>),
    Bool(bool),
    DWord(u32),
    QWord(u64),
    Word(u16),
    Guid(Guid),
}

/// Width of a stored boolean: 4 bytes in descriptors, 2 in metadata records
#[derive(Debug, Clone, Copy)]
enum BoolWidth {
    DWord,
    Word,
}

impl AttributeValue {
    pub fn type_code(&self) -> u16 {
        match self {
            AttributeValue::Unicode(_) => 0,
            AttributeValue::Bytes(_) => 1,
            AttributeValue::Bool(_) => 2,
            AttributeValue::DWord(_) => 3,
            AttributeValue::QWord(_) => 4,
            AttributeValue::Word(_) => 5,
            AttributeValue::Guid(_) => 6,
        }
    }

    fn read(reader: &mut Reader, kind: u16, len: u64, bools: BoolWidth) -> Result<Self> {
        let start = reader.tell();
        let value = match kind {
            0 => AttributeValue::Unicode(decode_utf16le(&reader.read(len)?)),
            2 => AttributeValue::Bool(match bools {
                BoolWidth::DWord => reader.read_le_u32()? != 0,
                BoolWidth::Word => reader.read_le_u16()? != 0,
            }),
            3 => AttributeValue::DWord(reader.read_le_u32()?),
            4 => AttributeValue::QWord(reader.read_le_u64()?),
            5 => AttributeValue::Word(reader.read_le_u16()?),
            6 => AttributeValue::Guid(reader.read_guid()?),
            _ => AttributeValue::Bytes(reader.read(len)?),
        };
        // the declared length wins over the natural width of the type
        reader.seek_to(start + len)?;
        Ok(value)
    }

    fn encode(&self, bools: BoolWidth) -> Vec<u8> {
        match self {
            AttributeValue::Unicode(text) => encode_utf16le(text, true),
            AttributeValue::Bytes(data) => data.clone(),
            AttributeValue::Bool(flag) => match bools {
                BoolWidth::DWord => (*flag as u32).to_le_bytes().to_vec(),
                BoolWidth::Word => (*flag as u16).to_le_bytes().to_vec(),
            },
            AttributeValue::DWord(v) => v.to_le_bytes().to_vec(),
            AttributeValue::QWord(v) => v.to_le_bytes().to_vec(),
            AttributeValue::Word(v) => v.to_le_bytes().to_vec(),
            AttributeValue::Guid(guid) => guid.to_ms_bytes().to_vec(),
        }
    }

    /// Display form used by the metadata facade
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttributeValue::Unicode(text) => Some(text.clone()),
            AttributeValue::Bytes(_) => None,
            AttributeValue::Bool(flag) => Some(flag.to_string()),
            AttributeValue::DWord(v) => Some(v.to_string()),
            AttributeValue::QWord(v) => Some(v.to_string()),
            AttributeValue::Word(v) => Some(v.to_string()),
            AttributeValue::Guid(guid) => Some(guid.to_string()),
        }
    }
}

/// Named descriptors such as `WM/AlbumTitle`, in stored order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtendedContentDescription {
    pub descriptors: Vec<(String, AttributeValue)>,
}

impl ExtendedContentDescription {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let count = reader.read_le_u16()?;
        let mut descriptors = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let len = reader.read_le_u16()? as u64;
            let name = decode_utf16le(&reader.read(len)?);
            let kind = reader.read_le_u16()?;
            let len = reader.read_le_u16()? as u64;
            let value = AttributeValue::read(reader, kind, len, BoolWidth::DWord)?;
            descriptors.push((name, value));
        }
        Ok(Self { descriptors })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.descriptors.len() as u16).to_le_bytes());
        for (name, value) in &self.descriptors {
            let name = encode_utf16le(name, true);
            let data = value.encode(BoolWidth::DWord);
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend(name);
            out.extend_from_slice(&value.type_code().to_le_bytes());
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
            out.extend(data);
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.descriptors
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Replace the first descriptor called `name`, or append a new one
    pub fn set(&mut self, name: &str, value: AttributeValue) {
        match self.descriptors.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value,
            None => self.descriptors.push((name.to_string(), value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitrateRecord {
    pub flags: u16,
    pub average_bitrate: u32,
}

impl BitrateRecord {
    pub fn new(stream_number: u8, average_bitrate: u32) -> Result<Self> {
        check_stream_number(stream_number)?;
        Ok(Self {
            flags: stream_number as u16,
            average_bitrate,
        })
    }

    pub fn stream_number(&self) -> u8 {
        (self.flags & 0x7F) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamBitrateProperties {
    pub records: Vec<BitrateRecord>,
}

impl StreamBitrateProperties {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let count = reader.read_le_u16()?;
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            records.push(BitrateRecord {
                flags: reader.read_le_u16()?,
                average_bitrate: reader.read_le_u32()?,
            });
        }
        Ok(Self { records })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.records.len() as u16).to_le_bytes());
        for record in &self.records {
            out.extend_from_slice(&record.flags.to_le_bytes());
            out.extend_from_slice(&record.average_bitrate.to_le_bytes());
        }
    }

    /// Average bitrate of `stream_number`, in bits per second
    pub fn bitrate(&self, stream_number: u8) -> Result<Option<u32>> {
        check_stream_number(stream_number)?;
        Ok(self
            .records
            .iter()
            .find(|r| r.stream_number() == stream_number)
            .map(|r| r.average_bitrate))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Always zero in the Metadata object
    pub language_index: u16,
    /// Zero for file-level attributes
    pub stream_number: u16,
    pub name: String,
    pub value: AttributeValue,
}

impl MetadataRecord {
    pub fn new(stream_number: u16, name: impl Into<String>, value: AttributeValue) -> Result<Self> {
        if stream_number > 127 {
            return Err(Error::invalid(format!("stream number {} is outside 0..=127", stream_number)));
        }
        Ok(Self {
            language_index: 0,
            stream_number,
            name: name.into(),
            value,
        })
    }
}

/// Metadata and Metadata Library objects share one record layout
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    pub library: bool,
    pub records: Vec<MetadataRecord>,
}

impl Metadata {
    pub fn read(reader: &mut Reader, library: bool) -> Result<Self> {
        let count = reader.read_le_u16()?;
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let language_index = reader.read_le_u16()?;
            let stream_number = reader.read_le_u16()?;
            let name_len = reader.read_le_u16()? as u64;
            let kind = reader.read_le_u16()?;
            let data_len = reader.read_le_u32()? as u64;
            let name = decode_utf16le(&reader.read(name_len)?);
            let value = AttributeValue::read(reader, kind, data_len, BoolWidth::Word)?;
            records.push(MetadataRecord {
                language_index: if library { language_index } else { 0 },
                stream_number,
                name,
                value,
            });
        }
        Ok(Self { library, records })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.records.len() as u16).to_le_bytes());
        for record in &self.records {
            let name = encode_utf16le(&record.name, true);
            let data = record.value.encode(BoolWidth::Word);
            let language_index = if self.library { record.language_index } else { 0 };
            out.extend_from_slice(&language_index.to_le_bytes());
            out.extend_from_slice(&record.stream_number.to_le_bytes());
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&record.value.type_code().to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend(name);
            out.extend(data);
        }
    }
}

/// One named position in the presentation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkerEntry {
    /// Byte offset into the Data object payload
    pub offset: u64,
    /// 100 ns ticks
    pub presentation_time: u64,
    /// Milliseconds
    pub send_time: u32,
    pub flags: u32,
    pub description: String,
}

/// Named markers, e.g. chapter points
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Marker {
    pub name: String,
    pub entries: Vec<MarkerEntry>,
}

impl Marker {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        reader.skip(16)?;
        let count = reader.read_le_u32()?;
        reader.skip(2)?;
        // the name length is in bytes
        let len = reader.read_le_u16()? as u64;
        let name = decode_utf16le(&reader.read(len)?);
        let mut entries = Vec::new();
        for _ in 0..count {
            let offset = reader.read_le_u64()?;
            let presentation_time = reader.read_le_u64()?;
            let entry_len = reader.read_le_u16()? as u64;
            let start = reader.tell();
            let send_time = reader.read_le_u32()?;
            let flags = reader.read_le_u32()?;
            // the description length is in UTF-16 code units
            let len = reader.read_le_u32()? as u64 * 2;
            let description = decode_utf16le(&reader.read(len)?);
            reader.seek_to(start + entry_len)?;
            entries.push(MarkerEntry {
                offset,
                presentation_time,
                send_time,
                flags,
                description,
            });
        }
        Ok(Self { name, entries })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let name = encode_utf16le(&self.name, true);
        out.extend_from_slice(&guids::RESERVED_4.to_ms_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&u16_len(name.len(), "marker name")?.to_le_bytes());
        out.extend(name);
        for entry in &self.entries {
            let description = encode_utf16le(&entry.description, true);
            out.extend_from_slice(&entry.offset.to_le_bytes());
            out.extend_from_slice(&entry.presentation_time.to_le_bytes());
            out.extend_from_slice(&u16_len(12 + description.len(), "marker entry")?.to_le_bytes());
            out.extend_from_slice(&entry.send_time.to_le_bytes());
            out.extend_from_slice(&entry.flags.to_le_bytes());
            out.extend_from_slice(&((description.len() / 2) as u32).to_le_bytes());
            out.extend(description);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    /// Milliseconds
    pub presentation_time: u32,
    /// Index into [`ScriptCommand::types`]
    pub type_index: u16,
    pub name: String,
}

/// Timed script commands such as `URL` or `FILENAME`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptCommand {
    pub types: Vec<String>,
    pub commands: Vec<Command>,
}

impl ScriptCommand {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        reader.skip(16)?;
        let command_count = reader.read_le_u16()?;
        let type_count = reader.read_le_u16()?;
        let mut types = Vec::with_capacity(type_count as usize);
        for _ in 0..type_count {
            let len = reader.read_le_u16()? as u64 * 2;
            types.push(decode_utf16le(&reader.read(len)?));
        }
        let mut commands = Vec::with_capacity(command_count as usize);
        for _ in 0..command_count {
            let presentation_time = reader.read_le_u32()?;
            let type_index = reader.read_le_u16()?;
            let len = reader.read_le_u16()? as u64 * 2;
            commands.push(Command {
                presentation_time,
                type_index,
                name: decode_utf16le(&reader.read(len)?),
            });
        }
        Ok(Self { types, commands })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&guids::RESERVED_3.to_ms_bytes());
        out.extend_from_slice(&u16_len(self.commands.len(), "script commands")?.to_le_bytes());
        out.extend_from_slice(&u16_len(self.types.len(), "script command types")?.to_le_bytes());
        for name in &self.types {
            write_counted_utf16(name, out)?;
        }
        for command in &self.commands {
            out.extend_from_slice(&command.presentation_time.to_le_bytes());
            out.extend_from_slice(&command.type_index.to_le_bytes());
            write_counted_utf16(&command.name, out)?;
        }
        Ok(())
    }

    /// Type name of `command`, if its index is in range
    pub fn command_type(&self, command: &Command) -> Option<&str> {
        self.types.get(command.type_index as usize).map(String::as_str)
    }
}

fn u16_len(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::invalid(format!("{} too long: {}", what, len)))
}

/// Code-unit count followed by unterminated UTF-16LE
fn write_counted_utf16(text: &str, out: &mut Vec<u8>) -> Result<()> {
    let units = encode_utf16le(text, false);
    out.extend_from_slice(&u16_len(units.len() / 2, "script command text")?.to_le_bytes());
    out.extend(units);
    Ok(())
}
