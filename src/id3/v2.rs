// ID3v2.3 / ID3v2.4 tag implementation

use super::frames::{FrameContent, FrameFlags, FrameId};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::field_mapping::FieldMappings;
use crate::tree::{Decoded, Decoder, EncodeContext, Format, Header, IdPattern, NodeId, Registry, Tree};
use crate::utils::bytes::{decode_syncsafe, encode_syncsafe, resynchronise, unsynchronise, SYNCSAFE_MAX};
use crate::utils::io::Reader;
use encoding_rs::Encoding;
use log::{debug, warn};
use std::path::Path;

/// "ID3", version, flags and syncsafe size
pub const HEADER_LEN: u64 = 10;
pub const FRAME_HEADER_LEN: u64 = 10;

const SIGNATURE: &[u8; 3] = b"ID3";
const FOOTER_SIGNATURE: &[u8; 3] = b"3DI";

/// Tag header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagFlags {
    pub unsynchronisation: bool,
    pub extended_header: bool,
    pub experimental: bool,
    /// 2.4 only
    pub footer: bool,
}

impl TagFlags {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            unsynchronisation: byte & 0x80 != 0,
            extended_header: byte & 0x40 != 0,
            experimental: byte & 0x20 != 0,
            footer: byte & 0x10 != 0,
        }
    }

    pub fn to_byte(&self) -> u8 {
        (self.unsynchronisation as u8) << 7
            | (self.extended_header as u8) << 6
            | (self.experimental as u8) << 5
            | (self.footer as u8) << 4
    }
}

/// Optional header between the tag header and the first frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtendedHeader {
    /// 2.4: this tag updates an earlier one
    pub update: bool,
    pub crc: Option<u32>,
    /// 2.4 tag restrictions byte
    pub restrictions: Option<u8>,
    /// 2.3: declared padding size
    pub padding: u32,
}

impl ExtendedHeader {
    fn read(reader: &mut Reader, major: u8) -> Result<Self> {
        let start = reader.tell();
        let mut header = ExtendedHeader::default();
        if major >= 4 {
            let size = reader.read_syncsafe_u32()? as u64;
            let flag_bytes = reader.read_u8()?;
            if flag_bytes != 1 {
                return Err(Error::malformed(start, format!("extended header has {} flag bytes", flag_bytes)));
            }
            let flags = reader.read_u8()?;
            if flags & 0x40 != 0 {
                header.update = true;
                reader.skip(1)?;
            }
            if flags & 0x20 != 0 {
                reader.skip(1)?;
                // 35-bit syncsafe value in five bytes
                let bytes = reader.read_array::<5>()?;
                let crc = bytes.iter().fold(0u64, |acc, &b| acc << 7 | (b & 0x7F) as u64);
                header.crc = Some(crc as u32);
            }
            if flags & 0x10 != 0 {
                reader.skip(1)?;
                header.restrictions = Some(reader.read_u8()?);
            }
            reader.seek_to(start + size)?;
        } else {
            let size = reader.read_be_u32()? as u64;
            let flags = reader.read_be_u16()?;
            header.padding = reader.read_be_u32()?;
            if flags & 0x8000 != 0 {
                header.crc = Some(reader.read_be_u32()?);
            }
            reader.seek_to(start + 4 + size)?;
        }
        Ok(header)
    }

    /// Re-encode without the CRC, which no longer matches once frames change
    fn encode(&self, major: u8) -> Vec<u8> {
        let mut out = Vec::new();
        if major >= 4 {
            let mut flags = 0u8;
            let mut data = Vec::new();
            if self.update {
                flags |= 0x40;
                data.push(0);
            }
            if let Some(restrictions) = self.restrictions {
                flags |= 0x10;
                data.extend_from_slice(&[1, restrictions]);
            }
            let size = 6 + data.len() as u32;
            out.extend_from_slice(&encode_syncsafe(size));
            out.push(1);
            out.push(flags);
            out.extend(data);
        } else {
            out.extend_from_slice(&6u32.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
            out.extend_from_slice(&self.padding.to_be_bytes());
        }
        out
    }
}

/// Body of the tag root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagHeader {
    pub major: u8,
    pub revision: u8,
    pub flags: TagFlags,
    pub extended: Option<ExtendedHeader>,
    /// Zero bytes after the last frame
    pub padding: u64,
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: FrameFlags,
    pub group: Option<u8>,
    pub content: FrameContent,
}

impl Frame {
    pub fn new(content: FrameContent) -> Self {
        Self {
            flags: FrameFlags::default(),
            group: None,
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Id3Node {
    Tag(TagHeader),
    Frame(Frame),
}

/// Frame header layout of one tag revision
#[derive(Debug)]
pub struct Id3Layout {
    major: u8,
    legacy: &'static Encoding,
    registry: Registry<Id3Layout>,
}

impl Id3Layout {
    pub fn new(major: u8, legacy: &'static Encoding) -> Self {
        use super::frames::frame_ids::*;
        // every identifier goes through `decode_frame`; registering the common ones
        // keeps the fallback log for genuinely unknown frames
        let registry = Registry::new(decode_frame).register_all(
            [
                TITLE, ARTIST, ALBUM_ARTIST, ALBUM, YEAR, RECORDING_TIME, TRACK, DISC, GENRE, COMPOSER, BPM,
                USER_TEXT, USER_URL, COMMENT, LYRICS, PICTURE, PLAY_COUNTER, POPULARIMETER,
            ],
            decode_frame,
        );
        Self { major, legacy, registry }
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    fn frame_size_bytes(&self, body_len: u64) -> Result<[u8; 4]> {
        if self.major >= 4 {
            if body_len > SYNCSAFE_MAX as u64 {
                return Err(Error::invalid(format!("frame of {} bytes exceeds the syncsafe range", body_len)));
            }
            Ok(encode_syncsafe(body_len as u32))
        } else {
            let len = u32::try_from(body_len).map_err(|_| Error::invalid("frame exceeds 4 GiB"))?;
            Ok(len.to_be_bytes())
        }
    }
}

fn relocate(error: Error, offset: u64) -> Error {
    match error {
        Error::Malformed { offset: inner, reason } => Error::malformed(offset + inner, reason),
        other => other,
    }
}

fn decode_frame(dec: &mut Decoder<'_, Id3Layout>, header: &Header<FrameId>) -> Result<Decoded<Id3Layout>> {
    let layout = dec.format();
    let flags = FrameFlags::from_raw(header.flags, layout.major);
    let raw = dec.rest()?;
    if flags.is_protected() {
        debug!("ID3v2: {} at {} is compressed or encrypted, keeping it opaque", header.identifier, header.start());
        return Ok(Decoded::leaf(Id3Node::Frame(Frame {
            flags,
            group: None,
            content: FrameContent::Protected(raw),
        })));
    }

    let mut body = raw.as_slice();
    let mut group = None;
    if flags.grouping {
        let (&id, rest) = body
            .split_first()
            .ok_or_else(|| Error::malformed(header.body_start(), "grouped frame has no group byte"))?;
        group = Some(id);
        body = rest;
    }
    if flags.data_length_indicator {
        body = body
            .get(4..)
            .ok_or_else(|| Error::malformed(header.body_start(), "frame ends inside its data length indicator"))?;
    }
    let data = if flags.unsynchronisation {
        resynchronise(body)
    } else {
        body.to_vec()
    };

    let content = FrameContent::decode(header.identifier, &data, layout.legacy)
        .map_err(|e| relocate(e, header.body_start()))?;
    Ok(Decoded::leaf(Id3Node::Frame(Frame { flags, group, content })))
}

impl Format for Id3Layout {
    type Id = FrameId;
    type Body = Id3Node;
    const NAME: &'static str = "ID3v2";

    fn registry(&self) -> &Registry<Self> {
        &self.registry
    }

    fn read_header(&self, reader: &mut Reader, _end: u64) -> Result<Header<FrameId>> {
        let offset = reader.tell();
        let identifier = FrameId(reader.read_array::<4>()?);
        let size = if self.major >= 4 {
            reader.read_syncsafe_u32()?
        } else {
            reader.read_be_u32()?
        };
        let flags = reader.read_be_u16()?;
        Ok(Header::new(offset, identifier, size as u64 + FRAME_HEADER_LEN, FRAME_HEADER_LEN).with_flags(flags))
    }

    /// A zero byte where a frame identifier should start begins the padding
    fn at_padding(&self, reader: &mut Reader) -> Result<bool> {
        Ok(reader.peek(1)? == [0])
    }

    fn header_len(&self, _identifier: &FrameId, _body_len: u64) -> u64 {
        FRAME_HEADER_LEN
    }

    fn write_header(&self, identifier: &FrameId, body: Option<&Id3Node>, size: u64, out: &mut Vec<u8>) -> Result<()> {
        let body_len = size.saturating_sub(FRAME_HEADER_LEN);
        match body {
            Some(Id3Node::Tag(tag)) => {
                if body_len > SYNCSAFE_MAX as u64 {
                    return Err(Error::invalid(format!("tag of {} bytes exceeds the syncsafe range", body_len)));
                }
                out.extend_from_slice(SIGNATURE);
                out.push(tag.major);
                out.push(tag.revision);
                out.push(tag.flags.to_byte());
                out.extend_from_slice(&encode_syncsafe(body_len as u32));
            }
            Some(Id3Node::Frame(frame)) => {
                out.extend_from_slice(identifier.as_bytes());
                out.extend_from_slice(&self.frame_size_bytes(body_len)?);
                out.extend_from_slice(&frame.flags.to_raw(self.major).to_be_bytes());
            }
            None => {
                out.extend_from_slice(identifier.as_bytes());
                out.extend_from_slice(&self.frame_size_bytes(body_len)?);
                out.extend_from_slice(&[0, 0]);
            }
        }
        Ok(())
    }

    fn encode_body(&self, body: &Id3Node, _cx: &mut EncodeContext<'_>, out: &mut Vec<u8>) -> Result<()> {
        match body {
            Id3Node::Tag(tag) => {
                if let Some(extended) = &tag.extended {
                    out.extend(extended.encode(self.major));
                }
            }
            Id3Node::Frame(frame) => {
                if let FrameContent::Protected(raw) = &frame.content {
                    out.extend_from_slice(raw);
                    return Ok(());
                }
                if frame.flags.grouping {
                    out.push(frame.group.unwrap_or(0));
                }
                let content = frame.content.encode(self.legacy);
                if frame.flags.data_length_indicator && self.major >= 4 {
                    out.extend_from_slice(&self.frame_size_bytes(content.len() as u64)?);
                }
                if frame.flags.unsynchronisation && self.major >= 4 {
                    out.extend(unsynchronise(&content));
                } else {
                    out.extend(content);
                }
            }
        }
        Ok(())
    }

    fn identify(&self, body: &Id3Node) -> Option<FrameId> {
        use super::frames::frame_ids::*;
        match body {
            Id3Node::Frame(frame) => match frame.content {
                FrameContent::UserText { .. } => Some(USER_TEXT),
                FrameContent::UserUrl { .. } => Some(USER_URL),
                FrameContent::Comment(_) => Some(COMMENT),
                FrameContent::Lyrics(_) => Some(LYRICS),
                FrameContent::Picture(_) => Some(PICTURE),
                FrameContent::PlayCounter(_) => Some(PLAY_COUNTER),
                FrameContent::Popularimeter { .. } => Some(POPULARIMETER),
                FrameContent::GeneralObject(_) => Some(GENERAL_OBJECT),
                FrameContent::SyncedLyrics(_) => Some(SYNCED_LYRICS),
                FrameContent::RelativeVolume { .. } => Some(RELATIVE_VOLUME),
                FrameContent::EncryptionMethod { .. } => Some(ENCRYPTION_METHOD),
                FrameContent::GroupRegistration { .. } => Some(GROUP_ID),
                _ => None,
            },
            Id3Node::Tag(_) => Some(FrameId::TAG),
        }
    }

    fn resolve_alias(&self, name: &str) -> Option<FrameId> {
        FieldMappings::resolve_id3v2(name, self.major)
    }
}

/// An ID3v2 tag and the frames decoded from it so far
#[derive(Debug)]
pub struct Id3v2 {
    reader: Reader,
    layout: Id3Layout,
    tree: Tree<Id3Layout>,
    options: Options,
    /// Bytes the tag occupies in the source, footer included
    source_size: u64,
}

impl Id3v2 {
    /// Open `path` and decode every frame
    pub fn read<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let mut tag = Self::open(path, options)?;
        tag.read_frames()?;
        Ok(tag)
    }

    /// Open `path` and decode only the tag header
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        Self::from_reader(Reader::open(path)?, options)
    }

    /// Decode the tag header at the reader position
    pub fn from_reader(mut reader: Reader, options: Options) -> Result<Self> {
        options.validate()?;
        let legacy = options.legacy_encoding()?;
        let start = reader.tell();
        if !reader.check_signature(SIGNATURE)? {
            return Err(Error::signature("ID3v2", "missing 'ID3' signature"));
        }
        let head = reader.read_array::<10>()?;
        let (major, revision) = (head[3], head[4]);
        if !(3..=4).contains(&major) {
            return Err(Error::UnsupportedVersion {
                format: "ID3v2",
                version: format!("2.{}.{}", major, revision),
            });
        }
        let flags = TagFlags::from_byte(head[5]);
        let size = decode_syncsafe([head[6], head[7], head[8], head[9]]) as u64;

        let mut end = start + HEADER_LEN + size;
        if end > reader.size() {
            warn!("ID3v2: tag claims {} bytes but the source ends at {}, clamping", size, reader.size());
            end = reader.size();
        }

        if flags.footer && major >= 4 {
            let saved = reader.tell();
            reader.seek_to(end)?;
            let footer = reader.peek(HEADER_LEN)?;
            if !footer.starts_with(FOOTER_SIGNATURE) || footer.get(3..) != head.get(3..) {
                warn!("ID3v2: footer at {} does not mirror the header", end);
            }
            reader.seek_to(saved)?;
        }

        let source_size = end - start + if flags.footer && major >= 4 { HEADER_LEN } else { 0 };

        // 2.3 unsynchronises the whole tag body; frames are decoded from a clean copy
        let (mut reader, root_start, end) = if flags.unsynchronisation && major == 3 {
            let body = reader.read(end - reader.tell())?;
            let mut clean = head.to_vec();
            clean.extend(resynchronise(&body));
            let len = clean.len() as u64;
            let mut copy = Reader::from_bytes(clean);
            copy.seek_to(HEADER_LEN)?;
            (copy, 0, len)
        } else {
            (reader, start, end)
        };

        let extended = if flags.extended_header {
            Some(ExtendedHeader::read(&mut reader, major)?)
        } else {
            None
        };

        let root = Header::new(root_start, FrameId::TAG, end - root_start, HEADER_LEN);
        let tag = TagHeader {
            major,
            revision,
            flags,
            extended,
            padding: 0,
        };
        debug!("ID3v2.{}.{}: {} byte tag at {}", major, revision, size, start);
        Ok(Self {
            reader,
            layout: Id3Layout::new(major, legacy),
            tree: Tree::new(root, Id3Node::Tag(tag)),
            options,
            source_size,
        })
    }

    pub fn has_frames(&self) -> bool {
        self.reader.tell() < self.end()
    }

    fn end(&self) -> u64 {
        self.tree.source_end()
    }

    /// Decode the next frame; `None` at padding or the end of the tag
    pub fn next_frame(&mut self) -> Result<Option<NodeId>> {
        let before = self.reader.tell();
        let end = self.end();
        let mut decoder = Decoder::new(&self.layout, &mut self.reader, &mut self.tree, &self.options);
        let next = decoder.decode_next(false)?;
        if next.is_none() && before < end {
            if let Some(tag) = self.tag_mut() {
                tag.padding = end - before;
            }
        }
        Ok(next)
    }

    /// Decode every remaining frame
    pub fn read_frames(&mut self) -> Result<()> {
        while self.next_frame()?.is_some() {}
        Ok(())
    }

    pub fn tag(&self) -> Option<&TagHeader> {
        match self.tree.body(self.tree.root()) {
            Some(Id3Node::Tag(tag)) => Some(tag),
            _ => None,
        }
    }

    fn tag_mut(&mut self) -> Option<&mut TagHeader> {
        let root = self.tree.root();
        match self.tree.body_mut(root) {
            Some(Id3Node::Tag(tag)) => Some(tag),
            _ => None,
        }
    }

    /// `(major, revision)`, e.g. `(4, 0)`
    pub fn version(&self) -> (u8, u8) {
        self.tag().map(|t| (t.major, t.revision)).unwrap_or((self.layout.major, 0))
    }

    pub fn tree(&self) -> &Tree<Id3Layout> {
        &self.tree
    }

    pub fn layout(&self) -> &Id3Layout {
        &self.layout
    }

    /// Decoded frames in tag order
    pub fn frames(&self) -> Vec<(FrameId, &Frame)> {
        self.tree
            .children(self.tree.root())
            .filter_map(|id| self.frame_at(id))
            .collect()
    }

    fn frame_at(&self, id: NodeId) -> Option<(FrameId, &Frame)> {
        let identifier = self.tree.header(id)?.identifier;
        match self.tree.body(id)? {
            Id3Node::Frame(frame) => Some((identifier, frame)),
            Id3Node::Tag(_) => None,
        }
    }

    /// Frames whose identifier matches a wildcard pattern such as `T*`
    pub fn frames_by_identifier(&self, pattern: &str) -> Result<Vec<(FrameId, &Frame)>> {
        let pattern = IdPattern::new(pattern)?;
        Ok(self.frames().into_iter().filter(|(id, _)| pattern.matches_id(id)).collect())
    }

    pub fn has_frame(&self, pattern: &str) -> Result<bool> {
        self.tree.has(self.tree.root(), pattern)
    }

    /// First frame named by alias (`title`) or identifier (`TIT2`)
    pub fn frame(&self, name: &str) -> Option<&Frame> {
        let id = self.tree.get_first_by_name(&self.layout, self.tree.root(), name)?;
        self.frame_at(id).map(|(_, frame)| frame)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.frame(name).and_then(|frame| frame.content.as_text())
    }

    /// Owner of the `GRID` registration for a frame's group byte
    pub fn group_owner(&self, group: u8) -> Option<&str> {
        self.frames().into_iter().find_map(|(_, frame)| match &frame.content {
            FrameContent::GroupRegistration { owner, group: symbol, .. } if *symbol == group => Some(owner.as_str()),
            _ => None,
        })
    }

    /// Owner of the `ENCR` registration for an encryption method byte
    pub fn encryption_owner(&self, method: u8) -> Option<&str> {
        self.frames().into_iter().find_map(|(_, frame)| match &frame.content {
            FrameContent::EncryptionMethod { owner, method: symbol, .. } if *symbol == method => Some(owner.as_str()),
            _ => None,
        })
    }

    /// Append a frame; `id` may be omitted when the content implies it
    pub fn add_frame(&mut self, id: Option<FrameId>, frame: Frame) -> Result<NodeId> {
        self.read_frames()?;
        let root = self.tree.root();
        self.tree.add(&self.layout, root, id, Id3Node::Frame(frame))
    }

    /// Replace every `id` frame with a single text frame
    pub fn set_text(&mut self, id: FrameId, value: &str) -> Result<NodeId> {
        if !id.is_text() {
            return Err(Error::invalid(format!("{} is not a text frame", id)));
        }
        self.remove_frames(&id.to_string())?;
        self.add_frame(Some(id), Frame::new(FrameContent::text(value)))
    }

    pub fn remove_frames(&mut self, pattern: &str) -> Result<usize> {
        self.read_frames()?;
        let root = self.tree.root();
        self.tree.remove_all(root, pattern)
    }

    /// Serialise the tag: extended header, frames, padding and optional footer
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.read_frames()?;
        let root = self.tree.root();
        let frames = self.tree.encode_children(&self.layout, root, None)?;
        let tag = self
            .tag()
            .cloned()
            .ok_or_else(|| Error::Configuration("ID3v2 tree lost its tag header".into()))?;
        let major = tag.major;

        let mut body = Vec::new();
        if let Some(extended) = &tag.extended {
            body.extend(extended.encode(major));
        }
        body.extend(frames);
        if !tag.flags.footer {
            body.resize(body.len() + tag.padding as usize, 0);
        }
        if tag.flags.unsynchronisation && major == 3 {
            body = unsynchronise(&body);
        }

        let mut out = Vec::with_capacity(body.len() + 2 * HEADER_LEN as usize);
        let size = HEADER_LEN + body.len() as u64;
        self.layout.write_header(&FrameId::TAG, Some(&Id3Node::Tag(tag.clone())), size, &mut out)?;
        let head = out.clone();
        out.extend(body);
        if tag.flags.footer {
            out.extend_from_slice(FOOTER_SIGNATURE);
            out.extend_from_slice(&head[3..]);
        }
        Ok(out)
    }

    /// Bytes the tag occupies at the start of the source, footer included
    pub fn total_size(&self) -> u64 {
        self.source_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3::frames::{frame_ids, LanguageText};
    use crate::utils::encoding::TextEncoding;
    use pretty_assertions::assert_eq;

    fn frame(id: &[u8; 4], body: &[u8], major: u8) -> Vec<u8> {
        let mut out = id.to_vec();
        if major >= 4 {
            out.extend_from_slice(&encode_syncsafe(body.len() as u32));
        } else {
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        }
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(body);
        out
    }

    fn tag(major: u8, flags: u8, size: u32, frames: &[Vec<u8>]) -> Vec<u8> {
        let mut out = b"ID3".to_vec();
        out.extend_from_slice(&[major, 0, flags]);
        out.extend_from_slice(&encode_syncsafe(size));
        for f in frames {
            out.extend_from_slice(f);
        }
        out
    }

    fn open(bytes: Vec<u8>) -> Result<Id3v2> {
        Id3v2::from_reader(Reader::from_bytes(bytes), Options::default())
    }

    #[test]
    fn test_three_frames_then_padding() {
        let frames = vec![
            frame(b"TIT2", b"\x00Title", 4),
            frame(b"TPE1", b"\x00Artist", 4),
            frame(b"TALB", b"\x00Album", 4),
        ];
        let used: usize = frames.iter().map(Vec::len).sum();
        let mut bytes = tag(4, 0, used as u32 + 20, &frames);
        bytes.extend_from_slice(&[0u8; 20]);
        bytes.extend_from_slice(b"audio");

        let mut id3 = open(bytes).unwrap();
        let mut seen = Vec::new();
        while let Some(id) = id3.next_frame().unwrap() {
            seen.push(id3.tree().header(id).unwrap().identifier.to_string());
        }
        assert_eq!(seen, vec!["TIT2", "TPE1", "TALB"]);
        assert_eq!(id3.next_frame().unwrap(), None);
        assert_eq!(id3.tag().unwrap().padding, 20);
        assert_eq!(id3.text("title").as_deref(), Some("Title"));
        assert_eq!(id3.text("TPE1").as_deref(), Some("Artist"));
    }

    #[test]
    fn test_tag_ending_mid_frame_is_malformed() {
        let frames = vec![frame(b"TIT2", b"\x00Title", 4), frame(b"TPE1", b"\x00Artist", 4)];
        let size = frames[0].len() + 8;
        let mut id3 = open(tag(4, 0, size as u32, &frames)).unwrap();
        assert!(id3.next_frame().unwrap().is_some());
        assert!(matches!(id3.next_frame(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_version_gate() {
        assert!(matches!(open(tag(2, 0, 0, &[])), Err(Error::UnsupportedVersion { .. })));
        assert!(matches!(open(tag(5, 0, 0, &[])), Err(Error::UnsupportedVersion { .. })));
        assert!(matches!(open(b"TAG1234567".to_vec()), Err(Error::SignatureMismatch { .. })));
        assert_eq!(open(tag(3, 0, 0, &[])).unwrap().version(), (3, 0));
    }

    #[test]
    fn test_v23_plain_frame_sizes() {
        // a size byte of 0x81 reads as 1 when taken as syncsafe
        let value = vec![b'x'; 0x80];
        let mut body = vec![0];
        body.extend_from_slice(&value);
        let frames = vec![frame(b"TIT2", &body, 3)];
        let mut id3 = open(tag(3, 0, frames[0].len() as u32, &frames)).unwrap();
        id3.read_frames().unwrap();
        assert_eq!(id3.text("title").map(|t| t.len()), Some(0x81 - 1));
    }

    #[test]
    fn test_v23_tag_unsynchronisation() {
        let clean = frame(b"TXXX", &[0, b'k', 0, 0xFF, 0xE0], 3);
        let stored = unsynchronise(&clean);
        assert_eq!(stored.len(), clean.len() + 1);
        let stored_len = stored.len() as u64;
        let mut id3 = open(tag(3, 0x80, stored.len() as u32, &[stored])).unwrap();
        assert_eq!(id3.total_size(), HEADER_LEN + stored_len);
        id3.read_frames().unwrap();
        let frames = id3.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, frame_ids::USER_TEXT);
    }

    #[test]
    fn test_v24_frame_flags() {
        // grouping byte 7, data length indicator, unsynchronised body
        let content = [0u8, b'a', 0xFF, 0x00, b'b'];
        let mut body = vec![7];
        body.extend_from_slice(&encode_syncsafe(4));
        body.extend_from_slice(&content);
        let mut raw = b"TIT2".to_vec();
        raw.extend_from_slice(&encode_syncsafe(body.len() as u32));
        raw.extend_from_slice(&0x0043u16.to_be_bytes());
        raw.extend_from_slice(&body);

        let mut id3 = open(tag(4, 0, raw.len() as u32, &[raw])).unwrap();
        id3.read_frames().unwrap();
        let frame = id3.frame("TIT2").unwrap();
        assert_eq!(frame.group, Some(7));
        assert!(frame.flags.data_length_indicator && frame.flags.unsynchronisation);
        assert_eq!(
            frame.content,
            FrameContent::Text {
                encoding: TextEncoding::Iso8859_1,
                values: vec!["a\u{ff}b".into()]
            }
        );
    }

    #[test]
    fn test_group_byte_resolves_to_registration() {
        let grid = frame(b"GRID", b"http://example.com\0\x07\x01\x02", 4);
        let mut grouped = b"TIT2".to_vec();
        grouped.extend_from_slice(&encode_syncsafe(3));
        grouped.extend_from_slice(&0x0040u16.to_be_bytes());
        grouped.extend_from_slice(&[7, 0, b'T']);
        let original = tag(4, 0, (grid.len() + grouped.len()) as u32, &[grid, grouped]);

        let mut id3 = open(original.clone()).unwrap();
        id3.read_frames().unwrap();
        let group = id3.frame("title").and_then(|f| f.group).unwrap();
        assert_eq!(id3.group_owner(group), Some("http://example.com"));
        assert_eq!(id3.group_owner(8), None);
        assert_eq!(id3.encryption_owner(7), None);
        assert!(matches!(
            &id3.frame("GRID").unwrap().content,
            FrameContent::GroupRegistration { data, .. } if data == &[1, 2]
        ));
        assert_eq!(id3.to_bytes().unwrap(), original);
    }

    #[test]
    fn test_compressed_frame_stays_opaque() {
        let mut raw = b"TIT2".to_vec();
        raw.extend_from_slice(&encode_syncsafe(3));
        raw.extend_from_slice(&0x0008u16.to_be_bytes());
        raw.extend_from_slice(&[1, 2, 3]);
        let original = tag(4, 0, raw.len() as u32, &[raw]);
        let mut id3 = open(original.clone()).unwrap();
        id3.read_frames().unwrap();
        assert_eq!(id3.frame("title").unwrap().content, FrameContent::Protected(vec![1, 2, 3]));
        assert_eq!(id3.to_bytes().unwrap(), original);
    }

    #[test]
    fn test_extended_header_and_footer() {
        let title = frame(b"TIT2", b"\x03T", 4);
        let mut body = vec![0, 0, 0, 6, 1, 0];
        body.extend_from_slice(&title);
        let mut bytes = tag(4, 0x50, body.len() as u32, &[body]);
        let mut footer = b"3DI".to_vec();
        footer.extend_from_slice(&bytes[3..10]);
        bytes.extend(footer);

        let mut id3 = open(bytes.clone()).unwrap();
        id3.read_frames().unwrap();
        assert!(id3.tag().unwrap().extended.is_some());
        assert_eq!(id3.text("title").as_deref(), Some("T"));
        assert_eq!(id3.total_size(), bytes.len() as u64);
        assert_eq!(id3.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_edit_and_re_encode() {
        let frames = vec![frame(b"TIT2", b"\x00Old", 3), frame(b"TPE1", b"\x00Who", 3)];
        let mut id3 = open(tag(3, 0, (frames[0].len() + frames[1].len()) as u32, &frames)).unwrap();
        id3.set_text(frame_ids::TITLE, "New").unwrap();
        id3.add_frame(
            None,
            Frame::new(FrameContent::Comment(LanguageText {
                encoding: TextEncoding::Iso8859_1,
                language: *b"eng",
                description: String::new(),
                text: "hi".into(),
            })),
        )
        .unwrap();
        assert!(id3.add_frame(None, Frame::new(FrameContent::text("x"))).is_err());

        let bytes = id3.to_bytes().unwrap();
        let mut reread = open(bytes).unwrap();
        reread.read_frames().unwrap();
        let ids: Vec<String> = reread.frames().iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["TPE1", "TIT2", "COMM"]);
        assert_eq!(reread.text("title").as_deref(), Some("New"));
        assert_eq!(reread.text("comment").as_deref(), Some("hi"));
        assert_eq!(reread.frames_by_identifier("T*").unwrap().len(), 2);
        assert!(reread.has_frame("COM?").unwrap());
    }

    #[test]
    fn test_grown_tag_encodes_twice() {
        let title = frame(b"TIT2", b"\x00Old", 3);
        let mut bytes = tag(3, 0, title.len() as u32, &[title]);
        let tag_len = bytes.len() as u64;
        let mut audio = 0xFFFB_9064u32.to_be_bytes().to_vec();
        audio.resize(417, 0);
        bytes.extend(audio);

        let mut id3 = open(bytes).unwrap();
        id3.set_text(frame_ids::TITLE, "A much longer title").unwrap();
        let first = id3.to_bytes().unwrap();
        let second = id3.to_bytes().unwrap();
        assert_eq!(first, second);
        assert!(!id3.has_frames());
        assert_eq!(id3.frames().len(), 1);
        assert_eq!(id3.total_size(), tag_len);

        let mut reread = open(second).unwrap();
        reread.read_frames().unwrap();
        assert_eq!(reread.text("title").as_deref(), Some("A much longer title"));
    }
}
