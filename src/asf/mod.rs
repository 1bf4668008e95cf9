// Advanced Systems Format (WMA/WMV) object trees
//
// Every object starts with a 16-byte GUID and a 64-bit little-endian total
// length. The Header object nests the descriptive objects; the Header
// Extension object is transparent, so its nested objects (Metadata, Metadata
// Library and friends) are exposed as children of the Header object.

pub mod guids;
pub mod objects;
pub mod stream;

pub use objects::{
    AsfObject, AttributeValue, BitrateRecord, CodecEntry, CodecKind, CodecList, Command, ContentDescription,
    ExtendedContentDescription, FileProperties, HeaderObject, Marker, MarkerEntry, Metadata, MetadataRecord,
    ScriptCommand, StreamBitrateProperties,
};
pub use stream::{ErrorCorrection, StreamProperties, TypeSpecificData};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::tree::{Decoded, Decoder, EncodeContext, Format, Header, NodeId, Registry, Tree, Wrapper};
use crate::utils::guid::Guid;
use crate::utils::io::Reader;
use log::{debug, warn};
use std::path::Path;

/// GUID plus 64-bit size
pub const OBJECT_HEADER_LEN: u64 = 24;

/// Reserved GUID, reserved word and data size ahead of the nested objects
pub const HEADER_EXTENSION_PREAMBLE: u64 = 22;

/// ASF object layout and decoder table
#[derive(Debug)]
pub struct AsfLayout {
    registry: Registry<AsfLayout>,
}

impl Default for AsfLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl AsfLayout {
    pub fn new() -> Self {
        let registry = Registry::new(decode_opaque)
            .register(guids::HEADER, decode_header)
            .register(guids::FILE_PROPERTIES, decode_file_properties)
            .register(guids::STREAM_PROPERTIES, decode_stream_properties)
            .register(guids::CODEC_LIST, decode_codec_list)
            .register(guids::CONTENT_DESCRIPTION, decode_content_description)
            .register(guids::EXTENDED_CONTENT_DESCRIPTION, decode_extended_content_description)
            .register(guids::STREAM_BITRATE_PROPERTIES, decode_stream_bitrate_properties)
            .register_all([guids::METADATA, guids::METADATA_LIBRARY], decode_metadata)
            .register(guids::PADDING, decode_padding)
            .register(guids::MARKER, decode_marker)
            .register(guids::SCRIPT_COMMAND, decode_script_command)
            .splice(guids::HEADER_EXTENSION, HEADER_EXTENSION_PREAMBLE);
        Self { registry }
    }
}

fn decode_opaque(dec: &mut Decoder<'_, AsfLayout>, header: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    Ok(Decoded::leaf(AsfObject::Opaque(dec.span(header))))
}

fn decode_header(dec: &mut Decoder<'_, AsfLayout>, header: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    let reader = dec.reader();
    let count = reader.read_le_u32()?;
    let preamble = HeaderObject {
        reserved1: reader.read_u8()?,
        reserved2: reader.read_u8()?,
    };
    let children = dec.decode_children(header)?;
    debug!("ASF: header declares {} objects, decoded {} nodes", count, children.len());
    Ok(Decoded::container(AsfObject::Header(preamble), children))
}

fn decode_file_properties(dec: &mut Decoder<'_, AsfLayout>, _: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    let body = FileProperties::read(dec.reader())?;
    Ok(Decoded::leaf(AsfObject::FileProperties(body)))
}

fn decode_stream_properties(dec: &mut Decoder<'_, AsfLayout>, _: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    let body = StreamProperties::read(dec.reader())?;
    Ok(Decoded::leaf(AsfObject::StreamProperties(body)))
}

fn decode_codec_list(dec: &mut Decoder<'_, AsfLayout>, _: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    let body = CodecList::read(dec.reader())?;
    Ok(Decoded::leaf(AsfObject::CodecList(body)))
}

fn decode_content_description(dec: &mut Decoder<'_, AsfLayout>, _: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    let body = ContentDescription::read(dec.reader())?;
    Ok(Decoded::leaf(AsfObject::ContentDescription(body)))
}

fn decode_extended_content_description(
    dec: &mut Decoder<'_, AsfLayout>,
    _: &Header<Guid>,
) -> Result<Decoded<AsfLayout>> {
    let body = ExtendedContentDescription::read(dec.reader())?;
    Ok(Decoded::leaf(AsfObject::ExtendedContentDescription(body)))
}

fn decode_stream_bitrate_properties(
    dec: &mut Decoder<'_, AsfLayout>,
    _: &Header<Guid>,
) -> Result<Decoded<AsfLayout>> {
    let body = StreamBitrateProperties::read(dec.reader())?;
    Ok(Decoded::leaf(AsfObject::StreamBitrateProperties(body)))
}

fn decode_metadata(dec: &mut Decoder<'_, AsfLayout>, header: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    let library = header.identifier == guids::METADATA_LIBRARY;
    let body = Metadata::read(dec.reader(), library)?;
    Ok(Decoded::leaf(AsfObject::Metadata(body)))
}

fn decode_marker(dec: &mut Decoder<'_, AsfLayout>, _: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    let body = Marker::read(dec.reader())?;
    Ok(Decoded::leaf(AsfObject::Marker(body)))
}

fn decode_script_command(dec: &mut Decoder<'_, AsfLayout>, _: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    let body = ScriptCommand::read(dec.reader())?;
    Ok(Decoded::leaf(AsfObject::ScriptCommand(body)))
}

fn decode_padding(_: &mut Decoder<'_, AsfLayout>, header: &Header<Guid>) -> Result<Decoded<AsfLayout>> {
    Ok(Decoded::leaf(AsfObject::Padding(header.body_len())))
}

impl Format for AsfLayout {
    type Id = Guid;
    type Body = AsfObject;
    const NAME: &'static str = "ASF";

    fn registry(&self) -> &Registry<Self> {
        &self.registry
    }

    fn read_header(&self, reader: &mut Reader, _end: u64) -> Result<Header<Guid>> {
        let offset = reader.tell();
        let identifier = reader.read_guid()?;
        let size = reader.read_le_u64()?;
        Ok(Header::new(offset, identifier, size, OBJECT_HEADER_LEN))
    }

    fn header_len(&self, _identifier: &Guid, _body_len: u64) -> u64 {
        OBJECT_HEADER_LEN
    }

    fn write_header(&self, identifier: &Guid, _body: Option<&AsfObject>, size: u64, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&identifier.to_ms_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        Ok(())
    }

    fn encode_body(&self, body: &AsfObject, cx: &mut EncodeContext<'_>, out: &mut Vec<u8>) -> Result<()> {
        match body {
            AsfObject::File => {}
            AsfObject::Header(preamble) => {
                let count = u32::try_from(cx.child_count)
                    .map_err(|_| Error::invalid("too many header objects"))?;
                out.extend_from_slice(&count.to_le_bytes());
                out.push(preamble.reserved1);
                out.push(preamble.reserved2);
            }
            AsfObject::FileProperties(p) => p.write(out),
            AsfObject::StreamProperties(p) => p.write(out),
            AsfObject::CodecList(p) => p.write(out),
            AsfObject::ContentDescription(p) => p.write(out),
            AsfObject::ExtendedContentDescription(p) => p.write(out),
            AsfObject::StreamBitrateProperties(p) => p.write(out),
            AsfObject::Metadata(p) => p.write(out),
            AsfObject::Marker(p) => p.write(out)?,
            AsfObject::ScriptCommand(p) => p.write(out)?,
            AsfObject::Padding(len) => out.resize(out.len() + *len as usize, 0),
            AsfObject::Opaque(span) => out.extend(cx.load(span)?),
        }
        Ok(())
    }

    /// Header Extension: the data size at the end of the preamble covers the nested objects
    fn encode_wrapper(&self, wrapper: &Wrapper<Guid>, content: Vec<u8>, out: &mut Vec<u8>) -> Result<()> {
        let mut preamble = wrapper.preamble.clone();
        if wrapper.identifier == guids::HEADER_EXTENSION && preamble.len() == HEADER_EXTENSION_PREAMBLE as usize {
            let data_size = u32::try_from(content.len())
                .map_err(|_| Error::invalid("header extension data exceeds 4 GiB"))?;
            preamble[18..22].copy_from_slice(&data_size.to_le_bytes());
        }
        let size = OBJECT_HEADER_LEN + (preamble.len() + content.len()) as u64;
        self.write_header(&wrapper.identifier, None, size, out)?;
        out.extend(preamble);
        out.extend(content);
        Ok(())
    }

    fn identify(&self, body: &AsfObject) -> Option<Guid> {
        body.guid()
    }

    fn resolve_alias(&self, name: &str) -> Option<Guid> {
        guids::by_name(name)
    }
}

/// An ASF source and the objects decoded from it so far.
///
/// Top-level objects are decoded one at a time with [`Asf::next_object`];
/// [`Asf::read`] decodes just the Header object, which carries all metadata.
#[derive(Debug)]
pub struct Asf {
    reader: Reader,
    layout: AsfLayout,
    tree: Tree<AsfLayout>,
    options: Options,
}

impl Asf {
    /// Open `path` and decode its Header object
    pub fn read<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let mut asf = Self::open(path, options)?;
        asf.next_object()?;
        Ok(asf)
    }

    /// Open `path` without decoding anything yet
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        Self::from_reader(Reader::open(path)?, options)
    }

    pub fn from_reader(mut reader: Reader, options: Options) -> Result<Self> {
        options.validate()?;
        let start = reader.tell();
        if !reader.check_signature(&guids::HEADER.to_ms_bytes())? {
            return Err(Error::signature("ASF", "source does not start with a Header Object"));
        }
        let root = Header::new(start, Guid::NIL, reader.size() - start, 0);
        Ok(Self {
            reader,
            layout: AsfLayout::new(),
            tree: Tree::new(root, AsfObject::File),
            options,
        })
    }

    pub fn has_objects(&self) -> bool {
        self.reader.tell() < self.tree.source_end()
    }

    /// Decode the next top-level object; `None` once the source is exhausted
    pub fn next_object(&mut self) -> Result<Option<NodeId>> {
        let mut decoder = Decoder::new(&self.layout, &mut self.reader, &mut self.tree, &self.options);
        decoder.decode_next(true)
    }

    /// Decode every remaining top-level object
    pub fn read_to_end(&mut self) -> Result<()> {
        while self.next_object()?.is_some() {}
        Ok(())
    }

    pub fn tree(&self) -> &Tree<AsfLayout> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree<AsfLayout> {
        &mut self.tree
    }

    pub fn layout(&self) -> &AsfLayout {
        &self.layout
    }

    /// The Header object, once decoded
    pub fn header(&self) -> Option<NodeId> {
        self.tree.get_first(self.tree.root(), &guids::HEADER)
    }

    /// First object inside the Header object carrying `name`, e.g. `contentDescription`
    pub fn object(&self, name: &str) -> Option<&AsfObject> {
        let header = self.header()?;
        let id = self.tree.get_first_by_name(&self.layout, header, name)?;
        self.tree.body(id)
    }

    fn header_objects(&self, guid: Guid) -> Vec<&AsfObject> {
        let Some(header) = self.header() else {
            return Vec::new();
        };
        self.tree
            .children(header)
            .filter(|&id| self.tree.header(id).is_some_and(|h| h.identifier == guid))
            .filter_map(|id| self.tree.body(id))
            .collect()
    }

    pub fn file_properties(&self) -> Option<&FileProperties> {
        self.header_objects(guids::FILE_PROPERTIES).into_iter().find_map(|body| match body {
            AsfObject::FileProperties(p) => Some(p),
            _ => None,
        })
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.header_objects(guids::MARKER).into_iter().find_map(|body| match body {
            AsfObject::Marker(p) => Some(p),
            _ => None,
        })
    }

    pub fn script_command(&self) -> Option<&ScriptCommand> {
        self.header_objects(guids::SCRIPT_COMMAND).into_iter().find_map(|body| match body {
            AsfObject::ScriptCommand(p) => Some(p),
            _ => None,
        })
    }

    pub fn content_description(&self) -> Option<&ContentDescription> {
        self.header_objects(guids::CONTENT_DESCRIPTION).into_iter().find_map(|body| match body {
            AsfObject::ContentDescription(p) => Some(p),
            _ => None,
        })
    }

    pub fn extended_content_description(&self) -> Option<&ExtendedContentDescription> {
        self.header_objects(guids::EXTENDED_CONTENT_DESCRIPTION).into_iter().find_map(|body| match body {
            AsfObject::ExtendedContentDescription(p) => Some(p),
            _ => None,
        })
    }

    pub fn stream_properties(&self) -> Vec<&StreamProperties> {
        self.header_objects(guids::STREAM_PROPERTIES)
            .into_iter()
            .filter_map(|body| match body {
                AsfObject::StreamProperties(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Records from the Metadata and Metadata Library objects
    pub fn metadata_records(&self) -> Vec<&MetadataRecord> {
        self.header_objects(guids::METADATA)
            .into_iter()
            .chain(self.header_objects(guids::METADATA_LIBRARY))
            .filter_map(|body| match body {
                AsfObject::Metadata(m) => Some(m.records.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Append an object built in memory to the Header object
    pub fn add_object(&mut self, body: AsfObject) -> Result<NodeId> {
        let header = self
            .header()
            .ok_or_else(|| Error::Configuration("the Header object has not been decoded".into()))?;
        self.tree.add(&self.layout, header, None, body)
    }

    /// Serialise the Header object, re-reading unparsed bodies from the source
    pub fn encode_header(&mut self) -> Result<Vec<u8>> {
        let header = self
            .header()
            .ok_or_else(|| Error::Configuration("the Header object has not been decoded".into()))?;
        let old = self.tree.header(header).map(|h| h.size).unwrap_or(0);
        let bytes = self.tree.encode(&self.layout, header, Some(&mut self.reader))?;
        if bytes.len() as u64 != old {
            warn!("ASF: header object resized from {} to {} bytes", old, bytes.len());
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ByteSpan;
    use pretty_assertions::assert_eq;

    fn object(guid: Guid, body: &[u8]) -> Vec<u8> {
        let mut out = guid.to_ms_bytes().to_vec();
        out.extend_from_slice(&(OBJECT_HEADER_LEN + body.len() as u64).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn header_object(count: u32, children: &[Vec<u8>]) -> Vec<u8> {
        let mut body = count.to_le_bytes().to_vec();
        body.extend_from_slice(&[1, 2]);
        for child in children {
            body.extend_from_slice(child);
        }
        object(guids::HEADER, &body)
    }

    fn file_properties_object() -> Vec<u8> {
        let props = FileProperties {
            file_size: 1_000,
            play_duration: 30_000_000,
            flags: FileProperties::SEEKABLE,
            ..Default::default()
        };
        let mut body = Vec::new();
        props.write(&mut body);
        object(guids::FILE_PROPERTIES, &body)
    }

    fn open(bytes: Vec<u8>) -> Asf {
        Asf::from_reader(Reader::from_bytes(bytes), Options::default()).unwrap()
    }

    #[test]
    fn test_header_with_file_properties() {
        let data = object(guids::DATA, &[0u8; 26]);
        let mut bytes = header_object(1, &[file_properties_object()]);
        bytes.extend_from_slice(&data);
        let mut asf = open(bytes);

        let header = asf.next_object().unwrap().unwrap();
        assert_eq!(asf.tree().children(header).count(), 1);
        assert_eq!(asf.file_properties().map(|p| p.file_size), Some(1_000));
        assert!(asf.has_objects());

        let data = asf.next_object().unwrap().unwrap();
        assert_eq!(
            asf.tree().body(data),
            Some(&AsfObject::Opaque(ByteSpan::Source {
                offset: 30 + 104 + 24,
                len: 26
            }))
        );
        assert!(!asf.has_objects());
        assert_eq!(asf.next_object().unwrap(), None);
    }

    #[test]
    fn test_rejects_non_asf_source() {
        let result = Asf::from_reader(Reader::from_bytes(vec![0u8; 64]), Options::default());
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));
    }

    #[test]
    fn test_content_description_round_trip() {
        let mut asf = open(header_object(0, &[]));
        asf.next_object().unwrap();
        asf.add_object(AsfObject::ContentDescription(ContentDescription {
            title: "T".into(),
            author: "A".into(),
            ..Default::default()
        }))
        .unwrap();
        let bytes = asf.encode_header().unwrap();
        assert_eq!(&bytes[24..28], &1u32.to_le_bytes());

        let mut reread = open(bytes);
        reread.next_object().unwrap();
        let description = reread.content_description().unwrap();
        assert_eq!(description.title, "T");
        assert_eq!(description.author, "A");
        assert_eq!(description.copyright, "");
    }

    #[test]
    fn test_read_to_end_after_grown_header() {
        let mut bytes = header_object(0, &[]);
        let header_len = bytes.len() as u64;
        bytes.extend_from_slice(&object(guids::DATA, &[0u8; 26]));
        let mut asf = open(bytes);
        asf.next_object().unwrap();
        asf.add_object(AsfObject::ContentDescription(ContentDescription {
            title: "Grown".into(),
            ..Default::default()
        }))
        .unwrap();
        let encoded = asf.encode_header().unwrap();
        assert!(encoded.len() as u64 > header_len);

        asf.read_to_end().unwrap();
        let root = asf.tree().root();
        let data = asf.tree().get_first(root, &guids::DATA).unwrap();
        assert_eq!(asf.tree().header(data).unwrap().offset, Some(header_len));
        assert!(!asf.has_objects());
    }

    #[test]
    fn test_marker_and_script_command_objects() {
        let marker = Marker {
            name: "Chapters".into(),
            entries: vec![MarkerEntry {
                presentation_time: 10_000_000,
                description: "One".into(),
                ..Default::default()
            }],
        };
        let script = ScriptCommand {
            types: vec!["URL".into()],
            commands: vec![Command {
                presentation_time: 250,
                type_index: 0,
                name: "http://example.com/".into(),
            }],
        };
        let mut body = Vec::new();
        marker.write(&mut body).unwrap();
        let marker_object = object(guids::MARKER, &body);
        let mut body = Vec::new();
        script.write(&mut body).unwrap();
        let script_object = object(guids::SCRIPT_COMMAND, &body);

        let original = header_object(2, &[marker_object, script_object]);
        let mut asf = open(original.clone());
        asf.next_object().unwrap();
        assert_eq!(asf.marker(), Some(&marker));
        assert_eq!(asf.script_command(), Some(&script));
        assert!(matches!(asf.object("scriptCommand"), Some(AsfObject::ScriptCommand(_))));
        assert_eq!(asf.encode_header().unwrap(), original);
    }

    #[test]
    fn test_header_extension_is_transparent() {
        let metadata = Metadata {
            library: false,
            records: vec![MetadataRecord::new(0, "WM/Year", AttributeValue::Unicode("2009".into())).unwrap()],
        };
        let mut body = Vec::new();
        metadata.write(&mut body);
        let nested = object(guids::METADATA, &body);

        let mut preamble = guids::RESERVED_1.to_ms_bytes().to_vec();
        preamble.extend_from_slice(&6u16.to_le_bytes());
        preamble.extend_from_slice(&(nested.len() as u32).to_le_bytes());
        preamble.extend_from_slice(&nested);
        let extension = object(guids::HEADER_EXTENSION, &preamble);

        let original = header_object(2, &[file_properties_object(), extension]);
        let mut asf = open(original.clone());
        let header = asf.next_object().unwrap().unwrap();

        let children: Vec<NodeId> = asf.tree().children(header).collect();
        assert_eq!(children.len(), 2);
        assert_eq!(asf.tree().header(children[1]).map(|h| h.identifier), Some(guids::METADATA));
        assert!(asf.tree().wrapper(children[1]).is_some());
        assert_eq!(asf.metadata_records().len(), 1);
        assert!(!asf.tree().has(header, &guids::HEADER_EXTENSION.to_string()).unwrap());

        assert_eq!(asf.encode_header().unwrap(), original);
    }

    #[test]
    fn test_lookup_by_alias_and_wildcard() {
        let mut asf = open(header_object(1, &[file_properties_object()]));
        let header = asf.next_object().unwrap().unwrap();
        assert!(matches!(asf.object("fileProperties"), Some(AsfObject::FileProperties(_))));
        assert!(matches!(asf.object("FILE_PROPERTIES"), Some(AsfObject::FileProperties(_))));
        assert!(asf.object("contentDescription").is_none());
        // GUID identifiers match case-insensitively
        assert!(asf.tree().has(header, "8CABDCA1-*").unwrap());
    }

    #[test]
    fn test_overlong_top_level_object_is_clamped() {
        let mut bytes = header_object(1, &[file_properties_object()]);
        let declared = bytes.len() as u64 + 100;
        bytes[16..24].copy_from_slice(&declared.to_le_bytes());
        let mut asf = open(bytes.clone());
        let header = asf.next_object().unwrap().unwrap();
        assert_eq!(asf.tree().header(header).map(|h| h.size), Some(bytes.len() as u64));
        assert!(!asf.has_objects());
    }

    #[test]
    fn test_nested_overrun_is_malformed() {
        let mut child = file_properties_object();
        child[16..24].copy_from_slice(&500u64.to_le_bytes());
        let mut asf = open(header_object(1, &[child]));
        assert!(matches!(asf.next_object(), Err(Error::Malformed { .. })));
    }
}
