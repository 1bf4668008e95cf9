// ISO/IEC 14496-12 box trees (MP4, M4A, MOV)
//
// A box is a 32-bit big-endian size and a FourCC, optionally followed by a
// 64-bit size (when the 32-bit size is 1) and a 16-byte extended type (for
// `uuid` boxes). A size of 0 runs to the end of the enclosing box. The file
// itself is modelled as a root box named `file` spanning every byte.

pub mod boxes;

pub use boxes::{
    box_types, data_types, BoxType, ChunkRun, FileType, FullBox, Handler, IsoBox, ItemData, MovieHeader, SampleSizes,
    SampleToChunk,
};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::field_mapping::{FieldMappings, StandardField, ValueConverter};
use crate::tree::{Decoded, Decoder, EncodeContext, Format, Header, NodeId, Registry, Tree};
use crate::utils::guid::Guid;
use crate::utils::io::Reader;
use log::debug;
use std::path::Path;

/// Size and type
pub const BOX_HEADER_LEN: u64 = 8;
const LARGE_SIZE_LEN: u64 = 8;
const EXTENDED_TYPE_LEN: u64 = 16;

/// Box layout plus the decoder tables for the main tree and the iTunes item list
#[derive(Debug)]
pub struct IsoLayout {
    registry: Registry<IsoLayout>,
    /// Children of `ilst`: every box is an item container
    items: Registry<IsoLayout>,
    /// Children of an item container
    item_fields: Registry<IsoLayout>,
}

impl Default for IsoLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl IsoLayout {
    pub fn new() -> Self {
        let registry = Registry::new(decode_opaque)
            .register_all(box_types::CONTAINERS, decode_container)
            .register(box_types::META, decode_meta)
            .register(box_types::ILST, decode_item_list)
            .register(box_types::FTYP, decode_file_type)
            .register(box_types::MVHD, decode_movie_header)
            .register(box_types::HDLR, decode_handler)
            .register(box_types::STSZ, decode_sample_sizes)
            .register(box_types::STSC, decode_sample_to_chunk);
        let items = Registry::new(decode_item);
        let item_fields = Registry::new(decode_opaque)
            .register(box_types::DATA, decode_data)
            .register_all([box_types::MEAN, box_types::NAME], decode_label);
        Self {
            registry,
            items,
            item_fields,
        }
    }
}

type IsoDecoder<'a> = Decoder<'a, IsoLayout>;

fn decode_opaque(dec: &mut IsoDecoder<'_>, header: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    Ok(Decoded::leaf(IsoBox::Opaque(dec.span(header))))
}

fn decode_container(dec: &mut IsoDecoder<'_>, header: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    let children = dec.decode_children(header)?;
    Ok(Decoded::container(IsoBox::Container, children))
}

/// `meta` is a full box, except in QuickTime files where `hdlr` follows the header directly
fn decode_meta(dec: &mut IsoDecoder<'_>, header: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    let probe = dec.reader().peek(8)?;
    let full = if probe.len() == 8 && &probe[4..8] == b"hdlr" {
        debug!("ISO14496: QuickTime style meta box at {}", header.start());
        None
    } else {
        Some(FullBox::read(dec.reader())?)
    };
    let children = dec.decode_children(header)?;
    Ok(Decoded::container(IsoBox::Meta(full), children))
}

fn decode_item_list(dec: &mut IsoDecoder<'_>, header: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    let format = dec.format();
    let children = dec.decode_children_with(header, &format.items)?;
    Ok(Decoded::container(IsoBox::Container, children))
}

fn decode_item(dec: &mut IsoDecoder<'_>, header: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    let format = dec.format();
    let children = dec.decode_children_with(header, &format.item_fields)?;
    Ok(Decoded::container(IsoBox::Container, children))
}

fn decode_data(dec: &mut IsoDecoder<'_>, _: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    Ok(Decoded::leaf(IsoBox::Data(ItemData::read(dec.reader())?)))
}

fn decode_label(dec: &mut IsoDecoder<'_>, _: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    let full = FullBox::read(dec.reader())?;
    let text = dec.rest()?;
    Ok(Decoded::leaf(IsoBox::Label(full, String::from_utf8_lossy(&text).into_owned())))
}

fn decode_file_type(dec: &mut IsoDecoder<'_>, _: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    Ok(Decoded::leaf(IsoBox::FileType(FileType::read(dec.reader())?)))
}

fn decode_movie_header(dec: &mut IsoDecoder<'_>, _: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    Ok(Decoded::leaf(IsoBox::MovieHeader(MovieHeader::read(dec.reader())?)))
}

fn decode_handler(dec: &mut IsoDecoder<'_>, _: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    Ok(Decoded::leaf(IsoBox::Handler(Handler::read(dec.reader())?)))
}

fn decode_sample_sizes(dec: &mut IsoDecoder<'_>, _: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    Ok(Decoded::leaf(IsoBox::SampleSizes(SampleSizes::read(dec.reader())?)))
}

fn decode_sample_to_chunk(dec: &mut IsoDecoder<'_>, _: &Header<BoxType>) -> Result<Decoded<IsoLayout>> {
    Ok(Decoded::leaf(IsoBox::SampleToChunk(SampleToChunk::read(dec.reader())?)))
}

impl Format for IsoLayout {
    type Id = BoxType;
    type Body = IsoBox;
    const NAME: &'static str = "ISO14496";

    fn registry(&self) -> &Registry<Self> {
        &self.registry
    }

    fn read_header(&self, reader: &mut Reader, end: u64) -> Result<Header<BoxType>> {
        let offset = reader.tell();
        let size32 = reader.read_be_u32()?;
        let code = reader.read_array::<4>()?;
        let mut header_len = BOX_HEADER_LEN;
        let size = match size32 {
            0 => end.saturating_sub(offset),
            1 => {
                header_len += LARGE_SIZE_LEN;
                reader.read_be_u64()?
            }
            n => u64::from(n),
        };
        let identifier = if &code == b"uuid" {
            header_len += EXTENDED_TYPE_LEN;
            BoxType::Uuid(Guid::from_be_bytes(reader.read_array::<16>()?))
        } else {
            BoxType::FourCc(code)
        };
        Ok(Header::new(offset, identifier, size, header_len))
    }

    fn header_len(&self, identifier: &BoxType, body_len: u64) -> u64 {
        let mut len = BOX_HEADER_LEN;
        if matches!(identifier, BoxType::Uuid(_)) {
            len += EXTENDED_TYPE_LEN;
        }
        if len + body_len > u64::from(u32::MAX) {
            len += LARGE_SIZE_LEN;
        }
        len
    }

    fn write_header(&self, identifier: &BoxType, _body: Option<&IsoBox>, size: u64, out: &mut Vec<u8>) -> Result<()> {
        let large = size > u64::from(u32::MAX);
        let size32 = if large { 1 } else { size as u32 };
        out.extend_from_slice(&size32.to_be_bytes());
        out.extend_from_slice(&identifier.type_bytes());
        if large {
            out.extend_from_slice(&size.to_be_bytes());
        }
        if let BoxType::Uuid(guid) = identifier {
            out.extend_from_slice(&guid.to_be_bytes());
        }
        Ok(())
    }

    fn encode_body(&self, body: &IsoBox, cx: &mut EncodeContext<'_>, out: &mut Vec<u8>) -> Result<()> {
        match body {
            IsoBox::File | IsoBox::Container | IsoBox::Meta(None) => {}
            IsoBox::Meta(Some(full)) => full.write(out),
            IsoBox::FileType(b) => b.write(out),
            IsoBox::MovieHeader(b) => b.write(out),
            IsoBox::Handler(b) => b.write(out),
            IsoBox::SampleSizes(b) => b.write(out),
            IsoBox::SampleToChunk(b) => b.write(out),
            IsoBox::Data(b) => b.write(out),
            IsoBox::Label(full, text) => {
                full.write(out);
                out.extend_from_slice(text.as_bytes());
            }
            IsoBox::Opaque(span) => out.extend(cx.load(span)?),
        }
        Ok(())
    }

    fn identify(&self, body: &IsoBox) -> Option<BoxType> {
        body.box_type()
    }

    fn resolve_alias(&self, name: &str) -> Option<BoxType> {
        box_types::by_name(name)
    }
}

/// Whether the first eight bytes look like a box header
pub(crate) fn plausible_box(probe: &[u8]) -> bool {
    if probe.len() < 8 {
        return false;
    }
    let size = u32::from_be_bytes([probe[0], probe[1], probe[2], probe[3]]);
    let printable = probe[4..8].iter().all(|&b| (0x20..0x7F).contains(&b) || b == 0xA9);
    printable && (size <= 1 || u64::from(size) >= BOX_HEADER_LEN)
}

/// An ISO base media file and the boxes decoded from it so far
#[derive(Debug)]
pub struct Iso14496 {
    reader: Reader,
    layout: IsoLayout,
    tree: Tree<IsoLayout>,
    options: Options,
}

impl Iso14496 {
    /// Open `path` and decode the whole box tree
    pub fn read<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let mut iso = Self::open(path, options)?;
        iso.read_to_end()?;
        Ok(iso)
    }

    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        Self::from_reader(Reader::open(path)?, options)
    }

    /// Any well-formed first box is accepted; `ftyp` is customary but not required
    pub fn from_reader(mut reader: Reader, options: Options) -> Result<Self> {
        options.validate()?;
        let start = reader.tell();
        if !plausible_box(&reader.peek(8)?) {
            return Err(Error::signature("ISO14496", "source does not start with a box header"));
        }
        let root = Header::new(start, box_types::FILE, reader.size() - start, 0);
        Ok(Self {
            reader,
            layout: IsoLayout::new(),
            tree: Tree::new(root, IsoBox::File),
            options,
        })
    }

    pub fn has_boxes(&self) -> bool {
        self.reader.tell() < self.tree.source_end()
    }

    /// Decode the next top-level box with everything nested in it
    pub fn next_box(&mut self) -> Result<Option<NodeId>> {
        let mut decoder = Decoder::new(&self.layout, &mut self.reader, &mut self.tree, &self.options);
        decoder.decode_next(true)
    }

    pub fn read_to_end(&mut self) -> Result<()> {
        while self.next_box()?.is_some() {}
        Ok(())
    }

    pub fn tree(&self) -> &Tree<IsoLayout> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree<IsoLayout> {
        &mut self.tree
    }

    pub fn layout(&self) -> &IsoLayout {
        &self.layout
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Follow a slash separated path of names or FourCCs from the root, e.g. `moov/udta/meta/ilst`
    pub fn path(&self, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self.tree.root(), |node, part| {
                self.tree.get_first_by_name(&self.layout, node, part)
            })
    }

    /// Every decoded box whose type matches `pattern`, depth first
    pub fn boxes(&self, pattern: &str) -> Result<Vec<NodeId>> {
        self.tree.find(pattern)
    }

    pub fn file_type(&self) -> Option<&FileType> {
        match self.tree.body(self.path("ftyp")?)? {
            IsoBox::FileType(f) => Some(f),
            _ => None,
        }
    }

    pub fn movie_header(&self) -> Option<&MovieHeader> {
        match self.tree.body(self.path("moov/mvhd")?)? {
            IsoBox::MovieHeader(h) => Some(h),
            _ => None,
        }
    }

    /// Presentation length in seconds from `mvhd`
    pub fn movie_duration(&self) -> Option<f64> {
        self.movie_header()?.duration_seconds()
    }

    /// The iTunes item list, under `udta/meta` or directly under `moov/meta`
    pub fn item_list(&self) -> Option<NodeId> {
        self.path("moov/udta/meta/ilst").or_else(|| self.path("moov/meta/ilst"))
    }

    /// First `data` value of an item such as `©nam`
    pub fn item(&self, item: &BoxType) -> Option<&ItemData> {
        let entry = self.tree.get_first(self.item_list()?, item)?;
        match self.tree.body(self.tree.get_first(entry, &box_types::DATA)?)? {
            IsoBox::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Every item with its first value, in file order
    pub fn items(&self) -> Vec<(BoxType, &ItemData)> {
        let Some(list) = self.item_list() else {
            return Vec::new();
        };
        self.tree
            .children(list)
            .filter_map(|entry| {
                let identifier = self.tree.header(entry)?.identifier;
                match self.tree.body(self.tree.get_first(entry, &box_types::DATA)?)? {
                    IsoBox::Data(data) => Some((identifier, data)),
                    _ => None,
                }
            })
            .collect()
    }

    pub fn item_text(&self, item: &BoxType) -> Option<String> {
        self.item(item)?.as_text()
    }

    /// A standard field rendered as text
    pub fn field_text(&self, field: StandardField) -> Option<String> {
        let item = BoxType::FourCc(FieldMappings::to_mp4(field));
        match field {
            StandardField::Track | StandardField::Disc => {
                let (number, total) = self.item(&item)?.as_index_pair()?;
                Some(if total > 0 {
                    format!("{}/{}", number, total)
                } else {
                    number.to_string()
                })
            }
            StandardField::Genre => self.item_text(&item).or_else(|| {
                // `gnre` holds an ID3v1 genre index plus one
                let index = self.item(&BoxType::FourCc(*b"gnre"))?.as_integer()?;
                let id = u8::try_from(index.checked_sub(1)?).ok()?;
                ValueConverter::parse_genre_id3v1(id).map(str::to_string)
            }),
            StandardField::Cover => None,
            _ => self.item_text(&item),
        }
    }

    /// `(mime type, image bytes)` of the first cover image
    pub fn cover(&self) -> Option<(&'static str, &[u8])> {
        let data = self.item(&box_types::by_name("covr")?)?;
        Some((data.image_mime().unwrap_or("application/octet-stream"), &data.payload))
    }

    /// Replace every value of `item` with one UTF-8 text value
    pub fn set_item_text(&mut self, item: BoxType, text: &str) -> Result<NodeId> {
        let list = self
            .item_list()
            .ok_or_else(|| Error::Configuration("file has no iTunes item list".into()))?;
        while let Some(existing) = self.tree.get_first(list, &item) {
            self.tree.remove(list, existing);
        }
        let entry = self.tree.add(&self.layout, list, Some(item), IsoBox::Container)?;
        self.tree.add(&self.layout, entry, None, IsoBox::Data(ItemData::text(text)))?;
        Ok(entry)
    }

    /// Serialise every top-level box, re-reading unparsed bodies from the source
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let root = self.tree.root();
        self.tree.encode_children(&self.layout, root, Some(&mut self.reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ByteSpan;
    use pretty_assertions::assert_eq;

    fn boxed(code: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(code);
        out.extend_from_slice(body);
        out
    }

    fn ftyp() -> Vec<u8> {
        let mut body = b"M4A ".to_vec();
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(b"isomM4A ");
        boxed(b"ftyp", &body)
    }

    fn mvhd(timescale: u32, duration: u32) -> Vec<u8> {
        let mut body = vec![0u8; 12];
        body.extend_from_slice(&timescale.to_be_bytes());
        body.extend_from_slice(&duration.to_be_bytes());
        body.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        body.extend_from_slice(&0x0100u16.to_be_bytes());
        body.extend_from_slice(&[0u8; 70]);
        body.extend_from_slice(&1u32.to_be_bytes());
        boxed(b"mvhd", &body)
    }

    fn data(data_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut body = data_type.to_be_bytes().to_vec();
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(payload);
        boxed(b"data", &body)
    }

    fn tagged_movie() -> Vec<u8> {
        let mut ilst = boxed(b"\xA9nam", &data(1, b"Title"));
        ilst.extend(boxed(b"trkn", &data(0, &[0, 0, 0, 2, 0, 9, 0, 0])));
        ilst.extend(boxed(b"covr", &data(13, &[0xFF, 0xD8, 0xFF])));

        let mut meta = vec![0u8; 4];
        let mut hdlr = vec![0u8; 8];
        hdlr.extend_from_slice(b"mdir");
        hdlr.extend_from_slice(&[0u8; 13]);
        meta.extend(boxed(b"hdlr", &hdlr));
        meta.extend(boxed(b"ilst", &ilst));

        let udta = boxed(b"udta", &boxed(b"meta", &meta));
        let mut moov = mvhd(1000, 5000);
        moov.extend(udta);

        let mut file = ftyp();
        file.extend(boxed(b"moov", &moov));
        file.extend(boxed(b"mdat", &[0xAB; 16]));
        file
    }

    fn open(bytes: Vec<u8>) -> Iso14496 {
        let mut iso = Iso14496::from_reader(Reader::from_bytes(bytes), Options::default()).unwrap();
        iso.read_to_end().unwrap();
        iso
    }

    #[test]
    fn test_walks_nested_boxes() {
        let iso = open(tagged_movie());
        let root = iso.root();
        let top: Vec<String> = iso
            .tree()
            .children(root)
            .filter_map(|id| iso.tree().header(id).map(|h| h.identifier.to_string()))
            .collect();
        assert_eq!(top, vec!["ftyp", "moov", "mdat"]);

        let file_type = iso.file_type().unwrap();
        assert_eq!(&file_type.major_brand, b"M4A ");
        assert!(file_type.is_compatible(b"isom"));
        assert_eq!(iso.movie_duration(), Some(5.0));
        assert!(iso.path("movie/userData/metadata/itemList").is_some());
        assert!(matches!(
            iso.path("moov/udta/meta").and_then(|id| iso.tree().body(id)),
            Some(IsoBox::Meta(Some(_)))
        ));
    }

    #[test]
    fn test_item_list_values() {
        let iso = open(tagged_movie());
        assert_eq!(iso.field_text(StandardField::Title).as_deref(), Some("Title"));
        assert_eq!(iso.field_text(StandardField::Track).as_deref(), Some("2/9"));
        assert_eq!(iso.field_text(StandardField::Artist), None);
        let (mime, bytes) = iso.cover().unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(bytes, &[0xFF, 0xD8, 0xFF]);
        assert_eq!(iso.items().len(), 3);
    }

    #[test]
    fn test_unknown_boxes_keep_their_span() {
        let iso = open(tagged_movie());
        let mdat = iso.path("mdat").unwrap();
        let header = iso.tree().header(mdat).unwrap();
        assert_eq!(
            iso.tree().body(mdat),
            Some(&IsoBox::Opaque(ByteSpan::Source {
                offset: header.body_start(),
                len: 16
            }))
        );
    }

    #[test]
    fn test_size_zero_runs_to_end_of_file() {
        let mut bytes = ftyp();
        let mut last = 0u32.to_be_bytes().to_vec();
        last.extend_from_slice(b"mdat");
        // looks like a box header but lies inside the size-0 box
        last.extend(boxed(b"free", &[0u8; 4]));
        bytes.extend_from_slice(&last);

        let iso = open(bytes.clone());
        let children: Vec<NodeId> = iso.tree().children(iso.root()).collect();
        assert_eq!(children.len(), 2);
        let mdat = iso.tree().header(children[1]).unwrap();
        assert_eq!(mdat.identifier, box_types::MDAT);
        assert_eq!(mdat.end(), bytes.len() as u64);
        assert!(!iso.has_boxes());
    }

    #[test]
    fn test_large_size_and_uuid_headers() {
        let guid: Guid = "be7acfcb-97a9-42e8-9c71-999491e3afac".parse().unwrap();
        let mut bytes = ftyp();
        let mut uuid = 1u32.to_be_bytes().to_vec();
        uuid.extend_from_slice(b"uuid");
        uuid.extend_from_slice(&(16u64 + 16 + 3).to_be_bytes());
        uuid.extend_from_slice(&guid.to_be_bytes());
        uuid.extend_from_slice(b"xmp");
        bytes.extend_from_slice(&uuid);

        let iso = open(bytes);
        let found = iso.boxes("BE7ACFCB-*").unwrap();
        assert_eq!(found.len(), 1);
        let header = iso.tree().header(found[0]).unwrap();
        assert_eq!(header.identifier, BoxType::Uuid(guid));
        assert_eq!(header.header_len, 32);
        assert_eq!(header.body_len(), 3);
    }

    #[test]
    fn test_quicktime_meta_without_full_box() {
        let mut hdlr = vec![0u8; 8];
        hdlr.extend_from_slice(b"mdta");
        hdlr.extend_from_slice(&[0u8; 13]);
        let meta = boxed(b"meta", &boxed(b"hdlr", &hdlr));
        let iso = open(boxed(b"moov", &meta));
        let meta = iso.path("moov/meta").unwrap();
        assert_eq!(iso.tree().body(meta), Some(&IsoBox::Meta(None)));
        let hdlr = iso.tree().get_first(meta, &box_types::HDLR).unwrap();
        assert!(matches!(iso.tree().body(hdlr), Some(IsoBox::Handler(h)) if &h.handler_type == b"mdta"));
    }

    #[test]
    fn test_child_overrunning_parent_is_malformed() {
        let mut moov = mvhd(1000, 5000);
        moov[3] += 4;
        let mut iso = Iso14496::from_reader(Reader::from_bytes(boxed(b"moov", &moov)), Options::default()).unwrap();
        assert!(matches!(iso.next_box(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_empty_container() {
        let iso = open(boxed(b"moov", &[]));
        let moov = iso.path("moov").unwrap();
        assert_eq!(iso.tree().children(moov).count(), 0);
    }

    #[test]
    fn test_rejects_non_box_source() {
        let result = Iso14496::from_reader(Reader::from_bytes(b"ID3\x04\x00\x00\x00\x00".to_vec()), Options::default());
        assert!(matches!(result, Err(Error::SignatureMismatch { .. })));
    }

    #[test]
    fn test_round_trip_and_edit() {
        let original = tagged_movie();
        let mut iso = open(original.clone());
        assert_eq!(iso.to_bytes().unwrap(), original);

        iso.set_item_text(BoxType::FourCc(FieldMappings::MP4_TITLE), "Longer title")
            .unwrap();
        let bytes = iso.to_bytes().unwrap();
        assert_eq!(bytes.len(), original.len() + 7);

        let reread = open(bytes);
        assert_eq!(reread.field_text(StandardField::Title).as_deref(), Some("Longer title"));
        assert_eq!(reread.field_text(StandardField::Track).as_deref(), Some("2/9"));
        let moov = reread.path("moov").unwrap();
        assert_eq!(
            reread.tree().header(moov).map(|h| h.size),
            iso.path("moov").and_then(|id| iso.tree().header(id)).map(|h| h.size)
        );
    }

    #[test]
    fn test_next_box_after_grown_encode() {
        let original = tagged_movie();
        let mut iso = Iso14496::from_reader(Reader::from_bytes(original.clone()), Options::default()).unwrap();
        iso.next_box().unwrap();
        iso.next_box().unwrap();
        iso.set_item_text(BoxType::FourCc(FieldMappings::MP4_TITLE), "Longer title")
            .unwrap();
        iso.to_bytes().unwrap();

        let mdat = iso.next_box().unwrap().unwrap();
        let header = iso.tree().header(mdat).unwrap();
        assert_eq!(header.identifier, box_types::MDAT);
        assert_eq!(header.end(), original.len() as u64);
        assert!(!iso.has_boxes());
        assert_eq!(iso.next_box().unwrap(), None);
    }
}
