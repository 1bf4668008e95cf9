// ISO base media box types and the bodies decoded from them

use crate::error::{Error, Result};
use crate::tree::{ByteSpan, Identifier};
use crate::utils::bytes::trim_nul;
use crate::utils::guid::Guid;
use crate::utils::io::Reader;
use std::fmt;

/// Box type: a FourCC, or the extended type of a `uuid` box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxType {
    FourCc([u8; 4]),
    Uuid(Guid),
}

impl BoxType {
    /// Parse a four character code. Characters up to U+00FF map to one byte, so `©nam` works.
    pub fn new(code: &str) -> Result<Self> {
        let mut bytes = [0u8; 4];
        let mut len = 0;
        for c in code.chars() {
            let byte = u8::try_from(u32::from(c))
                .map_err(|_| Error::invalid(format!("box type '{}' is not Latin-1", code)))?;
            if len == 4 {
                return Err(Error::invalid(format!("box type '{}' is longer than four bytes", code)));
            }
            bytes[len] = byte;
            len += 1;
        }
        if len != 4 {
            return Err(Error::invalid(format!("box type '{}' is shorter than four bytes", code)));
        }
        Ok(BoxType::FourCc(bytes))
    }

    pub fn fourcc(&self) -> Option<&[u8; 4]> {
        match self {
            BoxType::FourCc(code) => Some(code),
            BoxType::Uuid(_) => None,
        }
    }

    /// The four bytes written in the header type field
    pub fn type_bytes(&self) -> [u8; 4] {
        match self {
            BoxType::FourCc(code) => *code,
            BoxType::Uuid(_) => *b"uuid",
        }
    }
}

impl fmt::Display for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxType::FourCc(code) => {
                for &b in code {
                    write!(f, "{}", char::from(b))?;
                }
                Ok(())
            }
            BoxType::Uuid(guid) => write!(f, "{}", guid),
        }
    }
}

impl Identifier for BoxType {
    fn case_insensitive(&self) -> bool {
        matches!(self, BoxType::Uuid(_))
    }
}

/// Well-known box types
pub mod box_types {
    use super::BoxType;

    /// Pseudo type of the root node spanning the whole file
    pub const FILE: BoxType = BoxType::FourCc(*b"file");

    pub const FTYP: BoxType = BoxType::FourCc(*b"ftyp");
    pub const MOOV: BoxType = BoxType::FourCc(*b"moov");
    pub const MVHD: BoxType = BoxType::FourCc(*b"mvhd");
    pub const TRAK: BoxType = BoxType::FourCc(*b"trak");
    pub const MDIA: BoxType = BoxType::FourCc(*b"mdia");
    pub const MINF: BoxType = BoxType::FourCc(*b"minf");
    pub const STBL: BoxType = BoxType::FourCc(*b"stbl");
    pub const STSZ: BoxType = BoxType::FourCc(*b"stsz");
    pub const STSC: BoxType = BoxType::FourCc(*b"stsc");
    pub const HDLR: BoxType = BoxType::FourCc(*b"hdlr");
    pub const UDTA: BoxType = BoxType::FourCc(*b"udta");
    pub const EDTS: BoxType = BoxType::FourCc(*b"edts");
    pub const DINF: BoxType = BoxType::FourCc(*b"dinf");
    pub const MVEX: BoxType = BoxType::FourCc(*b"mvex");
    pub const MOOF: BoxType = BoxType::FourCc(*b"moof");
    pub const TRAF: BoxType = BoxType::FourCc(*b"traf");
    pub const MFRA: BoxType = BoxType::FourCc(*b"mfra");
    pub const META: BoxType = BoxType::FourCc(*b"meta");
    pub const ILST: BoxType = BoxType::FourCc(*b"ilst");
    pub const DATA: BoxType = BoxType::FourCc(*b"data");
    pub const MEAN: BoxType = BoxType::FourCc(*b"mean");
    pub const NAME: BoxType = BoxType::FourCc(*b"name");
    pub const MDAT: BoxType = BoxType::FourCc(*b"mdat");
    pub const FREE: BoxType = BoxType::FourCc(*b"free");

    /// Boxes whose body is nothing but child boxes
    pub const CONTAINERS: [BoxType; 12] = [MOOV, TRAK, MDIA, MINF, STBL, UDTA, EDTS, DINF, MVEX, MOOF, TRAF, MFRA];

    const ALIASES: [(&str, BoxType); 20] = [
        ("filetype", FTYP),
        ("movie", MOOV),
        ("movieheader", MVHD),
        ("track", TRAK),
        ("media", MDIA),
        ("mediainformation", MINF),
        ("sampletable", STBL),
        ("samplesize", STSZ),
        ("sampletochunk", STSC),
        ("handler", HDLR),
        ("userdata", UDTA),
        ("edit", EDTS),
        ("datainformation", DINF),
        ("movieextends", MVEX),
        ("moviefragment", MOOF),
        ("trackfragment", TRAF),
        ("metadata", META),
        ("itemlist", ILST),
        ("mediadata", MDAT),
        ("freespace", FREE),
    ];

    /// Resolve a descriptive name such as `movieHeader`, or a literal FourCC
    pub fn by_name(name: &str) -> Option<BoxType> {
        let key = crate::tree::alias_key(name);
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, id)| *id)
            .or_else(|| BoxType::new(name).ok())
    }
}

/// Version and 24-bit flags that prefix every full box
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullBox {
    pub version: u8,
    pub flags: u32,
}

impl FullBox {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let word = reader.read_be_u32()?;
        Ok(Self {
            version: (word >> 24) as u8,
            flags: word & 0x00FF_FFFF,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let word = (u32::from(self.version) << 24) | (self.flags & 0x00FF_FFFF);
        out.extend_from_slice(&word.to_be_bytes());
    }
}

/// `ftyp`: brand and compatibility list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileType {
    pub major_brand: [u8; 4],
    pub minor_version: u32,
    pub compatible_brands: Vec<[u8; 4]>,
}

impl FileType {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let major_brand = reader.read_array::<4>()?;
        let minor_version = reader.read_be_u32()?;
        let mut compatible_brands = Vec::new();
        while reader.available() >= 4 {
            compatible_brands.push(reader.read_array::<4>()?);
        }
        Ok(Self {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.major_brand);
        out.extend_from_slice(&self.minor_version.to_be_bytes());
        for brand in &self.compatible_brands {
            out.extend_from_slice(brand);
        }
    }

    pub fn is_compatible(&self, brand: &[u8; 4]) -> bool {
        self.major_brand == *brand || self.compatible_brands.contains(brand)
    }
}

/// `mvhd`: movie timescale and duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieHeader {
    pub full: FullBox,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    /// 16.16 fixed point, 1.0 is normal playback
    pub rate: u32,
    /// 8.8 fixed point
    pub volume: u16,
    /// Reserved words, matrix and pre-defined fields, kept verbatim
    pub matrix: Vec<u8>,
    pub next_track_id: u32,
}

impl MovieHeader {
    const MATRIX_LEN: u64 = 70;

    pub fn read(reader: &mut Reader) -> Result<Self> {
        let full = FullBox::read(reader)?;
        let (creation_time, modification_time, timescale, duration) = if full.version == 1 {
            (
                reader.read_be_u64()?,
                reader.read_be_u64()?,
                reader.read_be_u32()?,
                reader.read_be_u64()?,
            )
        } else {
            (
                u64::from(reader.read_be_u32()?),
                u64::from(reader.read_be_u32()?),
                reader.read_be_u32()?,
                u64::from(reader.read_be_u32()?),
            )
        };
        Ok(Self {
            full,
            creation_time,
            modification_time,
            timescale,
            duration,
            rate: reader.read_be_u32()?,
            volume: reader.read_be_u16()?,
            matrix: reader.read(Self::MATRIX_LEN)?,
            next_track_id: reader.read_be_u32()?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        // Times that no longer fit 32 bits force the 64-bit layout
        let wide = self.full.version == 1
            || [self.creation_time, self.modification_time, self.duration]
                .iter()
                .any(|&t| t > u64::from(u32::MAX));
        let full = FullBox {
            version: u8::from(wide),
            flags: self.full.flags,
        };
        full.write(out);
        if wide {
            out.extend_from_slice(&self.creation_time.to_be_bytes());
            out.extend_from_slice(&self.modification_time.to_be_bytes());
            out.extend_from_slice(&self.timescale.to_be_bytes());
            out.extend_from_slice(&self.duration.to_be_bytes());
        } else {
            out.extend_from_slice(&(self.creation_time as u32).to_be_bytes());
            out.extend_from_slice(&(self.modification_time as u32).to_be_bytes());
            out.extend_from_slice(&self.timescale.to_be_bytes());
            out.extend_from_slice(&(self.duration as u32).to_be_bytes());
        }
        out.extend_from_slice(&self.rate.to_be_bytes());
        out.extend_from_slice(&self.volume.to_be_bytes());
        let mut matrix = self.matrix.clone();
        matrix.resize(Self::MATRIX_LEN as usize, 0);
        out.extend(matrix);
        out.extend_from_slice(&self.next_track_id.to_be_bytes());
    }

    /// Duration in seconds; `None` when the timescale is zero
    pub fn duration_seconds(&self) -> Option<f64> {
        (self.timescale != 0).then(|| self.duration as f64 / f64::from(self.timescale))
    }
}

/// `hdlr`: the handler that interprets a track or meta box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub full: FullBox,
    pub pre_defined: u32,
    pub handler_type: [u8; 4],
    pub reserved: [u8; 12],
    pub name: String,
}

impl Handler {
    pub fn new(handler_type: [u8; 4], name: &str) -> Self {
        Self {
            full: FullBox::default(),
            pre_defined: 0,
            handler_type,
            reserved: [0; 12],
            name: name.to_string(),
        }
    }

    pub fn read(reader: &mut Reader) -> Result<Self> {
        let full = FullBox::read(reader)?;
        let pre_defined = reader.read_be_u32()?;
        let handler_type = reader.read_array::<4>()?;
        let reserved = reader.read_array::<12>()?;
        let name = reader.read_rest()?;
        Ok(Self {
            full,
            pre_defined,
            handler_type,
            reserved,
            name: String::from_utf8_lossy(trim_nul(&name)).into_owned(),
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        self.full.write(out);
        out.extend_from_slice(&self.pre_defined.to_be_bytes());
        out.extend_from_slice(&self.handler_type);
        out.extend_from_slice(&self.reserved);
        out.extend_from_slice(self.name.as_bytes());
        out.push(0);
    }
}

/// Cap a table allocation by what the box can actually hold
fn table_capacity(declared: u32, entry_len: u64, reader: &Reader) -> usize {
    let fits = reader.available() / entry_len;
    u64::from(declared).min(fits) as usize
}

/// `stsz`: per-sample sizes, or one size shared by every sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSizes {
    pub full: FullBox,
    /// Non-zero when every sample has this size and the table is empty
    pub sample_size: u32,
    pub sample_count: u32,
    pub sizes: Vec<u32>,
}

impl SampleSizes {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let full = FullBox::read(reader)?;
        let sample_size = reader.read_be_u32()?;
        let sample_count = reader.read_be_u32()?;
        let mut sizes = Vec::new();
        if sample_size == 0 {
            sizes.reserve(table_capacity(sample_count, 4, reader));
            for _ in 0..sample_count {
                sizes.push(reader.read_be_u32()?);
            }
        }
        Ok(Self {
            full,
            sample_size,
            sample_count,
            sizes,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        self.full.write(out);
        out.extend_from_slice(&self.sample_size.to_be_bytes());
        out.extend_from_slice(&self.sample_count.to_be_bytes());
        if self.sample_size == 0 {
            for size in &self.sizes {
                out.extend_from_slice(&size.to_be_bytes());
            }
        }
    }

    pub fn size_of(&self, sample: usize) -> Option<u32> {
        if self.sample_size != 0 {
            return (sample < self.sample_count as usize).then_some(self.sample_size);
        }
        self.sizes.get(sample).copied()
    }

    pub fn total(&self) -> u64 {
        if self.sample_size != 0 {
            u64::from(self.sample_size) * u64::from(self.sample_count)
        } else {
            self.sizes.iter().map(|&s| u64::from(s)).sum()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRun {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// `stsc`: runs of chunks sharing a samples-per-chunk count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleToChunk {
    pub full: FullBox,
    pub runs: Vec<ChunkRun>,
}

impl SampleToChunk {
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let full = FullBox::read(reader)?;
        let count = reader.read_be_u32()?;
        let mut runs = Vec::with_capacity(table_capacity(count, 12, reader));
        for _ in 0..count {
            runs.push(ChunkRun {
                first_chunk: reader.read_be_u32()?,
                samples_per_chunk: reader.read_be_u32()?,
                sample_description_index: reader.read_be_u32()?,
            });
        }
        Ok(Self { full, runs })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        self.full.write(out);
        out.extend_from_slice(&(self.runs.len() as u32).to_be_bytes());
        for run in &self.runs {
            out.extend_from_slice(&run.first_chunk.to_be_bytes());
            out.extend_from_slice(&run.samples_per_chunk.to_be_bytes());
            out.extend_from_slice(&run.sample_description_index.to_be_bytes());
        }
    }
}

/// Well-known `data` type indicators
pub mod data_types {
    pub const IMPLICIT: u32 = 0;
    pub const UTF8: u32 = 1;
    pub const UTF16: u32 = 2;
    pub const JPEG: u32 = 13;
    pub const PNG: u32 = 14;
    pub const SIGNED_INT: u32 = 21;
    pub const BMP: u32 = 27;
}

/// `data`: the value of an item list entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemData {
    /// Type indicator carried in the full box flags
    pub data_type: u32,
    pub locale: u32,
    pub payload: Vec<u8>,
}

impl ItemData {
    pub fn text(value: &str) -> Self {
        Self {
            data_type: data_types::UTF8,
            locale: 0,
            payload: value.as_bytes().to_vec(),
        }
    }

    pub fn image(data_type: u32, payload: Vec<u8>) -> Self {
        Self {
            data_type,
            locale: 0,
            payload,
        }
    }

    pub fn read(reader: &mut Reader) -> Result<Self> {
        let full = FullBox::read(reader)?;
        let locale = reader.read_be_u32()?;
        Ok(Self {
            data_type: full.flags,
            locale,
            payload: reader.read_rest()?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        FullBox {
            version: 0,
            flags: self.data_type,
        }
        .write(out);
        out.extend_from_slice(&self.locale.to_be_bytes());
        out.extend_from_slice(&self.payload);
    }

    pub fn as_text(&self) -> Option<String> {
        match self.data_type {
            data_types::UTF8 => Some(String::from_utf8_lossy(&self.payload).into_owned()),
            data_types::UTF16 => {
                let units: Vec<u16> = self
                    .payload
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                Some(String::from_utf16_lossy(&units))
            }
            _ => None,
        }
    }

    /// Big-endian signed integer of one, two, four or eight bytes
    pub fn as_integer(&self) -> Option<i64> {
        if !matches!(self.data_type, data_types::IMPLICIT | data_types::SIGNED_INT) {
            return None;
        }
        let p = &self.payload;
        match p.len() {
            1 => Some(i64::from(p[0] as i8)),
            2 => Some(i64::from(i16::from_be_bytes([p[0], p[1]]))),
            4 => Some(i64::from(i32::from_be_bytes([p[0], p[1], p[2], p[3]]))),
            8 => Some(i64::from_be_bytes([p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7]])),
            _ => None,
        }
    }

    /// `(number, total)` from a `trkn` or `disk` payload
    pub fn as_index_pair(&self) -> Option<(u16, u16)> {
        if self.data_type != data_types::IMPLICIT || self.payload.len() < 6 {
            return None;
        }
        let p = &self.payload;
        Some((u16::from_be_bytes([p[2], p[3]]), u16::from_be_bytes([p[4], p[5]])))
    }

    pub fn image_mime(&self) -> Option<&'static str> {
        match self.data_type {
            data_types::JPEG => Some("image/jpeg"),
            data_types::PNG => Some("image/png"),
            data_types::BMP => Some("image/bmp"),
            _ => None,
        }
    }
}

/// Body of a decoded box
#[derive(Debug, Clone, PartialEq)]
pub enum IsoBox {
    /// The whole file
    File,
    /// A box holding only child boxes (also `ilst` and its items)
    Container,
    /// `meta`; `None` for the QuickTime form without version and flags
    Meta(Option<FullBox>),
    FileType(FileType),
    MovieHeader(MovieHeader),
    Handler(Handler),
    SampleSizes(SampleSizes),
    SampleToChunk(SampleToChunk),
    Data(ItemData),
    /// `mean` or `name` inside a freeform `----` item
    Label(FullBox, String),
    Opaque(ByteSpan),
}

impl IsoBox {
    pub fn box_type(&self) -> Option<BoxType> {
        match self {
            IsoBox::File => Some(box_types::FILE),
            IsoBox::Meta(_) => Some(box_types::META),
            IsoBox::FileType(_) => Some(box_types::FTYP),
            IsoBox::MovieHeader(_) => Some(box_types::MVHD),
            IsoBox::Handler(_) => Some(box_types::HDLR),
            IsoBox::SampleSizes(_) => Some(box_types::STSZ),
            IsoBox::SampleToChunk(_) => Some(box_types::STSC),
            IsoBox::Data(_) => Some(box_types::DATA),
            IsoBox::Container | IsoBox::Label(..) | IsoBox::Opaque(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_box_type_from_latin1() {
        let title = BoxType::new("\u{a9}nam").unwrap();
        assert_eq!(title, BoxType::FourCc(*b"\xA9nam"));
        assert_eq!(title.to_string(), "\u{a9}nam");
        assert!(BoxType::new("moo").is_err());
        assert!(BoxType::new("moovs").is_err());
        assert!(BoxType::new("m\u{263a}ov").is_err());
    }

    #[test]
    fn test_aliases_and_literal_codes() {
        assert_eq!(box_types::by_name("movieHeader"), Some(box_types::MVHD));
        assert_eq!(box_types::by_name("item_list"), Some(box_types::ILST));
        assert_eq!(box_types::by_name("stco"), Some(BoxType::FourCc(*b"stco")));
        assert_eq!(box_types::by_name("nothing here"), None);
    }

    #[test]
    fn test_movie_header_versions() {
        let mut v0 = Vec::new();
        FullBox::default().write(&mut v0);
        for word in [1u32, 2, 600, 6000] {
            v0.extend_from_slice(&word.to_be_bytes());
        }
        v0.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        v0.extend_from_slice(&0x0100u16.to_be_bytes());
        v0.extend_from_slice(&[0u8; 70]);
        v0.extend_from_slice(&2u32.to_be_bytes());

        let header = MovieHeader::read(&mut Reader::from_bytes(v0.clone())).unwrap();
        assert_eq!(header.timescale, 600);
        assert_eq!(header.duration, 6000);
        assert_eq!(header.duration_seconds(), Some(10.0));
        assert_eq!(header.next_track_id, 2);

        let mut out = Vec::new();
        header.write(&mut out);
        assert_eq!(out, v0);

        let mut long = header.clone();
        long.duration = u64::from(u32::MAX) + 1;
        let mut out = Vec::new();
        long.write(&mut out);
        assert_eq!(out[0], 1);
        assert_eq!(MovieHeader::read(&mut Reader::from_bytes(out)).unwrap().duration, long.duration);
    }

    #[test]
    fn test_sample_tables_read_every_entry() {
        let mut stsz = vec![0u8; 4];
        stsz.extend_from_slice(&0u32.to_be_bytes());
        stsz.extend_from_slice(&3u32.to_be_bytes());
        for size in [100u32, 200, 300] {
            stsz.extend_from_slice(&size.to_be_bytes());
        }
        let sizes = SampleSizes::read(&mut Reader::from_bytes(stsz)).unwrap();
        assert_eq!(sizes.sizes, vec![100, 200, 300]);
        assert_eq!(sizes.total(), 600);
        assert_eq!(sizes.size_of(2), Some(300));

        let mut stsc = vec![0u8; 4];
        stsc.extend_from_slice(&2u32.to_be_bytes());
        for word in [1u32, 10, 1, 5, 4, 1] {
            stsc.extend_from_slice(&word.to_be_bytes());
        }
        let table = SampleToChunk::read(&mut Reader::from_bytes(stsc.clone())).unwrap();
        assert_eq!(table.runs.len(), 2);
        assert_eq!(table.runs[1].samples_per_chunk, 4);
        let mut out = Vec::new();
        table.write(&mut out);
        assert_eq!(out, stsc);
    }

    #[test]
    fn test_uniform_sample_size() {
        let mut stsz = vec![0u8; 4];
        stsz.extend_from_slice(&1152u32.to_be_bytes());
        stsz.extend_from_slice(&10u32.to_be_bytes());
        let sizes = SampleSizes::read(&mut Reader::from_bytes(stsz)).unwrap();
        assert!(sizes.sizes.is_empty());
        assert_eq!(sizes.size_of(9), Some(1152));
        assert_eq!(sizes.size_of(10), None);
        assert_eq!(sizes.total(), 11520);
    }

    #[test]
    fn test_item_data_values() {
        let text = ItemData::text("Song");
        let mut out = Vec::new();
        text.write(&mut out);
        assert_eq!(&out[..8], &[0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(ItemData::read(&mut Reader::from_bytes(out)).unwrap().as_text().as_deref(), Some("Song"));

        let track = ItemData {
            data_type: data_types::IMPLICIT,
            locale: 0,
            payload: vec![0, 0, 0, 3, 0, 12, 0, 0],
        };
        assert_eq!(track.as_index_pair(), Some((3, 12)));
        assert_eq!(track.as_text(), None);

        let tempo = ItemData {
            data_type: data_types::SIGNED_INT,
            locale: 0,
            payload: vec![0, 120],
        };
        assert_eq!(tempo.as_integer(), Some(120));

        let cover = ItemData::image(data_types::PNG, vec![0x89, b'P']);
        assert_eq!(cover.image_mime(), Some("image/png"));
    }

    #[test]
    fn test_handler_name_is_nul_trimmed() {
        let handler = Handler::new(*b"mdir", "");
        let mut out = Vec::new();
        handler.write(&mut out);
        assert_eq!(out.len(), 25);
        let parsed = Handler::read(&mut Reader::from_bytes(out)).unwrap();
        assert_eq!(parsed, handler);
    }
}
