//! mediatree - hierarchical readers and writers for media containers
//!
//! ASF objects, ID3v2 frames and ISO base media boxes are decoded into one
//! generic [`tree::Tree`]; MPEG audio streams get a bitrate and play time
//! estimator. [`read_metadata`] gives a format-agnostic summary.

pub mod asf;
pub mod config;
pub mod error;
pub mod field_mapping;
pub mod id3;
pub mod iso;
pub mod mpeg;
pub mod tree;
pub mod utils;

pub use asf::Asf;
pub use config::{Options, ReadMode};
pub use error::{Error, Result};
pub use field_mapping::StandardField;
pub use id3::{Id3v1Tag, Id3v2};
pub use iso::Iso14496;
pub use mpeg::MpegAudio;

use asf::{guids, AttributeValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use field_mapping::{AsfField, FieldMappings, ValueConverter};
use id3::FrameContent;
use log::{debug, warn};
use mpeg::FrameHeader;
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use utils::io::Reader;

/// Container family recognised from the first bytes of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileFormat {
    /// MPEG audio behind an ID3v2 tag
    Id3v2,
    /// Bare MPEG audio, possibly with an ID3v1 trailer
    Mpeg,
    Asf,
    Mp4,
    Unknown,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileFormat::Id3v2 => "ID3v2",
            FileFormat::Mpeg => "MPEG",
            FileFormat::Asf => "ASF",
            FileFormat::Mp4 => "MP4",
            FileFormat::Unknown => "unknown",
        })
    }
}

/// Detect the container of `path` from its signature
pub fn detect_format<P: AsRef<Path>>(path: P) -> Result<FileFormat> {
    let mut reader = Reader::open(path)?;
    detect_reader(&mut reader)
}

/// Box types seen at the start of ISO base media files
const ISO_LEADING_BOXES: [&[u8; 4]; 8] = [b"ftyp", b"styp", b"moov", b"mdat", b"free", b"skip", b"wide", b"pdin"];

fn detect_reader(reader: &mut Reader) -> Result<FileFormat> {
    let probe = reader.peek(16)?;
    if probe == guids::HEADER.to_ms_bytes() {
        return Ok(FileFormat::Asf);
    }
    if probe.starts_with(b"ID3") {
        return Ok(FileFormat::Id3v2);
    }
    if let Some(word) = utils::bytes::be_u32(&probe, 0) {
        if FrameHeader::parse(word, 0).is_ok() {
            return Ok(FileFormat::Mpeg);
        }
    }
    if iso::plausible_box(&probe) && ISO_LEADING_BOXES.iter().any(|kind| probe.get(4..8) == Some(&kind[..])) {
        return Ok(FileFormat::Mp4);
    }
    if Id3v1Tag::is_present(reader)? {
        return Ok(FileFormat::Mpeg);
    }
    Ok(FileFormat::Unknown)
}

/// Embedded picture; `data` is base64 in serialised output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverArt {
    pub mime_type: String,
    pub description: String,
    #[serde(serialize_with = "as_base64")]
    pub data: Vec<u8>,
}

fn as_base64<S: Serializer>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

impl CoverArt {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, &self.data)?;
        Ok(())
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            _ => "jpg",
        }
    }
}

/// Format-agnostic summary of a media file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub file_type: String,
    pub version: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub track: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    /// Play time in seconds
    pub duration: Option<f64>,
    /// Average bitrate in kbit/s
    pub bitrate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<CoverArt>,
}

impl Metadata {
    fn set(&mut self, field: StandardField, value: Option<String>) {
        let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let slot = match field {
            StandardField::Title => &mut self.title,
            StandardField::Artist => &mut self.artist,
            StandardField::Album => &mut self.album,
            StandardField::Year => &mut self.year,
            StandardField::Track => &mut self.track,
            StandardField::Genre => &mut self.genre,
            StandardField::Comment => &mut self.comment,
            _ => return,
        };
        if slot.is_none() {
            *slot = value;
        }
    }
}

/// Fields the facade reports
const SUMMARY_FIELDS: [StandardField; 7] = [
    StandardField::Title,
    StandardField::Artist,
    StandardField::Album,
    StandardField::Year,
    StandardField::Track,
    StandardField::Genre,
    StandardField::Comment,
];

/// A media file whose container has been identified
#[derive(Debug, Clone)]
pub struct AudioFile {
    path: PathBuf,
    format: FileFormat,
    options: Options,
}

impl AudioFile {
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let format = detect_format(&path)?;
        debug!("{}: detected {}", path.display(), format);
        Ok(Self { path, format, options })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn metadata(&self) -> Result<Metadata> {
        let mut metadata = match self.format {
            FileFormat::Id3v2 | FileFormat::Mpeg => self.mpeg_metadata()?,
            FileFormat::Asf => self.asf_metadata()?,
            FileFormat::Mp4 => self.mp4_metadata()?,
            FileFormat::Unknown => {
                return Err(Error::signature("media", format!("{} has no known signature", self.path.display())))
            }
        };
        if let Some(year) = metadata.year.take() {
            metadata.year = Some(ValueConverter::normalize_year(&year));
        }
        if let Some(genre) = metadata.genre.take() {
            metadata.genre = Some(ValueConverter::normalize_genre(&genre));
        }
        Ok(metadata)
    }

    fn mpeg_metadata(&self) -> Result<Metadata> {
        let mut metadata = Metadata {
            file_type: self.format.to_string(),
            ..Default::default()
        };

        if self.format == FileFormat::Id3v2 {
            let tag = Id3v2::read(&self.path, self.options.clone())?;
            let (major, revision) = tag.version();
            metadata.version = Some(format!("2.{}.{}", major, revision));
            for field in SUMMARY_FIELDS {
                metadata.set(field, tag.text(field.as_str()));
            }
            metadata.cover = tag.frame("cover").and_then(|frame| match &frame.content {
                FrameContent::Picture(picture) => Some(CoverArt {
                    mime_type: picture.mime_type.clone(),
                    description: picture.description.clone(),
                    data: picture.data.clone(),
                }),
                _ => None,
            });
        }

        let mut reader = Reader::open(&self.path)?;
        if let Some(v1) = Id3v1Tag::read(&mut reader, self.options.legacy_encoding()?)? {
            if metadata.version.is_none() {
                metadata.version = Some(if v1.track.is_some() { "1.1" } else { "1.0" }.to_string());
            }
            metadata.set(StandardField::Title, Some(v1.title.clone()));
            metadata.set(StandardField::Artist, Some(v1.artist.clone()));
            metadata.set(StandardField::Album, Some(v1.album.clone()));
            metadata.set(StandardField::Year, Some(v1.year.clone()));
            metadata.set(StandardField::Comment, Some(v1.comment.clone()));
            metadata.set(StandardField::Track, v1.track.map(|t| t.to_string()));
            metadata.set(StandardField::Genre, v1.genre_name().map(str::to_string));
        }

        match MpegAudio::from_reader(reader, self.options.clone()) {
            Ok(audio) => {
                metadata.duration = Some(audio.duration_estimate());
                metadata.bitrate = Some(audio.bitrate_estimate());
            }
            // a tag without audio still has metadata worth reporting
            Err(Error::SignatureMismatch { reason, .. }) => {
                warn!("{}: no MPEG audio found: {}", self.path.display(), reason);
            }
            Err(e) => return Err(e),
        }
        Ok(metadata)
    }

    fn asf_metadata(&self) -> Result<Metadata> {
        let asf = Asf::read(&self.path, self.options.clone())?;
        let mut metadata = Metadata {
            file_type: self.format.to_string(),
            ..Default::default()
        };
        let description = asf.content_description();
        let descriptors = asf.extended_content_description();

        for field in SUMMARY_FIELDS {
            let value = match FieldMappings::to_asf(field) {
                AsfField::Title => description.map(|d| d.title.clone()),
                AsfField::Author => description.map(|d| d.author.clone()),
                AsfField::Copyright => description.map(|d| d.copyright.clone()),
                AsfField::Description => description.map(|d| d.description.clone()),
                AsfField::Descriptor(name) => descriptors.and_then(|d| d.get(name)).and_then(AttributeValue::as_text),
            };
            metadata.set(field, value);
        }

        if let Some(props) = asf.file_properties() {
            metadata.duration = Some(props.duration().as_secs_f64());
            metadata.bitrate = Some(f64::from(props.maximum_bitrate) / 1000.0);
        }
        metadata.cover = descriptors
            .and_then(|d| d.get("WM/Picture"))
            .and_then(|value| match value {
                AttributeValue::Bytes(data) => parse_wm_picture(data),
                _ => None,
            });
        Ok(metadata)
    }

    fn mp4_metadata(&self) -> Result<Metadata> {
        let file = Iso14496::read(&self.path, self.options.clone())?;
        let mut metadata = Metadata {
            file_type: self.format.to_string(),
            version: file.file_type().map(|ftyp| String::from_utf8_lossy(&ftyp.major_brand).trim().to_string()),
            ..Default::default()
        };
        for field in SUMMARY_FIELDS {
            metadata.set(field, file.field_text(field));
        }
        metadata.duration = file.movie_duration();
        metadata.cover = file.cover().map(|(mime_type, data)| CoverArt {
            mime_type: mime_type.to_string(),
            description: String::new(),
            data: data.to_vec(),
        });
        Ok(metadata)
    }
}

/// `WM/Picture`: type, length, UTF-16LE MIME type and description, then the image
fn parse_wm_picture(data: &[u8]) -> Option<CoverArt> {
    let mut reader = Reader::from_bytes(data.to_vec());
    let _picture_type = reader.read_u8().ok()?;
    let len = reader.read_le_u32().ok()?;
    let mut text = || -> Option<String> {
        let mut units = Vec::new();
        loop {
            match reader.read_le_u16().ok()? {
                0 => return Some(String::from_utf16_lossy(&units)),
                unit => units.push(unit),
            }
        }
    };
    let mime_type = text()?;
    let description = text()?;
    let data = reader.read(u64::from(len)).ok()?;
    Some(CoverArt {
        mime_type,
        description,
        data,
    })
}

/// Identify `path` and summarise its metadata
pub fn read_metadata<P: AsRef<Path>>(path: P, options: &Options) -> Result<Metadata> {
    AudioFile::open(path, options.clone())?.metadata()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asf::{ContentDescription, FileProperties};
    use crate::utils::bytes::encode_syncsafe;
    use crate::utils::encoding::encode_utf16le;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    /// MPEG-1 Layer III, 128 kbit/s, 44.1 kHz
    fn mpeg_frames(count: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..count {
            let mut frame = 0xFFFB_9064u32.to_be_bytes().to_vec();
            frame.resize(417, 0);
            out.extend(frame);
        }
        out
    }

    fn id3v24(frames: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (id, data) in frames {
            body.extend_from_slice(*id);
            body.extend_from_slice(&encode_syncsafe(data.len() as u32));
            body.extend_from_slice(&[0, 0]);
            body.extend_from_slice(data);
        }
        let mut out = b"ID3\x04\x00\x00".to_vec();
        out.extend_from_slice(&encode_syncsafe(body.len() as u32));
        out.extend(body);
        out
    }

    fn text(value: &str) -> Vec<u8> {
        let mut data = vec![3];
        data.extend_from_slice(value.as_bytes());
        data
    }

    fn write_temp(data: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file
    }

    #[test]
    fn test_id3v2_and_mpeg() {
        let mut picture = vec![0];
        picture.extend_from_slice(b"image/png\0");
        picture.push(3);
        picture.extend_from_slice(b"front\0");
        picture.extend_from_slice(b"\x89PNG");

        let mut data = id3v24(&[
            (b"TIT2", text("Song")),
            (b"TPE1", text("Band")),
            (b"TDRC", text("2021-05-01")),
            (b"TCON", text("(17)")),
            (b"APIC", picture),
        ]);
        data.extend(mpeg_frames(10));
        let file = write_temp(&data);

        assert_eq!(detect_format(file.path()).unwrap(), FileFormat::Id3v2);
        let metadata = read_metadata(file.path(), &Options::default()).unwrap();
        assert_eq!(metadata.file_type, "ID3v2");
        assert_eq!(metadata.version.as_deref(), Some("2.4.0"));
        assert_eq!(metadata.title.as_deref(), Some("Song"));
        assert_eq!(metadata.artist.as_deref(), Some("Band"));
        assert_eq!(metadata.year.as_deref(), Some("2021"));
        assert_eq!(metadata.genre.as_deref(), Some("Rock"));
        assert_eq!(metadata.album, None);
        assert_eq!(metadata.bitrate, Some(128.0));
        let duration = metadata.duration.unwrap();
        assert!((duration - 10.0 * 1152.0 / 44100.0).abs() < 1e-3);

        let cover = metadata.cover.as_ref().unwrap();
        assert_eq!(cover.mime_type, "image/png");
        assert_eq!(cover.extension(), "png");
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["cover"]["data"], "iVBORw==");
    }

    #[test]
    fn test_mpeg_with_id3v1() {
        let mut data = mpeg_frames(3);
        let mut trailer = vec![0u8; 128];
        trailer[..3].copy_from_slice(b"TAG");
        trailer[3..8].copy_from_slice(b"Intro");
        trailer[93..97].copy_from_slice(b"1999");
        trailer[126] = 4;
        trailer[127] = 8;
        data.extend(trailer);
        let file = write_temp(&data);

        let metadata = read_metadata(file.path(), &Options::default()).unwrap();
        assert_eq!(metadata.file_type, "MPEG");
        assert_eq!(metadata.version.as_deref(), Some("1.1"));
        assert_eq!(metadata.title.as_deref(), Some("Intro"));
        assert_eq!(metadata.track.as_deref(), Some("4"));
        assert_eq!(metadata.genre.as_deref(), Some("Jazz"));
        assert_eq!(metadata.year.as_deref(), Some("1999"));
    }

    #[test]
    fn test_asf_metadata() {
        fn object(guid: utils::Guid, body: &[u8]) -> Vec<u8> {
            let mut out = guid.to_ms_bytes().to_vec();
            out.extend_from_slice(&(24 + body.len() as u64).to_le_bytes());
            out.extend_from_slice(body);
            out
        }
        let description = ContentDescription {
            title: "Talk".into(),
            author: "Host".into(),
            ..Default::default()
        };
        let mut cd = Vec::new();
        description.write(&mut cd);
        let props = FileProperties {
            play_duration: 50_000_000,
            maximum_bitrate: 64_000,
            ..Default::default()
        };
        let mut fp = Vec::new();
        props.write(&mut fp);

        let mut header = 2u32.to_le_bytes().to_vec();
        header.extend_from_slice(&[1, 2]);
        header.extend(object(guids::FILE_PROPERTIES, &fp));
        header.extend(object(guids::CONTENT_DESCRIPTION, &cd));
        let file = write_temp(&object(guids::HEADER, &header));

        assert_eq!(detect_format(file.path()).unwrap(), FileFormat::Asf);
        let metadata = read_metadata(file.path(), &Options::default()).unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Talk"));
        assert_eq!(metadata.artist.as_deref(), Some("Host"));
        assert_eq!(metadata.duration, Some(5.0));
        assert_eq!(metadata.bitrate, Some(64.0));
    }

    #[test]
    fn test_mp4_metadata() {
        fn boxed(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
            let mut out = (8 + body.len() as u32).to_be_bytes().to_vec();
            out.extend_from_slice(kind);
            out.extend_from_slice(body);
            out
        }
        let mut data_body = vec![0, 0, 0, 1, 0, 0, 0, 0];
        data_body.extend_from_slice(b"Clip");
        let title = boxed(b"\xA9nam", &boxed(b"data", &data_body));
        let ilst = boxed(b"ilst", &title);
        let mut meta_body = vec![0, 0, 0, 0];
        meta_body.extend(ilst);
        let udta = boxed(b"udta", &boxed(b"meta", &meta_body));

        let mut data = boxed(b"ftyp", b"M4A \0\0\0\0isom");
        data.extend(boxed(b"moov", &udta));
        let file = write_temp(&data);

        assert_eq!(detect_format(file.path()).unwrap(), FileFormat::Mp4);
        let metadata = read_metadata(file.path(), &Options::default()).unwrap();
        assert_eq!(metadata.file_type, "MP4");
        assert_eq!(metadata.version.as_deref(), Some("M4A"));
        assert_eq!(metadata.title.as_deref(), Some("Clip"));
        assert_eq!(metadata.duration, None);
    }

    #[test]
    fn test_wm_picture() {
        let mut data = vec![3];
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend(encode_utf16le("image/jpeg", true));
        data.extend(encode_utf16le("", true));
        data.extend_from_slice(&[0xFF, 0xD8, 0xFF]);
        let cover = parse_wm_picture(&data).unwrap();
        assert_eq!(cover.mime_type, "image/jpeg");
        assert_eq!(cover.data, vec![0xFF, 0xD8, 0xFF]);
        assert!(parse_wm_picture(&data[..10]).is_none());
    }

    #[test]
    fn test_unknown_format() {
        let file = write_temp(b"just some text, nothing else");
        assert_eq!(detect_format(file.path()).unwrap(), FileFormat::Unknown);
        assert!(matches!(
            read_metadata(file.path(), &Options::default()),
            Err(Error::SignatureMismatch { .. })
        ));
        assert!(matches!(detect_format("/nonexistent/file.mp3"), Err(Error::SourceAccess(_))));
    }
}
