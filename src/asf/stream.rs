// ASF Stream Properties object

use super::guids;
use crate::error::{Error, Result};
use crate::utils::guid::Guid;
use crate::utils::io::Reader;

/// Stream Properties: one per media stream in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProperties {
    pub time_offset: u64,
    pub flags: u16,
    pub reserved: u32,
    pub media: TypeSpecificData,
    pub error_correction: ErrorCorrection,
}

/// Media-type specific block, selected by the stream type GUID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpecificData {
    Audio(AudioMedia),
    Video(VideoMedia),
    Jfif(JfifMedia),
    DegradableJpeg(DegradableJpegMedia),
    Binary(BinaryMedia),
    FileTransfer(BinaryMedia),
    Command(Vec<u8>),
    Other { stream_type: Guid, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioMedia {
    pub codec_id: u16,
    pub channels: u16,
    pub samples_per_second: u32,
    pub avg_bytes_per_second: u32,
    pub block_alignment: u16,
    pub bits_per_sample: u16,
    pub codec_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoMedia {
    pub encoded_width: u32,
    pub encoded_height: u32,
    pub reserved_flags: u8,
    /// BITMAPINFOHEADER fields
    pub image_width: u32,
    pub image_height: u32,
    pub reserved: u16,
    pub bits_per_pixel: u16,
    pub compression_id: u32,
    pub image_size: u32,
    pub horizontal_pixels_per_meter: u32,
    pub vertical_pixels_per_meter: u32,
    pub colors_used: u32,
    pub important_colors: u32,
    pub codec_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JfifMedia {
    pub width: u32,
    pub height: u32,
    pub reserved: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DegradableJpegMedia {
    pub width: u32,
    pub height: u32,
    pub reserved: [u16; 3],
    pub interchange_data: Vec<u8>,
}

/// Binary and file-transfer streams share one layout
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BinaryMedia {
    pub major_media_type: Guid,
    pub media_subtype: Guid,
    pub fixed_size_samples: u32,
    pub temporal_compression: u32,
    pub sample_size: u32,
    pub format_type: Guid,
    pub format_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCorrection {
    None,
    AudioSpread {
        span: u8,
        virtual_packet_length: u16,
        virtual_chunk_length: u16,
        silence_data: Vec<u8>,
    },
    Other { kind: Guid, data: Vec<u8> },
}

/// BITMAPINFOHEADER size without codec data
const BITMAP_INFO_LEN: u32 = 40;

impl StreamProperties {
    pub const ENCRYPTED: u16 = 0x8000;

    pub fn read(reader: &mut Reader) -> Result<Self> {
        let stream_type = reader.read_guid()?;
        let error_correction_type = reader.read_guid()?;
        let time_offset = reader.read_le_u64()?;
        let type_specific_len = reader.read_le_u32()? as u64;
        let error_correction_len = reader.read_le_u32()? as u64;
        let flags = reader.read_le_u16()?;
        let reserved = reader.read_le_u32()?;

        let block = reader.read(type_specific_len)?;
        let media = TypeSpecificData::parse(stream_type, block)?;
        let block = reader.read(error_correction_len)?;
        let error_correction = ErrorCorrection::parse(error_correction_type, block)?;

        Ok(Self {
            time_offset,
            flags,
            reserved,
            media,
            error_correction,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let media = self.media.encode();
        let error_correction = self.error_correction.encode();
        out.extend_from_slice(&self.media.stream_type().to_ms_bytes());
        out.extend_from_slice(&self.error_correction.kind().to_ms_bytes());
        out.extend_from_slice(&self.time_offset.to_le_bytes());
        out.extend_from_slice(&(media.len() as u32).to_le_bytes());
        out.extend_from_slice(&(error_correction.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
        out.extend(media);
        out.extend(error_correction);
    }

    /// Stream number, 1 to 127
    pub fn stream_number(&self) -> u8 {
        (self.flags & 0x7F) as u8
    }

    pub fn set_stream_number(&mut self, number: u8) -> Result<()> {
        check_stream_number(number)?;
        self.flags = (self.flags & !0x7F) | number as u16;
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & Self::ENCRYPTED != 0
    }
}

pub(crate) fn check_stream_number(number: u8) -> Result<()> {
    if (1..=127).contains(&number) {
        Ok(())
    } else {
        Err(Error::invalid(format!("stream number {} is outside 1..=127", number)))
    }
}

impl TypeSpecificData {
    fn parse(stream_type: Guid, data: Vec<u8>) -> Result<Self> {
        let mut reader = Reader::from_bytes(data);
        let parsed = match stream_type {
            guids::AUDIO_MEDIA => {
                let mut audio = AudioMedia {
                    codec_id: reader.read_le_u16()?,
                    channels: reader.read_le_u16()?,
                    samples_per_second: reader.read_le_u32()?,
                    avg_bytes_per_second: reader.read_le_u32()?,
                    block_alignment: reader.read_le_u16()?,
                    bits_per_sample: reader.read_le_u16()?,
                    codec_data: Vec::new(),
                };
                let len = reader.read_le_u16()? as u64;
                audio.codec_data = reader.read(len)?;
                TypeSpecificData::Audio(audio)
            }
            guids::VIDEO_MEDIA => {
                let encoded_width = reader.read_le_u32()?;
                let encoded_height = reader.read_le_u32()?;
                let reserved_flags = reader.read_u8()?;
                reader.skip(2)?;
                let format_len = reader.read_le_u32()?;
                let mut video = VideoMedia {
                    encoded_width,
                    encoded_height,
                    reserved_flags,
                    image_width: reader.read_le_u32()?,
                    image_height: reader.read_le_u32()?,
                    reserved: reader.read_le_u16()?,
                    bits_per_pixel: reader.read_le_u16()?,
                    compression_id: reader.read_le_u32()?,
                    image_size: reader.read_le_u32()?,
                    horizontal_pixels_per_meter: reader.read_le_u32()?,
                    vertical_pixels_per_meter: reader.read_le_u32()?,
                    colors_used: reader.read_le_u32()?,
                    important_colors: reader.read_le_u32()?,
                    codec_data: Vec::new(),
                };
                video.codec_data = reader.read(format_len.saturating_sub(BITMAP_INFO_LEN) as u64)?;
                TypeSpecificData::Video(video)
            }
            guids::JFIF_MEDIA => TypeSpecificData::Jfif(JfifMedia {
                width: reader.read_le_u32()?,
                height: reader.read_le_u32()?,
                reserved: reader.read_le_u32()?,
            }),
            guids::DEGRADABLE_JPEG_MEDIA => {
                let width = reader.read_le_u32()?;
                let height = reader.read_le_u32()?;
                let reserved = [reader.read_le_u16()?, reader.read_le_u16()?, reader.read_le_u16()?];
                let len = reader.read_le_u16()? as u64;
                TypeSpecificData::DegradableJpeg(DegradableJpegMedia {
                    width,
                    height,
                    reserved,
                    interchange_data: reader.read(len)?,
                })
            }
            guids::BINARY_MEDIA => TypeSpecificData::Binary(BinaryMedia::read(&mut reader)?),
            guids::FILE_TRANSFER_MEDIA => TypeSpecificData::FileTransfer(BinaryMedia::read(&mut reader)?),
            guids::COMMAND_MEDIA => TypeSpecificData::Command(reader.read_rest()?),
            other => TypeSpecificData::Other {
                stream_type: other,
                data: reader.read_rest()?,
            },
        };
        Ok(parsed)
    }

    pub fn stream_type(&self) -> Guid {
        match self {
            TypeSpecificData::Audio(_) => guids::AUDIO_MEDIA,
            TypeSpecificData::Video(_) => guids::VIDEO_MEDIA,
            TypeSpecificData::Jfif(_) => guids::JFIF_MEDIA,
            TypeSpecificData::DegradableJpeg(_) => guids::DEGRADABLE_JPEG_MEDIA,
            TypeSpecificData::Binary(_) => guids::BINARY_MEDIA,
            TypeSpecificData::FileTransfer(_) => guids::FILE_TRANSFER_MEDIA,
            TypeSpecificData::Command(_) => guids::COMMAND_MEDIA,
            TypeSpecificData::Other { stream_type, .. } => *stream_type,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            TypeSpecificData::Audio(a) => {
                out.extend_from_slice(&a.codec_id.to_le_bytes());
                out.extend_from_slice(&a.channels.to_le_bytes());
                out.extend_from_slice(&a.samples_per_second.to_le_bytes());
                out.extend_from_slice(&a.avg_bytes_per_second.to_le_bytes());
                out.extend_from_slice(&a.block_alignment.to_le_bytes());
                out.extend_from_slice(&a.bits_per_sample.to_le_bytes());
                out.extend_from_slice(&(a.codec_data.len() as u16).to_le_bytes());
                out.extend_from_slice(&a.codec_data);
            }
            TypeSpecificData::Video(v) => {
                let format_len = BITMAP_INFO_LEN + v.codec_data.len() as u32;
                out.extend_from_slice(&v.encoded_width.to_le_bytes());
                out.extend_from_slice(&v.encoded_height.to_le_bytes());
                out.push(v.reserved_flags);
                out.extend_from_slice(&(format_len as u16).to_le_bytes());
                out.extend_from_slice(&format_len.to_le_bytes());
                out.extend_from_slice(&v.image_width.to_le_bytes());
                out.extend_from_slice(&v.image_height.to_le_bytes());
                out.extend_from_slice(&v.reserved.to_le_bytes());
                out.extend_from_slice(&v.bits_per_pixel.to_le_bytes());
                out.extend_from_slice(&v.compression_id.to_le_bytes());
                out.extend_from_slice(&v.image_size.to_le_bytes());
                out.extend_from_slice(&v.horizontal_pixels_per_meter.to_le_bytes());
                out.extend_from_slice(&v.vertical_pixels_per_meter.to_le_bytes());
                out.extend_from_slice(&v.colors_used.to_le_bytes());
                out.extend_from_slice(&v.important_colors.to_le_bytes());
                out.extend_from_slice(&v.codec_data);
            }
            TypeSpecificData::Jfif(j) => {
                out.extend_from_slice(&j.width.to_le_bytes());
                out.extend_from_slice(&j.height.to_le_bytes());
                out.extend_from_slice(&j.reserved.to_le_bytes());
            }
            TypeSpecificData::DegradableJpeg(d) => {
                out.extend_from_slice(&d.width.to_le_bytes());
                out.extend_from_slice(&d.height.to_le_bytes());
                for word in d.reserved {
                    out.extend_from_slice(&word.to_le_bytes());
                }
                out.extend_from_slice(&(d.interchange_data.len() as u16).to_le_bytes());
                out.extend_from_slice(&d.interchange_data);
            }
            TypeSpecificData::Binary(b) | TypeSpecificData::FileTransfer(b) => b.write(&mut out),
            TypeSpecificData::Command(data) | TypeSpecificData::Other { data, .. } => {
                out.extend_from_slice(data)
            }
        }
        out
    }
}

impl BinaryMedia {
    fn read(reader: &mut Reader) -> Result<Self> {
        let mut media = BinaryMedia {
            major_media_type: reader.read_guid()?,
            media_subtype: reader.read_guid()?,
            fixed_size_samples: reader.read_le_u32()?,
            temporal_compression: reader.read_le_u32()?,
            sample_size: reader.read_le_u32()?,
            format_type: reader.read_guid()?,
            format_data: Vec::new(),
        };
        let len = reader.read_le_u32()? as u64;
        media.format_data = reader.read(len)?;
        Ok(media)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.major_media_type.to_ms_bytes());
        out.extend_from_slice(&self.media_subtype.to_ms_bytes());
        out.extend_from_slice(&self.fixed_size_samples.to_le_bytes());
        out.extend_from_slice(&self.temporal_compression.to_le_bytes());
        out.extend_from_slice(&self.sample_size.to_le_bytes());
        out.extend_from_slice(&self.format_type.to_ms_bytes());
        out.extend_from_slice(&(self.format_data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.format_data);
    }
}

impl ErrorCorrection {
    fn parse(kind: Guid, data: Vec<u8>) -> Result<Self> {
        match kind {
            guids::NO_ERROR_CORRECTION => Ok(ErrorCorrection::None),
            guids::AUDIO_SPREAD => {
                let mut reader = Reader::from_bytes(data);
                let span = reader.read_u8()?;
                let virtual_packet_length = reader.read_le_u16()?;
                let virtual_chunk_length = reader.read_le_u16()?;
                let len = reader.read_le_u16()? as u64;
                Ok(ErrorCorrection::AudioSpread {
                    span,
                    virtual_packet_length,
                    virtual_chunk_length,
                    silence_data: reader.read(len)?,
                })
            }
            other => Ok(ErrorCorrection::Other { kind: other, data }),
        }
    }

    pub fn kind(&self) -> Guid {
        match self {
            ErrorCorrection::None => guids::NO_ERROR_CORRECTION,
            ErrorCorrection::AudioSpread { .. } => guids::AUDIO_SPREAD,
            ErrorCorrection::Other { kind, .. } => *kind,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            ErrorCorrection::None => Vec::new(),
            ErrorCorrection::AudioSpread {
                span,
                virtual_packet_length,
                virtual_chunk_length,
                silence_data,
            } => {
                let mut out = vec![*span];
                out.extend_from_slice(&virtual_packet_length.to_le_bytes());
                out.extend_from_slice(&virtual_chunk_length.to_le_bytes());
                out.extend_from_slice(&(silence_data.len() as u16).to_le_bytes());
                out.extend_from_slice(silence_data);
                out
            }
            ErrorCorrection::Other { data, .. } => data.clone(),
        }
    }
}
