// MPEG audio frame headers

use crate::error::{Error, Result};
use crate::utils::io::Reader;
use serde::Serialize;
use std::fmt;

pub const FRAME_HEADER_LEN: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Version {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Layer {
    I,
    II,
    III,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Emphasis {
    None,
    Ms50_15,
    Reserved,
    CcittJ17,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Version::Mpeg1 => "MPEG-1",
            Version::Mpeg2 => "MPEG-2",
            Version::Mpeg25 => "MPEG-2.5",
        })
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layer::I => "Layer I",
            Layer::II => "Layer II",
            Layer::III => "Layer III",
        })
    }
}

/// Bitrates in kbit/s by index
const BITRATE_V1_L1: [u32; 15] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const BITRATE_V1_L2: [u32; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const BITRATE_V1_L3: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATE_V2_L1: [u32; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
const BITRATE_V2_L23: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

const SAMPLE_RATE_V1: [u32; 3] = [44100, 48000, 32000];

/// Decoded 32-bit frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameHeader {
    pub version: Version,
    pub layer: Layer,
    /// A 16-bit CRC follows the header
    pub protected: bool,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub private: bool,
    pub channel_mode: ChannelMode,
    pub mode_extension: u8,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: Emphasis,
}

impl FrameHeader {
    /// Decode a header word; `offset` is only used for error reporting
    pub fn parse(word: u32, offset: u64) -> Result<Self> {
        if word >> 21 != 0x7FF {
            return Err(Error::malformed(offset, format!("no frame sync in {:08x}", word)));
        }
        let version = match (word >> 19) & 0b11 {
            0 => Version::Mpeg25,
            2 => Version::Mpeg2,
            3 => Version::Mpeg1,
            _ => return Err(Error::malformed(offset, "reserved MPEG version")),
        };
        let layer = match (word >> 17) & 0b11 {
            1 => Layer::III,
            2 => Layer::II,
            3 => Layer::I,
            _ => return Err(Error::malformed(offset, "reserved MPEG layer")),
        };

        let bitrate_index = ((word >> 12) & 0xF) as usize;
        if bitrate_index == 0 {
            return Err(Error::malformed(offset, "free format bitrate is not supported"));
        }
        if bitrate_index == 15 {
            return Err(Error::malformed(offset, "bad bitrate index"));
        }
        let table = match (version, layer) {
            (Version::Mpeg1, Layer::I) => &BITRATE_V1_L1,
            (Version::Mpeg1, Layer::II) => &BITRATE_V1_L2,
            (Version::Mpeg1, Layer::III) => &BITRATE_V1_L3,
            (_, Layer::I) => &BITRATE_V2_L1,
            (_, _) => &BITRATE_V2_L23,
        };

        let rate_index = ((word >> 10) & 0b11) as usize;
        let base_rate = *SAMPLE_RATE_V1
            .get(rate_index)
            .ok_or_else(|| Error::malformed(offset, "reserved sampling rate"))?;
        let sample_rate = match version {
            Version::Mpeg1 => base_rate,
            Version::Mpeg2 => base_rate / 2,
            Version::Mpeg25 => base_rate / 4,
        };

        let channel_mode = match (word >> 6) & 0b11 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };
        let emphasis = match word & 0b11 {
            0 => Emphasis::None,
            1 => Emphasis::Ms50_15,
            2 => Emphasis::Reserved,
            _ => Emphasis::CcittJ17,
        };

        Ok(Self {
            version,
            layer,
            protected: (word >> 16) & 1 == 0,
            bitrate_kbps: table[bitrate_index],
            sample_rate,
            padding: (word >> 9) & 1 == 1,
            private: (word >> 8) & 1 == 1,
            channel_mode,
            mode_extension: ((word >> 4) & 0b11) as u8,
            copyright: (word >> 3) & 1 == 1,
            original: (word >> 2) & 1 == 1,
            emphasis,
        })
    }

    /// Samples per channel in one frame
    pub fn samples(&self) -> u32 {
        match (self.layer, self.version) {
            (Layer::I, _) => 384,
            (Layer::II, _) => 1152,
            (Layer::III, Version::Mpeg1) => 1152,
            (Layer::III, _) => 576,
        }
    }

    /// Total frame length in bytes, header included
    pub fn frame_len(&self) -> u64 {
        let bitrate = u64::from(self.bitrate_kbps) * 1000;
        let rate = u64::from(self.sample_rate);
        let padding = u64::from(self.padding);
        match (self.layer, self.version) {
            (Layer::I, _) => (12 * bitrate / rate + padding) * 4,
            (Layer::III, Version::Mpeg2 | Version::Mpeg25) => 72 * bitrate / rate + padding,
            _ => 144 * bitrate / rate + padding,
        }
    }

    /// Layer III side information length, which is where a Xing header starts
    pub fn side_info_len(&self) -> u64 {
        let mono = self.channel_mode == ChannelMode::Mono;
        match (self.version, mono) {
            (Version::Mpeg1, false) => 32,
            (Version::Mpeg1, true) => 17,
            (_, false) => 17,
            (_, true) => 9,
        }
    }

    pub fn channels(&self) -> u8 {
        if self.channel_mode == ChannelMode::Mono {
            1
        } else {
            2
        }
    }

    /// Play time of one frame in seconds
    pub fn duration(&self) -> f64 {
        f64::from(self.samples()) / f64::from(self.sample_rate)
    }
}

/// A frame located in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub offset: u64,
    pub header: FrameHeader,
}

impl Frame {
    /// Decode the header at the cursor and move past the whole frame
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let offset = reader.tell();
        let header = FrameHeader::parse(reader.read_be_u32()?, offset)?;
        reader.seek_to(offset + header.frame_len())?;
        Ok(Self { offset, header })
    }

    pub fn end(&self) -> u64 {
        self.offset + self.header.frame_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mpeg1_layer3_128k_44100() {
        let header = FrameHeader::parse(0xFFFB_9064, 0).unwrap();
        assert_eq!(header.version, Version::Mpeg1);
        assert_eq!(header.layer, Layer::III);
        assert_eq!(header.bitrate_kbps, 128);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channel_mode, ChannelMode::JointStereo);
        assert!(!header.protected);
        assert!(!header.padding);
        assert_eq!(header.samples(), 1152);
        assert_eq!(header.frame_len(), 417);
        assert_eq!(header.side_info_len(), 32);
    }

    #[test]
    fn test_padding_and_mono() {
        // 320 kbit/s, 48 kHz, padded, mono
        let header = FrameHeader::parse(0xFFFB_E6C0, 0).unwrap();
        assert_eq!(header.bitrate_kbps, 320);
        assert_eq!(header.sample_rate, 48000);
        assert!(header.padding);
        assert_eq!(header.channels(), 1);
        assert_eq!(header.frame_len(), 961);
        assert_eq!(header.side_info_len(), 17);
    }

    #[test]
    fn test_mpeg2_layer3_uses_half_frames() {
        // MPEG-2, Layer III, 64 kbit/s, 22.05 kHz, stereo
        let header = FrameHeader::parse(0xFFF3_8000, 0).unwrap();
        assert_eq!(header.version, Version::Mpeg2);
        assert_eq!(header.bitrate_kbps, 64);
        assert_eq!(header.sample_rate, 22050);
        assert_eq!(header.samples(), 576);
        assert_eq!(header.frame_len(), 208);
        assert_eq!(header.side_info_len(), 17);
    }

    #[test]
    fn test_layer1_frame_length() {
        // MPEG-1, Layer I, 384 kbit/s, 32 kHz
        let header = FrameHeader::parse(0xFFFF_C800, 0).unwrap();
        assert_eq!(header.layer, Layer::I);
        assert_eq!(header.bitrate_kbps, 384);
        assert_eq!(header.sample_rate, 32000);
        assert_eq!(header.frame_len(), 576);
        assert_eq!(header.samples(), 384);
    }

    #[test]
    fn test_invalid_headers() {
        assert!(matches!(FrameHeader::parse(0x1234_5678, 7), Err(Error::Malformed { offset: 7, .. })));
        // reserved version
        assert!(FrameHeader::parse(0xFFEB_9064, 0).is_err());
        // free format
        assert!(FrameHeader::parse(0xFFFB_0064, 0).is_err());
        // bad bitrate
        assert!(FrameHeader::parse(0xFFFB_F064, 0).is_err());
        // reserved sampling rate
        assert!(FrameHeader::parse(0xFFFB_9C64, 0).is_err());
    }

    #[test]
    fn test_frame_read_skips_body() {
        let mut data = 0xFFFB_9064u32.to_be_bytes().to_vec();
        data.resize(417, 0);
        data.extend_from_slice(&0xFFFB_9064u32.to_be_bytes());
        let mut reader = Reader::from_bytes(data);
        let frame = Frame::read(&mut reader).unwrap();
        assert_eq!(frame.end(), 417);
        assert_eq!(reader.tell(), 417);
    }
}
