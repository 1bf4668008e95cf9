// Xing/Info, LAME and VBRI summary headers found in the first MPEG audio frame

use crate::error::{Error, Result};
use crate::utils::io::Reader;
use serde::Serialize;

/// Offset of a VBRI header from the frame start, past the 4-byte frame header
pub const VBRI_OFFSET: u64 = 32;

/// Xing (variable bitrate) or Info (constant bitrate) header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XingHeader {
    /// `Xing` rather than `Info`
    pub vbr: bool,
    pub frames: Option<u32>,
    pub bytes: Option<u32>,
    /// 100 seek points, each a fraction of the stream length out of 256
    pub toc: Option<Vec<u8>>,
    pub quality: Option<u32>,
}

impl XingHeader {
    const FRAMES: u32 = 0x1;
    const BYTES: u32 = 0x2;
    const TOC: u32 = 0x4;
    const QUALITY: u32 = 0x8;

    /// Read the fields that follow the `Xing`/`Info` tag
    pub fn read(reader: &mut Reader, vbr: bool) -> Result<Self> {
        let flags = reader.read_be_u32()?;
        let frames = if flags & Self::FRAMES != 0 {
            Some(reader.read_be_u32()?)
        } else {
            None
        };
        let bytes = if flags & Self::BYTES != 0 {
            Some(reader.read_be_u32()?)
        } else {
            None
        };
        let toc = if flags & Self::TOC != 0 {
            Some(reader.read(100)?)
        } else {
            None
        };
        let quality = if flags & Self::QUALITY != 0 {
            Some(reader.read_be_u32()?)
        } else {
            None
        };
        Ok(Self {
            vbr,
            frames,
            bytes,
            toc,
            quality,
        })
    }

    /// Length of the header including the tag and flag word
    pub fn encoded_len(&self) -> u64 {
        8 + [self.frames.is_some(), self.bytes.is_some(), self.quality.is_some()]
            .iter()
            .filter(|&&present| present)
            .count() as u64
            * 4
            + if self.toc.is_some() { 100 } else { 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VbrMethod {
    Unknown,
    Constant,
    Abr,
    /// VBR, old method (`--vbr-old`)
    Rh,
    /// VBR, new method (`--vbr-new`)
    Mtrh,
    Mt,
    ConstantTwoPass,
    AbrTwoPass,
    Reserved(u8),
}

impl From<u8> for VbrMethod {
    fn from(value: u8) -> Self {
        match value {
            0 => VbrMethod::Unknown,
            1 => VbrMethod::Constant,
            2 => VbrMethod::Abr,
            3 => VbrMethod::Rh,
            4 => VbrMethod::Mtrh,
            5 => VbrMethod::Mt,
            8 => VbrMethod::ConstantTwoPass,
            9 => VbrMethod::AbrTwoPass,
            other => VbrMethod::Reserved(other),
        }
    }
}

/// One ReplayGain field of the LAME tag
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplayGain {
    /// 0 not set, 1 radio, 2 audiophile
    pub name: u8,
    /// 0 not set, 1 artist, 2 user, 3 automatic
    pub originator: u8,
    pub adjustment_db: f32,
}

impl ReplayGain {
    pub fn from_raw(raw: u16) -> Self {
        let magnitude = f32::from(raw & 0x1FF) / 10.0;
        Self {
            name: ((raw >> 13) & 0b111) as u8,
            originator: ((raw >> 10) & 0b111) as u8,
            adjustment_db: if raw & 0x200 != 0 { -magnitude } else { magnitude },
        }
    }

    pub fn is_set(&self) -> bool {
        self.name != 0
    }
}

/// LAME extension that follows a Xing/Info header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LameHeader {
    /// Encoder string such as `LAME3.99r`
    pub encoder: String,
    pub revision: u8,
    pub vbr_method: VbrMethod,
    pub lowpass_hz: u32,
    pub peak_amplitude: f32,
    pub radio_gain: ReplayGain,
    pub audiophile_gain: ReplayGain,
    pub encoding_flags: u8,
    pub ath_type: u8,
    /// ABR target or minimal VBR bitrate in kbit/s; 255 means 255 or more
    pub bitrate: u8,
    pub encoder_delay: u16,
    pub padded_samples: u16,
    /// 0 up to 32 kHz, 1 44.1 kHz, 2 48 kHz, 3 higher
    pub source_frequency: u8,
    pub unwise_settings: bool,
    pub stereo_mode: u8,
    pub noise_shaping: u8,
    /// Gain change applied by mp3gain, in 1.5 dB steps
    pub mp3_gain: i8,
    pub surround: u8,
    pub preset: u16,
    /// Bytes from the first frame to the last, both included
    pub music_length: u32,
    pub music_crc: u16,
    pub crc: u16,
}

impl LameHeader {
    pub const NSPSYTUNE: u8 = 0x1;
    pub const NSSAFEJOINT: u8 = 0x2;
    pub const NOGAP_CONTINUED: u8 = 0x4;
    pub const NOGAP_CONTINUATION: u8 = 0x8;

    /// Read the tag starting at the `LAME` marker
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let start = reader.tell();
        let encoder = reader.read(9)?;
        if &encoder[..4] != b"LAME" {
            return Err(Error::malformed(start, "LAME tag does not start with LAME"));
        }
        let encoder = String::from_utf8_lossy(&encoder).trim_end_matches('\0').to_string();

        let method = reader.read_u8()?;
        let lowpass_hz = u32::from(reader.read_u8()?) * 100;
        let peak_amplitude = f32::from_bits(reader.read_be_u32()?);
        let radio_gain = ReplayGain::from_raw(reader.read_be_u16()?);
        let audiophile_gain = ReplayGain::from_raw(reader.read_be_u16()?);
        let flags = reader.read_u8()?;
        let bitrate = reader.read_u8()?;
        let packed = reader.read_be_u32()?;
        let mp3_gain = reader.read_i8()?;
        let preset = reader.read_be_u16()?;

        Ok(Self {
            encoder,
            revision: method >> 4,
            vbr_method: VbrMethod::from(method & 0xF),
            lowpass_hz,
            peak_amplitude,
            radio_gain,
            audiophile_gain,
            encoding_flags: flags >> 4,
            ath_type: flags & 0xF,
            bitrate,
            encoder_delay: (packed >> 20) as u16,
            padded_samples: ((packed >> 8) & 0xFFF) as u16,
            source_frequency: ((packed >> 6) & 0b11) as u8,
            unwise_settings: packed & 0x20 != 0,
            stereo_mode: ((packed >> 2) & 0b111) as u8,
            noise_shaping: (packed & 0b11) as u8,
            mp3_gain,
            surround: ((preset >> 11) & 0b111) as u8,
            preset: preset & 0x7FF,
            music_length: reader.read_be_u32()?,
            music_crc: reader.read_be_u16()?,
            crc: reader.read_be_u16()?,
        })
    }

    /// Linear factor of the mp3gain adjustment
    pub fn mp3_gain_factor(&self) -> f64 {
        2f64.powf(f64::from(self.mp3_gain) / 4.0)
    }
}

/// Fraunhofer VBRI header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VbriHeader {
    pub version: u16,
    pub delay: u16,
    pub quality: u16,
    pub bytes: u32,
    pub frames: u32,
    pub toc_scale: u16,
    pub frames_per_entry: u16,
    /// Byte length of each seek interval, already multiplied by the scale
    pub toc: Vec<u32>,
}

impl VbriHeader {
    /// Read the fields that follow the `VBRI` tag
    pub fn read(reader: &mut Reader) -> Result<Self> {
        let version = reader.read_be_u16()?;
        let delay = reader.read_be_u16()?;
        let quality = reader.read_be_u16()?;
        let bytes = reader.read_be_u32()?;
        let frames = reader.read_be_u32()?;
        let entries = reader.read_be_u16()?;
        let toc_scale = reader.read_be_u16()?;
        let entry_len = reader.read_be_u16()?;
        let frames_per_entry = reader.read_be_u16()?;
        if !(1..=4).contains(&entry_len) {
            return Err(Error::malformed(
                reader.tell(),
                format!("VBRI table entries of {} bytes", entry_len),
            ));
        }

        let mut toc = Vec::with_capacity(usize::from(entries));
        for _ in 0..entries {
            let raw = reader
                .read(u64::from(entry_len))?
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            toc.push(raw.saturating_mul(u32::from(toc_scale)));
        }
        Ok(Self {
            version,
            delay,
            quality,
            bytes,
            frames,
            toc_scale,
            frames_per_entry,
            toc,
        })
    }
}
