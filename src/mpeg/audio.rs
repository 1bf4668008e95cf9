// MPEG audio stream: bitrate and play time, estimated or exact

use super::frame::{Frame, FrameHeader, FRAME_HEADER_LEN};
use super::vbr::{LameHeader, VbriHeader, XingHeader, VBRI_OFFSET};
use crate::config::{Options, ReadMode};
use crate::error::{Error, Result};
use crate::id3::Id3v1Tag;
use crate::utils::io::Reader;
use log::{debug, trace};
use serde::Serialize;
use std::path::Path;

const SYNC_SCAN_LIMIT: u64 = 64 * 1024;

/// Where the current bitrate and play time figures come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimateSource {
    XingHeader,
    VbriHeader,
    /// Extrapolated from the first `estimate_precision` frames
    SampledFrames,
    /// Every frame has been read
    AllFrames,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub bitrate_kbps: f64,
    pub duration_secs: f64,
    pub source: EstimateSource,
}

/// Sum of per-frame figures over the frames read so far
#[derive(Debug, Default)]
struct Accumulator {
    frames: Vec<Frame>,
    bitrate_kbps: u64,
    duration_secs: f64,
    /// Offset to resume from after a bounded read
    resume: Option<u64>,
    complete: bool,
}

impl Accumulator {
    fn mean_bitrate(&self) -> Option<f64> {
        (!self.frames.is_empty()).then(|| self.bitrate_kbps as f64 / self.frames.len() as f64)
    }
}

/// An MPEG audio stream, possibly wrapped in ID3 tags
#[derive(Debug)]
pub struct MpegAudio {
    reader: Reader,
    options: Options,
    /// First byte of the first frame
    audio_start: u64,
    /// One past the last audio byte (an ID3v1 trailer is excluded)
    audio_end: u64,
    first: FrameHeader,
    xing: Option<XingHeader>,
    lame: Option<LameHeader>,
    vbri: Option<VbriHeader>,
    acc: Accumulator,
    estimate: Estimate,
}

impl MpegAudio {
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        Self::from_reader(Reader::open(path)?, options)
    }

    /// Locate the first frame, probe for VBR headers and compute the estimate
    pub fn from_reader(mut reader: Reader, options: Options) -> Result<Self> {
        options.validate()?;
        let mut audio_end = reader.size();
        if Id3v1Tag::is_present(&mut reader)? {
            audio_end -= Id3v1Tag::TAG_SIZE;
        }
        skip_id3v2(&mut reader)?;

        let (audio_start, first) = find_first_frame(&mut reader, audio_end)?;
        debug!(
            "MPEG: {} {} {} kbit/s {} Hz at {}",
            first.version, first.layer, first.bitrate_kbps, first.sample_rate, audio_start
        );

        let (xing, lame) = probe_xing(&mut reader, audio_start, &first)?;
        let vbri = if xing.is_none() {
            probe_vbri(&mut reader, audio_start)?
        } else {
            None
        };
        reader.seek_to(audio_start)?;

        let mut audio = Self {
            reader,
            options,
            audio_start,
            audio_end,
            first,
            xing,
            lame,
            vbri,
            acc: Accumulator::default(),
            estimate: Estimate {
                bitrate_kbps: 0.0,
                duration_secs: 0.0,
                source: EstimateSource::SampledFrames,
            },
        };
        audio.estimate = audio.initial_estimate()?;
        Ok(audio)
    }

    fn initial_estimate(&mut self) -> Result<Estimate> {
        if self.options.read_mode == ReadMode::Eager {
            self.read_frames(None)?;
            return self.exact();
        }
        if let Some(estimate) = self.header_estimate() {
            return Ok(estimate);
        }

        self.read_frames(Some(self.options.estimate_precision))?;
        if self.acc.complete {
            return self.exact();
        }
        let bitrate_kbps = self.acc.mean_bitrate().unwrap_or(0.0);
        let bytes = (self.audio_end - self.audio_start) as f64;
        let duration_secs = if bitrate_kbps > 0.0 {
            bytes / (bitrate_kbps * 1000.0 / 8.0)
        } else {
            0.0
        };
        Ok(Estimate {
            bitrate_kbps,
            duration_secs,
            source: EstimateSource::SampledFrames,
        })
    }

    /// Closed-form figures from a Xing or VBRI frame count
    fn header_estimate(&self) -> Option<Estimate> {
        let (frames, bytes, source) = match (&self.xing, &self.vbri) {
            (Some(xing), _) => (xing.frames?, xing.bytes, EstimateSource::XingHeader),
            (None, Some(vbri)) => (vbri.frames, Some(vbri.bytes), EstimateSource::VbriHeader),
            (None, None) => return None,
        };
        if frames == 0 {
            return None;
        }
        let duration_secs = f64::from(frames) * self.first.duration();

        let lame_bitrate = self.lame.as_ref().and_then(|lame| match lame.bitrate {
            0 => None,
            255 => Some(f64::from(lame.music_length) * 8.0 / duration_secs / 1000.0),
            kbps => Some(f64::from(kbps)),
        });
        let bytes = bytes
            .map(u64::from)
            .unwrap_or(self.audio_end - self.audio_start) as f64;
        let bitrate_kbps = lame_bitrate.unwrap_or(bytes * 8.0 / duration_secs / 1000.0);
        debug!("MPEG: {:?} reports {} frames, {:.3} s", source, frames, duration_secs);
        Some(Estimate {
            bitrate_kbps,
            duration_secs,
            source,
        })
    }

    /// Read frames from where the last read stopped, at most `limit` more
    fn read_frames(&mut self, limit: Option<usize>) -> Result<()> {
        if self.acc.complete {
            return Ok(());
        }
        let start = self.acc.resume.unwrap_or(self.audio_start);
        self.reader.seek_to(start)?;
        self.reader.push_limit(self.audio_end);
        let result = self.accumulate(limit);
        self.reader.pop_limit();
        result
    }

    fn accumulate(&mut self, limit: Option<usize>) -> Result<()> {
        let mut read = 0;
        while self.reader.available() >= FRAME_HEADER_LEN {
            if limit.is_some_and(|limit| read >= limit) {
                self.acc.resume = Some(self.reader.tell());
                return Ok(());
            }
            let frame = Frame::read(&mut self.reader)?;
            trace!("MPEG: frame at {} ({} kbit/s)", frame.offset, frame.header.bitrate_kbps);
            self.acc.bitrate_kbps += u64::from(frame.header.bitrate_kbps);
            self.acc.duration_secs += frame.header.duration();
            self.acc.frames.push(frame);
            // counted frames are never read twice, even if a later one fails
            self.acc.resume = Some(self.reader.tell());
            read += 1;
        }
        self.acc.resume = None;
        self.acc.complete = true;
        Ok(())
    }

    fn exact(&self) -> Result<Estimate> {
        let bitrate_kbps = self
            .acc
            .mean_bitrate()
            .ok_or_else(|| Error::malformed(self.audio_start, "stream holds no MPEG frames"))?;
        Ok(Estimate {
            bitrate_kbps,
            duration_secs: self.acc.duration_secs,
            source: EstimateSource::AllFrames,
        })
    }

    /// Figures available without further reading
    pub fn estimate(&self) -> Estimate {
        self.estimate
    }

    pub fn bitrate_estimate(&self) -> f64 {
        self.estimate.bitrate_kbps
    }

    pub fn duration_estimate(&self) -> f64 {
        self.estimate.duration_secs
    }

    pub fn source(&self) -> EstimateSource {
        self.estimate.source
    }

    /// True once every frame has been read and the figures are final
    pub fn is_exact(&self) -> bool {
        self.acc.complete
    }

    /// Read every remaining frame once and return the exact figures
    pub fn exact_estimate(&mut self) -> Result<Estimate> {
        if !self.acc.complete {
            self.read_frames(None)?;
            self.estimate = self.exact()?;
        }
        Ok(self.estimate)
    }

    /// Mean frame bitrate in kbit/s over the whole stream
    pub fn bitrate(&mut self) -> Result<f64> {
        Ok(self.exact_estimate()?.bitrate_kbps)
    }

    /// Total play time in seconds over the whole stream
    pub fn duration(&mut self) -> Result<f64> {
        Ok(self.exact_estimate()?.duration_secs)
    }

    pub fn frames(&mut self) -> Result<&[Frame]> {
        self.exact_estimate()?;
        Ok(&self.acc.frames)
    }

    /// Frames read so far
    pub fn frames_read(&self) -> usize {
        self.acc.frames.len()
    }

    pub fn first_frame(&self) -> &FrameHeader {
        &self.first
    }

    pub fn xing(&self) -> Option<&XingHeader> {
        self.xing.as_ref()
    }

    pub fn lame(&self) -> Option<&LameHeader> {
        self.lame.as_ref()
    }

    pub fn vbri(&self) -> Option<&VbriHeader> {
        self.vbri.as_ref()
    }

    /// Byte range of the audio frames
    pub fn audio_range(&self) -> (u64, u64) {
        (self.audio_start, self.audio_end)
    }
}

/// Move past a leading ID3v2 tag, footer included
fn skip_id3v2(reader: &mut Reader) -> Result<()> {
    let start = reader.tell();
    if !reader.check_signature(b"ID3")? {
        return Ok(());
    }
    let header = reader.read(10)?;
    let size = crate::utils::bytes::decode_syncsafe([header[6], header[7], header[8], header[9]]);
    let footer = if header[5] & 0x10 != 0 { 10 } else { 0 };
    let end = start + 10 + u64::from(size) + footer;
    debug!("MPEG: skipping ID3v2 tag of {} bytes", end - start);
    reader.seek_to(end)
}

/// Scan for the first valid frame header within `SYNC_SCAN_LIMIT` bytes
fn find_first_frame(reader: &mut Reader, end: u64) -> Result<(u64, FrameHeader)> {
    let start = reader.tell();
    reader.push_limit(end);
    let window = reader.peek(SYNC_SCAN_LIMIT + FRAME_HEADER_LEN);
    reader.pop_limit();
    let window = window?;

    let found = window.windows(4).enumerate().find_map(|(i, bytes)| {
        let word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let offset = start + i as u64;
        FrameHeader::parse(word, offset).ok().map(|header| (offset, header))
    });
    let (offset, header) = found.ok_or_else(|| {
        Error::signature("MPEG", format!("no frame sync within {} bytes of {}", SYNC_SCAN_LIMIT, start))
    })?;
    if offset > start {
        debug!("MPEG: skipped {} bytes of junk before the first frame", offset - start);
    }
    reader.seek_to(offset + FRAME_HEADER_LEN)?;
    Ok((offset, header))
}

/// Look for `Xing`/`Info` after the side information, then a chained `LAME` tag
fn probe_xing(
    reader: &mut Reader,
    frame_start: u64,
    first: &FrameHeader,
) -> Result<(Option<XingHeader>, Option<LameHeader>)> {
    let frame_end = (frame_start + first.frame_len()).min(reader.size());
    reader.seek_to(frame_start + FRAME_HEADER_LEN + first.side_info_len())?;
    reader.push_limit(frame_end);
    let result = read_xing(reader);
    reader.pop_limit();
    result
}

fn read_xing(reader: &mut Reader) -> Result<(Option<XingHeader>, Option<LameHeader>)> {
    let vbr = match reader.peek(4)?.as_slice() {
        b"Xing" => true,
        b"Info" => false,
        _ => return Ok((None, None)),
    };
    reader.skip(4)?;
    let xing = XingHeader::read(reader, vbr)?;
    debug!("MPEG: {} header, {:?} frames", if vbr { "Xing" } else { "Info" }, xing.frames);
    let lame = if reader.peek(4)? == b"LAME" {
        Some(LameHeader::read(reader)?)
    } else {
        None
    };
    Ok((Some(xing), lame))
}

fn probe_vbri(reader: &mut Reader, frame_start: u64) -> Result<Option<VbriHeader>> {
    let at = frame_start + FRAME_HEADER_LEN + VBRI_OFFSET;
    if at + 4 > reader.size() {
        return Ok(None);
    }
    reader.seek_to(at)?;
    if !reader.check_signature(b"VBRI")? {
        return Ok(None);
    }
    reader.skip(4)?;
    let vbri = VbriHeader::read(reader)?;
    debug!("MPEG: VBRI header, {} frames", vbri.frames);
    Ok(Some(vbri))
}

/// Format seconds as `m:ss`, or `h:mm:ss` past an hour
pub fn format_time(seconds: f64) -> String {
    let total = seconds.round().max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
