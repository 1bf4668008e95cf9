// MPEG-1/2/2.5 audio streams
pub mod audio;
pub mod frame;
pub mod vbr;

pub use audio::{format_time, Estimate, EstimateSource, MpegAudio};
pub use frame::{ChannelMode, Emphasis, Frame, FrameHeader, Layer, Version};
pub use vbr::{LameHeader, ReplayGain, VbrMethod, VbriHeader, XingHeader};
