// ID3 metadata handling module
pub mod frames;
pub mod v1;
pub mod v2;

pub use frames::{FrameContent, FrameFlags, FrameId};
pub use v1::Id3v1Tag;
pub use v2::{Frame, Id3Layout, Id3Node, Id3v2, TagHeader};
