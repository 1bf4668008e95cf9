// Generic trees of self-describing binary nodes
//
// ASF objects, ISO boxes and ID3v2 frames share one shape: a header carrying a
// type identifier and a declared length, followed by a body that may nest more
// nodes. A `Format` describes the header layout of one family and owns the
// registry that maps identifiers to body decoders; `Tree` holds the decoded
// nodes in an arena and `Decoder` walks a `Reader` to fill it.

pub mod arena;
pub mod decoder;
pub mod node;
pub mod pattern;
pub mod registry;

pub use arena::{NodeId, Tree, Wrapper};
pub use decoder::Decoder;
pub use node::{ByteSpan, Children, EncodeContext, Header, Node};
pub use pattern::IdPattern;
pub use registry::{DecodeFn, Decoded, Entry, Registry};

use crate::error::Result;
use crate::utils::io::Reader;
use std::fmt;
use std::hash::Hash;

/// Type tag of a node: GUID, FourCC or frame id
pub trait Identifier: Clone + Eq + Hash + fmt::Debug + fmt::Display {
    /// Whether wildcard lookups ignore case for this identifier
    fn case_insensitive(&self) -> bool {
        false
    }
}

/// Header layout, body codec and decoder table of one node family
pub trait Format: Sized {
    type Id: Identifier;
    type Body: fmt::Debug;

    /// Short name used in errors and logs
    const NAME: &'static str;

    /// Decoders used for children unless a container picks another table
    fn registry(&self) -> &Registry<Self>;

    /// Read a node header at the cursor. `end` is the enclosing boundary.
    fn read_header(&self, reader: &mut Reader, end: u64) -> Result<Header<Self::Id>>;

    /// True when the bytes at the cursor end the sequence (zero padding)
    fn at_padding(&self, _reader: &mut Reader) -> Result<bool> {
        Ok(false)
    }

    /// Header length for a node whose body is `body_len` bytes long
    fn header_len(&self, identifier: &Self::Id, body_len: u64) -> u64;

    fn write_header(
        &self,
        identifier: &Self::Id,
        body: Option<&Self::Body>,
        size: u64,
        out: &mut Vec<u8>,
    ) -> Result<()>;

    /// Write the body bytes that precede any children
    fn encode_body(
        &self,
        body: &Self::Body,
        cx: &mut EncodeContext<'_>,
        out: &mut Vec<u8>,
    ) -> Result<()>;

    /// Re-emit a transparent wrapper around the children that were spliced out of it
    fn encode_wrapper(
        &self,
        wrapper: &Wrapper<Self::Id>,
        content: Vec<u8>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let body_len = (wrapper.preamble.len() + content.len()) as u64;
        let size = self.header_len(&wrapper.identifier, body_len) + body_len;
        self.write_header(&wrapper.identifier, None, size, out)?;
        out.extend_from_slice(&wrapper.preamble);
        out.extend(content);
        Ok(())
    }

    /// Identifier implied by a body built in memory
    fn identify(&self, _body: &Self::Body) -> Option<Self::Id> {
        None
    }

    /// Resolve a human-readable alias such as `fileProperties`
    fn resolve_alias(&self, _name: &str) -> Option<Self::Id> {
        None
    }
}

/// Normalise an alias for comparison: case and underscores are ignored
pub(crate) fn alias_key(name: &str) -> String {
    name.chars()
        .filter(|&c| c != '_' && c != '-' && c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}
