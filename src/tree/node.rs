// Node headers, bodies and ordered child collections

use super::{Format, Identifier, NodeId};
use crate::error::{Error, Result};
use crate::utils::io::Reader;

/// Decoded node header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header<I> {
    /// Where the header starts in the source; `None` for nodes built in memory
    pub offset: Option<u64>,
    pub identifier: I,
    /// Total length including the header
    pub size: u64,
    pub header_len: u64,
    /// Header-level flag bits (ID3v2 frames); zero elsewhere
    pub flags: u16,
}

impl<I> Header<I> {
    pub fn new(offset: u64, identifier: I, size: u64, header_len: u64) -> Self {
        Self {
            offset: Some(offset),
            identifier,
            size,
            header_len,
            flags: 0,
        }
    }

    pub fn detached(identifier: I) -> Self {
        Self {
            offset: None,
            identifier,
            size: 0,
            header_len: 0,
            flags: 0,
        }
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn start(&self) -> u64 {
        self.offset.unwrap_or(0)
    }

    /// One past the last byte of the node
    pub fn end(&self) -> u64 {
        self.start() + self.size
    }

    pub fn body_start(&self) -> u64 {
        self.start() + self.header_len
    }

    pub fn body_len(&self) -> u64 {
        self.size.saturating_sub(self.header_len)
    }
}

/// Children in stream order, keyed by identifier
#[derive(Debug, Clone)]
pub struct Children<I> {
    entries: Vec<(I, NodeId)>,
}

impl<I> Default for Children<I> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<I: Identifier> Children<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identifier: I, id: NodeId) {
        self.entries.push((identifier, id));
    }

    pub fn extend(&mut self, other: Children<I>) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Node ids in stream order
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&I, NodeId)> + '_ {
        self.entries.iter().map(|(identifier, id)| (identifier, *id))
    }

    /// The bucket for one identifier, in stream order
    pub fn get<'a>(&'a self, identifier: &'a I) -> impl Iterator<Item = NodeId> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key == identifier)
            .map(|(_, id)| *id)
    }

    /// Distinct identifiers in order of first appearance
    pub fn identifiers(&self) -> Vec<&I> {
        let mut seen: Vec<&I> = Vec::new();
        for (identifier, _) in &self.entries {
            if !seen.contains(&identifier) {
                seen.push(identifier);
            }
        }
        seen
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.iter().any(|(_, child)| *child == id)
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(_, child)| *child != id);
        before != self.entries.len()
    }
}

/// Uninterpreted body bytes, kept as a source range until needed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteSpan {
    Source { offset: u64, len: u64 },
    Owned(Vec<u8>),
}

impl ByteSpan {
    pub fn len(&self) -> u64 {
        match self {
            ByteSpan::Source { len, .. } => *len,
            ByteSpan::Owned(data) => data.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialise the bytes, reading them from `source` when not held in memory
    pub fn load(&self, source: Option<&mut Reader>) -> Result<Vec<u8>> {
        match (self, source) {
            (ByteSpan::Owned(data), _) => Ok(data.clone()),
            (ByteSpan::Source { offset, len }, Some(reader)) => {
                let saved = reader.tell();
                reader.seek_to(*offset)?;
                let data = reader.read(*len);
                reader.seek_to(saved)?;
                data
            }
            (ByteSpan::Source { offset, .. }, None) => Err(Error::Configuration(format!(
                "bytes at offset {} need the original source to be encoded",
                offset
            ))),
        }
    }
}

/// State handed to body encoders
pub struct EncodeContext<'a> {
    pub(crate) source: Option<&'a mut Reader>,
    /// Number of encoded child units (a re-wrapped group counts once)
    pub child_count: usize,
}

impl<'a> EncodeContext<'a> {
    pub fn new(source: Option<&'a mut Reader>, child_count: usize) -> Self {
        Self {
            source,
            child_count,
        }
    }

    pub fn load(&mut self, span: &ByteSpan) -> Result<Vec<u8>> {
        span.load(self.source.as_deref_mut())
    }
}

/// One decoded node in a tree
#[derive(Debug)]
pub struct Node<F: Format> {
    pub(crate) header: Header<F::Id>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Children<F::Id>,
    pub(crate) body: F::Body,
    pub(crate) wrapper: Option<usize>,
}

impl<F: Format> Node<F> {
    pub fn header(&self) -> &Header<F::Id> {
        &self.header
    }

    pub fn identifier(&self) -> &F::Id {
        &self.header.identifier
    }

    pub fn offset(&self) -> Option<u64> {
        self.header.offset
    }

    pub fn size(&self) -> u64 {
        self.header.size
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &Children<F::Id> {
        &self.children
    }

    pub fn body(&self) -> &F::Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut F::Body {
        &mut self.body
    }

    /// True when the node was spliced out of a transparent wrapper
    pub fn is_wrapped(&self) -> bool {
        self.wrapper.is_some()
    }
}
