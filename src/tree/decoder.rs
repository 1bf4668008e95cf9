// Cursor-driven tree decoding

use super::{ByteSpan, Children, Entry, Format, Header, NodeId, Registry, Tree, Wrapper};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::utils::io::Reader;
use log::{trace, warn};

/// Deepest nesting accepted before the input is treated as hostile
pub const MAX_DEPTH: usize = 64;

/// Walks a reader and appends decoded nodes to a tree
pub struct Decoder<'a, F: Format> {
    format: &'a F,
    reader: &'a mut Reader,
    tree: &'a mut Tree<F>,
    options: &'a Options,
    depth: usize,
}

impl<'a, F: Format> Decoder<'a, F> {
    pub fn new(format: &'a F, reader: &'a mut Reader, tree: &'a mut Tree<F>, options: &'a Options) -> Self {
        Self {
            format,
            reader,
            tree,
            options,
            depth: 0,
        }
    }

    pub fn format(&self) -> &'a F {
        self.format
    }

    pub fn options(&self) -> &'a Options {
        self.options
    }

    pub fn reader(&mut self) -> &mut Reader {
        &mut *self.reader
    }

    /// Decode the node at the cursor and attach it to the root.
    ///
    /// Returns `None` once the root's source boundary or trailing padding is
    /// reached.
    /// With `outermost` set, a length running past the root is clamped
    /// instead of rejected.
    pub fn decode_next(&mut self, outermost: bool) -> Result<Option<NodeId>> {
        let root = self.tree.root();
        let end = self.tree.source_end();
        if self.reader.tell() >= end {
            return Ok(None);
        }

        self.reader.push_limit(end);
        let result = self.decode_root_child(end, outermost);
        self.reader.pop_limit();

        let decoded = result?;
        let mut first = None;
        for (_, id) in decoded.entries() {
            self.tree.attach(root, id)?;
            first.get_or_insert(id);
        }
        Ok(first)
    }

    fn decode_root_child(&mut self, end: u64, outermost: bool) -> Result<Children<F::Id>> {
        let mut decoded = Children::new();
        if self.format.at_padding(self.reader)? {
            trace!("{}: padding at {}, sequence ends", F::NAME, self.reader.tell());
            self.reader.seek_to(end)?;
            return Ok(decoded);
        }
        let format = self.format;
        self.decode_into(format.registry(), end, outermost, &mut decoded)?;
        if decoded.is_empty() {
            return Err(Error::Configuration(format!(
                "{}: transparent wrapper at the top level produced no nodes",
                F::NAME
            )));
        }
        Ok(decoded)
    }

    /// Decode the children of `header` with the format's default table
    pub fn decode_children(&mut self, header: &Header<F::Id>) -> Result<Children<F::Id>> {
        let format = self.format;
        self.decode_children_with(header, format.registry())
    }

    /// Decode nodes from the cursor up to the end of `header`
    pub fn decode_children_with(
        &mut self,
        header: &Header<F::Id>,
        registry: &Registry<F>,
    ) -> Result<Children<F::Id>> {
        let mut children = Children::new();
        self.decode_sequence(registry, header.end(), &mut children)?;
        Ok(children)
    }

    /// Remaining body bytes as a lazily loaded span
    pub fn span(&self, header: &Header<F::Id>) -> ByteSpan {
        let offset = self.reader.tell();
        ByteSpan::Source {
            offset,
            len: header.end().saturating_sub(offset),
        }
    }

    /// Read the remaining body bytes
    pub fn rest(&mut self) -> Result<Vec<u8>> {
        self.reader.read_rest()
    }

    fn decode_sequence(
        &mut self,
        registry: &Registry<F>,
        end: u64,
        into: &mut Children<F::Id>,
    ) -> Result<()> {
        while self.reader.tell() < end {
            if self.format.at_padding(self.reader)? {
                trace!("{}: padding at {}, sequence ends", F::NAME, self.reader.tell());
                break;
            }
            self.decode_into(registry, end, false, into)?;
        }
        Ok(())
    }

    fn decode_into(
        &mut self,
        registry: &Registry<F>,
        boundary: u64,
        outermost: bool,
        into: &mut Children<F::Id>,
    ) -> Result<()> {
        let start = self.reader.tell();
        let mut header = self.format.read_header(self.reader, boundary)?;
        if header.size < header.header_len {
            return Err(Error::malformed(
                start,
                format!(
                    "{} node {} declares {} bytes, less than its {}-byte header",
                    F::NAME,
                    header.identifier,
                    header.size,
                    header.header_len
                ),
            ));
        }

        let end = start
            .checked_add(header.size)
            .ok_or_else(|| Error::malformed(start, "declared length overflows"))?;
        if end > boundary {
            if !outermost {
                return Err(Error::malformed(
                    start,
                    format!(
                        "{} node {} ends at {}, past its parent boundary {}",
                        F::NAME,
                        header.identifier,
                        end,
                        boundary
                    ),
                ));
            }
            warn!(
                "{}: {} at {} overruns the source by {} bytes, clamping",
                F::NAME,
                header.identifier,
                start,
                end - boundary
            );
            header.size = boundary - start;
        }

        if self.depth >= MAX_DEPTH {
            return Err(Error::malformed(start, format!("nesting deeper than {} levels", MAX_DEPTH)));
        }

        let end = header.end();
        self.reader.push_limit(end);
        self.depth += 1;
        let result = self.decode_body(registry, &header, into);
        self.depth -= 1;
        self.reader.pop_limit();
        result?;

        self.reader.seek_to(end)
    }

    fn decode_body(
        &mut self,
        registry: &Registry<F>,
        header: &Header<F::Id>,
        into: &mut Children<F::Id>,
    ) -> Result<()> {
        match registry.lookup(&header.identifier) {
            Entry::Decode(decode) => {
                trace!("{}: {} at {} ({} bytes)", F::NAME, header.identifier, header.start(), header.size);
                let decoded = decode(self, header)?;
                let id = self.tree.insert(header.clone(), decoded.body, decoded.children);
                into.push(header.identifier.clone(), id);
            }
            Entry::Splice { preamble } => {
                if header.body_len() < preamble {
                    return Err(Error::malformed(
                        header.start(),
                        format!("{} wrapper {} is shorter than its preamble", F::NAME, header.identifier),
                    ));
                }
                let preamble = self.reader.read(preamble)?;
                let wrapper = self.tree.push_wrapper(Wrapper {
                    identifier: header.identifier.clone(),
                    preamble,
                });
                let mut spliced = Children::new();
                self.decode_sequence(registry, header.end(), &mut spliced)?;
                for id in spliced.iter() {
                    self.tree.set_wrapper(id, wrapper);
                }
                into.extend(spliced);
            }
        }
        Ok(())
    }
}
