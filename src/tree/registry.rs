// Identifier to decoder tables

use super::{Children, Decoder, Format, Header};
use crate::error::Result;
use log::debug;
use std::collections::HashMap;
use std::fmt;

/// Decodes the body of a node; the cursor sits right after the header
pub type DecodeFn<F> = fn(&mut Decoder<'_, F>, &Header<<F as Format>::Id>) -> Result<Decoded<F>>;

/// What a body decoder produced
pub struct Decoded<F: Format> {
    pub body: F::Body,
    pub children: Children<F::Id>,
}

impl<F: Format> Decoded<F> {
    pub fn leaf(body: F::Body) -> Self {
        Self {
            body,
            children: Children::new(),
        }
    }

    pub fn container(body: F::Body, children: Children<F::Id>) -> Self {
        Self { body, children }
    }
}

/// How a registered identifier is handled
pub enum Entry<F: Format> {
    Decode(DecodeFn<F>),
    /// Transparent wrapper: skip `preamble` body bytes and splice the nested
    /// nodes into the enclosing container
    Splice { preamble: u64 },
}

impl<F: Format> Clone for Entry<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: Format> Copy for Entry<F> {}

/// Statically built map from identifier to decoder, with an opaque fallback
pub struct Registry<F: Format> {
    entries: HashMap<F::Id, Entry<F>>,
    fallback: DecodeFn<F>,
}

impl<F: Format> Registry<F> {
    pub fn new(fallback: DecodeFn<F>) -> Self {
        Self {
            entries: HashMap::new(),
            fallback,
        }
    }

    pub fn register(mut self, identifier: F::Id, decode: DecodeFn<F>) -> Self {
        self.entries.insert(identifier, Entry::Decode(decode));
        self
    }

    pub fn register_all<I>(mut self, identifiers: I, decode: DecodeFn<F>) -> Self
    where
        I: IntoIterator<Item = F::Id>,
    {
        for identifier in identifiers {
            self.entries.insert(identifier, Entry::Decode(decode));
        }
        self
    }

    pub fn splice(mut self, identifier: F::Id, preamble: u64) -> Self {
        self.entries.insert(identifier, Entry::Splice { preamble });
        self
    }

    pub fn is_known(&self, identifier: &F::Id) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Never fails: unknown identifiers get the fallback decoder
    pub fn lookup(&self, identifier: &F::Id) -> Entry<F> {
        match self.entries.get(identifier) {
            Some(entry) => *entry,
            None => {
                debug!("{}: no decoder for {}, keeping it opaque", F::NAME, identifier);
                Entry::Decode(self.fallback)
            }
        }
    }
}

impl<F: Format> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("format", &F::NAME)
            .field("known", &self.entries.len())
            .finish()
    }
}
