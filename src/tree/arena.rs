// Arena-owned node trees with lookup, mutation and size back-patching

use super::{Children, EncodeContext, Format, Header, IdPattern, Node};
use crate::error::{Error, Result};
use crate::utils::io::Reader;

/// Index of a node inside its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A transparent wrapper whose nested nodes were spliced into their grandparent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapper<I> {
    pub identifier: I,
    /// Body bytes between the wrapper header and its first nested node
    pub preamble: Vec<u8>,
}

/// Owns every node; parents are plain indices
#[derive(Debug)]
pub struct Tree<F: Format> {
    nodes: Vec<Option<Node<F>>>,
    wrappers: Vec<Wrapper<F::Id>>,
    root: NodeId,
    /// End of the root in the source; encoding never moves it
    source_end: u64,
}

impl<F: Format> Tree<F> {
    pub fn new(root: Header<F::Id>, body: F::Body) -> Self {
        let source_end = root.end();
        let node = Node {
            header: root,
            parent: None,
            children: Children::new(),
            body,
            wrapper: None,
        };
        Self {
            nodes: vec![Some(node)],
            wrappers: Vec::new(),
            root: NodeId(0),
            source_end,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Offset where decoding of root children stops.
    ///
    /// Fixed when the tree is created, so re-encoding an edited tree does not
    /// move the boundary of nodes still waiting in the source.
    pub fn source_end(&self) -> u64 {
        self.source_end
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<F>> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<F>> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn header(&self, id: NodeId) -> Option<&Header<F::Id>> {
        self.node(id).map(|node| &node.header)
    }

    pub fn body(&self, id: NodeId) -> Option<&F::Body> {
        self.node(id).map(|node| &node.body)
    }

    pub fn body_mut(&mut self, id: NodeId) -> Option<&mut F::Body> {
        self.node_mut(id).map(|node| &mut node.body)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// Children of `id` in stream order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id).into_iter().flat_map(|node| node.children.iter())
    }

    pub fn wrapper(&self, id: NodeId) -> Option<&Wrapper<F::Id>> {
        self.node(id)
            .and_then(|node| node.wrapper)
            .and_then(|index| self.wrappers.get(index))
    }

    fn get(&self, id: NodeId) -> Result<&Node<F>> {
        self.node(id)
            .ok_or_else(|| Error::invalid(format!("{} tree has no node {:?}", F::NAME, id)))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node<F>> {
        self.node_mut(id)
            .ok_or_else(|| Error::invalid(format!("{} tree has no node {:?}", F::NAME, id)))
    }

    pub(crate) fn insert(&mut self, header: Header<F::Id>, body: F::Body, children: Children<F::Id>) -> NodeId {
        let id = NodeId(self.nodes.len());
        for child in children.iter() {
            if let Some(node) = self.node_mut(child) {
                node.parent = Some(id);
            }
        }
        self.nodes.push(Some(Node {
            header,
            parent: None,
            children,
            body,
            wrapper: None,
        }));
        id
    }

    pub(crate) fn attach(&mut self, parent: NodeId, id: NodeId) -> Result<()> {
        let identifier = self.get(id)?.header.identifier.clone();
        self.get_mut(parent)?.children.push(identifier, id);
        self.get_mut(id)?.parent = Some(parent);
        Ok(())
    }

    pub(crate) fn push_wrapper(&mut self, wrapper: Wrapper<F::Id>) -> usize {
        self.wrappers.push(wrapper);
        self.wrappers.len() - 1
    }

    pub(crate) fn set_wrapper(&mut self, id: NodeId, wrapper: usize) {
        if let Some(node) = self.node_mut(id) {
            node.wrapper = Some(wrapper);
        }
    }

    /// True when any child of `parent` matches the identifier pattern
    pub fn has(&self, parent: NodeId, pattern: &str) -> Result<bool> {
        Ok(!self.get_all(parent, pattern)?.is_empty())
    }

    /// Children of `parent` whose identifier matches `pattern`, in stream order
    pub fn get_all(&self, parent: NodeId, pattern: &str) -> Result<Vec<NodeId>> {
        let pattern = IdPattern::new(pattern)?;
        Ok(self
            .get(parent)?
            .children
            .entries()
            .filter(|(identifier, _)| pattern.matches_id(*identifier))
            .map(|(_, id)| id)
            .collect())
    }

    pub fn get_first(&self, parent: NodeId, identifier: &F::Id) -> Option<NodeId> {
        self.node(parent)?.children.get(identifier).next()
    }

    /// Resolve a human-readable alias and return the first child carrying it
    pub fn get_first_by_name(&self, format: &F, parent: NodeId, name: &str) -> Option<NodeId> {
        let identifier = format.resolve_alias(name)?;
        self.get_first(parent, &identifier)
    }

    /// Every node below the root whose identifier matches `pattern`, depth first
    pub fn find(&self, pattern: &str) -> Result<Vec<NodeId>> {
        let pattern = IdPattern::new(pattern)?;
        Ok(self
            .walk()
            .into_iter()
            .filter(|(depth, _)| *depth > 0)
            .filter(|(_, id)| self.header(*id).is_some_and(|h| pattern.matches_id(&h.identifier)))
            .map(|(_, id)| id)
            .collect())
    }

    /// Build a node in memory and append it to `parent`.
    ///
    /// Without an explicit identifier the format must infer one from the body.
    pub fn add(
        &mut self,
        format: &F,
        parent: NodeId,
        identifier: Option<F::Id>,
        body: F::Body,
    ) -> Result<NodeId> {
        let identifier = identifier.or_else(|| format.identify(&body)).ok_or_else(|| {
            Error::Configuration(format!("{} node built without an identifier: {:?}", F::NAME, body))
        })?;
        self.get(parent)?;
        let id = self.insert(Header::detached(identifier), body, Children::new());
        self.attach(parent, id)?;
        Ok(id)
    }

    /// Detach `child` from `parent` and drop its subtree
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> bool {
        let removed = self
            .node_mut(parent)
            .map(|node| node.children.remove(child))
            .unwrap_or(false);
        if removed {
            self.drop_subtree(child);
        }
        removed
    }

    /// Remove every child of `parent` whose identifier matches; returns how many went
    pub fn remove_all(&mut self, parent: NodeId, pattern: &str) -> Result<usize> {
        let matched = self.get_all(parent, pattern)?;
        for &child in &matched {
            self.remove(parent, child);
        }
        Ok(matched.len())
    }

    fn drop_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                stack.extend(node.children.iter());
            }
        }
    }

    /// Set the total length of `id` and shift every ancestor by the same delta
    pub fn set_size(&mut self, id: NodeId, size: u64) -> Result<()> {
        let node = self.get_mut(id)?;
        let old = node.header.size;
        node.header.size = size;
        let mut parent = node.parent;
        while let Some(ancestor) = parent {
            let node = self.get_mut(ancestor)?;
            node.header.size = if size >= old {
                node.header.size + (size - old)
            } else {
                node.header.size.saturating_sub(old - size)
            };
            parent = node.parent;
        }
        Ok(())
    }

    /// Depth-first `(depth, id)` pairs starting at the root
    pub fn walk(&self) -> Vec<(usize, NodeId)> {
        let mut out = Vec::new();
        let mut stack = vec![(0, self.root)];
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            let children: Vec<NodeId> = self.children(id).collect();
            stack.extend(children.into_iter().rev().map(|child| (depth + 1, child)));
        }
        out
    }

    /// Encode `id` with its children, back-patching its length up to the root
    pub fn encode(&mut self, format: &F, id: NodeId, mut source: Option<&mut Reader>) -> Result<Vec<u8>> {
        let content = self.encode_children(format, id, source.as_deref_mut())?;
        let units = self.unit_count(id);
        let node = self.get(id)?;

        let mut body = Vec::new();
        let mut cx = EncodeContext::new(source, units);
        format.encode_body(&node.body, &mut cx, &mut body)?;
        body.extend(content);

        let identifier = node.header.identifier.clone();
        let body_len = body.len() as u64;
        let size = format.header_len(&identifier, body_len) + body_len;
        let mut out = Vec::with_capacity(size as usize);
        format.write_header(&identifier, Some(&node.body), size, &mut out)?;
        let header_len = out.len() as u64;
        out.extend(body);

        self.set_size(id, size)?;
        self.get_mut(id)?.header.header_len = header_len;
        Ok(out)
    }

    /// Concatenated encodings of the children of `id`, re-wrapping spliced runs
    pub fn encode_children(&mut self, format: &F, id: NodeId, mut source: Option<&mut Reader>) -> Result<Vec<u8>> {
        let entries: Vec<(NodeId, Option<usize>)> = self
            .children(id)
            .map(|child| (child, self.node(child).and_then(|node| node.wrapper)))
            .collect();

        let mut out = Vec::new();
        let mut i = 0;
        while i < entries.len() {
            match entries[i].1 {
                None => {
                    out.extend(self.encode(format, entries[i].0, source.as_deref_mut())?);
                    i += 1;
                }
                Some(wrapper) => {
                    let mut content = Vec::new();
                    while i < entries.len() && entries[i].1 == Some(wrapper) {
                        content.extend(self.encode(format, entries[i].0, source.as_deref_mut())?);
                        i += 1;
                    }
                    let wrapper = self.wrappers.get(wrapper).ok_or_else(|| {
                        Error::Configuration(format!("{} tree lost wrapper {}", F::NAME, wrapper))
                    })?;
                    format.encode_wrapper(wrapper, content, &mut out)?;
                }
            }
        }
        Ok(out)
    }

    /// Number of encoded child units: a run of spliced children counts once
    fn unit_count(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut previous = None;
        for child in self.children(id) {
            let wrapper = self.node(child).and_then(|node| node.wrapper);
            if wrapper.is_none() || wrapper != previous {
                count += 1;
            }
            previous = wrapper;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Decoded, Decoder, Identifier, Registry};
    use crate::config::Options;
    use pretty_assertions::assert_eq;
    use std::fmt;

    /// Toy layout: 2-byte ASCII tag + 1-byte total length; tags starting with
    /// 'C' are containers and 'W' is a transparent wrapper with a 1-byte preamble
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Tag([u8; 2]);

    impl fmt::Display for Tag {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
        }
    }

    impl Identifier for Tag {}

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Body {
        Container,
        Leaf(Vec<u8>),
    }

    #[derive(Debug)]
    struct Toy {
        registry: Registry<Toy>,
    }

    fn leaf(dec: &mut Decoder<'_, Toy>, _header: &Header<Tag>) -> Result<Decoded<Toy>> {
        Ok(Decoded::leaf(Body::Leaf(dec.rest()?)))
    }

    fn container(dec: &mut Decoder<'_, Toy>, header: &Header<Tag>) -> Result<Decoded<Toy>> {
        let children = dec.decode_children(header)?;
        Ok(Decoded::container(Body::Container, children))
    }

    fn short_read(_dec: &mut Decoder<'_, Toy>, _header: &Header<Tag>) -> Result<Decoded<Toy>> {
        // reads nothing, leaving the cursor at the body start
        Ok(Decoded::leaf(Body::Leaf(Vec::new())))
    }

    impl Toy {
        fn new() -> Self {
            let registry = Registry::new(leaf)
                .register_all([Tag(*b"CA"), Tag(*b"CB")], container)
                .register(Tag(*b"SR"), short_read)
                .splice(Tag(*b"WR"), 1);
            Self { registry }
        }
    }

    impl Format for Toy {
        type Id = Tag;
        type Body = Body;
        const NAME: &'static str = "toy";

        fn registry(&self) -> &Registry<Self> {
            &self.registry
        }

        fn read_header(&self, reader: &mut Reader, _end: u64) -> Result<Header<Tag>> {
            let offset = reader.tell();
            let tag = reader.read_array::<2>()?;
            let size = reader.read_u8()? as u64;
            Ok(Header::new(offset, Tag(tag), size, 3))
        }

        fn at_padding(&self, reader: &mut Reader) -> Result<bool> {
            Ok(reader.peek(2)? == [0, 0])
        }

        fn header_len(&self, _identifier: &Tag, _body_len: u64) -> u64 {
            3
        }

        fn write_header(&self, identifier: &Tag, _body: Option<&Body>, size: u64, out: &mut Vec<u8>) -> Result<()> {
            out.extend_from_slice(&identifier.0);
            out.push(size as u8);
            Ok(())
        }

        fn encode_body(&self, body: &Body, _cx: &mut EncodeContext<'_>, out: &mut Vec<u8>) -> Result<()> {
            if let Body::Leaf(data) = body {
                out.extend_from_slice(data);
            }
            Ok(())
        }

        fn identify(&self, body: &Body) -> Option<Tag> {
            match body {
                Body::Container => Some(Tag(*b"CA")),
                Body::Leaf(_) => None,
            }
        }

        fn resolve_alias(&self, name: &str) -> Option<Tag> {
            (crate::tree::alias_key(name) == "shortread").then_some(Tag(*b"SR"))
        }
    }

    fn decode(data: &[u8]) -> Result<(Toy, Tree<Toy>, Reader)> {
        let toy = Toy::new();
        let mut reader = Reader::from_bytes(data.to_vec());
        let size = reader.size();
        let mut tree = Tree::new(Header::new(0, Tag(*b"RT"), size, 0), Body::Container);
        let options = Options::default();
        {
            let mut dec = Decoder::new(&toy, &mut reader, &mut tree, &options);
            while dec.decode_next(true)?.is_some() {}
        }
        Ok((toy, tree, reader))
    }

    fn ids(tree: &Tree<Toy>, parent: NodeId) -> Vec<String> {
        tree.children(parent)
            .map(|id| tree.header(id).unwrap().identifier.to_string())
            .collect()
    }

    #[test]
    fn test_children_stay_inside_parent() {
        // CA(13) holds L1(5) and SR(5); SR's decoder reads nothing
        let data = b"CA\x0dL1\x05xySR\x05abL2\x04z";
        let (_, tree, reader) = decode(data).unwrap();
        let root = tree.root();
        assert_eq!(ids(&tree, root), vec!["CA", "L2"]);
        assert_eq!(reader.tell(), data.len() as u64);

        let ca = tree.get_first(root, &Tag(*b"CA")).unwrap();
        assert_eq!(ids(&tree, ca), vec!["L1", "SR"]);
        let header = tree.header(ca).unwrap();
        let used: u64 = tree.children(ca).map(|c| tree.header(c).unwrap().size).sum();
        assert!(used + header.header_len <= header.size);
        assert_eq!(tree.parent(tree.get_first(ca, &Tag(*b"L1")).unwrap()), Some(ca));

        let l2 = tree.get_first(root, &Tag(*b"L2")).unwrap();
        assert_eq!(tree.header(l2).unwrap().offset, Some(13));
    }

    #[test]
    fn test_header_only_container_is_empty() {
        let (_, tree, _) = decode(b"CB\x03").unwrap();
        let cb = tree.children(tree.root()).next().unwrap();
        assert_eq!(tree.children(cb).count(), 0);
    }

    #[test]
    fn test_length_below_header_is_malformed() {
        assert!(matches!(decode(b"L1\x02"), Err(Error::Malformed { offset: 0, .. })));
    }

    #[test]
    fn test_nested_overrun_is_malformed_outer_is_clamped() {
        let nested = decode(b"CA\x06L1\x09abc");
        assert!(matches!(nested, Err(Error::Malformed { offset: 3, .. })));

        let (_, tree, _) = decode(b"L1\x09abc").unwrap();
        let l1 = tree.children(tree.root()).next().unwrap();
        assert_eq!(tree.header(l1).unwrap().size, 6);
        assert_eq!(tree.body(l1), Some(&Body::Leaf(b"abc".to_vec())));
    }

    #[test]
    fn test_padding_ends_sequence() {
        let (_, tree, _) = decode(b"L1\x04a\0\0\0").unwrap();
        assert_eq!(ids(&tree, tree.root()), vec!["L1"]);
    }

    #[test]
    fn test_unknown_tag_is_opaque() {
        let (_, tree, _) = decode(b"ZZ\x05??").unwrap();
        let zz = tree.children(tree.root()).next().unwrap();
        assert_eq!(tree.body(zz), Some(&Body::Leaf(b"??".to_vec())));
    }

    #[test]
    fn test_wrapper_is_spliced_and_rewrapped() {
        // CA(16) holds L1(4) and WR(9) with preamble 'p' wrapping L2(5)
        let data = b"CA\x10L1\x04aWR\x09pL2\x05bc";
        let (toy, mut tree, _) = decode(data).unwrap();
        let ca = tree.children(tree.root()).next().unwrap();
        assert_eq!(ids(&tree, ca), vec!["L1", "L2"]);
        let l2 = tree.get_first(ca, &Tag(*b"L2")).unwrap();
        assert_eq!(tree.parent(l2), Some(ca));
        assert_eq!(tree.wrapper(l2).unwrap().preamble, b"p".to_vec());

        assert_eq!(tree.encode(&toy, ca, None).unwrap(), data.to_vec());
    }

    #[test]
    fn test_wildcard_lookup_and_alias() {
        let (toy, tree, _) = decode(b"L1\x03L2\x03SR\x03XL\x03").unwrap();
        let root = tree.root();
        let found: Vec<String> = tree
            .get_all(root, "L?")
            .unwrap()
            .into_iter()
            .map(|id| tree.header(id).unwrap().identifier.to_string())
            .collect();
        assert_eq!(found, vec!["L1", "L2"]);
        assert_eq!(tree.get_all(root, "L?").unwrap(), tree.get_all(root, "L?").unwrap());
        assert!(tree.has(root, "*L").unwrap());
        assert!(!tree.has(root, "Q*").unwrap());
        assert_eq!(
            tree.get_first_by_name(&toy, root, "short_read"),
            tree.get_first(root, &Tag(*b"SR"))
        );
        assert_eq!(tree.get_first_by_name(&toy, root, "nothing"), None);
    }

    #[test]
    fn test_edit_back_patches_sizes_to_root() {
        let (toy, mut tree, _) = decode(b"CA\x09CB\x06L1\x03").unwrap();
        let root = tree.root();
        let ca = tree.children(root).next().unwrap();
        let cb = tree.children(ca).next().unwrap();

        let added = tree.add(&toy, cb, Some(Tag(*b"L9")), Body::Leaf(b"new".to_vec())).unwrap();
        assert_eq!(tree.parent(added), Some(cb));
        assert!(tree.add(&toy, cb, None, Body::Leaf(vec![])).is_err());

        let encoded = tree.encode(&toy, cb, None).unwrap();
        assert_eq!(encoded, b"CB\x0cL1\x03L9\x06new".to_vec());
        assert_eq!(tree.header(cb).unwrap().size, 12);
        assert_eq!(tree.header(ca).unwrap().size, 15);
        assert_eq!(tree.header(root).unwrap().size, 15);

        assert_eq!(tree.remove_all(cb, "L*").unwrap(), 2);
        assert!(tree.node(added).is_none());
        assert_eq!(tree.encode(&toy, ca, None).unwrap(), b"CA\x06CB\x03".to_vec());
        assert_eq!(tree.header(root).unwrap().size, 6);
        assert_eq!(tree.source_end(), 9);
    }

    #[test]
    fn test_encoding_keeps_source_boundary() {
        let toy = Toy::new();
        let data = b"CA\x06L1\x03L2\x04z";
        let mut reader = Reader::from_bytes(data.to_vec());
        let size = reader.size();
        let mut tree = Tree::new(Header::new(0, Tag(*b"RT"), size, 0), Body::Container);
        let options = Options::default();

        let ca = Decoder::new(&toy, &mut reader, &mut tree, &options).decode_next(true).unwrap().unwrap();
        tree.add(&toy, ca, Some(Tag(*b"L9")), Body::Leaf(b"grown".to_vec())).unwrap();
        tree.encode(&toy, ca, None).unwrap();
        assert_eq!(tree.header(tree.root()).unwrap().size, 18);
        assert_eq!(tree.source_end(), 10);

        let l2 = Decoder::new(&toy, &mut reader, &mut tree, &options).decode_next(true).unwrap().unwrap();
        assert_eq!(tree.body(l2), Some(&Body::Leaf(b"z".to_vec())));
        assert!(Decoder::new(&toy, &mut reader, &mut tree, &options).decode_next(true).unwrap().is_none());
    }

    #[test]
    fn test_remove_by_identity() {
        let (_, mut tree, _) = decode(b"L1\x03L1\x03").unwrap();
        let root = tree.root();
        let first = tree.children(root).next().unwrap();
        assert!(tree.remove(root, first));
        assert!(!tree.remove(root, first));
        assert_eq!(tree.children(root).count(), 1);
    }

    #[test]
    fn test_detached_container_infers_identifier() {
        let (toy, mut tree, _) = decode(b"").unwrap();
        let root = tree.root();
        let id = tree.add(&toy, root, None, Body::Container).unwrap();
        assert_eq!(tree.header(id).unwrap().identifier, Tag(*b"CA"));
        assert_eq!(tree.header(id).unwrap().offset, None);
        assert_eq!(tree.walk(), vec![(0, root), (1, id)]);
    }
}
