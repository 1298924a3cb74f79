//! A small mutable XML tree built on quick-xml.
//!
//! Element names are kept exactly as they appear in the source (qualified,
//! e.g. `w:p`), and attribute order is preserved so a parse/serialize round
//! trip does not reshuffle markup. Only elements and text are modeled;
//! comments and processing instructions are dropped on parse, which is safe
//! for the OOXML parts this crate rewrites.

use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// A node in the tree: an element or a text run.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    /// Get the element inside this node, if it is one.
    #[inline]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Mutable variant of [`Node::as_element`].
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }
}

/// An XML element with its attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name as written in the source (e.g. "w:fldSimple")
    pub name: String,
    /// Attributes in source order, keys qualified
    pub attrs: Vec<(String, String)>,
    /// Child nodes in source order
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child appender.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder-style text child appender.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// The local part of the element name ("p" for "w:p").
    pub fn local_name(&self) -> &str {
        match self.name.rfind(':') {
            Some(pos) => &self.name[pos + 1..],
            None => &self.name,
        }
    }

    /// Look up an attribute by local name, ignoring any namespace prefix.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| {
                let k_local = match k.rfind(':') {
                    Some(pos) => &k[pos + 1..],
                    None => k.as_str(),
                };
                k_local == local
            })
            .map(|(_, v)| v.as_str())
    }

    /// Look up an attribute by its exact qualified key. Needed where an
    /// element carries both a plain and a prefixed attribute with the same
    /// local name, like `p:sldId`'s `id` and `r:id`.
    pub fn attr_qualified(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing one with the same qualified key.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.attrs.push((key, value));
        }
    }

    /// Iterate over element children.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First child element with the given local name.
    pub fn find_child(&self, local: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.local_name() == local)
    }

    /// Mutable variant of [`Element::find_child`].
    pub fn find_child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|el| el.local_name() == local)
    }

    /// Index of the first child element with the given local name.
    pub fn child_position(&self, local: &str) -> Option<usize> {
        self.children.iter().position(|node| {
            node.as_element()
                .is_some_and(|el| el.local_name() == local)
        })
    }

    /// First descendant element (depth-first) with the given local name.
    pub fn find_descendant(&self, local: &str) -> Option<&Element> {
        for el in self.child_elements() {
            if el.local_name() == local {
                return Some(el);
            }
            if let Some(found) = el.find_descendant(local) {
                return Some(found);
            }
        }
        None
    }

    /// Whether any descendant element has the given local name.
    pub fn has_descendant(&self, local: &str) -> bool {
        self.find_descendant(local).is_some()
    }

    /// Child-index path to the first descendant (depth-first) with the given
    /// local name, usable with [`Element::descend_mut`].
    pub fn find_descendant_path(&self, local: &str) -> Option<Vec<usize>> {
        for (idx, child) in self.children.iter().enumerate() {
            let Some(el) = child.as_element() else {
                continue;
            };
            if el.local_name() == local {
                return Some(vec![idx]);
            }
            if let Some(rest) = el.find_descendant_path(local) {
                let mut path = Vec::with_capacity(rest.len() + 1);
                path.push(idx);
                path.extend(rest);
                return Some(path);
            }
        }
        None
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(el) => el.collect_text(out),
            }
        }
    }

    /// Resolve a child path (indices into successive `children` vectors).
    pub fn descend(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &idx in path {
            current = current.children.get(idx)?.as_element()?;
        }
        Some(current)
    }

    /// Mutable variant of [`Element::descend`].
    pub fn descend_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &idx in path {
            current = current.children.get_mut(idx)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Replace the child range `[start, end]` (inclusive) with a single node.
    pub fn replace_range(&mut self, start: usize, end: usize, node: Node) {
        self.children.splice(start..=end, std::iter::once(node));
    }

    /// Replace the child at `idx` with the given nodes.
    pub fn replace_with(&mut self, idx: usize, nodes: Vec<Node>) {
        self.children.splice(idx..=idx, nodes);
    }

    /// Parse a document part into its root element.
    pub fn parse(xml: &[u8]) -> Result<Element> {
        let mut reader = Reader::from_reader(xml);
        // Whitespace inside w:t / a:t is significant; never trim.
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut buf = Vec::with_capacity(512);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    stack.push(Self::element_from_start(&e)?);
                },
                Ok(Event::Empty(e)) => {
                    let el = Self::element_from_start(&e)?;
                    Self::attach(&mut stack, &mut root, el)?;
                },
                Ok(Event::End(_)) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unbalanced end tag".to_string()))?;
                    Self::attach(&mut stack, &mut root, el)?;
                },
                Ok(Event::Text(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        // entity references arrive as separate GeneralRef
                        // events, so the text itself needs no unescaping
                        Self::push_text(parent, std::str::from_utf8(e.as_ref())?);
                    }
                },
                Ok(Event::GeneralRef(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let mut utf8 = [0u8; 4];
                        let resolved = match e
                            .resolve_char_ref()
                            .map_err(|err| Error::Xml(err.to_string()))?
                        {
                            Some(ch) => &*ch.encode_utf8(&mut utf8),
                            None => {
                                let name =
                                    e.decode().map_err(|err| Error::Xml(err.to_string()))?;
                                quick_xml::escape::resolve_xml_entity(&name).ok_or_else(
                                    || Error::Xml(format!("unknown entity &{};", name)),
                                )?
                            },
                        };
                        Self::push_text(parent, resolved);
                    }
                },
                Ok(Event::CData(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        Self::push_text(parent, std::str::from_utf8(e.as_ref())?);
                    }
                },
                Ok(Event::Eof) => break,
                Ok(_) => {},
                Err(e) => return Err(Error::Xml(e.to_string())),
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::Xml("unclosed element at end of document".to_string()));
        }
        root.ok_or_else(|| Error::Xml("document has no root element".to_string()))
    }

    fn element_from_start(e: &BytesStart<'_>) -> Result<Element> {
        let name = std::str::from_utf8(e.name().as_ref())?.to_string();
        let mut el = Element::new(name);
        for attr in e.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            el.attrs.push((key, value));
        }
        Ok(el)
    }

    /// Append text to the parent, gluing onto a trailing text node so a run
    /// split by entity references stays one node.
    fn push_text(parent: &mut Element, text: &str) {
        match parent.children.last_mut() {
            Some(Node::Text(existing)) => existing.push_str(text),
            _ => parent.children.push(Node::Text(text.to_string())),
        }
    }

    fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) -> Result<()> {
        match stack.last_mut() {
            Some(parent) => {
                parent.children.push(Node::Element(el));
                Ok(())
            },
            None if root.is_none() => {
                *root = Some(el);
                Ok(())
            },
            None => Err(Error::Xml("multiple root elements".to_string())),
        }
    }

    /// Serialize this element as a standalone document part.
    pub fn to_document_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = quick_xml::Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(|e| Error::Xml(e.to_string()))?;
        self.write_into(&mut writer)?;
        Ok(writer.into_inner().into_inner())
    }

    fn write_into(&self, writer: &mut quick_xml::Writer<Cursor<Vec<u8>>>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attrs {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(|e| Error::Xml(e.to_string()))?;
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| Error::Xml(e.to_string()))?;
        for child in &self.children {
            match child {
                Node::Element(el) => el.write_into(writer)?,
                Node::Text(text) => {
                    writer
                        .write_event(Event::Text(BytesText::new(text)))
                        .map_err(|e| Error::Xml(e.to_string()))?;
                },
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(|e| Error::Xml(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_preserves_structure_and_attrs() {
        let xml = br#"<?xml version="1.0"?><w:p w:rsidR="0042"><w:r><w:t xml:space="preserve"> hop </w:t></w:r></w:p>"#;
        let root = Element::parse(xml).unwrap();

        assert_eq!(root.name, "w:p");
        assert_eq!(root.local_name(), "p");
        assert_eq!(root.attr("rsidR"), Some("0042"));

        let run = root.find_child("r").unwrap();
        let t = run.find_child("t").unwrap();
        assert_eq!(t.attr("space"), Some("preserve"));
        assert_eq!(t.text(), " hop ");
    }

    #[test]
    fn round_trip_escapes_text() {
        let root = Element::new("doc").with_child(Element::new("t").with_text("a < b & c"));
        let bytes = root.to_document_bytes().unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("a &lt; b &amp; c"));

        let reparsed = Element::parse(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.find_child("t").unwrap().text(), "a < b & c");
    }

    #[test]
    fn entity_references_resolved_into_surrounding_text() {
        let root = Element::parse(b"<w:t>Smith &amp; Wesson &lt;est. 1852&gt;</w:t>").unwrap();
        assert_eq!(root.text(), "Smith & Wesson <est. 1852>");
        // glued into a single text node, not split around the references
        assert_eq!(root.children.len(), 1);

        let root = Element::parse(b"<t>&#x41;&#66;&apos;&quot;</t>").unwrap();
        assert_eq!(root.text(), "AB'\"");

        assert!(Element::parse(b"<t>&undeclared;</t>").is_err());
    }

    #[test]
    fn descend_and_replace_range() {
        let xml = b"<p><r>one</r><r>two</r><r>three</r></p>";
        let mut root = Element::parse(xml).unwrap();

        assert_eq!(root.descend(&[1]).unwrap().text(), "two");

        root.replace_range(0, 1, Node::Element(Element::new("r").with_text("merged")));
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.descend(&[0]).unwrap().text(), "merged");
        assert_eq!(root.descend(&[1]).unwrap().text(), "three");
    }

    #[test]
    fn find_descendant_depth_first() {
        let xml = b"<a><b><c id=\"1\"/></b><c id=\"2\"/></a>";
        let root = Element::parse(xml).unwrap();
        assert_eq!(root.find_descendant("c").unwrap().attr("id"), Some("1"));
        assert!(root.has_descendant("b"));
        assert!(!root.has_descendant("d"));
    }
}
