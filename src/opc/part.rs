//! Package parts.
//!
//! A part is one member of the package: a partname, a content type, its raw
//! bytes and its relationship collection. XML parts are parsed on demand into
//! an element tree and written back after mutation, so untouched parts round
//! trip byte for byte.

use crate::error::Result;
use crate::opc::packuri::PackURI;
use crate::opc::rel::Relationships;
use crate::xml::Element;

/// A single part within an OPC package.
#[derive(Debug, Clone)]
pub struct Part {
    partname: PackURI,
    content_type: String,
    blob: Vec<u8>,
    rels: Relationships,
}

impl Part {
    /// Create a part from its partname, content type and raw bytes.
    pub fn new(partname: PackURI, content_type: impl Into<String>, blob: Vec<u8>) -> Self {
        let rels = Relationships::new(partname.base_uri());
        Self {
            partname,
            content_type: content_type.into(),
            blob,
            rels,
        }
    }

    /// The partname of this part.
    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    /// The content type of this part.
    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The raw bytes of this part.
    #[inline]
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Replace the raw bytes of this part.
    #[inline]
    pub fn set_blob(&mut self, blob: Vec<u8>) {
        self.blob = blob;
    }

    /// Parse this part's bytes as an XML document.
    pub fn xml(&self) -> Result<Element> {
        Element::parse(&self.blob)
    }

    /// Serialize an element tree back into this part's bytes.
    pub fn set_xml(&mut self, root: &Element) -> Result<()> {
        self.blob = root.to_document_bytes()?;
        Ok(())
    }

    /// This part's relationship collection.
    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.rels
    }

    /// Mutable access to this part's relationship collection.
    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.rels
    }

    /// Replace the relationship collection (used when loading a package).
    pub(crate) fn set_rels(&mut self, rels: Relationships) {
        self.rels = rels;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::constants::content_type;

    #[test]
    fn xml_round_trip_through_part() {
        let partname = PackURI::new("/word/document.xml").unwrap();
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document><w:body/></w:document>"#;
        let mut part = Part::new(partname, content_type::WML_DOCUMENT_MAIN, xml.to_vec());

        let mut root = part.xml().unwrap();
        assert_eq!(root.local_name(), "document");

        root.find_child_mut("body")
            .unwrap()
            .children
            .push(crate::xml::Node::Element(Element::new("w:p")));
        part.set_xml(&root).unwrap();

        let reparsed = part.xml().unwrap();
        assert!(reparsed.find_child("body").unwrap().find_child("p").is_some());
    }
}
