//! Package serialization: parts with relationships back into ZIP members.

use crate::error::Result;
use crate::opc::constants::content_type;
use crate::opc::packuri::{CONTENT_TYPES_URI, PackURI};
use crate::opc::part::Part;
use crate::opc::phys_pkg::PhysPkgWriter;
use crate::opc::rel::Relationships;
use std::collections::BTreeMap;
use std::io::{Seek, Write};

/// Composes the `[Content_Types].xml` stream for a set of parts.
struct ContentTypesItem {
    /// Extension to content type, sorted for stable output
    defaults: BTreeMap<String, String>,

    /// Partname to content type, sorted for stable output
    overrides: BTreeMap<String, String>,
}

impl ContentTypesItem {
    fn compose<'a>(parts: impl Iterator<Item = &'a Part>) -> Self {
        let mut item = Self {
            defaults: BTreeMap::new(),
            overrides: BTreeMap::new(),
        };
        item.defaults
            .insert("rels".to_string(), content_type::OPC_RELATIONSHIPS.to_string());
        item.defaults
            .insert("xml".to_string(), content_type::XML.to_string());

        for part in parts {
            let ext = part.partname().ext().to_lowercase();
            match default_content_type(&ext) {
                Some(default) if default == part.content_type() => {
                    item.defaults.insert(ext, default.to_string());
                },
                _ => {
                    item.overrides.insert(
                        part.partname().as_str().to_string(),
                        part.content_type().to_string(),
                    );
                },
            }
        }
        item
    }

    fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push('\n');
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                r#"  <Default Extension="{}" ContentType="{}"/>"#,
                ext, ct
            ));
            xml.push('\n');
        }
        for (partname, ct) in &self.overrides {
            xml.push_str(&format!(
                r#"  <Override PartName="{}" ContentType="{}"/>"#,
                partname, ct
            ));
            xml.push('\n');
        }
        xml.push_str("</Types>");
        xml
    }
}

/// Content types registered as extension defaults rather than overrides.
fn default_content_type(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some(content_type::PNG),
        "jpg" | "jpeg" => Some(content_type::JPEG),
        "gif" => Some(content_type::GIF),
        "bmp" => Some(content_type::BMP),
        "tif" | "tiff" => Some(content_type::TIFF),
        "xml" => Some(content_type::XML),
        _ => None,
    }
}

/// Serialize a package into an archive writer.
pub fn write_package<W: Write + Seek>(
    mut phys: PhysPkgWriter<W>,
    parts: &BTreeMap<PackURI, Part>,
    pkg_rels: &Relationships,
) -> Result<PhysPkgWriter<W>> {
    let content_types = ContentTypesItem::compose(parts.values());
    phys.write_member(
        CONTENT_TYPES_URI.trim_start_matches('/'),
        content_types.to_xml().as_bytes(),
    )?;

    if !pkg_rels.is_empty() {
        phys.write_member("_rels/.rels", pkg_rels.to_xml().as_bytes())?;
    }

    for part in parts.values() {
        phys.write_member(part.partname().membername(), part.blob())?;
        if !part.rels().is_empty() {
            let rels_uri = part.partname().rels_uri()?;
            phys.write_member(rels_uri.membername(), part.rels().to_xml().as_bytes())?;
        }
    }

    Ok(phys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_defaults_and_overrides() {
        let doc = Part::new(
            PackURI::new("/word/document.xml").unwrap(),
            content_type::WML_DOCUMENT_MAIN,
            Vec::new(),
        );
        let image = Part::new(
            PackURI::new("/word/media/image1.png").unwrap(),
            content_type::PNG,
            Vec::new(),
        );
        let parts = vec![doc, image];

        let item = ContentTypesItem::compose(parts.iter());
        let xml = item.to_xml();

        assert!(xml.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(xml.contains(r#"<Override PartName="/word/document.xml""#));
        assert!(!xml.contains(r#"<Override PartName="/word/media/image1.png""#));
    }
}
