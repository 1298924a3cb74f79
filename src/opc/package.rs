//! The OpcPackage facade over parts, relationships and (de)serialization.

use crate::error::{Error, Result};
use crate::opc::constants::relationship_type;
use crate::opc::packuri::PackURI;
use crate::opc::part::Part;
use crate::opc::phys_pkg::{PhysPkgReader, PhysPkgWriter};
use crate::opc::pkgreader::read_package;
use crate::opc::pkgwriter::write_package;
use crate::opc::rel::Relationships;
use std::collections::BTreeMap;
use std::path::Path;

/// An OPC package held fully in memory.
///
/// Cloning the package clones every part, which is how document templates
/// produce independent rendered copies.
#[derive(Debug, Clone)]
pub struct OpcPackage {
    /// Parts keyed by partname, sorted for deterministic serialization
    parts: BTreeMap<PackURI, Part>,

    /// Package-level relationships (the `/_rels/.rels` stream)
    pkg_rels: Relationships,
}

impl OpcPackage {
    /// Open a package file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let phys = PhysPkgReader::open(path)?;
        let (parts, pkg_rels) = read_package(phys)?;
        Ok(Self { parts, pkg_rels })
    }

    /// Open a package held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let phys = PhysPkgReader::from_bytes(bytes)?;
        let (parts, pkg_rels) = read_package(phys)?;
        Ok(Self { parts, pkg_rels })
    }

    /// Create an empty package (used to build test fixtures).
    pub fn empty() -> Self {
        Self {
            parts: BTreeMap::new(),
            pkg_rels: Relationships::default(),
        }
    }

    /// Serialize the package to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let phys = write_package(PhysPkgWriter::in_memory(), &self.parts, &self.pkg_rels)?;
        phys.into_bytes()
    }

    /// Serialize the package to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let phys = write_package(PhysPkgWriter::new(file), &self.parts, &self.pkg_rels)?;
        phys.finish()
    }

    /// The partname of the main document part, located through the
    /// officeDocument package relationship.
    pub fn main_document_partname(&self) -> Result<PackURI> {
        self.pkg_rels
            .part_with_reltype(relationship_type::OFFICE_DOCUMENT)?
            .target_partname()
    }

    /// The main document part.
    pub fn main_document_part(&self) -> Result<&Part> {
        let partname = self.main_document_partname()?;
        self.part(&partname)
    }

    /// Get a part by partname.
    pub fn part(&self, partname: &PackURI) -> Result<&Part> {
        self.parts
            .get(partname)
            .ok_or_else(|| Error::PartNotFound(partname.to_string()))
    }

    /// Mutable access to a part by partname.
    pub fn part_mut(&mut self, partname: &PackURI) -> Result<&mut Part> {
        self.parts
            .get_mut(partname)
            .ok_or_else(|| Error::PartNotFound(partname.to_string()))
    }

    /// Whether a part with the given partname exists.
    #[inline]
    pub fn contains(&self, partname: &PackURI) -> bool {
        self.parts.contains_key(partname)
    }

    /// Add a part to the package, replacing any existing part with the same
    /// partname.
    pub fn add_part(&mut self, part: Part) {
        self.parts.insert(part.partname().clone(), part);
    }

    /// Remove a part from the package.
    pub fn remove_part(&mut self, partname: &PackURI) -> Option<Part> {
        self.parts.remove(partname)
    }

    /// Iterate over all parts in partname order.
    #[inline]
    pub fn iter_parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Package-level relationships.
    #[inline]
    pub fn rels(&self) -> &Relationships {
        &self.pkg_rels
    }

    /// Mutable access to the package-level relationships.
    #[inline]
    pub fn rels_mut(&mut self) -> &mut Relationships {
        &mut self.pkg_rels
    }

    /// The first unused partname matching a `%d` template, e.g.
    /// `/ppt/slides/slide%d.xml` or `/word/media/image%d.png`.
    pub fn next_partname(&self, template: &str) -> Result<PackURI> {
        for n in 1u32.. {
            let candidate = PackURI::new(template.replacen("%d", &n.to_string(), 1))?;
            if !self.parts.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        unreachable!("u32 partname space exhausted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::constants::content_type;

    fn sample_package() -> OpcPackage {
        let mut pkg = OpcPackage::empty();
        let partname = PackURI::new("/word/document.xml").unwrap();
        pkg.rels_mut().get_or_add(
            relationship_type::OFFICE_DOCUMENT,
            "word/document.xml",
        );
        pkg.add_part(Part::new(
            partname,
            content_type::WML_DOCUMENT_MAIN,
            br#"<?xml version="1.0"?><w:document><w:body/></w:document>"#.to_vec(),
        ));
        pkg
    }

    #[test]
    fn round_trip_preserves_parts_and_rels() {
        let pkg = sample_package();
        let bytes = pkg.to_bytes().unwrap();

        let reloaded = OpcPackage::from_bytes(bytes).unwrap();
        let main = reloaded.main_document_part().unwrap();
        assert_eq!(main.partname().as_str(), "/word/document.xml");
        assert_eq!(main.content_type(), content_type::WML_DOCUMENT_MAIN);
        assert_eq!(main.xml().unwrap().local_name(), "document");
    }

    #[test]
    fn next_partname_skips_existing() {
        let mut pkg = sample_package();
        pkg.add_part(Part::new(
            PackURI::new("/word/media/image1.png").unwrap(),
            content_type::PNG,
            Vec::new(),
        ));

        let next = pkg.next_partname("/word/media/image%d.png").unwrap();
        assert_eq!(next.as_str(), "/word/media/image2.png");
    }

    #[test]
    fn clones_are_independent() {
        let pkg = sample_package();
        let mut copy = pkg.clone();

        let partname = PackURI::new("/word/document.xml").unwrap();
        copy.part_mut(&partname)
            .unwrap()
            .set_blob(b"<w:document/>".to_vec());

        assert_ne!(
            pkg.part(&partname).unwrap().blob(),
            copy.part(&partname).unwrap().blob()
        );
    }
}
