//! Package deserialization: ZIP members into parts with relationships.
//!
//! Every member of the archive is loaded, not just those reachable from the
//! package relationships. Parts the templating engines never touch survive a
//! load/save round trip unchanged.

use crate::error::{Error, Result};
use crate::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
use crate::opc::part::Part;
use crate::opc::phys_pkg::PhysPkgReader;
use crate::opc::rel::Relationships;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};

/// The content type index of a package, parsed from `[Content_Types].xml`.
#[derive(Debug, Default)]
pub struct ContentTypeMap {
    /// Extension (lowercased, no period) to content type
    defaults: HashMap<String, String>,

    /// Partname to content type
    overrides: HashMap<String, String>,
}

impl ContentTypeMap {
    /// Parse the content types stream.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self::default();
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::with_capacity(256);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    match e.local_name().as_ref() {
                        b"Default" => {
                            let mut extension = None;
                            let mut content_type = None;
                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"Extension" => {
                                        extension =
                                            Some(attr.unescape_value()?.to_lowercase());
                                    },
                                    b"ContentType" => {
                                        content_type =
                                            Some(attr.unescape_value()?.into_owned());
                                    },
                                    _ => {},
                                }
                            }
                            if let (Some(ext), Some(ct)) = (extension, content_type) {
                                map.defaults.insert(ext, ct);
                            }
                        },
                        b"Override" => {
                            let mut partname = None;
                            let mut content_type = None;
                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"PartName" => {
                                        partname = Some(attr.unescape_value()?.into_owned());
                                    },
                                    b"ContentType" => {
                                        content_type =
                                            Some(attr.unescape_value()?.into_owned());
                                    },
                                    _ => {},
                                }
                            }
                            if let (Some(pn), Some(ct)) = (partname, content_type) {
                                map.overrides.insert(pn, ct);
                            }
                        },
                        _ => {},
                    }
                },
                Ok(Event::Eof) => break,
                Ok(_) => {},
                Err(e) => return Err(Error::Xml(e.to_string())),
            }
            buf.clear();
        }

        Ok(map)
    }

    /// Look up the content type for a partname. Overrides win over defaults.
    pub fn content_type_for(&self, partname: &PackURI) -> Result<&str> {
        if let Some(ct) = self.overrides.get(partname.as_str()) {
            return Ok(ct);
        }
        self.defaults
            .get(&partname.ext().to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| {
                Error::PartNotFound(format!(
                    "no content type registered for {}",
                    partname
                ))
            })
    }
}

/// Load all parts and the package-level relationships from an archive.
pub fn read_package<R: Read + Seek>(
    mut phys: PhysPkgReader<R>,
) -> Result<(BTreeMap<PackURI, Part>, Relationships)> {
    let membernames = phys.membernames();

    let content_types_member = CONTENT_TYPES_URI.trim_start_matches('/');
    let ct_blob = phys.read_member(content_types_member).map_err(|_| {
        Error::PartNotFound("[Content_Types].xml missing from package".to_string())
    })?;
    let content_types = ContentTypeMap::from_xml(&ct_blob)?;

    let mut parts = BTreeMap::new();
    let mut rels_blobs: HashMap<String, Vec<u8>> = HashMap::new();

    for membername in &membernames {
        if membername == content_types_member || membername.ends_with('/') {
            continue;
        }
        let blob = phys.read_member(membername)?;
        if membername.ends_with(".rels") {
            rels_blobs.insert(format!("/{}", membername), blob);
            continue;
        }
        let partname = PackURI::new(format!("/{}", membername))?;
        let content_type = content_types.content_type_for(&partname)?.to_string();
        parts.insert(partname.clone(), Part::new(partname, content_type, blob));
    }

    // Attach each part's relationships, resolved against its base URI.
    for part in parts.values_mut() {
        let rels_uri = part.partname().rels_uri()?;
        if let Some(blob) = rels_blobs.get(rels_uri.as_str()) {
            let rels = Relationships::from_xml(part.partname().base_uri(), blob)?;
            part.set_rels(rels);
        }
    }

    let pkg_rels = match rels_blobs.get("/_rels/.rels") {
        Some(blob) => Relationships::from_xml(PACKAGE_URI, blob)?,
        None => Relationships::new(PACKAGE_URI),
    };

    Ok((parts, pkg_rels))
}
