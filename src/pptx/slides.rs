//! The slide adapter: the operations the render driver performs on one slide.
//!
//! Slide parts are read-modify-write: each operation parses the part's XML,
//! performs its tree surgery, and serializes the part back, so the package
//! is always in a consistent state between operations.

use crate::docx::replace::sniff_image;
use crate::error::{Error, Result};
use crate::opc::constants::relationship_type;
use crate::opc::{OpcPackage, PackURI, Part};
use crate::pptx::placeholders;
use crate::pptx::shapes::Rect;
use crate::xml::{Element, Node};
use log::warn;
use std::path::Path;

/// Mutable access to one slide within its owning package.
pub struct SlideContext<'a> {
    package: &'a mut OpcPackage,
    partname: PackURI,
}

impl<'a> SlideContext<'a> {
    pub(crate) fn new(package: &'a mut OpcPackage, partname: PackURI) -> Self {
        Self { package, partname }
    }

    pub(crate) fn tree(&self) -> Result<Element> {
        self.package.part(&self.partname)?.xml()
    }

    fn set_tree(&mut self, root: &Element) -> Result<()> {
        self.package.part_mut(&self.partname)?.set_xml(root)
    }

    /// Set a placeholder's text, one `a:p` per line.
    pub fn set_placeholder_text(&mut self, idx: u32, text: &str) -> Result<()> {
        let mut root = self.tree()?;
        {
            let sp = find_placeholder_mut(&mut root, idx)?;
            let tx_body = sp
                .find_descendant_path("txBody")
                .and_then(|path| sp.descend_mut(&path))
                .ok_or_else(|| Error::Xml(format!("placeholder {} has no text body", idx)))?;

            // keep bodyPr/lstStyle, replace the paragraphs
            tx_body.children.retain(|node| {
                node.as_element().is_none_or(|el| el.local_name() != "p")
            });
            for line in text.split('\n') {
                let mut p = Element::new("a:p");
                if !line.is_empty() {
                    p.children.push(Node::Element(
                        Element::new("a:r")
                            .with_child(Element::new("a:t").with_text(line)),
                    ));
                }
                tx_body.children.push(Node::Element(p));
            }
        }
        self.set_tree(&root)
    }

    /// Replace a placeholder shape with a picture read from `path`, sized to
    /// the placeholder's effective geometry.
    ///
    /// A missing, unreadable, or unrecognizable file is a warning, not an
    /// error; the placeholder is left untouched and `false` is returned.
    pub fn insert_picture(&mut self, idx: u32, path: &Path, rect: Rect) -> Result<bool> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("cannot read picture {:?} for placeholder {}: {}", path, idx, e);
                return Ok(false);
            },
        };
        let (extension, content_type, _) = match sniff_image(&bytes) {
            Ok(sniffed) => sniffed,
            Err(_) => {
                warn!(
                    "picture {:?} for placeholder {} is not a supported image format",
                    path, idx
                );
                return Ok(false);
            },
        };

        let media_partname = self
            .package
            .next_partname(&format!("/ppt/media/image%d.{}", extension))?;
        self.package.add_part(Part::new(
            media_partname.clone(),
            content_type,
            bytes,
        ));

        let target = media_partname.relative_ref(self.partname.base_uri());
        let r_id = self
            .package
            .part_mut(&self.partname)?
            .rels_mut()
            .get_or_add(relationship_type::IMAGE, &target);

        let pic = Element::parse(picture_xml(idx, &r_id, rect).as_bytes())?;
        let mut root = self.tree()?;
        {
            let sp_tree = sp_tree_mut(&mut root)?;
            let (child, _) = placeholders::find_placeholder(sp_tree, idx)
                .ok_or(Error::OrphanPlaceholder(idx))?;
            sp_tree.replace_with(child, vec![Node::Element(pic)]);
        }
        self.set_tree(&root)?;
        Ok(true)
    }

    /// Append a hyperlink run to a placeholder's first paragraph.
    pub fn insert_link(&mut self, idx: u32, url: &str, description: &str) -> Result<()> {
        let r_id = self
            .package
            .part_mut(&self.partname)?
            .rels_mut()
            .get_or_add_ext_rel(relationship_type::HYPERLINK, url);

        let run = Element::new("a:r")
            .with_child(
                Element::new("a:rPr").with_child(
                    Element::new("a:hlinkClick").with_attr("r:id", r_id),
                ),
            )
            .with_child(Element::new("a:t").with_text(description));

        let mut root = self.tree()?;
        {
            let sp = find_placeholder_mut(&mut root, idx)?;
            let paragraph = sp
                .find_descendant_path("p")
                .and_then(|path| sp.descend_mut(&path))
                .ok_or_else(|| Error::Xml(format!("placeholder {} has no paragraph", idx)))?;
            paragraph.children.push(Node::Element(run));
        }
        self.set_tree(&root)
    }

    /// Remove a placeholder's shape from the slide entirely.
    pub fn remove_placeholder(&mut self, idx: u32) -> Result<()> {
        let mut root = self.tree()?;
        {
            let sp_tree = sp_tree_mut(&mut root)?;
            if let Some((child, _)) = placeholders::find_placeholder(sp_tree, idx) {
                sp_tree.children.remove(child);
            }
        }
        self.set_tree(&root)
    }
}

/// The slide's `p:spTree`, through `p:cSld`.
pub(crate) fn sp_tree_mut(root: &mut Element) -> Result<&mut Element> {
    root.find_child_mut("cSld")
        .and_then(|c_sld| c_sld.find_child_mut("spTree"))
        .ok_or_else(|| Error::Xml("slide has no shape tree".to_string()))
}

/// Immutable counterpart of [`sp_tree_mut`].
pub(crate) fn sp_tree(root: &Element) -> Result<&Element> {
    root.find_child("cSld")
        .and_then(|c_sld| c_sld.find_child("spTree"))
        .ok_or_else(|| Error::Xml("slide has no shape tree".to_string()))
}

fn find_placeholder_mut(root: &mut Element, idx: u32) -> Result<&mut Element> {
    let sp_tree = sp_tree_mut(root)?;
    let (child, _) = placeholders::find_placeholder(sp_tree, idx)
        .ok_or(Error::OrphanPlaceholder(idx))?;
    sp_tree.children[child]
        .as_element_mut()
        .ok_or_else(|| Error::Xml("shape tree child is not an element".to_string()))
}

fn picture_xml(idx: u32, r_id: &str, rect: Rect) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {idx}"/><p:cNvPicPr/><p:nvPr><p:ph type="pic" idx="{idx}"/></p:nvPr></p:nvPicPr><p:blipFill><a:blip r:embed="{r_id}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        id = idx + 2,
        idx = idx,
        r_id = r_id,
        x = rect.x,
        y = rect.y,
        cx = rect.cx,
        cy = rect.cy,
    )
}
