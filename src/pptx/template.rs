//! The .pptx template driver: load, render slides, repeat, save.

use crate::convert;
use crate::error::{Error, Result};
use crate::opc::constants::{content_type, relationship_type};
use crate::opc::{OpcPackage, PackURI, Part};
use crate::pptx::engines::{Context, RenderEngine, SlideScope};
use crate::pptx::placeholders;
use crate::pptx::slides::{self, SlideContext};
use crate::xml::{Element, Node};
use std::path::Path;

/// A loaded .pptx template.
///
/// Rendering mutates the loaded presentation in place: text substitution,
/// picture embedding, placeholder removal and slide duplication all act on
/// the owned package. One render per load; a second pass would find the
/// templates already substituted.
#[derive(Debug)]
pub struct PptxTemplate {
    package: OpcPackage,
    partname: PackURI,
}

impl PptxTemplate {
    /// Load a template from a .pptx file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_package(OpcPackage::open(path)?)
    }

    /// Load a template from .pptx bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_package(OpcPackage::from_bytes(bytes)?)
    }

    pub(crate) fn from_package(package: OpcPackage) -> Result<Self> {
        let partname = package.main_document_partname()?;
        let main = package.part(&partname)?;
        if main.content_type() != content_type::PML_PRESENTATION_MAIN {
            return Err(Error::NotADocument {
                expected: content_type::PML_PRESENTATION_MAIN.to_string(),
                got: main.content_type().to_string(),
            });
        }
        Ok(Self { package, partname })
    }

    /// The names of the slide layouts in the deck, in partname order.
    pub fn layouts(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for part in self.package.iter_parts() {
            if part.content_type() != content_type::PML_SLIDE_LAYOUT {
                continue;
            }
            let root = part.xml()?;
            let name = root
                .find_child("cSld")
                .and_then(|c_sld| c_sld.attr("name"))
                .unwrap_or_default()
                .to_string();
            names.push(name);
        }
        Ok(names)
    }

    /// Slide partnames in presentation order (the `sldIdLst`).
    pub fn slide_partnames(&self) -> Result<Vec<PackURI>> {
        let pres_part = self.package.part(&self.partname)?;
        let root = pres_part.xml()?;
        let Some(sld_id_lst) = root.find_child("sldIdLst") else {
            return Ok(Vec::new());
        };

        let mut partnames = Vec::new();
        for sld_id in sld_id_lst.child_elements() {
            if sld_id.local_name() != "sldId" {
                continue;
            }
            let r_id = sld_id.attr_qualified("r:id").ok_or_else(|| {
                Error::Relationship("sldId without r:id".to_string())
            })?;
            let rel = pres_part.rels().get(r_id).ok_or_else(|| {
                Error::Relationship(format!("sldId references unknown {}", r_id))
            })?;
            partnames.push(rel.target_partname()?);
        }
        Ok(partnames)
    }

    /// Render the whole deck against a context with the given engine.
    ///
    /// Slides are processed in presentation order. A duplicate requested by a
    /// repeat directive is inserted right after the current slide and is
    /// itself rendered next, so a slide keeps stamping copies while its
    /// repeat variable has elements left.
    pub fn render(&mut self, ctx: &mut Context, engine: &mut dyn RenderEngine) -> Result<()> {
        let mut position = 0;
        loop {
            let slides = self.slide_partnames()?;
            let Some(partname) = slides.get(position).cloned() else {
                break;
            };
            let repeat = self.render_slide(&partname, ctx, engine)?;
            if repeat {
                self.duplicate_slide(&partname)?;
            }
            position += 1;
        }
        Ok(())
    }

    /// Serialize the presentation to .pptx bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.package.to_bytes()
    }

    /// Serialize the presentation to a .pptx file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.package.save(path)
    }

    /// Export the current presentation state to PDF bytes.
    pub fn to_pdf(&self) -> Result<Vec<u8>> {
        convert::to_pdf(&self.to_bytes()?, "pptx")
    }

    /// Mutable access to one slide, for callers driving slide edits directly.
    pub fn slide(&mut self, partname: &PackURI) -> Result<SlideContext<'_>> {
        if !self.package.contains(partname) {
            return Err(Error::PartNotFound(partname.to_string()));
        }
        Ok(SlideContext::new(&mut self.package, partname.clone()))
    }

    fn layout_for(&self, slide_partname: &PackURI) -> Result<PackURI> {
        self.package
            .part(slide_partname)?
            .rels()
            .part_with_reltype(relationship_type::SLIDE_LAYOUT)?
            .target_partname()
    }

    /// Render one slide. Returns whether a repeat was requested.
    fn render_slide(
        &mut self,
        slide_partname: &PackURI,
        ctx: &mut Context,
        engine: &mut dyn RenderEngine,
    ) -> Result<bool> {
        let layout_partname = self.layout_for(slide_partname)?;
        let layout_root = self.package.part(&layout_partname)?.xml()?;
        let layout_tree = slides::sp_tree(&layout_root)?;
        let layout_geo = placeholders::layout_rects(layout_tree);

        let slide_root = self.package.part(slide_partname)?.xml()?;
        let slide_tree = slides::sp_tree(&slide_root)?;
        let fragments = placeholders::ordered_fragments(slide_tree, layout_tree)?;

        let mut scope = SlideScope::new();
        for fragment in &fragments {
            let rendered = engine.render(&fragment.text, ctx, fragment, &mut scope)?;
            let Some(value) = rendered else {
                continue;
            };
            let mut slide = SlideContext::new(&mut self.package, slide_partname.clone());
            if fragment.ph_type.as_deref() == Some("pic") {
                slide.insert_picture(fragment.idx, Path::new(&value), fragment.rect)?;
            } else {
                slide.set_placeholder_text(fragment.idx, &value)?;
            }
        }

        // Zero-height placeholders that end up empty are control markup and
        // vanish from the output.
        let slide_root = self.package.part(slide_partname)?.xml()?;
        let slide_tree = slides::sp_tree(&slide_root)?;
        let mut doomed = Vec::new();
        for ph in placeholders::collect_placeholders(slide_tree) {
            let Some(el) = slide_tree.children[ph.child].as_element() else {
                continue;
            };
            let rect = placeholders::effective_rect(&ph, &layout_geo);
            if rect.cy == 0 && placeholders::shape_is_empty(el) {
                doomed.push(ph.idx);
            }
        }
        for idx in doomed {
            SlideContext::new(&mut self.package, slide_partname.clone())
                .remove_placeholder(idx)?;
        }

        Ok(scope.repeat_requested())
    }

    /// Insert a fresh slide, instantiated from `current`'s layout with empty
    /// placeholders, immediately after `current` in the sldIdLst.
    fn duplicate_slide(&mut self, current: &PackURI) -> Result<PackURI> {
        let layout_partname = self.layout_for(current)?;
        let layout_root = self.package.part(&layout_partname)?.xml()?;
        let layout_tree = slides::sp_tree(&layout_root)?;

        let mut sp_tree = Element::new("p:spTree")
            .with_child(
                Element::new("p:nvGrpSpPr")
                    .with_child(
                        Element::new("p:cNvPr")
                            .with_attr("id", "1")
                            .with_attr("name", ""),
                    )
                    .with_child(Element::new("p:cNvGrpSpPr"))
                    .with_child(Element::new("p:nvPr")),
            )
            .with_child(Element::new("p:grpSpPr"));
        for ph in placeholders::collect_placeholders(layout_tree) {
            if let Some(el) = layout_tree.children[ph.child].as_element() {
                let mut shape = el.clone();
                clear_shape_text(&mut shape);
                sp_tree.children.push(Node::Element(shape));
            }
        }

        let root = Element::new("p:sld")
            .with_attr(
                "xmlns:a",
                "http://schemas.openxmlformats.org/drawingml/2006/main",
            )
            .with_attr(
                "xmlns:r",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
            )
            .with_attr(
                "xmlns:p",
                "http://schemas.openxmlformats.org/presentationml/2006/main",
            )
            .with_child(Element::new("p:cSld").with_child(sp_tree))
            .with_child(Element::new("p:clrMapOvr").with_child(Element::new("a:masterClrMapping")));

        let new_partname = self.package.next_partname("/ppt/slides/slide%d.xml")?;
        let mut part = Part::new(
            new_partname.clone(),
            content_type::PML_SLIDE,
            root.to_document_bytes()?,
        );
        part.rels_mut().get_or_add(
            relationship_type::SLIDE_LAYOUT,
            &layout_partname.relative_ref(new_partname.base_uri()),
        );
        self.package.add_part(part);

        // Relate the presentation to the new slide and splice its sldId in
        // right after the current one.
        let current_r_id = self
            .package
            .part(&self.partname)?
            .rels()
            .iter()
            .find(|rel| {
                !rel.is_external()
                    && rel
                        .target_partname()
                        .is_ok_and(|partname| partname == *current)
            })
            .map(|rel| rel.r_id().to_string())
            .ok_or_else(|| {
                Error::Relationship(format!("presentation has no relationship to {}", current))
            })?;
        let target = new_partname.relative_ref(self.partname.base_uri());
        let new_r_id = self
            .package
            .part_mut(&self.partname)?
            .rels_mut()
            .get_or_add(relationship_type::SLIDE, &target);

        let pres_part = self.package.part_mut(&self.partname)?;
        let mut pres_root = pres_part.xml()?;
        let sld_id_lst = pres_root
            .find_child_mut("sldIdLst")
            .ok_or_else(|| Error::Xml("presentation has no sldIdLst".to_string()))?;

        let max_id = sld_id_lst
            .child_elements()
            .filter_map(|el| el.attr_qualified("id"))
            .filter_map(|id| id.parse::<u64>().ok())
            .max()
            .unwrap_or(255);
        let new_sld_id = Element::new("p:sldId")
            .with_attr("id", (max_id + 1).to_string())
            .with_attr("r:id", new_r_id);

        let current_pos = sld_id_lst.children.iter().position(|node| {
            node.as_element()
                .is_some_and(|el| el.attr_qualified("r:id") == Some(current_r_id.as_str()))
        });
        match current_pos {
            Some(pos) => sld_id_lst
                .children
                .insert(pos + 1, Node::Element(new_sld_id)),
            None => sld_id_lst.children.push(Node::Element(new_sld_id)),
        }
        pres_part.set_xml(&pres_root)?;

        Ok(new_partname)
    }
}

/// Empty every paragraph out of a shape's text body, leaving one blank `a:p`
/// so the body stays structurally valid.
fn clear_shape_text(shape: &mut Element) {
    if let Some(path) = shape.find_descendant_path("txBody") {
        if let Some(tx_body) = shape.descend_mut(&path) {
            tx_body
                .children
                .retain(|node| node.as_element().is_none_or(|el| el.local_name() != "p"));
            tx_body.children.push(Node::Element(Element::new("a:p")));
        }
    }
}
