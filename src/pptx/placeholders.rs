//! Placeholder discovery and template fragment extraction.
//!
//! Template text lives on the slide layout: each layout placeholder's text is
//! the default fragment for its slot index. A slide that has its own
//! non-empty text for a slot is treated as already authored and that slot is
//! excluded from templating. The remaining fragments are ordered by the
//! geometry resolver.

use crate::error::{Error, Result};
use crate::pptx::shapes::{self, Rect, ShapeNode};
use crate::xml::Element;
use std::collections::HashMap;

/// spTree children that count as shapes for ordering purposes.
const SHAPE_TAGS: [&str; 5] = ["sp", "pic", "graphicFrame", "grpSp", "cxnSp"];

/// A placeholder-bearing shape found in an spTree.
#[derive(Debug, Clone)]
pub(crate) struct PlaceholderShape {
    /// Child index of the shape within the spTree
    pub child: usize,

    /// Placeholder slot index (0 when the `idx` attribute is absent)
    pub idx: u32,

    /// Placeholder type ("title", "body", "pic", ...), if declared
    pub ph_type: Option<String>,

    /// The shape's own geometry, when it carries an `a:xfrm`
    pub rect: Option<Rect>,
}

/// A slot scheduled for evaluation, with the template text to render.
#[derive(Debug, Clone)]
pub struct PlaceholderFragment {
    pub idx: u32,
    pub ph_type: Option<String>,
    pub text: String,

    /// Effective geometry (own transform, or inherited from the layout)
    pub rect: Rect,
}

/// The `p:ph` element of a shape, wherever its nv*Pr variant puts it.
fn ph_element(shape: &Element) -> Option<&Element> {
    shape.find_descendant("ph")
}

/// Collect the placeholder shapes among an spTree's children.
pub(crate) fn collect_placeholders(sp_tree: &Element) -> Vec<PlaceholderShape> {
    let mut found = Vec::new();
    for (child, node) in sp_tree.children.iter().enumerate() {
        let Some(el) = node.as_element() else {
            continue;
        };
        if !SHAPE_TAGS.contains(&el.local_name()) {
            continue;
        }
        let Some(ph) = ph_element(el) else {
            continue;
        };
        let idx = ph.attr("idx").and_then(|v| v.parse().ok()).unwrap_or(0);
        let ph_type = ph.attr("type").map(str::to_string);
        found.push(PlaceholderShape {
            child,
            idx,
            ph_type,
            rect: shapes::shape_rect(el),
        });
    }
    found
}

/// Concatenated `a:t` text of a shape, paragraphs joined by newlines.
pub(crate) fn shape_text(shape: &Element) -> String {
    let mut paragraphs = Vec::new();
    collect_paragraph_text(shape, &mut paragraphs);
    paragraphs.join("\n")
}

fn collect_paragraph_text(el: &Element, out: &mut Vec<String>) {
    for child in el.child_elements() {
        if child.local_name() == "p" && el.local_name() == "txBody" {
            let mut text = String::new();
            collect_run_text(child, &mut text);
            out.push(text);
        } else {
            collect_paragraph_text(child, out);
        }
    }
}

fn collect_run_text(el: &Element, out: &mut String) {
    for child in el.child_elements() {
        if child.local_name() == "t" {
            out.push_str(&child.text());
        } else {
            collect_run_text(child, out);
        }
    }
}

/// Whether a shape has no content worth keeping: no text and no table.
///
/// A shape whose subtree holds a table is never considered empty, so a
/// table-valued placeholder can never be removed by the zero-height rule.
pub(crate) fn shape_is_empty(shape: &Element) -> bool {
    shape_text(shape).is_empty() && !shape.has_descendant("tbl")
}

/// Find a slide placeholder shape element by slot index.
pub(crate) fn find_placeholder<'a>(sp_tree: &'a Element, idx: u32) -> Option<(usize, &'a Element)> {
    collect_placeholders(sp_tree)
        .into_iter()
        .find(|ph| ph.idx == idx)
        .and_then(|ph| {
            sp_tree.children[ph.child]
                .as_element()
                .map(|el| (ph.child, el))
        })
}

/// Effective geometry for a slide placeholder: its own transform when
/// present, the layout's transform for the same slot otherwise.
pub(crate) fn effective_rect(
    slide_ph: &PlaceholderShape,
    layout_rects: &HashMap<u32, Rect>,
) -> Rect {
    slide_ph
        .rect
        .or_else(|| layout_rects.get(&slide_ph.idx).copied())
        .unwrap_or_default()
}

/// Geometry of every layout placeholder, by slot index.
pub(crate) fn layout_rects(layout_sptree: &Element) -> HashMap<u32, Rect> {
    collect_placeholders(layout_sptree)
        .into_iter()
        .filter_map(|ph| ph.rect.map(|rect| (ph.idx, rect)))
        .collect()
}

/// Extract the slide's template fragments in evaluation order.
///
/// Fails with [`Error::OrphanPlaceholder`] when any layout-declared slot has
/// no matching placeholder on the slide, which means the layout was not
/// applied when the slide was authored.
pub fn ordered_fragments(
    slide_sptree: &Element,
    layout_sptree: &Element,
) -> Result<Vec<PlaceholderFragment>> {
    let layout_phs = collect_placeholders(layout_sptree);
    let slide_phs = collect_placeholders(slide_sptree);
    let layout_geo = layout_rects(layout_sptree);

    let slide_by_idx: HashMap<u32, &PlaceholderShape> =
        slide_phs.iter().map(|ph| (ph.idx, ph)).collect();

    // slot -> template text, from the layout unless the slide authored it
    let mut fragment_text: HashMap<u32, String> = HashMap::new();
    for layout_ph in &layout_phs {
        // every layout slot must exist on the slide, template text or not
        let slide_ph = slide_by_idx
            .get(&layout_ph.idx)
            .ok_or(Error::OrphanPlaceholder(layout_ph.idx))?;
        let template = layout_sptree.children[layout_ph.child]
            .as_element()
            .map(shape_text)
            .unwrap_or_default();
        if template.is_empty() {
            continue;
        }
        let authored = slide_sptree.children[slide_ph.child]
            .as_element()
            .map(shape_text)
            .unwrap_or_default();
        if !authored.is_empty() {
            continue;
        }
        fragment_text.insert(layout_ph.idx, template);
    }

    // Ordering runs over every shape on the slide; non-placeholders group.
    let mut nodes = Vec::new();
    let mut node_slot: Vec<Option<u32>> = Vec::new();
    for (child, node) in slide_sptree.children.iter().enumerate() {
        let Some(el) = node.as_element() else {
            continue;
        };
        if !SHAPE_TAGS.contains(&el.local_name()) {
            continue;
        }
        let slot = slide_phs.iter().find(|ph| ph.child == child);
        let rect = match slot {
            Some(ph) => effective_rect(ph, &layout_geo),
            None => shapes::shape_rect(el).unwrap_or_default(),
        };
        nodes.push(ShapeNode {
            rect,
            is_placeholder: slot.is_some(),
        });
        node_slot.push(slot.map(|ph| ph.idx));
    }

    let mut fragments = Vec::new();
    for shape in shapes::resolve_order(&nodes) {
        let Some(idx) = node_slot[shape] else {
            continue;
        };
        let Some(text) = fragment_text.remove(&idx) else {
            continue;
        };
        let slide_ph = slide_by_idx[&idx];
        fragments.push(PlaceholderFragment {
            idx,
            ph_type: slide_ph.ph_type.clone(),
            text,
            rect: effective_rect(slide_ph, &layout_geo),
        });
    }
    Ok(fragments)
}
