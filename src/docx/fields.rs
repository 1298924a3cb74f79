//! Merge field discovery.
//!
//! WordprocessingML encodes the "same" logical field two incompatible ways:
//!
//! - simple: one self-contained `w:fldSimple` element carrying the
//!   instruction text in its `w:instr` attribute;
//! - complex: a `w:instrText` run bracketed by sibling runs holding
//!   `w:fldChar` begin and end markers, all within one paragraph.
//!
//! Scanning is stateless: every call walks the current document tree afresh,
//! so a scan after replacement reflects the mutated markup.

use crate::error::{Error, Result};
use crate::xml::Element;
use log::warn;

/// The physical encoding of a discovered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    Simple,
    Complex,
}

/// Where a field's markup sits in the document tree.
///
/// Paths are child indices from the document root; they are valid only
/// against the tree state they were scanned from.
#[derive(Debug, Clone)]
pub enum FieldLocation {
    /// `w:fldSimple` at `paragraph[child]`
    Simple { paragraph: Vec<usize>, child: usize },

    /// run holding `w:instrText` at `paragraph[instr_run]`
    Complex { paragraph: Vec<usize>, instr_run: usize },
}

/// A located occurrence of a named merge field.
#[derive(Debug, Clone)]
pub struct MergeField {
    pub name: String,
    pub location: FieldLocation,
}

impl MergeField {
    pub fn encoding(&self) -> FieldEncoding {
        match self.location {
            FieldLocation::Simple { .. } => FieldEncoding::Simple,
            FieldLocation::Complex { .. } => FieldEncoding::Complex,
        }
    }
}

/// Extract the field name from instruction text of the shape
/// `MERGEFIELD "<name>" [\* MERGEFORMAT]`, case-insensitive, quotes optional.
pub fn parse_instruction(instr: &str) -> Option<String> {
    let rest = instr.trim_start();
    if rest.len() < "MERGEFIELD".len()
        || !rest[.."MERGEFIELD".len()].eq_ignore_ascii_case("MERGEFIELD")
    {
        return None;
    }
    let rest = &rest["MERGEFIELD".len()..];
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let rest = rest.trim_start();

    let (name, tail) = if let Some(inner) = rest.strip_prefix('"') {
        let end = inner.find('"')?;
        (&inner[..end], &inner[end + 1..])
    } else {
        let end = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        (&rest[..end], &rest[end..])
    };
    if name.is_empty() {
        return None;
    }

    // Only the MERGEFORMAT formatting switch is recognized after the name.
    let tail = tail.trim();
    if tail.is_empty() || tail.eq_ignore_ascii_case(r"\* MERGEFORMAT") {
        Some(name.to_string())
    } else {
        None
    }
}

/// Enumerate every field occurrence in document order.
///
/// Strict mode fails with [`Error::MalformedField`] on instruction text that
/// does not match the MERGEFIELD grammar; lenient mode logs and skips it.
pub fn scan(root: &Element, strict: bool) -> Result<Vec<MergeField>> {
    let mut fields = Vec::new();
    let mut path = Vec::new();
    walk(root, &mut path, strict, &mut fields)?;
    Ok(fields)
}

fn walk(
    el: &Element,
    path: &mut Vec<usize>,
    strict: bool,
    out: &mut Vec<MergeField>,
) -> Result<()> {
    if el.local_name() == "p" {
        return scan_paragraph(el, path, strict, out);
    }
    for (idx, child) in el.children.iter().enumerate() {
        if let Some(child_el) = child.as_element() {
            path.push(idx);
            walk(child_el, path, strict, out)?;
            path.pop();
        }
    }
    Ok(())
}

fn scan_paragraph(
    paragraph: &Element,
    path: &[usize],
    strict: bool,
    out: &mut Vec<MergeField>,
) -> Result<()> {
    for (idx, child) in paragraph.children.iter().enumerate() {
        let Some(el) = child.as_element() else {
            continue;
        };
        match el.local_name() {
            "fldSimple" => {
                let instr = el.attr("instr").unwrap_or_default().to_string();
                match parse_instruction(&instr) {
                    Some(name) => out.push(MergeField {
                        name,
                        location: FieldLocation::Simple {
                            paragraph: path.to_vec(),
                            child: idx,
                        },
                    }),
                    None => handle_malformed(&instr, strict)?,
                }
            },
            "r" => {
                let Some(instr_el) = el.find_descendant("instrText") else {
                    continue;
                };
                let instr = instr_el.text();
                match parse_instruction(&instr) {
                    Some(name) => out.push(MergeField {
                        name,
                        location: FieldLocation::Complex {
                            paragraph: path.to_vec(),
                            instr_run: idx,
                        },
                    }),
                    None => handle_malformed(&instr, strict)?,
                }
            },
            _ => {},
        }
    }
    Ok(())
}

fn handle_malformed(instr: &str, strict: bool) -> Result<()> {
    if strict {
        return Err(Error::MalformedField(instr.to_string()));
    }
    warn!("skipping field with unrecognized instruction {:?}", instr);
    Ok(())
}

/// Whether a paragraph child is a run carrying a `w:fldChar` of the given
/// type ("begin", "separate" or "end").
fn is_marker_run(el: &Element, fld_char_type: &str) -> bool {
    el.local_name() == "r"
        && el
            .find_descendant("fldChar")
            .and_then(|fc| fc.attr("fldCharType"))
            .is_some_and(|t| t == fld_char_type)
}

/// Locate the begin and end marker runs bracketing a complex field's
/// instruction run, scanning backward then forward through the paragraph's
/// children. The search never crosses the paragraph boundary; running out of
/// siblings is a malformed-document error.
pub fn marker_range(paragraph: &Element, instr_run: usize, name: &str) -> Result<(usize, usize)> {
    let begin = paragraph.children[..instr_run]
        .iter()
        .rposition(|node| node.as_element().is_some_and(|el| is_marker_run(el, "begin")))
        .ok_or_else(|| Error::BeginMarkerNotFound(name.to_string()))?;

    let end = paragraph.children[instr_run + 1..]
        .iter()
        .position(|node| node.as_element().is_some_and(|el| is_marker_run(el, "end")))
        .map(|offset| instr_run + 1 + offset)
        .ok_or_else(|| Error::EndMarkerNotFound(name.to_string()))?;

    Ok((begin, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_grammar() {
        assert_eq!(
            parse_instruction(r#" MERGEFIELD  Name  \* MERGEFORMAT "#).as_deref(),
            Some("Name")
        );
        assert_eq!(
            parse_instruction(r#"MERGEFIELD "Full Name""#).as_deref(),
            Some("Full Name")
        );
        assert_eq!(
            parse_instruction("mergefield lowercase").as_deref(),
            Some("lowercase")
        );
        assert_eq!(parse_instruction(" PAGE "), None);
        assert_eq!(parse_instruction("MERGEFIELDS x"), None);
        assert_eq!(parse_instruction("MERGEFIELD"), None);
        assert_eq!(parse_instruction(r#"MERGEFIELD x \date"#), None);
    }

    fn simple_field_xml() -> &'static [u8] {
        br#"<w:document><w:body>
            <w:p><w:fldSimple w:instr=" MERGEFIELD Customer \* MERGEFORMAT "><w:r><w:t>&#171;Customer&#187;</w:t></w:r></w:fldSimple></w:p>
        </w:body></w:document>"#
    }

    fn complex_field_xml() -> &'static [u8] {
        br#"<w:document><w:body>
            <w:p>
                <w:r><w:fldChar w:fldCharType="begin"/></w:r>
                <w:r><w:instrText xml:space="preserve"> MERGEFIELD Amount \* MERGEFORMAT </w:instrText></w:r>
                <w:r><w:fldChar w:fldCharType="separate"/></w:r>
                <w:r><w:t>&#171;Amount&#187;</w:t></w:r>
                <w:r><w:fldChar w:fldCharType="end"/></w:r>
            </w:p>
        </w:body></w:document>"#
    }

    #[test]
    fn scan_finds_simple_fields() {
        let root = Element::parse(simple_field_xml()).unwrap();
        let fields = scan(&root, true).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "Customer");
        assert_eq!(fields[0].encoding(), FieldEncoding::Simple);
    }

    #[test]
    fn scan_finds_complex_fields() {
        let root = Element::parse(complex_field_xml()).unwrap();
        let fields = scan(&root, true).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "Amount");
        assert_eq!(fields[0].encoding(), FieldEncoding::Complex);
    }

    #[test]
    fn strict_scan_rejects_unknown_instruction() {
        let xml = br#"<w:document><w:body>
            <w:p><w:fldSimple w:instr=" PAGE "/></w:p>
        </w:body></w:document>"#;
        let root = Element::parse(xml).unwrap();
        assert!(matches!(scan(&root, true), Err(Error::MalformedField(_))));
        assert!(scan(&root, false).unwrap().is_empty());
    }

    #[test]
    fn marker_search_stops_at_paragraph_boundary() {
        // instrText run with an end marker but no begin marker
        let xml = br#"<w:p>
            <w:r><w:instrText> MERGEFIELD X </w:instrText></w:r>
            <w:r><w:fldChar w:fldCharType="end"/></w:r>
        </w:p>"#;
        let paragraph = Element::parse(xml).unwrap();
        let instr_run = paragraph.child_position("r").unwrap();
        assert!(matches!(
            marker_range(&paragraph, instr_run, "X"),
            Err(Error::BeginMarkerNotFound(_))
        ));
    }

    #[test]
    fn marker_range_brackets_instruction_run() {
        let root = Element::parse(complex_field_xml()).unwrap();
        let paragraph = root
            .find_child("body")
            .unwrap()
            .find_child("p")
            .unwrap();
        let (begin, end) = marker_range(paragraph, 3, "Amount").unwrap();
        assert!(begin < 3 && end > 3);
        let begin_el = paragraph.children[begin].as_element().unwrap();
        assert!(is_marker_run(begin_el, "begin"));
    }
}
