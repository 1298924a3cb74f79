//! The .docx template driver: load, scan, replace, render.

use crate::convert;
use crate::docx::fields::{self, FieldLocation, MergeField};
use crate::docx::replace::{
    FieldDiagnostics, RenderContext, Replacement, text_element,
};
use crate::error::{Error, Result};
use crate::opc::constants::{content_type, relationship_type};
use crate::opc::{OpcPackage, PackURI};
use crate::xml::{Element, Node};
use log::warn;
use std::collections::BTreeSet;
use std::path::Path;

/// A loaded .docx template.
///
/// The template owns its package and parsed document tree. Rendering clones
/// the whole template, so one loaded template can produce any number of
/// independent outputs and is never itself modified by a render.
#[derive(Debug, Clone)]
pub struct DocxTemplate {
    package: OpcPackage,
    partname: PackURI,
    document: Element,
    strict: bool,
}

impl DocxTemplate {
    /// Load a template from a .docx file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_package(OpcPackage::open(path)?)
    }

    /// Load a template from .docx bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_package(OpcPackage::from_bytes(bytes)?)
    }

    pub(crate) fn from_package(package: OpcPackage) -> Result<Self> {
        let partname = package.main_document_partname()?;
        let main = package.part(&partname)?;
        if main.content_type() != content_type::WML_DOCUMENT_MAIN {
            return Err(Error::NotADocument {
                expected: content_type::WML_DOCUMENT_MAIN.to_string(),
                got: main.content_type().to_string(),
            });
        }
        let document = main.xml()?;
        Ok(Self {
            package,
            partname,
            document,
            strict: true,
        })
    }

    /// Switch between strict mode (malformed or unbound fields fail the
    /// render) and lenient mode (they degrade to diagnostics). Strict is the
    /// default.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Scan the current document state for merge fields, in document order.
    pub fn fields(&self) -> Result<Vec<MergeField>> {
        fields::scan(&self.document, self.strict)
    }

    /// The set of distinct field names in the current document state.
    pub fn field_names(&self) -> Result<BTreeSet<String>> {
        Ok(self.fields()?.into_iter().map(|f| f.name).collect())
    }

    /// Replace every discovered field from the context, in place.
    ///
    /// Each replacement removes the field's markup, so the document is
    /// rescanned after every splice rather than holding stale tree paths.
    pub fn replace_fields(&mut self, ctx: &RenderContext) -> Result<FieldDiagnostics> {
        let mut used_keys: BTreeSet<String> = BTreeSet::new();
        let mut unused_fields: BTreeSet<String> = BTreeSet::new();

        loop {
            let mut found = self.fields()?;
            let Some(field) = found.drain(..).next() else {
                break;
            };
            match ctx.get(&field.name) {
                Some(replacement) => {
                    used_keys.insert(field.name.clone());
                    let replacement = replacement.clone();
                    self.apply(&field, replacement)?;
                },
                None if self.strict => {
                    return Err(Error::MissingField(field.name));
                },
                None => {
                    warn!("field {:?} has no binding; substituting empty text", field.name);
                    unused_fields.insert(field.name.clone());
                    self.apply(&field, Replacement::Text(String::new()))?;
                },
            }
        }

        let unused_keys = ctx
            .keys()
            .filter(|key| !used_keys.contains(*key))
            .map(str::to_string)
            .collect();
        Ok(FieldDiagnostics {
            unused_fields,
            unused_keys,
        })
    }

    /// Render the template against a context, returning .docx bytes.
    ///
    /// Works on a deep copy; the loaded template is untouched.
    pub fn render(&self, ctx: &RenderContext) -> Result<Vec<u8>> {
        let mut copy = self.clone();
        copy.replace_fields(ctx)?;
        copy.to_bytes()
    }

    /// Render to a .docx file.
    pub fn render_to_file(&self, path: impl AsRef<Path>, ctx: &RenderContext) -> Result<()> {
        std::fs::write(path, self.render(ctx)?)?;
        Ok(())
    }

    /// Render to PDF bytes through the external converter.
    pub fn render_pdf(&self, ctx: &RenderContext) -> Result<Vec<u8>> {
        convert::to_pdf(&self.render(ctx)?, "docx")
    }

    /// Render to a PDF file through the external converter.
    pub fn render_pdf_to_file(&self, path: impl AsRef<Path>, ctx: &RenderContext) -> Result<()> {
        std::fs::write(path, self.render_pdf(ctx)?)?;
        Ok(())
    }

    /// Serialize the current document state to .docx bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut package = self.package.clone();
        package.part_mut(&self.partname)?.set_xml(&self.document)?;
        package.to_bytes()
    }

    fn apply(&mut self, field: &MergeField, replacement: Replacement) -> Result<()> {
        match replacement {
            Replacement::Text(text) => {
                let run = Element::new("w:r").with_child(text_element(&text));
                self.splice_run(field, run)
            },
            Replacement::Image(image) => {
                let r_id = self.embed_image(&image)?;
                let drawing = Element::parse(image.drawing_xml(&r_id).as_bytes())?;
                let run = Element::new("w:r").with_child(drawing);
                self.splice_run(field, run)
            },
            Replacement::Table(table) => {
                self.splice_paragraph(field, vec![Node::Element(table.to_element())])
            },
            Replacement::Html(html) => {
                self.append_styles(&html.styles)?;
                let nodes = html
                    .paragraphs
                    .into_iter()
                    .map(Node::Element)
                    .collect();
                self.splice_paragraph(field, nodes)
            },
        }
    }

    /// Replace the field markup with one fresh run.
    fn splice_run(&mut self, field: &MergeField, run: Element) -> Result<()> {
        match &field.location {
            FieldLocation::Simple { paragraph, child } => {
                let p = self.paragraph_mut(paragraph)?;
                p.replace_with(*child, vec![Node::Element(run)]);
            },
            FieldLocation::Complex {
                paragraph,
                instr_run,
            } => {
                let p = self.paragraph_mut(paragraph)?;
                let (begin, end) = fields::marker_range(p, *instr_run, &field.name)?;
                p.replace_range(begin, end, Node::Element(run));
            },
        }
        Ok(())
    }

    /// Replace the field's enclosing paragraph with the given nodes.
    fn splice_paragraph(&mut self, field: &MergeField, nodes: Vec<Node>) -> Result<()> {
        let paragraph = match &field.location {
            FieldLocation::Simple { paragraph, .. } => paragraph,
            FieldLocation::Complex { paragraph, .. } => paragraph,
        };
        let (parent_path, p_idx) = paragraph
            .split_last()
            .map(|(last, init)| (init, *last))
            .ok_or_else(|| Error::Xml("field paragraph at document root".to_string()))?;
        let parent = self
            .document
            .descend_mut(parent_path)
            .ok_or_else(|| Error::Xml("stale field location".to_string()))?;
        parent.replace_with(p_idx, nodes);
        Ok(())
    }

    fn paragraph_mut(&mut self, path: &[usize]) -> Result<&mut Element> {
        self.document
            .descend_mut(path)
            .ok_or_else(|| Error::Xml("stale field location".to_string()))
    }

    /// Add the image bytes as a media part and relate the document part to
    /// it, returning the rId for the `a:blip` reference.
    fn embed_image(&mut self, image: &crate::docx::replace::ImageReplacement) -> Result<String> {
        let media_partname = self
            .package
            .next_partname(&format!("/word/media/image%d.{}", image.extension()))?;
        self.package.add_part(crate::opc::Part::new(
            media_partname.clone(),
            image.content_type(),
            image.bytes().to_vec(),
        ));

        let target = media_partname.relative_ref(self.partname.base_uri());
        let r_id = self
            .package
            .part_mut(&self.partname)?
            .rels_mut()
            .get_or_add(relationship_type::IMAGE, &target);
        Ok(r_id)
    }

    /// Append style definitions to the document's style table. Ids are not
    /// de-duplicated; a clash with an existing id is accepted.
    fn append_styles(&mut self, styles: &[Element]) -> Result<()> {
        if styles.is_empty() {
            return Ok(());
        }
        let styles_partname = PackURI::new("/word/styles.xml")?;
        if !self.package.contains(&styles_partname) {
            warn!("document has no styles part; dropping {} converted styles", styles.len());
            return Ok(());
        }
        let part = self.package.part_mut(&styles_partname)?;
        let mut root = part.xml()?;
        for style in styles {
            root.children.push(Node::Element(style.clone()));
        }
        part.set_xml(&root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::replace::{HtmlReplacement, TableReplacement};

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>
<w:p><w:fldSimple w:instr=" MERGEFIELD Customer \* MERGEFORMAT "><w:r><w:t>placeholder</w:t></w:r></w:fldSimple></w:p>
<w:p><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText xml:space="preserve"> MERGEFIELD Amount \* MERGEFORMAT </w:instrText></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>placeholder</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:p>
</w:body></w:document>"#;

    fn fixture() -> DocxTemplate {
        let mut package = OpcPackage::empty();
        package
            .rels_mut()
            .get_or_add(relationship_type::OFFICE_DOCUMENT, "word/document.xml");
        package.add_part(crate::opc::Part::new(
            PackURI::new("/word/document.xml").unwrap(),
            content_type::WML_DOCUMENT_MAIN,
            DOCUMENT_XML.as_bytes().to_vec(),
        ));
        DocxTemplate::from_package(package).unwrap()
    }

    #[test]
    fn wrong_content_type_is_not_a_document() {
        let mut package = OpcPackage::empty();
        package
            .rels_mut()
            .get_or_add(relationship_type::OFFICE_DOCUMENT, "ppt/presentation.xml");
        package.add_part(crate::opc::Part::new(
            PackURI::new("/ppt/presentation.xml").unwrap(),
            content_type::PML_PRESENTATION_MAIN,
            b"<p:presentation/>".to_vec(),
        ));
        assert!(matches!(
            DocxTemplate::from_package(package),
            Err(Error::NotADocument { .. })
        ));
    }

    #[test]
    fn both_encodings_replaced_in_one_pass() {
        let mut template = fixture();
        assert_eq!(
            template.field_names().unwrap(),
            BTreeSet::from(["Customer".to_string(), "Amount".to_string()])
        );

        let ctx: RenderContext =
            [("Customer", "ACME Corp"), ("Amount", "12.50")].into_iter().collect();
        let diagnostics = template.replace_fields(&ctx).unwrap();

        assert!(diagnostics.unused_fields.is_empty());
        assert!(diagnostics.unused_keys.is_empty());
        assert!(template.field_names().unwrap().is_empty());

        let body_text = template.document.text();
        assert!(body_text.contains("ACME Corp"));
        assert!(body_text.contains("12.50"));
        assert!(!body_text.contains("placeholder"));
    }

    #[test]
    fn strict_mode_fails_on_missing_binding() {
        let mut template = fixture();
        let ctx: RenderContext = [("Customer", "ACME")].into_iter().collect();
        assert!(matches!(
            template.replace_fields(&ctx),
            Err(Error::MissingField(name)) if name == "Amount"
        ));
    }

    #[test]
    fn lenient_mode_reports_diagnostics() {
        let mut template = fixture();
        template.set_strict(false);
        let ctx: RenderContext =
            [("Customer", "ACME"), ("Nonexistent", "x")].into_iter().collect();

        let diagnostics = template.replace_fields(&ctx).unwrap();
        assert_eq!(diagnostics.unused_fields, BTreeSet::from(["Amount".to_string()]));
        assert_eq!(
            diagnostics.unused_keys,
            BTreeSet::from(["Nonexistent".to_string()])
        );
        assert!(template.field_names().unwrap().is_empty());
    }

    #[test]
    fn table_replaces_enclosing_paragraph() {
        let mut template = fixture();
        let mut ctx = RenderContext::new();
        ctx.insert(
            "Customer",
            TableReplacement::new(vec![vec!["x", "y"]], Some(vec!["h1".into(), "h2".into()]))
                .unwrap(),
        );
        ctx.insert("Amount", "12.50");
        template.replace_fields(&ctx).unwrap();

        let body = template.document.find_child("body").unwrap();
        assert!(body.find_child("tbl").is_some());
        // the paragraph that held the field is gone
        let paragraph_count = body
            .child_elements()
            .filter(|el| el.local_name() == "p")
            .count();
        assert_eq!(paragraph_count, 1);
    }

    #[test]
    fn html_replacement_splices_paragraphs_and_appends_styles() {
        let mut template = fixture();
        let styles_partname = PackURI::new("/word/styles.xml").unwrap();
        template.package.add_part(crate::opc::Part::new(
            styles_partname.clone(),
            content_type::WML_STYLES,
            br#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Emphasis"/></w:styles>"#.to_vec(),
        ));

        // converted output as the html-to-docx converter would hand it back
        let mut converted = OpcPackage::empty();
        converted
            .rels_mut()
            .get_or_add(relationship_type::OFFICE_DOCUMENT, "word/document.xml");
        converted.add_part(crate::opc::Part::new(
            PackURI::new("/word/document.xml").unwrap(),
            content_type::WML_DOCUMENT_MAIN,
            br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>first</w:t></w:r></w:p><w:p><w:r><w:t>second</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#.to_vec(),
        ));
        converted.add_part(crate::opc::Part::new(
            PackURI::new("/word/styles.xml").unwrap(),
            content_type::WML_STYLES,
            br#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Emphasis"/></w:styles>"#.to_vec(),
        ));
        let html = HtmlReplacement::from_docx_bytes(converted.to_bytes().unwrap()).unwrap();

        let mut ctx = RenderContext::new();
        ctx.insert("Customer", html);
        ctx.insert("Amount", "1");
        template.replace_fields(&ctx).unwrap();

        // both converted paragraphs stand where the field's paragraph was
        let body = template.document.find_child("body").unwrap();
        let texts: Vec<String> = body
            .child_elements()
            .filter(|el| el.local_name() == "p")
            .map(|p| p.text())
            .collect();
        assert_eq!(texts, vec!["first", "second", "1"]);

        // styles are appended without de-duplication; the id clash stays
        let styles = template
            .package
            .part(&styles_partname)
            .unwrap()
            .xml()
            .unwrap();
        let ids: Vec<&str> = styles
            .child_elements()
            .filter_map(|el| el.attr("styleId"))
            .collect();
        assert_eq!(ids, vec!["Emphasis", "Emphasis"]);
    }

    #[test]
    fn image_replacement_embeds_media_part() {
        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(4, 4)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let mut template = fixture();
        let mut ctx = RenderContext::new();
        ctx.insert(
            "Customer",
            crate::docx::replace::ImageReplacement::new(png).unwrap(),
        );
        ctx.insert("Amount", "1");
        template.replace_fields(&ctx).unwrap();

        let media = PackURI::new("/word/media/image1.png").unwrap();
        assert!(template.package.contains(&media));

        let doc_part = template.package.part(&template.partname).unwrap();
        let rel = doc_part
            .rels()
            .part_with_reltype(relationship_type::IMAGE)
            .unwrap();
        assert_eq!(rel.target_ref(), "media/image1.png");
        assert!(template.document.has_descendant("blip"));
    }

    #[test]
    fn renders_are_independent_of_the_template_and_each_other() {
        let template = fixture();

        let ctx_a: RenderContext =
            [("Customer", "A"), ("Amount", "1")].into_iter().collect();
        let ctx_b: RenderContext =
            [("Customer", "B"), ("Amount", "2")].into_iter().collect();

        let out_a = template.render(&ctx_a).unwrap();
        let out_b = template.render(&ctx_b).unwrap();

        // template still has its fields after rendering
        assert_eq!(template.field_names().unwrap().len(), 2);

        let doc_a = DocxTemplate::from_bytes(out_a).unwrap();
        let doc_b = DocxTemplate::from_bytes(out_b).unwrap();
        assert!(doc_a.document.text().contains('A'));
        assert!(doc_b.document.text().contains('B'));
        assert!(doc_a.field_names().unwrap().is_empty());
        assert!(doc_b.field_names().unwrap().is_empty());
    }
}
