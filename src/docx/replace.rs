//! Replacement content for merge fields.
//!
//! A replacement is constructed by the caller, validated up front, and
//! spliced into the document exactly once. Validation at construction time
//! means a failing replacement never leaves the document half-rewritten.

use crate::convert;
use crate::error::{Error, Result};
use crate::opc::OpcPackage;
use crate::xml::{Element, Node};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

/// EMUs per pixel at the conventional 96 dpi.
const EMU_PER_PX: i64 = 914400 / 96;

/// Content to substitute for one merge field.
#[derive(Debug, Clone)]
pub enum Replacement {
    /// Plain text filling a fresh run in place of the field markup
    Text(String),

    /// An inline image filling a fresh run
    Image(ImageReplacement),

    /// A table replacing the field's enclosing paragraph
    Table(TableReplacement),

    /// Converted HTML paragraphs replacing the field's enclosing paragraph
    Html(HtmlReplacement),
}

impl From<&str> for Replacement {
    fn from(text: &str) -> Self {
        Replacement::Text(text.to_string())
    }
}

impl From<String> for Replacement {
    fn from(text: String) -> Self {
        Replacement::Text(text)
    }
}

impl From<ImageReplacement> for Replacement {
    fn from(image: ImageReplacement) -> Self {
        Replacement::Image(image)
    }
}

impl From<TableReplacement> for Replacement {
    fn from(table: TableReplacement) -> Self {
        Replacement::Table(table)
    }
}

impl From<HtmlReplacement> for Replacement {
    fn from(html: HtmlReplacement) -> Self {
        Replacement::Html(html)
    }
}

/// An inline image with its display size in EMUs.
#[derive(Debug, Clone)]
pub struct ImageReplacement {
    bytes: Vec<u8>,
    extension: &'static str,
    content_type: &'static str,
    width_emu: i64,
    height_emu: i64,
}

impl ImageReplacement {
    /// Create an image replacement sized to the image's intrinsic pixel
    /// dimensions at 96 dpi.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        let (extension, content_type, (width_px, height_px)) = sniff_image(&bytes)?;
        Ok(Self {
            bytes,
            extension,
            content_type,
            width_emu: width_px as i64 * EMU_PER_PX,
            height_emu: height_px as i64 * EMU_PER_PX,
        })
    }

    /// Create an image replacement with an explicit display size in EMUs.
    pub fn with_size_emu(bytes: Vec<u8>, width_emu: i64, height_emu: i64) -> Result<Self> {
        let (extension, content_type, _) = sniff_image(&bytes)?;
        Ok(Self {
            bytes,
            extension,
            content_type,
            width_emu,
            height_emu,
        })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub(crate) fn extension(&self) -> &'static str {
        self.extension
    }

    #[inline]
    pub(crate) fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// The `w:drawing` markup embedding this image through relationship
    /// `r_id`.
    pub(crate) fn drawing_xml(&self, r_id: &str) -> String {
        format!(
            r#"<w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:effectExtent l="0" t="0" r="0" b="0"/><wp:docPr id="1" name="Picture"/><wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr><a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:nvPicPr><pic:cNvPr id="0" name="Picture"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{r_id}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#,
            cx = self.width_emu,
            cy = self.height_emu,
            r_id = r_id,
        )
    }
}

pub(crate) fn sniff_image(bytes: &[u8]) -> Result<(&'static str, &'static str, (u32, u32))> {
    use crate::opc::constants::content_type;

    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| Error::UnsupportedImage)?;
    let format = reader.format().ok_or(Error::UnsupportedImage)?;
    let dimensions = reader
        .into_dimensions()
        .map_err(|_| Error::UnsupportedImage)?;

    let (extension, ct) = match format {
        image::ImageFormat::Png => ("png", content_type::PNG),
        image::ImageFormat::Jpeg => ("jpeg", content_type::JPEG),
        image::ImageFormat::Gif => ("gif", content_type::GIF),
        image::ImageFormat::Bmp => ("bmp", content_type::BMP),
        image::ImageFormat::Tiff => ("tiff", content_type::TIFF),
        _ => return Err(Error::UnsupportedImage),
    };
    Ok((extension, ct, dimensions))
}

/// A rectangular data grid with an optional header row.
#[derive(Debug, Clone)]
pub struct TableReplacement {
    headers: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    cols: usize,
}

impl TableReplacement {
    /// Validate and build a table from data rows and an optional header row.
    ///
    /// Fails with [`Error::RaggedTable`] when row lengths differ and
    /// [`Error::HeaderMismatch`] when the header width differs from the data
    /// width, before any document is touched.
    pub fn new<T: ToString>(rows: Vec<Vec<T>>, headers: Option<Vec<String>>) -> Result<Self> {
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.to_string()).collect())
            .collect();

        let data_width = rows.first().map(Vec::len);
        if let Some(width) = data_width {
            if rows.iter().any(|row| row.len() != width) {
                return Err(Error::RaggedTable);
            }
        }

        let cols = match (&headers, data_width) {
            (Some(headers), Some(width)) => {
                if headers.len() != width {
                    return Err(Error::HeaderMismatch {
                        header: headers.len(),
                        data: width,
                    });
                }
                width
            },
            (Some(headers), None) => headers.len(),
            (None, Some(width)) => width,
            (None, None) => 0,
        };

        Ok(Self { headers, rows, cols })
    }

    /// Total rendered row count: data rows plus one when headers are present.
    pub fn row_count(&self) -> usize {
        self.rows.len() + usize::from(self.headers.is_some())
    }

    #[inline]
    pub fn col_count(&self) -> usize {
        self.cols
    }

    /// Build the `w:tbl` element for this grid.
    pub(crate) fn to_element(&self) -> Element {
        let mut grid = Element::new("w:tblGrid");
        for _ in 0..self.cols {
            grid.children.push(Node::Element(Element::new("w:gridCol")));
        }

        let mut tbl = Element::new("w:tbl")
            .with_child(
                Element::new("w:tblPr")
                    .with_child(Element::new("w:tblStyle").with_attr("w:val", "TableGrid"))
                    .with_child(
                        Element::new("w:tblW")
                            .with_attr("w:w", "0")
                            .with_attr("w:type", "auto"),
                    ),
            )
            .with_child(grid);

        if let Some(headers) = &self.headers {
            tbl.children.push(Node::Element(table_row(headers)));
        }
        for row in &self.rows {
            tbl.children.push(Node::Element(table_row(row)));
        }
        tbl
    }
}

fn table_row(cells: &[String]) -> Element {
    let mut tr = Element::new("w:tr");
    for cell in cells {
        tr.children.push(Node::Element(
            Element::new("w:tc").with_child(
                Element::new("w:p")
                    .with_child(Element::new("w:r").with_child(text_element(cell))),
            ),
        ));
    }
    tr
}

/// A `w:t` element, space-preserving when the text has edge whitespace.
pub(crate) fn text_element(text: &str) -> Element {
    let mut t = Element::new("w:t");
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        t.set_attr("xml:space", "preserve");
    }
    t.children.push(Node::Text(text.to_string()));
    t
}

/// Paragraphs and style definitions extracted from converted HTML.
///
/// The conversion runs at construction time. Style ids are spliced into the
/// target document without de-duplication; a clash with an existing id is
/// accepted.
#[derive(Debug, Clone)]
pub struct HtmlReplacement {
    pub(crate) paragraphs: Vec<Element>,
    pub(crate) styles: Vec<Element>,
}

impl HtmlReplacement {
    /// Convert an HTML fragment to WordprocessingML and keep its body
    /// paragraphs and style definitions.
    pub fn new(html: &str) -> Result<Self> {
        let docx = convert::html_to_docx(html)?;
        Self::from_docx_bytes(docx)
    }

    pub(crate) fn from_docx_bytes(docx: Vec<u8>) -> Result<Self> {
        let package = OpcPackage::from_bytes(docx)?;
        let document = package.main_document_part()?.xml()?;
        let body = document
            .find_child("body")
            .ok_or_else(|| Error::Xml("document has no body".to_string()))?;
        let paragraphs: Vec<Element> = body
            .child_elements()
            .filter(|el| el.local_name() != "sectPr")
            .cloned()
            .collect();

        let mut styles = Vec::new();
        let styles_partname = crate::opc::PackURI::new("/word/styles.xml")?;
        if let Ok(part) = package.part(&styles_partname) {
            styles = part
                .xml()?
                .child_elements()
                .filter(|el| el.local_name() == "style")
                .cloned()
                .collect();
        }

        Ok(Self { paragraphs, styles })
    }
}

/// The data bound to a render pass: field name to replacement.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    bindings: BTreeMap<String, Replacement>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a field name. Scalar values convert implicitly to text.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Replacement>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Replacement> {
        self.bindings.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Replacement>> FromIterator<(K, V)> for RenderContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Self::new();
        for (name, value) in iter {
            ctx.insert(name, value);
        }
        ctx
    }
}

/// Non-fatal findings from a replacement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDiagnostics {
    /// Field names discovered in the document with no context binding
    pub unused_fields: BTreeSet<String>,

    /// Context keys never consumed by any field
    pub unused_keys: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_shape_and_contents() {
        let table = TableReplacement::new(
            vec![vec![1, 2], vec![3, 4], vec![5, 6]],
            Some(vec!["a".to_string(), "b".to_string()]),
        )
        .unwrap();
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.col_count(), 2);

        let tbl = table.to_element();
        let rows: Vec<&Element> = tbl
            .child_elements()
            .filter(|el| el.local_name() == "tr")
            .collect();
        assert_eq!(rows.len(), 4);

        // header text in row 0, str(value) in data cells
        let header_cells: Vec<String> = rows[0]
            .child_elements()
            .map(|tc| tc.text())
            .collect();
        assert_eq!(header_cells, vec!["a", "b"]);
        assert_eq!(rows[1].child_elements().next().unwrap().text(), "1");
        assert_eq!(rows[3].child_elements().nth(1).unwrap().text(), "6");

        let grid = tbl.find_child("tblGrid").unwrap();
        assert_eq!(grid.child_elements().count(), 2);
    }

    #[test]
    fn ragged_rows_rejected_at_construction() {
        let result = TableReplacement::new(vec![vec![1, 2], vec![3]], None);
        assert!(matches!(result, Err(Error::RaggedTable)));
    }

    #[test]
    fn header_width_mismatch_rejected() {
        let result = TableReplacement::new(
            vec![vec![1, 2, 3]],
            Some(vec!["only".to_string(), "two".to_string()]),
        );
        assert!(matches!(
            result,
            Err(Error::HeaderMismatch { header: 2, data: 3 })
        ));
    }

    #[test]
    fn unrecognized_image_bytes_rejected() {
        assert!(matches!(
            ImageReplacement::new(b"definitely not an image".to_vec()),
            Err(Error::UnsupportedImage)
        ));
    }

    #[test]
    fn image_size_from_pixels() {
        // 2x3 PNG, handmade via the image crate's encoder
        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(2, 3)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let replacement = ImageReplacement::new(png).unwrap();
        assert_eq!(replacement.extension(), "png");
        assert_eq!(replacement.width_emu, 2 * EMU_PER_PX);
        assert_eq!(replacement.height_emu, 3 * EMU_PER_PX);

        let xml = replacement.drawing_xml("rId7");
        assert!(xml.contains(r#"r:embed="rId7""#));
        assert!(xml.contains(&format!(r#"cx="{}""#, 2 * EMU_PER_PX)));
    }

    #[test]
    fn converted_docx_yields_body_paragraphs_and_styles() {
        use crate::opc::constants::{content_type, relationship_type};
        use crate::opc::{PackURI, Part};

        // the shape of package pandoc hands back
        let mut package = OpcPackage::empty();
        package
            .rels_mut()
            .get_or_add(relationship_type::OFFICE_DOCUMENT, "word/document.xml");
        package.add_part(Part::new(
            PackURI::new("/word/document.xml").unwrap(),
            content_type::WML_DOCUMENT_MAIN,
            br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>first</w:t></w:r></w:p><w:p><w:r><w:t>second</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#.to_vec(),
        ));
        package.add_part(Part::new(
            PackURI::new("/word/styles.xml").unwrap(),
            content_type::WML_STYLES,
            br#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults/><w:style w:type="paragraph" w:styleId="Emphasis"/></w:styles>"#.to_vec(),
        ));

        let html = HtmlReplacement::from_docx_bytes(package.to_bytes().unwrap()).unwrap();
        // sectPr is layout, not content, and stays behind
        assert_eq!(html.paragraphs.len(), 2);
        assert_eq!(html.paragraphs[0].text(), "first");
        assert_eq!(html.paragraphs[1].text(), "second");
        assert_eq!(html.styles.len(), 1);
        assert_eq!(html.styles[0].attr("styleId"), Some("Emphasis"));
    }

    #[test]
    fn text_element_preserves_edge_whitespace() {
        assert_eq!(text_element(" padded").attr("space"), Some("preserve"));
        assert_eq!(text_element("plain").attr("space"), None);
    }
}
