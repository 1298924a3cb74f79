//! Merge-field templating for WordprocessingML documents.
//!
//! A template is scanned for MERGEFIELD occurrences (both the self-contained
//! `w:fldSimple` encoding and the run-spanning `w:fldChar`/`w:instrText`
//! encoding), and each field is swapped in place for caller-supplied content.

pub mod fields;
pub mod replace;
pub mod template;

pub use fields::{FieldEncoding, MergeField};
pub use replace::{
    FieldDiagnostics, HtmlReplacement, ImageReplacement, RenderContext, Replacement,
    TableReplacement,
};
pub use template::DocxTemplate;
