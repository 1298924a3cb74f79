//! Paperwork - a templating engine for Microsoft Office documents
//!
//! This library renders .docx and .pptx templates against caller-supplied
//! data: merge fields in word-processing documents are swapped for text,
//! images, tables or converted HTML, and slide-deck placeholders are filled
//! from layout-declared template text, with control directives that stamp
//! repeated slides from a list.
//!
//! # Example - Rendering a DOCX template
//!
//! ```no_run
//! use paperwork::docx::{DocxTemplate, RenderContext, TableReplacement};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = DocxTemplate::open("contract.docx")?;
//!
//! let mut ctx = RenderContext::new();
//! ctx.insert("Customer", "ACME Corp");
//! ctx.insert(
//!     "LineItems",
//!     TableReplacement::new(
//!         vec![vec!["Widget", "2", "9.50"]],
//!         Some(vec!["Item".into(), "Qty".into(), "Price".into()]),
//!     )?,
//! );
//!
//! // each render works on an independent copy of the template
//! template.render_to_file("contract-acme.docx", &ctx)?;
//! let pdf = template.render_pdf(&ctx)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Rendering a PPTX template
//!
//! ```no_run
//! use paperwork::pptx::{Context, DirectiveEngine, FormatEngine, PptxTemplate};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut deck = PptxTemplate::open("invites.pptx")?;
//!
//! let mut ctx = Context::new();
//! ctx.set_text("event", "Launch Party");
//! ctx.set_list("guests", ["Ada", "Grace"]);
//!
//! let mut engine = DirectiveEngine::new(FormatEngine::new());
//! deck.render(&mut ctx, &mut engine)?;
//! deck.save("invites-rendered.pptx")?;
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod docx;
pub mod error;
pub mod opc;
pub mod pptx;
pub mod xml;

pub use error::{Error, Result};

pub use docx::{DocxTemplate, RenderContext, Replacement};
pub use pptx::{Context, PptxTemplate, RenderEngine};
