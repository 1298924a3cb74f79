//! External converter boundaries.
//!
//! Two blocking subprocess calls, neither retried internally: LibreOffice for
//! PDF export and pandoc for HTML to WordprocessingML. Inputs and outputs go
//! through a scoped temp directory that is removed on every exit path,
//! including failure.

use crate::error::{Error, Result};
use std::process::Command;
use tempfile::TempDir;

/// Convert document bytes to PDF via `soffice --headless`.
///
/// `ext` is the extension of the input format ("docx" or "pptx"); the output
/// file is read back by the converter's naming convention, `<basename>.pdf`.
pub fn to_pdf(input: &[u8], ext: &str) -> Result<Vec<u8>> {
    let dir = TempDir::new()?;
    let input_path = dir.path().join(format!("document.{}", ext));
    std::fs::write(&input_path, input)?;

    let output = Command::new("soffice")
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg(&input_path)
        .arg("--outdir")
        .arg(dir.path())
        .output()
        .map_err(|e| Error::Converter(format!("failed to launch soffice: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Converter(format!(
            "soffice exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let pdf_path = dir.path().join("document.pdf");
    std::fs::read(&pdf_path)
        .map_err(|_| Error::Converter("soffice reported success but produced no PDF".to_string()))
}

/// Convert an HTML fragment to a .docx package via pandoc.
pub fn html_to_docx(html: &str) -> Result<Vec<u8>> {
    let dir = TempDir::new()?;
    let input_path = dir.path().join("fragment.html");
    let output_path = dir.path().join("fragment.docx");
    std::fs::write(&input_path, html)?;

    let output = Command::new("pandoc")
        .arg("-f")
        .arg("html")
        .arg("-t")
        .arg("docx")
        .arg("-o")
        .arg(&output_path)
        .arg(&input_path)
        .output()
        .map_err(|e| Error::Converter(format!("failed to launch pandoc: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Converter(format!(
            "pandoc exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    std::fs::read(&output_path)
        .map_err(|_| Error::Converter("pandoc reported success but produced no output".to_string()))
}
