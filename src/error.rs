//! Unified error types for the paperwork library.
//!
//! A single error enum covers package IO, XML handling, field scanning,
//! replacement validation and the external converter boundary, presenting a
//! consistent API to users.
use thiserror::Error;

/// Main error type for paperwork operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(String),

    /// XML parsing or serialization error
    #[error("XML error: {0}")]
    Xml(String),

    /// The package's main part has the wrong content type
    #[error("not a supported document: expected {expected}, got {got}")]
    NotADocument { expected: String, got: String },

    /// Part not found in the package
    #[error("part not found: {0}")]
    PartNotFound(String),

    /// Invalid pack URI
    #[error("invalid pack URI: {0}")]
    InvalidPackUri(String),

    /// Relationship not found or ambiguous
    #[error("relationship error: {0}")]
    Relationship(String),

    /// Field instruction text did not match the MERGEFIELD grammar
    #[error("could not determine name of merge field with instruction {0:?}")]
    MalformedField(String),

    /// No begin marker found for a complex field within its paragraph
    #[error("could not find begin marker for field {0:?}; is the document malformed?")]
    BeginMarkerNotFound(String),

    /// No end marker found for a complex field within its paragraph
    #[error("could not find end marker for field {0:?}; is the document malformed?")]
    EndMarkerNotFound(String),

    /// A field name has no binding in the render context (strict mode)
    #[error("field {0:?} has no value in the render context")]
    MissingField(String),

    /// Table replacement rows have differing lengths
    #[error("table data contains rows of varying sizes")]
    RaggedTable,

    /// Table replacement header width differs from data width
    #[error("table header length {header} does not match data width {data}")]
    HeaderMismatch { header: usize, data: usize },

    /// A layout declares a placeholder slot the slide does not have
    #[error("placeholder {0} exists on the layout but not on the slide; was the layout applied?")]
    OrphanPlaceholder(u32),

    /// Image bytes were not in a recognized format
    #[error("unrecognized image format")]
    UnsupportedImage,

    /// External converter failed to produce output
    #[error("converter error: {0}")]
    Converter(String),
}

/// Result type for paperwork operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Zip(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::Xml(format!("invalid UTF-8 in XML: {}", err))
    }
}
