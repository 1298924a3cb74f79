//! Open Packaging Convention (OPC) support.
//!
//! OOXML documents are ZIP archives of parts tied together by content types
//! and relationships. This module loads such a package fully into memory,
//! lets the templating engines mutate part contents and relationships, and
//! serializes the package back out.

pub mod constants;
pub mod package;
pub mod packuri;
pub mod part;
pub mod phys_pkg;
pub mod pkgreader;
pub mod pkgwriter;
pub mod rel;

pub use package::OpcPackage;
pub use packuri::PackURI;
pub use part::Part;
pub use rel::{Relationship, Relationships};
