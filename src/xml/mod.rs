//! Mutable XML element trees for document surgery.
//!
//! Templating rewrites document parts in place (field markup swapped for
//! rendered content, placeholder shapes edited or removed), which needs a
//! tree the engine can splice, not a stream of events. This module parses a
//! part's bytes into a small element tree and serializes it back.

pub mod tree;

pub use tree::{Element, Node};
