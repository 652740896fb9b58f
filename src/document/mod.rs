//! Rich-Text Document
//!
//! The editable tree, its canonical HTML and JSON forms, and range edits.

pub mod edit;
pub mod html;
pub mod json;
pub mod model;

pub use model::{
    Block, Container, Document, ListItem, Mark, MarkKind, MarkSet, Position, Selection, TextBlock,
    TextKind, TextRun,
};

/// Parse HTML into a document
pub fn from_html(source: &str) -> Document {
    html::parse(source)
}

impl Document {
    /// Canonical HTML for this document
    pub fn to_html(&self) -> String {
        html::serialize(self)
    }

    /// Structural JSON for this document
    pub fn to_json(&self) -> serde_json::Value {
        json::to_json(self)
    }
}
