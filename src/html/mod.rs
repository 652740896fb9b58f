//! HTML Parsing
//!
//! Small, forgiving HTML fragment parser.
//! Used both to import stored documents and to drive Markdown export.

pub mod ast;
pub mod lexer;

pub use ast::{Element, Node};
pub use lexer::{decode_entities, tokenize, Token, TokenKind};

/// Parse an HTML fragment into a node tree
///
/// Never fails: malformed input degrades to text and implicitly closed elements.
pub fn parse_fragment(html: &str) -> Vec<Node> {
    ast::tokens_to_nodes(lexer::tokenize(html))
}

/// Escape character data for element content
pub fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

/// Escape an attribute value for use inside double quotes
pub fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
