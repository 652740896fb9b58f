//! Structural JSON
//!
//! Node/mark tree in the `{"type": .., "attrs": .., "content": ..}` shape
//! rich-text tools exchange.

use serde_json::{json, Map, Value};

use crate::document::html::{LINK_REL, LINK_TARGET};
use crate::document::model::{Block, Document, ListItem, Mark, TextBlock, TextKind, TextRun};

/// Convert a document to its JSON tree
pub fn to_json(doc: &Document) -> Value {
    node("doc", None, doc.blocks.iter().map(block_json).collect())
}

fn node(kind: &str, attrs: Option<Value>, content: Vec<Value>) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), Value::from(kind));
    if let Some(attrs) = attrs {
        map.insert("attrs".to_string(), attrs);
    }
    if !content.is_empty() {
        map.insert("content".to_string(), Value::Array(content));
    }
    Value::Object(map)
}

fn block_json(block: &Block) -> Value {
    match block {
        Block::Text(textblock) => textblock_json(textblock),
        Block::Blockquote(children) => {
            node("blockquote", None, children.iter().map(block_json).collect())
        }
        Block::BulletList(items) => node("bulletList", None, items_json(items)),
        Block::OrderedList { start, items } => node(
            "orderedList",
            Some(json!({ "start": start })),
            items_json(items),
        ),
        Block::Rule => node("horizontalRule", None, Vec::new()),
    }
}

fn items_json(items: &[ListItem]) -> Vec<Value> {
    items
        .iter()
        .map(|item| node("listItem", None, item.blocks.iter().map(block_json).collect()))
        .collect()
}

fn textblock_json(block: &TextBlock) -> Value {
    let content = inline_json(&block.runs);
    match &block.kind {
        TextKind::Paragraph => node("paragraph", None, content),
        TextKind::Heading(level) => node("heading", Some(json!({ "level": level })), content),
        TextKind::CodeBlock { language } => {
            // Newlines are literal inside code blocks
            let text = block.text();
            let content = if text.is_empty() {
                Vec::new()
            } else {
                vec![json!({ "type": "text", "text": text })]
            };
            node("codeBlock", Some(json!({ "language": language })), content)
        }
    }
}

fn inline_json(runs: &[TextRun]) -> Vec<Value> {
    let mut out = Vec::new();
    for run in runs {
        let marks: Vec<Value> = run.marks.iter().map(mark_json).collect();
        for (idx, segment) in run.text.split('\n').enumerate() {
            if idx > 0 {
                out.push(json!({ "type": "hardBreak" }));
            }
            if segment.is_empty() {
                continue;
            }
            let mut text = Map::new();
            text.insert("type".to_string(), Value::from("text"));
            text.insert("text".to_string(), Value::from(segment));
            if !marks.is_empty() {
                text.insert("marks".to_string(), Value::Array(marks.clone()));
            }
            out.push(Value::Object(text));
        }
    }
    out
}

/// JSON attributes of a mark
pub fn mark_attrs(mark: &Mark) -> Map<String, Value> {
    match mark {
        Mark::Link { href } => {
            let mut attrs = Map::new();
            attrs.insert("href".to_string(), Value::from(href.as_str()));
            attrs.insert("target".to_string(), Value::from(LINK_TARGET));
            attrs.insert("rel".to_string(), Value::from(LINK_REL));
            attrs.insert("class".to_string(), Value::Null);
            attrs
        }
        _ => Map::new(),
    }
}

fn mark_json(mark: &Mark) -> Value {
    let attrs = mark_attrs(mark);
    let mut map = Map::new();
    map.insert("type".to_string(), Value::from(mark.kind().name()));
    if !attrs.is_empty() {
        map.insert("attrs".to_string(), Value::Object(attrs));
    }
    Value::Object(map)
}

/// JSON attributes of a textblock kind
pub fn text_kind_attrs(kind: &TextKind) -> Map<String, Value> {
    let mut attrs = Map::new();
    match kind {
        TextKind::Paragraph => {}
        TextKind::Heading(level) => {
            attrs.insert("level".to_string(), Value::from(*level));
        }
        TextKind::CodeBlock { language } => {
            attrs.insert(
                "language".to_string(),
                language.as_deref().map_or(Value::Null, Value::from),
            );
        }
    }
    attrs
}
