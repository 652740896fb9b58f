//! Document <-> HTML
//!
//! Import is lenient and canonicalising; serialisation is canonical, so
//! `serialize(parse(serialize(doc)))` is a fixed point.

use crate::document::model::{
    insert_mark, Block, Document, ListItem, Mark, MarkSet, TextBlock, TextKind, TextRun,
};
use crate::html::{self, Element, Node};

/// Attributes written on every rendered link
pub const LINK_TARGET: &str = "_blank";
pub const LINK_REL: &str = "noopener noreferrer nofollow";

/// Elements dropped together with their content
const SKIPPED: &[&str] = &["head", "script", "style", "template", "title", "meta", "link"];

/// Block containers without a document counterpart; their children are lifted
const TRANSPARENT_BLOCKS: &[&str] = &[
    "html", "body", "div", "section", "article", "main", "header", "footer", "nav", "aside",
    "figure", "figcaption", "address", "table", "thead", "tbody", "tfoot", "tr", "td", "th",
    "dl", "dt", "dd", "form", "fieldset", "details", "summary", "li",
];

/// Parse HTML into a normalised document
pub fn parse(source: &str) -> Document {
    let nodes = html::parse_fragment(source);
    let mut doc = Document {
        blocks: parse_blocks(&nodes),
    };
    doc.normalize();
    doc
}

fn parse_blocks(nodes: &[Node]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut pending: Vec<TextRun> = Vec::new();

    for node in nodes {
        let Node::Element(el) = node else {
            collect_inline(std::slice::from_ref(node), &MarkSet::new(), &mut pending);
            continue;
        };

        let name = el.name.as_str();
        if SKIPPED.contains(&name) {
            continue;
        }
        if !is_block(name) {
            collect_inline(std::slice::from_ref(node), &MarkSet::new(), &mut pending);
            continue;
        }

        flush_paragraph(&mut pending, &mut blocks);
        match name {
            "p" => blocks.push(Block::Text(inline_block(TextKind::Paragraph, el))),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse().unwrap_or(1);
                blocks.push(Block::Text(inline_block(TextKind::Heading(level), el)));
            }
            "pre" => blocks.push(Block::Text(code_block(el))),
            "blockquote" => blocks.push(Block::Blockquote(parse_blocks(&el.children))),
            "ul" => blocks.push(Block::BulletList(parse_items(&el.children))),
            "ol" => blocks.push(Block::OrderedList {
                start: el.attr("start").and_then(|s| s.trim().parse().ok()).unwrap_or(1),
                items: parse_items(&el.children),
            }),
            "hr" => blocks.push(Block::Rule),
            _ => blocks.extend(parse_blocks(&el.children)),
        }
    }

    flush_paragraph(&mut pending, &mut blocks);
    blocks
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "pre" | "blockquote" | "ul" | "ol" | "hr"
    ) || TRANSPARENT_BLOCKS.contains(&name)
}

/// Loose inline content becomes a paragraph unless it is only whitespace
fn flush_paragraph(pending: &mut Vec<TextRun>, blocks: &mut Vec<Block>) {
    if pending.iter().all(|run| run.text.chars().all(|c| c == ' ')) {
        pending.clear();
        return;
    }
    let runs = finish_inline(std::mem::take(pending));
    blocks.push(Block::Text(TextBlock::paragraph(runs)));
}

fn parse_items(nodes: &[Node]) -> Vec<ListItem> {
    let mut items: Vec<ListItem> = Vec::new();
    for node in nodes {
        match node {
            Node::Element(el) if el.name == "li" => {
                items.push(ListItem::new(parse_blocks(&el.children)));
            }
            Node::Text(text) if text.trim().is_empty() => {}
            // Stray content (often a nested list) joins the previous item
            other => {
                let blocks = parse_blocks(std::slice::from_ref(other));
                match items.last_mut() {
                    Some(last) => last.blocks.extend(blocks),
                    None => items.push(ListItem::new(blocks)),
                }
            }
        }
    }
    items
}

fn inline_block(kind: TextKind, el: &Element) -> TextBlock {
    let mut runs = Vec::new();
    collect_inline(&el.children, &MarkSet::new(), &mut runs);
    TextBlock::new(kind, finish_inline(runs))
}

fn code_block(el: &Element) -> TextBlock {
    let language = el
        .children
        .iter()
        .find_map(|child| match child {
            Node::Element(code) if code.name == "code" => code.attr("class"),
            _ => None,
        })
        .or_else(|| el.attr("class"))
        .and_then(|class| {
            class
                .split_whitespace()
                .find_map(|c| c.strip_prefix("language-"))
                .map(str::to_string)
        });
    TextBlock::new(
        TextKind::CodeBlock { language },
        vec![TextRun::plain(el.text_content())],
    )
}

fn collect_inline(nodes: &[Node], marks: &MarkSet, out: &mut Vec<TextRun>) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push(TextRun::new(collapse_whitespace(text), marks.clone())),
            Node::Element(el) => match el.name.as_str() {
                "br" => out.push(TextRun::new("\n", marks.clone())),
                "img" => {}
                name if SKIPPED.contains(&name) => {}
                _ => match mark_for(el) {
                    Some(mark) => {
                        let mut inner = marks.clone();
                        insert_mark(&mut inner, mark);
                        collect_inline(&el.children, &inner, out);
                    }
                    None => collect_inline(&el.children, marks, out),
                },
            },
        }
    }
}

fn mark_for(el: &Element) -> Option<Mark> {
    match el.name.as_str() {
        "strong" | "b" => Some(Mark::Bold),
        "em" | "i" => Some(Mark::Italic),
        "u" => Some(Mark::Underline),
        "s" | "strike" | "del" => Some(Mark::Strike),
        "code" => Some(Mark::Code),
        "a" => el
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(|href| Mark::Link {
                href: href.to_string(),
            }),
        _ => None,
    }
}

/// Collapse HTML whitespace runs to a single space. Non-breaking spaces survive.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c') {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Drop spaces at block edges, after hard breaks and doubled across runs
fn finish_inline(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut last: Option<char> = None;
    let mut out: Vec<TextRun> = runs
        .into_iter()
        .map(|run| {
            let mut text = String::with_capacity(run.text.len());
            for c in run.text.chars() {
                if c == ' ' && matches!(last, None | Some(' ') | Some('\n')) {
                    continue;
                }
                text.push(c);
                last = Some(c);
            }
            TextRun::new(text, run.marks)
        })
        .collect();

    for run in out.iter_mut().rev() {
        let trimmed = run.text.trim_end_matches(' ').len();
        let was_all_spaces = trimmed == 0;
        run.text.truncate(trimmed);
        if !was_all_spaces {
            break;
        }
    }
    out
}

/// Serialise a document to canonical HTML
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    write_blocks(&doc.blocks, &mut out);
    out
}

fn write_blocks(blocks: &[Block], out: &mut String) {
    for block in blocks {
        match block {
            Block::Text(textblock) => write_textblock(textblock, out),
            Block::Blockquote(children) => {
                out.push_str("<blockquote>");
                write_blocks(children, out);
                out.push_str("</blockquote>");
            }
            Block::BulletList(items) => {
                out.push_str("<ul>");
                write_items(items, out);
                out.push_str("</ul>");
            }
            Block::OrderedList { start, items } => {
                if *start == 1 {
                    out.push_str("<ol>");
                } else {
                    out.push_str(&format!("<ol start=\"{}\">", start));
                }
                write_items(items, out);
                out.push_str("</ol>");
            }
            Block::Rule => out.push_str("<hr>"),
        }
    }
}

fn write_items(items: &[ListItem], out: &mut String) {
    for item in items {
        out.push_str("<li>");
        write_blocks(&item.blocks, out);
        out.push_str("</li>");
    }
}

fn write_textblock(block: &TextBlock, out: &mut String) {
    match &block.kind {
        TextKind::Paragraph => {
            out.push_str("<p>");
            write_inline(&block.runs, out);
            out.push_str("</p>");
        }
        TextKind::Heading(level) => {
            out.push_str(&format!("<h{}>", level));
            write_inline(&block.runs, out);
            out.push_str(&format!("</h{}>", level));
        }
        TextKind::CodeBlock { language } => {
            out.push_str("<pre><code");
            if let Some(language) = language {
                out.push_str(" class=\"language-");
                html::escape_attr(language, out);
                out.push('"');
            }
            out.push('>');
            html::escape_text(&block.text(), out);
            out.push_str("</code></pre>");
        }
    }
}

/// Write runs, keeping shared outer marks open across neighbouring runs
fn write_inline(runs: &[TextRun], out: &mut String) {
    let total: usize = runs.iter().map(TextRun::char_len).sum();
    let mut open: Vec<&Mark> = Vec::new();
    let mut prev: Option<char> = None;
    let mut index = 0;

    for run in runs {
        let marks: Vec<&Mark> = run.marks.iter().collect();
        let common = open
            .iter()
            .zip(&marks)
            .take_while(|(a, b)| a == b)
            .count();
        while open.len() > common {
            if let Some(mark) = open.pop() {
                close_mark(mark, out);
            }
        }
        for mark in &marks[common..] {
            open_mark(mark, out);
            open.push(mark);
        }

        for c in run.text.chars() {
            index += 1;
            match c {
                '\n' => out.push_str("<br>"),
                // Spaces that import would collapse are written as &nbsp;
                ' ' if matches!(prev, None | Some(' ') | Some('\n')) || index == total => {
                    out.push_str("&nbsp;")
                }
                _ => html::escape_text(c.encode_utf8(&mut [0; 4]), out),
            }
            prev = Some(c);
        }
    }

    while let Some(mark) = open.pop() {
        close_mark(mark, out);
    }
}

fn open_mark(mark: &Mark, out: &mut String) {
    match mark {
        Mark::Bold => out.push_str("<strong>"),
        Mark::Code => out.push_str("<code>"),
        Mark::Italic => out.push_str("<em>"),
        Mark::Strike => out.push_str("<s>"),
        Mark::Underline => out.push_str("<u>"),
        Mark::Link { href } => {
            out.push_str("<a href=\"");
            html::escape_attr(href, out);
            out.push_str(&format!(
                "\" target=\"{}\" rel=\"{}\">",
                LINK_TARGET, LINK_REL
            ));
        }
    }
}

fn close_mark(mark: &Mark, out: &mut String) {
    out.push_str(match mark {
        Mark::Bold => "</strong>",
        Mark::Code => "</code>",
        Mark::Italic => "</em>",
        Mark::Strike => "</s>",
        Mark::Underline => "</u>",
        Mark::Link { .. } => "</a>",
    });
}
