//! HTML to Markdown
//!
//! Converts an HTML fragment into CommonMark-flavoured Markdown:
//! ATX headings, `**strong**`, `_em_`, `~~strike~~`, backtick code,
//! fenced code blocks, `> ` quotes, `- `/`N. ` lists and inline links.
//!
//! Nothing here fails. Elements without a Markdown form degrade to their
//! text (inline) or to plain paragraphs (blocks); `script`/`style`/`head`
//! are dropped.

use std::sync::LazyLock;

use regex::Regex;

use crate::html::{parse_fragment, Element, Node};

/// Marker emitted for `<br>`
const HARD_BREAK: &str = "  \n";

/// Elements whose content never reaches the output
const DROPPED_ELEMENTS: &[&str] = &["head", "script", "style", "template", "title", "noscript"];

/// Elements laid out as blocks
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "html", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Markdown-significant text, escaped with a backslash. Anchored rules only
/// apply at the start of a text node.
const ESCAPE_RULES: &[(&str, &str)] = &[
    (r"\\", r"\\"),
    (r"\*", r"\*"),
    (r"^-", r"\-"),
    (r"^\+ ", r"\+ "),
    (r"^(=+)", r"\${1}"),
    (r"^(#{1,6}) ", r"\${1} "),
    (r"`", r"\`"),
    (r"^~~~", r"\~~~"),
    (r"\[", r"\["),
    (r"\]", r"\]"),
    (r"^>", r"\>"),
    (r"_", r"\_"),
    (r"^(\d+)\. ", r"${1}\. "),
];

static ESCAPES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    ESCAPE_RULES
        .iter()
        .map(|(pattern, replacement)| {
            let re = Regex::new(pattern).expect("escape pattern is a valid regex");
            (re, *replacement)
        })
        .collect()
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\n\x0C]+").expect("whitespace pattern is a valid regex"));

static SPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("space run pattern is a valid regex"));

/// Convert an HTML fragment to Markdown
pub fn html_to_markdown(html: &str) -> String {
    let nodes = parse_fragment(html);
    let blocks = render_blocks(&nodes);
    join_blocks(&blocks, false)
        .trim_matches(|c| c == ' ' || c == '\n')
        .to_string()
}

/// A finished block of Markdown
#[derive(Debug)]
struct Rendered {
    text: String,
    /// Lists attach to a preceding list-item paragraph with a single newline
    list: bool,
}

impl Rendered {
    fn text(text: String) -> Self {
        Self { text, list: false }
    }
}

fn join_blocks(blocks: &[Rendered], in_list_item: bool) -> String {
    let mut out = String::new();
    for (idx, block) in blocks.iter().enumerate() {
        if idx > 0 {
            out.push_str(if in_list_item && block.list { "\n" } else { "\n\n" });
        }
        out.push_str(&block.text);
    }
    out
}

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

fn is_dropped(name: &str) -> bool {
    DROPPED_ELEMENTS.contains(&name)
}

/// Render a node sequence that may mix blocks and inline content. Runs of
/// inline content become paragraphs.
fn render_blocks(nodes: &[Node]) -> Vec<Rendered> {
    let mut blocks = Vec::new();
    let mut inline = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => push_text(text, &mut inline),
            Node::Element(el) if is_dropped(&el.name) => {}
            Node::Element(el) if is_block(&el.name) => {
                flush_inline(&mut inline, &mut blocks);
                render_block(el, &mut blocks);
            }
            Node::Element(el) => render_inline(el, &mut inline),
        }
    }
    flush_inline(&mut inline, &mut blocks);
    blocks
}

fn flush_inline(inline: &mut String, blocks: &mut Vec<Rendered>) {
    let text = finish_inline(inline);
    inline.clear();
    if !text.is_empty() {
        blocks.push(Rendered::text(text));
    }
}

/// Tidy a rendered inline run: collapse spaces, trim each line and rejoin
/// lines with hard breaks.
fn finish_inline(raw: &str) -> String {
    let lines: Vec<String> = raw
        .split('\n')
        .map(|line| {
            SPACE_RUN
                .replace_all(line, " ")
                .trim_matches(' ')
                .to_string()
        })
        .collect();
    let first = lines.iter().position(|line| !line.is_empty());
    let last = lines.iter().rposition(|line| !line.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join(HARD_BREAK),
        _ => String::new(),
    }
}

fn render_block(el: &Element, blocks: &mut Vec<Rendered>) {
    match el.name.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = el.name[1..].parse::<usize>().unwrap_or(1);
            let mut inline = String::new();
            render_children_inline(el, &mut inline);
            // A heading is a single line
            let text = finish_inline(&inline.replace('\n', " "));
            if !text.is_empty() {
                blocks.push(Rendered::text(format!("{} {}", "#".repeat(level), text)));
            }
        }
        "pre" => blocks.push(Rendered::text(code_block(el))),
        "hr" => blocks.push(Rendered::text("---".to_string())),
        "blockquote" => {
            let inner = join_blocks(&render_blocks(&el.children), false);
            if !inner.is_empty() {
                blocks.push(Rendered::text(prefix_lines(&inner, "> ", ">")));
            }
        }
        "ul" => push_list(render_list(el, None), blocks),
        "ol" => {
            let start = el
                .attr("start")
                .and_then(|s| s.trim().parse::<u32>().ok())
                .unwrap_or(1);
            push_list(render_list(el, Some(start)), blocks)
        }
        // A stray list item renders as a one-item bullet list
        "li" => push_list(render_item(&el.children, "- ").map(|(text, _)| text), blocks),
        _ => blocks.extend(render_blocks(&el.children)),
    }
}

fn push_list(text: Option<String>, blocks: &mut Vec<Rendered>) {
    if let Some(text) = text {
        blocks.push(Rendered { text, list: true });
    }
}

/// Render a list; `start` is `None` for bullets
fn render_list(el: &Element, start: Option<u32>) -> Option<String> {
    let mut items = Vec::new();
    let mut number = start.unwrap_or(1);
    for child in &el.children {
        let children = match child {
            Node::Element(li) if li.name == "li" => li.children.as_slice(),
            Node::Element(other) if is_dropped(&other.name) => continue,
            Node::Text(text) if text.trim().is_empty() => continue,
            other => std::slice::from_ref(other),
        };
        let marker = match start {
            Some(_) => format!("{}. ", number),
            None => "- ".to_string(),
        };
        number += 1;
        if let Some(item) = render_item(children, &marker) {
            items.push(item);
        }
    }
    if items.is_empty() {
        return None;
    }
    let loose = items.iter().any(|(_, loose)| *loose);
    let texts: Vec<String> = items.into_iter().map(|(text, _)| text).collect();
    Some(texts.join(if loose { "\n\n" } else { "\n" }))
}

/// One list item: the marker on the first line, continuation lines
/// indented to the marker width. Returns the text and whether the item
/// holds more than one paragraph.
fn render_item(children: &[Node], marker: &str) -> Option<(String, bool)> {
    let blocks = render_blocks(children);
    let loose = blocks.iter().filter(|b| !b.list).count() > 1;
    let body = join_blocks(&blocks, true);
    if body.is_empty() {
        return Some((marker.trim_end().to_string(), false));
    }
    let indent = " ".repeat(marker.chars().count());
    let text = body
        .split('\n')
        .enumerate()
        .map(|(idx, line)| match (idx, line.is_empty()) {
            (0, _) => format!("{}{}", marker, line),
            (_, true) => String::new(),
            (_, false) => format!("{}{}", indent, line),
        })
        .collect::<Vec<_>>()
        .join("\n");
    Some((text, loose))
}

fn prefix_lines(text: &str, prefix: &str, empty: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                empty.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn code_block(pre: &Element) -> String {
    let code_el = pre.children.iter().find_map(|node| match node {
        Node::Element(el) if el.name == "code" => Some(el),
        _ => None,
    });
    let code = match code_el {
        Some(el) => el.text_content(),
        None => pre.text_content(),
    };
    let language = code_el
        .and_then(|el| el.attr("class"))
        .and_then(|class| {
            class
                .split_whitespace()
                .find_map(|c| c.strip_prefix("language-"))
        })
        .unwrap_or("");
    let code = code.strip_suffix('\n').unwrap_or(&code);
    let fence = "`".repeat((longest_run(code, '`') + 1).max(3));
    format!("{}{}\n{}\n{}", fence, language, code, fence)
}

fn longest_run(text: &str, target: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == target {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").into_owned()
}

fn escape(text: &str) -> String {
    ESCAPES
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

fn push_text(text: &str, out: &mut String) {
    out.push_str(&escape(&collapse_whitespace(text)));
}

fn render_children_inline(el: &Element, out: &mut String) {
    for node in &el.children {
        match node {
            Node::Text(text) => push_text(text, out),
            Node::Element(child) if is_dropped(&child.name) => {}
            Node::Element(child) => render_inline(child, out),
        }
    }
}

fn render_inline(el: &Element, out: &mut String) {
    match el.name.as_str() {
        "br" => out.push('\n'),
        "strong" | "b" => wrap(el, "**", "**", out),
        "em" | "i" => wrap(el, "_", "_", out),
        "s" | "del" | "strike" => wrap(el, "~~", "~~", out),
        "code" | "kbd" | "samp" | "tt" => code_span(el, out),
        "a" => link(el, out),
        "img" => image(el, out),
        // Underline and anything unrecognised keep only their text
        _ => render_children_inline(el, out),
    }
}

fn is_flanking(c: char) -> bool {
    c == ' ' || c == '\n'
}

/// Wrap the element's content in delimiters, keeping flanking whitespace
/// outside them.
fn wrap(el: &Element, open: &str, close: &str, out: &mut String) {
    let mut inner = String::new();
    render_children_inline(el, &mut inner);
    push_wrapped(&inner, open, close, out);
}

fn push_wrapped(inner: &str, open: &str, close: &str, out: &mut String) {
    let core = inner.trim_matches(is_flanking);
    if core.is_empty() {
        out.push_str(inner);
        return;
    }
    let lead = &inner[..inner.len() - inner.trim_start_matches(is_flanking).len()];
    let trail = &inner[inner.trim_end_matches(is_flanking).len()..];
    out.push_str(lead);
    out.push_str(open);
    out.push_str(core);
    out.push_str(close);
    out.push_str(trail);
}

fn code_span(el: &Element, out: &mut String) {
    let code = collapse_whitespace(&el.text_content());
    if code.is_empty() {
        return;
    }
    let fence = "`".repeat(longest_run(&code, '`') + 1);
    let pad = if code.starts_with('`') || code.ends_with('`') {
        " "
    } else {
        ""
    };
    out.push_str(&format!("{}{}{}{}{}", fence, pad, code, pad, fence));
}

fn link_destination(href: &str) -> String {
    href.replace('(', "\\(").replace(')', "\\)")
}

fn link_title(el: &Element) -> String {
    match el.attr("title").map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!(" \"{}\"", title.replace('"', "\\\"")),
        None => String::new(),
    }
}

fn link(el: &Element, out: &mut String) {
    let Some(href) = el.attr("href").filter(|h| !h.trim().is_empty()) else {
        render_children_inline(el, out);
        return;
    };
    let mut inner = String::new();
    render_children_inline(el, &mut inner);
    let close = format!("]({}{})", link_destination(href.trim()), link_title(el));
    push_wrapped(&inner, "[", &close, out);
}

fn image(el: &Element, out: &mut String) {
    let Some(src) = el.attr("src").filter(|s| !s.trim().is_empty()) else {
        return;
    };
    let alt = escape(&collapse_whitespace(el.attr("alt").unwrap_or("")));
    out.push_str(&format!(
        "![{}]({}{})",
        alt,
        link_destination(src.trim()),
        link_title(el)
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_escape_rule_is_loaded() {
        assert_eq!(ESCAPES.len(), ESCAPE_RULES.len());
        assert_eq!(collapse_whitespace("a \t\n b"), "a b");
        assert_eq!(finish_inline("  x   y  "), "x y");
    }

    #[test]
    fn test_heading_and_strong() {
        assert_eq!(
            html_to_markdown("<h1>Title</h1><p><strong>bold</strong> text</p>"),
            "# Title\n\n**bold** text"
        );
    }

    #[test]
    fn test_emphasis_kinds() {
        assert_eq!(
            html_to_markdown("<p><em>a</em> <s>b</s> <u>c</u> <code>d</code></p>"),
            "_a_ ~~b~~ c `d`"
        );
    }

    #[test]
    fn test_flanking_whitespace_moves_outside() {
        assert_eq!(
            html_to_markdown("<p>x<strong> bold </strong>y</p>"),
            "x **bold** y"
        );
    }

    #[test]
    fn test_empty_emphasis_is_dropped() {
        assert_eq!(html_to_markdown("<p>a<strong></strong>b</p>"), "ab");
    }

    #[test]
    fn test_links() {
        assert_eq!(
            html_to_markdown(r#"<p>see <a href="https://x.y/a_(b)" title="T">docs</a></p>"#),
            r#"see [docs](https://x.y/a_\(b\) "T")"#
        );
        assert_eq!(html_to_markdown("<p><a>plain</a></p>"), "plain");
    }

    #[test]
    fn test_image() {
        assert_eq!(
            html_to_markdown(r#"<p><img src="a.png" alt="pic"></p>"#),
            "![pic](a.png)"
        );
    }

    #[test]
    fn test_bullet_list_with_paragraphs() {
        assert_eq!(
            html_to_markdown("<ul><li><p>one</p></li><li><p>two</p></li></ul>"),
            "- one\n- two"
        );
    }

    #[test]
    fn test_ordered_list_start() {
        assert_eq!(
            html_to_markdown(r#"<ol start="9"><li>nine</li><li>ten</li></ol>"#),
            "9. nine\n10. ten"
        );
    }

    #[test]
    fn test_nested_list_indentation() {
        assert_eq!(
            html_to_markdown("<ul><li><p>a</p><ul><li><p>b</p></li></ul></li><li>c</li></ul>"),
            "- a\n  - b\n- c"
        );
    }

    #[test]
    fn test_loose_list_item() {
        assert_eq!(
            html_to_markdown("<ol><li><p>a</p><p>b</p></li><li><p>c</p></li></ol>"),
            "1. a\n\n   b\n\n2. c"
        );
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(
            html_to_markdown("<blockquote><p>one</p><p>two</p></blockquote>"),
            "> one\n>\n> two"
        );
    }

    #[test]
    fn test_code_block_keeps_content_verbatim() {
        assert_eq!(
            html_to_markdown(
                "<pre><code class=\"language-rust\">fn  main() {\n    *x_y*\n}</code></pre>"
            ),
            "```rust\nfn  main() {\n    *x_y*\n}\n```"
        );
    }

    #[test]
    fn test_code_block_fence_grows() {
        assert_eq!(
            html_to_markdown("<pre><code>```</code></pre>"),
            "````\n```\n````"
        );
    }

    #[test]
    fn test_inline_code_with_backticks() {
        assert_eq!(html_to_markdown("<p><code>a`b</code></p>"), "``a`b``");
        assert_eq!(html_to_markdown("<p><code>`</code></p>"), "`` ` ``");
    }

    #[test]
    fn test_hard_break_and_rule() {
        assert_eq!(
            html_to_markdown("<p>a<br>b</p><hr><p>c</p>"),
            "a  \nb\n\n---\n\nc"
        );
    }

    #[test]
    fn test_escaping() {
        assert_eq!(
            html_to_markdown("<p>1. not a list *or* _this_ [x]</p><p># no</p><p>- no</p>"),
            "1\\. not a list \\*or\\* \\_this\\_ \\[x\\]\n\n\\# no\n\n\\- no"
        );
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(
            html_to_markdown("<p>  a \n\t b  </p>\n\n<p>c</p>"),
            "a b\n\nc"
        );
    }

    #[test]
    fn test_unknown_and_dropped_elements() {
        assert_eq!(
            html_to_markdown(
                "<script>alert(1)</script><section><p>in <span>span</span></p></section><custom>loose</custom>"
            ),
            "in span\n\nloose"
        );
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(html_to_markdown("<p></p>"), "");
        assert_eq!(html_to_markdown(""), "");
    }

    #[test]
    fn test_malformed_markup_degrades_to_text() {
        assert_eq!(html_to_markdown("<p>a < b <strong>c</p>"), "a < b **c**");
    }
}
