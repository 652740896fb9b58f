//! HTML Tree
//!
//! Minimal element/text tree built from lexer tokens.
//! Recovery is implicit: stray end tags are dropped, open elements are
//! closed at end of input, and `<p>`/`<li>` close the way browsers close them.

use crate::html::lexer::{Token, TokenKind};

/// A node of the parsed fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its attributes and children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Lowercased tag name
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Concatenated text of all descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name == "br" => out.push('\n'),
            Node::Element(el) => collect_text(&el.children, out),
        }
    }
}

/// Elements that never have children
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements that implicitly close an open `<p>`
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre", "section",
    "table", "ul",
];

/// Convert tokens into a node tree
pub fn tokens_to_nodes(tokens: Vec<Token>) -> Vec<Node> {
    // The bottom of the stack is a synthetic root collecting top-level nodes
    let mut stack: Vec<Element> = vec![Element::new("#root")];

    for token in tokens {
        match token.kind {
            TokenKind::Text => push_node(&mut stack, Node::Text(token.text)),
            TokenKind::Comment | TokenKind::Declaration => {}
            TokenKind::StartTag => {
                let name = token.text;

                if CLOSES_PARAGRAPH.contains(&name.as_str()) {
                    close_if_open(&mut stack, "p", &[]);
                }
                if name == "li" {
                    close_if_open(&mut stack, "li", &["ul", "ol"]);
                }

                let element = Element {
                    name,
                    attrs: token.attrs,
                    children: Vec::new(),
                };
                if token.self_closing || VOID_ELEMENTS.contains(&element.name.as_str()) {
                    push_node(&mut stack, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }
            TokenKind::EndTag => {
                if let Some(depth) = stack.iter().skip(1).rposition(|el| el.name == token.text) {
                    close_to(&mut stack, depth + 1);
                } else if token.text == "p" {
                    // `</p>` without an open paragraph produces an empty one
                    push_node(&mut stack, Node::Element(Element::new("p")));
                }
            }
        }
    }

    close_to(&mut stack, 1);
    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn push_node(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Close the nearest open `name`, unless one of `scope` is open above it
fn close_if_open(stack: &mut Vec<Element>, name: &str, scope: &[&str]) {
    for depth in (1..stack.len()).rev() {
        let current = stack[depth].name.as_str();
        if current == name {
            close_to(stack, depth);
            return;
        }
        if scope.contains(&current) {
            return;
        }
    }
}

/// Pop every element at or above `depth`, attaching each to its parent
fn close_to(stack: &mut Vec<Element>, depth: usize) {
    while stack.len() > depth.max(1) {
        if let Some(element) = stack.pop() {
            push_node(stack, Node::Element(element));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::lexer::tokenize;

    fn parse(html: &str) -> Vec<Node> {
        tokens_to_nodes(tokenize(html))
    }

    fn element(node: &Node) -> &Element {
        match node {
            Node::Element(el) => el,
            Node::Text(text) => panic!("Expected element, got text {:?}", text),
        }
    }

    #[test]
    fn test_nested_elements() {
        let nodes = parse("<p>a <strong>b</strong></p>");

        assert_eq!(nodes.len(), 1);
        let p = element(&nodes[0]);
        assert_eq!(p.name, "p");
        assert_eq!(p.children.len(), 2);
        assert_eq!(element(&p.children[1]).text_content(), "b");
    }

    #[test]
    fn test_unclosed_elements_are_closed_at_end() {
        let nodes = parse("<blockquote><p>quote");

        let quote = element(&nodes[0]);
        assert_eq!(quote.name, "blockquote");
        assert_eq!(element(&quote.children[0]).text_content(), "quote");
    }

    #[test]
    fn test_stray_end_tag_is_ignored() {
        let nodes = parse("<p>a</em>b</p>");

        assert_eq!(nodes.len(), 1);
        assert_eq!(element(&nodes[0]).text_content(), "ab");
    }

    #[test]
    fn test_paragraph_closed_by_block() {
        let nodes = parse("<p>one<p>two<ul><li>x<li>y</ul>");

        assert_eq!(nodes.len(), 3);
        let list = element(&nodes[2]);
        assert_eq!(list.children.len(), 2);
        assert_eq!(element(&list.children[1]).text_content(), "y");
    }

    #[test]
    fn test_void_elements_have_no_children() {
        let nodes = parse("a<br>b<hr>c");

        assert_eq!(nodes.len(), 5);
        assert!(element(&nodes[1]).children.is_empty());
    }

    #[test]
    fn test_nested_list_item_not_closed_by_inner_li() {
        let nodes = parse("<ul><li>a<ul><li>b</li></ul></li></ul>");

        let outer = element(&nodes[0]);
        assert_eq!(outer.children.len(), 1);
        let item = element(&outer.children[0]);
        assert_eq!(item.children.len(), 2);
    }
}
