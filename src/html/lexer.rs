//! HTML Lexer
//!
//! Lenient tokenization of HTML fragments.
//! Anything that does not look like markup is kept as text; nothing here fails.

/// Token types in an HTML fragment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// Opening tag like `<p>` or `<a href="..">`
    StartTag,
    /// Closing tag like `</p>`
    EndTag,
    /// Character data, entities already decoded
    Text,
    /// `<!-- ... -->`
    Comment,
    /// `<!DOCTYPE ...>` and other declarations
    Declaration,
}

/// A token with its payload
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Lowercased tag name for tags, decoded content for text and comments
    pub text: String,
    /// Attributes in source order (start tags only)
    pub attrs: Vec<(String, String)>,
    /// `<br/>` style self-closing marker (start tags only)
    pub self_closing: bool,
}

impl Token {
    fn text(kind: TokenKind, text: String) -> Self {
        Self {
            kind,
            text,
            attrs: Vec::new(),
            self_closing: false,
        }
    }
}

/// Elements whose content is not markup
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Tokenize an HTML fragment
pub fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < html.len() {
        let rest = &html[pos..];
        if !rest.starts_with('<') {
            pos += rest.chars().next().map_or(1, char::len_utf8);
            continue;
        }

        let Some((token, consumed)) = scan_markup(rest) else {
            // A lone '<' is plain text
            pos += 1;
            continue;
        };

        flush_text(&html[text_start..pos], &mut tokens);
        pos += consumed;

        let raw_end = match (token.kind, token.self_closing) {
            (TokenKind::StartTag, false) if RAW_TEXT_ELEMENTS.contains(&token.text.as_str()) => {
                Some(token.text.clone())
            }
            _ => None,
        };
        tokens.push(token);

        if let Some(name) = raw_end {
            let body = &html[pos..];
            let close = find_ascii_case_insensitive(body, &format!("</{}", name));
            let body_len = close.unwrap_or(body.len());
            if body_len > 0 {
                tokens.push(Token::text(TokenKind::Text, body[..body_len].to_string()));
            }
            pos += body_len;
        }
        text_start = pos;
    }

    flush_text(&html[text_start..], &mut tokens);
    tokens
}

fn flush_text(raw: &str, tokens: &mut Vec<Token>) {
    if !raw.is_empty() {
        tokens.push(Token::text(TokenKind::Text, decode_entities(raw)));
    }
}

/// Scan one piece of markup starting at `<`. Returns the token and the bytes consumed.
fn scan_markup(input: &str) -> Option<(Token, usize)> {
    let after = &input[1..];

    if let Some(body) = after.strip_prefix("!--") {
        let (content, len) = match body.find("-->") {
            Some(end) => (&body[..end], 4 + end + 3),
            None => (body, input.len()),
        };
        return Some((Token::text(TokenKind::Comment, content.to_string()), len));
    }

    if after.starts_with('!') || after.starts_with('?') {
        let len = input.find('>').map_or(input.len(), |end| end + 1);
        return Some((
            Token::text(TokenKind::Declaration, input[2..len.max(2)].trim_end_matches('>').to_string()),
            len,
        ));
    }

    if let Some(body) = after.strip_prefix('/') {
        let name_len = tag_name_len(body);
        if name_len == 0 {
            return None;
        }
        let name = body[..name_len].to_ascii_lowercase();
        let len = input.find('>').map_or(input.len(), |end| end + 1);
        return Some((Token::text(TokenKind::EndTag, name), len));
    }

    let name_len = tag_name_len(after);
    if name_len == 0 {
        return None;
    }
    let name = after[..name_len].to_ascii_lowercase();
    let (attrs, self_closing, attrs_len) = scan_attributes(&after[name_len..]);

    Some((
        Token {
            kind: TokenKind::StartTag,
            text: name,
            attrs,
            self_closing,
        },
        1 + name_len + attrs_len,
    ))
}

fn tag_name_len(input: &str) -> usize {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '-' || *c == ':'))
        .map_or(input.len(), |(idx, _)| idx)
}

/// Parse attributes up to and including the closing `>`
fn scan_attributes(input: &str) -> (Vec<(String, String)>, bool, usize) {
    let bytes = input.as_bytes();
    let mut attrs = Vec::new();
    let mut pos = 0;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            return (attrs, false, pos);
        }
        match bytes[pos] {
            b'>' => return (attrs, false, pos + 1),
            b'/' if bytes.get(pos + 1) == Some(&b'>') => return (attrs, true, pos + 2),
            b'/' => {
                pos += 1;
                continue;
            }
            _ => {}
        }

        let name_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/')
        {
            pos += 1;
        }
        let name = input[name_start..pos].to_ascii_lowercase();

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if bytes.get(pos) != Some(&b'=') {
            attrs.push((name, String::new()));
            continue;
        }
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let value = match bytes.get(pos) {
            Some(&quote) if quote == b'"' || quote == b'\'' => {
                let value_start = pos + 1;
                let value_end = input[value_start..]
                    .find(quote as char)
                    .map_or(input.len(), |end| value_start + end);
                pos = (value_end + 1).min(input.len());
                &input[value_start..value_end]
            }
            _ => {
                let value_start = pos;
                while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>'
                {
                    pos += 1;
                }
                &input[value_start..pos]
            }
        };
        attrs.push((name, decode_entities(value)));
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Decode character references. Unknown references are kept verbatim.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest[1..]
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_reference(&rest[1..1 + end]).map(|c| (c, end + 2)));

        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}
