//! Document Tree
//!
//! Block and inline node types of the editable document.
//! Pure data plus structural queries; edits live in `edit`, formats in `html`/`json`.

use std::collections::BTreeSet;

/// Inline formatting kinds, in canonical nesting order (outermost first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkKind {
    Bold,
    Code,
    Italic,
    Strike,
    Underline,
    Link,
}

impl MarkKind {
    pub const ALL: [MarkKind; 6] = [
        MarkKind::Bold,
        MarkKind::Code,
        MarkKind::Italic,
        MarkKind::Strike,
        MarkKind::Underline,
        MarkKind::Link,
    ];

    /// Name used by `is_active`/`get_attributes` and in JSON output
    pub fn name(self) -> &'static str {
        match self {
            MarkKind::Bold => "bold",
            MarkKind::Code => "code",
            MarkKind::Italic => "italic",
            MarkKind::Strike => "strike",
            MarkKind::Underline => "underline",
            MarkKind::Link => "link",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// An inline mark attached to a run of text
///
/// Variant order matches `MarkKind`, so a `MarkSet` iterates outermost first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mark {
    Bold,
    Code,
    Italic,
    Strike,
    Underline,
    Link { href: String },
}

impl Mark {
    pub fn kind(&self) -> MarkKind {
        match self {
            Mark::Bold => MarkKind::Bold,
            Mark::Code => MarkKind::Code,
            Mark::Italic => MarkKind::Italic,
            Mark::Strike => MarkKind::Strike,
            Mark::Underline => MarkKind::Underline,
            Mark::Link { .. } => MarkKind::Link,
        }
    }

    /// Attribute-free mark for a kind. Links need an href and return `None`.
    pub fn plain(kind: MarkKind) -> Option<Mark> {
        match kind {
            MarkKind::Bold => Some(Mark::Bold),
            MarkKind::Code => Some(Mark::Code),
            MarkKind::Italic => Some(Mark::Italic),
            MarkKind::Strike => Some(Mark::Strike),
            MarkKind::Underline => Some(Mark::Underline),
            MarkKind::Link => None,
        }
    }
}

pub type MarkSet = BTreeSet<Mark>;

/// Add a mark, honouring exclusions: code excludes every other mark and a
/// run carries at most one link.
pub fn insert_mark(marks: &mut MarkSet, mark: Mark) {
    if marks.contains(&Mark::Code) && mark != Mark::Code {
        return;
    }
    if mark == Mark::Code {
        marks.clear();
    }
    if mark.kind() == MarkKind::Link {
        marks.retain(|m| m.kind() != MarkKind::Link);
    }
    marks.insert(mark);
}

pub fn remove_mark_kind(marks: &mut MarkSet, kind: MarkKind) {
    marks.retain(|m| m.kind() != kind);
}

pub fn find_mark(marks: &MarkSet, kind: MarkKind) -> Option<&Mark> {
    marks.iter().find(|m| m.kind() == kind)
}

/// A run of text sharing one set of marks. `'\n'` is a hard break.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub marks: MarkSet,
}

impl TextRun {
    pub fn new(text: impl Into<String>, marks: MarkSet) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, MarkSet::new())
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Kind of a block holding inline content
#[derive(Debug, Clone, PartialEq)]
pub enum TextKind {
    Paragraph,
    Heading(u8),
    CodeBlock { language: Option<String> },
}

impl TextKind {
    pub fn name(&self) -> &'static str {
        match self {
            TextKind::Paragraph => "paragraph",
            TextKind::Heading(_) => "heading",
            TextKind::CodeBlock { .. } => "codeBlock",
        }
    }
}

/// A block that directly holds text: paragraph, heading or code block
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub kind: TextKind,
    pub runs: Vec<TextRun>,
}

impl TextBlock {
    pub fn new(kind: TextKind, runs: Vec<TextRun>) -> Self {
        let mut block = Self { kind, runs };
        block.normalize();
        block
    }

    pub fn paragraph(runs: Vec<TextRun>) -> Self {
        Self::new(TextKind::Paragraph, runs)
    }

    pub fn empty_paragraph() -> Self {
        Self::paragraph(Vec::new())
    }

    pub fn is_code(&self) -> bool {
        matches!(self.kind, TextKind::CodeBlock { .. })
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.runs.iter().map(TextRun::char_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|run| run.text.is_empty())
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// Marks of the char at `offset`, if there is one
    pub fn marks_at(&self, offset: usize) -> Option<&MarkSet> {
        let mut start = 0;
        for run in &self.runs {
            let len = run.char_len();
            if offset < start + len {
                return Some(&run.marks);
            }
            start += len;
        }
        None
    }

    /// Ensure a run boundary at `offset`; returns the index of the first run
    /// starting at or after it.
    pub fn split_at(&mut self, offset: usize) -> usize {
        let mut start = 0;
        for idx in 0..self.runs.len() {
            if offset == start {
                return idx;
            }
            let len = self.runs[idx].char_len();
            if offset < start + len {
                let byte = self.runs[idx]
                    .text
                    .char_indices()
                    .nth(offset - start)
                    .map_or(self.runs[idx].text.len(), |(byte, _)| byte);
                let tail = self.runs[idx].text.split_off(byte);
                let marks = self.runs[idx].marks.clone();
                self.runs.insert(idx + 1, TextRun::new(tail, marks));
                return idx + 1;
            }
            start += len;
        }
        self.runs.len()
    }

    /// Merge neighbouring runs with equal marks and drop empty runs.
    /// Code blocks never carry marks.
    pub fn normalize(&mut self) {
        if self.is_code() {
            for run in &mut self.runs {
                run.marks.clear();
            }
        }
        let mut merged: Vec<TextRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.text.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.marks == run.marks => last.text.push_str(&run.text),
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

/// A list item holding nested blocks
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub blocks: Vec<Block>,
}

impl ListItem {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }
}

/// A structural node of the document
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text(TextBlock),
    Blockquote(Vec<Block>),
    BulletList(Vec<ListItem>),
    OrderedList { start: u32, items: Vec<ListItem> },
    Rule,
}

impl Block {
    pub fn textblock_count(&self) -> usize {
        match self {
            Block::Text(_) => 1,
            Block::Blockquote(children) => children.iter().map(Block::textblock_count).sum(),
            Block::BulletList(items) | Block::OrderedList { items, .. } => items
                .iter()
                .flat_map(|item| &item.blocks)
                .map(Block::textblock_count)
                .sum(),
            Block::Rule => 0,
        }
    }
}

/// Wrapping node kinds a textblock can sit inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Blockquote,
    BulletList,
    OrderedList,
}

impl Container {
    pub fn name(self) -> &'static str {
        match self {
            Container::Blockquote => "blockquote",
            Container::BulletList => "bulletList",
            Container::OrderedList => "orderedList",
        }
    }
}

/// The whole editable document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// A document holding a single empty paragraph
    pub fn empty() -> Self {
        Self {
            blocks: vec![Block::Text(TextBlock::empty_paragraph())],
        }
    }

    /// Textblocks in document order
    pub fn textblocks(&self) -> Vec<&TextBlock> {
        let mut out = Vec::new();
        collect_textblocks(&self.blocks, &mut out);
        out
    }

    pub fn textblocks_mut(&mut self) -> Vec<&mut TextBlock> {
        let mut out = Vec::new();
        collect_textblocks_mut(&mut self.blocks, &mut out);
        out
    }

    pub fn textblock_count(&self) -> usize {
        self.blocks.iter().map(Block::textblock_count).sum()
    }

    /// Wrapping containers of every textblock, outermost first
    pub fn ancestors(&self) -> Vec<Vec<Container>> {
        let mut out = Vec::new();
        collect_ancestors(&self.blocks, &mut Vec::new(), &mut out);
        out
    }

    /// Index of the top-level block containing textblock `textblock`
    pub fn top_level_index(&self, textblock: usize) -> Option<usize> {
        let mut seen = 0;
        for (idx, block) in self.blocks.iter().enumerate() {
            seen += block.textblock_count();
            if textblock < seen {
                return Some(idx);
            }
        }
        None
    }

    /// Drop empty containers, normalise every textblock and make sure at
    /// least one textblock exists.
    pub fn normalize(&mut self) {
        normalize_blocks(&mut self.blocks);
        if self.textblock_count() == 0 {
            self.blocks.push(Block::Text(TextBlock::empty_paragraph()));
        }
    }
}

fn collect_textblocks<'a>(blocks: &'a [Block], out: &mut Vec<&'a TextBlock>) {
    for block in blocks {
        match block {
            Block::Text(text) => out.push(text),
            Block::Blockquote(children) => collect_textblocks(children, out),
            Block::BulletList(items) | Block::OrderedList { items, .. } => {
                for item in items {
                    collect_textblocks(&item.blocks, out);
                }
            }
            Block::Rule => {}
        }
    }
}

fn collect_textblocks_mut<'a>(blocks: &'a mut [Block], out: &mut Vec<&'a mut TextBlock>) {
    for block in blocks {
        match block {
            Block::Text(text) => out.push(text),
            Block::Blockquote(children) => collect_textblocks_mut(children, out),
            Block::BulletList(items) | Block::OrderedList { items, .. } => {
                for item in items {
                    collect_textblocks_mut(&mut item.blocks, out);
                }
            }
            Block::Rule => {}
        }
    }
}

fn collect_ancestors(blocks: &[Block], chain: &mut Vec<Container>, out: &mut Vec<Vec<Container>>) {
    for block in blocks {
        match block {
            Block::Text(_) => out.push(chain.clone()),
            Block::Blockquote(children) => {
                chain.push(Container::Blockquote);
                collect_ancestors(children, chain, out);
                chain.pop();
            }
            Block::BulletList(items) | Block::OrderedList { items, .. } => {
                chain.push(match block {
                    Block::BulletList(_) => Container::BulletList,
                    _ => Container::OrderedList,
                });
                for item in items {
                    collect_ancestors(&item.blocks, chain, out);
                }
                chain.pop();
            }
            Block::Rule => {}
        }
    }
}

fn normalize_blocks(blocks: &mut Vec<Block>) {
    for block in blocks.iter_mut() {
        match block {
            Block::Text(text) => text.normalize(),
            Block::Blockquote(children) => normalize_blocks(children),
            Block::BulletList(items) | Block::OrderedList { items, .. } => {
                for item in items.iter_mut() {
                    normalize_blocks(&mut item.blocks);
                }
                items.retain(|item| !item.blocks.is_empty());
            }
            Block::Rule => {}
        }
    }
    blocks.retain(|block| match block {
        Block::Blockquote(children) => !children.is_empty(),
        Block::BulletList(items) | Block::OrderedList { items, .. } => !items.is_empty(),
        Block::Text(_) | Block::Rule => true,
    });
}

/// A cursor position: textblock index in document order plus char offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub block: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(block: usize, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// A text selection; `anchor` stays put, `head` moves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub head: Position,
}

impl Selection {
    pub fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    pub fn cursor(position: Position) -> Self {
        Self::new(position, position)
    }

    pub fn from(&self) -> Position {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> Position {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }
}
