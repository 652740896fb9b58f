//! Range Edits
//!
//! Document transformations addressed by `Position` ranges.
//! Callers own history and change notification; these only mutate the tree.

use std::collections::BTreeSet;
use std::ops::{Range, RangeInclusive};

use crate::document::model::{
    find_mark, insert_mark, remove_mark_kind, Block, Container, Document, ListItem, Mark,
    MarkKind, MarkSet, Position, TextBlock, TextKind, TextRun,
};

/// Clamp a position into the document
pub fn clamp(doc: &Document, position: Position) -> Position {
    let blocks = doc.textblocks();
    let block = position.block.min(blocks.len().saturating_sub(1));
    let len = blocks.get(block).map_or(0, |tb| tb.len());
    Position::new(block, position.offset.min(len))
}

/// Position at the very end of the document
pub fn end_of_document(doc: &Document) -> Position {
    let blocks = doc.textblocks();
    let block = blocks.len().saturating_sub(1);
    Position::new(block, blocks.last().map_or(0, |tb| tb.len()))
}

/// Per-textblock `(block, start, end)` char ranges covered by `from..to`
pub fn segments(doc: &Document, from: Position, to: Position) -> Vec<(usize, usize, usize)> {
    let blocks = doc.textblocks();
    (from.block..=to.block.min(blocks.len().saturating_sub(1)))
        .map(|idx| {
            let start = if idx == from.block { from.offset } else { 0 };
            let end = if idx == to.block {
                to.offset
            } else {
                blocks[idx].len()
            };
            (idx, start, end.min(blocks[idx].len()))
        })
        .collect()
}

/// Whether every markable char in the range carries `kind`.
/// False when the range holds no markable chars.
pub fn range_has_mark(doc: &Document, from: Position, to: Position, kind: MarkKind) -> bool {
    let blocks = doc.textblocks();
    let mut any = false;
    for (idx, start, end) in segments(doc, from, to) {
        let block = blocks[idx];
        if block.is_code() {
            continue;
        }
        for offset in start..end {
            any = true;
            let has = block
                .marks_at(offset)
                .is_some_and(|marks| find_mark(marks, kind).is_some());
            if !has {
                return false;
            }
        }
    }
    any
}

/// First mark of `kind` found in the range
pub fn first_mark_in_range(
    doc: &Document,
    from: Position,
    to: Position,
    kind: MarkKind,
) -> Option<Mark> {
    let blocks = doc.textblocks();
    segments(doc, from, to)
        .into_iter()
        .flat_map(|(idx, start, end)| (start..end).map(move |offset| (idx, offset)))
        .find_map(|(idx, offset)| {
            blocks[idx]
                .marks_at(offset)
                .and_then(|marks| find_mark(marks, kind))
                .cloned()
        })
}

/// Apply `update` to the marks of every markable char in the range
pub fn update_marks(doc: &mut Document, from: Position, to: Position, update: impl Fn(&mut MarkSet)) {
    let ranges = segments(doc, from, to);
    let mut blocks = doc.textblocks_mut();
    for (idx, start, end) in ranges {
        let block = &mut blocks[idx];
        if block.is_code() || start >= end {
            continue;
        }
        let first = block.split_at(start);
        let last = block.split_at(end);
        for run in &mut block.runs[first..last] {
            update(&mut run.marks);
        }
        block.normalize();
    }
}

pub fn add_mark(doc: &mut Document, from: Position, to: Position, mark: &Mark) {
    update_marks(doc, from, to, |marks| insert_mark(marks, mark.clone()));
}

pub fn remove_mark(doc: &mut Document, from: Position, to: Position, kind: MarkKind) {
    update_marks(doc, from, to, |marks| remove_mark_kind(marks, kind));
}

/// Char range `(start, end)` of the contiguous span inside textblock
/// `block` that carries exactly `mark` and touches `offset`.
pub fn mark_span(doc: &Document, block: usize, offset: usize, mark: &Mark) -> Option<(usize, usize)> {
    let textblock = *doc.textblocks().get(block)?;
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for run in &textblock.runs {
        let end = start + run.char_len();
        if run.marks.contains(mark) {
            match spans.last_mut() {
                Some(last) if last.1 == start => last.1 = end,
                _ => spans.push((start, end)),
            }
        }
        start = end;
    }
    spans
        .into_iter()
        .find(|(start, end)| *start <= offset && offset <= *end)
}

/// Delete the chars between `from` and `to`, joining the boundary textblocks
pub fn delete_range(doc: &mut Document, from: Position, to: Position) {
    if from >= to {
        return;
    }

    if from.block == to.block {
        let mut blocks = doc.textblocks_mut();
        if let Some(block) = blocks.get_mut(from.block) {
            let first = block.split_at(from.offset);
            let last = block.split_at(to.offset);
            block.runs.drain(first..last);
            block.normalize();
        }
        return;
    }

    let tail = {
        let mut blocks = doc.textblocks_mut();
        match blocks.get_mut(to.block) {
            Some(last) => {
                let idx = last.split_at(to.offset);
                last.runs.split_off(idx)
            }
            None => Vec::new(),
        }
    };
    {
        let mut blocks = doc.textblocks_mut();
        if let Some(first) = blocks.get_mut(from.block) {
            let idx = first.split_at(from.offset);
            first.runs.truncate(idx);
            first.runs.extend(tail);
            first.normalize();
        }
    }

    let removed = (from.block + 1)..=to.block;
    retain_outside(&mut doc.blocks, &mut 0, &removed);
    doc.normalize();
}

/// Remove textblocks (and rules between them) whose index is in `range`
fn retain_outside(blocks: &mut Vec<Block>, seen: &mut usize, range: &RangeInclusive<usize>) {
    blocks.retain_mut(|block| match block {
        Block::Text(_) => {
            let idx = *seen;
            *seen += 1;
            !range.contains(&idx)
        }
        Block::Rule => !range.contains(&*seen),
        Block::Blockquote(children) => {
            retain_outside(children, seen, range);
            true
        }
        Block::BulletList(items) | Block::OrderedList { items, .. } => {
            for item in items.iter_mut() {
                retain_outside(&mut item.blocks, seen, range);
            }
            true
        }
    });
}

/// Insert text at a position; returns the position after the inserted text
pub fn insert_text(doc: &mut Document, at: Position, text: &str, marks: MarkSet) -> Position {
    let mut blocks = doc.textblocks_mut();
    let Some(block) = blocks.get_mut(at.block) else {
        return at;
    };
    let marks = if block.is_code() { MarkSet::new() } else { marks };
    let idx = block.split_at(at.offset);
    block.runs.insert(idx, TextRun::new(text, marks));
    block.normalize();
    Position::new(at.block, at.offset + text.chars().count())
}

/// Change the kind of every textblock in `range`
pub fn set_text_kind(doc: &mut Document, range: RangeInclusive<usize>, kind: &TextKind) {
    let mut blocks = doc.textblocks_mut();
    for idx in range {
        let Some(block) = blocks.get_mut(idx) else {
            continue;
        };
        if matches!(kind, TextKind::CodeBlock { .. }) && !block.is_code() {
            block.runs = vec![TextRun::plain(block.text())];
        }
        block.kind = kind.clone();
        block.normalize();
    }
}

/// Toggle `container` around textblocks `first..=last`.
///
/// When every selected textblock already sits inside one, each is lifted out
/// of its innermost such container; list items and quoted blocks outside the
/// selection stay wrapped. Otherwise the top-level blocks covering the
/// selection are wrapped.
pub fn toggle_wrap(doc: &mut Document, first: usize, last: usize, container: Container) -> bool {
    let inside = first <= last
        && doc
            .ancestors()
            .get(first..=last)
            .is_some_and(|chains| chains.iter().all(|chain| chain.contains(&container)));
    if inside {
        let mut lifter = Lifter {
            selection: first..=last,
            container,
            lifted: BTreeSet::new(),
        };
        doc.blocks = lifter.lift_out(std::mem::take(&mut doc.blocks), 0);
        doc.normalize();
        return true;
    }

    let (Some(start), Some(end)) = (doc.top_level_index(first), doc.top_level_index(last)) else {
        return false;
    };
    let range: Vec<Block> = doc.blocks.drain(start..=end).collect();

    let replacement: Vec<Block> = if container == Container::Blockquote {
        vec![Block::Blockquote(range)]
    } else {
        let mut items = Vec::new();
        for block in range {
            match block {
                Block::BulletList(existing) | Block::OrderedList { items: existing, .. } => {
                    items.extend(existing)
                }
                other => items.push(ListItem::new(vec![other])),
            }
        }
        match container {
            Container::OrderedList => vec![Block::OrderedList { start: 1, items }],
            _ => vec![Block::BulletList(items)],
        }
    };

    doc.blocks.splice(start..start, replacement);
    doc.normalize();
    true
}

/// Releases selected textblocks from their innermost container of one kind
struct Lifter {
    selection: RangeInclusive<usize>,
    container: Container,
    /// Textblocks already released by a deeper container
    lifted: BTreeSet<usize>,
}

impl Lifter {
    /// Mark the selected textblocks of `span` as lifted. False when the
    /// span holds no selected textblock that is still waiting.
    fn claim(&mut self, span: Range<usize>) -> bool {
        let fresh: Vec<usize> = span
            .filter(|idx| self.selection.contains(idx) && !self.lifted.contains(idx))
            .collect();
        self.lifted.extend(&fresh);
        !fresh.is_empty()
    }

    /// Rebuild `blocks`, whose first textblock has index `base`.
    /// Children are handled before their parent so the innermost match wins.
    fn lift_out(&mut self, blocks: Vec<Block>, base: usize) -> Vec<Block> {
        let mut out = Vec::with_capacity(blocks.len());
        let mut offset = base;

        for block in blocks {
            let span = offset..offset + block.textblock_count();
            offset = span.end;
            if span.end <= *self.selection.start() || span.start > *self.selection.end() {
                out.push(block);
                continue;
            }

            match block {
                Block::Blockquote(children) => {
                    let children = self.lift_out(children, span.start);
                    if self.container == Container::Blockquote {
                        self.split_quote(children, span.start, &mut out);
                    } else {
                        out.push(Block::Blockquote(children));
                    }
                }
                Block::BulletList(items) => {
                    let matches = self.container == Container::BulletList;
                    self.lift_items(items, span.start, matches, &mut out, |_, items| {
                        Block::BulletList(items)
                    });
                }
                Block::OrderedList { start, items } => {
                    let matches = self.container == Container::OrderedList;
                    self.lift_items(items, span.start, matches, &mut out, |first, items| {
                        Block::OrderedList {
                            start: start + first as u32,
                            items,
                        }
                    });
                }
                other => out.push(other),
            }
        }

        out
    }

    /// Emit selected children bare and the rest in quotes of their own
    fn split_quote(&mut self, children: Vec<Block>, base: usize, out: &mut Vec<Block>) {
        let mut kept = Vec::new();
        let mut offset = base;

        for child in children {
            let span = offset..offset + child.textblock_count();
            offset = span.end;
            if self.claim(span) {
                if !kept.is_empty() {
                    out.push(Block::Blockquote(std::mem::take(&mut kept)));
                }
                out.push(child);
            } else {
                kept.push(child);
            }
        }

        if !kept.is_empty() {
            out.push(Block::Blockquote(kept));
        }
    }

    /// When `matches`, release selected items and regroup the others into
    /// lists built by `wrap`, which gets the index of the group's first item.
    fn lift_items(
        &mut self,
        items: Vec<ListItem>,
        base: usize,
        matches: bool,
        out: &mut Vec<Block>,
        wrap: impl Fn(usize, Vec<ListItem>) -> Block,
    ) {
        let mut kept = Vec::new();
        let mut kept_from = 0;
        let mut offset = base;

        for (index, item) in items.into_iter().enumerate() {
            let count: usize = item.blocks.iter().map(Block::textblock_count).sum();
            let span = offset..offset + count;
            offset = span.end;
            let item = ListItem::new(self.lift_out(item.blocks, span.start));

            if matches && self.claim(span) {
                if !kept.is_empty() {
                    out.push(wrap(kept_from, std::mem::take(&mut kept)));
                }
                out.extend(item.blocks);
            } else {
                if kept.is_empty() {
                    kept_from = index;
                }
                kept.push(item);
            }
        }

        if !kept.is_empty() {
            out.push(wrap(kept_from, kept));
        }
    }
}

/// Insert a new top-level paragraph after the top-level block holding
/// textblock `after`; returns the new textblock's index.
pub fn insert_paragraph_after(doc: &mut Document, after: usize, runs: Vec<TextRun>) -> usize {
    let top = doc
        .top_level_index(after)
        .unwrap_or_else(|| doc.blocks.len().saturating_sub(1));
    let index: usize = doc.blocks[..=top.min(doc.blocks.len().saturating_sub(1))]
        .iter()
        .map(Block::textblock_count)
        .sum();
    let insert_at = (top + 1).min(doc.blocks.len());
    doc.blocks
        .insert(insert_at, Block::Text(TextBlock::paragraph(runs)));
    index
}
