//! In-Memory Engine
//!
//! A complete `RichTextEngine` over the `document` tree. Backs the headless
//! shell and every test that needs real editing semantics.

use serde_json::Value;

use crate::document::edit;
use crate::document::json::{mark_attrs, text_kind_attrs};
use crate::document::{
    from_html, model::find_mark, model::insert_mark, model::remove_mark_kind, Container,
    Document, Mark, MarkKind, MarkSet, Position, Selection, TextKind,
};
use crate::engine::{
    Attributes, Chain, EngineCommand, ListenerId, RichTextEngine, UpdateListener,
};

/// Undo steps kept before the oldest is dropped
pub const HISTORY_DEPTH: usize = 100;

#[derive(Debug, Clone)]
struct Snapshot {
    doc: Document,
    selection: Selection,
}

/// Everything a failed chain must restore
struct Checkpoint {
    snapshot: Snapshot,
    stored_marks: Option<MarkSet>,
    focused: bool,
    history: Option<(Vec<Snapshot>, Vec<Snapshot>)>,
}

pub struct MemoryEngine {
    doc: Document,
    selection: Selection,
    /// Marks the next typed text gets, set by toggling with an empty selection
    stored_marks: Option<MarkSet>,
    focused: bool,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    listeners: Vec<(ListenerId, UpdateListener)>,
    next_listener: u64,
}

impl MemoryEngine {
    /// Create an engine holding the parsed `html`, cursor at the start
    pub fn new(html: &str) -> Self {
        Self {
            doc: from_html(html),
            selection: Selection::default(),
            stored_marks: None,
            focused: false,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Selection::new(
            edit::clamp(&self.doc, selection.anchor),
            edit::clamp(&self.doc, selection.head),
        );
        self.stored_marks = None;
    }

    pub fn select_all(&mut self) {
        let end = edit::end_of_document(&self.doc);
        self.set_selection(Selection::new(Position::default(), end));
    }

    /// Select chars `from..to` of textblock `block`
    pub fn select_range(&mut self, block: usize, from: usize, to: usize) {
        self.set_selection(Selection::new(
            Position::new(block, from),
            Position::new(block, to),
        ));
    }

    /// Move the cursor to the end of the document
    pub fn select_end(&mut self) {
        let end = edit::end_of_document(&self.doc);
        self.set_selection(Selection::cursor(end));
    }

    /// Type `text` over the selection, as one history step
    pub fn insert_text(&mut self, text: &str) {
        let before = self.snapshot();
        let marks = self.cursor_marks();
        let (from, to) = (self.selection.from(), self.selection.to());

        edit::delete_range(&mut self.doc, from, to);
        let after = edit::insert_text(&mut self.doc, from, text, marks);
        self.selection = Selection::cursor(after);
        self.stored_marks = None;
        self.commit(before, false, true);
    }

    /// Split at the cursor: the rest of the textblock moves to a new
    /// paragraph after the enclosing top-level block.
    pub fn split_block(&mut self) {
        let before = self.snapshot();
        let (from, to) = (self.selection.from(), self.selection.to());
        edit::delete_range(&mut self.doc, from, to);

        let in_code = self
            .doc
            .textblocks()
            .get(from.block)
            .is_some_and(|tb| tb.is_code());
        if in_code {
            // Code blocks keep their line breaks inline
            let after = edit::insert_text(&mut self.doc, from, "\n", MarkSet::new());
            self.selection = Selection::cursor(after);
        } else {
            let tail = self
                .doc
                .textblocks_mut()
                .into_iter()
                .nth(from.block)
                .map(|block| {
                    let idx = block.split_at(from.offset);
                    block.runs.split_off(idx)
                })
                .unwrap_or_default();
            let index = edit::insert_paragraph_after(&mut self.doc, from.block, tail);
            self.selection = Selection::cursor(Position::new(index, 0));
        }
        self.stored_marks = None;
        self.commit(before, false, true);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            doc: self.doc.clone(),
            selection: self.selection,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.doc = snapshot.doc;
        self.selection = snapshot.selection;
        self.stored_marks = None;
    }

    /// Record history and notify listeners if the document changed
    fn commit(&mut self, before: Snapshot, history_step: bool, emit: bool) {
        if self.doc == before.doc {
            return;
        }
        if !history_step {
            self.undo_stack.push(before);
            if self.undo_stack.len() > HISTORY_DEPTH {
                self.undo_stack.remove(0);
            }
            self.redo_stack.clear();
        }
        if emit {
            for (_, listener) in &self.listeners {
                listener();
            }
        }
    }

    /// Marks that apply at a collapsed cursor. Links are not inclusive, so
    /// the cursor is only inside one when chars on both sides carry it.
    fn cursor_marks(&self) -> MarkSet {
        if let Some(stored) = &self.stored_marks {
            return stored.clone();
        }
        let at = self.selection.head;
        let blocks = self.doc.textblocks();
        let Some(block) = blocks.get(at.block) else {
            return MarkSet::new();
        };
        let after = block.marks_at(at.offset);
        let before = match at.offset {
            0 => after,
            offset => block.marks_at(offset - 1),
        };
        let mut marks = before.cloned().unwrap_or_default();
        if let Some(link) = find_mark(&marks, MarkKind::Link).cloned() {
            let continues = after.is_some_and(|after| after.contains(&link));
            if at.offset == 0 || !continues {
                remove_mark_kind(&mut marks, MarkKind::Link);
            }
        }
        marks
    }

    fn range(&self) -> (Position, Position) {
        (self.selection.from(), self.selection.to())
    }

    fn textblocks_in_selection(&self) -> Vec<TextKind> {
        let (from, to) = self.range();
        self.doc
            .textblocks()
            .get(from.block..=to.block)
            .map(|blocks| blocks.iter().map(|tb| tb.kind.clone()).collect())
            .unwrap_or_default()
    }

    fn has_markable(&self, from: Position, to: Position) -> bool {
        let blocks = self.doc.textblocks();
        edit::segments(&self.doc, from, to)
            .into_iter()
            .any(|(idx, start, end)| !blocks[idx].is_code() && start < end)
    }

    fn cursor_in_code(&self) -> bool {
        self.doc
            .textblocks()
            .get(self.selection.head.block)
            .is_some_and(|tb| tb.is_code())
    }

    fn toggle_mark(&mut self, kind: MarkKind) -> bool {
        let Some(mark) = Mark::plain(kind) else {
            return false;
        };
        let (from, to) = self.range();
        if from == to {
            if self.cursor_in_code() {
                return false;
            }
            let mut marks = self.cursor_marks();
            if find_mark(&marks, kind).is_some() {
                remove_mark_kind(&mut marks, kind);
            } else {
                insert_mark(&mut marks, mark);
            }
            self.stored_marks = Some(marks);
            return true;
        }
        if !self.has_markable(from, to) {
            return false;
        }
        if edit::range_has_mark(&self.doc, from, to, kind) {
            edit::remove_mark(&mut self.doc, from, to, kind);
        } else {
            edit::add_mark(&mut self.doc, from, to, &mark);
        }
        true
    }

    fn toggle_text_kind(&mut self, kind: TextKind) -> bool {
        let (from, to) = self.range();
        let kinds = self.textblocks_in_selection();
        if kinds.is_empty() {
            return false;
        }
        let target = if kinds.iter().all(|k| *k == kind) {
            TextKind::Paragraph
        } else {
            kind
        };
        edit::set_text_kind(&mut self.doc, from.block..=to.block, &target);
        true
    }

    fn toggle_container(&mut self, container: Container) -> bool {
        let (from, to) = self.range();
        edit::toggle_wrap(&mut self.doc, from.block, to.block, container)
    }

    fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        self.redo_stack.push(self.snapshot());
        self.restore(previous);
        true
    }

    fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        self.undo_stack.push(self.snapshot());
        self.restore(next);
        true
    }

    /// The mark of `kind` at the selection start, looking at the char
    /// after the position first and then the one before.
    fn mark_near(&self, at: Position, kind: MarkKind) -> Option<(Mark, usize)> {
        let blocks = self.doc.textblocks();
        let block = blocks.get(at.block)?;
        let mark_at = |offset: usize| {
            block
                .marks_at(offset)
                .and_then(|marks| find_mark(marks, kind))
                .cloned()
                .map(|mark| (mark, offset))
        };
        mark_at(at.offset).or_else(|| at.offset.checked_sub(1).and_then(mark_at))
    }

    fn extend_mark_range(&mut self, kind: MarkKind) -> bool {
        let at = self.selection.from();
        if let Some((mark, offset)) = self.mark_near(at, kind)
            && let Some((start, end)) = edit::mark_span(&self.doc, at.block, offset, &mark)
        {
            self.selection = Selection::new(
                Position::new(at.block, start),
                Position::new(at.block, end),
            );
        }
        true
    }

    fn set_link(&mut self, href: &str) -> bool {
        let mark = Mark::Link {
            href: href.to_string(),
        };
        let (from, to) = self.range();
        if from == to {
            if self.cursor_in_code() {
                return false;
            }
            let mut marks = self.cursor_marks();
            insert_mark(&mut marks, mark);
            self.stored_marks = Some(marks);
            return true;
        }
        if !self.has_markable(from, to) {
            return false;
        }
        edit::add_mark(&mut self.doc, from, to, &mark);
        true
    }

    fn unset_link(&mut self) -> bool {
        let (from, to) = self.range();
        if from == to {
            if let Some((mark, offset)) = self.mark_near(from, MarkKind::Link)
                && let Some((start, end)) = edit::mark_span(&self.doc, from.block, offset, &mark)
            {
                edit::remove_mark(
                    &mut self.doc,
                    Position::new(from.block, start),
                    Position::new(from.block, end),
                    MarkKind::Link,
                );
            }
            if let Some(stored) = &mut self.stored_marks {
                remove_mark_kind(stored, MarkKind::Link);
            }
            return true;
        }
        edit::remove_mark(&mut self.doc, from, to, MarkKind::Link);
        true
    }

    fn clear_content(&mut self) -> bool {
        self.doc = Document::empty();
        self.selection = Selection::default();
        self.stored_marks = None;
        true
    }

    fn apply(&mut self, command: &EngineCommand, emit: &mut bool) -> bool {
        match command {
            EngineCommand::Focus => {
                self.focused = true;
                true
            }
            EngineCommand::ToggleMark(kind) => self.toggle_mark(*kind),
            EngineCommand::ToggleHeading { level } => {
                (1..=6).contains(level) && self.toggle_text_kind(TextKind::Heading(*level))
            }
            EngineCommand::ToggleCodeBlock => {
                self.toggle_text_kind(TextKind::CodeBlock { language: None })
            }
            EngineCommand::ToggleBulletList => self.toggle_container(Container::BulletList),
            EngineCommand::ToggleBlockquote => self.toggle_container(Container::Blockquote),
            EngineCommand::Undo => self.undo(),
            EngineCommand::Redo => self.redo(),
            EngineCommand::ExtendMarkRange(kind) => self.extend_mark_range(*kind),
            EngineCommand::SetLink { href } => self.set_link(href),
            EngineCommand::UnsetLink => self.unset_link(),
            EngineCommand::ClearContent { emit_update } => {
                *emit &= *emit_update;
                self.clear_content()
            }
        }
    }

    fn node_active(&self, name: &str, attrs: Option<&Value>) -> bool {
        let (from, to) = self.range();
        let container = match name {
            "blockquote" => Some(vec![Container::Blockquote]),
            "bulletList" => Some(vec![Container::BulletList]),
            "orderedList" => Some(vec![Container::OrderedList]),
            "listItem" => Some(vec![Container::BulletList, Container::OrderedList]),
            _ => None,
        };
        if let Some(wanted) = container {
            let ancestors = self.doc.ancestors();
            return ancestors
                .get(from.block..=to.block)
                .is_some_and(|chains| {
                    chains
                        .iter()
                        .all(|chain| chain.iter().any(|c| wanted.contains(c)))
                });
        }

        let blocks = self.doc.textblocks();
        blocks.get(from.block..=to.block).is_some_and(|blocks| {
            blocks.iter().all(|tb| {
                tb.kind.name() == name && attrs_match(&text_kind_attrs(&tb.kind), attrs)
            })
        })
    }
}

/// Every key in `wanted` is present in `actual` with an equal value
fn attrs_match(actual: &Attributes, wanted: Option<&Value>) -> bool {
    match wanted.and_then(Value::as_object) {
        Some(wanted) => wanted
            .iter()
            .all(|(key, value)| actual.get(key) == Some(value)),
        None => true,
    }
}

impl RichTextEngine for MemoryEngine {
    fn get_html(&self) -> String {
        self.doc.to_html()
    }

    fn get_json(&self) -> Value {
        self.doc.to_json()
    }

    fn run(&mut self, commands: &[EngineCommand]) -> bool {
        let history_step = commands
            .iter()
            .any(|c| matches!(c, EngineCommand::Undo | EngineCommand::Redo));
        let checkpoint = Checkpoint {
            snapshot: self.snapshot(),
            stored_marks: self.stored_marks.clone(),
            focused: self.focused,
            history: history_step.then(|| (self.undo_stack.clone(), self.redo_stack.clone())),
        };

        let mut emit = true;
        for command in commands {
            if !self.apply(command, &mut emit) {
                log::debug!("chain aborted at {:?}", command);
                self.doc = checkpoint.snapshot.doc;
                self.selection = checkpoint.snapshot.selection;
                self.stored_marks = checkpoint.stored_marks;
                self.focused = checkpoint.focused;
                if let Some((undo, redo)) = checkpoint.history {
                    self.undo_stack = undo;
                    self.redo_stack = redo;
                }
                return false;
            }
        }

        self.commit(checkpoint.snapshot, history_step, emit);
        true
    }

    fn chain(&mut self) -> Chain<'_> {
        Chain::new(self)
    }

    fn is_active(&self, name: &str, attrs: Option<&Value>) -> bool {
        let Some(kind) = MarkKind::from_name(name) else {
            return self.node_active(name, attrs);
        };
        let (from, to) = self.range();
        if from == to {
            return find_mark(&self.cursor_marks(), kind)
                .is_some_and(|mark| attrs_match(&mark_attrs(mark), attrs));
        }
        edit::range_has_mark(&self.doc, from, to, kind)
            && edit::first_mark_in_range(&self.doc, from, to, kind)
                .is_some_and(|mark| attrs_match(&mark_attrs(&mark), attrs))
    }

    fn get_attributes(&self, name: &str) -> Attributes {
        let (from, to) = self.range();
        if let Some(kind) = MarkKind::from_name(name) {
            let mark = if from == to {
                find_mark(&self.cursor_marks(), kind).cloned()
            } else {
                edit::first_mark_in_range(&self.doc, from, to, kind)
            };
            return mark.map(|mark| mark_attrs(&mark)).unwrap_or_default();
        }
        self.doc
            .textblocks()
            .get(from.block)
            .filter(|tb| tb.kind.name() == name)
            .map(|tb| text_kind_attrs(&tb.kind))
            .unwrap_or_default()
    }

    fn on_update(&mut self, listener: UpdateListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    fn off_update(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(engine: &mut MemoryEngine) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        engine.on_update(Box::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        count
    }

    #[test]
    fn test_toggle_mark_twice_restores_document() {
        let mut engine = MemoryEngine::new("<p>hello <em>world</em></p>");
        let original = engine.get_html();
        engine.select_range(0, 0, 11);

        assert!(engine.chain().focus().toggle_bold().run());
        assert_eq!(
            engine.get_html(),
            "<p><strong>hello <em>world</em></strong></p>"
        );
        assert!(engine.is_active("bold", None));

        assert!(engine.chain().focus().toggle_bold().run());
        assert_eq!(engine.get_html(), original);
        assert!(!engine.is_active("bold", None));
    }

    #[test]
    fn test_toggle_with_cursor_sets_stored_marks() {
        let mut engine = MemoryEngine::new("<p>ab</p>");
        engine.select_range(0, 2, 2);

        assert!(engine.chain().toggle_italic().run());
        assert!(engine.is_active("italic", None));
        engine.insert_text("c");

        assert_eq!(engine.get_html(), "<p>ab<em>c</em></p>");
    }

    #[test]
    fn test_mark_toggle_fails_inside_code_block() {
        let mut engine = MemoryEngine::new("<pre><code>let x;</code></pre>");
        engine.select_all();

        assert!(!engine.chain().focus().toggle_bold().run());
        assert!(!engine.is_focused());
        assert_eq!(engine.get_html(), "<pre><code>let x;</code></pre>");
    }

    #[test]
    fn test_failed_chain_rolls_back() {
        let mut engine = MemoryEngine::new("<p>abc</p>");
        engine.select_all();
        let count = counting(&mut engine);

        assert!(!engine.chain().toggle_bold().redo().run());
        assert_eq!(engine.get_html(), "<p>abc</p>");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_undo_redo() {
        let mut engine = MemoryEngine::new("<p>abc</p>");
        engine.select_all();
        engine.chain().toggle_heading(1).run();
        assert_eq!(engine.get_html(), "<h1>abc</h1>");

        assert!(engine.chain().undo().run());
        assert_eq!(engine.get_html(), "<p>abc</p>");
        assert!(engine.chain().redo().run());
        assert_eq!(engine.get_html(), "<h1>abc</h1>");
        assert!(!engine.chain().redo().run());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut engine = MemoryEngine::new("<p>abc</p>");
        engine.select_all();
        engine.chain().toggle_code_block().run();
        engine.chain().undo().run();
        assert!(engine.can_redo());

        engine.insert_text("x");
        assert!(!engine.can_redo());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut engine = MemoryEngine::new("<p></p>");
        for _ in 0..HISTORY_DEPTH + 10 {
            engine.insert_text("a");
        }
        let mut steps = 0;
        while engine.chain().undo().run() {
            steps += 1;
        }
        assert_eq!(steps, HISTORY_DEPTH);
    }

    #[test]
    fn test_heading_is_active_with_level() {
        let mut engine = MemoryEngine::new("<h2>t</h2>");
        engine.select_range(0, 1, 1);

        assert!(engine.is_active("heading", Some(&json!({ "level": 2 }))));
        assert!(!engine.is_active("heading", Some(&json!({ "level": 1 }))));
        assert!(!engine.is_active("paragraph", None));
    }

    #[test]
    fn test_toggle_list_and_quote() {
        let mut engine = MemoryEngine::new("<p>a</p><p>b</p>");
        engine.select_all();

        engine.chain().toggle_bullet_list().run();
        assert_eq!(
            engine.get_html(),
            "<ul><li><p>a</p></li><li><p>b</p></li></ul>"
        );
        assert!(engine.is_active("bulletList", None));

        engine.chain().toggle_bullet_list().run();
        assert_eq!(engine.get_html(), "<p>a</p><p>b</p>");

        engine.chain().toggle_blockquote().run();
        assert!(engine.is_active("blockquote", None));
    }

    #[test]
    fn test_extend_and_replace_link() {
        let mut engine = MemoryEngine::new(r#"<p>see <a href="old">the docs</a> now</p>"#);
        engine.select_range(0, 6, 6);
        assert_eq!(engine.get_attributes("link")["href"], "old");

        assert!(
            engine
                .chain()
                .focus()
                .extend_mark_range(MarkKind::Link)
                .set_link("https://new")
                .run()
        );
        assert_eq!(engine.selection().from(), Position::new(0, 4));
        assert_eq!(engine.selection().to(), Position::new(0, 12));
        assert!(engine.get_html().contains(r#"href="https://new""#));
        assert!(!engine.get_html().contains("old"));
    }

    #[test]
    fn test_unset_link_from_cursor_removes_whole_span() {
        let mut engine = MemoryEngine::new(r#"<p>see <a href="x">the docs</a> now</p>"#);
        engine.select_range(0, 8, 8);

        assert!(
            engine
                .chain()
                .focus()
                .extend_mark_range(MarkKind::Link)
                .unset_link()
                .run()
        );
        assert_eq!(engine.get_html(), "<p>see the docs now</p>");
    }

    #[test]
    fn test_link_not_active_past_its_end() {
        let mut engine = MemoryEngine::new(r#"<p><a href="x">ab</a>c</p>"#);
        engine.select_range(0, 2, 2);

        assert!(!engine.is_active("link", None));
        assert!(engine.get_attributes("link").is_empty());
    }

    #[test]
    fn test_clear_content_respects_emit_flag() {
        let mut engine = MemoryEngine::new("<p>abc</p>");
        let count = counting(&mut engine);

        engine.chain().clear_content(false).run();
        assert_eq!(engine.get_html(), "<p></p>");
        assert_eq!(count.load(Ordering::SeqCst), 0);

        engine.insert_text("x");
        engine.chain().clear_content(true).run();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_off_update_stops_notifications() {
        let mut engine = MemoryEngine::new("<p></p>");
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let id = engine.on_update(Box::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        engine.insert_text("a");
        assert!(engine.off_update(id));
        assert!(!engine.off_update(id));
        engine.insert_text("b");

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_split_block_moves_tail() {
        let mut engine = MemoryEngine::new("<h1>Title here</h1>");
        engine.select_range(0, 5, 5);
        engine.split_block();
        engine.insert_text("x");

        assert_eq!(engine.get_html(), "<h1>Title</h1><p>x here</p>");
    }

    #[test]
    fn test_focus_only_chain_does_not_notify() {
        let mut engine = MemoryEngine::new("<p>a</p>");
        let count = counting(&mut engine);

        assert!(engine.chain().focus().run());
        assert!(engine.is_focused());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!engine.can_undo());
    }
}
