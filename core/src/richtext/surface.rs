use super::markup;
use super::model::{Align, BlockKind, Document, Image, ImageId, Inline, InlineStyle, ListKind, Mark, Position, Selection};
use std::sync::mpsc::{channel, Receiver, Sender};

/// Kind of change made to the document, mirroring what a DOM mutation
/// observer reports for a subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Blocks or inlines were added, removed or restructured
    ChildList,
    /// Text inside existing runs changed
    CharacterData,
    /// Block or image attributes changed (alignment, indent, width)
    Attributes,
}

/// The editing surface: a document, the caret/selection inside it, and a
/// mutation stream for observers.
pub struct EditorSurface {
    doc: Document,
    selection: Selection,
    /// Style picked with a collapsed caret, applied to the next typed text
    pending: Option<InlineStyle>,
    subscribers: Vec<Sender<Mutation>>,
}

impl Default for EditorSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSurface {
    pub fn new() -> Self {
        Self {
            doc: Document::new(),
            selection: Selection::default(),
            pending: None,
            subscribers: Vec::new(),
        }
    }

    /// Subscribe to content mutations. Dropped receivers are pruned on the
    /// next notification.
    pub fn subscribe(&mut self) -> Receiver<Mutation> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, mutation: Mutation) {
        self.subscribers.retain(|tx| tx.send(mutation).is_ok());
    }

    /// Replace the content with parsed markup; caret goes to the start
    pub fn load_markup(&mut self, markup: &str) {
        self.doc = markup::parse(markup);
        self.selection = Selection::caret(self.doc.start());
        self.pending = None;
        self.notify(Mutation::ChildList);
    }

    pub fn markup(&self) -> String {
        markup::to_markup(&self.doc)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn caret(&self) -> Position {
        self.selection.focus
    }

    pub fn is_collapsed(&self) -> bool {
        self.selection.is_collapsed()
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Selection::new(self.doc.clamp(selection.anchor), self.doc.clamp(selection.focus));
        self.pending = None;
    }

    pub fn set_caret(&mut self, pos: Position) {
        self.set_selection(Selection::caret(pos));
    }

    /// Move the focus end of the selection, keeping the anchor
    pub fn extend_to(&mut self, pos: Position) {
        let anchor = self.selection.anchor;
        self.set_selection(Selection::new(anchor, pos));
    }

    pub fn select_all(&mut self) {
        self.set_selection(Selection::new(self.doc.start(), self.doc.end()));
    }

    fn move_to(&mut self, pos: Position, extend: bool) {
        if extend {
            self.extend_to(pos);
        } else {
            self.set_caret(pos);
        }
    }

    pub fn move_left(&mut self, extend: bool) {
        if !extend && !self.is_collapsed() {
            let start = self.selection.start();
            self.set_caret(start);
            return;
        }
        if let Some(pos) = self.doc.prev_position(self.caret()) {
            self.move_to(pos, extend);
        }
    }

    pub fn move_right(&mut self, extend: bool) {
        if !extend && !self.is_collapsed() {
            let end = self.selection.end();
            self.set_caret(end);
            return;
        }
        if let Some(pos) = self.doc.next_position(self.caret()) {
            self.move_to(pos, extend);
        }
    }

    pub fn move_home(&mut self, extend: bool) {
        let caret = self.caret();
        self.move_to(Position::new(caret.block, 0), extend);
    }

    pub fn move_end(&mut self, extend: bool) {
        let caret = self.caret();
        let len = self.doc.block(caret.block).map(|b| b.len()).unwrap_or(0);
        self.move_to(Position::new(caret.block, len), extend);
    }

    /// Style that typed text receives at the caret: the pending style if one
    /// was picked, else the style of the preceding character. Typing at the
    /// trailing edge of a link does not extend it.
    pub fn typing_style(&self) -> InlineStyle {
        if let Some(pending) = &self.pending {
            return pending.clone();
        }
        let caret = self.caret();
        let Some(block) = self.doc.block(caret.block) else {
            return InlineStyle::default();
        };
        let mut style = block.style_before(caret.offset).cloned().unwrap_or_default();
        if style.link.is_some() {
            let continues = block
                .style_before(caret.offset + 1)
                .filter(|_| caret.offset < block.len())
                .is_some_and(|next| next.link == style.link);
            if !continues {
                style.link = None;
            }
        }
        style
    }

    /// Remove the selected content, if any; returns whether anything changed
    fn delete_selection(&mut self) -> bool {
        if self.is_collapsed() {
            return false;
        }
        let pos = self.doc.delete_range(self.selection.start(), self.selection.end());
        self.selection = Selection::caret(pos);
        true
    }

    pub fn insert_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let style = self.typing_style();
        self.delete_selection();
        let pos = self.doc.insert_text(self.caret(), text, &style);
        self.selection = Selection::caret(pos);
        self.pending = None;
        let mutation = if text.contains('\n') { Mutation::ChildList } else { Mutation::CharacterData };
        self.notify(mutation);
    }

    /// Split the current block (Enter)
    pub fn insert_paragraph(&mut self) {
        self.delete_selection();
        let pos = self.doc.split_block(self.caret());
        self.selection = Selection::caret(pos);
        self.notify(Mutation::ChildList);
    }

    /// Backspace
    pub fn delete_backward(&mut self) {
        if self.delete_selection() {
            self.notify(Mutation::ChildList);
            return;
        }
        let caret = self.caret();
        let in_list = self.doc.block(caret.block).is_some_and(|b| b.list.is_some());
        if caret.offset == 0 && in_list {
            self.doc.outdent(caret.block..=caret.block);
            self.notify(Mutation::Attributes);
            return;
        }
        if let Some(prev) = self.doc.prev_position(caret) {
            let mutation = if prev.block == caret.block { Mutation::CharacterData } else { Mutation::ChildList };
            let structural = self.doc.image_at(prev).is_some();
            let pos = self.doc.delete_range(prev, caret);
            self.selection = Selection::caret(pos);
            self.notify(if structural { Mutation::ChildList } else { mutation });
        }
    }

    /// Forward delete
    pub fn delete_forward(&mut self) {
        if self.delete_selection() {
            self.notify(Mutation::ChildList);
            return;
        }
        let caret = self.caret();
        if let Some(next) = self.doc.next_position(caret) {
            let structural = next.block != caret.block || self.doc.image_at(caret).is_some();
            self.doc.delete_range(caret, next);
            self.notify(if structural { Mutation::ChildList } else { Mutation::CharacterData });
        }
    }

    /// Toggle a mark over the selection, or on the pending style for a caret
    pub fn toggle_mark(&mut self, mark: Mark) {
        if self.is_collapsed() {
            let mut style = self.typing_style();
            let on = !mark.get(&style);
            mark.set(&mut style, on);
            self.pending = Some(style);
            return;
        }
        let (start, end) = (self.selection.start(), self.selection.end());
        self.doc.toggle_mark(start, end, mark);
        self.notify(Mutation::ChildList);
    }

    /// Apply a style change over the selection, or to the pending style
    pub fn apply_style(&mut self, mut change: impl FnMut(&mut InlineStyle)) {
        if self.is_collapsed() {
            let mut style = self.typing_style();
            change(&mut style);
            self.pending = Some(style);
            return;
        }
        let (start, end) = (self.selection.start(), self.selection.end());
        self.doc.update_runs(start, end, change);
        self.notify(Mutation::ChildList);
    }

    /// Turn the selected text into a hyperlink. Does nothing for a caret.
    pub fn create_link(&mut self, href: &str) {
        if self.is_collapsed() {
            return;
        }
        let href = href.to_string();
        self.apply_style(|style| style.link = Some(href.clone()));
    }

    /// Remove hyperlinks from the selection, widening it to whole links; a
    /// caret inside a link unlinks that link
    pub fn unlink(&mut self) {
        let (mut start, mut end) = (self.selection.start(), self.selection.end());
        if let Some((link_start, _)) = self.doc.link_extent(start) {
            start = start.min(link_start);
        }
        if let Some((_, link_end)) = self.doc.link_extent(end) {
            end = end.max(link_end);
        }
        if start == end || !self.doc_has_link(start, end) {
            return;
        }
        self.doc.update_runs(start, end, |style| style.link = None);
        self.notify(Mutation::ChildList);
    }

    fn doc_has_link(&self, start: Position, end: Position) -> bool {
        !self.doc.runs_all(start, end, |style| style.link.is_none())
    }

    pub fn set_block_kind(&mut self, kind: BlockKind) {
        self.doc.set_block_kind(self.selection.blocks(), kind);
        self.notify(Mutation::ChildList);
    }

    pub fn toggle_list(&mut self, kind: ListKind) {
        self.doc.toggle_list(self.selection.blocks(), kind);
        self.notify(Mutation::ChildList);
    }

    pub fn set_align(&mut self, align: Align) {
        self.doc.set_align(self.selection.blocks(), align);
        self.notify(Mutation::Attributes);
    }

    pub fn indent(&mut self) {
        self.doc.indent(self.selection.blocks());
        self.notify(Mutation::Attributes);
    }

    pub fn outdent(&mut self) {
        self.doc.outdent(self.selection.blocks());
        self.notify(Mutation::Attributes);
    }

    /// Insert a markup fragment at the caret, replacing any selection
    pub fn insert_html(&mut self, html: &str) {
        let fragment = markup::parse(html);
        let mut blocks = fragment.blocks().to_vec();
        for block in &mut blocks {
            for inline in &mut block.inlines {
                if let Inline::Image(image) = inline {
                    image.id = self.doc.alloc_image_id();
                }
            }
        }
        self.delete_selection();
        let pos = self.doc.insert_blocks(self.caret(), blocks);
        self.selection = Selection::caret(pos);
        self.pending = None;
        self.notify(Mutation::ChildList);
    }

    /// Insert an image at the caret, replacing any selection
    pub fn insert_image(&mut self, src: &str) -> ImageId {
        self.delete_selection();
        let id = self.doc.alloc_image_id();
        let image = Image {
            id,
            src: src.to_string(),
            width: None,
        };
        let pos = self.doc.insert_inlines(self.caret(), vec![Inline::Image(image)]);
        self.selection = Selection::caret(pos);
        self.notify(Mutation::ChildList);
        id
    }

    /// Remove an embedded image from the document
    pub fn remove_image(&mut self, id: ImageId) -> bool {
        let Some(at) = self.doc.remove_image(id) else {
            return false;
        };
        let shift = |pos: Position| {
            if pos.block == at.block && pos.offset > at.offset {
                Position::new(pos.block, pos.offset - 1)
            } else {
                pos
            }
        };
        let selection = Selection::new(shift(self.selection.anchor), shift(self.selection.focus));
        self.selection = Selection::new(self.doc.clamp(selection.anchor), self.doc.clamp(selection.focus));
        self.notify(Mutation::ChildList);
        true
    }

    pub fn set_image_width(&mut self, id: ImageId, width: u32) -> bool {
        let changed = self.doc.set_image_width(id, width);
        if changed {
            self.notify(Mutation::Attributes);
        }
        changed
    }

    pub fn image(&self, id: ImageId) -> Option<&Image> {
        self.doc.image(id)
    }

    pub fn contains_image(&self, id: ImageId) -> bool {
        self.doc.contains_image(id)
    }
}
