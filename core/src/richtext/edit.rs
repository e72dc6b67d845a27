//! Structural transforms on [`Document`]: the formatting and editing
//! operations a rich-text surface offers, expressed on the block model.

use super::model::{Align, Block, BlockKind, Document, ImageId, Inline, InlineStyle, ListKind, Mark, Position};
use std::ops::RangeInclusive;

/// Deepest indent level reachable with `indent`
pub const MAX_INDENT: u8 = 10;

impl Document {
    /// Offsets of `[start, end)` inside block `index`
    fn span_in_block(&self, index: usize, start: Position, end: Position) -> (usize, usize) {
        let len = self.blocks[index].len();
        let s = if index == start.block { start.offset.min(len) } else { 0 };
        let e = if index == end.block { end.offset.min(len) } else { len };
        (s, e)
    }

    fn block_range(&self, start: Position, end: Position) -> RangeInclusive<usize> {
        let last = self.blocks.len() - 1;
        start.block.min(last)..=end.block.min(last)
    }

    /// Apply `f` to the style of every text run inside `[start, end)`
    pub fn update_runs(&mut self, start: Position, end: Position, mut f: impl FnMut(&mut InlineStyle)) {
        for index in self.block_range(start, end) {
            let (s, e) = self.span_in_block(index, start, end);
            if s >= e {
                continue;
            }
            let block = &mut self.blocks[index];
            let i = block.split_at(s);
            let j = block.split_at(e);
            for inline in &mut block.inlines[i..j] {
                if let Inline::Text(run) = inline {
                    f(&mut run.style);
                }
            }
            block.normalize();
        }
    }

    /// Does every character of text inside `[start, end)` satisfy `pred`?
    /// False when the range holds no text at all.
    pub fn runs_all(&self, start: Position, end: Position, pred: impl Fn(&InlineStyle) -> bool) -> bool {
        let mut any = false;
        for index in self.block_range(start, end) {
            let (s, e) = self.span_in_block(index, start, end);
            let mut offset = 0;
            for inline in &self.blocks[index].inlines {
                let len = inline.len();
                let overlaps = offset < e && offset + len > s;
                if let (true, Inline::Text(run)) = (overlaps, inline) {
                    if !pred(&run.style) {
                        return false;
                    }
                    any = true;
                }
                offset += len;
            }
        }
        any
    }

    /// Toggle a mark over a range: removed when the whole range carries it,
    /// applied otherwise
    pub fn toggle_mark(&mut self, start: Position, end: Position, mark: Mark) {
        let on = !self.runs_all(start, end, |style| mark.get(style));
        self.update_runs(start, end, |style| mark.set(style, on));
    }

    /// Insert inlines at `pos`; returns the position right after them
    pub fn insert_inlines(&mut self, pos: Position, inlines: Vec<Inline>) -> Position {
        let pos = self.clamp(pos);
        let count: usize = inlines.iter().map(Inline::len).sum();
        let block = &mut self.blocks[pos.block];
        let index = block.split_at(pos.offset);
        block.inlines.splice(index..index, inlines);
        block.normalize();
        Position::new(pos.block, pos.offset + count)
    }

    /// Insert text at `pos`, splitting blocks at line breaks
    pub fn insert_text(&mut self, pos: Position, text: &str, style: &InlineStyle) -> Position {
        let mut pos = self.clamp(pos);
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                pos = self.split_block(pos);
            }
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                pos = self.insert_inlines(pos, vec![Inline::text(line, style.clone())]);
            }
        }
        pos
    }

    /// Split the block at `pos`; returns the start of the new block.
    /// Splitting at the end of a heading continues with a paragraph.
    pub fn split_block(&mut self, pos: Position) -> Position {
        let pos = self.clamp(pos);
        let block = &mut self.blocks[pos.block];
        let at_end = pos.offset >= block.len();
        let index = block.split_at(pos.offset);
        let tail = block.inlines.split_off(index);
        let mut next = block.sibling();
        if at_end && matches!(next.kind, BlockKind::Heading(_)) {
            next.kind = BlockKind::Paragraph;
        }
        next.inlines = tail;
        self.blocks.insert(pos.block + 1, next);
        Position::new(pos.block + 1, 0)
    }

    /// Remove everything inside `[start, end)`, merging the boundary blocks;
    /// returns `start`
    pub fn delete_range(&mut self, start: Position, end: Position) -> Position {
        let start = self.clamp(start);
        let end = self.clamp(end);
        if start >= end {
            return start;
        }
        if start.block == end.block {
            let block = &mut self.blocks[start.block];
            let i = block.split_at(start.offset);
            let j = block.split_at(end.offset);
            block.inlines.drain(i..j);
            block.normalize();
            return start;
        }

        let tail: Vec<Inline> = {
            let last = &mut self.blocks[end.block];
            let j = last.split_at(end.offset);
            last.inlines.drain(j..).collect()
        };
        self.blocks.drain(start.block + 1..=end.block);
        let first = &mut self.blocks[start.block];
        let i = first.split_at(start.offset);
        first.inlines.truncate(i);
        first.inlines.extend(tail);
        first.normalize();
        start
    }

    /// Insert parsed blocks at `pos`. A single block is merged inline; more
    /// blocks split the target block around them. Returns the position
    /// after the inserted content.
    pub fn insert_blocks(&mut self, pos: Position, mut fragment: Vec<Block>) -> Position {
        let pos = self.clamp(pos);
        if fragment.is_empty() {
            return pos;
        }
        if fragment.len() == 1 {
            let only = fragment.remove(0);
            return self.insert_inlines(pos, only.inlines);
        }

        let last = fragment.pop().unwrap_or_default();
        let first = fragment.remove(0);
        self.split_block(pos);
        let end_of_first = Position::new(pos.block, self.blocks[pos.block].len());
        self.insert_inlines(end_of_first, first.inlines);

        let mut at = pos.block + 1;
        for block in fragment {
            self.blocks.insert(at, block);
            at += 1;
        }
        self.insert_inlines(Position::new(at, 0), last.inlines)
    }

    /// Remove an image; returns where it was
    pub fn remove_image(&mut self, id: ImageId) -> Option<Position> {
        let pos = self.find_image(id)?;
        self.delete_range(pos, Position::new(pos.block, pos.offset + 1));
        Some(pos)
    }

    /// Set the display width of an image in px
    pub fn set_image_width(&mut self, id: ImageId, width: u32) -> bool {
        for block in &mut self.blocks {
            for inline in &mut block.inlines {
                if let Inline::Image(image) = inline {
                    if image.id == id {
                        image.width = Some(width);
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Contiguous stretch of the link touching `pos`, if the caret sits in or
    /// at the edge of one
    pub fn link_extent(&self, pos: Position) -> Option<(Position, Position)> {
        let pos = self.clamp(pos);
        let block = &self.blocks[pos.block];

        let mut spans: Vec<(usize, usize, Option<&str>)> = Vec::new();
        let mut offset = 0;
        for inline in &block.inlines {
            let len = inline.len();
            let link = match inline {
                Inline::Text(run) => run.style.link.as_deref(),
                Inline::Image(_) => None,
            };
            spans.push((offset, offset + len, link));
            offset += len;
        }

        let hit = spans
            .iter()
            .position(|(s, e, link)| link.is_some() && *s < pos.offset && pos.offset < *e)
            .or_else(|| spans.iter().position(|(s, e, link)| link.is_some() && (*s == pos.offset || *e == pos.offset)))?;
        let href = spans[hit].2;

        let mut first = hit;
        while first > 0 && spans[first - 1].2 == href {
            first -= 1;
        }
        let mut last = hit;
        while last + 1 < spans.len() && spans[last + 1].2 == href {
            last += 1;
        }
        Some((
            Position::new(pos.block, spans[first].0),
            Position::new(pos.block, spans[last].1),
        ))
    }

    pub fn set_block_kind(&mut self, blocks: RangeInclusive<usize>, kind: BlockKind) {
        self.each_block(blocks, |block| block.kind = kind);
    }

    /// Put the blocks in a list of `kind`, or take them out when they all
    /// already are
    pub fn toggle_list(&mut self, blocks: RangeInclusive<usize>, kind: ListKind) {
        let all = self.blocks[self.clamp_blocks(&blocks)]
            .iter()
            .all(|b| b.list == Some(kind));
        let target = if all { None } else { Some(kind) };
        self.each_block(blocks, |block| block.list = target);
    }

    pub fn set_align(&mut self, blocks: RangeInclusive<usize>, align: Align) {
        self.each_block(blocks, |block| block.align = align);
    }

    pub fn indent(&mut self, blocks: RangeInclusive<usize>) {
        self.each_block(blocks, |block| block.indent = block.indent.saturating_add(1).min(MAX_INDENT));
    }

    /// Decrease indentation; unindented list items leave their list
    pub fn outdent(&mut self, blocks: RangeInclusive<usize>) {
        self.each_block(blocks, |block| {
            if block.indent > 0 {
                block.indent -= 1;
            } else {
                block.list = None;
            }
        });
    }

    fn clamp_blocks(&self, blocks: &RangeInclusive<usize>) -> RangeInclusive<usize> {
        let last = self.blocks.len() - 1;
        (*blocks.start()).min(last)..=(*blocks.end()).min(last)
    }

    fn each_block(&mut self, blocks: RangeInclusive<usize>, mut f: impl FnMut(&mut Block)) {
        let range = self.clamp_blocks(&blocks);
        for block in &mut self.blocks[range] {
            f(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::markup::{parse, to_markup};

    fn p(block: usize, offset: usize) -> Position {
        Position::new(block, offset)
    }

    #[test]
    fn test_toggle_bold_applies_then_removes() {
        let mut doc = parse("<p>hello world</p>");
        doc.toggle_mark(p(0, 0), p(0, 5), Mark::Bold);
        assert_eq!(to_markup(&doc), "<p><b>hello</b> world</p>");

        doc.toggle_mark(p(0, 0), p(0, 5), Mark::Bold);
        assert_eq!(to_markup(&doc), "<p>hello world</p>");
    }

    #[test]
    fn test_toggle_on_partially_marked_range_applies() {
        let mut doc = parse("<p><i>ab</i>cd</p>");
        doc.toggle_mark(p(0, 0), p(0, 4), Mark::Italic);
        assert_eq!(to_markup(&doc), "<p><i>abcd</i></p>");
    }

    #[test]
    fn test_update_runs_across_blocks() {
        let mut doc = parse("<p>abc</p><p>def</p>");
        doc.update_runs(p(0, 1), p(1, 2), |s| s.color = Some("#ff0000".to_string()));
        assert_eq!(
            to_markup(&doc),
            "<p>a<font color=\"#ff0000\">bc</font></p><p><font color=\"#ff0000\">de</font>f</p>"
        );
    }

    #[test]
    fn test_insert_text_and_split() {
        let mut doc = parse("<p>ad</p>");
        let pos = doc.insert_text(p(0, 1), "b\nc", &InlineStyle::default());
        assert_eq!(pos, p(1, 1));
        assert_eq!(to_markup(&doc), "<p>ab</p><p>cd</p>");
    }

    #[test]
    fn test_split_heading_at_end_gives_paragraph() {
        let mut doc = parse("<h1>Title</h1>");
        let pos = doc.split_block(p(0, 5));
        assert_eq!(pos, p(1, 0));
        assert_eq!(doc.blocks()[1].kind, BlockKind::Paragraph);

        let mut doc = parse("<h1>Title</h1>");
        doc.split_block(p(0, 2));
        assert_eq!(doc.blocks()[1].kind, BlockKind::Heading(1));
    }

    #[test]
    fn test_delete_range_merges_blocks() {
        let mut doc = parse("<p>abc</p><p>middle</p><p>xyz</p>");
        let pos = doc.delete_range(p(0, 1), p(2, 2));
        assert_eq!(pos, p(0, 1));
        assert_eq!(to_markup(&doc), "<p>az</p>");
    }

    #[test]
    fn test_delete_range_within_block() {
        let mut doc = parse("<p>a<b>bc</b>d</p>");
        doc.delete_range(p(0, 1), p(0, 2));
        assert_eq!(to_markup(&doc), "<p>a<b>c</b>d</p>");
    }

    #[test]
    fn test_insert_blocks_splits_target() {
        let mut doc = parse("<p>startend</p>");
        let fragment = parse("<p>one</p><p>two</p><p>three</p>");
        let pos = doc.insert_blocks(p(0, 5), fragment.blocks().to_vec());
        assert_eq!(to_markup(&doc), "<p>startone</p><p>two</p><p>threeend</p>");
        assert_eq!(pos, p(2, 5));
    }

    #[test]
    fn test_remove_image_and_width() {
        let mut doc = parse("<p>a<img src=\"x.png\">b</p>");
        let id = doc.images().next().unwrap().id;
        assert!(doc.set_image_width(id, 200));
        assert_eq!(doc.image(id).unwrap().width, Some(200));

        assert_eq!(doc.remove_image(id), Some(p(0, 1)));
        assert!(!doc.contains_image(id));
        assert_eq!(to_markup(&doc), "<p>ab</p>");
        assert_eq!(doc.remove_image(id), None);
    }

    #[test]
    fn test_link_extent() {
        let doc = parse("<p>go <a href=\"https://a.test\">he<b>re</b></a> now</p>");
        assert_eq!(doc.link_extent(p(0, 4)), Some((p(0, 3), p(0, 7))));
        assert_eq!(doc.link_extent(p(0, 7)), Some((p(0, 3), p(0, 7))));
        assert_eq!(doc.link_extent(p(0, 1)), None);
    }

    #[test]
    fn test_block_commands() {
        let mut doc = parse("<p>a</p><p>b</p><p>c</p>");
        doc.toggle_list(0..=1, ListKind::Unordered);
        assert_eq!(to_markup(&doc), "<ul><li>a</li><li>b</li></ul><p>c</p>");

        doc.toggle_list(0..=1, ListKind::Unordered);
        assert_eq!(to_markup(&doc), "<p>a</p><p>b</p><p>c</p>");

        doc.set_align(2..=2, Align::Center);
        doc.set_block_kind(0..=0, BlockKind::Heading(3));
        doc.indent(1..=1);
        assert_eq!(
            to_markup(&doc),
            "<h3>a</h3><p style=\"margin-left: 40px;\">b</p><p style=\"text-align: center;\">c</p>"
        );

        doc.outdent(1..=1);
        assert_eq!(doc.blocks()[1].indent, 0);
    }

    #[test]
    fn test_outdent_leaves_list() {
        let mut doc = parse("<ol><li>item</li></ol>");
        doc.outdent(0..=0);
        assert_eq!(doc.blocks()[0].list, None);
    }

    #[test]
    fn test_indent_is_bounded() {
        let mut doc = parse("<p>x</p>");
        for _ in 0..20 {
            doc.indent(0..=0);
        }
        assert_eq!(doc.blocks()[0].indent, MAX_INDENT);
    }

    #[test]
    fn test_indent_from_stored_margin_does_not_overflow() {
        let mut doc = parse("<p style=\"margin-left: 10200px;\">x</p>");
        doc.indent(0..=0);
        assert_eq!(doc.blocks()[0].indent, MAX_INDENT);

        let mut deep = Document::from_blocks(vec![Block {
            indent: u8::MAX,
            ..Block::default()
        }]);
        deep.indent(0..=0);
        assert_eq!(deep.blocks()[0].indent, MAX_INDENT);
    }
}
