use std::ops::RangeInclusive;

/// Transient identity of an embedded image inside one loaded document.
/// Not persisted; reassigned whenever markup is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockKind {
    #[default]
    Paragraph,
    Heading(u8),
    Preformatted,
    Quote,
}

impl BlockKind {
    /// Parse a block style value such as `p`, `h2`, `pre` or `blockquote`
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().trim_start_matches('<').trim_end_matches('>').to_ascii_lowercase();
        match tag.as_str() {
            "p" | "div" => Some(BlockKind::Paragraph),
            "pre" => Some(BlockKind::Preformatted),
            "blockquote" => Some(BlockKind::Quote),
            _ => {
                let level = tag.strip_prefix('h')?.parse::<u8>().ok()?;
                (1..=6).contains(&level).then_some(BlockKind::Heading(level))
            }
        }
    }

    pub fn tag(&self) -> String {
        match self {
            BlockKind::Paragraph => "p".to_string(),
            BlockKind::Heading(level) => format!("h{}", level),
            BlockKind::Preformatted => "pre".to_string(),
            BlockKind::Quote => "blockquote".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Unordered,
    Ordered,
}

/// Character-level formatting of a text run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InlineStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub font: Option<String>,
    /// Legacy font size scale, 1-7
    pub size: Option<u8>,
    pub color: Option<String>,
    pub highlight: Option<String>,
    pub link: Option<String>,
}

/// Toggleable boolean marks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strikethrough,
}

impl Mark {
    pub fn get(self, style: &InlineStyle) -> bool {
        match self {
            Mark::Bold => style.bold,
            Mark::Italic => style.italic,
            Mark::Underline => style.underline,
            Mark::Strikethrough => style.strikethrough,
        }
    }

    pub fn set(self, style: &mut InlineStyle, on: bool) {
        match self {
            Mark::Bold => style.bold = on,
            Mark::Italic => style.italic = on,
            Mark::Underline => style.underline = on,
            Mark::Strikethrough => style.strikethrough = on,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: InlineStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: ImageId,
    /// Data URI (or any URL) of the image
    pub src: String,
    /// Explicit display width in px; `None` means natural size
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(TextRun),
    Image(Image),
}

impl Inline {
    pub fn text(text: impl Into<String>, style: InlineStyle) -> Self {
        Inline::Text(TextRun {
            text: text.into(),
            style,
        })
    }

    /// Length in position units: characters for text, one for an image
    pub fn len(&self) -> usize {
        match self {
            Inline::Text(run) => run.text.chars().count(),
            Inline::Image(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub kind: BlockKind,
    pub align: Align,
    pub indent: u8,
    pub list: Option<ListKind>,
    pub inlines: Vec<Inline>,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Empty block carrying the same block-level attributes
    pub fn sibling(&self) -> Self {
        Self {
            kind: self.kind,
            align: self.align,
            indent: self.indent,
            list: self.list,
            inlines: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inlines.iter().map(Inline::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text content, images rendered as U+FFFC
    pub fn plain_text(&self) -> String {
        self.inlines
            .iter()
            .map(|inline| match inline {
                Inline::Text(run) => run.text.clone(),
                Inline::Image(_) => '\u{FFFC}'.to_string(),
            })
            .collect()
    }

    /// Ensure an inline boundary exists at `offset`; returns the index of the
    /// first inline starting at or after it
    pub fn split_at(&mut self, offset: usize) -> usize {
        let mut start = 0;
        for index in 0..self.inlines.len() {
            if offset == start {
                return index;
            }
            let len = self.inlines[index].len();
            if offset < start + len {
                if let Inline::Text(run) = &mut self.inlines[index] {
                    let byte = byte_index(&run.text, offset - start);
                    let tail = run.text.split_off(byte);
                    let style = run.style.clone();
                    self.inlines.insert(index + 1, Inline::Text(TextRun { text: tail, style }));
                }
                return index + 1;
            }
            start += len;
        }
        self.inlines.len()
    }

    /// Merge adjacent runs with equal styles and drop empty runs
    pub fn normalize(&mut self) {
        let mut merged: Vec<Inline> = Vec::with_capacity(self.inlines.len());
        for inline in self.inlines.drain(..) {
            if inline.is_empty() {
                continue;
            }
            if let (Some(Inline::Text(prev)), Inline::Text(run)) = (merged.last_mut(), &inline) {
                if prev.style == run.style {
                    prev.text.push_str(&run.text);
                    continue;
                }
            }
            merged.push(inline);
        }
        self.inlines = merged;
    }

    /// Style of the character just before `offset`
    pub fn style_before(&self, offset: usize) -> Option<&InlineStyle> {
        let mut start = 0;
        let mut found = None;
        for inline in &self.inlines {
            let len = inline.len();
            if offset > start && offset <= start + len {
                if let Inline::Text(run) = inline {
                    found = Some(&run.style);
                }
            }
            start += len;
            if start >= offset {
                break;
            }
        }
        found
    }
}

/// Byte index of the `chars`-th character of `s`
pub(crate) fn byte_index(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

/// A location in the document: block index and offset in position units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub block: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(block: usize, offset: usize) -> Self {
        Self { block, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    pub fn caret(pos: Position) -> Self {
        Self {
            anchor: pos,
            focus: pos,
        }
    }

    pub fn new(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn start(&self) -> Position {
        self.anchor.min(self.focus)
    }

    pub fn end(&self) -> Position {
        self.anchor.max(self.focus)
    }

    /// Indices of the blocks touched by the selection
    pub fn blocks(&self) -> RangeInclusive<usize> {
        self.start().block..=self.end().block
    }
}

/// Rich-text document: a non-empty ordered sequence of blocks
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) blocks: Vec<Block>,
    pub(crate) next_image: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A document holding a single empty paragraph
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::default()],
            next_image: 1,
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut doc = Self {
            blocks,
            next_image: 1,
        };
        if doc.blocks.is_empty() {
            doc.blocks.push(Block::default());
        }
        doc.renumber_images();
        doc
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Is this the document of a fresh note (one empty, unstyled paragraph)?
    pub fn is_blank(&self) -> bool {
        self.blocks.len() == 1 && self.blocks[0] == Block::default()
    }

    pub fn start(&self) -> Position {
        Position::new(0, 0)
    }

    pub fn end(&self) -> Position {
        let last = self.blocks.len() - 1;
        Position::new(last, self.blocks[last].len())
    }

    /// Clamp a position into the document
    pub fn clamp(&self, pos: Position) -> Position {
        if pos.block >= self.blocks.len() {
            return self.end();
        }
        Position::new(pos.block, pos.offset.min(self.blocks[pos.block].len()))
    }

    /// Next position in reading order, if any
    pub fn next_position(&self, pos: Position) -> Option<Position> {
        let pos = self.clamp(pos);
        if pos.offset < self.blocks[pos.block].len() {
            Some(Position::new(pos.block, pos.offset + 1))
        } else if pos.block + 1 < self.blocks.len() {
            Some(Position::new(pos.block + 1, 0))
        } else {
            None
        }
    }

    /// Previous position in reading order, if any
    pub fn prev_position(&self, pos: Position) -> Option<Position> {
        let pos = self.clamp(pos);
        if pos.offset > 0 {
            Some(Position::new(pos.block, pos.offset - 1))
        } else if pos.block > 0 {
            Some(Position::new(pos.block - 1, self.blocks[pos.block - 1].len()))
        } else {
            None
        }
    }

    pub(crate) fn alloc_image_id(&mut self) -> ImageId {
        let id = ImageId(self.next_image);
        self.next_image += 1;
        id
    }

    /// Give every image a fresh id from this document's counter
    pub(crate) fn renumber_images(&mut self) {
        let mut next = self.next_image;
        for block in &mut self.blocks {
            for inline in &mut block.inlines {
                if let Inline::Image(image) = inline {
                    image.id = ImageId(next);
                    next += 1;
                }
            }
        }
        self.next_image = next;
    }

    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.blocks.iter().flat_map(|b| {
            b.inlines.iter().filter_map(|inline| match inline {
                Inline::Image(image) => Some(image),
                Inline::Text(_) => None,
            })
        })
    }

    pub fn image(&self, id: ImageId) -> Option<&Image> {
        self.images().find(|image| image.id == id)
    }

    pub fn contains_image(&self, id: ImageId) -> bool {
        self.image(id).is_some()
    }

    /// Position just before the image
    pub fn find_image(&self, id: ImageId) -> Option<Position> {
        for (block_index, block) in self.blocks.iter().enumerate() {
            let mut offset = 0;
            for inline in &block.inlines {
                if let Inline::Image(image) = inline {
                    if image.id == id {
                        return Some(Position::new(block_index, offset));
                    }
                }
                offset += inline.len();
            }
        }
        None
    }

    /// Image occupying the unit right after `pos`, if any
    pub fn image_at(&self, pos: Position) -> Option<&Image> {
        let block = self.blocks.get(pos.block)?;
        let mut offset = 0;
        for inline in &block.inlines {
            if offset == pos.offset {
                if let Inline::Image(image) = inline {
                    return Some(image);
                }
            }
            offset += inline.len();
            if offset > pos.offset {
                break;
            }
        }
        None
    }

    /// Text content of the whole document, one line per block
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
