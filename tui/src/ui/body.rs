//! Terminal layout of the rich-text body.
//!
//! A [`BodyLayout`] is computed on demand from the document and the body
//! width. It places every character and image on a cell grid, maps document
//! positions to cells and back, and backs the [`ImageGeometry`] the image
//! controller measures with. Pixel coordinates are derived from cells at a
//! fixed [`CELL_WIDTH_PX`] x [`CELL_HEIGHT_PX`].

use pagenote_core::commands::decode_data_uri;
use pagenote_core::images::{Bounds, HandlePosition, ImageGeometry};
use pagenote_core::richtext::{
    Align, BlockKind, Document, EditorSurface, Image, ImageId, Inline, InlineStyle, ListKind, Position, Selection,
};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Widget},
};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use unicode_width::UnicodeWidthChar;

pub const CELL_WIDTH_PX: u32 = 8;
pub const CELL_HEIGHT_PX: u32 = 16;

/// Width used for an image whose dimensions cannot be decoded
const FALLBACK_IMAGE_PX: u32 = 320;
const MIN_IMAGE_ROWS: u16 = 2;
const MAX_IMAGE_ROWS: u16 = 24;
const INDENT_CELLS: u16 = 2;

/// Natural pixel dimensions of embedded images, keyed by their source
#[derive(Debug, Default)]
pub struct ImageDimensions {
    sizes: HashMap<u64, Option<(u32, u32)>>,
}

fn src_key(src: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    src.hash(&mut hasher);
    hasher.finish()
}

impl ImageDimensions {
    pub fn get(&self, src: &str) -> Option<(u32, u32)> {
        self.sizes.get(&src_key(src)).copied().flatten()
    }

    pub fn insert(&mut self, src: &str, dimensions: Option<(u32, u32)>) {
        self.sizes.insert(src_key(src), dimensions);
    }

    /// Decode the dimensions of every image in `doc` not seen before
    pub fn refresh(&mut self, doc: &Document) {
        for image in doc.images() {
            let key = src_key(&image.src);
            if self.sizes.contains_key(&key) {
                continue;
            }
            let dimensions = decode_data_uri(&image.src).and_then(|bytes| read_dimensions(&bytes));
            if dimensions.is_none() {
                log::debug!("Could not decode dimensions for image {:?}", image.id);
            }
            self.sizes.insert(key, dimensions);
        }
    }
}

fn read_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// One laid-out character
#[derive(Debug, Clone)]
pub struct Glyph {
    pub offset: usize,
    pub col: u16,
    pub ch: char,
    pub width: u16,
    pub style: InlineStyle,
}

/// An image box on the cell grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBox {
    pub id: ImageId,
    pub block: usize,
    pub offset: usize,
    pub row: usize,
    pub col: u16,
    pub width: u16,
    pub height: u16,
    /// Rendered width in px, never wider than the box
    pub width_px: u32,
}

impl ImageBox {
    fn contains(&self, row: usize, col: u16) -> bool {
        row >= self.row && row < self.row + self.height as usize && col >= self.col && col < self.col + self.width
    }
}

#[derive(Debug, Clone)]
pub struct LayoutLine {
    pub block: usize,
    /// First and one-past-last offsets covered by the line
    pub start: usize,
    pub end: usize,
    pub kind: BlockKind,
    /// List marker or quote bar, with the column it starts at
    pub prefix: Option<(u16, String)>,
    pub glyphs: Vec<Glyph>,
    /// Index into [`BodyLayout::images`] for rows an image occupies
    pub image: Option<usize>,
    /// Column just past the last glyph
    pub end_col: u16,
}

/// What a cell of the body maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub position: Position,
    pub image: Option<ImageId>,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BodyLayout {
    pub width: u16,
    pub lines: Vec<LayoutLine>,
    pub images: Vec<ImageBox>,
}

struct LineBuilder {
    block: usize,
    kind: BlockKind,
    start: usize,
    glyphs: Vec<Glyph>,
    used: u16,
}

impl BodyLayout {
    pub fn compute(doc: &Document, width: u16, dimensions: &ImageDimensions) -> Self {
        let width = width.max(1);
        let mut layout = Self {
            width,
            lines: Vec::new(),
            images: Vec::new(),
        };
        let mut ordinal = 0usize;
        let mut previous_list: Option<(ListKind, u8)> = None;

        for (index, block) in doc.blocks().iter().enumerate() {
            let list_key = block.list.map(|kind| (kind, block.indent));
            ordinal = match list_key {
                Some(key) if previous_list == Some(key) => ordinal + 1,
                Some(_) => 1,
                None => 0,
            };
            previous_list = list_key;

            let prefix = match (block.list, block.kind) {
                (Some(ListKind::Unordered), _) => Some("• ".to_string()),
                (Some(ListKind::Ordered), _) => Some(format!("{}. ", ordinal)),
                (None, BlockKind::Quote) => Some("│ ".to_string()),
                _ => None,
            };
            let indent_col = (block.indent as u16 * INDENT_CELLS).min(width.saturating_sub(1));
            let base = indent_col + prefix.as_deref().map_or(0, |p| p.chars().count() as u16);
            let base = base.min(width.saturating_sub(1));
            let avail = width - base;
            let first_line = layout.lines.len();

            let mut line = LineBuilder {
                block: index,
                kind: block.kind,
                start: 0,
                glyphs: Vec::new(),
                used: 0,
            };
            let mut offset = 0usize;
            for inline in &block.inlines {
                match inline {
                    Inline::Text(run) => {
                        for ch in run.text.chars() {
                            if ch == '\n' {
                                layout.flush(&mut line, base, avail, block.align, offset);
                                offset += 1;
                                line.start = offset;
                                continue;
                            }
                            let w = ch.width().unwrap_or(0).max(1) as u16;
                            if line.used + w > avail && !line.glyphs.is_empty() {
                                layout.wrap(&mut line, base, avail, block.align, offset);
                            }
                            line.glyphs.push(Glyph {
                                offset,
                                col: line.used,
                                ch,
                                width: w,
                                style: run.style.clone(),
                            });
                            line.used += w;
                            offset += 1;
                        }
                    }
                    Inline::Image(image) => {
                        if !line.glyphs.is_empty() {
                            layout.flush(&mut line, base, avail, block.align, offset);
                        }
                        layout.place_image(index, offset, image, base, avail, block.align, dimensions);
                        offset += 1;
                        line.start = offset;
                    }
                }
            }
            if !line.glyphs.is_empty() || layout.lines.len() == first_line {
                layout.flush(&mut line, base, avail, block.align, offset);
            }
            if let Some(prefix) = prefix {
                if let Some(first) = layout.lines.get_mut(first_line) {
                    first.prefix = Some((indent_col, prefix));
                }
            }
        }
        layout
    }

    fn align_col(base: u16, avail: u16, used: u16, align: Align) -> u16 {
        let slack = avail.saturating_sub(used);
        match align {
            Align::Left => base,
            Align::Center => base + slack / 2,
            Align::Right => base + slack,
        }
    }

    fn flush(&mut self, line: &mut LineBuilder, base: u16, avail: u16, align: Align, end: usize) {
        let shift = Self::align_col(base, avail, line.used, align);
        let mut glyphs = std::mem::take(&mut line.glyphs);
        for glyph in &mut glyphs {
            glyph.col += shift;
        }
        self.lines.push(LayoutLine {
            block: line.block,
            start: line.start,
            end,
            kind: line.kind,
            prefix: None,
            glyphs,
            image: None,
            end_col: shift + line.used,
        });
        line.start = end;
        line.used = 0;
    }

    /// Break the current line before `next`, carrying a trailing partial
    /// word over to the new line when there is an earlier space
    fn wrap(&mut self, line: &mut LineBuilder, base: u16, avail: u16, align: Align, next: usize) {
        let split = line
            .glyphs
            .iter()
            .rposition(|g| g.ch == ' ')
            .map(|i| i + 1)
            .filter(|&i| i < line.glyphs.len());
        let Some(split) = split else {
            self.flush(line, base, avail, align, next);
            return;
        };
        let carried: Vec<Glyph> = line.glyphs.split_off(split);
        let break_offset = carried[0].offset;
        line.used = line.glyphs.last().map_or(0, |g| g.col + g.width);
        self.flush(line, base, avail, align, break_offset);
        let mut col = 0;
        for mut glyph in carried {
            glyph.col = col;
            col += glyph.width;
            line.glyphs.push(glyph);
        }
        line.used = col;
    }

    #[allow(clippy::too_many_arguments)]
    fn place_image(
        &mut self,
        block: usize,
        offset: usize,
        image: &Image,
        base: u16,
        avail: u16,
        align: Align,
        dimensions: &ImageDimensions,
    ) {
        let natural = dimensions.get(&image.src);
        let requested_px = image
            .width
            .or_else(|| natural.map(|(w, _)| w))
            .unwrap_or(FALLBACK_IMAGE_PX)
            .max(1);
        let cells = requested_px.div_ceil(CELL_WIDTH_PX).clamp(1, avail as u32) as u16;
        let width_px = requested_px.min(cells as u32 * CELL_WIDTH_PX);
        let height = match natural {
            Some((w, h)) if w > 0 => {
                let height_px = width_px as u64 * h as u64 / w as u64;
                (height_px.div_ceil(CELL_HEIGHT_PX as u64) as u16).clamp(MIN_IMAGE_ROWS, MAX_IMAGE_ROWS)
            }
            _ => (width_px * 3 / 4).div_ceil(CELL_HEIGHT_PX).clamp(MIN_IMAGE_ROWS as u32, MAX_IMAGE_ROWS as u32) as u16,
        };
        let col = Self::align_col(base, avail, cells, align);
        let row = self.lines.len();
        self.images.push(ImageBox {
            id: image.id,
            block,
            offset,
            row,
            col,
            width: cells,
            height,
            width_px,
        });
        let index = self.images.len() - 1;
        for _ in 0..height {
            self.lines.push(LayoutLine {
                block,
                start: offset,
                end: offset + 1,
                kind: BlockKind::Paragraph,
                prefix: None,
                glyphs: Vec::new(),
                image: Some(index),
                end_col: col + cells,
            });
        }
    }

    pub fn height(&self) -> usize {
        self.lines.len()
    }

    pub fn image_box(&self, id: ImageId) -> Option<&ImageBox> {
        self.images.iter().find(|b| b.id == id)
    }

    /// Cell (row, col) where a caret at `pos` is drawn
    pub fn cell_of(&self, pos: Position) -> Option<(usize, u16)> {
        let mut fallback = None;
        for (row, line) in self.lines.iter().enumerate() {
            if line.block != pos.block {
                continue;
            }
            if let Some(index) = line.image {
                let image = &self.images[index];
                if pos.offset == image.offset && row == image.row {
                    return Some((row, image.col));
                }
                if pos.offset == image.offset + 1 && row + 1 == image.row + image.height as usize {
                    fallback = Some((row, image.col + image.width));
                }
                continue;
            }
            if let Some(glyph) = line.glyphs.iter().find(|g| g.offset == pos.offset) {
                return Some((row, glyph.col));
            }
            if pos.offset == line.start && line.glyphs.is_empty() {
                return Some((row, line.end_col));
            }
            if pos.offset == line.end {
                fallback = Some((row, line.end_col));
            }
        }
        fallback
    }

    /// Map a cell to a document position, image and link
    pub fn hit(&self, row: usize, col: u16) -> Option<Hit> {
        let line = self.lines.get(row).or_else(|| self.lines.last())?;
        if row >= self.lines.len() {
            return Some(Hit {
                position: Position::new(line.block, line.end),
                image: None,
                link: None,
            });
        }
        if let Some(index) = line.image {
            let image = &self.images[index];
            let inside = image.contains(row, col);
            let offset = if col >= image.col + image.width { image.offset + 1 } else { image.offset };
            return Some(Hit {
                position: Position::new(line.block, offset),
                image: inside.then_some(image.id),
                link: None,
            });
        }
        if let Some(glyph) = line.glyphs.iter().find(|g| col >= g.col && col < g.col + g.width) {
            return Some(Hit {
                position: Position::new(line.block, glyph.offset),
                image: None,
                link: glyph.style.link.clone(),
            });
        }
        let first_col = line.glyphs.first().map_or(line.end_col, |g| g.col);
        let offset = if col < first_col { line.start } else { line.end };
        Some(Hit {
            position: Position::new(line.block, offset),
            image: None,
            link: None,
        })
    }

    /// Pixel bounds of an image relative to the body's top-left corner
    pub fn image_bounds(&self, id: ImageId, scroll: usize) -> Option<Bounds> {
        let image = self.image_box(id)?;
        let left = (image.col as u32 * CELL_WIDTH_PX) as i32;
        let top = (image.row as i64 - scroll as i64) as i32 * CELL_HEIGHT_PX as i32;
        Some(Bounds {
            left,
            top,
            right: left + image.width_px as i32,
            bottom: top + image.height as i32 * CELL_HEIGHT_PX as i32,
        })
    }
}

/// Cell (row, col) relative to the viewport that a handle position falls in
pub fn handle_cell(handle: HandlePosition) -> (i32, i32) {
    (
        handle.top.div_euclid(CELL_HEIGHT_PX as i32),
        handle.left.div_euclid(CELL_WIDTH_PX as i32),
    )
}

/// The body viewport as the image controller sees it
pub struct BodyGeometry<'a> {
    width: u16,
    scroll: usize,
    dimensions: &'a ImageDimensions,
}

impl<'a> BodyGeometry<'a> {
    pub fn new(width: u16, scroll: usize, dimensions: &'a ImageDimensions) -> Self {
        Self {
            width,
            scroll,
            dimensions,
        }
    }
}

impl ImageGeometry for BodyGeometry<'_> {
    fn image_bounds(&self, surface: &EditorSurface, id: ImageId) -> Option<Bounds> {
        BodyLayout::compute(surface.document(), self.width, self.dimensions).image_bounds(id, self.scroll)
    }

    fn content_width(&self) -> u32 {
        self.width as u32 * CELL_WIDTH_PX
    }
}

/// Map a CSS color value onto a terminal color
pub fn css_color(value: &str) -> Option<Color> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expand = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            3 => {
                let digits: Vec<String> = hex.chars().map(|c| format!("{c}{c}")).collect();
                Some(Color::Rgb(expand(&digits[0])?, expand(&digits[1])?, expand(&digits[2])?))
            }
            6 => Some(Color::Rgb(expand(&hex[0..2])?, expand(&hex[2..4])?, expand(&hex[4..6])?)),
            _ => None,
        };
    }
    let color = match value.as_str() {
        "black" => Color::Black,
        "white" => Color::White,
        "red" => Color::Red,
        "green" => Color::Green,
        "blue" => Color::Blue,
        "yellow" => Color::Yellow,
        "cyan" => Color::Cyan,
        "magenta" => Color::Magenta,
        "gray" | "grey" | "silver" => Color::Gray,
        "orange" => Color::Rgb(255, 165, 0),
        "purple" => Color::Rgb(128, 0, 128),
        "pink" => Color::Rgb(255, 192, 203),
        "brown" => Color::Rgb(165, 42, 42),
        "lime" => Color::LightGreen,
        "navy" => Color::Rgb(0, 0, 128),
        "teal" => Color::Rgb(0, 128, 128),
        "maroon" => Color::Rgb(128, 0, 0),
        "olive" => Color::Rgb(128, 128, 0),
        "gold" => Color::Rgb(255, 215, 0),
        _ => return None,
    };
    Some(color)
}

fn glyph_style(glyph: &Glyph, kind: BlockKind) -> Style {
    let mut style = match kind {
        BlockKind::Heading(_) => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        BlockKind::Preformatted => Style::default().fg(Color::Green),
        BlockKind::Quote => Style::default().add_modifier(Modifier::ITALIC),
        BlockKind::Paragraph => Style::default(),
    };
    let s = &glyph.style;
    if s.bold || s.size.is_some_and(|size| size >= 5) {
        style = style.add_modifier(Modifier::BOLD);
    }
    if s.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if s.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if s.strikethrough {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    if let Some(color) = s.color.as_deref().and_then(css_color) {
        style = style.fg(color);
    }
    if let Some(color) = s.highlight.as_deref().and_then(css_color) {
        style = style.bg(color);
    }
    if s.link.is_some() {
        style = style.fg(Color::Magenta).add_modifier(Modifier::UNDERLINED);
    }
    style
}

/// Draws the visible slice of a [`BodyLayout`]
pub struct BodyView<'a> {
    pub layout: &'a BodyLayout,
    pub scroll: usize,
    pub selection: Selection,
    pub selected_image: Option<ImageId>,
    pub handle: Option<HandlePosition>,
}

impl Widget for BodyView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let start = self.selection.start();
        let end = self.selection.end();
        let visible = area.height as usize;

        for (screen_row, line) in self.layout.lines.iter().skip(self.scroll).take(visible).enumerate() {
            let y = area.y + screen_row as u16;
            if let Some((col, prefix)) = &line.prefix {
                buf.set_string(area.x + col, y, prefix, Style::default().fg(Color::DarkGray));
            }
            for glyph in &line.glyphs {
                if glyph.col >= area.width {
                    continue;
                }
                let pos = Position::new(line.block, glyph.offset);
                let mut style = glyph_style(glyph, line.kind);
                if pos >= start && pos < end {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                buf.set_string(area.x + glyph.col, y, glyph.ch.to_string(), style);
            }
        }

        for image in &self.layout.images {
            let top = image.row as i64 - self.scroll as i64;
            let bottom = top + image.height as i64;
            if bottom <= 0 || top >= visible as i64 {
                continue;
            }
            let y0 = top.max(0) as u16;
            let y1 = bottom.min(visible as i64) as u16;
            let rect = Rect::new(area.x + image.col, area.y + y0, image.width, y1 - y0).intersection(area);
            let selected = self.selected_image == Some(image.id);
            let border = if selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let mut borders = Borders::LEFT | Borders::RIGHT;
            if top >= 0 {
                borders |= Borders::TOP;
            }
            if bottom <= visible as i64 {
                borders |= Borders::BOTTOM;
            }
            Block::default().borders(borders).border_style(border).render(rect, buf);
            let label = format!("img {}px", image.width_px);
            let label_y = area.y + (top + image.height as i64 / 2).clamp(0, visible as i64 - 1) as u16;
            if rect.width > 2 && label_y >= rect.y && label_y < rect.y + rect.height {
                let label: String = label.chars().take(rect.width as usize - 2).collect();
                buf.set_string(rect.x + 1, label_y, label, border);
            }
        }

        if let Some(handle) = self.handle {
            let (row, col) = handle_cell(handle);
            if row >= 0 && (row as u16) < area.height && col >= 0 && (col as u16) < area.width {
                buf.set_string(
                    area.x + col as u16,
                    area.y + row as u16,
                    "◢",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(markup: &str, width: u16) -> (EditorSurface, BodyLayout) {
        let mut surface = EditorSurface::new();
        surface.load_markup(markup);
        let layout = BodyLayout::compute(surface.document(), width, &ImageDimensions::default());
        (surface, layout)
    }

    #[test]
    fn test_paragraphs_and_wrapping() {
        let (_, layout) = layout("<p>hello world</p><p>x</p>", 8);
        assert_eq!(layout.height(), 3);
        let first: String = layout.lines[0].glyphs.iter().map(|g| g.ch).collect();
        let second: String = layout.lines[1].glyphs.iter().map(|g| g.ch).collect();
        assert_eq!(first, "hello ");
        assert_eq!(second, "world");
        assert_eq!(layout.lines[1].start, 6);
        assert_eq!(layout.lines[2].block, 1);
    }

    #[test]
    fn test_empty_document_has_one_line() {
        let (_, layout) = layout("", 20);
        assert_eq!(layout.height(), 1);
        assert_eq!(layout.cell_of(Position::new(0, 0)), Some((0, 0)));
    }

    #[test]
    fn test_caret_cells_and_hits_agree() {
        let (_, layout) = layout("<p>abc</p><p style=\"text-align: right;\">xy</p>", 10);
        assert_eq!(layout.cell_of(Position::new(0, 1)), Some((0, 1)));
        assert_eq!(layout.cell_of(Position::new(0, 3)), Some((0, 3)));
        assert_eq!(layout.cell_of(Position::new(1, 0)), Some((1, 8)));

        assert_eq!(layout.hit(0, 2).unwrap().position, Position::new(0, 2));
        assert_eq!(layout.hit(0, 9).unwrap().position, Position::new(0, 3));
        assert_eq!(layout.hit(1, 0).unwrap().position, Position::new(1, 0));
        assert_eq!(layout.hit(40, 0).unwrap().position, Position::new(1, 2));
    }

    #[test]
    fn test_list_prefixes_and_indent() {
        let (_, layout) = layout("<ol><li>one</li><li>two</li></ol><ul><li>dot</li></ul>", 20);
        assert_eq!(layout.lines[0].prefix, Some((0, "1. ".to_string())));
        assert_eq!(layout.lines[1].prefix, Some((0, "2. ".to_string())));
        assert_eq!(layout.lines[2].prefix, Some((0, "• ".to_string())));
        assert_eq!(layout.lines[0].glyphs[0].col, 3);
        assert_eq!(layout.lines[2].glyphs[0].col, 2);
    }

    #[test]
    fn test_link_hit() {
        let (_, layout) = layout("<p>go <a href=\"https://a.test\" target=\"_blank\">here</a></p>", 20);
        assert_eq!(layout.hit(0, 4).unwrap().link.as_deref(), Some("https://a.test"));
        assert_eq!(layout.hit(0, 0).unwrap().link, None);
    }

    #[test]
    fn test_image_box_placement_and_bounds() {
        let (surface, layout) = layout(
            "<p>intro</p><p><img src=\"data:image/png;base64,AA==\" style=\"width: 100px; height: auto;\"></p>",
            40,
        );
        let id = surface.document().images().next().unwrap().id;
        let image = layout.image_box(id).unwrap();
        assert_eq!((image.row, image.col, image.width), (1, 0, 13));
        assert_eq!(image.width_px, 100);
        assert_eq!(layout.height(), 1 + image.height as usize);

        let hit = layout.hit(2, 3).unwrap();
        assert_eq!(hit.image, Some(id));
        assert_eq!(hit.position, Position::new(1, 0));

        let bounds = layout.image_bounds(id, 0).unwrap();
        assert_eq!(bounds.left, 0);
        assert_eq!(bounds.top, 16);
        assert_eq!(bounds.width(), 100);
        let scrolled = layout.image_bounds(id, 1).unwrap();
        assert_eq!(scrolled.top, 0);
    }

    #[test]
    fn test_refresh_decodes_embedded_dimensions() {
        let mut png = Vec::new();
        image::RgbImage::new(24, 10)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let src = pagenote_core::commands::encode_data_uri(&png, "image/png");
        let mut surface = EditorSurface::new();
        surface.insert_image(&src);
        surface.insert_image("data:image/png;base64,AA==");

        let mut dimensions = ImageDimensions::default();
        dimensions.refresh(surface.document());
        assert_eq!(dimensions.get(&src), Some((24, 10)));
        assert_eq!(dimensions.get("data:image/png;base64,AA=="), None);
    }

    #[test]
    fn test_wide_image_is_capped_to_body() {
        let (surface, layout) = layout(
            "<p><img src=\"data:image/png;base64,AA==\" style=\"width: 900px; height: auto;\"></p>",
            30,
        );
        let id = surface.document().images().next().unwrap().id;
        let image = layout.image_box(id).unwrap();
        assert_eq!(image.width, 30);
        assert_eq!(image.width_px, 240);
    }

    #[test]
    fn test_geometry_tracks_width_changes() {
        let mut surface = EditorSurface::new();
        surface.load_markup("<p><img src=\"data:image/png;base64,AA==\" style=\"width: 80px; height: auto;\"></p>");
        let id = surface.document().images().next().unwrap().id;
        let dims = ImageDimensions::default();
        let geometry = BodyGeometry::new(50, 0, &dims);
        assert_eq!(geometry.content_width(), 400);
        assert_eq!(geometry.image_bounds(&surface, id).unwrap().width(), 80);

        surface.set_image_width(id, 160);
        assert_eq!(geometry.image_bounds(&surface, id).unwrap().width(), 160);
    }

    #[test]
    fn test_handle_cell() {
        assert_eq!(handle_cell(HandlePosition { left: 94, top: 70 }), (4, 11));
        assert_eq!(handle_cell(HandlePosition { left: 94, top: -6 }), (-1, 11));
    }

    #[test]
    fn test_css_color() {
        assert_eq!(css_color("#f00"), Some(Color::Rgb(255, 0, 0)));
        assert_eq!(css_color("#00ff80"), Some(Color::Rgb(0, 255, 128)));
        assert_eq!(css_color("Red"), Some(Color::Red));
        assert_eq!(css_color("#12"), None);
        assert_eq!(css_color("nonsense"), None);
        assert_eq!(css_color("#1é234"), None);
        assert_eq!(css_color("#éé"), None);
    }

    fn render(surface: &EditorSurface, layout: &BodyLayout, area: Rect, scroll: usize) -> Buffer {
        let mut buf = Buffer::empty(area);
        let view = BodyView {
            layout,
            scroll,
            selection: surface.selection(),
            selected_image: None,
            handle: None,
        };
        view.render(area, &mut buf);
        buf
    }

    #[test]
    fn test_render_into_collapsed_area() {
        let (surface, layout) = layout(
            "<p><img src=\"data:image/png;base64,AA==\" style=\"width: 320px; height: auto;\"></p>",
            40,
        );
        render(&surface, &layout, Rect::new(0, 0, 40, 0), 1);
        render(&surface, &layout, Rect::new(0, 0, 0, 5), 1);
        let buf = render(&surface, &layout, Rect::new(0, 0, 40, 1), 1);
        assert_eq!(buf.get(0, 0).symbol(), "│");
    }

    #[test]
    fn test_render_tolerates_unparsable_stored_colors() {
        let (surface, layout) = layout(
            "<p><font color=\"#1é234\">x</font><span style=\"background-color: #ééé;\">y</span></p>",
            10,
        );
        let buf = render(&surface, &layout, Rect::new(0, 0, 10, 1), 0);
        assert_eq!(buf.get(0, 0).symbol(), "x");
        assert_eq!(buf.get(1, 0).symbol(), "y");
    }
}
