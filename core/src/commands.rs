//! Toolbar command dispatch: maps formatting triggers and parameterized
//! selectors onto editing-surface transforms.

use crate::richtext::markup::{escape_attr, escape_text};
use crate::richtext::{Align, BlockKind, EditorSurface, ImageId, ListKind, Mark};
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::Path;

/// Fixed-table formatting commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCommand {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    UnorderedList,
    OrderedList,
    JustifyLeft,
    JustifyCenter,
    JustifyRight,
    Outdent,
    Indent,
}

/// Trigger name for every formatting command
pub const FORMAT_TRIGGERS: &[(&str, FormatCommand)] = &[
    ("bold", FormatCommand::Bold),
    ("italic", FormatCommand::Italic),
    ("underline", FormatCommand::Underline),
    ("strikethrough", FormatCommand::Strikethrough),
    ("unordered-list", FormatCommand::UnorderedList),
    ("ordered-list", FormatCommand::OrderedList),
    ("align-left", FormatCommand::JustifyLeft),
    ("align-center", FormatCommand::JustifyCenter),
    ("align-right", FormatCommand::JustifyRight),
    ("outdent", FormatCommand::Outdent),
    ("indent", FormatCommand::Indent),
];

impl FormatCommand {
    pub fn from_trigger(trigger: &str) -> Option<Self> {
        FORMAT_TRIGGERS
            .iter()
            .find(|(name, _)| *name == trigger)
            .map(|(_, command)| *command)
    }

    pub fn trigger(self) -> &'static str {
        FORMAT_TRIGGERS
            .iter()
            .find(|(_, command)| *command == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }

    pub fn apply(self, surface: &mut EditorSurface) {
        match self {
            FormatCommand::Bold => surface.toggle_mark(Mark::Bold),
            FormatCommand::Italic => surface.toggle_mark(Mark::Italic),
            FormatCommand::Underline => surface.toggle_mark(Mark::Underline),
            FormatCommand::Strikethrough => surface.toggle_mark(Mark::Strikethrough),
            FormatCommand::UnorderedList => surface.toggle_list(ListKind::Unordered),
            FormatCommand::OrderedList => surface.toggle_list(ListKind::Ordered),
            FormatCommand::JustifyLeft => surface.set_align(Align::Left),
            FormatCommand::JustifyCenter => surface.set_align(Align::Center),
            FormatCommand::JustifyRight => surface.set_align(Align::Right),
            FormatCommand::Outdent => surface.outdent(),
            FormatCommand::Indent => surface.indent(),
        }
    }
}

/// Selector inputs that carry a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    BlockStyle,
    FontName,
    FontSize,
    ForeColor,
    HiliteColor,
}

impl ParamKind {
    pub fn label(self) -> &'static str {
        match self {
            ParamKind::BlockStyle => "Block style (p, h1-h6, pre, blockquote)",
            ParamKind::FontName => "Font",
            ParamKind::FontSize => "Font size (1-7)",
            ParamKind::ForeColor => "Text color",
            ParamKind::HiliteColor => "Highlight color",
        }
    }

    /// Colors apply on every input change rather than on commit
    pub fn is_live(self) -> bool {
        matches!(self, ParamKind::ForeColor | ParamKind::HiliteColor)
    }
}

/// A parameterized formatting command with a validated value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamCommand {
    FormatBlock(BlockKind),
    FontName(String),
    FontSize(u8),
    ForeColor(String),
    HiliteColor(String),
}

impl ParamCommand {
    /// Validate `value` for `kind`; `None` for values the command cannot use
    pub fn parse(kind: ParamKind, value: &str) -> Option<Self> {
        let value = value.trim();
        match kind {
            ParamKind::BlockStyle => BlockKind::from_tag(value).map(ParamCommand::FormatBlock),
            ParamKind::FontName => (!value.is_empty()).then(|| ParamCommand::FontName(value.to_string())),
            ParamKind::FontSize => value
                .parse::<u8>()
                .ok()
                .filter(|size| (1..=7).contains(size))
                .map(ParamCommand::FontSize),
            ParamKind::ForeColor => is_valid_color(value).then(|| ParamCommand::ForeColor(value.to_string())),
            ParamKind::HiliteColor => is_valid_color(value).then(|| ParamCommand::HiliteColor(value.to_string())),
        }
    }

    pub fn apply(&self, surface: &mut EditorSurface) {
        match self {
            ParamCommand::FormatBlock(kind) => surface.set_block_kind(*kind),
            ParamCommand::FontName(font) => surface.apply_style(|s| s.font = Some(font.clone())),
            ParamCommand::FontSize(size) => surface.apply_style(|s| s.size = Some(*size)),
            ParamCommand::ForeColor(color) => surface.apply_style(|s| s.color = Some(color.clone())),
            ParamCommand::HiliteColor(color) => surface.apply_style(|s| s.highlight = Some(color.clone())),
        }
    }
}

const COLOR_NAMES: &[&str] = &[
    "black", "white", "red", "green", "blue", "yellow", "orange", "purple", "pink", "brown", "gray",
    "grey", "cyan", "magenta", "lime", "navy", "teal", "maroon", "olive", "silver", "gold", "transparent",
];

/// `#rgb`, `#rrggbb` or a common CSS color name
pub fn is_valid_color(value: &str) -> bool {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    COLOR_NAMES.contains(&value.to_ascii_lowercase().as_str())
}

/// Trim the URL and prefix `https://` unless it already starts with
/// `http://`, `https://` or `mailto:` (case-insensitive). Empty input yields
/// `None`.
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:") {
        Some(url.to_string())
    } else {
        Some(format!("https://{}", url))
    }
}

/// Insert a hyperlink. With a caret the URL itself becomes the link text;
/// with a selection the selection is linked. Canceled or empty input does
/// nothing. Returns whether the content changed.
pub fn insert_link(surface: &mut EditorSurface, input: Option<&str>) -> bool {
    let Some(url) = input.and_then(normalize_url) else {
        return false;
    };
    if surface.is_collapsed() {
        let html = format!(
            "<a href=\"{}\" target=\"_blank\">{}</a>",
            escape_attr(&url),
            escape_text(&url)
        );
        surface.insert_html(&html);
    } else {
        surface.create_link(&url);
    }
    true
}

pub fn unlink(surface: &mut EditorSurface) {
    surface.unlink();
}

/// Insert an already-encoded image at the caret
pub fn insert_image(surface: &mut EditorSurface, data_uri: &str) -> ImageId {
    surface.insert_image(data_uri)
}

/// Encode bytes as a `data:` URI
pub fn encode_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Decode the payload of a base64 `data:` URI
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    BASE64.decode(payload.trim()).ok()
}

/// Read an image file fully and encode it as a data URI. Files whose type
/// is not an image are rejected.
pub fn read_image_as_data_uri(path: &Path) -> Result<String> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(Error::Image(format!("{} is not an image ({})", path.display(), mime)));
    }
    let bytes = std::fs::read(path)?;
    Ok(encode_data_uri(&bytes, mime.essence_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::{Position, Selection};
    use tempfile::tempdir;

    fn surface(markup: &str) -> EditorSurface {
        let mut s = EditorSurface::new();
        s.load_markup(markup);
        s
    }

    #[test]
    fn test_trigger_table_round_trips() {
        assert_eq!(FORMAT_TRIGGERS.len(), 11);
        for (name, command) in FORMAT_TRIGGERS {
            assert_eq!(FormatCommand::from_trigger(name), Some(*command));
            assert_eq!(command.trigger(), *name);
        }
        assert_eq!(FormatCommand::from_trigger("blink"), None);
    }

    #[test]
    fn test_format_commands_apply() {
        let mut s = surface("<p>text</p>");
        s.select_all();
        FormatCommand::Bold.apply(&mut s);
        FormatCommand::Strikethrough.apply(&mut s);
        FormatCommand::JustifyCenter.apply(&mut s);
        FormatCommand::OrderedList.apply(&mut s);
        assert_eq!(s.markup(), "<ol><li style=\"text-align: center;\"><b><strike>text</strike></b></li></ol>");

        FormatCommand::Outdent.apply(&mut s);
        FormatCommand::Indent.apply(&mut s);
        assert_eq!(s.document().blocks()[0].indent, 1);
        assert_eq!(s.document().blocks()[0].list, None);
    }

    #[test]
    fn test_param_commands_validate() {
        assert_eq!(ParamCommand::parse(ParamKind::BlockStyle, "h2"), Some(ParamCommand::FormatBlock(BlockKind::Heading(2))));
        assert_eq!(ParamCommand::parse(ParamKind::BlockStyle, "table"), None);
        assert_eq!(ParamCommand::parse(ParamKind::FontSize, "7"), Some(ParamCommand::FontSize(7)));
        assert_eq!(ParamCommand::parse(ParamKind::FontSize, "8"), None);
        assert_eq!(ParamCommand::parse(ParamKind::FontName, "  "), None);
        assert_eq!(ParamCommand::parse(ParamKind::ForeColor, "#ff"), None);
        assert_eq!(ParamCommand::parse(ParamKind::ForeColor, "#f00"), Some(ParamCommand::ForeColor("#f00".to_string())));
        assert_eq!(ParamCommand::parse(ParamKind::HiliteColor, "Yellow"), Some(ParamCommand::HiliteColor("Yellow".to_string())));
        assert!(ParamKind::ForeColor.is_live());
        assert!(!ParamKind::FontName.is_live());
    }

    #[test]
    fn test_param_commands_apply() {
        let mut s = surface("<p>word</p>");
        s.select_all();
        ParamCommand::FontName("Georgia".to_string()).apply(&mut s);
        ParamCommand::FontSize(5).apply(&mut s);
        ParamCommand::HiliteColor("#ffff00".to_string()).apply(&mut s);
        ParamCommand::FormatBlock(BlockKind::Heading(1)).apply(&mut s);
        assert_eq!(
            s.markup(),
            "<h1><font face=\"Georgia\" size=\"5\"><span style=\"background-color: #ffff00;\">word</span></font></h1>"
        );
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com").as_deref(), Some("https://example.com"));
        assert_eq!(normalize_url("HTTP://Example.com").as_deref(), Some("HTTP://Example.com"));
        assert_eq!(normalize_url("https://x.test").as_deref(), Some("https://x.test"));
        assert_eq!(normalize_url("mailto:me@x.test").as_deref(), Some("mailto:me@x.test"));
        assert_eq!(normalize_url("ftp://x.test").as_deref(), Some("https://ftp://x.test"));
        assert_eq!(normalize_url("   "), None);
    }

    #[test]
    fn test_link_with_caret_inserts_url_text() {
        let mut s = EditorSurface::new();
        assert!(insert_link(&mut s, Some("example.com")));
        assert_eq!(
            s.markup(),
            "<p><a href=\"https://example.com\" target=\"_blank\">https://example.com</a></p>"
        );
    }

    #[test]
    fn test_link_with_selection_wraps_it() {
        let mut s = surface("<p>see docs</p>");
        s.set_selection(Selection::new(Position::new(0, 4), Position::new(0, 8)));
        assert!(insert_link(&mut s, Some("docs.test")));
        assert_eq!(s.markup(), "<p>see <a href=\"https://docs.test\" target=\"_blank\">docs</a></p>");

        s.set_caret(Position::new(0, 6));
        unlink(&mut s);
        assert_eq!(s.markup(), "<p>see docs</p>");
    }

    #[test]
    fn test_link_canceled_or_empty_is_skipped() {
        let mut s = surface("<p>x</p>");
        assert!(!insert_link(&mut s, None));
        assert!(!insert_link(&mut s, Some("")));
        assert_eq!(s.markup(), "<p>x</p>");
    }

    #[test]
    fn test_data_uri_encoding() {
        let uri = encode_data_uri(&[0x89, b'P', b'N', b'G'], "image/png");
        assert_eq!(uri, "data:image/png;base64,iVBORw==");
        assert_eq!(decode_data_uri(&uri), Some(vec![0x89, b'P', b'N', b'G']));
        assert_eq!(decode_data_uri("https://x.test/a.png"), None);
    }

    #[test]
    fn test_read_image_file() {
        let dir = tempdir().unwrap();
        let png = dir.path().join("dot.png");
        std::fs::write(&png, [1u8, 2, 3]).unwrap();
        let uri = read_image_as_data_uri(&png).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "hi").unwrap();
        assert!(matches!(read_image_as_data_uri(&txt), Err(Error::Image(_))));

        let missing = dir.path().join("missing.jpg");
        assert!(matches!(read_image_as_data_uri(&missing), Err(Error::Io(_))));
    }

    #[test]
    fn test_insert_image_at_caret() {
        let mut s = surface("<p>ab</p>");
        s.set_caret(Position::new(0, 1));
        let id = insert_image(&mut s, "data:image/gif;base64,R0lG");
        assert!(s.contains_image(id));
        assert_eq!(s.markup(), "<p>a<img src=\"data:image/gif;base64,R0lG\">b</p>");
    }
}
