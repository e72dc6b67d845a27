//! HTML-subset markup: the persisted form of a note's content.
//!
//! Parsing goes through the `html5ever` tokenizer and is forgiving: unknown
//! tags are transparent and content without any tag is read as plain text,
//! one paragraph per line.

use super::edit::MAX_INDENT;
use super::model::{Align, Block, BlockKind, Document, Image, ImageId, Inline, InlineStyle, ListKind};
use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use std::cell::RefCell;

/// Horizontal margin per indent level, in px
pub const INDENT_PX: u32 = 40;

// ── Serialization: Document → HTML ─────────────────────────────────

/// Serialize a document. A blank document serializes to the empty string.
pub fn to_markup(doc: &Document) -> String {
    if doc.is_blank() {
        return String::new();
    }

    let mut out = String::new();
    let mut open_list: Option<ListKind> = None;
    for block in doc.blocks() {
        if block.list != open_list {
            if let Some(kind) = open_list {
                out.push_str(list_close(kind));
            }
            if let Some(kind) = block.list {
                out.push_str(list_open(kind));
            }
            open_list = block.list;
        }
        write_block(&mut out, block);
    }
    if let Some(kind) = open_list {
        out.push_str(list_close(kind));
    }
    out
}

fn list_open(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Unordered => "<ul>",
        ListKind::Ordered => "<ol>",
    }
}

fn list_close(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Unordered => "</ul>",
        ListKind::Ordered => "</ol>",
    }
}

fn block_style(block: &Block) -> String {
    let mut style = String::new();
    match block.align {
        Align::Left => {}
        Align::Center => style.push_str("text-align: center;"),
        Align::Right => style.push_str("text-align: right;"),
    }
    if block.indent > 0 {
        if !style.is_empty() {
            style.push(' ');
        }
        style.push_str(&format!("margin-left: {}px;", block.indent as u32 * INDENT_PX));
    }
    if style.is_empty() {
        style
    } else {
        format!(" style=\"{}\"", style)
    }
}

fn write_block(out: &mut String, block: &Block) {
    let tag = block.kind.tag();
    let style = block_style(block);
    if block.list.is_some() {
        out.push_str(&format!("<li{}>", style));
        if block.kind != BlockKind::Paragraph {
            out.push_str(&format!("<{}>", tag));
        }
    } else {
        out.push_str(&format!("<{}{}>", tag, style));
    }

    if block.inlines.is_empty() {
        out.push_str("<br>");
    }
    for inline in &block.inlines {
        match inline {
            Inline::Text(run) => write_run(out, &run.text, &run.style),
            Inline::Image(image) => write_image(out, image),
        }
    }

    if block.list.is_some() {
        if block.kind != BlockKind::Paragraph {
            out.push_str(&format!("</{}>", tag));
        }
        out.push_str("</li>");
    } else {
        out.push_str(&format!("</{}>", tag));
    }
}

fn write_run(out: &mut String, text: &str, style: &InlineStyle) {
    let mut closers: Vec<&str> = Vec::new();
    if let Some(href) = &style.link {
        out.push_str(&format!("<a href=\"{}\" target=\"_blank\">", escape_attr(href)));
        closers.push("</a>");
    }
    if style.font.is_some() || style.size.is_some() || style.color.is_some() {
        out.push_str("<font");
        if let Some(face) = &style.font {
            out.push_str(&format!(" face=\"{}\"", escape_attr(face)));
        }
        if let Some(size) = style.size {
            out.push_str(&format!(" size=\"{}\"", size));
        }
        if let Some(color) = &style.color {
            out.push_str(&format!(" color=\"{}\"", escape_attr(color)));
        }
        out.push('>');
        closers.push("</font>");
    }
    if let Some(highlight) = &style.highlight {
        out.push_str(&format!(
            "<span style=\"background-color: {};\">",
            escape_attr(highlight)
        ));
        closers.push("</span>");
    }
    for (on, open, close) in [
        (style.bold, "<b>", "</b>"),
        (style.italic, "<i>", "</i>"),
        (style.underline, "<u>", "</u>"),
        (style.strikethrough, "<strike>", "</strike>"),
    ] {
        if on {
            out.push_str(open);
            closers.push(close);
        }
    }
    out.push_str(&escape_text(text));
    for close in closers.iter().rev() {
        out.push_str(close);
    }
}

fn write_image(out: &mut String, image: &Image) {
    out.push_str(&format!("<img src=\"{}\"", escape_attr(&image.src)));
    if let Some(width) = image.width {
        out.push_str(&format!(" style=\"width: {}px; height: auto;\"", width));
    }
    out.push('>');
}

pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

// ── Deserialization: HTML → Document ───────────────────────────────

struct HtmlSink {
    tokens: RefCell<Vec<HtmlToken>>,
}

#[derive(Debug)]
enum HtmlToken {
    StartTag(String, Vec<(String, String)>, bool),
    EndTag(String),
    Text(String),
}

impl TokenSink for HtmlSink {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => {
                let name = tag.name.to_string();
                let attrs: Vec<(String, String)> = tag
                    .attrs
                    .iter()
                    .map(|a| (a.name.local.to_string(), a.value.to_string()))
                    .collect();
                match tag.kind {
                    TagKind::StartTag => self
                        .tokens
                        .borrow_mut()
                        .push(HtmlToken::StartTag(name, attrs, tag.self_closing)),
                    TagKind::EndTag => self.tokens.borrow_mut().push(HtmlToken::EndTag(name)),
                }
            }
            Token::CharacterTokens(s) => {
                self.tokens.borrow_mut().push(HtmlToken::Text(s.to_string()));
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

fn tokenize(html: &str) -> Vec<HtmlToken> {
    let sink = HtmlSink {
        tokens: RefCell::new(Vec::new()),
    };
    let tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
    let mut queue = BufferQueue::default();
    queue.push_back(StrTendril::from(html));
    let _ = tokenizer.feed(&mut queue);
    tokenizer.end();
    tokenizer.sink.tokens.into_inner()
}

/// Parse markup into a document
pub fn parse(markup: &str) -> Document {
    if !markup.contains('<') {
        return parse_plain_text(markup);
    }

    let mut parser = Parser::default();
    for token in tokenize(markup) {
        match token {
            HtmlToken::StartTag(name, attrs, self_closing) => parser.start_tag(&name, &attrs, self_closing),
            HtmlToken::EndTag(name) => parser.end_tag(&name),
            HtmlToken::Text(text) => parser.text(&text),
        }
    }
    parser.finish()
}

fn parse_plain_text(text: &str) -> Document {
    if text.is_empty() {
        return Document::new();
    }
    let blocks = text
        .lines()
        .map(|line| {
            let mut block = Block::default();
            if !line.is_empty() {
                block.inlines.push(Inline::text(line, InlineStyle::default()));
            }
            block
        })
        .collect();
    Document::from_blocks(blocks)
}

fn parse_style_attr(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            Some((key.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

fn parse_px(value: &str) -> Option<u32> {
    let number = value.trim().trim_end_matches("px").trim();
    number.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v.round() as u32)
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

const VOID_TAGS: &[&str] = &["area", "base", "col", "embed", "hr", "input", "link", "meta", "source", "wbr"];

#[derive(Default)]
struct Parser {
    blocks: Vec<Block>,
    current: Option<Block>,
    /// The current block was started by a line break rather than a tag
    current_from_break: bool,
    style_stack: Vec<(String, InlineStyle)>,
    list_stack: Vec<ListKind>,
    quote_depth: usize,
    pre_depth: usize,
}

impl Parser {
    fn style(&self) -> InlineStyle {
        self.style_stack
            .last()
            .map(|(_, style)| style.clone())
            .unwrap_or_default()
    }

    fn context_kind(&self) -> BlockKind {
        if self.pre_depth > 0 {
            BlockKind::Preformatted
        } else if self.quote_depth > 0 {
            BlockKind::Quote
        } else {
            BlockKind::Paragraph
        }
    }

    fn flush(&mut self, keep_empty: bool) {
        if let Some(mut block) = self.current.take() {
            block.normalize();
            if keep_empty || !block.inlines.is_empty() {
                self.blocks.push(block);
            }
        }
        self.current_from_break = false;
    }

    /// End of a block element. A trailing line break does not leave an
    /// extra empty block behind.
    fn close_block(&mut self) {
        if self.current_from_break && self.current.as_ref().is_some_and(|b| b.inlines.is_empty()) {
            self.current = None;
        }
        self.flush(true);
    }

    fn current_block(&mut self) -> &mut Block {
        let kind = self.context_kind();
        let list = self.list_stack.last().copied();
        self.current.get_or_insert_with(|| {
            let mut block = Block::new(kind);
            block.list = list;
            block
        })
    }

    fn open_block(&mut self, kind: Option<BlockKind>, attrs: &[(String, String)], list_item: bool) {
        let reuse = matches!(&self.current, Some(b) if b.inlines.is_empty() && !self.current_from_break);
        if !reuse {
            self.flush(false);
        }
        let context = self.context_kind();
        let list = self.list_stack.last().copied();
        let block = self.current_block();
        if let Some(kind) = kind {
            block.kind = kind;
        } else if block.kind == BlockKind::Paragraph {
            block.kind = context;
        }
        if list_item {
            block.list = list;
        }
        if let Some(style) = attr(attrs, "style") {
            for (key, value) in parse_style_attr(style) {
                match key.as_str() {
                    "text-align" => {
                        block.align = match value.to_ascii_lowercase().as_str() {
                            "center" => Align::Center,
                            "right" | "end" => Align::Right,
                            _ => Align::Left,
                        }
                    }
                    "margin-left" | "padding-left" => {
                        if let Some(px) = parse_px(&value) {
                            block.indent = (px / INDENT_PX).min(MAX_INDENT as u32) as u8;
                        }
                    }
                    _ => {}
                }
            }
        }
        if let Some(align) = attr(attrs, "align") {
            block.align = match align.to_ascii_lowercase().as_str() {
                "center" => Align::Center,
                "right" => Align::Right,
                _ => Align::Left,
            };
        }
    }

    fn line_break(&mut self) {
        match &self.current {
            Some(block) if !block.inlines.is_empty() || self.current_from_break => {
                let sibling = block.sibling();
                self.flush(true);
                self.current = Some(sibling);
                self.current_from_break = true;
            }
            _ => {}
        }
    }

    fn push_style(&mut self, name: &str, attrs: &[(String, String)]) {
        let mut style = self.style();
        match name {
            "b" | "strong" => style.bold = true,
            "i" | "em" => style.italic = true,
            "u" | "ins" => style.underline = true,
            "s" | "strike" | "del" => style.strikethrough = true,
            "a" => {
                if let Some(href) = attr(attrs, "href") {
                    style.link = Some(href.to_string());
                }
            }
            "font" => {
                if let Some(face) = attr(attrs, "face") {
                    style.font = Some(face.to_string());
                }
                if let Some(size) = attr(attrs, "size").and_then(|s| s.trim().parse::<u8>().ok()) {
                    style.size = Some(size.clamp(1, 7));
                }
                if let Some(color) = attr(attrs, "color") {
                    style.color = Some(color.to_string());
                }
            }
            _ => {}
        }
        if let Some(css) = attr(attrs, "style") {
            for (key, value) in parse_style_attr(css) {
                match key.as_str() {
                    "background-color" | "background" => style.highlight = Some(value),
                    "color" => style.color = Some(value),
                    "font-family" => style.font = Some(value),
                    "font-weight" => style.bold = value == "bold" || value.parse::<u32>().is_ok_and(|w| w >= 600),
                    "font-style" => style.italic = value == "italic",
                    "text-decoration" | "text-decoration-line" => {
                        style.underline |= value.contains("underline");
                        style.strikethrough |= value.contains("line-through");
                    }
                    _ => {}
                }
            }
        }
        self.style_stack.push((name.to_string(), style));
    }

    fn pop_style(&mut self, name: &str) {
        if let Some(index) = self.style_stack.iter().rposition(|(tag, _)| tag == name) {
            self.style_stack.truncate(index);
        }
    }

    fn image(&mut self, attrs: &[(String, String)]) {
        let Some(src) = attr(attrs, "src") else {
            return;
        };
        let mut width = attr(attrs, "width").and_then(parse_px);
        if let Some(style) = attr(attrs, "style") {
            for (key, value) in parse_style_attr(style) {
                if key == "width" {
                    width = parse_px(&value).or(width);
                }
            }
        }
        let image = Image {
            id: ImageId(0),
            src: src.to_string(),
            width,
        };
        self.current_block().inlines.push(Inline::Image(image));
        self.current_from_break = false;
    }

    fn start_tag(&mut self, name: &str, attrs: &[(String, String)], self_closing: bool) {
        match name {
            "p" | "div" => self.open_block(None, attrs, false),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.open_block(BlockKind::from_tag(name), attrs, false)
            }
            "pre" => {
                self.pre_depth += 1;
                self.open_block(Some(BlockKind::Preformatted), attrs, false)
            }
            "blockquote" => {
                self.quote_depth += 1;
                self.open_block(Some(BlockKind::Quote), attrs, false)
            }
            "li" => self.open_block(None, attrs, true),
            "ul" | "ol" => {
                self.flush(false);
                self.list_stack.push(if name == "ul" { ListKind::Unordered } else { ListKind::Ordered });
            }
            "br" => self.line_break(),
            "img" => self.image(attrs),
            _ if VOID_TAGS.contains(&name) || self_closing => {}
            _ => self.push_style(name, attrs),
        }
    }

    fn end_tag(&mut self, name: &str) {
        match name {
            "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" => self.close_block(),
            "pre" => {
                self.close_block();
                self.pre_depth = self.pre_depth.saturating_sub(1);
            }
            "blockquote" => {
                self.close_block();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            "ul" | "ol" => {
                self.flush(false);
                self.list_stack.pop();
            }
            _ => self.pop_style(name),
        }
    }

    fn text(&mut self, text: &str) {
        if self.current.is_none() && text.trim().is_empty() {
            return;
        }
        if self.pre_depth > 0 {
            let mut lines = text.split('\n').peekable();
            while let Some(line) = lines.next() {
                let style = self.style();
                self.current_block().inlines.push(Inline::text(line, style));
                if lines.peek().is_some() {
                    self.line_break_forced();
                }
            }
        } else {
            let collapsed = text.replace(['\n', '\r', '\t'], " ");
            let style = self.style();
            self.current_block().inlines.push(Inline::text(collapsed, style));
        }
        self.current_from_break = false;
    }

    fn line_break_forced(&mut self) {
        let sibling = self.current_block().sibling();
        self.flush(true);
        self.current = Some(sibling);
        self.current_from_break = true;
    }

    fn finish(mut self) -> Document {
        self.flush(false);
        Document::from_blocks(self.blocks)
    }
}
