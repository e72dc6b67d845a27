use anyhow::{anyhow, Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pagenote_core::commands::{FormatCommand, ParamKind};
use pagenote_core::images::DEFAULT_MAX_MARGIN;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Keymap {
    pub quit: String,
    pub new_note: String,
    pub delete_note: String,
    pub focus_next: String,
    pub focus_prev: String,
    pub search: String,
    pub select_all: String,
    pub move_up: String,
    pub move_down: String,
    pub bold: String,
    pub italic: String,
    pub underline: String,
    pub strikethrough: String,
    pub unordered_list: String,
    pub ordered_list: String,
    pub align_left: String,
    pub align_center: String,
    pub align_right: String,
    pub outdent: String,
    pub indent: String,
    pub block_style: String,
    pub font_name: String,
    pub font_size: String,
    pub fore_color: String,
    pub hilite_color: String,
    pub link: String,
    pub unlink: String,
    pub insert_image: String,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            quit: "ctrl-q".to_string(),
            new_note: "ctrl-n".to_string(),
            delete_note: "ctrl-d".to_string(),
            focus_next: "tab".to_string(),
            focus_prev: "backtab".to_string(),
            search: "ctrl-f".to_string(),
            select_all: "ctrl-a".to_string(),
            move_up: "alt-up".to_string(),
            move_down: "alt-down".to_string(),
            bold: "alt-b".to_string(),
            italic: "alt-i".to_string(),
            underline: "alt-u".to_string(),
            strikethrough: "alt-s".to_string(),
            unordered_list: "alt-l".to_string(),
            ordered_list: "alt-o".to_string(),
            align_left: "alt-left".to_string(),
            align_center: "alt-c".to_string(),
            align_right: "alt-right".to_string(),
            outdent: "alt-[".to_string(),
            indent: "alt-]".to_string(),
            block_style: "alt-p".to_string(),
            font_name: "alt-f".to_string(),
            font_size: "alt-z".to_string(),
            fore_color: "alt-k".to_string(),
            hilite_color: "alt-h".to_string(),
            link: "ctrl-k".to_string(),
            unlink: "alt-x".to_string(),
            insert_image: "ctrl-o".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EditorConfig {
    /// Gap kept between a resized image and the right edge of the body, in px
    pub max_width_margin: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_width_margin: DEFAULT_MAX_MARGIN,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub keymap: Keymap,
    #[serde(default)]
    pub editor: EditorConfig,
}

/// Which input a prompt overlay is collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Link,
    ImagePath,
    Param(ParamKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    NewNote,
    DeleteNote,
    FocusNext,
    FocusPrev,
    Search,
    SelectAll,
    MoveUp,
    MoveDown,
    Format(FormatCommand),
    Prompt(PromptKind),
    Unlink,
}

/// A parsed binding such as `ctrl-n` or `alt-up`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }
        let mut modifiers = KeyModifiers::NONE;
        let mut rest = text.as_str();
        loop {
            if let Some(r) = rest.strip_prefix("ctrl-") {
                modifiers |= KeyModifiers::CONTROL;
                rest = r;
            } else if let Some(r) = rest.strip_prefix("alt-") {
                modifiers |= KeyModifiers::ALT;
                rest = r;
            } else if let Some(r) = rest.strip_prefix("shift-") {
                modifiers |= KeyModifiers::SHIFT;
                rest = r;
            } else {
                break;
            }
        }
        let code = match rest {
            "enter" => KeyCode::Enter,
            "esc" => KeyCode::Esc,
            "tab" if modifiers.contains(KeyModifiers::SHIFT) => {
                modifiers.remove(KeyModifiers::SHIFT);
                KeyCode::BackTab
            }
            "tab" => KeyCode::Tab,
            "backtab" => KeyCode::BackTab,
            "backspace" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "insert" => KeyCode::Insert,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" => KeyCode::PageUp,
            "pagedown" => KeyCode::PageDown,
            "space" => KeyCode::Char(' '),
            f if f.len() > 1 && f.starts_with('f') => KeyCode::F(f[1..].parse().ok()?),
            c => {
                let mut chars = c.chars();
                let ch = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                KeyCode::Char(ch)
            }
        };
        Some(Self { code, modifiers })
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        match (self.code, key.code) {
            (KeyCode::Char(want), KeyCode::Char(got)) => {
                let shift = key.modifiers.contains(KeyModifiers::SHIFT) || got.is_uppercase();
                let mods = key.modifiers - KeyModifiers::SHIFT;
                want == got.to_ascii_lowercase()
                    && mods == self.modifiers - KeyModifiers::SHIFT
                    && shift == self.modifiers.contains(KeyModifiers::SHIFT)
            }
            (KeyCode::BackTab, KeyCode::BackTab) => {
                key.modifiers - KeyModifiers::SHIFT == self.modifiers
            }
            (want, got) => want == got && key.modifiers == self.modifiers,
        }
    }
}

impl Keymap {
    /// Resolve every binding; an unparseable entry is an error naming it
    pub fn resolve(&self) -> Result<Vec<(KeyBinding, Action)>> {
        let entries: [(&str, &String, Action); 28] = [
            ("quit", &self.quit, Action::Quit),
            ("new_note", &self.new_note, Action::NewNote),
            ("delete_note", &self.delete_note, Action::DeleteNote),
            ("focus_next", &self.focus_next, Action::FocusNext),
            ("focus_prev", &self.focus_prev, Action::FocusPrev),
            ("search", &self.search, Action::Search),
            ("select_all", &self.select_all, Action::SelectAll),
            ("move_up", &self.move_up, Action::MoveUp),
            ("move_down", &self.move_down, Action::MoveDown),
            ("bold", &self.bold, Action::Format(FormatCommand::Bold)),
            ("italic", &self.italic, Action::Format(FormatCommand::Italic)),
            ("underline", &self.underline, Action::Format(FormatCommand::Underline)),
            ("strikethrough", &self.strikethrough, Action::Format(FormatCommand::Strikethrough)),
            ("unordered_list", &self.unordered_list, Action::Format(FormatCommand::UnorderedList)),
            ("ordered_list", &self.ordered_list, Action::Format(FormatCommand::OrderedList)),
            ("align_left", &self.align_left, Action::Format(FormatCommand::JustifyLeft)),
            ("align_center", &self.align_center, Action::Format(FormatCommand::JustifyCenter)),
            ("align_right", &self.align_right, Action::Format(FormatCommand::JustifyRight)),
            ("outdent", &self.outdent, Action::Format(FormatCommand::Outdent)),
            ("indent", &self.indent, Action::Format(FormatCommand::Indent)),
            ("block_style", &self.block_style, Action::Prompt(PromptKind::Param(ParamKind::BlockStyle))),
            ("font_name", &self.font_name, Action::Prompt(PromptKind::Param(ParamKind::FontName))),
            ("font_size", &self.font_size, Action::Prompt(PromptKind::Param(ParamKind::FontSize))),
            ("fore_color", &self.fore_color, Action::Prompt(PromptKind::Param(ParamKind::ForeColor))),
            ("hilite_color", &self.hilite_color, Action::Prompt(PromptKind::Param(ParamKind::HiliteColor))),
            ("link", &self.link, Action::Prompt(PromptKind::Link)),
            ("unlink", &self.unlink, Action::Unlink),
            ("insert_image", &self.insert_image, Action::Prompt(PromptKind::ImagePath)),
        ];
        entries
            .into_iter()
            .map(|(name, text, action)| {
                KeyBinding::parse(text)
                    .map(|binding| (binding, action))
                    .ok_or_else(|| anyhow!("invalid key binding for {}: {:?}", name, text))
            })
            .collect()
    }
}

/// Read the config file, writing the defaults first if it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::default();
        let toml = toml::to_string(&config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("failed to write default config to {}", path.display()))?;
        log::info!("Wrote default config to {}", path.display());
        return Ok(config);
    }

    let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    config.keymap.resolve()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_parse_bindings() {
        let b = KeyBinding::parse("ctrl-n").unwrap();
        assert_eq!(b.code, KeyCode::Char('n'));
        assert_eq!(b.modifiers, KeyModifiers::CONTROL);

        let b = KeyBinding::parse("alt-up").unwrap();
        assert_eq!(b.code, KeyCode::Up);
        assert_eq!(b.modifiers, KeyModifiers::ALT);

        assert_eq!(KeyBinding::parse("shift-tab").unwrap().code, KeyCode::BackTab);
        assert_eq!(KeyBinding::parse("F5").unwrap().code, KeyCode::F(5));
        assert_eq!(KeyBinding::parse("alt-]").unwrap().code, KeyCode::Char(']'));
        assert!(KeyBinding::parse("").is_none());
        assert!(KeyBinding::parse("ctrl-nope").is_none());
    }

    #[test]
    fn test_binding_matches_events() {
        let bold = KeyBinding::parse("alt-b").unwrap();
        assert!(bold.matches(&key(KeyCode::Char('b'), KeyModifiers::ALT)));
        assert!(!bold.matches(&key(KeyCode::Char('b'), KeyModifiers::NONE)));
        assert!(!bold.matches(&key(KeyCode::Char('B'), KeyModifiers::ALT | KeyModifiers::SHIFT)));

        let shifted = KeyBinding::parse("ctrl-shift-t").unwrap();
        assert!(shifted.matches(&key(KeyCode::Char('T'), KeyModifiers::CONTROL | KeyModifiers::SHIFT)));

        let backtab = KeyBinding::parse("backtab").unwrap();
        assert!(backtab.matches(&key(KeyCode::BackTab, KeyModifiers::SHIFT)));
    }

    #[test]
    fn test_default_keymap_resolves() {
        let bindings = Keymap::default().resolve().unwrap();
        assert_eq!(bindings.len(), 28);
        let bold = bindings
            .iter()
            .find(|(_, action)| *action == Action::Format(FormatCommand::Bold))
            .unwrap();
        assert!(bold.0.matches(&key(KeyCode::Char('b'), KeyModifiers::ALT)));
    }

    #[test]
    fn test_load_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = load_config(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.editor.max_width_margin, 20);

        let reread = load_config(&path).unwrap();
        assert_eq!(reread.keymap.quit, "ctrl-q");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[keymap]\nbold = \"ctrl-b\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.keymap.bold, "ctrl-b");
        assert_eq!(config.keymap.italic, "alt-i");
        assert_eq!(config.editor.max_width_margin, 20);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[keymap\nquit = ").unwrap();
        assert!(load_config(&path).is_err());

        fs::write(&path, "[keymap]\nquit = \"ctrl-\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
