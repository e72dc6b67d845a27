use crate::config::{load_config, Action, Config, KeyBinding, PromptKind};
use crate::loader::ImageLoader;
use crate::ui::body::{handle_cell, BodyGeometry, BodyLayout, ImageDimensions, CELL_WIDTH_PX};
use anyhow::Result;
use crossterm::event::KeyEvent;
use pagenote_core::commands::{FormatCommand, ParamCommand};
use pagenote_core::images::{ClickTarget, FocusTarget};
use pagenote_core::list::ListEntry;
use pagenote_core::models::NoteId;
use pagenote_core::richtext::EditorSurface;
use pagenote_core::storage::FileStore;
use pagenote_core::Session;
use ratatui::layout::Rect;
use std::path::{Path, PathBuf};

/// Body width assumed before the first frame is drawn
const DEFAULT_BODY_WIDTH: u16 = 80;
const SCROLL_STEP: usize = 3;

/// A one-line input overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
}

impl Prompt {
    pub fn label(&self) -> &'static str {
        match self.kind {
            PromptKind::Link => "Enter URL",
            PromptKind::ImagePath => "Image file",
            PromptKind::Param(kind) => kind.label(),
        }
    }
}

/// Application state
pub struct App {
    pub should_quit: bool,
    pub session: Session<FileStore>,
    pub config: Config,
    bindings: Vec<(KeyBinding, Action)>,
    pub focus: FocusTarget,
    pub title_cursor: usize,
    pub prompt: Option<Prompt>,
    pub confirm_delete: Option<NoteId>,
    pub status: Option<String>,
    pub body_scroll: usize,
    pub dims: ImageDimensions,
    loader: ImageLoader,
    // Screen regions recorded while drawing, for mouse hit-testing
    pub search_area: Rect,
    pub title_area: Rect,
    pub body_area: Rect,
    pub list_locations: Vec<(Rect, Rect, NoteId)>,
    selecting: bool,
}

impl App {
    /// Open the store and config inside `data_dir`
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = load_config(&data_dir.join("config.toml"))?;
        let bindings = config.keymap.resolve()?;
        let store = FileStore::new(data_dir);
        let session = Session::open(store, config.editor.max_width_margin)?;
        log::info!("Opened {} notes from {}", session.notes().len(), data_dir.display());

        let mut app = Self {
            should_quit: false,
            session,
            config,
            bindings,
            focus: FocusTarget::Body,
            title_cursor: 0,
            prompt: None,
            confirm_delete: None,
            status: None,
            body_scroll: 0,
            dims: ImageDimensions::default(),
            loader: ImageLoader::spawn(),
            search_area: Rect::default(),
            title_area: Rect::default(),
            body_area: Rect::default(),
            list_locations: Vec::new(),
            selecting: false,
        };
        app.note_loaded();
        Ok(app)
    }

    pub fn action_for(&self, key: &KeyEvent) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(binding, _)| binding.matches(key))
            .map(|(_, action)| *action)
    }

    pub fn entries(&self) -> Vec<ListEntry> {
        self.session.entries()
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Poll background work and surface storage warnings
    pub fn tick(&mut self) {
        for result in self.loader.poll() {
            match result.outcome {
                Ok(loaded) => {
                    self.dims.insert(&loaded.data_uri, loaded.dimensions);
                    if self.session.insert_image(&loaded.data_uri).is_some() {
                        self.status = Some(format!("Inserted {}", result.path.display()));
                    }
                }
                Err(message) => {
                    log::warn!("{}", message);
                    self.status = Some(message);
                }
            }
        }
        self.after_edit();
    }

    /// Deliver content mutations to the image controller, pick up new image
    /// dimensions and show any storage warning
    pub fn after_edit(&mut self) {
        self.dims.refresh(self.session.surface().document());
        let geometry = BodyGeometry::new(self.body_width(), self.body_scroll, &self.dims);
        self.session.process_mutations(&geometry);
        if let Some(warning) = self.session.take_warnings().pop() {
            self.status = Some(warning);
        }
    }

    // =========================
    // Focus and note list
    // =========================

    pub fn set_focus(&mut self, target: FocusTarget) {
        self.focus = target;
        self.session.focus_changed(target);
        if target == FocusTarget::Title {
            self.title_cursor = self.session.title().chars().count();
        }
    }

    pub fn focus_next(&mut self) {
        let next = match self.focus {
            FocusTarget::Search => FocusTarget::List,
            FocusTarget::List => FocusTarget::Title,
            FocusTarget::Title => FocusTarget::Body,
            FocusTarget::Body => FocusTarget::Search,
        };
        self.set_focus(next);
    }

    pub fn focus_prev(&mut self) {
        let prev = match self.focus {
            FocusTarget::Search => FocusTarget::Body,
            FocusTarget::List => FocusTarget::Search,
            FocusTarget::Title => FocusTarget::List,
            FocusTarget::Body => FocusTarget::Title,
        };
        self.set_focus(prev);
    }

    fn note_loaded(&mut self) {
        self.body_scroll = 0;
        self.title_cursor = self.session.title().chars().count();
        self.dims.refresh(self.session.surface().document());
    }

    pub fn activate(&mut self, id: NoteId) {
        if self.session.active_id() != Some(id) && self.session.set_active(id) {
            self.note_loaded();
        }
    }

    pub fn create_note(&mut self) {
        self.session.create_note();
        self.note_loaded();
        self.set_focus(FocusTarget::Title);
        self.after_edit();
    }

    /// Ask for confirmation before deleting `id`
    pub fn request_delete(&mut self, id: NoteId) {
        self.confirm_delete = Some(id);
    }

    pub fn confirm_delete(&mut self) {
        if let Some(id) = self.confirm_delete.take() {
            let previous = self.session.active_id();
            if self.session.delete_note(id) && self.session.active_id() != previous {
                self.note_loaded();
            }
            self.after_edit();
        }
    }

    pub fn cancel_delete(&mut self) {
        self.confirm_delete = None;
    }

    /// Index of the active note among the visible entries
    fn active_entry(&self, entries: &[ListEntry]) -> Option<usize> {
        entries.iter().position(|e| e.active)
    }

    /// Activate the visible entry `delta` rows away from the active one
    pub fn list_step(&mut self, delta: isize) {
        let entries = self.entries();
        if entries.is_empty() {
            return;
        }
        let target = match self.active_entry(&entries) {
            Some(current) => (current as isize + delta).clamp(0, entries.len() as isize - 1) as usize,
            None => 0,
        };
        self.activate(entries[target].id);
    }

    /// Keyboard reorder of the active note past its visible neighbour
    pub fn move_active(&mut self, delta: isize) {
        let entries = self.entries();
        let Some(current) = self.active_entry(&entries) else {
            return;
        };
        let target = current as isize + delta;
        if target < 0 || target >= entries.len() as isize {
            return;
        }
        self.session.reorder(entries[current].id, entries[target as usize].id);
        self.after_edit();
    }

    pub fn search_input(&mut self, ch: char) {
        let mut query = self.session.query().to_string();
        query.push(ch);
        self.session.set_query(&query);
    }

    pub fn search_backspace(&mut self) {
        let mut query = self.session.query().to_string();
        query.pop();
        self.session.set_query(&query);
    }

    // =========================
    // Title field
    // =========================

    pub fn title_insert(&mut self, ch: char) {
        let mut title: Vec<char> = self.session.title().chars().collect();
        let at = self.title_cursor.min(title.len());
        title.insert(at, ch);
        self.title_cursor = at + 1;
        self.session.set_title(&title.into_iter().collect::<String>());
        self.after_edit();
    }

    pub fn title_backspace(&mut self) {
        let mut title: Vec<char> = self.session.title().chars().collect();
        let at = self.title_cursor.min(title.len());
        if at == 0 {
            return;
        }
        title.remove(at - 1);
        self.title_cursor = at - 1;
        self.session.set_title(&title.into_iter().collect::<String>());
        self.after_edit();
    }

    pub fn title_move(&mut self, delta: isize) {
        let len = self.session.title().chars().count() as isize;
        self.title_cursor = (self.title_cursor as isize + delta).clamp(0, len) as usize;
    }

    // =========================
    // Body editing
    // =========================

    pub fn body_width(&self) -> u16 {
        if self.body_area.width == 0 {
            DEFAULT_BODY_WIDTH
        } else {
            self.body_area.width
        }
    }

    pub fn layout(&self) -> BodyLayout {
        BodyLayout::compute(self.session.surface().document(), self.body_width(), &self.dims)
    }

    /// Apply a content edit, persist it and keep the caret in view
    pub fn edit_body(&mut self, edit: impl FnOnce(&mut EditorSurface)) {
        self.session.edit_content(edit);
        self.after_edit();
        self.scroll_to_caret();
    }

    pub fn move_caret(&mut self, motion: impl FnOnce(&mut EditorSurface)) {
        motion(self.session.surface_mut());
        self.scroll_to_caret();
    }

    /// Move the caret one row up or down, keeping its column
    pub fn move_caret_vertical(&mut self, delta: isize, extend: bool) {
        let layout = self.layout();
        let Some((row, col)) = layout.cell_of(self.session.surface().caret()) else {
            return;
        };
        let target = row as isize + delta;
        if target < 0 || target >= layout.height() as isize {
            return;
        }
        if let Some(hit) = layout.hit(target as usize, col) {
            let surface = self.session.surface_mut();
            if extend {
                surface.extend_to(hit.position);
            } else {
                surface.set_caret(hit.position);
            }
        }
        self.scroll_to_caret();
    }

    pub fn format(&mut self, command: FormatCommand) {
        self.session.format(command);
        self.after_edit();
    }

    pub fn unlink(&mut self) {
        self.session.unlink();
        self.after_edit();
    }

    /// Delete/Backspace; removes the selected image unless typed into a
    /// text field. Returns true when an image was removed.
    pub fn delete_selected_image(&mut self) -> bool {
        let in_text_input = matches!(self.focus, FocusTarget::Title | FocusTarget::Search);
        let removed = self.session.delete_selected_image(in_text_input);
        if removed {
            self.after_edit();
        }
        removed
    }

    pub fn scroll_body(&mut self, delta: isize) {
        let max = self.layout().height().saturating_sub(1);
        let scroll = (self.body_scroll as isize + delta).clamp(0, max as isize) as usize;
        self.set_scroll(scroll);
    }

    pub fn scroll_by_step(&mut self, down: bool) {
        let step = SCROLL_STEP as isize;
        self.scroll_body(if down { step } else { -step });
    }

    fn set_scroll(&mut self, scroll: usize) {
        if scroll != self.body_scroll {
            self.body_scroll = scroll;
            self.reposition_handle();
        }
    }

    fn scroll_to_caret(&mut self) {
        let visible = self.body_area.height as usize;
        if visible == 0 {
            return;
        }
        let Some((row, _)) = self.layout().cell_of(self.session.surface().caret()) else {
            return;
        };
        if row < self.body_scroll {
            self.set_scroll(row);
        } else if row >= self.body_scroll + visible {
            self.set_scroll(row + 1 - visible);
        }
    }

    /// Record the body's screen area; a size change re-positions the handle
    pub fn set_body_area(&mut self, area: Rect) {
        if area != self.body_area {
            self.body_area = area;
            self.body_scroll = self.body_scroll.min(self.layout().height().saturating_sub(1));
            self.reposition_handle();
        }
    }

    fn reposition_handle(&mut self) {
        let geometry = BodyGeometry::new(self.body_width(), self.body_scroll, &self.dims);
        self.session.viewport_changed(&geometry);
    }

    /// Screen cell to (row, col) inside the body content, if inside it
    fn body_cell(&self, column: u16, row: u16) -> Option<(u16, u16)> {
        let area = self.body_area;
        in_rect(&area, column, row).then(|| (row - area.y, column - area.x))
    }

    /// Mouse button pressed inside the body
    pub fn body_press(&mut self, column: u16, row: u16) -> bool {
        let Some((row, col)) = self.body_cell(column, row) else {
            return false;
        };
        self.set_focus(FocusTarget::Body);
        let x = col as i32 * CELL_WIDTH_PX as i32;

        if self.on_handle(row, col) {
            let geometry = BodyGeometry::new(self.body_width(), self.body_scroll, &self.dims);
            if self.session.press_resize_handle(x, &geometry) {
                return true;
            }
        }

        let layout = self.layout();
        let Some(hit) = layout.hit(self.body_scroll + row as usize, col) else {
            return true;
        };
        self.session.surface_mut().set_caret(hit.position);
        let target = hit.image.map_or(ClickTarget::Other, ClickTarget::Image);
        let geometry = BodyGeometry::new(self.body_width(), self.body_scroll, &self.dims);
        self.session.click_body(target, &geometry);
        if let Some(href) = hit.link {
            if let Err(err) = opener::open(&href) {
                log::warn!("Could not open {}: {}", href, err);
                self.status = Some(format!("Could not open {}", href));
            }
        }
        self.selecting = hit.image.is_none();
        true
    }

    fn on_handle(&self, row: u16, col: u16) -> bool {
        let Some(handle) = self.session.images().handle() else {
            return false;
        };
        let (handle_row, handle_col) = handle_cell(handle);
        if handle_row == row as i32 && handle_col == col as i32 {
            return true;
        }
        // The box's bottom-right cell also grabs the handle
        let Some(id) = self.session.images().selected() else {
            return false;
        };
        let layout = self.layout();
        layout.image_box(id).is_some_and(|image| {
            let bottom = image.row + image.height as usize;
            let right = image.col + image.width;
            self.body_scroll + row as usize + 1 == bottom && col + 1 == right
        })
    }

    /// Pointer dragged with the button held
    pub fn body_drag(&mut self, column: u16, row: u16) {
        if self.session.images().is_resizing() {
            let col = column.saturating_sub(self.body_area.x);
            let x = col as i32 * CELL_WIDTH_PX as i32;
            let geometry = BodyGeometry::new(self.body_width(), self.body_scroll, &self.dims);
            self.session.drag_resize(x, &geometry);
        }
        if !self.selecting || self.session.images().pointer_style().text_selection_suspended {
            return;
        }
        if let Some((row, col)) = self.body_cell(column, row) {
            if let Some(hit) = self.layout().hit(self.body_scroll + row as usize, col) {
                self.session.surface_mut().extend_to(hit.position);
            }
        }
    }

    /// Pointer released anywhere
    pub fn pointer_release(&mut self) {
        self.selecting = false;
        if self.session.release_pointer() {
            self.after_edit();
        }
    }

    // =========================
    // List mouse handling
    // =========================

    /// Returns the entry under a screen cell and whether its delete
    /// affordance was hit
    pub fn list_hit(&self, column: u16, row: u16) -> Option<(NoteId, bool)> {
        self.list_locations
            .iter()
            .find(|(entry, _, _)| in_rect(entry, column, row))
            .map(|(_, delete, id)| (*id, in_rect(delete, column, row)))
    }

    pub fn list_press(&mut self, column: u16, row: u16) -> bool {
        let Some((id, on_delete)) = self.list_hit(column, row) else {
            return false;
        };
        self.set_focus(FocusTarget::List);
        if on_delete {
            self.request_delete(id);
        } else {
            self.activate(id);
            self.session.begin_drag(id);
        }
        true
    }

    pub fn list_drag(&mut self, column: u16, row: u16) {
        let Some(dragged) = self.session.drag().dragged() else {
            return;
        };
        let over = self.session.drag().over();
        match self.list_hit(column, row) {
            Some((id, _)) if Some(id) != over => {
                if let Some(previous) = over {
                    self.session.drag_leave(previous);
                }
                if id != dragged {
                    self.session.drag_enter(id);
                }
            }
            Some(_) => {}
            None => {
                if let Some(previous) = over {
                    self.session.drag_leave(previous);
                }
            }
        }
    }

    pub fn list_release(&mut self, column: u16, row: u16) {
        if !self.session.drag().is_dragging() {
            return;
        }
        match self.list_hit(column, row) {
            Some((id, _)) => {
                if self.session.drop_on(id) {
                    self.after_edit();
                }
            }
            None => self.session.end_drag(),
        }
    }

    // =========================
    // Prompts
    // =========================

    pub fn open_prompt(&mut self, kind: PromptKind) {
        self.prompt = Some(Prompt {
            kind,
            input: String::new(),
        });
    }

    pub fn prompt_input(&mut self, ch: char) {
        if let Some(prompt) = &mut self.prompt {
            prompt.input.push(ch);
        }
        self.apply_live_prompt();
    }

    pub fn prompt_backspace(&mut self) {
        if let Some(prompt) = &mut self.prompt {
            prompt.input.pop();
        }
        self.apply_live_prompt();
    }

    /// Color prompts apply on every keystroke; invalid partial values are ignored
    fn apply_live_prompt(&mut self) {
        let Some(Prompt {
            kind: PromptKind::Param(kind),
            input,
        }) = &self.prompt
        else {
            return;
        };
        if !kind.is_live() {
            return;
        }
        if let Some(command) = ParamCommand::parse(*kind, input) {
            self.session.apply_param(&command);
            self.after_edit();
        }
    }

    pub fn cancel_prompt(&mut self) {
        self.prompt = None;
    }

    pub fn submit_prompt(&mut self) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        match prompt.kind {
            PromptKind::Link => {
                if self.session.insert_link(Some(&prompt.input)) {
                    self.after_edit();
                }
            }
            PromptKind::ImagePath => {
                let path = prompt.input.trim();
                if !path.is_empty() {
                    self.loader.request(expand_home(path));
                }
            }
            PromptKind::Param(kind) => match ParamCommand::parse(kind, &prompt.input) {
                Some(command) => {
                    if !kind.is_live() {
                        self.session.apply_param(&command);
                        self.after_edit();
                    }
                }
                None if prompt.input.trim().is_empty() => {}
                None => self.status = Some(format!("Invalid value: {}", prompt.input.trim())),
            },
        }
    }

    /// Run a keymap action
    pub fn perform(&mut self, action: Action) {
        match action {
            Action::Quit => self.quit(),
            Action::NewNote => self.create_note(),
            Action::DeleteNote => {
                if let Some(id) = self.session.active_id() {
                    self.request_delete(id);
                }
            }
            Action::FocusNext => self.focus_next(),
            Action::FocusPrev => self.focus_prev(),
            Action::Search => self.set_focus(FocusTarget::Search),
            Action::SelectAll => {
                self.session.surface_mut().select_all();
                self.set_focus(FocusTarget::Body);
            }
            Action::MoveUp => self.move_active(-1),
            Action::MoveDown => self.move_active(1),
            Action::Format(command) => self.format(command),
            Action::Prompt(kind) => self.open_prompt(kind),
            Action::Unlink => self.unlink(),
        }
    }
}

/// Is the screen cell inside `area`?
pub fn in_rect(area: &Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.x + area.width && row >= area.y && row < area.y + area.height
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(path), |home| home.join(rest)),
        None => PathBuf::from(path),
    }
}

/// Cursor position for a single-line text field
pub fn caret_at(text: &str, chars: usize) -> usize {
    use unicode_width::UnicodeWidthStr;
    let end = text.char_indices().nth(chars).map_or(text.len(), |(i, _)| i);
    text[..end].width()
}

/// Default storage directory when none is given on the command line
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("pagenote"))
        .unwrap_or_else(|| PathBuf::from("."))
}
