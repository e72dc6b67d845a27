//! The single owner of application state: the note store, the active note
//! and its editor binding, list search/drag state and the image controller.

use crate::commands::{self, FormatCommand, ParamCommand};
use crate::images::{ClickTarget, FocusTarget, ImageController, ImageGeometry};
use crate::list::{self, DragState, ListEntry};
use crate::models::{Note, NoteId};
use crate::richtext::{EditorSurface, ImageId, Mutation};
use crate::storage::{KeyValueStore, NoteStore};
use crate::Result;
use std::sync::mpsc::Receiver;

pub struct Session<S: KeyValueStore> {
    store: NoteStore<S>,
    active: Option<NoteId>,
    title: String,
    surface: EditorSurface,
    mutations: Receiver<Mutation>,
    images: ImageController,
    drag: DragState,
    query: String,
}

impl<S: KeyValueStore> Session<S> {
    /// Load the store and activate the first note
    pub fn open(backend: S, max_margin: u32) -> Result<Self> {
        let store = NoteStore::open(backend)?;
        let mut surface = EditorSurface::new();
        let mutations = surface.subscribe();
        let mut session = Self {
            store,
            active: None,
            title: String::new(),
            surface,
            mutations,
            images: ImageController::new(max_margin),
            drag: DragState::default(),
            query: String::new(),
        };
        if let Some(first) = session.store.first_id() {
            session.set_active(first);
        }
        Ok(session)
    }

    pub fn store(&self) -> &NoteStore<S> {
        &self.store
    }

    pub fn notes(&self) -> &[Note] {
        self.store.notes()
    }

    pub fn active_id(&self) -> Option<NoteId> {
        self.active
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.active.and_then(|id| self.store.get(id))
    }

    /// Current contents of the title field
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn surface(&self) -> &EditorSurface {
        &self.surface
    }

    /// Caret and selection changes only; content edits go through
    /// [`Session::edit_content`] so they are persisted
    pub fn surface_mut(&mut self) -> &mut EditorSurface {
        &mut self.surface
    }

    pub fn images(&self) -> &ImageController {
        &self.images
    }

    pub fn drag(&self) -> &DragState {
        &self.drag
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    /// Visible list entries for the current query
    pub fn entries(&self) -> Vec<ListEntry> {
        list::render_entries(self.store.notes(), self.active, &self.query)
    }

    /// Load a note into the title field and editing surface
    pub fn set_active(&mut self, id: NoteId) -> bool {
        let Some(note) = self.store.get(id) else {
            return false;
        };
        self.title = note.title.clone();
        let content = note.content.clone();
        self.active = Some(id);
        self.images.deselect();
        self.surface.load_markup(&content);
        self.mutations.try_iter().for_each(drop);
        true
    }

    /// Create a blank note at the top of the list and activate it
    pub fn create_note(&mut self) -> NoteId {
        let id = self.store.create();
        self.set_active(id);
        id
    }

    /// Delete a note the user confirmed. The active note moves to the first
    /// remaining one (or the synthesized replacement) when needed.
    pub fn delete_note(&mut self, id: NoteId) -> bool {
        if !self.store.delete(id) {
            return false;
        }
        let active_gone = self.active.map_or(true, |a| a == id || self.store.get(a).is_none());
        if active_gone {
            if let Some(first) = self.store.first_id() {
                self.set_active(first);
            }
        }
        true
    }

    /// Move `from` to the position of `to`
    pub fn reorder(&mut self, from: NoteId, to: NoteId) -> bool {
        self.store.reorder(from, to)
    }

    pub fn begin_drag(&mut self, id: NoteId) {
        self.drag.start(id);
    }

    pub fn drag_enter(&mut self, id: NoteId) {
        self.drag.enter(id);
    }

    pub fn drag_leave(&mut self, id: NoteId) {
        self.drag.leave(id);
    }

    /// Drop the dragged entry on `target`, reordering when it applies
    pub fn drop_on(&mut self, target: NoteId) -> bool {
        match self.drag.drop_on(target) {
            Some((from, to)) => self.reorder(from, to),
            None => false,
        }
    }

    pub fn end_drag(&mut self) {
        self.drag.end();
    }

    /// An edit of the title field
    pub fn set_title(&mut self, title: &str) {
        if self.active.is_none() {
            return;
        }
        self.title = title.to_string();
        self.sync();
    }

    /// Apply a content edit to the surface and persist it
    pub fn edit_content(&mut self, edit: impl FnOnce(&mut EditorSurface)) {
        if self.active.is_none() {
            return;
        }
        edit(&mut self.surface);
        self.sync();
    }

    pub fn format(&mut self, command: FormatCommand) {
        self.edit_content(|surface| command.apply(surface));
    }

    pub fn apply_param(&mut self, command: &ParamCommand) {
        self.edit_content(|surface| command.apply(surface));
    }

    /// Insert a link from prompt input; `None` or blank input is skipped
    pub fn insert_link(&mut self, input: Option<&str>) -> bool {
        if self.active.is_none() {
            return false;
        }
        let inserted = commands::insert_link(&mut self.surface, input);
        if inserted {
            self.sync();
        }
        inserted
    }

    pub fn unlink(&mut self) {
        self.edit_content(commands::unlink);
    }

    /// Insert an encoded image at the caret
    pub fn insert_image(&mut self, data_uri: &str) -> Option<ImageId> {
        self.active?;
        let id = commands::insert_image(&mut self.surface, data_uri);
        self.sync();
        Some(id)
    }

    /// Deliver pending content mutations to the image controller; returns
    /// how many were pending
    pub fn process_mutations(&mut self, geometry: &dyn ImageGeometry) -> usize {
        let count = self.mutations.try_iter().count();
        if count > 0 {
            self.images.on_mutations(&self.surface, geometry);
        }
        count
    }

    pub fn click_body(&mut self, target: ClickTarget, geometry: &dyn ImageGeometry) {
        self.images.click(target, &self.surface, geometry);
    }

    pub fn focus_changed(&mut self, target: FocusTarget) {
        self.images.focus_changed(target);
    }

    /// Scroll offset or viewport size changed
    pub fn viewport_changed(&mut self, geometry: &dyn ImageGeometry) {
        self.images.reposition(&self.surface, geometry);
    }

    pub fn press_resize_handle(&mut self, x: i32, geometry: &dyn ImageGeometry) -> bool {
        self.images.press_handle(x, &self.surface, geometry)
    }

    pub fn drag_resize(&mut self, x: i32, geometry: &dyn ImageGeometry) -> Option<u32> {
        self.images.pointer_move(x, &mut self.surface, geometry)
    }

    /// Pointer released; a finished resize is persisted
    pub fn release_pointer(&mut self) -> bool {
        let finished = self.images.release();
        if finished {
            self.sync();
        }
        finished
    }

    /// Delete/Backspace with an image selected
    pub fn delete_selected_image(&mut self, in_text_input: bool) -> bool {
        let removed = self.images.delete_selected(&mut self.surface, in_text_input);
        if removed {
            self.sync();
        }
        removed
    }

    /// Storage warnings produced since the last call
    pub fn take_warnings(&mut self) -> Vec<String> {
        self.store.take_warnings()
    }

    /// Write the editor state back into the active note
    fn sync(&mut self) {
        let Some(id) = self.active else {
            return;
        };
        let content = self.surface.markup();
        self.store.update(id, &self.title, &content);
    }
}
