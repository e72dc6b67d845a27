use crate::app::{in_rect, App};
use crate::config::Action;
use anyhow::Result;
use crossterm::event::{
    self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use pagenote_core::images::FocusTarget;
use std::time::Duration;

/// Terminal events
#[derive(Debug, Clone, Copy)]
pub enum Event {
    /// Key press event
    Key(KeyEvent),
    /// Terminal tick event
    Tick,
    /// Mouse event
    Mouse(MouseEvent),
    /// Terminal resized
    Resize(u16, u16),
}

/// Event handler for the terminal
pub struct EventHandler {
    /// Tick rate in milliseconds
    tick_rate: Duration,
}

impl EventHandler {
    /// Create a new event handler
    pub fn new(tick_rate_ms: u64) -> Self {
        Self {
            tick_rate: Duration::from_millis(tick_rate_ms),
        }
    }

    /// Poll for the next event
    pub fn next(&self) -> Result<Event> {
        if event::poll(self.tick_rate)? {
            match event::read()? {
                CEvent::Key(key) => return Ok(Event::Key(key)),
                CEvent::Mouse(m) => return Ok(Event::Mouse(m)),
                CEvent::Resize(w, h) => return Ok(Event::Resize(w, h)),
                _ => {}
            }
        }
        Ok(Event::Tick)
    }
}

/// Plain typing, allowing AltGr combinations (CONTROL+ALT)
fn typed_char(key: &KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(c)
            if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                || key.modifiers.contains(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            Some(c)
        }
        _ => None,
    }
}

/// Handle key events for the application
pub fn handle_key_event(key: KeyEvent, app: &mut App) {
    // On Windows, crossterm reports both key press and release events.
    if key.kind != KeyEventKind::Press {
        return;
    }

    if app.confirm_delete.is_some() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => app.confirm_delete(),
            KeyCode::Char('n') | KeyCode::Esc => app.cancel_delete(),
            _ => {}
        }
        return;
    }

    if app.prompt.is_some() {
        match key.code {
            KeyCode::Esc => app.cancel_prompt(),
            KeyCode::Enter => app.submit_prompt(),
            KeyCode::Backspace => app.prompt_backspace(),
            _ => {
                if let Some(c) = typed_char(&key) {
                    app.prompt_input(c);
                }
            }
        }
        return;
    }

    // Delete/Backspace act on a selected image before anything else
    if matches!(key.code, KeyCode::Delete | KeyCode::Backspace)
        && app.session.images().selected().is_some()
        && app.delete_selected_image()
    {
        return;
    }

    if let Some(action) = app.action_for(&key) {
        app.perform(action);
        return;
    }

    match app.focus {
        FocusTarget::Search => handle_search_input(key, app),
        FocusTarget::List => handle_list_input(key, app),
        FocusTarget::Title => handle_title_input(key, app),
        FocusTarget::Body => handle_body_input(key, app),
    }
}

fn handle_search_input(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Esc => {
            app.session.set_query("");
            app.set_focus(FocusTarget::List);
        }
        KeyCode::Enter | KeyCode::Down => app.set_focus(FocusTarget::List),
        KeyCode::Backspace => app.search_backspace(),
        _ => {
            if let Some(c) = typed_char(&key) {
                app.search_input(c);
            }
        }
    }
}

fn handle_list_input(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Up => app.list_step(-1),
        KeyCode::Down => app.list_step(1),
        KeyCode::Enter => app.set_focus(FocusTarget::Body),
        KeyCode::Delete => app.perform(Action::DeleteNote),
        _ => {}
    }
}

fn handle_title_input(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Enter | KeyCode::Down => app.set_focus(FocusTarget::Body),
        KeyCode::Backspace => app.title_backspace(),
        KeyCode::Left => app.title_move(-1),
        KeyCode::Right => app.title_move(1),
        KeyCode::Home => app.title_move(isize::MIN / 2),
        KeyCode::End => app.title_move(isize::MAX / 2),
        _ => {
            if let Some(c) = typed_char(&key) {
                app.title_insert(c);
            }
        }
    }
}

fn handle_body_input(key: KeyEvent, app: &mut App) {
    let extend = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Enter => app.edit_body(|s| s.insert_paragraph()),
        KeyCode::Backspace => app.edit_body(|s| s.delete_backward()),
        KeyCode::Delete => app.edit_body(|s| s.delete_forward()),
        KeyCode::Left => app.move_caret(|s| s.move_left(extend)),
        KeyCode::Right => app.move_caret(|s| s.move_right(extend)),
        KeyCode::Home => app.move_caret(|s| s.move_home(extend)),
        KeyCode::End => app.move_caret(|s| s.move_end(extend)),
        KeyCode::Up => app.move_caret_vertical(-1, extend),
        KeyCode::Down => app.move_caret_vertical(1, extend),
        KeyCode::PageUp => app.scroll_body(-(app.body_area.height.max(1) as isize)),
        KeyCode::PageDown => app.scroll_body(app.body_area.height.max(1) as isize),
        KeyCode::Esc => app.set_focus(FocusTarget::List),
        _ => {
            if let Some(c) = typed_char(&key) {
                app.edit_body(|s| s.insert_text(&c.to_string()));
            }
        }
    }
}

/// Handle mouse events: list selection and drag, field focus, body clicks,
/// image resize and scrolling
pub fn handle_mouse_event(mouse: MouseEvent, app: &mut App) {
    if app.prompt.is_some() || app.confirm_delete.is_some() {
        return;
    }
    let (x, y) = (mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if app.list_press(x, y) || app.body_press(x, y) {
                return;
            }
            if in_rect(&app.search_area, x, y) {
                app.set_focus(FocusTarget::Search);
            } else if in_rect(&app.title_area, x, y) {
                app.set_focus(FocusTarget::Title);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            if app.session.drag().is_dragging() {
                app.list_drag(x, y);
            } else {
                app.body_drag(x, y);
            }
        }
        MouseEventKind::Up(MouseButton::Left) => {
            app.list_release(x, y);
            app.pointer_release();
        }
        MouseEventKind::ScrollUp => {
            if app.list_hit(x, y).is_some() {
                app.list_step(-1);
            } else {
                app.scroll_by_step(false);
            }
        }
        MouseEventKind::ScrollDown => {
            if app.list_hit(x, y).is_some() {
                app.list_step(1);
            } else {
                app.scroll_by_step(true);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::layout::Rect;
    use tempfile::tempdir;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_event_handler_creation() {
        let handler = EventHandler::new(250);
        assert_eq!(handler.tick_rate, Duration::from_millis(250));
    }

    #[test]
    fn test_typing_and_bold_binding() {
        let dir = tempdir().unwrap();
        let mut app = App::new(dir.path()).unwrap();
        for c in "hey".chars() {
            handle_key_event(press(KeyCode::Char(c), KeyModifiers::NONE), &mut app);
        }
        handle_key_event(press(KeyCode::Char('a'), KeyModifiers::CONTROL), &mut app);
        handle_key_event(press(KeyCode::Char('b'), KeyModifiers::ALT), &mut app);
        assert_eq!(app.session.notes()[0].content, "<p><b>hey</b></p>");
    }

    #[test]
    fn test_tab_cycles_focus_and_keys_follow() {
        let dir = tempdir().unwrap();
        let mut app = App::new(dir.path()).unwrap();
        handle_key_event(press(KeyCode::Tab, KeyModifiers::NONE), &mut app);
        assert_eq!(app.focus, FocusTarget::Search);
        handle_key_event(press(KeyCode::Char('z'), KeyModifiers::NONE), &mut app);
        assert_eq!(app.session.query(), "z");
        assert!(app.entries().is_empty());
        handle_key_event(press(KeyCode::Esc, KeyModifiers::NONE), &mut app);
        assert_eq!(app.session.query(), "");
        assert_eq!(app.focus, FocusTarget::List);

        handle_key_event(press(KeyCode::Tab, KeyModifiers::NONE), &mut app);
        handle_key_event(press(KeyCode::Char('T'), KeyModifiers::SHIFT), &mut app);
        assert_eq!(app.session.title(), "T");
    }

    #[test]
    fn test_delete_confirmation_keys() {
        let dir = tempdir().unwrap();
        let mut app = App::new(dir.path()).unwrap();
        handle_key_event(press(KeyCode::Char('n'), KeyModifiers::CONTROL), &mut app);
        assert_eq!(app.session.notes().len(), 2);

        handle_key_event(press(KeyCode::Char('d'), KeyModifiers::CONTROL), &mut app);
        assert!(app.confirm_delete.is_some());
        handle_key_event(press(KeyCode::Char('x'), KeyModifiers::NONE), &mut app);
        assert!(app.confirm_delete.is_some());
        handle_key_event(press(KeyCode::Char('n'), KeyModifiers::NONE), &mut app);
        assert_eq!(app.session.notes().len(), 2);

        handle_key_event(press(KeyCode::Char('d'), KeyModifiers::CONTROL), &mut app);
        handle_key_event(press(KeyCode::Char('y'), KeyModifiers::NONE), &mut app);
        assert_eq!(app.session.notes().len(), 1);
    }

    #[test]
    fn test_prompt_captures_keys() {
        let dir = tempdir().unwrap();
        let mut app = App::new(dir.path()).unwrap();
        handle_key_event(press(KeyCode::Char('k'), KeyModifiers::CONTROL), &mut app);
        assert!(app.prompt.is_some());
        for c in "a.io".chars() {
            handle_key_event(press(KeyCode::Char(c), KeyModifiers::NONE), &mut app);
        }
        handle_key_event(press(KeyCode::Backspace, KeyModifiers::NONE), &mut app);
        handle_key_event(press(KeyCode::Char('o'), KeyModifiers::NONE), &mut app);
        handle_key_event(press(KeyCode::Enter, KeyModifiers::NONE), &mut app);
        assert!(app.session.notes()[0].content.contains("href=\"https://a.io\""));
    }

    #[test]
    fn test_mouse_focuses_fields() {
        let dir = tempdir().unwrap();
        let mut app = App::new(dir.path()).unwrap();
        app.search_area = Rect::new(0, 0, 28, 3);
        app.title_area = Rect::new(30, 0, 50, 3);
        app.set_body_area(Rect::new(30, 5, 50, 15));

        handle_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 40, 1), &mut app);
        assert_eq!(app.focus, FocusTarget::Title);
        handle_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 5, 1), &mut app);
        assert_eq!(app.focus, FocusTarget::Search);
        handle_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 35, 6), &mut app);
        assert_eq!(app.focus, FocusTarget::Body);
    }

    #[test]
    fn test_backspace_in_list_removes_selected_image() {
        let dir = tempdir().unwrap();
        let mut app = App::new(dir.path()).unwrap();
        app.set_body_area(Rect::new(30, 5, 50, 15));
        let id = app.session.insert_image("data:image/png;base64,AA==").unwrap();
        app.after_edit();
        handle_mouse_event(mouse(MouseEventKind::Down(MouseButton::Left), 31, 6), &mut app);
        handle_mouse_event(mouse(MouseEventKind::Up(MouseButton::Left), 31, 6), &mut app);
        assert_eq!(app.session.images().selected(), Some(id));

        app.set_focus(FocusTarget::List);
        handle_key_event(press(KeyCode::Backspace, KeyModifiers::NONE), &mut app);
        assert!(!app.session.surface().contains_image(id));
        assert_eq!(app.session.images().selected(), None);
    }
}
