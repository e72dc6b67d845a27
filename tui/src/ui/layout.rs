use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    Frame,
};

use super::widgets::{
    render_body, render_delete_confirmation, render_note_list, render_prompt, render_search, render_status_bar,
    render_title, render_toolbar,
};

/// Width of the note list column
const SIDEBAR_WIDTH: u16 = 30;

/// Render the complete UI
pub fn render(frame: &mut Frame, app: &mut App) {
    app.list_locations.clear();
    let size = frame.size();

    // Main layout: content, status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(size);

    render_content(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);

    // Overlays (drawn last)
    if app.prompt.is_some() {
        render_prompt(frame, app, size);
    }
    if app.confirm_delete.is_some() {
        render_delete_confirmation(frame, app, size);
    }
}

/// Sidebar on the left, editor on the right
fn render_content(frame: &mut Frame, app: &mut App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
        .split(area);

    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(columns[0]);
    render_search(frame, app, sidebar[0]);
    render_note_list(frame, app, sidebar[1]);

    let editor = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(1), // Toolbar
            Constraint::Min(0),    // Body
        ])
        .split(columns[1]);
    render_title(frame, app, editor[0]);
    render_toolbar(frame, app, editor[1]);
    render_body(frame, app, editor[2]);
}
