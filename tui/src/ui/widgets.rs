use crate::app::{caret_at, App};
use crate::ui::body::BodyView;
use pagenote_core::images::FocusTarget;
use pagenote_core::models::UNTITLED_LABEL;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// Rows each list entry takes: title line and date line
const ENTRY_HEIGHT: u16 = 2;
const DELETE_LABEL: &str = "[x]";

fn panel(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_alignment(Alignment::Left)
        .border_style(style)
}

fn inner(area: Rect) -> Rect {
    Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    }
}

/// Render the search field
pub fn render_search(frame: &mut Frame, app: &mut App, area: Rect) {
    let focused = app.focus == FocusTarget::Search;
    let query = app.session.query().to_string();
    let text = if query.is_empty() && !focused {
        Line::from(Span::styled("Search notes...", Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(query.clone())
    };
    frame.render_widget(Paragraph::new(text).block(panel(" Search ", focused)), area);
    app.search_area = area;
    if focused {
        let field = inner(area);
        frame.set_cursor(field.x + (query.width() as u16).min(field.width.saturating_sub(1)), field.y);
    }
}

/// Render the note list and record each entry's clickable regions
pub fn render_note_list(frame: &mut Frame, app: &mut App, area: Rect) {
    let focused = app.focus == FocusTarget::List;
    frame.render_widget(panel(" Notes ", focused), area);
    let list = inner(area);
    if list.height == 0 || list.width == 0 {
        return;
    }
    let entries = app.entries();

    if entries.is_empty() {
        let empty = Paragraph::new("No matching notes")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, list);
        return;
    }

    let capacity = (list.height / ENTRY_HEIGHT).max(1) as usize;
    let active = entries.iter().position(|e| e.active).unwrap_or(0);
    let first = (active + 1).saturating_sub(capacity);
    let dragged = app.session.drag().dragged();
    let over = app.session.drag().over();

    for (slot, entry) in entries.iter().skip(first).take(capacity).enumerate() {
        let y = list.y + slot as u16 * ENTRY_HEIGHT;
        let rect = Rect::new(list.x, y, list.width, ENTRY_HEIGHT.min(list.y + list.height - y));
        let delete_width = DELETE_LABEL.len() as u16;
        let delete = Rect::new(list.x + list.width.saturating_sub(delete_width), y, delete_width.min(list.width), 1);

        let mut title_style = Style::default().fg(Color::White);
        if entry.active {
            title_style = Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        if over == Some(entry.id) {
            title_style = title_style.fg(Color::Yellow).add_modifier(Modifier::UNDERLINED);
        }
        if dragged == Some(entry.id) {
            title_style = title_style.add_modifier(Modifier::DIM);
        }

        let title_room = list.width.saturating_sub(delete_width + 1) as usize;
        let mut title: String = String::new();
        for ch in entry.title.chars() {
            if title.width() + ch.to_string().width() > title_room {
                break;
            }
            title.push(ch);
        }
        let padding = " ".repeat(title_room.saturating_sub(title.width()) + 1);
        let title_line = Line::from(vec![
            Span::styled(title, title_style),
            Span::styled(padding, title_style),
            Span::styled(DELETE_LABEL, Style::default().fg(Color::Red)),
        ]);
        frame.render_widget(Paragraph::new(title_line), Rect::new(list.x, y, list.width, 1));
        if rect.height > 1 {
            let date = Paragraph::new(Span::styled(entry.date.clone(), Style::default().fg(Color::DarkGray)));
            frame.render_widget(date, Rect::new(list.x, y + 1, list.width, 1));
        }
        app.list_locations.push((rect, delete, entry.id));
    }
}

/// Render the title field
pub fn render_title(frame: &mut Frame, app: &mut App, area: Rect) {
    let focused = app.focus == FocusTarget::Title;
    let title = app.session.title().to_string();
    let text = if title.is_empty() {
        Line::from(Span::styled(UNTITLED_LABEL, Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(Span::styled(title.clone(), Style::default().add_modifier(Modifier::BOLD)))
    };
    frame.render_widget(Paragraph::new(text).block(panel(" Title ", focused)), area);
    app.title_area = area;
    if focused {
        let field = inner(area);
        let x = caret_at(&title, app.title_cursor) as u16;
        frame.set_cursor(field.x + x.min(field.width.saturating_sub(1)), field.y);
    }
}

/// Render the formatting hint line
pub fn render_toolbar(frame: &mut Frame, app: &App, area: Rect) {
    let keys = &app.config.keymap;
    let hints = [
        ("B", &keys.bold),
        ("I", &keys.italic),
        ("U", &keys.underline),
        ("S", &keys.strikethrough),
        ("•", &keys.unordered_list),
        ("1.", &keys.ordered_list),
        ("⇤", &keys.outdent),
        ("⇥", &keys.indent),
        ("Style", &keys.block_style),
        ("Font", &keys.font_name),
        ("Size", &keys.font_size),
        ("Color", &keys.fore_color),
        ("Mark", &keys.hilite_color),
        ("Link", &keys.link),
        ("Unlink", &keys.unlink),
        ("Image", &keys.insert_image),
    ];
    let mut spans = Vec::new();
    for (label, key) in hints {
        spans.push(Span::styled(format!(" {} ", label), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)));
        spans.push(Span::styled(format!("{} ", key), Style::default().fg(Color::DarkGray)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the rich-text body and place the caret
pub fn render_body(frame: &mut Frame, app: &mut App, area: Rect) {
    let focused = app.focus == FocusTarget::Body;
    frame.render_widget(panel(" Note ", focused), area);
    let content = inner(area);
    app.set_body_area(content);

    let layout = app.layout();
    let surface = app.session.surface();
    let images = app.session.images();
    let view = BodyView {
        layout: &layout,
        scroll: app.body_scroll,
        selection: surface.selection(),
        selected_image: images.selected(),
        handle: images.handle(),
    };
    frame.render_widget(view, content);

    if focused && images.selected().is_none() {
        if let Some((row, col)) = layout.cell_of(surface.caret()) {
            if row >= app.body_scroll && row < app.body_scroll + content.height as usize && col < content.width {
                frame.set_cursor(content.x + col, content.y + (row - app.body_scroll) as u16);
            }
        }
    }
}

/// Render the status bar at the bottom
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let resizing = app.session.images().pointer_style().resize_cursor;
    let text = match &app.status {
        _ if resizing => " ⇔ Resizing image, release to apply ".to_string(),
        Some(message) => format!(" {} ", message),
        None => format!(
            " {} notes | [{}: New] [{}: Delete] [{}: Focus] [{}: Search] [{}: Quit] ",
            app.session.notes().len(),
            app.config.keymap.new_note,
            app.config.keymap.delete_note,
            app.config.keymap.focus_next,
            app.config.keymap.search,
            app.config.keymap.quit,
        ),
    };
    let style = if resizing {
        Style::default().bg(Color::Magenta).fg(Color::White)
    } else if app.status.is_some() {
        Style::default().bg(Color::Yellow).fg(Color::Black)
    } else {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    };
    frame.render_widget(Paragraph::new(text).style(style).alignment(Alignment::Center), area);
}

/// Render the one-line prompt overlay
pub fn render_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let Some(prompt) = &app.prompt else {
        return;
    };
    let popup_width = 60.min(area.width);
    let popup_height = 3;
    let x = (area.width.saturating_sub(popup_width)) / 2;
    let y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(x, y, popup_width, popup_height);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} (Enter:OK | Esc:Cancel) ", prompt.label()))
        .style(Style::default().fg(Color::Cyan));

    frame.render_widget(Clear, popup_area);
    let paragraph = Paragraph::new(format!("{}▊", prompt.input))
        .block(block)
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(paragraph, popup_area);
}

pub fn render_delete_confirmation(frame: &mut Frame, app: &App, area: Rect) {
    let Some(id) = app.confirm_delete else {
        return;
    };
    let popup_width = 50.min(area.width);
    let popup_height = 5;

    let x = (area.width.saturating_sub(popup_width)) / 2;
    let y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(x, y, popup_width, popup_height);

    let title = app
        .session
        .store()
        .get(id)
        .map(|note| note.display_title().to_string())
        .unwrap_or_default();
    let text = format!("Delete \"{}\"? (y/n)", title);
    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .title("Confirm Deletion")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Yellow)),
        )
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center);

    frame.render_widget(Clear, popup_area);
    frame.render_widget(paragraph, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use tempfile::tempdir;

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.get(x, y).symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_list_records_locations() {
        let dir = tempdir().unwrap();
        let mut app = App::new(dir.path()).unwrap();
        app.create_note();
        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        terminal
            .draw(|f| {
                app.list_locations.clear();
                render_note_list(f, &mut app, f.size());
            })
            .unwrap();
        assert_eq!(app.list_locations.len(), 2);
        let (first, delete, _) = app.list_locations[0];
        assert_eq!(first, Rect::new(1, 1, 38, 2));
        assert_eq!(delete, Rect::new(36, 1, 3, 1));
        let text = screen(&terminal);
        assert!(text.contains(UNTITLED_LABEL));
        assert!(text.contains(DELETE_LABEL));
    }

    #[test]
    fn test_body_draws_handle_for_selected_image() {
        let dir = tempdir().unwrap();
        let mut app = App::new(dir.path()).unwrap();
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal.draw(|f| render_body(f, &mut app, f.size())).unwrap();
        app.session.insert_image("data:image/png;base64,AA==").unwrap();
        app.after_edit();
        app.body_press(2, 2);
        terminal.draw(|f| render_body(f, &mut app, f.size())).unwrap();
        assert!(screen(&terminal).contains('◢'));
    }

    #[test]
    fn test_prompt_overlay_shows_label() {
        let dir = tempdir().unwrap();
        let mut app = App::new(dir.path()).unwrap();
        app.open_prompt(crate::config::PromptKind::Link);
        app.prompt_input('x');
        let mut terminal = Terminal::new(TestBackend::new(70, 10)).unwrap();
        terminal.draw(|f| render_prompt(f, &app, f.size())).unwrap();
        let text = screen(&terminal);
        assert!(text.contains("Enter URL"));
        assert!(text.contains("x▊"));
    }
}
