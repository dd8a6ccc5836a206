use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
};
use tui_textarea::{Input, Key};

/// Convert a crossterm key event into a tui-textarea input.
pub fn key_event_to_input(event: &KeyEvent) -> Input {
    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Tab | KeyCode::BackTab => Key::Tab,
        KeyCode::Delete => Key::Delete,
        KeyCode::Esc => Key::Esc,
        _ => Key::Null,
    };

    Input {
        key,
        ctrl: event.modifiers.contains(KeyModifiers::CONTROL),
        alt: event.modifiers.contains(KeyModifiers::ALT),
        shift: event.modifiers.contains(KeyModifiers::SHIFT),
    }
}

/// Cursor style for a focused input. `Color::Reset` keeps the reversed default.
pub fn focused_cursor_style(cursor_color: Color) -> Style {
    if cursor_color == Color::Reset {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default().bg(cursor_color).fg(Color::Black)
    }
}

/// tui-textarea underlines the cursor line; the workbench inputs never want that.
pub fn strip_underline(area: Rect, buf: &mut Buffer) {
    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            let cell = &mut buf[(x, y)];
            let style = cell.style().remove_modifier(Modifier::UNDERLINED);
            cell.set_style(style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_event_to_input_modifiers() {
        let event = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        let input = key_event_to_input(&event);
        assert_eq!(input.key, Key::Char('a'));
        assert!(input.ctrl);
        assert!(input.shift);
        assert!(!input.alt);
    }

    #[test]
    fn test_unmapped_keys_are_null() {
        let input = key_event_to_input(&KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE));
        assert_eq!(input.key, Key::Null);
    }

    #[test]
    fn test_focused_cursor_style() {
        assert!(focused_cursor_style(Color::Reset)
            .add_modifier
            .contains(Modifier::REVERSED));
        assert_eq!(focused_cursor_style(Color::Cyan).bg, Some(Color::Cyan));
    }
}
