use crossterm::event::{KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Widget},
};
use tui_textarea::{CursorMove, Key, TextArea};

use crate::config::Theme;

use super::text_input::TextInputEvent;
use super::text_input_common::{focused_cursor_style, key_event_to_input, strip_underline};

/// Multi-line SQL buffer editor.
///
/// In read-only mode the cursor can still move and scroll but every edit is
/// dropped. Run and focus shortcuts are handled by the caller before keys
/// reach the editor.
pub struct SqlEditor {
    textarea: TextArea<'static>,
    read_only: bool,
    focused: bool,
    text_color: Option<Color>,
    border_color: Color,
    border_focused: Color,
}

impl SqlEditor {
    pub fn new(read_only: bool) -> Self {
        let mut editor = Self {
            textarea: TextArea::default(),
            read_only,
            focused: false,
            text_color: None,
            border_color: Color::DarkGray,
            border_focused: Color::Cyan,
        };
        editor.apply_styles();
        editor
    }

    pub fn with_theme(mut self, theme: &Theme) -> Self {
        self.text_color = Some(theme.get("text_primary"));
        self.border_color = theme.get("sidebar_border");
        self.border_focused = theme.get("modal_border_active");
        self.apply_styles();
        self
    }

    fn apply_styles(&mut self) {
        let mut style = Style::default();
        if let Some(color) = self.text_color {
            style = style.fg(color);
        }
        self.textarea.set_style(style);
        self.textarea.set_cursor_line_style(Style::default());
        let cursor = if self.focused {
            focused_cursor_style(Color::Reset)
        } else {
            self.textarea.style()
        };
        self.textarea.set_cursor_style(cursor);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        self.apply_styles();
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn value(&self) -> String {
        self.textarea.lines().join("\n")
    }

    /// Replace the whole buffer. Used when a catalog entry is applied, which
    /// is allowed in read-only mode too.
    pub fn set_value(&mut self, text: &str) {
        self.textarea = TextArea::new(text.split('\n').map(str::to_string).collect());
        self.textarea.move_cursor(CursorMove::Top);
        self.apply_styles();
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> TextInputEvent {
        let input = key_event_to_input(event);
        if input.key == Key::Esc {
            return TextInputEvent::Cancel;
        }
        if input.key == Key::Null {
            return TextInputEvent::None;
        }
        if self.read_only {
            let movement = match input.key {
                Key::Up => Some(CursorMove::Up),
                Key::Down => Some(CursorMove::Down),
                Key::Left => Some(CursorMove::Back),
                Key::Right => Some(CursorMove::Forward),
                Key::Home => Some(CursorMove::Head),
                Key::End => Some(CursorMove::End),
                Key::PageUp => {
                    self.textarea.scroll(tui_textarea::Scrolling::PageUp);
                    None
                }
                Key::PageDown => {
                    self.textarea.scroll(tui_textarea::Scrolling::PageDown);
                    None
                }
                _ => None,
            };
            if let Some(movement) = movement {
                self.textarea.move_cursor(movement);
            }
            return TextInputEvent::None;
        }
        // Ctrl+Enter belongs to the caller even if it slips through
        if input.key == Key::Enter && event.modifiers.contains(KeyModifiers::CONTROL) {
            return TextInputEvent::Submit;
        }
        if self.textarea.input(input) {
            TextInputEvent::Changed
        } else {
            TextInputEvent::None
        }
    }
}

impl Default for SqlEditor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Widget for &SqlEditor {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let title = if self.read_only { " SQL (read-only) " } else { " SQL " };
        let border = if self.focused {
            self.border_focused
        } else {
            self.border_color
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(border));
        let inner = block.inner(area);
        block.render(area, buf);
        self.textarea.render(inner, buf);
        strip_underline(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyCode;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_set_value_round_trips_lines() {
        let mut editor = SqlEditor::new(false);
        editor.set_value("SELECT 1\nFROM releases");
        assert_eq!(editor.value(), "SELECT 1\nFROM releases");
    }

    #[test]
    fn test_enter_inserts_newline() {
        let mut editor = SqlEditor::new(false);
        editor.set_value("SELECT 1");
        editor.handle_key(&key(KeyCode::End));
        assert_eq!(editor.handle_key(&key(KeyCode::Enter)), TextInputEvent::Changed);
        assert_eq!(editor.value(), "SELECT 1\n");
    }

    #[test]
    fn test_read_only_drops_edits() {
        let mut editor = SqlEditor::new(true);
        editor.set_value("SELECT 1");
        assert_eq!(editor.handle_key(&key(KeyCode::Char('x'))), TextInputEvent::None);
        assert_eq!(editor.handle_key(&key(KeyCode::Backspace)), TextInputEvent::None);
        assert_eq!(editor.handle_key(&key(KeyCode::Right)), TextInputEvent::None);
        assert_eq!(editor.value(), "SELECT 1");
        assert!(editor.is_read_only());
    }

    #[test]
    fn test_empty_value() {
        let mut editor = SqlEditor::new(false);
        editor.set_value("");
        assert_eq!(editor.value(), "");
    }
}
