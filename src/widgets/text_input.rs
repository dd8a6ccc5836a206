use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};
use tui_textarea::{CursorMove, Key, TextArea};

use crate::config::Theme;

use super::text_input_common::{focused_cursor_style, key_event_to_input, strip_underline};

/// Event emitted by TextInput widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInputEvent {
    None,
    Submit,  // Enter pressed
    Cancel,  // Esc pressed
    Changed, // Text was edited
}

/// Single-line text input wrapping tui-textarea. Used for the palette and
/// sidebar search boxes.
pub struct TextInput {
    textarea: TextArea<'static>,
    value: String,
    text_color: Option<Color>,
    background_color: Option<Color>,
    focused: bool,
}

impl TextInput {
    pub fn new() -> Self {
        let mut widget = Self {
            textarea: TextArea::default(),
            value: String::new(),
            text_color: None,
            background_color: None,
            focused: false,
        };
        widget.apply_colors_to_textarea();
        widget
    }

    fn sync_from_textarea(&mut self) {
        self.value = self.textarea.lines().first().cloned().unwrap_or_default();
    }

    fn apply_colors_to_textarea(&mut self) {
        let mut style = Style::default();
        if let Some(text_color) = self.text_color {
            style = style.fg(text_color);
        }
        if let Some(bg_color) = self.background_color {
            style = style.bg(bg_color);
        }
        self.textarea.set_style(style);
        self.textarea.set_cursor_line_style(Style::default());
        self.apply_cursor_style();
    }

    fn apply_cursor_style(&mut self) {
        let style = if self.focused {
            focused_cursor_style(Color::Reset)
        } else {
            // Matching the text style hides the cursor
            self.textarea.style()
        };
        self.textarea.set_cursor_style(style);
    }

    pub fn with_theme(mut self, theme: &Theme) -> Self {
        self.text_color = Some(theme.get("text_primary"));
        self.apply_colors_to_textarea();
        self
    }

    pub fn with_placeholder(mut self, text: &str) -> Self {
        self.textarea.set_placeholder_text(text);
        self
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        self.apply_cursor_style();
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: &str) {
        let single_line = value.replace(['\n', '\r'], " ");
        let placeholder = self.textarea.placeholder_text().to_string();
        self.textarea = TextArea::new(vec![single_line]);
        self.textarea.set_placeholder_text(placeholder);
        self.textarea.move_cursor(CursorMove::End);
        self.apply_colors_to_textarea();
        self.sync_from_textarea();
    }

    pub fn clear(&mut self) {
        self.set_value("");
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> TextInputEvent {
        match event.code {
            KeyCode::Enter => return TextInputEvent::Submit,
            KeyCode::Esc => return TextInputEvent::Cancel,
            _ => {}
        }
        let input = key_event_to_input(event);
        if matches!(input.key, Key::Null | Key::Char('\n') | Key::Char('\r')) {
            return TextInputEvent::None;
        }
        let before = self.value.clone();
        self.textarea.input(input);
        self.sync_from_textarea();
        if self.value != before {
            TextInputEvent::Changed
        } else {
            TextInputEvent::None
        }
    }
}

impl Default for TextInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for &TextInput {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        self.textarea.render(area, buf);
        strip_underline(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_text_input_new() {
        let input = TextInput::new();
        assert_eq!(input.value(), "");
        assert!(input.is_empty());
        assert!(!input.is_focused());
    }

    #[test]
    fn test_typing_reports_changed() {
        let mut input = TextInput::new();
        assert_eq!(input.handle_key(&key(KeyCode::Char('a'))), TextInputEvent::Changed);
        assert_eq!(input.handle_key(&key(KeyCode::Char('b'))), TextInputEvent::Changed);
        assert_eq!(input.value(), "ab");
        assert_eq!(input.handle_key(&key(KeyCode::Backspace)), TextInputEvent::Changed);
        assert_eq!(input.value(), "a");
    }

    #[test]
    fn test_cursor_movement_is_not_a_change() {
        let mut input = TextInput::new();
        input.set_value("abc");
        assert_eq!(input.handle_key(&key(KeyCode::Left)), TextInputEvent::None);
        assert_eq!(input.value(), "abc");
    }

    #[test]
    fn test_enter_and_esc() {
        let mut input = TextInput::new();
        input.set_value("x");
        assert_eq!(input.handle_key(&key(KeyCode::Enter)), TextInputEvent::Submit);
        assert_eq!(input.handle_key(&key(KeyCode::Esc)), TextInputEvent::Cancel);
        assert_eq!(input.value(), "x");
    }

    #[test]
    fn test_set_value_flattens_newlines() {
        let mut input = TextInput::new();
        input.set_value("a\nb");
        assert_eq!(input.value(), "a b");
        input.clear();
        assert!(input.is_empty());
    }
}
