use crate::config::Theme;
use ratatui::style::{Color, Modifier, Style};

/// Snapshot of theme colors for rendering.
/// Passed to widgets to avoid threading many individual parameters.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub keybind_hints: Color,
    pub keybind_labels: Color,
    pub controls_bg: Color,
    pub throbber: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub dimmed: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_inverse: Color,
    pub table_header: Color,
    pub table_header_bg: Color,
    pub table_selected: Color,
    pub sidebar_border: Color,
    pub modal_border_active: Color,
    pub modal_border_error: Color,
    pub card_border: Color,
    pub card_selected: Color,
}

impl RenderContext {
    pub fn from_theme(theme: &Theme) -> Self {
        Self {
            keybind_hints: theme.get("keybind_hints"),
            keybind_labels: theme.get("keybind_labels"),
            controls_bg: theme.get("controls_bg"),
            throbber: theme.get("throbber"),
            success: theme.get("success"),
            error: theme.get("error"),
            warning: theme.get("warning"),
            dimmed: theme.get("dimmed"),
            text_primary: theme.get("text_primary"),
            text_secondary: theme.get("text_secondary"),
            text_inverse: theme.get("text_inverse"),
            table_header: theme.get("table_header"),
            table_header_bg: theme.get("table_header_bg"),
            table_selected: theme.get("table_selected"),
            sidebar_border: theme.get("sidebar_border"),
            modal_border_active: theme.get("modal_border_active"),
            modal_border_error: theme.get("modal_border_error"),
            card_border: theme.get("card_border"),
            card_selected: theme.get("card_selected"),
        }
    }

    /// Style of a highlighted list row. A reset color means "reversed".
    pub fn selected_style(&self) -> Style {
        if self.table_selected == Color::Reset {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
                .bg(self.table_selected)
                .fg(self.text_inverse)
        }
    }

    pub fn header_style(&self) -> Style {
        if self.table_header_bg == Color::Reset {
            Style::default().fg(self.table_header)
        } else {
            Style::default()
                .bg(self.table_header_bg)
                .fg(self.table_header)
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::from_theme(&Theme::default())
    }
}
