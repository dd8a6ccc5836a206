use crate::render::context::RenderContext;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Paragraph, Widget},
};

/// Bottom bar of key hints, with an optional row count and a throbber slot.
pub struct Controls {
    pub row_count: Option<usize>,
    pub hints: Vec<(&'static str, &'static str)>,
    pub bg_color: Color,
    pub key_color: Color,
    pub label_color: Color,
    pub throbber_color: Color,
    pub busy: bool,
    pub throbber_frame: u8,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            row_count: None,
            hints: Vec::new(),
            bg_color: Color::Indexed(236),
            key_color: Color::Cyan,
            label_color: Color::White,
            throbber_color: Color::Cyan,
            busy: false,
            throbber_frame: 0,
        }
    }
}

impl Controls {
    pub fn from_context(ctx: &RenderContext) -> Self {
        Self {
            bg_color: ctx.controls_bg,
            key_color: ctx.keybind_hints,
            label_color: ctx.keybind_labels,
            throbber_color: ctx.throbber,
            ..Self::default()
        }
    }

    pub fn with_hints(mut self, hints: Vec<(&'static str, &'static str)>) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_row_count(mut self, row_count: Option<usize>) -> Self {
        self.row_count = row_count;
        self
    }

    pub fn with_busy(mut self, busy: bool, throbber_frame: u8) -> Self {
        self.busy = busy;
        self.throbber_frame = throbber_frame;
        self
    }
}

const THROBBER_WIDTH: u16 = 3;
const THROBBER_FRAMES: [char; 4] = ['|', '/', '-', '\\'];

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let no_bg = self.bg_color == Color::Reset;
        if !no_bg {
            Block::default()
                .style(Style::default().bg(self.bg_color))
                .render(area, buf);
        }

        // Pairs are never shrunk; the ones that do not fit are dropped from the right.
        let pair_width = |(key, action): &(&str, &str)| -> u16 {
            (key.chars().count() as u16 + 1) + (action.chars().count() as u16 + 1)
        };
        let right_reserved = (if self.row_count.is_some() { 21 } else { 1 }) + THROBBER_WIDTH;
        let mut available = area.width.saturating_sub(right_reserved);
        let mut n_show = 0;
        for pair in &self.hints {
            let need = pair_width(pair);
            if available < need {
                break;
            }
            available -= need;
            n_show += 1;
        }

        let mut constraints: Vec<Constraint> = self
            .hints
            .iter()
            .take(n_show)
            .flat_map(|(key, action)| {
                [
                    Constraint::Length(key.chars().count() as u16 + 1),
                    Constraint::Length(action.chars().count() as u16 + 1),
                ]
            })
            .collect();
        constraints.push(Constraint::Fill(1));
        if self.row_count.is_some() {
            constraints.push(Constraint::Length(20));
        }
        constraints.push(Constraint::Length(THROBBER_WIDTH));
        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        let base = if no_bg {
            Style::default()
        } else {
            Style::default().bg(self.bg_color)
        };
        let key_style = base.fg(self.key_color);
        let label_style = base.fg(self.label_color);

        for (i, (key, action)) in self.hints.iter().take(n_show).enumerate() {
            Paragraph::new(*key).style(key_style).render(layout[i * 2], buf);
            Paragraph::new(*action)
                .style(label_style)
                .render(layout[i * 2 + 1], buf);
        }

        let fill_idx = n_show * 2;
        Paragraph::new("").style(base).render(layout[fill_idx], buf);
        if let Some(count) = self.row_count {
            Paragraph::new(format!("Rows: {}", format_number_with_commas(count)))
                .style(label_style)
                .right_aligned()
                .render(layout[fill_idx + 1], buf);
        }

        let throbber_idx = fill_idx + if self.row_count.is_some() { 2 } else { 1 };
        let throbber = if self.busy {
            THROBBER_FRAMES[self.throbber_frame as usize % THROBBER_FRAMES.len()].to_string()
        } else {
            " ".to_string()
        };
        Paragraph::new(throbber)
            .style(base.fg(self.throbber_color))
            .centered()
            .render(layout[throbber_idx], buf);
    }
}

pub fn format_number_with_commas(n: usize) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result
}
