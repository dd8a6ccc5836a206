//! Command palette: an overlay that filters the active query set as the user
//! types and hands the chosen entry back to the caller.
//!
//! The palette only selects. Loading the SQL into the buffer and running it
//! is the caller's job, driven by [`PaletteEvent::Pick`].

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget},
};

use crate::catalog::{self, QueryDef};
use crate::render::context::RenderContext;
use crate::render::layout::centered_rect_fixed;
use crate::widgets::list_cursor::ListCursor;
use crate::widgets::text_input::{TextInput, TextInputEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteEvent {
    None,
    /// Closed without a selection.
    Closed,
    /// An entry was committed; `run_now` asks for it to be run after loading.
    Pick {
        query: &'static QueryDef,
        run_now: bool,
    },
}

const PANEL_WIDTH: u16 = 84;
const PANEL_HEIGHT: u16 = 22;

/// Rows inside the panel border: search line, divider, list, description.
struct PaletteGeometry {
    panel: Rect,
    search: Rect,
    list: Rect,
    detail: Rect,
}

fn geometry(screen: Rect) -> PaletteGeometry {
    let panel = centered_rect_fixed(
        screen,
        PANEL_WIDTH.min(screen.width.saturating_sub(4)),
        PANEL_HEIGHT.min(screen.height.saturating_sub(2)),
    );
    let inner = Block::default().borders(Borders::ALL).inner(panel);
    let row = |offset: u16, height: u16| Rect {
        x: inner.x,
        y: inner.y.saturating_add(offset),
        width: inner.width,
        height,
    };
    let list_height = inner.height.saturating_sub(4);
    PaletteGeometry {
        panel,
        search: row(0, 1.min(inner.height)),
        list: row(2, list_height),
        detail: row(inner.height.saturating_sub(1), 1.min(inner.height)),
    }
}

pub struct CommandPalette {
    queries: Vec<&'static QueryDef>,
    filtered: Vec<&'static QueryDef>,
    search: TextInput,
    cursor: ListCursor,
    open: bool,
    run_on_click: bool,
}

impl CommandPalette {
    pub fn new(queries: Vec<&'static QueryDef>, run_on_click: bool) -> Self {
        let mut search = TextInput::new().with_placeholder("Search queries...");
        search.set_focused(true);
        Self {
            filtered: queries.clone(),
            queries,
            search,
            cursor: ListCursor::default(),
            open: false,
            run_on_click,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open with an empty search and the full active set.
    pub fn show(&mut self) {
        self.search.clear();
        self.refilter();
        self.open = true;
    }

    pub fn hide(&mut self) {
        self.open = false;
    }

    pub fn search_text(&self) -> &str {
        self.search.value()
    }

    pub fn filtered(&self) -> &[&'static QueryDef] {
        &self.filtered
    }

    pub fn selected(&self) -> usize {
        self.cursor.selected()
    }

    pub fn highlighted(&self) -> Option<&'static QueryDef> {
        self.filtered.get(self.cursor.selected()).copied()
    }

    /// Replace the search text and re-filter. The highlight goes back to the top.
    pub fn set_search(&mut self, text: &str) {
        self.search.set_value(text);
        self.refilter();
    }

    fn refilter(&mut self) {
        self.filtered = catalog::search(&self.queries, self.search.value());
        self.cursor.reset();
    }

    pub fn move_down(&mut self) {
        self.cursor.down(self.filtered.len());
    }

    pub fn move_up(&mut self) {
        self.cursor.up();
    }

    fn commit(&mut self, index: usize, run_now: bool) -> PaletteEvent {
        match self.filtered.get(index).copied() {
            Some(query) => {
                self.hide();
                PaletteEvent::Pick { query, run_now }
            }
            None => PaletteEvent::None,
        }
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> PaletteEvent {
        if !self.open {
            return PaletteEvent::None;
        }
        match event.code {
            KeyCode::Esc => {
                self.hide();
                PaletteEvent::Closed
            }
            KeyCode::Enter => {
                let run_now = event.modifiers.contains(KeyModifiers::SHIFT);
                self.commit(self.cursor.selected(), run_now)
            }
            KeyCode::Down => {
                self.move_down();
                PaletteEvent::None
            }
            KeyCode::Up => {
                self.move_up();
                PaletteEvent::None
            }
            _ => {
                if self.search.handle_key(event) == TextInputEvent::Changed {
                    self.refilter();
                }
                PaletteEvent::None
            }
        }
    }

    /// `screen` is the full terminal area the palette was rendered into.
    pub fn handle_mouse(&mut self, event: &MouseEvent, screen: Rect) -> PaletteEvent {
        if !self.open {
            return PaletteEvent::None;
        }
        let geo = geometry(screen);
        let pos = Position::new(event.column, event.row);
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if !geo.panel.contains(pos) {
                    self.hide();
                    return PaletteEvent::Closed;
                }
                if geo.list.contains(pos) {
                    let index = self.cursor.index_at(geo.list, event.row);
                    return self.commit(index, self.run_on_click);
                }
                PaletteEvent::None
            }
            MouseEventKind::ScrollDown => {
                self.move_down();
                PaletteEvent::None
            }
            MouseEventKind::ScrollUp => {
                self.move_up();
                PaletteEvent::None
            }
            _ => PaletteEvent::None,
        }
    }

    pub fn render(&self, screen: Rect, buf: &mut Buffer, ctx: &RenderContext) {
        if !self.open {
            return;
        }
        let geo = geometry(screen);
        Clear.render(geo.panel, buf);
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(ctx.modal_border_active))
            .title(" Queries ")
            .title_bottom(Line::from(" Enter load  Shift+Enter run  Esc close ").right_aligned())
            .render(geo.panel, buf);

        let prompt_width = 2.min(geo.search.width);
        Paragraph::new("> ")
            .style(Style::default().fg(ctx.keybind_hints))
            .render(Rect { width: prompt_width, ..geo.search }, buf);
        (&self.search).render(
            Rect {
                x: geo.search.x + prompt_width,
                width: geo.search.width - prompt_width,
                ..geo.search
            },
            buf,
        );

        if self.filtered.is_empty() {
            Paragraph::new("No matching queries.")
                .style(Style::default().fg(ctx.dimmed))
                .render(geo.list, buf);
            return;
        }

        let offset = self.cursor.offset(geo.list.height);
        for (row, (index, query)) in self
            .filtered
            .iter()
            .enumerate()
            .skip(offset)
            .take(geo.list.height as usize)
            .enumerate()
        {
            let area = Rect {
                y: geo.list.y + row as u16,
                height: 1,
                ..geo.list
            };
            let hotkey = query
                .hotkey
                .map(|k| format!("[{}] ", k))
                .unwrap_or_else(|| "    ".to_string());
            let line = Line::from(vec![
                Span::styled(hotkey, Style::default().fg(ctx.keybind_hints)),
                Span::raw(query.title),
                Span::styled(
                    format!("  {}", query.group.label()),
                    Style::default().fg(ctx.text_secondary),
                ),
            ]);
            let style = if index == self.cursor.selected() {
                ctx.selected_style()
            } else {
                Style::default().fg(ctx.text_primary)
            };
            Paragraph::new(line).style(style).render(area, buf);
        }

        if let Some(query) = self.highlighted() {
            Paragraph::new(query.description)
                .style(Style::default().fg(ctx.text_secondary))
                .render(geo.detail, buf);
        }
    }
}
