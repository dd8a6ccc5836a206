//! Persistent catalog views: the searchable query sidebar (explore) and the
//! featured demo cards (showcase).

use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget, Wrap},
};

use crate::catalog::{self, QueryDef};
use crate::render::context::RenderContext;
use crate::widgets::list_cursor::ListCursor;
use crate::widgets::text_input::{TextInput, TextInputEvent};

/// A catalog entry chosen from the sidebar or a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPick {
    pub query: &'static QueryDef,
    pub run_now: bool,
}

pub struct QuerySidebar {
    queries: Vec<&'static QueryDef>,
    filtered: Vec<&'static QueryDef>,
    search: TextInput,
    cursor: ListCursor,
    focused: bool,
}

impl QuerySidebar {
    pub fn new(queries: Vec<&'static QueryDef>) -> Self {
        Self {
            filtered: queries.clone(),
            queries,
            search: TextInput::new().with_placeholder("Search..."),
            cursor: ListCursor::default(),
            focused: false,
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        self.search.set_focused(focused);
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn filtered(&self) -> &[&'static QueryDef] {
        &self.filtered
    }

    pub fn selected(&self) -> usize {
        self.cursor.selected()
    }

    pub fn search_text(&self) -> &str {
        self.search.value()
    }

    pub fn set_search(&mut self, text: &str) {
        self.search.set_value(text);
        self.refilter();
    }

    fn refilter(&mut self) {
        self.filtered = catalog::search(&self.queries, self.search.value());
        self.cursor.reset();
    }

    fn pick(&self, index: usize, run_now: bool) -> Option<QueryPick> {
        self.filtered
            .get(index)
            .map(|&query| QueryPick { query, run_now })
    }

    /// Enter loads the highlighted entry without running it.
    pub fn handle_key(&mut self, event: &KeyEvent) -> Option<QueryPick> {
        match event.code {
            KeyCode::Enter => self.pick(self.cursor.selected(), false),
            KeyCode::Down => {
                self.cursor.down(self.filtered.len());
                None
            }
            KeyCode::Up => {
                self.cursor.up();
                None
            }
            KeyCode::Esc => {
                if !self.search.is_empty() {
                    self.set_search("");
                }
                None
            }
            _ => {
                if self.search.handle_key(event) == TextInputEvent::Changed {
                    self.refilter();
                }
                None
            }
        }
    }

    /// `area` is where the sidebar was last rendered. A click loads without running.
    pub fn handle_mouse(&mut self, event: &MouseEvent, area: Rect) -> Option<QueryPick> {
        let list = list_area(area);
        if !matches!(event.kind, MouseEventKind::Down(MouseButton::Left))
            || !list.contains(Position::new(event.column, event.row))
        {
            return None;
        }
        let index = self.cursor.index_at(list, event.row);
        self.cursor.select(index, self.filtered.len());
        self.pick(index, false)
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, ctx: &RenderContext) {
        let border = if self.focused {
            ctx.modal_border_active
        } else {
            ctx.sidebar_border
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Queries ")
            .border_style(Style::default().fg(border));
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.height == 0 {
            return;
        }

        (&self.search).render(Rect { height: 1, ..inner }, buf);

        let list = list_area(area);
        if self.filtered.is_empty() {
            Paragraph::new("No matching queries.")
                .style(Style::default().fg(ctx.dimmed))
                .render(list, buf);
            return;
        }
        let offset = self.cursor.offset(list.height);
        for (row, (index, query)) in self
            .filtered
            .iter()
            .enumerate()
            .skip(offset)
            .take(list.height as usize)
            .enumerate()
        {
            let style = if index == self.cursor.selected() {
                ctx.selected_style()
            } else {
                Style::default().fg(ctx.text_primary)
            };
            let hotkey = query.hotkey.map(|k| format!("{} ", k)).unwrap_or_default();
            Paragraph::new(Line::from(vec![
                Span::styled(hotkey, Style::default().fg(ctx.keybind_hints)),
                Span::raw(query.title),
            ]))
            .style(style)
            .render(
                Rect {
                    y: list.y + row as u16,
                    height: 1,
                    ..list
                },
                buf,
            );
        }
    }
}

/// List rows below the search line and its divider.
fn list_area(area: Rect) -> Rect {
    let inner = Block::default().borders(Borders::ALL).inner(area);
    Rect {
        y: inner.y.saturating_add(2),
        height: inner.height.saturating_sub(2),
        ..inner
    }
}

const CARD_MIN_WIDTH: u16 = 22;

/// Featured demo cards. The set is fixed for the session; Enter or a click
/// loads the card's query and runs it.
pub struct FeaturedCards {
    cards: Vec<&'static QueryDef>,
    selected: usize,
}

impl FeaturedCards {
    pub fn new(active: &[&'static QueryDef]) -> Self {
        Self {
            cards: catalog::featured(active),
            selected: 0,
        }
    }

    pub fn cards(&self) -> &[&'static QueryDef] {
        &self.cards
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        if !self.cards.is_empty() {
            self.selected = (self.selected + 1) % self.cards.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.cards.is_empty() {
            self.selected = (self.selected + self.cards.len() - 1) % self.cards.len();
        }
    }

    fn pick(&self, index: usize) -> Option<QueryPick> {
        self.cards.get(index).map(|&query| QueryPick {
            query,
            run_now: true,
        })
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> Option<QueryPick> {
        match event.code {
            KeyCode::Right | KeyCode::Tab => {
                self.select_next();
                None
            }
            KeyCode::Left | KeyCode::BackTab => {
                self.select_prev();
                None
            }
            KeyCode::Enter => self.pick(self.selected),
            _ => None,
        }
    }

    pub fn handle_mouse(&mut self, event: &MouseEvent, area: Rect) -> Option<QueryPick> {
        if !matches!(event.kind, MouseEventKind::Down(MouseButton::Left)) {
            return None;
        }
        let pos = Position::new(event.column, event.row);
        let hit = self
            .card_rects(area)
            .into_iter()
            .find(|(_, rect)| rect.contains(pos))
            .map(|(index, _)| index)?;
        self.selected = hit;
        self.pick(hit)
    }

    /// Visible cards and their areas. Cards scroll so the selected one is shown.
    fn card_rects(&self, area: Rect) -> Vec<(usize, Rect)> {
        if self.cards.is_empty() || area.width == 0 {
            return Vec::new();
        }
        let per_row = (area.width / CARD_MIN_WIDTH).max(1) as usize;
        let visible = per_row.min(self.cards.len());
        let first = self.selected.saturating_sub(visible - 1);
        let width = area.width / visible as u16;
        (0..visible)
            .map(|i| {
                let rect = Rect {
                    x: area.x + width * i as u16,
                    width,
                    ..area
                };
                (first + i, rect)
            })
            .collect()
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, ctx: &RenderContext) {
        if self.cards.is_empty() {
            Paragraph::new("No featured demos found.")
                .style(Style::default().fg(ctx.dimmed))
                .block(Block::default().borders(Borders::ALL))
                .render(area, buf);
            return;
        }
        for (index, rect) in self.card_rects(area) {
            let query = self.cards[index];
            let selected = index == self.selected;
            let border = if selected {
                Style::default()
                    .fg(ctx.card_selected)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(ctx.card_border)
            };
            Paragraph::new(vec![
                Line::from(Span::styled(
                    query.description,
                    Style::default().fg(ctx.text_secondary),
                )),
                Line::from(Span::styled(
                    query.tags.join(" · "),
                    Style::default().fg(ctx.dimmed),
                )),
            ])
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(if selected {
                        BorderType::Thick
                    } else {
                        BorderType::Rounded
                    })
                    .border_style(border)
                    .title(Span::styled(
                        format!(" {} ", query.title),
                        Style::default().fg(ctx.text_primary),
                    )),
            )
            .render(rect, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{active_queries, QUERY_PACK};
    use crate::Mode;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_sidebar_enter_loads_only() {
        let mut sidebar = QuerySidebar::new(active_queries(QUERY_PACK, Mode::Explore));
        sidebar.handle_key(&key(KeyCode::Down));
        let pick = sidebar.handle_key(&key(KeyCode::Enter)).unwrap();
        assert_eq!(pick.query.id, "explore.releases.first20");
        assert!(!pick.run_now);
    }

    #[test]
    fn test_sidebar_search_refilters() {
        let mut sidebar = QuerySidebar::new(active_queries(QUERY_PACK, Mode::Explore));
        for c in "zzz-no-match".chars() {
            sidebar.handle_key(&key(KeyCode::Char(c)));
        }
        assert!(sidebar.filtered().is_empty());
        assert_eq!(sidebar.handle_key(&key(KeyCode::Enter)), None);
        sidebar.handle_key(&key(KeyCode::Esc));
        assert_eq!(sidebar.search_text(), "");
        assert_eq!(sidebar.filtered().len(), 10);
    }

    #[test]
    fn test_sidebar_click_selects_row() {
        let mut sidebar = QuerySidebar::new(active_queries(QUERY_PACK, Mode::Explore));
        let area = Rect::new(0, 0, 36, 20);
        // border row, search row, divider row, then the list
        let pick = sidebar.handle_mouse(&click(3, 4), area).unwrap();
        assert_eq!(pick.query.id, "explore.releases.first20");
        assert_eq!(sidebar.selected(), 1);
        assert!(!pick.run_now);
    }

    #[test]
    fn test_cards_wrap_and_run() {
        let active = active_queries(QUERY_PACK, Mode::Showcase);
        let mut cards = FeaturedCards::new(&active);
        assert_eq!(cards.cards().len(), 5);
        cards.handle_key(&key(KeyCode::Left));
        assert_eq!(cards.selected(), 4);
        cards.handle_key(&key(KeyCode::Right));
        assert_eq!(cards.selected(), 0);
        let pick = cards.handle_key(&key(KeyCode::Enter)).unwrap();
        assert!(pick.run_now);
        assert_eq!(pick.query.id, "overview.tables");
    }

    #[test]
    fn test_cards_click() {
        let active = active_queries(QUERY_PACK, Mode::Showcase);
        let mut cards = FeaturedCards::new(&active);
        let area = Rect::new(0, 0, 110, 6);
        let pick = cards.handle_mouse(&click(25, 2), area).unwrap();
        assert_eq!(pick.query.id, "releases.top_countries");
        assert_eq!(cards.selected(), 1);
    }

    #[test]
    fn test_empty_cards_render_message() {
        let cards = FeaturedCards::new(&[]);
        assert!(cards.is_empty());
        let area = Rect::new(0, 0, 40, 3);
        let mut buf = Buffer::empty(area);
        cards.render(area, &mut buf, &RenderContext::default());
        let text: String = (0..area.width)
            .map(|x| buf[(x, 1)].symbol().to_string())
            .collect();
        assert!(text.contains("No featured demos found."));
    }
}
