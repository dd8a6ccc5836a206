use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, StatefulWidget, Widget};
use ratatui::buffer::Buffer;
use std::sync::Arc;
use tracing::debug;

pub mod cache;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod error_display;
pub mod fetch;
pub mod palette;
pub mod render;
pub mod sidebar;
pub mod source;
pub mod widgets;
pub mod workbench;

pub use cache::CacheManager;
pub use config::{AppConfig, ColorParser, ConfigManager, OutputFormat, Theme};
pub use error::WorkbenchError;
pub use packbench_cli::{Args, Mode};
pub use workbench::Workbench;

use catalog::QueryDef;
use palette::{CommandPalette, PaletteEvent};
use render::{app_layout, centered_rect_fixed, workbench_layout, AppLayout, RenderContext, WorkbenchLayout};
use sidebar::{FeaturedCards, QueryPick, QuerySidebar};
use widgets::controls::Controls;
use widgets::debug::DebugState;
use widgets::results::{ResultsState, ResultsView};
use widgets::sql_editor::SqlEditor;
use widgets::text_input::TextInputEvent;
use workbench::{Output, PendingOp, StatusKind};

/// Application name used for the config and cache directories
pub const APP_NAME: &str = "packbench";

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16), // resized (width, height)
    /// Performs the load after the UI has shown the working status.
    DoLoadDataset,
    /// Runs the SQL buffer after the UI has shown the working status.
    DoRunQuery,
    /// Showcase card: load if needed, then run.
    DoOpenFeatured(&'static QueryDef),
    Exit,
    Crash(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Editor,
    Output,
    Cards,
}

pub struct App {
    workbench: Arc<Workbench>,
    mode: Mode,
    palette: CommandPalette,
    sidebar: QuerySidebar,
    cards: FeaturedCards,
    editor: SqlEditor,
    editor_revision: u64,
    results: ResultsState,
    output_format: OutputFormat,
    focus: Focus,
    show_help: bool,
    area: Rect,
    ctx: RenderContext,
    pub debug: DebugState,
}

const EXPLORE_HINTS: &[(&str, &str)] = &[
    ("^K", "Palette"),
    ("^R", "Run"),
    ("^L", "Load"),
    ("Tab", "Focus"),
    ("^T", "Table/JSON"),
    ("F1", "Help"),
    ("^Q", "Quit"),
];

const SHOWCASE_HINTS: &[(&str, &str)] = &[
    ("←→", "Select"),
    ("Enter", "Run"),
    ("^L", "Load"),
    ("^T", "Table/JSON"),
    ("F1", "Help"),
    ("q", "Quit"),
];

const EXPLORE_HELP: &[(&str, &str)] = &[
    ("Ctrl+K", "Open or close the query palette"),
    ("Enter", "Palette / sidebar: load the highlighted query"),
    ("Shift+Enter", "Palette: load and run the highlighted query"),
    ("Ctrl+Enter, Ctrl+R, Ctrl+J", "Run the SQL buffer"),
    ("Alt+0..9", "Run the query with that hotkey"),
    ("Ctrl+L", "Load the dataset pack"),
    ("Tab / Shift+Tab", "Move focus: sidebar, editor, output"),
    ("Ctrl+T, F2", "Show results as a table or as JSON"),
    ("Arrows, PgUp/PgDn", "Scroll the output pane"),
    ("F1, Ctrl+H", "Toggle this help"),
    ("Ctrl+Q", "Quit"),
];

const SHOWCASE_HELP: &[(&str, &str)] = &[
    ("Left / Right / Tab", "Select a demo card"),
    ("Enter", "Run the selected demo (loads the dataset first)"),
    ("Ctrl+L", "Load the dataset pack"),
    ("Up / Down, PgUp/PgDn", "Scroll the output pane"),
    ("Ctrl+T, F2", "Show results as a table or as JSON"),
    ("F1, Ctrl+H", "Toggle this help"),
    ("q, Esc", "Quit"),
];

impl App {
    pub fn new(workbench: Arc<Workbench>, config: &AppConfig, theme: &Theme) -> App {
        let mode = workbench.mode();
        let active = workbench.active_queries().to_vec();
        let run_on_click = config.workbench.run_on_click;
        let mut app = App {
            palette: CommandPalette::new(active.clone(), run_on_click),
            sidebar: QuerySidebar::new(active.clone()),
            cards: FeaturedCards::new(&active),
            editor: SqlEditor::new(mode == Mode::Showcase).with_theme(theme),
            editor_revision: 0,
            results: ResultsState::default(),
            output_format: config.display.output_format,
            focus: match mode {
                Mode::Explore => Focus::Editor,
                Mode::Showcase => Focus::Cards,
            },
            show_help: false,
            area: Rect::default(),
            ctx: RenderContext::from_theme(theme),
            debug: DebugState {
                show_timings: config.debug.show_timings,
                ..DebugState::default()
            },
            workbench,
            mode,
        };
        app.apply_focus();
        app
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn workbench(&self) -> &Workbench {
        &self.workbench
    }

    pub fn editor(&self) -> &SqlEditor {
        &self.editor
    }

    pub fn palette(&self) -> &CommandPalette {
        &self.palette
    }

    pub fn sidebar(&self) -> &QuerySidebar {
        &self.sidebar
    }

    pub fn cards(&self) -> &FeaturedCards {
        &self.cards
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn help_visible(&self) -> bool {
        self.show_help
    }

    fn apply_focus(&mut self) {
        self.sidebar.set_focused(self.focus == Focus::Sidebar);
        self.editor.set_focused(self.focus == Focus::Editor);
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.apply_focus();
    }

    fn cycle_focus(&mut self, forward: bool) {
        let order = [Focus::Sidebar, Focus::Editor, Focus::Output];
        let idx = order.iter().position(|f| *f == self.focus).unwrap_or(1);
        let next = if forward {
            (idx + 1) % order.len()
        } else {
            (idx + order.len() - 1) % order.len()
        };
        self.set_focus(order[next]);
    }

    /// Pull the buffer into the editor when the workbench replaced it.
    fn sync_editor(&mut self) {
        let revision = self.workbench.buffer_revision();
        if revision != self.editor_revision {
            self.editor.set_value(&self.workbench.sql());
            self.editor_revision = revision;
        }
    }

    /// Push editor text into the workbench buffer.
    fn push_editor(&mut self) {
        if self.mode == Mode::Explore {
            // Showcase editors are read-only; nothing to push
            if self.workbench.set_sql(&self.editor.value()).is_ok() {
                self.editor_revision = self.workbench.buffer_revision();
            }
        }
    }

    fn request_load(&mut self) -> Option<AppEvent> {
        self.debug.last_action = "load_dataset".to_string();
        if self.workbench.engine_failed() {
            self.workbench.reset_engine();
        }
        self.workbench.prepare(PendingOp::Load);
        Some(AppEvent::DoLoadDataset)
    }

    fn request_run(&mut self) -> Option<AppEvent> {
        self.debug.last_action = "run_query".to_string();
        self.push_editor();
        self.workbench.prepare(PendingOp::Run);
        Some(AppEvent::DoRunQuery)
    }

    /// Load a catalog entry into the buffer, then run it if asked.
    fn pick(&mut self, query: &'static QueryDef, run_now: bool) -> Option<AppEvent> {
        debug!(query = query.id, run_now, "catalog pick");
        self.debug.last_action = format!("pick {}", query.id);
        // Applying without running cannot fail
        let _ = self.workbench.apply_query(query, false);
        self.sync_editor();
        if run_now {
            self.request_run()
        } else {
            None
        }
    }

    fn open_card(&mut self, pick: QueryPick) -> Option<AppEvent> {
        self.debug.last_action = format!("card {}", pick.query.id);
        let op = if self.workbench.is_loaded() {
            PendingOp::Run
        } else {
            PendingOp::Load
        };
        self.workbench.prepare(op);
        Some(AppEvent::DoOpenFeatured(pick.query))
    }

    fn scroll_output(&mut self, rows: isize, cols: isize) {
        let (height, width) = match self.workbench.output() {
            Output::Table(result) => (result.df.height(), result.df.width()),
            Output::Message { text, .. } => (text.lines().count(), 1),
            Output::Empty => (0, 0),
        };
        // JSON output has roughly one line per field per row
        let height = if self.output_format == OutputFormat::Json {
            height.saturating_mul(width.max(1) + 2)
        } else {
            height
        };
        if rows != 0 {
            self.results.scroll_rows(rows, height);
        }
        if cols != 0 {
            self.results.scroll_cols(cols, width);
        }
    }

    fn output_key(&mut self, event: &KeyEvent) -> bool {
        match event.code {
            KeyCode::Down => self.scroll_output(1, 0),
            KeyCode::Up => self.scroll_output(-1, 0),
            KeyCode::PageDown => self.scroll_output(10, 0),
            KeyCode::PageUp => self.scroll_output(-10, 0),
            KeyCode::Home => self.results.reset(),
            KeyCode::Right if self.mode == Mode::Explore => self.scroll_output(0, 1),
            KeyCode::Left if self.mode == Mode::Explore => self.scroll_output(0, -1),
            _ => return false,
        }
        true
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        self.debug.on_key(event);
        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
        let alt = event.modifiers.contains(KeyModifiers::ALT);

        if self.show_help {
            match event.code {
                KeyCode::Esc | KeyCode::F(1) | KeyCode::Enter => self.show_help = false,
                KeyCode::Char('h') if ctrl => self.show_help = false,
                KeyCode::Char('q') if ctrl => return Some(AppEvent::Exit),
                _ => {}
            }
            return None;
        }

        if self.palette.is_open() {
            if ctrl && event.code == KeyCode::Char('k') {
                self.palette.hide();
                return None;
            }
            return match self.palette.handle_key(event) {
                PaletteEvent::Pick { query, run_now } => self.pick(query, run_now),
                PaletteEvent::Closed | PaletteEvent::None => None,
            };
        }

        // Global bindings
        match event.code {
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => return Some(AppEvent::Exit),
            KeyCode::F(1) => {
                self.show_help = true;
                return None;
            }
            KeyCode::Char('h') if ctrl => {
                self.show_help = true;
                return None;
            }
            KeyCode::Char('l') if ctrl => return self.request_load(),
            KeyCode::Char('t') if ctrl => {
                self.output_format = self.output_format.toggle();
                self.results.reset();
                return None;
            }
            KeyCode::F(2) => {
                self.output_format = self.output_format.toggle();
                self.results.reset();
                return None;
            }
            _ => {}
        }

        match self.mode {
            Mode::Explore => self.explore_key(event, ctrl, alt),
            Mode::Showcase => self.showcase_key(event),
        }
    }

    fn explore_key(&mut self, event: &KeyEvent, ctrl: bool, alt: bool) -> Option<AppEvent> {
        match event.code {
            KeyCode::Char('k') if ctrl => {
                self.palette.show();
                return None;
            }
            KeyCode::Char('r') if ctrl => return self.request_run(),
            // without keyboard enhancement Ctrl+Enter arrives as LF, i.e. Ctrl+J
            KeyCode::Enter | KeyCode::Char('j') if ctrl => return self.request_run(),
            KeyCode::Char(c) if alt && c.is_ascii_digit() => {
                return match catalog::find_by_hotkey(self.workbench.active_queries(), c) {
                    Some(query) => self.pick(query, true),
                    None => None,
                };
            }
            KeyCode::Tab => {
                self.cycle_focus(true);
                return None;
            }
            KeyCode::BackTab => {
                self.cycle_focus(false);
                return None;
            }
            _ => {}
        }

        match self.focus {
            Focus::Sidebar => self
                .sidebar
                .handle_key(event)
                .and_then(|pick| self.pick(pick.query, pick.run_now)),
            Focus::Editor => {
                if self.editor.handle_key(event) == TextInputEvent::Changed {
                    self.push_editor();
                }
                None
            }
            Focus::Output | Focus::Cards => {
                self.output_key(event);
                None
            }
        }
    }

    fn showcase_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        match event.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Exit),
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab | KeyCode::Enter => {
                self.cards
                    .handle_key(event)
                    .and_then(|pick| self.open_card(pick))
            }
            _ => {
                self.output_key(event);
                None
            }
        }
    }

    fn panes(&self) -> (AppLayout, WorkbenchLayout) {
        let outer = app_layout(self.area, self.debug.enabled);
        let inner = workbench_layout(
            outer.main_view,
            self.mode == Mode::Explore,
            self.mode == Mode::Showcase,
        );
        (outer, inner)
    }

    fn mouse(&mut self, event: &MouseEvent) -> Option<AppEvent> {
        if self.show_help {
            if matches!(event.kind, MouseEventKind::Down(_)) {
                self.show_help = false;
            }
            return None;
        }
        if self.palette.is_open() {
            return match self.palette.handle_mouse(event, self.area) {
                PaletteEvent::Pick { query, run_now } => self.pick(query, run_now),
                PaletteEvent::Closed | PaletteEvent::None => None,
            };
        }

        let (_, panes) = self.panes();
        let pos = Position::new(event.column, event.row);
        match event.kind {
            MouseEventKind::ScrollDown if panes.output.contains(pos) => {
                self.scroll_output(3, 0);
                None
            }
            MouseEventKind::ScrollUp if panes.output.contains(pos) => {
                self.scroll_output(-3, 0);
                None
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(area) = panes.sidebar.filter(|a| a.contains(pos)) {
                    self.set_focus(Focus::Sidebar);
                    return self
                        .sidebar
                        .handle_mouse(event, area)
                        .and_then(|pick| self.pick(pick.query, pick.run_now));
                }
                if let Some(area) = panes.cards.filter(|a| a.contains(pos)) {
                    self.set_focus(Focus::Cards);
                    return self
                        .cards
                        .handle_mouse(event, area)
                        .and_then(|pick| self.open_card(pick));
                }
                if panes.editor.contains(pos) && self.mode == Mode::Explore {
                    self.set_focus(Focus::Editor);
                } else if panes.output.contains(pos) && self.mode == Mode::Explore {
                    self.set_focus(Focus::Output);
                }
                None
            }
            _ => None,
        }
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;
        match event {
            AppEvent::Key(key) => self.key(key),
            AppEvent::Mouse(mouse) => self.mouse(mouse),
            AppEvent::Resize(cols, rows) => {
                self.area = Rect::new(0, 0, *cols, *rows);
                None
            }
            AppEvent::DoLoadDataset => {
                // Failures are reported through the status line and output pane
                let _ = self.workbench.load_dataset();
                self.results.reset();
                None
            }
            AppEvent::DoRunQuery => {
                let _ = self.workbench.run_query();
                self.results.reset();
                None
            }
            AppEvent::DoOpenFeatured(query) => {
                let _ = self.workbench.open_featured(query);
                self.sync_editor();
                self.results.reset();
                None
            }
            AppEvent::Exit | AppEvent::Crash(_) => None,
        }
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let status = self.workbench.status();
        let color = match status.kind {
            StatusKind::Info => self.ctx.text_primary,
            StatusKind::Working => self.ctx.throbber,
            StatusKind::Success => self.ctx.success,
            StatusKind::Warning => self.ctx.warning,
            StatusKind::Error => self.ctx.error,
        };
        let mut spans = vec![
            Span::styled(
                format!(" {} ", APP_NAME),
                Style::default()
                    .fg(self.ctx.keybind_hints)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("[{}] ", self.mode),
                Style::default().fg(self.ctx.text_secondary),
            ),
            Span::styled(status.text, Style::default().fg(color)),
        ];
        if let Some(pack) = self.workbench.pack_name() {
            spans.push(Span::styled(
                format!("  {}", pack),
                Style::default().fg(self.ctx.dimmed),
            ));
        }
        Paragraph::new(Line::from(spans)).render(area, buf);
    }

    fn render_help(&self, area: Rect, buf: &mut Buffer) {
        let entries = match self.mode {
            Mode::Explore => EXPLORE_HELP,
            Mode::Showcase => SHOWCASE_HELP,
        };
        let key_width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0) + 2;
        let lines: Vec<Line> = entries
            .iter()
            .map(|(key, text)| {
                Line::from(vec![
                    Span::styled(
                        format!("{:width$}", key, width = key_width),
                        Style::default().fg(self.ctx.keybind_hints),
                    ),
                    Span::styled(*text, Style::default().fg(self.ctx.text_primary)),
                ])
            })
            .collect();
        let popup = centered_rect_fixed(area, 72, lines.len() as u16 + 2);
        Clear.render(popup, buf);
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(self.ctx.modal_border_active))
                    .title(" Help "),
            )
            .render(popup, buf);
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;
        self.area = area;
        let (outer, panes) = self.panes();

        self.render_status(outer.status, buf);

        if let Some(sidebar) = panes.sidebar {
            self.sidebar.render(sidebar, buf, &self.ctx);
        }
        if let Some(cards) = panes.cards {
            self.cards.render(cards, buf, &self.ctx);
        }
        (&self.editor).render(panes.editor, buf);

        let output = self.workbench.output();
        let row_count = match &output {
            Output::Table(result) => Some(result.total_rows),
            _ => None,
        };
        ResultsView::new(&output, self.output_format, &self.ctx)
            .focused(self.focus == Focus::Output)
            .render(panes.output, buf, &mut self.results);

        let hints = match self.mode {
            Mode::Explore => EXPLORE_HINTS,
            Mode::Showcase => SHOWCASE_HINTS,
        };
        let busy = self.workbench.status().kind == StatusKind::Working;
        (&Controls::from_context(&self.ctx)
            .with_hints(hints.to_vec())
            .with_row_count(row_count)
            .with_busy(busy, (self.debug.num_frames % 4) as u8))
            .render(outer.control_bar, buf);

        if let Some(debug_area) = outer.debug {
            self.debug.phase = self.workbench.phase().to_string();
            self.debug.bundle = self.workbench.engine_bundle();
            self.debug.query_ms = match &output {
                Output::Table(result) => Some(result.elapsed.as_millis()),
                _ => None,
            };
            (&self.debug).render(debug_area, buf);
        }

        self.palette.render(area, buf, &self.ctx);
        if self.show_help {
            self.render_help(area, buf);
        }
    }
}
