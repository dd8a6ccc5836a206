use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use packbench::catalog::{QueryDef, QueryGroup};
use packbench::palette::{CommandPalette, PaletteEvent};
use packbench::render::RenderContext;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

const fn entry(
    id: &'static str,
    title: &'static str,
    tags: &'static [&'static str],
    group: QueryGroup,
) -> QueryDef {
    QueryDef {
        id,
        title,
        description: "",
        tags,
        group,
        sql: "SELECT 1",
        hotkey: None,
        featured: false,
        modes: None,
    }
}

/// Ten entries; exactly two mention "country".
static TEN: &[QueryDef] = &[
    entry("t.schema", "Schema discovery", &["schema"], QueryGroup::Overview),
    entry("t.first", "First releases", &["preview"], QueryGroup::Releases),
    entry("t.by_country", "Releases per country", &["aggregation"], QueryGroup::Releases),
    entry("t.keyword", "Search by keyword", &["like"], QueryGroup::Releases),
    entry("t.labels", "Top labels", &["labels"], QueryGroup::Releases),
    entry("t.join_label", "Join labels", &["join"], QueryGroup::Releases),
    entry("t.origin", "Artist origins", &["country", "geo"], QueryGroup::Artists),
    entry("t.aliases", "Aliases", &["names"], QueryGroup::Artists),
    entry("t.groups", "Largest groups", &["members"], QueryGroup::Memberships),
    entry("t.context", "Full context", &["join"], QueryGroup::Showcase),
];

fn ten() -> Vec<&'static QueryDef> {
    TEN.iter().collect()
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn type_text(palette: &mut CommandPalette, text: &str) {
    for c in text.chars() {
        palette.handle_key(&key(KeyCode::Char(c)));
    }
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
fn test_search_narrows_clamps_and_commits() {
    let mut palette = CommandPalette::new(ten(), true);
    palette.show();
    assert_eq!(palette.filtered().len(), 10);

    type_text(&mut palette, "country");
    assert_eq!(palette.search_text(), "country");
    let ids: Vec<&str> = palette.filtered().iter().map(|q| q.id).collect();
    assert_eq!(ids, vec!["t.by_country", "t.origin"]);
    assert_eq!(palette.selected(), 0);

    palette.handle_key(&key(KeyCode::Down));
    palette.handle_key(&key(KeyCode::Down));
    assert_eq!(palette.selected(), 1);

    match palette.handle_key(&key(KeyCode::Enter)) {
        PaletteEvent::Pick { query, run_now } => {
            assert_eq!(query.id, "t.origin");
            assert!(!run_now);
        }
        other => panic!("expected pick, got {:?}", other),
    }
    assert!(!palette.is_open());
}

#[test]
fn test_up_clamps_at_top() {
    let mut palette = CommandPalette::new(ten(), false);
    palette.show();
    palette.handle_key(&key(KeyCode::Up));
    assert_eq!(palette.selected(), 0);
    for _ in 0..20 {
        palette.move_down();
    }
    assert_eq!(palette.selected(), 9);
}

#[test]
fn test_editing_search_resets_highlight() {
    let mut palette = CommandPalette::new(ten(), false);
    palette.show();
    palette.move_down();
    palette.move_down();
    type_text(&mut palette, "j");
    assert_eq!(palette.selected(), 0);
    palette.handle_key(&key(KeyCode::Backspace));
    assert_eq!(palette.filtered().len(), 10);
    assert_eq!(palette.selected(), 0);
}

#[test]
fn test_enter_with_no_matches_keeps_palette_open() {
    let mut palette = CommandPalette::new(ten(), false);
    palette.show();
    type_text(&mut palette, "zzz");
    assert!(palette.filtered().is_empty());
    assert!(palette.highlighted().is_none());
    assert_eq!(palette.handle_key(&key(KeyCode::Enter)), PaletteEvent::None);
    assert!(palette.is_open());
}

#[test]
fn test_reopening_clears_search() {
    let mut palette = CommandPalette::new(ten(), false);
    palette.show();
    type_text(&mut palette, "country");
    assert_eq!(palette.handle_key(&key(KeyCode::Esc)), PaletteEvent::Closed);
    palette.show();
    assert_eq!(palette.search_text(), "");
    assert_eq!(palette.filtered().len(), 10);
}

#[test]
fn test_click_on_row_uses_click_behaviour() {
    let screen = Rect::new(0, 0, 120, 40);
    for run_on_click in [true, false] {
        let mut palette = CommandPalette::new(ten(), run_on_click);
        palette.show();
        // panel is 84x22 centred: inner list starts three rows below its top edge
        let top = (screen.height - 22) / 2;
        match palette.handle_mouse(&click(60, top + 3), screen) {
            PaletteEvent::Pick { query, run_now } => {
                assert_eq!(query.id, "t.schema");
                assert_eq!(run_now, run_on_click);
            }
            other => panic!("expected pick, got {:?}", other),
        }
    }
}

#[test]
fn test_click_outside_closes() {
    let screen = Rect::new(0, 0, 120, 40);
    let mut palette = CommandPalette::new(ten(), true);
    palette.show();
    assert_eq!(palette.handle_mouse(&click(0, 0), screen), PaletteEvent::Closed);
    assert!(!palette.is_open());
}

#[test]
fn test_render_lists_entries() {
    let screen = Rect::new(0, 0, 120, 40);
    let mut palette = CommandPalette::new(ten(), true);
    palette.show();
    let mut buf = Buffer::empty(screen);
    palette.render(screen, &mut buf, &RenderContext::default());
    let text: String = buf.content().iter().map(|c| c.symbol()).collect();
    assert!(text.contains("Schema discovery"));
    assert!(text.contains("Releases per country"));
}
