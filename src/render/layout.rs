use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Top-level layout: status line, main view, control bar, optional debug row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppLayout {
    pub status: Rect,
    pub main_view: Rect,
    pub control_bar: Rect,
    pub debug: Option<Rect>,
}

pub fn app_layout(area: Rect, debug_enabled: bool) -> AppLayout {
    let mut constraints = vec![
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ];
    if debug_enabled {
        constraints.push(Constraint::Length(1));
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    AppLayout {
        status: layout[0],
        main_view: layout[1],
        control_bar: layout[2],
        debug: debug_enabled.then(|| layout[3]),
    }
}

/// Panes inside the main view. Explore mode has a sidebar; showcase has a
/// row of featured cards above the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkbenchLayout {
    pub sidebar: Option<Rect>,
    pub cards: Option<Rect>,
    pub editor: Rect,
    pub output: Rect,
}

pub const SIDEBAR_WIDTH: u16 = 36;
pub const CARDS_HEIGHT: u16 = 6;

pub fn workbench_layout(main_view: Rect, show_sidebar: bool, show_cards: bool) -> WorkbenchLayout {
    let (sidebar, work) = if show_sidebar && main_view.width > SIDEBAR_WIDTH * 2 {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)])
            .split(main_view);
        (Some(cols[0]), cols[1])
    } else {
        (None, main_view)
    };

    if show_cards {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(CARDS_HEIGHT),
                Constraint::Percentage(30),
                Constraint::Fill(1),
            ])
            .split(work);
        WorkbenchLayout {
            sidebar,
            cards: Some(rows[0]),
            editor: rows[1],
            output: rows[2],
        }
    } else {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Fill(1)])
            .split(work);
        WorkbenchLayout {
            sidebar,
            cards: None,
            editor: rows[0],
            output: rows[1],
        }
    }
}

/// Centered rect within `r` with given percentage width and height.
pub fn centered_rect(r: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Centered rect with fixed width and height, clamped to fit inside `r`.
pub fn centered_rect_fixed(r: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(r.width);
    let h = height.min(r.height);
    Rect {
        x: r.x + r.width.saturating_sub(w) / 2,
        y: r.y + r.height.saturating_sub(h) / 2,
        width: w,
        height: h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_layout_minimal() {
        let layout = app_layout(Rect::new(0, 0, 100, 50), false);
        assert_eq!(layout.status.height, 1);
        assert_eq!(layout.status.y, 0);
        assert_eq!(layout.main_view.height, 48);
        assert_eq!(layout.control_bar.y, 49);
        assert_eq!(layout.debug, None);
    }

    #[test]
    fn test_app_layout_with_debug() {
        let layout = app_layout(Rect::new(0, 0, 100, 50), true);
        assert_eq!(layout.main_view.height, 47);
        assert_eq!(layout.control_bar.y, 48);
        assert_eq!(layout.debug.map(|d| d.y), Some(49));
    }

    #[test]
    fn test_workbench_layout_explore() {
        let layout = workbench_layout(Rect::new(0, 0, 120, 40), true, false);
        assert_eq!(layout.sidebar.map(|s| s.width), Some(SIDEBAR_WIDTH));
        assert!(layout.cards.is_none());
        assert_eq!(layout.editor.x, SIDEBAR_WIDTH);
        assert_eq!(layout.editor.y, 0);
        assert_eq!(layout.output.y, layout.editor.bottom());
    }

    #[test]
    fn test_workbench_layout_drops_sidebar_when_narrow() {
        let layout = workbench_layout(Rect::new(0, 0, 60, 40), true, false);
        assert!(layout.sidebar.is_none());
        assert_eq!(layout.editor.width, 60);
    }

    #[test]
    fn test_workbench_layout_showcase() {
        let layout = workbench_layout(Rect::new(0, 0, 120, 40), false, true);
        assert!(layout.sidebar.is_none());
        assert_eq!(layout.cards.map(|c| c.height), Some(CARDS_HEIGHT));
        assert_eq!(layout.editor.y, CARDS_HEIGHT);
    }

    #[test]
    fn test_centered_rect_50_50() {
        let centered = centered_rect(Rect::new(0, 0, 100, 100), 50, 50);
        assert_eq!(centered, Rect::new(25, 25, 50, 50));
    }

    #[test]
    fn test_centered_rect_fixed_clamps() {
        let centered = centered_rect_fixed(Rect::new(0, 0, 20, 10), 40, 4);
        assert_eq!(centered.width, 20);
        assert_eq!(centered.height, 4);
        assert_eq!(centered.y, 3);
    }
}
