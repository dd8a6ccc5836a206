use ratatui::layout::Rect;

/// Highlight position in a vertical list, clamped to the list bounds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListCursor {
    selected: usize,
}

impl ListCursor {
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn reset(&mut self) {
        self.selected = 0;
    }

    /// Move down one row; stays on the last row of a list of `len` entries.
    pub fn down(&mut self, len: usize) {
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Highlight `index` when it is inside a list of `len` entries.
    pub fn select(&mut self, index: usize, len: usize) {
        if index < len {
            self.selected = index;
        }
    }

    /// First visible row so the highlight stays inside `height` rows.
    pub fn offset(&self, height: u16) -> usize {
        let height = height.max(1) as usize;
        self.selected.saturating_sub(height - 1)
    }

    /// Entry index under screen row `row` of a list drawn in `list`.
    pub fn index_at(&self, list: Rect, row: u16) -> usize {
        self.offset(list.height) + row.saturating_sub(list.y) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_down_and_up_clamp() {
        let mut cursor = ListCursor::default();
        cursor.up();
        assert_eq!(cursor.selected(), 0);
        for _ in 0..5 {
            cursor.down(3);
        }
        assert_eq!(cursor.selected(), 2);
        cursor.down(0);
        assert_eq!(cursor.selected(), 2);
        cursor.reset();
        assert_eq!(cursor.selected(), 0);
    }

    #[test]
    fn test_offset_keeps_selection_visible() {
        let mut cursor = ListCursor::default();
        assert_eq!(cursor.offset(5), 0);
        cursor.select(4, 10);
        assert_eq!(cursor.offset(5), 0);
        cursor.select(7, 10);
        assert_eq!(cursor.offset(5), 3);
        cursor.select(3, 10);
        assert_eq!(cursor.offset(0), 3);
        cursor.select(42, 10);
        assert_eq!(cursor.selected(), 3);
    }

    #[test]
    fn test_index_at_accounts_for_scroll() {
        let list = Rect::new(0, 10, 20, 5);
        let mut cursor = ListCursor::default();
        assert_eq!(cursor.index_at(list, 10), 0);
        assert_eq!(cursor.index_at(list, 12), 2);
        cursor.select(7, 10);
        assert_eq!(cursor.index_at(list, 10), 3);
        assert_eq!(cursor.index_at(list, 14), 7);
    }
}
