use ratatui::{
    buffer::Buffer,
    layout::Rect,
    widgets::{Paragraph, Widget},
};

/// Counters shown in the debug row when `--debug` is on.
#[derive(Default)]
pub struct DebugState {
    pub num_events: usize,
    pub num_frames: usize,
    pub num_key_events: usize,
    pub last_key_event_name: String,
    /// Last action taken (e.g. "run_query") for debugging key handling.
    pub last_action: String,
    pub enabled: bool,
    /// Workbench phase at render time.
    pub phase: String,
    /// Execution bundle of the booted engine, once known.
    pub bundle: Option<String>,
    pub show_timings: bool,
    /// Duration of the query behind the result on screen.
    pub query_ms: Option<u128>,
}

impl DebugState {
    pub fn on_key(&mut self, event: &crossterm::event::KeyEvent) {
        self.num_key_events += 1;
        self.last_key_event_name = format!("{:?}+{:?}", event.modifiers, event.code);
    }
}

impl Widget for &DebugState {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut text = format!(
            "events={} keys={} last_key={} last_action={} phase={} bundle={} frames={}",
            self.num_events,
            self.num_key_events,
            self.last_key_event_name,
            self.last_action,
            self.phase,
            self.bundle.as_deref().unwrap_or("-"),
            self.num_frames,
        );
        if self.show_timings {
            if let Some(ms) = self.query_ms {
                text.push_str(&format!(" query_ms={}", ms));
            }
        }
        Paragraph::new(text).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(state: &DebugState) -> String {
        let area = Rect::new(0, 0, 160, 1);
        let mut buf = Buffer::empty(area);
        state.render(area, &mut buf);
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_timings_only_when_enabled() {
        let mut state = DebugState {
            phase: "dataset-ready".to_string(),
            query_ms: Some(42),
            ..DebugState::default()
        };
        assert!(rendered(&state).contains("phase=dataset-ready"));
        assert!(!rendered(&state).contains("query_ms"));
        state.show_timings = true;
        assert!(rendered(&state).contains("query_ms=42"));
    }
}
