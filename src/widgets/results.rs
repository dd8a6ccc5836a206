use color_eyre::Result;
use polars::prelude::*;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, StatefulWidget, Table, Widget, Wrap},
};

use crate::config::OutputFormat;
use crate::render::context::RenderContext;
use crate::workbench::Output;

/// Render a result frame as a pretty-printed JSON array of row objects.
pub fn dataframe_to_json(df: &DataFrame) -> Result<String> {
    let mut df = df.clone();
    let mut bytes = Vec::new();
    JsonWriter::new(&mut bytes)
        .with_json_format(JsonFormat::Json)
        .finish(&mut df)?;
    let value: serde_json::Value = if bytes.is_empty() {
        serde_json::Value::Array(Vec::new())
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn cell_text(value: &AnyValue<'_>) -> String {
    if matches!(value, AnyValue::Null) {
        String::new()
    } else {
        value.str_value().into_owned()
    }
}

/// Scroll position of the output pane.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResultsState {
    pub row_offset: usize,
    pub col_offset: usize,
}

impl ResultsState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn scroll_rows(&mut self, delta: isize, total: usize) {
        let max = total.saturating_sub(1);
        self.row_offset = self.row_offset.saturating_add_signed(delta).min(max);
    }

    pub fn scroll_cols(&mut self, delta: isize, total: usize) {
        let max = total.saturating_sub(1);
        self.col_offset = self.col_offset.saturating_add_signed(delta).min(max);
    }
}

/// Output pane: the last result as a table or JSON, or a status message.
pub struct ResultsView<'a> {
    output: &'a Output,
    format: OutputFormat,
    ctx: &'a RenderContext,
    focused: bool,
    column_spacing: u16,
}

impl<'a> ResultsView<'a> {
    pub fn new(output: &'a Output, format: OutputFormat, ctx: &'a RenderContext) -> Self {
        Self {
            output,
            format,
            ctx,
            focused: false,
            column_spacing: 2,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    fn block(&self) -> Block<'static> {
        let border = match self.output {
            Output::Message { is_error: true, .. } => self.ctx.modal_border_error,
            _ if self.focused => self.ctx.modal_border_active,
            _ => self.ctx.sidebar_border,
        };
        let title = match (self.output, self.format) {
            (Output::Table(_), OutputFormat::Json) => " Output (json) ",
            _ => " Output ",
        };
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(border))
    }

    fn render_table(&self, df: &DataFrame, area: Rect, buf: &mut Buffer, state: &ResultsState) {
        let height = df.height();
        let visible_rows = (area.height as usize).saturating_sub(1);
        let start = state.row_offset.min(height.saturating_sub(1));
        let end = (start + visible_rows).min(height);

        let mut widths = Vec::new();
        let mut columns: Vec<Vec<Cell>> = Vec::new();
        let mut headers = Vec::new();
        let mut used_width = 0u16;

        for column in df.get_columns().iter().skip(state.col_offset) {
            let name = column.name().to_string();
            let mut max_len = name.chars().count() as u16;
            let mut cells = Vec::with_capacity(end - start);
            for row in start..end {
                let text = column
                    .get(row)
                    .map(|v| cell_text(&v))
                    .unwrap_or_default();
                max_len = max_len.max(text.chars().count() as u16);
                cells.push(Cell::from(Line::from(text)));
            }
            let remaining = area.width.saturating_sub(used_width);
            if remaining == 0 {
                break;
            }
            // The last visible column is clipped rather than dropped
            let width = max_len.min(remaining);
            widths.push(width);
            used_width = used_width.saturating_add(width + self.column_spacing);
            headers.push(Span::raw(name));
            columns.push(cells);
        }

        let rows: Vec<Row> = (0..end - start)
            .map(|i| {
                Row::new(
                    columns
                        .iter_mut()
                        .map(|cells| std::mem::take(&mut cells[i]))
                        .collect::<Vec<_>>(),
                )
            })
            .collect();

        let mut table_state = ratatui::widgets::TableState::default();
        StatefulWidget::render(
            Table::new(rows, widths)
                .column_spacing(self.column_spacing)
                .header(Row::new(headers).style(self.ctx.header_style()))
                .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            area,
            buf,
            &mut table_state,
        );
    }

    fn render_json(&self, df: &DataFrame, area: Rect, buf: &mut Buffer, state: &ResultsState) {
        let (text, style) = match dataframe_to_json(df) {
            Ok(json) => (json, Style::default().fg(self.ctx.text_primary)),
            Err(e) => (
                format!("Could not render JSON: {}", e),
                Style::default().fg(self.ctx.error),
            ),
        };
        Paragraph::new(text)
            .style(style)
            .scroll((state.row_offset.min(u16::MAX as usize) as u16, 0))
            .render(area, buf);
    }
}

impl StatefulWidget for ResultsView<'_> {
    type State = ResultsState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let block = self.block();
        let inner = block.inner(area);
        block.render(area, buf);

        match self.output {
            Output::Empty => {}
            Output::Message { text, is_error } => {
                let color = if *is_error {
                    self.ctx.error
                } else {
                    self.ctx.text_secondary
                };
                Paragraph::new(text.as_str())
                    .style(Style::default().fg(color))
                    .wrap(Wrap { trim: false })
                    .render(inner, buf);
            }
            Output::Table(result) if result.df.width() == 0 => {
                Paragraph::new("(no columns)")
                    .style(Style::default().fg(self.ctx.dimmed))
                    .render(inner, buf);
            }
            Output::Table(result) => match self.format {
                OutputFormat::Table => self.render_table(&result.df, inner, buf, state),
                OutputFormat::Json => self.render_json(&result.df, inner, buf, state),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbench::QueryResult;
    use std::time::Duration;

    fn sample() -> DataFrame {
        df!(
            "name" => &["Blue Train", "Kind of Blue"],
            "year" => &[1958i64, 1959],
        )
        .unwrap()
    }

    fn render(output: &Output, format: OutputFormat) -> String {
        let ctx = RenderContext::default();
        let area = Rect::new(0, 0, 50, 8);
        let mut buf = Buffer::empty(area);
        let mut state = ResultsState::default();
        ResultsView::new(output, format, &ctx).render(area, &mut buf, &mut state);
        (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_dataframe_to_json() {
        let json = dataframe_to_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["name"], "Blue Train");
        assert_eq!(value[1]["year"], 1959);
    }

    #[test]
    fn test_renders_table_cells() {
        let output = Output::Table(QueryResult {
            df: sample(),
            total_rows: 2,
            elapsed: Duration::from_millis(3),
        });
        let text = render(&output, OutputFormat::Table);
        assert!(text.contains("name"));
        assert!(text.contains("Kind of Blue"));
        assert!(text.contains("1958"));
    }

    #[test]
    fn test_renders_message() {
        let output = Output::Message {
            text: "Dataset not loaded.".to_string(),
            is_error: false,
        };
        assert!(render(&output, OutputFormat::Table).contains("Dataset not loaded."));
    }

    #[test]
    fn test_scroll_clamps() {
        let mut state = ResultsState::default();
        state.scroll_rows(-3, 10);
        assert_eq!(state.row_offset, 0);
        state.scroll_rows(25, 10);
        assert_eq!(state.row_offset, 9);
        state.scroll_cols(1, 2);
        state.scroll_cols(1, 2);
        assert_eq!(state.col_offset, 1);
    }
}
