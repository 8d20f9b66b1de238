//! Overlays for choosing columns and switching the data source.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, StatefulWidget, Widget},
};

use crate::query::FilterSpec;
use crate::render::context::RenderContext;

use super::text_input::TextInput;

/// Cursor over a list of `len` entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListCursor {
    pub index: usize,
}

impl ListCursor {
    pub fn up(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn down(&mut self, len: usize) {
        if self.index + 1 < len {
            self.index += 1;
        }
    }

    pub fn clamp(&mut self, len: usize) {
        self.index = self.index.min(len.saturating_sub(1));
    }
}

/// One line per schema column with its display and search marks.
pub fn column_rows(schema: &[String], filter: &FilterSpec) -> Vec<String> {
    schema
        .iter()
        .map(|c| {
            let shown = if filter.display_columns.contains(c) { "x" } else { " " };
            let searched = if filter.search_columns.contains(c) { "x" } else { " " };
            format!("[{}] [{}] {}", shown, searched, c)
        })
        .collect()
}

pub struct ColumnPicker<'a> {
    pub schema: &'a [String],
    pub filter: &'a FilterSpec,
    pub cursor: ListCursor,
    pub ctx: &'a RenderContext,
}

impl Widget for &ColumnPicker<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Columns: Space show, Enter search, Esc close ")
            .border_style(Style::default().fg(self.ctx.accent))
            .style(Style::default().bg(self.ctx.background).fg(self.ctx.text_primary));
        let inner = block.inner(area);
        block.render(area, buf);

        let [header, list_area] =
            Layout::new(Direction::Vertical, [Constraint::Length(1), Constraint::Fill(1)])
                .areas(inner);
        Paragraph::new("show search column")
            .style(Style::default().fg(self.ctx.text_secondary))
            .render(header, buf);

        let items: Vec<ListItem> = column_rows(self.schema, self.filter)
            .into_iter()
            .map(ListItem::new)
            .collect();
        let mut state = ListState::default().with_selected(Some(self.cursor.index));
        StatefulWidget::render(
            List::new(items).highlight_style(
                Style::default()
                    .fg(self.ctx.accent)
                    .add_modifier(Modifier::REVERSED),
            ),
            list_area,
            buf,
            &mut state,
        );
    }
}

pub struct SourcePicker<'a> {
    pub input: &'a TextInput,
    pub quick_files: &'a [String],
    pub cursor: Option<ListCursor>,
    pub ctx: &'a RenderContext,
}

impl Widget for &SourcePicker<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Open: file name or URL, Up/Down for quick files ")
            .border_style(Style::default().fg(self.ctx.accent))
            .style(Style::default().bg(self.ctx.background).fg(self.ctx.text_primary));
        let inner = block.inner(area);
        block.render(area, buf);

        let [input_area, list_area] =
            Layout::new(Direction::Vertical, [Constraint::Length(1), Constraint::Fill(1)])
                .areas(inner);
        self.input.render(input_area, buf);

        if self.quick_files.is_empty() {
            Paragraph::new(Line::from(Span::styled(
                "No quick files configured (source.quick_files)",
                Style::default().fg(self.ctx.text_secondary),
            )))
            .render(list_area, buf);
            return;
        }
        let items: Vec<ListItem> = self
            .quick_files
            .iter()
            .map(|f| ListItem::new(f.as_str()))
            .collect();
        let mut state = ListState::default().with_selected(self.cursor.map(|c| c.index));
        StatefulWidget::render(
            List::new(items)
                .block(Block::default().borders(Borders::TOP).title(" Quick files "))
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            list_area,
            buf,
            &mut state,
        );
    }
}
