//! The page table. Columns with a link or image role are rendered with their own style.

use polars::prelude::*;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Row, StatefulWidget, Table, TableState, Widget},
};
use std::borrow::Cow;

use crate::render::context::RenderContext;
use crate::roles::ColumnRole;
use crate::session::PageView;

const COLUMN_SPACING: u16 = 2;
const MAX_COLUMN_WIDTH: u16 = 40;

/// Text of one cell; nulls render empty.
pub fn cell_text(column: &Column, row: usize) -> Cow<'static, str> {
    match column.get(row) {
        Ok(AnyValue::Null) | Err(_) => Cow::Borrowed(""),
        Ok(v) => Cow::Owned(v.str_value().into_owned()),
    }
}

/// Header label, with a marker for image columns.
pub fn header_label(name: &str, role: Option<ColumnRole>) -> String {
    match role {
        Some(ColumnRole::Image) => format!("{} [thumbnail]", name),
        Some(ColumnRole::Link) => format!("{} [link]", name),
        None => name.to_string(),
    }
}

pub struct PageTable<'a> {
    view: &'a PageView,
    ctx: &'a RenderContext,
    /// Index of the first column drawn (horizontal scroll).
    col_offset: usize,
    footer: Option<String>,
}

impl<'a> PageTable<'a> {
    pub fn new(view: &'a PageView, ctx: &'a RenderContext, col_offset: usize) -> Self {
        Self {
            view,
            ctx,
            col_offset,
            footer: None,
        }
    }

    /// Text shown on the bottom border, e.g. the selected row's link.
    pub fn with_footer(mut self, footer: Option<String>) -> Self {
        self.footer = footer;
        self
    }

    fn cell(&self, role: Option<ColumnRole>, text: Cow<'static, str>) -> (Cell<'static>, u16) {
        match role {
            Some(ColumnRole::Link) if !text.is_empty() => {
                let label = self.ctx.link_label.clone();
                let width = label.chars().count() as u16;
                let span = Span::styled(
                    label,
                    Style::default()
                        .fg(self.ctx.link)
                        .add_modifier(Modifier::UNDERLINED),
                );
                (Cell::from(Line::from(span)), width)
            }
            Some(ColumnRole::Image) if !text.is_empty() => {
                let width = text.chars().count() as u16;
                let span = Span::styled(text, Style::default().fg(self.ctx.image));
                (Cell::from(Line::from(span)), width)
            }
            _ => {
                let width = text.chars().count() as u16;
                (Cell::from(Line::from(text)), width)
            }
        }
    }
}

impl StatefulWidget for PageTable<'_> {
    type State = TableState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut TableState) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.ctx.accent))
            .style(Style::default().bg(self.ctx.cell_bg).fg(self.ctx.text_primary));
        if let Some(footer) = &self.footer {
            block = block.title_bottom(Line::from(Span::styled(
                format!(" {} ", footer),
                Style::default().fg(self.ctx.link),
            )));
        }
        let inner = block.inner(area);
        block.render(area, buf);

        let df = &self.view.frame;
        let max_rows = df.height().min(inner.height.saturating_sub(1) as usize);
        let offset = self.col_offset.min(df.width().saturating_sub(1));

        let mut widths: Vec<u16> = Vec::new();
        let mut headers: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<Cell>> = vec![vec![]; max_rows];
        let mut used_width = 0u16;

        for column in df.get_columns().iter().skip(offset) {
            let name = column.name().to_string();
            let role = self.view.roles.role_of(&name);
            let header = header_label(&name, role);
            let mut max_len = header.chars().count() as u16;
            let mut cells = Vec::with_capacity(max_rows);
            for row in 0..max_rows {
                let (cell, len) = self.cell(role, cell_text(column, row));
                max_len = max_len.max(len);
                cells.push(cell);
            }
            let width = max_len.min(MAX_COLUMN_WIDTH);
            if !widths.is_empty() && used_width + width > inner.width {
                break;
            }
            used_width += width + COLUMN_SPACING;
            widths.push(width.min(inner.width));
            headers.push(header);
            for (row, cell) in rows.iter_mut().zip(cells) {
                row.push(cell);
            }
        }

        let header_style = Style::default()
            .bg(self.ctx.table_header_bg)
            .fg(self.ctx.table_header)
            .add_modifier(Modifier::BOLD);
        let rows: Vec<Row> = rows.into_iter().map(Row::new).collect();

        StatefulWidget::render(
            Table::new(rows, widths)
                .column_spacing(COLUMN_SPACING)
                .header(Row::new(headers).style(header_style))
                .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED)),
            inner,
            buf,
            state,
        );
    }
}
