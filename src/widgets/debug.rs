use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Paragraph, Widget},
};

use crate::render::context::RenderContext;
use crate::session::RenderCycle;

/// One-line summary of what the last cycle resolved and ran.
pub fn debug_line(cycle: &RenderCycle, handle_kind: Option<&str>) -> String {
    let mut parts = vec![format!("source: {}", display_identifier(&cycle.identifier))];
    if let Some(kind) = handle_kind {
        parts.push(format!("handle: {}", kind));
    }
    if let Some(p) = &cycle.provenance {
        parts.push(format!("provenance: {}", p));
    }
    if let Some(sql) = &cycle.sql {
        parts.push(format!("query: {}", sql));
    }
    parts.join(" | ")
}

fn display_identifier(identifier: &str) -> &str {
    if identifier.is_empty() {
        "(default)"
    } else {
        identifier
    }
}

pub struct DebugRow<'a> {
    pub line: String,
    pub ctx: &'a RenderContext,
}

impl Widget for &DebugRow<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.line.as_str())
            .style(
                Style::default()
                    .fg(self.ctx.text_secondary)
                    .bg(self.ctx.controls_bg),
            )
            .render(area, buf);
    }
}
