use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    widgets::{Paragraph, Widget},
};

use crate::render::context::RenderContext;

/// Key hints for the browse view.
pub const BROWSE_HINTS: &[(&str, &str)] = &[
    ("/", "Keyword"),
    ("c", "Columns"),
    ("o", "Open"),
    ("s", "Page size"),
    ("Tab", "View"),
    ("e", "Export page"),
    ("E", "Export all"),
    ("n", "Nodes"),
    ("N", "Node counts"),
    ("q", "Quit"),
];

/// Key hints shown while the flow tab is active.
pub const FLOW_HINTS: &[(&str, &str)] = &[
    ("+", "Min weight"),
    ("-", "Min weight"),
    ("Tab", "View"),
    ("n", "Nodes"),
    ("N", "Node counts"),
    ("q", "Quit"),
];

/// Bottom bar: key/label pairs on the left, a summary on the right.
pub struct Controls<'a> {
    hints: &'a [(&'a str, &'a str)],
    right: Option<String>,
    dimmed: bool,
    ctx: &'a RenderContext,
}

impl<'a> Controls<'a> {
    pub fn new(hints: &'a [(&'a str, &'a str)], ctx: &'a RenderContext) -> Self {
        Self {
            hints,
            right: None,
            dimmed: false,
            ctx,
        }
    }

    pub fn with_right(mut self, text: impl Into<String>) -> Self {
        self.right = Some(text.into());
        self
    }

    pub fn with_dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }

    /// Number of pairs that fit in `width` next to the right-hand text.
    fn fitting(&self, width: u16) -> usize {
        let reserved = self
            .right
            .as_ref()
            .map(|r| r.chars().count() as u16 + 1)
            .unwrap_or(0);
        let mut used = reserved;
        let mut n = 0;
        for (key, label) in self.hints {
            let w = key.chars().count() as u16 + 2 + label.chars().count() as u16 + 1;
            if used + w > width {
                break;
            }
            used += w;
            n += 1;
        }
        n
    }
}

impl Widget for &Controls<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let shown = &self.hints[..self.fitting(area.width)];

        let mut constraints = shown.iter().fold(vec![], |mut acc, (key, label)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(label.chars().count() as u16 + 1));
            acc
        });
        constraints.push(Constraint::Fill(1));
        if let Some(right) = &self.right {
            constraints.push(Constraint::Length(right.chars().count() as u16 + 1));
        }
        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        let bar = Style::default().bg(self.ctx.controls_bg);
        let (key_fg, label_fg) = if self.dimmed {
            (self.ctx.text_secondary, self.ctx.text_secondary)
        } else {
            (self.ctx.keybind_hints, self.ctx.keybind_labels)
        };

        for (i, (key, label)) in shown.iter().enumerate() {
            Paragraph::new(*key)
                .style(bar.fg(key_fg).add_modifier(Modifier::BOLD))
                .centered()
                .render(layout[i * 2], buf);
            Paragraph::new(*label)
                .style(bar.fg(label_fg))
                .render(layout[i * 2 + 1], buf);
        }

        let fill = shown.len() * 2;
        Paragraph::new("").style(bar).render(layout[fill], buf);
        if let Some(right) = &self.right {
            Paragraph::new(right.as_str())
                .style(bar.fg(self.ctx.text_primary))
                .right_aligned()
                .render(layout[fill + 1], buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Theme, ThemeConfig};

    fn ctx() -> RenderContext {
        RenderContext::from_theme(
            &Theme::from_config(&ThemeConfig::default()).unwrap(),
            "open link",
        )
    }

    fn line(buf: &Buffer) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, 0)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_hints_are_cut_to_width() {
        let ctx = ctx();
        let controls = Controls::new(BROWSE_HINTS, &ctx).with_right("1,000 rows");
        assert!(controls.fitting(200) == BROWSE_HINTS.len());
        assert!(controls.fitting(30) < 3);
    }

    #[test]
    fn test_right_text_rendered() {
        let ctx = ctx();
        let controls = Controls::new(FLOW_HINTS, &ctx).with_right("min weight 3");
        let area = Rect::new(0, 0, 100, 1);
        let mut buf = Buffer::empty(area);
        (&controls).render(area, &mut buf);
        let text = line(&buf);
        assert!(text.contains("Min weight"));
        assert!(text.trim_end().ends_with("min weight 3"));
    }
}
