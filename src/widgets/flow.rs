//! Flow view: the three levels as columns of weighted nodes, with the kept links listed below.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::flow::FlowDiagram;
use crate::render::context::RenderContext;

/// Shown instead of the diagram when the crate is built without the `diagram` feature.
pub const INSTALL_HINT: &str =
    "Flow diagram support is not compiled in. Rebuild with `--features diagram` to enable it.";

pub struct FlowView<'a> {
    diagram: &'a FlowDiagram,
    level_names: [&'a str; 3],
    ctx: &'a RenderContext,
}

impl<'a> FlowView<'a> {
    pub fn new(
        diagram: &'a FlowDiagram,
        level_names: [&'a str; 3],
        ctx: &'a RenderContext,
    ) -> Self {
        Self {
            diagram,
            level_names,
            ctx,
        }
    }
}

/// Bar of `width` cells scaled to `value / max`.
fn bar(value: u64, max: u64, width: u16) -> String {
    if max == 0 || width == 0 {
        return String::new();
    }
    let cells = ((value as f64 / max as f64) * width as f64).ceil() as usize;
    "█".repeat(cells.clamp(1, width as usize))
}

/// Lines for one level column, heaviest node first.
pub fn level_lines(diagram: &FlowDiagram, level: usize, bar_width: u16) -> Vec<(String, String)> {
    let mut nodes: Vec<(usize, u64)> = diagram
        .nodes_at(level)
        .into_iter()
        .map(|n| (n, diagram.node_value(n)))
        .collect();
    nodes.sort_by(|a, b| b.1.cmp(&a.1));
    let max = nodes.first().map(|(_, v)| *v).unwrap_or(0);
    nodes
        .into_iter()
        .map(|(n, v)| {
            (
                format!("{} ({})", diagram.labels[n], v),
                bar(v, max, bar_width),
            )
        })
        .collect()
}

/// "source → target  weight", heaviest first within each stage.
pub fn link_lines(diagram: &FlowDiagram) -> Vec<String> {
    let mut links = diagram.links.clone();
    links.sort_by(|a, b| a.stage.cmp(&b.stage).then(b.value.cmp(&a.value)));
    links
        .iter()
        .map(|l| {
            format!(
                "{} → {}  {}",
                diagram.labels[l.source], diagram.labels[l.target], l.value
            )
        })
        .collect()
}

#[cfg(feature = "diagram")]
impl Widget for &FlowView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Flow (min weight {}) ", self.diagram.threshold))
            .border_style(Style::default().fg(self.ctx.accent));
        let inner = block.inner(area);
        block.render(area, buf);

        if self.diagram.links.is_empty() {
            Paragraph::new("No transitions at this minimum weight")
                .style(Style::default().fg(self.ctx.text_secondary))
                .render(inner, buf);
            return;
        }

        let [levels_area, links_area] = Layout::new(
            Direction::Vertical,
            [Constraint::Percentage(65), Constraint::Fill(1)],
        )
        .areas(inner);
        let columns = Layout::new(Direction::Horizontal, [Constraint::Ratio(1, 3); 3])
            .spacing(1)
            .split(levels_area);

        for (level, col_area) in columns.iter().enumerate() {
            let color = self.ctx.flow_levels[level];
            let bar_width = col_area.width / 3;
            let mut lines = vec![Line::from(Span::styled(
                self.level_names[level].to_string(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))];
            for (label, bar) in level_lines(self.diagram, level, bar_width) {
                lines.push(Line::from(vec![
                    Span::styled(bar, Style::default().fg(color)),
                    Span::raw(" "),
                    Span::styled(label, Style::default().fg(self.ctx.text_primary)),
                ]));
            }
            Paragraph::new(lines).render(*col_area, buf);
        }

        let lines: Vec<Line> = link_lines(self.diagram)
            .into_iter()
            .map(|l| Line::from(Span::styled(l, Style::default().fg(self.ctx.text_primary))))
            .collect();
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .title(" Links ")
                    .border_style(Style::default().fg(self.ctx.text_secondary)),
            )
            .render(links_area, buf);
    }
}

#[cfg(not(feature = "diagram"))]
impl Widget for &FlowView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(INSTALL_HINT)
            .style(Style::default().fg(self.ctx.warning))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Flow "))
            .render(area, buf);
    }
}

/// Warning panel used when the flow views cannot run.
pub fn render_unavailable(message: &str, ctx: &RenderContext, area: Rect, buf: &mut Buffer) {
    Paragraph::new(message.to_string())
        .style(Style::default().fg(ctx.warning))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ctx.accent)),
        )
        .render(area, buf);
}
