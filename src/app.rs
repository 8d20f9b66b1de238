//! Terminal front-end state: input modes, tabs and the mapping from keys to session interactions.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, StatefulWidget, TableState, Tabs, Widget},
};
use std::path::PathBuf;

use crate::config::Theme;
use crate::embed::EmbedSignal;
use crate::flow::FlowDiagram;
use crate::pagination::PageNav;
use crate::render::context::RenderContext;
use crate::render::layout::{app_layout, centered_rect, centered_rect_fixed, desired_height};
use crate::session::{BrowseError, Interaction, PageView, RenderCycle, Session};
use crate::widgets::controls::{Controls, BROWSE_HINTS, FLOW_HINTS};
use crate::widgets::debug::{debug_line, DebugRow};
use crate::widgets::flow::{render_unavailable, FlowView};
use crate::widgets::picker::{ColumnPicker, ListCursor, SourcePicker};
use crate::widgets::table::{cell_text, PageTable};
use crate::widgets::text_input::{TextInput, TextInputEvent};
use crate::ExportKind;

/// Rows of the node table shown in the Nodes tab; exports always contain all rows.
const NODE_PREVIEW_ROWS: usize = 500;

const NODE_HINTS: &[(&str, &str)] = &[
    ("u", "Raw / counts"),
    ("Tab", "View"),
    ("n", "Export nodes"),
    ("N", "Export counts"),
    ("q", "Quit"),
];

pub enum AppEvent {
    Key(KeyEvent),
    Interact(Interaction),
    Export(ExportKind),
    Exit,
    Resize(u16, u16),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Table,
    Flow,
    Nodes,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Table, Tab::Flow, Tab::Nodes];

    fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn title(self) -> &'static str {
        match self {
            Tab::Table => "Table",
            Tab::Flow => "Flow",
            Tab::Nodes => "Nodes",
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Browse,
    Keyword,
    Columns,
    Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Info(String),
    Error(String),
}

pub struct App {
    session: Session,
    cycle: RenderCycle,
    ctx: RenderContext,
    embed: bool,
    embed_signal: EmbedSignal,
    pub input_mode: InputMode,
    pub tab: Tab,
    table_state: TableState,
    col_offset: usize,
    keyword_input: TextInput,
    source_input: TextInput,
    column_cursor: ListCursor,
    quick_cursor: Option<ListCursor>,
    nodes_with_counts: bool,
    flow: Option<Result<FlowDiagram, BrowseError>>,
    nodes: Option<Result<PageView, BrowseError>>,
    pub status: Option<StatusMessage>,
}

impl App {
    pub fn new(mut session: Session, theme: &Theme, embed: bool) -> Self {
        let cycle = session.cycle();
        let ctx = RenderContext::from_theme(theme, &session.config().display.link_label);
        let keyword_input = TextInput::with_value(&session.filter.keyword)
            .with_colors(ctx.text_primary, ctx.background);
        let source_input = TextInput::new().with_colors(ctx.text_primary, ctx.background);
        Self {
            session,
            cycle,
            ctx,
            embed,
            embed_signal: EmbedSignal::new(embed),
            input_mode: InputMode::Browse,
            tab: Tab::Table,
            table_state: TableState::default().with_selected(Some(0)),
            col_offset: 0,
            keyword_input,
            source_input,
            column_cursor: ListCursor::default(),
            quick_cursor: None,
            nodes_with_counts: false,
            flow: None,
            nodes: None,
            status: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cycle(&self) -> &RenderCycle {
        &self.cycle
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        match event {
            AppEvent::Key(key) => self.key(key),
            AppEvent::Interact(interaction) => {
                self.interact(interaction.clone());
                None
            }
            AppEvent::Export(kind) => {
                self.export(*kind);
                None
            }
            AppEvent::Resize(..) | AppEvent::Exit => None,
        }
    }

    fn interact(&mut self, interaction: Interaction) {
        let reopened = matches!(interaction, Interaction::OpenSource(_));
        if reopened || matches!(interaction, Interaction::SetMinWeight(_)) {
            self.flow = None;
        }
        if reopened {
            self.nodes = None;
            self.col_offset = 0;
            self.column_cursor = ListCursor::default();
        }
        self.cycle = self.session.handle(interaction);
        self.table_state.select(Some(0));
        self.status = self.cycle.error_message().map(StatusMessage::Error);
        self.load_tab_data();
    }

    fn export(&mut self, kind: ExportKind) {
        let dir: PathBuf = self.session.config().export.dir_path();
        let at = chrono::Local::now().naive_local();
        self.status = Some(match self.session.export(kind, &dir, at) {
            Ok(path) => StatusMessage::Info(format!("Saved {}", path.display())),
            Err(e) => StatusMessage::Error(e.to_string()),
        });
    }

    /// Compute the flow or node data the active tab needs, once per source.
    fn load_tab_data(&mut self) {
        match self.tab {
            Tab::Table => {}
            Tab::Flow => {
                if self.flow.is_none() {
                    self.flow = Some(self.session.flow_diagram());
                }
            }
            Tab::Nodes => {
                if self.nodes.is_none() {
                    self.nodes = Some(
                        self.session
                            .node_frame(self.nodes_with_counts)
                            .map(|df| PageView::whole(df, NODE_PREVIEW_ROWS)),
                    );
                }
            }
        }
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.load_tab_data();
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        if event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char('c') {
            return Some(AppEvent::Exit);
        }
        match self.input_mode {
            InputMode::Browse => self.browse_key(event),
            InputMode::Keyword => {
                match self.keyword_input.handle_key(event) {
                    TextInputEvent::Submit => {
                        self.input_mode = InputMode::Browse;
                        return Some(AppEvent::Interact(Interaction::SetKeyword(
                            self.keyword_input.value().trim().to_string(),
                        )));
                    }
                    TextInputEvent::Cancel => {
                        self.keyword_input.set_value(&self.session.filter.keyword);
                        self.input_mode = InputMode::Browse;
                    }
                    TextInputEvent::None => {}
                }
                None
            }
            InputMode::Columns => self.columns_key(event),
            InputMode::Source => self.source_key(event),
        }
    }

    fn browse_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        let nav = |nav: PageNav| Some(AppEvent::Interact(Interaction::Navigate(nav)));
        match event.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(AppEvent::Exit),
            KeyCode::Tab => {
                self.switch_tab(self.tab.next());
                None
            }
            KeyCode::BackTab => {
                self.switch_tab(self.tab.prev());
                None
            }
            KeyCode::Char('e') => Some(AppEvent::Export(ExportKind::Page)),
            KeyCode::Char('E') => Some(AppEvent::Export(ExportKind::All)),
            KeyCode::Char('n') => Some(AppEvent::Export(ExportKind::Nodes)),
            KeyCode::Char('N') => Some(AppEvent::Export(ExportKind::NodeCounts)),
            KeyCode::Char('o') => {
                self.source_input.set_value("");
                self.quick_cursor = None;
                self.input_mode = InputMode::Source;
                None
            }
            KeyCode::Char('d') => {
                self.session.debug = !self.session.debug;
                Some(AppEvent::Interact(Interaction::GotoPage(self.session.page.page())))
            }
            _ => match self.tab {
                Tab::Table => match event.code {
                    KeyCode::Home => nav(PageNav::First),
                    KeyCode::End => nav(PageNav::Last),
                    KeyCode::PageUp | KeyCode::Char('[') => nav(PageNav::Prev),
                    KeyCode::PageDown | KeyCode::Char(']') => nav(PageNav::Next),
                    KeyCode::Char('s') => Some(AppEvent::Interact(Interaction::CyclePageSize)),
                    KeyCode::Char('/') => {
                        self.keyword_input.set_value(&self.session.filter.keyword);
                        self.input_mode = InputMode::Keyword;
                        None
                    }
                    KeyCode::Char('c') => {
                        self.column_cursor.clamp(self.session.schema().len());
                        self.input_mode = InputMode::Columns;
                        None
                    }
                    KeyCode::Up | KeyCode::Char('k') => {
                        self.table_state.select_previous();
                        None
                    }
                    KeyCode::Down | KeyCode::Char('j') => {
                        let rows = self.cycle.view.as_ref().map(|v| v.frame.height()).unwrap_or(0);
                        let next = self.table_state.selected().map_or(0, |i| i + 1);
                        self.table_state.select(Some(next.min(rows.saturating_sub(1))));
                        None
                    }
                    KeyCode::Left | KeyCode::Char('h') => {
                        self.col_offset = self.col_offset.saturating_sub(1);
                        None
                    }
                    KeyCode::Right | KeyCode::Char('l') => {
                        let cols = self.cycle.view.as_ref().map(|v| v.columns.len()).unwrap_or(0);
                        if self.col_offset + 1 < cols {
                            self.col_offset += 1;
                        }
                        None
                    }
                    _ => None,
                },
                Tab::Flow => match event.code {
                    KeyCode::Char('+') | KeyCode::Char('=') => Some(AppEvent::Interact(
                        Interaction::SetMinWeight(self.session.min_weight.saturating_add(1)),
                    )),
                    KeyCode::Char('-') => Some(AppEvent::Interact(Interaction::SetMinWeight(
                        self.session.min_weight.saturating_sub(1),
                    ))),
                    _ => None,
                },
                Tab::Nodes => match event.code {
                    KeyCode::Char('u') => {
                        self.nodes_with_counts = !self.nodes_with_counts;
                        self.nodes = None;
                        self.load_tab_data();
                        None
                    }
                    _ => None,
                },
            },
        }
    }

    fn columns_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        let schema = self.session.schema();
        let current = schema.get(self.column_cursor.index).cloned();
        match event.code {
            KeyCode::Esc | KeyCode::Char('c') => {
                self.input_mode = InputMode::Browse;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.column_cursor.up();
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.column_cursor.down(schema.len());
                None
            }
            KeyCode::Char(' ') => {
                current.map(|c| AppEvent::Interact(Interaction::ToggleDisplayColumn(c)))
            }
            KeyCode::Enter | KeyCode::Char('s') => {
                current.map(|c| AppEvent::Interact(Interaction::ToggleSearchColumn(c)))
            }
            _ => None,
        }
    }

    fn source_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        let quick = &self.session.config().source.quick_files;
        match event.code {
            KeyCode::Up | KeyCode::Down if !quick.is_empty() => {
                let mut cursor = self.quick_cursor.unwrap_or_default();
                if event.code == KeyCode::Up {
                    cursor.up();
                } else if self.quick_cursor.is_some() {
                    cursor.down(quick.len());
                }
                let chosen = quick[cursor.index].clone();
                self.quick_cursor = Some(cursor);
                self.source_input.set_value(&chosen);
                None
            }
            _ => match self.source_input.handle_key(event) {
                TextInputEvent::Submit => {
                    self.input_mode = InputMode::Browse;
                    let identifier = self.source_input.value().trim().to_string();
                    Some(AppEvent::Interact(Interaction::OpenSource(identifier)))
                }
                TextInputEvent::Cancel => {
                    self.input_mode = InputMode::Browse;
                    None
                }
                TextInputEvent::None => {
                    self.quick_cursor = None;
                    None
                }
            },
        }
    }

    /// Rows the current view needs, for the embed height signal.
    pub fn desired_height(&self) -> u16 {
        let rows = match self.tab {
            Tab::Table => self.cycle.view.as_ref().map(|v| v.frame.height()).unwrap_or(1),
            Tab::Flow => 20,
            Tab::Nodes => match &self.nodes {
                Some(Ok(v)) => v.frame.height(),
                _ => 1,
            },
        };
        desired_height(rows.max(1), self.embed, self.session.debug)
    }

    /// Emit the embed height message when it changed.
    pub fn report_height(&mut self) {
        if !self.embed_signal.is_enabled() {
            return;
        }
        let height = self.desired_height();
        self.embed_signal.report(height);
    }

    /// Link of the selected table row, if the page has a link column.
    fn selected_link(&self) -> Option<String> {
        let view = self.cycle.view.as_ref().ok()?;
        let column = view.frame.column(view.roles.link.as_deref()?).ok()?;
        let text = cell_text(column, self.table_state.selected()?);
        (!text.is_empty()).then(|| format!("{}: {}", self.ctx.link_label, text))
    }

    fn status_lines(&self) -> [Line<'static>; 2] {
        let ctx = &self.ctx;
        let first = match (&self.status, &self.cycle.view) {
            (Some(StatusMessage::Error(msg)), _) => {
                Line::from(Span::styled(msg.clone(), Style::default().fg(ctx.error)))
            }
            (Some(StatusMessage::Info(msg)), _) => {
                Line::from(Span::styled(msg.clone(), Style::default().fg(ctx.success)))
            }
            (None, Ok(view)) => Line::from(Span::styled(
                view.status_line(),
                Style::default().fg(ctx.text_primary),
            )),
            (None, Err(e)) => {
                Line::from(Span::styled(e.to_string(), Style::default().fg(ctx.error)))
            }
        };
        let warnings = self.cycle.warnings();
        let second = if warnings.is_empty() {
            Line::from(Span::styled(
                self.cycle.provenance.clone().unwrap_or_default(),
                Style::default().fg(ctx.text_secondary),
            ))
        } else {
            Line::from(Span::styled(
                warnings.join(" "),
                Style::default().fg(ctx.warning),
            ))
        };
        [first, second]
    }

    fn render_main(&mut self, area: Rect, buf: &mut Buffer) {
        match self.tab {
            Tab::Table => match &self.cycle.view {
                Ok(view) => {
                    let footer = self.selected_link();
                    StatefulWidget::render(
                        PageTable::new(view, &self.ctx, self.col_offset).with_footer(footer),
                        area,
                        buf,
                        &mut self.table_state,
                    );
                }
                Err(e) => render_unavailable(&e.to_string(), &self.ctx, area, buf),
            },
            Tab::Flow => match &self.flow {
                Some(Ok(diagram)) => {
                    let levels = self.session.config().flow.level_columns();
                    (&FlowView::new(diagram, levels, &self.ctx)).render(area, buf);
                }
                Some(Err(e)) => render_unavailable(&e.to_string(), &self.ctx, area, buf),
                None => {}
            },
            Tab::Nodes => match &self.nodes {
                Some(Ok(view)) => {
                    let footer = Some(format!(
                        "{} rows{}",
                        view.total,
                        if self.nodes_with_counts { ", deduplicated" } else { "" }
                    ));
                    let mut state = TableState::default();
                    StatefulWidget::render(
                        PageTable::new(view, &self.ctx, 0).with_footer(footer),
                        area,
                        buf,
                        &mut state,
                    );
                }
                Some(Err(e)) => render_unavailable(&e.to_string(), &self.ctx, area, buf),
                None => {}
            },
        }
    }

    fn render_overlay(&self, area: Rect, buf: &mut Buffer) {
        match self.input_mode {
            InputMode::Browse => {}
            InputMode::Keyword => {
                let popup = centered_rect_fixed(area, 60, 3);
                Clear.render(popup, buf);
                let block = Block::bordered()
                    .title(" Keyword: Enter apply, Esc cancel ")
                    .border_style(Style::default().fg(self.ctx.accent))
                    .style(Style::default().bg(self.ctx.background));
                let inner = block.inner(popup);
                block.render(popup, buf);
                (&self.keyword_input).render(inner, buf);
            }
            InputMode::Columns => {
                let picker = ColumnPicker {
                    schema: self.session.schema(),
                    filter: &self.session.filter,
                    cursor: self.column_cursor,
                    ctx: &self.ctx,
                };
                (&picker).render(centered_rect(area, 60, 70), buf);
            }
            InputMode::Source => {
                let picker = SourcePicker {
                    input: &self.source_input,
                    quick_files: &self.session.config().source.quick_files,
                    cursor: self.quick_cursor,
                    ctx: &self.ctx,
                };
                (&picker).render(centered_rect(area, 60, 50), buf);
            }
        }
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        Block::default()
            .style(Style::default().bg(self.ctx.background))
            .render(area, buf);

        let debug = self.session.debug;
        let layout = app_layout(area, self.embed, debug);

        if let Some(title) = layout.title {
            let identifier = if self.cycle.identifier.is_empty() {
                self.session.config().source.default_file.clone()
            } else {
                self.cycle.identifier.clone()
            };
            Paragraph::new(Line::from(vec![
                Span::styled(
                    " csvflow ",
                    Style::default()
                        .fg(self.ctx.accent)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(identifier, Style::default().fg(self.ctx.text_primary)),
            ]))
            .render(title, buf);
        }

        Tabs::new(Tab::ALL.iter().map(|t| t.title()))
            .select(self.tab.index())
            .style(Style::default().fg(self.ctx.text_secondary))
            .highlight_style(
                Style::default()
                    .fg(self.ctx.accent)
                    .add_modifier(Modifier::BOLD),
            )
            .render(layout.tabs, buf);

        self.render_main(layout.main_view, buf);

        Paragraph::new(self.status_lines().to_vec()).render(layout.status, buf);

        if let Some(bar) = layout.control_bar {
            let (hints, right) = match self.tab {
                Tab::Table => (
                    BROWSE_HINTS,
                    format!("{} per page", self.session.page.page_size()),
                ),
                Tab::Flow => (FLOW_HINTS, format!("min weight {}", self.session.min_weight)),
                Tab::Nodes => (NODE_HINTS, String::new()),
            };
            let controls = Controls::new(hints, &self.ctx)
                .with_right(right)
                .with_dimmed(self.input_mode != InputMode::Browse);
            (&controls).render(bar, buf);
        }

        if let Some(row) = layout.debug {
            let kind = self.session.source().map(|s| s.handle.kind());
            let debug_row = DebugRow {
                line: debug_line(&self.cycle, kind),
                ctx: &self.ctx,
            };
            (&debug_row).render(row, buf);
        }

        self.render_overlay(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ThemeConfig};
    use crate::session::SessionOptions;
    use std::fs;
    use tempfile::TempDir;

    fn app_with(csv: &str) -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), csv).unwrap();
        let mut config = AppConfig::default();
        config.source.data_dir = Some(dir.path().display().to_string());
        config.export.dir = Some(dir.path().display().to_string());
        config.performance.polars_streaming = false;
        let session = Session::open(config, "", &SessionOptions::default());
        let theme = Theme::from_config(&ThemeConfig::default()).unwrap();
        (dir, App::new(session, &theme, false))
    }

    fn press(app: &mut App, code: KeyCode) {
        let mut next = app.event(&AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
        while let Some(ev) = next {
            if matches!(ev, AppEvent::Exit) {
                break;
            }
            next = app.event(&ev);
        }
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_keyword_mode_applies_on_enter() {
        let (_dir, mut app) = app_with("name,sk1,sk2,sk3\nBronze cup,a,b,c\njade disc,a,b,d\n");
        press(&mut app, KeyCode::Char('/'));
        assert_eq!(app.input_mode, InputMode::Keyword);
        type_text(&mut app, "bronze");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input_mode, InputMode::Browse);
        let view = app.cycle().view.as_ref().unwrap();
        assert_eq!(view.total, 1);
        assert_eq!(view.base_total, 2);
    }

    #[test]
    fn test_flow_tab_and_min_weight_keys() {
        let (_dir, mut app) = app_with("sk1,sk2,sk3\nA,B,C\nA,B,D\nA,X,C\n");
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.tab, Tab::Flow);
        assert!(matches!(app.flow, Some(Ok(_))));
        press(&mut app, KeyCode::Char('+'));
        press(&mut app, KeyCode::Char('+'));
        let diagram = app.flow.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(diagram.threshold, 2);
        assert_eq!(app.session().min_weight, 2);
    }

    #[test]
    fn test_export_key_reports_saved_path() {
        let (dir, mut app) = app_with("a,b\n1,2\n");
        press(&mut app, KeyCode::Char('e'));
        match &app.status {
            Some(StatusMessage::Info(msg)) => assert!(msg.starts_with("Saved ")),
            other => panic!("unexpected status {:?}", other),
        }
        let written = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .any(|e| e.file_name().to_string_lossy().starts_with("data_page_"));
        assert!(written);
    }

    #[test]
    fn test_column_picker_toggles_display() {
        let (_dir, mut app) = app_with("a,b,c\n1,2,3\n");
        press(&mut app, KeyCode::Char('c'));
        assert_eq!(app.input_mode, InputMode::Columns);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char(' '));
        let view = app.cycle().view.as_ref().unwrap();
        assert_eq!(view.columns, vec!["a", "c"]);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Browse);
    }

    #[test]
    fn test_render_does_not_panic_on_small_area() {
        let (_dir, mut app) = app_with("a,b\n1,2\n");
        let area = Rect::new(0, 0, 30, 8);
        let mut buf = Buffer::empty(area);
        (&mut app).render(area, &mut buf);
        press(&mut app, KeyCode::Tab);
        (&mut app).render(area, &mut buf);
    }
}
