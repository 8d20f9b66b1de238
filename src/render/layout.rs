use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Top-level layout. Embedded mode drops the title and the key-hint bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppLayout {
    pub title: Option<Rect>,
    pub tabs: Rect,
    pub main_view: Rect,
    /// Two rows: status line and provenance line.
    pub status: Rect,
    pub control_bar: Option<Rect>,
    pub debug: Option<Rect>,
}

/// Rows used by everything except the main view.
pub fn chrome_height(embed: bool, debug_enabled: bool) -> u16 {
    let mut rows = 1 + 2;
    if !embed {
        rows += 2;
    }
    if debug_enabled {
        rows += 1;
    }
    rows
}

/// Height needed to show a table of `rows` data rows without scrolling
/// (block borders and header included).
pub fn desired_height(rows: usize, embed: bool, debug_enabled: bool) -> u16 {
    let table = (rows as u16).saturating_add(3);
    chrome_height(embed, debug_enabled).saturating_add(table)
}

pub fn app_layout(area: Rect, embed: bool, debug_enabled: bool) -> AppLayout {
    let mut constraints = Vec::new();
    if !embed {
        constraints.push(Constraint::Length(1));
    }
    constraints.push(Constraint::Length(1));
    constraints.push(Constraint::Fill(1));
    constraints.push(Constraint::Length(2));
    if !embed {
        constraints.push(Constraint::Length(1));
    }
    if debug_enabled {
        constraints.push(Constraint::Length(1));
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut idx = 0;
    let mut next = || {
        let r = layout[idx];
        idx += 1;
        r
    };
    let title = (!embed).then(&mut next);
    let tabs = next();
    let main_view = next();
    let status = next();
    let control_bar = (!embed).then(&mut next);
    let debug = debug_enabled.then(&mut next);

    AppLayout {
        title,
        tabs,
        main_view,
        status,
        control_bar,
        debug,
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
