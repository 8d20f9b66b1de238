//! csvflow: browse, filter, paginate and export tabular datasets in the terminal.
//!
//! The library holds the terminal-independent core ([`source`], [`query`], [`pagination`],
//! [`roles`], [`flow`], [`session`]) and the ratatui front-end ([`app`]) driven by [`run`].

use color_eyre::Result;

pub mod app;
pub mod cache;
pub mod config;
pub mod embed;
pub mod engine;
pub mod error_display;
pub mod export;
pub mod fetch;
pub mod flow;
pub mod logging;
pub mod pagination;
pub mod query;
pub mod render;
pub mod roles;
pub mod session;
pub mod source;
pub mod widgets;

pub use app::{App, AppEvent};
pub use cache::CacheManager;
pub use config::{AppConfig, ConfigManager, Theme};
pub use csvflow_cli::{Args, ExportKind};
pub use session::{BrowseError, Interaction, RenderCycle, Session, SessionOptions};

/// Application name used for config and cache directories
pub const APP_NAME: &str = "csvflow";

impl From<&Args> for SessionOptions {
    fn from(args: &Args) -> Self {
        Self {
            page_size: args.page_size,
            keyword: args.keyword.clone(),
            debug: args.debug_enabled(),
        }
    }
}

/// Run the terminal UI until the user quits. Expects `color_eyre` to be installed by the caller.
pub fn run(args: &Args, config: AppConfig) -> Result<()> {
    use std::sync::mpsc;
    use std::time::Duration;

    let theme = Theme::from_config(&config.theme)
        .or_else(|e| Theme::from_config(&AppConfig::default().theme).map_err(|_| e))?;
    let poll_interval = Duration::from_millis(config.performance.event_poll_interval_ms);
    let session = Session::open(config, args.source_identifier(), &SessionOptions::from(args));

    let mut terminal = ratatui::try_init().map_err(|e| {
        color_eyre::eyre::eyre!(
            "csvflow requires an interactive terminal (TTY). No terminal detected: {}. \
             Use --export for headless output.",
            e
        )
    })?;
    let (tx, rx) = mpsc::channel::<AppEvent>();
    let mut app = App::new(session, &theme, args.embed_enabled());

    terminal.draw(|frame| frame.render_widget(&mut app, frame.area()))?;
    app.report_height();

    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => {
                    if key.is_press() {
                        tx.send(AppEvent::Key(key))?
                    }
                }
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(Duration::from_millis(0)) {
            Ok(AppEvent::Exit) => break,
            Ok(event) => {
                if let Some(next) = app.event(&event) {
                    tx.send(next)?;
                }
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => false,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            terminal.draw(|frame| frame.render_widget(&mut app, frame.area()))?;
            app.report_height();
        }
    }

    ratatui::restore();
    Ok(())
}
