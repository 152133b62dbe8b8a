//! Terminal User Interface Module
//!
//! Renders a mounted [`Dashboard`] in the terminal. Every pass of the loop
//! re-reads the dashboard state, so metric values never depend on an event
//! getting through. The [`DashboardEvent`] channel only delivers
//! notifications.
//!
//! # Usage
//!
//! ```rust,ignore
//! use meeting_dashboard::{Dashboard, DashboardConfig};
//! use meeting_dashboard::tui::{App, run_tui};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DashboardConfig::default();
//!     let (tx, rx) = tokio::sync::mpsc::channel(256);
//!     let dashboard = Dashboard::connect(&config, None, tx)?;
//!     run_tui(App::new(&config), &dashboard, rx, config.tick_rate).await
//! }
//! ```

mod app;
mod ui;

pub use app::{App, AppState, InputEvent, RefreshStatus};
pub use ui::{format_count, format_percentage, format_timestamp};

use crate::dashboard::Dashboard;
use crate::events::DashboardEvent;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

/// Run the dashboard TUI until the user quits.
pub async fn run_tui(
    mut app: App,
    dashboard: &Dashboard,
    mut event_rx: mpsc::Receiver<DashboardEvent>,
    tick_rate: Duration,
) -> anyhow::Result<()> {
    use std::io::Write;

    // Setup terminal with panic handler to ensure cleanup
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = io::stdout().flush();
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    stdout.flush()?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.clear()?;

    let mut last_tick = Instant::now();

    // The first cycle may already have reported
    while let Ok(event) = event_rx.try_recv() {
        app.apply_event(event, Instant::now());
    }
    app.sync(dashboard.state(), Instant::now());

    loop {
        let now = Instant::now();
        terminal.draw(|frame| ui::draw(frame, &app, now))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (not release)
                if key.kind == KeyEventKind::Press {
                    match InputEvent::from_key(key.code) {
                        InputEvent::Quit => app.quit(),
                        InputEvent::Refresh => dashboard.refresh_now(),
                        InputEvent::Unknown => {}
                    }
                }
            }
        }

        while let Ok(event) = event_rx.try_recv() {
            app.apply_event(event, Instant::now());
        }
        app.sync(dashboard.state(), Instant::now());

        if last_tick.elapsed() >= tick_rate {
            app.on_frame(Instant::now());
            last_tick = Instant::now();
        }

        if app.should_quit() {
            break;
        }
    }

    app.teardown();
    debug!("TUI closed");

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    let _ = io::stdout().flush();

    Ok(())
}
