//! Dashboard rendering.
//!
//! ```text
//! ┌ Shareholder Attendance Dashboard ──────────────── [Idle] ┐
//! ├──────────────────────────┬───────────────────────────────┤
//! │ Shareholders Present     │ Total Subscribed Capital      │
//! │ 120                      │ 1,000,000                     │
//! │ ██░░░░░░░░░░░░░░░░░░░░░  │ ██░░░░░░░░░░░░░░░░░░░░░░░░░░  │
//! ├──────────────────────────┼───────────────────────────────┤
//! │ Subscribed Capital Pres. │ Subscribed Capital Present (%)│
//! ├──────────────────────────┴───────────────────────────────┤
//! │ System status: Normal    Last update: 14:02:11   [R] [Q] │
//! └──────────────────────────────────────────────────────────┘
//! ```

use crate::events::NotificationLevel;
use crate::metrics::{DisplayMetric, MetricKey};
use crate::tui::app::{App, RefreshStatus};
use chrono::{DateTime, Local, Utc};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};
use std::time::Instant;

/// Draw the whole dashboard.
pub fn draw(frame: &mut Frame, app: &App, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Metric cards
            Constraint::Length(3), // Status bar
            Constraint::Length(1), // Notification
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    draw_cards(frame, app, now, chunks[1]);
    draw_status_bar(frame, app, chunks[2]);
    draw_notification(frame, app, chunks[3]);
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let (status_text, status_color) = match app.status() {
        RefreshStatus::Refreshing => ("Refreshing", Color::Yellow),
        RefreshStatus::Idle => ("Idle", Color::Green),
    };

    let line = Line::from(vec![
        Span::styled(
            app.variant.title(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(format!("[{}]", status_text), Style::default().fg(status_color)),
        Span::styled(
            format!("   polling every {}s", app.poll_interval.as_secs()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(paragraph, area);
}

fn draw_cards(frame: &mut Frame, app: &App, now: Instant, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    for (row, metrics) in rows.iter().zip(DisplayMetric::ALL.chunks(2)) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(*row);
        for (column, metric) in columns.iter().zip(metrics) {
            draw_card(frame, app, *metric, now, *column);
        }
    }
}

/// One metric: big number, progress gauge, last-updated line.
fn draw_card(frame: &mut Frame, app: &App, metric: DisplayMetric, now: Instant, area: Rect) {
    let stale = app.is_stale(metric);
    let border_color = if stale { Color::Red } else { Color::Blue };
    let title = if stale {
        format!(" {} (stale) ", metric.title())
    } else {
        format!(" {} ", metric.title())
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let value = app.displayed(metric, now);
    let value_text = match metric {
        DisplayMetric::AttendancePercentage => format_percentage(value),
        DisplayMetric::Fetched(_) => format_count(value),
    };
    frame.render_widget(
        Paragraph::new(Span::styled(
            value_text,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        chunks[0],
    );

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green).bg(Color::DarkGray))
        .ratio(gauge_ratio(app, metric, value))
        .label("");
    frame.render_widget(gauge, chunks[1]);

    let updated = match app.last_updated(metric) {
        Some(at) => format!("Updated {}", format_timestamp(at)),
        None => "Not yet updated".to_string(),
    };
    frame.render_widget(
        Paragraph::new(Span::styled(updated, Style::default().fg(Color::DarkGray))),
        chunks[2],
    );
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (status_text, status_color) = match app.status() {
        RefreshStatus::Refreshing => ("Updating data...", Color::Yellow),
        RefreshStatus::Idle => ("System status: Normal", Color::Green),
    };
    let last_update = app
        .last_refresh
        .map(format_timestamp)
        .unwrap_or_else(|| "Never".to_string());

    let line = Line::from(vec![
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("    "),
        Span::raw(format!("Last update: {}", last_update)),
        Span::raw("    "),
        Span::styled("[R] ", Style::default().fg(Color::Yellow)),
        Span::raw("Refresh  "),
        Span::styled("[Q] ", Style::default().fg(Color::Yellow)),
        Span::raw("Quit"),
    ]);

    let paragraph = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn draw_notification(frame: &mut Frame, app: &App, area: Rect) {
    let Some((notification, _)) = &app.notification else {
        return;
    };
    let color = match notification.level {
        NotificationLevel::Info => Color::Green,
        NotificationLevel::Error => Color::Red,
    };
    let line = Line::from(vec![
        Span::styled(
            format!("{}: ", notification.title),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(notification.description.clone()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Fraction of the gauge to fill for `value`.
fn gauge_ratio(app: &App, metric: DisplayMetric, value: f64) -> f64 {
    let scale = match metric {
        DisplayMetric::Fetched(MetricKey::AttendanceCount) => app.gauge_scale.attendance_count,
        DisplayMetric::Fetched(_) => app.gauge_scale.subscribed_capital,
        DisplayMetric::AttendancePercentage => 100.0,
    };
    if scale <= 0.0 {
        return 0.0;
    }
    let ratio = value / scale;
    if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Whole number with thousands separators, e.g. `1,250,000`.
pub fn format_count(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Percentage with two decimals, e.g. `25.00%`.
pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Local wall-clock time of an update.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::dashboard::DashboardState;
    use crate::events::{DashboardEvent, Notification};
    use crate::metrics::MetricSnapshot;
    use ratatui::{Terminal, backend::TestBackend};

    fn render(app: &App, now: Instant) -> String {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| draw(frame, app, now)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn synced(values: &[(MetricKey, f64)], refreshing: bool) -> DashboardState {
        let snapshots = MetricKey::ALL
            .iter()
            .map(|key| {
                let current_value = values
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| *v)
                    .unwrap_or(0.0);
                let snapshot = MetricSnapshot {
                    previous_value: 0.0,
                    current_value,
                    last_updated_at: Some(Utc::now()),
                };
                (*key, snapshot)
            })
            .collect();
        DashboardState {
            snapshots,
            refreshing,
            last_cycle: None,
            last_full_refresh: None,
        }
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0.0), "0");
        assert_eq!(format_count(120.0), "120");
        assert_eq!(format_count(1000.0), "1,000");
        assert_eq!(format_count(1_000_000.0), "1,000,000");
        assert_eq!(format_count(1234.6), "1,235");
        assert_eq!(format_count(-2500.0), "-2,500");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(25.0), "25.00%");
        assert_eq!(format_percentage(0.0), "0.00%");
        assert_eq!(format_percentage(33.3333), "33.33%");
    }

    #[test]
    fn test_initial_render() {
        let app = App::new(&DashboardConfig::default());
        let text = render(&app, Instant::now());
        assert!(text.contains("Shareholder Attendance Dashboard"));
        assert!(text.contains("Shareholders Present"));
        assert!(text.contains("0.00%"));
        assert!(text.contains("Last update: Never"));
        assert!(text.contains("System status: Normal"));
    }

    #[test]
    fn test_render_settled_values() {
        let mut app = App::new(&DashboardConfig::default());
        let start = Instant::now();
        let state = synced(
            &[
                (MetricKey::AttendanceCount, 120.0),
                (MetricKey::TotalSubscribedCapital, 1_000_000.0),
                (MetricKey::AttendedSubscribedCapital, 250_000.0),
            ],
            true,
        );
        app.sync(state, start);

        let done = start + std::time::Duration::from_secs(2);
        app.on_frame(done);
        let text = render(&app, done);
        assert!(text.contains("1,000,000"));
        assert!(text.contains("250,000"));
        assert!(text.contains("25.00%"));
        assert!(text.contains("Updating data..."));
    }

    #[test]
    fn test_render_notification() {
        let mut app = App::new(&DashboardConfig::default());
        let now = Instant::now();
        let notification = Notification::fetch_failed(MetricKey::TotalSubscribedCapital);
        app.apply_event(DashboardEvent::Notify(notification), now);
        let text = render(&app, now);
        assert!(text.contains("Data Update Failed"));
    }

    #[test]
    fn test_gauge_ratio_clamped() {
        let app = App::new(&DashboardConfig::default());
        let count = DisplayMetric::Fetched(MetricKey::AttendanceCount);
        assert_eq!(gauge_ratio(&app, count, 500.0), 0.5);
        assert_eq!(gauge_ratio(&app, count, 5_000.0), 1.0);
        assert_eq!(gauge_ratio(&app, DisplayMetric::AttendancePercentage, 25.0), 0.25);
    }
}
