//! Meeting dashboard binary.
//!
//! Polls the meeting backend and shows live attendance and capital figures in
//! the terminal, or logs them when run headless.

use clap::Parser;
use meeting_dashboard::{
    Credential, Dashboard, DashboardConfig, DashboardVariant,
    headless::run_headless,
    logging::{self, LogTarget},
    tui::{App, run_tui},
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Capacity of the event channel between poll cycles and the view.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "meeting-dashboard")]
#[command(about = "Live attendance and capital statistics for a shareholders' meeting")]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/meeting-dashboard/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the meeting backend API
    #[arg(long)]
    base_url: Option<String>,

    /// Dashboard layout and cadence
    #[arg(long, value_enum)]
    variant: Option<DashboardVariant>,

    /// Time between poll cycles, e.g. "30s"
    #[arg(long, value_parser = parse_duration)]
    poll_interval: Option<Duration>,

    /// Bearer token for the statistics endpoints
    #[arg(long, env = "DASHBOARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log events instead of drawing the TUI
    #[arg(long)]
    headless: bool,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Let a new poll cycle start while the previous one is still running
    #[arg(long)]
    no_overlap_guard: bool,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<DashboardConfig> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::load(path)?,
            None => match DashboardConfig::default_path() {
                Some(path) => DashboardConfig::load_or_default(&path)?,
                None => DashboardConfig::default(),
            },
        };

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(interval) = self.poll_interval {
            config.poll_interval = Some(interval);
        }
        if self.no_overlap_guard {
            config.skip_overlapping_cycles = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(
        &cli.log_level,
        LogTarget::select(cli.headless, cli.log_file.as_deref()),
    )?;

    let config = cli.load_config()?;
    let credential = cli.token.as_deref().and_then(Credential::from_token);
    if credential.is_none() {
        warn!("No token configured; set --token or DASHBOARD_TOKEN");
    }

    info!(
        "Starting {} against {}",
        config.variant.title(),
        config.base_url
    );

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let dashboard = Dashboard::connect(&config, credential, event_tx)?;

    if cli.headless {
        run_headless(dashboard, event_rx).await?;
    } else {
        let app = App::new(&config);
        let result = run_tui(app, &dashboard, event_rx, config.tick_rate).await;
        dashboard.unmount();
        result?;
    }

    Ok(())
}
