//! ingest-worker: runs one SWPC ingestion cycle and exits.
//!
//! Scheduling is external (cron, systemd timer, ...). Each run fetches the
//! alerts, 3-day forecast and 27-day outlook feeds, stores whatever is new,
//! and sends notifications for newly stored alerts below the latitude gate.
//!
//! Flow: feeds → parse → store (create-if-absent) → notify

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use stormwatch_core::config::{load_dotenv, Config};
use stormwatch_ingest::{
    AlertNotifications, DirectoryFeedSource, FeedSource, FileStore, HttpFeedSource, IngestionController,
    MemoryStore, RecordStore,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// One-shot space-weather ingestion.
#[derive(Parser, Debug)]
#[command(name = "ingest-worker", version, about)]
struct Cli {
    /// Replay feeds from a directory (alerts.json, 3-day-geomag-forecast.txt,
    /// 27-day-outlook.txt) instead of fetching them.
    #[arg(long, env = "INGEST_FEED_DIR")]
    feed_dir: Option<PathBuf>,

    /// Log notifications instead of delivering them.
    #[arg(long)]
    dry_run: bool,

    /// Keep records in memory only (nothing is persisted between runs).
    #[arg(long)]
    memory_store: bool,

    /// Config profile; keys are read as `{PROFILE}_{KEY}` before `{KEY}`.
    #[arg(long, env = "STORMWATCH_PROFILE", default_value = "")]
    profile: String,

    /// Print the cycle report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::for_profile(&cli.profile);
    config.log_summary();

    let feeds: Arc<dyn FeedSource> = match &cli.feed_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "replaying feeds from directory");
            Arc::new(DirectoryFeedSource::new(dir))
        }
        None => Arc::new(HttpFeedSource::new(&config.feeds).context("failed to set up feed client")?),
    };

    let store: Arc<dyn RecordStore> = if cli.memory_store {
        Arc::new(MemoryStore::new())
    } else {
        let dir = config.storage.data_dir.join("records");
        Arc::new(FileStore::new(&dir).with_context(|| format!("failed to open record store at {}", dir.display()))?)
    };

    let notifications = AlertNotifications::from_config(&config.notify, cli.dry_run)
        .context("invalid notification configuration")?;

    let controller = IngestionController::new(feeds, store)
        .with_notifications(notifications)
        .with_stop_on_seen(config.ingest.stop_on_seen);

    let report = controller.run_cycle().await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    for (family, family_report) in [
        ("alerts", &report.alerts),
        ("forecast", &report.forecast),
        ("outlook", &report.outlook),
    ] {
        if let Some(error) = &family_report.error {
            tracing::warn!(family, error = %error, "family did not run");
        }
    }

    info!("ingest-worker exited cleanly");
    Ok(())
}
