//! # Herald — Scheduled Report Pipeline
//!
//! Runs the content pipeline on configured daily triggers, delivers
//! the report to Feishu webhooks, and serves a small HTTP API for
//! status, config updates, and manual runs.
//!
//! Usage:
//!   herald serve                      # Scheduler + gateway (default port 8080)
//!   herald run --days 7               # One pipeline run, then exit
//!   herald send --file report.md      # Deliver an existing report file

mod collab;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use herald_core::{ConfigStore, RunStatus, ScheduleConfig};
use herald_gateway::AppState;
use herald_notify::{Dispatcher, FeishuSender, ReportPayload};
use herald_scheduler::{PipelineRunner, TriggerTable, spawn_scheduler};
use tokio::sync::{Mutex, RwLock};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "📰 Herald — scheduled report pipeline with Feishu delivery"
)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scheduler loop and the HTTP gateway
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Gateway port
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Config file path
        #[arg(long, default_value = "~/.herald/config.json")]
        config: String,

        /// Data directory for stored articles and saved reports
        #[arg(long, default_value = "~/.herald/data")]
        data_dir: String,

        /// Seconds between trigger checks
        #[arg(long, default_value = "30")]
        check_interval: u64,
    },

    /// Run the pipeline once and exit
    Run {
        /// Config file path
        #[arg(long, default_value = "~/.herald/config.json")]
        config: String,

        /// Data directory for stored articles and saved reports
        #[arg(long, default_value = "~/.herald/data")]
        data_dir: String,

        /// Override the configured lookback window
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Send an existing report file to a single webhook
    Send {
        /// Destination webhook (falls back to HERALD_WEBHOOK)
        #[arg(long)]
        webhook: Option<String>,

        /// Report file to deliver
        #[arg(short, long, default_value = "report.md")]
        file: String,

        /// Card title (defaults to the dated report title)
        #[arg(short, long)]
        title: Option<String>,

        /// Lookback label for flow-bot payloads
        #[arg(long, default_value = "1")]
        days: u32,
    },
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn build_runner(config: &Arc<RwLock<ScheduleConfig>>, data_dir: &str) -> PipelineRunner {
    PipelineRunner::new(
        Arc::clone(config),
        Arc::new(collab::FileArticleStore::new(expand_path(data_dir))),
        Arc::new(collab::NoopCrawler),
        Arc::new(collab::DigestAgent::new()),
        Dispatcher::new(FeishuSender::new()),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            config,
            data_dir,
            check_interval,
        } => serve(&host, port, &config, &data_dir, check_interval).await,
        Commands::Run {
            config,
            data_dir,
            days,
        } => run_once(&config, &data_dir, days).await,
        Commands::Send {
            webhook,
            file,
            title,
            days,
        } => send_file(webhook, &file, title, days).await,
    }
}

async fn serve(
    host: &str,
    port: u16,
    config_path: &str,
    data_dir: &str,
    check_interval: u64,
) -> Result<()> {
    let store = ConfigStore::new(expand_path(config_path));
    let cfg = store.load();

    let mut table = TriggerTable::new();
    table.apply(&cfg.schedule_times);

    let config = Arc::new(RwLock::new(cfg));
    let triggers = Arc::new(Mutex::new(table));
    let runner = Arc::new(build_runner(&config, data_dir));

    spawn_scheduler(Arc::clone(&triggers), Arc::clone(&runner), check_interval);

    println!("📰 Herald v{}", env!("CARGO_PKG_VERSION"));
    println!("   🌐 Gateway:   http://{host}:{port}");
    println!("   ⚙️ Config:    {}", store.path().display());
    println!("   📂 Data dir:  {}", expand_path(data_dir));
    println!();

    let state = AppState {
        config,
        config_store: store,
        triggers,
        runner,
        start_time: std::time::Instant::now(),
    };
    herald_gateway::start(state, host, port).await?;
    Ok(())
}

async fn run_once(config_path: &str, data_dir: &str, days: Option<u32>) -> Result<()> {
    let store = ConfigStore::new(expand_path(config_path));
    let mut cfg = store.load();
    if let Some(days) = days {
        cfg.days_to_crawl = days.max(1);
    }

    let config = Arc::new(RwLock::new(cfg));
    let runner = build_runner(&config, data_dir);

    if !runner.run_if_idle().await {
        anyhow::bail!("a pipeline run is already in progress");
    }

    match runner.snapshot().await.status {
        RunStatus::Error { message } => anyhow::bail!("pipeline failed: {message}"),
        status => {
            tracing::info!("📣 Run finished: {status}");
            Ok(())
        }
    }
}

async fn send_file(
    webhook: Option<String>,
    file: &str,
    title: Option<String>,
    days: u32,
) -> Result<()> {
    let webhook = webhook
        .or_else(|| std::env::var("HERALD_WEBHOOK").ok())
        .ok_or_else(|| anyhow::anyhow!("no webhook given; pass --webhook or set HERALD_WEBHOOK"))?;

    let body = std::fs::read_to_string(expand_path(file))?;

    let mut payload = ReportPayload::new(body, days);
    if let Some(title) = title {
        payload = payload.with_title(title);
    }

    let dispatcher = Dispatcher::new(FeishuSender::new());
    for (destination, result) in dispatcher.dispatch_report(&[webhook], &payload).await {
        match result {
            Ok(()) => tracing::info!("✅ Delivered to {destination}"),
            Err(e) => anyhow::bail!("delivery to {destination} failed: {e}"),
        }
    }
    Ok(())
}
