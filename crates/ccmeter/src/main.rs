//! ccmeter - Local usage and cost meter for Claude Code session logs

mod cli;

use anyhow::{Context, Result};
use ccmeter_core::config::CONFIG_DIR_ENV;
use ccmeter_core::error::ErrorSeverity;
use ccmeter_core::discovery::{candidate_roots, discover_files, has_projects_dir};
use ccmeter_core::{
    MonitorConfig, MonitorEvent, RefreshConfig, RefreshCoordinator, RefreshGate, SystemClock,
    UsageMonitor,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "ccmeter",
    version,
    about = "Local usage and cost meter for Claude Code session logs",
    long_about = "Reads the assistant's JSONL usage logs, groups requests into 5-hour\n\
                  session blocks and reports totals, burn rates and projections.\n\
                  \n\
                  Examples:\n\
                    ccmeter                          # Today's usage (default)\n\
                    ccmeter history --json           # Full history as JSON\n\
                    ccmeter blocks --active          # Current session block\n\
                    ccmeter watch --interval 30      # Live summary line\n\
                  \n\
                  Environment Variables:\n\
                    CLAUDE_CONFIG_DIR                # Comma-separated data roots\n\
                    CCMETER_WINDOW_HOURS             # Session block length\n\
                    CCMETER_LOG                      # Log filter (e.g. ccmeter_core=debug)\n\
                    CCMETER_NO_COLOR                 # Disable ANSI colors"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Data root containing a projects/ directory (repeatable)
    #[arg(long = "root", global = true, env = CONFIG_DIR_ENV, value_delimiter = ',')]
    roots: Vec<PathBuf>,

    /// Session block length in hours
    #[arg(long, global = true, env = "CCMETER_WINDOW_HOURS", default_value_t = 5)]
    window_hours: i64,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, global = true, env = "CCMETER_NO_COLOR")]
    no_color: bool,

    /// Debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Today's totals, active block and burn rate (default)
    Today,
    /// Daily, per-model and per-project history
    History,
    /// Session blocks with burn rates and projections
    Blocks {
        /// Only the active block
        #[arg(long)]
        active: bool,
    },
    /// Keep running and print a summary after every refresh
    Watch {
        /// Fallback refresh interval in seconds
        #[arg(long, default_value = "60")]
        interval: u64,
    },
    /// Show resolved data roots and log file counts
    Paths,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("ccmeter=debug,ccmeter_core=debug")
    } else {
        EnvFilter::try_from_env("CCMETER_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = MonitorConfig::with_roots(cli.roots.clone()).with_window_hours(cli.window_hours);

    match cli.command.unwrap_or(Command::Today) {
        Command::Today => run_today(config, cli.json, cli.no_color).await,
        Command::History => run_history(config, cli.json, cli.no_color).await,
        Command::Blocks { active } => run_blocks(config, active, cli.json, cli.no_color).await,
        Command::Watch { interval } => run_watch(config, interval).await,
        Command::Paths => run_paths(config, cli.json, cli.no_color),
    }
}

fn build_monitor(config: MonitorConfig) -> Result<UsageMonitor> {
    UsageMonitor::new(config).context("Invalid configuration")
}

fn report_failures(monitor: &UsageMonitor) {
    let report = monitor.last_report();
    for entry in &report.errors {
        match entry.severity {
            ErrorSeverity::Warning => warn!(source = %entry.source, "{}", entry.message),
            ErrorSeverity::Error => error!(source = %entry.source, "{}", entry.message),
        }
    }

    let (warnings, errors) = report.error_count();
    if errors > 0 {
        eprintln!(
            "Warning: {} log file(s) could not be read; totals may be incomplete",
            errors
        );
    } else if warnings > 0 {
        debug!(warnings, "Some log files vanished during the load");
    }
}

async fn run_today(config: MonitorConfig, json: bool, no_color: bool) -> Result<()> {
    let monitor = build_monitor(config)?;
    let today = monitor
        .load_today(false)
        .await
        .context("Failed to load usage data")?;
    report_failures(&monitor);

    println!("{}", cli::format_today(&today, json, no_color));
    Ok(())
}

async fn run_history(config: MonitorConfig, json: bool, no_color: bool) -> Result<()> {
    let monitor = build_monitor(config)?;
    let history = monitor
        .load_history(true)
        .await
        .context("Failed to load usage data")?
        .context("History phase produced no result")?;
    report_failures(&monitor);

    println!("{}", cli::format_history(&history, json, no_color));
    Ok(())
}

async fn run_blocks(config: MonitorConfig, active: bool, json: bool, no_color: bool) -> Result<()> {
    let monitor = build_monitor(config)?;
    monitor
        .load_today(false)
        .await
        .context("Failed to load usage data")?;
    report_failures(&monitor);

    let blocks = if active {
        monitor.get_active_block().into_iter().collect()
    } else {
        monitor.blocks().as_ref().clone()
    };

    println!("{}", cli::format_blocks(&blocks, json, no_color));
    Ok(())
}

async fn run_watch(config: MonitorConfig, interval: u64) -> Result<()> {
    let monitor = Arc::new(build_monitor(config)?);

    // Print a line for every completed today phase, whichever trigger caused it
    let mut events = monitor.event_bus().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(MonitorEvent::TodayLoaded(today)) => {
                    println!("{}", cli::format_watch_line(&today))
                }
                Ok(MonitorEvent::LoadFailed(message)) => eprintln!("Load failed: {}", message),
                Ok(MonitorEvent::WatcherError(message)) => eprintln!("Watcher error: {}", message),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    monitor
        .load_all(false)
        .await
        .context("Failed to load usage data")?;

    let refresh_config =
        RefreshConfig::default().with_timer_interval(Duration::from_secs(interval.max(1)));
    let coordinator =
        RefreshCoordinator::new(refresh_config, monitor.roots(), Arc::new(SystemClock))
            .with_event_bus(monitor.event_bus().clone());

    let gate = RefreshGate::new();
    let refresh_monitor = Arc::clone(&monitor);
    coordinator.on_refresh(move |reason| {
        let monitor = Arc::clone(&refresh_monitor);
        let gate = gate.clone();
        tokio::spawn(async move {
            // Failures are already published on the event bus
            let _ = gate.load(&monitor, reason).await;
        });
    });

    if let Err(e) = coordinator.start_all() {
        eprintln!("Warning: {} (continuing with remaining triggers)", e);
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    coordinator.stop_all().await;
    printer.abort();
    Ok(())
}

fn run_paths(config: MonitorConfig, json: bool, no_color: bool) -> Result<()> {
    let roots: Vec<cli::RootStatus> = candidate_roots(&config)
        .into_iter()
        .map(|path| {
            let has_projects = has_projects_dir(&path);
            let files = if has_projects {
                discover_files(std::slice::from_ref(&path)).len()
            } else {
                0
            };
            cli::RootStatus {
                path,
                has_projects,
                files,
            }
        })
        .collect();

    println!("{}", cli::format_paths(&roots, json, no_color));
    Ok(())
}
