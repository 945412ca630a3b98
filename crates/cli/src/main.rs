use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use lp_rebalancer_core::config_loader::DEFAULT_CONFIG_PATH;
use lp_rebalancer_core::{ConfigLoader, ConfigPatch, ConfigWatcher, MonitorConfig, StatusFormatter};
use lp_rebalancer_engine::{CycleReport, MonitorHandle};

mod paper;

use paper::{PaperLedger, PaperLocator};

#[derive(Parser)]
#[command(name = "lp-rebalancer")]
#[command(about = "Autonomous rebalancing for liquidity positions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SessionArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// JSON snapshot with positions, profile, balances and opportunities
    #[arg(short, long)]
    snapshot: PathBuf,
    /// User whose positions are monitored
    #[arg(short, long, env = "LP_REBALANCER_USER")]
    user: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor until Ctrl+C, following config file edits
    Run {
        #[command(flatten)]
        session: SessionArgs,
        /// Optional log file path (logs to file instead of stderr)
        #[arg(long)]
        log_file: Option<String>,
    },
    /// Run exactly one monitoring cycle and print the report
    Check {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Analyse positions and rank opportunities without executing anything
    Evaluate {
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run {
            log_file: Some(path),
            ..
        } => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .init();
        }
    }

    match cli.command {
        Commands::Run { session, .. } => run_monitor(&session).await?,
        Commands::Check { session } => run_check(&session).await?,
        Commands::Evaluate { session } => run_evaluate(&session).await?,
    }

    Ok(())
}

fn paper_locator(session: &SessionArgs) -> anyhow::Result<Arc<PaperLocator>> {
    let ledger = PaperLedger::from_file(&session.user, &session.snapshot)?;
    Ok(PaperLocator::new(&ledger))
}

fn load_config(path: &Path) -> MonitorConfig {
    tracing::info!("Loading config from {}", path.display());
    ConfigLoader::load_from(path)
}

async fn run_monitor(session: &SessionArgs) -> anyhow::Result<()> {
    let config = load_config(&session.config);
    let locator = paper_locator(session)?;
    let (handle, task) = MonitorHandle::spawn(config.clone(), locator);

    let (watcher, mut config_rx) = ConfigWatcher::new(config);
    let watch_path = session.config.clone();
    let watcher_task = tokio::spawn(async move {
        if let Err(e) = watcher.watch(&watch_path).await {
            tracing::warn!("Config watcher stopped: {}", e);
        }
    });

    let status = handle.start(session.user.as_str()).await?;
    tracing::info!("Monitor {} for user {}", status.state, session.user);

    let mut snapshots = handle.subscribe();
    let mut last_printed = None;

    loop {
        tokio::select! {
            Ok(()) = snapshots.changed() => {
                let status = snapshots.borrow_and_update().status.clone();
                if status.last_cycle_at.is_some() && status.last_cycle_at != last_printed {
                    last_printed = status.last_cycle_at;
                    println!("{}", StatusFormatter::format(&status));
                }
            }
            Ok(()) = config_rx.changed() => {
                let patch = ConfigPatch::from(&*config_rx.borrow_and_update());
                handle.update_config(patch).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    // Queued behind any in-flight cycle
    handle.stop().await?;
    handle.shutdown().await?;
    task.await?;
    watcher_task.abort();

    tracing::info!("Monitor stopped");
    Ok(())
}

async fn run_check(session: &SessionArgs) -> anyhow::Result<()> {
    let config = load_config(&session.config);
    let locator = paper_locator(session)?;
    let (handle, task) = MonitorHandle::spawn(config, locator);

    let report = handle.trigger_check(session.user.as_str()).await?;

    print_report(&report);
    println!("{}", StatusFormatter::format(&handle.get_status()));

    handle.shutdown().await?;
    task.await?;
    Ok(())
}

async fn run_evaluate(session: &SessionArgs) -> anyhow::Result<()> {
    let config = MonitorConfig {
        auto_rebalance_enabled: false,
        ..load_config(&session.config)
    };
    let locator = paper_locator(session)?;
    let (handle, task) = MonitorHandle::spawn(config, locator);

    handle.trigger_check(session.user.as_str()).await?;

    println!("Positions");
    print!("{}", StatusFormatter::format_positions(&handle.get_positions()));
    println!();
    println!("Opportunities");
    print!("{}", StatusFormatter::format_opportunities(&handle.get_opportunities()));

    handle.shutdown().await?;
    task.await?;
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!(
        "Analyzed {} position(s), found {} opportunity(ies), {} approved, {} executed",
        report.positions_analyzed,
        report.opportunities_found,
        report.approved,
        report.rebalances.len()
    );
    for result in &report.rebalances {
        if result.is_incident() {
            println!(
                "INCIDENT {} -> {}: {}",
                result.from_pool.as_deref().unwrap_or("(idle)"),
                result.to_pool,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
