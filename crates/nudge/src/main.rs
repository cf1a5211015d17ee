use async_trait::async_trait;
use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use nudge_config::NudgeConfig;
use nudge_core::error::GatewayError;
use nudge_core::gateway::{Notification, NotificationGateway};
use nudge_core::policy::ReminderPolicy;
use nudge_core::schedule::ScheduleResolver;
use nudge_core::scheduler::{self, TickReport};
use nudge_core::{Nudge, RequestContext};
use nudge_db::{DbStore, schema};
use nudge_events::{EventBus, EventSource};
use nudge_serve::gateway::OutboundBus;
use owo_colors::OwoColorize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "nudge", about = "Recurring task reminders with escalating follow-ups")]
struct Cli {
    /// Config file read instead of `./nudge.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP surface and the periodic scheduler.
    Serve,
    /// Run one scheduler pass, printing notifications to the terminal.
    Tick,
    /// Print the OpenAPI document.
    Openapi,
}

/// Delivers to stdout. Used by `nudge tick` where no transport is connected.
struct ConsoleGateway;

#[async_trait]
impl NotificationGateway for ConsoleGateway {
    async fn send_notification(&self, notification: &Notification) -> Result<(), GatewayError> {
        println!(
            "{} {} {}",
            format!("[{}]", notification.conversation).dimmed(),
            format!("@{}", notification.assignee).bold(),
            notification.text
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!(error = %err, "nudge failed");
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    match cli.command {
        Command::Openapi => {
            println!("{}", nudge_serve::openapi::generate_spec());
            Ok(())
        }
        Command::Serve => {
            let config = NudgeConfig::load_from(cli.config.as_deref())?;
            serve(&config).await
        }
        Command::Tick => {
            let config = NudgeConfig::load_from(cli.config.as_deref())?;
            let nudge = build_nudge(&config, Arc::new(ConsoleGateway), EventBus::new(64))?;
            nudge.rebuild_index()?;
            let report = nudge
                .scheduler()
                .tick(&RequestContext::new(EventSource::Cli, None))
                .await;
            print_report(&report);
            Ok(())
        }
    }
}

async fn serve(config: &NudgeConfig) -> Result<(), BoxError> {
    let addr: SocketAddr = config.server.bind_addr().parse()?;
    let outbound = OutboundBus::new(config.outbound.buffer);
    let nudge = Arc::new(build_nudge(
        config,
        Arc::new(outbound.clone()),
        EventBus::new(1024),
    )?);
    let restored = nudge.rebuild_index()?;
    info!(restored, "pending responses restored");

    let ticker = tokio::spawn(scheduler::run(
        Arc::clone(&nudge),
        Duration::from_secs(config.scheduler.tick_secs),
        shutdown_signal(),
    ));
    let state = nudge_serve::AppState::new(nudge, outbound);
    nudge_serve::serve(state, addr, shutdown_signal()).await?;
    ticker.await?;
    Ok(())
}

fn build_nudge(
    config: &NudgeConfig,
    gateway: Arc<dyn NotificationGateway>,
    event_bus: EventBus,
) -> Result<Nudge<DbStore>, BoxError> {
    let store = open_store(&config.storage.db_path)?;
    let scheduler = &config.scheduler;
    let policy = ReminderPolicy {
        interval: TimeDelta::seconds(i64::try_from(scheduler.reminder_interval_secs)?),
        max_reminders: scheduler.max_reminders,
        gateway_timeout: Duration::from_secs(scheduler.gateway_timeout_secs),
    };
    let resolver = ScheduleResolver::new(scheduler.offset()?);
    Ok(Nudge::new(store, gateway, event_bus)
        .with_resolver(resolver)
        .with_policy(policy))
}

fn open_store(path: &Path) -> Result<DbStore, BoxError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let path = path.to_str().ok_or("database path is not valid UTF-8")?;
    Ok(DbStore::new(schema::open_and_migrate(path)?))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler, run until killed.
        std::future::pending::<()>().await;
    }
}

fn print_report(report: &TickReport) {
    if report.skipped {
        println!("{}", "tick skipped: another pass is running".yellow());
        return;
    }
    println!(
        "{} {} sent ({} initial, {} follow-up, {} final), {} stale",
        "tick".bold(),
        report.sent().green(),
        report.notified,
        report.follow_ups,
        report.final_notices,
        report.stale
    );
    if report.failures > 0 {
        println!("{}", format!("{} failed, retried next tick", report.failures).red());
    }
}
