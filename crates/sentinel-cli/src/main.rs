mod bootstrap;
mod cli;
mod error;
mod handlers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sentinel_taskbus::TaskHandler;
use tokio::sync::watch;
use tracing::{error, info, warn};

use bootstrap::App;
use cli::{Cli, Command};
use error::CliError;
use handlers::{CsvHandler, FetchHandler, MaintenanceHandler, ProcessingHandler, WebhookHandler, WorkbookHandler};

#[tokio::main]
async fn main() {
    sentinel_core::logging::init();
    let cli = Cli::parse();

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "sentinel exiting with error");
            e.exit_code()
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> error::Result<()> {
    let app = App::bootstrap(cli.config.as_deref()).await?;

    match cli.command {
        Command::Test => run_test(&app).await,
        Command::Historical { limit } => run_historical(&app, limit).await,
        Command::Monitor => run_monitor(&app).await,
    }
}

/// Validate reachability of every external dependency without processing
/// any messages (SPEC_FULL.md §4.13): upstream session, workbook auth, and
/// the task bus / tracking store connections bootstrap already proved live.
async fn run_test(app: &App) -> error::Result<()> {
    let mut ok = true;

    let mut adapter = sentinel_upstream::TelegramAdapter::new(
        app.config.upstream.api_id,
        app.config.upstream.api_hash.clone(),
        app.config.upstream.phone.clone(),
        app.config.upstream.session_file.clone(),
    );
    match adapter.connect().await {
        Ok(()) => {
            info!("upstream session reachable");
            adapter.disconnect().await.ok();
        }
        Err(e) => {
            error!(error = %e, "upstream session check failed");
            ok = false;
        }
    }

    for (country_key, country) in &app.config.countries {
        match app.workbook_sink.session_probe(&country.workbook).await {
            Ok(()) => info!(country = country_key, "workbook reachable"),
            Err(e) => {
                error!(country = country_key, error = %e, "workbook check failed");
                ok = false;
            }
        }
    }

    let dead_letters = app
        .task_bus
        .dead_letter_count()
        .map_err(|e| CliError::ExternalFailure(e.to_string()))?;
    info!(dead_letters, "task bus reachable");

    if ok {
        info!("all external dependencies reachable");
        Ok(())
    } else {
        Err(CliError::ExternalFailure("one or more external dependency checks failed".to_string()))
    }
}

/// Bounded back-fill: one fetch cycle per channel capped at `limit`, then
/// drains the resulting processing/sink tasks before exiting without ever
/// starting the scheduler.
async fn run_historical(app: &App, limit: u32) -> error::Result<()> {
    let fetch_handler = FetchHandler::new(
        app.config.clone(),
        app.tracking.clone(),
        app.task_bus.clone(),
        app.admin.clone(),
        app.lockfile_path.clone(),
    );

    let enqueued = fetch_handler
        .run_historical(limit)
        .await
        .map_err(|e| CliError::ExternalFailure(e.to_string()))?;
    info!(enqueued, "historical fetch cycle complete, draining queues");

    let handlers = build_handlers(app);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bus = app.task_bus.clone();
    let worker_task = tokio::spawn(bus.run(handlers, shutdown_rx));

    wait_for_drain(app, &["processing", "csv", "workbook", "webhook"]).await;

    shutdown_tx.send(true).ok();
    worker_task.await.ok();

    Ok(())
}

/// Poll every `queue` until none has pending/in-flight work, or give up
/// after a generous ceiling so a stuck sink can't hang the CLI forever.
async fn wait_for_drain(app: &App, queues: &[&str]) {
    const POLL_INTERVAL: Duration = Duration::from_millis(500);
    const MAX_POLLS: u32 = 1200; // 10 minutes

    for _ in 0..MAX_POLLS {
        let any_open = queues.iter().any(|q| app.task_bus.queue_has_open_work(q).unwrap_or(false));
        if !any_open {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    warn!("historical drain timed out with work still outstanding");
}

/// Start the scheduler and task-bus workers and run until a shutdown signal
/// arrives, honoring the 15s grace window (SPEC_FULL.md §4.13/§5).
async fn run_monitor(app: &App) -> error::Result<()> {
    let scheduler_conn = rusqlite::Connection::open(&app.config.paths.taskbus_db)
        .map_err(|e| CliError::Config(format!("opening {}: {e}", app.config.paths.taskbus_db)))?;
    let scheduler = sentinel_scheduler::SchedulerEngine::new(scheduler_conn, app.task_bus.clone())
        .map_err(|e| CliError::Config(format!("scheduler init: {e}")))?;
    scheduler
        .register_seed_jobs(app.config.fetch.interval_seconds)
        .map_err(|e| CliError::Config(format!("scheduler seed jobs: {e}")))?;

    app.admin
        .notify(sentinel_sink_webhook::AdminEvent::Startup, "monitor loop starting")
        .await
        .ok();

    let handlers = build_handlers(app);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bus = app.task_bus.clone();
    let bus_task = tokio::spawn(bus.run(handlers, shutdown_rx.clone()));
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown requested, waiting up to 15s for workers to drain");
    shutdown_tx.send(true).ok();

    let grace = Duration::from_secs(15);
    if tokio::time::timeout(grace, async {
        bus_task.await.ok();
        scheduler_task.await.ok();
    })
    .await
    .is_err()
    {
        warn!("workers did not drain within the grace window, exiting anyway");
    }

    Ok(())
}

fn build_handlers(app: &App) -> HashMap<String, Arc<dyn TaskHandler>> {
    let mut handlers: HashMap<String, Arc<dyn TaskHandler>> = HashMap::new();

    handlers.insert(
        "fetch".to_string(),
        Arc::new(FetchHandler::new(
            app.config.clone(),
            app.tracking.clone(),
            app.task_bus.clone(),
            app.admin.clone(),
            app.lockfile_path.clone(),
        )),
    );
    handlers.insert(
        "processing".to_string(),
        Arc::new(ProcessingHandler::new(
            app.config.clone(),
            app.inference.clone(),
            app.translator.clone(),
            app.dispatcher.clone(),
        )),
    );
    handlers.insert("csv".to_string(), Arc::new(CsvHandler::new(app.config.clone(), app.csv_sinks.clone())));
    handlers.insert(
        "workbook".to_string(),
        Arc::new(WorkbookHandler::new(app.config.clone(), app.workbook_sink.clone(), app.admin.clone())),
    );
    handlers.insert(
        "webhook".to_string(),
        Arc::new(WebhookHandler::new(app.config.clone(), app.webhook_client.clone())),
    );
    handlers.insert(
        "maintenance".to_string(),
        Arc::new(MaintenanceHandler::new(app.config.clone(), app.task_bus.clone(), app.workbook_sink.clone())),
    );

    handlers
}
