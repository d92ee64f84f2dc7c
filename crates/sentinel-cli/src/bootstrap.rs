use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;
use sentinel_classifier::InferenceClient;
use sentinel_core::config::QueueTuning;
use sentinel_core::SentinelConfig;
use sentinel_dispatcher::Dispatcher;
use sentinel_sink_csv::CsvSink;
use sentinel_sink_webhook::{AdminNotifier, WebhookClient};
use sentinel_sink_workbook::WorkbookSink;
use sentinel_taskbus::TaskBus;
use sentinel_tracking::TrackingStore;
use sentinel_translator::Translator;

use crate::error::{CliError, Result};

/// Every component handle the CLI driver wires together, constructed once
/// and threaded through to whichever workers the chosen subcommand needs.
pub struct App {
    pub config: Arc<SentinelConfig>,
    pub tracking: Arc<TrackingStore>,
    pub task_bus: Arc<TaskBus>,
    pub dispatcher: Arc<Dispatcher>,
    /// One sink per country, keyed by the same id used in `config.countries`
    /// — each country's `csv_dir` may point at a different root.
    pub csv_sinks: HashMap<String, Arc<CsvSink>>,
    pub workbook_sink: Arc<WorkbookSink>,
    pub webhook_client: Arc<WebhookClient>,
    pub admin: Arc<AdminNotifier>,
    pub inference: Arc<InferenceClient>,
    pub translator: Arc<Translator>,
    pub lockfile_path: PathBuf,
}

impl App {
    pub async fn bootstrap(config_path: Option<&str>) -> Result<Self> {
        let config = SentinelConfig::load(config_path)
            .map_err(|e| CliError::Config(e.to_string()))?;

        let tracking = TrackingStore::connect(&config.cache.redis_url)
            .await
            .map_err(|e| CliError::ExternalFailure(format!("tracking store: {e}")))?;

        let taskbus_conn = open_sqlite(&config.paths.taskbus_db)?;
        let task_bus = TaskBus::new(taskbus_conn, queue_tuning_map(&config.queues))
            .map_err(|e| CliError::Config(format!("task bus init: {e}")))?;

        let csv_sinks: HashMap<String, Arc<CsvSink>> = config
            .countries
            .iter()
            .map(|(id, country)| (id.clone(), Arc::new(CsvSink::new(PathBuf::from(&country.csv_dir)))))
            .collect();
        let workbook_sink = WorkbookSink::new(config.workbook_auth.clone());
        let webhook_client = WebhookClient::new();
        let admin = AdminNotifier::new(&config.admin);
        let inference = InferenceClient::new(
            config.inference.base_url.clone(),
            config.inference.api_key.clone(),
            config.inference.model.clone(),
        );
        let translator = Translator::new(config.translation.free_base_url.clone());

        let config = Arc::new(config);
        let tracking = Arc::new(tracking);
        let task_bus = Arc::new(task_bus);
        let dispatcher = Arc::new(Dispatcher::new(task_bus.clone(), tracking.clone()));

        Ok(Self {
            lockfile_path: PathBuf::from(&config.paths.session_lockfile),
            config,
            tracking,
            task_bus,
            dispatcher,
            csv_sinks,
            workbook_sink: Arc::new(workbook_sink),
            webhook_client: Arc::new(webhook_client),
            admin: Arc::new(admin),
            inference: Arc::new(inference),
            translator: Arc::new(translator),
        })
    }
}

fn open_sqlite(path: &str) -> Result<Connection> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::Config(format!("cannot create {}: {e}", parent.display())))?;
    }
    Connection::open(path).map_err(|e| CliError::Config(format!("opening {path}: {e}")))
}

fn queue_tuning_map(queues: &sentinel_core::config::QueueConfig) -> HashMap<String, QueueTuning> {
    let mut m = HashMap::new();
    m.insert("fetch".to_string(), queues.fetch.clone());
    m.insert("processing".to_string(), queues.processing.clone());
    m.insert("webhook".to_string(), queues.webhook.clone());
    m.insert("workbook".to_string(), queues.workbook.clone());
    m.insert("csv".to_string(), queues.csv.clone());
    m.insert("maintenance".to_string(), queues.maintenance.clone());
    m
}

