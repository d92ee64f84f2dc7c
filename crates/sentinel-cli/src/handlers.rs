use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sentinel_classifier::{classify, InferenceClient};
use sentinel_core::config::SentinelConfig;
use sentinel_core::types::{ChannelId, CountryId, ExternalMessageId, ProcessedMessage, RawMessage, Sheet, Verdict};
use sentinel_dispatcher::Dispatcher;
use sentinel_sink_csv::CsvSink;
use sentinel_sink_webhook::{AdminEvent, AdminNotifier, WebhookClient};
use sentinel_sink_workbook::WorkbookSink;
use sentinel_taskbus::{TaskBus, TaskHandler, TaskOutcome};
use sentinel_tracking::{coldstart, TrackingStore};
use sentinel_translator::Translator;
use sentinel_upstream::{TelegramAdapter, UpstreamAdapter, UpstreamError};
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Rate-limit waits beyond this are also escalated to the admin channel
/// (rate-limit handling: "admin alert if w > 1h").
const RATE_LIMIT_ADMIN_THRESHOLD_SECS: u64 = 3600;
/// A processing-queue payload envelope: the raw message plus which country
/// partition fetched it (a channel belongs to exactly one country).
fn processing_payload(raw: &RawMessage, country: &str) -> Value {
    json!({ "raw": raw, "country": country })
}

/// One fetch cycle across every configured country and channel. Opens a
/// single upstream session for the whole cycle (SPEC_FULL.md §4.2: "opens at
/// start of fetch cycle, closes at end") and enqueues one `processing` task
/// per unseen message rather than touching any sink directly.
pub struct FetchHandler {
    config: Arc<SentinelConfig>,
    tracking: Arc<TrackingStore>,
    task_bus: Arc<TaskBus>,
    admin: Arc<AdminNotifier>,
    lockfile_path: PathBuf,
}

impl FetchHandler {
    pub fn new(
        config: Arc<SentinelConfig>,
        tracking: Arc<TrackingStore>,
        task_bus: Arc<TaskBus>,
        admin: Arc<AdminNotifier>,
        lockfile_path: PathBuf,
    ) -> Self {
        Self { config, tracking, task_bus, admin, lockfile_path }
    }

    /// Resolve the since-id / min-age-cutoff pair for one channel, per the
    /// fallback chain in SPEC_FULL.md §4.1: cache cursor, then CSV backfill,
    /// then conservative time-based admission.
    async fn resolve_since(
        &self,
        channel: &ChannelId,
        country_key: &str,
        csv_sink: &CsvSink,
    ) -> (Option<ExternalMessageId>, DateTime<Utc>) {
        let now = Utc::now();
        let max_age_cutoff = now - Duration::hours(self.config.fetch.max_message_age_hours);

        match self.tracking.get_cursor(channel).await {
            Ok(Some(id)) => return (Some(ExternalMessageId(id)), max_age_cutoff),
            Ok(None) => {}
            Err(e) => warn!(channel = %channel, error = %e, "cursor lookup failed, falling back to cold-start recovery"),
        }

        let mut recovered: Option<i64> = None;
        for sheet in [Sheet::Significant, Sheet::Trivial] {
            let path = csv_sink.path(country_key, sheet);
            match coldstart::recover_cursor_from_csv(&path, &channel.0) {
                Ok(Some(id)) => recovered = Some(recovered.map_or(id, |r| r.max(id))),
                Ok(None) => {}
                Err(e) => warn!(channel = %channel, error = %e, "csv cold-start recovery failed"),
            }
        }

        if let Some(id) = recovered {
            return (Some(ExternalMessageId(id)), max_age_cutoff);
        }

        let conservative = coldstart::conservative_admission_cutoff(now, self.config.fetch.interval_seconds);
        (None, conservative.max(max_age_cutoff))
    }

    async fn run_channel(
        &self,
        adapter: &TelegramAdapter,
        channel: &ChannelId,
        country_key: &str,
        csv_sink: &CsvSink,
        limit: Option<u32>,
    ) -> Result<usize, UpstreamError> {
        let (since_id, min_age_cutoff) = self.resolve_since(channel, country_key, csv_sink).await;
        let max_count = limit.unwrap_or(self.config.fetch.message_limit);

        let messages = adapter.fetch_new(channel, since_id, max_count, min_age_cutoff).await?;

        let mut enqueued = 0usize;
        for raw in messages {
            match self.tracking.is_seen(channel, raw.external_id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(channel = %channel, external_id = %raw.external_id, error = %e, "dedupe check failed, enqueuing anyway");
                }
            }

            let idempotency_key = format!("{}:{}:processing", channel, raw.external_id);
            let payload = processing_payload(&raw, country_key);
            match self.task_bus.enqueue("processing", &idempotency_key, payload) {
                Ok(outcome) => {
                    info!(channel = %channel, external_id = %raw.external_id, ?outcome, "processing task enqueued");
                    enqueued += 1;
                }
                Err(e) => {
                    error!(channel = %channel, error = %e, "failed to enqueue processing task");
                    continue;
                }
            }

            if let Err(e) = self.tracking.mark_seen(channel, raw.external_id).await {
                warn!(channel = %channel, external_id = %raw.external_id, error = %e, "failed to mark message seen");
            }
        }

        Ok(enqueued)
    }

    /// Run one bounded fetch cycle, capped at `limit` messages per channel.
    /// Used directly by the CLI's `historical` subcommand, bypassing the
    /// forward-only cursor admission the `fetch` queue's worker loop relies
    /// on (SPEC_FULL.md §4.13).
    pub async fn run_cycle(&self, limit: Option<u32>) -> Result<usize, UpstreamError> {
        let guard = sentinel_session_guard::acquire(&self.lockfile_path, "fetch")
            .await
            .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;

        let total = self.run_cycle_locked(limit).await;

        drop(guard);
        total
    }

    /// Bounded back-fill for the `historical` subcommand: ignores the
    /// tracking-store cursor entirely and pulls up to `limit` messages per
    /// channel regardless of what has already been admitted (SPEC_FULL.md
    /// §4.13's "bypassing forward-only cursor admission").
    pub async fn run_historical(&self, limit: u32) -> Result<usize, UpstreamError> {
        let guard = sentinel_session_guard::acquire(&self.lockfile_path, "historical")
            .await
            .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;

        let mut adapter = TelegramAdapter::new(
            self.config.upstream.api_id,
            self.config.upstream.api_hash.clone(),
            self.config.upstream.phone.clone(),
            self.config.upstream.session_file.clone(),
        );
        adapter.connect().await?;

        let epoch = chrono::DateTime::<Utc>::from_timestamp(0, 0).expect("unix epoch is a valid timestamp");
        let mut total = 0usize;

        for (country_key, country) in &self.config.countries {
            for channel in &country.channels {
                let channel = ChannelId(channel.clone());
                match adapter.fetch_new(&channel, None, limit, epoch).await {
                    Ok(messages) => {
                        for raw in messages {
                            let idempotency_key = format!("{}:{}:processing", channel, raw.external_id);
                            let payload = processing_payload(&raw, country_key);
                            if let Ok(outcome) = self.task_bus.enqueue("processing", &idempotency_key, payload) {
                                info!(channel = %channel, external_id = %raw.external_id, ?outcome, "historical processing task enqueued");
                                total += 1;
                            }
                            self.tracking.mark_seen(&channel, raw.external_id).await.ok();
                        }
                    }
                    Err(e) => warn!(channel = %channel, error = %e, "historical fetch failed for this channel"),
                }
            }
        }

        adapter.disconnect().await.ok();
        drop(guard);
        Ok(total)
    }

    async fn run_cycle_locked(&self, limit: Option<u32>) -> Result<usize, UpstreamError> {
        let mut adapter = TelegramAdapter::new(
            self.config.upstream.api_id,
            self.config.upstream.api_hash.clone(),
            self.config.upstream.phone.clone(),
            self.config.upstream.session_file.clone(),
        );

        if let Err(e) = adapter.connect().await {
            if let UpstreamError::AuthRequired(ref msg) = e {
                self.task_bus.suppress_queue("fetch", far_future());
                self.admin.notify(AdminEvent::AuthRequired, msg).await.ok();
            }
            return Err(e);
        }

        let mut total = 0usize;
        let mut aborted = false;

        'countries: for (country_key, country) in &self.config.countries {
            let csv_dir = PathBuf::from(&country.csv_dir);
            let csv_sink = CsvSink::new(csv_dir);
            for channel in &country.channels {
                let channel = ChannelId(channel.clone());
                match self.run_channel(&adapter, &channel, country_key, &csv_sink, limit).await {
                    Ok(n) => total += n,
                    Err(UpstreamError::RateLimited { wait_secs }) => {
                        let until = Utc::now() + Duration::seconds(wait_secs as i64);
                        self.task_bus.suppress_queue("fetch", until);
                        if wait_secs > RATE_LIMIT_ADMIN_THRESHOLD_SECS {
                            self.admin
                                .notify(AdminEvent::RateLimitHit, &format!("rate limited for {wait_secs}s on {channel}"))
                                .await
                                .ok();
                        }
                        warn!(channel = %channel, wait_secs, "rate limited, aborting fetch cycle");
                        aborted = true;
                        break 'countries;
                    }
                    Err(UpstreamError::AuthRequired(msg)) => {
                        self.task_bus.suppress_queue("fetch", far_future());
                        self.admin.notify(AdminEvent::AuthRequired, &msg).await.ok();
                        aborted = true;
                        break 'countries;
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "fetch failed for this channel, continuing with the rest of the cycle");
                    }
                }
            }
        }

        adapter.disconnect().await.ok();

        if aborted {
            return Err(UpstreamError::Transient("fetch cycle aborted early".to_string()));
        }
        Ok(total)
    }
}

fn far_future() -> DateTime<Utc> {
    Utc::now() + Duration::days(365 * 100)
}

#[async_trait]
impl TaskHandler for FetchHandler {
    async fn handle(&self, _payload: Value) -> TaskOutcome {
        match self.run_cycle(None).await {
            Ok(n) => {
                info!(enqueued = n, "fetch cycle complete");
                TaskOutcome::Done
            }
            Err(e) => TaskOutcome::Retriable(e.to_string()),
        }
    }
}

/// Runs the classify -> translate -> dispatch pipeline for one raw message.
pub struct ProcessingHandler {
    config: Arc<SentinelConfig>,
    inference: Arc<InferenceClient>,
    translator: Arc<Translator>,
    dispatcher: Arc<Dispatcher>,
}

impl ProcessingHandler {
    pub fn new(
        config: Arc<SentinelConfig>,
        inference: Arc<InferenceClient>,
        translator: Arc<Translator>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self { config, inference, translator, dispatcher }
    }
}

#[async_trait]
impl TaskHandler for ProcessingHandler {
    async fn handle(&self, payload: Value) -> TaskOutcome {
        let raw: RawMessage = match serde_json::from_value(payload["raw"].clone()) {
            Ok(r) => r,
            Err(e) => return TaskOutcome::Fatal(format!("malformed raw message payload: {e}")),
        };
        let country_key = match payload["country"].as_str() {
            Some(c) => c.to_string(),
            None => return TaskOutcome::Fatal("processing payload missing 'country'".to_string()),
        };
        let Some(country) = self.config.countries.get(&country_key) else {
            return TaskOutcome::Fatal(format!("unknown country '{country_key}'"));
        };

        let result = classify(&raw.body, &country.classification_policy, Some(&self.inference), &country_key).await;

        let (translated_body, was_translated) = if result.verdict == Verdict::Excluded {
            (raw.body.clone(), false)
        } else {
            let (_lang, text, translated) = self
                .translator
                .translate(&raw.body, country.classification_policy.use_ai_for_translation, Some(&self.inference))
                .await;
            (text, translated)
        };

        let msg = ProcessedMessage {
            raw,
            country: CountryId(country_key),
            language: result.language,
            translated_body,
            was_translated,
            verdict: result.verdict,
            matched_keywords: result.matched_keywords,
            method: result.method,
            reasoning: result.reasoning,
            processed_at: Utc::now(),
        };

        match self.dispatcher.dispatch(msg).await {
            Ok(()) => TaskOutcome::Done,
            Err(e) => TaskOutcome::Retriable(e.to_string()),
        }
    }
}

/// Shared deserialization shape for the csv/workbook/webhook queues: the
/// dispatcher enqueues the same envelope on every sink queue it fans out to.
fn parse_sink_payload(payload: &Value) -> Result<(ProcessedMessage, Sheet), String> {
    let msg: ProcessedMessage =
        serde_json::from_value(payload["message"].clone()).map_err(|e| format!("malformed message: {e}"))?;
    let sheet: Sheet = serde_json::from_value(payload["sheet"].clone()).map_err(|e| format!("malformed sheet: {e}"))?;
    Ok((msg, sheet))
}

pub struct CsvHandler {
    config: Arc<SentinelConfig>,
    sinks: HashMap<String, Arc<CsvSink>>,
}

impl CsvHandler {
    pub fn new(config: Arc<SentinelConfig>, sinks: HashMap<String, Arc<CsvSink>>) -> Self {
        Self { config, sinks }
    }
}

#[async_trait]
impl TaskHandler for CsvHandler {
    async fn handle(&self, payload: Value) -> TaskOutcome {
        let (msg, sheet) = match parse_sink_payload(&payload) {
            Ok(v) => v,
            Err(e) => return TaskOutcome::Fatal(e),
        };
        let Some(sink) = self.sinks.get(&msg.country.0) else {
            return TaskOutcome::Fatal(format!("no csv sink configured for country '{}'", msg.country));
        };
        match sink.append(&msg.country.0, sheet, &msg, &self.config.schema.fields) {
            Ok(()) => TaskOutcome::Done,
            Err(e @ sentinel_sink_csv::CsvSinkError::SchemaMismatch(_)) => TaskOutcome::Fatal(e.to_string()),
            Err(e) => TaskOutcome::Retriable(e.to_string()),
        }
    }
}

pub struct WorkbookHandler {
    config: Arc<SentinelConfig>,
    sink: Arc<WorkbookSink>,
    admin: Arc<AdminNotifier>,
}

impl WorkbookHandler {
    pub fn new(config: Arc<SentinelConfig>, sink: Arc<WorkbookSink>, admin: Arc<AdminNotifier>) -> Self {
        Self { config, sink, admin }
    }
}

#[async_trait]
impl TaskHandler for WorkbookHandler {
    async fn handle(&self, payload: Value) -> TaskOutcome {
        let (msg, sheet) = match parse_sink_payload(&payload) {
            Ok(v) => v,
            Err(e) => return TaskOutcome::Fatal(e),
        };
        let Some(country) = self.config.countries.get(&msg.country.0) else {
            return TaskOutcome::Fatal(format!("unknown country '{}'", msg.country));
        };

        match self
            .sink
            .append(&country.workbook, sheet, &msg, &self.config.schema.fields, &country.workbook_excluded_fields)
            .await
        {
            Ok(()) => TaskOutcome::Done,
            Err(e) if e.is_session_init() => {
                self.admin.notify(AdminEvent::WorkbookInitFailure, &e.to_string()).await.ok();
                TaskOutcome::Retriable(e.to_string())
            }
            Err(e @ sentinel_sink_workbook::WorkbookError::SchemaMismatch(_)) => TaskOutcome::Fatal(e.to_string()),
            Err(e) => TaskOutcome::Retriable(e.to_string()),
        }
    }
}

pub struct WebhookHandler {
    config: Arc<SentinelConfig>,
    client: Arc<WebhookClient>,
}

impl WebhookHandler {
    pub fn new(config: Arc<SentinelConfig>, client: Arc<WebhookClient>) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl TaskHandler for WebhookHandler {
    async fn handle(&self, payload: Value) -> TaskOutcome {
        let (msg, _sheet) = match parse_sink_payload(&payload) {
            Ok(v) => v,
            Err(e) => return TaskOutcome::Fatal(e),
        };
        let Some(country) = self.config.countries.get(&msg.country.0) else {
            return TaskOutcome::Fatal(format!("unknown country '{}'", msg.country));
        };

        let card = sentinel_sink_webhook::build_card(&msg, &country.name, &country.webhook_excluded_fields);
        match self.client.post_card(&country.webhook_url, &card).await {
            Ok(()) => TaskOutcome::Done,
            Err(e) => TaskOutcome::Retriable(e.to_string()),
        }
    }
}

/// Runs the three fixed maintenance actions the scheduler fires onto this
/// queue (SPEC_FULL.md §4.7): `cleanup_cache`, `cleanup_sink_history`,
/// `health_ping`.
pub struct MaintenanceHandler {
    config: Arc<SentinelConfig>,
    task_bus: Arc<TaskBus>,
    workbook_sink: Arc<WorkbookSink>,
}

impl MaintenanceHandler {
    pub fn new(config: Arc<SentinelConfig>, task_bus: Arc<TaskBus>, workbook_sink: Arc<WorkbookSink>) -> Self {
        Self { config, task_bus, workbook_sink }
    }

    async fn cleanup_sink_history(&self) -> TaskOutcome {
        let cutoff = Utc::now() - Duration::days(sentinel_core::config::DEFAULT_SINK_RETENTION_DAYS as i64);
        let mut total = 0u64;
        for country in self.config.countries.values() {
            match self
                .workbook_sink
                .prune_older_than(&country.workbook, &self.config.schema.fields, &country.workbook_excluded_fields, cutoff)
                .await
            {
                Ok(n) => total += n,
                Err(e) => return TaskOutcome::Retriable(e.to_string()),
            }
        }
        info!(deleted = total, "sink history retention sweep complete");
        TaskOutcome::Done
    }
}

#[async_trait]
impl TaskHandler for MaintenanceHandler {
    async fn handle(&self, payload: Value) -> TaskOutcome {
        match payload["action"].as_str() {
            Some("cleanup_cache") => match self.task_bus.prune_terminal_older_than(Duration::days(1)) {
                Ok(n) => {
                    info!(deleted = n, "task bus terminal-record sweep complete");
                    TaskOutcome::Done
                }
                Err(e) => TaskOutcome::Retriable(e.to_string()),
            },
            Some("cleanup_sink_history") => self.cleanup_sink_history().await,
            Some("health_ping") => {
                info!("health ping");
                TaskOutcome::Done
            }
            other => TaskOutcome::Fatal(format!("unknown maintenance action: {other:?}")),
        }
    }
}
