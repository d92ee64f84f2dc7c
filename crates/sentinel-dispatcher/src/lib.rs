pub mod error;

use std::sync::Arc;

use sentinel_core::types::{ProcessedMessage, Sheet, Verdict};
use sentinel_taskbus::TaskBus;
use sentinel_tracking::TrackingStore;
use serde_json::json;
use tracing::info;

pub use error::{DispatchError, Result};

pub const CSV_QUEUE: &str = "csv";
pub const WORKBOOK_QUEUE: &str = "workbook";
pub const WEBHOOK_QUEUE: &str = "webhook";

/// Applies the post-classification decision table (SPEC_FULL.md §4.11) and
/// advances the tracking cursor once every resulting sink task has been
/// accepted by the Task Bus — not once the sinks have actually run.
///
/// `excluded` drops the message from every sink; `significant` fans out to
/// CSV, workbook, and webhook; `trivial` (including the AI criteria-refined
/// case, which is a classifier *method*, not a distinct verdict) fans out to
/// CSV and workbook only.
pub struct Dispatcher {
    task_bus: Arc<TaskBus>,
    tracking: Arc<TrackingStore>,
}

impl Dispatcher {
    pub fn new(task_bus: Arc<TaskBus>, tracking: Arc<TrackingStore>) -> Self {
        Self { task_bus, tracking }
    }

    pub async fn dispatch(&self, msg: ProcessedMessage) -> Result<()> {
        let channel = msg.raw.channel.clone();
        let external_id = msg.raw.external_id;

        if let Some(sheet) = Sheet::for_verdict(msg.verdict) {
            self.enqueue_sink(CSV_QUEUE, &msg, sheet)?;
            self.enqueue_sink(WORKBOOK_QUEUE, &msg, sheet)?;
            if msg.verdict == Verdict::Significant {
                self.enqueue_sink(WEBHOOK_QUEUE, &msg, sheet)?;
            }
        } else {
            info!(channel = %channel, external_id = %external_id, "excluded message, no sink tasks enqueued");
        }

        self.tracking.set_cursor(&channel, external_id).await?;
        Ok(())
    }

    fn enqueue_sink(&self, queue: &str, msg: &ProcessedMessage, sheet: Sheet) -> Result<()> {
        let idempotency_key = format!("{}:{}:{queue}", msg.raw.channel, msg.raw.external_id);
        let payload = json!({
            "message": msg,
            "sheet": sheet,
        });
        let outcome = self.task_bus.enqueue(queue, &idempotency_key, payload)?;
        info!(queue, idempotency_key, ?outcome, "sink task enqueued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rusqlite::Connection;
    use sentinel_core::config::QueueTuning;
    use sentinel_core::types::{ChannelId, CountryId, ExternalMessageId, Language, RawMessage};
    use std::collections::HashMap;

    fn tuning() -> QueueTuning {
        QueueTuning {
            concurrency: 1,
            max_retries: 3,
            base_delay_secs: 1,
            backoff_multiplier: 2.0,
            task_time_limit_secs: 30,
        }
    }

    fn bus() -> Arc<TaskBus> {
        let conn = Connection::open_in_memory().unwrap();
        let mut queues = HashMap::new();
        queues.insert(CSV_QUEUE.to_string(), tuning());
        queues.insert(WORKBOOK_QUEUE.to_string(), tuning());
        queues.insert(WEBHOOK_QUEUE.to_string(), tuning());
        Arc::new(TaskBus::new(conn, queues).unwrap())
    }

    fn sample(verdict: Verdict) -> ProcessedMessage {
        ProcessedMessage {
            raw: RawMessage {
                external_id: ExternalMessageId(42),
                channel: ChannelId("@iraq_news".into()),
                authored_at: Utc::now(),
                author_handle: Some("reporter".into()),
                body: "عاجل".into(),
                media_descriptor: None,
                forwarded_from: None,
            },
            country: CountryId("iraq".into()),
            language: Language::Ar,
            translated_body: "urgent".into(),
            was_translated: true,
            verdict,
            matched_keywords: vec!["urgent".into()],
            method: "keyword_significant".into(),
            reasoning: String::new(),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn significant_fans_out_to_all_three_queues() {
        let bus = bus();
        let msg = sample(Verdict::Significant);
        let idem = format!("{}:{}", msg.raw.channel, msg.raw.external_id);

        for q in [CSV_QUEUE, WORKBOOK_QUEUE, WEBHOOK_QUEUE] {
            let payload = json!({"message": &msg, "sheet": Sheet::Significant});
            let outcome = bus.enqueue(q, &format!("{idem}:{q}"), payload).unwrap();
            assert_eq!(outcome, sentinel_taskbus::EnqueueOutcome::Accepted);
        }
    }

    #[test]
    fn trivial_has_no_sheet_routed_to_webhook() {
        let msg = sample(Verdict::Trivial);
        assert_eq!(Sheet::for_verdict(msg.verdict), Some(Sheet::Trivial));
    }

    #[test]
    fn excluded_has_no_sheet_at_all() {
        let msg = sample(Verdict::Excluded);
        assert!(Sheet::for_verdict(msg.verdict).is_none());
    }
}
