use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grammers_client::{Client, Config, InitParams};
use grammers_session::Session;
use sentinel_core::types::{ChannelId, ExternalMessageId, RawMessage};
use tracing::{info, warn};

use crate::error::{Result, UpstreamError};

/// Runtime connection state, mirrored after the adapter-status enum used
/// throughout this codebase's other channel integrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterStatus {
    Connected,
    Connecting,
    Disconnected,
    Error(String),
}

/// Contract every upstream chat-history client must satisfy. Only one
/// implementation exists today (Telegram over MTProto), but the trait keeps
/// the fetch worker decoupled from the wire protocol.
#[async_trait]
pub trait UpstreamAdapter: Send + Sync {
    async fn connect(&mut self) -> Result<()>;
    async fn disconnect(&mut self) -> Result<()>;

    /// Return messages with `external_id > since_id` (or all, if `since_id`
    /// is `None`) and `authored_at >= min_age_cutoff`, ascending by id,
    /// capped at `max_count`.
    async fn fetch_new(
        &self,
        channel: &ChannelId,
        since_id: Option<ExternalMessageId>,
        max_count: u32,
        min_age_cutoff: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>>;

    fn status(&self) -> AdapterStatus;
}

/// User-session (MTProto) Telegram client. Distinct from a bot-token
/// integration: this adapter signs in as the operator's own account, which
/// is the only way to read arbitrary public/joined channel history rather
/// than only messages sent to a bot.
pub struct TelegramAdapter {
    api_id: i32,
    api_hash: String,
    phone: String,
    session_file: String,
    client: Option<Client>,
    status: AdapterStatus,
}

impl TelegramAdapter {
    pub fn new(api_id: i32, api_hash: String, phone: String, session_file: String) -> Self {
        Self {
            api_id,
            api_hash,
            phone,
            session_file,
            client: None,
            status: AdapterStatus::Disconnected,
        }
    }
}

#[async_trait]
impl UpstreamAdapter for TelegramAdapter {
    async fn connect(&mut self) -> Result<()> {
        self.status = AdapterStatus::Connecting;

        let session = Session::load_file_or_create(&self.session_file)
            .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;

        let config = Config {
            session,
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: InitParams::default(),
        };

        let client = Client::connect(config)
            .await
            .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;

        let authorized = client
            .is_authorized()
            .await
            .map_err(|e| UpstreamError::Protocol(e.to_string()))?;

        if !authorized {
            self.status = AdapterStatus::Error("not authorized".to_string());
            return Err(UpstreamError::AuthRequired(format!(
                "session file for {} is not authorized; run the out-of-band login flow",
                self.phone
            )));
        }

        info!(phone = %self.phone, "upstream session connected");
        self.client = Some(client);
        self.status = AdapterStatus::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            let session_file = self.session_file.clone();
            let save = async move { client.session().save_to_file(&session_file) };
            match tokio::time::timeout(Duration::from_secs(10), save).await {
                Ok(Ok(())) => info!("upstream session saved and disconnected"),
                Ok(Err(e)) => warn!(error = %e, "failed to persist session file on disconnect"),
                Err(_) => warn!("timed out saving session file during disconnect"),
            }
        }
        self.status = AdapterStatus::Disconnected;
        Ok(())
    }

    async fn fetch_new(
        &self,
        channel: &ChannelId,
        since_id: Option<ExternalMessageId>,
        max_count: u32,
        min_age_cutoff: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| UpstreamError::ConnectionFailed("not connected".to_string()))?;

        let chat = client
            .resolve_username(channel.0.trim_start_matches('@'))
            .await
            .map_err(classify_invocation_error)?
            .ok_or_else(|| UpstreamError::ChannelNotFound(channel.0.clone()))?;

        let mut iter = client.iter_messages(&chat);
        if let Some(id) = since_id {
            iter = iter.min_id(id.0 as i32);
        }

        let mut out = Vec::new();
        loop {
            let message = match iter.next().await {
                Ok(Some(m)) => m,
                Ok(None) => break,
                Err(e) => return Err(classify_invocation_error(e)),
            };

            let authored_at = message.date();
            if authored_at < min_age_cutoff {
                // grammers iterates newest-first by default; once we cross
                // the age cutoff everything older is also out of range.
                break;
            }

            out.push(RawMessage {
                external_id: ExternalMessageId(message.id() as i64),
                channel: channel.clone(),
                authored_at,
                author_handle: message.sender().and_then(|s| s.username().map(String::from)),
                body: message.text().to_string(),
                media_descriptor: message.media().map(|_| "media".to_string()),
                forwarded_from: message
                    .forward_header()
                    .and_then(|f| f.from_id.as_ref().map(|_| "forwarded".to_string())),
            });

            if out.len() as u32 >= max_count {
                break;
            }
        }

        out.sort_by_key(|m| m.external_id);
        Ok(out)
    }

    fn status(&self) -> AdapterStatus {
        self.status.clone()
    }
}

/// Translate a grammers RPC failure into our error taxonomy. Telegram
/// signals rate limiting via an RPC error named `FLOOD_WAIT_<seconds>`.
fn classify_invocation_error(e: grammers_client::InvocationError) -> UpstreamError {
    let msg = e.to_string();
    if let Some(wait_secs) = parse_flood_wait(&msg) {
        return UpstreamError::RateLimited { wait_secs };
    }
    if msg.contains("AUTH_KEY") || msg.contains("SESSION_REVOKED") {
        return UpstreamError::AuthRequired(msg);
    }
    UpstreamError::Transient(msg)
}

fn parse_flood_wait(msg: &str) -> Option<u64> {
    let marker = "FLOOD_WAIT_";
    let idx = msg.find(marker)?;
    let rest = &msg[idx + marker.len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flood_wait_seconds() {
        assert_eq!(parse_flood_wait("RpcError { code: 420, name: \"FLOOD_WAIT_30\" }"), Some(30));
        assert_eq!(parse_flood_wait("some other error"), None);
    }
}
