use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// A notification about one unified entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// ULID (sortable by time).
    pub id: String,
    pub project_id: String,
    pub linked_user_id: Option<String>,
    /// When the change happened (domain timestamp).
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    /// Dot-delimited topic, e.g. "crm.contact.pulled".
    pub topic: String,
    /// Provider slug the entity came from.
    pub source: String,
    pub payload: serde_json::Value,
    /// Idempotency key for consumer-side dedupe.
    pub dedupe_key: String,
}

impl Event {
    #[tracing::instrument(level = "debug", skip(payload))]
    pub fn new(
        project_id: impl Into<String> + std::fmt::Debug,
        linked_user_id: Option<String>,
        topic: impl Into<String> + std::fmt::Debug,
        source: impl Into<String> + std::fmt::Debug,
        payload: serde_json::Value,
        dedupe_key: impl Into<String> + std::fmt::Debug,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(Error::InvalidProjectId);
        }

        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(Error::InvalidTopic);
        }

        let source = source.into();
        if source.trim().is_empty() {
            return Err(Error::InvalidSource);
        }

        let dedupe_key = dedupe_key.into();
        if dedupe_key.trim().is_empty() {
            return Err(Error::InvalidDedupeKey);
        }

        let now = Utc::now();
        Ok(Self {
            id: ulid::Ulid::new().to_string(),
            project_id,
            linked_user_id,
            timestamp: timestamp.unwrap_or(now),
            received_at: now,
            topic,
            source,
            payload,
            dedupe_key,
        })
    }
}
