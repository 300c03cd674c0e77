use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::models::Event;
use super::traits::EventBus;
use super::{Error, Result};

/// In-memory EventBus for local development and unit tests.
#[derive(Clone, Default)]
pub struct MemoryEventBus {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot of all events (primarily for tests).
    pub async fn all_events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> Result<String> {
        if event.project_id.trim().is_empty() {
            return Err(Error::InvalidProjectId);
        }
        if event.topic.trim().is_empty() {
            return Err(Error::InvalidTopic);
        }
        let mut events = self.events.lock().await;
        if let Some(existing) = events
            .iter()
            .find(|e| e.project_id == event.project_id && e.dedupe_key == event.dedupe_key)
        {
            return Ok(existing.id.clone());
        }
        let id = event.id.clone();
        events.push(event);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(topic: &str, dedupe_key: &str) -> Event {
        Event::new(
            "project-1",
            None,
            topic,
            "hubspot",
            serde_json::json!({}),
            dedupe_key,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn publish_dedupes_by_key() {
        let bus = MemoryEventBus::new();
        let first = bus.publish(event("crm.contact.pulled", "k1")).await.unwrap();
        let second = bus.publish(event("crm.contact.pulled", "k1")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(bus.all_events().await.len(), 1);
    }
}
