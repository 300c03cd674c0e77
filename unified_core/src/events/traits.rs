use async_trait::async_trait;

use super::Result;
use super::models::Event;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event. Publishing the same `dedupe_key` twice is a no-op
    /// that returns the id of the first event.
    async fn publish(&self, event: Event) -> Result<String>; // event_id
}
