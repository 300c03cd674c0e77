use crate::config::WebhookConfig;
use crate::events::models::Event;
use crate::events::traits::EventBus;
use crate::events::webhook::WebhookSender;
use crate::sync::models::StoredEntity;
use crate::sync::traits::WebhookNotifier;
use crate::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Builds the event for one entity change.
///
/// The dedupe key includes a digest of the canonical fields, so re-syncing an
/// unchanged record does not produce a second event.
pub fn entity_event(event_type: &str, stored: &StoredEntity) -> Result<Event> {
    let entity = &stored.entity;
    let body = serde_json::to_vec(&(&entity.fields, &entity.field_mappings))
        .map_err(|e| crate::Error::backend("serialize entity digest", e))?;
    let digest = hex::encode(Sha256::digest(&body));
    let dedupe_key = format!(
        "{event_type}:{}:{}:{}",
        entity.provider,
        entity.remote_id,
        &digest[..16]
    );
    let payload = serde_json::json!({
        "id": stored.id.to_string(),
        "connection_id": stored.tenant.connection_id.to_string(),
        "vertical": entity.vertical,
        "object_type": entity.object_type,
        "data": entity.to_json(),
    });
    Ok(Event::new(
        stored.tenant.project_id.to_string(),
        Some(stored.tenant.linked_user_id.to_string()),
        event_type,
        entity.provider.clone(),
        payload,
        dedupe_key,
        Some(stored.updated_at),
    )?)
}

/// Publishes entity events to an in-process [`EventBus`].
#[derive(Clone)]
pub struct EventBusNotifier {
    bus: Arc<dyn EventBus>,
}

impl EventBusNotifier {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl WebhookNotifier for EventBusNotifier {
    #[tracing::instrument(level = "debug", skip(self, entity), fields(remote_id = %entity.remote_id()))]
    async fn notify(&self, event_type: &str, entity: &StoredEntity) -> Result<()> {
        let event = entity_event(event_type, entity)?;
        self.bus.publish(event).await?;
        Ok(())
    }
}

/// POSTs entity events to a tenant endpoint, signed when a secret is configured.
#[derive(Debug, Clone)]
pub struct HttpWebhookNotifier {
    sender: WebhookSender,
    url: String,
}

impl HttpWebhookNotifier {
    pub fn from_config(config: &WebhookConfig) -> Result<Self> {
        let sender = WebhookSender::new(config.timeout, config.signing_secret.clone())?;
        Ok(Self {
            sender,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl WebhookNotifier for HttpWebhookNotifier {
    #[tracing::instrument(level = "debug", skip(self, entity), fields(remote_id = %entity.remote_id()))]
    async fn notify(&self, event_type: &str, entity: &StoredEntity) -> Result<()> {
        let event = entity_event(event_type, entity)?;
        self.sender.send(&self.url, None, &event).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::memory::MemoryEventBus;
    use crate::events::webhook::{verify_signature, SIGNATURE_HEADER};
    use crate::models::{Connection, Credentials, LinkedUserId, ObjectType, ProjectId, Vertical};
    use crate::unification::{MapperKey, RemoteId, UnifiedEntity};
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stored(first_name: &str) -> StoredEntity {
        let conn = Connection::new(
            ProjectId::new(),
            LinkedUserId::new(),
            "hubspot",
            Vertical::Crm,
            Credentials::default(),
        )
        .unwrap();
        let key = MapperKey::new(Vertical::Crm, ObjectType::Contact, "hubspot");
        let entity = UnifiedEntity::new(
            &key,
            RemoteId::new("101").unwrap(),
            &json!({ "first_name": first_name }),
            Default::default(),
            json!({ "id": "101" }),
        )
        .unwrap();
        StoredEntity::new(conn.tenant(), entity, Utc::now())
    }

    #[tokio::test]
    async fn unchanged_entity_is_published_once() {
        let bus = MemoryEventBus::new();
        let notifier = EventBusNotifier::new(Arc::new(bus.clone()));
        let mut entity = stored("Ada");

        notifier.notify("crm.contact.pulled", &entity).await.unwrap();
        notifier.notify("crm.contact.pulled", &entity).await.unwrap();
        assert_eq!(bus.all_events().await.len(), 1);

        entity
            .entity
            .fields
            .insert("first_name".into(), json!("Grace"));
        notifier.notify("crm.contact.pulled", &entity).await.unwrap();
        let events = bus.all_events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].payload["data"]["first_name"], json!("Grace"));
        assert_eq!(events[1].topic, "crm.contact.pulled");
    }

    #[tokio::test]
    async fn http_notifier_signs_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/unified"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = HttpWebhookNotifier::from_config(&WebhookConfig {
            url: format!("{}/hooks/unified", server.uri()),
            signing_secret: Some("whsec".to_string()),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        notifier
            .notify("crm.contact.created", &stored("Ada"))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let req = &requests[0];
        let sig = req
            .headers
            .get(SIGNATURE_HEADER)
            .unwrap()
            .to_str()
            .unwrap();
        verify_signature("whsec", sig, &req.body).unwrap();
    }

    #[tokio::test]
    async fn http_notifier_reports_non_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier = HttpWebhookNotifier::from_config(&WebhookConfig {
            url: server.uri(),
            signing_secret: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert!(notifier
            .notify("crm.contact.created", &stored("Ada"))
            .await
            .is_err());
    }
}
