//! The set of providers this crate ships, and the registries built from it.

use crate::connectors::{gorgias, gusto, hubspot, jira, pipedrive};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use unified_core::config::SyncConfig;
use unified_core::models::{ObjectType, Vertical};
use unified_core::sync::{
    ClientSyncService, ProviderClient, ServiceRegistry, SyncOrchestrator, UnifiedStore,
    WebhookNotifier,
};
use unified_core::unification::mapper::{desunify_with, unify_with};
use unified_core::unification::{
    CustomFieldMapping, Mapper, MapperKey, MapperRegistry, ObjectMapper, UnifiedEntity,
};
use unified_core::Result;

/// Every shipped mapper. A closed set, so dispatch is a match rather than a
/// vtable per provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMapper {
    HubspotContact,
    HubspotCompany,
    PipedriveContact,
    GorgiasTicket,
    JiraTicket,
    GustoBenefit,
}

macro_rules! with_mapper {
    ($which:expr, $m:ident => $body:expr) => {
        match $which {
            ProviderMapper::HubspotContact => {
                let $m = &hubspot::HubspotContactMapper;
                $body
            }
            ProviderMapper::HubspotCompany => {
                let $m = &hubspot::HubspotCompanyMapper;
                $body
            }
            ProviderMapper::PipedriveContact => {
                let $m = &pipedrive::PipedriveContactMapper;
                $body
            }
            ProviderMapper::GorgiasTicket => {
                let $m = &gorgias::GorgiasTicketMapper;
                $body
            }
            ProviderMapper::JiraTicket => {
                let $m = &jira::JiraTicketMapper;
                $body
            }
            ProviderMapper::GustoBenefit => {
                let $m = &gusto::GustoBenefitMapper;
                $body
            }
        }
    };
}

impl ProviderMapper {
    pub const ALL: [ProviderMapper; 6] = [
        ProviderMapper::HubspotContact,
        ProviderMapper::HubspotCompany,
        ProviderMapper::PipedriveContact,
        ProviderMapper::GorgiasTicket,
        ProviderMapper::JiraTicket,
        ProviderMapper::GustoBenefit,
    ];

    pub fn all() -> impl Iterator<Item = ProviderMapper> {
        Self::ALL.into_iter()
    }
}

impl Mapper for ProviderMapper {
    fn key(&self) -> MapperKey {
        with_mapper!(self, m => ObjectMapper::key(m))
    }

    fn desunify(&self, input: &Value, custom_fields: &[CustomFieldMapping]) -> Result<Value> {
        with_mapper!(self, m => desunify_with(m, input, custom_fields))
    }

    fn unify_record(
        &self,
        record: &Value,
        custom_fields: &[CustomFieldMapping],
    ) -> Result<UnifiedEntity> {
        with_mapper!(self, m => unify_with(m, record, custom_fields))
    }
}

/// Registry holding every shipped mapper.
pub fn mapper_registry() -> MapperRegistry {
    ProviderMapper::all()
        .fold(MapperRegistry::builder(), |b, m| {
            b.register_mapper(Arc::new(m))
        })
        .build()
}

/// One HTTP client per shipped provider, sharing the request timeout.
pub fn provider_clients(timeout: Duration) -> Result<Vec<Arc<dyn ProviderClient>>> {
    let clients: Vec<Arc<dyn ProviderClient>> = vec![
        Arc::new(hubspot::HubspotClient::new(timeout)?),
        Arc::new(pipedrive::PipedriveClient::new(timeout)?),
        Arc::new(gorgias::GorgiasClient::new(timeout)?),
        Arc::new(jira::JiraClient::new(timeout)?),
        Arc::new(gusto::GustoClient::new(timeout)?),
    ];
    Ok(clients)
}

/// Services for every client that supports `(vertical, object_type)`.
pub fn service_registry(
    vertical: Vertical,
    object_type: ObjectType,
    clients: &[Arc<dyn ProviderClient>],
) -> Result<ServiceRegistry> {
    let mut builder = ServiceRegistry::builder(vertical, object_type);
    for client in clients {
        if !client.supports().contains(&(vertical, object_type)) {
            continue;
        }
        let service = ClientSyncService::new(client.clone(), vertical, object_type)?;
        builder = builder.register_service(client.provider(), Arc::new(service));
    }
    builder.build()
}

/// Orchestrator for `(vertical, object_type)` over the shipped providers.
pub fn orchestrator(
    vertical: Vertical,
    object_type: ObjectType,
    clients: &[Arc<dyn ProviderClient>],
    store: Arc<dyn UnifiedStore>,
    notifier: Arc<dyn WebhookNotifier>,
    config: SyncConfig,
) -> Result<SyncOrchestrator> {
    let services = service_registry(vertical, object_type, clients)?;
    Ok(SyncOrchestrator::new(services, mapper_registry(), store, notifier)?.with_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use unified_core::events::memory::MemoryEventBus;
    use unified_core::models::{Connection, Credentials, LinkedUserId, ProjectId};
    use unified_core::sync::{EventBusNotifier, FetchParams, MemoryUnifiedStore};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    /// HubSpot only returns properties named in `properties=`.
    fn hubspot_contacts_responder(req: &Request) -> ResponseTemplate {
        let requested: Vec<String> = req
            .url
            .query_pairs()
            .find(|(k, _)| k == "properties")
            .map(|(_, v)| v.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        let stored = json!({ "firstname": "Ada", "lastname": "Lovelace", "favoriteColor": "blue" });
        let properties: serde_json::Map<String, Value> = stored
            .as_object()
            .unwrap()
            .iter()
            .filter(|(k, _)| requested.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        ResponseTemplate::new(200)
            .set_body_json(json!({ "results": [{ "id": "1", "properties": properties }] }))
    }

    #[test]
    fn every_mapper_is_registered_once() {
        let registry = mapper_registry();
        assert_eq!(registry.len(), ProviderMapper::ALL.len());
        let keys: Vec<String> = registry.keys().iter().map(|k| k.to_string()).collect();
        assert!(keys.contains(&"crm.contact.hubspot".to_string()));
        assert!(keys.contains(&"crm.contact.pipedrive".to_string()));
        assert!(keys.contains(&"hris.benefit.gusto".to_string()));
        assert!(registry
            .resolve(Vertical::Ticketing, ObjectType::Ticket, "gorgias")
            .is_ok());
        assert!(registry
            .resolve(Vertical::Ticketing, ObjectType::Ticket, "zendesk")
            .is_err());
    }

    #[test]
    fn services_cover_every_mapper() {
        let clients = provider_clients(Duration::from_secs(5)).unwrap();
        for mapper in ProviderMapper::all() {
            let key = Mapper::key(&mapper);
            let services = service_registry(key.vertical, key.object_type, &clients).unwrap();
            assert!(
                services.get_service(&key.provider).is_ok(),
                "no service for {key}"
            );
        }

        let contacts = service_registry(Vertical::Crm, ObjectType::Contact, &clients).unwrap();
        assert_eq!(contacts.providers(), vec!["hubspot", "pipedrive"]);
    }

    #[test]
    fn dispatch_reaches_the_provider_mapper() {
        let entity = ProviderMapper::PipedriveContact
            .unify_record(&json!({ "id": 5, "name": "Ada Lovelace" }), &[])
            .unwrap();
        assert_eq!(entity.provider, "pipedrive");
        assert_eq!(entity.remote_id, "5");

        let err = ProviderMapper::HubspotContact
            .desunify(&json!({ "first_name": "Ada" }), &[])
            .unwrap_err();
        assert_eq!(err.field(), Some("last_name"));
    }

    #[tokio::test]
    async fn orchestrator_syncs_hubspot_contacts_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "id": "1", "properties": { "firstname": "Ada", "lastname": "Lovelace", "favoriteColor": "blue" } },
                    { "id": "2", "properties": { "firstname": "Grace", "lastname": "Hopper" } }
                ]
            })))
            .mount(&server)
            .await;

        let project = ProjectId::new();
        let store = Arc::new(MemoryUnifiedStore::new());
        store
            .add_custom_field_mapping(
                CustomFieldMapping::new(
                    project,
                    Vertical::Crm,
                    ObjectType::Contact,
                    "hubspot",
                    "favorite_color",
                    "favoriteColor",
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let bus = Arc::new(MemoryEventBus::new());
        let clients = provider_clients(Duration::from_secs(5)).unwrap();
        let engine = orchestrator(
            Vertical::Crm,
            ObjectType::Contact,
            &clients,
            store.clone(),
            Arc::new(EventBusNotifier::new(bus.clone())),
            SyncConfig::default(),
        )
        .unwrap();

        let conn = Connection::new(
            project,
            LinkedUserId::new(),
            "hubspot",
            Vertical::Crm,
            Credentials::new(json!({ "access_token": "t", "api_base": server.uri() })),
        )
        .unwrap();
        let report = engine.sync(&conn, &FetchParams::default()).await.unwrap();
        assert_eq!(report.persisted.len(), 2);
        assert!(report.failures.is_empty());
        assert_eq!(
            report.persisted[0].entity.field_mappings["favorite_color"],
            json!("blue")
        );
        assert_eq!(bus.all_events().await.len(), 2);
        assert_eq!(store.entity_count().await, 2);
    }

    #[tokio::test]
    async fn hubspot_sync_requests_tenant_custom_properties() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/contacts"))
            .respond_with(hubspot_contacts_responder)
            .mount(&server)
            .await;

        let project = ProjectId::new();
        let store = Arc::new(MemoryUnifiedStore::new());
        store
            .add_custom_field_mapping(
                CustomFieldMapping::new(
                    project,
                    Vertical::Crm,
                    ObjectType::Contact,
                    "hubspot",
                    "favorite_color",
                    "favoriteColor",
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let clients = provider_clients(Duration::from_secs(5)).unwrap();
        let engine = orchestrator(
            Vertical::Crm,
            ObjectType::Contact,
            &clients,
            store.clone(),
            Arc::new(EventBusNotifier::new(Arc::new(MemoryEventBus::new()))),
            SyncConfig::default(),
        )
        .unwrap();
        let conn = Connection::new(
            project,
            LinkedUserId::new(),
            "hubspot",
            Vertical::Crm,
            Credentials::new(json!({ "access_token": "t", "api_base": server.uri() })),
        )
        .unwrap();

        let report = engine.sync(&conn, &FetchParams::default()).await.unwrap();
        assert_eq!(report.persisted.len(), 1);
        let entity = &report.persisted[0].entity;
        assert_eq!(entity.field_str("first_name"), Some("Ada"));
        assert_eq!(entity.field_mappings["favorite_color"], json!("blue"));
    }
}
