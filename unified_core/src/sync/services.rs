use crate::models::{Connection, ObjectType, Vertical};
use crate::sync::traits::{FetchParams, ProviderClient, SyncService};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Collects provider services for one (vertical, object type).
pub struct ServiceRegistryBuilder {
    vertical: Vertical,
    object_type: ObjectType,
    services: BTreeMap<String, Arc<dyn SyncService>>,
}

impl ServiceRegistryBuilder {
    pub fn register_service(mut self, provider: &str, service: Arc<dyn SyncService>) -> Self {
        let provider = provider.trim().to_ascii_lowercase();
        if self.services.insert(provider.clone(), service).is_some() {
            tracing::debug!(
                %provider,
                vertical = %self.vertical,
                object_type = %self.object_type,
                "sync service re-registered; previous registration replaced"
            );
        }
        self
    }

    /// Fails when a registered service serves a different object type.
    pub fn build(self) -> Result<ServiceRegistry> {
        for (provider, service) in &self.services {
            if service.object_type() != self.object_type {
                return Err(Error::Configuration(format!(
                    "service '{provider}' serves {} but the registry is scoped to {}.{}",
                    service.object_type(),
                    self.vertical,
                    self.object_type
                )));
            }
        }
        Ok(ServiceRegistry {
            vertical: self.vertical,
            object_type: self.object_type,
            services: Arc::new(self.services),
        })
    }
}

/// Frozen provider -> sync service directory for one (vertical, object type).
#[derive(Clone)]
pub struct ServiceRegistry {
    vertical: Vertical,
    object_type: ObjectType,
    services: Arc<BTreeMap<String, Arc<dyn SyncService>>>,
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("vertical", &self.vertical)
            .field("object_type", &self.object_type)
            .field("providers", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ServiceRegistry {
    pub fn builder(vertical: Vertical, object_type: ObjectType) -> ServiceRegistryBuilder {
        ServiceRegistryBuilder {
            vertical,
            object_type,
            services: BTreeMap::new(),
        }
    }

    pub fn vertical(&self) -> Vertical {
        self.vertical
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn get_service(&self, provider: &str) -> Result<Arc<dyn SyncService>> {
        let key = provider.trim().to_ascii_lowercase();
        self.services.get(&key).cloned().ok_or_else(|| {
            Error::Configuration(format!("Service not found for integration ID: {provider}"))
        })
    }

    pub fn providers(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Adapts a multi-object [`ProviderClient`] to a single-object [`SyncService`].
pub struct ClientSyncService {
    client: Arc<dyn ProviderClient>,
    object_type: ObjectType,
}

impl ClientSyncService {
    pub fn new(
        client: Arc<dyn ProviderClient>,
        vertical: Vertical,
        object_type: ObjectType,
    ) -> Result<Self> {
        if !client.supports().contains(&(vertical, object_type)) {
            return Err(Error::Configuration(format!(
                "provider '{}' does not support {vertical}.{object_type}",
                client.provider()
            )));
        }
        Ok(Self {
            client,
            object_type,
        })
    }
}

#[async_trait]
impl SyncService for ClientSyncService {
    fn provider(&self) -> &str {
        self.client.provider()
    }

    fn object_type(&self) -> ObjectType {
        self.object_type
    }

    async fn fetch(&self, connection: &Connection, params: &FetchParams) -> Result<Vec<Value>> {
        self.client.fetch(connection, self.object_type, params).await
    }

    async fn write(&self, connection: &Connection, payload: &Value) -> Result<Value> {
        self.client.write(connection, self.object_type, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StaticService {
        provider: &'static str,
        object_type: ObjectType,
    }

    #[async_trait]
    impl SyncService for StaticService {
        fn provider(&self) -> &str {
            self.provider
        }

        fn object_type(&self) -> ObjectType {
            self.object_type
        }

        async fn fetch(&self, _c: &Connection, _p: &FetchParams) -> Result<Vec<Value>> {
            Ok(vec![json!({ "id": 1 })])
        }

        async fn write(&self, _c: &Connection, payload: &Value) -> Result<Value> {
            Ok(payload.clone())
        }
    }

    fn svc(provider: &'static str) -> Arc<dyn SyncService> {
        Arc::new(StaticService {
            provider,
            object_type: ObjectType::Ticket,
        })
    }

    #[test]
    fn get_service_returns_the_registered_instance() {
        let gorgias = svc("gorgias");
        let reg = ServiceRegistry::builder(Vertical::Ticketing, ObjectType::Ticket)
            .register_service("gorgias", gorgias.clone())
            .register_service("jira", svc("jira"))
            .build()
            .unwrap();
        let got = reg.get_service("gorgias").unwrap();
        assert!(Arc::ptr_eq(&got, &gorgias));
        assert_eq!(reg.providers(), vec!["gorgias", "jira"]);
    }

    #[test]
    fn unknown_provider_is_a_configuration_error() {
        let reg = ServiceRegistry::builder(Vertical::Ticketing, ObjectType::Ticket)
            .register_service("gorgias", svc("gorgias"))
            .build()
            .unwrap();
        let err = reg.get_service("zendesk").err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(!err.is_retryable());
        assert!(err
            .to_string()
            .contains("Service not found for integration ID: zendesk"));
    }

    #[test]
    fn object_type_mismatch_fails_build() {
        let contact: Arc<dyn SyncService> = Arc::new(StaticService {
            provider: "hubspot",
            object_type: ObjectType::Contact,
        });
        let err = ServiceRegistry::builder(Vertical::Ticketing, ObjectType::Ticket)
            .register_service("hubspot", contact)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
