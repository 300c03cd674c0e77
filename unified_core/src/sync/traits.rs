use crate::models::{Connection, ConnectionId, ObjectType, ProjectId, TenantContext, Vertical};
use crate::sync::models::{StoredEntity, SyncRun, UpsertOutcome};
use crate::unification::{CustomFieldMapping, UnifiedEntity};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Paging/filter hints passed through to the provider. Providers ignore what
/// they cannot express.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchParams {
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
    /// Provider field keys of the tenant's custom fields. Providers that only
    /// return fields named in the request must ask for these too.
    #[serde(default)]
    pub custom_field_keys: Vec<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl FetchParams {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Adds the remote keys of `mappings` that belong to `provider`.
    pub fn with_custom_fields(mut self, provider: &str, mappings: &[CustomFieldMapping]) -> Self {
        for m in mappings.iter().filter(|m| m.provider.eq_ignore_ascii_case(provider)) {
            if !self.custom_field_keys.contains(&m.remote_field_key) {
                self.custom_field_keys.push(m.remote_field_key.clone());
            }
        }
        self
    }
}

/// Network side of one provider. Implementations live in `unified_integrations`.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider slug, e.g. "hubspot".
    fn provider(&self) -> &str;

    /// (vertical, object type) pairs this client can fetch and write.
    fn supports(&self) -> &[(Vertical, ObjectType)];

    async fn fetch(
        &self,
        connection: &Connection,
        object_type: ObjectType,
        params: &FetchParams,
    ) -> Result<Vec<Value>>;

    /// Creates one record and returns the provider's response body.
    async fn write(
        &self,
        connection: &Connection,
        object_type: ObjectType,
        payload: &Value,
    ) -> Result<Value>;
}

/// Fetch + write for one provider and one object type.
#[async_trait]
pub trait SyncService: Send + Sync {
    fn provider(&self) -> &str;

    fn object_type(&self) -> ObjectType;

    async fn fetch(&self, connection: &Connection, params: &FetchParams) -> Result<Vec<Value>>;

    async fn write(&self, connection: &Connection, payload: &Value) -> Result<Value>;
}

#[async_trait]
pub trait UnifiedStore: Send + Sync {
    /// Inserts or updates by (project, linked user, provider, object type, remote id).
    async fn upsert_entity(
        &self,
        tenant: &TenantContext,
        entity: &UnifiedEntity,
    ) -> Result<UpsertOutcome>;

    async fn list_custom_field_mappings(
        &self,
        project_id: ProjectId,
        vertical: Vertical,
        object_type: ObjectType,
    ) -> Result<Vec<CustomFieldMapping>>;

    /// Keeps the provider's raw payload, keyed by the provider id.
    async fn store_raw_record(
        &self,
        tenant: &TenantContext,
        object_type: ObjectType,
        provider: &str,
        remote_id: &str,
        payload: &Value,
    ) -> Result<()>;

    async fn upsert_sync_run(&self, run: &SyncRun) -> Result<()>;

    /// Entities owned by the tenant's linked user, ordered by provider then remote id.
    async fn list_entities(
        &self,
        tenant: &TenantContext,
        object_type: ObjectType,
    ) -> Result<Vec<StoredEntity>>;

    /// Runs recorded for a connection, oldest first.
    async fn list_sync_runs(&self, connection_id: ConnectionId) -> Result<Vec<SyncRun>>;
}

/// Outbound change notification. Callers treat delivery as fire-and-forget.
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    async fn notify(&self, event_type: &str, entity: &StoredEntity) -> Result<()>;
}
