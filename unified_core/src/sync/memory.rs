use crate::models::{ConnectionId, LinkedUserId, ObjectType, ProjectId, TenantContext, Vertical};
use crate::sync::models::{StoredEntity, SyncRun, UpsertOutcome};
use crate::sync::traits::UnifiedStore;
use crate::unification::{CustomFieldMapping, UnifiedEntity};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type EntityKey = (ProjectId, LinkedUserId, ObjectType, String, String);

#[derive(Default)]
struct State {
    entities: BTreeMap<EntityKey, StoredEntity>,
    raw_records: BTreeMap<EntityKey, Value>,
    mappings: Vec<CustomFieldMapping>,
    runs: Vec<SyncRun>,
}

/// In-memory UnifiedStore for local development and unit tests.
#[derive(Clone, Default)]
pub struct MemoryUnifiedStore {
    state: Arc<Mutex<State>>,
}

fn entity_key(
    tenant: &TenantContext,
    object_type: ObjectType,
    provider: &str,
    remote_id: &str,
) -> EntityKey {
    (
        tenant.project_id,
        tenant.linked_user_id,
        object_type,
        provider.to_string(),
        remote_id.to_string(),
    )
}

impl MemoryUnifiedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tenant custom field definition. Slugs are unique per
    /// (project, vertical, object type, provider).
    pub async fn add_custom_field_mapping(&self, mapping: CustomFieldMapping) -> Result<()> {
        let mut state = self.state.lock().await;
        let duplicate = state.mappings.iter().any(|m| {
            m.project_id == mapping.project_id
                && m.vertical == mapping.vertical
                && m.object_type == mapping.object_type
                && m.provider == mapping.provider
                && m.slug == mapping.slug
        });
        if duplicate {
            return Err(Error::InvalidInput(format!(
                "custom field slug '{}' already defined for {}.{}.{}",
                mapping.slug, mapping.vertical, mapping.object_type, mapping.provider
            )));
        }
        state.mappings.push(mapping);
        Ok(())
    }

    pub async fn raw_record(
        &self,
        tenant: &TenantContext,
        object_type: ObjectType,
        provider: &str,
        remote_id: &str,
    ) -> Option<Value> {
        let state = self.state.lock().await;
        state
            .raw_records
            .get(&entity_key(tenant, object_type, provider, remote_id))
            .cloned()
    }

    /// Number of persisted entities across all tenants (primarily for tests).
    pub async fn entity_count(&self) -> usize {
        self.state.lock().await.entities.len()
    }
}

#[async_trait]
impl UnifiedStore for MemoryUnifiedStore {
    async fn upsert_entity(
        &self,
        tenant: &TenantContext,
        entity: &UnifiedEntity,
    ) -> Result<UpsertOutcome> {
        if entity.remote_id.trim().is_empty() {
            return Err(Error::InvalidInput("entity remote_id is empty".to_string()));
        }
        let key = entity_key(tenant, entity.object_type, &entity.provider, &entity.remote_id);
        let now = Utc::now();
        let mut state = self.state.lock().await;
        match state.entities.get_mut(&key) {
            Some(existing) => {
                existing.tenant = *tenant;
                existing.entity = entity.clone();
                existing.updated_at = now;
                Ok(UpsertOutcome {
                    entity: existing.clone(),
                    created: false,
                })
            }
            None => {
                let stored = StoredEntity::new(*tenant, entity.clone(), now);
                state.entities.insert(key, stored.clone());
                Ok(UpsertOutcome {
                    entity: stored,
                    created: true,
                })
            }
        }
    }

    async fn list_custom_field_mappings(
        &self,
        project_id: ProjectId,
        vertical: Vertical,
        object_type: ObjectType,
    ) -> Result<Vec<CustomFieldMapping>> {
        let state = self.state.lock().await;
        Ok(state
            .mappings
            .iter()
            .filter(|m| {
                m.project_id == project_id && m.vertical == vertical && m.object_type == object_type
            })
            .cloned()
            .collect())
    }

    async fn store_raw_record(
        &self,
        tenant: &TenantContext,
        object_type: ObjectType,
        provider: &str,
        remote_id: &str,
        payload: &Value,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.raw_records.insert(
            entity_key(tenant, object_type, provider, remote_id),
            payload.clone(),
        );
        Ok(())
    }

    async fn upsert_sync_run(&self, run: &SyncRun) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.runs.iter_mut().find(|r| r.run_id == run.run_id) {
            Some(existing) => *existing = run.clone(),
            None => state.runs.push(run.clone()),
        }
        Ok(())
    }

    async fn list_entities(
        &self,
        tenant: &TenantContext,
        object_type: ObjectType,
    ) -> Result<Vec<StoredEntity>> {
        let state = self.state.lock().await;
        Ok(state
            .entities
            .iter()
            .filter(|((project, user, ot, _, _), _)| {
                *project == tenant.project_id
                    && *user == tenant.linked_user_id
                    && *ot == object_type
            })
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn list_sync_runs(&self, connection_id: ConnectionId) -> Result<Vec<SyncRun>> {
        let state = self.state.lock().await;
        let mut runs: Vec<SyncRun> = state
            .runs
            .iter()
            .filter(|r| r.connection_id == connection_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.started_at);
        Ok(runs)
    }
}
