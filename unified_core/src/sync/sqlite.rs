//! SQLite-backed UnifiedStore.
//!
//! Single-node deployments and the CLI use this store; tables are created on
//! open with `CREATE TABLE IF NOT EXISTS`.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ConnectionId, ObjectType, ProjectId, TenantContext, Vertical};
use crate::sync::models::{StoredEntity, SyncRun, UpsertOutcome};
use crate::sync::traits::UnifiedStore;
use crate::unification::{CustomFieldMapping, UnifiedEntity};
use crate::{Error, Result};

#[derive(Clone)]
pub struct SqliteUnifiedStore {
    pool: SqlitePool,
}

impl SqliteUnifiedStore {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::backend("sqlite_unified_store mkdir", e))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path.display()))
            .map_err(|e| Error::backend("sqlite_unified_store connect options", e))?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| Error::backend("sqlite_unified_store connect", e))?;
        Self::with_pool(pool).await
    }

    /// A private in-memory database. One connection, so every query sees the same data.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::backend("sqlite_unified_store connect options", e))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| Error::backend("sqlite_unified_store connect", e))?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::backend("sqlite_unified_store schema", e))?;
        Ok(Self { pool })
    }

    pub async fn insert_custom_field_mapping(&self, mapping: &CustomFieldMapping) -> Result<()> {
        let data_type = mapping
            .data_type
            .map(|dt| serde_json::to_value(dt).map(|v| v.as_str().unwrap_or_default().to_string()))
            .transpose()
            .map_err(|e| Error::backend("serialize data_type", e))?;

        let res = sqlx::query(
            r#"
INSERT INTO unified_custom_field_mappings
  (id, project_id, vertical, object_type, provider, slug, remote_field_key, data_type, created_at)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(project_id, vertical, object_type, provider, slug) DO NOTHING
"#,
        )
        .bind(mapping.id.to_string())
        .bind(mapping.project_id.to_string())
        .bind(mapping.vertical.as_str())
        .bind(mapping.object_type.as_str())
        .bind(&mapping.provider)
        .bind(&mapping.slug)
        .bind(&mapping.remote_field_key)
        .bind(data_type)
        .bind(mapping.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::backend("insert custom field mapping", e))?;

        if res.rows_affected() == 0 {
            return Err(Error::InvalidInput(format!(
                "custom field slug '{}' already defined for {}.{}.{}",
                mapping.slug, mapping.vertical, mapping.object_type, mapping.provider
            )));
        }
        Ok(())
    }

    pub async fn raw_record(
        &self,
        tenant: &TenantContext,
        object_type: ObjectType,
        provider: &str,
        remote_id: &str,
    ) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query(
            r#"
SELECT payload_json FROM unified_raw_records
WHERE project_id = ?1 AND linked_user_id = ?2 AND object_type = ?3
  AND provider = ?4 AND remote_id = ?5
"#,
        )
        .bind(tenant.project_id.to_string())
        .bind(tenant.linked_user_id.to_string())
        .bind(object_type.as_str())
        .bind(provider)
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::backend("select raw record", e))?;

        row.map(|r| {
            let json: String = r.get("payload_json");
            serde_json::from_str(&json).map_err(|e| Error::backend("parse raw record", e))
        })
        .transpose()
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS unified_entities (
  id TEXT PRIMARY KEY,
  project_id TEXT NOT NULL,
  linked_user_id TEXT NOT NULL,
  connection_id TEXT NOT NULL,
  provider TEXT NOT NULL,
  vertical TEXT NOT NULL,
  object_type TEXT NOT NULL,
  remote_id TEXT NOT NULL,
  entity_json TEXT NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS ue_tenant_remote_idx
  ON unified_entities(project_id, linked_user_id, provider, object_type, remote_id);

CREATE TABLE IF NOT EXISTS unified_raw_records (
  project_id TEXT NOT NULL,
  linked_user_id TEXT NOT NULL,
  connection_id TEXT NOT NULL,
  provider TEXT NOT NULL,
  object_type TEXT NOT NULL,
  remote_id TEXT NOT NULL,
  payload_json TEXT NOT NULL,
  received_at TEXT NOT NULL,
  PRIMARY KEY (project_id, linked_user_id, provider, object_type, remote_id)
);

CREATE TABLE IF NOT EXISTS unified_custom_field_mappings (
  id TEXT PRIMARY KEY,
  project_id TEXT NOT NULL,
  vertical TEXT NOT NULL,
  object_type TEXT NOT NULL,
  provider TEXT NOT NULL,
  slug TEXT NOT NULL,
  remote_field_key TEXT NOT NULL,
  data_type TEXT NULL,
  created_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS ucfm_scope_slug_idx
  ON unified_custom_field_mappings(project_id, vertical, object_type, provider, slug);

CREATE TABLE IF NOT EXISTS unified_sync_runs (
  run_id TEXT PRIMARY KEY,
  connection_id TEXT NOT NULL,
  state TEXT NOT NULL,
  run_json TEXT NOT NULL,
  started_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS usr_connection_started_idx
  ON unified_sync_runs(connection_id, started_at);
"#;

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::backend("parse timestamp", e))
}

fn row_to_stored(row: &SqliteRow, tenant: TenantContext) -> Result<StoredEntity> {
    let id: String = row.get("id");
    let entity_json: String = row.get("entity_json");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Ok(StoredEntity {
        id: Uuid::parse_str(&id).map_err(|e| Error::backend("parse entity id", e))?,
        tenant,
        entity: serde_json::from_str(&entity_json)
            .map_err(|e| Error::backend("parse entity json", e))?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn parse_mapping(row: &SqliteRow) -> Result<CustomFieldMapping> {
    let id: String = row.get("id");
    let project_id: String = row.get("project_id");
    let vertical: String = row.get("vertical");
    let object_type: String = row.get("object_type");
    let data_type: Option<String> = row.get("data_type");
    let created_at: String = row.get("created_at");
    Ok(CustomFieldMapping {
        id: Uuid::parse_str(&id).map_err(|e| Error::backend("parse mapping id", e))?,
        project_id: ProjectId::from_str(&project_id)
            .map_err(|e| Error::backend("parse project id", e))?,
        vertical: vertical.parse()?,
        object_type: object_type.parse()?,
        provider: row.get("provider"),
        slug: row.get("slug"),
        remote_field_key: row.get("remote_field_key"),
        data_type: data_type
            .map(|dt| serde_json::from_value(serde_json::Value::String(dt)))
            .transpose()
            .map_err(|e| Error::backend("parse data_type", e))?,
        created_at: parse_ts(&created_at)?,
    })
}

#[async_trait]
impl UnifiedStore for SqliteUnifiedStore {
    async fn upsert_entity(
        &self,
        tenant: &TenantContext,
        entity: &UnifiedEntity,
    ) -> Result<UpsertOutcome> {
        if entity.remote_id.trim().is_empty() {
            return Err(Error::InvalidInput("entity remote_id is empty".to_string()));
        }
        let entity_json =
            serde_json::to_string(entity).map_err(|e| Error::backend("serialize entity", e))?;
        let new_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        // RETURNING yields the surviving row, so a foreign id means an update.
        let row = sqlx::query(
            r#"
INSERT INTO unified_entities
  (id, project_id, linked_user_id, connection_id, provider, vertical, object_type,
   remote_id, entity_json, created_at, updated_at)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
ON CONFLICT(project_id, linked_user_id, provider, object_type, remote_id) DO UPDATE SET
  connection_id = excluded.connection_id,
  vertical = excluded.vertical,
  entity_json = excluded.entity_json,
  updated_at = excluded.updated_at
RETURNING id, entity_json, created_at, updated_at
"#,
        )
        .bind(&new_id)
        .bind(tenant.project_id.to_string())
        .bind(tenant.linked_user_id.to_string())
        .bind(tenant.connection_id.to_string())
        .bind(&entity.provider)
        .bind(entity.vertical.as_str())
        .bind(entity.object_type.as_str())
        .bind(&entity.remote_id)
        .bind(entity_json)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::backend("upsert unified entity", e))?;

        let stored = row_to_stored(&row, *tenant)?;
        let created = stored.id.to_string() == new_id;
        Ok(UpsertOutcome {
            entity: stored,
            created,
        })
    }

    async fn list_custom_field_mappings(
        &self,
        project_id: ProjectId,
        vertical: Vertical,
        object_type: ObjectType,
    ) -> Result<Vec<CustomFieldMapping>> {
        let rows = sqlx::query(
            r#"
SELECT id, project_id, vertical, object_type, provider, slug, remote_field_key, data_type, created_at
FROM unified_custom_field_mappings
WHERE project_id = ?1 AND vertical = ?2 AND object_type = ?3
ORDER BY provider, slug
"#,
        )
        .bind(project_id.to_string())
        .bind(vertical.as_str())
        .bind(object_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::backend("list custom field mappings", e))?;

        rows.iter().map(parse_mapping).collect()
    }

    async fn store_raw_record(
        &self,
        tenant: &TenantContext,
        object_type: ObjectType,
        provider: &str,
        remote_id: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let payload_json =
            serde_json::to_string(payload).map_err(|e| Error::backend("serialize payload", e))?;
        sqlx::query(
            r#"
INSERT INTO unified_raw_records
  (project_id, linked_user_id, connection_id, provider, object_type, remote_id,
   payload_json, received_at)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(project_id, linked_user_id, provider, object_type, remote_id) DO UPDATE SET
  connection_id = excluded.connection_id,
  payload_json = excluded.payload_json,
  received_at = excluded.received_at
"#,
        )
        .bind(tenant.project_id.to_string())
        .bind(tenant.linked_user_id.to_string())
        .bind(tenant.connection_id.to_string())
        .bind(provider)
        .bind(object_type.as_str())
        .bind(remote_id)
        .bind(payload_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::backend("store raw record", e))?;
        Ok(())
    }

    async fn upsert_sync_run(&self, run: &SyncRun) -> Result<()> {
        let run_json =
            serde_json::to_string(run).map_err(|e| Error::backend("serialize sync run", e))?;
        sqlx::query(
            r#"
INSERT OR REPLACE INTO unified_sync_runs
  (run_id, connection_id, state, run_json, started_at)
VALUES
  (?1, ?2, ?3, ?4, ?5)
"#,
        )
        .bind(run.run_id.to_string())
        .bind(run.connection_id.to_string())
        .bind(run.state.as_str())
        .bind(run_json)
        .bind(run.started_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::backend("upsert sync run", e))?;
        Ok(())
    }

    async fn list_entities(
        &self,
        tenant: &TenantContext,
        object_type: ObjectType,
    ) -> Result<Vec<StoredEntity>> {
        let rows = sqlx::query(
            r#"
SELECT id, entity_json, created_at, updated_at
FROM unified_entities
WHERE project_id = ?1 AND linked_user_id = ?2 AND object_type = ?3
ORDER BY provider, remote_id
"#,
        )
        .bind(tenant.project_id.to_string())
        .bind(tenant.linked_user_id.to_string())
        .bind(object_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::backend("list unified entities", e))?;

        rows.iter().map(|r| row_to_stored(r, *tenant)).collect()
    }

    async fn list_sync_runs(&self, connection_id: ConnectionId) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query(
            r#"
SELECT run_json FROM unified_sync_runs
WHERE connection_id = ?1
ORDER BY started_at ASC
"#,
        )
        .bind(connection_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::backend("list sync runs", e))?;

        rows.iter()
            .map(|r| {
                let json: String = r.get("run_json");
                serde_json::from_str(&json).map_err(|e| Error::backend("parse sync run", e))
            })
            .collect()
    }
}
