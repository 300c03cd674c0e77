//! Subcommand handlers. Each returns the JSON document `main` prints.

use crate::cli::{Commands, ConnectionArgs, Target};
use anyhow::Context;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use unified_core::config::EngineConfig;
use unified_core::events::memory::MemoryEventBus;
use unified_core::models::{Connection, Credentials, ProjectId};
use unified_core::sync::{
    EventBusNotifier, FetchParams, HttpWebhookNotifier, SqliteUnifiedStore, SyncOrchestrator,
    UnifiedStore, WebhookNotifier,
};
use unified_core::unification::{
    CustomFieldMapping, FieldDataType, Mapper, OneOrMany, Unification,
};
use unified_integrations::catalog;

/// One line of a `--mappings` file.
#[derive(Debug, Deserialize)]
pub struct MappingEntry {
    pub slug: String,
    pub remote_field_key: String,
    #[serde(default)]
    pub data_type: Option<FieldDataType>,
}

pub async fn run(command: Commands, config: &EngineConfig) -> anyhow::Result<Value> {
    match command {
        Commands::Providers => Ok(providers()),
        Commands::Unify {
            target,
            input,
            mappings,
        } => {
            let mappings = load_mappings(&target, mappings.as_deref())?;
            unify(&target, read_json(&input)?, &mappings)
        }
        Commands::Desunify {
            target,
            input,
            mappings,
        } => {
            let mappings = load_mappings(&target, mappings.as_deref())?;
            desunify(&target, read_json(&input)?, &mappings)
        }
        Commands::Sync {
            target,
            connection,
            limit,
        } => {
            let store = open_store(config).await?;
            let engine = orchestrator(&target, config, store)?;
            let conn = connection_for(&target, &connection)?;
            let params = FetchParams {
                limit,
                ..Default::default()
            };
            let report = engine.sync(&conn, &params).await?;
            Ok(serde_json::to_value(&report)?)
        }
        Commands::Add {
            target,
            connection,
            input,
        } => {
            let input = read_json(&input)?;
            let store = open_store(config).await?;
            let engine = orchestrator(&target, config, store)?;
            let conn = connection_for(&target, &connection)?;
            match input {
                Value::Array(items) => {
                    let outcome = engine.batch_add(&items, &conn).await?;
                    Ok(serde_json::to_value(&outcome)?)
                }
                one => Ok(serde_json::to_value(engine.add(&one, &conn).await?)?),
            }
        }
        Commands::AddCustomField {
            target,
            project_id,
            slug,
            remote_key,
            data_type,
        } => {
            let mapping = custom_field(&target, project_id, slug, remote_key, data_type.as_deref())?;
            let store = SqliteUnifiedStore::new(&config.database_path).await?;
            store.insert_custom_field_mapping(&mapping).await?;
            tracing::info!(slug = %mapping.slug, provider = %mapping.provider, "custom field mapping added");
            Ok(serde_json::to_value(&mapping)?)
        }
        Commands::Runs { connection_id } => {
            let store = SqliteUnifiedStore::new(&config.database_path).await?;
            let runs = store.list_sync_runs(connection_id).await?;
            Ok(serde_json::to_value(&runs)?)
        }
        Commands::Config => Ok(config_json(config)),
    }
}

pub fn providers() -> Value {
    let keys: Vec<String> = catalog::mapper_registry()
        .keys()
        .iter()
        .map(|k| k.to_string())
        .collect();
    json!(keys)
}

/// Reads a JSON document from a file, or stdin when the path is `-`.
pub fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("parse {} as JSON", path.display()))
}

/// Mappings from a file are scoped to the command's target; the project id is
/// irrelevant offline, so a fresh one is used.
pub fn load_mappings(target: &Target, path: Option<&Path>) -> anyhow::Result<Vec<CustomFieldMapping>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let entries: Vec<MappingEntry> = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("{} is not a list of mappings", path.display()))?;
    let project = ProjectId::new();
    entries
        .into_iter()
        .map(|e| -> anyhow::Result<CustomFieldMapping> {
            let mapping = CustomFieldMapping::new(
                project,
                target.vertical,
                target.object_type,
                &target.provider,
                e.slug,
                e.remote_field_key,
            )?;
            Ok(match e.data_type {
                Some(dt) => mapping.with_data_type(dt),
                None => mapping,
            })
        })
        .collect()
}

fn resolve(target: &Target) -> anyhow::Result<Arc<dyn Mapper>> {
    Ok(catalog::mapper_registry().resolve(target.vertical, target.object_type, &target.provider)?)
}

/// Arrays come back as `{ succeeded: [{ index, value }], failures: [...] }`,
/// so one bad record does not hide the others.
pub fn unify(target: &Target, input: Value, mappings: &[CustomFieldMapping]) -> anyhow::Result<Value> {
    let mapper = resolve(target)?;
    let source: OneOrMany<Value> = match input {
        Value::Array(items) => OneOrMany::Many(items),
        one => OneOrMany::One(one),
    };
    Ok(match mapper.unify(source, mappings)? {
        Unification::One(entity) => entity.to_json(),
        Unification::Many(outcome) => json!({
            "succeeded": outcome
                .succeeded
                .iter()
                .map(|item| json!({ "index": item.index, "value": item.value.to_json() }))
                .collect::<Vec<_>>(),
            "failures": outcome.failures,
        }),
    })
}

/// Arrays are translated element by element; failures are reported with
/// their index instead of failing the whole call.
pub fn desunify(target: &Target, input: Value, mappings: &[CustomFieldMapping]) -> anyhow::Result<Value> {
    let mapper = resolve(target)?;
    match input {
        Value::Array(items) => Ok(serde_json::to_value(mapper.desunify_batch(&items, mappings))?),
        one => Ok(mapper.desunify(&one, mappings)?),
    }
}

pub fn custom_field(
    target: &Target,
    project_id: ProjectId,
    slug: String,
    remote_key: String,
    data_type: Option<&str>,
) -> anyhow::Result<CustomFieldMapping> {
    let mapping = CustomFieldMapping::new(
        project_id,
        target.vertical,
        target.object_type,
        &target.provider,
        slug,
        remote_key,
    )?;
    Ok(match data_type {
        Some(dt) => {
            let dt: FieldDataType = serde_json::from_value(json!(dt.to_ascii_lowercase()))
                .with_context(|| format!("unknown data type: {dt}"))?;
            mapping.with_data_type(dt)
        }
        None => mapping,
    })
}

async fn open_store(config: &EngineConfig) -> anyhow::Result<Arc<dyn UnifiedStore>> {
    Ok(Arc::new(SqliteUnifiedStore::new(&config.database_path).await?))
}

/// Webhook delivery when configured, otherwise the in-process event bus.
fn notifier(config: &EngineConfig) -> anyhow::Result<Arc<dyn WebhookNotifier>> {
    Ok(match &config.webhook {
        Some(webhook) => Arc::new(HttpWebhookNotifier::from_config(webhook)?),
        None => Arc::new(EventBusNotifier::new(Arc::new(MemoryEventBus::new()))),
    })
}

fn orchestrator(
    target: &Target,
    config: &EngineConfig,
    store: Arc<dyn UnifiedStore>,
) -> anyhow::Result<SyncOrchestrator> {
    let clients = catalog::provider_clients(config.provider_timeout)?;
    Ok(catalog::orchestrator(
        target.vertical,
        target.object_type,
        &clients,
        store,
        notifier(config)?,
        config.sync.clone(),
    )?)
}

pub fn connection_for(target: &Target, args: &ConnectionArgs) -> anyhow::Result<Connection> {
    let credentials = Credentials::new(read_json(&args.credentials)?);
    let mut conn = Connection::new(
        args.project_id,
        args.linked_user_id,
        &target.provider,
        target.vertical,
        credentials,
    )?;
    if let Some(id) = args.connection_id {
        conn.id = id;
    }
    Ok(conn)
}

pub fn config_json(config: &EngineConfig) -> Value {
    json!({
        "database_path": config.database_path.display().to_string(),
        "sync_max_concurrency": config.sync.max_concurrency,
        "provider_timeout_ms": config.provider_timeout.as_millis() as u64,
        "webhook": config.webhook.as_ref().map(|w| json!({
            "url": w.url,
            "signing_secret": w.signing_secret.as_ref().map(|_| "<set>"),
            "timeout_ms": w.timeout.as_millis() as u64,
        })),
    })
}
