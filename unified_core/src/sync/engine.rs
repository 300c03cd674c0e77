use crate::config::SyncConfig;
use crate::error::{ErrorContext, ItemFailure};
use crate::models::{Connection, ConnectionStatus, ObjectType, Vertical};
use crate::sync::models::{StoredEntity, SyncReport, SyncRun, SyncState};
use crate::sync::services::ServiceRegistry;
use crate::sync::traits::{FetchParams, SyncService, UnifiedStore, WebhookNotifier};
use crate::unification::{BatchOutcome, CustomFieldMapping, Mapper, MapperRegistry, UnifiedEntity};
use crate::{Error, Result};
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;

/// Everything `add` needs that does not depend on the individual input.
struct AddPlan {
    service: Arc<dyn SyncService>,
    mapper: Arc<dyn Mapper>,
    mappings: Vec<CustomFieldMapping>,
}

/// Per (vertical, object type) coordinator: fetch + unify + persist + notify,
/// and desunify + write for outbound creates.
pub struct SyncOrchestrator {
    vertical: Vertical,
    object_type: ObjectType,
    services: ServiceRegistry,
    mappers: MapperRegistry,
    store: Arc<dyn UnifiedStore>,
    notifier: Arc<dyn WebhookNotifier>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    /// Fails when a registered service has no mapper for the same triple.
    #[tracing::instrument(level = "debug", skip_all, fields(vertical = %services.vertical(), object_type = %services.object_type()))]
    pub fn new(
        services: ServiceRegistry,
        mappers: MapperRegistry,
        store: Arc<dyn UnifiedStore>,
        notifier: Arc<dyn WebhookNotifier>,
    ) -> Result<Self> {
        let vertical = services.vertical();
        let object_type = services.object_type();
        for provider in services.providers() {
            if !mappers.contains(vertical, object_type, &provider) {
                return Err(Error::Configuration(format!(
                    "service '{provider}' has no mapper for {vertical}.{object_type}"
                )));
            }
        }
        Ok(Self {
            vertical,
            object_type,
            services,
            mappers,
            store,
            notifier,
            config: SyncConfig::default(),
        })
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn vertical(&self) -> Vertical {
        self.vertical
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn object_path(&self) -> String {
        format!("{}.{}", self.vertical, self.object_type)
    }

    fn event_type(&self, action: &str) -> String {
        format!("{}.{}.{action}", self.vertical, self.object_type)
    }

    fn context(&self, connection: &Connection, step: &str) -> ErrorContext {
        ErrorContext::new(step)
            .with_connection(connection.id)
            .with_object_type(self.object_path())
    }

    fn concurrency(&self) -> usize {
        self.config.max_concurrency.max(1)
    }

    fn guard(&self, connection: &Connection) -> Result<()> {
        if connection.status != ConnectionStatus::Valid {
            return Err(Error::InvalidInput(format!(
                "connection {} is {:?}, not valid",
                connection.id, connection.status
            )));
        }
        if connection.vertical != self.vertical {
            return Err(Error::InvalidInput(format!(
                "connection {} is a {} connection; orchestrator handles {}",
                connection.id,
                connection.vertical,
                self.object_path()
            )));
        }
        Ok(())
    }

    fn resolve(&self, connection: &Connection) -> Result<(Arc<dyn SyncService>, Arc<dyn Mapper>)> {
        let service = self.services.get_service(&connection.provider)?;
        let mapper = self
            .mappers
            .resolve(self.vertical, self.object_type, &connection.provider)?;
        Ok((service, mapper))
    }

    async fn load_mappings(&self, connection: &Connection) -> Result<Vec<CustomFieldMapping>> {
        self.store
            .list_custom_field_mappings(connection.project_id, self.vertical, self.object_type)
            .await
            .map_err(|e| as_persistence(self.context(connection, "load_custom_fields"), e))
    }

    async fn notify(&self, event_type: &str, stored: &StoredEntity) -> bool {
        match self.notifier.notify(event_type, stored).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    event_type,
                    remote_id = %stored.remote_id(),
                    error = %e,
                    "webhook notification failed"
                );
                false
            }
        }
    }

    /// Pulls every record the provider returns for this object type and
    /// upserts the unified result for the connection's linked user.
    #[tracing::instrument(
        level = "info",
        skip(self, connection, params),
        fields(
            vertical = %self.vertical,
            object_type = %self.object_type,
            provider = %connection.provider,
            connection_id = %connection.id,
        )
    )]
    pub async fn sync(&self, connection: &Connection, params: &FetchParams) -> Result<SyncReport> {
        self.guard(connection)?;

        let mut run = SyncRun::start(connection, self.object_type);
        self.store
            .upsert_sync_run(&run)
            .await
            .map_err(|e| as_persistence(self.context(connection, "record_run"), e))?;

        match self.run_sync(&mut run, connection, params).await {
            Ok((persisted, failures, notified)) => {
                run.advance(SyncState::Done)?;
                self.store
                    .upsert_sync_run(&run)
                    .await
                    .map_err(|e| as_persistence(self.context(connection, "record_run"), e))?;
                tracing::info!(
                    run_id = %run.run_id,
                    fetched = run.records_fetched,
                    persisted = persisted.len(),
                    failed = failures.len(),
                    "sync finished"
                );
                Ok(SyncReport {
                    run,
                    persisted,
                    failures,
                    notified,
                })
            }
            Err(e) => {
                run.fail(e.to_string());
                if let Err(record_err) = self.store.upsert_sync_run(&run).await {
                    tracing::warn!(run_id = %run.run_id, error = %record_err, "failed to record failed sync run");
                }
                tracing::warn!(run_id = %run.run_id, error = %e, "sync failed");
                Err(e)
            }
        }
    }

    async fn run_sync(
        &self,
        run: &mut SyncRun,
        connection: &Connection,
        params: &FetchParams,
    ) -> Result<(Vec<StoredEntity>, Vec<ItemFailure>, usize)> {
        let (service, mapper) = self.resolve(connection)?;
        let mappings = self.load_mappings(connection).await?;
        let params = params
            .clone()
            .with_custom_fields(&connection.provider, &mappings);

        run.advance(SyncState::Fetching)?;
        let records = service
            .fetch(connection, &params)
            .await
            .map_err(|e| as_upstream(self.context(connection, "fetch"), e))?;
        run.records_fetched = records.len() as u64;

        run.advance(SyncState::Unifying)?;
        let unified = mapper.unify_batch(&records, &mappings);
        run.entities_unified = unified.succeeded.len() as u64;
        let mut failures = unified.failures;
        for f in &failures {
            tracing::warn!(index = f.index, reason = %f.reason, "record could not be unified");
        }

        run.advance(SyncState::Persisting)?;
        let tenant = connection.tenant();
        let attempted = unified.succeeded.len();
        let results: Vec<(usize, Result<StoredEntity>)> = stream::iter(unified.succeeded)
            .map(|item| {
                let ctx = self.context(connection, "persist");
                async move {
                    let entity = item.value;
                    let res = async {
                        self.store
                            .store_raw_record(
                                &tenant,
                                self.object_type,
                                &entity.provider,
                                &entity.remote_id,
                                &entity.remote_data,
                            )
                            .await?;
                        self.store
                            .upsert_entity(&tenant, &entity)
                            .await
                            .map(|o| o.entity)
                    }
                    .await
                    .map_err(|e| as_persistence(ctx, e));
                    (item.index, res)
                }
            })
            .buffered(self.concurrency())
            .collect()
            .await;

        let mut persisted = Vec::with_capacity(attempted);
        let mut first_error = None;
        for (index, res) in results {
            match res {
                Ok(stored) => persisted.push(stored),
                Err(e) => {
                    tracing::warn!(index, error = %e, "entity could not be persisted");
                    failures.push(ItemFailure::from_error(index, &e));
                    first_error.get_or_insert(e);
                }
            }
        }
        failures.sort_by_key(|f| f.index);
        run.entities_persisted = persisted.len() as u64;
        run.failures = failures.len() as u64;

        if attempted > 0 && persisted.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        run.advance(SyncState::Notifying)?;
        let event_type = self.event_type("pulled");
        let mut notified = 0;
        for stored in &persisted {
            if self.notify(&event_type, stored).await {
                notified += 1;
            }
        }
        run.notifications_sent = notified as u64;

        Ok((persisted, failures, notified))
    }

    async fn plan_add(&self, connection: &Connection) -> Result<AddPlan> {
        self.guard(connection)?;
        let (service, mapper) = self.resolve(connection)?;
        let mappings = self.load_mappings(connection).await?;
        Ok(AddPlan {
            service,
            mapper,
            mappings,
        })
    }

    async fn add_planned(
        &self,
        plan: &AddPlan,
        input: &Value,
        connection: &Connection,
    ) -> Result<StoredEntity> {
        let payload = plan.mapper.desunify(input, &plan.mappings)?;

        let response = plan
            .service
            .write(connection, &payload)
            .await
            .map_err(|e| as_upstream(self.context(connection, "write"), e))?;

        let entity: UnifiedEntity = plan
            .mapper
            .unify_record(&response, &plan.mappings)
            .map_err(|e| Error::UnattributedResponse {
                context: self.context(connection, "unify_response"),
                message: e.to_string(),
                raw: response.clone(),
            })?;

        let tenant = connection.tenant();
        let ctx = self.context(connection, "persist");
        self.store
            .store_raw_record(
                &tenant,
                self.object_type,
                &entity.provider,
                &entity.remote_id,
                &response,
            )
            .await
            .map_err(|e| as_persistence(ctx.clone(), e))?;
        let stored = self
            .store
            .upsert_entity(&tenant, &entity)
            .await
            .map_err(|e| as_persistence(ctx, e))?
            .entity;

        self.notify(&self.event_type("created"), &stored).await;
        Ok(stored)
    }

    /// Creates one record at the provider from canonical input.
    #[tracing::instrument(
        level = "info",
        skip(self, input, connection),
        fields(
            vertical = %self.vertical,
            object_type = %self.object_type,
            provider = %connection.provider,
            connection_id = %connection.id,
        )
    )]
    pub async fn add(&self, input: &Value, connection: &Connection) -> Result<StoredEntity> {
        let plan = self.plan_add(connection).await?;
        self.add_planned(&plan, input, connection).await
    }

    /// `add` for every input. Successes keep input order; each failure carries
    /// its input index. Errors that apply to the whole batch (bad connection,
    /// unknown provider) fail the call instead.
    #[tracing::instrument(
        level = "info",
        skip(self, inputs, connection),
        fields(
            vertical = %self.vertical,
            object_type = %self.object_type,
            provider = %connection.provider,
            connection_id = %connection.id,
            batch = inputs.len(),
        )
    )]
    pub async fn batch_add(
        &self,
        inputs: &[Value],
        connection: &Connection,
    ) -> Result<BatchOutcome<StoredEntity>> {
        let plan = self.plan_add(connection).await?;
        let results: Vec<Result<StoredEntity>> = stream::iter(inputs)
            .map(|input| self.add_planned(&plan, input, connection))
            .buffered(self.concurrency())
            .collect()
            .await;
        let outcome = BatchOutcome::from_results(results);
        if !outcome.is_complete() {
            tracing::warn!(
                succeeded = outcome.succeeded.len(),
                failed = outcome.failures.len(),
                "batch add finished with failures"
            );
        }
        Ok(outcome)
    }
}

/// Provider-side failures become retryable `Upstream` errors; errors that
/// already carry a classification pass through.
fn as_upstream(ctx: ErrorContext, err: Error) -> Error {
    match err {
        Error::Backend { .. } | Error::BackendMessage(_) | Error::NotFound(_) => {
            Error::upstream(ctx, err)
        }
        other => other,
    }
}

fn as_persistence(ctx: ErrorContext, err: Error) -> Error {
    match err {
        Error::Backend { .. } | Error::BackendMessage(_) | Error::NotFound(_) => {
            Error::persistence(ctx, err)
        }
        other => other,
    }
}
