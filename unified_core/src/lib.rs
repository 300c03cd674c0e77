//! Unified core library: canonical schemas, mappers, registries and the sync
//! orchestrator shared by every provider integration.

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod o11y;
pub mod sync;
pub mod unification;

pub use config::{EngineConfig, SyncConfig, WebhookConfig};
pub use error::{Error, ErrorContext, ItemFailure, Result, TranslationPartialFailure};
pub use models::{
    Connection, ConnectionId, ConnectionStatus, Credentials, LinkedUserId, ObjectType, ProjectId,
    TenantContext, Vertical,
};
pub use sync::{
    FetchParams, ProviderClient, ServiceRegistry, StoredEntity, SyncOrchestrator, SyncReport,
    SyncService, UnifiedStore, WebhookNotifier,
};
pub use unification::{
    BatchOutcome, CustomFieldMapping, Mapper, MapperKey, MapperRegistry, OneOrMany, RemoteId,
    UnifiedEntity,
};
