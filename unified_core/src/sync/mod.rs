//! Sync orchestration: provider services, persistence and notifications
//! around the unification layer.

pub mod engine;
pub mod memory;
pub mod models;
pub mod notifier;
pub mod services;
pub mod sqlite;
pub mod traits;


pub use engine::SyncOrchestrator;
pub use memory::MemoryUnifiedStore;
pub use models::{StoredEntity, SyncReport, SyncRun, SyncState, UpsertOutcome};
pub use notifier::{EventBusNotifier, HttpWebhookNotifier};
pub use services::{ClientSyncService, ServiceRegistry, ServiceRegistryBuilder};
pub use sqlite::SqliteUnifiedStore;
pub use traits::{FetchParams, ProviderClient, SyncService, UnifiedStore, WebhookNotifier};
