use crate::error::ItemFailure;
use crate::models::{Connection, ConnectionId, ObjectType, ProjectId, TenantContext, Vertical};
use crate::unification::UnifiedEntity;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Step of a sync invocation. `Failed` is reachable from every non-terminal state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Resolving,
    Fetching,
    Unifying,
    Persisting,
    Notifying,
    Done,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Resolving => "resolving",
            SyncState::Fetching => "fetching",
            SyncState::Unifying => "unifying",
            SyncState::Persisting => "persisting",
            SyncState::Notifying => "notifying",
            SyncState::Done => "done",
            SyncState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Done | SyncState::Failed)
    }

    fn next(&self) -> Option<SyncState> {
        match self {
            SyncState::Resolving => Some(SyncState::Fetching),
            SyncState::Fetching => Some(SyncState::Unifying),
            SyncState::Unifying => Some(SyncState::Persisting),
            SyncState::Persisting => Some(SyncState::Notifying),
            SyncState::Notifying => Some(SyncState::Done),
            SyncState::Done | SyncState::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: SyncState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == SyncState::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of one `sync` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub run_id: Uuid,
    pub project_id: ProjectId,
    pub connection_id: ConnectionId,
    pub provider: String,
    pub vertical: Vertical,
    pub object_type: ObjectType,
    pub state: SyncState,
    pub records_fetched: u64,
    pub entities_unified: u64,
    pub entities_persisted: u64,
    pub notifications_sent: u64,
    pub failures: u64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncRun {
    pub fn start(connection: &Connection, object_type: ObjectType) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            project_id: connection.project_id,
            connection_id: connection.id,
            provider: connection.provider.clone(),
            vertical: connection.vertical,
            object_type,
            state: SyncState::Resolving,
            records_fetched: 0,
            entities_unified: 0,
            entities_persisted: 0,
            notifications_sent: 0,
            failures: 0,
            error_message: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn advance(&mut self, to: SyncState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(Error::InvalidInput(format!(
                "illegal sync state transition {} -> {}",
                self.state, to
            )));
        }
        tracing::debug!(run_id = %self.run_id, from = %self.state, to = %to, "sync state");
        self.state = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Moves the run to `Failed`. No-op on a run that already finished.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.error_message = Some(message.into());
        self.state = SyncState::Failed;
        self.finished_at = Some(Utc::now());
    }
}

/// A unified entity as persisted for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub id: Uuid,
    pub tenant: TenantContext,
    pub entity: UnifiedEntity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredEntity {
    pub fn new(tenant: TenantContext, entity: UnifiedEntity, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant,
            entity,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn remote_id(&self) -> &str {
        &self.entity.remote_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub entity: StoredEntity,
    /// False when an existing row with the same key was updated.
    pub created: bool,
}

/// What a `sync` call did. Failures are per fetched record, indexed by the
/// record's position in the fetch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run: SyncRun,
    pub persisted: Vec<StoredEntity>,
    pub failures: Vec<ItemFailure>,
    pub notified: usize,
}

impl SyncReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credentials, LinkedUserId};

    fn connection() -> Connection {
        Connection::new(
            ProjectId::new(),
            LinkedUserId::new(),
            "hubspot",
            Vertical::Crm,
            Credentials::default(),
        )
        .unwrap()
    }

    #[test]
    fn states_advance_in_order() {
        let mut run = SyncRun::start(&connection(), ObjectType::Contact);
        for s in [
            SyncState::Fetching,
            SyncState::Unifying,
            SyncState::Persisting,
            SyncState::Notifying,
            SyncState::Done,
        ] {
            run.advance(s).unwrap();
        }
        assert!(run.finished_at.is_some());
        assert!(run.advance(SyncState::Failed).is_err());
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let mut run = SyncRun::start(&connection(), ObjectType::Contact);
        assert!(run.advance(SyncState::Persisting).is_err());
        assert_eq!(run.state, SyncState::Resolving);
    }

    #[test]
    fn fail_is_reachable_from_any_open_state() {
        let mut run = SyncRun::start(&connection(), ObjectType::Contact);
        run.advance(SyncState::Fetching).unwrap();
        run.fail("provider timed out");
        assert_eq!(run.state, SyncState::Failed);
        assert_eq!(run.error_message.as_deref(), Some("provider timed out"));

        run.fail("second");
        assert_eq!(run.error_message.as_deref(), Some("provider timed out"));
    }
}
