use super::{require, CanonicalInput};
use crate::unification::custom_fields::FieldMappings;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_OPEN: &str = "OPEN";
pub const STATUS_CLOSED: &str = "CLOSED";
pub const PRIORITIES: [&str; 3] = ["HIGH", "MEDIUM", "LOW"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTicketingTicketInput {
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub ticket_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Remote user ids of the assignees.
    #[serde(default)]
    pub assigned_to: Vec<String>,
    /// Provider containers (project key, team, board) the ticket belongs to.
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub field_mappings: FieldMappings,
}

impl CanonicalInput for UnifiedTicketingTicketInput {
    fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        if let Some(status) = self.status.as_deref() {
            if status != STATUS_OPEN && status != STATUS_CLOSED {
                return Err(Error::invalid_field(
                    "status",
                    format!("expected OPEN or CLOSED, got {status:?}"),
                ));
            }
        }
        if let Some(priority) = self.priority.as_deref() {
            if !PRIORITIES.contains(&priority) {
                return Err(Error::invalid_field(
                    "priority",
                    format!("expected HIGH, MEDIUM or LOW, got {priority:?}"),
                ));
            }
        }
        Ok(())
    }
}

impl UnifiedTicketingTicketInput {
    pub fn is_closed(&self) -> bool {
        self.status.as_deref() == Some(STATUS_CLOSED)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTicketingTicketOutput {
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub ticket_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub contact_id: Option<String>,
}
