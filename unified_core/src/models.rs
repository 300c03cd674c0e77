use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdParseError {
    #[error("invalid uuid: {0}")]
    InvalidUuid(String),
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let id = Uuid::parse_str(s).map_err(|_| IdParseError::InvalidUuid(s.to_string()))?;
                Ok(Self(id))
            }
        }
    };
}

uuid_id!(
    /// Tenant (project) identifier.
    ProjectId
);
uuid_id!(
    /// The tenant's end-user on whose behalf a connection operates.
    LinkedUserId
);
uuid_id!(
    /// A tenant's authorized link to one provider account.
    ConnectionId
);

/// Business domain grouping of object types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vertical {
    Crm,
    Ats,
    Hris,
    Ticketing,
    Accounting,
    MarketingAutomation,
    FileStorage,
}

impl Vertical {
    pub const ALL: [Vertical; 7] = [
        Vertical::Crm,
        Vertical::Ats,
        Vertical::Hris,
        Vertical::Ticketing,
        Vertical::Accounting,
        Vertical::MarketingAutomation,
        Vertical::FileStorage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vertical::Crm => "crm",
            Vertical::Ats => "ats",
            Vertical::Hris => "hris",
            Vertical::Ticketing => "ticketing",
            Vertical::Accounting => "accounting",
            Vertical::MarketingAutomation => "marketing_automation",
            Vertical::FileStorage => "file_storage",
        }
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vertical {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Vertical::ALL
            .into_iter()
            .find(|v| v.as_str() == needle)
            .ok_or_else(|| Error::InvalidInput(format!("unknown vertical '{s}'")))
    }
}

/// Canonical business object kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Contact,
    Company,
    Deal,
    Ticket,
    Comment,
    User,
    Candidate,
    Employee,
    Benefit,
    Invoice,
    File,
}

impl ObjectType {
    pub const ALL: [ObjectType; 11] = [
        ObjectType::Contact,
        ObjectType::Company,
        ObjectType::Deal,
        ObjectType::Ticket,
        ObjectType::Comment,
        ObjectType::User,
        ObjectType::Candidate,
        ObjectType::Employee,
        ObjectType::Benefit,
        ObjectType::Invoice,
        ObjectType::File,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Contact => "contact",
            ObjectType::Company => "company",
            ObjectType::Deal => "deal",
            ObjectType::Ticket => "ticket",
            ObjectType::Comment => "comment",
            ObjectType::User => "user",
            ObjectType::Candidate => "candidate",
            ObjectType::Employee => "employee",
            ObjectType::Benefit => "benefit",
            ObjectType::Invoice => "invoice",
            ObjectType::File => "file",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        ObjectType::ALL
            .into_iter()
            .find(|o| o.as_str() == needle)
            .ok_or_else(|| Error::InvalidInput(format!("unknown object type '{s}'")))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Valid,
    Expired,
    Revoked,
}

/// Provider auth material. Opaque to the engine; only provider clients read it.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(serde_json::Value);

impl Credentials {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key).ok_or_else(|| {
            Error::InvalidInput(format!("connection credentials missing '{key}'"))
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// A tenant's linked account with one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub project_id: ProjectId,
    pub linked_user_id: LinkedUserId,
    /// Provider slug, e.g. "hubspot" or "gorgias".
    pub provider: String,
    pub vertical: Vertical,
    pub status: ConnectionStatus,
    #[serde(default)]
    pub credentials: Credentials,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        project_id: ProjectId,
        linked_user_id: LinkedUserId,
        provider: impl Into<String>,
        vertical: Vertical,
        credentials: Credentials,
    ) -> Result<Self> {
        let provider = provider.into().trim().to_ascii_lowercase();
        if provider.is_empty() {
            return Err(Error::InvalidInput("connection provider is empty".to_string()));
        }
        Ok(Self {
            id: ConnectionId::new(),
            project_id,
            linked_user_id,
            provider,
            vertical,
            status: ConnectionStatus::Valid,
            credentials,
            created_at: Utc::now(),
        })
    }

    pub fn tenant(&self) -> TenantContext {
        TenantContext {
            project_id: self.project_id,
            linked_user_id: self.linked_user_id,
            connection_id: self.id,
        }
    }
}

/// Who a persisted entity belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    pub project_id: ProjectId,
    pub linked_user_id: LinkedUserId,
    pub connection_id: ConnectionId,
}
