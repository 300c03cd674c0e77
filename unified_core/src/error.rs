use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

/// Where an orchestrator call failed: enough for a caller to decide on retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub connection_id: Option<String>,
    pub object_type: Option<String>,
    pub step: String,
}

impl ErrorContext {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            connection_id: None,
            object_type: None,
            step: step.into(),
        }
    }

    pub fn with_connection(mut self, connection_id: impl ToString) -> Self {
        self.connection_id = Some(connection_id.to_string());
        self
    }

    pub fn with_object_type(mut self, object_type: impl ToString) -> Self {
        self.object_type = Some(object_type.to_string());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step={}", self.step)?;
        if let Some(id) = &self.connection_id {
            write!(f, " connection_id={id}")?;
        }
        if let Some(object_type) = &self.object_type {
            write!(f, " object_type={object_type}")?;
        }
        Ok(())
    }
}

/// One failed element of a batch, addressed by its position in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub index: usize,
    pub reason: String,
    /// Offending canonical field, when the failure is a validation error.
    pub field: Option<String>,
    pub retryable: bool,
}

impl ItemFailure {
    pub fn from_error(index: usize, err: &Error) -> Self {
        Self {
            index,
            reason: err.to_string(),
            field: err.field().map(str::to_string),
            retryable: err.is_retryable(),
        }
    }
}

/// Some elements of a batch translation failed while others succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TranslationPartialFailure {
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
}

impl fmt::Display for TranslationPartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} items failed",
            self.failures.len(),
            self.succeeded + self.failures.len()
        )?;
        if let Some(first) = self.failures.first() {
            write!(f, " (first: index {}: {})", first.index, first.reason)?;
        }
        Ok(())
    }
}

/// Common error type for `unified_core`.
///
/// Provider clients and stores report their own failures with `Error::backend`;
/// the orchestrator re-wraps those as `Upstream` / `Persistence` with an
/// [`ErrorContext`] naming the step that failed.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: field `{field}`: {message}")]
    Validation { field: String, message: String },

    #[error("partial failure: {0}")]
    PartialFailure(TranslationPartialFailure),

    #[error("upstream error ({context}): {message}")]
    Upstream {
        context: ErrorContext,
        message: String,
    },

    #[error("persistence error ({context}): {message}")]
    Persistence {
        context: ErrorContext,
        message: String,
    },

    #[error("unattributed provider response ({context}): {message}")]
    UnattributedResponse {
        context: ErrorContext,
        message: String,
        raw: serde_json::Value,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("backend error: {0}")]
    BackendMessage(String),
}

impl Error {
    pub fn backend(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Convenience: wrap any error into `Backend` with "reqwest" context.
    pub fn backend_reqwest(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Backend {
            context: "reqwest".into(),
            source: Box::new(source),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: "required field is missing".to_string(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upstream(context: ErrorContext, err: impl fmt::Display) -> Self {
        Self::Upstream {
            context,
            message: err.to_string(),
        }
    }

    pub fn persistence(context: ErrorContext, err: impl fmt::Display) -> Self {
        Self::Persistence {
            context,
            message: err.to_string(),
        }
    }

    /// Only provider and storage failures are worth retrying without caller changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Persistence { .. })
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
