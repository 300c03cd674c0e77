use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid project_id")]
    InvalidProjectId,

    #[error("invalid event topic")]
    InvalidTopic,

    #[error("invalid event source")]
    InvalidSource,

    #[error("invalid dedupe_key")]
    InvalidDedupeKey,

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("webhook returned non-success status: {status}")]
    WebhookNonSuccess { status: u16 },

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        crate::Error::backend("event delivery", err)
    }
}
