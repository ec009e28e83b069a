use thiserror::Error;
use uuid::Uuid;

/// Errors from persistence and storage ports (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RepositoryError {
    fn from(e: std::io::Error) -> Self {
        RepositoryError::Io(e.to_string())
    }
}

/// Errors from a quota gate.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// The client has used its full allowance for today. Not a fault; do not retry.
    #[error("daily turn limit reached, resets in {retry_after_hours}h")]
    Exceeded { retry_after_hours: u32 },

    /// The gate itself could not be reached (remote quota server down).
    #[error("quota service unavailable: {0}")]
    Unavailable(String),
}

/// Errors related to conversation store operations.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("conversation storage unavailable: {0}")]
    PersistenceUnavailable(String),
}

impl From<RepositoryError> for ConversationError {
    fn from(e: RepositoryError) -> Self {
        ConversationError::PersistenceUnavailable(e.to_string())
    }
}

/// Errors from the attachment object store.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("attachment '{0}' is empty")]
    EmptyPayload(String),

    #[error("attachment '{name}' exceeds {max_bytes} bytes")]
    TooLarge { name: String, max_bytes: u64 },

    #[error("object storage error: {0}")]
    Storage(String),
}

/// Errors surfaced by the turn engine. Each is a distinct, recoverable condition.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("daily turn limit reached, resets in {retry_after_hours}h")]
    QuotaExceeded { retry_after_hours: u32 },

    #[error("quota check failed: {0}")]
    QuotaUnavailable(String),

    #[error("upload failed: {0}")]
    UploadFailed(#[from] UploadError),

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("failed to save conversation: {0}")]
    Persistence(String),

    #[error("reply task failed: {0}")]
    ReplyTask(String),
}

impl From<ConversationError> for TurnError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::SessionNotFound(id) => TurnError::SessionNotFound(id),
            ConversationError::PersistenceUnavailable(msg) => TurnError::Persistence(msg),
        }
    }
}

impl From<QuotaError> for TurnError {
    fn from(e: QuotaError) -> Self {
        match e {
            QuotaError::Exceeded { retry_after_hours } => {
                TurnError::QuotaExceeded { retry_after_hours }
            }
            QuotaError::Unavailable(msg) => TurnError::QuotaUnavailable(msg),
        }
    }
}
