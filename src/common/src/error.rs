/// Errors raised by the document store, the raw transaction log and the
/// identifiers that address them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid workspace id '{id}': {reason}")]
    InvalidWorkspaceId { id: String, reason: &'static str },

    #[error("Workspace '{0}' is read-only")]
    ReadOnlyWorkspace(String),

    #[error("Session for workspace '{0}' is closed")]
    SessionClosed(String),

    #[error("Document {id} is not a {class}: {message}")]
    InvalidDocument {
        id: String,
        class: String,
        message: String,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
