//! Error types for connection handle operations

use thiserror::Error;

/// Result type for connection handle operations
pub type Result<T> = std::result::Result<T, StowError>;

/// Errors surfaced by [`Connection`](crate::Connection) and [`Upgrade`](crate::Upgrade).
///
/// Every error is terminal for the call that produced it; nothing is retried.
/// Engine-reported failures carry the engine's diagnostic text.
#[derive(Debug, Error)]
pub enum StowError {
    /// The host exposes no storage capability
    #[error("storage is not supported in this environment")]
    UnsupportedEnvironment,

    /// No database has been successfully opened on this handle
    #[error("database is not open")]
    NotOpen,

    /// The engine failed to open or upgrade the database
    #[error("failed to open database: {0}")]
    OpenFailed(String),

    /// Index creation referenced a store that does not exist
    #[error("object store '{0}' not found")]
    StoreNotFound(String),

    /// Index creation attempted without an active upgrade context
    #[error("cannot create index '{index}' on '{store}' outside of a version upgrade")]
    IndexCreationOutsideUpgrade { store: String, index: String },

    /// The engine rejected a store declaration
    #[error("failed to create object store: {0}")]
    CreateStoreFailed(String),

    /// The engine rejected an index declaration
    #[error("failed to create index: {0}")]
    CreateIndexFailed(String),

    /// The engine rejected a store deletion
    #[error("failed to delete object store: {0}")]
    DeleteStoreFailed(String),

    #[error("add failed: {0}")]
    AddFailed(String),

    #[error("get failed: {0}")]
    GetFailed(String),

    #[error("put failed: {0}")]
    PutFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("clear failed: {0}")]
    ClearFailed(String),

    #[error("getAll failed: {0}")]
    GetAllFailed(String),

    #[error("count failed: {0}")]
    CountFailed(String),

    /// The engine failed to delete a database
    #[error("failed to delete database: {0}")]
    DeleteDatabaseFailed(String),

    /// Failure raised by caller-supplied upgrade logic
    #[error("upgrade failed: {0}")]
    Upgrade(String),

    /// Record could not be converted to or from its stored form
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid connection configuration
    #[error("configuration error: {0}")]
    Config(String),
}
