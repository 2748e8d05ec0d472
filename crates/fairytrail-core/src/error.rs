use thiserror::Error;

/// Failure talking to the durable key-value storage.
///
/// Callers in this crate never propagate these to the page: they are logged
/// and the operation degrades to a no-op or an in-memory default.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Storage is disabled, locked, or otherwise not reachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage backend error: {0}")]
    Backend(String),
}
