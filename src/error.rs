//! Error types for quest lifecycle operations and the progress store.

use thiserror::Error;

/// Errors returned by explicit lifecycle calls on the quest system
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuestError {
    /// No active or archived quest with this id
    #[error("Quest not found: {0}")]
    NotFound(String),

    /// The quest definition does not allow cancellation
    #[error("Quest '{0}' cannot be canceled")]
    NotCancelable(String),

    /// The quest already reached a terminal state
    #[error("Quest '{0}' is not active")]
    NotActive(String),

    /// The last task group is not complete yet
    #[error("Quest '{0}' has unfinished tasks")]
    NotReady(String),
}

/// Errors surfaced by a remote progress store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network, permission or database failure in the backing store
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }
}
