//! Error types for session-scoped components

use expertgate_store::StoreError;
use thiserror::Error;

/// Errors that can occur in sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Must be logged in")]
    NotLoggedIn,
    #[error("Conversation {0} has been closed")]
    ConversationClosed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
