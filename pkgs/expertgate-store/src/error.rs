//! Error types for store operations

use sea_orm::DbErr;
use thiserror::Error;

use crate::models::ConnectionType;

/// Errors that can occur in store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),
    #[error("Collaboration post not found: {0}")]
    PostNotFound(String),
    #[error("Collaboration application not found: {0}")]
    ApplicationNotFound(String),
    #[error("Notification not found: {0}")]
    NotificationNotFound(String),
    #[error("Message content must not be empty")]
    EmptyMessage,
    #[error("Cannot open a connection with yourself")]
    SelfConnection,
    #[error("A {0} connection already exists between these users")]
    DuplicateConnection(ConnectionType),
    #[error("Profile {0} is not a verified expert")]
    RecipientNotVerified(String),
    #[error("Only the recipient can respond to connection {0}")]
    NotRecipient(String),
    #[error("Profile {0} is not allowed to perform this action")]
    Forbidden(String),
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),
    #[error("Profile {applicant_id} already applied to post {post_id}")]
    DuplicateApplication {
        post_id: String,
        applicant_id: String,
    },
    #[error("Collaboration post {0} is not open")]
    PostClosed(String),
    #[error("Invalid {field} value: {value}")]
    InvalidValue { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
