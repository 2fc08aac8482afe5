//! Session tracker - the identity every other component is scoped to

use chrono::{DateTime, Utc};
use expertgate_store::ProfileManager;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::error::{Result, SyncError};

/// An established session. Components take this by value at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            started_at: Utc::now(),
        }
    }
}

/// Owns the active session and publishes sign-in/sign-out transitions
pub struct SessionTracker {
    profiles: ProfileManager,
    sender: watch::Sender<Option<Session>>,
}

impl SessionTracker {
    pub fn new(profiles: ProfileManager) -> Self {
        let (sender, _) = watch::channel(None);
        Self { profiles, sender }
    }

    /// Start a session for an existing, non-deleted profile
    pub async fn sign_in(&self, user_id: &str) -> Result<Session> {
        let profile = self.profiles.require_active(user_id).await?;

        let session = Session::new(profile.id);
        if let Some(previous) = self.sender.send_replace(Some(session.clone())) {
            info!("Session for {} replaced", previous.user_id);
        }
        info!("Signed in as {}", session.user_id);
        Ok(session)
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.sender.send_replace(None) {
            info!("Signed out {}", previous.user_id);
        }
    }

    pub fn current(&self) -> Result<Session> {
        self.sender.borrow().clone().ok_or(SyncError::NotLoggedIn)
    }

    /// Receiver that observes every sign-in and sign-out
    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }
}
