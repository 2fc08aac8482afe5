//! Profile manager for profiles and expert verification

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::changefeed::{ChangeEvent, ChangeFeed};
use crate::entities::profiles;
use crate::error::{Result, StoreError};
use crate::models::{Profile, Role, VerificationStatus};
use crate::notification_outbox::{notification_payload, NotificationKind, NotificationOutbox};
use crate::{now_millis, StoreConfig};

/// Editable profile attributes. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub full_name: Option<String>,
    pub institution: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

/// Profile manager
#[derive(Clone)]
pub struct ProfileManager {
    db: DatabaseConnection,
    feed: ChangeFeed,
    max_notification_attempts: u32,
}

impl ProfileManager {
    /// Create a new profile manager
    pub fn new(db: DatabaseConnection, feed: ChangeFeed, config: &StoreConfig) -> Self {
        Self {
            db,
            feed,
            max_notification_attempts: config.max_notification_attempts,
        }
    }

    /// Create a profile. Experts start out pending verification.
    pub async fn create(&self, id: &str, full_name: &str, role: Role) -> Result<Profile> {
        let now = now_millis();
        let verification_status = match role {
            Role::Expert => VerificationStatus::Pending,
            Role::Researcher => VerificationStatus::Verified,
        };

        let profile = profiles::ActiveModel {
            id: Set(id.to_string()),
            full_name: Set(full_name.to_string()),
            institution: Set(None),
            avatar_url: Set(None),
            bio: Set(None),
            role: Set(role.as_str().to_string()),
            verification_status: Set(verification_status.as_str().to_string()),
            is_admin: Set(false),
            is_deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        profiles::Entity::insert(profile)
            .exec_without_returning(&self.db)
            .await?;

        info!("Created {} profile {}", role, id);
        self.require(id).await
    }

    /// Get a profile by id, including soft-deleted ones
    pub async fn get(&self, id: &str) -> Result<Option<Profile>> {
        profiles::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(Profile::try_from)
            .transpose()
    }

    /// Get a profile that exists and is not soft deleted
    pub async fn require_active(&self, id: &str) -> Result<Profile> {
        match self.get(id).await? {
            Some(profile) if !profile.is_deleted => Ok(profile),
            _ => Err(StoreError::ProfileNotFound(id.to_string())),
        }
    }

    /// Update display attributes
    pub async fn update_details(&self, id: &str, details: ProfileDetails) -> Result<Profile> {
        let model = self.find_model(id).await?;

        let mut active: profiles::ActiveModel = model.into();
        if let Some(full_name) = details.full_name {
            active.full_name = Set(full_name);
        }
        if details.institution.is_some() {
            active.institution = Set(details.institution);
        }
        if details.avatar_url.is_some() {
            active.avatar_url = Set(details.avatar_url);
        }
        if details.bio.is_some() {
            active.bio = Set(details.bio);
        }
        active.updated_at = Set(now_millis());
        let profile = Profile::try_from(active.update(&self.db).await?)?;

        debug!("Updated profile details for {}", id);
        self.feed.publish(ChangeEvent::ProfileUpdated(profile.clone()));
        Ok(profile)
    }

    /// Grant or revoke moderation rights
    pub async fn set_admin(&self, id: &str, is_admin: bool) -> Result<Profile> {
        let model = self.find_model(id).await?;

        let mut active: profiles::ActiveModel = model.into();
        active.is_admin = Set(is_admin);
        active.updated_at = Set(now_millis());
        let profile = Profile::try_from(active.update(&self.db).await?)?;

        info!("Profile {} admin flag set to {}", id, is_admin);
        Ok(profile)
    }

    /// Soft delete a profile. The row stays so history still resolves.
    pub async fn soft_delete(&self, id: &str) -> Result<()> {
        let model = self.find_model(id).await?;

        let mut active: profiles::ActiveModel = model.into();
        active.is_deleted = Set(true);
        active.updated_at = Set(now_millis());
        let profile = Profile::try_from(active.update(&self.db).await?)?;

        info!("Soft deleted profile {}", id);
        self.feed.publish(ChangeEvent::ProfileUpdated(profile));
        Ok(())
    }

    /// Experts waiting for verification, oldest first
    pub async fn pending_experts(&self) -> Result<Vec<Profile>> {
        let models = profiles::Entity::find()
            .filter(profiles::Column::Role.eq(Role::Expert.as_str()))
            .filter(profiles::Column::VerificationStatus.eq(VerificationStatus::Pending.as_str()))
            .filter(profiles::Column::IsDeleted.eq(false))
            .order_by_asc(profiles::Column::CreatedAt)
            .all(&self.db)
            .await?;

        models.into_iter().map(Profile::try_from).collect()
    }

    /// Verify or reject a pending expert. Only admins may do this.
    pub async fn set_verification(
        &self,
        admin_id: &str,
        expert_id: &str,
        approve: bool,
    ) -> Result<Profile> {
        let admin = self.require_active(admin_id).await?;
        if !admin.is_admin {
            warn!("Profile {} tried to moderate without admin rights", admin_id);
            return Err(StoreError::Forbidden(admin_id.to_string()));
        }

        let txn = self.db.begin().await?;

        let model = profiles::Entity::find_by_id(expert_id.to_string())
            .one(&txn)
            .await?
            .filter(|m| !m.is_deleted)
            .ok_or_else(|| StoreError::ProfileNotFound(expert_id.to_string()))?;

        let current = Profile::try_from(model.clone())?;
        if current.role != Role::Expert {
            return Err(StoreError::InvalidTransition(format!(
                "{} is not an expert",
                expert_id
            )));
        }
        if current.verification_status != VerificationStatus::Pending {
            return Err(StoreError::InvalidTransition(format!(
                "{} is already {}",
                expert_id, current.verification_status
            )));
        }

        let next = if approve {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Rejected
        };

        let mut active: profiles::ActiveModel = model.into();
        active.verification_status = Set(next.as_str().to_string());
        active.updated_at = Set(now_millis());
        let profile = Profile::try_from(active.update(&txn).await?)?;

        NotificationOutbox::enqueue(
            &txn,
            NotificationKind::ExpertVerification,
            notification_payload(next.as_str(), "expert", expert_id),
            self.max_notification_attempts,
        )
        .await?;

        txn.commit().await?;

        info!("Expert {} marked {} by {}", expert_id, next, admin_id);
        self.feed.publish(ChangeEvent::ProfileUpdated(profile.clone()));
        Ok(profile)
    }

    /// Put a rejected expert back in the verification queue
    pub async fn resubmit(&self, expert_id: &str) -> Result<Profile> {
        let model = self.find_model(expert_id).await?;
        let current = Profile::try_from(model.clone())?;

        if current.verification_status != VerificationStatus::Rejected {
            return Err(StoreError::InvalidTransition(format!(
                "only rejected experts can resubmit, {} is {}",
                expert_id, current.verification_status
            )));
        }

        let mut active: profiles::ActiveModel = model.into();
        active.verification_status = Set(VerificationStatus::Pending.as_str().to_string());
        active.updated_at = Set(now_millis());
        let profile = Profile::try_from(active.update(&self.db).await?)?;

        info!("Expert {} resubmitted for verification", expert_id);
        self.feed.publish(ChangeEvent::ProfileUpdated(profile.clone()));
        Ok(profile)
    }

    async fn require(&self, id: &str) -> Result<Profile> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::ProfileNotFound(id.to_string()))
    }

    async fn find_model(&self, id: &str) -> Result<profiles::Model> {
        profiles::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .filter(|m| !m.is_deleted)
            .ok_or_else(|| StoreError::ProfileNotFound(id.to_string()))
    }
}
