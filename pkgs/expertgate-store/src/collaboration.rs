//! Collaboration manager - posts, applications and project groups
//!
//! Per (post, applicant) the application moves `pending -> accepted` or
//! `pending -> rejected` and never back. Accepting runs in one transaction:
//! the status change, the get-or-create of the post's project group (with the
//! author as owner), the applicant's membership and an accepted collaboration
//! connection between applicant and author either all land or none do. A
//! pending collaboration request between the two is accepted rather than
//! duplicated.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::changefeed::{ChangeEvent, ChangeFeed};
use crate::connection_store::{insert_connection, ConnectionStore};
use crate::entities::{
    collaboration_applications, collaboration_posts, expert_connections, profiles,
    project_group_members, project_groups,
};
use crate::error::{Result, StoreError};
use crate::models::{
    ApplicationStatus, CollaborationApplication, CollaborationPost, Connection, ConnectionStatus,
    ConnectionType, GroupMember, MemberRole, PostStatus, ProjectGroup,
};
use crate::{new_id, now_millis};

/// Result of accepting an application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptOutcome {
    pub application: CollaborationApplication,
    pub group: ProjectGroup,
    /// True when this acceptance created the group
    pub group_created: bool,
    pub member: GroupMember,
    /// Collaboration connection opened by this acceptance: a new one, or a
    /// pending request between the two that got accepted. `None` when one was
    /// already accepted.
    pub connection: Option<Connection>,
}

/// Collaboration manager
#[derive(Clone)]
pub struct CollaborationManager {
    db: DatabaseConnection,
    feed: ChangeFeed,
}

impl CollaborationManager {
    /// Create a new collaboration manager
    pub fn new(db: DatabaseConnection, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    /// Publish a new open post
    pub async fn create_post(
        &self,
        author_id: &str,
        title: &str,
        description: &str,
        field_of_study: &[String],
    ) -> Result<CollaborationPost> {
        let author = profiles::Entity::find_by_id(author_id.to_string())
            .one(&self.db)
            .await?
            .filter(|p| !p.is_deleted);
        if author.is_none() {
            return Err(StoreError::ProfileNotFound(author_id.to_string()));
        }

        let id = new_id();
        let post = collaboration_posts::ActiveModel {
            id: Set(id.clone()),
            author_id: Set(author_id.to_string()),
            title: Set(title.to_string()),
            description: Set(description.to_string()),
            field_of_study_json: Set(serde_json::to_string(field_of_study)?),
            status: Set(PostStatus::Open.as_str().to_string()),
            created_at: Set(now_millis()),
        };
        collaboration_posts::Entity::insert(post)
            .exec_without_returning(&self.db)
            .await?;

        info!("Collaboration post {} created by {}", id, author_id);
        self.get_post(&id)
            .await?
            .ok_or(StoreError::PostNotFound(id))
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Option<CollaborationPost>> {
        collaboration_posts::Entity::find_by_id(post_id.to_string())
            .one(&self.db)
            .await?
            .map(CollaborationPost::try_from)
            .transpose()
    }

    /// Open posts, newest first
    pub async fn list_open_posts(&self) -> Result<Vec<CollaborationPost>> {
        let models = collaboration_posts::Entity::find()
            .filter(collaboration_posts::Column::Status.eq(PostStatus::Open.as_str()))
            .order_by_desc(collaboration_posts::Column::CreatedAt)
            .all(&self.db)
            .await?;

        models.into_iter().map(CollaborationPost::try_from).collect()
    }

    /// Stop accepting applications on a post
    pub async fn close_post(&self, author_id: &str, post_id: &str) -> Result<CollaborationPost> {
        let model = self.find_post(&self.db, post_id).await?;
        if model.author_id != author_id {
            return Err(StoreError::Forbidden(author_id.to_string()));
        }

        let mut active: collaboration_posts::ActiveModel = model.into();
        active.status = Set(PostStatus::Closed.as_str().to_string());
        let post = CollaborationPost::try_from(active.update(&self.db).await?)?;

        info!("Collaboration post {} closed", post_id);
        Ok(post)
    }

    /// Apply to an open post. One application per (post, applicant).
    pub async fn apply(
        &self,
        applicant_id: &str,
        post_id: &str,
        message: &str,
    ) -> Result<CollaborationApplication> {
        let txn = self.db.begin().await?;

        let post = CollaborationPost::try_from(self.find_post(&txn, post_id).await?)?;
        if post.status != PostStatus::Open {
            return Err(StoreError::PostClosed(post_id.to_string()));
        }
        if post.author_id == applicant_id {
            return Err(StoreError::Forbidden(applicant_id.to_string()));
        }

        let applicant = profiles::Entity::find_by_id(applicant_id.to_string())
            .one(&txn)
            .await?
            .filter(|p| !p.is_deleted);
        if applicant.is_none() {
            return Err(StoreError::ProfileNotFound(applicant_id.to_string()));
        }

        let existing = collaboration_applications::Entity::find()
            .filter(collaboration_applications::Column::PostId.eq(post_id))
            .filter(collaboration_applications::Column::ApplicantId.eq(applicant_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(StoreError::DuplicateApplication {
                post_id: post_id.to_string(),
                applicant_id: applicant_id.to_string(),
            });
        }

        let model = collaboration_applications::Model {
            id: new_id(),
            post_id: post_id.to_string(),
            applicant_id: applicant_id.to_string(),
            message: message.to_string(),
            status: ApplicationStatus::Pending.as_str().to_string(),
            created_at: now_millis(),
        };
        let active = collaboration_applications::ActiveModel {
            id: Set(model.id.clone()),
            post_id: Set(model.post_id.clone()),
            applicant_id: Set(model.applicant_id.clone()),
            message: Set(model.message.clone()),
            status: Set(model.status.clone()),
            created_at: Set(model.created_at),
        };
        collaboration_applications::Entity::insert(active)
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;

        let application = CollaborationApplication::try_from(model)?;
        info!(
            "Application {} submitted by {} for post {}",
            application.id, applicant_id, post_id
        );
        self.feed
            .publish(ChangeEvent::ApplicationInserted(application.clone()));
        Ok(application)
    }

    /// Applications to a post, visible to its author only
    pub async fn applications_for(
        &self,
        author_id: &str,
        post_id: &str,
    ) -> Result<Vec<CollaborationApplication>> {
        let post = self.find_post(&self.db, post_id).await?;
        if post.author_id != author_id {
            return Err(StoreError::Forbidden(author_id.to_string()));
        }

        let models = collaboration_applications::Entity::find()
            .filter(collaboration_applications::Column::PostId.eq(post_id))
            .order_by_asc(collaboration_applications::Column::CreatedAt)
            .all(&self.db)
            .await?;

        models
            .into_iter()
            .map(CollaborationApplication::try_from)
            .collect()
    }

    /// Accept a pending application on one of `author_id`'s posts
    pub async fn accept(&self, author_id: &str, application_id: &str) -> Result<AcceptOutcome> {
        let txn = self.db.begin().await?;

        let (app_model, post) = self
            .find_pending_application(&txn, author_id, application_id)
            .await?;

        let mut active: collaboration_applications::ActiveModel = app_model.into();
        active.status = Set(ApplicationStatus::Accepted.as_str().to_string());
        let application = CollaborationApplication::try_from(active.update(&txn).await?)?;

        let existing_group = project_groups::Entity::find()
            .filter(project_groups::Column::PostId.eq(post.id.as_str()))
            .one(&txn)
            .await?;
        let (group, group_created) = match existing_group {
            Some(group) => (ProjectGroup::from(group), false),
            None => {
                let group = project_groups::Model {
                    id: new_id(),
                    post_id: post.id.clone(),
                    name: post.title.clone(),
                    created_at: now_millis(),
                };
                project_groups::Entity::insert(project_groups::ActiveModel {
                    id: Set(group.id.clone()),
                    post_id: Set(group.post_id.clone()),
                    name: Set(group.name.clone()),
                    created_at: Set(group.created_at),
                })
                .exec_without_returning(&txn)
                .await?;
                add_member(&txn, &group.id, &post.author_id, MemberRole::Owner).await?;

                debug!("Project group {} created for post {}", group.id, post.id);
                (ProjectGroup::from(group), true)
            }
        };

        let member = add_member(
            &txn,
            &group.id,
            &application.applicant_id,
            MemberRole::Member,
        )
        .await?;

        let existing_connection = expert_connections::Entity::find()
            .filter(ConnectionStore::between(
                &application.applicant_id,
                &post.author_id,
            ))
            .filter(
                expert_connections::Column::ConnectionType
                    .eq(ConnectionType::Collaboration.as_str()),
            )
            .filter(expert_connections::Column::Status.ne(ConnectionStatus::Declined.as_str()))
            .one(&txn)
            .await?;
        let (connection, connection_created) = match existing_connection {
            Some(existing) if existing.status == ConnectionStatus::Pending.as_str() => {
                let mut active: expert_connections::ActiveModel = existing.into();
                active.status = Set(ConnectionStatus::Accepted.as_str().to_string());
                active.updated_at = Set(now_millis());
                let accepted = Connection::try_from(active.update(&txn).await?)?;
                debug!("Pending collaboration request {} accepted", accepted.id);
                (Some(accepted), false)
            }
            Some(_) => (None, false),
            None => {
                let inserted = insert_connection(
                    &txn,
                    &application.applicant_id,
                    &post.author_id,
                    ConnectionStatus::Accepted,
                    ConnectionType::Collaboration,
                )
                .await?;
                (Some(Connection::try_from(inserted)?), true)
            }
        };

        txn.commit().await?;

        info!(
            "Application {} accepted, {} joined group {}",
            application_id, application.applicant_id, group.id
        );
        self.feed
            .publish(ChangeEvent::ApplicationUpdated(application.clone()));
        self.feed.publish(ChangeEvent::GroupMemberAdded(member.clone()));
        if let Some(connection) = &connection {
            let event = if connection_created {
                ChangeEvent::ConnectionInserted(connection.clone())
            } else {
                ChangeEvent::ConnectionUpdated(connection.clone())
            };
            self.feed.publish(event);
        }

        Ok(AcceptOutcome {
            application,
            group,
            group_created,
            member,
            connection,
        })
    }

    /// Reject a pending application on one of `author_id`'s posts
    pub async fn reject(
        &self,
        author_id: &str,
        application_id: &str,
    ) -> Result<CollaborationApplication> {
        let txn = self.db.begin().await?;

        let (app_model, _) = self
            .find_pending_application(&txn, author_id, application_id)
            .await?;

        let mut active: collaboration_applications::ActiveModel = app_model.into();
        active.status = Set(ApplicationStatus::Rejected.as_str().to_string());
        let application = CollaborationApplication::try_from(active.update(&txn).await?)?;

        txn.commit().await?;

        info!("Application {} rejected", application_id);
        self.feed
            .publish(ChangeEvent::ApplicationUpdated(application.clone()));
        Ok(application)
    }

    /// Project group of a post, if any application was accepted
    pub async fn group_for_post(&self, post_id: &str) -> Result<Option<ProjectGroup>> {
        let group = project_groups::Entity::find()
            .filter(project_groups::Column::PostId.eq(post_id))
            .one(&self.db)
            .await?;

        Ok(group.map(ProjectGroup::from))
    }

    /// Members of a project group, owner first
    pub async fn group_members(&self, group_id: &str) -> Result<Vec<GroupMember>> {
        let models = project_group_members::Entity::find()
            .filter(project_group_members::Column::GroupId.eq(group_id))
            .order_by_asc(project_group_members::Column::JoinedAt)
            .all(&self.db)
            .await?;

        let mut members = models
            .into_iter()
            .map(GroupMember::try_from)
            .collect::<Result<Vec<_>>>()?;
        members.sort_by_key(|m| m.role != MemberRole::Owner);
        Ok(members)
    }

    async fn find_post<C: ConnectionTrait>(
        &self,
        db: &C,
        post_id: &str,
    ) -> Result<collaboration_posts::Model> {
        collaboration_posts::Entity::find_by_id(post_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| StoreError::PostNotFound(post_id.to_string()))
    }

    async fn find_pending_application<C: ConnectionTrait>(
        &self,
        db: &C,
        author_id: &str,
        application_id: &str,
    ) -> Result<(collaboration_applications::Model, CollaborationPost)> {
        let app_model = collaboration_applications::Entity::find_by_id(application_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| StoreError::ApplicationNotFound(application_id.to_string()))?;

        let post = CollaborationPost::try_from(self.find_post(db, &app_model.post_id).await?)?;
        if post.author_id != author_id {
            warn!(
                "{} tried to review application {} on a post they do not own",
                author_id, application_id
            );
            return Err(StoreError::Forbidden(author_id.to_string()));
        }

        if app_model.status != ApplicationStatus::Pending.as_str() {
            return Err(StoreError::InvalidTransition(format!(
                "application {} is already {}",
                application_id, app_model.status
            )));
        }

        Ok((app_model, post))
    }
}

async fn add_member<C: ConnectionTrait>(
    db: &C,
    group_id: &str,
    user_id: &str,
    role: MemberRole,
) -> Result<GroupMember> {
    let existing = project_group_members::Entity::find()
        .filter(project_group_members::Column::GroupId.eq(group_id))
        .filter(project_group_members::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    if let Some(existing) = existing {
        return GroupMember::try_from(existing);
    }

    let model = project_group_members::Model {
        id: new_id(),
        group_id: group_id.to_string(),
        user_id: user_id.to_string(),
        role: role.as_str().to_string(),
        joined_at: now_millis(),
    };
    project_group_members::Entity::insert(project_group_members::ActiveModel {
        id: Set(model.id.clone()),
        group_id: Set(model.group_id.clone()),
        user_id: Set(model.user_id.clone()),
        role: Set(model.role.clone()),
        joined_at: Set(model.joined_at),
    })
    .exec_without_returning(db)
    .await?;

    GroupMember::try_from(model)
}
