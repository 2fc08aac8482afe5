//! Domain types shared by the store managers and their callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entities::{
    collaboration_applications, collaboration_posts, expert_connections, messages, profiles,
    project_group_members, project_groups,
};
use crate::error::StoreError;

/// Declares a unit enum that is persisted as a lowercase string column.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(StoreError::InvalidValue {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Profile role
    Role, "role" {
        Researcher => "researcher",
        Expert => "expert",
    }
);

string_enum!(
    /// Expert verification status
    VerificationStatus, "verification_status" {
        Pending => "pending",
        Verified => "verified",
        Rejected => "rejected",
    }
);

string_enum!(
    /// Connection status
    ConnectionStatus, "status" {
        Pending => "pending",
        Accepted => "accepted",
        Declined => "declined",
    }
);

string_enum!(
    /// Connection type
    ConnectionType, "connection_type" {
        Friend => "friend",
        Interview => "interview",
        Collaboration => "collaboration",
    }
);

string_enum!(
    /// Collaboration post status
    PostStatus, "post_status" {
        Open => "open",
        Closed => "closed",
    }
);

string_enum!(
    /// Collaboration application status
    ApplicationStatus, "application_status" {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
    }
);

string_enum!(
    /// Project group member role
    MemberRole, "member_role" {
        Owner => "owner",
        Member => "member",
    }
);

string_enum!(
    /// Notification outbox item status
    OutboxStatus, "outbox_status" {
        Pending => "pending",
        Delivered => "delivered",
        Expired => "expired",
    }
);

/// Which side of a connection a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyRole {
    Requester,
    Recipient,
}

pub(crate) fn from_millis(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts).unwrap_or_default()
}

/// Profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub institution: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub verification_status: VerificationStatus,
    pub is_admin: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_verified_expert(&self) -> bool {
        self.role == Role::Expert && self.verification_status == VerificationStatus::Verified
    }
}

impl TryFrom<profiles::Model> for Profile {
    type Error = StoreError;

    fn try_from(model: profiles::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            role: model.role.parse()?,
            verification_status: model.verification_status.parse()?,
            id: model.id,
            full_name: model.full_name,
            institution: model.institution,
            avatar_url: model.avatar_url,
            bio: model.bio,
            is_admin: model.is_admin,
            is_deleted: model.is_deleted,
            created_at: from_millis(model.created_at),
            updated_at: from_millis(model.updated_at),
        })
    }
}

/// Denormalized view of the other party of a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherUser {
    pub id: String,
    pub full_name: String,
    pub institution: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl From<&Profile> for OtherUser {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            full_name: profile.full_name.clone(),
            institution: profile.institution.clone(),
            avatar_url: profile.avatar_url.clone(),
            role: profile.role,
        }
    }
}

/// Directed relationship between two profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub requester_id: String,
    pub recipient_id: String,
    pub status: ConnectionStatus,
    pub connection_type: ConnectionType,
    pub has_unread_for_requester: bool,
    pub has_unread_for_recipient: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    /// Role of `user_id` in this connection, `None` if not a party
    pub fn role_of(&self, user_id: &str) -> Option<PartyRole> {
        if self.requester_id == user_id {
            Some(PartyRole::Requester)
        } else if self.recipient_id == user_id {
            Some(PartyRole::Recipient)
        } else {
            None
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.role_of(user_id).is_some()
    }

    /// The party that is not `user_id`
    pub fn counterparty(&self, user_id: &str) -> Option<&str> {
        match self.role_of(user_id)? {
            PartyRole::Requester => Some(&self.recipient_id),
            PartyRole::Recipient => Some(&self.requester_id),
        }
    }

    pub fn has_unread_for(&self, role: PartyRole) -> bool {
        match role {
            PartyRole::Requester => self.has_unread_for_requester,
            PartyRole::Recipient => self.has_unread_for_recipient,
        }
    }

    /// Whether `user_id` has unseen messages here. Only accepted connections count.
    pub fn is_unread_for(&self, user_id: &str) -> bool {
        self.status == ConnectionStatus::Accepted
            && self
                .role_of(user_id)
                .map(|role| self.has_unread_for(role))
                .unwrap_or(false)
    }
}

impl TryFrom<expert_connections::Model> for Connection {
    type Error = StoreError;

    fn try_from(model: expert_connections::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            status: model.status.parse()?,
            connection_type: model.connection_type.parse()?,
            id: model.id,
            requester_id: model.requester_id,
            recipient_id: model.recipient_id,
            has_unread_for_requester: model.has_unread_for_requester,
            has_unread_for_recipient: model.has_unread_for_recipient,
            created_at: from_millis(model.created_at),
            updated_at: from_millis(model.updated_at),
        })
    }
}

/// A connection as seen by one of its parties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionView {
    pub connection: Connection,
    pub is_requester: bool,
    pub has_unread: bool,
    pub other_user: OtherUser,
}

impl ConnectionView {
    /// Only the recipient may accept or decline a pending request
    pub fn can_respond(&self) -> bool {
        !self.is_requester && self.connection.status == ConnectionStatus::Pending
    }
}

/// Connections of one user split by status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionLists {
    pub accepted: Vec<ConnectionView>,
    pub pending: Vec<ConnectionView>,
}

impl ConnectionLists {
    pub fn of_type(&self, connection_type: ConnectionType) -> Vec<&ConnectionView> {
        self.accepted
            .iter()
            .filter(|v| v.connection.connection_type == connection_type)
            .collect()
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub connection_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl From<messages::Model> for Message {
    fn from(model: messages::Model) -> Self {
        Self {
            id: model.id,
            connection_id: model.connection_id,
            sender_id: model.sender_id,
            content: model.content,
            created_at: from_millis(model.created_at),
            read_at: model.read_at.map(from_millis),
        }
    }
}

/// Collaboration post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationPost {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub description: String,
    pub field_of_study: Vec<String>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<collaboration_posts::Model> for CollaborationPost {
    type Error = StoreError;

    fn try_from(model: collaboration_posts::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            field_of_study: serde_json::from_str(&model.field_of_study_json)?,
            status: model.status.parse()?,
            id: model.id,
            author_id: model.author_id,
            title: model.title,
            description: model.description,
            created_at: from_millis(model.created_at),
        })
    }
}

/// Application to a collaboration post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationApplication {
    pub id: String,
    pub post_id: String,
    pub applicant_id: String,
    pub message: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<collaboration_applications::Model> for CollaborationApplication {
    type Error = StoreError;

    fn try_from(model: collaboration_applications::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            status: model.status.parse()?,
            id: model.id,
            post_id: model.post_id,
            applicant_id: model.applicant_id,
            message: model.message,
            created_at: from_millis(model.created_at),
        })
    }
}

/// Shared group created on the first accepted application of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectGroup {
    pub id: String,
    pub post_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<project_groups::Model> for ProjectGroup {
    fn from(model: project_groups::Model) -> Self {
        Self {
            id: model.id,
            post_id: model.post_id,
            name: model.name,
            created_at: from_millis(model.created_at),
        }
    }
}

/// Project group membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl TryFrom<project_group_members::Model> for GroupMember {
    type Error = StoreError;

    fn try_from(model: project_group_members::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            role: model.role.parse()?,
            id: model.id,
            group_id: model.group_id,
            user_id: model.user_id,
            joined_at: from_millis(model.joined_at),
        })
    }
}
