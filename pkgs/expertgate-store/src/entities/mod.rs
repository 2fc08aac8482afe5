//! Sea-ORM entities for expertgate-store

pub mod collaboration_applications;
pub mod collaboration_posts;
pub mod expert_connections;
pub mod messages;
pub mod notification_outbox;
pub mod profiles;
pub mod project_group_members;
pub mod project_groups;

pub use collaboration_applications::Entity as CollaborationApplications;
pub use collaboration_posts::Entity as CollaborationPosts;
pub use expert_connections::Entity as ExpertConnections;
pub use messages::Entity as Messages;
pub use notification_outbox::Entity as NotificationOutbox;
pub use profiles::Entity as Profiles;
pub use project_group_members::Entity as ProjectGroupMembers;
pub use project_groups::Entity as ProjectGroups;
