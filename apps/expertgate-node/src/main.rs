use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use expertgate_store::{
    open_database, ChangeFeed, CollaborationManager, ConnectionStore, ConnectionType,
    MessageStore, NotificationOutbox, ProfileManager, Role, StoreConfig,
};
use expertgate_sync::{
    ConversationView, LogSender, NotificationDispatcher, PendingRequestAggregator, Session,
    SessionTracker, SyncConfig, UnreadAggregator,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = "expertgate.db")]
    db: PathBuf,

    /// Attempts before a notification expires
    #[arg(long, default_value = "10")]
    max_attempts: u32,

    /// First notification retry delay in seconds
    #[arg(long, default_value = "30")]
    retry_base: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage profiles and expert verification
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Request a connection
    Connect {
        #[arg(long = "as")]
        user: String,
        recipient: String,
        #[arg(long, default_value = "friend")]
        kind: ConnectionType,
    },
    /// Accept a pending request addressed to you
    Accept {
        #[arg(long = "as")]
        user: String,
        connection: String,
    },
    /// Decline a pending request addressed to you
    Decline {
        #[arg(long = "as")]
        user: String,
        connection: String,
    },
    /// Remove a connection and its messages
    Remove {
        #[arg(long = "as")]
        user: String,
        connection: String,
    },
    /// Show connections, unread conversations and pending requests
    Inbox {
        #[arg(long = "as")]
        user: String,
    },
    /// Send a message on a connection
    Send {
        #[arg(long = "as")]
        user: String,
        connection: String,
        text: String,
    },
    /// Print a conversation and mark it read
    History {
        #[arg(long = "as")]
        user: String,
        connection: String,
    },
    /// Publish a collaboration post
    Post {
        #[arg(long = "as")]
        user: String,
        title: String,
        description: String,
        /// Field of study, repeatable
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// List open collaboration posts
    Posts,
    /// Apply to a collaboration post
    Apply {
        #[arg(long = "as")]
        user: String,
        post: String,
        message: String,
    },
    /// List applications to one of your posts
    Applications {
        #[arg(long = "as")]
        user: String,
        post: String,
    },
    /// Accept or reject an application to one of your posts
    Review {
        #[arg(long = "as")]
        user: String,
        application: String,
        #[arg(long)]
        reject: bool,
    },
    /// Deliver due notifications
    Dispatch {
        /// Keep dispatching until Ctrl+C
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    Create {
        id: String,
        name: String,
        #[arg(long, default_value = "researcher")]
        role: Role,
    },
    /// Grant moderation rights
    Admin { id: String },
    /// Experts waiting for verification
    Pending,
    /// Verify or reject a pending expert
    Verify {
        #[arg(long)]
        admin: String,
        expert: String,
        #[arg(long)]
        reject: bool,
    },
    /// Put a rejected expert back in the queue
    Resubmit { id: String },
}

struct App {
    profiles: ProfileManager,
    connections: Arc<ConnectionStore>,
    messages: MessageStore,
    collaboration: CollaborationManager,
    outbox: NotificationOutbox,
    store_config: StoreConfig,
    sync_config: SyncConfig,
}

impl App {
    async fn open(args: &Args) -> Result<Self> {
        let store_config = StoreConfig {
            db_path: args.db.clone(),
            max_notification_attempts: args.max_attempts,
            notification_retry_base_seconds: args.retry_base,
            ..Default::default()
        };
        let db = open_database(&store_config)
            .await
            .with_context(|| format!("Failed to open {}", args.db.display()))?;
        let feed = ChangeFeed::new(store_config.change_feed_capacity);

        Ok(Self {
            profiles: ProfileManager::new(db.clone(), feed.clone(), &store_config),
            connections: Arc::new(ConnectionStore::new(db.clone(), feed.clone(), &store_config)),
            messages: MessageStore::new(db.clone(), feed.clone()),
            collaboration: CollaborationManager::new(db.clone(), feed),
            outbox: NotificationOutbox::new(db, &store_config),
            store_config,
            sync_config: SyncConfig::default(),
        })
    }

    async fn sign_in(&self, user: &str) -> Result<Session> {
        let tracker = SessionTracker::new(self.profiles.clone());
        tracker
            .sign_in(user)
            .await
            .with_context(|| format!("Cannot sign in as {}", user))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    let args = Args::parse();
    let app = App::open(&args).await?;

    match args.command {
        Command::Profile { action } => run_profile(&app, action).await?,
        Command::Connect {
            user,
            recipient,
            kind,
        } => {
            let session = app.sign_in(&user).await?;
            let conn = app
                .connections
                .request(&session.user_id, &recipient, kind)
                .await?;
            println!("Requested {} connection {}", kind, conn.id);
        }
        Command::Accept { user, connection } => {
            let session = app.sign_in(&user).await?;
            app.connections.accept(&session.user_id, &connection).await?;
            println!("Accepted {}", connection);
        }
        Command::Decline { user, connection } => {
            let session = app.sign_in(&user).await?;
            app.connections
                .decline(&session.user_id, &connection)
                .await?;
            println!("Declined {}", connection);
        }
        Command::Remove { user, connection } => {
            let session = app.sign_in(&user).await?;
            app.connections.remove(&session.user_id, &connection).await?;
            println!("Removed {}", connection);
        }
        Command::Inbox { user } => run_inbox(&app, &user).await?,
        Command::Send {
            user,
            connection,
            text,
        } => {
            let session = app.sign_in(&user).await?;
            let mut view = ConversationView::new(session, app.messages.clone(), connection);
            let message = view.send(&text).await?;
            println!("Sent {}", message.id);
        }
        Command::History { user, connection } => {
            let session = app.sign_in(&user).await?;
            let mut view = ConversationView::new(session.clone(), app.messages.clone(), connection);
            println!("Conversation {}", view.connection_id());
            for message in view.load().await? {
                let marker = if message.sender_id == session.user_id {
                    ">"
                } else {
                    "<"
                };
                println!(
                    "{} [{}] {}: {}",
                    marker,
                    message.created_at.format("%Y-%m-%d %H:%M:%S"),
                    message.sender_id,
                    message.content
                );
            }

            let unread =
                UnreadAggregator::new(session, app.connections.clone(), &app.sync_config);
            unread.mark_as_read(view.connection_id()).await?;
        }
        Command::Post {
            user,
            title,
            description,
            fields,
        } => {
            let session = app.sign_in(&user).await?;
            let post = app
                .collaboration
                .create_post(&session.user_id, &title, &description, &fields)
                .await?;
            println!("Created post {}", post.id);
        }
        Command::Posts => {
            for post in app.collaboration.list_open_posts().await? {
                println!(
                    "{}  {} by {} [{}]",
                    post.id,
                    post.title,
                    post.author_id,
                    post.field_of_study.join(", ")
                );
            }
        }
        Command::Apply {
            user,
            post,
            message,
        } => {
            let session = app.sign_in(&user).await?;
            let application = app
                .collaboration
                .apply(&session.user_id, &post, &message)
                .await?;
            println!("Applied with {}", application.id);
        }
        Command::Applications { user, post } => {
            let session = app.sign_in(&user).await?;
            for application in app
                .collaboration
                .applications_for(&session.user_id, &post)
                .await?
            {
                println!(
                    "{}  {} ({}): {}",
                    application.id,
                    application.applicant_id,
                    application.status,
                    application.message
                );
            }
        }
        Command::Review {
            user,
            application,
            reject,
        } => {
            let session = app.sign_in(&user).await?;
            if reject {
                app.collaboration
                    .reject(&session.user_id, &application)
                    .await?;
                println!("Rejected {}", application);
            } else {
                let outcome = app
                    .collaboration
                    .accept(&session.user_id, &application)
                    .await?;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
        }
        Command::Dispatch { watch } => {
            let dispatcher = NotificationDispatcher::new(
                app.outbox.clone(),
                Arc::new(LogSender),
                &app.store_config,
                &app.sync_config,
            );
            if watch {
                info!(
                    "Dispatching every {:?}, press Ctrl+C to stop",
                    app.sync_config.dispatch_interval
                );
                tokio::select! {
                    _ = dispatcher.run() => {}
                    result = tokio::signal::ctrl_c() => result?,
                }
            } else {
                let report = dispatcher.dispatch_due().await?;
                println!(
                    "Delivered {}, retried {}, expired {}",
                    report.delivered, report.retried, report.expired
                );
            }
            let removed = app.outbox.cleanup_finished(days_ago(7)).await?;
            if removed > 0 {
                info!("Removed {} finished notifications", removed);
            }
        }
    }

    Ok(())
}

async fn run_profile(app: &App, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Create { id, name, role } => {
            let profile = app.profiles.create(&id, &name, role).await?;
            println!(
                "Created {} {} ({})",
                profile.role, profile.id, profile.verification_status
            );
        }
        ProfileAction::Admin { id } => {
            app.profiles.set_admin(&id, true).await?;
            println!("{} is now an admin", id);
        }
        ProfileAction::Pending => {
            let pending = app.profiles.pending_experts().await?;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        ProfileAction::Verify {
            admin,
            expert,
            reject,
        } => {
            let profile = app
                .profiles
                .set_verification(&admin, &expert, !reject)
                .await?;
            println!("{} is {}", profile.id, profile.verification_status);
        }
        ProfileAction::Resubmit { id } => {
            let profile = app.profiles.resubmit(&id).await?;
            println!("{} is {}", profile.id, profile.verification_status);
        }
    }
    Ok(())
}

async fn run_inbox(app: &App, user: &str) -> Result<()> {
    let session = app.sign_in(user).await?;

    let unread = UnreadAggregator::new(session.clone(), app.connections.clone(), &app.sync_config);
    unread.refresh().await?;

    let pending = PendingRequestAggregator::new(
        session.clone(),
        (*app.connections).clone(),
        app.profiles.clone(),
    );
    pending.refresh(false).await?;

    let lists = app.connections.list(&session.user_id).await?;
    for (label, kind) in [
        ("Friends", ConnectionType::Friend),
        ("Interviews", ConnectionType::Interview),
        ("Collaborations", ConnectionType::Collaboration),
    ] {
        let views = lists.of_type(kind);
        if views.is_empty() {
            continue;
        }
        println!("{}:", label);
        for view in views {
            let marker = if unread.is_unread(&view.connection.id) {
                "*"
            } else {
                " "
            };
            println!(
                " {} {}  {} ({})",
                marker, view.connection.id, view.other_user.full_name, view.other_user.role
            );
        }
    }

    println!("Pending requests: {}", pending.count());
    for view in lists.pending.iter().filter(|v| v.can_respond()) {
        println!(
            "  {}  {} request from {}",
            view.connection.id, view.connection.connection_type, view.other_user.full_name
        );
    }
    Ok(())
}

fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days)
}
