//! Notification dispatcher - drains the outbox through a sender
//!
//! Delivery is at least once: an item is marked delivered only after the
//! sender reports success, and a crash in between sends it again on the next
//! pass. Failed items are rescheduled by the outbox with exponential backoff
//! until their attempt budget runs out.

use async_trait::async_trait;
use expertgate_store::{NotificationKind, NotificationOutbox, OutboxStatus, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::SyncConfig;

/// Transport for notification function calls
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, kind: NotificationKind, payload: &serde_json::Value) -> anyhow::Result<()>;
}

/// Sender that only logs each call
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, kind: NotificationKind, payload: &serde_json::Value) -> anyhow::Result<()> {
        info!("Notification {}: {}", kind, payload);
        Ok(())
    }
}

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub retried: usize,
    pub expired: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.delivered + self.retried + self.expired
    }
}

pub struct NotificationDispatcher<S> {
    outbox: NotificationOutbox,
    sender: Arc<S>,
    batch_size: usize,
    interval: Duration,
}

impl<S: NotificationSender> NotificationDispatcher<S> {
    pub fn new(
        outbox: NotificationOutbox,
        sender: Arc<S>,
        store_config: &StoreConfig,
        sync_config: &SyncConfig,
    ) -> Self {
        Self {
            outbox,
            sender,
            batch_size: store_config.notification_batch_size,
            interval: sync_config.dispatch_interval,
        }
    }

    /// Send every item that is currently due
    pub async fn dispatch_due(&self) -> Result<DispatchReport> {
        let items = self.outbox.due(self.batch_size).await?;
        let mut report = DispatchReport::default();

        for item in items {
            match self.sender.send(item.kind, &item.payload).await {
                Ok(()) => {
                    self.outbox.mark_delivered(&item.id).await?;
                    report.delivered += 1;
                }
                Err(e) => {
                    error!("Notification {} ({}) failed: {:#}", item.id, item.kind, e);
                    match self.outbox.record_failure(&item.id, &e.to_string()).await? {
                        OutboxStatus::Expired => report.expired += 1,
                        _ => report.retried += 1,
                    }
                }
            }
        }

        if report.total() > 0 {
            info!(
                "Dispatch pass: {} delivered, {} retried, {} expired",
                report.delivered, report.retried, report.expired
            );
        }
        Ok(report)
    }

    /// Dispatch on a fixed interval forever
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;

            match self.dispatch_due().await {
                Ok(report) => debug!("Dispatch tick handled {} items", report.total()),
                Err(e) => error!("Dispatch pass failed: {}", e),
            }
        }
    }
}
