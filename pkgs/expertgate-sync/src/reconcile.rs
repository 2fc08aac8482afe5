//! Read reconciler - short-lived suppression of locally acknowledged unread flags
//!
//! When a conversation is opened its unread flag is cleared locally before the
//! store write lands. A refresh that races with that write may still see the
//! flag set. Each acknowledged id is held for [`ACK_SUPPRESSION_WINDOW`]; while
//! held, refreshes treat the connection as read. Entries expire on their own,
//! so a later legitimate unread flag is never masked for longer than the window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long a locally acknowledged connection stays suppressed
pub const ACK_SUPPRESSION_WINDOW: Duration = Duration::from_secs(3);

/// TTL cache of acknowledged connection ids
#[derive(Debug)]
pub struct ReadReconciler {
    window: Duration,
    held: HashMap<String, Instant>,
}

impl ReadReconciler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            held: HashMap::new(),
        }
    }

    /// Hold `connection_id` until `now + window`, extending any existing hold
    pub fn suppress(&mut self, connection_id: &str, now: Instant) {
        self.held
            .insert(connection_id.to_string(), now + self.window);
    }

    pub fn is_suppressed(&self, connection_id: &str, now: Instant) -> bool {
        self.held
            .get(connection_id)
            .map(|expires_at| *expires_at > now)
            .unwrap_or(false)
    }

    /// Drop a hold early
    pub fn release(&mut self, connection_id: &str) {
        self.held.remove(connection_id);
    }

    /// Remove expired holds. Returns how many were removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.held.len();
        self.held.retain(|_, expires_at| *expires_at > now);
        before - self.held.len()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl Default for ReadReconciler {
    fn default() -> Self {
        Self::new(ACK_SUPPRESSION_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_expires_after_window() {
        let start = Instant::now();
        let mut reconciler = ReadReconciler::new(Duration::from_secs(3));

        reconciler.suppress("c1", start);
        assert!(reconciler.is_suppressed("c1", start));
        assert!(reconciler.is_suppressed("c1", start + Duration::from_millis(2999)));
        assert!(!reconciler.is_suppressed("c1", start + Duration::from_secs(3)));
        assert!(!reconciler.is_suppressed("c2", start));
    }

    #[test]
    fn test_suppress_again_extends_hold() {
        let start = Instant::now();
        let mut reconciler = ReadReconciler::new(Duration::from_secs(3));

        reconciler.suppress("c1", start);
        reconciler.suppress("c1", start + Duration::from_secs(2));
        assert!(reconciler.is_suppressed("c1", start + Duration::from_secs(4)));
    }

    #[test]
    fn test_prune_and_release() {
        let start = Instant::now();
        let mut reconciler = ReadReconciler::default();

        reconciler.suppress("old", start);
        reconciler.suppress("new", start + Duration::from_secs(2));
        reconciler.suppress("gone", start + Duration::from_secs(2));
        reconciler.release("gone");
        assert_eq!(reconciler.len(), 2);

        let removed = reconciler.prune(start + ACK_SUPPRESSION_WINDOW);
        assert_eq!(removed, 1);
        assert!(reconciler.is_suppressed("new", start + ACK_SUPPRESSION_WINDOW));
        assert!(!reconciler.is_empty());
    }
}
