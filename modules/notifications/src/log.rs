use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::models::Notification;

pub const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded record of notifications sent by this process
///
/// Once full, the oldest entries are dropped first.
pub struct NotificationLog {
    capacity: usize,
    entries: RwLock<VecDeque<Notification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn record(&self, notification: Notification) {
        let mut entries = self.entries.write().await;
        entries.push_back(notification);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Oldest first, optionally only those for one trip
    pub async fn list(&self, trip_id: Option<&str>) -> Vec<Notification> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|n| trip_id.map_or(true, |id| n.trip_id == id))
            .cloned()
            .collect()
    }
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new()
    }
}
