//! Processed-event guard
//!
//! Remembers the ids of events a queue has already handled successfully so a
//! redelivery is acknowledged without running the handler again. The window
//! is bounded; the oldest ids are forgotten first.

use async_trait::async_trait;
use event_bus::{Event, EventHandler, HandlerError};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_WINDOW: usize = 10_000;

/// Bounded set of processed event ids
pub struct ProcessedEvents {
    capacity: usize,
    inner: Mutex<Window>,
}

#[derive(Default)]
struct Window {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl ProcessedEvents {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Window::default()),
        }
    }

    pub async fn contains(&self, event_id: &str) -> bool {
        self.inner.lock().await.ids.contains(event_id)
    }

    pub async fn insert(&self, event_id: String) {
        let mut window = self.inner.lock().await;
        if !window.ids.insert(event_id.clone()) {
            return;
        }
        window.order.push_back(event_id);

        while window.order.len() > self.capacity {
            if let Some(oldest) = window.order.pop_front() {
                window.ids.remove(&oldest);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }
}

impl Default for ProcessedEvents {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// Wraps a handler so each event id succeeds at most once per queue
pub struct Deduplicating {
    inner: Arc<dyn EventHandler>,
    processed: ProcessedEvents,
    queue: String,
}

impl Deduplicating {
    pub fn new(inner: Arc<dyn EventHandler>, queue: impl Into<String>, window: usize) -> Self {
        Self {
            inner,
            processed: ProcessedEvents::new(window),
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl EventHandler for Deduplicating {
    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        if self.processed.contains(&event.id).await {
            tracing::debug!(
                event_id = %event.id,
                queue = %self.queue,
                "Event already processed, skipping"
            );
            return Ok(());
        }

        let event_id = event.id.clone();
        self.inner.handle(event).await?;

        // Only successful runs are remembered
        self.processed.insert(event_id).await;
        Ok(())
    }
}
