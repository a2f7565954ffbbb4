//! Unread notification counter

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::channel::{NotificationChannel, Subscription};

/// Counts `ReceiveNotification` messages since the last reset.
///
/// Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct UnreadCounter {
    count: Arc<AtomicU64>,
}

impl UnreadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen on `channel`, counting each notification message.
    ///
    /// Other event names are ignored. Dropping the returned subscription stops
    /// counting.
    pub fn attach(&self, channel: &NotificationChannel) -> Subscription {
        let counter = self.clone();
        channel.on_message(move |message| {
            if message.is_notification() {
                counter.increment();
            }
        })
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Increment and return the new count.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark everything as read.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}
