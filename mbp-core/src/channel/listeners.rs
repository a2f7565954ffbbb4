//! Message listener registry
//!
//! Listeners are registered once per channel and survive stop/start cycles.
//! Dispatch works on a snapshot of the table, so a listener may subscribe or
//! unsubscribe from inside its own callback without deadlocking.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::warn;

use super::state::NotificationMessage;

/// Callback invoked for every message received on the channel.
pub type MessageListener = Arc<dyn Fn(&NotificationMessage) + Send + Sync>;

#[derive(Default)]
struct Table {
    next_id: u64,
    listeners: BTreeMap<u64, MessageListener>,
}

#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    table: Arc<Mutex<Table>>,
}

impl ListenerRegistry {
    pub(crate) fn subscribe(&self, listener: MessageListener) -> Subscription {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let id = table.next_id;
        table.next_id += 1;
        table.listeners.insert(id, listener);

        Subscription {
            id,
            table: Arc::downgrade(&self.table),
            active: true,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    /// Deliver `message` to every listener in registration order.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub(crate) fn dispatch(&self, message: &NotificationMessage) {
        let snapshot: Vec<(u64, MessageListener)> = {
            let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table
                .listeners
                .iter()
                .map(|(id, listener)| (*id, Arc::clone(listener)))
                .collect()
        };

        for (id, listener) in snapshot {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener(message)));
            if result.is_err() {
                warn!(listener = id, event = %message.event, "message listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle, or calling [`Subscription::unsubscribe`], removes the
/// listener. Call [`Subscription::detach`] to keep it for the lifetime of the
/// channel.
#[must_use = "dropping a Subscription removes the listener"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    table: Weak<Mutex<Table>>,
    active: bool,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the listener registered after this handle is dropped.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        if let Some(table) = self.table.upgrade() {
            table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
