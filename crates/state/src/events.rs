//! Typed event bus for cross-surface notifications.
//!
//! Store contents are observed through [`Store::subscribe`](crate::store::Store::subscribe).
//! The bus carries everything that is not store state: user-visible notices
//! (the toast channel), channel state transitions, and reconciliation
//! activity, so independent surfaces can react to the same occurrence.

use shopfront_core::{ChangeAction, EntityKind};
use tokio::sync::broadcast;

use crate::realtime::ChannelState;

/// Buffered events per subscriber before the slowest one starts lagging.
const BUS_CAPACITY: usize = 256;

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Failure,
}

/// A user-visible notice (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    /// What was being attempted (e.g. "Update announcement banner").
    pub action: String,
    pub message: String,
}

impl Notice {
    /// A failure notice for `action`.
    #[must_use]
    pub fn failure(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Failure,
            action: action.into(),
            message: message.into(),
        }
    }

    /// A success notice for `action`.
    #[must_use]
    pub fn success(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            action: action.into(),
            message: message.into(),
        }
    }
}

/// Events published on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Something the user should be told about.
    Notice(Notice),
    /// The real-time channel changed state.
    Channel(ChannelState),
    /// An inbound change was applied to a store.
    Reconciled {
        entity: EntityKind,
        action: ChangeAction,
    },
    /// A polling refetch was applied.
    Refetched,
}

/// Broadcast bus for [`StoreEvent`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Subscribe to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Publishing with no subscribers is not an error.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }

    /// Publish a notice.
    pub fn notify(&self, notice: Notice) {
        self.publish(StoreEvent::Notice(notice));
    }
}
