//! Per-collection change notifications.
//!
//! Events are opaque resync cues: they say that some row of a table changed
//! for an owner, never what the row now looks like.

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::models::EntityId;
use crate::store::Table;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub owner_id: Uuid,
    pub kind: ChangeKind,
    pub row_id: Option<EntityId>,
}

/// What a subscriber wakes up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Changed(ChangeEvent),
    /// The receiver fell behind and dropped this many events.
    Missed(u64),
}

/// Fan-out point for change events.
#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscriptions could see the event. Publishing with
    /// nobody listening is a no-op.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => {
                trace!(receivers, "change published");
                receivers
            }
            Err(broadcast::error::SendError(event)) => {
                trace!(table = %event.table, "no subscribers for change");
                0
            }
        }
    }

    pub fn subscribe(&self, table: Table, owner_id: Uuid) -> Subscription {
        debug!(table = %table, owner = %owner_id, "subscribing to changes");
        Subscription {
            rx: self.tx.subscribe(),
            table,
            owner_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Filtered view of the hub for one table and owner. Dropping it releases
/// the channel; nothing is delivered afterwards.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    table: Table,
    owner_id: Uuid,
}

impl Subscription {
    pub fn table(&self) -> Table {
        self.table
    }

    fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && event.owner_id == self.owner_id
    }

    /// Waits for the next matching notification. `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event) => return Some(Notification::Changed(event)),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!(table = %self.table, missed, "change subscription lagged");
                    return Some(Notification::Missed(missed));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Consumes everything already queued and reports how many matching
    /// notifications were folded away.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.matches(&event) => drained += 1,
                Ok(_) => {}
                Err(TryRecvError::Lagged(_)) => drained += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return drained,
            }
        }
    }

    pub fn unsubscribe(self) {
        debug!(table = %self.table, owner = %self.owner_id, "unsubscribing from changes");
    }
}
