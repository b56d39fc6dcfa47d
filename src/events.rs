//! Client event subscriptions

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

use crate::mailbox::{MailboxSender, PushOutcome};
use crate::types::{ClientEventId, SimEvent};
use crate::{Result, SimError};

/// What a client event id is bound to on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Mapped to a named sim event
    Mapped,
    /// Subscribed to a named system event
    System,
}

/// What happened to an event handed to [`EventTable::deliver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDelivery {
    /// Queued for the subscriber, or dropped by its overflow policy
    Delivered,
    /// No subscription listens on the event id
    Unclaimed,
    /// The subscriber dropped its receiver; the subscription was removed
    ReceiverGone { event: ClientEventId, name: String, kind: EventKind },
}

struct Subscription {
    name: String,
    kind: EventKind,
    sender: Arc<MailboxSender<SimEvent>>,
}

struct Table {
    closed: bool,
    subscriptions: HashMap<ClientEventId, Subscription>,
}

/// Client event ids and the subscriptions listening on them.
pub struct EventTable {
    next_id: AtomicU32,
    table: Mutex<Table>,
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            table: Mutex::new(Table { closed: false, subscriptions: HashMap::new() }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh client event id.
    pub fn allocate(&self) -> ClientEventId {
        ClientEventId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a subscription before its host call is issued.
    pub fn insert(
        &self,
        event: ClientEventId,
        name: impl Into<String>,
        kind: EventKind,
        sender: MailboxSender<SimEvent>,
    ) -> Result<()> {
        let mut table = self.lock();
        if table.closed {
            return Err(SimError::ConnectionClosed);
        }
        let name = name.into();
        debug!(event = %event, name = %name, kind = ?kind, "Added event subscription");
        table.subscriptions.insert(event, Subscription { name, kind, sender: Arc::new(sender) });
        Ok(())
    }

    /// Name and kind of a subscription.
    pub fn get(&self, event: ClientEventId) -> Option<(String, EventKind)> {
        self.lock().subscriptions.get(&event).map(|sub| (sub.name.clone(), sub.kind))
    }

    /// Remove a subscription and close its channel.
    pub fn remove(&self, event: ClientEventId) -> Option<(String, EventKind)> {
        let subscription = self.lock().subscriptions.remove(&event)?;
        subscription.sender.close();
        debug!(event = %event, name = %subscription.name, "Removed event subscription");
        Some((subscription.name, subscription.kind))
    }

    /// Deliver an event to its subscription.
    ///
    /// A subscription whose receiver is gone is removed, and the caller is
    /// told so it can release the binding on the host.
    pub async fn deliver(&self, event: SimEvent) -> EventDelivery {
        let id = event.event_id();
        let sender = self.lock().subscriptions.get(&id).map(|sub| Arc::clone(&sub.sender));
        let Some(sender) = sender else {
            trace!(event = %id, "No subscription for event");
            return EventDelivery::Unclaimed;
        };

        match sender.push(event).await {
            PushOutcome::Delivered => EventDelivery::Delivered,
            PushOutcome::Dropped | PushOutcome::Evicted => {
                warn!(event = %id, "Event queue full, event dropped");
                EventDelivery::Delivered
            }
            PushOutcome::Closed => {
                debug!(event = %id, "Event receiver dropped");
                match self.remove(id) {
                    Some((name, kind)) => EventDelivery::ReceiverGone { event: id, name, kind },
                    // removed concurrently by an explicit unsubscribe
                    None => EventDelivery::Delivered,
                }
            }
        }
    }

    /// Refuse new subscriptions and close every channel.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut table = self.lock();
            table.closed = true;
            table.subscriptions.drain().map(|(_, sub)| sub).collect()
        };
        for subscription in &drained {
            subscription.sender.close();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.lock().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverflowPolicy;
    use crate::mailbox::mailbox;

    fn plain(event: ClientEventId, data: u32) -> SimEvent {
        SimEvent::Event { event, group: 0, data }
    }

    #[tokio::test]
    async fn routes_events_by_id() {
        let table = EventTable::new();
        let paused = table.allocate();
        let crashed = table.allocate();
        let (tx_paused, mut rx_paused) = mailbox(4, OverflowPolicy::DropNewest);
        let (tx_crashed, mut rx_crashed) = mailbox(4, OverflowPolicy::DropNewest);
        table.insert(paused, "Pause", EventKind::System, tx_paused).unwrap();
        table.insert(crashed, "Crashed", EventKind::System, tx_crashed).unwrap();

        assert_eq!(table.deliver(plain(paused, 1)).await, EventDelivery::Delivered);
        assert_eq!(table.deliver(plain(ClientEventId(99), 1)).await, EventDelivery::Unclaimed);

        assert_eq!(rx_paused.try_recv(), Some(plain(paused, 1)));
        assert_eq!(rx_crashed.try_recv(), None);
    }

    #[tokio::test]
    async fn dropped_receivers_retire_their_subscription() {
        let table = EventTable::new();
        let id = table.allocate();
        let (tx, rx) = mailbox(4, OverflowPolicy::DropNewest);
        table.insert(id, "Pause", EventKind::System, tx).unwrap();
        drop(rx);

        assert_eq!(
            table.deliver(plain(id, 1)).await,
            EventDelivery::ReceiverGone { event: id, name: "Pause".to_string(), kind: EventKind::System }
        );
        assert!(table.is_empty());
        assert_eq!(table.deliver(plain(id, 1)).await, EventDelivery::Unclaimed);
    }

    #[tokio::test]
    async fn remove_closes_the_channel() {
        let table = EventTable::new();
        let id = table.allocate();
        let (tx, mut rx) = mailbox(4, OverflowPolicy::DropNewest);
        table.insert(id, "SimStart", EventKind::System, tx).unwrap();

        assert_eq!(table.remove(id), Some(("SimStart".to_string(), EventKind::System)));
        assert!(rx.recv().await.is_none());
        assert!(table.remove(id).is_none());
    }

    #[tokio::test]
    async fn close_all_refuses_new_subscriptions() {
        let table = EventTable::new();
        let (tx, mut rx) = mailbox(4, OverflowPolicy::DropNewest);
        table.insert(table.allocate(), "AXIS_ELEVATOR_SET", EventKind::Mapped, tx).unwrap();

        assert_eq!(table.close_all(), 1);
        assert!(rx.recv().await.is_none());

        let (late, _rx) = mailbox(4, OverflowPolicy::DropNewest);
        let result = table.insert(table.allocate(), "Pause", EventKind::System, late);
        assert!(matches!(result, Err(SimError::ConnectionClosed)));
    }
}
