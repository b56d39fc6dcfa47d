//! Bounded delivery queue with an explicit overflow policy.
//!
//! Every periodic subscription and event subscription owns one mailbox. The
//! dispatch loop is the single producer and the caller the single consumer.
//! What happens when the consumer falls behind is decided by
//! [`OverflowPolicy`], never by the channel implementation:
//!
//! - `DropNewest` discards the incoming item
//! - `DropOldest` evicts the oldest queued item
//! - `Block` parks the producer until the consumer makes room
//!
//! Dropped items are counted and visible to the consumer through
//! [`Inbox::dropped`].

use futures::Stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::config::OverflowPolicy;

/// Result of handing one item to a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Item queued
    Delivered,
    /// Item queued after evicting the oldest one
    Evicted,
    /// Queue full, item discarded
    Dropped,
    /// Consumer gone or mailbox closed, item discarded
    Closed,
}

struct State<T> {
    queue: VecDeque<T>,
    sender_closed: bool,
    receiver_closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    item_ready: Notify,
    space_ready: Notify,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: AtomicU64,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a mailbox holding at most `capacity` items.
pub fn mailbox<T>(capacity: usize, policy: OverflowPolicy) -> (MailboxSender<T>, Inbox<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            queue: VecDeque::with_capacity(capacity.min(1024)),
            sender_closed: false,
            receiver_closed: false,
        }),
        item_ready: Notify::new(),
        space_ready: Notify::new(),
        capacity: capacity.max(1),
        policy,
        dropped: AtomicU64::new(0),
    });

    (MailboxSender { shared: Arc::clone(&shared) }, Inbox { shared })
}

/// Producing half, owned by the dispatch side.
pub struct MailboxSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> MailboxSender<T> {
    /// Queue an item according to the mailbox's overflow policy.
    ///
    /// Only waits under [`OverflowPolicy::Block`] while the queue is full.
    pub async fn push(&self, item: T) -> PushOutcome {
        let mut item = Some(item);
        loop {
            let space = self.shared.space_ready.notified();
            {
                let mut state = self.shared.lock();
                if state.receiver_closed || state.sender_closed {
                    return PushOutcome::Closed;
                }

                if state.queue.len() < self.shared.capacity {
                    state.queue.extend(item.take());
                    drop(state);
                    self.shared.item_ready.notify_one();
                    return PushOutcome::Delivered;
                }

                match self.shared.policy {
                    OverflowPolicy::DropNewest => {
                        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                        return PushOutcome::Dropped;
                    }
                    OverflowPolicy::DropOldest => {
                        state.queue.pop_front();
                        state.queue.extend(item.take());
                        drop(state);
                        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                        self.shared.item_ready.notify_one();
                        return PushOutcome::Evicted;
                    }
                    OverflowPolicy::Block => {}
                }
            }
            space.await;
        }
    }

    /// Close the mailbox. Queued items stay readable.
    pub fn close(&self) {
        self.shared.lock().sender_closed = true;
        self.shared.item_ready.notify_one();
        self.shared.space_ready.notify_one();
    }

    /// Whether the consumer has gone away or the mailbox was closed.
    pub fn is_closed(&self) -> bool {
        let state = self.shared.lock();
        state.receiver_closed || state.sender_closed
    }
}

impl<T> Drop for MailboxSender<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consuming half, held by the caller.
pub struct Inbox<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Inbox<T> {
    /// Receive the next item, or `None` once the mailbox is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let ready = self.shared.item_ready.notified();
            {
                let mut state = self.shared.lock();
                if let Some(item) = state.queue.pop_front() {
                    drop(state);
                    self.shared.space_ready.notify_one();
                    return Some(item);
                }
                if state.sender_closed {
                    return None;
                }
            }
            ready.await;
        }
    }

    /// Take an item without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        let item = self.shared.lock().queue.pop_front();
        if item.is_some() {
            self.shared.space_ready.notify_one();
        }
        item
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the producer closed the mailbox.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().sender_closed
    }

    /// Items discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Convert into a stream that ends when the mailbox closes.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send + 'static
    where
        T: Send + 'static,
    {
        futures::stream::unfold(self, |mut inbox| async move {
            inbox.recv().await.map(|item| (item, inbox))
        })
    }
}

impl<T> std::fmt::Debug for Inbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbox")
            .field("queued", &self.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl<T> Drop for Inbox<T> {
    fn drop(&mut self) {
        self.shared.lock().receiver_closed = true;
        self.shared.space_ready.notify_one();
    }
}
