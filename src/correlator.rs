//! Request correlation between issued requests and host replies.
//!
//! The [`Correlator`] allocates request ids and keeps one [`PendingRequest`]
//! per outstanding request. The dispatch loop resolves entries as replies
//! arrive; one-shot entries retire on their first reply, periodic entries stay
//! until cancelled and "by type" entries retire after their last object.
//!
//! Replies are handed to a [`ReplySink`], which owns the caller's channel and
//! decodes raw payloads into the caller's type. Sinks are cloned out of the
//! table before delivery so no lock is ever held across an await.
//!
//! [`SendHistory`] remembers which call produced each recent send id so host
//! exceptions can be attributed to the request, definition or event that
//! caused them.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::mailbox::{MailboxSender, PushOutcome};
use crate::types::{DefinitionId, ObjectFilter, ObjectId, RequestId, SendId, SendOrigin, SystemState};
use crate::{Result, SimError};

/// How a pending request retires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Retired by its first reply
    OneShot,
    /// Retired only by cancellation, host exception or close
    Periodic,
    /// Retired after the reply whose entry number reaches its total
    ByType,
}

/// Raw reply handed to a sink.
#[derive(Debug, Clone, Copy)]
pub enum ReplyPayload<'a> {
    /// Record bytes of one simulation object
    Record { data: &'a [u8], object: ObjectId, entry_number: u32, out_of: u32 },
    /// Answer to a system-state query
    SystemState(&'a SystemState),
}

/// Converts a raw reply into the caller's value.
pub type Decoder<T> = Arc<dyn Fn(ReplyPayload<'_>) -> Result<T> + Send + Sync>;

/// Destination of a pending request's replies.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Decode and deliver one reply.
    async fn deliver(&self, payload: ReplyPayload<'_>) -> PushOutcome;

    /// Deliver a terminal error and close.
    async fn fail(&self, error: SimError);

    /// Close without delivering anything further.
    fn close(&self);

    /// Whether the caller has given up on the reply.
    fn is_abandoned(&self) -> bool {
        false
    }
}

/// Sink for requests answered exactly once.
pub struct OnceSink<T> {
    sender: Mutex<Option<oneshot::Sender<Result<T>>>>,
    decode: Decoder<T>,
}

impl<T: Send + 'static> OnceSink<T> {
    pub fn new(decode: Decoder<T>) -> (Arc<Self>, oneshot::Receiver<Result<T>>) {
        let (tx, rx) = oneshot::channel();
        (Arc::new(Self { sender: Mutex::new(Some(tx)), decode }), rx)
    }

    fn take(&self) -> Option<oneshot::Sender<Result<T>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[async_trait]
impl<T: Send + 'static> ReplySink for OnceSink<T> {
    async fn deliver(&self, payload: ReplyPayload<'_>) -> PushOutcome {
        let value = (self.decode)(payload);
        match self.take().map(|sender| sender.send(value)) {
            Some(Ok(())) => PushOutcome::Delivered,
            _ => PushOutcome::Closed,
        }
    }

    async fn fail(&self, error: SimError) {
        if let Some(sender) = self.take() {
            let _ = sender.send(Err(error));
        }
    }

    fn close(&self) {
        self.take();
    }

    fn is_abandoned(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(oneshot::Sender::is_closed)
    }
}

/// Sink for requests answered repeatedly through a mailbox.
pub struct StreamSink<T> {
    sender: MailboxSender<Result<T>>,
    decode: Decoder<T>,
}

impl<T: Send + 'static> StreamSink<T> {
    pub fn new(sender: MailboxSender<Result<T>>, decode: Decoder<T>) -> Arc<Self> {
        Arc::new(Self { sender, decode })
    }
}

#[async_trait]
impl<T: Send + 'static> ReplySink for StreamSink<T> {
    async fn deliver(&self, payload: ReplyPayload<'_>) -> PushOutcome {
        // a record that fails to decode is reported on the channel, later
        // replies keep flowing
        self.sender.push((self.decode)(payload)).await
    }

    async fn fail(&self, error: SimError) {
        self.sender.push(Err(error)).await;
        self.sender.close();
    }

    fn close(&self) {
        self.sender.close();
    }
}

/// One outstanding request.
#[derive(Clone)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub definition: Option<DefinitionId>,
    pub filter: Option<ObjectFilter>,
    pub mode: RequestMode,
    sink: Arc<dyn ReplySink>,
}

impl PendingRequest {
    pub fn new(request_id: RequestId, mode: RequestMode, sink: Arc<dyn ReplySink>) -> Self {
        Self { request_id, definition: None, filter: None, mode, sink }
    }

    /// Attach the definition and object filter the request was issued for.
    pub fn for_definition(mut self, definition: DefinitionId, filter: ObjectFilter) -> Self {
        self.definition = Some(definition);
        self.filter = Some(filter);
        self
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("request_id", &self.request_id)
            .field("definition", &self.definition)
            .field("filter", &self.filter)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// What happened to a reply handed to [`Correlator::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Delivered to the caller
    Delivered,
    /// Caller's queue was full and the policy discarded a reply
    Dropped,
    /// No pending entry for this id
    Stale,
    /// The caller dropped its receiver; the entry was retired
    ReceiverGone {
        request: RequestId,
        mode: RequestMode,
        definition: Option<DefinitionId>,
        filter: Option<ObjectFilter>,
    },
}

impl Resolution {
    /// Whether a pending entry matched the reply.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Stale)
    }
}

struct Table {
    closed: bool,
    pending: HashMap<RequestId, PendingRequest>,
}

/// Thread-safe table of pending requests.
pub struct Correlator {
    next_id: AtomicU32,
    table: Mutex<Table>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            table: Mutex::new(Table { closed: false, pending: HashMap::new() }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh request id.
    pub fn allocate(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Record a pending request before its host call is issued.
    pub fn register(&self, pending: PendingRequest) -> Result<()> {
        let mut table = self.lock();
        if table.closed {
            return Err(SimError::ConnectionClosed);
        }
        Self::sweep(&mut table);
        debug!(request = %pending.request_id, mode = ?pending.mode, "Registered pending request");
        table.pending.insert(pending.request_id, pending);
        Ok(())
    }

    /// Drop entries whose caller stopped waiting, e.g. a dropped or timed-out `Reply`.
    fn sweep(table: &mut Table) {
        let before = table.pending.len();
        table.pending.retain(|_, entry| !entry.sink.is_abandoned());
        let swept = before - table.pending.len();
        if swept > 0 {
            debug!(count = swept, "Swept abandoned requests");
        }
    }

    /// Whether a request is still pending.
    pub fn contains(&self, request: RequestId) -> bool {
        self.lock().pending.contains_key(&request)
    }

    /// Number of pending requests.
    pub fn pending_count(&self) -> usize {
        let mut table = self.lock();
        Self::sweep(&mut table);
        table.pending.len()
    }

    /// Hand a reply to the pending entry for `request`.
    ///
    /// Unknown ids are stale (a late or duplicate reply) and are ignored.
    pub async fn resolve(&self, request: RequestId, payload: ReplyPayload<'_>) -> Resolution {
        let (entry, retire, skip) = {
            let mut table = self.lock();
            let Some(entry) = table.pending.get(&request) else {
                warn!(request = %request, "Reply for unknown request dropped");
                return Resolution::Stale;
            };

            let (retire, skip) = match (entry.mode, payload) {
                (RequestMode::OneShot, _) => (true, false),
                (RequestMode::Periodic, _) => (false, false),
                (RequestMode::ByType, ReplyPayload::Record { entry_number, out_of, .. }) => {
                    (entry_number >= out_of, out_of == 0)
                }
                (RequestMode::ByType, ReplyPayload::SystemState(_)) => (true, false),
            };

            let entry = entry.clone();
            if retire {
                table.pending.remove(&request);
            }
            (entry, retire, skip)
        };

        let outcome = if skip { PushOutcome::Delivered } else { entry.sink.deliver(payload).await };
        if retire {
            trace!(request = %request, "Retired pending request");
            entry.sink.close();
        }

        match outcome {
            PushOutcome::Delivered => Resolution::Delivered,
            PushOutcome::Dropped | PushOutcome::Evicted => {
                warn!(request = %request, "Subscriber queue full, reply dropped");
                Resolution::Dropped
            }
            PushOutcome::Closed => {
                if !retire {
                    self.lock().pending.remove(&request);
                }
                debug!(request = %request, "Receiver dropped, request retired");
                Resolution::ReceiverGone {
                    request,
                    mode: entry.mode,
                    definition: entry.definition,
                    filter: entry.filter,
                }
            }
        }
    }

    /// Retire a request without an error, closing its channel.
    pub fn cancel(&self, request: RequestId) -> Option<PendingRequest> {
        let entry = self.lock().pending.remove(&request)?;
        debug!(request = %request, "Cancelled pending request");
        entry.sink.close();
        Some(entry)
    }

    /// Retire a request with an error delivered on its channel.
    ///
    /// Returns `false` when the request is no longer pending.
    pub async fn fail(&self, request: RequestId, error: SimError) -> bool {
        let entry = self.lock().pending.remove(&request);
        let Some(entry) = entry else {
            return false;
        };
        debug!(request = %request, error = %error, "Failing pending request");
        entry.sink.fail(error).await;
        true
    }

    /// Refuse new requests and close every pending channel.
    pub fn close_all(&self) -> Vec<PendingRequest> {
        let drained: Vec<_> = {
            let mut table = self.lock();
            table.closed = true;
            table.pending.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            entry.sink.close();
        }
        debug!(count = drained.len(), "Closed all pending requests");
        drained
    }
}

/// Bounded map of recent send ids to the calls that produced them.
pub struct SendHistory {
    capacity: usize,
    entries: Mutex<(VecDeque<SendId>, HashMap<SendId, SendOrigin>)>,
}

impl SendHistory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: Mutex::new((VecDeque::new(), HashMap::new())) }
    }

    /// Remember the origin of a send id, evicting the oldest entry when full.
    pub fn record(&self, send_id: SendId, origin: SendOrigin) {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let (order, origins) = &mut *guard;
        if origins.insert(send_id, origin).is_none() {
            order.push_back(send_id);
        }
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                origins.remove(&oldest);
            }
        }
    }

    /// Origin of a send id, if still remembered.
    pub fn lookup(&self, send_id: SendId) -> Option<SendOrigin> {
        let guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        guard.1.get(&send_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
