//! Caller-side handles returned by request and subscription calls

use futures::Stream;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::mailbox::Inbox;
use crate::types::{ClientEventId, DefinitionId, RequestId, SimEvent};
use crate::{Result, SimError};

/// Pending answer to a one-shot request.
///
/// Resolves to exactly one value or one error. If the connection closes first
/// the reply resolves to [`SimError::ConnectionClosed`].
#[derive(Debug)]
pub struct Reply<T> {
    request: RequestId,
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Reply<T> {
    pub(crate) fn new(request: RequestId, receiver: oneshot::Receiver<Result<T>>) -> Self {
        Self { request, receiver }
    }

    pub fn request_id(&self) -> RequestId {
        self.request
    }

    /// Wait for the reply.
    pub async fn recv(self) -> Result<T> {
        self.receiver.await.map_err(|_| SimError::ConnectionClosed)?
    }

    /// Wait for the reply, giving up after `duration`.
    ///
    /// The request stays pending on the connection; a late reply is dropped.
    pub async fn recv_timeout(self, duration: Duration) -> Result<T> {
        let request = self.request;
        tokio::time::timeout(duration, self.recv())
            .await
            .map_err(|_| SimError::Timeout { request, duration })?
    }
}

/// Stream of replies to a periodic or "all of type" request.
///
/// Ends when the request is cancelled, fails or the connection closes.
/// Dropping the subscription abandons the request; the connection stops it
/// on the host when the next reply finds nobody listening.
#[derive(Debug)]
pub struct DataSubscription<T> {
    request: RequestId,
    definition: DefinitionId,
    inbox: Inbox<Result<T>>,
}

impl<T: Send + 'static> DataSubscription<T> {
    pub(crate) fn new(request: RequestId, definition: DefinitionId, inbox: Inbox<Result<T>>) -> Self {
        Self { request, definition, inbox }
    }

    /// Request id, used to cancel the subscription.
    pub fn request_id(&self) -> RequestId {
        self.request
    }

    pub fn definition(&self) -> DefinitionId {
        self.definition
    }

    /// Next reply, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<Result<T>> {
        self.inbox.recv().await
    }

    /// Next buffered reply without waiting.
    pub fn try_recv(&mut self) -> Option<Result<T>> {
        self.inbox.try_recv()
    }

    /// Replies discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.inbox.dropped()
    }

    /// Number of buffered replies.
    pub fn buffered(&self) -> usize {
        self.inbox.len()
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send + 'static {
        self.inbox.into_stream()
    }
}

/// Stream of notifications for one client event.
#[derive(Debug)]
pub struct EventSubscription {
    event: ClientEventId,
    name: String,
    inbox: Inbox<SimEvent>,
}

impl EventSubscription {
    pub(crate) fn new(event: ClientEventId, name: String, inbox: Inbox<SimEvent>) -> Self {
        Self { event, name, inbox }
    }

    /// Client event id, used to transmit the event or unsubscribe.
    pub fn event_id(&self) -> ClientEventId {
        self.event
    }

    /// Host event name this id is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn recv(&mut self) -> Option<SimEvent> {
        self.inbox.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SimEvent> {
        self.inbox.try_recv()
    }

    pub fn dropped(&self) -> u64 {
        self.inbox.dropped()
    }

    pub fn into_stream(self) -> impl Stream<Item = SimEvent> + Send + 'static {
        self.inbox.into_stream()
    }
}
