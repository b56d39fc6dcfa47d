//! Dispatch loop: the single task that drains the host's receive stream.
//!
//! The loop owns no tables itself. It reads one raw message at a time,
//! classifies it and hands it to the correlator, the event table or the
//! exception broadcast held in [`Shared`]. Messages are processed strictly in
//! arrival order, which is what gives every subscription the host's emission
//! order.
//!
//! ## Lifecycle
//!
//! `Running` until one of: the connection is closed, the host sends QUIT, the
//! transport reports end of stream, or a read fails. Then `Stopping` while
//! every pending request and subscription channel is closed and the transport
//! is released, then `Stopped`. A single malformed message is logged and
//! skipped; it never stops the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::ConnectionConfig;
use crate::correlator::{Correlator, ReplyPayload, RequestMode, Resolution, SendHistory};
use crate::events::{EventDelivery, EventKind, EventTable};
use crate::protocol::{HostMessage, ObjectData, RawException, decode_message};
use crate::registry::Registry;
use crate::transport::{HostCall, Transport};
use crate::types::{DefinitionId, HostException, LoopState, ObjectId, Period, RequestId, SendOrigin};
use crate::{Result, SimError};

/// State shared between a connection's callers and its dispatch loop.
pub(crate) struct Shared {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: ConnectionConfig,
    pub(crate) registry: Registry,
    pub(crate) correlator: Correlator,
    pub(crate) events: EventTable,
    pub(crate) history: SendHistory,
    exceptions: Mutex<Option<broadcast::Sender<HostException>>>,
    state: watch::Sender<LoopState>,
    pub(crate) cancel: CancellationToken,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn new(transport: Arc<dyn Transport>, config: ConnectionConfig) -> Self {
        let (exceptions, _) = broadcast::channel(config.exception_capacity);
        let (state, _) = watch::channel(LoopState::Running);
        Self {
            transport,
            registry: Registry::new(),
            correlator: Correlator::new(),
            events: EventTable::new(),
            history: SendHistory::new(config.send_history),
            exceptions: Mutex::new(Some(exceptions)),
            state,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            config,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() { Err(SimError::ConnectionClosed) } else { Ok(()) }
    }

    pub(crate) fn loop_state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    pub(crate) fn subscribe_exceptions(&self) -> Option<broadcast::Receiver<HostException>> {
        self.exceptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(broadcast::Sender::subscribe)
    }

    /// Issue a host call and remember where its send id came from.
    pub(crate) fn call(&self, call: HostCall, origin: SendOrigin) -> Result<()> {
        let operation = call.operation();
        let send_id = self.transport.call(call)?;
        trace!(operation, send_id = %send_id, "Host call issued");
        self.history.record(send_id, origin);
        Ok(())
    }

    /// Tell the host to stop a periodic request.
    pub(crate) fn stop_periodic(
        &self,
        request: RequestId,
        definition: DefinitionId,
        object: ObjectId,
    ) -> Result<()> {
        debug!(request = %request, "Stopping periodic request on host");
        self.call(
            HostCall::RequestDataOnSimObject { request, definition, object, period: Period::Never },
            SendOrigin::Request(request),
        )
    }

    fn publish_exception(&self, exception: HostException) {
        let sender = self.exceptions.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(sender) = sender {
            // no listeners is fine, the exception was already logged
            let _ = sender.send(exception);
        }
    }

    /// Close every channel and release the transport. Runs once.
    pub(crate) fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.send_replace(LoopState::Stopping);
        self.cancel.cancel();

        let requests = self.correlator.close_all().len();
        let events = self.events.close_all();
        self.exceptions.lock().unwrap_or_else(PoisonError::into_inner).take();

        if let Err(e) = self.transport.close() {
            warn!(error = %e, "Failed to release host transport");
        }
        info!(requests, events, "Connection torn down");
    }

    fn mark_stopped(&self) {
        self.state.send_replace(LoopState::Stopped);
    }
}

/// Spawns the dispatch loop.
pub(crate) struct Dispatcher;

impl Dispatcher {
    pub(crate) fn spawn(shared: Arc<Shared>) {
        tokio::spawn(async move {
            Self::run(&shared).await;
            shared.teardown();
            shared.mark_stopped();
        });
    }

    async fn run(shared: &Shared) {
        info!("Dispatch loop started");
        let mut message_count = 0u64;
        let mut malformed = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => {
                    info!("Dispatch loop cancelled");
                    break;
                }
                next = shared.transport.next_message() => next,
            };

            let raw = match next {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!("Host closed the message stream");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Transport read failed, closing connection");
                    break;
                }
            };

            message_count += 1;
            let message = match decode_message(&raw) {
                Ok(message) => message,
                Err(e) => {
                    malformed += 1;
                    warn!(error = %e, bytes = raw.len(), "Skipping malformed host message");
                    continue;
                }
            };
            trace!(kind = message.kind(), count = message_count, "Host message received");

            if matches!(message, HostMessage::Quit) {
                info!("Host sent quit");
                break;
            }

            // delivery only waits under the Block policy; close must still win
            let handled = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => false,
                _ = Self::handle(shared, message) => true,
            };
            if !handled {
                info!("Dispatch loop cancelled during delivery");
                break;
            }
        }

        info!(messages = message_count, malformed, "Dispatch loop ended");
    }

    async fn handle(shared: &Shared, message: HostMessage) {
        match message {
            HostMessage::Null | HostMessage::Quit => {}
            HostMessage::Open(open) => {
                info!(
                    application = %open.application_name,
                    version = ?open.application_version,
                    sdk = ?open.sdk_version,
                    "Host connection opened"
                );
            }
            HostMessage::Exception(raw) => Self::route_exception(shared, raw).await,
            HostMessage::Event(event) => match shared.events.deliver(event).await {
                EventDelivery::Delivered => {}
                EventDelivery::Unclaimed => debug!("Event for unknown client event id dropped"),
                EventDelivery::ReceiverGone { event, name, kind: EventKind::System } => {
                    debug!(event = %event, name = %name, "Unsubscribing abandoned system event");
                    let origin = SendOrigin::Event { event, name };
                    if let Err(e) = shared.call(HostCall::UnsubscribeFromSystemEvent { event }, origin) {
                        warn!(event = %event, error = %e, "Failed to unsubscribe abandoned system event");
                    }
                }
                EventDelivery::ReceiverGone { .. } => {}
            },
            HostMessage::SimObjectData(data) | HostMessage::SimObjectDataByType(data) => {
                Self::route_data(shared, data).await
            }
            HostMessage::SystemState { request, state } => {
                shared.correlator.resolve(request, ReplyPayload::SystemState(&state)).await;
            }
            HostMessage::Unknown { id } => {
                debug!(id, "Ignoring unhandled host message");
            }
        }
    }

    async fn route_data(shared: &Shared, data: ObjectData) {
        let payload = ReplyPayload::Record {
            data: &data.data,
            object: data.object,
            entry_number: data.entry_number,
            out_of: data.out_of,
        };

        let resolution = shared.correlator.resolve(data.request, payload).await;
        if let Resolution::ReceiverGone {
            request,
            mode: RequestMode::Periodic,
            definition: Some(definition),
            filter: Some(filter),
        } = resolution
        {
            let object = filter.object_id().unwrap_or(data.object);
            if let Err(e) = shared.stop_periodic(request, definition, object) {
                warn!(request = %request, error = %e, "Failed to stop abandoned periodic request");
            }
        }
    }

    async fn route_exception(shared: &Shared, raw: RawException) {
        let origin = shared.history.lookup(raw.send_id);
        let exception = HostException {
            code: raw.code,
            send_id: raw.send_id,
            index: raw.index,
            origin: origin.clone(),
        };
        warn!(exception = %exception, "Host exception");

        match origin {
            Some(SendOrigin::Request(request)) => {
                let error = SimError::host_exception(exception.clone());
                if shared.correlator.fail(request, error).await {
                    return;
                }
            }
            Some(SendOrigin::DefinitionField { definition, .. }) => {
                shared.registry.invalidate(definition);
            }
            _ => {}
        }

        shared.publish_exception(exception);
    }
}
