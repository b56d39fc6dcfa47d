//! Connection to the host and the public request API.
//!
//! A [`Connection`] owns the definition registry, request correlator, event
//! table and the dispatch loop task for one host session. Every request method
//! returns as soon as the host call is issued, handing back a channel on which
//! the reply arrives once the dispatch loop sees it:
//!
//! - one-shot data and system-state requests return a [`Reply`]
//! - periodic and "all of type" requests return a [`DataSubscription`]
//! - event mappings and system-event subscriptions return an [`EventSubscription`]
//!
//! Host exceptions tied to a pending request fail that request's channel.
//! All others are published on [`Connection::exceptions`].
//!
//! # Example
//!
//! ```rust,no_run
//! use simlink::{Connection, ConnectionConfig, ObjectId, Period, define_data};
//! # use simlink::Transport;
//!
//! define_data! {
//!     #[derive(Debug)]
//!     pub struct Altitude {
//!         #[sim("PLANE ALTITUDE", "feet")]
//!         pub feet: f64,
//!     }
//! }
//!
//! # async fn run(transport: impl Transport) -> simlink::Result<()> {
//! let connection = Connection::open(transport, ConnectionConfig::new("altimeter")).await?;
//!
//! let now = connection.request_once::<Altitude>(ObjectId::USER).await?.recv().await?;
//! println!("altitude: {} ft", now.feet);
//!
//! let mut updates = connection.request_periodic::<Altitude>(ObjectId::USER, Period::Second).await?;
//! while let Some(update) = updates.recv().await {
//!     println!("altitude: {} ft", update?.feet);
//! }
//! # Ok(())
//! # }
//! ```

mod handles;

pub use handles::{DataSubscription, EventSubscription, Reply};

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::codec::{self, Record};
use crate::config::ConnectionConfig;
use crate::correlator::{Decoder, OnceSink, PendingRequest, ReplyPayload, RequestMode, StreamSink};
use crate::definition::{DataDefinition, Shape, describe};
use crate::dispatch::{Dispatcher, Shared};
use crate::events::EventKind;
use crate::mailbox::mailbox;
use crate::registry::Registration;
use crate::transport::{HostCall, Transport};
use crate::types::{
    ClientEventId, DefinitionId, HostException, LoopState, MAX_NAME_LEN, MAX_RADIUS_METERS,
    ObjectFilter, ObjectId, ObjectType, Period, RecordLayout, RequestId, SendOrigin, SystemState,
};
use crate::{Result, SimError};

/// Live session with the host.
///
/// Dropping the connection closes it: the dispatch loop stops and every open
/// reply and subscription channel ends.
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Start a session over `transport` and spawn its dispatch loop.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open<T: Transport>(transport: T, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        info!(client = %config.client_name, "Opening host connection");

        let shared = Arc::new(Shared::new(Arc::new(transport), config));
        Dispatcher::spawn(Arc::clone(&shared));
        Ok(Self { shared })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Register `D` with the host, or return its existing definition.
    pub async fn register<D: DataDefinition>(&self) -> Result<DefinitionId> {
        Ok(self.registration(D::layout()?).await?.definition)
    }

    /// Register an explicit shape, or return its existing definition.
    pub async fn register_shape(&self, shape: &Shape) -> Result<DefinitionId> {
        Ok(self.registration(describe(shape)?).await?.definition)
    }

    async fn registration(&self, layout: RecordLayout) -> Result<Registration> {
        self.shared.ensure_open()?;
        self.shared
            .registry
            .get_or_register(layout, self.shared.transport.as_ref(), &self.shared.history)
            .await
    }

    /// Register a pending entry and issue its host call.
    ///
    /// The entry exists before the call so a fast reply always finds it. A
    /// failed call takes the entry back out.
    fn issue(&self, pending: PendingRequest, call: HostCall) -> Result<()> {
        let request = pending.request_id;
        self.shared.correlator.register(pending)?;
        if let Err(e) = self.shared.call(call, SendOrigin::Request(request)) {
            self.shared.correlator.cancel(request);
            return Err(e);
        }
        Ok(())
    }

    /// Fetch the current value of `D` for one object.
    pub async fn request_once<D: DataDefinition>(&self, object: ObjectId) -> Result<Reply<D>> {
        let registration = self.registration(D::layout()?).await?;
        self.request_once_with(registration, object, definition_decoder::<D>)
    }

    /// Fetch one object's values for an explicit shape as a dynamic [`Record`].
    pub async fn request_record_once(&self, shape: &Shape, object: ObjectId) -> Result<Reply<Record>> {
        let registration = self.registration(describe(shape)?).await?;
        self.request_once_with(registration, object, record_decoder)
    }

    fn request_once_with<T: Send + 'static>(
        &self,
        registration: Registration,
        object: ObjectId,
        decoder: fn(Arc<RecordLayout>) -> Decoder<T>,
    ) -> Result<Reply<T>> {
        let Registration { definition, layout } = registration;
        let (sink, receiver) = OnceSink::new(decoder(layout));

        let request = self.shared.correlator.allocate();
        let pending = PendingRequest::new(request, RequestMode::OneShot, sink)
            .for_definition(definition, ObjectFilter::object(object));
        self.issue(
            pending,
            HostCall::RequestDataOnSimObject { request, definition, object, period: Period::Once },
        )?;

        debug!(request = %request, definition = %definition, object = %object, "One-shot request issued");
        Ok(Reply::new(request, receiver))
    }

    /// Receive `D` for one object every `period` until cancelled.
    ///
    /// `period` must repeat; use [`Connection::request_once`] for a single
    /// value.
    pub async fn request_periodic<D: DataDefinition>(
        &self,
        object: ObjectId,
        period: Period,
    ) -> Result<DataSubscription<D>> {
        if !period.is_repeating() {
            return Err(SimError::invalid_argument(format!(
                "periodic requests need a repeating period, got {period:?}"
            )));
        }

        let Registration { definition, layout } = self.registration(D::layout()?).await?;
        let (sender, inbox) = mailbox(self.shared.config.periodic_capacity, self.shared.config.overflow);
        let sink = StreamSink::new(sender, definition_decoder::<D>(layout));

        let request = self.shared.correlator.allocate();
        let pending = PendingRequest::new(request, RequestMode::Periodic, sink)
            .for_definition(definition, ObjectFilter::object(object));
        self.issue(pending, HostCall::RequestDataOnSimObject { request, definition, object, period })?;

        info!(request = %request, definition = %definition, ?period, "Periodic request started");
        Ok(DataSubscription::new(request, definition, inbox))
    }

    /// Receive `D` for every object of `object_type` within `radius_meters`
    /// of the user.
    ///
    /// The subscription yields one item per object and ends after the last.
    pub async fn request_by_type<D: DataDefinition>(
        &self,
        radius_meters: u32,
        object_type: ObjectType,
    ) -> Result<DataSubscription<D>> {
        if radius_meters > MAX_RADIUS_METERS {
            return Err(SimError::invalid_argument(format!(
                "radius {radius_meters} m exceeds the host limit of {MAX_RADIUS_METERS} m"
            )));
        }

        let Registration { definition, layout } = self.registration(D::layout()?).await?;
        let (sender, inbox) = mailbox(self.shared.config.periodic_capacity, self.shared.config.overflow);
        let sink = StreamSink::new(sender, definition_decoder::<D>(layout));

        let request = self.shared.correlator.allocate();
        let pending = PendingRequest::new(request, RequestMode::ByType, sink)
            .for_definition(definition, ObjectFilter::AllOfType { radius_meters, object_type });
        self.issue(
            pending,
            HostCall::RequestDataOnSimObjectType { request, definition, radius_meters, object_type },
        )?;

        debug!(request = %request, ?object_type, radius_meters, "By-type request issued");
        Ok(DataSubscription::new(request, definition, inbox))
    }

    /// Stop a periodic request and close its subscription.
    ///
    /// Returns `false` when the request is no longer pending.
    pub fn cancel_periodic(&self, request: RequestId) -> Result<bool> {
        self.shared.ensure_open()?;
        let Some(pending) = self.shared.correlator.cancel(request) else {
            return Ok(false);
        };

        if pending.mode == RequestMode::Periodic {
            let object = pending.filter.and_then(|filter| filter.object_id());
            if let (Some(definition), Some(object)) = (pending.definition, object) {
                self.shared.stop_periodic(request, definition, object)?;
            }
        }

        info!(request = %request, "Periodic request cancelled");
        Ok(true)
    }

    /// Write `value`'s tagged fields to one object.
    ///
    /// No reply is expected. A host rejection arrives on
    /// [`Connection::exceptions`].
    pub async fn set_data_on_object<D: DataDefinition>(&self, value: &D, object: ObjectId) -> Result<()> {
        let Registration { definition, layout } = self.registration(D::layout()?).await?;
        let mut record = Record::new(layout);
        value.to_record(&mut record)?;
        self.send_record(definition, &record, object)
    }

    /// Write a dynamic record to one object.
    pub async fn set_record_on_object(&self, record: &Record, object: ObjectId) -> Result<()> {
        let registration = self.registration(record.layout().as_ref().clone()).await?;
        self.send_record(registration.definition, record, object)
    }

    fn send_record(&self, definition: DefinitionId, record: &Record, object: ObjectId) -> Result<()> {
        let data = codec::encode(record)?;
        self.shared.call(
            HostCall::SetDataOnSimObject { definition, object, data },
            SendOrigin::SetData { definition, object },
        )
    }

    /// Map a new client event id to the named sim event.
    ///
    /// The returned subscription receives the event whenever the host raises
    /// it; [`EventSubscription::event_id`] is the id to transmit.
    pub fn map_client_event_to_sim_event(&self, name: &str) -> Result<EventSubscription> {
        self.bind_event(name, EventKind::Mapped, |event, name| HostCall::MapClientEventToSimEvent {
            event,
            name,
        })
    }

    /// Subscribe to a named host system event such as `"Pause"` or `"SimStart"`.
    pub fn subscribe_to_system_event(&self, name: &str) -> Result<EventSubscription> {
        self.bind_event(name, EventKind::System, |event, name| HostCall::SubscribeToSystemEvent {
            event,
            name,
        })
    }

    fn bind_event(
        &self,
        name: &str,
        kind: EventKind,
        call: impl FnOnce(ClientEventId, String) -> HostCall,
    ) -> Result<EventSubscription> {
        self.shared.ensure_open()?;
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(SimError::invalid_argument(format!(
                "event name must be 1 to {MAX_NAME_LEN} bytes, got {}",
                name.len()
            )));
        }

        let event = self.shared.events.allocate();
        let (sender, inbox) = mailbox(self.shared.config.event_capacity, self.shared.config.overflow);
        self.shared.events.insert(event, name, kind, sender)?;

        let origin = SendOrigin::Event { event, name: name.to_string() };
        if let Err(e) = self.shared.call(call(event, name.to_string()), origin) {
            self.shared.events.remove(event);
            return Err(e);
        }

        debug!(event = %event, name, ?kind, "Client event bound");
        Ok(EventSubscription::new(event, name.to_string(), inbox))
    }

    /// Raise a mapped client event on one object.
    pub fn transmit_client_event(&self, object: ObjectId, event: ClientEventId, data: u32) -> Result<()> {
        self.shared.ensure_open()?;
        let name = match self.shared.events.get(event) {
            Some((name, EventKind::Mapped)) => name,
            _ => {
                return Err(SimError::invalid_argument(format!(
                    "client event {event} is not mapped to a sim event"
                )));
            }
        };

        self.shared.call(
            HostCall::TransmitClientEvent { object, event, data },
            SendOrigin::Event { event, name },
        )
    }

    /// Release a client event id and end its subscription.
    ///
    /// Returns `false` when the id is unknown.
    pub fn unsubscribe_event(&self, event: ClientEventId) -> Result<bool> {
        self.shared.ensure_open()?;
        let Some((name, kind)) = self.shared.events.remove(event) else {
            return Ok(false);
        };

        if kind == EventKind::System {
            self.shared
                .call(HostCall::UnsubscribeFromSystemEvent { event }, SendOrigin::Event { event, name })?;
        }
        Ok(true)
    }

    /// Query a named host system state such as `"AircraftLoaded"` or `"Sim"`.
    pub fn request_system_state(&self, name: &str) -> Result<Reply<SystemState>> {
        self.shared.ensure_open()?;
        if name.is_empty() {
            return Err(SimError::invalid_argument("system state name is empty"));
        }

        let decode: Decoder<SystemState> = Arc::new(|payload: ReplyPayload<'_>| match payload {
            ReplyPayload::SystemState(state) => Ok(state.clone()),
            ReplyPayload::Record { .. } => Err(SimError::protocol("data reply to a system state request")),
        });
        let (sink, receiver) = OnceSink::new(decode);

        let request = self.shared.correlator.allocate();
        self.issue(
            PendingRequest::new(request, RequestMode::OneShot, sink),
            HostCall::RequestSystemState { request, name: name.to_string() },
        )?;
        Ok(Reply::new(request, receiver))
    }

    /// Host exceptions not claimed by a pending request.
    ///
    /// Only exceptions raised after this call are seen. The stream ends when
    /// the connection closes.
    pub fn exceptions(&self) -> impl Stream<Item = HostException> + Send + 'static {
        futures::stream::iter(self.shared.subscribe_exceptions())
            .flat_map(BroadcastStream::new)
            .filter_map(|item| async move {
                match item {
                    Ok(exception) => Some(exception),
                    Err(e) => {
                        warn!(error = %e, "Exception listener fell behind");
                        None
                    }
                }
            })
    }

    /// Number of requests waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.pending_count()
    }

    pub fn state(&self) -> LoopState {
        self.shared.loop_state()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Wait until the dispatch loop has stopped.
    pub async fn wait_stopped(&self) {
        let mut state = self.shared.watch_state();
        // a dropped sender means the loop is gone as well
        let _ = state.wait_for(|state| *state == LoopState::Stopped).await;
    }

    /// Close the connection and wait for the dispatch loop to stop.
    ///
    /// Every open reply and subscription channel ends. Later calls fail with
    /// [`SimError::ConnectionClosed`]. Closing twice is a no-op.
    pub async fn close(&self) {
        self.shared.teardown();
        self.wait_stopped().await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

fn definition_decoder<D: DataDefinition>(layout: Arc<RecordLayout>) -> Decoder<D> {
    Arc::new(move |payload: ReplyPayload<'_>| match payload {
        ReplyPayload::Record { data, .. } => D::from_record(&codec::decode(data, Arc::clone(&layout))?),
        ReplyPayload::SystemState(_) => Err(SimError::protocol("system state reply to a data request")),
    })
}

fn record_decoder(layout: Arc<RecordLayout>) -> Decoder<Record> {
    Arc::new(move |payload: ReplyPayload<'_>| match payload {
        ReplyPayload::Record { data, .. } => codec::decode(data, Arc::clone(&layout)),
        ReplyPayload::SystemState(_) => Err(SimError::protocol("system state reply to a data request")),
    })
}
