//! Host transport seam.
//!
//! The transport is the external collaborator that owns the host handle. The
//! rest of the crate only issues [`HostCall`]s and pulls raw receive messages;
//! opening the handle and the host's binary call interface stay behind this
//! trait.
//!
//! Two ways to provide a transport:
//! - implement [`Transport`] directly for an async-native host binding
//! - wrap a blocking host SDK in [`BlockingTransport`], which serialises calls
//!   behind a lock and runs the blocking receive on tokio's blocking pool

mod blocking;

pub use blocking::{BlockingTransport, HostApi, MessageSource};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{
    ClientEventId, DefinitionId, ObjectId, ObjectType, Period, PrimitiveKind, RequestId, SendId,
};

/// One outgoing call to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum HostCall {
    AddToDataDefinition {
        definition: DefinitionId,
        variable: String,
        unit: String,
        kind: PrimitiveKind,
    },
    ClearDataDefinition {
        definition: DefinitionId,
    },
    RequestDataOnSimObject {
        request: RequestId,
        definition: DefinitionId,
        object: ObjectId,
        period: Period,
    },
    RequestDataOnSimObjectType {
        request: RequestId,
        definition: DefinitionId,
        radius_meters: u32,
        object_type: ObjectType,
    },
    SetDataOnSimObject {
        definition: DefinitionId,
        object: ObjectId,
        data: Vec<u8>,
    },
    MapClientEventToSimEvent {
        event: ClientEventId,
        name: String,
    },
    TransmitClientEvent {
        object: ObjectId,
        event: ClientEventId,
        data: u32,
    },
    SubscribeToSystemEvent {
        event: ClientEventId,
        name: String,
    },
    UnsubscribeFromSystemEvent {
        event: ClientEventId,
    },
    RequestSystemState {
        request: RequestId,
        name: String,
    },
}

impl HostCall {
    /// Host function name, used in logs and errors.
    pub fn operation(&self) -> &'static str {
        match self {
            HostCall::AddToDataDefinition { .. } => "AddToDataDefinition",
            HostCall::ClearDataDefinition { .. } => "ClearDataDefinition",
            HostCall::RequestDataOnSimObject { .. } => "RequestDataOnSimObject",
            HostCall::RequestDataOnSimObjectType { .. } => "RequestDataOnSimObjectType",
            HostCall::SetDataOnSimObject { .. } => "SetDataOnSimObject",
            HostCall::MapClientEventToSimEvent { .. } => "MapClientEventToSimEvent",
            HostCall::TransmitClientEvent { .. } => "TransmitClientEvent",
            HostCall::SubscribeToSystemEvent { .. } => "SubscribeToSystemEvent",
            HostCall::UnsubscribeFromSystemEvent { .. } => "UnsubscribeFromSystemEvent",
            HostCall::RequestSystemState { .. } => "RequestSystemState",
        }
    }
}

/// Connection to a running host.
///
/// Implementations must be safe to call from caller tasks while the dispatch
/// loop is waiting in [`Transport::next_message`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Issue one host call.
    ///
    /// Returns the send id the host assigned to the call; host exceptions
    /// caused by the call reference it.
    fn call(&self, call: HostCall) -> Result<SendId>;

    /// Wait for the next raw receive message.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - one message, header included
    /// - `Ok(None)` - the host closed the channel (normal termination)
    /// - `Err(e)` - read failure, fatal to the connection
    async fn next_message(&self) -> Result<Option<Vec<u8>>>;

    /// Release the host handle. Called once during teardown.
    fn close(&self) -> Result<()>;
}
