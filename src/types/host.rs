//! Host notifications: exceptions, events, system state

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ClientEventId, DefinitionId, ObjectId, RequestId, SendId};

/// Host exception codes (low values of the host's exception enumeration).
pub mod exception_codes {
    pub const NONE: u32 = 0;
    pub const ERROR: u32 = 1;
    pub const SIZE_MISMATCH: u32 = 2;
    pub const UNRECOGNIZED_ID: u32 = 3;
    pub const UNOPENED: u32 = 4;
    pub const VERSION_MISMATCH: u32 = 5;
    pub const TOO_MANY_GROUPS: u32 = 6;
    pub const NAME_UNRECOGNIZED: u32 = 7;
    pub const TOO_MANY_EVENT_NAMES: u32 = 8;
    pub const EVENT_ID_DUPLICATE: u32 = 9;
    pub const TOO_MANY_MAPS: u32 = 10;
    pub const TOO_MANY_OBJECTS: u32 = 11;
    pub const TOO_MANY_REQUESTS: u32 = 12;
    pub const INVALID_DATA_TYPE: u32 = 18;
    pub const INVALID_DATA_SIZE: u32 = 19;
    pub const DATA_ERROR: u32 = 20;
    pub const INVALID_ARRAY: u32 = 21;
    pub const OPERATION_INVALID_FOR_OBJECT_TYPE: u32 = 24;
    pub const ILLEGAL_OPERATION: u32 = 25;
    pub const ALREADY_SUBSCRIBED: u32 = 26;
    pub const INVALID_ENUM: u32 = 27;
    pub const DEFINITION_ERROR: u32 = 28;
    pub const DUPLICATE_ID: u32 = 29;
    pub const DATUM_ID: u32 = 30;
    pub const OUT_OF_BOUNDS: u32 = 31;
}

/// Exception code reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(transparent)]
pub struct ExceptionCode(pub u32);

impl ExceptionCode {
    /// Symbolic name for known codes.
    pub fn name(self) -> &'static str {
        use exception_codes::*;
        match self.0 {
            NONE => "NONE",
            ERROR => "ERROR",
            SIZE_MISMATCH => "SIZE_MISMATCH",
            UNRECOGNIZED_ID => "UNRECOGNIZED_ID",
            UNOPENED => "UNOPENED",
            VERSION_MISMATCH => "VERSION_MISMATCH",
            TOO_MANY_GROUPS => "TOO_MANY_GROUPS",
            NAME_UNRECOGNIZED => "NAME_UNRECOGNIZED",
            TOO_MANY_EVENT_NAMES => "TOO_MANY_EVENT_NAMES",
            EVENT_ID_DUPLICATE => "EVENT_ID_DUPLICATE",
            TOO_MANY_MAPS => "TOO_MANY_MAPS",
            TOO_MANY_OBJECTS => "TOO_MANY_OBJECTS",
            TOO_MANY_REQUESTS => "TOO_MANY_REQUESTS",
            INVALID_DATA_TYPE => "INVALID_DATA_TYPE",
            INVALID_DATA_SIZE => "INVALID_DATA_SIZE",
            DATA_ERROR => "DATA_ERROR",
            INVALID_ARRAY => "INVALID_ARRAY",
            OPERATION_INVALID_FOR_OBJECT_TYPE => "OPERATION_INVALID_FOR_OBJECT_TYPE",
            ILLEGAL_OPERATION => "ILLEGAL_OPERATION",
            ALREADY_SUBSCRIBED => "ALREADY_SUBSCRIBED",
            INVALID_ENUM => "INVALID_ENUM",
            DEFINITION_ERROR => "DEFINITION_ERROR",
            DUPLICATE_ID => "DUPLICATE_ID",
            DATUM_ID => "DATUM_ID",
            OUT_OF_BOUNDS => "OUT_OF_BOUNDS",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// The outgoing call a send id belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SendOrigin {
    /// A data or system-state request
    Request(RequestId),
    /// One "add to definition" call
    DefinitionField { definition: DefinitionId, variable: String },
    /// A set-data call
    SetData { definition: DefinitionId, object: ObjectId },
    /// An event map, transmit or subscribe call
    Event { event: ClientEventId, name: String },
}

/// Runtime exception reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct HostException {
    pub code: ExceptionCode,
    /// Send id of the call that caused the exception
    pub send_id: SendId,
    /// Index of the offending parameter, when the host reports one
    pub index: u32,
    /// Originating call, if it is still in the send history
    pub origin: Option<SendOrigin>,
}

impl fmt::Display for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for send {} (parameter {})", self.code, self.send_id, self.index)?;
        match &self.origin {
            Some(SendOrigin::Request(request)) => write!(f, " from request {request}"),
            Some(SendOrigin::DefinitionField { definition, variable }) => {
                write!(f, " from definition {definition} field '{variable}'")
            }
            Some(SendOrigin::SetData { definition, object }) => {
                write!(f, " from set-data of definition {definition} on object {object}")
            }
            Some(SendOrigin::Event { event, name }) => write!(f, " from event {event} '{name}'"),
            None => Ok(()),
        }
    }
}

/// Event delivered to an event subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SimEvent {
    /// Plain event carrying one data word
    Event { event: ClientEventId, group: u32, data: u32 },
    /// Event naming a file (flight loaded, aircraft loaded, ...)
    Filename { event: ClientEventId, group: u32, file_name: String, flags: u32 },
    /// Per-frame event carrying frame rate and simulation speed
    Frame { event: ClientEventId, group: u32, frame_rate: f32, sim_speed: f32 },
}

impl SimEvent {
    /// Client event id this notification was raised for.
    pub fn event_id(&self) -> ClientEventId {
        match self {
            SimEvent::Event { event, .. }
            | SimEvent::Filename { event, .. }
            | SimEvent::Frame { event, .. } => *event,
        }
    }
}

/// Reply to a system-state query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SystemState {
    pub integer: u32,
    pub float: f32,
    pub string: String,
}

/// Lifecycle of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_display_names_origin() {
        let exception = HostException {
            code: ExceptionCode(exception_codes::NAME_UNRECOGNIZED),
            send_id: SendId(12),
            index: 2,
            origin: Some(SendOrigin::DefinitionField {
                definition: DefinitionId(4),
                variable: "PLANE ALTITUDE".to_string(),
            }),
        };

        let text = exception.to_string();
        assert!(text.contains("NAME_UNRECOGNIZED"));
        assert!(text.contains("PLANE ALTITUDE"));
        assert!(text.contains("12"));
    }

    #[test]
    fn unknown_codes_are_named_unknown() {
        assert_eq!(ExceptionCode(999).name(), "UNKNOWN");
        assert_eq!(ExceptionCode(exception_codes::DUPLICATE_ID).name(), "DUPLICATE_ID");
    }

    #[test]
    fn event_id_is_exposed_for_every_variant() {
        let frame = SimEvent::Frame {
            event: ClientEventId(5),
            group: 0,
            frame_rate: 30.0,
            sim_speed: 1.0,
        };
        assert_eq!(frame.event_id(), ClientEventId(5));
    }
}
