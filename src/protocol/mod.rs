//! Decoding of raw host receive messages.
//!
//! [`decode_message`] classifies one raw message by its id and parses the
//! fixed part of its body. Record bytes inside data messages are left raw;
//! they are decoded later against the layout of the pending request that
//! asked for them.

mod format;

pub use format::{
    APPLICATION_NAME_WIDTH, HEADER_SIZE, MessageHeader, OBJECT_DATA_PREFIX, PATH_WIDTH, message_ids,
};

use format::BodyReader;

use crate::Result;
use crate::types::{
    ClientEventId, DefinitionId, ExceptionCode, ObjectId, RequestId, SendId, SimEvent, SystemState,
};

/// Body of a data reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectData {
    pub request: RequestId,
    pub object: ObjectId,
    pub definition: DefinitionId,
    pub flags: u32,
    /// 1-based index of this object among the reply's objects
    pub entry_number: u32,
    /// Total number of objects in the reply
    pub out_of: u32,
    pub define_count: u32,
    /// Raw record bytes
    pub data: Vec<u8>,
}

/// Host identification sent when the connection opens.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenInfo {
    pub application_name: String,
    pub application_version: [u32; 4],
    pub sdk_version: [u32; 4],
}

/// Exception as it arrives on the wire, before attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawException {
    pub code: ExceptionCode,
    pub send_id: SendId,
    pub index: u32,
}

/// One classified receive message.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Nothing to process
    Null,
    Open(OpenInfo),
    Quit,
    Exception(RawException),
    Event(SimEvent),
    SimObjectData(ObjectData),
    SimObjectDataByType(ObjectData),
    SystemState { request: RequestId, state: SystemState },
    /// A message id this client does not handle
    Unknown { id: u32 },
}

impl HostMessage {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            HostMessage::Null => "null",
            HostMessage::Open(_) => "open",
            HostMessage::Quit => "quit",
            HostMessage::Exception(_) => "exception",
            HostMessage::Event(_) => "event",
            HostMessage::SimObjectData(_) => "simobject_data",
            HostMessage::SimObjectDataByType(_) => "simobject_data_bytype",
            HostMessage::SystemState { .. } => "system_state",
            HostMessage::Unknown { .. } => "unknown",
        }
    }
}

/// Parse one raw receive message.
pub fn decode_message(message: &[u8]) -> Result<HostMessage> {
    let (header, body) = MessageHeader::split(message)?;

    let decoded = match header.id {
        message_ids::NULL => HostMessage::Null,
        message_ids::QUIT => HostMessage::Quit,
        message_ids::OPEN => HostMessage::Open(decode_open(body)?),
        message_ids::EXCEPTION => {
            let mut reader = BodyReader::new(body, "exception");
            HostMessage::Exception(RawException {
                code: ExceptionCode(reader.u32()?),
                send_id: SendId(reader.u32()?),
                index: reader.u32()?,
            })
        }
        message_ids::EVENT | message_ids::EVENT_FILENAME | message_ids::EVENT_FRAME => {
            HostMessage::Event(decode_event(header.id, body)?)
        }
        message_ids::SIMOBJECT_DATA => HostMessage::SimObjectData(decode_object_data(body)?),
        message_ids::SIMOBJECT_DATA_BYTYPE => {
            HostMessage::SimObjectDataByType(decode_object_data(body)?)
        }
        message_ids::SYSTEM_STATE => {
            let mut reader = BodyReader::new(body, "system state");
            let request = RequestId(reader.u32()?);
            let state = SystemState {
                integer: reader.u32()?,
                float: reader.f32()?,
                string: reader.text(PATH_WIDTH)?,
            };
            HostMessage::SystemState { request, state }
        }
        id => HostMessage::Unknown { id },
    };

    Ok(decoded)
}

fn decode_open(body: &[u8]) -> Result<OpenInfo> {
    let mut reader = BodyReader::new(body, "open");
    let application_name = reader.text(APPLICATION_NAME_WIDTH)?;
    let mut versions = [0u32; 8];
    for version in &mut versions {
        *version = reader.u32()?;
    }
    Ok(OpenInfo {
        application_name,
        application_version: [versions[0], versions[1], versions[2], versions[3]],
        sdk_version: [versions[4], versions[5], versions[6], versions[7]],
    })
}

fn decode_event(id: u32, body: &[u8]) -> Result<SimEvent> {
    let mut reader = BodyReader::new(body, "event");
    let group = reader.u32()?;
    let event = ClientEventId(reader.u32()?);
    let data = reader.u32()?;

    Ok(match id {
        message_ids::EVENT_FILENAME => SimEvent::Filename {
            event,
            group,
            file_name: reader.text(PATH_WIDTH)?,
            flags: reader.u32()?,
        },
        message_ids::EVENT_FRAME => {
            SimEvent::Frame { event, group, frame_rate: reader.f32()?, sim_speed: reader.f32()? }
        }
        _ => SimEvent::Event { event, group, data },
    })
}

fn decode_object_data(body: &[u8]) -> Result<ObjectData> {
    let mut reader = BodyReader::new(body, "object data");
    Ok(ObjectData {
        request: RequestId(reader.u32()?),
        object: ObjectId(reader.u32()?),
        definition: DefinitionId(reader.u32()?),
        flags: reader.u32()?,
        entry_number: reader.u32()?,
        out_of: reader.u32()?,
        define_count: reader.u32()?,
        data: reader.rest().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimError;
    use crate::test_utils::messages;

    #[test]
    fn decodes_data_reply_with_record_bytes() {
        let raw = messages::object_data(RequestId(5), ObjectId::USER, DefinitionId(2), &1000.0f64.to_le_bytes());

        match decode_message(&raw).unwrap() {
            HostMessage::SimObjectData(data) => {
                assert_eq!(data.request, RequestId(5));
                assert_eq!(data.definition, DefinitionId(2));
                assert_eq!(data.entry_number, 1);
                assert_eq!(data.out_of, 1);
                assert_eq!(data.data, 1000.0f64.to_le_bytes());
            }
            other => panic!("Expected SimObjectData, got {other:?}"),
        }
    }

    #[test]
    fn decodes_by_type_entries() {
        let raw = messages::object_data_by_type(RequestId(9), ObjectId(44), DefinitionId(1), 2, 3, &[0; 4]);
        match decode_message(&raw).unwrap() {
            HostMessage::SimObjectDataByType(data) => {
                assert_eq!((data.object, data.entry_number, data.out_of), (ObjectId(44), 2, 3));
            }
            other => panic!("Expected SimObjectDataByType, got {other:?}"),
        }
    }

    #[test]
    fn decodes_event_variants() {
        let plain = decode_message(&messages::event(ClientEventId(3), 7)).unwrap();
        assert_eq!(plain, HostMessage::Event(SimEvent::Event { event: ClientEventId(3), group: 0, data: 7 }));

        let file = decode_message(&messages::event_filename(ClientEventId(4), "flights/KSEA.FLT", 1)).unwrap();
        assert_eq!(
            file,
            HostMessage::Event(SimEvent::Filename {
                event: ClientEventId(4),
                group: 0,
                file_name: "flights/KSEA.FLT".to_string(),
                flags: 1,
            })
        );

        let frame = decode_message(&messages::event_frame(ClientEventId(5), 29.5, 1.0)).unwrap();
        assert!(matches!(
            frame,
            HostMessage::Event(SimEvent::Frame { frame_rate, sim_speed, .. })
                if frame_rate == 29.5 && sim_speed == 1.0
        ));
    }

    #[test]
    fn decodes_exceptions_and_system_state() {
        let exception = decode_message(&messages::exception(7, SendId(12), 1)).unwrap();
        assert_eq!(
            exception,
            HostMessage::Exception(RawException { code: ExceptionCode(7), send_id: SendId(12), index: 1 })
        );

        let state = decode_message(&messages::system_state(RequestId(3), 1, 0.5, "Aircraft.cfg")).unwrap();
        match state {
            HostMessage::SystemState { request, state } => {
                assert_eq!(request, RequestId(3));
                assert_eq!(state.integer, 1);
                assert_eq!(state.string, "Aircraft.cfg");
            }
            other => panic!("Expected SystemState, got {other:?}"),
        }
    }

    #[test]
    fn decodes_open_and_quit() {
        match decode_message(&messages::open("Flight Simulator")).unwrap() {
            HostMessage::Open(info) => assert_eq!(info.application_name, "Flight Simulator"),
            other => panic!("Expected Open, got {other:?}"),
        }
        assert_eq!(decode_message(&messages::quit()).unwrap(), HostMessage::Quit);
    }

    #[test]
    fn unknown_ids_are_classified_not_rejected() {
        let raw = messages::raw(42, &[1, 2, 3, 4]);
        assert_eq!(decode_message(&raw).unwrap(), HostMessage::Unknown { id: 42 });
    }

    #[test]
    fn malformed_messages_are_protocol_errors() {
        assert!(matches!(decode_message(&[1, 2, 3]), Err(SimError::Protocol { .. })));

        let mut oversized = messages::quit();
        oversized[0] = 200;
        assert!(matches!(decode_message(&oversized), Err(SimError::Protocol { .. })));

        let short_exception = messages::raw(message_ids::EXCEPTION, &[0; 4]);
        assert!(matches!(decode_message(&short_exception), Err(SimError::Protocol { .. })));
    }

    #[test]
    fn bytes_past_declared_size_are_ignored() {
        let mut raw = messages::event(ClientEventId(1), 2);
        raw.extend_from_slice(&[0xAA; 8]);
        assert!(matches!(decode_message(&raw).unwrap(), HostMessage::Event(_)));
    }
}
