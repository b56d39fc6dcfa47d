//! Scripted host and raw message builders for tests and benchmarks
//!
//! [`ScriptedHost`] is an in-memory [`Transport`]: it records every call,
//! hands out sequential send ids and replays whatever messages the test
//! pushes. The [`messages`] module builds raw receive messages in the host's
//! wire format.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use crate::transport::{HostCall, Transport};
use crate::types::SendId;
use crate::{Result, SimError};

type Incoming = Result<Option<Vec<u8>>>;

struct Inner {
    calls: Mutex<Vec<HostCall>>,
    failures: Mutex<HashMap<&'static str, usize>>,
    next_send_id: AtomicU32,
    closed: AtomicBool,
    outgoing: mpsc::UnboundedSender<Incoming>,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>,
}

/// In-memory host driven by the test.
///
/// Clones share state, so a test keeps one clone to push messages and inspect
/// calls after handing another to a connection.
#[derive(Clone)]
pub struct ScriptedHost {
    inner: Arc<Inner>,
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHost {
    pub fn new() -> Self {
        let (outgoing, incoming) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(HashMap::new()),
                next_send_id: AtomicU32::new(1),
                closed: AtomicBool::new(false),
                outgoing,
                incoming: tokio::sync::Mutex::new(incoming),
            }),
        }
    }

    /// Queue a raw receive message.
    pub fn push(&self, message: Vec<u8>) {
        let _ = self.inner.outgoing.send(Ok(Some(message)));
    }

    /// Queue a read failure.
    pub fn push_error(&self, error: SimError) {
        let _ = self.inner.outgoing.send(Err(error));
    }

    /// Queue the end of the message stream.
    pub fn finish(&self) {
        let _ = self.inner.outgoing.send(Ok(None));
    }

    /// Make the next call of the named host operation fail.
    pub fn fail_next(&self, operation: &'static str) {
        let mut failures = self.inner.failures.lock().unwrap_or_else(PoisonError::into_inner);
        *failures.entry(operation).or_default() += 1;
    }

    /// Every call issued so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.inner.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Calls of one host operation.
    pub fn calls_named(&self, operation: &str) -> Vec<HostCall> {
        self.calls().into_iter().filter(|call| call.operation() == operation).collect()
    }

    pub fn clear_calls(&self) {
        self.inner.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Send id the next call will receive.
    pub fn next_send_id(&self) -> SendId {
        SendId(self.inner.next_send_id.load(Ordering::SeqCst))
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedHost {
    fn call(&self, call: HostCall) -> Result<SendId> {
        {
            let mut failures = self.inner.failures.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(remaining) = failures.get_mut(call.operation()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(SimError::transport(call.operation()));
                }
            }
        }

        let send_id = SendId(self.inner.next_send_id.fetch_add(1, Ordering::SeqCst));
        self.inner.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
        Ok(send_id)
    }

    async fn next_message(&self) -> Result<Option<Vec<u8>>> {
        let mut incoming = self.inner.incoming.lock().await;
        incoming.recv().await.unwrap_or(Ok(None))
    }

    fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Builders for raw receive messages.
pub mod messages {
    use crate::protocol::{APPLICATION_NAME_WIDTH, HEADER_SIZE, PATH_WIDTH, message_ids};
    use crate::types::{ClientEventId, DefinitionId, ObjectId, RequestId, SendId};

    /// Protocol version written into every header.
    pub const VERSION: u32 = 4;

    /// Wrap a body in a message header.
    pub fn raw(id: u32, body: &[u8]) -> Vec<u8> {
        let mut message = Vec::with_capacity(HEADER_SIZE + body.len());
        message.extend_from_slice(&((HEADER_SIZE + body.len()) as u32).to_le_bytes());
        message.extend_from_slice(&VERSION.to_le_bytes());
        message.extend_from_slice(&id.to_le_bytes());
        message.extend_from_slice(body);
        message
    }

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn padded(text: &str, width: usize) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(width, 0);
        bytes
    }

    fn data_body(
        request: RequestId,
        object: ObjectId,
        definition: DefinitionId,
        entry_number: u32,
        out_of: u32,
        data: &[u8],
    ) -> Vec<u8> {
        let mut body = words(&[
            request.value(),
            object.value(),
            definition.value(),
            0,
            entry_number,
            out_of,
            1,
        ]);
        body.extend_from_slice(data);
        body
    }

    /// Single-object data reply.
    pub fn object_data(request: RequestId, object: ObjectId, definition: DefinitionId, data: &[u8]) -> Vec<u8> {
        raw(message_ids::SIMOBJECT_DATA, &data_body(request, object, definition, 1, 1, data))
    }

    /// One entry of an "all of type" data reply.
    pub fn object_data_by_type(
        request: RequestId,
        object: ObjectId,
        definition: DefinitionId,
        entry_number: u32,
        out_of: u32,
        data: &[u8],
    ) -> Vec<u8> {
        raw(
            message_ids::SIMOBJECT_DATA_BYTYPE,
            &data_body(request, object, definition, entry_number, out_of, data),
        )
    }

    pub fn event(event: ClientEventId, data: u32) -> Vec<u8> {
        raw(message_ids::EVENT, &words(&[0, event.value(), data]))
    }

    pub fn event_filename(event: ClientEventId, file_name: &str, flags: u32) -> Vec<u8> {
        let mut body = words(&[0, event.value(), 0]);
        body.extend(padded(file_name, PATH_WIDTH));
        body.extend_from_slice(&flags.to_le_bytes());
        raw(message_ids::EVENT_FILENAME, &body)
    }

    pub fn event_frame(event: ClientEventId, frame_rate: f32, sim_speed: f32) -> Vec<u8> {
        let mut body = words(&[0, event.value(), 0]);
        body.extend_from_slice(&frame_rate.to_le_bytes());
        body.extend_from_slice(&sim_speed.to_le_bytes());
        raw(message_ids::EVENT_FRAME, &body)
    }

    pub fn exception(code: u32, send_id: SendId, index: u32) -> Vec<u8> {
        raw(message_ids::EXCEPTION, &words(&[code, send_id.value(), index]))
    }

    pub fn system_state(request: RequestId, integer: u32, float: f32, string: &str) -> Vec<u8> {
        let mut body = words(&[request.value(), integer]);
        body.extend_from_slice(&float.to_le_bytes());
        body.extend(padded(string, PATH_WIDTH));
        raw(message_ids::SYSTEM_STATE, &body)
    }

    pub fn open(application_name: &str) -> Vec<u8> {
        let mut body = padded(application_name, APPLICATION_NAME_WIDTH);
        body.extend(words(&[11, 0, 62651, 3, 12, 0, 0, 0]));
        raw(message_ids::OPEN, &body)
    }

    pub fn quit() -> Vec<u8> {
        raw(message_ids::QUIT, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientEventId, ObjectId};

    #[tokio::test]
    async fn records_calls_and_replays_messages() {
        let host = ScriptedHost::new();
        let transport = host.clone();

        let call = HostCall::TransmitClientEvent { object: ObjectId::USER, event: ClientEventId(1), data: 3 };
        assert_eq!(transport.call(call.clone()).unwrap(), SendId(1));
        assert_eq!(host.calls(), vec![call]);

        host.push(messages::quit());
        host.finish();
        assert_eq!(transport.next_message().await.unwrap(), Some(messages::quit()));
        assert_eq!(transport.next_message().await.unwrap(), None);
    }

    #[test]
    fn injected_failures_are_consumed_once() {
        let host = ScriptedHost::new();
        host.fail_next("ClearDataDefinition");

        let call = HostCall::ClearDataDefinition { definition: crate::types::DefinitionId(1) };
        assert!(host.call(call.clone()).is_err());
        assert!(host.call(call).is_ok());
        assert_eq!(host.calls_named("ClearDataDefinition").len(), 1);
    }
}
