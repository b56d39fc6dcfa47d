//! Adapter for blocking host SDKs

use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

use super::{HostCall, Transport};
use crate::types::SendId;
use crate::{Result, SimError};

/// Synchronous call side of a host SDK.
pub trait HostApi: Send + 'static {
    /// Issue one call and return the host's send id.
    fn call(&mut self, call: &HostCall) -> Result<SendId>;

    /// Release the host handle.
    fn close(&mut self) -> Result<()>;
}

/// Blocking receive side of a host SDK.
pub trait MessageSource: Send + 'static {
    /// Block until the next raw message arrives.
    ///
    /// `Ok(None)` means the host closed the channel.
    fn get_next_message(&mut self) -> Result<Option<Vec<u8>>>;
}

/// [`Transport`] over a blocking host SDK.
///
/// Calls are serialised by a mutex because host SDK handles are not
/// reentrant. The receive side has its own lock so a blocked receive never
/// holds up outgoing calls.
pub struct BlockingTransport<H, S> {
    api: Mutex<H>,
    source: Arc<Mutex<S>>,
}

impl<H: HostApi, S: MessageSource> BlockingTransport<H, S> {
    pub fn new(api: H, source: S) -> Self {
        Self { api: Mutex::new(api), source: Arc::new(Mutex::new(source)) }
    }
}

#[async_trait::async_trait]
impl<H: HostApi, S: MessageSource> Transport for BlockingTransport<H, S> {
    fn call(&self, call: HostCall) -> Result<SendId> {
        let mut api = self.api.lock().unwrap_or_else(PoisonError::into_inner);
        api.call(&call)
    }

    async fn next_message(&self) -> Result<Option<Vec<u8>>> {
        let source = Arc::clone(&self.source);

        // the SDK receive blocks the calling thread, keep it off the runtime workers
        tokio::task::spawn_blocking(move || {
            let mut source = source.lock().unwrap_or_else(PoisonError::into_inner);
            let message = source.get_next_message();
            trace!(received = matches!(message, Ok(Some(_))), "Blocking receive returned");
            message
        })
        .await
        .map_err(|e| SimError::TransportReadFailure {
            reason: format!("Receive task panicked: {}", e),
            source: Some(Box::new(e)),
        })?
    }

    fn close(&self) -> Result<()> {
        self.api.lock().unwrap_or_else(PoisonError::into_inner).close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientEventId, ObjectId};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct RecordingApi {
        calls: Arc<Mutex<Vec<HostCall>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl HostApi for RecordingApi {
        fn call(&mut self, call: &HostCall) -> Result<SendId> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.clone());
            Ok(SendId(calls.len() as u32))
        }

        fn close(&mut self) -> Result<()> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    struct QueuedSource(VecDeque<Result<Option<Vec<u8>>>>);

    impl MessageSource for QueuedSource {
        fn get_next_message(&mut self) -> Result<Option<Vec<u8>>> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    #[tokio::test]
    async fn calls_are_forwarded_with_send_ids() {
        let api = RecordingApi::default();
        let calls = Arc::clone(&api.calls);
        let closed = Arc::clone(&api.closed);
        let transport = BlockingTransport::new(api, QueuedSource(VecDeque::new()));

        let first = transport
            .call(HostCall::TransmitClientEvent { object: ObjectId::USER, event: ClientEventId(1), data: 0 })
            .unwrap();
        let second = transport.call(HostCall::UnsubscribeFromSystemEvent { event: ClientEventId(1) }).unwrap();

        assert_eq!((first, second), (SendId(1), SendId(2)));
        assert_eq!(calls.lock().unwrap().len(), 2);

        transport.close().unwrap();
        assert!(*closed.lock().unwrap());
    }

    #[tokio::test]
    async fn receive_runs_off_the_runtime() {
        let source = QueuedSource(VecDeque::from([
            Ok(Some(vec![1, 2, 3])),
            Err(SimError::transport_read_failure("pipe closed")),
        ]));
        let transport = BlockingTransport::new(RecordingApi::default(), source);

        assert_eq!(transport.next_message().await.unwrap(), Some(vec![1, 2, 3]));
        assert!(matches!(
            transport.next_message().await,
            Err(SimError::TransportReadFailure { .. })
        ));
        assert_eq!(transport.next_message().await.unwrap(), None);
    }
}
