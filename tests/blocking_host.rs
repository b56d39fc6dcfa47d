//! End-to-end test through the public API over a blocking host SDK
//!
//! The fake SDK answers every data request with a canned record on a
//! standard-library channel, the way a real SDK's blocking receive would.

use anyhow::{Context, Result};
use simlink::{
    BlockingTransport, ConnectionConfig, HostApi, HostCall, MessageSource, ObjectId, Period, SendId,
    SimLink, define_data,
};
use std::sync::mpsc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

define_data! {
    #[derive(Debug, Clone, PartialEq)]
    struct Autopilot {
        #[sim("AUTOPILOT ALTITUDE LOCK VAR", "feet")]
        target_altitude: f64,
        #[sim("AUTOPILOT MASTER", "bool")]
        engaged: bool,
    }
}

fn record(target_altitude: f64, engaged: bool) -> Vec<u8> {
    let mut data = target_altitude.to_le_bytes().to_vec();
    data.extend_from_slice(&i32::from(engaged).to_le_bytes());
    data
}

fn data_message(request: u32, definition: u32, entry: u32, data: &[u8]) -> Vec<u8> {
    let mut body: Vec<u8> = [request, 0, definition, 0, entry, 1, 1]
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect();
    body.extend_from_slice(data);

    let mut message = Vec::new();
    message.extend_from_slice(&(12 + body.len() as u32).to_le_bytes());
    message.extend_from_slice(&4u32.to_le_bytes());
    message.extend_from_slice(&8u32.to_le_bytes());
    message.extend(body);
    message
}

/// Answers requests by queueing replies for the receive side.
struct FakeSdk {
    replies: mpsc::Sender<Option<Vec<u8>>>,
    next_send_id: u32,
}

impl HostApi for FakeSdk {
    fn call(&mut self, call: &HostCall) -> simlink::Result<SendId> {
        if let HostCall::RequestDataOnSimObject { request, definition, period, .. } = call {
            let count = match period {
                Period::Never => 0,
                Period::Once => 1,
                _ => 3,
            };
            for step in 0..count {
                let message = data_message(
                    request.value(),
                    definition.value(),
                    1,
                    &record(1000.0 * f64::from(step + 1), step % 2 == 0),
                );
                let _ = self.replies.send(Some(message));
            }
        }
        self.next_send_id += 1;
        Ok(SendId(self.next_send_id))
    }

    fn close(&mut self) -> simlink::Result<()> {
        let _ = self.replies.send(None);
        Ok(())
    }
}

struct FakeReceiver(mpsc::Receiver<Option<Vec<u8>>>);

impl MessageSource for FakeReceiver {
    fn get_next_message(&mut self) -> simlink::Result<Option<Vec<u8>>> {
        Ok(self.0.recv().unwrap_or(None))
    }
}

fn fake_transport() -> BlockingTransport<FakeSdk, FakeReceiver> {
    let (replies, incoming) = mpsc::channel();
    BlockingTransport::new(FakeSdk { replies, next_send_id: 0 }, FakeReceiver(incoming))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_shot_request_over_blocking_sdk() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let connection = SimLink::connect(fake_transport()).await?;

    let reply = connection.request_once::<Autopilot>(ObjectId::USER).await?;
    let autopilot = tokio::time::timeout(WAIT, reply.recv()).await.context("reply timed out")??;

    assert_eq!(autopilot, Autopilot { target_altitude: 1000.0, engaged: true });
    connection.close().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periodic_request_over_blocking_sdk() -> Result<()> {
    let config = ConnectionConfig::new("autopilot-panel");
    let connection = SimLink::connect_with(fake_transport(), config).await?;

    let mut updates = connection.request_periodic::<Autopilot>(ObjectId::USER, Period::SimFrame).await?;
    let mut altitudes = Vec::new();
    for _ in 0..3 {
        let update = tokio::time::timeout(WAIT, updates.recv())
            .await
            .context("update timed out")?
            .context("subscription ended early")??;
        altitudes.push(update.target_altitude);
    }
    assert_eq!(altitudes, vec![1000.0, 2000.0, 3000.0]);

    assert!(connection.cancel_periodic(updates.request_id())?);
    assert!(updates.recv().await.is_none());

    connection.close().await;
    assert!(connection.is_closed());
    Ok(())
}
