//! Typed, asynchronous client for flight-simulator IPC hosts.
//!
//! simlink sits between application code and a host that exposes
//! simulation variables through registered binary record layouts
//! ("data definitions") and answers requests asynchronously on a single
//! receive stream.
//!
//! # Features
//!
//! - **Typed records**: declare a struct with [`define_data!`] and receive it
//!   decoded, with no reflection and no manual byte handling
//! - **Registration caching**: each distinct layout is registered with the
//!   host once per connection
//! - **Request correlation**: one-shot, periodic and "all of type" requests
//!   each get their own channel, fed by a single dispatch loop
//! - **Bounded delivery**: slow subscribers never stall the loop; overflow is
//!   handled by an explicit [`OverflowPolicy`]
//! - **Exception attribution**: host exceptions fail the request that caused
//!   them, or are published with whatever origin is known
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use simlink::{ObjectId, Period, SimLink, Transport, define_data};
//!
//! define_data! {
//!     #[derive(Debug)]
//!     pub struct Flight {
//!         #[sim("PLANE ALTITUDE", "feet")]
//!         pub altitude: f64,
//!         #[sim("AIRSPEED INDICATED", "knots")]
//!         pub airspeed: f64,
//!         #[sim("TITLE")]
//!         pub title: String,
//!     }
//! }
//!
//! async fn watch(transport: impl Transport) -> simlink::Result<()> {
//!     let connection = SimLink::connect(transport).await?;
//!
//!     let mut flight = connection.request_periodic::<Flight>(ObjectId::USER, Period::Second).await?;
//!     while let Some(update) = flight.recv().await {
//!         let update = update?;
//!         println!("{}: {:.0} ft at {:.0} kt", update.title, update.altitude, update.airspeed);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Records and their host registration
pub mod codec;
pub mod definition;
pub mod registry;

// Request plumbing
pub mod config;
pub mod correlator;
pub mod events;
pub mod mailbox;

// Host boundary
pub mod protocol;
pub mod transport;

// Runtime
pub mod connection;
mod dispatch;

// Core exports
pub use error::*;
pub use types::*;

pub use codec::Record;
pub use config::{ConnectionConfig, OverflowPolicy};
pub use definition::{DataDefinition, Shape, ShapeBuilder};
pub use transport::{BlockingTransport, HostApi, HostCall, MessageSource, Transport};

// Main API exports
pub use connection::{Connection, DataSubscription, EventSubscription, Reply};

/// Unified entry point for host connections.
///
/// # Examples
///
/// ```rust,no_run
/// use simlink::{ConnectionConfig, OverflowPolicy, SimLink, Transport};
///
/// # async fn run(transport: impl Transport) -> simlink::Result<()> {
/// let config = ConnectionConfig::new("moving-map").with_overflow(OverflowPolicy::DropOldest);
/// let connection = SimLink::connect_with(transport, config).await?;
/// # Ok(())
/// # }
/// ```
pub struct SimLink;

impl SimLink {
    /// Open a connection with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid. Host failures surface
    /// later, on the channels of the requests they affect.
    pub async fn connect<T: Transport>(transport: T) -> Result<Connection> {
        Connection::open(transport, ConnectionConfig::default()).await
    }

    /// Open a connection with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Parse`] if `config` fails validation.
    pub async fn connect_with<T: Transport>(transport: T, config: ConnectionConfig) -> Result<Connection> {
        Connection::open(transport, config).await
    }
}
