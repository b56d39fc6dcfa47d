//! Core types shared by the definition, codec and dispatch layers.
//!
//! ## Architecture
//!
//! The type system maps directly to the host's data-definition protocol:
//! - [`PrimitiveKind`] is the host data type a field is registered as, with its byte width
//! - [`FieldDescriptor`] and [`RecordLayout`] describe one registered binary record
//! - [`FieldValue`] converts between Rust field types and record [`Value`]s
//! - [`DefinitionId`], [`RequestId`], [`ClientEventId`], [`ObjectId`] and [`SendId`]
//!   are opaque handles exchanged with the host
//! - [`HostException`], [`SimEvent`] and [`SystemState`] model unsolicited host notifications
//!
//! ## Usage Example
//!
//! ```rust
//! use simlink::types::{FieldDescriptor, PrimitiveKind, RecordLayout};
//!
//! let layout = RecordLayout::new(
//!     vec![FieldDescriptor {
//!         field: "altitude".to_string(),
//!         variable: "PLANE ALTITUDE".to_string(),
//!         unit: "feet".to_string(),
//!         kind: PrimitiveKind::Float64,
//!         offset: 0,
//!         width: 8,
//!     }],
//!     8,
//! )
//! .unwrap();
//!
//! assert_eq!(layout.position("altitude"), Some(0));
//! ```

mod field_value;
mod host;
mod ids;
mod layout;
mod primitive;
mod request;

pub use field_value::{FieldType, FieldValue, text_until_nul};
pub use host::{
    ExceptionCode, HostException, LoopState, SendOrigin, SimEvent, SystemState, exception_codes,
};
pub use ids::{ClientEventId, DefinitionId, ObjectId, RequestId, SendId};
pub use layout::{FieldDescriptor, MAX_NAME_LEN, MAX_RECORD_SIZE, RecordLayout};
pub use primitive::{FIXED_STRING_WIDTHS, MAX_STRING_WIDTH, PrimitiveKind, Value};
pub use request::{MAX_RADIUS_METERS, ObjectFilter, ObjectType, Period};
