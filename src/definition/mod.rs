//! Data definitions: describing caller structures as host records.
//!
//! A data definition is the host-side name for an ordered list of simulation
//! variables forming one binary record. This module turns a caller's structure
//! into that list without runtime reflection:
//!
//! - [`Shape`] is an explicit declaration of the structure's fields and their
//!   `(variable, unit)` annotations, built with [`ShapeBuilder`]
//! - [`describe`] derives the ordered [`FieldDescriptor`](crate::FieldDescriptor)s
//!   and record size from a shape
//! - [`DataDefinition`] ties a Rust type to its shape and converts it to and
//!   from decoded [`Record`]s
//! - [`define_data!`](crate::define_data) generates a `DataDefinition` impl from an
//!   annotated struct declaration
//!
//! # Example Usage
//!
//! ```rust
//! use simlink::{define_data, DataDefinition};
//!
//! define_data! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct Position {
//!         #[sim("PLANE LATITUDE", "degrees")]
//!         pub latitude: f64,
//!         #[sim("PLANE LONGITUDE", "degrees")]
//!         pub longitude: f64,
//!         #[sim("TITLE")]
//!         pub title: [u8; 256],
//!         pub received: u64,
//!     }
//! }
//!
//! let layout = Position::layout().unwrap();
//! assert_eq!(layout.field_count(), 3);
//! assert_eq!(layout.size, 8 + 8 + 256);
//! ```

mod describe;
mod macros;
mod shape;

pub use describe::describe;
pub use shape::{Shape, ShapeBuilder, ShapeField};

use crate::codec::Record;
use crate::types::RecordLayout;

/// A Rust type that can be registered as a host data definition.
///
/// `shape()` runs once per registration; `from_record()` runs for every reply
/// delivered to the caller and `to_record()` for every set-data call.
pub trait DataDefinition: Sized + Send + 'static {
    /// Declared fields of this type.
    fn shape() -> Shape;

    /// Build a value from a decoded record.
    fn from_record(record: &Record) -> crate::Result<Self>;

    /// Write this value's tagged fields into a record.
    fn to_record(&self, record: &mut Record) -> crate::Result<()>;

    /// Record layout derived from [`DataDefinition::shape`].
    fn layout() -> crate::Result<RecordLayout> {
        describe(&Self::shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};
    use crate::types::{FieldType, PrimitiveKind, Value};
    use std::sync::Arc;

    crate::define_data! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct EngineReport {
            #[sim("PLANE ALTITUDE", "feet")]
            altitude: f64,
            #[sim("NUMBER OF ENGINES", "number")]
            engine_count: i32,
            #[sim("GENERAL ENG COMBUSTION:1", "bool")]
            engine1: bool,
            #[sim("TITLE")]
            title: String,
            note: u16,
        }
    }

    #[test]
    fn macro_builds_shape_in_declaration_order() {
        let shape = EngineReport::shape();
        assert_eq!(shape.fields.len(), 5);
        assert_eq!(shape.tagged_count(), 4);
        assert!(shape.fields[4].is_skipped());
        assert_eq!(shape.fields[4].ty, FieldType::Opaque("u16"));
        assert_eq!(shape.fields[3].unit.as_deref(), Some(""));

        let layout = EngineReport::layout().unwrap();
        let kinds: Vec<_> = layout.fields.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![PrimitiveKind::Float64, PrimitiveKind::Int32, PrimitiveKind::Int32, PrimitiveKind::String]
        );
    }

    #[test]
    fn macro_round_trips_through_records() {
        let layout = Arc::new(EngineReport::layout().unwrap());
        let report = EngineReport {
            altitude: 1000.0,
            engine_count: 2,
            engine1: true,
            title: "Cessna Skyhawk".to_string(),
            note: 99,
        };

        let mut record = Record::new(Arc::clone(&layout));
        report.to_record(&mut record).unwrap();
        assert_eq!(record.value("engine_count"), Some(&Value::Int32(2)));

        let bytes = encode(&record).unwrap();
        let decoded = EngineReport::from_record(&decode(&bytes, layout).unwrap()).unwrap();

        // untagged fields are not transmitted and come back as their default
        assert_eq!(decoded, EngineReport { note: 0, ..report });
    }
}
