//! Byte codec between host records and field values.
//!
//! Records are the typed middle ground between raw host bytes and caller
//! structures. [`decode`] reads each field at its descriptor's offset and
//! width, [`encode`] writes them back. Numbers use the host's native
//! little-endian byte order. Variable strings stop at the first NUL byte.
//!
//! ```rust
//! use simlink::{FieldType, Shape, Value, codec::{Record, decode, encode}, definition::describe};
//! use std::sync::Arc;
//!
//! let shape = Shape::builder().tagged("altitude", "PLANE ALTITUDE", "feet", FieldType::F64).build();
//! let layout = Arc::new(describe(&shape).unwrap());
//!
//! let record = decode(&1000.0f64.to_le_bytes(), Arc::clone(&layout)).unwrap();
//! assert_eq!(record.f64("altitude"), Some(1000.0));
//!
//! let mut update = Record::new(layout);
//! update.set("altitude", Value::Float64(3500.0)).unwrap();
//! assert_eq!(encode(&update).unwrap(), 3500.0f64.to_le_bytes());
//! ```

use std::sync::Arc;

use crate::types::{FieldDescriptor, FieldValue, PrimitiveKind, RecordLayout, Value, text_until_nul};
use crate::{Result, SimError};

/// One decoded record: a layout plus a value per registered field.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    layout: Arc<RecordLayout>,
    values: Vec<Value>,
}

impl Record {
    /// Create a record with every field set to its kind's zero value.
    pub fn new(layout: Arc<RecordLayout>) -> Self {
        let values = layout.fields.iter().map(|field| field.kind.zero()).collect();
        Self { layout, values }
    }

    /// Layout this record follows.
    pub fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    /// Raw value of a destination field.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.layout.position(field).map(|index| &self.values[index])
    }

    /// Typed lookup by destination field name.
    pub fn get<T: FieldValue>(&self, field: &str) -> Result<T> {
        let value = self
            .value(field)
            .ok_or_else(|| SimError::FieldNotFound { field: field.to_string() })?;
        T::from_value(value)
    }

    /// Replace the value of a destination field.
    ///
    /// The value must have the kind the field was registered with.
    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        let index = self
            .layout
            .position(field)
            .ok_or_else(|| SimError::FieldNotFound { field: field.to_string() })?;

        let kind = self.layout.fields[index].kind;
        if !kind.accepts(&value) {
            return Err(SimError::type_conversion(format!(
                "Field '{}' is {}, got {}",
                field,
                kind,
                value.kind_name()
            )));
        }

        self.values[index] = value;
        Ok(())
    }

    /// Convenience typed helpers
    pub fn f64(&self, field: &str) -> Option<f64> {
        self.get(field).ok()
    }
    pub fn f32(&self, field: &str) -> Option<f32> {
        self.get(field).ok()
    }
    pub fn i32(&self, field: &str) -> Option<i32> {
        self.get(field).ok()
    }
    pub fn i64(&self, field: &str) -> Option<i64> {
        self.get(field).ok()
    }
    pub fn string(&self, field: &str) -> Option<String> {
        self.get(field).ok()
    }

    /// Fields and values in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.layout.fields.iter().zip(&self.values)
    }
}

/// Encode a record into a buffer of exactly `layout.size` bytes.
///
/// Fails if the record's layout does not pass [`RecordLayout::validate`].
pub fn encode(record: &Record) -> Result<Vec<u8>> {
    record.layout.validate()?;
    let mut buffer = vec![0u8; record.layout.size];

    for (field, value) in record.iter() {
        let slot = &mut buffer[field.offset..field.end()];
        match (field.kind, value) {
            (PrimitiveKind::Int32, Value::Int32(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveKind::Int64, Value::Int64(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveKind::Float32, Value::Float32(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveKind::Float64, Value::Float64(v)) => slot.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveKind::Bytes(width), Value::Bytes(bytes)) => {
                if bytes.len() != width {
                    return Err(SimError::FieldWidthMismatch {
                        field: field.field.clone(),
                        kind: field.kind,
                        expected: width,
                        actual: bytes.len(),
                    });
                }
                slot.copy_from_slice(bytes);
            }
            (PrimitiveKind::String, Value::String(text)) => {
                // one byte stays reserved for the terminator
                if text.len() >= field.width {
                    return Err(SimError::FieldWidthMismatch {
                        field: field.field.clone(),
                        kind: field.kind,
                        expected: field.width - 1,
                        actual: text.len(),
                    });
                }
                slot[..text.len()].copy_from_slice(text.as_bytes());
            }
            (kind, other) => {
                return Err(SimError::type_conversion(format!(
                    "Field '{}' is {}, got {}",
                    field.field,
                    kind,
                    other.kind_name()
                )));
            }
        }
    }

    Ok(buffer)
}

/// Decode host bytes into a record following `layout`.
///
/// Bytes past the layout's size are ignored. Layouts built by hand are
/// validated first, so a bad offset or width is an error rather than a panic.
pub fn decode(bytes: &[u8], layout: Arc<RecordLayout>) -> Result<Record> {
    layout.validate()?;
    if bytes.len() < layout.size {
        return Err(SimError::TruncatedRecord { required: layout.size, actual: bytes.len() });
    }

    let values = layout.fields.iter().map(|field| decode_field(bytes, field)).collect();
    Ok(Record { layout, values })
}

fn decode_field(bytes: &[u8], field: &FieldDescriptor) -> Value {
    let slot = &bytes[field.offset..field.end()];
    match field.kind {
        PrimitiveKind::Int32 => Value::Int32(i32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]])),
        PrimitiveKind::Float32 => {
            Value::Float32(f32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]))
        }
        PrimitiveKind::Int64 => Value::Int64(i64::from_le_bytes(eight(slot))),
        PrimitiveKind::Float64 => Value::Float64(f64::from_le_bytes(eight(slot))),
        PrimitiveKind::Bytes(_) => Value::Bytes(slot.to_vec()),
        PrimitiveKind::String => Value::String(text_until_nul(slot)),
    }
}

fn eight(slot: &[u8]) -> [u8; 8] {
    [slot[0], slot[1], slot[2], slot[3], slot[4], slot[5], slot[6], slot[7]]
}
