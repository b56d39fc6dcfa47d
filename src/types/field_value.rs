//! Conversions between Rust field types and record values

use serde::Serialize;
use std::fmt;

use super::{FIXED_STRING_WIDTHS, PrimitiveKind, Value};
use crate::{Result, SimError};

/// Declared type of a caller field, before mapping to a host primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Fixed-length byte array of the given width
    Bytes(usize),
    /// Growable UTF-8 text
    Text,
    /// Any other type (nested structs, enums, ...)
    Opaque(&'static str),
}

impl FieldType {
    /// Map to the host primitive, if one exists.
    ///
    /// Booleans travel as 32-bit integers and unsigned integers keep their bit
    /// pattern in the signed slot of the same width.
    pub fn primitive(self) -> Option<PrimitiveKind> {
        match self {
            FieldType::Bool | FieldType::I32 | FieldType::U32 => Some(PrimitiveKind::Int32),
            FieldType::I64 | FieldType::U64 => Some(PrimitiveKind::Int64),
            FieldType::F32 => Some(PrimitiveKind::Float32),
            FieldType::F64 => Some(PrimitiveKind::Float64),
            FieldType::Bytes(width) if FIXED_STRING_WIDTHS.contains(&width) => {
                Some(PrimitiveKind::Bytes(width))
            }
            FieldType::Text => Some(PrimitiveKind::String),
            FieldType::Bytes(_)
            | FieldType::I8
            | FieldType::U8
            | FieldType::I16
            | FieldType::U16
            | FieldType::Opaque(_) => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Bool => f.write_str("bool"),
            FieldType::I8 => f.write_str("i8"),
            FieldType::U8 => f.write_str("u8"),
            FieldType::I16 => f.write_str("i16"),
            FieldType::U16 => f.write_str("u16"),
            FieldType::I32 => f.write_str("i32"),
            FieldType::U32 => f.write_str("u32"),
            FieldType::I64 => f.write_str("i64"),
            FieldType::U64 => f.write_str("u64"),
            FieldType::F32 => f.write_str("f32"),
            FieldType::F64 => f.write_str("f64"),
            FieldType::Bytes(width) => write!(f, "[u8; {width}]"),
            FieldType::Text => f.write_str("String"),
            FieldType::Opaque(name) => f.write_str(name),
        }
    }
}

/// Trait for Rust types that can live in a record field.
pub trait FieldValue: Sized {
    /// Declared type used to build the field descriptor.
    const FIELD_TYPE: FieldType;

    /// Convert from a decoded record value.
    fn from_value(value: &Value) -> Result<Self>;

    /// Convert into a record value for encoding.
    fn to_value(&self) -> Value;
}

fn mismatch(expected: &str, value: &Value) -> SimError {
    SimError::type_conversion(format!("Expected {}, got {}", expected, value.kind_name()))
}

impl FieldValue for i32 {
    const FIELD_TYPE: FieldType = FieldType::I32;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int32(v) => Ok(*v),
            other => Err(mismatch("int32", other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Int32(*self)
    }
}

impl FieldValue for u32 {
    const FIELD_TYPE: FieldType = FieldType::U32;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int32(v) => Ok(*v as u32),
            other => Err(mismatch("int32", other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Int32(*self as i32)
    }
}

impl FieldValue for bool {
    const FIELD_TYPE: FieldType = FieldType::Bool;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int32(v) => Ok(*v != 0),
            other => Err(mismatch("int32", other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Int32(i32::from(*self))
    }
}

impl FieldValue for i64 {
    const FIELD_TYPE: FieldType = FieldType::I64;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int64(v) => Ok(*v),
            other => Err(mismatch("int64", other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Int64(*self)
    }
}

impl FieldValue for u64 {
    const FIELD_TYPE: FieldType = FieldType::U64;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int64(v) => Ok(*v as u64),
            other => Err(mismatch("int64", other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Int64(*self as i64)
    }
}

impl FieldValue for f32 {
    const FIELD_TYPE: FieldType = FieldType::F32;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float32(v) => Ok(*v),
            other => Err(mismatch("float32", other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Float32(*self)
    }
}

impl FieldValue for f64 {
    const FIELD_TYPE: FieldType = FieldType::F64;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float64(v) => Ok(*v),
            other => Err(mismatch("float64", other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Float64(*self)
    }
}

impl FieldValue for String {
    const FIELD_TYPE: FieldType = FieldType::Text;

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(v) => Ok(v.clone()),
            Value::Bytes(bytes) => Ok(text_until_nul(bytes)),
            other => Err(mismatch("string", other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl<const N: usize> FieldValue for [u8; N] {
    const FIELD_TYPE: FieldType = FieldType::Bytes(N);

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
                SimError::type_conversion(format!(
                    "Expected {} bytes, got {}",
                    N,
                    bytes.len()
                ))
            }),
            other => Err(mismatch("bytes", other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

/// Read text up to the first NUL byte, replacing invalid UTF-8.
pub fn text_until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_and_bool_keep_bit_patterns() {
        assert_eq!(u32::MAX.to_value(), Value::Int32(-1));
        assert_eq!(u32::from_value(&Value::Int32(-1)).unwrap(), u32::MAX);
        assert!(bool::from_value(&Value::Int32(7)).unwrap());
        assert!(!bool::from_value(&Value::Int32(0)).unwrap());
        assert_eq!(true.to_value(), Value::Int32(1));
    }

    #[test]
    fn kind_mismatch_is_a_conversion_error() {
        let result = f64::from_value(&Value::Float32(1.0));
        assert!(matches!(result, Err(SimError::TypeConversion { .. })));
    }

    #[test]
    fn byte_arrays_require_exact_width() {
        let ok = <[u8; 8]>::from_value(&Value::Bytes(b"ABCDEFGH".to_vec())).unwrap();
        assert_eq!(&ok, b"ABCDEFGH");
        assert!(<[u8; 8]>::from_value(&Value::Bytes(vec![1, 2, 3])).is_err());
    }

    #[test]
    fn strings_read_from_padded_bytes() {
        let mut raw = b"Cessna".to_vec();
        raw.resize(32, 0);
        assert_eq!(String::from_value(&Value::Bytes(raw)).unwrap(), "Cessna");
    }

    #[test]
    fn field_types_map_to_host_primitives() {
        assert_eq!(FieldType::Bool.primitive(), Some(PrimitiveKind::Int32));
        assert_eq!(FieldType::U64.primitive(), Some(PrimitiveKind::Int64));
        assert_eq!(FieldType::Bytes(256).primitive(), Some(PrimitiveKind::Bytes(256)));
        assert_eq!(FieldType::Bytes(10).primitive(), None);
        assert_eq!(FieldType::I16.primitive(), None);
        assert_eq!(FieldType::Opaque("Report").primitive(), None);
        assert_eq!(<[u8; 256] as FieldValue>::FIELD_TYPE, FieldType::Bytes(256));
    }
}
