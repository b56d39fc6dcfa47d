//! Host primitive kinds and runtime values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the host's variable-length string slot.
pub const MAX_STRING_WIDTH: usize = 260;

/// Fixed string widths the host accepts for byte-array fields.
pub const FIXED_STRING_WIDTHS: [usize; 6] = [8, 32, 64, 128, 256, 260];

/// Primitive kinds a data definition field can be registered as.
/// Maps to the host's data type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum PrimitiveKind {
    /// 32-bit signed integer (INT32)
    Int32,
    /// 64-bit signed integer (INT64)
    Int64,
    /// 32-bit float (FLOAT32)
    Float32,
    /// 64-bit float (FLOAT64)
    Float64,
    /// Fixed-length byte array (STRING8 .. STRING260)
    Bytes(usize),
    /// Variable string stored in a host-maximum slot (STRINGV)
    String,
}

impl PrimitiveKind {
    /// Returns the size in bytes of this kind inside a record.
    pub const fn size(&self) -> usize {
        match self {
            PrimitiveKind::Int32 | PrimitiveKind::Float32 => 4,
            PrimitiveKind::Int64 | PrimitiveKind::Float64 => 8,
            PrimitiveKind::Bytes(width) => *width,
            PrimitiveKind::String => MAX_STRING_WIDTH,
        }
    }

    /// Host data type code used when adding the field to a definition.
    ///
    /// Returns `None` for byte arrays whose width has no host equivalent.
    pub const fn host_code(&self) -> Option<u32> {
        match self {
            PrimitiveKind::Int32 => Some(1),
            PrimitiveKind::Int64 => Some(2),
            PrimitiveKind::Float32 => Some(3),
            PrimitiveKind::Float64 => Some(4),
            PrimitiveKind::Bytes(8) => Some(5),
            PrimitiveKind::Bytes(32) => Some(6),
            PrimitiveKind::Bytes(64) => Some(7),
            PrimitiveKind::Bytes(128) => Some(8),
            PrimitiveKind::Bytes(256) => Some(9),
            PrimitiveKind::Bytes(260) => Some(10),
            PrimitiveKind::Bytes(_) => None,
            PrimitiveKind::String => Some(11),
        }
    }

    /// Whether a runtime value has this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PrimitiveKind::Int32, Value::Int32(_))
                | (PrimitiveKind::Int64, Value::Int64(_))
                | (PrimitiveKind::Float32, Value::Float32(_))
                | (PrimitiveKind::Float64, Value::Float64(_))
                | (PrimitiveKind::Bytes(_), Value::Bytes(_))
                | (PrimitiveKind::String, Value::String(_))
        )
    }

    /// Zero value used for freshly created records.
    pub fn zero(&self) -> Value {
        match self {
            PrimitiveKind::Int32 => Value::Int32(0),
            PrimitiveKind::Int64 => Value::Int64(0),
            PrimitiveKind::Float32 => Value::Float32(0.0),
            PrimitiveKind::Float64 => Value::Float64(0.0),
            PrimitiveKind::Bytes(width) => Value::Bytes(vec![0; *width]),
            PrimitiveKind::String => Value::String(String::new()),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveKind::Int32 => f.write_str("int32"),
            PrimitiveKind::Int64 => f.write_str("int64"),
            PrimitiveKind::Float32 => f.write_str("float32"),
            PrimitiveKind::Float64 => f.write_str("float64"),
            PrimitiveKind::Bytes(width) => write!(f, "bytes[{width}]"),
            PrimitiveKind::String => f.write_str("string"),
        }
    }
}

/// Runtime value held by one record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bytes(Vec<u8>),
    String(String),
}

impl Value {
    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
        }
    }
}
