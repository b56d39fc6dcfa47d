//! Field descriptors and record layouts

use serde::{Deserialize, Serialize};

use super::PrimitiveKind;
use crate::{Result, SimError};

/// Longest simulation variable or unit name the host accepts, in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Largest record a single definition may describe, in bytes.
pub const MAX_RECORD_SIZE: usize = 8192;

/// One registered field of a data definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FieldDescriptor {
    /// Destination field name in the caller's structure
    pub field: String,
    /// Simulation variable name as known by the host
    pub variable: String,
    /// Unit string (empty for unitless variables such as strings)
    pub unit: String,
    /// Primitive kind registered with the host
    pub kind: PrimitiveKind,
    /// Byte offset within the record
    pub offset: usize,
    /// Byte width within the record
    pub width: usize,
}

impl FieldDescriptor {
    /// Offset one past the last byte of this field.
    pub fn end(&self) -> usize {
        self.offset + self.width
    }
}

/// Ordered field descriptors plus total record size.
///
/// Two layouts are equal exactly when their tagged fields match in content and
/// order, which is what identifies a shape to the definition registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct RecordLayout {
    /// Fields in registration order
    pub fields: Vec<FieldDescriptor>,
    /// Total record size in bytes
    pub size: usize,
}

impl RecordLayout {
    /// Create a new layout with validation.
    pub fn new(fields: Vec<FieldDescriptor>, size: usize) -> Result<Self> {
        let layout = Self { fields, size };
        layout.validate()?;
        Ok(layout)
    }

    /// Validate offsets, widths and host limits.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(SimError::invalid_shape("shape has no tagged fields"));
        }

        let mut cursor = 0;
        for field in &self.fields {
            if field.width != field.kind.size() {
                return Err(SimError::FieldWidthMismatch {
                    field: field.field.clone(),
                    kind: field.kind,
                    expected: field.kind.size(),
                    actual: field.width,
                });
            }

            if field.offset < cursor {
                return Err(SimError::invalid_shape(format!(
                    "field '{}' at offset {} overlaps the previous field ending at {}",
                    field.field, field.offset, cursor
                )));
            }

            if field.variable.len() > MAX_NAME_LEN || field.unit.len() > MAX_NAME_LEN {
                return Err(SimError::invalid_shape(format!(
                    "field '{}' has a variable or unit name longer than {} bytes",
                    field.field, MAX_NAME_LEN
                )));
            }

            cursor = field.end();
        }

        if cursor > self.size {
            return Err(SimError::invalid_shape(format!(
                "fields end at {} but record size is {}",
                cursor, self.size
            )));
        }

        if self.size > MAX_RECORD_SIZE {
            return Err(SimError::invalid_shape(format!(
                "record of {} bytes exceeds the host maximum of {}",
                self.size, MAX_RECORD_SIZE
            )));
        }

        Ok(())
    }

    /// Position of a destination field by name.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|descriptor| descriptor.field == field)
    }

    /// Descriptor of a destination field by name.
    pub fn get_field(&self, field: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|descriptor| descriptor.field == field)
    }

    /// Get the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(field: &str, kind: PrimitiveKind, offset: usize) -> FieldDescriptor {
        FieldDescriptor {
            field: field.to_string(),
            variable: field.to_uppercase(),
            unit: String::new(),
            kind,
            offset,
            width: kind.size(),
        }
    }

    #[test]
    fn accepts_contiguous_fields() {
        let layout = RecordLayout::new(
            vec![
                descriptor("altitude", PrimitiveKind::Float64, 0),
                descriptor("engines", PrimitiveKind::Int32, 8),
            ],
            12,
        )
        .expect("valid layout");

        assert_eq!(layout.field_count(), 2);
        assert_eq!(layout.position("engines"), Some(1));
        assert_eq!(layout.get_field("altitude").map(|f| f.offset), Some(0));
        assert!(layout.get_field("missing").is_none());
    }

    #[test]
    fn rejects_overlapping_fields() {
        let result = RecordLayout::new(
            vec![
                descriptor("altitude", PrimitiveKind::Float64, 0),
                descriptor("engines", PrimitiveKind::Int32, 4),
            ],
            12,
        );
        assert!(matches!(result, Err(SimError::InvalidShape { .. })));
    }

    #[test]
    fn rejects_empty_and_oversized_layouts() {
        assert!(matches!(RecordLayout::new(Vec::new(), 0), Err(SimError::InvalidShape { .. })));

        let fields = (0..40)
            .map(|i| descriptor(&format!("s{i}"), PrimitiveKind::Bytes(260), i * 260))
            .collect::<Vec<_>>();
        let result = RecordLayout::new(fields, 40 * 260);
        assert!(matches!(result, Err(SimError::InvalidShape { .. })));
    }

    #[test]
    fn rejects_width_disagreeing_with_kind() {
        let mut field = descriptor("altitude", PrimitiveKind::Float64, 0);
        field.width = 4;
        let result = RecordLayout::new(vec![field], 8);
        assert!(matches!(result, Err(SimError::FieldWidthMismatch { expected: 8, actual: 4, .. })));
    }
}
