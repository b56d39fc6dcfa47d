//! Shape to record-layout derivation

use std::collections::HashSet;
use tracing::trace;

use super::Shape;
use crate::types::{FieldDescriptor, RecordLayout};
use crate::{Result, SimError};

/// Derive the ordered field descriptors and record size for a shape.
///
/// Untagged fields are skipped. Tagged fields are laid out back to back in
/// declaration order using the host's fixed widths. The result depends only on
/// the shape, so equal shapes always produce equal layouts.
pub fn describe(shape: &Shape) -> Result<RecordLayout> {
    let mut fields = Vec::with_capacity(shape.fields.len());
    let mut seen = HashSet::new();
    let mut offset = 0;

    for declared in &shape.fields {
        let Some(variable) = declared.variable_name() else {
            trace!(field = %declared.field, "Skipping untagged field");
            continue;
        };

        let kind = declared
            .ty
            .primitive()
            .ok_or_else(|| SimError::unsupported_field_kind(&declared.field, declared.ty.to_string()))?;

        if variable.trim().is_empty() {
            return Err(SimError::invalid_shape(format!(
                "field '{}' has an empty variable name",
                declared.field
            )));
        }

        if !seen.insert(declared.field.as_str()) {
            return Err(SimError::invalid_shape(format!(
                "field '{}' is declared more than once",
                declared.field
            )));
        }

        let width = kind.size();
        fields.push(FieldDescriptor {
            field: declared.field.clone(),
            variable: variable.to_string(),
            unit: declared.unit.clone().unwrap_or_default(),
            kind,
            offset,
            width,
        });
        offset += width;
    }

    RecordLayout::new(fields, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldType, PrimitiveKind};
    use proptest::prelude::*;

    #[test]
    fn lays_out_fields_in_declaration_order() {
        let shape = Shape::builder()
            .skip("base", FieldType::Opaque("ReportHeader"))
            .tagged("title", "TITLE", "", FieldType::Bytes(256))
            .typed::<f64>("altitude", "AUTOPILOT ALTITUDE LOCK VAR", "feet")
            .typed::<bool>("combustion", "GENERAL ENG COMBUSTION:1", "bool")
            .build();

        let layout = describe(&shape).expect("layout");

        assert_eq!(layout.field_count(), 3);
        assert_eq!(layout.size, 256 + 8 + 4);
        assert_eq!(layout.fields[0].kind, PrimitiveKind::Bytes(256));
        assert_eq!(layout.fields[1].offset, 256);
        assert_eq!(layout.fields[1].unit, "feet");
        assert_eq!(layout.fields[2].kind, PrimitiveKind::Int32);
        assert_eq!(layout.fields[2].offset, 264);
    }

    #[test]
    fn unit_only_fields_use_their_name_as_variable() {
        let shape = Shape::builder().unit_only("AIRSPEED INDICATED", "knots", FieldType::F64).build();
        let layout = describe(&shape).expect("layout");
        assert_eq!(layout.fields[0].variable, "AIRSPEED INDICATED");
    }

    #[test]
    fn unsupported_kinds_fail_the_registration_attempt() {
        let shape = Shape::builder().tagged("flags", "LIGHT STATES", "mask", FieldType::I16).build();
        match describe(&shape) {
            Err(SimError::UnsupportedFieldKind { field, kind }) => {
                assert_eq!(field, "flags");
                assert_eq!(kind, "i16");
            }
            other => panic!("Expected UnsupportedFieldKind, got {other:?}"),
        }

        let odd_width = Shape::builder().tagged("tail", "ATC ID", "", FieldType::Bytes(12)).build();
        assert!(matches!(describe(&odd_width), Err(SimError::UnsupportedFieldKind { .. })));
    }

    #[test]
    fn unsupported_kinds_on_skipped_fields_are_ignored() {
        let shape = Shape::builder()
            .skip("scratch", FieldType::I16)
            .typed::<f64>("altitude", "PLANE ALTITUDE", "feet")
            .build();
        assert!(describe(&shape).is_ok());
    }

    #[test]
    fn rejects_shapes_without_tagged_fields() {
        let shape = Shape::builder().skip("base", FieldType::Opaque("ReportHeader")).build();
        assert!(matches!(describe(&shape), Err(SimError::InvalidShape { .. })));
    }

    #[test]
    fn rejects_duplicate_destination_fields() {
        let shape = Shape::builder()
            .typed::<f64>("altitude", "PLANE ALTITUDE", "feet")
            .typed::<f64>("altitude", "PLANE ALTITUDE", "meters")
            .build();
        assert!(matches!(describe(&shape), Err(SimError::InvalidShape { .. })));
    }

    fn arb_field_type() -> impl Strategy<Value = FieldType> {
        prop::sample::select(vec![
            FieldType::Bool,
            FieldType::I32,
            FieldType::U32,
            FieldType::I64,
            FieldType::F32,
            FieldType::F64,
            FieldType::Bytes(8),
            FieldType::Bytes(64),
            FieldType::Bytes(260),
            FieldType::Text,
        ])
    }

    proptest! {
        #[test]
        fn prop_offsets_are_monotonic_and_deterministic(
            types in prop::collection::vec(arb_field_type(), 1..20),
            skip_mask in prop::collection::vec(any::<bool>(), 20),
        ) {
            let mut builder = Shape::builder().typed::<f64>("anchor", "PLANE ALTITUDE", "feet");
            for (i, ty) in types.iter().enumerate() {
                builder = if skip_mask[i] {
                    builder.skip(format!("f{i}"), *ty)
                } else {
                    builder.tagged(format!("f{i}"), format!("VAR {i}"), "number", *ty)
                };
            }
            let shape = builder.build();

            let first = describe(&shape).unwrap();
            let second = describe(&shape).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.field_count(), shape.tagged_count());

            let mut cursor = 0;
            for field in &first.fields {
                prop_assert_eq!(field.offset, cursor);
                prop_assert_eq!(field.width, field.kind.size());
                cursor = field.end();
            }
            prop_assert_eq!(cursor, first.size);
        }
    }
}
