//! Declarative shape descriptions

use serde::Serialize;

use crate::types::{FieldType, FieldValue};

/// One declared field of a caller structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ShapeField {
    /// Field name in the caller's structure
    pub field: String,
    /// Simulation variable annotation
    pub variable: Option<String>,
    /// Unit annotation
    pub unit: Option<String>,
    /// Declared Rust-side type
    pub ty: FieldType,
}

impl ShapeField {
    /// Whether the field carries neither annotation and is skipped.
    pub fn is_skipped(&self) -> bool {
        self.variable.is_none() && self.unit.is_none()
    }

    /// Variable name registered with the host.
    ///
    /// A field annotated only with a unit uses its own name as the variable.
    pub fn variable_name(&self) -> Option<&str> {
        match (&self.variable, &self.unit) {
            (Some(variable), _) => Some(variable),
            (None, Some(_)) => Some(&self.field),
            (None, None) => None,
        }
    }
}

/// Ordered list of declared fields, the input of layout derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Shape {
    pub fields: Vec<ShapeField>,
}

impl Shape {
    /// Start building a shape.
    pub fn builder() -> ShapeBuilder {
        ShapeBuilder::default()
    }

    /// Number of fields that will be registered.
    pub fn tagged_count(&self) -> usize {
        self.fields.iter().filter(|field| !field.is_skipped()).count()
    }
}

/// Builder for [`Shape`], the explicit replacement for tag reflection.
///
/// ```rust
/// use simlink::{FieldType, Shape};
///
/// let shape = Shape::builder()
///     .typed::<f64>("altitude", "PLANE ALTITUDE", "feet")
///     .tagged("title", "TITLE", "", FieldType::Bytes(256))
///     .skip("cached_at", FieldType::U64)
///     .build();
///
/// assert_eq!(shape.tagged_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShapeBuilder {
    fields: Vec<ShapeField>,
}

impl ShapeBuilder {
    /// Add a field annotated with a variable and unit.
    pub fn tagged(
        mut self,
        field: impl Into<String>,
        variable: impl Into<String>,
        unit: impl Into<String>,
        ty: FieldType,
    ) -> Self {
        self.fields.push(ShapeField {
            field: field.into(),
            variable: Some(variable.into()),
            unit: Some(unit.into()),
            ty,
        });
        self
    }

    /// Add a tagged field whose declared type comes from a Rust type.
    pub fn typed<T: FieldValue>(
        self,
        field: impl Into<String>,
        variable: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        self.tagged(field, variable, unit, T::FIELD_TYPE)
    }

    /// Add a field annotated only with a unit; its name doubles as the variable.
    pub fn unit_only(mut self, field: impl Into<String>, unit: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(ShapeField {
            field: field.into(),
            variable: None,
            unit: Some(unit.into()),
            ty,
        });
        self
    }

    /// Add an unannotated field. It keeps its place in the shape but is not registered.
    pub fn skip(mut self, field: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(ShapeField { field: field.into(), variable: None, unit: None, ty });
        self
    }

    pub fn build(self) -> Shape {
        Shape { fields: self.fields }
    }
}
