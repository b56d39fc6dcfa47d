//! `define_data!` declaration macro

/// Declare a struct together with its [`DataDefinition`](crate::DataDefinition) impl.
///
/// Fields annotated with `#[sim("VARIABLE", "unit")]` (or `#[sim("VARIABLE")]`
/// for unitless variables) are registered in declaration order. Fields without
/// an annotation are skipped and filled with `Default::default()` on decode.
///
/// Tagged field types must implement [`FieldValue`](crate::FieldValue), so an
/// unsupported type is rejected at compile time.
///
/// ```rust
/// use simlink::define_data;
///
/// define_data! {
///     #[derive(Debug, Default)]
///     pub struct Altitude {
///         #[sim("PLANE ALTITUDE", "feet")]
///         pub feet: f64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_data {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[sim($variable:literal $(, $unit:literal)? $(,)?)])?
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $fvis $field: $ty, )*
        }

        impl $crate::DataDefinition for $name {
            fn shape() -> $crate::Shape {
                let builder = $crate::Shape::builder();
                $(
                    let builder = $crate::__define_data_field!(
                        builder, $field, $ty $(, $variable $(, $unit)?)?
                    );
                )*
                builder.build()
            }

            fn from_record(record: &$crate::Record) -> $crate::Result<Self> {
                Ok(Self {
                    $( $field: $crate::__define_data_read!(record, $field, $ty $(, $variable)?), )*
                })
            }

            fn to_record(&self, record: &mut $crate::Record) -> $crate::Result<()> {
                $( $crate::__define_data_write!(record, self, $field, $ty $(, $variable)?); )*
                Ok(())
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __define_data_field {
    ($builder:ident, $field:ident, $ty:ty) => {
        $builder.skip(stringify!($field), $crate::FieldType::Opaque(stringify!($ty)))
    };
    ($builder:ident, $field:ident, $ty:ty, $variable:literal) => {
        $builder.typed::<$ty>(stringify!($field), $variable, "")
    };
    ($builder:ident, $field:ident, $ty:ty, $variable:literal, $unit:literal) => {
        $builder.typed::<$ty>(stringify!($field), $variable, $unit)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __define_data_read {
    ($record:ident, $field:ident, $ty:ty) => {
        <$ty as ::core::default::Default>::default()
    };
    ($record:ident, $field:ident, $ty:ty, $variable:literal) => {
        $record.get::<$ty>(stringify!($field))?
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __define_data_write {
    ($record:ident, $this:ident, $field:ident, $ty:ty) => {};
    ($record:ident, $this:ident, $field:ident, $ty:ty, $variable:literal) => {
        $record.set(stringify!($field), $crate::FieldValue::to_value(&$this.$field))?
    };
}
