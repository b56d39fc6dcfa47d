//! TypeScript Generation Tests
//!
//! Validates that simlink's wire-facing types can be exported to TypeScript
//! when the tauri feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_core_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, all types are properly configured for TypeScript export.
    fn assert_type<T: Type>() {}

    assert_type::<simlink::HostException>();
    assert_type::<simlink::SimEvent>();
    assert_type::<simlink::SystemState>();
    assert_type::<simlink::LoopState>();
    assert_type::<simlink::Period>();
    assert_type::<simlink::ObjectFilter>();
    assert_type::<simlink::PrimitiveKind>();
    assert_type::<simlink::ConnectionConfig>();
    assert_type::<simlink::HostCall>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type
    let _ = simlink::Period::Second;
    let _ = simlink::OverflowPolicy::default();
}
