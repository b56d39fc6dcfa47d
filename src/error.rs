//! Error types for data-definition, request and dispatch operations.
//!
//! Every fallible operation in simlink returns [`SimError`]. Errors carry
//! structured context (field names, request ids, host exception codes) and can
//! tell callers whether a retry is worthwhile.
//!
//! ## Error Categories
//!
//! - **Shape Errors**: a caller structure cannot be described as a host record
//! - **Registration Errors**: the host rejected a data definition
//! - **Codec Errors**: record bytes and layout disagree
//! - **Connection Errors**: the connection is closed or its transport failed
//! - **Host Exceptions**: the host reported a runtime exception asynchronously
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use simlink::SimError;
//!
//! let error = SimError::transport("pipe busy");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::types::{DefinitionId, HostException, PrimitiveKind, RequestId};

/// Result type alias for simlink operations.
pub type Result<T, E = SimError> = std::result::Result<T, E>;

/// Main error type for simlink operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SimError {
    #[error("Field '{field}' has a kind ({kind}) that cannot be mapped to a host data type")]
    UnsupportedFieldKind { field: String, kind: String },

    #[error("Invalid shape: {reason}")]
    InvalidShape { reason: String },

    #[error("Host rejected definition {definition} while adding '{variable}'")]
    RegistrationFailed {
        definition: DefinitionId,
        variable: String,
        #[source]
        source: Box<SimError>,
    },

    #[error("Field '{field}' expects {expected} bytes as {kind}, value has {actual}")]
    FieldWidthMismatch { field: String, kind: PrimitiveKind, expected: usize, actual: usize },

    #[error("Record truncated: {required} bytes required, {actual} supplied")]
    TruncatedRecord { required: usize, actual: usize },

    #[error("Field '{field}' not found in record")]
    FieldNotFound { field: String },

    #[error("Type conversion error: {details}")]
    TypeConversion { details: String },

    #[error("Invalid argument: {details}")]
    InvalidArgument { details: String },

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Host exception: {exception}")]
    HostException { exception: HostException },

    #[error("Transport read failed: {reason}")]
    TransportReadFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Host call failed: {operation}")]
    Transport {
        operation: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Malformed host message: {details}")]
    Protocol { details: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Request {request} timed out after {duration:?}")]
    Timeout { request: RequestId, duration: Duration },
}

impl SimError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SimError::RegistrationFailed { .. } => true,
            SimError::Transport { .. } => true,
            SimError::Timeout { .. } => true,
            SimError::HostException { .. } => true,
            SimError::UnsupportedFieldKind { .. } => false,
            SimError::InvalidShape { .. } => false,
            SimError::FieldWidthMismatch { .. } => false,
            SimError::TruncatedRecord { .. } => false,
            SimError::FieldNotFound { .. } => false,
            SimError::TypeConversion { .. } => false,
            SimError::InvalidArgument { .. } => false,
            SimError::ConnectionClosed => false,
            SimError::TransportReadFailure { .. } => false,
            SimError::Protocol { .. } => false,
            SimError::Parse { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SimError::UnsupportedFieldKind { .. } => vec![
                "Use i32, u32, i64, u64, f32, f64, bool, String or a fixed [u8; N] string field",
                "Leave bookkeeping fields untagged so they are skipped",
            ],
            SimError::InvalidShape { .. } => vec![
                "Tag at least one field with a simulation variable",
                "Keep variable names within the host limit",
                "Split very large records into several definitions",
            ],
            SimError::RegistrationFailed { .. } => vec![
                "Check the simulation variable name spelling",
                "Check the unit string against the host unit vocabulary",
                "Retry the registration once the host is ready",
            ],
            SimError::FieldWidthMismatch { .. } => vec![
                "Match fixed-size byte fields to the declared width",
                "Shorten string values to fit their slot",
            ],
            SimError::TruncatedRecord { .. } => vec![
                "Verify the definition registered with the host matches the local shape",
                "Check for a stale definition id after reconnecting",
            ],
            SimError::FieldNotFound { .. } => vec![
                "Check the destination field name",
                "Verify the field is tagged in the shape",
            ],
            SimError::TypeConversion { .. } => vec![
                "Check the declared field type against the record value",
                "Use a matching Rust type for the field",
            ],
            SimError::InvalidArgument { .. } => vec![
                "Check the request parameters",
                "Consult the operation documentation for accepted values",
            ],
            SimError::ConnectionClosed => vec![
                "Open a new connection",
                "Check whether the host shut down",
            ],
            SimError::HostException { .. } => vec![
                "Inspect the exception code and originating call",
                "Verify object ids and event names are valid",
            ],
            SimError::TransportReadFailure { .. } => vec![
                "Reconnect to the host",
                "Check that the simulator process is still running",
            ],
            SimError::Transport { .. } => vec![
                "Retry the host call",
                "Verify the host connection is still open",
            ],
            SimError::Protocol { .. } => vec![
                "Check host and client protocol versions",
                "Report the malformed message for investigation",
            ],
            SimError::Parse { .. } => vec![
                "Check configuration syntax",
                "Verify option names and value types",
            ],
            SimError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Check the simulator is not paused or loading",
            ],
        }
    }

    /// Helper constructor for unsupported field kinds.
    pub fn unsupported_field_kind(field: impl Into<String>, kind: impl Into<String>) -> Self {
        SimError::UnsupportedFieldKind { field: field.into(), kind: kind.into() }
    }

    /// Helper constructor for shape validation errors.
    pub fn invalid_shape(reason: impl Into<String>) -> Self {
        SimError::InvalidShape { reason: reason.into() }
    }

    /// Helper constructor for failed host calls.
    pub fn transport(operation: impl Into<String>) -> Self {
        SimError::Transport { operation: operation.into(), source: None }
    }

    /// Helper constructor for failed host calls with source.
    pub fn transport_with_source(
        operation: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SimError::Transport { operation: operation.into(), source: Some(source) }
    }

    /// Helper constructor for fatal read failures.
    pub fn transport_read_failure(reason: impl Into<String>) -> Self {
        SimError::TransportReadFailure { reason: reason.into(), source: None }
    }

    /// Helper constructor for malformed messages.
    pub fn protocol(details: impl Into<String>) -> Self {
        SimError::Protocol { details: details.into() }
    }

    /// Helper constructor for invalid arguments.
    pub fn invalid_argument(details: impl Into<String>) -> Self {
        SimError::InvalidArgument { details: details.into() }
    }

    /// Helper constructor for type conversion errors.
    pub fn type_conversion(details: impl Into<String>) -> Self {
        SimError::TypeConversion { details: details.into() }
    }

    /// Wrap a host exception.
    pub fn host_exception(exception: HostException) -> Self {
        SimError::HostException { exception }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::TransportReadFailure { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExceptionCode, SendId};

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                field in "\\w+",
                reason in ".*",
                expected in 1usize..300,
                actual in 0usize..300,
            ) {
                let unsupported = SimError::unsupported_field_kind(field.clone(), "i16");
                let width = SimError::FieldWidthMismatch {
                    field: field.clone(),
                    kind: PrimitiveKind::Bytes(expected),
                    expected,
                    actual,
                };
                let truncated = SimError::TruncatedRecord { required: expected, actual };
                let read = SimError::transport_read_failure(reason.clone());

                prop_assert!(unsupported.to_string().contains(&field));
                prop_assert!(width.to_string().contains(&field));
                prop_assert!(width.to_string().contains(&expected.to_string()));
                prop_assert!(truncated.to_string().contains(&actual.to_string()));
                prop_assert!(read.to_string().contains(&reason));
            }

            #[test]
            fn registration_failure_preserves_host_detail(
                definition in 1u32..1000,
                variable in "[A-Z ]+",
                detail in "[a-z ]+",
            ) {
                let error = SimError::RegistrationFailed {
                    definition: DefinitionId(definition),
                    variable: variable.clone(),
                    source: Box::new(SimError::transport(detail.clone())),
                };

                prop_assert!(error.to_string().contains(&variable));
                let source = std::error::Error::source(&error).map(|s| s.to_string());
                prop_assert!(source.unwrap_or_default().contains(&detail));
            }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<SimError>();

        let error = SimError::ConnectionClosed;
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_classification_follows_taxonomy() {
        assert!(SimError::transport("AddToDataDefinition").is_retryable());
        assert!(
            SimError::RegistrationFailed {
                definition: DefinitionId(1),
                variable: "PLANE ALTITUDE".into(),
                source: Box::new(SimError::transport("AddToDataDefinition")),
            }
            .is_retryable()
        );
        assert!(!SimError::ConnectionClosed.is_retryable());
        assert!(!SimError::TruncatedRecord { required: 8, actual: 4 }.is_retryable());
        assert!(!SimError::unsupported_field_kind("flags", "i16").is_retryable());
        assert!(!SimError::transport_read_failure("pipe closed").is_retryable());
    }

    #[test]
    fn recovery_suggestions_are_actionable() {
        let errors = [
            SimError::ConnectionClosed,
            SimError::invalid_shape("no tagged fields"),
            SimError::host_exception(HostException {
                code: ExceptionCode(7),
                send_id: SendId(3),
                index: 1,
                origin: None,
            }),
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn io_errors_become_read_failures() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let error: SimError = io_err.into();

        match error {
            SimError::TransportReadFailure { reason, source } => {
                assert_eq!(reason, "pipe closed");
                assert!(source.is_some());
            }
            other => panic!("Expected TransportReadFailure, got {other:?}"),
        }
    }
}
