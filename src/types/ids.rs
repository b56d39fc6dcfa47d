//! Opaque identifiers exchanged with the host

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! declare_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "tauri", derive(specta::Type))]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Raw value as sent on the wire.
            pub const fn value(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

declare_id!(
    /// Handle of a data definition registered with the host.
    ///
    /// Unique per distinct shape for the lifetime of one connection.
    DefinitionId
);

declare_id!(
    /// Correlation token linking a request to its replies.
    ///
    /// Allocated monotonically by the request correlator.
    RequestId
);

declare_id!(
    /// Client-side event id, mapped to a sim event or a system event.
    ClientEventId
);

declare_id!(
    /// Host simulation object id.
    ObjectId
);

declare_id!(
    /// Packet id the host assigns to every outgoing call.
    ///
    /// Exceptions reference the send id of the call that caused them.
    SendId
);

impl ObjectId {
    /// The user's aircraft.
    pub const USER: Self = Self(0);

    /// Check if this refers to the user's aircraft.
    pub const fn is_user(self) -> bool {
        self.0 == Self::USER.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_object_is_zero() {
        assert!(ObjectId::USER.is_user());
        assert!(!ObjectId(42).is_user());
        assert_eq!(ObjectId::USER.value(), 0);
    }

    #[test]
    fn ids_display_raw_value() {
        assert_eq!(RequestId(17).to_string(), "17");
        assert_eq!(DefinitionId(3).to_string(), "3");
    }
}
