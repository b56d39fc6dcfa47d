//! Request cadence and object selection

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ObjectId;

/// How often the host should send replies for a data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Period {
    /// Stop sending (used to cancel a periodic request)
    Never,
    /// Send a single reply
    Once,
    /// Every rendered frame
    VisualFrame,
    /// Every simulation frame
    SimFrame,
    /// Once per simulated second
    Second,
}

impl Period {
    /// Host period code.
    pub const fn code(self) -> u32 {
        match self {
            Period::Never => 0,
            Period::Once => 1,
            Period::VisualFrame => 2,
            Period::SimFrame => 3,
            Period::Second => 4,
        }
    }

    /// Whether this period keeps producing replies until cancelled.
    pub const fn is_repeating(self) -> bool {
        matches!(self, Period::VisualFrame | Period::SimFrame | Period::Second)
    }

    /// Nominal spacing between replies, when the host defines one.
    pub fn nominal_interval(self) -> Option<Duration> {
        match self {
            Period::Second => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}

/// Largest radius the host accepts for "all of type" requests.
pub const MAX_RADIUS_METERS: u32 = 200_000;

/// Host simulation object categories for "all of type" requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ObjectType {
    User,
    All,
    Aircraft,
    Helicopter,
    Boat,
    Ground,
}

impl ObjectType {
    /// Host object type code.
    pub const fn code(self) -> u32 {
        match self {
            ObjectType::User => 0,
            ObjectType::All => 1,
            ObjectType::Aircraft => 2,
            ObjectType::Helicopter => 3,
            ObjectType::Boat => 4,
            ObjectType::Ground => 5,
        }
    }
}

/// Which objects a data request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ObjectFilter {
    /// The user's aircraft
    User,
    /// One specific object
    Object(ObjectId),
    /// Every object of a type within a radius of the user
    AllOfType { radius_meters: u32, object_type: ObjectType },
}

impl ObjectFilter {
    /// Filter for a single object id, folding id 0 into [`ObjectFilter::User`].
    pub fn object(object: ObjectId) -> Self {
        if object.is_user() { ObjectFilter::User } else { ObjectFilter::Object(object) }
    }

    /// Object id for single-object filters.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            ObjectFilter::User => Some(ObjectId::USER),
            ObjectFilter::Object(id) => Some(*id),
            ObjectFilter::AllOfType { .. } => None,
        }
    }
}
