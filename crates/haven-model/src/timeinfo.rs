use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock;

/// The wall-clock stamps carried by every group and entry.
///
/// `location_changed` tracks the last reparenting of the node and is
/// deliberately separate from `last_modification_time`: a move is not a
/// content edit, and replica reconciliation resolves the two independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInfo {
    pub creation_time: DateTime<Utc>,
    pub last_modification_time: DateTime<Utc>,
    pub last_access_time: DateTime<Utc>,
    pub location_changed: DateTime<Utc>,
    /// `None` means the node never expires.
    pub expiry_time: Option<DateTime<Utc>>,
}

impl TimeInfo {
    /// All stamps set to the given instant, no expiry.
    pub fn at(t: DateTime<Utc>) -> Self {
        Self {
            creation_time: t,
            last_modification_time: t,
            last_access_time: t,
            location_changed: t,
            expiry_time: None,
        }
    }

    /// All stamps set to the current wall-clock time.
    pub fn now() -> Self {
        Self::at(clock::now())
    }

    /// Returns `true` if the node has expired at the given instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_time.is_some_and(|t| t <= now)
    }

    /// Compare two `TimeInfo` values at the persisted (whole-second)
    /// resolution, optionally skipping `location_changed`.
    pub fn matches_serialized(&self, other: &Self, ignore_location: bool) -> bool {
        clock::eq_serialized(self.creation_time, other.creation_time)
            && clock::eq_serialized(self.last_modification_time, other.last_modification_time)
            && clock::eq_serialized(self.last_access_time, other.last_access_time)
            && (ignore_location
                || clock::eq_serialized(self.location_changed, other.location_changed))
            && match (self.expiry_time, other.expiry_time) {
                (None, None) => true,
                (Some(a), Some(b)) => clock::eq_serialized(a, b),
                _ => false,
            }
    }
}

impl Default for TimeInfo {
    fn default() -> Self {
        Self::now()
    }
}
