//! Wall-clock helpers for the persisted time resolution.
//!
//! Vault files store timestamps as whole seconds, so two stamps that differ
//! only below the second are indistinguishable once written out. Every
//! timestamp comparison that feeds a merge decision goes through the
//! helpers here rather than comparing raw [`DateTime`] values.

use std::cmp::Ordering;

use chrono::{DateTime, SubsecRound, Utc};

/// Truncate a timestamp to the persisted resolution (whole seconds).
pub fn serialized(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}

/// Compare two timestamps at the persisted resolution.
pub fn cmp_serialized(a: DateTime<Utc>, b: DateTime<Utc>) -> Ordering {
    serialized(a).cmp(&serialized(b))
}

/// Returns `true` if two timestamps agree at the persisted resolution.
pub fn eq_serialized(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    cmp_serialized(a, b) == Ordering::Equal
}

/// The current wall-clock time, at full precision.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
