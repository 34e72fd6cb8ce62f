//! Reconciliation of two version histories of the same entry.
//!
//! Versions are keyed by their modification time at the persisted
//! (whole-second) resolution: two versions with the same serialized
//! stamp are regarded as the same version. When they differ anyway the
//! collision is logged and resolved by the side that is known to
//! post-date the other, which can lose one side's edit.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use haven_model::{clock, Entry, EntryCompare, MergeMode};

/// Merge `incoming`'s history into `target`, in place.
///
/// Returns `true` if the target's history was rewritten. The target's
/// own `TimeInfo` is never touched, so a caller holding the current
/// version open observes identical stamps before and after.
///
/// `_mode` is the active merge-mode hint; every recognized mode shares
/// this one history strategy.
pub(crate) fn merge_entry_histories(
    incoming: &Entry,
    target: &mut Entry,
    _mode: MergeMode,
    max_items: usize,
) -> bool {
    let comparison = clock::cmp_serialized(
        incoming.times().last_modification_time,
        target.times().last_modification_time,
    );
    let prefer_local = comparison == Ordering::Less;
    let prefer_remote = comparison == Ordering::Greater;

    let mut merged: BTreeMap<DateTime<Utc>, Entry> = BTreeMap::new();

    for item in target.history() {
        let key = clock::serialized(item.times().last_modification_time);
        warn_on_collision(&merged, key, item, incoming);
        merged.insert(key, item.to_history_item());
    }

    for item in incoming.history() {
        let key = clock::serialized(item.times().last_modification_time);
        warn_on_collision(&merged, key, item, incoming);
        if prefer_remote {
            // The target's current version post-dates this snapshot, so
            // the incoming side wins the slot.
            merged.remove(&key);
        }
        merged.entry(key).or_insert_with(|| item.to_history_item());
    }

    // The two current versions must be represented as well: whichever
    // side is older becomes a history item of the winner.
    let target_mod = clock::serialized(target.times().last_modification_time);
    let incoming_mod = clock::serialized(incoming.times().last_modification_time);
    if target_mod == incoming_mod && !target.matches(incoming, EntryCompare::content_only()) {
        warn!(
            title = %incoming.title(),
            uuid = %incoming.uuid(),
            "entry carries conflicting concurrent edits, conflict resolution may lose data"
        );
    }
    match target_mod.cmp(&incoming_mod) {
        Ordering::Less => {
            if prefer_local {
                merged.remove(&target_mod);
            }
            merged
                .entry(target_mod)
                .or_insert_with(|| target.to_history_item());
        }
        Ordering::Greater => {
            if prefer_remote {
                merged.remove(&incoming_mod);
            }
            merged
                .entry(incoming_mod)
                .or_insert_with(|| incoming.to_history_item());
        }
        Ordering::Equal => {}
    }

    // Only the newest `max_items` survive truncation, so the rewrite
    // counts as a change only if that tail differs.
    let rewritten: Vec<&Entry> = merged.values().collect();
    let existing = target.history();
    let mut changed = false;
    for i in 1..=max_items {
        let old_item = existing.len().checked_sub(i).map(|at| &existing[at]);
        let new_item = rewritten.len().checked_sub(i).map(|at| rewritten[at]);
        match (old_item, new_item) {
            (None, None) => break,
            (Some(old), Some(new)) if old.matches(new, EntryCompare::serialized()) => continue,
            _ => {
                changed = true;
                break;
            }
        }
    }
    if !changed {
        return false;
    }

    let times_before = *target.times();
    target.replace_history(merged.into_values().collect());
    target.truncate_history(max_items);
    debug_assert_eq!(times_before, *target.times());
    true
}

fn warn_on_collision(
    merged: &BTreeMap<DateTime<Utc>, Entry>,
    key: DateTime<Utc>,
    item: &Entry,
    owner: &Entry,
) {
    if let Some(existing) = merged.get(&key) {
        if !existing.matches(item, EntryCompare::serialized()) {
            warn!(
                title = %owner.title(),
                uuid = %owner.uuid(),
                at = %key,
                "history versions at the same timestamp differ, conflict resolution may lose data"
            );
        }
    }
}
