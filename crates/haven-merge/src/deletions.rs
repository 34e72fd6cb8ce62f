//! Tombstone-driven deletion reconciliation.
//!
//! The tombstone sets of both sides are unified (earliest deletion time
//! wins per UUID) and applied against the settled target tree. A
//! deletion is suppressed when the node was modified after its recorded
//! deletion, or when a group still contains live content. Groups are
//! processed bottom-up so that emptiness can be evaluated after the
//! children have been handled.

use std::collections::hash_map::Entry as TombstoneSlot;
use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

use haven_model::{DeletedObject, MergeMode};

use crate::change::{Change, ChangeList, ChangeType};
use crate::error::MergeResult;
use crate::merger::{MergeContext, Merger};

impl Merger<'_> {
    pub(crate) fn merge_deletions(&mut self, context: MergeContext) -> MergeResult<ChangeList> {
        let mut changes = ChangeList::new();
        if self.effective_mode(context) != MergeMode::Synchronize {
            // No other strategy applies deletions.
            return Ok(changes);
        }

        let mut unified: HashMap<Uuid, DeletedObject> = HashMap::new();
        let mut preserved: Vec<DeletedObject> = Vec::new();
        let mut dead_entries: Vec<Uuid> = Vec::new();
        let mut dead_groups: VecDeque<Uuid> = VecDeque::new();

        let combined = self
            .target
            .deleted_objects()
            .iter()
            .chain(self.source.deleted_objects().iter())
            .cloned()
            .collect::<Vec<_>>();
        for object in combined {
            match unified.entry(object.uuid) {
                TombstoneSlot::Vacant(slot) => {
                    if self.target.contains_entry(object.uuid) {
                        dead_entries.push(object.uuid);
                    } else if self.target.contains_group(object.uuid) {
                        dead_groups.push_back(object.uuid);
                    } else {
                        // Nothing live to delete; the tombstone passes
                        // through as-is.
                        preserved.push(object.clone());
                    }
                    slot.insert(object);
                }
                TombstoneSlot::Occupied(mut slot) => {
                    // Unify to the earliest date of deletion.
                    if slot.get().deletion_time > object.deletion_time {
                        slot.insert(object);
                    }
                }
            }
        }

        for uuid in dead_entries {
            let Some(tombstone) = unified.get(&uuid) else {
                continue;
            };
            let change = {
                let Some(entry) = self.target.entry(uuid) else {
                    continue;
                };
                if entry.times().last_modification_time > tombstone.deletion_time {
                    // Edited after it was deleted elsewhere: the edit
                    // revives the entry and the tombstone is dropped.
                    continue;
                }
                let details = if entry.parent().is_some() {
                    "Deleting child"
                } else {
                    "Deleting orphan"
                };
                Change::for_entry(ChangeType::Deleted, self.target, entry, details)
            };
            preserved.push(tombstone.clone());
            changes.push(change);
            self.erase_entry(uuid)?;
        }

        // Deletion must run bottom-up: a group is postponed while any of
        // its children are still queued. A sweep that consumes nothing
        // would loop forever, so it bails out instead, leaving the
        // survivors live and their tombstones preserved.
        while !dead_groups.is_empty() {
            let mut consumed = false;
            for _ in 0..dead_groups.len() {
                let Some(uuid) = dead_groups.pop_front() else {
                    break;
                };
                let children_pending = self
                    .target
                    .groups_in(uuid)
                    .iter()
                    .any(|child| dead_groups.contains(child));
                if children_pending {
                    dead_groups.push_back(uuid);
                    continue;
                }
                consumed = true;

                let Some(tombstone) = unified.get(&uuid) else {
                    continue;
                };
                let change = {
                    let Some(group) = self.target.group(uuid) else {
                        continue;
                    };
                    if group.times().last_modification_time > tombstone.deletion_time {
                        // Modified after deletion: revived.
                        continue;
                    }
                    if !self.target.entries_recursive(uuid).is_empty()
                        || !self.target.groups_recursive(uuid).is_empty()
                    {
                        // Still holds content another decision kept.
                        continue;
                    }
                    let details = if group.parent().is_some() {
                        "Deleting child"
                    } else {
                        "Deleting orphan"
                    };
                    Change::for_group(ChangeType::Deleted, self.target, group, details)
                };
                preserved.push(tombstone.clone());
                changes.push(change);
                self.erase_group(uuid)?;
            }
            if !consumed {
                while let Some(uuid) = dead_groups.pop_front() {
                    if let Some(tombstone) = unified.get(&uuid) {
                        preserved.push(tombstone.clone());
                    }
                }
                break;
            }
        }

        if preserved != self.target.deleted_objects() {
            changes.push(Change::unspecified("Changed deleted objects"));
        }
        self.target.set_deleted_objects(preserved);
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::Merger;
    use chrono::{DateTime, TimeZone, Utc};
    use haven_model::{Database, Entry, Group, TimeInfo};

    fn stamp(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn entry_at(uuid: Uuid, title: &str, secs: i64) -> Entry {
        let mut e = Entry::with_uuid(uuid, title);
        e.set_time_info(TimeInfo::at(stamp(secs)));
        e
    }

    fn group_at(uuid: Uuid, name: &str, secs: i64) -> Group {
        let mut g = Group::with_uuid(uuid, name);
        g.set_time_info(TimeInfo::at(stamp(secs)));
        g
    }

    fn attach_quiet_entry(db: &mut Database, entry: Entry, parent: Uuid) {
        let uuid = entry.uuid();
        let mut pause = db.pause_timeinfo(&[parent]);
        let mut entry = entry;
        entry.set_update_timeinfo(false);
        pause.db().attach_entry(entry, parent).unwrap();
        drop(pause);
        db.entry_mut(uuid).unwrap().set_update_timeinfo(true);
    }

    fn attach_quiet_group(db: &mut Database, group: Group, parent: Uuid) {
        let uuid = group.uuid();
        let mut pause = db.pause_timeinfo(&[parent]);
        let mut group = group;
        group.set_update_timeinfo(false);
        pause.db().attach_group(group, parent).unwrap();
        drop(pause);
        db.group_mut(uuid).unwrap().set_update_timeinfo(true);
    }

    fn merge(source: &Database, target: &mut Database) -> ChangeList {
        Merger::new(source, target).merge().unwrap()
    }

    fn deleted_uuids(db: &Database) -> Vec<Uuid> {
        db.deleted_objects().iter().map(|o| o.uuid).collect()
    }

    // ---------------------------------------------------------------
    // Entry deletion
    // ---------------------------------------------------------------

    #[test]
    fn source_tombstone_deletes_stale_target_entry() {
        let uuid = Uuid::new_v4();
        let mut source = Database::new();
        source.add_deleted_object(DeletedObject::new(uuid, stamp(500)));

        let mut target = Database::new();
        let root = target.root_uuid();
        attach_quiet_entry(&mut target, entry_at(uuid, "Mail", 100), root);

        let changes = merge(&source, &mut target);
        assert!(!target.contains_entry(uuid));
        assert_eq!(deleted_uuids(&target), vec![uuid]);
        assert!(changes.iter().any(|c| c.change_type == ChangeType::Deleted
            && c.uuid == Some(uuid)
            && c.details == "Deleting child"));
        assert!(changes
            .iter()
            .any(|c| c.details == "Changed deleted objects"));
    }

    #[test]
    fn entry_edited_after_deletion_survives() {
        // A replica deleted the entry, but this side edited it later:
        // the edit wins and the tombstone is dropped.
        let uuid = Uuid::new_v4();
        let mut source = Database::new();
        source.add_deleted_object(DeletedObject::new(uuid, stamp(1706745600))); // 2024-02-01

        let mut target = Database::new();
        let root = target.root_uuid();
        attach_quiet_entry(&mut target, entry_at(uuid, "Mail", 1709251200), root); // 2024-03-01
        target.add_deleted_object(DeletedObject::new(uuid, stamp(1706745600)));

        let changes = merge(&source, &mut target);
        assert!(target.contains_entry(uuid));
        assert!(deleted_uuids(&target).is_empty());
        assert!(!changes.iter().any(|c| c.change_type == ChangeType::Deleted));
        assert!(changes
            .iter()
            .any(|c| c.details == "Changed deleted objects"));

        // Running the same merge again changes nothing.
        let repeat = merge(&source, &mut target);
        assert!(repeat.is_empty());
        assert!(target.contains_entry(uuid));
    }

    #[test]
    fn earliest_deletion_time_wins_per_uuid() {
        let uuid = Uuid::new_v4();
        let mut source = Database::new();
        source.add_deleted_object(DeletedObject::new(uuid, stamp(200)));
        let mut target = Database::new();
        let root = target.root_uuid();
        attach_quiet_entry(&mut target, entry_at(uuid, "Mail", 250), root);
        target.add_deleted_object(DeletedObject::new(uuid, stamp(300)));

        // Modified at 250: later than the source's 200, so the earliest
        // unified tombstone would keep it, while the target's own 300
        // would not.
        let _ = merge(&source, &mut target);
        assert!(target.contains_entry(uuid));
        assert!(deleted_uuids(&target).is_empty());
    }

    // ---------------------------------------------------------------
    // Group deletion, bottom-up
    // ---------------------------------------------------------------

    #[test]
    fn groups_are_deleted_bottom_up() {
        let outer = Uuid::new_v4();
        let inner = Uuid::new_v4();
        let mut source = Database::new();
        // The parent's tombstone is listed first with a later deletion
        // time than the child's.
        source.add_deleted_object(DeletedObject::new(outer, stamp(600)));
        source.add_deleted_object(DeletedObject::new(inner, stamp(500)));

        let mut target = Database::new();
        let root = target.root_uuid();
        attach_quiet_group(&mut target, group_at(outer, "Outer", 100), root);
        attach_quiet_group(&mut target, group_at(inner, "Inner", 100), outer);

        let changes = merge(&source, &mut target);
        assert!(!target.contains_group(outer));
        assert!(!target.contains_group(inner));

        let deleted: Vec<Uuid> = changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Deleted)
            .map(|c| c.uuid.unwrap())
            .collect();
        assert_eq!(deleted, vec![inner, outer], "children must go first");
        assert_eq!(deleted_uuids(&target), vec![inner, outer]);
    }

    #[test]
    fn group_with_surviving_content_is_kept() {
        let group_uuid = Uuid::new_v4();
        let entry_uuid = Uuid::new_v4();
        let mut source = Database::new();
        source.add_deleted_object(DeletedObject::new(group_uuid, stamp(500)));

        let mut target = Database::new();
        let root = target.root_uuid();
        attach_quiet_group(&mut target, group_at(group_uuid, "Keep", 100), root);
        // The entry was edited after the group's deletion, so it stays,
        // and the group must stay with it.
        attach_quiet_entry(&mut target, entry_at(entry_uuid, "Mail", 900), group_uuid);
        source.add_deleted_object(DeletedObject::new(entry_uuid, stamp(500)));

        let _ = merge(&source, &mut target);
        assert!(target.contains_group(group_uuid));
        assert!(target.contains_entry(entry_uuid));
        assert!(deleted_uuids(&target).is_empty());
    }

    #[test]
    fn group_modified_after_deletion_survives() {
        let uuid = Uuid::new_v4();
        let mut source = Database::new();
        source.add_deleted_object(DeletedObject::new(uuid, stamp(500)));

        let mut target = Database::new();
        let root = target.root_uuid();
        attach_quiet_group(&mut target, group_at(uuid, "Renamed", 900), root);

        let _ = merge(&source, &mut target);
        assert!(target.contains_group(uuid));
        assert!(deleted_uuids(&target).is_empty());
    }

    // ---------------------------------------------------------------
    // Pass-through and gating
    // ---------------------------------------------------------------

    #[test]
    fn tombstones_for_absent_nodes_pass_through() {
        let gone = Uuid::new_v4();
        let mut source = Database::new();
        source.add_deleted_object(DeletedObject::new(gone, stamp(500)));
        let mut target = Database::new();

        let changes = merge(&source, &mut target);
        assert_eq!(deleted_uuids(&target), vec![gone]);
        assert!(changes
            .iter()
            .any(|c| c.details == "Changed deleted objects"));

        let repeat = merge(&source, &mut target);
        assert!(repeat.is_empty());
    }

    #[test]
    fn non_synchronize_modes_skip_deletions() {
        let uuid = Uuid::new_v4();
        let mut source = Database::new();
        source.add_deleted_object(DeletedObject::new(uuid, stamp(500)));

        let mut target = Database::new();
        let root = target.root_uuid();
        attach_quiet_entry(&mut target, entry_at(uuid, "Mail", 100), root);

        let mut merger = Merger::new(&source, &mut target);
        merger.set_forced_merge_mode(MergeMode::KeepLocal);
        let changes = merger.merge().unwrap();

        assert!(target.contains_entry(uuid));
        assert!(target.deleted_objects().is_empty());
        assert!(!changes.iter().any(|c| c.change_type == ChangeType::Deleted));

        // Resetting the forced mode re-enables deletion application.
        let mut merger = Merger::new(&source, &mut target);
        merger.set_forced_merge_mode(MergeMode::KeepLocal);
        merger.reset_forced_merge_mode();
        let changes = merger.merge().unwrap();
        assert!(!target.contains_entry(uuid));
        assert!(changes.iter().any(|c| c.change_type == ChangeType::Deleted));
    }

    #[test]
    fn group_merge_mode_gates_deletions_without_a_forced_mode() {
        let uuid = Uuid::new_v4();
        let mut source = Database::new();
        source.add_deleted_object(DeletedObject::new(uuid, stamp(500)));

        let mut target = Database::new();
        let root = target.root_uuid();
        attach_quiet_entry(&mut target, entry_at(uuid, "Mail", 100), root);
        target
            .group_mut(root)
            .unwrap()
            .set_merge_mode(MergeMode::KeepNewer);

        let _ = merge(&source, &mut target);
        assert!(target.contains_entry(uuid));
        assert!(target.deleted_objects().is_empty());
    }

    #[test]
    fn recreated_node_beats_its_own_tombstone() {
        // The structural walk re-creates an entry whose tombstone the
        // target still carries; reconciliation must then drop that
        // tombstone because the source's copy is newer than it.
        let uuid = Uuid::new_v4();
        let mut source = Database::new();
        let source_root = source.root_uuid();
        attach_quiet_entry(&mut source, entry_at(uuid, "Mail", 900), source_root);

        let mut target = Database::new();
        target.add_deleted_object(DeletedObject::new(uuid, stamp(500)));

        let changes = merge(&source, &mut target);
        assert!(target.contains_entry(uuid));
        assert!(deleted_uuids(&target).is_empty());
        assert!(changes.iter().any(|c| c.change_type == ChangeType::Added));
        assert!(!changes.iter().any(|c| c.change_type == ChangeType::Deleted));
    }
}
