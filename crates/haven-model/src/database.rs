//! The vault database: owner of every live node and tombstone.
//!
//! Nodes are stored in UUID-keyed maps and the tree structure is encoded
//! through per-group ordered child-ID lists plus parent backrefs, so any
//! node is reachable by UUID in constant time regardless of its position.
//!
//! # Invariants
//!
//! - A UUID names at most one live node (group or entry) per database.
//! - Every non-root group and every entry has exactly one parent, and
//!   appears exactly once in that parent's child list.
//! - The root group has no parent and cannot be relocated or removed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock;
use crate::entry::Entry;
use crate::error::{ModelError, ModelResult};
use crate::group::{Group, MergeMode};
use crate::metadata::Metadata;

/// A persisted record that a node was deleted, kept so that other
/// replicas can learn about the deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedObject {
    pub uuid: Uuid,
    pub deletion_time: DateTime<Utc>,
}

impl DeletedObject {
    pub fn new(uuid: Uuid, deletion_time: DateTime<Utc>) -> Self {
        Self {
            uuid,
            deletion_time,
        }
    }
}

/// A credential database: one tree of groups and entries, a tombstone
/// list, and database-wide metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Database {
    root: Uuid,
    groups: HashMap<Uuid, Group>,
    entries: HashMap<Uuid, Entry>,
    #[serde(default)]
    deleted_objects: Vec<DeletedObject>,
    meta: Metadata,
    #[serde(skip)]
    modified: bool,
}

impl Database {
    /// Create an empty database with a fresh root group.
    pub fn new() -> Self {
        let root = Group::new("Root");
        let root_uuid = root.uuid();
        let mut groups = HashMap::new();
        groups.insert(root_uuid, root);
        Self {
            root: root_uuid,
            groups,
            entries: HashMap::new(),
            deleted_objects: Vec::new(),
            meta: Metadata::new(),
            modified: false,
        }
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    pub fn root_uuid(&self) -> Uuid {
        self.root
    }

    pub fn root(&self) -> &Group {
        self.groups.get(&self.root).expect("root group present")
    }

    pub fn group(&self, uuid: Uuid) -> Option<&Group> {
        self.groups.get(&uuid)
    }

    pub fn group_mut(&mut self, uuid: Uuid) -> Option<&mut Group> {
        self.groups.get_mut(&uuid)
    }

    pub fn entry(&self, uuid: Uuid) -> Option<&Entry> {
        self.entries.get(&uuid)
    }

    pub fn entry_mut(&mut self, uuid: Uuid) -> Option<&mut Entry> {
        self.entries.get_mut(&uuid)
    }

    pub fn contains_group(&self, uuid: Uuid) -> bool {
        self.groups.contains_key(&uuid)
    }

    pub fn contains_entry(&self, uuid: Uuid) -> bool {
        self.entries.contains_key(&uuid)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Child entries of a group, in declared order. Empty for unknown
    /// UUIDs.
    pub fn entries_in(&self, group: Uuid) -> &[Uuid] {
        self.groups
            .get(&group)
            .map(|g| g.entry_ids())
            .unwrap_or(&[])
    }

    /// Child groups of a group, in declared order. Empty for unknown
    /// UUIDs.
    pub fn groups_in(&self, group: Uuid) -> &[Uuid] {
        self.groups
            .get(&group)
            .map(|g| g.group_ids())
            .unwrap_or(&[])
    }

    /// Every entry under a group, the group's own entries first, then
    /// each subgroup's in declared order.
    pub fn entries_recursive(&self, group: Uuid) -> Vec<Uuid> {
        let mut result = Vec::new();
        let mut stack = vec![group];
        while let Some(current) = stack.pop() {
            if let Some(g) = self.groups.get(&current) {
                result.extend_from_slice(g.entry_ids());
                for child in g.group_ids().iter().rev() {
                    stack.push(*child);
                }
            }
        }
        result
    }

    /// Every strict descendant group, in pre-order.
    pub fn groups_recursive(&self, group: Uuid) -> Vec<Uuid> {
        let mut result = Vec::new();
        let mut stack: Vec<Uuid> = self
            .groups_in(group)
            .iter()
            .rev()
            .copied()
            .collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            for child in self.groups_in(current).iter().rev() {
                stack.push(*child);
            }
        }
        result
    }

    /// The merge mode in effect for a group: its own setting, or the
    /// nearest ancestor's when set to [`MergeMode::Default`]. A chain of
    /// `Default` up to the root resolves to [`MergeMode::Synchronize`].
    pub fn resolved_merge_mode(&self, group: Uuid) -> MergeMode {
        let mut current = Some(group);
        while let Some(uuid) = current {
            match self.groups.get(&uuid) {
                Some(g) => match g.merge_mode() {
                    MergeMode::Default => current = g.parent(),
                    mode => return mode,
                },
                None => break,
            }
        }
        MergeMode::Synchronize
    }

    /// Group names from the root down to the given group, joined with
    /// `/`. Empty for unknown UUIDs.
    pub fn full_path(&self, group: Uuid) -> String {
        let mut names = Vec::new();
        let mut current = Some(group);
        while let Some(uuid) = current {
            match self.groups.get(&uuid) {
                Some(g) => {
                    names.push(g.name());
                    current = g.parent();
                }
                None => return String::new(),
            }
        }
        names.reverse();
        names.join("/")
    }

    // ---------------------------------------------------------------
    // Tree mutation
    // ---------------------------------------------------------------

    /// Insert a detached entry under a group.
    ///
    /// Stamps the entry's `location_changed` and touches the parent,
    /// each gated by the respective node's time-info setting.
    pub fn attach_entry(&mut self, mut entry: Entry, parent: Uuid) -> ModelResult<()> {
        let uuid = entry.uuid();
        if self.entries.contains_key(&uuid) || self.groups.contains_key(&uuid) {
            return Err(ModelError::DuplicateUuid(uuid));
        }
        if !self.groups.contains_key(&parent) {
            return Err(ModelError::UnknownGroup(parent));
        }
        entry.parent = Some(parent);
        if entry.can_update_timeinfo() {
            let mut times = *entry.times();
            times.location_changed = clock::now();
            entry.set_time_info(times);
        }
        self.entries.insert(uuid, entry);
        let group = self.groups.get_mut(&parent).expect("parent checked above");
        group.entry_ids.push(uuid);
        group.touch();
        Ok(())
    }

    /// Insert a detached group under a parent group.
    pub fn attach_group(&mut self, mut group: Group, parent: Uuid) -> ModelResult<()> {
        let uuid = group.uuid();
        if self.entries.contains_key(&uuid) || self.groups.contains_key(&uuid) {
            return Err(ModelError::DuplicateUuid(uuid));
        }
        if !self.groups.contains_key(&parent) {
            return Err(ModelError::UnknownGroup(parent));
        }
        group.parent = Some(parent);
        if group.can_update_timeinfo() {
            let mut times = *group.times();
            times.location_changed = clock::now();
            group.set_time_info(times);
        }
        self.groups.insert(uuid, group);
        let parent_group = self.groups.get_mut(&parent).expect("parent checked above");
        parent_group.group_ids.push(uuid);
        parent_group.touch();
        Ok(())
    }

    /// Move an entry under a different group. A move to the current
    /// parent is a no-op.
    pub fn relocate_entry(&mut self, entry: Uuid, new_parent: Uuid) -> ModelResult<()> {
        let old_parent = self
            .entries
            .get(&entry)
            .ok_or(ModelError::UnknownEntry(entry))?
            .parent;
        if !self.groups.contains_key(&new_parent) {
            return Err(ModelError::UnknownGroup(new_parent));
        }
        if old_parent == Some(new_parent) {
            return Ok(());
        }
        if let Some(old) = old_parent {
            if let Some(g) = self.groups.get_mut(&old) {
                g.entry_ids.retain(|id| *id != entry);
                g.touch();
            }
        }
        let group = self.groups.get_mut(&new_parent).expect("checked above");
        group.entry_ids.push(entry);
        group.touch();
        let e = self.entries.get_mut(&entry).expect("checked above");
        e.parent = Some(new_parent);
        if e.can_update_timeinfo() {
            let mut times = *e.times();
            times.location_changed = clock::now();
            e.set_time_info(times);
        }
        Ok(())
    }

    /// Move a group under a different parent. Rejects moves of the root
    /// and moves that would place a group inside its own subtree.
    pub fn relocate_group(&mut self, group: Uuid, new_parent: Uuid) -> ModelResult<()> {
        if group == self.root {
            return Err(ModelError::RootMutation);
        }
        let old_parent = self
            .groups
            .get(&group)
            .ok_or(ModelError::UnknownGroup(group))?
            .parent;
        if !self.groups.contains_key(&new_parent) {
            return Err(ModelError::UnknownGroup(new_parent));
        }
        if old_parent == Some(new_parent) {
            return Ok(());
        }
        if group == new_parent || self.is_descendant(new_parent, group) {
            return Err(ModelError::WouldCreateCycle { group, new_parent });
        }
        if let Some(old) = old_parent {
            if let Some(g) = self.groups.get_mut(&old) {
                g.group_ids.retain(|id| *id != group);
                g.touch();
            }
        }
        let parent_group = self.groups.get_mut(&new_parent).expect("checked above");
        parent_group.group_ids.push(group);
        parent_group.touch();
        let g = self.groups.get_mut(&group).expect("checked above");
        g.parent = Some(new_parent);
        if g.can_update_timeinfo() {
            let mut times = *g.times();
            times.location_changed = clock::now();
            g.set_time_info(times);
        }
        Ok(())
    }

    /// Returns `true` if `node` lies strictly inside the subtree rooted
    /// at `ancestor`.
    fn is_descendant(&self, node: Uuid, ancestor: Uuid) -> bool {
        let mut current = self.groups.get(&node).and_then(Group::parent);
        while let Some(uuid) = current {
            if uuid == ancestor {
                return true;
            }
            current = self.groups.get(&uuid).and_then(Group::parent);
        }
        false
    }

    // ---------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------

    /// Delete an entry as a normal edit: the entry is removed and a
    /// tombstone is recorded at the current time.
    pub fn remove_entry(&mut self, entry: Uuid) -> ModelResult<()> {
        self.remove_entry_without_tombstone(entry)?;
        self.deleted_objects
            .push(DeletedObject::new(entry, clock::now()));
        Ok(())
    }

    /// Delete an entry without recording a tombstone. Used when the
    /// caller manages the tombstone list itself.
    pub fn remove_entry_without_tombstone(&mut self, entry: Uuid) -> ModelResult<()> {
        let removed = self
            .entries
            .remove(&entry)
            .ok_or(ModelError::UnknownEntry(entry))?;
        if let Some(parent) = removed.parent {
            if let Some(g) = self.groups.get_mut(&parent) {
                g.entry_ids.retain(|id| *id != entry);
                g.touch();
            }
        }
        Ok(())
    }

    /// Delete a group and everything under it as a normal edit: one
    /// tombstone is recorded per removed node, children before parents.
    pub fn remove_group(&mut self, group: Uuid) -> ModelResult<()> {
        let removed = self.take_subtree(group)?;
        let now = clock::now();
        self.deleted_objects
            .extend(removed.into_iter().map(|uuid| DeletedObject::new(uuid, now)));
        Ok(())
    }

    /// Delete a group and everything under it without recording
    /// tombstones.
    pub fn remove_group_without_tombstone(&mut self, group: Uuid) -> ModelResult<()> {
        self.take_subtree(group)?;
        Ok(())
    }

    /// Detach and drop a whole subtree, returning the removed UUIDs,
    /// deepest nodes first.
    fn take_subtree(&mut self, group: Uuid) -> ModelResult<Vec<Uuid>> {
        if group == self.root {
            return Err(ModelError::RootMutation);
        }
        let parent = self
            .groups
            .get(&group)
            .ok_or(ModelError::UnknownGroup(group))?
            .parent;

        let mut removed = Vec::new();
        for sub in self.groups_recursive(group).into_iter().rev() {
            for entry in self.entries_in(sub).to_vec() {
                self.entries.remove(&entry);
                removed.push(entry);
            }
            self.groups.remove(&sub);
            removed.push(sub);
        }
        for entry in self.entries_in(group).to_vec() {
            self.entries.remove(&entry);
            removed.push(entry);
        }
        self.groups.remove(&group);
        removed.push(group);

        if let Some(parent) = parent {
            if let Some(g) = self.groups.get_mut(&parent) {
                g.group_ids.retain(|id| *id != group);
                g.touch();
            }
        }
        Ok(removed)
    }

    // ---------------------------------------------------------------
    // Tombstones, metadata, modified state
    // ---------------------------------------------------------------

    pub fn deleted_objects(&self) -> &[DeletedObject] {
        &self.deleted_objects
    }

    pub fn set_deleted_objects(&mut self, objects: Vec<DeletedObject>) {
        self.deleted_objects = objects;
    }

    pub fn add_deleted_object(&mut self, object: DeletedObject) {
        self.deleted_objects.push(object);
    }

    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Suspend time-info auto-updates for the given nodes for the life
    /// of the returned guard. UUIDs that name no live node are skipped.
    pub fn pause_timeinfo(&mut self, nodes: &[Uuid]) -> TimeinfoPause<'_> {
        TimeinfoPause::new(self, nodes)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped suspension of time-info auto-updates.
///
/// Clears the `update_timeinfo` flag of each named node on creation and
/// restores every prior setting when dropped, on all exit paths. Mutate
/// the database through [`db`](TimeinfoPause::db) while the guard is
/// held.
pub struct TimeinfoPause<'db> {
    db: &'db mut Database,
    saved: Vec<(Uuid, bool)>,
}

impl<'db> TimeinfoPause<'db> {
    fn new(db: &'db mut Database, nodes: &[Uuid]) -> Self {
        let mut saved: Vec<(Uuid, bool)> = Vec::with_capacity(nodes.len());
        for &uuid in nodes {
            if saved.iter().any(|(seen, _)| *seen == uuid) {
                continue;
            }
            if let Some(entry) = db.entries.get_mut(&uuid) {
                saved.push((uuid, entry.can_update_timeinfo()));
                entry.set_update_timeinfo(false);
            } else if let Some(group) = db.groups.get_mut(&uuid) {
                saved.push((uuid, group.can_update_timeinfo()));
                group.set_update_timeinfo(false);
            }
        }
        Self { db, saved }
    }

    pub fn db(&mut self) -> &mut Database {
        self.db
    }
}

impl Drop for TimeinfoPause<'_> {
    fn drop(&mut self) {
        // Nodes removed while the guard was held are skipped.
        for (uuid, prior) in self.saved.drain(..).rev() {
            if let Some(entry) = self.db.entries.get_mut(&uuid) {
                entry.set_update_timeinfo(prior);
            } else if let Some(group) = self.db.groups.get_mut(&uuid) {
                group.set_update_timeinfo(prior);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeinfo::TimeInfo;
    use chrono::TimeZone;

    fn stamp(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn entry_at(title: &str, secs: i64) -> Entry {
        let mut e = Entry::new(title);
        e.set_time_info(TimeInfo::at(stamp(secs)));
        e
    }

    fn group_at(name: &str, secs: i64) -> Group {
        let mut g = Group::new(name);
        g.set_time_info(TimeInfo::at(stamp(secs)));
        g
    }

    // ---------------------------------------------------------------
    // Attach / lookup
    // ---------------------------------------------------------------

    #[test]
    fn attach_entry_and_find_by_uuid() {
        let mut db = Database::new();
        let e = entry_at("Mail", 100);
        let uuid = e.uuid();
        db.attach_entry(e, db.root_uuid()).unwrap();

        assert!(db.contains_entry(uuid));
        assert_eq!(db.entry(uuid).unwrap().parent(), Some(db.root_uuid()));
        assert_eq!(db.entries_in(db.root_uuid()), &[uuid]);
        assert_eq!(db.entry_count(), 1);
    }

    #[test]
    fn attach_rejects_unknown_parent_and_duplicates() {
        let mut db = Database::new();
        let orphan_parent = Uuid::new_v4();
        let e = entry_at("Mail", 100);
        let uuid = e.uuid();
        assert_eq!(
            db.attach_entry(e.clone(), orphan_parent),
            Err(ModelError::UnknownGroup(orphan_parent))
        );
        db.attach_entry(e.clone(), db.root_uuid()).unwrap();
        assert_eq!(
            db.attach_entry(e, db.root_uuid()),
            Err(ModelError::DuplicateUuid(uuid))
        );
    }

    #[test]
    fn attach_stamps_location_unless_suspended() {
        let mut db = Database::new();

        let e = entry_at("a", 100);
        let moved = e.uuid();
        db.attach_entry(e, db.root_uuid()).unwrap();
        assert!(db.entry(moved).unwrap().times().location_changed > stamp(100));

        let mut quiet = entry_at("b", 100);
        quiet.set_update_timeinfo(false);
        let kept = quiet.uuid();
        db.attach_entry(quiet, db.root_uuid()).unwrap();
        assert_eq!(db.entry(kept).unwrap().times().location_changed, stamp(100));
    }

    // ---------------------------------------------------------------
    // Relocation
    // ---------------------------------------------------------------

    #[test]
    fn relocate_entry_updates_both_child_lists() {
        let mut db = Database::new();
        let g = group_at("Sub", 100);
        let sub = g.uuid();
        db.attach_group(g, db.root_uuid()).unwrap();
        let e = entry_at("Mail", 100);
        let uuid = e.uuid();
        db.attach_entry(e, db.root_uuid()).unwrap();

        db.relocate_entry(uuid, sub).unwrap();
        assert!(db.entries_in(db.root_uuid()).is_empty());
        assert_eq!(db.entries_in(sub), &[uuid]);
        assert_eq!(db.entry(uuid).unwrap().parent(), Some(sub));
    }

    #[test]
    fn relocate_to_same_parent_is_a_noop() {
        let mut db = Database::new();
        let mut e = entry_at("Mail", 100);
        e.set_update_timeinfo(false);
        let uuid = e.uuid();
        db.attach_entry(e, db.root_uuid()).unwrap();
        db.entry_mut(uuid).unwrap().set_update_timeinfo(true);

        db.relocate_entry(uuid, db.root_uuid()).unwrap();
        assert_eq!(db.entry(uuid).unwrap().times().location_changed, stamp(100));
    }

    #[test]
    fn relocate_group_rejects_cycles_and_root_moves() {
        let mut db = Database::new();
        let outer = group_at("Outer", 100);
        let inner = group_at("Inner", 100);
        let (outer_id, inner_id) = (outer.uuid(), inner.uuid());
        db.attach_group(outer, db.root_uuid()).unwrap();
        db.attach_group(inner, outer_id).unwrap();

        assert_eq!(
            db.relocate_group(outer_id, inner_id),
            Err(ModelError::WouldCreateCycle {
                group: outer_id,
                new_parent: inner_id
            })
        );
        assert_eq!(
            db.relocate_group(outer_id, outer_id),
            Err(ModelError::WouldCreateCycle {
                group: outer_id,
                new_parent: outer_id
            })
        );
        assert_eq!(
            db.relocate_group(db.root_uuid(), outer_id),
            Err(ModelError::RootMutation)
        );

        db.relocate_group(inner_id, db.root_uuid()).unwrap();
        assert_eq!(db.group(inner_id).unwrap().parent(), Some(db.root_uuid()));
        assert!(db.groups_in(outer_id).is_empty());
    }

    // ---------------------------------------------------------------
    // Removal and tombstones
    // ---------------------------------------------------------------

    #[test]
    fn remove_entry_records_one_tombstone() {
        let mut db = Database::new();
        let e = entry_at("Mail", 100);
        let uuid = e.uuid();
        db.attach_entry(e, db.root_uuid()).unwrap();

        db.remove_entry(uuid).unwrap();
        assert!(!db.contains_entry(uuid));
        assert!(db.entries_in(db.root_uuid()).is_empty());
        assert_eq!(db.deleted_objects().len(), 1);
        assert_eq!(db.deleted_objects()[0].uuid, uuid);
    }

    #[test]
    fn remove_without_tombstone_leaves_the_list_alone() {
        let mut db = Database::new();
        let e = entry_at("Mail", 100);
        let uuid = e.uuid();
        db.attach_entry(e, db.root_uuid()).unwrap();

        db.remove_entry_without_tombstone(uuid).unwrap();
        assert!(!db.contains_entry(uuid));
        assert!(db.deleted_objects().is_empty());

        assert_eq!(
            db.remove_entry_without_tombstone(uuid),
            Err(ModelError::UnknownEntry(uuid))
        );
    }

    #[test]
    fn remove_group_tombstones_the_whole_subtree() {
        let mut db = Database::new();
        let outer = group_at("Outer", 100);
        let inner = group_at("Inner", 100);
        let (outer_id, inner_id) = (outer.uuid(), inner.uuid());
        db.attach_group(outer, db.root_uuid()).unwrap();
        db.attach_group(inner, outer_id).unwrap();
        let e = entry_at("Mail", 100);
        let entry_id = e.uuid();
        db.attach_entry(e, inner_id).unwrap();

        db.remove_group(outer_id).unwrap();
        assert!(!db.contains_group(outer_id));
        assert!(!db.contains_group(inner_id));
        assert!(!db.contains_entry(entry_id));
        assert!(db.groups_in(db.root_uuid()).is_empty());

        let dead: Vec<Uuid> = db.deleted_objects().iter().map(|o| o.uuid).collect();
        assert_eq!(dead, vec![entry_id, inner_id, outer_id]);
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut db = Database::new();
        assert_eq!(db.remove_group(db.root_uuid()), Err(ModelError::RootMutation));
    }

    // ---------------------------------------------------------------
    // Recursive listings and paths
    // ---------------------------------------------------------------

    #[test]
    fn recursive_listings_follow_declared_order() {
        let mut db = Database::new();
        let a = group_at("A", 100);
        let b = group_at("B", 100);
        let a_inner = group_at("AInner", 100);
        let (a_id, b_id, a_inner_id) = (a.uuid(), b.uuid(), a_inner.uuid());
        db.attach_group(a, db.root_uuid()).unwrap();
        db.attach_group(b, db.root_uuid()).unwrap();
        db.attach_group(a_inner, a_id).unwrap();

        let root_entry = entry_at("RootEntry", 100);
        let nested_entry = entry_at("NestedEntry", 100);
        let (root_e, nested_e) = (root_entry.uuid(), nested_entry.uuid());
        db.attach_entry(root_entry, db.root_uuid()).unwrap();
        db.attach_entry(nested_entry, a_inner_id).unwrap();

        assert_eq!(db.groups_recursive(db.root_uuid()), vec![a_id, a_inner_id, b_id]);
        assert_eq!(db.entries_recursive(db.root_uuid()), vec![root_e, nested_e]);
        assert_eq!(db.entries_recursive(a_id), vec![nested_e]);
        assert!(db.entries_recursive(b_id).is_empty());
    }

    #[test]
    fn full_path_walks_up_to_the_root() {
        let mut db = Database::new();
        let outer = group_at("Banking", 100);
        let inner = group_at("Cards", 100);
        let (outer_id, inner_id) = (outer.uuid(), inner.uuid());
        db.attach_group(outer, db.root_uuid()).unwrap();
        db.attach_group(inner, outer_id).unwrap();

        assert_eq!(db.full_path(db.root_uuid()), "Root");
        assert_eq!(db.full_path(inner_id), "Root/Banking/Cards");
        assert_eq!(db.full_path(Uuid::new_v4()), "");
    }

    #[test]
    fn merge_mode_resolves_through_default_ancestors() {
        let mut db = Database::new();
        let outer = group_at("Outer", 100);
        let inner = group_at("Inner", 100);
        let (outer_id, inner_id) = (outer.uuid(), inner.uuid());
        db.attach_group(outer, db.root_uuid()).unwrap();
        db.attach_group(inner, outer_id).unwrap();

        // A chain of Default resolves to Synchronize at the root.
        assert_eq!(db.resolved_merge_mode(inner_id), MergeMode::Synchronize);

        db.group_mut(outer_id)
            .unwrap()
            .set_merge_mode(MergeMode::KeepLocal);
        assert_eq!(db.resolved_merge_mode(inner_id), MergeMode::KeepLocal);
        assert_eq!(db.resolved_merge_mode(outer_id), MergeMode::KeepLocal);

        db.group_mut(inner_id)
            .unwrap()
            .set_merge_mode(MergeMode::KeepRemote);
        assert_eq!(db.resolved_merge_mode(inner_id), MergeMode::KeepRemote);
    }

    // ---------------------------------------------------------------
    // Time-info pause guard
    // ---------------------------------------------------------------

    #[test]
    fn pause_suspends_and_restores() {
        let mut db = Database::new();
        let e = entry_at("Mail", 100);
        let uuid = e.uuid();
        db.attach_entry(e, db.root_uuid()).unwrap();
        let root = db.root_uuid();

        {
            let mut pause = db.pause_timeinfo(&[uuid, root, root]);
            assert!(!pause.db().entry(uuid).unwrap().can_update_timeinfo());
            assert!(!pause.db().root().can_update_timeinfo());
            pause.db().entry_mut(uuid).unwrap().set_title("Renamed");
        }
        assert!(db.entry(uuid).unwrap().can_update_timeinfo());
        assert!(db.root().can_update_timeinfo());
        // The rename happened while suspended, so no stamp moved.
        assert_eq!(db.entry(uuid).unwrap().times().last_modification_time, stamp(100));
        assert_eq!(db.entry(uuid).unwrap().title(), "Renamed");
    }

    #[test]
    fn pause_preserves_an_already_cleared_flag() {
        let mut db = Database::new();
        let mut e = entry_at("Mail", 100);
        e.set_update_timeinfo(false);
        let uuid = e.uuid();
        db.attach_entry(e, db.root_uuid()).unwrap();

        {
            let _pause = db.pause_timeinfo(&[uuid]);
        }
        assert!(!db.entry(uuid).unwrap().can_update_timeinfo());
    }

    #[test]
    fn pause_tolerates_removal_while_held() {
        let mut db = Database::new();
        let e = entry_at("Mail", 100);
        let uuid = e.uuid();
        db.attach_entry(e, db.root_uuid()).unwrap();

        let mut pause = db.pause_timeinfo(&[uuid]);
        pause.db().remove_entry_without_tombstone(uuid).unwrap();
        drop(pause);
        assert!(!db.contains_entry(uuid));
    }

    // ---------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------

    #[test]
    fn serde_roundtrip_preserves_the_tree() {
        let mut db = Database::new();
        let g = group_at("Sub", 100);
        let sub = g.uuid();
        db.attach_group(g, db.root_uuid()).unwrap();
        let e = entry_at("Mail", 100);
        let uuid = e.uuid();
        db.attach_entry(e, sub).unwrap();
        db.remove_entry(uuid).unwrap();
        db.metadata_mut().custom_data_mut().set("k", "v");

        let json = serde_json::to_string(&db).unwrap();
        let parsed: Database = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, db);
        assert_eq!(parsed.full_path(sub), "Root/Sub");
        assert_eq!(parsed.deleted_objects().len(), 1);
    }
}
