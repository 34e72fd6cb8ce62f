//! The merge engine: a single recursive walk in three phases.
//!
//! Phase order matters. The structural walk may re-create a node whose
//! tombstone exists on the other side; deletion reconciliation then
//! decides whether the re-creation is current or must be undone; the
//! metadata merge runs last against the settled tree.
//!
//! # Invariants
//!
//! - The source database is never written.
//! - Every mutation of the target is reported as a [`Change`].
//! - Reparenting and erasure never disturb recorded `TimeInfo`; the
//!   engine suspends auto-updates around each mutation.

use std::cmp::Ordering;

use tracing::debug;
use uuid::Uuid;

use haven_model::{clock, Database, Entry, Group, MergeMode};

use crate::change::{Change, ChangeList, ChangeType};
use crate::error::{MergeError, MergeResult};
use crate::history::merge_entry_histories;

/// The source/target group pair one recursion step operates on.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MergeContext {
    pub(crate) source_group: Uuid,
    pub(crate) target_group: Uuid,
}

/// Reconciles a source database into a target database.
///
/// One merger runs one merge; the target must not be mutated by anyone
/// else for the duration. Construct with [`new`](Merger::new) for a
/// whole-database merge or [`between_groups`](Merger::between_groups)
/// for a subtree merge.
pub struct Merger<'a> {
    pub(crate) source: &'a Database,
    pub(crate) target: &'a mut Database,
    source_start: Uuid,
    target_start: Uuid,
    forced_mode: MergeMode,
}

impl<'a> Merger<'a> {
    /// Merge the source's whole tree into the target's.
    pub fn new(source: &'a Database, target: &'a mut Database) -> Self {
        let source_start = source.root_uuid();
        let target_start = target.root_uuid();
        Self {
            source,
            target,
            source_start,
            target_start,
            forced_mode: MergeMode::Default,
        }
    }

    /// Merge one source subtree into one target subtree. Deletion
    /// reconciliation and metadata still apply database-wide.
    pub fn between_groups(
        source: &'a Database,
        source_group: Uuid,
        target: &'a mut Database,
        target_group: Uuid,
    ) -> MergeResult<Self> {
        if !source.contains_group(source_group) {
            return Err(MergeError::UnknownGroup(source_group));
        }
        if !target.contains_group(target_group) {
            return Err(MergeError::UnknownGroup(target_group));
        }
        Ok(Self {
            source,
            target,
            source_start: source_group,
            target_start: target_group,
            forced_mode: MergeMode::Default,
        })
    }

    /// Override every group's own merge-mode preference.
    pub fn set_forced_merge_mode(&mut self, mode: MergeMode) {
        self.forced_mode = mode;
    }

    pub fn reset_forced_merge_mode(&mut self) {
        self.forced_mode = MergeMode::Default;
    }

    /// Run the merge and return the ordered list of changes applied to
    /// the target.
    pub fn merge(&mut self) -> MergeResult<ChangeList> {
        // Structural merge can re-create nodes that deletion
        // reconciliation removes again, so the order is fixed.
        let root_context = MergeContext {
            source_group: self.source_start,
            target_group: self.target_start,
        };
        let mut changes = ChangeList::new();
        changes.extend(self.merge_group(root_context)?);
        changes.extend(self.merge_deletions(root_context)?);
        changes.extend(self.merge_metadata());

        if !changes.is_empty() {
            self.target.mark_modified();
        }
        Ok(changes)
    }

    pub(crate) fn effective_mode(&self, context: MergeContext) -> MergeMode {
        match self.forced_mode {
            MergeMode::Default => self.target.resolved_merge_mode(context.target_group),
            mode => mode,
        }
    }

    // ---------------------------------------------------------------
    // Structural merge
    // ---------------------------------------------------------------

    fn merge_group(&mut self, context: MergeContext) -> MergeResult<ChangeList> {
        let mut changes = ChangeList::new();
        let source = self.source;

        for uuid in source.entries_in(context.source_group).to_vec() {
            let Some(source_entry) = source.entry(uuid) else {
                continue;
            };
            if let Some(target_entry) = self.target.entry(uuid) {
                let relocated = target_entry.times().location_changed
                    < source_entry.times().location_changed;
                if relocated && target_entry.parent() != Some(context.target_group) {
                    changes.push(Change::for_entry(
                        ChangeType::Moved,
                        source,
                        source_entry,
                        "Relocating",
                    ));
                    self.move_entry(uuid, context.target_group)?;
                }
                changes.extend(self.resolve_entry_conflict(context, uuid)?);
            } else {
                // The entry does not exist anywhere in the target.
                changes.push(Change::for_entry(
                    ChangeType::Added,
                    source,
                    source_entry,
                    "Creating missing",
                ));
                self.adopt_entry(source_entry.clone(), context.target_group)?;
            }
        }

        for uuid in source.groups_in(context.source_group).to_vec() {
            let Some(source_child) = source.group(uuid) else {
                continue;
            };
            if let Some(target_child) = self.target.group(uuid) {
                let relocated = target_child.times().location_changed
                    < source_child.times().location_changed;
                if relocated && target_child.parent() != Some(context.target_group) {
                    changes.push(Change::for_group(
                        ChangeType::Moved,
                        source,
                        source_child,
                        "Relocating",
                    ));
                    self.move_group(uuid, context.target_group)?;
                    self.copy_location_stamp(uuid, source_child.times().location_changed);
                }
                changes.extend(self.resolve_group_conflict(uuid));
            } else {
                changes.push(Change::for_group(
                    ChangeType::Added,
                    source,
                    source_child,
                    "Creating missing",
                ));
                // Children and entries are discovered by the recursion.
                self.adopt_group(source_child.clone_shell(), context.target_group)?;
                self.copy_location_stamp(uuid, source_child.times().location_changed);
            }

            let subcontext = MergeContext {
                source_group: uuid,
                target_group: uuid,
            };
            changes.extend(self.merge_group(subcontext)?);
        }
        Ok(changes)
    }

    // ---------------------------------------------------------------
    // Conflict resolution
    // ---------------------------------------------------------------

    fn resolve_entry_conflict(
        &mut self,
        context: MergeContext,
        uuid: Uuid,
    ) -> MergeResult<ChangeList> {
        let mode = self.effective_mode(context);
        let max_items = self.target.metadata().history_max_items();
        let source = self.source;
        let mut changes = ChangeList::new();
        let (Some(source_entry), Some(target_entry)) = (source.entry(uuid), self.target.entry(uuid))
        else {
            return Ok(changes);
        };

        let comparison = clock::cmp_serialized(
            target_entry.times().last_modification_time,
            source_entry.times().last_modification_time,
        );
        if comparison == Ordering::Less {
            // The source's current version wins; the old target version
            // survives inside the rewritten history of the replacement.
            debug!(
                title = %target_entry.title(),
                uuid = %uuid,
                "adopting newer source version"
            );
            changes.push(Change::for_entry(
                ChangeType::Modified,
                self.target,
                target_entry,
                "Synchronizing from newer source",
            ));
            let parent = target_entry.parent().unwrap_or(context.target_group);
            let mut replacement = source_entry.clone();
            merge_entry_histories(target_entry, &mut replacement, mode, max_items);
            self.erase_entry(uuid)?;
            self.adopt_entry(replacement, parent)?;
        } else {
            debug!(
                title = %target_entry.title(),
                uuid = %uuid,
                "keeping local version on top"
            );
            let changed = {
                let Some(target_entry) = self.target.entry_mut(uuid) else {
                    return Ok(changes);
                };
                merge_entry_histories(source_entry, target_entry, mode, max_items)
            };
            if changed {
                if let Some(target_entry) = self.target.entry(uuid) {
                    changes.push(Change::for_entry(
                        ChangeType::Modified,
                        self.target,
                        target_entry,
                        "Synchronizing from older source",
                    ));
                }
            }
        }
        Ok(changes)
    }

    fn resolve_group_conflict(&mut self, uuid: Uuid) -> ChangeList {
        let source = self.source;
        let mut changes = ChangeList::new();
        let (Some(source_group), Some(target_group)) = (source.group(uuid), self.target.group(uuid))
        else {
            return changes;
        };

        let time_existing = target_group.times().last_modification_time;
        let time_other = source_group.times().last_modification_time;
        // Only a newer source overwrites the existing properties.
        if time_existing >= time_other {
            return changes;
        }
        changes.push(Change::for_group(
            ChangeType::Modified,
            self.target,
            target_group,
            "Overwriting group properties",
        ));

        let expiry = source_group.times().expiry_time;
        let (name, notes, icon) = (
            source_group.name().to_string(),
            source_group.notes().to_string(),
            source_group.icon(),
        );
        if let Some(target_group) = self.target.group_mut(uuid) {
            target_group.set_name(name);
            target_group.set_notes(notes);
            target_group.set_icon(icon);
            let mut times = *target_group.times();
            times.last_modification_time = time_other;
            times.expiry_time = expiry;
            target_group.set_time_info(times);
        }
        changes
    }

    // ---------------------------------------------------------------
    // Tree mutation helpers
    // ---------------------------------------------------------------

    /// Reparent a target entry without disturbing any recorded
    /// `TimeInfo` on the entry or either group.
    pub(crate) fn move_entry(&mut self, entry: Uuid, new_parent: Uuid) -> MergeResult<()> {
        let old_parent = self.target.entry(entry).and_then(|e| e.parent());
        if old_parent == Some(new_parent) {
            return Ok(());
        }
        let mut participants = vec![entry, new_parent];
        participants.extend(old_parent);
        let mut pause = self.target.pause_timeinfo(&participants);
        pause.db().relocate_entry(entry, new_parent)?;
        Ok(())
    }

    /// Reparent a target group without disturbing any recorded
    /// `TimeInfo` on the group or either parent.
    pub(crate) fn move_group(&mut self, group: Uuid, new_parent: Uuid) -> MergeResult<()> {
        let old_parent = self.target.group(group).and_then(|g| g.parent());
        if old_parent == Some(new_parent) {
            return Ok(());
        }
        let mut participants = vec![group, new_parent];
        participants.extend(old_parent);
        let mut pause = self.target.pause_timeinfo(&participants);
        pause.db().relocate_group(group, new_parent)?;
        Ok(())
    }

    /// Attach a detached entry under a target group, preserving the
    /// entry's recorded `TimeInfo` through the insertion.
    pub(crate) fn adopt_entry(&mut self, mut entry: Entry, parent: Uuid) -> MergeResult<()> {
        let uuid = entry.uuid();
        let prior = entry.can_update_timeinfo();
        entry.set_update_timeinfo(false);
        let mut pause = self.target.pause_timeinfo(&[parent]);
        pause.db().attach_entry(entry, parent)?;
        drop(pause);
        if let Some(adopted) = self.target.entry_mut(uuid) {
            adopted.set_update_timeinfo(prior);
        }
        Ok(())
    }

    /// Attach a detached group shell under a target group, preserving
    /// its recorded `TimeInfo` through the insertion.
    pub(crate) fn adopt_group(&mut self, mut group: Group, parent: Uuid) -> MergeResult<()> {
        let uuid = group.uuid();
        let prior = group.can_update_timeinfo();
        group.set_update_timeinfo(false);
        let mut pause = self.target.pause_timeinfo(&[parent]);
        pause.db().attach_group(group, parent)?;
        drop(pause);
        if let Some(adopted) = self.target.group_mut(uuid) {
            adopted.set_update_timeinfo(prior);
        }
        Ok(())
    }

    /// Remove a target entry without emitting a tombstone and without
    /// touching the parent's `TimeInfo`. The engine writes its own
    /// consolidated tombstone list during deletion reconciliation.
    pub(crate) fn erase_entry(&mut self, entry: Uuid) -> MergeResult<()> {
        let participants: Vec<Uuid> = self
            .target
            .entry(entry)
            .and_then(|e| e.parent())
            .into_iter()
            .collect();
        let mut pause = self.target.pause_timeinfo(&participants);
        pause.db().remove_entry_without_tombstone(entry)?;
        Ok(())
    }

    /// Remove a target group without emitting tombstones and without
    /// touching the parent's `TimeInfo`.
    pub(crate) fn erase_group(&mut self, group: Uuid) -> MergeResult<()> {
        let participants: Vec<Uuid> = self
            .target
            .group(group)
            .and_then(|g| g.parent())
            .into_iter()
            .collect();
        let mut pause = self.target.pause_timeinfo(&participants);
        pause.db().remove_group_without_tombstone(group)?;
        Ok(())
    }

    fn copy_location_stamp(&mut self, group: Uuid, location_changed: chrono::DateTime<chrono::Utc>) {
        if let Some(target_group) = self.target.group_mut(group) {
            let mut times = *target_group.times();
            times.location_changed = location_changed;
            target_group.set_time_info(times);
        }
    }
}
