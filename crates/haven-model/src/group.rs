//! Container groups and the per-subtree merge policy.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock;
use crate::icon::Icon;
use crate::timeinfo::TimeInfo;

/// Per-subtree policy for how replica reconciliation treats this group.
///
/// Every mode shares the same structural and history behavior; only
/// [`Synchronize`](MergeMode::Synchronize) additionally applies deletions
/// recorded on the other replica.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeMode {
    /// Inherit the mode of the target group being merged into.
    #[default]
    Default,
    /// Keep both sides of a conflict as separate nodes.
    Duplicate,
    /// Prefer the target side of a conflict.
    KeepLocal,
    /// Prefer the source side of a conflict.
    KeepRemote,
    /// Prefer whichever side was modified last.
    KeepNewer,
    /// Full bidirectional synchronization, deletions included.
    Synchronize,
}

/// A container node in the credential tree.
///
/// Child ordering is owned here (`group_ids` / `entry_ids`); the nodes
/// themselves are owned by the [`Database`](crate::Database) maps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    uuid: Uuid,
    name: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    icon: Icon,
    times: TimeInfo,
    #[serde(default)]
    merge_mode: MergeMode,
    #[serde(default)]
    pub(crate) parent: Option<Uuid>,
    #[serde(default)]
    pub(crate) group_ids: Vec<Uuid>,
    #[serde(default)]
    pub(crate) entry_ids: Vec<Uuid>,
    #[serde(skip, default = "default_true")]
    update_timeinfo: bool,
}

fn default_true() -> bool {
    true
}

impl Group {
    /// Create a group with a fresh random UUID.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_uuid(Uuid::new_v4(), name)
    }

    /// Create a group with an explicit UUID (replica-stable identity).
    pub fn with_uuid(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            notes: String::new(),
            icon: Icon::default(),
            times: TimeInfo::now(),
            merge_mode: MergeMode::Default,
            parent: None,
            group_ids: Vec::new(),
            entry_ids: Vec::new(),
            update_timeinfo: true,
        }
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn icon(&self) -> Icon {
        self.icon
    }

    pub fn times(&self) -> &TimeInfo {
        &self.times
    }

    pub fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }

    /// The UUID of the parent group; `None` for the root and for
    /// detached shells.
    pub fn parent(&self) -> Option<Uuid> {
        self.parent
    }

    /// Child groups, in declared order.
    pub fn group_ids(&self) -> &[Uuid] {
        &self.group_ids
    }

    /// Child entries, in declared order.
    pub fn entry_ids(&self) -> &[Uuid] {
        &self.entry_ids
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
        self.touch();
    }

    pub fn set_icon(&mut self, icon: Icon) {
        self.icon = icon;
        self.touch();
    }

    pub fn set_merge_mode(&mut self, mode: MergeMode) {
        self.merge_mode = mode;
    }

    pub fn set_expiry_time(&mut self, expiry: Option<chrono::DateTime<chrono::Utc>>) {
        self.times.expiry_time = expiry;
        self.touch();
    }

    /// Overwrite the timestamps directly, bypassing auto-update.
    pub fn set_time_info(&mut self, times: TimeInfo) {
        self.times = times;
    }

    /// Whether mutating setters stamp `last_modification_time`.
    pub fn can_update_timeinfo(&self) -> bool {
        self.update_timeinfo
    }

    pub fn set_update_timeinfo(&mut self, update: bool) {
        self.update_timeinfo = update;
    }

    pub(crate) fn touch(&mut self) {
        if self.update_timeinfo {
            let now = clock::now();
            self.times.last_modification_time = now;
            self.times.last_access_time = now;
        }
    }

    /// A copy of the group's own properties with empty child lists and
    /// no parent. Children are not carried over; callers that need the
    /// subtree attach them afterwards.
    pub fn clone_shell(&self) -> Group {
        Group {
            uuid: self.uuid,
            name: self.name.clone(),
            notes: self.notes.clone(),
            icon: self.icon,
            times: self.times,
            merge_mode: self.merge_mode,
            parent: None,
            group_ids: Vec::new(),
            entry_ids: Vec::new(),
            update_timeinfo: true,
        }
    }
}
