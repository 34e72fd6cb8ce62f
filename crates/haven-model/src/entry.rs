//! Credential entries and their version history.
//!
//! An [`Entry`] is edited as a unit: each prior version is preserved whole
//! inside the entry's `history` list, ordered oldest to newest. History
//! items are themselves entries, with no history and no parent of their own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock;
use crate::icon::Icon;
use crate::timeinfo::TimeInfo;

/// A single named field value on an entry.
///
/// `protected` marks secrets (passwords, TOTP seeds) that the surrounding
/// application keeps encrypted in memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
    #[serde(default)]
    pub protected: bool,
}

impl FieldValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            protected: false,
        }
    }

    pub fn protected(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            protected: true,
        }
    }
}

/// Selects which parts of two entries take part in a comparison.
///
/// The merge engine never compares entries bit for bit: persisted
/// timestamps carry whole seconds only, a relocation is not a content
/// edit, and history is resolved separately from the current version.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntryCompare {
    /// Compare timestamps at the persisted (whole-second) resolution.
    pub serialized_times: bool,
    /// Skip the history lists.
    pub ignore_history: bool,
    /// Skip `location_changed`.
    pub ignore_location: bool,
}

impl EntryCompare {
    /// Second-precision comparison of everything, history included.
    pub fn serialized() -> Self {
        Self {
            serialized_times: true,
            ..Self::default()
        }
    }

    /// Second-precision comparison of the current version's content only.
    pub fn content_only() -> Self {
        Self {
            serialized_times: true,
            ignore_history: true,
            ignore_location: true,
        }
    }
}

/// A credential record: title, named fields, icon, timestamps, history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    uuid: Uuid,
    title: String,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    icon: Icon,
    times: TimeInfo,
    #[serde(default)]
    history: Vec<Entry>,
    /// Set by the owning database; `None` for detached clones and
    /// history items.
    #[serde(default)]
    pub(crate) parent: Option<Uuid>,
    #[serde(skip, default = "default_true")]
    update_timeinfo: bool,
}

fn default_true() -> bool {
    true
}

impl Entry {
    /// Create an entry with a fresh random UUID.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_uuid(Uuid::new_v4(), title)
    }

    /// Create an entry with an explicit UUID (replica-stable identity).
    pub fn with_uuid(uuid: Uuid, title: impl Into<String>) -> Self {
        Self {
            uuid,
            title: title.into(),
            fields: BTreeMap::new(),
            icon: Icon::default(),
            times: TimeInfo::now(),
            history: Vec::new(),
            parent: None,
            update_timeinfo: true,
        }
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn icon(&self) -> Icon {
        self.icon
    }

    pub fn times(&self) -> &TimeInfo {
        &self.times
    }

    /// The UUID of the group this entry lives under, if attached.
    pub fn parent(&self) -> Option<Uuid> {
        self.parent
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
        self.touch();
    }

    pub fn remove_field(&mut self, name: &str) -> Option<FieldValue> {
        let removed = self.fields.remove(name);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn set_icon(&mut self, icon: Icon) {
        self.icon = icon;
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

    // ---------------------------------------------------------------
    // History
    // ---------------------------------------------------------------

    /// Prior versions, oldest first.
    pub fn history(&self) -> &[Entry] {
        &self.history
    }

    /// Append a version to the history. Does not touch this entry's
    /// own `TimeInfo`.
    pub fn add_history_item(&mut self, item: Entry) {
        self.history.push(item);
    }

    /// Replace the whole history list. Does not touch this entry's
    /// own `TimeInfo`.
    pub fn replace_history(&mut self, history: Vec<Entry>) {
        self.history = history;
    }

    /// Drop the oldest versions until at most `max_items` remain. Does
    /// not touch this entry's own `TimeInfo`.
    pub fn truncate_history(&mut self, max_items: usize) {
        if self.history.len() > max_items {
            let excess = self.history.len() - max_items;
            self.history.drain(..excess);
        }
    }

    /// A snapshot of the current version, suitable for storing in a
    /// history list: same content, no history, no parent.
    pub fn to_history_item(&self) -> Entry {
        let mut item = self.clone();
        item.history.clear();
        item.parent = None;
        item.update_timeinfo = true;
        item
    }

    // ---------------------------------------------------------------
    // Comparison
    // ---------------------------------------------------------------

    /// Flag-driven equality; see [`EntryCompare`].
    pub fn matches(&self, other: &Entry, cmp: EntryCompare) -> bool {
        if self.uuid != other.uuid
            || self.title != other.title
            || self.fields != other.fields
            || self.icon != other.icon
        {
            return false;
        }
        let times_match = if cmp.serialized_times {
            self.times
                .matches_serialized(&other.times, cmp.ignore_location)
        } else {
            self.times.creation_time == other.times.creation_time
                && self.times.last_modification_time == other.times.last_modification_time
                && self.times.last_access_time == other.times.last_access_time
                && (cmp.ignore_location
                    || self.times.location_changed == other.times.location_changed)
                && self.times.expiry_time == other.times.expiry_time
        };
        if !times_match {
            return false;
        }
        if !cmp.ignore_history {
            if self.history.len() != other.history.len() {
                return false;
            }
            let inner = EntryCompare {
                ignore_history: true,
                ..cmp
            };
            for (a, b) in self.history.iter().zip(&other.history) {
                if !a.matches(b, inner) {
                    return false;
                }
            }
        }
        true
    }
}
