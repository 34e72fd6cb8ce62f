//! Database-wide key/value data carried by plugins and integrations.
//!
//! The reserved `LastModified` key records when the map last changed and
//! is refreshed automatically by [`set`](CustomData::set) and
//! [`remove`](CustomData::remove). A key can also be marked *protected*,
//! which shields it from removal-propagation during replica
//! reconciliation even when no value for it is present locally.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock;

/// A single custom-data value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDataItem {
    pub value: String,
}

/// Ordered key/value data with a reserved modification stamp.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomData {
    #[serde(default)]
    items: BTreeMap<String, CustomDataItem>,
    /// Keys shielded from removal-propagation. A key may be protected
    /// without carrying a value here.
    #[serde(default)]
    protected: BTreeSet<String>,
}

impl CustomData {
    /// The reserved key holding the map's own modification stamp.
    pub const LAST_MODIFIED: &'static str = "LastModified";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(|item| item.value.as_str())
    }

    pub fn is_protected(&self, key: &str) -> bool {
        self.protected.contains(key)
    }

    /// All keys, in map order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Set a value. Refreshes `LastModified` unless that is the key
    /// being written.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let refresh = key != Self::LAST_MODIFIED;
        self.items.insert(
            key,
            CustomDataItem {
                value: value.into(),
            },
        );
        if refresh {
            self.stamp_last_modified(clock::now());
        }
    }

    /// Remove a key and its protection mark. Refreshes `LastModified`
    /// when something was actually removed.
    pub fn remove(&mut self, key: &str) -> Option<CustomDataItem> {
        let removed = self.items.remove(key);
        self.protected.remove(key);
        if removed.is_some() && key != Self::LAST_MODIFIED {
            self.stamp_last_modified(clock::now());
        }
        removed
    }

    /// Mark or unmark a key as protected from removal-propagation.
    pub fn set_protected(&mut self, key: impl Into<String>, protected: bool) {
        let key = key.into();
        if protected {
            self.protected.insert(key);
        } else {
            self.protected.remove(&key);
        }
    }

    /// The parsed `LastModified` stamp, if present and well-formed.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        let raw = self.value(Self::LAST_MODIFIED)?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Overwrite the `LastModified` stamp directly.
    pub fn stamp_last_modified(&mut self, t: DateTime<Utc>) {
        self.items.insert(
            Self::LAST_MODIFIED.to_string(),
            CustomDataItem {
                value: clock::serialized(t).to_rfc3339(),
            },
        );
    }
}
