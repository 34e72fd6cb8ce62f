//! The audit record produced for every mutation the engine performs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use haven_model::{Database, Entry, Group};

/// What kind of mutation a [`Change`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Modified,
    Moved,
    Deleted,
    /// Bookkeeping changes with no single affected node (tombstone list,
    /// metadata).
    Unspecified,
}

impl ChangeType {
    /// Display label; empty for [`Unspecified`](ChangeType::Unspecified).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Modified => "Modified",
            Self::Moved => "Moved",
            Self::Deleted => "Deleted",
            Self::Unspecified => "",
        }
    }
}

/// One reported mutation: what happened, to which node, where.
///
/// Changes are produced by the engine and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub change_type: ChangeType,
    /// Full path of the affected group, or of the affected entry's
    /// group. Empty when no group applies.
    pub group: String,
    /// The affected entry's title. Empty for group and bookkeeping
    /// changes.
    pub title: String,
    pub uuid: Option<Uuid>,
    pub details: String,
}

impl Change {
    /// A change affecting an entry. The group path is resolved against
    /// the database the entry lives in.
    pub fn for_entry(
        change_type: ChangeType,
        db: &Database,
        entry: &Entry,
        details: impl Into<String>,
    ) -> Self {
        Self {
            change_type,
            group: entry.parent().map(|p| db.full_path(p)).unwrap_or_default(),
            title: entry.title().to_string(),
            uuid: Some(entry.uuid()),
            details: details.into(),
        }
    }

    /// A change affecting a group.
    pub fn for_group(
        change_type: ChangeType,
        db: &Database,
        group: &Group,
        details: impl Into<String>,
    ) -> Self {
        Self {
            change_type,
            group: db.full_path(group.uuid()),
            title: String::new(),
            uuid: Some(group.uuid()),
            details: details.into(),
        }
    }

    /// A bookkeeping change with no affected node.
    pub fn unspecified(details: impl Into<String>) -> Self {
        Self {
            change_type: ChangeType::Unspecified,
            group: String::new(),
            title: String::new(),
            uuid: None,
            details: details.into(),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.change_type != ChangeType::Unspecified {
            write!(f, "{}: ", self.change_type.as_str())?;
        }
        if !self.group.is_empty() {
            write!(f, "'{}'", self.group)?;
        }
        if !self.title.is_empty() {
            write!(f, "/'{}'", self.title)?;
        }
        if let Some(uuid) = self.uuid {
            write!(f, " [{uuid}]")?;
        }
        if !self.details.is_empty() {
            write!(f, " ({})", self.details)?;
        }
        Ok(())
    }
}

/// The ordered list of changes one merge produced.
pub type ChangeList = Vec<Change>;
