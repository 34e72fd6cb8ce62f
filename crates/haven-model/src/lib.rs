//! Vault data model for Haven.
//!
//! This crate provides the tree-shaped credential store that the merge
//! engine (`haven-merge`) reads and mutates: a [`Database`] owning groups
//! and entries keyed by UUID, wall-clock [`TimeInfo`] on every node,
//! tombstones for deleted nodes, and database-wide [`Metadata`].
//!
//! # Key Types
//!
//! - [`Database`] — owns every live node and the tombstone list; the tree
//!   structure is encoded through per-group ordered child lists
//! - [`Group`] — a container node with a per-subtree [`MergeMode`]
//! - [`Entry`] — a credential record with named fields and version history
//! - [`TimeInfo`] — the five wall-clock stamps carried by every node
//! - [`DeletedObject`] — a tombstone: UUID plus deletion time
//! - [`Metadata`] / [`CustomData`] — custom icons and key/value data
//!
//! Timestamps are persisted at whole-second resolution; the [`clock`]
//! module holds the truncation and comparison helpers used everywhere.

pub mod clock;
pub mod custom_data;
pub mod database;
pub mod entry;
pub mod error;
pub mod group;
pub mod icon;
pub mod metadata;
pub mod timeinfo;

pub use custom_data::{CustomData, CustomDataItem};
pub use database::{Database, DeletedObject, TimeinfoPause};
pub use entry::{Entry, EntryCompare, FieldValue};
pub use error::{ModelError, ModelResult};
pub use group::{Group, MergeMode};
pub use icon::Icon;
pub use metadata::{CustomIcon, Metadata, DEFAULT_HISTORY_MAX_ITEMS};
pub use timeinfo::TimeInfo;
