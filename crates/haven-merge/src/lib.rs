//! Structural merge engine for Haven vaults.
//!
//! Reconciles a *source* database into a *target* database in a single
//! pass of three sequential phases: the structural tree walk (create,
//! move, overwrite), tombstone-driven deletion reconciliation, and the
//! metadata merge. Every mutation is reported as a [`Change`] so the
//! caller can audit or present the outcome.
//!
//! There is no common ancestor: the engine decides pairwise, using
//! second-precision timestamps and recorded tombstones as surrogates for
//! causality. The phase order is load-bearing; the structural walk may
//! re-create a node whose tombstone exists on the other side, and
//! deletion reconciliation then decides whether the re-creation stands.
//!
//! # Example
//!
//! ```
//! use haven_merge::Merger;
//! use haven_model::Database;
//!
//! let source = Database::new();
//! let mut target = Database::new();
//! let changes = Merger::new(&source, &mut target).merge().unwrap();
//! assert!(changes.is_empty());
//! ```

pub mod change;
mod deletions;
pub mod error;
mod history;
mod metadata;
pub mod merger;

pub use change::{Change, ChangeList, ChangeType};
pub use error::{MergeError, MergeResult};
pub use merger::Merger;
