use thiserror::Error;
use uuid::Uuid;

use haven_model::ModelError;

/// Errors produced by the merge engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// A group UUID passed to the constructor does not exist in its
    /// database.
    #[error("group {0} does not exist in the given database")]
    UnknownGroup(Uuid),

    /// A tree mutation on the target failed mid-merge.
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type MergeResult<T> = Result<T, MergeError>;
