use thiserror::Error;
use uuid::Uuid;

/// Errors produced by tree mutation on a [`Database`](crate::Database).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("no group with UUID {0} exists in this database")]
    UnknownGroup(Uuid),

    #[error("no entry with UUID {0} exists in this database")]
    UnknownEntry(Uuid),

    #[error("a node with UUID {0} already exists in this database")]
    DuplicateUuid(Uuid),

    #[error("moving group {group} under {new_parent} would create a cycle")]
    WouldCreateCycle { group: Uuid, new_parent: Uuid },

    #[error("the root group cannot be relocated or removed")]
    RootMutation,
}

pub type ModelResult<T> = Result<T, ModelError>;
