//! Error types for world-model operations.
//!
//! Only recoverable failures live here. Broken edge contracts (asking a
//! factor for an edge past its count) panic at the call site instead.

use crate::world_model::Id;

/// Result type alias
pub type Result<T> = std::result::Result<T, WorldModelError>;

/// World model error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldModelError {
    /// The invalid sentinel was used where a real id is required
    #[error("invalid id used as {0}")]
    InvalidId(&'static str),

    /// No entity with this id
    #[error("unknown entity {0}")]
    UnknownEntity(Id),

    /// No factor with this id
    #[error("unknown factor {0}")]
    UnknownFactor(Id),

    /// Entity cannot be removed while other objects still reference it
    #[error("entity {id} is still referenced by {referenced_by}")]
    EntityInUse {
        /// Entity that was asked to be removed
        id: Id,
        /// First entity or factor found referencing it
        referenced_by: Id,
    },

    /// Operation requires an entity in relative parameterization
    #[error("entity {0} does not store relative state")]
    NotRelative(Id),

    /// Value does not fit the entity's kind (e.g. twist on a pose-only keyframe)
    #[error("value does not match entity kind: {0}")]
    KindMismatch(&'static str),
}
