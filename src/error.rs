//! Error types for local edit validation and remote reconciliation

use thiserror::Error;

use crate::model::{EntityId, EntityKind};
use crate::storage::StorageError;

/// An edit rejected locally, before anything reaches the storage collaborator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EditError {
    /// A polygon needs at least three vertices
    #[error("a space needs at least 3 points (got {count})")]
    InsufficientVertices { count: usize },

    /// The polygon overlaps one or more committed spaces
    #[error("space overlaps existing spaces: {}", names.join(", "))]
    SpaceOverlap { names: Vec<String> },

    /// No legal position exists for the rectangle(s) inside the bounds
    #[error("no free position for {what} inside the space")]
    NoFreePosition { what: String },

    /// The desk would overlap another desk
    #[error("desk {id} would overlap desk(s) {}", format_ids(others))]
    Overlap { id: EntityId, others: Vec<EntityId> },

    /// The desk would leave its space's bounds
    #[error("desk {id} does not fit inside its space")]
    DeskOutOfBounds { id: EntityId },

    /// A coordinate was NaN or infinite
    #[error("invalid coordinates in {kind} payload")]
    InvalidCoordinates { kind: EntityKind },

    /// Lasso operations require an active lasso
    #[error("no lasso is being drawn")]
    NotDrawing,

    /// A lasso is already active
    #[error("a lasso is already being drawn")]
    AlreadyDrawing,

    /// Layout edits require edit mode
    #[error("edit mode is not active")]
    EditModeRequired,

    /// Drawing requires a loaded floor plan
    #[error("no floor plan is loaded")]
    FloorPlanMissing,

    /// Leaving edit mode with unsaved edits
    #[error("{count} unsaved edit(s); save or reload first")]
    UnsavedEdits { count: usize },

    /// Reference to an entity that does not exist locally
    #[error("unknown {kind} {id}")]
    UnknownEntity { kind: EntityKind, id: EntityId },

    /// Vertex index outside the polygon
    #[error("vertex {index} out of range for a polygon with {count} points")]
    VertexOutOfRange { index: usize, count: usize },

    /// Double-click was not close enough to any edge
    #[error("point is not on an edge of the space")]
    NotOnEdge,

    /// Double-click missed every vertex handle
    #[error("point is not on a vertex of the space")]
    NotOnVertex,

    /// Desks can only be placed in coworking spaces
    #[error("space {id} is not a coworking space")]
    WrongSpaceKind { id: EntityId },

    /// A structural edit was attempted while a flush is outstanding
    #[error("a save is in progress")]
    FlushInProgress,

    /// A previous flush failed; authoritative state must be reloaded first
    #[error("local state diverged from storage; reload before editing")]
    StaleState,
}

impl EditError {
    /// Create a space overlap error listing the conflicting space names
    pub fn overlap(names: Vec<String>) -> Self {
        Self::SpaceOverlap { names }
    }

    /// Create a no-free-position error
    pub fn no_free_position(what: impl Into<String>) -> Self {
        Self::NoFreePosition { what: what.into() }
    }

    /// Create an unknown entity error
    pub fn unknown(kind: EntityKind, id: EntityId) -> Self {
        Self::UnknownEntity { kind, id }
    }
}

fn format_ids(ids: &[EntityId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Step of a flush at which a remote call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPhase {
    Create(EntityKind),
    Update(EntityKind),
    Delete(EntityKind),
}

impl std::fmt::Display for FlushPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushPhase::Create(kind) => write!(f, "create {}s", kind),
            FlushPhase::Update(kind) => write!(f, "update {}s", kind),
            FlushPhase::Delete(kind) => write!(f, "delete {}s", kind),
        }
    }
}

/// A flush stopped part way; remote operations already applied are kept
#[derive(Debug, Error)]
#[error("save failed during {phase} after {applied} remote operation(s)")]
pub struct FlushError {
    pub phase: FlushPhase,
    pub applied: usize,
    #[source]
    pub source: StorageError,
}

/// Failure of a whole save round-trip
#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Flush(#[from] FlushError),
}
