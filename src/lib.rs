//! Floorplan Editor - headless editing core for office floor layouts
//!
//! This library keeps the spaces (polygons) and desks (rotated rectangles)
//! of a floor consistent while they are edited: desks never overlap, stay
//! inside their space, and snap to each other; spaces never intersect.
//! Edits are applied locally at once and journalled until they are saved
//! through a [`Storage`] implementation.
//!
//! # Example
//!
//! ```rust
//! use floorplan_editor::{
//!     EditorConfig, LayoutSession, MemoryStorage, Point, SpaceKind, SpacePayload,
//! };
//! use floorplan_editor::storage::Payload;
//!
//! let storage = MemoryStorage::new();
//! storage.seed(Payload::Space(SpacePayload {
//!     floor_id: 1,
//!     name: "Open area".to_string(),
//!     kind: SpaceKind::Coworking,
//!     color: String::new(),
//!     points: vec![
//!         Point::new(0.0, 0.0),
//!         Point::new(600.0, 0.0),
//!         Point::new(600.0, 400.0),
//!         Point::new(0.0, 400.0),
//!     ],
//! }));
//!
//! let mut session =
//!     pollster::block_on(LayoutSession::open(storage, 1, EditorConfig::default())).unwrap();
//! session.enter_edit_mode().unwrap();
//! let space = *session.spaces().keys().next().unwrap();
//! session.add_desk(space, None, None).unwrap();
//!
//! let receipt = pollster::block_on(session.save()).unwrap();
//! assert_eq!(receipt.desk_ids.len(), 1);
//! ```

pub mod booking;
pub mod buffer;
pub mod config;
pub mod editor;
pub mod error;
pub mod floor_file;
pub mod geometry;
pub mod model;
pub mod scene;
pub mod session;
pub mod solver;
pub mod storage;

pub use booking::{BookingGuard, BookingStatusSource, BookingTicket};
pub use buffer::{BufferBatch, PendingEditBuffer};
pub use config::{ConfigError, EditorConfig};
pub use editor::{DeskAction, EditorState, Handle, Modifiers, Selection};
pub use error::{EditError, FlushError, FlushPhase, SaveError};
pub use floor_file::{FloorFile, FloorFileError};
pub use geometry::{do_obbs_overlap, is_point_inside_polygon, BoundingBox, Obb, Point};
pub use model::{
    BookingStatus, Desk, DeskPatch, DeskPayload, EntityId, EntityKind, Space, SpaceKind,
    SpacePatch, SpacePayload,
};
pub use scene::{EntityRef, HeadlessScene, SceneNode, SceneSurface, Viewport};
pub use session::{FlushBatch, FlushOutcome, FlushReceipt, LayoutSession};
pub use solver::PlacementSolver;
pub use storage::{MemoryStorage, Storage, StorageError};
