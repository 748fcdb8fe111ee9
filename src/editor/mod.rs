//! Interactive editing: desk manipulation, space polygons, selection
//!
//! All interaction state lives in one [`EditorState`] value that the
//! transition functions take explicitly, so independent editors never share
//! state.

pub mod desk;
pub mod hit;
pub mod selection;
pub mod snap;
pub mod space;

pub use desk::{DeskAction, DeskEngine, DeskInteraction, DragState};
pub use hit::{DeskHit, Handle};
pub use selection::{group_bounds, GroupMember, GroupResize, Selection};
pub use snap::{snap_desk_center, snap_rotation};
pub use space::SpaceInteraction;

/// Keyboard modifiers held during a pointer event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Toggle selection membership instead of replacing the selection
    pub multi_select: bool,
    /// Lock lasso segments to horizontal/vertical; keeps the aspect ratio
    /// when resizing a group from a corner
    pub axis_lock: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        multi_select: false,
        axis_lock: false,
    };

    pub fn multi_select() -> Self {
        Self {
            multi_select: true,
            ..Self::NONE
        }
    }

    pub fn axis_lock() -> Self {
        Self {
            axis_lock: true,
            ..Self::NONE
        }
    }
}

/// Everything the editor remembers between pointer events
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub edit_mode: bool,
    pub floor_plan_loaded: bool,
    /// Current zoom factor of the view; handle sizes are divided by it
    pub zoom: f64,
    pub selection: Selection,
    pub desk: DeskInteraction,
    pub space: SpaceInteraction,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            edit_mode: false,
            floor_plan_loaded: false,
            zoom: 1.0,
            selection: Selection::new(),
            desk: DeskInteraction::Idle,
            space: SpaceInteraction::Idle,
        }
    }
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// No desk gesture and no lasso in progress
    pub fn is_idle(&self) -> bool {
        matches!(self.desk, DeskInteraction::Idle)
            && !matches!(
                self.space,
                SpaceInteraction::Drawing { .. } | SpaceInteraction::Drafted { .. }
            )
    }

    /// Drop gestures and selection, keeping mode flags and zoom
    pub fn reset_interaction(&mut self) {
        self.selection.clear();
        self.desk = DeskInteraction::Idle;
        self.space = SpaceInteraction::Idle;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom;
        }
    }
}
