//! Desk interaction state machine
//!
//! ```text
//! Idle --down on desk body------> Dragging ------up--> Idle
//! Idle --down on resize handle--> Resizing ------up--> Idle
//! Idle --down on rotate handle--> Rotating ------up--> Idle
//! Idle --down on group handle---> GroupResizing -up--> Idle
//! ```
//!
//! Each pointer-move proposes new geometry, snaps it, clamps it to the owning
//! space's bounds and checks it against the other desks before applying it to
//! the local desk. Pointer-up turns the net change of the gesture into
//! [`DeskAction::Commit`]s for the edit buffer.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::buffer::PatchMerge;
use crate::config::EditorConfig;
use crate::editor::hit::{hit_desk, hit_group_handle, DeskHit, Handle};
use crate::editor::selection::{group_bounds, GroupMember, GroupResize};
use crate::editor::snap::{snap_desk_center, snap_rotation};
use crate::editor::{EditorState, Modifiers};
use crate::geometry::{do_obbs_overlap, normalize_degrees, BoundingBox, Obb, Point, EPSILON};
use crate::model::{Desk, DeskPatch, EntityId, Space};
use crate::solver::{clamp_to_bounds, PlacementSolver};

/// A drag of one desk or of the whole selection
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    /// Desk under the pointer; snapping follows this one
    pub anchor: EntityId,
    /// Anchor center minus the pointer at pointer-down
    pub grab_offset: Point,
    /// Every moving desk as it was at pointer-down
    pub start: Vec<Desk>,
    /// Translation currently applied to all moving desks
    pub offset: Point,
}

/// The desk gesture in progress
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DeskInteraction {
    #[default]
    Idle,
    Dragging(DragState),
    Resizing {
        handle: Handle,
        start: Desk,
    },
    Rotating {
        start: Desk,
    },
    GroupResizing {
        handle: Handle,
        resize: GroupResize,
        start: Vec<Desk>,
    },
}

impl DeskInteraction {
    pub fn name(&self) -> &'static str {
        match self {
            DeskInteraction::Idle => "idle",
            DeskInteraction::Dragging(_) => "dragging",
            DeskInteraction::Resizing { .. } => "resizing",
            DeskInteraction::Rotating { .. } => "rotating",
            DeskInteraction::GroupResizing { .. } => "group-resizing",
        }
    }

    /// Desk snapshots held by the gesture
    fn snapshots_mut(&mut self) -> Vec<&mut Desk> {
        match self {
            DeskInteraction::Idle => Vec::new(),
            DeskInteraction::Dragging(drag) => drag.start.iter_mut().collect(),
            DeskInteraction::Resizing { start, .. } | DeskInteraction::Rotating { start } => {
                vec![start]
            }
            DeskInteraction::GroupResizing { start, .. } => start.iter_mut().collect(),
        }
    }

    /// Follow a desk whose temp id was replaced by a server id mid-gesture
    pub fn remap_desk(&mut self, from: EntityId, to: EntityId) {
        for desk in self.snapshots_mut() {
            if desk.id == from {
                desk.id = to;
            }
        }
        match self {
            DeskInteraction::Dragging(drag) if drag.anchor == from => drag.anchor = to,
            DeskInteraction::GroupResizing { resize, .. } => {
                for member in resize.members.iter_mut().filter(|m| m.id == from) {
                    member.id = to;
                }
            }
            _ => {}
        }
    }

    /// Follow a space whose temp id was replaced by a server id mid-gesture
    pub fn remap_space(&mut self, from: EntityId, to: EntityId) {
        for desk in self.snapshots_mut() {
            if desk.space_id == from {
                desk.space_id = to;
            }
        }
    }
}

/// Effect of a pointer event
#[derive(Debug, Clone, PartialEq)]
pub enum DeskAction {
    SelectionChanged,
    /// Local geometry of the desk changed
    Changed(EntityId),
    /// A finished gesture changed the desk; journal the patch
    Commit { id: EntityId, patch: DeskPatch },
}

/// Pointer handling over the desks of a floor
pub struct DeskEngine<'a> {
    pub desks: &'a mut BTreeMap<EntityId, Desk>,
    pub spaces: &'a BTreeMap<EntityId, Space>,
    pub config: &'a EditorConfig,
}

/// New size and local center offset along one axis of a resized desk.
///
/// The edge opposite the grabbed one stays where it was.
fn resize_axis(sign: f64, pointer: f64, size: f64, min_size: f64) -> (f64, f64) {
    if sign == 0.0 {
        return (size, 0.0);
    }
    let anchor = -sign * size / 2.0;
    let new_size = ((pointer - anchor) * sign).max(min_size);
    (new_size, anchor + sign * new_size / 2.0)
}

impl<'a> DeskEngine<'a> {
    pub fn new(
        desks: &'a mut BTreeMap<EntityId, Desk>,
        spaces: &'a BTreeMap<EntityId, Space>,
        config: &'a EditorConfig,
    ) -> Self {
        Self {
            desks,
            spaces,
            config,
        }
    }

    /// Topmost desk under the point
    pub fn desk_at(&self, point: Point) -> Option<EntityId> {
        self.desks
            .values()
            .rev()
            .find(|d| d.obb().contains_point(point))
            .map(|d| d.id)
    }

    fn space_bounds(&self, desk: &Desk) -> Option<BoundingBox> {
        self.spaces.get(&desk.space_id).and_then(Space::bounds)
    }

    fn solver(&self) -> PlacementSolver {
        PlacementSolver::new(self.desks.values(), self.config.snap_distance)
    }

    pub fn pointer_down(
        &mut self,
        state: &mut EditorState,
        point: Point,
        modifiers: Modifiers,
    ) -> Vec<DeskAction> {
        if !matches!(state.desk, DeskInteraction::Idle) || !point.is_finite() {
            return Vec::new();
        }

        if state.edit_mode {
            if let Some(interaction) = self.grab_handle(state, point) {
                debug!(interaction = interaction.name(), "desk gesture started");
                state.desk = interaction;
                return Vec::new();
            }
        }

        let mut actions = Vec::new();
        match self.desk_at(point) {
            Some(id) => {
                if modifiers.multi_select {
                    state.selection.toggle(id);
                    actions.push(DeskAction::SelectionChanged);
                } else if !state.selection.contains(id) {
                    state.selection.select_only(id);
                    actions.push(DeskAction::SelectionChanged);
                }
                if state.edit_mode && state.selection.contains(id) {
                    let drag = self.begin_drag(state, id, point);
                    debug!(anchor = %id, desks = drag.start.len(), "desk gesture started");
                    state.desk = DeskInteraction::Dragging(drag);
                }
            }
            None => {
                if !modifiers.multi_select && !state.selection.is_empty() {
                    state.selection.clear();
                    actions.push(DeskAction::SelectionChanged);
                }
            }
        }
        actions
    }

    /// Handle of the current selection under the pointer, if any
    fn grab_handle(&self, state: &EditorState, point: Point) -> Option<DeskInteraction> {
        let radius = self.config.handle_radius_at(state.zoom);

        if let Some(id) = state.selection.single() {
            let desk = self.desks.get(&id)?;
            let offset = self.config.rotate_offset_at(state.zoom);
            return match hit_desk(&desk.obb(), point, radius, offset)? {
                DeskHit::Rotate => Some(DeskInteraction::Rotating {
                    start: desk.clone(),
                }),
                DeskHit::Resize(handle) => Some(DeskInteraction::Resizing {
                    handle,
                    start: desk.clone(),
                }),
                DeskHit::Body => None,
            };
        }

        if state.selection.len() > 1 {
            let members: Vec<&Desk> = state
                .selection
                .iter()
                .filter_map(|id| self.desks.get(id))
                .collect();
            let bounds = group_bounds(members.iter().copied())?;
            let handle = hit_group_handle(&bounds, point, radius)?;
            let resize = GroupResize::new(
                members.iter().map(|d| GroupMember::from_desk(d)).collect(),
                bounds,
                self.config.min_desk_width,
                self.config.min_desk_height,
            );
            return Some(DeskInteraction::GroupResizing {
                handle,
                resize,
                start: members.into_iter().cloned().collect(),
            });
        }
        None
    }

    fn begin_drag(&self, state: &EditorState, anchor: EntityId, point: Point) -> DragState {
        let start: Vec<Desk> = state
            .selection
            .iter()
            .filter_map(|id| self.desks.get(id))
            .cloned()
            .collect();
        let grab_offset = self
            .desks
            .get(&anchor)
            .map_or(Point::origin(), |d| d.center - point);
        DragState {
            anchor,
            grab_offset,
            start,
            offset: Point::origin(),
        }
    }

    pub fn pointer_move(
        &mut self,
        state: &mut EditorState,
        point: Point,
        modifiers: Modifiers,
    ) -> Vec<DeskAction> {
        if !point.is_finite() {
            return Vec::new();
        }
        match &mut state.desk {
            DeskInteraction::Idle => Vec::new(),
            DeskInteraction::Dragging(drag) => self.drag_to(drag, point),
            DeskInteraction::Resizing { handle, start } => self.resize_to(start, *handle, point),
            DeskInteraction::Rotating { start } => self.rotate_to(start, point),
            DeskInteraction::GroupResizing {
                handle,
                resize,
                start,
            } => self.group_resize_to(resize, *handle, start, point, modifiers.axis_lock),
        }
    }

    /// Finish the gesture and report the net change of every touched desk
    pub fn pointer_up(&mut self, state: &mut EditorState) -> Vec<DeskAction> {
        let interaction = std::mem::take(&mut state.desk);
        let actions: Vec<DeskAction> = match &interaction {
            DeskInteraction::Idle => return Vec::new(),
            DeskInteraction::Dragging(drag) => {
                if drag.offset.length() <= self.config.move_epsilon {
                    return self.revert(&drag.start);
                }
                drag.start.iter().filter_map(|s| self.commit(s)).collect()
            }
            DeskInteraction::Resizing { start, .. } | DeskInteraction::Rotating { start } => {
                self.commit(start).into_iter().collect()
            }
            DeskInteraction::GroupResizing { start, .. } => {
                start.iter().filter_map(|s| self.commit(s)).collect()
            }
        };
        debug!(
            interaction = interaction.name(),
            commits = actions.len(),
            "desk gesture finished"
        );
        actions
    }

    /// Abandon the gesture, putting every touched desk back
    pub fn pointer_cancel(&mut self, state: &mut EditorState) -> Vec<DeskAction> {
        let mut interaction = std::mem::take(&mut state.desk);
        let start: Vec<Desk> = interaction
            .snapshots_mut()
            .into_iter()
            .map(|desk| desk.clone())
            .collect();
        if !start.is_empty() {
            debug!(interaction = interaction.name(), "desk gesture cancelled");
        }
        self.revert(&start)
    }

    fn commit(&self, start: &Desk) -> Option<DeskAction> {
        let desk = self.desks.get(&start.id)?;
        let patch = desk.diff_geometry(start);
        (!patch.is_empty()).then_some(DeskAction::Commit {
            id: start.id,
            patch,
        })
    }

    /// Put desks back where a gesture found them
    fn revert(&mut self, start: &[Desk]) -> Vec<DeskAction> {
        let mut actions = Vec::new();
        for snapshot in start {
            if let Some(desk) = self.desks.get_mut(&snapshot.id) {
                if *desk != *snapshot {
                    *desk = snapshot.clone();
                    actions.push(DeskAction::Changed(snapshot.id));
                }
            }
        }
        actions
    }

    /// Range of translations keeping every desk inside its space's bounds,
    /// with `offset` clamped into it
    fn clamp_group_offset(&self, start: &[Desk], offset: Point) -> Option<Point> {
        let mut min = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        let mut max = Point::new(f64::INFINITY, f64::INFINITY);
        for desk in start {
            let bounds = self.space_bounds(desk)?;
            let (half_x, half_y) = desk.obb().aabb_half_extents();
            min.x = min.x.max(bounds.x + half_x - desk.center.x);
            min.y = min.y.max(bounds.y + half_y - desk.center.y);
            max.x = max.x.min(bounds.right() - half_x - desk.center.x);
            max.y = max.y.min(bounds.bottom() - half_y - desk.center.y);
        }
        if min.x > max.x + EPSILON || min.y > max.y + EPSILON {
            return None;
        }
        Some(Point::new(
            offset.x.clamp(min.x, max.x.max(min.x)),
            offset.y.clamp(min.y, max.y.max(min.y)),
        ))
    }

    fn drag_to(&mut self, drag: &mut DragState, point: Point) -> Vec<DeskAction> {
        let Some(anchor) = drag.start.iter().find(|d| d.id == drag.anchor) else {
            return Vec::new();
        };
        let moving: Vec<EntityId> = drag.start.iter().map(|d| d.id).collect();

        let dragged = anchor.obb().at(point + drag.grab_offset);
        let others: Vec<Obb> = self
            .desks
            .values()
            .filter(|d| !moving.contains(&d.id))
            .map(Desk::obb)
            .collect();
        let snapped = snap_desk_center(&dragged, &others, self.config.snap_distance);

        let Some(target) = self.clamp_group_offset(&drag.start, snapped - anchor.center) else {
            trace!(anchor = %drag.anchor, "selection does not fit its spaces");
            return Vec::new();
        };
        let members: Vec<Obb> = drag.start.iter().map(Desk::obb).collect();
        let offset = self
            .solver()
            .constrain_group_movement(&members, drag.offset, target, &moving);
        if offset == drag.offset {
            return Vec::new();
        }
        drag.offset = offset;

        let mut actions = Vec::with_capacity(drag.start.len());
        for start in &drag.start {
            if let Some(desk) = self.desks.get_mut(&start.id) {
                desk.center = start.center + offset;
                actions.push(DeskAction::Changed(start.id));
            }
        }
        actions
    }

    /// Apply a candidate rectangle to a desk if it fits its space and
    /// overlaps nothing; the center may shift to stay inside the bounds
    fn apply_if_legal(&mut self, id: EntityId, candidate: Obb) -> Vec<DeskAction> {
        let Some(desk) = self.desks.get(&id) else {
            return Vec::new();
        };
        let Some(bounds) = self.space_bounds(desk) else {
            return Vec::new();
        };
        let Some(center) = clamp_to_bounds(&bounds, &candidate) else {
            trace!(%id, "candidate does not fit its space");
            return Vec::new();
        };
        let candidate = candidate.at(center);
        if !self.solver().is_area_free(&candidate, &[id]) {
            trace!(%id, "candidate overlaps another desk");
            return Vec::new();
        }

        match self.desks.get_mut(&id) {
            Some(desk) => {
                desk.center = candidate.center;
                desk.width = candidate.width();
                desk.height = candidate.height();
                desk.rotation = candidate.rotation_deg;
                vec![DeskAction::Changed(id)]
            }
            None => Vec::new(),
        }
    }

    fn resize_to(&mut self, start: &Desk, handle: Handle, point: Point) -> Vec<DeskAction> {
        let start_obb = start.obb();
        let local = start_obb.to_local(point);
        let (sign_x, sign_y) = handle.signs();
        let (width, center_x) =
            resize_axis(sign_x, local.x, start.width, self.config.min_desk_width);
        let (height, center_y) =
            resize_axis(sign_y, local.y, start.height, self.config.min_desk_height);

        let center = start_obb.to_plan(Point::new(center_x, center_y));
        self.apply_if_legal(start.id, Obb::new(center, width, height, start.rotation))
    }

    fn rotate_to(&mut self, start: &Desk, point: Point) -> Vec<DeskAction> {
        let center = start.center;
        if point.distance_to(center) < EPSILON {
            return Vec::new();
        }
        let pointer_angle = (point.y - center.y).atan2(point.x - center.x).to_degrees();
        let rotation = snap_rotation(
            normalize_degrees(pointer_angle + 90.0),
            self.config.rotation_snap_tolerance,
        );
        self.apply_if_legal(
            start.id,
            Obb::new(center, start.width, start.height, rotation),
        )
    }

    fn group_resize_to(
        &mut self,
        resize: &GroupResize,
        handle: Handle,
        start: &[Desk],
        point: Point,
        uniform: bool,
    ) -> Vec<DeskAction> {
        let (scale_x, scale_y) = resize.scale_for(handle, point, uniform);
        let scaled = resize.apply(handle, scale_x, scale_y);
        let members = resize.member_ids();

        let mut candidates = Vec::with_capacity(scaled.len());
        for (member, snapshot) in scaled.iter().zip(start) {
            let obb = Obb::new(member.center, member.width, member.height, snapshot.rotation);
            let Some(bounds) = self.space_bounds(snapshot) else {
                return Vec::new();
            };
            if !bounds.contains_box(&obb.bounds(), EPSILON) {
                trace!(id = %member.id, "scaled member leaves its space");
                return Vec::new();
            }
            candidates.push((member.id, obb));
        }

        let solver = self.solver();
        let clear_of_others = candidates
            .iter()
            .all(|(_, obb)| solver.is_area_free(obb, &members));
        let clear_of_each_other = candidates.iter().enumerate().all(|(i, (_, a))| {
            candidates[i + 1..]
                .iter()
                .all(|(_, b)| !do_obbs_overlap(a, b))
        });
        if !clear_of_others || !clear_of_each_other {
            trace!("scaled group overlaps");
            return Vec::new();
        }

        let mut actions = Vec::with_capacity(candidates.len());
        for (id, obb) in candidates {
            if let Some(desk) = self.desks.get_mut(&id) {
                desk.center = obb.center;
                desk.width = obb.width();
                desk.height = obb.height();
                actions.push(DeskAction::Changed(id));
            }
        }
        actions
    }
}
