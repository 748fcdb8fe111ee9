//! Editing session for one floor
//!
//! [`LayoutSession`] owns the local state of a floor: its spaces and desks,
//! the editor state, and one pending edit buffer per entity kind. Every
//! accepted change is applied locally right away and journalled; nothing
//! reaches storage until [`LayoutSession::save`].
//!
//! ## Saving
//!
//! A save is three steps so pointer input can keep flowing while storage
//! works:
//!
//! 1. [`begin_flush`](LayoutSession::begin_flush) takes the journalled batch
//! 2. [`FlushBatch::send`] performs the remote calls
//! 3. [`complete_flush`](LayoutSession::complete_flush) merges server ids back
//!
//! A failed flush leaves whatever was applied remotely in place and marks the
//! session stale; edits are refused until [`reload`](LayoutSession::reload).

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::booking::BookingStatusSource;
use crate::buffer::{BufferBatch, Journaled, PendingEditBuffer};
use crate::config::EditorConfig;
use crate::editor::space::{
    self, hit_vertex, insert_vertex_on_edge, normalize_polygon, remove_vertex,
    translate_points, validate_space_polygon,
};
use crate::editor::{DeskAction, DeskEngine, EditorState, Modifiers, Selection, SpaceInteraction};
use crate::error::{EditError, FlushError, FlushPhase, SaveError};
use crate::geometry::{polygons_intersect, BoundingBox, Obb, Point, EPSILON};
use crate::model::{
    Desk, DeskPatch, DeskPayload, EntityId, EntityKind, Space, SpaceKind, SpacePatch,
    SpacePayload,
};
use crate::scene::{EntityRef, SceneNode, SceneSurface};
use crate::solver::{clamp_to_bounds, PlacementSolver};
use crate::storage::{Patch, Payload, Storage, StorageError};

/// Everything one save sends
#[derive(Debug, Clone, PartialEq)]
pub struct FlushBatch {
    pub spaces: BufferBatch<SpacePayload>,
    pub desks: BufferBatch<DeskPayload>,
}

/// What a flush achieved, complete or not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReceipt {
    /// Temp id to server id of created spaces
    pub space_ids: BTreeMap<u64, u64>,
    /// Temp id to server id of created desks
    pub desk_ids: BTreeMap<u64, u64>,
    pub updated: usize,
    pub deleted: usize,
    /// Remote calls that succeeded
    pub applied: usize,
}

/// Result of [`FlushBatch::send`], handed back to the session
#[derive(Debug)]
pub struct FlushOutcome {
    pub receipt: FlushReceipt,
    pub error: Option<FlushError>,
}

impl FlushBatch {
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty() && self.desks.is_empty()
    }

    /// Journal entries in the batch
    pub fn len(&self) -> usize {
        self.spaces.len() + self.desks.len()
    }

    /// Perform the remote calls, stopping at the first failure.
    ///
    /// Order: space creates, desk creates, updates (spaces then desks),
    /// deletes (desks then spaces). Creates and deletes are one bulk call per
    /// kind, updates one call per entity.
    pub async fn send<S: Storage>(self, storage: &S) -> FlushOutcome {
        let mut receipt = FlushReceipt::default();
        let error = self.send_all(storage, &mut receipt).await.err();
        FlushOutcome { receipt, error }
    }

    async fn send_all<S: Storage>(
        self,
        storage: &S,
        receipt: &mut FlushReceipt,
    ) -> Result<(), FlushError> {
        let FlushBatch { spaces, desks } = self;

        if !spaces.creates.is_empty() {
            let (temps, payloads): (Vec<u64>, Vec<Payload>) = spaces
                .creates
                .into_iter()
                .map(|(temp, payload)| (temp, Payload::Space(payload)))
                .unzip();
            let phase = FlushPhase::Create(EntityKind::Space);
            let ids = storage
                .create_entities(EntityKind::Space, payloads)
                .await
                .map_err(|source| flush_error(phase, receipt, source))?;
            check_id_count(phase, receipt, temps.len(), ids.len())?;
            receipt.space_ids.extend(temps.into_iter().zip(ids));
            receipt.applied += 1;
        }

        if !desks.creates.is_empty() {
            let (temps, payloads): (Vec<u64>, Vec<Payload>) = desks
                .creates
                .into_iter()
                .map(|(temp, mut payload)| {
                    if let EntityId::Temp(space) = payload.space_id {
                        if let Some(remote) = receipt.space_ids.get(&space) {
                            payload.space_id = EntityId::Remote(*remote);
                        }
                    }
                    (temp, Payload::Desk(payload))
                })
                .unzip();
            let phase = FlushPhase::Create(EntityKind::Desk);
            let ids = storage
                .create_entities(EntityKind::Desk, payloads)
                .await
                .map_err(|source| flush_error(phase, receipt, source))?;
            check_id_count(phase, receipt, temps.len(), ids.len())?;
            receipt.desk_ids.extend(temps.into_iter().zip(ids));
            receipt.applied += 1;
        }

        for (id, patch) in spaces.updates {
            let phase = FlushPhase::Update(EntityKind::Space);
            storage
                .update_entity(EntityKind::Space, id, Patch::Space(patch))
                .await
                .map_err(|source| flush_error(phase, receipt, source))?;
            receipt.updated += 1;
            receipt.applied += 1;
        }
        for (id, patch) in desks.updates {
            let phase = FlushPhase::Update(EntityKind::Desk);
            storage
                .update_entity(EntityKind::Desk, id, Patch::Desk(patch))
                .await
                .map_err(|source| flush_error(phase, receipt, source))?;
            receipt.updated += 1;
            receipt.applied += 1;
        }

        for (kind, ids) in [
            (EntityKind::Desk, desks.deletes),
            (EntityKind::Space, spaces.deletes),
        ] {
            if ids.is_empty() {
                continue;
            }
            let count = ids.len();
            storage
                .delete_entities(kind, ids)
                .await
                .map_err(|source| flush_error(FlushPhase::Delete(kind), receipt, source))?;
            receipt.deleted += count;
            receipt.applied += 1;
        }
        Ok(())
    }
}

fn flush_error(phase: FlushPhase, receipt: &FlushReceipt, source: StorageError) -> FlushError {
    FlushError {
        phase,
        applied: receipt.applied,
        source,
    }
}

fn check_id_count(
    phase: FlushPhase,
    receipt: &FlushReceipt,
    expected: usize,
    got: usize,
) -> Result<(), FlushError> {
    if expected == got {
        return Ok(());
    }
    Err(flush_error(
        phase,
        receipt,
        StorageError::Rejected(format!("expected {} ids, got {}", expected, got)),
    ))
}

/// Local editing state of one floor backed by a storage collaborator
pub struct LayoutSession<S: Storage> {
    storage: Rc<S>,
    floor_id: u64,
    config: EditorConfig,
    spaces: BTreeMap<EntityId, Space>,
    desks: BTreeMap<EntityId, Desk>,
    space_edits: PendingEditBuffer<SpacePayload>,
    desk_edits: PendingEditBuffer<DeskPayload>,
    editor: EditorState,
    flushing: bool,
    stale: bool,
    clipboard: Vec<Desk>,
    rendered: BTreeSet<EntityRef>,
}

impl<S: Storage> LayoutSession<S> {
    /// Empty session; call [`reload`](Self::reload) to fetch the floor
    pub fn new(storage: S, floor_id: u64, config: EditorConfig) -> Self {
        Self {
            storage: Rc::new(storage),
            floor_id,
            config,
            spaces: BTreeMap::new(),
            desks: BTreeMap::new(),
            space_edits: PendingEditBuffer::new(),
            desk_edits: PendingEditBuffer::new(),
            editor: EditorState::new(),
            flushing: false,
            stale: false,
            clipboard: Vec::new(),
            rendered: BTreeSet::new(),
        }
    }

    /// Session with the floor's current spaces and desks loaded
    pub async fn open(storage: S, floor_id: u64, config: EditorConfig) -> Result<Self, StorageError> {
        let mut session = Self::new(storage, floor_id, config);
        session.reload().await?;
        Ok(session)
    }

    pub fn storage(&self) -> Rc<S> {
        Rc::clone(&self.storage)
    }

    pub fn floor_id(&self) -> u64 {
        self.floor_id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn spaces(&self) -> &BTreeMap<EntityId, Space> {
        &self.spaces
    }

    pub fn desks(&self) -> &BTreeMap<EntityId, Desk> {
        &self.desks
    }

    pub fn space(&self, id: EntityId) -> Option<&Space> {
        self.spaces.get(&id)
    }

    pub fn desk(&self, id: EntityId) -> Option<&Desk> {
        self.desks.get(&id)
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    pub fn selection(&self) -> &Selection {
        &self.editor.selection
    }

    pub fn space_edits(&self) -> &PendingEditBuffer<SpacePayload> {
        &self.space_edits
    }

    pub fn desk_edits(&self) -> &PendingEditBuffer<DeskPayload> {
        &self.desk_edits
    }

    /// Journalled entries of both kinds
    pub fn pending_edits(&self) -> usize {
        self.space_edits.len() + self.desk_edits.len()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.editor.set_zoom(zoom);
    }

    fn ensure_fresh(&self) -> Result<(), EditError> {
        if self.stale {
            return Err(EditError::StaleState);
        }
        Ok(())
    }

    /// Geometry edits: allowed while a flush is outstanding
    fn ensure_editable(&self) -> Result<(), EditError> {
        self.ensure_fresh()?;
        if !self.editor.edit_mode {
            return Err(EditError::EditModeRequired);
        }
        Ok(())
    }

    /// Adding or deleting entities: refused while a flush is outstanding
    fn ensure_structural(&self) -> Result<(), EditError> {
        self.ensure_editable()?;
        if self.flushing {
            return Err(EditError::FlushInProgress);
        }
        Ok(())
    }

    fn space_bounds(&self, id: EntityId) -> Result<BoundingBox, EditError> {
        self.spaces
            .get(&id)
            .ok_or(EditError::unknown(EntityKind::Space, id))?
            .bounds()
            .ok_or_else(|| EditError::no_free_position("a desk"))
    }

    fn solver(&self) -> PlacementSolver {
        PlacementSolver::new(self.desks.values(), self.config.snap_distance)
    }

    // Edit mode

    pub fn enter_edit_mode(&mut self) -> Result<(), EditError> {
        self.ensure_fresh()?;
        self.editor.edit_mode = true;
        debug!("entered edit mode");
        Ok(())
    }

    /// Leave edit mode; unsaved edits must be saved or reloaded away first.
    /// A gesture or vertex edit still in progress is reverted.
    pub fn leave_edit_mode(&mut self) -> Result<(), EditError> {
        let count = self.pending_edits();
        if count > 0 {
            return Err(EditError::UnsavedEdits { count });
        }
        if self.flushing {
            return Err(EditError::FlushInProgress);
        }
        self.cancel_gesture();
        self.cancel_space_edit();
        self.editor.edit_mode = false;
        self.editor.space = SpaceInteraction::Idle;
        debug!("left edit mode");
        Ok(())
    }

    pub fn set_floor_plan_loaded(&mut self, loaded: bool) {
        self.editor.floor_plan_loaded = loaded;
    }

    // Lasso

    pub fn start_lasso(&mut self) -> Result<(), EditError> {
        self.ensure_fresh()?;
        self.cancel_space_edit();
        space::start_drawing(&mut self.editor)
    }

    pub fn lasso_click(&mut self, point: Point, axis_lock: bool) -> Result<Point, EditError> {
        space::add_point(&mut self.editor, point, axis_lock)
    }

    /// Close the lasso; the validated polygon waits for
    /// [`commit_space_draft`](Self::commit_space_draft)
    pub fn finish_lasso(&mut self) -> Result<Vec<Point>, EditError> {
        space::finish_drawing(&mut self.editor, &self.spaces)
    }

    pub fn cancel_lasso(&mut self) {
        if matches!(
            self.editor.space,
            SpaceInteraction::Drawing { .. } | SpaceInteraction::Drafted { .. }
        ) {
            self.editor.space = SpaceInteraction::Idle;
        }
    }

    /// Give the closed lasso its metadata and journal it as a new space
    pub fn commit_space_draft(
        &mut self,
        name: impl Into<String>,
        kind: SpaceKind,
        color: impl Into<String>,
    ) -> Result<EntityId, EditError> {
        self.ensure_structural()?;
        let SpaceInteraction::Drafted { points } = &self.editor.space else {
            return Err(EditError::NotDrawing);
        };
        validate_space_polygon(points, self.spaces.values(), None)?;

        let payload = SpacePayload {
            floor_id: self.floor_id,
            name: name.into(),
            kind,
            color: color.into(),
            points: points.clone(),
        };
        let id = self.space_edits.create(payload.clone())?;
        self.spaces.insert(id, Space::from_payload(id, &payload));
        self.editor.space = SpaceInteraction::Idle;
        info!(%id, name = %payload.name, "space drafted");
        Ok(id)
    }

    // Polygon editing

    /// Start editing a committed space's vertices
    pub fn select_space(&mut self, id: EntityId) -> Result<(), EditError> {
        self.ensure_editable()?;
        let points = self
            .spaces
            .get(&id)
            .ok_or(EditError::unknown(EntityKind::Space, id))?
            .points
            .clone();
        self.cancel_space_edit();
        self.editor.space = SpaceInteraction::Editing {
            id,
            original: points.clone(),
            points,
        };
        Ok(())
    }

    /// Apply `edit` to the working vertices of the space being edited and
    /// mirror them onto the live space
    fn edit_vertices<T>(
        &mut self,
        edit: impl FnOnce(&mut Vec<Point>) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        self.ensure_editable()?;
        let SpaceInteraction::Editing { id, points, .. } = &mut self.editor.space else {
            return Err(EditError::NotDrawing);
        };
        let result = edit(points)?;
        if let Some(space) = self.spaces.get_mut(id) {
            space.points = points.clone();
        }
        Ok(result)
    }

    pub fn drag_vertex(&mut self, index: usize, to: Point) -> Result<(), EditError> {
        if !to.is_finite() {
            return Err(EditError::InvalidCoordinates {
                kind: EntityKind::Space,
            });
        }
        self.edit_vertices(|points| {
            let count = points.len();
            let vertex = points
                .get_mut(index)
                .ok_or(EditError::VertexOutOfRange { index, count })?;
            *vertex = to;
            Ok(())
        })
    }

    pub fn delete_vertex(&mut self, index: usize) -> Result<Point, EditError> {
        self.edit_vertices(|points| remove_vertex(points, index))
    }

    /// Vertex of the space being edited within the zoom-scaled handle radius
    /// of `point`
    pub fn vertex_at(&self, point: Point) -> Option<usize> {
        let SpaceInteraction::Editing { points, .. } = &self.editor.space else {
            return None;
        };
        let radius = self.config.handle_radius_at(self.editor.zoom);
        hit_vertex(points, point, radius)
    }

    /// Delete the vertex under `point` (a double-click on its handle)
    pub fn delete_vertex_at(&mut self, point: Point) -> Result<Point, EditError> {
        self.ensure_editable()?;
        if !matches!(self.editor.space, SpaceInteraction::Editing { .. }) {
            return Err(EditError::NotDrawing);
        }
        let index = self.vertex_at(point).ok_or(EditError::NotOnVertex)?;
        self.delete_vertex(index)
    }

    /// Insert a vertex on the edge under `point`, within the zoom-scaled
    /// edge tolerance
    pub fn insert_vertex_at(&mut self, point: Point) -> Result<usize, EditError> {
        let tolerance = self.config.edge_tolerance_at(self.editor.zoom);
        self.edit_vertices(|points| insert_vertex_on_edge(points, point, tolerance))
    }

    pub fn translate_space(&mut self, delta: Point) -> Result<(), EditError> {
        if !delta.is_finite() {
            return Err(EditError::InvalidCoordinates {
                kind: EntityKind::Space,
            });
        }
        self.edit_vertices(|points| {
            *points = translate_points(points, delta);
            Ok(())
        })
    }

    /// Validate and journal the edited polygon.
    ///
    /// An unchanged polygon is accepted without a buffer entry. Desks the
    /// new outline no longer contains are moved back inside.
    pub fn commit_space_edit(&mut self) -> Result<(), EditError> {
        self.ensure_editable()?;
        let SpaceInteraction::Editing {
            id,
            original,
            points,
        } = &self.editor.space
        else {
            return Err(EditError::NotDrawing);
        };
        let id = *id;
        let normalized = normalize_polygon(points)?;
        validate_space_polygon(&normalized, self.spaces.values(), Some(id))?;

        if normalized == *original {
            self.editor.space = SpaceInteraction::Idle;
            return Ok(());
        }

        self.space_edits.update(
            id,
            SpacePatch {
                points: Some(normalized.clone()),
                ..Default::default()
            },
        )?;
        if let Some(space) = self.spaces.get_mut(&id) {
            space.points = normalized;
        }
        self.editor.space = SpaceInteraction::Idle;
        info!(%id, "space outline updated");
        self.refit_desks(id)
    }

    /// Drop uncommitted vertex edits
    pub fn cancel_space_edit(&mut self) {
        if let SpaceInteraction::Editing { id, original, .. } = &self.editor.space {
            if let Some(space) = self.spaces.get_mut(id) {
                space.points = original.clone();
            }
            self.editor.space = SpaceInteraction::Idle;
        }
    }

    /// Move desks that stick out of their space's new bounds back inside
    fn refit_desks(&mut self, space_id: EntityId) -> Result<(), EditError> {
        let bounds = self.space_bounds(space_id)?;
        let outside: Vec<Desk> = self
            .desks
            .values()
            .filter(|d| d.space_id == space_id)
            .filter(|d| !bounds.contains_box(&d.obb().bounds(), EPSILON))
            .cloned()
            .collect();

        for desk in outside {
            let obb = desk.obb();
            let solver = self.solver();
            let placed = clamp_to_bounds(&bounds, &obb).and_then(|clamped| {
                solver.find_free_position(&bounds, &obb, clamped, &[desk.id])
            });
            let Some(center) = placed else {
                warn!(id = %desk.id, "desk no longer fits its space");
                continue;
            };
            self.desk_edits.update(desk.id, DeskPatch::position(center))?;
            if let Some(live) = self.desks.get_mut(&desk.id) {
                live.center = center;
            }
        }
        Ok(())
    }

    /// Delete a space together with its desks
    pub fn delete_space(&mut self, id: EntityId) -> Result<(), EditError> {
        self.ensure_structural()?;
        if !self.spaces.contains_key(&id) {
            return Err(EditError::unknown(EntityKind::Space, id));
        }
        let owned: Vec<EntityId> = self
            .desks
            .values()
            .filter(|d| d.space_id == id)
            .map(|d| d.id)
            .collect();
        for desk in &owned {
            self.remove_desk(*desk)?;
        }
        if matches!(&self.editor.space, SpaceInteraction::Editing { id: editing, .. } if *editing == id)
        {
            self.editor.space = SpaceInteraction::Idle;
        }
        self.space_edits.delete(id)?;
        self.spaces.remove(&id);
        info!(%id, desks = owned.len(), "space deleted");
        Ok(())
    }

    // Desks

    /// Nearest free center for a new desk in a space
    pub fn suggest_desk_position(
        &self,
        space_id: EntityId,
        size: (f64, f64),
        rotation: f64,
        near: Option<Point>,
    ) -> Result<Point, EditError> {
        let bounds = self.space_bounds(space_id)?;
        let preferred = near.unwrap_or_else(|| bounds.center());
        if !preferred.is_finite() || !size.0.is_finite() || !size.1.is_finite() {
            return Err(EditError::InvalidCoordinates {
                kind: EntityKind::Desk,
            });
        }
        let footprint = Obb::new(preferred, size.0, size.1, rotation);
        self.solver()
            .find_free_position(&bounds, &footprint, preferred, &[])
            .ok_or_else(|| EditError::no_free_position("a desk"))
    }

    /// Place a new desk in a coworking space at the free position nearest
    /// to `preferred` (the space's center by default)
    pub fn add_desk(
        &mut self,
        space_id: EntityId,
        preferred: Option<Point>,
        size: Option<(f64, f64)>,
    ) -> Result<EntityId, EditError> {
        self.ensure_structural()?;
        let space = self
            .spaces
            .get(&space_id)
            .ok_or(EditError::unknown(EntityKind::Space, space_id))?;
        if space.kind != SpaceKind::Coworking {
            return Err(EditError::WrongSpaceKind { id: space_id });
        }

        let (width, height) = size.unwrap_or(self.config.default_desk_size);
        let size = (
            width.max(self.config.min_desk_width),
            height.max(self.config.min_desk_height),
        );
        let center = self.suggest_desk_position(space_id, size, 0.0, preferred)?;
        let number = self.desks.values().filter(|d| d.space_id == space_id).count() + 1;

        let payload = DeskPayload {
            space_id,
            x: center.x,
            y: center.y,
            width: size.0,
            height: size.1,
            rotation: 0.0,
            label: format!("Desk {}", number),
        };
        let id = self.desk_edits.create(payload.clone())?;
        self.desks.insert(id, Desk::from_payload(id, &payload));
        self.editor.selection.select_only(id);
        info!(%id, space = %space_id, "desk placed");
        Ok(id)
    }

    fn remove_desk(&mut self, id: EntityId) -> Result<(), EditError> {
        self.desk_edits.delete(id)?;
        self.desks.remove(&id);
        self.editor.selection.remove(id);
        Ok(())
    }

    /// Delete every selected desk; returns how many were deleted
    pub fn delete_selected_desks(&mut self) -> Result<usize, EditError> {
        self.ensure_structural()?;
        let ids = self.editor.selection.ids();
        for id in &ids {
            self.remove_desk(*id)?;
        }
        info!(count = ids.len(), "desks deleted");
        Ok(ids.len())
    }

    /// Copy the selected desks; returns how many were copied
    pub fn copy_selection(&mut self) -> usize {
        self.clipboard = self
            .editor
            .selection
            .iter()
            .filter_map(|id| self.desks.get(id))
            .cloned()
            .collect();
        self.clipboard.len()
    }

    /// Bounds a rigid group of desks must stay in, and whether each member
    /// still lies in its own space after moving by `offset`
    fn group_bounds_for(&self, desks: &[Desk]) -> Result<BoundingBox, EditError> {
        desks
            .iter()
            .map(|d| self.space_bounds(d.space_id))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .reduce(|a, b| a.union(&b))
            .ok_or_else(|| EditError::no_free_position("the selection"))
    }

    fn group_fits(&self, desks: &[Desk], offset: Point) -> bool {
        desks.iter().all(|d| {
            self.space_bounds(d.space_id).is_ok_and(|bounds| {
                bounds.contains_box(&d.obb().translated(offset).bounds(), EPSILON)
            })
        })
    }

    /// Paste copies of the clipboard near the originals, at the first free
    /// offset from the configured paste offset
    pub fn paste(&mut self) -> Result<Vec<EntityId>, EditError> {
        self.ensure_structural()?;
        if self.clipboard.is_empty() {
            return Ok(Vec::new());
        }
        let copies = self.clipboard.clone();
        let bounds = self.group_bounds_for(&copies)?;
        let members: Vec<Obb> = copies.iter().map(Desk::obb).collect();
        let preferred = Point::new(self.config.paste_offset, self.config.paste_offset);

        let offset = self
            .solver()
            .find_free_copied_group_position(&bounds, &members, preferred, |offset| {
                self.group_fits(&copies, offset)
            })
            .ok_or_else(|| EditError::no_free_position("the pasted desks"))?;

        let mut created = Vec::with_capacity(copies.len());
        for original in &copies {
            let mut payload = original.payload();
            payload.x += offset.x;
            payload.y += offset.y;
            let id = self.desk_edits.create(payload.clone())?;
            self.desks.insert(id, Desk::from_payload(id, &payload));
            created.push(id);
        }
        self.editor.selection.select_all(created.iter().copied());
        info!(count = created.len(), ?offset, "desks pasted");
        Ok(created)
    }

    /// Nudge the selection by `delta`, or to the nearest free offset
    pub fn move_selection_by(&mut self, delta: Point) -> Result<(), EditError> {
        self.ensure_editable()?;
        if !delta.is_finite() {
            return Err(EditError::InvalidCoordinates {
                kind: EntityKind::Desk,
            });
        }
        let ids = self.editor.selection.ids();
        let moving: Vec<Desk> = ids.iter().filter_map(|id| self.desks.get(id)).cloned().collect();
        if moving.is_empty() {
            return Ok(());
        }
        let bounds = self.group_bounds_for(&moving)?;
        let members: Vec<Obb> = moving.iter().map(Desk::obb).collect();

        let offset = self
            .solver()
            .find_free_group_position(&bounds, &members, delta, &ids, |offset| {
                self.group_fits(&moving, offset)
            })
            .ok_or_else(|| EditError::no_free_position("the selection"))?;
        if offset.length() <= EPSILON {
            return Ok(());
        }

        for desk in &moving {
            let center = desk.center + offset;
            self.desk_edits.update(desk.id, DeskPatch::position(center))?;
            if let Some(live) = self.desks.get_mut(&desk.id) {
                live.center = center;
            }
        }
        Ok(())
    }

    pub fn rename_desk(&mut self, id: EntityId, label: impl Into<String>) -> Result<(), EditError> {
        self.ensure_editable()?;
        let label = label.into();
        if !self.desks.contains_key(&id) {
            return Err(EditError::unknown(EntityKind::Desk, id));
        }
        self.desk_edits.update(
            id,
            DeskPatch {
                label: Some(label.clone()),
                ..Default::default()
            },
        )?;
        if let Some(desk) = self.desks.get_mut(&id) {
            desk.label = label;
        }
        Ok(())
    }

    // Pointer routing (plan coordinates)

    pub fn pointer_down(
        &mut self,
        point: Point,
        modifiers: Modifiers,
    ) -> Result<Vec<DeskAction>, EditError> {
        self.ensure_fresh()?;
        let mut engine = DeskEngine::new(&mut self.desks, &self.spaces, &self.config);
        Ok(engine.pointer_down(&mut self.editor, point, modifiers))
    }

    pub fn pointer_move(&mut self, point: Point, modifiers: Modifiers) -> Vec<DeskAction> {
        let mut engine = DeskEngine::new(&mut self.desks, &self.spaces, &self.config);
        engine.pointer_move(&mut self.editor, point, modifiers)
    }

    /// Abandon the desk gesture in progress, restoring the desks it moved
    pub fn cancel_gesture(&mut self) -> Vec<DeskAction> {
        let mut engine = DeskEngine::new(&mut self.desks, &self.spaces, &self.config);
        engine.pointer_cancel(&mut self.editor)
    }

    /// Finish the gesture and journal its commits
    pub fn pointer_up(&mut self) -> Result<Vec<DeskAction>, EditError> {
        let mut engine = DeskEngine::new(&mut self.desks, &self.spaces, &self.config);
        let actions = engine.pointer_up(&mut self.editor);
        for action in &actions {
            if let DeskAction::Commit { id, patch } = action {
                self.desk_edits.update(*id, patch.clone())?;
            }
        }
        Ok(actions)
    }

    // Collaborators

    /// Refresh every desk's booking status for `date`
    pub fn apply_booking_statuses(&mut self, source: &impl BookingStatusSource, date: &str) {
        let ids: Vec<u64> = self.desks.keys().filter_map(EntityId::remote).collect();
        let statuses = source.statuses(date, &ids);
        for desk in self.desks.values_mut() {
            desk.booking_status = desk
                .id
                .remote()
                .and_then(|id| statuses.get(&id).copied())
                .unwrap_or_default();
        }
        debug!(date, desks = ids.len(), "booking statuses applied");
    }

    /// Push every entity into the scene and remove nodes of deleted ones
    pub fn sync_scene(&mut self, scene: &mut impl SceneSurface) {
        let editing = match &self.editor.space {
            SpaceInteraction::Editing { id, .. } => Some(*id),
            _ => None,
        };
        let mut current = BTreeSet::new();
        for space in self.spaces.values() {
            scene.upsert_node(SceneNode::space(space, editing == Some(space.id)));
            current.insert(EntityRef::Space(space.id));
        }
        for desk in self.desks.values() {
            let selected = self.editor.selection.contains(desk.id);
            scene.upsert_node(SceneNode::desk(desk, selected));
            current.insert(EntityRef::Desk(desk.id));
        }
        for gone in self.rendered.difference(&current) {
            scene.remove_node(*gone);
        }
        self.rendered = current;
    }

    /// Layout problems in the current local state: overlapping spaces,
    /// overlapping desks, desks outside their space and orphaned desks
    pub fn violations(&self) -> Vec<EditError> {
        let mut found = Vec::new();
        let spaces: Vec<&Space> = self.spaces.values().collect();
        for (i, a) in spaces.iter().enumerate() {
            for b in &spaces[i + 1..] {
                if polygons_intersect(&a.points, &b.points) {
                    found.push(EditError::overlap(vec![a.name.clone(), b.name.clone()]));
                }
            }
        }

        let solver = self.solver();
        for desk in self.desks.values() {
            let others: Vec<EntityId> = solver
                .overlapping(&desk.obb(), &[desk.id])
                .into_iter()
                .filter(|other| *other > desk.id)
                .collect();
            if !others.is_empty() {
                found.push(EditError::Overlap {
                    id: desk.id,
                    others,
                });
            }
            match self.space_bounds(desk.space_id) {
                Ok(bounds) if !bounds.contains_box(&desk.obb().bounds(), EPSILON) => {
                    found.push(EditError::DeskOutOfBounds { id: desk.id });
                }
                Ok(_) => {}
                Err(err) => found.push(err),
            }
        }
        found
    }

    // Saving

    /// Take the journalled edits for sending; structural edits are refused
    /// until [`complete_flush`](Self::complete_flush)
    pub fn begin_flush(&mut self) -> Result<FlushBatch, EditError> {
        self.ensure_fresh()?;
        if self.flushing {
            return Err(EditError::FlushInProgress);
        }
        let batch = FlushBatch {
            spaces: self.space_edits.take_batch(),
            desks: self.desk_edits.take_batch(),
        };
        self.flushing = true;
        info!(entries = batch.len(), "flush started");
        Ok(batch)
    }

    /// Merge server ids from a finished flush into local state
    pub fn complete_flush(&mut self, outcome: FlushOutcome) -> Result<FlushReceipt, FlushError> {
        let FlushOutcome { receipt, error } = outcome;

        for (temp, remote) in &receipt.space_ids {
            self.remap_space(EntityId::Temp(*temp), EntityId::Remote(*remote));
        }
        for (temp, remote) in &receipt.desk_ids {
            self.remap_desk(EntityId::Temp(*temp), EntityId::Remote(*remote));
        }
        self.space_edits.resolve_in_flight(&receipt.space_ids);
        self.desk_edits.resolve_in_flight(&receipt.desk_ids);
        self.flushing = false;

        match error {
            None => {
                info!(
                    created = receipt.space_ids.len() + receipt.desk_ids.len(),
                    updated = receipt.updated,
                    deleted = receipt.deleted,
                    "flush completed"
                );
                Ok(receipt)
            }
            Some(err) => {
                warn!(%err, "flush failed, reload required before further edits");
                self.stale = true;
                Err(err)
            }
        }
    }

    fn remap_space(&mut self, from: EntityId, to: EntityId) {
        if let Some(mut space) = self.spaces.remove(&from) {
            space.id = to;
            self.spaces.insert(to, space);
        }
        for desk in self.desks.values_mut().chain(self.clipboard.iter_mut()) {
            if desk.space_id == from {
                desk.space_id = to;
            }
        }
        for payload in self.desk_edits.pending_creates_mut() {
            if payload.space_id == from {
                payload.space_id = to;
            }
        }
        if let SpaceInteraction::Editing { id, .. } = &mut self.editor.space {
            if *id == from {
                *id = to;
            }
        }
        self.editor.desk.remap_space(from, to);
    }

    fn remap_desk(&mut self, from: EntityId, to: EntityId) {
        if let Some(mut desk) = self.desks.remove(&from) {
            desk.id = to;
            self.desks.insert(to, desk);
        }
        self.editor.selection.remap(from, to);
        self.editor.desk.remap_desk(from, to);
    }

    /// Send every journalled edit and merge the results
    pub async fn save(&mut self) -> Result<FlushReceipt, SaveError> {
        let batch = self.begin_flush()?;
        let storage = Rc::clone(&self.storage);
        let outcome = batch.send(storage.as_ref()).await;
        Ok(self.complete_flush(outcome)?)
    }

    /// Replace local state with the floor as storage has it.
    ///
    /// Drops journalled edits, selection and gestures. Entities with
    /// non-finite coordinates are skipped.
    pub async fn reload(&mut self) -> Result<(), StorageError> {
        let storage = Rc::clone(&self.storage);
        let mut spaces = BTreeMap::new();
        for entity in storage.fetch_entities(EntityKind::Space, self.floor_id).await? {
            let Payload::Space(payload) = &entity.payload else {
                warn!(id = entity.id, "storage returned a non-space entity");
                continue;
            };
            if !payload.is_finite() {
                warn!(id = entity.id, "skipping space with non-finite coordinates");
                continue;
            }
            let id = EntityId::Remote(entity.id);
            spaces.insert(id, Space::from_payload(id, payload));
        }

        let mut desks = BTreeMap::new();
        let space_ids: Vec<u64> = spaces.keys().filter_map(EntityId::remote).collect();
        for space_id in space_ids {
            for entity in storage.fetch_entities(EntityKind::Desk, space_id).await? {
                let Payload::Desk(payload) = &entity.payload else {
                    warn!(id = entity.id, "storage returned a non-desk entity");
                    continue;
                };
                if !payload.is_finite() {
                    warn!(id = entity.id, "skipping desk with non-finite coordinates");
                    continue;
                }
                let id = EntityId::Remote(entity.id);
                desks.insert(id, Desk::from_payload(id, payload));
            }
        }

        info!(
            floor = self.floor_id,
            spaces = spaces.len(),
            desks = desks.len(),
            "layout loaded"
        );
        self.spaces = spaces;
        self.desks = desks;
        self.space_edits.clear();
        self.desk_edits.clear();
        self.editor.reset_interaction();
        self.flushing = false;
        self.stale = false;
        Ok(())
    }
}
