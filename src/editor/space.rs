//! Space polygon editing: lasso capture, vertex editing, overlap validation
//!
//! The lasso goes `Idle -> Drawing -> Drafted` and the draft waits there for
//! its name, kind and color. Selecting a committed space moves to `Editing`,
//! where vertices are changed on a working copy until the edit is committed
//! or cancelled.

use std::collections::BTreeMap;

use tracing::debug;

use crate::editor::EditorState;
use crate::error::EditError;
use crate::geometry::{
    closest_point_on_segment, distance_to_segment, polygon_edges, polygons_intersect, Point,
    EPSILON,
};
use crate::model::{EntityId, EntityKind, Space};

/// Minimum number of vertices of a space polygon
pub const MIN_VERTICES: usize = 3;

/// Space-editing state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SpaceInteraction {
    #[default]
    Idle,
    /// Lasso active; clicks append points
    Drawing { points: Vec<Point> },
    /// Closed and validated lasso waiting for its metadata
    Drafted { points: Vec<Point> },
    /// A committed space selected for vertex editing
    Editing {
        id: EntityId,
        /// Vertices as they were when editing started
        original: Vec<Point>,
        points: Vec<Point>,
    },
}

impl SpaceInteraction {
    pub fn name(&self) -> &'static str {
        match self {
            SpaceInteraction::Idle => "idle",
            SpaceInteraction::Drawing { .. } => "drawing",
            SpaceInteraction::Drafted { .. } => "drafted",
            SpaceInteraction::Editing { .. } => "editing",
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self, SpaceInteraction::Drawing { .. })
    }
}

/// Enter lasso mode
pub fn start_drawing(state: &mut EditorState) -> Result<(), EditError> {
    if !state.floor_plan_loaded {
        return Err(EditError::FloorPlanMissing);
    }
    if !state.edit_mode {
        return Err(EditError::EditModeRequired);
    }
    if matches!(
        state.space,
        SpaceInteraction::Drawing { .. } | SpaceInteraction::Drafted { .. }
    ) {
        return Err(EditError::AlreadyDrawing);
    }
    state.space = SpaceInteraction::Drawing { points: Vec::new() };
    debug!("lasso started");
    Ok(())
}

/// Snap `point` onto the horizontal or vertical line through `previous`,
/// whichever is closer
pub fn axis_locked(previous: Point, point: Point) -> Point {
    if (point.x - previous.x).abs() >= (point.y - previous.y).abs() {
        Point::new(point.x, previous.y)
    } else {
        Point::new(previous.x, point.y)
    }
}

/// Append a lasso point; returns the point actually added
pub fn add_point(state: &mut EditorState, point: Point, axis_lock: bool) -> Result<Point, EditError> {
    let SpaceInteraction::Drawing { points } = &mut state.space else {
        return Err(EditError::NotDrawing);
    };
    if !point.is_finite() {
        return Err(EditError::InvalidCoordinates {
            kind: EntityKind::Space,
        });
    }
    let point = match points.last() {
        Some(previous) if axis_lock => axis_locked(*previous, point),
        _ => point,
    };
    points.push(point);
    Ok(point)
}

/// Check finiteness, drop repeated vertices and require a real polygon.
///
/// Repeats come from double-click finishes and from closing the lasso on
/// its first point.
pub fn normalize_polygon(points: &[Point]) -> Result<Vec<Point>, EditError> {
    if !points.iter().all(Point::is_finite) {
        return Err(EditError::InvalidCoordinates {
            kind: EntityKind::Space,
        });
    }
    let mut normalized: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        if normalized
            .last()
            .map_or(true, |last| last.distance_to(*point) > EPSILON)
        {
            normalized.push(*point);
        }
    }
    while normalized.len() > 1
        && normalized[0].distance_to(normalized[normalized.len() - 1]) <= EPSILON
    {
        normalized.pop();
    }
    if normalized.len() < MIN_VERTICES {
        return Err(EditError::InsufficientVertices {
            count: normalized.len(),
        });
    }
    Ok(normalized)
}

/// Reject a polygon that intersects any committed space other than `exclude`
pub fn validate_space_polygon<'a>(
    points: &[Point],
    spaces: impl IntoIterator<Item = &'a Space>,
    exclude: Option<EntityId>,
) -> Result<(), EditError> {
    let names: Vec<String> = spaces
        .into_iter()
        .filter(|space| Some(space.id) != exclude)
        .filter(|space| polygons_intersect(points, &space.points))
        .map(|space| space.name.clone())
        .collect();
    if names.is_empty() {
        Ok(())
    } else {
        Err(EditError::overlap(names))
    }
}

/// Close the lasso.
///
/// Too few points keeps the lasso open for more clicks; an overlap discards
/// it. On success the polygon waits in `Drafted` for its metadata.
pub fn finish_drawing(
    state: &mut EditorState,
    spaces: &BTreeMap<EntityId, Space>,
) -> Result<Vec<Point>, EditError> {
    let SpaceInteraction::Drawing { points } = &state.space else {
        return Err(EditError::NotDrawing);
    };
    let points = normalize_polygon(points)?;
    if let Err(err) = validate_space_polygon(&points, spaces.values(), None) {
        debug!(%err, "lasso discarded");
        state.space = SpaceInteraction::Idle;
        return Err(err);
    }
    debug!(vertices = points.len(), "lasso closed");
    state.space = SpaceInteraction::Drafted {
        points: points.clone(),
    };
    Ok(points)
}

/// Vertex under the pointer
pub fn hit_vertex(points: &[Point], point: Point, radius: f64) -> Option<usize> {
    points
        .iter()
        .position(|vertex| vertex.distance_to(point) <= radius)
}

/// Remove a vertex, refusing to go below a triangle
pub fn remove_vertex(points: &mut Vec<Point>, index: usize) -> Result<Point, EditError> {
    if index >= points.len() {
        return Err(EditError::VertexOutOfRange {
            index,
            count: points.len(),
        });
    }
    if points.len() <= MIN_VERTICES {
        return Err(EditError::InsufficientVertices {
            count: points.len() - 1,
        });
    }
    Ok(points.remove(index))
}

/// Insert a vertex on the edge nearest to `point`, if within `tolerance`.
///
/// Returns the index of the new vertex.
pub fn insert_vertex_on_edge(
    points: &mut Vec<Point>,
    point: Point,
    tolerance: f64,
) -> Result<usize, EditError> {
    let nearest = polygon_edges(points)
        .enumerate()
        .map(|(i, (a, b))| (i, a, b, distance_to_segment(point, a, b)))
        .min_by(|x, y| x.3.total_cmp(&y.3));
    match nearest {
        Some((i, a, b, distance)) if distance <= tolerance => {
            let index = i + 1;
            points.insert(index, closest_point_on_segment(point, a, b));
            Ok(index)
        }
        _ => Err(EditError::NotOnEdge),
    }
}

/// Every vertex moved by the same delta
pub fn translate_points(points: &[Point], delta: Point) -> Vec<Point> {
    points.iter().map(|p| *p + delta).collect()
}
