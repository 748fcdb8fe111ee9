//! Collision and placement solving for desks
//!
//! Decides whether a candidate desk rectangle (or a rigid group of them) is
//! legal against the desks already placed, and finds the nearest legal
//! position when it is not.
//!
//! ## Sliding contact
//!
//! [`PlacementSolver::constrain_movement`] resolves a blocked move by binary
//! searching the furthest feasible fraction of the move along two axis
//! decompositions (x then y, y then x) and keeping whichever end point lands
//! closer to the target. Against several obstacles this finds a locally,
//! not necessarily globally, closest free point.
//!
//! ## Free-slot search
//!
//! [`PlacementSolver::find_free_position`] tries the preferred point, then a
//! grid of candidates around it ordered by distance, then a raster scan of
//! the whole bounds.

use std::cmp::Ordering;

use tracing::debug;

use crate::geometry::{do_obbs_overlap, BoundingBox, Obb, Point, EPSILON};
use crate::model::{Desk, EntityId};

/// Binary search iterations for sliding contact (1/1024 of the move)
const SLIDE_ITERATIONS: usize = 10;

/// Grid rings examined around the preferred point before the raster scan
const NEARBY_RINGS: i64 = 12;

/// Upper bound on raster candidates per axis so huge bounds stay cheap
const MAX_RASTER_STEPS: usize = 400;

/// Inclusive range of legal values for a desk center or a group offset
#[derive(Debug, Clone, Copy)]
struct SearchRange {
    min: Point,
    max: Point,
}

impl SearchRange {
    /// Range of centers keeping a box of the given half-extents inside `bounds`;
    /// None when it cannot fit at all
    fn inside(bounds: &BoundingBox, half_x: f64, half_y: f64) -> Option<Self> {
        Self::from_limits(
            Point::new(bounds.x + half_x, bounds.y + half_y),
            Point::new(bounds.right() - half_x, bounds.bottom() - half_y),
        )
    }

    fn from_limits(min: Point, max: Point) -> Option<Self> {
        if min.x > max.x + EPSILON || min.y > max.y + EPSILON {
            return None;
        }
        Some(Self {
            min,
            max: Point::new(max.x.max(min.x), max.y.max(min.y)),
        })
    }

    fn clamp(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
        )
    }

    fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x - EPSILON
            && p.x <= self.max.x + EPSILON
            && p.y >= self.min.y - EPSILON
            && p.y <= self.max.y + EPSILON
    }
}

/// Positions along one axis from `min` to `max`, always including both ends
fn raster_axis(min: f64, max: f64, step: f64) -> Vec<f64> {
    let span = max - min;
    let count = ((span / step).ceil() as usize).min(MAX_RASTER_STEPS);
    if count == 0 {
        return vec![min];
    }
    (0..=count)
        .map(|i| min + span * (i as f64 / count as f64))
        .collect()
}

/// Nearest point of `range` to `start` (on a `step` grid) accepted by `is_free`
fn search_nearest(
    range: SearchRange,
    start: Point,
    step: f64,
    is_free: impl Fn(Point) -> bool,
) -> Option<Point> {
    let start = range.clamp(start);
    if is_free(start) {
        return Some(start);
    }

    let mut candidates: Vec<Point> = Vec::new();
    for i in -NEARBY_RINGS..=NEARBY_RINGS {
        for j in -NEARBY_RINGS..=NEARBY_RINGS {
            if i == 0 && j == 0 {
                continue;
            }
            let p = Point::new(start.x + i as f64 * step, start.y + j as f64 * step);
            if range.contains(p) {
                candidates.push(range.clamp(p));
            }
        }
    }
    candidates.sort_by(|a, b| {
        a.distance_to(start)
            .partial_cmp(&b.distance_to(start))
            .unwrap_or(Ordering::Equal)
    });
    if let Some(found) = candidates.into_iter().find(|p| is_free(*p)) {
        return Some(found);
    }

    debug!("nearby search exhausted, scanning whole bounds");
    let raster_step = (step / 2.0).max(1.0);
    let xs = raster_axis(range.min.x, range.max.x, raster_step);
    let ys = raster_axis(range.min.y, range.max.y, raster_step);
    ys.iter()
        .flat_map(|y| xs.iter().map(move |x| Point::new(*x, *y)))
        .find(|p| is_free(*p))
}

/// Center nearest to the footprint's own center that keeps its rotated
/// extent inside `bounds`; None when it cannot fit
pub fn clamp_to_bounds(bounds: &BoundingBox, footprint: &Obb) -> Option<Point> {
    let (half_x, half_y) = footprint.aabb_half_extents();
    SearchRange::inside(bounds, half_x, half_y).map(|range| range.clamp(footprint.center))
}

/// Target if free, otherwise the closer end point of the two axis decompositions
fn constrain_with(from: Point, to: Point, is_free: impl Fn(Point) -> bool) -> Point {
    if is_free(to) {
        return to;
    }

    let x_then_y = {
        let mid = slide(from, Point::new(to.x, from.y), &is_free);
        slide(mid, Point::new(mid.x, to.y), &is_free)
    };
    let y_then_x = {
        let mid = slide(from, Point::new(from.x, to.y), &is_free);
        slide(mid, Point::new(to.x, mid.y), &is_free)
    };

    if x_then_y.distance_to(to) <= y_then_x.distance_to(to) {
        x_then_y
    } else {
        y_then_x
    }
}

/// Furthest free point on the straight line `from` -> `to`
fn slide(from: Point, to: Point, is_free: &impl Fn(Point) -> bool) -> Point {
    if is_free(to) {
        return to;
    }

    let lerp = |t: f64| from + (to - from) * t;
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..SLIDE_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        if is_free(lerp(mid)) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lerp(lo)
}

/// Collision queries against a fixed set of desk rectangles
#[derive(Debug, Clone)]
pub struct PlacementSolver {
    obstacles: Vec<(EntityId, Obb)>,
    snap_distance: f64,
}

impl PlacementSolver {
    /// Solver over every desk in `desks`
    pub fn new<'a>(desks: impl IntoIterator<Item = &'a Desk>, snap_distance: f64) -> Self {
        Self {
            obstacles: desks.into_iter().map(|d| (d.id, d.obb())).collect(),
            snap_distance,
        }
    }

    pub fn from_obstacles(obstacles: Vec<(EntityId, Obb)>, snap_distance: f64) -> Self {
        Self {
            obstacles,
            snap_distance,
        }
    }

    /// Ids of the obstacles the candidate overlaps
    pub fn overlapping(&self, candidate: &Obb, exclude: &[EntityId]) -> Vec<EntityId> {
        self.obstacles
            .iter()
            .filter(|(id, _)| !exclude.contains(id))
            .filter(|(_, obb)| do_obbs_overlap(candidate, obb))
            .map(|(id, _)| *id)
            .collect()
    }

    /// The candidate overlaps no obstacle other than the excluded ids
    pub fn is_area_free(&self, candidate: &Obb, exclude: &[EntityId]) -> bool {
        self.obstacles
            .iter()
            .filter(|(id, _)| !exclude.contains(id))
            .all(|(_, obb)| !do_obbs_overlap(candidate, obb))
    }

    /// Move a rectangle from `from` toward `to`, sliding along obstacles.
    ///
    /// `footprint` supplies size and rotation; its center is ignored. Returns
    /// `to` when the target is free, otherwise the better of the two axis
    /// decompositions.
    pub fn constrain_movement(
        &self,
        from: Point,
        to: Point,
        footprint: &Obb,
        exclude: &[EntityId],
    ) -> Point {
        constrain_with(from, to, |p| self.is_area_free(&footprint.at(p), exclude))
    }

    /// Group counterpart of [`constrain_movement`](Self::constrain_movement):
    /// slides a translation offset applied to every member at once
    pub fn constrain_group_movement(
        &self,
        members: &[Obb],
        from_offset: Point,
        to_offset: Point,
        exclude: &[EntityId],
    ) -> Point {
        constrain_with(from_offset, to_offset, |offset| {
            members
                .iter()
                .all(|m| self.is_area_free(&m.translated(offset), exclude))
        })
    }

    /// Grid step for free-slot searches
    fn search_step(&self, width: f64, height: f64) -> f64 {
        (self.snap_distance * 2.0)
            .max(width.min(height) / 2.0)
            .max(1.0)
    }

    /// Nearest free center for a rectangle inside `bounds`.
    ///
    /// Returns the preferred point itself when it is free, and None when the
    /// rectangle cannot fit in `bounds` or no free slot exists.
    pub fn find_free_position(
        &self,
        bounds: &BoundingBox,
        footprint: &Obb,
        preferred: Point,
        exclude: &[EntityId],
    ) -> Option<Point> {
        let (half_x, half_y) = footprint.aabb_half_extents();
        let range = SearchRange::inside(bounds, half_x, half_y)?;
        let step = self.search_step(footprint.width(), footprint.height());

        let found = search_nearest(range, preferred, step, |p| {
            self.is_area_free(&footprint.at(p), exclude)
        });
        debug!(?preferred, ?found, "free position search");
        found
    }

    /// Nearest translation that places every member of a rigid group legally.
    ///
    /// Members are the group's current rectangles; the returned offset is
    /// applied to all of them at once. `exclude` should list the members' own
    /// ids so the group does not collide with itself. `bounds` limits the
    /// search; `fits` can reject offsets that leave a member outside its own
    /// region when the group spans several.
    pub fn find_free_group_position(
        &self,
        bounds: &BoundingBox,
        members: &[Obb],
        preferred_offset: Point,
        exclude: &[EntityId],
        fits: impl Fn(Point) -> bool,
    ) -> Option<Point> {
        let group = members
            .iter()
            .map(Obb::bounds)
            .reduce(|a, b| a.union(&b))?;
        let range = SearchRange::from_limits(
            Point::new(bounds.x - group.x, bounds.y - group.y),
            Point::new(bounds.right() - group.right(), bounds.bottom() - group.bottom()),
        )?;
        let step = members
            .iter()
            .map(|m| self.search_step(m.width(), m.height()))
            .fold(f64::INFINITY, f64::min);

        search_nearest(range, preferred_offset, step, |offset| {
            fits(offset)
                && members
                    .iter()
                    .all(|m| self.is_area_free(&m.translated(offset), exclude))
        })
    }

    /// Like [`find_free_group_position`](Self::find_free_group_position) for
    /// pasted copies: the originals stay in place and count as obstacles.
    pub fn find_free_copied_group_position(
        &self,
        bounds: &BoundingBox,
        members: &[Obb],
        preferred_offset: Point,
        fits: impl Fn(Point) -> bool,
    ) -> Option<Point> {
        self.find_free_group_position(bounds, members, preferred_offset, &[], fits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Obb {
        Obb::new(Point::new(x, y), w, h, 0.0)
    }

    fn solver(obstacles: &[(u64, Obb)]) -> PlacementSolver {
        PlacementSolver::from_obstacles(
            obstacles
                .iter()
                .map(|(id, obb)| (EntityId::Remote(*id), *obb))
                .collect(),
            10.0,
        )
    }

    #[test]
    fn test_area_free_respects_exclusions() {
        let s = solver(&[(1, rect(0.0, 0.0, 100.0, 50.0))]);
        let candidate = rect(10.0, 0.0, 100.0, 50.0);
        assert!(!s.is_area_free(&candidate, &[]));
        assert!(s.is_area_free(&candidate, &[EntityId::Remote(1)]));
        assert_eq!(s.overlapping(&candidate, &[]), vec![EntityId::Remote(1)]);
    }

    #[test]
    fn test_clamp_to_bounds_uses_rotated_extent() {
        let bounds = BoundingBox::new(0.0, 0.0, 200.0, 200.0);
        let upright = Obb::new(Point::new(190.0, 10.0), 100.0, 40.0, 90.0);
        let clamped = clamp_to_bounds(&bounds, &upright).unwrap();
        assert!((clamped.x - 180.0).abs() < 1e-9, "x = {}", clamped.x);
        assert!((clamped.y - 50.0).abs() < 1e-9, "y = {}", clamped.y);
        let huge = Obb::new(Point::new(100.0, 100.0), 300.0, 40.0, 0.0);
        assert_eq!(clamp_to_bounds(&bounds, &huge), None);
    }

    #[test]
    fn test_constrain_free_target_is_unchanged() {
        let s = solver(&[(1, rect(500.0, 0.0, 100.0, 50.0))]);
        let to = Point::new(50.0, 20.0);
        let result = s.constrain_movement(Point::origin(), to, &rect(0.0, 0.0, 100.0, 50.0), &[]);
        assert_eq!(result, to);
    }

    #[test]
    fn test_constrain_slides_along_obstacle() {
        // Obstacle to the east; moving diagonally keeps the vertical component
        let s = solver(&[(1, rect(300.0, 0.0, 200.0, 100.0))]);
        let footprint = rect(0.0, 0.0, 200.0, 100.0);
        let to = Point::new(150.0, 40.0);
        let result = s.constrain_movement(Point::origin(), to, &footprint, &[]);

        assert!(s.is_area_free(&footprint.at(result), &[]));
        assert!(result.x > 99.0 && result.x <= 100.0, "x = {}", result.x);
        assert!((result.y - 40.0).abs() < 1e-9, "y = {}", result.y);
    }

    #[test]
    fn test_free_position_prefers_requested_point() {
        let s = solver(&[]);
        let bounds = BoundingBox::new(0.0, 0.0, 1000.0, 1000.0);
        let preferred = Point::new(400.0, 300.0);
        let found = s.find_free_position(&bounds, &rect(0.0, 0.0, 120.0, 60.0), preferred, &[]);
        assert_eq!(found, Some(preferred));
    }

    #[test]
    fn test_free_position_none_when_too_small() {
        let s = solver(&[]);
        let bounds = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let found = s.find_free_position(
            &bounds,
            &rect(0.0, 0.0, 120.0, 60.0),
            Point::new(50.0, 50.0),
            &[],
        );
        assert_eq!(found, None);
    }

    #[test]
    fn test_free_position_accounts_for_rotation() {
        let s = solver(&[]);
        // 120 x 60 fits only when turned upright
        let bounds = BoundingBox::new(0.0, 0.0, 70.0, 130.0);
        let upright = Obb::new(Point::origin(), 120.0, 60.0, 90.0);
        let flat = Obb::new(Point::origin(), 120.0, 60.0, 0.0);
        assert!(s
            .find_free_position(&bounds, &upright, Point::new(35.0, 65.0), &[])
            .is_some());
        assert!(s
            .find_free_position(&bounds, &flat, Point::new(35.0, 65.0), &[])
            .is_none());
    }

    #[test]
    fn test_free_position_moves_off_occupied_point() {
        let s = solver(&[(1, rect(200.0, 200.0, 120.0, 60.0))]);
        let bounds = BoundingBox::new(0.0, 0.0, 1000.0, 1000.0);
        let footprint = rect(0.0, 0.0, 120.0, 60.0);
        let found = s
            .find_free_position(&bounds, &footprint, Point::new(200.0, 200.0), &[])
            .unwrap();
        assert!(s.is_area_free(&footprint.at(found), &[]));
        assert!(found.distance_to(Point::new(200.0, 200.0)) <= 130.0);
    }

    #[test]
    fn test_free_position_full_space_returns_none() {
        let s = solver(&[(1, rect(50.0, 50.0, 100.0, 100.0))]);
        let bounds = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let found = s.find_free_position(
            &bounds,
            &rect(0.0, 0.0, 40.0, 40.0),
            Point::new(50.0, 50.0),
            &[],
        );
        assert_eq!(found, None);
    }

    #[test]
    fn test_copied_group_avoids_originals() {
        let a = rect(100.0, 100.0, 100.0, 50.0);
        let b = rect(210.0, 100.0, 100.0, 50.0);
        let s = solver(&[(1, a), (2, b)]);
        let bounds = BoundingBox::new(0.0, 0.0, 1000.0, 1000.0);
        let offset = s
            .find_free_copied_group_position(&bounds, &[a, b], Point::new(20.0, 20.0), |_| true)
            .unwrap();
        for member in [a, b] {
            assert!(s.is_area_free(&member.translated(offset), &[]));
        }
    }

    #[test]
    fn test_group_move_ignores_own_members() {
        let a = rect(100.0, 100.0, 100.0, 50.0);
        let b = rect(210.0, 100.0, 100.0, 50.0);
        let s = solver(&[(1, a), (2, b)]);
        let bounds = BoundingBox::new(0.0, 0.0, 1000.0, 1000.0);
        let own = [EntityId::Remote(1), EntityId::Remote(2)];
        let offset = s
            .find_free_group_position(&bounds, &[a, b], Point::new(5.0, 0.0), &own, |_| true)
            .unwrap();
        assert_eq!(offset, Point::new(5.0, 0.0));
    }

    #[test]
    fn test_group_search_skips_offsets_that_do_not_fit() {
        let a = rect(100.0, 100.0, 100.0, 50.0);
        let s = solver(&[]);
        let bounds = BoundingBox::new(0.0, 0.0, 1000.0, 1000.0);
        let offset = s
            .find_free_group_position(&bounds, &[a], Point::origin(), &[], |o| o.x >= 50.0)
            .unwrap();
        assert!(offset.x >= 50.0, "offset = {:?}", offset);
    }

    #[test]
    fn test_group_slides_until_contact() {
        let member = rect(0.0, 0.0, 100.0, 50.0);
        let s = solver(&[(9, rect(200.0, 0.0, 100.0, 50.0))]);
        let offset = s.constrain_group_movement(
            &[member],
            Point::origin(),
            Point::new(150.0, 0.0),
            &[EntityId::Remote(1)],
        );
        assert!(offset.x > 99.0 && offset.x <= 100.0, "x = {}", offset.x);
        assert!(s.is_area_free(&member.translated(offset), &[]));
    }

    #[test]
    fn test_group_too_wide_for_bounds() {
        let a = rect(100.0, 100.0, 100.0, 50.0);
        let b = rect(400.0, 100.0, 100.0, 50.0);
        let s = solver(&[]);
        let bounds = BoundingBox::new(0.0, 0.0, 300.0, 300.0);
        assert!(s
            .find_free_group_position(&bounds, &[a, b], Point::origin(), &[], |_| true)
            .is_none());
    }
}
