//! Stateless point, segment, polygon and oriented-rectangle tests.

use super::types::{BoundingBox, Obb, Point};

/// Tolerance for orientation, on-segment and separation tests
pub const EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

fn orientation(a: Point, b: Point, c: Point) -> Orientation {
    let val = (b.y - a.y) * (c.x - b.x) - (b.x - a.x) * (c.y - b.y);
    if val.abs() < EPSILON {
        Orientation::Collinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// `q` lies within the bounding box of segment `p`-`r` (assumes collinearity)
fn on_segment(p: Point, q: Point, r: Point) -> bool {
    q.x <= p.x.max(r.x) + EPSILON
        && q.x >= p.x.min(r.x) - EPSILON
        && q.y <= p.y.max(r.y) + EPSILON
        && q.y >= p.y.min(r.y) - EPSILON
}

/// Segments `p1`-`p2` and `q1`-`q2` cross, touch, or overlap collinearly.
pub fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Orientation::Collinear && on_segment(p1, q1, p2))
        || (o2 == Orientation::Collinear && on_segment(p1, q2, p2))
        || (o3 == Orientation::Collinear && on_segment(q1, p1, q2))
        || (o4 == Orientation::Collinear && on_segment(q1, p2, q2))
}

/// Ray-casting parity test. Points exactly on an edge may land either way.
pub fn is_point_inside_polygon(points: &[Point], point: Point) -> bool {
    if points.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (pi, pj) = (points[i], points[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Iterate the closed polygon's edges as `(start, end)` pairs
pub fn polygon_edges(points: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = points.len();
    (0..n).map(move |i| (points[i], points[(i + 1) % n]))
}

/// True if any pair of edges intersects, or one polygon contains the other.
pub fn polygons_intersect(a: &[Point], b: &[Point]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }

    for (a1, a2) in polygon_edges(a) {
        for (b1, b2) in polygon_edges(b) {
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }

    is_point_inside_polygon(b, a[0]) || is_point_inside_polygon(a, b[0])
}

/// Closest point to `p` on segment `a`-`b`
pub fn closest_point_on_segment(p: Point, a: Point, b: Point) -> Point {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq < f64::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    p.distance_to(closest_point_on_segment(p, a, b))
}

/// Axis-aligned bounds of a polygon, None when it has no vertices
pub fn polygon_bounds(points: &[Point]) -> Option<BoundingBox> {
    BoundingBox::from_points(points)
}

fn project(corners: &[Point; 4], axis: Point) -> (f64, f64) {
    corners.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
        let dot = c.dot(axis);
        (lo.min(dot), hi.max(dot))
    })
}

/// Separating-axis overlap test for two oriented rectangles.
///
/// Touching edges (within [`EPSILON`]) do not count as overlap.
pub fn do_obbs_overlap(a: &Obb, b: &Obb) -> bool {
    let corners_a = a.corners();
    let corners_b = b.corners();

    for axis in a.axes().into_iter().chain(b.axes()) {
        let (min_a, max_a) = project(&corners_a, axis);
        let (min_b, max_b) = project(&corners_b, axis);
        if max_a <= min_b + EPSILON || max_b <= min_a + EPSILON {
            return false;
        }
    }
    true
}
