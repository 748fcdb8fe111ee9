//! Magnetic snapping of desk positions and right-angle snapping of rotations

use crate::geometry::{normalize_degrees, Obb, Point};

/// Two snap directions count as perpendicular below this |cos| value
const PERPENDICULAR_DOT: f64 = 0.15;

/// One candidate correction pulling the dragged desk onto an alignment line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapCorrection {
    /// Unit direction the correction moves along (an axis of the other desk)
    pub direction: Point,
    /// Signed distance along `direction`
    pub amount: f64,
}

impl SnapCorrection {
    pub fn vector(&self) -> Point {
        self.direction * self.amount
    }

    pub fn distance(&self) -> f64 {
        self.amount.abs()
    }
}

/// Half-length of `obb` projected onto a unit `axis`
fn projected_extent(obb: &Obb, axis: Point) -> f64 {
    let [ax, ay] = obb.axes();
    obb.half_width * ax.dot(axis).abs() + obb.half_height * ay.dot(axis).abs()
}

/// Alignment corrections of `dragged` against one other desk.
///
/// Along each of the other desk's axes the alignment lines are its center
/// line and both edges. The dragged desk can align its center with the
/// center line, or either of its edges with either edge.
pub fn alignment_corrections(dragged: &Obb, other: &Obb, tolerance: f64) -> Vec<SnapCorrection> {
    let local = other.to_local(dragged.center);
    let [axis_u, axis_v] = other.axes();
    let mut corrections = Vec::new();

    for (axis, position, other_half) in [
        (axis_u, local.x, other.half_width),
        (axis_v, local.y, other.half_height),
    ] {
        let extent = projected_extent(dragged, axis);
        let mut pairs = vec![(position, 0.0)];
        for feature in [position - extent, position + extent] {
            for line in [-other_half, other_half] {
                pairs.push((feature, line));
            }
        }

        for (feature, line) in pairs {
            let amount = line - feature;
            if amount.abs() <= tolerance {
                corrections.push(SnapCorrection {
                    direction: axis,
                    amount,
                });
            }
        }
    }
    corrections
}

/// Snap a dragged desk's center to alignment lines of the other desks.
///
/// The closest correction wins; a second correction in a nearly
/// perpendicular direction is added so a corner can align on both axes.
pub fn snap_desk_center<'a>(
    dragged: &Obb,
    others: impl IntoIterator<Item = &'a Obb>,
    tolerance: f64,
) -> Point {
    if tolerance <= 0.0 {
        return dragged.center;
    }

    let mut corrections: Vec<SnapCorrection> = others
        .into_iter()
        .flat_map(|other| alignment_corrections(dragged, other, tolerance))
        .collect();
    corrections.sort_by(|a, b| a.distance().total_cmp(&b.distance()));

    let Some(primary) = corrections.first().copied() else {
        return dragged.center;
    };
    let secondary = corrections
        .iter()
        .find(|c| c.direction.dot(primary.direction).abs() < PERPENDICULAR_DOT);

    let mut center = dragged.center + primary.vector();
    if let Some(second) = secondary {
        center = center + second.vector();
    }
    center
}

/// Snap an angle to the nearest right angle when within `tolerance` degrees.
///
/// The result is normalized into `[0, 360)`.
pub fn snap_rotation(angle: f64, tolerance: f64) -> f64 {
    let angle = normalize_degrees(angle);
    for target in [0.0, 90.0, 180.0, 270.0, 360.0] {
        if (angle - target).abs() <= tolerance {
            return normalize_degrees(target);
        }
    }
    angle
}
