//! Handle hit-testing in plan coordinates
//!
//! Handle radii are screen-constant: callers pass radii already divided by
//! the current zoom (see [`EditorConfig::handle_radius_at`](crate::config::EditorConfig::handle_radius_at)).

use crate::geometry::{BoundingBox, Obb, Point};

/// One of the eight resize handles on a rectangle's edges and corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::N,
        Handle::NE,
        Handle::E,
        Handle::SE,
        Handle::S,
        Handle::SW,
        Handle::W,
        Handle::NW,
    ];

    /// Direction of the handle from the center in the rectangle's local
    /// frame: -1, 0 or 1 per axis (y grows downward)
    pub fn signs(&self) -> (f64, f64) {
        match self {
            Handle::N => (0.0, -1.0),
            Handle::NE => (1.0, -1.0),
            Handle::E => (1.0, 0.0),
            Handle::SE => (1.0, 1.0),
            Handle::S => (0.0, 1.0),
            Handle::SW => (-1.0, 1.0),
            Handle::W => (-1.0, 0.0),
            Handle::NW => (-1.0, -1.0),
        }
    }

    pub fn opposite(&self) -> Handle {
        match self {
            Handle::N => Handle::S,
            Handle::NE => Handle::SW,
            Handle::E => Handle::W,
            Handle::SE => Handle::NW,
            Handle::S => Handle::N,
            Handle::SW => Handle::NE,
            Handle::W => Handle::E,
            Handle::NW => Handle::SE,
        }
    }

    pub fn is_corner(&self) -> bool {
        let (sx, sy) = self.signs();
        sx != 0.0 && sy != 0.0
    }
}

/// What a pointer-down on a desk grabbed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeskHit {
    Rotate,
    Resize(Handle),
    Body,
}

/// Plan position of a resize handle on a desk
pub fn handle_position(obb: &Obb, handle: Handle) -> Point {
    let (sx, sy) = handle.signs();
    obb.to_plan(Point::new(sx * obb.half_width, sy * obb.half_height))
}

/// Plan position of the rotate handle, `offset` above the desk's top edge
pub fn rotate_handle_position(obb: &Obb, offset: f64) -> Point {
    obb.to_plan(Point::new(0.0, -obb.half_height - offset))
}

/// Hit-test a selected desk: rotate handle first, then resize handles, then
/// the body
pub fn hit_desk(obb: &Obb, point: Point, radius: f64, rotate_offset: f64) -> Option<DeskHit> {
    if rotate_handle_position(obb, rotate_offset).distance_to(point) <= radius {
        return Some(DeskHit::Rotate);
    }
    if let Some(handle) = Handle::ALL
        .into_iter()
        .find(|h| handle_position(obb, *h).distance_to(point) <= radius)
    {
        return Some(DeskHit::Resize(handle));
    }
    obb.contains_point(point).then_some(DeskHit::Body)
}

/// Plan position of a handle on an axis-aligned group box
pub fn group_handle_position(bounds: &BoundingBox, handle: Handle) -> Point {
    let (sx, sy) = handle.signs();
    let center = bounds.center();
    Point::new(
        center.x + sx * bounds.width / 2.0,
        center.y + sy * bounds.height / 2.0,
    )
}

/// Resize handle of a group box under the pointer
pub fn hit_group_handle(bounds: &BoundingBox, point: Point, radius: f64) -> Option<Handle> {
    Handle::ALL
        .into_iter()
        .find(|h| group_handle_position(bounds, *h).distance_to(point) <= radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_follow_rotation() {
        let obb = Obb::new(Point::new(100.0, 100.0), 80.0, 40.0, 90.0);
        // East handle of a desk turned 90° clockwise points down
        let east = handle_position(&obb, Handle::E);
        assert!((east.x - 100.0).abs() < 1e-9);
        assert!((east.y - 140.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotate_handle_wins_over_body() {
        let obb = Obb::new(Point::new(0.0, 0.0), 80.0, 40.0, 0.0);
        assert_eq!(
            hit_desk(&obb, Point::new(0.0, -44.0), 6.0, 24.0),
            Some(DeskHit::Rotate)
        );
        assert_eq!(
            hit_desk(&obb, Point::new(41.0, 19.0), 6.0, 24.0),
            Some(DeskHit::Resize(Handle::SE))
        );
        assert_eq!(
            hit_desk(&obb, Point::new(5.0, 5.0), 6.0, 24.0),
            Some(DeskHit::Body)
        );
        assert_eq!(hit_desk(&obb, Point::new(200.0, 5.0), 6.0, 24.0), None);
    }

    #[test]
    fn test_group_handles() {
        let bounds = BoundingBox::new(0.0, 0.0, 200.0, 100.0);
        assert_eq!(
            hit_group_handle(&bounds, Point::new(199.0, 51.0), 4.0),
            Some(Handle::E)
        );
        assert_eq!(hit_group_handle(&bounds, Point::new(100.0, 50.0), 4.0), None);
    }

    #[test]
    fn test_opposite_handles() {
        for handle in Handle::ALL {
            let (sx, sy) = handle.signs();
            let (ox, oy) = handle.opposite().signs();
            assert_eq!((sx, sy), (-ox, -oy));
        }
    }
}
