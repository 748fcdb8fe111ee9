//! Desk selection and proportional group resizing
//!
//! Selection is pure local state: changing it never touches the edit buffer.

use std::collections::BTreeSet;

use crate::editor::hit::Handle;
use crate::geometry::{BoundingBox, Point};
use crate::model::{Desk, EntityId};

/// Currently selected desk ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: BTreeSet<EntityId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with a single desk
    pub fn select_only(&mut self, id: EntityId) {
        self.ids.clear();
        self.ids.insert(id);
    }

    /// Replace the selection with the given desks
    pub fn select_all(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        self.ids = ids.into_iter().collect();
    }

    /// Add or remove one desk; returns whether it is selected afterwards
    pub fn toggle(&mut self, id: EntityId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn remove(&mut self, id: EntityId) {
        self.ids.remove(&id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The selected id when exactly one desk is selected
    pub fn single(&self) -> Option<EntityId> {
        if self.ids.len() == 1 {
            self.ids.iter().next().copied()
        } else {
            None
        }
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.ids.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.ids.iter()
    }

    /// Swap a temp id for the id the server assigned
    pub fn remap(&mut self, from: EntityId, to: EntityId) {
        if self.ids.remove(&from) {
            self.ids.insert(to);
        }
    }
}

/// Axis-aligned box around every given desk, rotation included
pub fn group_bounds<'a>(desks: impl IntoIterator<Item = &'a Desk>) -> Option<BoundingBox> {
    desks
        .into_iter()
        .map(|d| d.obb().bounds())
        .reduce(|a, b| a.union(&b))
}

/// Desk geometry captured when a group resize starts
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub id: EntityId,
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

impl GroupMember {
    pub fn from_desk(desk: &Desk) -> Self {
        Self {
            id: desk.id,
            center: desk.center,
            width: desk.width,
            height: desk.height,
            rotation: desk.rotation,
        }
    }

    /// A desk turned closer to vertical than horizontal swaps which plan
    /// axis scales its width and height
    fn is_upright(&self) -> bool {
        let radians = self.rotation.to_radians();
        radians.sin().abs() > radians.cos().abs()
    }

    /// Plan-axis extents of the desk's own width and height
    fn plan_size(&self) -> (f64, f64) {
        if self.is_upright() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// A member's geometry after scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledMember {
    pub id: EntityId,
    pub center: Point,
    pub width: f64,
    pub height: f64,
}

/// Proportional resize of a group about its axis-aligned bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct GroupResize {
    pub start_bounds: BoundingBox,
    pub members: Vec<GroupMember>,
    /// Smallest scale along plan x that keeps every member at minimum size
    min_scale_x: f64,
    min_scale_y: f64,
}

impl GroupResize {
    pub fn new(
        members: Vec<GroupMember>,
        start_bounds: BoundingBox,
        min_width: f64,
        min_height: f64,
    ) -> Self {
        let mut min_scale_x: f64 = 0.0;
        let mut min_scale_y: f64 = 0.0;
        for member in &members {
            let (min_x, min_y) = if member.is_upright() {
                (min_height, min_width)
            } else {
                (min_width, min_height)
            };
            let (size_x, size_y) = member.plan_size();
            if size_x > 0.0 {
                min_scale_x = min_scale_x.max(min_x / size_x);
            }
            if size_y > 0.0 {
                min_scale_y = min_scale_y.max(min_y / size_y);
            }
        }
        Self {
            start_bounds,
            members,
            min_scale_x,
            min_scale_y,
        }
    }

    pub fn member_ids(&self) -> Vec<EntityId> {
        self.members.iter().map(|m| m.id).collect()
    }

    /// Scale factors for the pointer at `pointer` while holding `handle`.
    ///
    /// Edge handles scale one axis; corner handles scale both, and `uniform`
    /// makes them share the larger factor.
    pub fn scale_for(&self, handle: Handle, pointer: Point, uniform: bool) -> (f64, f64) {
        let (sx, sy) = handle.signs();
        let b = &self.start_bounds;
        let axis_scale = |sign: f64, pointer: f64, low: f64, high: f64, size: f64| {
            if sign == 0.0 || size <= 0.0 {
                return 1.0;
            }
            let anchor = if sign > 0.0 { low } else { high };
            ((pointer - anchor) * sign / size).max(0.0)
        };
        let scale_x = axis_scale(sx, pointer.x, b.x, b.right(), b.width);
        let scale_y = axis_scale(sy, pointer.y, b.y, b.bottom(), b.height);

        if uniform && handle.is_corner() {
            let shared = if (scale_x - 1.0).abs() >= (scale_y - 1.0).abs() {
                scale_x
            } else {
                scale_y
            };
            let shared = shared.max(self.min_scale_x.max(self.min_scale_y));
            return (shared, shared);
        }
        (scale_x.max(self.min_scale_x), scale_y.max(self.min_scale_y))
    }

    /// Member geometry for the given scale, anchored at the edge or corner
    /// opposite `handle`
    pub fn apply(&self, handle: Handle, scale_x: f64, scale_y: f64) -> Vec<ScaledMember> {
        let (sx, sy) = handle.signs();
        let b = &self.start_bounds;
        let center = b.center();
        let new_center = |sign: f64, low: f64, high: f64, size: f64, scale: f64, mid: f64| {
            if sign > 0.0 {
                low + size * scale / 2.0
            } else if sign < 0.0 {
                high - size * scale / 2.0
            } else {
                mid
            }
        };
        let group_center = Point::new(
            new_center(sx, b.x, b.right(), b.width, scale_x, center.x),
            new_center(sy, b.y, b.bottom(), b.height, scale_y, center.y),
        );

        self.members
            .iter()
            .map(|m| {
                let offset = m.center - center;
                let (width_scale, height_scale) = if m.is_upright() {
                    (scale_y, scale_x)
                } else {
                    (scale_x, scale_y)
                };
                ScaledMember {
                    id: m.id,
                    center: Point::new(
                        group_center.x + offset.x * scale_x,
                        group_center.y + offset.y * scale_y,
                    ),
                    width: m.width * width_scale,
                    height: m.height * height_scale,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn member(id: u64, x: f64, y: f64, w: f64, h: f64) -> GroupMember {
        GroupMember {
            id: EntityId::Remote(id),
            center: Point::new(x, y),
            width: w,
            height: h,
            rotation: 0.0,
        }
    }

    fn pair() -> GroupResize {
        // Two 100x50 desks side by side: group box x 0..200, y 0..50
        GroupResize::new(
            vec![member(1, 50.0, 25.0, 100.0, 50.0), member(2, 150.0, 25.0, 100.0, 50.0)],
            BoundingBox::new(0.0, 0.0, 200.0, 50.0),
            20.0,
            20.0,
        )
    }

    #[test]
    fn test_toggle_and_single() {
        let mut selection = Selection::new();
        selection.select_only(EntityId::Remote(1));
        assert_eq!(selection.single(), Some(EntityId::Remote(1)));
        assert!(selection.toggle(EntityId::Remote(2)));
        assert_eq!(selection.single(), None);
        assert!(!selection.toggle(EntityId::Remote(1)));
        assert_eq!(selection.ids(), vec![EntityId::Remote(2)]);
    }

    #[test]
    fn test_remap_temp_id() {
        let mut selection = Selection::new();
        selection.select_only(EntityId::Temp(4));
        selection.remap(EntityId::Temp(4), EntityId::Remote(40));
        assert!(selection.contains(EntityId::Remote(40)));
        assert!(!selection.contains(EntityId::Temp(4)));
    }

    #[test]
    fn test_east_handle_stretches_horizontally() {
        let resize = pair();
        let (sx, sy) = resize.scale_for(Handle::E, Point::new(400.0, 10.0), false);
        assert_eq!((sx, sy), (2.0, 1.0));

        let scaled = resize.apply(Handle::E, sx, sy);
        assert_eq!(scaled[0].center, Point::new(100.0, 25.0));
        assert_eq!(scaled[1].center, Point::new(300.0, 25.0));
        assert_eq!(scaled[0].width, 200.0);
        assert_eq!(scaled[0].height, 50.0);
    }

    #[test]
    fn test_scale_floored_by_member_minimum() {
        let resize = pair();
        // Dragging the east edge past the west edge would invert the group
        let (sx, _) = resize.scale_for(Handle::E, Point::new(-50.0, 0.0), false);
        assert_eq!(sx, 0.2);
    }

    #[test]
    fn test_uniform_corner_keeps_aspect() {
        let resize = pair();
        let (sx, sy) = resize.scale_for(Handle::SE, Point::new(300.0, 60.0), true);
        assert_eq!(sx, sy);
        assert_eq!(sx, 1.5);
    }

    #[test]
    fn test_west_handle_anchors_east_edge() {
        let resize = pair();
        let scaled = resize.apply(Handle::W, 0.5, 1.0);
        // Group now spans 100..200
        assert_eq!(scaled[0].center, Point::new(125.0, 25.0));
        assert_eq!(scaled[1].center, Point::new(175.0, 25.0));
    }
}
