//! Render surface abstraction and a headless implementation
//!
//! The editor never draws directly. It pushes [`SceneNode`]s into a
//! [`SceneSurface`] and asks the surface to resolve screen points.

use std::collections::BTreeMap;

use crate::geometry::{is_point_inside_polygon, Obb, Point};
use crate::model::{BookingStatus, Desk, EntityId, Space};

/// Pan and zoom of the view: `screen = plan * zoom + pan`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub pan: Point,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Point::origin(),
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(pan: Point, zoom: f64) -> Self {
        Self { pan, zoom }
    }

    pub fn screen_to_plan(&self, screen: Point) -> Point {
        (screen - self.pan) * (1.0 / self.zoom)
    }

    /// Zoom by `factor` keeping the plan point under `screen` fixed
    pub fn zoom_about(&mut self, screen: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.screen_to_plan(screen);
        self.zoom *= factor;
        self.pan = screen - anchor * self.zoom;
    }
}

/// Which entity a scene node draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Space(EntityId),
    Desk(EntityId),
}

/// Everything a surface needs to draw one entity
#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Space {
        id: EntityId,
        name: String,
        color: String,
        points: Vec<Point>,
        editing: bool,
    },
    Desk {
        id: EntityId,
        obb: Obb,
        label: String,
        status: BookingStatus,
        selected: bool,
    },
}

impl SceneNode {
    pub fn space(space: &Space, editing: bool) -> Self {
        SceneNode::Space {
            id: space.id,
            name: space.name.clone(),
            color: space.color.clone(),
            points: space.points.clone(),
            editing,
        }
    }

    pub fn desk(desk: &Desk, selected: bool) -> Self {
        SceneNode::Desk {
            id: desk.id,
            obb: desk.obb(),
            label: desk.label.clone(),
            status: desk.booking_status,
            selected,
        }
    }

    pub fn entity(&self) -> EntityRef {
        match self {
            SceneNode::Space { id, .. } => EntityRef::Space(*id),
            SceneNode::Desk { id, .. } => EntityRef::Desk(*id),
        }
    }

    /// Plan point inside the drawn shape
    pub fn contains(&self, plan: Point) -> bool {
        match self {
            SceneNode::Space { points, .. } => is_point_inside_polygon(points, plan),
            SceneNode::Desk { obb, .. } => obb.contains_point(plan),
        }
    }
}

/// A visual surface the editor draws into
pub trait SceneSurface {
    /// Create the entity's node or replace it
    fn upsert_node(&mut self, node: SceneNode);

    fn remove_node(&mut self, entity: EntityRef);

    /// Entity drawn under a screen point, topmost first
    fn hit_test(&self, screen: Point) -> Option<EntityRef>;

    fn screen_to_plan(&self, screen: Point) -> Point;
}

/// In-memory surface: nodes in a map, geometric hit-testing
#[derive(Debug, Clone, Default)]
pub struct HeadlessScene {
    pub viewport: Viewport,
    nodes: BTreeMap<EntityRef, SceneNode>,
}

impl HeadlessScene {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            nodes: BTreeMap::new(),
        }
    }

    pub fn node(&self, entity: EntityRef) -> Option<&SceneNode> {
        self.nodes.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl SceneSurface for HeadlessScene {
    fn upsert_node(&mut self, node: SceneNode) {
        self.nodes.insert(node.entity(), node);
    }

    fn remove_node(&mut self, entity: EntityRef) {
        self.nodes.remove(&entity);
    }

    fn hit_test(&self, screen: Point) -> Option<EntityRef> {
        let plan = self.viewport.screen_to_plan(screen);
        // Desks are drawn above spaces
        let desk = self
            .nodes
            .values()
            .rev()
            .find(|n| matches!(n, SceneNode::Desk { .. }) && n.contains(plan));
        desk.or_else(|| self.nodes.values().rev().find(|n| n.contains(plan)))
            .map(SceneNode::entity)
    }

    fn screen_to_plan(&self, screen: Point) -> Point {
        self.viewport.screen_to_plan(screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpaceKind;

    #[test]
    fn test_viewport_round_trip_after_zoom() {
        let mut viewport = Viewport::new(Point::new(40.0, -20.0), 2.0);
        let screen = Point::new(300.0, 200.0);
        let before = viewport.screen_to_plan(screen);
        viewport.zoom_about(screen, 1.5);
        let after = viewport.screen_to_plan(screen);
        assert!(before.distance_to(after) < 1e-9);
        assert_eq!(viewport.zoom, 3.0);
    }

    #[test]
    fn test_hit_test_prefers_desks() {
        let space = Space {
            id: EntityId::Remote(1),
            name: "Open area".to_string(),
            kind: SpaceKind::Coworking,
            color: "#eee".to_string(),
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(400.0, 0.0),
                Point::new(400.0, 400.0),
                Point::new(0.0, 400.0),
            ],
        };
        let desk = Desk {
            id: EntityId::Temp(1),
            space_id: space.id,
            center: Point::new(100.0, 100.0),
            width: 60.0,
            height: 40.0,
            rotation: 0.0,
            label: String::new(),
            booking_status: BookingStatus::Free,
        };

        let mut scene = HeadlessScene::new(Viewport::new(Point::origin(), 2.0));
        scene.upsert_node(SceneNode::desk(&desk, false));
        scene.upsert_node(SceneNode::space(&space, false));

        assert_eq!(
            scene.hit_test(Point::new(200.0, 200.0)),
            Some(EntityRef::Desk(desk.id))
        );
        assert_eq!(
            scene.hit_test(Point::new(600.0, 600.0)),
            Some(EntityRef::Space(space.id))
        );
        assert_eq!(scene.hit_test(Point::new(900.0, 900.0)), None);

        scene.remove_node(EntityRef::Desk(desk.id));
        assert_eq!(scene.len(), 1);
    }
}
