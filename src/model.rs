//! Entities of a floor layout: spaces (polygons) and desks (oriented rectangles)
//!
//! Each entity has a full *payload* (what the storage collaborator persists)
//! and a partial *patch* type used for journalled updates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::{Journaled, PatchMerge};
use crate::geometry::{polygon_bounds, BoundingBox, Obb, Point};

/// Identity of a space or desk.
///
/// `Temp` ids are handed out locally for drafts that have not been created
/// remotely yet; they are replaced by `Remote` ids after a successful flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    Remote(u64),
    Temp(u64),
}

impl EntityId {
    pub fn is_temp(&self) -> bool {
        matches!(self, EntityId::Temp(_))
    }

    pub fn remote(&self) -> Option<u64> {
        match self {
            EntityId::Remote(id) => Some(*id),
            EntityId::Temp(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Remote(id) => write!(f, "{}", id),
            EntityId::Temp(id) => write!(f, "tmp-{}", id),
        }
    }
}

/// Which collection an entity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Space,
    Desk,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Space => f.write_str("space"),
            EntityKind::Desk => f.write_str("desk"),
        }
    }
}

/// What a space is used for; only coworking spaces hold desks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceKind {
    #[default]
    Coworking,
    Meeting,
    Other,
}

/// Booking state of a desk for the currently viewed date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Free,
    Booked,
    /// Booked by the current user
    My,
}

/// A bookable area bounded by a polygon
#[derive(Debug, Clone, PartialEq)]
pub struct Space {
    pub id: EntityId,
    pub name: String,
    pub kind: SpaceKind,
    pub color: String,
    pub points: Vec<Point>,
}

impl Space {
    pub fn from_payload(id: EntityId, payload: &SpacePayload) -> Self {
        Self {
            id,
            name: payload.name.clone(),
            kind: payload.kind,
            color: payload.color.clone(),
            points: payload.points.clone(),
        }
    }

    pub fn payload(&self, floor_id: u64) -> SpacePayload {
        SpacePayload {
            floor_id,
            name: self.name.clone(),
            kind: self.kind,
            color: self.color.clone(),
            points: self.points.clone(),
        }
    }

    /// Bounding box of the polygon, the clamp region for its desks
    pub fn bounds(&self) -> Option<BoundingBox> {
        polygon_bounds(&self.points)
    }
}

/// A bookable desk: an oriented rectangle owned by a coworking space
#[derive(Debug, Clone, PartialEq)]
pub struct Desk {
    pub id: EntityId,
    pub space_id: EntityId,
    pub center: Point,
    pub width: f64,
    pub height: f64,
    /// Clockwise rotation in degrees
    pub rotation: f64,
    pub label: String,
    /// Supplied by the booking collaborator, never computed here
    pub booking_status: BookingStatus,
}

impl Desk {
    pub fn from_payload(id: EntityId, payload: &DeskPayload) -> Self {
        Self {
            id,
            space_id: payload.space_id,
            center: Point::new(payload.x, payload.y),
            width: payload.width,
            height: payload.height,
            rotation: payload.rotation,
            label: payload.label.clone(),
            booking_status: BookingStatus::default(),
        }
    }

    pub fn payload(&self) -> DeskPayload {
        DeskPayload {
            space_id: self.space_id,
            x: self.center.x,
            y: self.center.y,
            width: self.width,
            height: self.height,
            rotation: self.rotation,
            label: self.label.clone(),
        }
    }

    pub fn obb(&self) -> Obb {
        Obb::new(self.center, self.width, self.height, self.rotation)
    }

    /// Patch describing every geometric field that differs from `before`
    pub fn diff_geometry(&self, before: &Desk) -> DeskPatch {
        let changed = |a: f64, b: f64| (a - b).abs() > f64::EPSILON;
        DeskPatch {
            x: changed(self.center.x, before.center.x).then_some(self.center.x),
            y: changed(self.center.y, before.center.y).then_some(self.center.y),
            width: changed(self.width, before.width).then_some(self.width),
            height: changed(self.height, before.height).then_some(self.height),
            rotation: changed(self.rotation, before.rotation).then_some(self.rotation),
            label: None,
        }
    }
}

/// Full persisted form of a space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacePayload {
    pub floor_id: u64,
    pub name: String,
    #[serde(default)]
    pub kind: SpaceKind,
    #[serde(default)]
    pub color: String,
    pub points: Vec<Point>,
}

/// Partial update to a space
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpacePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SpaceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
}

/// Full persisted form of a desk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeskPayload {
    pub space_id: EntityId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub label: String,
}

/// Partial update to a desk
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl DeskPatch {
    pub fn position(center: Point) -> Self {
        Self {
            x: Some(center.x),
            y: Some(center.y),
            ..Default::default()
        }
    }
}

fn option_finite(value: Option<f64>) -> bool {
    value.map_or(true, f64::is_finite)
}

impl PatchMerge for SpacePatch {
    fn merge(&mut self, newer: Self) {
        if newer.name.is_some() {
            self.name = newer.name;
        }
        if newer.kind.is_some() {
            self.kind = newer.kind;
        }
        if newer.color.is_some() {
            self.color = newer.color;
        }
        if newer.points.is_some() {
            self.points = newer.points;
        }
    }

    fn is_empty(&self) -> bool {
        *self == SpacePatch::default()
    }

    fn is_finite(&self) -> bool {
        self.points
            .as_ref()
            .map_or(true, |points| points.iter().all(Point::is_finite))
    }
}

impl PatchMerge for DeskPatch {
    fn merge(&mut self, newer: Self) {
        let DeskPatch {
            x,
            y,
            width,
            height,
            rotation,
            label,
        } = newer;
        self.x = x.or(self.x);
        self.y = y.or(self.y);
        self.width = width.or(self.width);
        self.height = height.or(self.height);
        self.rotation = rotation.or(self.rotation);
        if label.is_some() {
            self.label = label;
        }
    }

    fn is_empty(&self) -> bool {
        *self == DeskPatch::default()
    }

    fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.rotation]
            .into_iter()
            .all(option_finite)
    }
}

impl Journaled for SpacePayload {
    type Patch = SpacePatch;
    const KIND: EntityKind = EntityKind::Space;

    fn apply(&mut self, patch: &SpacePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(points) = &patch.points {
            self.points = points.clone();
        }
    }

    fn is_finite(&self) -> bool {
        self.points.iter().all(Point::is_finite)
    }
}

impl Journaled for DeskPayload {
    type Patch = DeskPatch;
    const KIND: EntityKind = EntityKind::Desk;

    fn apply(&mut self, patch: &DeskPatch) {
        self.x = patch.x.unwrap_or(self.x);
        self.y = patch.y.unwrap_or(self.y);
        self.width = patch.width.unwrap_or(self.width);
        self.height = patch.height.unwrap_or(self.height);
        self.rotation = patch.rotation.unwrap_or(self.rotation);
        if let Some(label) = &patch.label {
            self.label = label.clone();
        }
    }

    fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.rotation]
            .iter()
            .all(|v| v.is_finite())
    }
}
