//! Core value types for plan-local geometry

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use super::transform::RotationTransform;

/// A 2D point in the floor plan's local coordinate system (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Both coordinates are finite numbers (no NaN, no infinity)
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn dot(&self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        (*self - other).length()
    }

    /// Unit vector in the same direction, or zero for a zero vector
    pub fn normalized(&self) -> Point {
        let len = self.length();
        if len < f64::EPSILON {
            Point::origin()
        } else {
            Point::new(self.x / len, self.y / len)
        }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a zero-sized bounding box at the origin
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Smallest box containing every point, or None for an empty slice
    pub fn from_points(points: &[Point]) -> Option<BoundingBox> {
        let first = points.first()?;
        let seed = BoundingBox::new(first.x, first.y, 0.0, 0.0);
        Some(points[1..].iter().fold(seed, |b, p| b.expand_to_include(*p)))
    }

    /// Right edge x-coordinate
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point of the bounding box
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Check if this bounding box contains a point
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Check if this bounding box fully contains another (edges may touch)
    pub fn contains_box(&self, other: &BoundingBox, tolerance: f64) -> bool {
        other.x >= self.x - tolerance
            && other.right() <= self.right() + tolerance
            && other.y >= self.y - tolerance
            && other.bottom() <= self.bottom() + tolerance
    }

    /// Check if this bounding box intersects another
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Compute the union of two bounding boxes (smallest box containing both)
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(x, y, right - x, bottom - y)
    }

    /// Expand this bounding box to include a point
    pub fn expand_to_include(&self, point: Point) -> BoundingBox {
        let x = self.x.min(point.x);
        let y = self.y.min(point.y);
        let right = self.right().max(point.x);
        let bottom = self.bottom().max(point.y);
        BoundingBox::new(x, y, right - x, bottom - y)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::zero()
    }
}

/// An oriented rectangle: center, half-extents and a clockwise rotation in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    pub center: Point,
    pub half_width: f64,
    pub half_height: f64,
    pub rotation_deg: f64,
}

impl Obb {
    /// Build from full width/height, the way desks store their size
    pub fn new(center: Point, width: f64, height: f64, rotation_deg: f64) -> Self {
        Self {
            center,
            half_width: width / 2.0,
            half_height: height / 2.0,
            rotation_deg,
        }
    }

    pub fn width(&self) -> f64 {
        self.half_width * 2.0
    }

    pub fn height(&self) -> f64 {
        self.half_height * 2.0
    }

    /// The rectangle's local x (width) and y (height) axes as unit vectors
    pub fn axes(&self) -> [Point; 2] {
        let radians = self.rotation_deg.to_radians();
        let (sin_a, cos_a) = radians.sin_cos();
        [Point::new(cos_a, sin_a), Point::new(-sin_a, cos_a)]
    }

    /// Corners in order: top-left, top-right, bottom-right, bottom-left (local frame)
    pub fn corners(&self) -> [Point; 4] {
        let rotation = RotationTransform::new(self.rotation_deg, self.center);
        let (hw, hh) = (self.half_width, self.half_height);
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(dx, dy)| {
            rotation.transform_point(Point::new(self.center.x + dx, self.center.y + dy))
        })
    }

    /// Half-extents of the axis-aligned box enclosing the rotated rectangle
    pub fn aabb_half_extents(&self) -> (f64, f64) {
        let radians = self.rotation_deg.to_radians();
        let (sin_a, cos_a) = (radians.sin().abs(), radians.cos().abs());
        (
            self.half_width * cos_a + self.half_height * sin_a,
            self.half_width * sin_a + self.half_height * cos_a,
        )
    }

    /// Axis-aligned bounds of the rotated rectangle
    pub fn bounds(&self) -> BoundingBox {
        let (ex, ey) = self.aabb_half_extents();
        BoundingBox::new(
            self.center.x - ex,
            self.center.y - ey,
            ex * 2.0,
            ey * 2.0,
        )
    }

    /// Same rectangle moved to a new center
    pub fn at(&self, center: Point) -> Obb {
        Obb { center, ..*self }
    }

    pub fn translated(&self, delta: Point) -> Obb {
        self.at(self.center + delta)
    }

    /// Express a plan point in this rectangle's local frame (origin at the center)
    pub fn to_local(&self, point: Point) -> Point {
        let [ax, ay] = self.axes();
        let d = point - self.center;
        Point::new(d.dot(ax), d.dot(ay))
    }

    /// Map a local-frame offset back to plan coordinates
    pub fn to_plan(&self, local: Point) -> Point {
        let [ax, ay] = self.axes();
        self.center + ax * local.x + ay * local.y
    }

    pub fn contains_point(&self, point: Point) -> bool {
        let local = self.to_local(point);
        local.x.abs() <= self.half_width && local.y.abs() <= self.half_height
    }
}
