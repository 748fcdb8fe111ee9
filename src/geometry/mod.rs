//! Plan-local geometry: value types, rotations, and intersection tests

pub mod primitives;
pub mod transform;
pub mod types;

pub use primitives::{
    closest_point_on_segment, distance_to_segment, do_obbs_overlap, is_point_inside_polygon,
    polygon_bounds, polygon_edges, polygons_intersect, segments_intersect, EPSILON,
};
pub use transform::{normalize_degrees, RotationTransform};
pub use types::{BoundingBox, Obb, Point};
