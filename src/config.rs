//! Configuration for the floor-plan editor
//!
//! Every tolerance the editor uses lives here. Values can be tuned in code
//! through the builder methods or loaded from a TOML file; fields missing
//! from the file keep their defaults.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading an editor configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Tunables for snapping, hit-testing and placement
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Magnetic snap tolerance between desks, in plan units
    pub snap_distance: f64,

    /// Rotation snaps to a right angle within this many degrees
    pub rotation_snap_tolerance: f64,

    /// Smallest width a desk may be resized to
    pub min_desk_width: f64,

    /// Smallest height a desk may be resized to
    pub min_desk_height: f64,

    /// Size (width, height) given to newly placed desks
    pub default_desk_size: (f64, f64),

    /// Double-click distance for inserting a vertex on an edge, in screen pixels
    pub edge_snap_tolerance: f64,

    /// Hit radius of resize and vertex handles, in screen pixels
    pub handle_radius: f64,

    /// Distance of the rotate handle above a desk's top edge, in screen pixels
    pub rotate_handle_offset: f64,

    /// Drags shorter than this are treated as clicks and not journalled
    pub move_epsilon: f64,

    /// Preferred offset of pasted copies from their originals
    pub paste_offset: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_distance: 10.0,
            rotation_snap_tolerance: 6.0,
            min_desk_width: 20.0,
            min_desk_height: 20.0,
            default_desk_size: (120.0, 60.0),
            edge_snap_tolerance: 8.0,
            handle_radius: 6.0,
            rotate_handle_offset: 24.0,
            move_epsilon: 0.5,
            paste_offset: 20.0,
        }
    }
}

impl EditorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make snapping or placement misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("snap_distance", self.snap_distance),
            ("rotation_snap_tolerance", self.rotation_snap_tolerance),
            ("edge_snap_tolerance", self.edge_snap_tolerance),
            ("handle_radius", self.handle_radius),
            ("rotate_handle_offset", self.rotate_handle_offset),
            ("move_epsilon", self.move_epsilon),
            ("paste_offset", self.paste_offset),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("expected a finite non-negative number, got {}", value),
                });
            }
        }

        let positive = [
            ("min_desk_width", self.min_desk_width),
            ("min_desk_height", self.min_desk_height),
            ("default_desk_size", self.default_desk_size.0.min(self.default_desk_size.1)),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("expected a finite positive number, got {}", value),
                });
            }
        }

        if self.rotation_snap_tolerance >= 45.0 {
            return Err(ConfigError::InvalidValue {
                field: "rotation_snap_tolerance",
                reason: "must be below 45 degrees".to_string(),
            });
        }
        Ok(())
    }

    /// Set the magnetic snap distance
    pub fn with_snap_distance(mut self, distance: f64) -> Self {
        self.snap_distance = distance;
        self
    }

    /// Set the rotation snap tolerance in degrees
    pub fn with_rotation_snap_tolerance(mut self, degrees: f64) -> Self {
        self.rotation_snap_tolerance = degrees;
        self
    }

    /// Set the minimum desk size
    pub fn with_min_desk_size(mut self, width: f64, height: f64) -> Self {
        self.min_desk_width = width;
        self.min_desk_height = height;
        self
    }

    /// Set the size of newly placed desks
    pub fn with_default_desk_size(mut self, width: f64, height: f64) -> Self {
        self.default_desk_size = (width, height);
        self
    }

    /// Set the no-op drag threshold
    pub fn with_move_epsilon(mut self, epsilon: f64) -> Self {
        self.move_epsilon = epsilon;
        self
    }

    /// Edge insertion tolerance converted to plan units at the given zoom
    pub fn edge_tolerance_at(&self, zoom: f64) -> f64 {
        self.edge_snap_tolerance / zoom.max(f64::EPSILON)
    }

    /// Handle hit radius converted to plan units at the given zoom
    pub fn handle_radius_at(&self, zoom: f64) -> f64 {
        self.handle_radius / zoom.max(f64::EPSILON)
    }

    /// Rotate handle offset converted to plan units at the given zoom
    pub fn rotate_offset_at(&self, zoom: f64) -> f64 {
        self.rotate_handle_offset / zoom.max(f64::EPSILON)
    }
}
