//! TOML floor layout files
//!
//! A layout file lists the spaces and desks of one floor:
//!
//! ```toml
//! floor_id = 1
//!
//! [[spaces]]
//! id = 10
//! name = "Open area"
//! points = [[0, 0], [600, 0], [600, 400], [0, 400]]
//!
//! [[desks]]
//! space = 10
//! x = 100
//! y = 100
//! width = 120
//! height = 60
//! ```
//!
//! Ids in the file only link desks to spaces; storage assigns its own ids
//! when the file is seeded.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::geometry::Point;
use crate::model::{DeskPayload, EntityId, SpaceKind, SpacePayload};
use crate::storage::{MemoryStorage, Payload};

/// Errors that can occur when loading a floor layout file
#[derive(Error, Debug)]
pub enum FloorFileError {
    #[error("Failed to read layout file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse layout TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("desk '{label}' refers to unknown space {space}")]
    UnknownSpace { label: String, space: u64 },
    #[error("duplicate space id {0}")]
    DuplicateSpace(u64),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpaceEntry {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub kind: SpaceKind,
    #[serde(default)]
    pub color: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeskEntry {
    /// File id of the owning space
    pub space: u64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub label: String,
}

/// One floor as written in a layout file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FloorFile {
    #[serde(default = "default_floor_id")]
    pub floor_id: u64,
    #[serde(default)]
    pub spaces: Vec<SpaceEntry>,
    #[serde(default)]
    pub desks: Vec<DeskEntry>,
}

fn default_floor_id() -> u64 {
    1
}

impl FloorFile {
    pub fn from_file(path: &Path) -> Result<Self, FloorFileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, FloorFileError> {
        Ok(toml::from_str(content)?)
    }

    /// Insert every space and desk into `storage`.
    ///
    /// Returns the storage id assigned to each file space id.
    pub fn seed(&self, storage: &MemoryStorage) -> Result<BTreeMap<u64, u64>, FloorFileError> {
        let mut ids = BTreeMap::new();
        for space in &self.spaces {
            if ids.contains_key(&space.id) {
                return Err(FloorFileError::DuplicateSpace(space.id));
            }
            let payload = SpacePayload {
                floor_id: self.floor_id,
                name: space.name.clone(),
                kind: space.kind,
                color: space.color.clone(),
                points: space.points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            };
            ids.insert(space.id, storage.seed(Payload::Space(payload)));
        }

        for desk in &self.desks {
            let space = ids
                .get(&desk.space)
                .copied()
                .ok_or_else(|| FloorFileError::UnknownSpace {
                    label: desk.label.clone(),
                    space: desk.space,
                })?;
            storage.seed(Payload::Desk(DeskPayload {
                space_id: EntityId::Remote(space),
                x: desk.x,
                y: desk.y,
                width: desk.width,
                height: desk.height,
                rotation: desk.rotation,
                label: desk.label.clone(),
            }));
        }
        Ok(ids)
    }
}
