//! Persistence boundary
//!
//! The visualizer reads segmentation records and catalog tiles through
//! [`VisualizerStore`] and writes one record per rendered output. Record ids
//! and timestamps are assigned here, file naming lives in `services::output`.

use crate::{
    error::{Result, TileVizError},
    types::{AppliedSurfaces, ColorSample, RoomType},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

/// Stored result of classifying and segmenting one photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationRecord {
    pub id: Uuid,
    pub original_image_path: PathBuf,
    pub wall_mask_path: PathBuf,
    pub floor_mask_path: PathBuf,
    pub room_type: RoomType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedImageRecord {
    pub id: Uuid,
    pub segmentation_id: Uuid,
    pub output_path: PathBuf,
    pub applied: AppliedSurfaces,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintedWallRecord {
    pub id: Uuid,
    pub segmentation_id: Uuid,
    /// `#rrggbb`
    pub color: String,
    pub output_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Up to four layouts rendered side by side for one photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileComparisonRecord {
    pub id: Uuid,
    pub segmentation_id: Uuid,
    pub layout_paths: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
}

/// A sellable tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Tagged color as `#rrggbb`, absent for untagged tiles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_path: Option<PathBuf>,
}

impl CatalogTile {
    /// Parsed color tag; an unparseable tag counts as untagged
    #[must_use]
    pub fn color_sample(&self) -> Option<ColorSample> {
        let hex = self.color.as_deref()?;
        match ColorSample::from_hex(hex) {
            Ok(color) => Some(color),
            Err(e) => {
                tracing::debug!(tile = %self.id, error = %e, "ignoring malformed color tag");
                None
            },
        }
    }
}

/// Storage collaborator the visualizer persists through
pub trait VisualizerStore: Send + Sync {
    fn save_segmentation(&self, record: SegmentationRecord) -> Result<()>;

    fn get_segmentation(&self, id: Uuid) -> Result<Option<SegmentationRecord>>;

    fn save_processed_image(&self, record: ProcessedImageRecord) -> Result<()>;

    fn save_painted_wall(&self, record: PaintedWallRecord) -> Result<()>;

    fn save_comparison(&self, record: TileComparisonRecord) -> Result<()>;

    fn get_tile(&self, id: &str) -> Result<Option<CatalogTile>>;

    /// Whole catalog in a stable order
    fn list_tiles(&self) -> Result<Vec<CatalogTile>>;

    /// Insert, or replace the tile with the same id in place
    fn upsert_tile(&self, tile: CatalogTile) -> Result<()>;
}

/// Process-local store, used by the CLI and tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    segmentations: RwLock<HashMap<Uuid, SegmentationRecord>>,
    processed: RwLock<Vec<ProcessedImageRecord>>,
    painted: RwLock<Vec<PaintedWallRecord>>,
    comparisons: RwLock<Vec<TileComparisonRecord>>,
    tiles: RwLock<Vec<CatalogTile>>,
}

fn poisoned<T>(_: T) -> TileVizError {
    TileVizError::internal("store lock poisoned")
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tiles(tiles: Vec<CatalogTile>) -> Self {
        Self {
            tiles: RwLock::new(tiles),
            ..Self::default()
        }
    }

    /// Load a JSON array of [`CatalogTile`]
    ///
    /// Relative texture paths are resolved against the catalog file's directory.
    pub fn from_catalog_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TileVizError::file_io_error("read catalog", path, &e))?;
        let mut tiles: Vec<CatalogTile> = serde_json::from_str(&content).map_err(|e| {
            TileVizError::invalid_input(format!("Invalid catalog {}: {e}", path.display()))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for tile in &mut tiles {
            if let Some(texture) = tile.texture_path.as_mut() {
                if texture.is_relative() {
                    *texture = base.join(&*texture);
                }
            }
        }
        log::info!("Loaded {} catalog tiles from {}", tiles.len(), path.display());
        Ok(Self::with_tiles(tiles))
    }

    pub fn processed_images(&self) -> Result<Vec<ProcessedImageRecord>> {
        Ok(self.processed.read().map_err(poisoned)?.clone())
    }

    pub fn painted_walls(&self) -> Result<Vec<PaintedWallRecord>> {
        Ok(self.painted.read().map_err(poisoned)?.clone())
    }

    pub fn comparisons(&self) -> Result<Vec<TileComparisonRecord>> {
        Ok(self.comparisons.read().map_err(poisoned)?.clone())
    }
}

impl VisualizerStore for InMemoryStore {
    fn save_segmentation(&self, record: SegmentationRecord) -> Result<()> {
        self.segmentations
            .write()
            .map_err(poisoned)?
            .insert(record.id, record);
        Ok(())
    }

    fn get_segmentation(&self, id: Uuid) -> Result<Option<SegmentationRecord>> {
        Ok(self.segmentations.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn save_processed_image(&self, record: ProcessedImageRecord) -> Result<()> {
        self.processed.write().map_err(poisoned)?.push(record);
        Ok(())
    }

    fn save_painted_wall(&self, record: PaintedWallRecord) -> Result<()> {
        self.painted.write().map_err(poisoned)?.push(record);
        Ok(())
    }

    fn save_comparison(&self, record: TileComparisonRecord) -> Result<()> {
        self.comparisons.write().map_err(poisoned)?.push(record);
        Ok(())
    }

    fn get_tile(&self, id: &str) -> Result<Option<CatalogTile>> {
        Ok(self
            .tiles
            .read()
            .map_err(poisoned)?
            .iter()
            .find(|tile| tile.id == id)
            .cloned())
    }

    fn list_tiles(&self) -> Result<Vec<CatalogTile>> {
        Ok(self.tiles.read().map_err(poisoned)?.clone())
    }

    fn upsert_tile(&self, tile: CatalogTile) -> Result<()> {
        let mut tiles = self.tiles.write().map_err(poisoned)?;
        match tiles.iter_mut().find(|existing| existing.id == tile.id) {
            Some(existing) => *existing = tile,
            None => tiles.push(tile),
        }
        Ok(())
    }
}
