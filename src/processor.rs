//! Surface visualizer
//!
//! `SurfaceVisualizer` holds the loaded models and every pipeline stage, and
//! exposes the workflows the CLI and the async facade call: segment a photo,
//! tile or paint its surfaces, compare layouts, suggest matching tiles,
//! relight an image and tag tile colors.

use crate::{
    config::VisualizerConfig,
    error::{Result, TileVizError},
    inference::{BackendFactory, DefaultBackendFactory, InferenceBackend},
    models::{ModelManager, ModelSpec},
    services::{ImageIOService, OutputFormatHandler, OutputKind, OutputWriter},
    store::{
        CatalogTile, PaintedWallRecord, ProcessedImageRecord, SegmentationRecord,
        TileComparisonRecord, VisualizerStore,
    },
    types::{
        AppliedSurfaces, ColorSample, CompositedImage, DominantColor, LightingMode,
        LightingRequest, MatchRanking, ProcessingTimings, RoomType, SegmentationResult,
        SurfaceMaterial,
    },
    vision::{
        tile_prep, ColorMatcher, DominantColorExtractor, LightingAdjuster, MatchCandidate,
        RoomClassifier, SurfaceCompositor, SurfaceSegmenter, SurfaceTextures, TileAligner,
    },
};
use chrono::Utc;
use image::{GrayImage, RgbImage};
use instant::Instant;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Tiles chosen for one rendering; either side may be left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutOption {
    #[serde(default)]
    pub wall_tile_id: Option<String>,
    #[serde(default)]
    pub floor_tile_id: Option<String>,
}

/// Request to tile a previously segmented photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileApplication {
    pub segmentation_id: Uuid,
    #[serde(default)]
    pub wall_tile_id: Option<String>,
    #[serde(default)]
    pub floor_tile_id: Option<String>,
}

impl TileApplication {
    #[must_use]
    pub fn layout(&self) -> LayoutOption {
        LayoutOption {
            wall_tile_id: self.wall_tile_id.clone(),
            floor_tile_id: self.floor_tile_id.clone(),
        }
    }
}

/// Layouts rendered for one photo plus the stored comparison id
#[derive(Debug, Clone)]
pub struct LayoutComparison {
    pub id: Uuid,
    pub segmentation_id: Uuid,
    pub layouts: Vec<CompositedImage>,
}

/// Relit image and where it was written
#[derive(Debug, Clone)]
pub struct LightingResult {
    pub mode: LightingMode,
    pub image: RgbImage,
    pub output_path: PathBuf,
}

/// A stored segmentation with its photo and masks decoded
#[derive(Debug, Clone)]
pub struct SegmentationContext {
    pub record: SegmentationRecord,
    pub image: RgbImage,
    pub wall_mask: GrayImage,
    pub floor_mask: GrayImage,
}

/// Classification, segmentation and compositing over a shared store
pub struct SurfaceVisualizer {
    config: VisualizerConfig,
    classifier: RoomClassifier,
    segmenter: SurfaceSegmenter,
    compositor: SurfaceCompositor,
    aligner: TileAligner,
    lighting: LightingAdjuster,
    color_extractor: DominantColorExtractor,
    writer: OutputWriter,
    store: Arc<dyn VisualizerStore>,
}

impl std::fmt::Debug for SurfaceVisualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceVisualizer")
            .field("config", &self.config)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl SurfaceVisualizer {
    /// Load both models with the backends compiled into this build
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Model directory, metadata or checksum problems
    /// - Backend initialization failures
    pub fn new(config: VisualizerConfig, store: Arc<dyn VisualizerStore>) -> Result<Self> {
        Self::with_factory(config, &DefaultBackendFactory, store)
    }

    /// Load both models through a custom backend factory
    pub fn with_factory(
        config: VisualizerConfig,
        factory: &dyn BackendFactory,
        store: Arc<dyn VisualizerStore>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "Initializing surface visualizer with {} backend",
            config.backend_type
        );

        let classifier = Self::load_backend(&config, factory, &config.classifier_model)?;
        let segmenter = Self::load_backend(&config, factory, &config.segmenter_model)?;
        Self::with_backends(config, classifier, segmenter, store)
    }

    fn load_backend(
        config: &VisualizerConfig,
        factory: &dyn BackendFactory,
        spec: &ModelSpec,
    ) -> Result<Arc<dyn InferenceBackend>> {
        let manager = ModelManager::from_spec(spec)?;
        let mut backend = factory.create_backend(config.backend_type, manager)?;
        if let Some(load_time) = backend.initialize(config)? {
            debug!(
                "Model {} loaded in {}ms",
                spec.source.display_name(),
                load_time.as_millis()
            );
        }
        Ok(Arc::from(backend))
    }

    /// Build around already initialized backends
    pub fn with_backends(
        config: VisualizerConfig,
        classifier: Arc<dyn InferenceBackend>,
        segmenter: Arc<dyn InferenceBackend>,
        store: Arc<dyn VisualizerStore>,
    ) -> Result<Self> {
        config.validate()?;
        let writer = OutputWriter::new(
            config.output_dir.clone(),
            config.output_format,
            config.jpeg_quality,
        );
        Ok(Self {
            classifier: RoomClassifier::new(classifier)?,
            segmenter: SurfaceSegmenter::new(segmenter),
            compositor: SurfaceCompositor::new(config.tile_size),
            aligner: TileAligner::new(config.alignment.clone()),
            lighting: LightingAdjuster::new(),
            color_extractor: DominantColorExtractor::new(),
            writer,
            store,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn VisualizerStore> {
        &self.store
    }

    pub fn classify(&self, image: &RgbImage) -> Result<RoomType> {
        self.classifier.predict(image)
    }

    /// Classify, then segment with the room's surface policy
    pub fn segment_image(&self, image: &RgbImage) -> Result<SegmentationResult> {
        let room = self.classifier.predict(image)?;
        self.segmenter.segment(image, room)
    }

    /// Segment a photo on disk, write both masks and persist the record
    ///
    /// # Errors
    /// - `Decode` when the photo cannot be read
    /// - `Inference` when either model fails
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn segment_upload<P: AsRef<Path>>(&self, path: P) -> Result<SegmentationRecord> {
        let path = path.as_ref();
        let image = ImageIOService::load_rgb(path)?;
        let segmentation = self.segment_image(&image)?;

        let wall_mask_path = self
            .writer
            .write_mask(OutputKind::WallMask, &segmentation.wall_mask)?;
        let floor_mask_path = match self
            .writer
            .write_mask(OutputKind::FloorMask, &segmentation.floor_mask)
        {
            Ok(path) => path,
            Err(e) => {
                self.writer.discard([&wall_mask_path]);
                return Err(e);
            },
        };

        let record = SegmentationRecord {
            id: Uuid::new_v4(),
            original_image_path: path.to_path_buf(),
            wall_mask_path,
            floor_mask_path,
            room_type: segmentation.room_type,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.save_segmentation(record.clone()) {
            self.writer
                .discard([&record.wall_mask_path, &record.floor_mask_path]);
            return Err(e);
        }
        info!(
            "Segmented {} as {} ({})",
            path.display(),
            record.room_type,
            record.id
        );
        Ok(record)
    }

    /// Tile surfaces of an in-memory photo, aligning textures first when enabled
    pub fn composite(
        &self,
        image: &RgbImage,
        wall_mask: &GrayImage,
        floor_mask: &GrayImage,
        textures: SurfaceTextures<'_>,
    ) -> Result<RgbImage> {
        let (wall, floor) = self.align_textures(textures, wall_mask, floor_mask);
        self.compositor.composite(
            image,
            wall_mask,
            floor_mask,
            SurfaceTextures {
                wall: wall.as_ref().or(textures.wall),
                floor: floor.as_ref().or(textures.floor),
            },
        )
    }

    /// Warp textures onto their surfaces; `None` per side when alignment is off
    fn align_textures(
        &self,
        textures: SurfaceTextures<'_>,
        wall_mask: &GrayImage,
        floor_mask: &GrayImage,
    ) -> (Option<RgbImage>, Option<RgbImage>) {
        if !self.config.align_textures {
            return (None, None);
        }
        let align = |texture: Option<&RgbImage>, mask: &GrayImage| -> Option<RgbImage> {
            texture.map(|t| self.aligner.align(t, mask).image)
        };
        (align(textures.wall, wall_mask), align(textures.floor, floor_mask))
    }

    /// Load a stored segmentation with its photo and masks
    ///
    /// # Errors
    /// - `NotFound` when no record has this id
    pub fn load_segmentation(&self, segmentation_id: Uuid) -> Result<SegmentationContext> {
        let record = self
            .store
            .get_segmentation(segmentation_id)?
            .ok_or_else(|| TileVizError::not_found("segmentation", segmentation_id.to_string()))?;
        let image = ImageIOService::load_rgb(&record.original_image_path)?;
        let wall_mask = ImageIOService::load_mask(&record.wall_mask_path)?;
        let floor_mask = ImageIOService::load_mask(&record.floor_mask_path)?;
        Ok(SegmentationContext {
            record,
            image,
            wall_mask,
            floor_mask,
        })
    }

    fn catalog_tile(&self, tile_id: &str) -> Result<CatalogTile> {
        self.store
            .get_tile(tile_id)?
            .ok_or_else(|| TileVizError::not_found("tile", tile_id))
    }

    fn load_texture(&self, tile_id: Option<&str>) -> Result<Option<RgbImage>> {
        let Some(tile_id) = tile_id else {
            return Ok(None);
        };
        let tile = self.catalog_tile(tile_id)?;
        let path = tile.texture_path.ok_or_else(|| {
            TileVizError::invalid_input(format!("Tile '{tile_id}' has no texture image"))
        })?;
        ImageIOService::load_rgb(path).map(Some)
    }

    /// Render one layout against a loaded segmentation and write it
    pub fn render_layout(
        &self,
        context: &SegmentationContext,
        layout: &LayoutOption,
        kind: OutputKind,
    ) -> Result<CompositedImage> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        let decode_start = Instant::now();
        let wall_texture = self.load_texture(layout.wall_tile_id.as_deref())?;
        let floor_texture = self.load_texture(layout.floor_tile_id.as_deref())?;
        timings.image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let textures = SurfaceTextures {
            wall: wall_texture.as_ref(),
            floor: floor_texture.as_ref(),
        };
        let align_start = Instant::now();
        let (aligned_wall, aligned_floor) =
            self.align_textures(textures, &context.wall_mask, &context.floor_mask);
        timings.alignment_ms = align_start.elapsed().as_millis() as u64;

        let composite_start = Instant::now();
        let image = self.compositor.composite(
            &context.image,
            &context.wall_mask,
            &context.floor_mask,
            SurfaceTextures {
                wall: aligned_wall.as_ref().or(textures.wall),
                floor: aligned_floor.as_ref().or(textures.floor),
            },
        )?;
        timings.compositing_ms = composite_start.elapsed().as_millis() as u64;

        let encode_start = Instant::now();
        let output_path = self.writer.write_image(kind, &image)?;
        timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        Ok(CompositedImage {
            segmentation_id: Some(context.record.id),
            applied: AppliedSurfaces {
                wall: layout.wall_tile_id.clone().map(SurfaceMaterial::Texture),
                floor: layout.floor_tile_id.clone().map(SurfaceMaterial::Texture),
            },
            image,
            output_path: Some(output_path),
            timings,
        })
    }

    /// Tile a stored segmentation with catalog textures
    ///
    /// # Errors
    /// - `NotFound` for an unknown segmentation or tile id
    #[instrument(skip(self, request), fields(segmentation = %request.segmentation_id))]
    pub fn apply_tiles(&self, request: &TileApplication) -> Result<CompositedImage> {
        let context = self.load_segmentation(request.segmentation_id)?;
        let composited = self.render_layout(&context, &request.layout(), OutputKind::Processed)?;

        if let Some(path) = &composited.output_path {
            let saved = self.store.save_processed_image(ProcessedImageRecord {
                id: Uuid::new_v4(),
                segmentation_id: request.segmentation_id,
                output_path: path.clone(),
                applied: composited.applied.clone(),
                created_at: Utc::now(),
            });
            if let Err(e) = saved {
                self.writer.discard([path]);
                return Err(e);
            }
        }
        Ok(composited)
    }

    /// Paint every wall pixel of a stored segmentation
    ///
    /// # Errors
    /// - `InvalidColor` for a malformed hex string
    /// - `NotFound` for an unknown segmentation id
    #[instrument(skip_all, fields(segmentation = %segmentation_id))]
    pub fn paint_walls(&self, segmentation_id: Uuid, hex: &str) -> Result<CompositedImage> {
        let color = ColorSample::from_hex(hex)?;
        let context = self.load_segmentation(segmentation_id)?;

        let start = Instant::now();
        let image = self
            .compositor
            .paint(&context.image, &context.wall_mask, &color)?;
        let compositing_ms = start.elapsed().as_millis() as u64;
        let output_path = self.writer.write_image(OutputKind::Painted, &image)?;

        let saved = self.store.save_painted_wall(PaintedWallRecord {
            id: Uuid::new_v4(),
            segmentation_id,
            color: color.to_hex(),
            output_path: output_path.clone(),
            created_at: Utc::now(),
        });
        if let Err(e) = saved {
            self.writer.discard([&output_path]);
            return Err(e);
        }

        Ok(CompositedImage {
            segmentation_id: Some(segmentation_id),
            applied: AppliedSurfaces {
                wall: Some(SurfaceMaterial::Color(color.to_hex())),
                floor: None,
            },
            image,
            output_path: Some(output_path),
            timings: ProcessingTimings {
                compositing_ms,
                total_ms: start.elapsed().as_millis() as u64,
                ..ProcessingTimings::default()
            },
        })
    }

    /// Reject empty or oversized layout lists
    pub fn check_layout_count(&self, count: usize) -> Result<()> {
        let max = self.config.max_layout_variants;
        if count == 0 || count > max {
            return Err(TileVizError::invalid_input(format!(
                "Between 1 and {max} layouts can be compared, got {count}"
            )));
        }
        Ok(())
    }

    /// Persist the comparison for rendered layouts
    ///
    /// When saving fails, the layout files are removed.
    pub fn record_comparison(
        &self,
        segmentation_id: Uuid,
        layouts: Vec<CompositedImage>,
    ) -> Result<LayoutComparison> {
        let record = TileComparisonRecord {
            id: Uuid::new_v4(),
            segmentation_id,
            layout_paths: layouts.iter().filter_map(|l| l.output_path.clone()).collect(),
            created_at: Utc::now(),
        };
        let id = record.id;
        let paths = record.layout_paths.clone();
        if let Err(e) = self.store.save_comparison(record) {
            self.writer.discard(&paths);
            return Err(e);
        }
        Ok(LayoutComparison {
            id,
            segmentation_id,
            layouts,
        })
    }

    /// Render up to four layouts of one photo, one after another
    #[instrument(skip_all, fields(segmentation = %segmentation_id, layouts = layouts.len()))]
    pub fn compare_layouts(
        &self,
        segmentation_id: Uuid,
        layouts: &[LayoutOption],
    ) -> Result<LayoutComparison> {
        self.check_layout_count(layouts.len())?;
        let context = self.load_segmentation(segmentation_id)?;
        let mut rendered = Vec::with_capacity(layouts.len());
        for layout in layouts {
            match self.render_layout(&context, layout, OutputKind::Layout) {
                Ok(image) => rendered.push(image),
                Err(e) => {
                    self.discard_layouts(&rendered);
                    return Err(e);
                },
            }
        }
        self.record_comparison(segmentation_id, rendered)
    }

    /// Remove the files of layouts rendered before a later one failed
    pub fn discard_layouts(&self, rendered: &[CompositedImage]) {
        self.writer
            .discard(rendered.iter().filter_map(|l| l.output_path.as_ref()));
    }

    /// Closest catalog tiles by tagged color, excluding the selected tile
    ///
    /// An untagged selected tile yields an empty ranking.
    ///
    /// # Errors
    /// - `NotFound` when the selected tile does not exist
    #[instrument(skip(self))]
    pub fn suggest_matching_tiles(
        &self,
        tile_id: &str,
        top_n: Option<usize>,
    ) -> Result<MatchRanking> {
        suggest_from_catalog(
            self.store.as_ref(),
            tile_id,
            top_n.unwrap_or(self.config.suggestion_top_n),
        )
    }

    /// Relight an image in memory
    #[must_use]
    pub fn relight(&self, image: &RgbImage, mode: LightingMode) -> RgbImage {
        self.lighting.apply(image, mode)
    }

    /// Relight an image on disk and write the result
    ///
    /// # Errors
    /// - Brightness or contrast outside 0-100
    /// - Unreadable input
    #[instrument(skip_all, fields(path = %path.as_ref().display(), mode = %request.mode))]
    pub fn adjust_lighting<P: AsRef<Path>>(
        &self,
        path: P,
        request: &LightingRequest,
    ) -> Result<LightingResult> {
        let mode = request.resolve()?;
        let image = ImageIOService::load_rgb(path.as_ref())?;
        let adjusted = self.lighting.apply(&image, mode);
        let output_path = self.writer.write_image(OutputKind::Lighting, &adjusted)?;
        Ok(LightingResult {
            mode,
            image: adjusted,
            output_path,
        })
    }

    /// Dominant color of a tile photo
    pub fn extract_dominant_color<P: AsRef<Path>>(&self, path: P) -> Result<DominantColor> {
        let image = ImageIOService::load_rgb(path)?;
        self.color_extractor.describe(&image)
    }

    /// Tag a catalog tile with the dominant color of its texture
    ///
    /// # Errors
    /// - `NotFound` for an unknown tile
    /// - `InvalidInput` when the tile has no texture image
    pub fn tag_tile_color(&self, tile_id: &str) -> Result<DominantColor> {
        let mut tile = self.catalog_tile(tile_id)?;
        let path = tile.texture_path.clone().ok_or_else(|| {
            TileVizError::invalid_input(format!("Tile '{tile_id}' has no texture image"))
        })?;
        let dominant = self.extract_dominant_color(&path)?;
        tile.color = Some(dominant.hex.clone());
        self.store.upsert_tile(tile)?;
        Ok(dominant)
    }

    /// Crop and sharpen a catalog photo into `destination`
    ///
    /// Returns `false`, writing nothing, when the photo does not look like a tile.
    pub fn prepare_tile_image<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        source: P,
        destination: Q,
    ) -> Result<bool> {
        prepare_tile_file(source, destination, &self.config)
    }
}

/// Model-free body of [`SurfaceVisualizer::prepare_tile_image`]
///
/// The destination extension picks the encoding, falling back to the
/// configured output format.
pub fn prepare_tile_file<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    config: &VisualizerConfig,
) -> Result<bool> {
    let source = source.as_ref();
    let image = ImageIOService::load_rgb(source)?;
    if !tile_prep::is_tile_image(&image) {
        debug!("Skipping {}: not a tile", source.display());
        return Ok(false);
    }
    let prepared = tile_prep::prepare_tile(&image);
    let format =
        OutputFormatHandler::from_path(destination.as_ref()).unwrap_or(config.output_format);
    ImageIOService::save_rgb(&prepared, destination, format, config.jpeg_quality)?;
    Ok(true)
}

/// Rank the catalog against one tile's color; see [`SurfaceVisualizer::suggest_matching_tiles`]
pub fn suggest_from_catalog(
    store: &dyn VisualizerStore,
    tile_id: &str,
    top_n: usize,
) -> Result<MatchRanking> {
    let selected = store
        .get_tile(tile_id)?
        .ok_or_else(|| TileVizError::not_found("tile", tile_id))?;
    let Some(reference) = selected.color_sample() else {
        debug!("Tile {tile_id} has no color tag, no suggestions");
        return Ok(MatchRanking::new());
    };

    let pool: Vec<MatchCandidate> = store
        .list_tiles()?
        .into_iter()
        .filter(|tile| tile.id != tile_id)
        .map(|tile| MatchCandidate {
            color: tile.color_sample(),
            item_id: tile.id,
        })
        .collect();

    let ranking = ColorMatcher::new(top_n).rank(&reference, &pool);
    tracing::debug!(
        candidates = pool.len(),
        returned = ranking.len(),
        "color matches ranked"
    );
    Ok(ranking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{MockClassifierBackend, MockSegmenterBackend};
    use crate::store::InMemoryStore;
    use crate::types::MASK_FOREGROUND;
    use image::Rgb;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        photo: PathBuf,
        store: Arc<InMemoryStore>,
        visualizer: SurfaceVisualizer,
    }

    /// 400x300 grey photo; the segmenter marks the bottom half
    fn fixture(room_index: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let photo = dir.path().join("room.png");
        RgbImage::from_pixel(400, 300, Rgb([128, 128, 128]))
            .save(&photo)
            .unwrap();

        let texture_path = dir.path().join("blue.png");
        RgbImage::from_pixel(100, 100, Rgb([0, 0, 255]))
            .save(&texture_path)
            .unwrap();

        let store = Arc::new(InMemoryStore::with_tiles(vec![
            CatalogTile {
                id: "blue".into(),
                name: "Blue".into(),
                color: Some("#0000FF".into()),
                texture_path: Some(texture_path),
            },
            CatalogTile {
                id: "navy".into(),
                name: "Navy".into(),
                color: Some("#000080".into()),
                texture_path: None,
            },
            CatalogTile {
                id: "plain".into(),
                name: "Plain".into(),
                color: None,
                texture_path: None,
            },
        ]));

        let config = VisualizerConfig::builder()
            .output_dir(dir.path().join("out"))
            .build()
            .unwrap();
        let visualizer = SurfaceVisualizer::with_backends(
            config,
            Arc::new(MockClassifierBackend::new(room_index)),
            Arc::new(MockSegmenterBackend::with_rect(40, 30, 0, 15, 40, 30)),
            store.clone(),
        )
        .unwrap();

        Fixture {
            _dir: dir,
            photo,
            store,
            visualizer,
        }
    }

    #[test]
    fn test_segment_upload_persists_masks() {
        let fx = fixture(2);
        let record = fx.visualizer.segment_upload(&fx.photo).unwrap();
        assert_eq!(record.room_type, RoomType::LivingRoom);
        assert!(record.wall_mask_path.exists());
        assert!(record
            .floor_mask_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("floor_mask_"));
        assert_eq!(fx.store.get_segmentation(record.id).unwrap(), Some(record.clone()));

        let wall = ImageIOService::load_mask(&record.wall_mask_path).unwrap();
        let floor = ImageIOService::load_mask(&record.floor_mask_path).unwrap();
        assert_eq!(wall.dimensions(), (400, 300));
        assert!(wall.pixels().all(|p| p.0[0] == 0));
        assert_eq!(floor.get_pixel(10, 299).0[0], MASK_FOREGROUND);
    }

    #[test]
    fn test_apply_tiles_changes_only_floor_box() {
        let fx = fixture(2);
        let record = fx.visualizer.segment_upload(&fx.photo).unwrap();
        let result = fx
            .visualizer
            .apply_tiles(&TileApplication {
                segmentation_id: record.id,
                wall_tile_id: None,
                floor_tile_id: Some("blue".into()),
            })
            .unwrap();

        assert_eq!(result.image.get_pixel(200, 250).0, [0, 0, 255]);
        assert_eq!(result.image.get_pixel(200, 50).0, [128, 128, 128]);
        assert_eq!(
            result.applied.floor,
            Some(SurfaceMaterial::Texture("blue".into()))
        );
        assert_eq!(fx.store.processed_images().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let fx = fixture(0);
        let err = fx
            .visualizer
            .apply_tiles(&TileApplication {
                segmentation_id: Uuid::new_v4(),
                wall_tile_id: Some("blue".into()),
                floor_tile_id: None,
            })
            .unwrap_err();
        assert!(err.is_not_found());

        let record = fx.visualizer.segment_upload(&fx.photo).unwrap();
        let err = fx
            .visualizer
            .apply_tiles(&TileApplication {
                segmentation_id: record.id,
                wall_tile_id: Some("missing".into()),
                floor_tile_id: None,
            })
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(fx.visualizer.suggest_matching_tiles("missing", None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_paint_walls_in_kitchen() {
        let fx = fixture(0);
        let record = fx.visualizer.segment_upload(&fx.photo).unwrap();
        let painted = fx.visualizer.paint_walls(record.id, "#FF8800").unwrap();
        assert_eq!(painted.image.get_pixel(5, 290).0, [0xff, 0x88, 0x00]);
        assert_eq!(painted.image.get_pixel(5, 5).0, [128, 128, 128]);
        assert_eq!(fx.store.painted_walls().unwrap()[0].color, "#ff8800");

        assert!(matches!(
            fx.visualizer.paint_walls(record.id, "orange"),
            Err(TileVizError::InvalidColor(_))
        ));
    }

    #[test]
    fn test_compare_layouts_bounds() {
        let fx = fixture(2);
        let record = fx.visualizer.segment_upload(&fx.photo).unwrap();
        let layout = LayoutOption {
            wall_tile_id: None,
            floor_tile_id: Some("blue".into()),
        };

        assert!(matches!(
            fx.visualizer.compare_layouts(record.id, &[]),
            Err(TileVizError::InvalidInput(_))
        ));
        let five = vec![layout.clone(); 5];
        assert!(matches!(
            fx.visualizer.compare_layouts(record.id, &five),
            Err(TileVizError::InvalidInput(_))
        ));

        let comparison = fx
            .visualizer
            .compare_layouts(record.id, &[layout.clone(), LayoutOption::default()])
            .unwrap();
        assert_eq!(comparison.layouts.len(), 2);
        assert_eq!(comparison.layouts[1].image.get_pixel(200, 250).0, [128, 128, 128]);
        assert_eq!(fx.store.comparisons().unwrap()[0].layout_paths.len(), 2);
    }

    #[test]
    fn test_suggestions_exclude_selected_and_untagged() {
        let fx = fixture(0);
        let ranking = fx.visualizer.suggest_matching_tiles("blue", None).unwrap();
        let ids: Vec<&str> = ranking.iter().map(|m| m.item_id.as_str()).collect();
        assert_eq!(ids, ["navy"]);

        assert!(fx
            .visualizer
            .suggest_matching_tiles("plain", None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_tag_tile_color() {
        let fx = fixture(0);
        let dominant = fx.visualizer.tag_tile_color("blue").unwrap();
        assert_eq!(dominant.hex, "#0000ff");
        assert_eq!(dominant.name, "Blue");
        assert!(matches!(
            fx.visualizer.tag_tile_color("navy"),
            Err(TileVizError::InvalidInput(_))
        ));
    }
}
