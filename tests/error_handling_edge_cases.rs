//! Error conditions and boundary cases of the visualization pipeline

use image::{GrayImage, Luma, Rgb, RgbImage};
use instant::Duration;
use ndarray::{Array4, ArrayD, IxDyn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tileviz::{
    compare_layouts_concurrently,
    config::{AlignmentConfig, VisualizerConfig},
    error::{Result, TileVizError},
    models::{ModelInfo, PreprocessingConfig},
    store::{
        PaintedWallRecord, ProcessedImageRecord, SegmentationRecord, TileComparisonRecord,
    },
    CatalogTile, ColorSample, InMemoryStore, InferenceBackend, LayoutOption, LightingRequest,
    SurfaceCompositor, SurfaceTextures, SurfaceVisualizer, TileApplication, VisualizerStore,
};
use uuid::Uuid;

/// Scripted backend: fixed logits, or an inference failure
struct Scripted {
    logits: Option<ArrayD<f32>>,
    preprocessing: PreprocessingConfig,
}

impl Scripted {
    fn classifier(class_index: usize, num_classes: usize) -> Self {
        let mut logits = ArrayD::<f32>::zeros(IxDyn(&[1, num_classes]));
        logits[[0, class_index].as_slice()] = 1.0;
        Self {
            logits: Some(logits),
            preprocessing: PreprocessingConfig::classifier_default(),
        }
    }

    /// Everything is class 1 on a 20x20 map
    fn full_segmenter() -> Self {
        let logits = Array4::from_shape_fn((1, 2, 20, 20), |(_, c, _, _)| c as f32);
        Self {
            logits: Some(logits.into_dyn()),
            preprocessing: PreprocessingConfig {
                target_size: [20, 20],
                ..PreprocessingConfig::classifier_default()
            },
        }
    }

    fn failing() -> Self {
        Self {
            logits: None,
            preprocessing: PreprocessingConfig::classifier_default(),
        }
    }
}

impl InferenceBackend for Scripted {
    fn initialize(&mut self, _config: &VisualizerConfig) -> Result<Option<Duration>> {
        Ok(None)
    }

    fn infer(&self, _input: &Array4<f32>) -> Result<ArrayD<f32>> {
        self.logits
            .clone()
            .ok_or_else(|| TileVizError::inference("scripted failure"))
    }

    fn input_shape(&self) -> Option<(usize, usize, usize, usize)> {
        None
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "scripted".into(),
            source: "test".into(),
            size_bytes: 0,
            input_shape: None,
            labels: Vec::new(),
        })
    }

    fn is_initialized(&self) -> bool {
        true
    }
}

fn setup(classifier: Scripted, segmenter: Scripted) -> (TempDir, PathBuf, SurfaceVisualizer) {
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("photo.png");
    RgbImage::from_pixel(120, 90, Rgb([90, 90, 90]))
        .save(&photo)
        .unwrap();

    let store = Arc::new(InMemoryStore::with_tiles(vec![CatalogTile {
        id: "bare".into(),
        name: "No texture".into(),
        color: Some("#101010".into()),
        texture_path: None,
    }]));
    let config = VisualizerConfig::builder()
        .output_dir(dir.path().join("out"))
        .build()
        .unwrap();
    let visualizer =
        SurfaceVisualizer::with_backends(config, Arc::new(classifier), Arc::new(segmenter), store)
            .unwrap();
    (dir, photo, visualizer)
}

fn default_setup() -> (TempDir, PathBuf, SurfaceVisualizer) {
    setup(Scripted::classifier(0, 6), Scripted::full_segmenter())
}

/// Files in the output directory whose name starts with `prefix`
fn outputs(dir: &Path, prefix: &str) -> usize {
    std::fs::read_dir(dir.join("out")).map_or(0, |entries| {
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
            .count()
    })
}

/// Reads pass through, every save is refused
struct ReadOnlyStore(InMemoryStore);

impl VisualizerStore for ReadOnlyStore {
    fn save_segmentation(&self, _record: SegmentationRecord) -> Result<()> {
        Err(TileVizError::internal("store is read-only"))
    }

    fn get_segmentation(&self, id: Uuid) -> Result<Option<SegmentationRecord>> {
        self.0.get_segmentation(id)
    }

    fn save_processed_image(&self, _record: ProcessedImageRecord) -> Result<()> {
        Err(TileVizError::internal("store is read-only"))
    }

    fn save_painted_wall(&self, _record: PaintedWallRecord) -> Result<()> {
        Err(TileVizError::internal("store is read-only"))
    }

    fn save_comparison(&self, _record: TileComparisonRecord) -> Result<()> {
        Err(TileVizError::internal("store is read-only"))
    }

    fn get_tile(&self, id: &str) -> Result<Option<CatalogTile>> {
        self.0.get_tile(id)
    }

    fn list_tiles(&self) -> Result<Vec<CatalogTile>> {
        self.0.list_tiles()
    }

    fn upsert_tile(&self, tile: CatalogTile) -> Result<()> {
        self.0.upsert_tile(tile)
    }
}

#[test]
fn test_config_validation_edge_cases() {
    assert!(VisualizerConfig::builder().jpeg_quality(100).build().is_ok());
    assert!(matches!(
        VisualizerConfig::builder().jpeg_quality(101).build(),
        Err(TileVizError::InvalidConfig(_))
    ));
    assert!(VisualizerConfig::builder().tile_size(0).build().is_err());
    assert!(VisualizerConfig::builder().suggestion_top_n(0).build().is_err());

    let bad_alignment = AlignmentConfig {
        ransac_threshold: f64::NAN,
        ..AlignmentConfig::default()
    };
    assert!(VisualizerConfig::builder()
        .alignment(bad_alignment)
        .build()
        .is_err());

    let mut config = VisualizerConfig::default();
    config.max_layout_variants = 5;
    assert!(config.validate().is_err());
    config.max_layout_variants = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_unknown_segmentation_is_not_found() {
    let (_dir, _photo, visualizer) = default_setup();
    let missing = Uuid::new_v4();

    let err = visualizer
        .apply_tiles(&TileApplication {
            segmentation_id: missing,
            wall_tile_id: None,
            floor_tile_id: None,
        })
        .unwrap_err();
    assert!(matches!(err, TileVizError::NotFound { kind: "segmentation", .. }));

    assert!(visualizer.paint_walls(missing, "#ffffff").unwrap_err().is_not_found());
    assert!(visualizer
        .compare_layouts(missing, &[LayoutOption::default()])
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_tile_errors() {
    let (_dir, photo, visualizer) = default_setup();
    let record = visualizer.segment_upload(&photo).unwrap();

    let err = visualizer
        .apply_tiles(&TileApplication {
            segmentation_id: record.id,
            wall_tile_id: Some("nope".into()),
            floor_tile_id: None,
        })
        .unwrap_err();
    assert!(matches!(err, TileVizError::NotFound { kind: "tile", .. }));

    let err = visualizer
        .apply_tiles(&TileApplication {
            segmentation_id: record.id,
            wall_tile_id: Some("bare".into()),
            floor_tile_id: None,
        })
        .unwrap_err();
    assert!(matches!(err, TileVizError::InvalidInput(_)));
}

#[test]
fn test_layout_count_bounds() {
    let (_dir, photo, visualizer) = default_setup();
    let record = visualizer.segment_upload(&photo).unwrap();

    for count in [0, 5] {
        let layouts = vec![LayoutOption::default(); count];
        assert!(matches!(
            visualizer.compare_layouts(record.id, &layouts),
            Err(TileVizError::InvalidInput(_))
        ));
    }
    let four = vec![LayoutOption::default(); 4];
    assert_eq!(visualizer.compare_layouts(record.id, &four).unwrap().layouts.len(), 4);
}

#[test]
fn test_failed_comparison_leaves_no_layout_files() {
    let (dir, photo, visualizer) = default_setup();
    let record = visualizer.segment_upload(&photo).unwrap();

    let layouts = [
        LayoutOption::default(),
        LayoutOption::default(),
        LayoutOption {
            wall_tile_id: Some("nope".into()),
            floor_tile_id: None,
        },
    ];
    assert!(visualizer
        .compare_layouts(record.id, &layouts)
        .unwrap_err()
        .is_not_found());
    assert_eq!(outputs(dir.path(), "layout_"), 0);
    assert_eq!(outputs(dir.path(), "wall_mask_"), 1);
}

#[test]
fn test_refused_saves_remove_written_outputs() {
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("photo.png");
    RgbImage::from_pixel(60, 40, Rgb([90, 90, 90]))
        .save(&photo)
        .unwrap();
    let config = VisualizerConfig::builder()
        .output_dir(dir.path().join("out"))
        .build()
        .unwrap();

    // masks written by a working visualizer, then read through a read-only store
    let writable = Arc::new(InMemoryStore::new());
    let record = SurfaceVisualizer::with_backends(
        config.clone(),
        Arc::new(Scripted::classifier(0, 6)),
        Arc::new(Scripted::full_segmenter()),
        writable.clone(),
    )
    .unwrap()
    .segment_upload(&photo)
    .unwrap();
    let readonly = ReadOnlyStore(InMemoryStore::new());
    readonly.0.save_segmentation(record.clone()).unwrap();

    let visualizer = SurfaceVisualizer::with_backends(
        config,
        Arc::new(Scripted::classifier(0, 6)),
        Arc::new(Scripted::full_segmenter()),
        Arc::new(readonly),
    )
    .unwrap();

    assert!(visualizer.segment_upload(&photo).is_err());
    assert_eq!(outputs(dir.path(), "wall_mask_"), 1);
    assert_eq!(outputs(dir.path(), "floor_mask_"), 1);

    assert!(visualizer.paint_walls(record.id, "#336699").is_err());
    assert_eq!(outputs(dir.path(), "painted_"), 0);

    let request = TileApplication {
        segmentation_id: record.id,
        wall_tile_id: None,
        floor_tile_id: None,
    };
    assert!(visualizer.apply_tiles(&request).is_err());
    assert_eq!(outputs(dir.path(), "processed_"), 0);

    assert!(visualizer
        .compare_layouts(record.id, &[LayoutOption::default(), LayoutOption::default()])
        .is_err());
    assert_eq!(outputs(dir.path(), "layout_"), 0);
}

#[tokio::test]
async fn test_concurrent_layout_bounds_and_failures() {
    let (dir, photo, visualizer) = default_setup();
    let visualizer = Arc::new(visualizer);
    let record = visualizer.segment_upload(&photo).unwrap();

    let err = compare_layouts_concurrently(Arc::clone(&visualizer), record.id, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TileVizError::InvalidInput(_)));

    let layouts = vec![
        LayoutOption::default(),
        LayoutOption {
            wall_tile_id: Some("nope".into()),
            floor_tile_id: None,
        },
    ];
    let err = compare_layouts_concurrently(Arc::clone(&visualizer), record.id, layouts)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(outputs(dir.path(), "layout_"), 0);
}

#[test]
fn test_malformed_colors() {
    let (_dir, photo, visualizer) = default_setup();
    let record = visualizer.segment_upload(&photo).unwrap();

    for bad in ["", "#12345", "#GGGGGG", "#1234567", "blue"] {
        assert!(
            matches!(visualizer.paint_walls(record.id, bad), Err(TileVizError::InvalidColor(_))),
            "{bad:?} accepted"
        );
    }
    assert_eq!(ColorSample::from_hex("a0B1c2").unwrap().rgb, [0xa0, 0xb1, 0xc2]);
}

#[test]
fn test_lighting_parameter_bounds() {
    let (_dir, photo, visualizer) = default_setup();

    let request = LightingRequest {
        mode: "custom".into(),
        brightness: 101,
        contrast: 50,
    };
    assert!(matches!(
        visualizer.adjust_lighting(&photo, &request),
        Err(TileVizError::InvalidInput(_))
    ));

    // unknown names fall back to custom, which at 50/50 is the identity
    let request = LightingRequest::new("candlelight");
    let result = visualizer.adjust_lighting(&photo, &request).unwrap();
    assert_eq!(result.mode.name(), "custom");
    assert_eq!(result.image.get_pixel(0, 0).0, [90, 90, 90]);
}

#[test]
fn test_unreadable_inputs() {
    let (dir, _photo, visualizer) = default_setup();

    let missing = dir.path().join("missing.jpg");
    assert!(matches!(
        visualizer.segment_upload(&missing),
        Err(TileVizError::Io(_))
    ));

    let corrupt = dir.path().join("corrupt.png");
    std::fs::write(&corrupt, b"definitely not an image").unwrap();
    assert!(matches!(
        visualizer.segment_upload(&corrupt),
        Err(TileVizError::Decode(_))
    ));
    assert!(visualizer.extract_dominant_color(&corrupt).is_err());
}

#[test]
fn test_inference_failures_propagate() {
    let (_dir, photo, visualizer) = setup(Scripted::failing(), Scripted::full_segmenter());
    assert!(matches!(
        visualizer.segment_upload(&photo),
        Err(TileVizError::Inference(_))
    ));

    let (_dir, photo, visualizer) = setup(Scripted::classifier(1, 6), Scripted::failing());
    assert!(matches!(
        visualizer.segment_upload(&photo),
        Err(TileVizError::Inference(_))
    ));

    // more classes than room types: index 7 has no label
    let (_dir, photo, visualizer) = setup(Scripted::classifier(7, 8), Scripted::full_segmenter());
    assert!(matches!(
        visualizer.segment_upload(&photo),
        Err(TileVizError::Inference(_))
    ));
}

#[test]
fn test_compositor_dimension_mismatch() {
    let compositor = SurfaceCompositor::default();
    let image = RgbImage::new(50, 40);
    let texture = RgbImage::from_pixel(10, 10, Rgb([1, 2, 3]));
    let good = GrayImage::from_pixel(50, 40, Luma([255]));
    let small = GrayImage::new(49, 40);

    let textures = SurfaceTextures {
        wall: Some(&texture),
        floor: None,
    };
    assert!(matches!(
        compositor.composite(&image, &small, &good, textures),
        Err(TileVizError::InvalidInput(_))
    ));
    assert!(matches!(
        compositor.paint(&image, &small, &ColorSample::from_rgb([0, 0, 0])),
        Err(TileVizError::InvalidInput(_))
    ));

    let empty = GrayImage::new(50, 40);
    let untouched = compositor
        .composite(&image, &empty, &empty, textures)
        .unwrap();
    assert_eq!(untouched, image);
}

#[test]
fn test_untagged_selection_has_no_suggestions() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::with_tiles(vec![
        CatalogTile {
            id: "plain".into(),
            name: String::new(),
            color: None,
            texture_path: None,
        },
        CatalogTile {
            id: "broken".into(),
            name: String::new(),
            color: Some("#zz0000".into()),
            texture_path: None,
        },
        CatalogTile {
            id: "black".into(),
            name: String::new(),
            color: Some("#000000".into()),
            texture_path: None,
        },
    ]));
    let config = VisualizerConfig::builder()
        .output_dir(dir.path())
        .build()
        .unwrap();
    let visualizer = SurfaceVisualizer::with_backends(
        config,
        Arc::new(Scripted::classifier(0, 6)),
        Arc::new(Scripted::full_segmenter()),
        store,
    )
    .unwrap();

    assert!(visualizer.suggest_matching_tiles("plain", None).unwrap().is_empty());
    assert!(visualizer.suggest_matching_tiles("broken", None).unwrap().is_empty());
    // malformed tags are skipped from the pool too
    assert!(visualizer.suggest_matching_tiles("black", None).unwrap().is_empty());
}
