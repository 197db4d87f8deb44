//! End-to-end visualization workflows
//!
//! Uses in-test inference backends so no model files are needed: the
//! classifier always predicts one room, the segmenter marks the bottom half
//! of the photo.

use image::{Rgb, RgbImage};
use instant::Duration;
use ndarray::{Array4, ArrayD, IxDyn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tileviz::{
    compare_layouts_concurrently,
    config::VisualizerConfig,
    error::Result,
    models::{ModelInfo, PreprocessingConfig},
    segment_upload_async, CatalogTile, ImageIOService, InMemoryStore, InferenceBackend,
    LayoutOption, LightingRequest, RoomType, SurfaceMaterial, SurfaceVisualizer,
    TileApplication, VisualizerStore,
};

struct FixedRoom(usize);

impl InferenceBackend for FixedRoom {
    fn initialize(&mut self, _config: &VisualizerConfig) -> Result<Option<Duration>> {
        Ok(None)
    }

    fn infer(&self, _input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let mut logits = ArrayD::<f32>::zeros(IxDyn(&[1, 6]));
        logits[[0, self.0].as_slice()] = 3.0;
        Ok(logits)
    }

    fn input_shape(&self) -> Option<(usize, usize, usize, usize)> {
        Some((1, 3, 224, 224))
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig::classifier_default())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "fixed-room".into(),
            source: "test".into(),
            size_bytes: 0,
            input_shape: Some((1, 3, 224, 224)),
            labels: Vec::new(),
        })
    }

    fn is_initialized(&self) -> bool {
        true
    }
}

/// Two-class logits on a 40x30 map, class 1 on the bottom half
struct BottomHalf;

impl InferenceBackend for BottomHalf {
    fn initialize(&mut self, _config: &VisualizerConfig) -> Result<Option<Duration>> {
        Ok(None)
    }

    fn infer(&self, _input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let logits = Array4::from_shape_fn((1, 2, 30, 40), |(_, c, y, _)| {
            let floor = y >= 15;
            if (c == 1) == floor {
                1.0
            } else {
                0.0
            }
        });
        Ok(logits.into_dyn())
    }

    fn input_shape(&self) -> Option<(usize, usize, usize, usize)> {
        None
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig {
            target_size: [40, 30],
            ..PreprocessingConfig::classifier_default()
        })
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "bottom-half".into(),
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

struct Workspace {
    dir: TempDir,
    store: Arc<InMemoryStore>,
}

impl Workspace {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let red = write_solid(dir.path(), "red.png", [200, 30, 30]);
        let green = write_solid(dir.path(), "green.png", [30, 200, 30]);
        let store = Arc::new(InMemoryStore::with_tiles(vec![
            tile("red", Some("#C81E1E"), Some(red)),
            tile("green", Some("#1EC81E"), Some(green)),
            tile("crimson", Some("#DC143C"), None),
            tile("untagged", None, None),
        ]));
        Self { dir, store }
    }

    fn photo(&self) -> PathBuf {
        let path = self.dir.path().join("room.png");
        RgbImage::from_fn(400, 300, |x, _| Rgb([(x % 256) as u8, 120, 90]))
            .save(&path)
            .unwrap();
        path
    }

    fn visualizer(&self, room_index: usize) -> SurfaceVisualizer {
        let config = VisualizerConfig::builder()
            .output_dir(self.dir.path().join("tiles_storage"))
            .build()
            .unwrap();
        SurfaceVisualizer::with_backends(
            config,
            Arc::new(FixedRoom(room_index)),
            Arc::new(BottomHalf),
            self.store.clone(),
        )
        .unwrap()
    }
}

fn write_solid(dir: &Path, name: &str, rgb: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(64, 64, Rgb(rgb)).save(&path).unwrap();
    path
}

fn tile(id: &str, color: Option<&str>, texture: Option<PathBuf>) -> CatalogTile {
    CatalogTile {
        id: id.into(),
        name: id.into(),
        color: color.map(Into::into),
        texture_path: texture,
    }
}

#[test]
fn test_living_room_floor_tiling() {
    let ws = Workspace::new();
    let photo = ws.photo();
    let visualizer = ws.visualizer(2);

    let record = visualizer.segment_upload(&photo).unwrap();
    assert_eq!(record.room_type, RoomType::LivingRoom);
    let wall = ImageIOService::load_mask(&record.wall_mask_path).unwrap();
    let floor = ImageIOService::load_mask(&record.floor_mask_path).unwrap();
    assert_eq!(wall.dimensions(), (400, 300));
    assert!(wall.pixels().all(|p| p.0[0] == 0));
    assert!(floor.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));

    let result = visualizer
        .apply_tiles(&TileApplication {
            segmentation_id: record.id,
            wall_tile_id: Some("green".into()),
            floor_tile_id: Some("red".into()),
        })
        .unwrap();

    let original = ImageIOService::load_rgb(&photo).unwrap();
    for y in (0..140).step_by(7) {
        for x in (0..400).step_by(13) {
            assert_eq!(result.image.get_pixel(x, y), original.get_pixel(x, y));
        }
    }
    assert_eq!(result.image.get_pixel(10, 200).0, [200, 30, 30]);
    assert_eq!(result.image.get_pixel(399, 299).0, [200, 30, 30]);

    let output = result.output_path.unwrap();
    assert!(output.exists());
    assert!(output
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("processed_"));
    assert_eq!(
        result.applied.wall,
        Some(SurfaceMaterial::Texture("green".into()))
    );
}

#[test]
fn test_kitchen_walls_take_map_and_paint() {
    let ws = Workspace::new();
    let visualizer = ws.visualizer(0);
    let record = visualizer.segment_upload(ws.photo()).unwrap();
    assert_eq!(record.room_type, RoomType::Kitchen);

    let painted = visualizer.paint_walls(record.id, "#336699").unwrap();
    let mask = ImageIOService::load_mask(&record.wall_mask_path).unwrap();
    let original = ImageIOService::load_rgb(ws.photo()).unwrap();
    for (x, y, pixel) in painted.image.enumerate_pixels() {
        if mask.get_pixel(x, y).0[0] == 255 {
            assert_eq!(pixel.0, [0x33, 0x66, 0x99]);
        } else {
            assert_eq!(pixel, original.get_pixel(x, y));
        }
    }
    assert!(painted.output_path.unwrap().exists());
}

#[test]
fn test_suggestions_rank_by_color() {
    let ws = Workspace::new();
    let visualizer = ws.visualizer(0);

    let ranking = visualizer.suggest_matching_tiles("red", Some(2)).unwrap();
    let ids: Vec<&str> = ranking.iter().map(|m| m.item_id.as_str()).collect();
    assert_eq!(ids, ["crimson", "green"]);
    assert!(ranking.windows(2).all(|w| w[0].score <= w[1].score));
}

#[test]
fn test_tagging_feeds_suggestions() {
    let ws = Workspace::new();
    let blue = write_solid(ws.dir.path(), "blue.png", [10, 20, 240]);
    ws.store.upsert_tile(tile("blue", None, Some(blue))).unwrap();
    let visualizer = ws.visualizer(0);

    assert!(visualizer.suggest_matching_tiles("blue", None).unwrap().is_empty());
    let dominant = visualizer.tag_tile_color("blue").unwrap();
    assert_eq!(dominant.hex, "#0a14f0");
    assert!(!visualizer.suggest_matching_tiles("blue", None).unwrap().is_empty());
}

#[test]
fn test_lighting_writes_output() {
    let ws = Workspace::new();
    let visualizer = ws.visualizer(0);
    let photo = ws.photo();

    let result = visualizer
        .adjust_lighting(&photo, &LightingRequest::new("dimmed"))
        .unwrap();
    let original = ImageIOService::load_rgb(&photo).unwrap();
    assert_eq!(result.image.dimensions(), original.dimensions());
    let sum = |img: &RgbImage| img.as_raw().iter().map(|&v| u64::from(v)).sum::<u64>();
    assert!(sum(&result.image) < sum(&original));
    assert!(result
        .output_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("lighting_"));
}

#[test]
fn test_aligned_compositing_falls_back_on_flat_textures() {
    let ws = Workspace::new();
    let config = VisualizerConfig::builder()
        .output_dir(ws.dir.path().join("aligned"))
        .align_textures(true)
        .build()
        .unwrap();
    let visualizer = SurfaceVisualizer::with_backends(
        config,
        Arc::new(FixedRoom(2)),
        Arc::new(BottomHalf),
        ws.store.clone(),
    )
    .unwrap();

    let record = visualizer.segment_upload(ws.photo()).unwrap();
    let result = visualizer
        .apply_tiles(&TileApplication {
            segmentation_id: record.id,
            wall_tile_id: None,
            floor_tile_id: Some("red".into()),
        })
        .unwrap();
    assert_eq!(result.image.get_pixel(200, 250).0, [200, 30, 30]);
}

#[tokio::test]
async fn test_async_segmentation_and_concurrent_layouts() {
    let ws = Workspace::new();
    let visualizer = Arc::new(ws.visualizer(2));

    let record = segment_upload_async(Arc::clone(&visualizer), ws.photo())
        .await
        .unwrap();
    let layouts = vec![
        LayoutOption {
            wall_tile_id: None,
            floor_tile_id: Some("red".into()),
        },
        LayoutOption {
            wall_tile_id: None,
            floor_tile_id: Some("green".into()),
        },
        LayoutOption::default(),
    ];

    let comparison = compare_layouts_concurrently(Arc::clone(&visualizer), record.id, layouts)
        .await
        .unwrap();
    assert_eq!(comparison.layouts.len(), 3);
    assert_eq!(comparison.layouts[0].image.get_pixel(5, 290).0, [200, 30, 30]);
    assert_eq!(comparison.layouts[1].image.get_pixel(5, 290).0, [30, 200, 30]);
    assert_eq!(comparison.layouts[2].image.get_pixel(5, 290).0, [5, 120, 90]);

    let stored = ws.store.comparisons().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, comparison.id);
    assert_eq!(stored[0].layout_paths.len(), 3);
}
