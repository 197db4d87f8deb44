#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

//! # tileviz
//!
//! Room photo visualization for tile sellers: classify the room, segment its
//! walls and floors, then show the photo with catalog tiles laid on those
//! surfaces, walls painted a solid color, or the lighting changed.
//!
//! ## Features
//!
//! - **Room classification** into six room types with a pretrained network
//! - **Surface segmentation** into wall and floor masks, chosen per room type
//! - **Tile compositing** with a fixed tile grid and optional perspective alignment
//! - **Wall painting**, **lighting presets** and **dominant color** tagging
//! - **Color matching** of catalog tiles by tagged color
//! - **Backends**: Tract (pure Rust, default) and ONNX Runtime (`onnx` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tileviz::{InMemoryStore, SurfaceVisualizer, TileApplication, VisualizerConfig};
//!
//! # fn example() -> anyhow::Result<()> {
//! let store = Arc::new(InMemoryStore::from_catalog_file("catalog.json")?);
//! let config = VisualizerConfig::builder().output_dir("renders").build()?;
//! let visualizer = SurfaceVisualizer::new(config, store)?;
//!
//! let segmentation = visualizer.segment_upload("living_room.jpg")?;
//! let result = visualizer.apply_tiles(&TileApplication {
//!     segmentation_id: segmentation.id,
//!     wall_tile_id: None,
//!     floor_tile_id: Some("oak-parquet".into()),
//! })?;
//! println!("{}", result.output_path.unwrap().display());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): pure Rust inference
//! - `onnx`: ONNX Runtime inference with CUDA / `CoreML` providers
//! - `cli` (default): the `tileviz` binary
//! - `webp-support` (default): WebP decoding and encoding

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod services;
pub mod store;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;
pub mod vision;

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

pub use backends::*;
pub use config::{AlignmentConfig, ExecutionProvider, OutputFormat, VisualizerConfig};
pub use error::{Result, TileVizError};
pub use inference::{BackendFactory, BackendType, DefaultBackendFactory, InferenceBackend};
pub use models::{ModelManager, ModelSource, ModelSpec};
pub use processor::{
    prepare_tile_file, suggest_from_catalog, LayoutComparison, LayoutOption, LightingResult,
    SegmentationContext, SurfaceVisualizer, TileApplication,
};
pub use services::{ImageIOService, OutputFormatHandler, OutputKind, OutputWriter};
pub use store::{
    CatalogTile, InMemoryStore, PaintedWallRecord, ProcessedImageRecord, SegmentationRecord,
    TileComparisonRecord, VisualizerStore,
};
pub use types::{
    ColorMatch, ColorSample, CompositedImage, DominantColor, LightingMode, LightingRequest,
    MatchRanking, ProcessingTimings, RoomType, SegmentationResult, Surface, SurfaceMaterial,
    SurfacePolicy,
};
pub use utils::{ExecutionProviderManager, ImagePreprocessor, ProviderInfo};
pub use vision::{
    ColorMatcher, DominantColorExtractor, LightingAdjuster, RoomClassifier, SurfaceCompositor,
    SurfaceSegmenter, SurfaceTextures, TileAligner,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, spans, TracingConfig, TracingFormat, TracingOutput};

fn join_error(e: &tokio::task::JoinError) -> TileVizError {
    TileVizError::internal(format!("Blocking task failed: {e}"))
}

/// Segment an uploaded photo on the blocking pool
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use tileviz::{segment_upload_async, SurfaceVisualizer};
/// # async fn example(visualizer: Arc<SurfaceVisualizer>) -> anyhow::Result<()> {
/// let record = segment_upload_async(visualizer, "kitchen.jpg".into()).await?;
/// println!("{} -> {}", record.id, record.room_type);
/// # Ok(())
/// # }
/// ```
pub async fn segment_upload_async(
    visualizer: Arc<SurfaceVisualizer>,
    path: PathBuf,
) -> Result<SegmentationRecord> {
    tokio::task::spawn_blocking(move || visualizer.segment_upload(&path))
        .await
        .map_err(|e| join_error(&e))?
}

/// Classify and segment encoded image bytes without touching the store
pub async fn segment_bytes(
    visualizer: Arc<SurfaceVisualizer>,
    image_bytes: Vec<u8>,
) -> Result<SegmentationResult> {
    tokio::task::spawn_blocking(move || {
        let image = ImageIOService::decode_bytes(&image_bytes)?.to_rgb8();
        visualizer.segment_image(&image)
    })
    .await
    .map_err(|e| join_error(&e))?
}

/// Read a whole stream, then classify and segment it
pub async fn segment_reader<R: AsyncRead + Unpin>(
    visualizer: Arc<SurfaceVisualizer>,
    mut reader: R,
) -> Result<SegmentationResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    segment_bytes(visualizer, buffer).await
}

/// Render every layout on its own blocking task
///
/// Results keep the order of `layouts`. The first failing layout fails the
/// whole comparison and nothing is recorded.
pub async fn compare_layouts_concurrently(
    visualizer: Arc<SurfaceVisualizer>,
    segmentation_id: Uuid,
    layouts: Vec<LayoutOption>,
) -> Result<LayoutComparison> {
    visualizer.check_layout_count(layouts.len())?;

    let loader = Arc::clone(&visualizer);
    let context = tokio::task::spawn_blocking(move || loader.load_segmentation(segmentation_id))
        .await
        .map_err(|e| join_error(&e))??;
    let context = Arc::new(context);

    let renders = layouts.into_iter().map(|layout| {
        let visualizer = Arc::clone(&visualizer);
        let context = Arc::clone(&context);
        async move {
            tokio::task::spawn_blocking(move || {
                visualizer.render_layout(&context, &layout, OutputKind::Layout)
            })
            .await
            .map_err(|e| join_error(&e))?
        }
    });
    // every render runs to completion so no sibling is still writing when
    // a failed batch is cleaned up
    let mut rendered = Vec::new();
    let mut first_error = None;
    for result in join_all(renders).await {
        match result {
            Ok(image) => rendered.push(image),
            Err(e) => {
                first_error.get_or_insert(e);
            },
        }
    }
    if let Some(e) = first_error {
        visualizer.discard_layouts(&rendered);
        return Err(e);
    }
    visualizer.record_comparison(segmentation_id, rendered)
}
