//! tileviz command-line front end

use super::config::CliConfigBuilder;
use crate::{
    processor::{prepare_tile_file, suggest_from_catalog, SurfaceVisualizer, TileApplication},
    services::{ImageIOService, OutputKind, OutputWriter},
    store::{CatalogTile, InMemoryStore},
    tracing_config::{init_cli_tracing, spans},
    types::LightingRequest,
    utils::ExecutionProviderManager,
    vision::{DominantColorExtractor, LightingAdjuster},
    VisualizerConfig,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"];

/// Visualize catalog tiles, paint and lighting on room photos
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "tileviz")]
pub struct Cli {
    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Backend and provider as backend:provider (e.g. tract:cpu, onnx:cuda)
    #[arg(short, long, global = true)]
    pub execution_provider: Option<String>,

    /// Directory receiving masks and rendered images
    #[arg(short, long, value_name = "DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Encoding of rendered images
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (0-100)
    #[arg(long, global = true)]
    pub jpeg_quality: Option<u8>,

    /// Inference threads (0 = auto)
    #[arg(short, long, default_value_t = 0, global = true)]
    pub threads: usize,

    /// Room classifier: model directory or cached model id
    #[arg(long, global = true)]
    pub classifier_model: Option<String>,

    /// Surface segmenter: model directory or cached model id
    #[arg(long, global = true)]
    pub segmenter_model: Option<String>,

    /// Warp textures into each surface's perspective before tiling
    #[arg(long, global = true)]
    pub align: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the room type of each photo
    Classify {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Write wall and floor masks for a photo
    Segment { image: PathBuf },
    /// Lay tile textures on a photo's walls and floors
    Composite {
        image: PathBuf,
        /// Texture for walls
        #[arg(long, value_name = "TEXTURE")]
        wall: Option<PathBuf>,
        /// Texture for floors
        #[arg(long, value_name = "TEXTURE")]
        floor: Option<PathBuf>,
    },
    /// Paint a photo's walls a solid color
    Paint {
        image: PathBuf,
        /// Color as #RRGGBB
        #[arg(long)]
        color: String,
    },
    /// Apply a lighting preset or custom brightness/contrast
    Light {
        image: PathBuf,
        /// daylight, warm, cool, dimmed or custom
        #[arg(long, default_value = "daylight")]
        mode: String,
        #[arg(long, default_value_t = 50)]
        brightness: u8,
        #[arg(long, default_value_t = 50)]
        contrast: u8,
    },
    /// Report the dominant color of tile photos
    DominantColor {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Descend into directories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Suggest catalog tiles close in color to one tile
    Match {
        tile_id: String,
        /// JSON catalog of tiles
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        top: Option<usize>,
    },
    /// Crop and sharpen a catalog tile photo
    Prep { input: PathBuf, output: PathBuf },
    /// Show backends and execution providers
    Providers,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
    Tiff,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let start = Instant::now();

    match &cli.command {
        Command::Providers => show_provider_diagnostics(),
        Command::Classify { images } => classify(config, images)?,
        Command::Segment { image } => segment(config, image).await?,
        Command::Composite { image, wall, floor } => {
            composite(config, image, wall.as_deref(), floor.as_deref())?;
        },
        Command::Paint { image, color } => paint(config, image, color)?,
        Command::Light {
            image,
            mode,
            brightness,
            contrast,
        } => light(&config, image, mode, *brightness, *contrast)?,
        Command::DominantColor { inputs, recursive } => dominant_colors(inputs, *recursive)?,
        Command::Match {
            tile_id,
            catalog,
            top,
        } => match_tiles(&config, tile_id, catalog, *top)?,
        Command::Prep { input, output } => prep(&config, input, output)?,
    }

    info!("Done in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn load_visualizer(
    config: VisualizerConfig,
    store: Arc<InMemoryStore>,
) -> Result<SurfaceVisualizer> {
    let _span = spans::model_loading(
        &config.segmenter_model.source.display_name(),
        &config.backend_type.to_string(),
    )
    .entered();
    SurfaceVisualizer::new(config, store).context("Failed to load models")
}

fn classify(config: VisualizerConfig, images: &[PathBuf]) -> Result<()> {
    let visualizer = load_visualizer(config, Arc::new(InMemoryStore::new()))?;
    for path in images {
        let image = ImageIOService::load_rgb(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let room = visualizer.classify(&image)?;
        println!("{}\t{room}", path.display());
    }
    Ok(())
}

async fn segment(config: VisualizerConfig, image: &Path) -> Result<()> {
    let visualizer = Arc::new(load_visualizer(config, Arc::new(InMemoryStore::new()))?);
    let record = crate::segment_upload_async(visualizer, image.to_path_buf())
        .await
        .with_context(|| format!("Failed to segment {}", image.display()))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn composite(
    config: VisualizerConfig,
    image: &Path,
    wall: Option<&Path>,
    floor: Option<&Path>,
) -> Result<()> {
    if wall.is_none() && floor.is_none() {
        anyhow::bail!("Give a --wall and/or --floor texture");
    }
    let texture_tile = |id: &str, path: &Path| CatalogTile {
        id: id.to_string(),
        name: path.display().to_string(),
        color: None,
        texture_path: Some(path.to_path_buf()),
    };
    let tiles = [("wall", wall), ("floor", floor)]
        .into_iter()
        .filter_map(|(id, path)| path.map(|p| texture_tile(id, p)))
        .collect();

    let visualizer = load_visualizer(config, Arc::new(InMemoryStore::with_tiles(tiles)))?;
    let record = visualizer.segment_upload(image)?;
    info!("Room: {}", record.room_type);

    let result = visualizer.apply_tiles(&TileApplication {
        segmentation_id: record.id,
        wall_tile_id: wall.map(|_| "wall".to_string()),
        floor_tile_id: floor.map(|_| "floor".to_string()),
    })?;
    if let Some(path) = &result.output_path {
        println!("{}", path.display());
    }
    Ok(())
}

fn paint(config: VisualizerConfig, image: &Path, color: &str) -> Result<()> {
    let visualizer = load_visualizer(config, Arc::new(InMemoryStore::new()))?;
    let record = visualizer.segment_upload(image)?;
    let result = visualizer.paint_walls(record.id, color)?;
    if let Some(path) = &result.output_path {
        println!("{}", path.display());
    }
    Ok(())
}

fn light(
    config: &VisualizerConfig,
    image: &Path,
    mode: &str,
    brightness: u8,
    contrast: u8,
) -> Result<()> {
    let request = LightingRequest {
        mode: mode.to_string(),
        brightness,
        contrast,
    };
    let mode = request.resolve()?;
    let _span = spans::lighting(mode.name()).entered();

    let source = ImageIOService::load_rgb(image)
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let adjusted = LightingAdjuster::new().apply(&source, mode);
    let writer = OutputWriter::new(&config.output_dir, config.output_format, config.jpeg_quality);
    let path = writer.write_image(OutputKind::Lighting, &adjusted)?;
    println!("{}", path.display());
    Ok(())
}

fn dominant_colors(inputs: &[PathBuf], recursive: bool) -> Result<()> {
    let files = collect_images(inputs, recursive)?;
    if files.is_empty() {
        warn!("No supported images found in the provided inputs");
        return Ok(());
    }
    let _span = spans::batch(files.len()).entered();

    let progress = if files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let extractor = DominantColorExtractor::new();
    let mut failed = 0usize;
    for path in &files {
        if let Some(pb) = &progress {
            pb.set_message(path.display().to_string());
        }
        let result = ImageIOService::load_rgb(path).and_then(|image| extractor.describe(&image));
        match result {
            Ok(color) => {
                let line = format!("{}\t{}\t{}", path.display(), color.hex, color.name);
                match &progress {
                    Some(pb) => pb.println(line),
                    None => println!("{line}"),
                }
            },
            Err(e) => {
                failed += 1;
                warn!("Skipping {}: {e}", path.display());
            },
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    if failed == files.len() {
        anyhow::bail!("No image could be processed");
    }
    Ok(())
}

fn match_tiles(
    config: &VisualizerConfig,
    tile_id: &str,
    catalog: &Path,
    top: Option<usize>,
) -> Result<()> {
    let store = InMemoryStore::from_catalog_file(catalog)?;
    let ranking = suggest_from_catalog(&store, tile_id, top.unwrap_or(config.suggestion_top_n))?;
    if ranking.is_empty() {
        println!("No color-tagged tiles to compare with");
    }
    for entry in ranking {
        println!("{}\t{}\t{:.2}", entry.item_id, entry.color, entry.score);
    }
    Ok(())
}

fn prep(config: &VisualizerConfig, input: &Path, output: &Path) -> Result<()> {
    let written = prepare_tile_file(input, output, config)
        .with_context(|| format!("Failed to prepare {}", input.display()))?;
    if written {
        println!("{}", output.display());
    } else {
        warn!("{} does not look like a tile photo", input.display());
    }
    Ok(())
}

fn show_provider_diagnostics() {
    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores");

    println!("\nExecution providers:");
    for provider in ExecutionProviderManager::list_all_providers() {
        let status = if provider.available {
            "available"
        } else {
            "not available"
        };
        println!("  {:<12} {:<14} {}", provider.name, status, provider.description);
    }

    println!("\nUsage:");
    println!("  --execution-provider tract:cpu   pure Rust inference (default)");
    println!("  --execution-provider onnx:auto   best ONNX Runtime provider");
    println!("  --execution-provider onnx:cuda   NVIDIA CUDA");
}

/// Image files among `inputs`, directories expanded, sorted
fn collect_images(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            if is_image_file(input) {
                files.push(input.clone());
            } else {
                warn!("Skipping unsupported file: {}", input.display());
            }
        } else if input.is_dir() {
            let depth = if recursive { usize::MAX } else { 1 };
            for entry in walkdir::WalkDir::new(input).max_depth(depth) {
                let entry = entry?;
                if entry.file_type().is_file() && is_image_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            anyhow::bail!("Input path does not exist: {}", input.display());
        }
    }
    files.sort();
    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
