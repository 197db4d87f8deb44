//! Configuration types for the visualization pipeline

use crate::error::{Result, TileVizError};
use crate::inference::BackendType;
use crate::models::ModelSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    Cpu,
    Cuda,
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = TileVizError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(TileVizError::invalid_config(format!(
                "Unknown execution provider: {other}"
            ))),
        }
    }
}

/// Encoding of generated images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    WebP,
    Tiff,
}

/// Feature matching and robust fit parameters for texture alignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// FAST-9 intensity threshold for keypoint detection
    pub fast_threshold: u8,
    /// Keypoints kept per image, strongest first
    pub max_keypoints: usize,
    /// Fewest cross-checked matches needed to attempt a homography
    pub min_matches: usize,
    /// Reprojection error in pixels below which a match is an inlier
    pub ransac_threshold: f64,
    pub ransac_iterations: usize,
    /// Seed for RANSAC sampling and descriptor layout
    pub seed: u64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            max_keypoints: 500,
            min_matches: 4,
            ransac_threshold: 5.0,
            ransac_iterations: 2000,
            seed: 0x5EED_711E,
        }
    }
}

impl AlignmentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_matches < 4 {
            return Err(TileVizError::config_value_error(
                "alignment min_matches",
                self.min_matches,
                ">= 4",
                Some(4),
            ));
        }
        if !self.ransac_threshold.is_finite() || self.ransac_threshold <= 0.0 {
            return Err(TileVizError::config_value_error(
                "RANSAC threshold",
                self.ransac_threshold,
                "> 0",
                Some(5.0),
            ));
        }
        if self.ransac_iterations == 0 {
            return Err(TileVizError::config_value_error(
                "RANSAC iterations",
                self.ransac_iterations,
                ">= 1",
                Some(2000),
            ));
        }
        Ok(())
    }
}

/// Configuration for a `SurfaceVisualizer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Directory receiving masks and composited images
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,
    /// Side of the canonical tile every texture is resized to
    pub tile_size: u32,
    /// Warp textures into the mask's perspective before tiling
    pub align_textures: bool,
    pub alignment: AlignmentConfig,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
    pub classifier_model: ModelSpec,
    pub segmenter_model: ModelSpec,
    /// Default number of suggestions returned by color matching
    pub suggestion_top_n: usize,
    /// Upper bound on layouts per comparison
    pub max_layout_variants: usize,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("tiles_storage"),
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            tile_size: 100,
            align_textures: false,
            alignment: AlignmentConfig::default(),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            classifier_model: ModelSpec::cached("room-classifier"),
            segmenter_model: ModelSpec::cached("surface-segmenter"),
            suggestion_top_n: 5,
            max_layout_variants: 4,
        }
    }
}

impl VisualizerConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use tileviz::{OutputFormat, VisualizerConfig};
    ///
    /// let config = VisualizerConfig::builder()
    ///     .output_dir("/tmp/renders")
    ///     .output_format(OutputFormat::Jpeg)
    ///     .jpeg_quality(85)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.tile_size, 100);
    /// ```
    #[must_use]
    pub fn builder() -> VisualizerConfigBuilder {
        VisualizerConfigBuilder::default()
    }

    /// Load a JSON config file; missing keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TileVizError::file_io_error("read config", path, &e))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| TileVizError::invalid_config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - JPEG quality above 100
    /// - Zero tile size or suggestion count
    /// - Layout variant bound outside 1-4
    /// - Invalid alignment parameters
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(TileVizError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(90),
            ));
        }
        if self.tile_size == 0 {
            return Err(TileVizError::config_value_error(
                "tile size",
                self.tile_size,
                ">= 1",
                Some(100),
            ));
        }
        if self.suggestion_top_n == 0 {
            return Err(TileVizError::config_value_error(
                "suggestion count",
                self.suggestion_top_n,
                ">= 1",
                Some(5),
            ));
        }
        if !(1..=4).contains(&self.max_layout_variants) {
            return Err(TileVizError::config_value_error(
                "layout variants",
                self.max_layout_variants,
                "1-4",
                Some(4),
            ));
        }
        self.alignment.validate()
    }
}

/// Builder for `VisualizerConfig`
#[derive(Debug, Default)]
pub struct VisualizerConfigBuilder {
    config: VisualizerConfig,
}

impl VisualizerConfigBuilder {
    #[must_use]
    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    #[must_use]
    pub fn tile_size(mut self, size: u32) -> Self {
        self.config.tile_size = size;
        self
    }

    #[must_use]
    pub fn align_textures(mut self, enabled: bool) -> Self {
        self.config.align_textures = enabled;
        self
    }

    #[must_use]
    pub fn alignment(mut self, alignment: AlignmentConfig) -> Self {
        self.config.alignment = alignment;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set both intra and inter thread counts
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    #[must_use]
    pub fn classifier_model(mut self, spec: ModelSpec) -> Self {
        self.config.classifier_model = spec;
        self
    }

    #[must_use]
    pub fn segmenter_model(mut self, spec: ModelSpec) -> Self {
        self.config.segmenter_model = spec;
        self
    }

    #[must_use]
    pub fn suggestion_top_n(mut self, top_n: usize) -> Self {
        self.config.suggestion_top_n = top_n;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any check in [`VisualizerConfig::validate`]
    pub fn build(self) -> Result<VisualizerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
