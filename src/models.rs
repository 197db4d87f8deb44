//! Model directories and their metadata
//!
//! A model directory holds an ONNX file plus a `model.json` describing the
//! input shape, the preprocessing the network expects and, for classifiers,
//! the ordered label table.

use crate::error::{Result, TileVizError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const METADATA_FILE: &str = "model.json";

/// ImageNet channel statistics used by both pretrained networks
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Where a model directory lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    /// Model directory at an explicit filesystem path
    External(PathBuf),
    /// Model directory under the user cache, by id
    Cached(String),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::External(path) => format!(
                "external:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            Self::Cached(model_id) => format!("cached:{model_id}"),
        }
    }

    /// Resolve to a directory on disk
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        match self {
            Self::External(path) => Ok(path.clone()),
            Self::Cached(model_id) => Ok(cache_root()?.join(model_id)),
        }
    }
}

/// Root of the cached model directories
pub fn cache_root() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("tileviz").join("models"))
        .ok_or_else(|| TileVizError::model("Could not determine user cache directory"))
}

/// Model source plus optional variant name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    /// Key into the `variants` table of `model.json` (e.g. "fp16")
    #[serde(default)]
    pub variant: Option<String>,
}

impl ModelSpec {
    #[must_use]
    pub fn external<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            source: ModelSource::External(path.into()),
            variant: None,
        }
    }

    #[must_use]
    pub fn cached<S: Into<String>>(model_id: S) -> Self {
        Self {
            source: ModelSource::Cached(model_id.into()),
            variant: None,
        }
    }
}

/// How an image is resized before normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Resize both axes to `target_size`, ignoring aspect ratio
    #[default]
    Stretch,
    /// Scale so the shorter side equals `target_size[0]`, keeping aspect ratio
    ShorterSide,
}

/// Input statistics the network was trained with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Width and height (or shorter side in `target_size[0]`)
    pub target_size: [u32; 2],
    #[serde(default)]
    pub resize: ResizeMode,
    #[serde(default = "imagenet_mean")]
    pub mean: [f32; 3],
    #[serde(default = "imagenet_std")]
    pub std: [f32; 3],
}

fn imagenet_mean() -> [f32; 3] {
    IMAGENET_MEAN
}

fn imagenet_std() -> [f32; 3] {
    IMAGENET_STD
}

impl PreprocessingConfig {
    /// 224x224 stretch, the room classifier's input
    #[must_use]
    pub fn classifier_default() -> Self {
        Self {
            target_size: [224, 224],
            resize: ResizeMode::Stretch,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Shorter side to 520, the segmentation network's input
    #[must_use]
    pub fn segmenter_default() -> Self {
        Self {
            target_size: [520, 520],
            resize: ResizeMode::ShorterSide,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self::classifier_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ModelMetadata {
    name: String,
    #[serde(default = "default_model_file")]
    file: String,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    input_shape: Option<[usize; 4]>,
    #[serde(default)]
    preprocessing: Option<PreprocessingConfig>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    variants: BTreeMap<String, String>,
}

fn default_model_file() -> String {
    "model.onnx".to_string()
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub source: String,
    pub size_bytes: usize,
    /// NCHW; `None` when the model accepts dynamic spatial sizes
    pub input_shape: Option<(usize, usize, usize, usize)>,
    pub labels: Vec<String>,
}

/// Loads one model directory
#[derive(Debug, Clone)]
pub struct ModelManager {
    source: ModelSource,
    model_path: PathBuf,
    metadata: ModelMetadata,
}

impl ModelManager {
    /// Open the directory named by `spec` and parse its `model.json`
    ///
    /// # Errors
    /// - Directory or `model.json` missing
    /// - Malformed metadata or unknown variant
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        let dir = spec.source.resolve_dir()?;
        Self::from_dir(&dir, spec.variant.as_deref()).map(|mut manager| {
            manager.source = spec.source.clone();
            manager
        })
    }

    fn from_dir(dir: &Path, variant: Option<&str>) -> Result<Self> {
        if !dir.is_dir() {
            return Err(TileVizError::model(format!(
                "Model directory does not exist: {}",
                dir.display()
            )));
        }

        let metadata_path = dir.join(METADATA_FILE);
        let raw = fs::read_to_string(&metadata_path)
            .map_err(|e| TileVizError::file_io_error("read model metadata", &metadata_path, &e))?;
        let mut metadata: ModelMetadata = serde_json::from_str(&raw).map_err(|e| {
            TileVizError::model(format!("Invalid {}: {e}", metadata_path.display()))
        })?;
        metadata.preprocessing = Some(fit_to_input_shape(
            metadata.preprocessing.take().unwrap_or_default(),
            metadata.input_shape,
            &metadata.name,
        ));

        let file = match variant {
            Some(name) => metadata.variants.get(name).cloned().ok_or_else(|| {
                let available: Vec<&str> = metadata.variants.keys().map(String::as_str).collect();
                TileVizError::model(format!(
                    "Variant '{name}' not found for model '{}'. Available: {}",
                    metadata.name,
                    available.join(", ")
                ))
            })?,
            None => metadata.file.clone(),
        };

        log::debug!("Model '{}' resolved to {}", metadata.name, dir.join(&file).display());

        Ok(Self {
            source: ModelSource::External(dir.to_path_buf()),
            model_path: dir.join(file),
            metadata,
        })
    }

    /// Read the model bytes, verifying the checksum when one is declared
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let data = fs::read(&self.model_path)
            .map_err(|e| TileVizError::file_io_error("read model", &self.model_path, &e))?;

        if let Some(expected) = &self.metadata.sha256 {
            let actual = hex_digest(&data);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(TileVizError::model(format!(
                    "Checksum mismatch for {}: expected {expected}, got {actual}",
                    self.model_path.display()
                )));
            }
            log::debug!("Checksum verified for {}", self.model_path.display());
        }

        Ok(data)
    }

    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(&self.model_path)
            .map(|m| usize::try_from(m.len()).unwrap_or(usize::MAX))
            .unwrap_or(0);
        Ok(ModelInfo {
            name: self.metadata.name.clone(),
            source: self.source.display_name(),
            size_bytes,
            input_shape: self.metadata.input_shape.map(|[n, c, h, w]| (n, c, h, w)),
            labels: self.metadata.labels.clone(),
        })
    }

    /// Declared preprocessing, or the classifier default when absent
    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.metadata.preprocessing.clone().unwrap_or_default())
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.metadata.labels
    }

    #[must_use]
    pub fn get_model_path(&self) -> &Path {
        &self.model_path
    }
}

/// A fixed NCHW input only accepts its own H x W, so resize straight to it
fn fit_to_input_shape(
    preprocessing: PreprocessingConfig,
    input_shape: Option<[usize; 4]>,
    model_name: &str,
) -> PreprocessingConfig {
    let Some([_, _, height, width]) = input_shape else {
        return preprocessing;
    };
    let (Ok(height), Ok(width)) = (u32::try_from(height), u32::try_from(width)) else {
        return preprocessing;
    };
    if height == 0 || width == 0 {
        return preprocessing;
    }

    let fitted = PreprocessingConfig {
        target_size: [width, height],
        resize: ResizeMode::Stretch,
        ..preprocessing.clone()
    };
    if fitted != preprocessing {
        log::warn!(
            "Model '{model_name}' has a fixed {width}x{height} input; \
             preprocessing {:?} {:?} replaced by a stretch to it",
            preprocessing.resize,
            preprocessing.target_size
        );
    }
    fitted
}

fn hex_digest(data: &[u8]) -> String {
    use std::fmt::Write as _;
    Sha256::digest(data)
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}
