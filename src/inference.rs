//! Inference backend abstraction and factory

use crate::{
    config::VisualizerConfig,
    error::{Result, TileVizError},
    models::{ModelInfo, ModelManager, PreprocessingConfig},
};
use instant::Duration;
use ndarray::{Array4, ArrayD};
use serde::{Deserialize, Serialize};

/// A loaded network
///
/// Backends are initialized once and then shared read-only across
/// concurrent callers, so `infer` takes `&self`.
pub trait InferenceBackend: Send + Sync {
    /// Load the model
    ///
    /// # Errors
    /// - Model loading or validation errors
    fn initialize(&mut self, config: &VisualizerConfig) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    fn infer(&self, input: &Array4<f32>) -> Result<ArrayD<f32>>;

    /// NCHW input shape if the model declares a fixed one
    fn input_shape(&self) -> Option<(usize, usize, usize, usize)>;

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    fn get_model_info(&self) -> Result<ModelInfo>;

    fn is_initialized(&self) -> bool;
}

/// Which inference engine runs the models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    #[default]
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend of `backend_type` for `model_manager`
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    fn available_backends(&self) -> Vec<BackendType>;
}

/// Creates the backends enabled by cargo features
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::with_model_manager(
                model_manager,
            ))),
            #[allow(unreachable_patterns)]
            other => {
                drop(model_manager);
                Err(TileVizError::invalid_config(format!(
                    "Backend '{other}' is not enabled in this build"
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Reject empty or non-finite network outputs
pub(crate) fn ensure_usable_output(output: &ArrayD<f32>, stage: &str) -> Result<()> {
    if output.is_empty() {
        return Err(TileVizError::inference(format!("{stage} produced an empty tensor")));
    }
    if output.iter().any(|v| !v.is_finite()) {
        return Err(TileVizError::inference(format!(
            "{stage} produced non-finite values"
        )));
    }
    Ok(())
}
