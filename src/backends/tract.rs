//! Tract backend: pure Rust ONNX inference

use crate::config::VisualizerConfig;
use crate::error::{Result, TileVizError};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::{Array4, ArrayD};
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl TractBackend {
    /// Tract execution providers with availability and description
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!(
            "Tract backend on {}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    #[must_use]
    pub fn new() -> Self {
        Self {
            model: None,
            model_manager: None,
            initialized: false,
        }
    }

    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    fn manager(&self) -> Result<&ModelManager> {
        self.model_manager
            .as_ref()
            .ok_or_else(|| TileVizError::model("No model manager available for Tract backend"))
    }

    fn load_model(&mut self) -> Result<Duration> {
        let start = Instant::now();
        let manager = self.manager()?;
        let model_data = manager.load_model()?;
        let info = manager.get_info()?;

        log::info!("Initializing Tract backend for model '{}' ({})", info.name, info.source);
        log::debug!(
            "Model size: {:.2} MB",
            info.size_bytes as f64 / (1024.0 * 1024.0)
        );

        let mut model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| TileVizError::model(format!("Failed to load ONNX model: {e}")))?;

        if let Some((n, c, h, w)) = info.input_shape {
            model = model
                .with_input_fact(0, f32::fact([n, c, h, w]).into())
                .map_err(|e| TileVizError::model(format!("Failed to set input shape: {e}")))?;
        }

        let runnable = model
            .into_optimized()
            .map_err(|e| TileVizError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| TileVizError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(runnable);
        self.initialized = true;

        let elapsed = start.elapsed();
        log::info!("Tract backend initialized in {}ms", elapsed.as_millis());
        Ok(elapsed)
    }
}

impl Default for TractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &VisualizerConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.load_model().map(Some)
    }

    fn infer(&self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TileVizError::inference("Tract model not initialized"))?;

        log::debug!("Running Tract inference on {:?}", input.shape());
        let start = Instant::now();

        let outputs = model
            .run(tvec![Tensor::from(input.clone()).into()])
            .map_err(|e| TileVizError::inference(format!("Tract inference failed: {e}")))?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| TileVizError::inference("No output tensor found"))?
            .into_arc_tensor();

        let array = output
            .to_array_view::<f32>()
            .map_err(|e| TileVizError::inference(format!("Failed to convert output tensor: {e}")))?
            .to_owned();

        log::debug!(
            "Tract inference produced {:?} in {:.2}ms",
            array.shape(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(array)
    }

    fn input_shape(&self) -> Option<(usize, usize, usize, usize)> {
        self.model_manager
            .as_ref()
            .and_then(|m| m.get_info().ok())
            .and_then(|info| info.input_shape)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.manager()?.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.manager()?.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_backend() {
        let backend = TractBackend::new();
        assert!(!backend.is_initialized());
        assert!(backend.input_shape().is_none());
        assert!(backend.get_model_info().is_err());

        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(matches!(backend.infer(&input), Err(TileVizError::Inference(_))));
    }

    #[test]
    fn test_initialize_without_manager_fails() {
        let mut backend = TractBackend::new();
        let result = backend.initialize(&VisualizerConfig::default());
        assert!(matches!(result, Err(TileVizError::Model(_))));
    }

    #[test]
    fn test_list_providers() {
        let providers = TractBackend::list_providers();
        assert_eq!(providers.len(), 1);
        assert!(providers[0].1);
    }
}
