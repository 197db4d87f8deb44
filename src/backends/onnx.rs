//! ONNX Runtime backend with CPU, CUDA and `CoreML` execution providers

use crate::config::{ExecutionProvider, VisualizerConfig};
use crate::error::{Result, TileVizError};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::{Array4, ArrayD};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// ONNX Runtime backend
///
/// `Session::run` needs `&mut`, so the session sits behind a mutex to keep
/// the backend shareable.
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Mutex<Session>>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl OnnxBackend {
    /// ONNX Runtime execution providers with availability and description
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cuda = OrtExecutionProvider::is_available(&CUDAExecutionProvider::default())
            .unwrap_or(false);
        let coreml = OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
            .unwrap_or(false);
        log::debug!("ONNX Runtime providers: cuda={cuda}, coreml={coreml}");

        vec![
            ("CPU".to_string(), true, "Always available".to_string()),
            ("CUDA".to_string(), cuda, "NVIDIA GPU acceleration".to_string()),
            (
                "CoreML".to_string(),
                coreml,
                "Apple Silicon GPU/Neural Engine acceleration".to_string(),
            ),
        ]
    }

    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            model_manager: None,
            initialized: false,
        }
    }

    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    fn manager(&self) -> Result<&ModelManager> {
        self.model_manager
            .as_ref()
            .ok_or_else(|| TileVizError::model("No model manager available for ONNX backend"))
    }

    fn providers_for(provider: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = CUDAExecutionProvider::default();
        let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);
        let coreml = CoreMLExecutionProvider::default().with_subgraphs(true);
        let coreml_available = OrtExecutionProvider::is_available(&coreml).unwrap_or(false);

        let mut providers = Vec::new();
        match provider {
            ExecutionProvider::Auto => {
                if cuda_available {
                    providers.push(cuda.build());
                }
                if coreml_available {
                    providers.push(coreml.build());
                }
                if providers.is_empty() {
                    log::warn!("No hardware acceleration available, falling back to CPU");
                }
            },
            ExecutionProvider::Cuda if cuda_available => providers.push(cuda.build()),
            ExecutionProvider::CoreMl if coreml_available => providers.push(coreml.build()),
            ExecutionProvider::Cuda | ExecutionProvider::CoreMl => {
                log::warn!("{provider} execution provider requested but not available, falling back to CPU");
            },
            ExecutionProvider::Cpu => log::info!("Using CPU execution provider"),
        }
        providers
    }

    fn load_model(&mut self, config: &VisualizerConfig) -> Result<Duration> {
        let start = Instant::now();
        let manager = self.manager()?;
        let model_data = manager.load_model()?;
        let info = manager.get_info()?;

        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(8);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };

        let mut builder = Session::builder()
            .map_err(|e| TileVizError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                TileVizError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        let providers = Self::providers_for(config.execution_provider);
        if !providers.is_empty() {
            builder = builder.with_execution_providers(providers).map_err(|e| {
                TileVizError::inference(format!("Failed to set execution providers: {e}"))
            })?;
        }

        let session = builder
            .with_intra_threads(intra_threads)
            .map_err(|e| TileVizError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| TileVizError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| TileVizError::model(format!("Failed to create session: {e}")))?;

        log::info!(
            "ONNX Runtime session ready for '{}' ({}, provider {}, {intra_threads}/{inter_threads} threads)",
            info.name,
            info.source,
            config.execution_provider
        );

        self.session = Some(Mutex::new(session));
        self.initialized = true;
        Ok(start.elapsed())
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &VisualizerConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| TileVizError::inference("ONNX session not initialized"))?;
        let mut session = session
            .lock()
            .map_err(|_| TileVizError::internal("ONNX session lock poisoned"))?;

        let start = Instant::now();
        let input_value = Value::from_array(input.clone())
            .map_err(|e| TileVizError::processing(format!("Failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| TileVizError::inference(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| TileVizError::inference("No output tensors found"))?
            .to_string();
        let output = outputs
            .get(first_key.as_str())
            .ok_or_else(|| TileVizError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| TileVizError::inference(format!("Failed to extract output tensor: {e}")))?
            .to_owned();

        log::debug!(
            "ONNX inference produced {:?} in {:.2}ms",
            output.shape(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(output)
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
