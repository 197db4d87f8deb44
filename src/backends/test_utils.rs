//! Mock backends for unit tests
//!
//! They implement `InferenceBackend` without model files so the classifier,
//! segmenter and orchestrator can be exercised end to end.

use crate::{
    config::VisualizerConfig,
    error::{Result, TileVizError},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::{Array2, Array4, ArrayD, IxDyn};
use std::sync::{Arc, Mutex};

/// Classifier mock whose logits peak at a fixed class index
#[derive(Debug, Clone)]
pub struct MockClassifierBackend {
    class_index: usize,
    num_classes: usize,
    should_fail_inference: bool,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockClassifierBackend {
    #[must_use]
    pub fn new(class_index: usize) -> Self {
        Self {
            class_index,
            num_classes: 6,
            should_fail_inference: false,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    #[must_use]
    pub fn failing() -> Self {
        let mut backend = Self::new(0);
        backend.should_fail_inference = true;
        backend
    }

    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }
}

impl InferenceBackend for MockClassifierBackend {
    fn initialize(&mut self, _config: &VisualizerConfig) -> Result<Option<Duration>> {
        Ok(None)
    }

    fn infer(&self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(format!("infer {:?}", input.shape()));
        }
        if self.should_fail_inference {
            return Err(TileVizError::inference("Mock classifier failure"));
        }
        let mut logits = ArrayD::<f32>::zeros(IxDyn(&[1, self.num_classes]));
        if let Some(slot) = logits.get_mut([0, self.class_index].as_slice()) {
            *slot = 5.0;
        }
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
            name: "mock-room-classifier".to_string(),
            source: "mock".to_string(),
            size_bytes: 0,
            input_shape: Some((1, 3, 224, 224)),
            labels: Vec::new(),
        })
    }

    fn is_initialized(&self) -> bool {
        true
    }
}

/// Segmenter mock producing two-class logits at the network resolution
///
/// Pixels where `foreground` (given at network resolution) is true get
/// class 1, everything else class 0.
#[derive(Debug, Clone)]
pub struct MockSegmenterBackend {
    foreground: Array2<bool>,
    should_fail_inference: bool,
}

impl MockSegmenterBackend {
    /// Foreground is the rectangle `[x0, x1) x [y0, y1)` of a `width x height` map
    #[must_use]
    pub fn with_rect(
        width: usize,
        height: usize,
        x0: usize,
        y0: usize,
        x1: usize,
        y1: usize,
    ) -> Self {
        let foreground =
            Array2::from_shape_fn((height, width), |(y, x)| x >= x0 && x < x1 && y >= y0 && y < y1);
        Self {
            foreground,
            should_fail_inference: false,
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        let mut backend = Self::with_rect(4, 4, 0, 0, 0, 0);
        backend.should_fail_inference = true;
        backend
    }
}

impl InferenceBackend for MockSegmenterBackend {
    fn initialize(&mut self, _config: &VisualizerConfig) -> Result<Option<Duration>> {
        Ok(None)
    }

    fn infer(&self, _input: &Array4<f32>) -> Result<ArrayD<f32>> {
        if self.should_fail_inference {
            return Err(TileVizError::inference("Mock segmenter failure"));
        }
        let (height, width) = self.foreground.dim();
        let logits = Array4::from_shape_fn((1, 2, height, width), |(_, c, y, x)| {
            let fg = self.foreground[[y, x]];
            match (c, fg) {
                (1, true) | (0, false) => 1.0,
                _ => 0.0,
            }
        });
        Ok(logits.into_dyn())
    }

    fn input_shape(&self) -> Option<(usize, usize, usize, usize)> {
        None
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        let (height, width) = self.foreground.dim();
        Ok(PreprocessingConfig {
            target_size: [width as u32, height as u32],
            ..PreprocessingConfig::classifier_default()
        })
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock-surface-segmenter".to_string(),
            source: "mock".to_string(),
            size_bytes: 0,
            input_shape: None,
            labels: Vec::new(),
        })
    }

    fn is_initialized(&self) -> bool {
        true
    }
}
