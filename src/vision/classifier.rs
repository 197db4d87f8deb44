//! Room-type prediction

use crate::{
    error::{Result, TileVizError},
    inference::{ensure_usable_output, InferenceBackend},
    types::RoomType,
    utils::ImagePreprocessor,
};
use image::RgbImage;
use ndarray::{ArrayD, Axis};
use std::sync::Arc;

/// Index of the largest value, first one on ties
pub(crate) fn argmax<'a, I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a f32>,
{
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.into_iter().enumerate() {
        if best.map_or(true, |(_, current)| value > current) {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Classifies a room photo into one of the known room types
#[derive(Clone)]
pub struct RoomClassifier {
    backend: Arc<dyn InferenceBackend>,
    labels: Vec<RoomType>,
}

impl std::fmt::Debug for RoomClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomClassifier")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl RoomClassifier {
    /// Wrap an initialized backend
    ///
    /// Labels come from the model metadata when it lists them, otherwise the
    /// built-in order is used.
    ///
    /// # Errors
    /// - Model metadata names a label that is not a known room type
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Result<Self> {
        let declared = backend.get_model_info()?.labels;
        let labels = if declared.is_empty() {
            RoomType::ALL.to_vec()
        } else {
            declared
                .iter()
                .map(|label| {
                    label.parse::<RoomType>().map_err(|_| {
                        TileVizError::model(format!("Classifier label '{label}' is not a room type"))
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Self { backend, labels })
    }

    #[must_use]
    pub fn labels(&self) -> &[RoomType] {
        &self.labels
    }

    /// Raw class scores for the first batch element
    pub fn scores(&self, image: &RgbImage) -> Result<Vec<f32>> {
        let config = self.backend.get_preprocessing_config()?;
        let input = ImagePreprocessor::preprocess(image, &config)?;
        let output = self.backend.infer(&input)?;
        ensure_usable_output(&output, "room classifier")?;
        Ok(first_row(&output))
    }

    /// Predicted room type
    ///
    /// # Errors
    /// - Backend failure or unusable output
    /// - Winning index outside the label table
    pub fn predict(&self, image: &RgbImage) -> Result<RoomType> {
        let _span = tracing::info_span!(
            "classification",
            width = image.width(),
            height = image.height()
        )
        .entered();

        let scores = self.scores(image)?;
        let index = argmax(&scores)
            .ok_or_else(|| TileVizError::inference("Room classifier returned no scores"))?;
        let room = self.labels.get(index).copied().ok_or_else(|| {
            TileVizError::inference(format!(
                "Room classifier picked class {index} but only {} labels are known",
                self.labels.len()
            ))
        })?;

        tracing::info!(room = %room, index, "room classified");
        Ok(room)
    }
}

fn first_row(output: &ArrayD<f32>) -> Vec<f32> {
    if output.ndim() > 1 {
        output.index_axis(Axis(0), 0).iter().copied().collect()
    } else {
        output.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockClassifierBackend;

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[0.1, 0.9, 0.9, 0.2]), Some(1));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[-3.0]), Some(0));
    }

    #[test]
    fn test_predicts_each_label() {
        let image = RgbImage::new(64, 48);
        for (index, expected) in RoomType::ALL.into_iter().enumerate() {
            let classifier =
                RoomClassifier::new(Arc::new(MockClassifierBackend::new(index))).unwrap();
            assert_eq!(classifier.predict(&image).unwrap(), expected);
        }
    }

    #[test]
    fn test_index_past_labels_is_inference_error() {
        let backend = MockClassifierBackend::new(7).with_num_classes(8);
        let classifier = RoomClassifier::new(Arc::new(backend)).unwrap();
        let result = classifier.predict(&RgbImage::new(10, 10));
        assert!(matches!(result, Err(TileVizError::Inference(_))));
    }

    #[test]
    fn test_backend_failure_propagates() {
        let classifier = RoomClassifier::new(Arc::new(MockClassifierBackend::failing())).unwrap();
        assert!(matches!(
            classifier.predict(&RgbImage::new(10, 10)),
            Err(TileVizError::Inference(_))
        ));
    }

    #[test]
    fn test_classifier_sees_preprocessed_tensor() {
        let backend = Arc::new(MockClassifierBackend::new(0));
        let classifier = RoomClassifier::new(backend.clone()).unwrap();
        classifier.predict(&RgbImage::new(300, 200)).unwrap();
        assert_eq!(backend.get_call_history(), vec!["infer [1, 3, 224, 224]".to_string()]);
    }
}
