//! Wall and floor mask extraction

use super::classifier::argmax;
use crate::{
    error::{Result, TileVizError},
    inference::{ensure_usable_output, InferenceBackend},
    types::{RoomType, SegmentationResult, SurfacePolicy, MASK_FOREGROUND},
    utils::ImagePreprocessor,
};
use image::{imageops, imageops::FilterType, GrayImage, Luma, RgbImage};
use ndarray::{Array3, ArrayD, ArrayView3, Axis, Ix3};
use std::sync::Arc;

/// Runs the segmentation network and splits its map into surface masks
#[derive(Clone)]
pub struct SurfaceSegmenter {
    backend: Arc<dyn InferenceBackend>,
}

impl std::fmt::Debug for SurfaceSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceSegmenter").finish_non_exhaustive()
    }
}

impl SurfaceSegmenter {
    #[must_use]
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }

    /// Binary map at the image's resolution, 255 wherever any non-background class wins
    pub fn foreground_map(&self, image: &RgbImage) -> Result<GrayImage> {
        let config = self.backend.get_preprocessing_config()?;
        let input = ImagePreprocessor::preprocess(image, &config)?;
        let output = self.backend.infer(&input)?;
        ensure_usable_output(&output, "surface segmenter")?;

        let scores = class_scores(output)?;
        let map = binarize(scores.view());
        let (width, height) = image.dimensions();
        if map.dimensions() == (width, height) {
            return Ok(map);
        }
        Ok(imageops::resize(&map, width, height, FilterType::Nearest))
    }

    /// Wall and floor masks for a room photo
    ///
    /// Both masks match the input size and never overlap; which one
    /// receives the map depends on the room type.
    pub fn segment(&self, image: &RgbImage, room: RoomType) -> Result<SegmentationResult> {
        let _span = tracing::info_span!(
            "segmentation",
            room = %room,
            width = image.width(),
            height = image.height()
        )
        .entered();

        let map = self.foreground_map(image)?;
        let policy = SurfacePolicy::for_room(room);
        let (wall_mask, floor_mask) = policy.split(map);
        tracing::debug!(?policy, "masks assigned");

        Ok(SegmentationResult {
            room_type: room,
            wall_mask,
            floor_mask,
        })
    }
}

/// Normalize the network output to `(classes, height, width)`
fn class_scores(output: ArrayD<f32>) -> Result<Array3<f32>> {
    let shape = output.shape().to_vec();
    let scores = match output.ndim() {
        4 => output.index_axis_move(Axis(0), 0),
        3 => output,
        2 => output.insert_axis(Axis(0)),
        n => {
            return Err(TileVizError::inference(format!(
                "Segmenter output has {n} dimensions ({shape:?}), expected 2 to 4"
            )))
        },
    };
    scores
        .into_dimensionality::<Ix3>()
        .map_err(|e| TileVizError::inference(format!("Segmenter output {shape:?}: {e}")))
}

/// Per-pixel argmax over classes; a single channel is read as a class-index map
fn binarize(scores: ArrayView3<'_, f32>) -> GrayImage {
    let (classes, height, width) = scores.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let pixel = scores.slice(ndarray::s![.., y as usize, x as usize]);
        let class = if classes == 1 {
            usize::from(pixel.iter().any(|&v| v >= 0.5))
        } else {
            argmax(pixel.iter()).unwrap_or(0)
        };
        if class == 0 {
            Luma([0])
        } else {
            Luma([MASK_FOREGROUND])
        }
    })
}
