//! Image to tensor conversion for the pretrained networks

use crate::{
    error::{Result, TileVizError},
    models::{PreprocessingConfig, ResizeMode},
};
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;

/// Resizes and normalizes RGB images into NCHW tensors
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Size the network sees for an image of `(width, height)`
    ///
    /// `ShorterSide` keeps the aspect ratio and maps the shorter side to
    /// `target_size[0]`; `Stretch` returns `target_size` as is.
    pub fn target_dimensions(
        (width, height): (u32, u32),
        config: &PreprocessingConfig,
    ) -> Result<(u32, u32)> {
        if width == 0 || height == 0 {
            return Err(TileVizError::invalid_input("Cannot preprocess an empty image"));
        }
        let [target_w, target_h] = config.target_size;
        if target_w == 0 || target_h == 0 {
            return Err(TileVizError::config_value_error(
                "preprocessing target size",
                format!("{target_w}x{target_h}"),
                "> 0",
                None,
            ));
        }

        match config.resize {
            ResizeMode::Stretch => Ok((target_w, target_h)),
            ResizeMode::ShorterSide => {
                let side = f64::from(target_w);
                let (w, h) = (f64::from(width), f64::from(height));
                let dims = if width <= height {
                    (target_w, (side * h / w).round().max(1.0) as u32)
                } else {
                    ((side * w / h).round().max(1.0) as u32, target_w)
                };
                Ok(dims)
            },
        }
    }

    /// Resize then normalize with the model's mean and std
    pub fn preprocess(image: &RgbImage, config: &PreprocessingConfig) -> Result<Array4<f32>> {
        let (width, height) = Self::target_dimensions(image.dimensions(), config)?;
        tracing::trace!(
            original = ?image.dimensions(),
            target = ?(width, height),
            "preprocessing image"
        );

        let resized = if image.dimensions() == (width, height) {
            image.clone()
        } else {
            image::imageops::resize(image, width, height, FilterType::Triangle)
        };

        Ok(Self::to_tensor(&resized, config))
    }

    fn to_tensor(image: &RgbImage, config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in image.enumerate_pixels() {
            for channel in 0..3 {
                let value = f32::from(pixel.0.get(channel).copied().unwrap_or(0)) / 255.0;
                let mean = config.mean.get(channel).copied().unwrap_or(0.0);
                let std = config.std.get(channel).copied().unwrap_or(1.0);
                if let Some(slot) = tensor.get_mut([0, channel, y as usize, x as usize]) {
                    *slot = (value - mean) / std;
                }
            }
        }

        tensor
    }
}
