//! Best-effort perspective alignment of a texture onto a target frame

use super::features::{match_descriptors, FeatureExtractor};
use super::homography::{self, Point};
use crate::config::AlignmentConfig;
use image::{imageops, GrayImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// Texture after alignment
///
/// `homography` is `None` when alignment fell back, in which case `image`
/// is the input texture unchanged.
#[derive(Debug, Clone)]
pub struct AlignedTexture {
    pub image: RgbImage,
    /// Row-major texture-to-target transform
    pub homography: Option<[f64; 9]>,
    pub matches: usize,
}

impl AlignedTexture {
    fn unchanged(texture: &RgbImage, matches: usize) -> Self {
        Self {
            image: texture.clone(),
            homography: None,
            matches,
        }
    }

    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.homography.is_some()
    }
}

/// Warps textures into a target's perspective from matched keypoints
#[derive(Debug, Clone)]
pub struct TileAligner {
    config: AlignmentConfig,
    extractor: FeatureExtractor,
}

impl Default for TileAligner {
    fn default() -> Self {
        Self::new(AlignmentConfig::default())
    }
}

impl TileAligner {
    #[must_use]
    pub fn new(config: AlignmentConfig) -> Self {
        let extractor =
            FeatureExtractor::new(config.fast_threshold, config.max_keypoints, config.seed);
        Self { config, extractor }
    }

    /// Warp `texture` into the pixel frame of `target`
    ///
    /// Too few keypoints, too few matches or no consistent homography all
    /// return the texture unchanged. None of these are errors.
    #[must_use]
    pub fn align(&self, texture: &RgbImage, target: &GrayImage) -> AlignedTexture {
        let _span = tracing::debug_span!(
            "alignment",
            texture = ?texture.dimensions(),
            target = ?target.dimensions()
        )
        .entered();

        let min_matches = self.config.min_matches.max(4);
        let source = self.extractor.detect(&imageops::grayscale(texture));
        let destination = self.extractor.detect(target);
        if source.len() < min_matches || destination.len() < min_matches {
            tracing::debug!(
                texture_keypoints = source.len(),
                target_keypoints = destination.len(),
                "not enough keypoints, keeping texture as is"
            );
            return AlignedTexture::unchanged(texture, 0);
        }

        let matches = match_descriptors(&source.descriptors, &destination.descriptors);
        if matches.len() < min_matches {
            tracing::debug!(matches = matches.len(), "not enough matches, keeping texture as is");
            return AlignedTexture::unchanged(texture, matches.len());
        }

        let (src, dst): (Vec<Point>, Vec<Point>) = matches
            .iter()
            .filter_map(|m| {
                let a = source.keypoints.get(m.query)?;
                let b = destination.keypoints.get(m.train)?;
                Some(((a.x, a.y), (b.x, b.y)))
            })
            .unzip();

        let Some(fit) = homography::ransac(
            &src,
            &dst,
            self.config.ransac_threshold,
            self.config.ransac_iterations,
            self.config.seed,
        ) else {
            tracing::debug!(matches = matches.len(), "no consistent homography");
            return AlignedTexture::unchanged(texture, matches.len());
        };

        let h = fit.homography;
        let row_major: [f64; 9] = [
            h[(0, 0)],
            h[(0, 1)],
            h[(0, 2)],
            h[(1, 0)],
            h[(1, 1)],
            h[(1, 2)],
            h[(2, 0)],
            h[(2, 1)],
            h[(2, 2)],
        ];
        let Some(projection) = Projection::from_matrix(row_major.map(|v| v as f32)) else {
            tracing::debug!("homography is not invertible");
            return AlignedTexture::unchanged(texture, matches.len());
        };

        let mut warped = RgbImage::new(target.width(), target.height());
        warp_into(
            texture,
            &projection,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
            &mut warped,
        );

        tracing::debug!(
            matches = matches.len(),
            inliers = fit.inlier_count(),
            "texture aligned"
        );
        AlignedTexture {
            image: warped,
            homography: Some(row_major),
            matches: matches.len(),
        }
    }
}
