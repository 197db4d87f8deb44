//! Dominant color extraction, color naming and catalog color matching

use super::palette::CSS3_COLORS;
use crate::error::{Result, TileVizError};
use crate::types::{ColorMatch, ColorSample, DominantColor, MatchRanking};
use image::RgbImage;
use ndarray::{Array1, Array2, Axis};

/// Closest CSS3 color keyword, capitalized (`"Darkslategray"`)
///
/// An exact match wins; otherwise the smallest squared RGB distance, with
/// ties going to the keyword that comes first alphabetically.
#[must_use]
pub fn closest_color_name(rgb: [u8; 3]) -> String {
    let target = ColorSample::from_rgb(rgb);
    let exact = CSS3_COLORS.iter().find(|(_, value)| *value == rgb);

    let name = exact.map_or_else(
        || {
            let mut best = ("black", u32::MAX);
            for &(name, value) in &CSS3_COLORS {
                let distance = target.squared_distance(&ColorSample::from_rgb(value));
                if distance < best.1 {
                    best = (name, distance);
                }
            }
            best.0
        },
        |&(name, _)| name,
    );

    capitalize(name)
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Representative color of a photo by centroid clustering
#[derive(Debug, Clone)]
pub struct DominantColorExtractor {
    clusters: usize,
    max_iterations: usize,
}

impl Default for DominantColorExtractor {
    fn default() -> Self {
        Self {
            clusters: 1,
            max_iterations: 200,
        }
    }
}

impl DominantColorExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cluster into `clusters` groups and report the most populated one
    #[must_use]
    pub fn with_clusters(mut self, clusters: usize) -> Self {
        self.clusters = clusters.max(1);
        self
    }

    /// Centroid of the largest cluster, rounded per channel
    ///
    /// # Errors
    /// - Image has no pixels
    pub fn extract(&self, image: &RgbImage) -> Result<ColorSample> {
        let pixel_count = image.pixels().len();
        if pixel_count == 0 {
            return Err(TileVizError::invalid_input(
                "Cannot extract a color from an empty image",
            ));
        }

        let samples = Array2::from_shape_vec(
            (pixel_count, 3),
            image.as_raw().iter().map(|&v| f64::from(v)).collect(),
        )
        .map_err(|e| TileVizError::internal(format!("Pixel buffer shape: {e}")))?;

        let centroid = self.largest_cluster_centroid(&samples);
        let rgb = [0, 1, 2].map(|c| {
            centroid
                .get(c)
                .copied()
                .unwrap_or(0.0)
                .round()
                .clamp(0.0, 255.0) as u8
        });
        Ok(ColorSample::from_rgb(rgb))
    }

    /// Hex code plus palette name
    pub fn describe(&self, image: &RgbImage) -> Result<DominantColor> {
        let color = self.extract(image)?;
        let name = closest_color_name(color.rgb);
        tracing::debug!(hex = %color.to_hex(), name = %name, "dominant color");
        Ok(DominantColor {
            hex: color.to_hex(),
            name,
        })
    }

    /// Lloyd iterations seeded with evenly spaced samples
    fn largest_cluster_centroid(&self, samples: &Array2<f64>) -> Array1<f64> {
        let n = samples.nrows();
        let k = self.clusters.min(n);
        if k == 1 {
            return samples
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(3));
        }

        let mut centroids = Array2::<f64>::zeros((k, 3));
        for (i, mut row) in centroids.rows_mut().into_iter().enumerate() {
            row.assign(&samples.row(i * n / k));
        }

        let mut assignment = vec![0usize; n];
        for _ in 0..self.max_iterations {
            let mut changed = false;
            for (slot, sample) in assignment.iter_mut().zip(samples.rows()) {
                let nearest = centroids
                    .rows()
                    .into_iter()
                    .map(|c| (&c - &sample).mapv(|d| d * d).sum())
                    .enumerate()
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map_or(0, |(idx, _)| idx);
                if *slot != nearest {
                    *slot = nearest;
                    changed = true;
                }
            }

            let mut sums = Array2::<f64>::zeros((k, 3));
            let mut counts = vec![0usize; k];
            for (&cluster, sample) in assignment.iter().zip(samples.rows()) {
                let mut row = sums.row_mut(cluster);
                row += &sample;
                if let Some(count) = counts.get_mut(cluster) {
                    *count += 1;
                }
            }
            for (cluster, &count) in counts.iter().enumerate() {
                if count > 0 {
                    let mean = sums.row(cluster).mapv(|v| v / count as f64);
                    centroids.row_mut(cluster).assign(&mean);
                }
            }

            if !changed {
                break;
            }
        }

        let mut counts = vec![0usize; k];
        for &cluster in &assignment {
            if let Some(count) = counts.get_mut(cluster) {
                *count += 1;
            }
        }
        let largest = counts
            .iter()
            .enumerate()
            .max_by_key(|&(idx, &count)| (count, std::cmp::Reverse(idx)))
            .map_or(0, |(idx, _)| idx);
        centroids.row(largest).to_owned()
    }
}

/// A catalog item offered for matching; `color` is `None` when untagged
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub item_id: String,
    pub color: Option<ColorSample>,
}

/// Ranks catalog items by RGB distance to a reference color
#[derive(Debug, Clone, Copy)]
pub struct ColorMatcher {
    top_n: usize,
}

impl ColorMatcher {
    #[must_use]
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Closest `top_n` candidates, ascending by distance
    ///
    /// Candidates without a color are skipped. Equal distances keep the
    /// order in which the candidates were supplied.
    #[must_use]
    pub fn rank<'a, I>(&self, reference: &ColorSample, candidates: I) -> MatchRanking
    where
        I: IntoIterator<Item = &'a MatchCandidate>,
    {
        let mut ranking: MatchRanking = candidates
            .into_iter()
            .filter_map(|candidate| {
                let color = candidate.color.as_ref()?;
                Some(ColorMatch {
                    item_id: candidate.item_id.clone(),
                    color: color.clone(),
                    score: reference.distance(color),
                })
            })
            .collect();

        // stable
        ranking.sort_by(|a, b| a.score.total_cmp(&b.score));
        ranking.truncate(self.top_n);
        ranking
    }
}

impl Default for ColorMatcher {
    fn default() -> Self {
        Self::new(5)
    }
}
