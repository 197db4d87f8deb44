//! Oriented FAST keypoints with rotated binary descriptors

use image::GrayImage;
use imageproc::{corners::corners_fast9, filter::gaussian_blur_f32};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Half-width of the square sampling patch
const PATCH_RADIUS: i32 = 15;
/// Keypoints closer than this to an edge are dropped so rotated samples stay inside
const BORDER: u32 = 22;
const DESCRIPTOR_WORDS: usize = 4;
const DESCRIPTOR_BITS: usize = DESCRIPTOR_WORDS * 64;

/// 256-bit binary descriptor
pub type Descriptor = [u64; DESCRIPTOR_WORDS];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// Orientation in radians from the intensity centroid
    pub angle: f64,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureMatch {
    pub query: usize,
    pub train: usize,
    pub distance: u32,
}

#[derive(Debug, Clone)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    #[must_use]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Detects keypoints and computes descriptors with a fixed sampling layout
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    threshold: u8,
    max_keypoints: usize,
    pattern: Vec<[i32; 4]>,
}

impl FeatureExtractor {
    /// Two extractors built with the same `seed` produce comparable descriptors
    #[must_use]
    pub fn new(threshold: u8, max_keypoints: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let pattern = (0..DESCRIPTOR_BITS)
            .map(|_| {
                [0; 4].map(|_: i32| rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS))
            })
            .collect();
        Self {
            threshold,
            max_keypoints,
            pattern,
        }
    }

    #[must_use]
    pub fn detect(&self, image: &GrayImage) -> Features {
        let (width, height) = image.dimensions();
        if width <= 2 * BORDER || height <= 2 * BORDER {
            return Features {
                keypoints: Vec::new(),
                descriptors: Vec::new(),
            };
        }

        let mut corners: Vec<_> = corners_fast9(image, self.threshold)
            .into_iter()
            .filter(|c| {
                c.x >= BORDER && c.y >= BORDER && c.x < width - BORDER && c.y < height - BORDER
            })
            .collect();
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));
        corners.truncate(self.max_keypoints);

        let smoothed = gaussian_blur_f32(image, 2.0);
        let (keypoints, descriptors) = corners
            .into_iter()
            .map(|corner| {
                let (x, y) = (i64::from(corner.x), i64::from(corner.y));
                let angle = orientation(image, x, y);
                let keypoint = Keypoint {
                    x: f64::from(corner.x),
                    y: f64::from(corner.y),
                    angle,
                    score: corner.score,
                };
                (keypoint, self.describe(&smoothed, x, y, angle))
            })
            .unzip();

        Features {
            keypoints,
            descriptors,
        }
    }

    fn describe(&self, image: &GrayImage, cx: i64, cy: i64, angle: f64) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let rotate = |dx: i32, dy: i32| {
            let (dx, dy) = (f64::from(dx), f64::from(dy));
            (
                cx + (cos * dx - sin * dy).round() as i64,
                cy + (sin * dx + cos * dy).round() as i64,
            )
        };

        let mut descriptor = [0u64; DESCRIPTOR_WORDS];
        for (bit, &[x1, y1, x2, y2]) in self.pattern.iter().enumerate() {
            let a = rotate(x1, y1);
            let b = rotate(x2, y2);
            if intensity(image, a.0, a.1) < intensity(image, b.0, b.1) {
                if let Some(word) = descriptor.get_mut(bit / 64) {
                    *word |= 1 << (bit % 64);
                }
            }
        }
        descriptor
    }
}

fn intensity(image: &GrayImage, x: i64, y: i64) -> u8 {
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return 0;
    };
    image.get_pixel_checked(x, y).map_or(0, |p| p.0[0])
}

/// Angle of the vector from the center to the intensity centroid of a disc
fn orientation(image: &GrayImage, cx: i64, cy: i64) -> f64 {
    let radius = i64::from(PATCH_RADIUS);
    let (mut m01, mut m10) = (0.0, 0.0);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let value = f64::from(intensity(image, cx + dx, cy + dy));
            m10 += dx as f64 * value;
            m01 += dy as f64 * value;
        }
    }
    m01.atan2(m10)
}

#[must_use]
pub fn hamming(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

fn nearest(descriptor: &Descriptor, pool: &[Descriptor]) -> Option<(usize, u32)> {
    pool.iter()
        .enumerate()
        .map(|(idx, other)| (idx, hamming(descriptor, other)))
        .min_by_key(|&(idx, distance)| (distance, idx))
}

/// Brute-force nearest neighbours kept only when mutual, sorted by distance
#[must_use]
pub fn match_descriptors(query: &[Descriptor], train: &[Descriptor]) -> Vec<FeatureMatch> {
    let backward: Vec<Option<usize>> = train
        .iter()
        .map(|d| nearest(d, query).map(|(idx, _)| idx))
        .collect();

    let mut matches: Vec<FeatureMatch> = query
        .iter()
        .enumerate()
        .filter_map(|(q, descriptor)| {
            let (t, distance) = nearest(descriptor, train)?;
            (backward.get(t).copied().flatten() == Some(q)).then_some(FeatureMatch {
                query: q,
                train: t,
                distance,
            })
        })
        .collect();
    matches.sort_by_key(|m| (m.distance, m.query));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Random 8x8 blocks, rich in corners
    fn blocky_texture(width: u32, height: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let blocks_x = width.div_ceil(8);
        let blocks_y = height.div_ceil(8);
        let levels: Vec<u8> = (0..blocks_x * blocks_y)
            .map(|_| rng.gen_range(0..=255))
            .collect();
        GrayImage::from_fn(width, height, |x, y| {
            Luma([levels[((y / 8) * blocks_x + x / 8) as usize]])
        })
    }

    #[test]
    fn test_flat_image_has_no_features() {
        let image = GrayImage::from_pixel(128, 128, Luma([90]));
        let features = FeatureExtractor::new(20, 500, 1).detect(&image);
        assert!(features.is_empty());
    }

    #[test]
    fn test_small_image_has_no_features() {
        let image = blocky_texture(40, 40, 3);
        assert!(FeatureExtractor::new(20, 500, 1).detect(&image).is_empty());
    }

    #[test]
    fn test_keypoint_cap_and_border() {
        let image = blocky_texture(160, 120, 11);
        let features = FeatureExtractor::new(10, 25, 1).detect(&image);
        assert!(features.len() <= 25);
        assert_eq!(features.keypoints.len(), features.descriptors.len());
        for kp in &features.keypoints {
            assert!(kp.x >= f64::from(BORDER) && kp.x < f64::from(160 - BORDER));
            assert!(kp.y >= f64::from(BORDER) && kp.y < f64::from(120 - BORDER));
        }
    }

    #[test]
    fn test_hamming() {
        let a = [0u64, u64::MAX, 0b1011, 0];
        let b = [0u64, 0, 0b0001, 1];
        assert_eq!(hamming(&a, &b), 64 + 2 + 1);
        assert_eq!(hamming(&a, &a), 0);
    }

    #[test]
    fn test_self_matching_is_exact() {
        let image = blocky_texture(128, 128, 5);
        let extractor = FeatureExtractor::new(15, 300, 9);
        let features = extractor.detect(&image);
        assert!(features.len() >= 4);

        let matches = match_descriptors(&features.descriptors, &features.descriptors);
        assert!(matches.len() >= 4);
        assert!(matches.iter().all(|m| m.distance == 0));
    }

    #[test]
    fn test_cross_check_drops_one_sided_matches() {
        let query = [[0u64; 4], [0b1111, 0, 0, 0]];
        let train = [[0b1, 0, 0, 0]];
        let matches = match_descriptors(&query, &train);
        assert_eq!(
            matches,
            vec![FeatureMatch {
                query: 0,
                train: 0,
                distance: 1
            }]
        );
    }
}
