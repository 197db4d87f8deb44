//! Planar homography estimation
//!
//! Normalized direct linear transform, wrapped in seeded RANSAC.

use nalgebra::{Matrix3, SMatrix, SVector, SymmetricEigen, Vector3};
use rand::{rngs::StdRng, seq::index, SeedableRng};

pub type Point = (f64, f64);

/// Map a point through `h`, `None` at the line at infinity
#[must_use]
pub fn project(h: &Matrix3<f64>, (x, y): Point) -> Option<Point> {
    let p = h * Vector3::new(x, y, 1.0);
    if p.z.abs() < 1e-12 {
        return None;
    }
    Some((p.x / p.z, p.y / p.z))
}

/// Similarity moving the centroid to the origin with mean distance sqrt(2)
fn normalizing_transform(points: &[Point]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let (cx, cy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    let (cx, cy) = (cx / n, cy / n);
    let mean_dist = points
        .iter()
        .map(|&(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < 1e-9 {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn apply(t: &Matrix3<f64>, (x, y): Point) -> Point {
    let p = t * Vector3::new(x, y, 1.0);
    (p.x, p.y)
}

/// Least-squares homography from four or more correspondences
///
/// Returns `None` for fewer than four pairs or a degenerate configuration.
#[must_use]
pub fn estimate(src: &[Point], dst: &[Point]) -> Option<Matrix3<f64>> {
    if src.len() < 4 || src.len() != dst.len() {
        return None;
    }
    let t_src = normalizing_transform(src)?;
    let t_dst = normalizing_transform(dst)?;

    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (&s, &d) in src.iter().zip(dst) {
        let (x, y) = apply(&t_src, s);
        let (u, v) = apply(&t_dst, d);
        let rows = [
            [-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u],
            [0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v],
        ];
        for row in rows {
            let r = SVector::<f64, 9>::from_row_slice(&row);
            ata += r * r.transpose();
        }
    }

    let eigen = SymmetricEigen::new(ata);
    let smallest = eigen.eigenvalues.imin();
    let h: Vec<f64> = eigen.eigenvectors.column(smallest).iter().copied().collect();
    let normalized = Matrix3::from_row_slice(&h);

    let t_dst_inv = t_dst.try_inverse()?;
    let mut homography = t_dst_inv * normalized * t_src;
    let scale = homography[(2, 2)];
    if scale.abs() < 1e-12 || !homography.iter().all(|v| v.is_finite()) {
        return None;
    }
    homography /= scale;
    Some(homography)
}

/// Robust fit result
#[derive(Debug, Clone)]
pub struct RansacFit {
    pub homography: Matrix3<f64>,
    pub inliers: Vec<bool>,
}

impl RansacFit {
    #[must_use]
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&inlier| inlier).count()
    }
}

/// Seeded RANSAC over minimal four-point samples, refit on the best inlier set
#[must_use]
pub fn ransac(
    src: &[Point],
    dst: &[Point],
    threshold: f64,
    iterations: usize,
    seed: u64,
) -> Option<RansacFit> {
    let n = src.len();
    if n < 4 || n != dst.len() {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<RansacFit> = None;
    let mut best_count = 0;

    for _ in 0..iterations.max(1) {
        let sample = index::sample(&mut rng, n, 4);
        let (s, d): (Vec<Point>, Vec<Point>) =
            sample.iter().filter_map(|i| Some((*src.get(i)?, *dst.get(i)?))).unzip();
        let Some(candidate) = estimate(&s, &d) else {
            continue;
        };

        let inliers = classify_inliers(&candidate, src, dst, threshold);
        let count = inliers.iter().filter(|&&inlier| inlier).count();
        if count > best_count {
            best_count = count;
            best = Some(RansacFit {
                homography: candidate,
                inliers,
            });
            if count == n {
                break;
            }
        }
    }

    let best = best?;
    if best_count < 4 {
        return None;
    }

    let (s, d): (Vec<Point>, Vec<Point>) = src
        .iter()
        .zip(dst)
        .zip(&best.inliers)
        .filter(|(_, inlier)| **inlier)
        .map(|((&s, &d), _)| (s, d))
        .unzip();

    match estimate(&s, &d) {
        Some(refit) => {
            let inliers = classify_inliers(&refit, src, dst, threshold);
            if inliers.iter().filter(|&&i| i).count() >= best_count {
                Some(RansacFit {
                    homography: refit,
                    inliers,
                })
            } else {
                Some(best)
            }
        },
        None => Some(best),
    }
}

fn classify_inliers(h: &Matrix3<f64>, src: &[Point], dst: &[Point], threshold: f64) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(&s, &(u, v))| {
            project(h, s)
                .is_some_and(|(px, py)| ((px - u).powi(2) + (py - v).powi(2)).sqrt() < threshold)
        })
        .collect()
}
