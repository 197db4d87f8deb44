//! Catalog tile photo clean-up: crop to the tile, sharpen, and filter non-tiles

use crate::types::Rect;
use image::{imageops, GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::filter::filter3x3;
use imageproc::geometry::contour_area;

/// Smallest accepted side, in pixels
pub const MIN_TILE_SIDE: u32 = 200;
/// Mean Canny response per pixel below which a photo is not a tile
pub const MIN_EDGE_DENSITY: f64 = 0.02;

const SHARPEN: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Bounding box of the edge contour enclosing the largest area
#[must_use]
pub fn tile_bounds(image: &RgbImage) -> Option<Rect> {
    let edges = canny(&imageops::grayscale(image), 50.0, 200.0);
    find_contours::<i64>(&edges)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| (contour_area(&c.points).abs(), c.points))
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .and_then(|(_, points)| {
            let min_x = points.iter().map(|p| p.x).min()?;
            let max_x = points.iter().map(|p| p.x).max()?;
            let min_y = points.iter().map(|p| p.y).min()?;
            let max_y = points.iter().map(|p| p.y).max()?;
            Some(Rect {
                x: u32::try_from(min_x).ok()?,
                y: u32::try_from(min_y).ok()?,
                width: u32::try_from(max_x - min_x + 1).ok()?,
                height: u32::try_from(max_y - min_y + 1).ok()?,
            })
        })
}

/// Crop to [`tile_bounds`], or return the photo as is when no edges are found
#[must_use]
pub fn crop_to_tile(image: &RgbImage) -> RgbImage {
    match tile_bounds(image) {
        Some(r) => imageops::crop_imm(image, r.x, r.y, r.width, r.height).to_image(),
        None => image.clone(),
    }
}

/// 3x3 unsharp kernel, edges replicated, saturating into 0-255
#[must_use]
pub fn sharpen(image: &RgbImage) -> RgbImage {
    filter3x3::<_, f32, u8>(image, &SHARPEN)
}

/// Summed Canny(50, 150) response divided by the pixel count
#[must_use]
pub fn edge_density(gray: &GrayImage) -> f64 {
    let area = u64::from(gray.width()) * u64::from(gray.height());
    if area == 0 {
        return 0.0;
    }
    let edges = canny(gray, 50.0, 150.0);
    let sum: u64 = edges.pixels().map(|p| u64::from(p.0[0])).sum();
    sum as f64 / area as f64
}

/// Heuristic filter for scraped catalog photos
#[must_use]
pub fn is_tile_image(image: &RgbImage) -> bool {
    let (width, height) = image.dimensions();
    if width < MIN_TILE_SIDE || height < MIN_TILE_SIDE {
        tracing::debug!(width, height, "rejected: too small");
        return false;
    }
    let density = edge_density(&imageops::grayscale(image));
    if density < MIN_EDGE_DENSITY {
        tracing::debug!(density, "rejected: too few edges");
        return false;
    }
    true
}

/// Crop then sharpen
#[must_use]
pub fn prepare_tile(image: &RgbImage) -> RgbImage {
    sharpen(&crop_to_tile(image))
}
