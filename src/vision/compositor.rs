//! Texture tiling and paint fill over segmented surfaces

use crate::error::{Result, TileVizError};
use crate::types::{ColorSample, Rect, Surface, SurfaceRegion};
use image::{imageops, imageops::FilterType, GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};

/// Optional texture per surface
#[derive(Debug, Clone, Copy, Default)]
pub struct SurfaceTextures<'a> {
    pub wall: Option<&'a RgbImage>,
    pub floor: Option<&'a RgbImage>,
}

/// Fills mask regions with a repeating tile or a flat color
///
/// Texture fills cover each region's whole bounding box, including
/// pixels outside the region itself. Paint fills are exact per pixel.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceCompositor {
    tile_size: u32,
}

impl Default for SurfaceCompositor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl SurfaceCompositor {
    #[must_use]
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size: tile_size.max(1),
        }
    }

    #[must_use]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Bounding boxes of the outermost connected components, in contour order
    #[must_use]
    pub fn surface_regions(mask: &GrayImage, surface: Surface) -> Vec<SurfaceRegion> {
        find_contours::<u32>(mask)
            .into_iter()
            .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
            .filter_map(|contour| {
                let xs = contour.points.iter().map(|p| p.x);
                let ys = contour.points.iter().map(|p| p.y);
                let (min_x, max_x) = (xs.clone().min()?, xs.max()?);
                let (min_y, max_y) = (ys.clone().min()?, ys.max()?);
                Some(SurfaceRegion {
                    surface,
                    bounds: Rect {
                        x: min_x,
                        y: min_y,
                        width: max_x - min_x + 1,
                        height: max_y - min_y + 1,
                    },
                })
            })
            .collect()
    }

    /// Repeat `tile` from the top-left corner and crop to `width x height`
    #[must_use]
    pub fn tile_pattern(tile: &RgbImage, width: u32, height: u32) -> RgbImage {
        let (tile_w, tile_h) = tile.dimensions();
        RgbImage::from_fn(width, height, |x, y| *tile.get_pixel(x % tile_w, y % tile_h))
    }

    /// Resize a texture to the canonical square tile
    pub fn canonical_tile(&self, texture: &RgbImage) -> Result<RgbImage> {
        if texture.width() == 0 || texture.height() == 0 {
            return Err(TileVizError::invalid_input("Texture image is empty"));
        }
        if texture.dimensions() == (self.tile_size, self.tile_size) {
            return Ok(texture.clone());
        }
        Ok(imageops::resize(
            texture,
            self.tile_size,
            self.tile_size,
            FilterType::Triangle,
        ))
    }

    /// Overwrite every region's bounding box in `canvas` with the tiled texture
    pub fn fill_surface(
        &self,
        canvas: &mut RgbImage,
        mask: &GrayImage,
        texture: &RgbImage,
        surface: Surface,
    ) -> Result<Vec<SurfaceRegion>> {
        ensure_same_size(canvas, mask, surface)?;
        let tile = self.canonical_tile(texture)?;
        let regions = Self::surface_regions(mask, surface);

        for region in &regions {
            let Rect {
                x,
                y,
                width,
                height,
            } = region.bounds;
            let pattern = Self::tile_pattern(&tile, width, height);
            imageops::replace(canvas, &pattern, i64::from(x), i64::from(y));
        }

        tracing::debug!(%surface, regions = regions.len(), "filled surface");
        Ok(regions)
    }

    /// Tile walls first, then floors, onto a copy of `image`
    ///
    /// # Errors
    /// - A mask whose size differs from the image
    /// - An empty texture
    pub fn composite(
        &self,
        image: &RgbImage,
        wall_mask: &GrayImage,
        floor_mask: &GrayImage,
        textures: SurfaceTextures<'_>,
    ) -> Result<RgbImage> {
        let _span = tracing::debug_span!(
            "compositing",
            width = image.width(),
            height = image.height()
        )
        .entered();

        let mut canvas = image.clone();
        for (surface, mask, texture) in [
            (Surface::Wall, wall_mask, textures.wall),
            (Surface::Floor, floor_mask, textures.floor),
        ] {
            ensure_same_size(image, mask, surface)?;
            if let Some(texture) = texture {
                self.fill_surface(&mut canvas, mask, texture, surface)?;
            }
        }
        Ok(canvas)
    }

    /// Replace exactly the foreground pixels of `mask` with `color`
    pub fn paint(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
        color: &ColorSample,
    ) -> Result<RgbImage> {
        ensure_same_size(image, mask, Surface::Wall)?;
        let paint = Rgb(color.rgb);
        let mut out = image.clone();
        for (pixel, selector) in out.pixels_mut().zip(mask.pixels()) {
            if selector.0[0] != 0 {
                *pixel = paint;
            }
        }
        Ok(out)
    }
}

fn ensure_same_size(image: &RgbImage, mask: &GrayImage, surface: Surface) -> Result<()> {
    if image.dimensions() != mask.dimensions() {
        return Err(TileVizError::invalid_input(format!(
            "{surface} mask is {}x{} but the image is {}x{}",
            mask.width(),
            mask.height(),
            image.width(),
            image.height()
        )));
    }
    Ok(())
}
