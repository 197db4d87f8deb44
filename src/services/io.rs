//! Image file input/output
//!
//! Keeps decoding and encoding out of the pipeline stages so they only ever
//! see in-memory buffers.

use crate::{
    config::OutputFormat,
    error::{Result, TileVizError},
    services::OutputFormatHandler,
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, GrayImage, RgbImage};
use std::io::BufWriter;
use std::path::Path;

/// Loads photos and masks, saves rendered images
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image file
    ///
    /// The extension picks the decoder first; if that fails the content is
    /// sniffed instead.
    ///
    /// # Errors
    /// - `Io` when the file is missing or unreadable
    /// - `Decode` when neither decoder accepts the data
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Err(TileVizError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Trying content detection.",
                    path_ref.display(),
                    e
                );
                let data = std::fs::read(path_ref).map_err(|io_err| {
                    TileVizError::file_io_error("read image data", path_ref, &io_err)
                })?;
                Self::decode_bytes(&data).map_err(|_| TileVizError::image_load_error(path_ref, &e))
            },
        }
    }

    /// Decode an in-memory upload
    pub fn decode_bytes(data: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(data)
            .map_err(|e| TileVizError::decode(format!("Failed to decode image bytes: {e}")))
    }

    /// Load a photo as 8-bit RGB
    pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
        Ok(Self::load_image(path)?.to_rgb8())
    }

    /// Load a stored mask as 8-bit grayscale
    pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
        Ok(Self::load_image(path)?.to_luma8())
    }

    /// Save in `format`, creating parent directories as needed
    ///
    /// # Errors
    /// - Directory creation or file write failures
    /// - Encoder failures
    pub fn save_image<P: AsRef<Path>>(
        image: &DynamicImage,
        path: P,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TileVizError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }

        let result = match format {
            OutputFormat::Jpeg => {
                let file = std::fs::File::create(path_ref)
                    .map_err(|e| TileVizError::file_io_error("create output file", path_ref, &e))?;
                let encoder =
                    JpegEncoder::new_with_quality(BufWriter::new(file), jpeg_quality.clamp(1, 100));
                // JPEG has no alpha channel
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
            },
            other => image.save_with_format(path_ref, OutputFormatHandler::image_format(other)),
        };

        result.map_err(|e| {
            TileVizError::processing_stage_error(
                "image save",
                &format!(
                    "Failed to save {} as {}: {}",
                    path_ref.display(),
                    OutputFormatHandler::format_name(format),
                    e
                ),
                Some((image.width(), image.height())),
            )
        })
    }

    pub fn save_rgb<P: AsRef<Path>>(
        image: &RgbImage,
        path: P,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<()> {
        Self::save_image(&DynamicImage::ImageRgb8(image.clone()), path, format, jpeg_quality)
    }

    /// Masks are always written losslessly as PNG
    pub fn save_mask<P: AsRef<Path>>(mask: &GrayImage, path: P) -> Result<()> {
        Self::save_image(
            &DynamicImage::ImageLuma8(mask.clone()),
            path,
            OutputFormat::Png,
            100,
        )
    }
}
