//! Unique output file naming

use crate::{
    config::OutputFormat,
    error::Result,
    services::{ImageIOService, OutputFormatHandler},
};
use image::{GrayImage, RgbImage};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What an output file holds; decides its name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    WallMask,
    FloorMask,
    Processed,
    Painted,
    Lighting,
    Layout,
}

impl OutputKind {
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::WallMask => "wall_mask",
            Self::FloorMask => "floor_mask",
            Self::Processed => "processed",
            Self::Painted => "painted",
            Self::Lighting => "lighting",
            Self::Layout => "layout",
        }
    }
}

/// Writes pipeline outputs under one directory with collision-free names
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    format: OutputFormat,
    jpeg_quality: u8,
}

impl OutputWriter {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(dir: P, format: OutputFormat, jpeg_quality: u8) -> Self {
        Self {
            dir: dir.into(),
            format,
            jpeg_quality,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<prefix>_<32 hex digits>.<ext>`
    #[must_use]
    pub fn unique_path(&self, kind: OutputKind, extension: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.{}",
            kind.prefix(),
            Uuid::new_v4().simple(),
            extension
        ))
    }

    /// Save a rendered image in the configured format
    pub fn write_image(&self, kind: OutputKind, image: &RgbImage) -> Result<PathBuf> {
        let path = self.unique_path(kind, OutputFormatHandler::get_extension(self.format));
        ImageIOService::save_rgb(image, &path, self.format, self.jpeg_quality)?;
        tracing::debug!(path = %path.display(), "image written");
        Ok(path)
    }

    /// Masks are always PNG so they reload bit-exact
    pub fn write_mask(&self, kind: OutputKind, mask: &GrayImage) -> Result<PathBuf> {
        let path = self.unique_path(kind, "png");
        ImageIOService::save_mask(mask, &path)?;
        tracing::debug!(path = %path.display(), "mask written");
        Ok(path)
    }

    /// Best-effort removal of outputs whose operation failed later on
    pub fn discard<'a, I>(&self, paths: I)
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        for path in paths {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "discarded output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => log::warn!("Could not remove {}: {e}", path.display()),
            }
        }
    }
}
