//! Error types for surface visualization operations

use thiserror::Error;

/// Result type alias for visualization operations
pub type Result<T> = std::result::Result<T, TileVizError>;

/// Error taxonomy for the compositing pipeline
///
/// Alignment without enough matches and catalog items without a color are
/// not represented here: both are silent fallbacks.
#[derive(Error, Debug)]
pub enum TileVizError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input image unreadable or corrupt
    #[error("Decode error: {0}")]
    Decode(String),

    /// Model produced no usable output
    #[error("Inference error: {0}")]
    Inference(String),

    /// Referenced segmentation or catalog record is absent
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller-supplied input that cannot be processed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed hex color
    #[error("Invalid color '{0}': expected #RRGGBB")]
    InvalidColor(String),

    /// Unsupported file format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Model loading or metadata errors
    #[error("Model error: {0}")]
    Model(String),

    /// Stage failures not covered above
    #[error("Processing error: {0}")]
    Processing(String),

    /// Broken internal invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TileVizError {
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    pub fn not_found<S: Into<String>>(kind: &'static str, id: S) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_color<S: Into<String>>(value: S) -> Self {
        Self::InvalidColor(value.into())
    }

    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create image decode error carrying the offending path
    pub fn image_load_error<P: AsRef<std::path::Path>>(path: P, error: &image::ImageError) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");
        Self::Decode(format!(
            "Failed to decode '{}' (format: {}): {}",
            path.as_ref().display(),
            extension,
            error
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {rec}"),
            None => String::new(),
        };
        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range}).{recommendation}"
        ))
    }

    /// Create processing error naming the failed stage
    pub fn processing_stage_error(
        stage: &str,
        details: &str,
        dimensions: Option<(u32, u32)>,
    ) -> Self {
        let dims = dimensions
            .map(|(w, h)| format!(" (image: {w}x{h})"))
            .unwrap_or_default();
        Self::Processing(format!("{stage} failed{dims}: {details}"))
    }

    /// Whether the error maps to a not-found outcome for the caller
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
