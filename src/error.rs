//! Error types for QR canvas rendering.

use thiserror::Error;

/// Result type alias for rendering operations.
pub type Result<T> = std::result::Result<T, QrError>;

/// Everything that can abort a render.
///
/// A failed render never hands out a partially drawn scene. The error is
/// `Clone` because the outcome of a render is cached and shared by every
/// caller awaiting it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QrError {
    /// Invalid or missing option values.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The module grid does not fit on the canvas at one pixel per module.
    #[error("The canvas is too small: {count} modules do not fit into {width}x{height}px")]
    Capacity { count: usize, width: f64, height: f64 },

    /// The data cannot be represented at the requested version / level / mode.
    #[error("QR encoding error: {0}")]
    Encoding(String),

    /// The logo image could not be read or decoded.
    #[error("Image asset error: {0}")]
    Asset(String),

    /// The finished scene could not be encoded to the requested format.
    #[error("Export error: {0}")]
    Export(String),
}

impl From<::qrcode::types::QrError> for QrError {
    fn from(err: ::qrcode::types::QrError) -> Self {
        QrError::Encoding(err.to_string())
    }
}

impl From<image::ImageError> for QrError {
    fn from(err: image::ImageError) -> Self {
        QrError::Asset(err.to_string())
    }
}

impl From<serde_json::Error> for QrError {
    fn from(err: serde_json::Error) -> Self {
        QrError::Configuration(err.to_string())
    }
}
