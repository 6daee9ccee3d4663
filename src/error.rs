/// Errors surfaced by the detection panel
///
/// Every variant is recoverable: the user either retries the action or
/// resets the panel. Variants carry owned strings so they can travel inside
/// UI messages, which must be `Clone`.
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PanelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    /// Camera could not be opened (permission denied, no device, ffmpeg missing)
    #[error("Could not access the camera: {0}")]
    CameraAccess(String),

    /// Uploaded file could not be read
    #[error("Could not read {path}: {reason}")]
    FileRead { path: String, reason: String },

    /// Uploaded file is not a recognised image
    #[error("{0} is not an image")]
    NotAnImage(String),

    /// Capture was requested before the camera produced a frame
    #[error("The camera has not produced a frame yet")]
    SurfaceNotReady,

    /// Raster surface could not be encoded
    #[error("Could not encode the captured frame: {0}")]
    Encode(String),

    /// Classifier failed
    #[error("Classification failed: {0}")]
    Classification(String),

    /// Classifier produced a confidence outside 0..=100
    #[error("Confidence {0} is outside 0-100")]
    InvalidConfidence(u32),
}

impl From<image::ImageError> for PanelError {
    fn from(err: image::ImageError) -> Self {
        PanelError::Encode(err.to_string())
    }
}
