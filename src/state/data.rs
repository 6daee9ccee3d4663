/// Shared data structures for the panel state
///
/// These structs represent the data model that flows between
/// the capture/ingest layers, the classifier, and the UI layer.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Local};

use crate::error::{PanelError, Result};

/// The camera has been opened by the user
///
/// `bound` becomes true once a live stream is attached. A failed open leaves
/// the session opened-but-unbound until the user retries or resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureSession {
    /// A stream is attached and producing frames
    pub bound: bool,
    /// A camera request is in flight
    pub requesting: bool,
}

/// Where an image came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Camera,
    Upload { file_name: String },
}

/// An encoded image, either a captured frame or an uploaded file
///
/// Stored as a data URI (`data:<mime>;base64,<payload>`). Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    data_uri: String,
    source: ImageSource,
    created_at: DateTime<Local>,
}

impl ImageAsset {
    /// Wrap already-encoded bytes into a data URI
    pub fn from_bytes(mime: &str, bytes: &[u8], source: ImageSource) -> Self {
        Self {
            data_uri: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
            source,
            created_at: Local::now(),
        }
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// MIME type from the data URI header
    pub fn mime(&self) -> &str {
        self.data_uri
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or_default()
    }

    /// Decode the base64 payload back to the encoded image bytes
    pub fn decode(&self) -> Result<Vec<u8>> {
        let payload = self
            .data_uri
            .split_once(";base64,")
            .map(|(_, payload)| payload)
            .ok_or_else(|| PanelError::Encode("data URI has no base64 payload".to_string()))?;

        STANDARD
            .decode(payload)
            .map_err(|e| PanelError::Encode(e.to_string()))
    }

    /// Short caption for the UI ("Uploaded leaf.jpg", "Captured at 12:03:44")
    pub fn caption(&self) -> String {
        match &self.source {
            ImageSource::Camera => format!("Captured at {}", self.created_at.format("%H:%M:%S")),
            ImageSource::Upload { file_name } => format!("Uploaded {}", file_name),
        }
    }
}

/// Output of the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    /// Leaf type (e.g., "Maple Leaf")
    pub label: String,
    /// Detected disease, or a "no disease" message
    pub disease_name: String,
    /// Confidence in percent, always within 0..=100
    confidence_percent: u8,
}

impl ClassificationResult {
    /// Build a result, rejecting confidences above 100%
    pub fn new(
        label: impl Into<String>,
        disease_name: impl Into<String>,
        confidence_percent: u32,
    ) -> Result<Self> {
        if confidence_percent > 100 {
            return Err(PanelError::InvalidConfidence(confidence_percent));
        }

        Ok(Self {
            label: label.into(),
            disease_name: disease_name.into(),
            confidence_percent: confidence_percent as u8,
        })
    }

    pub fn confidence_percent(&self) -> u8 {
        self.confidence_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_shape() {
        let asset = ImageAsset::from_bytes("image/png", &[1, 2, 3], ImageSource::Camera);
        assert_eq!(asset.data_uri(), "data:image/png;base64,AQID");
        assert_eq!(asset.mime(), "image/png");
        assert_eq!(asset.decode().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_caption() {
        let asset = ImageAsset::from_bytes(
            "image/jpeg",
            &[0xFF],
            ImageSource::Upload { file_name: "leaf.jpg".to_string() },
        );
        assert_eq!(asset.caption(), "Uploaded leaf.jpg");

        let captured = ImageAsset::from_bytes("image/png", &[0], ImageSource::Camera);
        assert!(captured.caption().starts_with("Captured at "));
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(ClassificationResult::new("Maple Leaf", "None", 0).is_ok());
        assert_eq!(
            ClassificationResult::new("Maple Leaf", "None", 100)
                .unwrap()
                .confidence_percent(),
            100
        );
        assert_eq!(
            ClassificationResult::new("Maple Leaf", "None", 101),
            Err(PanelError::InvalidConfidence(101))
        );
    }
}
