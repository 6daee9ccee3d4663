/// Leaf classification
///
/// `Classifier` is the seam where a real inference backend plugs in: it takes
/// an encoded image and asynchronously produces a label, disease and
/// confidence. `StubClassifier` is the placeholder used until that backend
/// exists; it waits a fixed delay and returns the same answer for every input.
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DEFAULT_STUB_DELAY;
use crate::error::Result;
use crate::state::data::{ClassificationResult, ImageAsset};

pub const STUB_LABEL: &str = "Maple Leaf";
pub const STUB_DISEASE: &str = "No Disease Detected";
pub const STUB_CONFIDENCE: u32 = 95;

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: ImageAsset) -> Result<ClassificationResult>;
}

/// Fake classifier with a fixed latency
#[derive(Debug, Clone, Copy)]
pub struct StubClassifier {
    delay: Duration,
}

impl StubClassifier {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_STUB_DELAY)
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, image: ImageAsset) -> Result<ClassificationResult> {
        debug!(
            "Stub classifying {} image ({} chars), waiting {:?}",
            image.mime(),
            image.data_uri().len(),
            self.delay
        );

        tokio::time::sleep(self.delay).await;

        let result = ClassificationResult::new(STUB_LABEL, STUB_DISEASE, STUB_CONFIDENCE)?;
        info!(
            "🍁 Classified as {} / {} ({}%)",
            result.label,
            result.disease_name,
            result.confidence_percent()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::ImageSource;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_stub_waits_then_answers_constant() {
        let classifier = StubClassifier::default();
        let started = Instant::now();

        let result = classifier
            .classify(ImageAsset::from_bytes("image/png", &[1], ImageSource::Camera))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert_eq!(result.label, "Maple Leaf");
        assert_eq!(result.disease_name, "No Disease Detected");
        assert_eq!(result.confidence_percent(), 95);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stub_ignores_input() {
        let classifier = StubClassifier::new(Duration::from_millis(10));
        let a = classifier
            .classify(ImageAsset::from_bytes("image/png", &[1, 2], ImageSource::Camera))
            .await
            .unwrap();
        let b = classifier
            .classify(ImageAsset::from_bytes(
                "image/jpeg",
                &[9; 64],
                ImageSource::Upload { file_name: "x.jpg".to_string() },
            ))
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}
