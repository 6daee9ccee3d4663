/// Panel controller
///
/// Owns the `PanelState`, the platform capabilities and the bound camera
/// stream. `dispatch` feeds an event through the state machine and carries
/// out the resulting effects: quick ones inline, slow ones (camera startup,
/// file reads, classification) returned as `Job`s. Each job resolves to the
/// next `Event`, which the caller dispatches again.
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

use crate::capture::{
    CameraSource, FfmpegCamera, Frame, FrameCapture, PngDataUriEncoder, RasterSurface,
    StreamHandle,
};
use crate::classify::{Classifier, StubClassifier};
use crate::config::Config;
use crate::ingest::{self, FileReader, TokioFileReader};
use crate::state::{Effect, Event, PanelState};

/// Pending asynchronous work
pub type Job = Pin<Box<dyn Future<Output = Event> + Send + 'static>>;

pub struct LeafPanel {
    state: PanelState,
    camera: Arc<dyn CameraSource>,
    capture: FrameCapture,
    reader: Arc<dyn FileReader>,
    classifier: Arc<dyn Classifier>,
    /// Stream currently attached to the preview
    stream: Option<StreamHandle>,
}

impl LeafPanel {
    pub fn new(
        camera: Arc<dyn CameraSource>,
        capture: FrameCapture,
        reader: Arc<dyn FileReader>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            state: PanelState::new(),
            camera,
            capture,
            reader,
            classifier,
            stream: None,
        }
    }

    /// Production wiring: ffmpeg camera, PNG encoder, tokio reader, stub classifier
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(FfmpegCamera::new(config.camera.clone())),
            FrameCapture::new(
                RasterSurface::new(config.raster_width, config.raster_height),
                Arc::new(PngDataUriEncoder),
            ),
            Arc::new(TokioFileReader),
            Arc::new(StubClassifier::new(config.stub_delay)),
        )
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn has_live_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Latest frame of the bound stream, for the live preview
    pub fn live_frame(&self) -> Option<Frame> {
        self.stream.as_ref().and_then(StreamHandle::latest_frame)
    }

    /// Apply an event and run its effects
    pub fn dispatch(&mut self, event: Event) -> Vec<Job> {
        let mut jobs: Vec<Job> = Vec::new();
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            for effect in self.state.apply(event) {
                match effect {
                    Effect::RequestCamera { epoch } => {
                        let camera = self.camera.clone();
                        jobs.push(Box::pin(async move {
                            match camera.open().await {
                                Ok(stream) => Event::CameraReady {
                                    epoch,
                                    stream: StreamHandle::new(stream),
                                },
                                Err(error) => Event::CameraFailed { epoch, error },
                            }
                        }));
                    }
                    Effect::BindStream(stream) => {
                        info!("📷 Camera stream #{} bound", stream.id());
                        if let Some(previous) = self.stream.replace(stream) {
                            previous.release();
                        }
                    }
                    Effect::ReleaseStream(stream) => stream.release(),
                    Effect::ReleaseCamera => {
                        if let Some(stream) = self.stream.take() {
                            stream.release();
                        }
                    }
                    Effect::Snapshot { epoch } => {
                        let frame = self.live_frame();
                        let result = self.capture.capture(frame.as_ref());
                        queue.push_back(Event::ImageLoaded { epoch, result });
                    }
                    Effect::ReadFile { epoch, path } => {
                        let reader = self.reader.clone();
                        jobs.push(Box::pin(async move {
                            let result = ingest::load_upload(reader.as_ref(), &path).await;
                            Event::ImageLoaded { epoch, result }
                        }));
                    }
                    Effect::Classify { epoch, image } => {
                        let classifier = self.classifier.clone();
                        jobs.push(Box::pin(async move {
                            let result = classifier.classify(image).await;
                            Event::ClassificationFinished { epoch, result }
                        }));
                    }
                }
            }
        }

        jobs
    }
}

impl Drop for LeafPanel {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::{solid_frame, FakeCamera};
    use crate::error::PanelError;
    use crate::state::data::ImageSource;
    use crate::state::Phase;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Serves fixed bytes for any path
    struct MemoryReader(Vec<u8>);

    #[async_trait::async_trait]
    impl FileReader for MemoryReader {
        async fn read(&self, _path: &Path) -> crate::error::Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    fn jpeg() -> Vec<u8> {
        let mut out = Vec::new();
        RgbImage::from_pixel(16, 16, image::Rgb([20, 140, 30]))
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    fn panel(camera: Arc<FakeCamera>, file: Vec<u8>) -> LeafPanel {
        LeafPanel::new(
            camera,
            FrameCapture::new(RasterSurface::new(320, 240), Arc::new(PngDataUriEncoder)),
            Arc::new(MemoryReader(file)),
            Arc::new(StubClassifier::default()),
        )
    }

    /// Dispatch an event and run every job it spawns to completion
    async fn drive(panel: &mut LeafPanel, event: Event) {
        let mut pending = panel.dispatch(event);
        while let Some(job) = pending.pop() {
            let next = job.await;
            pending.extend(panel.dispatch(next));
        }
    }

    fn assert_stub_result(panel: &LeafPanel) {
        assert_eq!(panel.state().phase(), Phase::Resulted);
        let result = panel.state().result().unwrap();
        assert_eq!(result.label, "Maple Leaf");
        assert_eq!(result.disease_name, "No Disease Detected");
        assert_eq!(result.confidence_percent(), 95);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_capture_classify() {
        let camera = Arc::new(FakeCamera::with_frame(Some(solid_frame(64, 48))));
        let mut panel = panel(camera.clone(), Vec::new());

        drive(&mut panel, Event::OpenCamera).await;
        assert_eq!(panel.state().phase(), Phase::CameraOpen);
        assert!(panel.has_live_stream());
        assert!(panel.live_frame().is_some());

        let started = Instant::now();
        drive(&mut panel, Event::Capture).await;

        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert_stub_result(&panel);
        assert!(panel.state().image().unwrap().data_uri().starts_with("data:image/png;base64,"));
        // Capturing supersedes the camera session and frees the device
        assert!(!panel.has_live_stream());
        assert_eq!(camera.stops.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_gives_same_result_shape() {
        let camera = Arc::new(FakeCamera::with_frame(None));
        let mut panel = panel(camera.clone(), jpeg());

        drive(&mut panel, Event::UploadPicked(Some(PathBuf::from("leaf.jpg")))).await;

        assert_stub_result(&panel);
        let image = panel.state().image().unwrap();
        assert_eq!(image.mime(), "image/jpeg");
        assert_eq!(
            image.source(),
            &ImageSource::Upload { file_name: "leaf.jpg".to_string() }
        );
        assert_eq!(camera.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_image_upload_changes_nothing() {
        let camera = Arc::new(FakeCamera::with_frame(None));
        let mut panel = panel(camera, b"plain text, not pixels".to_vec());

        drive(&mut panel, Event::UploadPicked(Some(PathBuf::from("notes.txt")))).await;

        assert_eq!(panel.state().phase(), Phase::Idle);
        assert!(panel.state().image().is_none());
        assert!(matches!(panel.state().error(), Some(PanelError::NotAnImage(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_before_first_frame_surfaces_error() {
        let camera = Arc::new(FakeCamera::with_frame(None));
        let mut panel = panel(camera, Vec::new());

        drive(&mut panel, Event::OpenCamera).await;
        drive(&mut panel, Event::Capture).await;

        assert_eq!(panel.state().phase(), Phase::CameraOpen);
        assert!(panel.state().image().is_none());
        assert_eq!(panel.state().error(), Some(&PanelError::SurfaceNotReady));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_camera_then_retry() {
        let camera = Arc::new(FakeCamera::with_frame(Some(solid_frame(8, 8))));
        camera.deny.store(true, Ordering::SeqCst);
        let mut panel = panel(camera.clone(), Vec::new());

        drive(&mut panel, Event::OpenCamera).await;
        assert!(matches!(panel.state().error(), Some(PanelError::CameraAccess(_))));
        assert!(!panel.has_live_stream());

        camera.deny.store(false, Ordering::SeqCst);
        drive(&mut panel, Event::OpenCamera).await;
        assert!(panel.has_live_stream());
        assert_eq!(camera.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_releases_camera_exactly_once() {
        let camera = Arc::new(FakeCamera::with_frame(Some(solid_frame(8, 8))));
        let mut panel = panel(camera.clone(), Vec::new());

        drive(&mut panel, Event::OpenCamera).await;
        drive(&mut panel, Event::Reset).await;
        drive(&mut panel, Event::Reset).await;
        drop(panel);

        assert_eq!(camera.stops.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_loading_drops_late_result() {
        let camera = Arc::new(FakeCamera::with_frame(None));
        let mut panel = panel(camera, jpeg());

        // Read the file, leaving the classification job pending
        let read = panel.dispatch(Event::UploadPicked(Some(PathBuf::from("leaf.jpg"))));
        let mut classify = Vec::new();
        for job in read {
            classify.extend(panel.dispatch(job.await));
        }
        assert_eq!(panel.state().phase(), Phase::Loading);
        assert_eq!(classify.len(), 1);

        panel.dispatch(Event::Reset);

        for job in classify {
            let late = job.await;
            assert!(panel.dispatch(late).is_empty());
        }
        assert_eq!(panel.state().phase(), Phase::Idle);
        assert!(panel.state().result().is_none());
        assert!(!panel.state().is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_arriving_after_reset_is_released() {
        let camera = Arc::new(FakeCamera::with_frame(Some(solid_frame(8, 8))));
        let mut panel = panel(camera.clone(), Vec::new());

        let request = panel.dispatch(Event::OpenCamera);
        panel.dispatch(Event::Reset);
        for job in request {
            let ready = job.await;
            panel.dispatch(ready);
        }

        assert!(!panel.has_live_stream());
        assert_eq!(camera.stops.count(), 1);
    }
}
