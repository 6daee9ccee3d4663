/// Panel state machine
///
/// `PanelState::apply` is the only place state changes. It is pure: it never
/// touches the camera, the filesystem or the classifier, it only returns the
/// `Effect`s the controller must run. Every asynchronous completion carries
/// the epoch it was started in; `Reset` bumps the epoch so late completions
/// from before the reset are dropped instead of overwriting cleared state.
///
/// Phases (derived, not stored):
/// Idle -> CameraOpen -> Captured -> Loading -> Resulted, Reset -> Idle from anywhere.
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::data::{CaptureSession, ClassificationResult, ImageAsset};
use crate::capture::StreamHandle;
use crate::error::{PanelError, Result};

/// Inputs to the state machine: user actions and async completions
#[derive(Debug, Clone)]
pub enum Event {
    /// User pressed "Open Camera" (also retries a failed open)
    OpenCamera,
    /// Camera produced its first frame
    CameraReady { epoch: u64, stream: StreamHandle },
    /// Camera could not be opened
    CameraFailed { epoch: u64, error: PanelError },
    /// User pressed "Capture Image"
    Capture,
    /// File picker closed; None when cancelled
    UploadPicked(Option<PathBuf>),
    /// A captured frame was encoded or an upload was read
    ImageLoaded { epoch: u64, result: Result<ImageAsset> },
    /// Classifier finished
    ClassificationFinished {
        epoch: u64,
        result: Result<ClassificationResult>,
    },
    /// User pressed "Reset" or "Cancel"
    Reset,
}

impl Event {
    /// Short name for logs (the payloads can be large)
    pub fn name(&self) -> &'static str {
        match self {
            Event::OpenCamera => "OpenCamera",
            Event::CameraReady { .. } => "CameraReady",
            Event::CameraFailed { .. } => "CameraFailed",
            Event::Capture => "Capture",
            Event::UploadPicked(_) => "UploadPicked",
            Event::ImageLoaded { .. } => "ImageLoaded",
            Event::ClassificationFinished { .. } => "ClassificationFinished",
            Event::Reset => "Reset",
        }
    }
}

/// Work the controller must perform after a transition
#[derive(Debug)]
pub enum Effect {
    /// Ask the camera source for a stream
    RequestCamera { epoch: u64 },
    /// Attach a fresh stream to the panel
    BindStream(StreamHandle),
    /// Release a stream that arrived too late to be bound
    ReleaseStream(StreamHandle),
    /// Release the currently bound stream
    ReleaseCamera,
    /// Snapshot the bound stream's current frame
    Snapshot { epoch: u64 },
    /// Read an uploaded file
    ReadFile { epoch: u64, path: PathBuf },
    /// Run the classifier on an image
    Classify { epoch: u64, image: ImageAsset },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CameraOpen,
    /// Image present but neither loading nor resulted (classification failed)
    Captured,
    Loading,
    Resulted,
}

/// Everything the panel shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelState {
    session: Option<CaptureSession>,
    image: Option<ImageAsset>,
    result: Option<ClassificationResult>,
    loading: bool,
    /// An upload is being read
    reading: bool,
    /// Last error, shown inline
    error: Option<PanelError>,
    epoch: u64,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<CaptureSession> {
        self.session
    }

    pub fn image(&self) -> Option<&ImageAsset> {
        self.image.as_ref()
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        self.result.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_reading(&self) -> bool {
        self.reading
    }

    pub fn error(&self) -> Option<&PanelError> {
        self.error.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> Phase {
        match (&self.image, self.loading, &self.result, &self.session) {
            (Some(_), true, _, _) => Phase::Loading,
            (Some(_), false, Some(_), _) => Phase::Resulted,
            (Some(_), false, None, _) => Phase::Captured,
            (None, _, _, Some(_)) => Phase::CameraOpen,
            (None, _, _, None) => Phase::Idle,
        }
    }

    /// Capture or upload may start only when nothing else is in flight
    fn accepts_image(&self) -> bool {
        self.image.is_none() && !self.loading && !self.reading
    }

    /// Apply one event and return the effects to run
    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        debug!("{} in {:?} (epoch {})", event.name(), self.phase(), self.epoch());

        match event {
            Event::OpenCamera => {
                if !self.accepts_image() {
                    return Vec::new();
                }
                match self.session {
                    Some(CaptureSession { bound: true, .. })
                    | Some(CaptureSession { requesting: true, .. }) => Vec::new(),
                    _ => {
                        self.session = Some(CaptureSession {
                            bound: false,
                            requesting: true,
                        });
                        self.error = None;
                        vec![Effect::RequestCamera { epoch: self.epoch }]
                    }
                }
            }

            Event::CameraReady { epoch, stream } => match self.session.as_mut() {
                Some(session) if epoch == self.epoch && session.requesting => {
                    session.requesting = false;
                    session.bound = true;
                    vec![Effect::BindStream(stream)]
                }
                _ => {
                    info!("Discarding camera stream #{} that is no longer wanted", stream.id());
                    vec![Effect::ReleaseStream(stream)]
                }
            },

            Event::CameraFailed { epoch, error } => {
                match self.session.as_mut() {
                    Some(session) if epoch == self.epoch && session.requesting => {
                        warn!("Camera failed: {}", error);
                        // Stays opened-but-unbound; the user retries with "Open Camera"
                        session.requesting = false;
                        self.error = Some(error);
                    }
                    _ => debug!("Ignoring stale camera failure: {}", error),
                }
                Vec::new()
            }

            Event::Capture => {
                let bound = matches!(self.session, Some(CaptureSession { bound: true, .. }));
                if bound && self.accepts_image() {
                    vec![Effect::Snapshot { epoch: self.epoch }]
                } else {
                    Vec::new()
                }
            }

            Event::UploadPicked(None) => Vec::new(),

            Event::UploadPicked(Some(path)) => {
                if !self.accepts_image() {
                    debug!("Upload ignored, panel is busy");
                    return Vec::new();
                }
                self.reading = true;
                self.error = None;
                vec![Effect::ReadFile {
                    epoch: self.epoch,
                    path,
                }]
            }

            Event::ImageLoaded { epoch, result } => {
                if epoch != self.epoch || self.image.is_some() {
                    debug!("Ignoring stale image");
                    return Vec::new();
                }
                self.reading = false;

                match result {
                    Ok(image) => {
                        let mut effects = Vec::new();
                        // The image supersedes the capture session
                        if let Some(session) = self.session.take() {
                            if session.bound {
                                effects.push(Effect::ReleaseCamera);
                            }
                        }
                        self.image = Some(image.clone());
                        self.loading = true;
                        self.error = None;
                        effects.push(Effect::Classify {
                            epoch: self.epoch,
                            image,
                        });
                        effects
                    }
                    Err(error) => {
                        warn!("Image rejected: {}", error);
                        self.error = Some(error);
                        Vec::new()
                    }
                }
            }

            Event::ClassificationFinished { epoch, result } => {
                if epoch != self.epoch || !self.loading {
                    debug!("Dropping classification result from epoch {}", epoch);
                    return Vec::new();
                }
                self.loading = false;
                match result {
                    Ok(result) => self.result = Some(result),
                    Err(error) => {
                        warn!("Classification failed: {}", error);
                        self.error = Some(error);
                    }
                }
                Vec::new()
            }

            Event::Reset => {
                let release = matches!(self.session, Some(CaptureSession { bound: true, .. }));
                *self = PanelState {
                    epoch: self.epoch + 1,
                    ..PanelState::default()
                };
                if release {
                    vec![Effect::ReleaseCamera]
                } else {
                    Vec::new()
                }
            }
        }
    }
}
