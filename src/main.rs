use iced::widget::image::Handle;
use iced::{Element, Subscription, Task, Theme};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod capture;
mod classify;
mod config;
mod controller;
mod error;
mod ingest;
mod state;
mod ui;

use config::Config;
use controller::LeafPanel;
use state::Event;

/// Live preview refresh interval (~15 fps)
const PREVIEW_INTERVAL: Duration = Duration::from_millis(66);

/// Main application state
struct LeafScan {
    /// State machine plus camera/file/classifier capabilities
    panel: LeafPanel,
    /// Latest camera frame as a texture
    live: Option<Handle>,
    /// Captured or uploaded image, decoded once for display
    asset: Option<Handle>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// Anything the panel state machine handles
    Panel(Event),
    /// User clicked "Upload Image": show the picker first
    UploadImage,
    /// Time to refresh the live preview
    PreviewTick,
}

impl LeafScan {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = Config::from_env();
        info!("🍁 Leaf Scan starting");
        info!("  Camera: {} ({})", config.camera.device, config.camera.input_format);
        info!("  Stub delay: {:?}", config.stub_delay);

        (
            LeafScan {
                panel: LeafPanel::from_config(&config),
                live: None,
                asset: None,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Panel(event) => self.dispatch(event),
            Message::UploadImage => {
                // Show the native file picker; cancelling is a no-op
                let path = ingest::pick_image();
                self.dispatch(Event::UploadPicked(path))
            }
            Message::PreviewTick => {
                self.live = self
                    .panel
                    .live_frame()
                    .map(|frame| Handle::from_rgba(frame.width, frame.height, frame.rgba));
                Task::none()
            }
        }
    }

    /// Run an event through the panel and turn its jobs into tasks
    fn dispatch(&mut self, event: Event) -> Task<Message> {
        let jobs = self.panel.dispatch(event);
        self.sync_pictures();
        Task::batch(
            jobs.into_iter()
                .map(|job| Task::perform(job, Message::Panel)),
        )
    }

    /// Keep the cached textures in step with the panel state
    fn sync_pictures(&mut self) {
        if !self.panel.has_live_stream() {
            self.live = None;
        }

        match self.panel.state().image() {
            None => self.asset = None,
            Some(image) if self.asset.is_none() => match image.decode() {
                Ok(bytes) => self.asset = Some(Handle::from_bytes(bytes)),
                Err(e) => warn!("Could not decode image for display: {}", e),
            },
            Some(_) => {}
        }
    }

    /// Poll the camera only while a stream is bound
    fn subscription(&self) -> Subscription<Message> {
        if self.panel.has_live_stream() {
            iced::time::every(PREVIEW_INTERVAL).map(|_| Message::PreviewTick)
        } else {
            Subscription::none()
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        ui::panel::view(
            self.panel.state(),
            ui::panel::Pictures {
                live: self.live.as_ref(),
                asset: self.asset.as_ref(),
            },
        )
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("leaf_scan=info")),
        )
        .init();

    iced::application("Leaf Scan", LeafScan::update, LeafScan::view)
        .subscription(LeafScan::subscription)
        .theme(LeafScan::theme)
        .centered()
        .run_with(LeafScan::new)
}
