/// Leaf and disease detection panel view
use iced::widget::image::Handle;
use iced::widget::{button, column, container, row, text, Column, Image};
use iced::{Alignment, Color, Element, Length};

use crate::state::data::CaptureSession;
use crate::state::{Event, PanelState, Phase};
use crate::Message;

const ERROR_COLOR: Color = Color {
    r: 0.95,
    g: 0.35,
    b: 0.35,
    a: 1.0,
};

/// Images the view needs but the state doesn't hold in displayable form
pub struct Pictures<'a> {
    /// Latest camera frame
    pub live: Option<&'a Handle>,
    /// Decoded captured/uploaded image
    pub asset: Option<&'a Handle>,
}

pub fn view<'a>(state: &'a PanelState, pictures: Pictures<'a>) -> Element<'a, Message> {
    let body: Element<'a, Message> = match state.phase() {
        Phase::Idle => idle_controls(state),
        Phase::CameraOpen => camera_view(state, pictures.live),
        Phase::Captured | Phase::Loading | Phase::Resulted => result_view(state, pictures.asset),
    };

    let mut content: Column<'a, Message> = column![text("Leaf and Disease Detection").size(32), body]
        .spacing(16)
        .padding(10)
        .max_width(700)
        .align_x(Alignment::Center);

    if let Some(error) = state.error() {
        content = content.push(text(error.to_string()).color(ERROR_COLOR));
    }

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .into()
}

fn action(label: &str, message: Option<Message>) -> button::Button<'_, Message> {
    button(text(label)).padding([5, 10]).on_press_maybe(message)
}

fn idle_controls(state: &PanelState) -> Element<'_, Message> {
    let label = if state.is_reading() {
        "Reading image..."
    } else {
        "Upload Image"
    };

    row![
        action("Open Camera", Some(Message::Panel(Event::OpenCamera))),
        action(label, (!state.is_reading()).then_some(Message::UploadImage)),
    ]
    .spacing(10)
    .into()
}

fn camera_view<'a>(state: &'a PanelState, live: Option<&'a Handle>) -> Element<'a, Message> {
    let session = state.session().unwrap_or_default();

    let preview: Element<'a, Message> = match (live, session) {
        (Some(handle), CaptureSession { bound: true, .. }) => Image::<Handle>::new(handle.clone())
            .width(Length::Fill)
            .height(Length::Fixed(400.0))
            .into(),
        (_, CaptureSession { requesting: true, .. }) => text("Starting camera...").into(),
        (_, CaptureSession { bound: true, .. }) => text("Waiting for the first frame...").into(),
        _ => text("Camera unavailable").into(),
    };

    let retry = (!session.bound && !session.requesting)
        .then(|| action("Open Camera", Some(Message::Panel(Event::OpenCamera))));

    let mut controls = row![action(
        "Capture Image",
        session.bound.then_some(Message::Panel(Event::Capture)),
    )]
    .spacing(10);
    if let Some(retry) = retry {
        controls = controls.push(retry);
    }
    controls = controls.push(action("Cancel", Some(Message::Panel(Event::Reset))));

    column![preview, controls]
        .spacing(10)
        .align_x(Alignment::Center)
        .into()
}

fn result_view<'a>(state: &'a PanelState, asset: Option<&'a Handle>) -> Element<'a, Message> {
    let mut picture = Column::new().spacing(6).width(Length::FillPortion(1));
    if let Some(handle) = asset {
        picture = picture.push(Image::<Handle>::new(handle.clone()).width(Length::Fill));
    }
    if let Some(image) = state.image() {
        picture = picture.push(text(image.caption()).size(12));
    }

    let mut details = Column::new().spacing(10).width(Length::FillPortion(1));
    if state.is_loading() {
        details = details.push(text("Processing image..."));
    } else if let Some(result) = state.result() {
        details = details
            .push(column![text("Leaf Type:").size(20), text(&result.label)].spacing(4))
            .push(
                column![
                    text("Disease Detection Result:").size(20),
                    text(&result.disease_name),
                    text(format!("Confidence: {}%", result.confidence_percent())),
                ]
                .spacing(4),
            );
    }
    details = details.push(action("Reset", Some(Message::Panel(Event::Reset))));

    row![picture, details]
        .spacing(20)
        .align_y(Alignment::Start)
        .into()
}
