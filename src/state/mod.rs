/// State management module
///
/// This module handles all panel state:
/// - Entities shown by the panel (data.rs)
/// - The event -> effect state machine (panel.rs)

pub mod data;
pub mod panel;

pub use panel::{Effect, Event, PanelState, Phase};
