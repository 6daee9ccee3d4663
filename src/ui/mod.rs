/// User interface module
///
/// Widgets only: every decision about what is shown comes from `PanelState`.

pub mod panel;
