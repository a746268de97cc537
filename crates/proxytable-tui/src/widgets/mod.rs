mod grid;
mod status_bar;

pub use grid::GridWidget;
pub use status_bar::StatusBarWidget;
