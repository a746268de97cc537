mod fetch;
mod pacing;
mod service;

pub use fetch::{BlockState, FetchScheduler, MAX_IN_FLIGHT};
pub use pacing::{MinInterval, RenderPacing};
pub use service::{TableCommand, TableEvent, TableHandle, TableService};
