//! Rate limiting for recompute/render passes.
//!
//! Continuous scrolling produces far more viewport events than there is any
//! use in rendering. The service asks a [`RenderPacing`] policy when the next
//! pass may run and coalesces everything that arrives in between.

use tokio::time::{Duration, Instant};

/// Policy deciding when the next recompute/render pass may run
pub trait RenderPacing: Send {
    /// Earliest instant for the next pass; `None` means immediately
    fn ready_at(&self) -> Option<Instant>;

    /// Record that a pass ran at `at`
    fn record(&mut self, at: Instant);

    fn is_ready(&self, now: Instant) -> bool {
        self.ready_at().map_or(true, |at| now >= at)
    }
}

/// Enforce a minimum interval between passes
#[derive(Debug, Clone)]
pub struct MinInterval {
    interval: Duration,
    last: Option<Instant>,
}

impl MinInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// No pacing at all
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl RenderPacing for MinInterval {
    fn ready_at(&self) -> Option<Instant> {
        if self.interval.is_zero() {
            return None;
        }
        self.last.map(|last| last + self.interval)
    }

    fn record(&mut self, at: Instant) {
        self.last = Some(at);
    }
}
