//! Kernel busy indicator.
//!
//! Status changes are coalesced: the indicator follows the last status
//! reported once the kernel has been quiet for the window, so short
//! busy/idle flickers never reach the page.

use std::time::{Duration, Instant};

use nbdash_engine::debounce::Debouncer;
use nbdash_protocol::KernelStatus;

pub const DEFAULT_BUSY_DEBOUNCE: Duration = Duration::from_millis(500);

/// Class toggled on the indicator element.
pub const SHOW_CLASS: &str = "show";
/// Class toggled on the progress bar; it animates only while present.
pub const ACTIVE_CLASS: &str = "active";

#[derive(Debug, Clone)]
pub struct BusyIndicator {
    pending: Debouncer<(), KernelStatus>,
    shown: bool,
}

impl Default for BusyIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_BUSY_DEBOUNCE)
    }
}

impl BusyIndicator {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Debouncer::new(window),
            shown: false,
        }
    }

    pub fn status_changed(&mut self, status: KernelStatus, now: Instant) {
        self.pending.schedule((), status, now);
    }

    /// Apply the settled status. Returns the new visibility when the
    /// window elapsed, `None` while still waiting.
    pub fn tick(&mut self, now: Instant) -> Option<bool> {
        let (_, status) = self.pending.take_due(now).pop()?;
        self.shown = status.is_busy();
        log::debug!("kernel {}; busy indicator {}", status.as_str(), if self.shown { "shown" } else { "hidden" });
        Some(self.shown)
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn progress_active(&self) -> bool {
        self.shown
    }

    /// Classes to toggle: `(class, enabled)` for the indicator and its bar.
    pub fn classes(&self) -> [(&'static str, bool); 2] {
        [(SHOW_CLASS, self.shown), (ACTIVE_CLASS, self.progress_active())]
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }
}
