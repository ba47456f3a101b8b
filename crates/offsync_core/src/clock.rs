//! Monotonic local clock for event timestamps.

use chrono::Utc;

/// Millisecond clock that never goes backwards on this device.
///
/// Each tick returns `max(wall_ms, last + 1)`, so events enqueued within
/// the same millisecond, or after the wall clock steps back, still get
/// strictly increasing timestamps. The last value is restored from the
/// log on open.
#[derive(Debug, Clone, Default)]
pub struct LocalClock {
    last: u64,
}

impl LocalClock {
    /// Creates a clock starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next timestamp.
    pub fn tick(&mut self) -> u64 {
        let wall = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        self.last = wall.max(self.last.saturating_add(1));
        self.last
    }

    /// Advances the clock past a timestamp seen in the log.
    pub fn observe(&mut self, timestamp: u64) {
        self.last = self.last.max(timestamp);
    }

    /// Last timestamp handed out or observed.
    #[must_use]
    pub fn last(&self) -> u64 {
        self.last
    }
}
