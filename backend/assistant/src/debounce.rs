use std::time::{Duration, Instant};

/// Deadline timer for catalog rebuilds.
///
/// Registry listeners only arm it; the tick loop checks and fires, so a burst
/// of registrations collapses into one rebuild and nothing rebuilds from
/// inside a notification.
#[derive(Debug, Clone)]
pub struct RebuildDebounce {
    delay: Duration,
    due: Option<Instant>,
}

impl RebuildDebounce {
    pub fn new(delay: Duration) -> Self {
        Self { delay, due: None }
    }

    /// Arm, or push an armed deadline out to `now + delay`.
    pub fn arm(&mut self, now: Instant) {
        self.due = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    /// Returns `true` once per arming, when the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}
