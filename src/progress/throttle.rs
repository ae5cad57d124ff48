use std::time::{Duration, Instant};

pub const PROGRESS_THROTTLE_DELAY: Duration = Duration::from_millis(300);

/// Trailing-only throttle.
///
/// The first value after a quiet period opens a window; values pushed while
/// the window is open replace each other; when the window closes the latest
/// value is delivered. Nothing is ever delivered on the leading edge.
#[derive(Debug)]
pub struct TrailingThrottle<T> {
    window: Duration,
    latest: Option<T>,
    deadline: Option<Instant>,
}

impl<T> TrailingThrottle<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            latest: None,
            deadline: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.latest = Some(value);
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// Deliver the latest value if the window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.latest.take()
            }
            _ => None,
        }
    }

    /// Cancel the timer and hand back any undelivered value.
    pub fn flush(&mut self) -> Option<T> {
        self.deadline = None;
        self.latest.take()
    }

    /// Cancel the timer and drop any undelivered value.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.latest = None;
    }

    pub fn is_pending(&self) -> bool {
        self.latest.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
