use log::{debug, info};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::record::{EntityKey, ProgressRecord, SequenceProgress, TextProgress};
use super::throttle::{PROGRESS_THROTTLE_DELAY, TrailingThrottle};
use crate::book::TextContent;
use crate::clock::SharedClock;

/// Receives progress records once the throttle lets them through.
pub trait ProgressSink {
    fn deliver(&mut self, key: &EntityKey, record: ProgressRecord);
}

impl<T: ProgressSink + ?Sized> ProgressSink for Rc<RefCell<T>> {
    fn deliver(&mut self, key: &EntityKey, record: ProgressRecord) {
        self.borrow_mut().deliver(key, record);
    }
}

impl ProgressSink for Vec<(EntityKey, ProgressRecord)> {
    fn deliver(&mut self, key: &EntityKey, record: ProgressRecord) {
        self.push((key.clone(), record));
    }
}

/// Range of item indices currently rendered by the list widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportRange {
    pub start_index: usize,
    pub end_index: usize,
}

impl ViewportRange {
    pub fn new(start_index: usize, end_index: usize) -> Self {
        Self {
            start_index,
            end_index,
        }
    }

    pub fn at(index: usize) -> Self {
        Self::new(index, index)
    }
}

/// Line to scroll to when a book is opened.
///
/// A saved character offset wins. Without one, the saved line index is used
/// when the line count still matches, and the percent otherwise; percent
/// re-alignment on content of a different length drifts, and that is accepted.
pub fn restore_text_position(saved: Option<&TextProgress>, content: &TextContent) -> usize {
    let Some(saved) = saved else {
        return 0;
    };
    if content.is_empty() {
        return 0;
    }

    if let Some(offset) = saved.start_char_index {
        return content.line_for_offset(offset);
    }
    if saved.total_lines == content.line_count() {
        return content.clamp_line(saved.current_line_index);
    }
    if saved.percent > 0.0 {
        let line = (saved.percent / 100.0 * content.line_count() as f64).floor() as usize;
        return content.clamp_line(line);
    }
    0
}

/// Page to show when a comic or video is opened.
pub fn restore_sequence_position(saved: Option<&SequenceProgress>, total: usize) -> usize {
    match saved {
        Some(saved) => saved.current.min(total.saturating_sub(1)),
        None => 0,
    }
}

/// Turns high-frequency position events for one entity into throttled
/// progress records.
///
/// Dropping or closing the tracker delivers any undelivered record
/// synchronously; once closed, no further record is emitted.
pub struct ProgressTracker<S: ProgressSink> {
    key: EntityKey,
    throttle: TrailingThrottle<ProgressRecord>,
    sink: S,
    clock: SharedClock,
    restored: bool,
    closed: bool,
}

impl<S: ProgressSink> ProgressTracker<S> {
    pub fn new(key: EntityKey, sink: S, clock: SharedClock) -> Self {
        Self::with_window(key, sink, clock, PROGRESS_THROTTLE_DELAY)
    }

    pub fn with_window(key: EntityKey, sink: S, clock: SharedClock, window: Duration) -> Self {
        Self {
            key,
            throttle: TrailingThrottle::new(window),
            sink,
            clock,
            restored: false,
            closed: false,
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_pending(&self) -> bool {
        self.throttle.is_pending()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    /// Queue a record; it reaches the sink when the window closes.
    pub fn record(&mut self, record: ProgressRecord) {
        if self.closed {
            debug!("Ignoring progress for closed session {}", self.key);
            return;
        }
        self.throttle.push(record, self.clock.now());
    }

    pub fn on_viewport_changed(&mut self, content: &TextContent, range: ViewportRange) {
        self.record(ProgressRecord::Text(TextProgress::at_line(
            content,
            range.start_index,
        )));
    }

    pub fn on_index_changed(&mut self, current: usize, total: usize) {
        self.record(ProgressRecord::Sequence(SequenceProgress::new(current, total)));
    }

    /// Fire the throttle timer if it is due. Returns true when a record was
    /// delivered.
    pub fn tick(&mut self) -> bool {
        match self.throttle.poll(self.clock.now()) {
            Some(record) => {
                self.deliver(record);
                true
            }
            None => false,
        }
    }

    /// Deliver the undelivered record now, without waiting for the window.
    pub fn flush(&mut self) -> bool {
        match self.throttle.flush() {
            Some(record) => {
                self.deliver(record);
                true
            }
            None => false,
        }
    }

    /// Session teardown: cancel the timer, deliver the last record, and stop
    /// accepting new ones.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.flush() {
            info!("Flushed final progress for {} on close", self.key);
        }
        self.throttle.cancel();
        self.closed = true;
    }

    /// Content was swapped under the session: settle the old entity's
    /// progress, then track `key` with a fresh restoration guard.
    pub fn switch_to(&mut self, key: EntityKey) {
        self.flush();
        self.throttle.cancel();
        self.key = key;
        self.restored = false;
        self.closed = false;
    }

    /// Runs `restore` only for the first call after a content load.
    pub fn initial_position(&mut self, restore: impl FnOnce() -> usize) -> Option<usize> {
        if self.restored {
            return None;
        }
        self.restored = true;
        let position = restore();
        debug!("Restoring {} to position {}", self.key, position);
        Some(position)
    }

    fn deliver(&mut self, mut record: ProgressRecord) {
        record.touch();
        debug!(
            "Delivering progress for {}: {:.1}%",
            self.key,
            record.percent()
        );
        self.sink.deliver(&self.key, record);
    }
}

impl<S: ProgressSink> Drop for ProgressTracker<S> {
    fn drop(&mut self) {
        self.close();
    }
}
