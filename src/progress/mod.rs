//! Reading-position tracking: records, the trailing throttle, per-session
//! trackers and the persisted progress maps.

pub mod record;
pub mod store;
pub mod throttle;
pub mod tracker;

pub use record::{
    EntityKey, EntityKind, ProgressRecord, SequenceProgress, TextProgress, percent_of,
};
pub use store::{HistoryEntry, PROGRESS_STORE_NAME, ProgressStore};
pub use throttle::{PROGRESS_THROTTLE_DELAY, TrailingThrottle};
pub use tracker::{
    ProgressSink, ProgressTracker, ViewportRange, restore_sequence_position,
    restore_text_position,
};
