//! Debounced, coalescing key-value persistence.
//!
//! Writes are best-effort: a value is held in memory for the debounce delay
//! and then handed to a single background writer. A failed blob write is
//! logged and the value is dropped, so the loss window is bounded by the
//! debounce delay. This is not a transaction log.

use flume::{Receiver, Sender, TryRecvError};
use log::{debug, error, info, warn};
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::blob::BlobStore;
use crate::clock::SharedClock;

pub const STORE_DEBOUNCE_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("persistence writer thread is gone")]
    WriterGone,

    #[error("failed to read blob {key:?}: {source}")]
    Read {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize stored value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Value waiting for the debounce timer, plus the signal the writer will
/// acknowledge once it has been written. Later `set_item` calls for the same
/// key replace `value` and keep the signal.
#[derive(Debug)]
struct PendingWrite {
    key: String,
    value: Option<String>,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
}

impl PendingWrite {
    fn new(key: String, value: Option<String>) -> Self {
        let (done_tx, done_rx) = flume::bounded(1);
        Self {
            key,
            value,
            done_tx,
            done_rx,
        }
    }
}

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Idle,
    Pending {
        write: PendingWrite,
        deadline: Instant,
    },
    Flushing {
        key: String,
        done: Receiver<()>,
    },
}

#[derive(Debug)]
enum WriterJob {
    Write {
        key: String,
        value: Option<String>,
        done: Sender<()>,
    },
    Delete {
        key: String,
        done: Sender<()>,
    },
    Shutdown,
}

/// Single-slot mailbox over a `BlobStore` with at most one write in flight.
///
/// State machine: `Idle → Pending → Flushing → Idle`. Reads are
/// read-after-write consistent: an in-flight write is awaited first, and a
/// pending value for the requested key is returned without touching the
/// backend. Dropping the store flushes the pending value synchronously.
pub struct DebouncedStore<B: BlobStore> {
    backend: Arc<B>,
    state: SlotState,
    delay: Duration,
    clock: SharedClock,
    jobs: Sender<WriterJob>,
    writer: Option<JoinHandle<()>>,
}

impl<B: BlobStore> DebouncedStore<B> {
    pub fn new(backend: B, clock: SharedClock) -> Self {
        Self::with_delay(backend, clock, STORE_DEBOUNCE_DELAY)
    }

    pub fn with_delay(backend: B, clock: SharedClock, delay: Duration) -> Self {
        let backend = Arc::new(backend);
        let (jobs, job_rx) = flume::unbounded();

        let writer_backend = backend.clone();
        let writer = std::thread::spawn(move || {
            run_writer(writer_backend, job_rx);
        });

        Self {
            backend,
            state: SlotState::Idle,
            delay,
            clock,
            jobs,
            writer: Some(writer),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.state, SlotState::Pending { .. })
    }

    pub fn is_flushing(&self) -> bool {
        matches!(self.state, SlotState::Flushing { .. })
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            SlotState::Pending { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    pub fn get_item(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        self.settle();

        if let SlotState::Pending { write, .. } = &self.state {
            if write.key == key {
                return Ok(write.value.clone());
            }
        }

        self.backend
            .read_blob(key)
            .map_err(|source| StoreError::Read {
                key: key.to_string(),
                source,
            })
    }

    /// Replace the pending value and restart the debounce timer.
    pub fn set_item(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        let now = self.clock.now();
        let deadline = now + self.delay;

        match std::mem::take(&mut self.state) {
            SlotState::Pending { mut write, .. } if write.key == key => {
                write.value = Some(value);
                self.state = SlotState::Pending { write, deadline };
                return Ok(());
            }
            SlotState::Pending { write, .. } => {
                debug!(
                    "Flushing pending {:?} early to make room for {key:?}",
                    write.key
                );
                self.hand_off(write)?;
                self.settle();
            }
            flushing @ SlotState::Flushing { .. } => {
                self.state = flushing;
                self.settle();
            }
            SlotState::Idle => {}
        }

        self.state = SlotState::Pending {
            write: PendingWrite::new(key.to_string(), Some(value)),
            deadline,
        };
        Ok(())
    }

    /// Flush whatever is pending, then delete `key` from the backend.
    pub fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        self.flush()?;

        let (done, done_rx) = flume::bounded(1);
        self.jobs
            .send(WriterJob::Delete {
                key: key.to_string(),
                done,
            })
            .map_err(|_| StoreError::WriterGone)?;
        self.state = SlotState::Flushing {
            key: key.to_string(),
            done: done_rx,
        };
        self.settle();
        Ok(())
    }

    /// Write the pending value now and wait until the writer has handled it.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        match std::mem::take(&mut self.state) {
            SlotState::Pending { write, .. } => self.hand_off(write)?,
            other => self.state = other,
        }
        self.settle();
        Ok(())
    }

    /// Fire the debounce timer if due and retire a finished flush. Returns
    /// true when the state changed.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        match std::mem::take(&mut self.state) {
            SlotState::Pending { write, deadline } if now >= deadline => {
                if let Err(e) = self.hand_off(write) {
                    error!("Failed to hand off debounced write: {e}");
                }
                true
            }
            SlotState::Flushing { key, done } => match done.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    debug!("Flush of {key:?} finished");
                    true
                }
                Err(TryRecvError::Empty) => {
                    self.state = SlotState::Flushing { key, done };
                    false
                }
            },
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Final flush on process or session teardown. Never waits for the timer.
    pub fn on_teardown(&mut self) {
        if self.has_pending() {
            info!("Teardown: flushing pending store write");
        }
        if let Err(e) = self.flush() {
            error!("Teardown flush failed: {e}");
        }
    }

    fn hand_off(&mut self, write: PendingWrite) -> Result<(), StoreError> {
        let PendingWrite {
            key,
            value,
            done_tx,
            done_rx,
        } = write;

        self.jobs
            .send(WriterJob::Write {
                key: key.clone(),
                value,
                done: done_tx,
            })
            .map_err(|_| {
                error!("Writer thread is gone, dropping pending write for {key:?}");
                StoreError::WriterGone
            })?;

        self.state = SlotState::Flushing { key, done: done_rx };
        Ok(())
    }

    /// Wait for an in-flight flush. The signal always resolves: the writer
    /// acknowledges failed writes too, and a vanished writer drops its sender.
    fn settle(&mut self) {
        match std::mem::take(&mut self.state) {
            SlotState::Flushing { key, done } => {
                if done.recv().is_err() {
                    warn!("Writer vanished while flushing {key:?}");
                }
            }
            other => self.state = other,
        }
    }
}

impl<B: BlobStore> Drop for DebouncedStore<B> {
    fn drop(&mut self) {
        self.on_teardown();
        let _ = self.jobs.send(WriterJob::Shutdown);
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                error!("Store writer thread panicked");
            }
        }
    }
}

fn run_writer<B: BlobStore>(backend: Arc<B>, jobs: Receiver<WriterJob>) {
    for job in jobs.iter() {
        match job {
            WriterJob::Write { key, value, done } => {
                let result = match &value {
                    Some(data) => backend.write_blob(&key, data),
                    None => backend.delete_blob(&key),
                };
                if let Err(e) = result {
                    error!("Failed to persist {key:?}: {e}");
                }
                let _ = done.send(());
            }
            WriterJob::Delete { key, done } => {
                if let Err(e) = backend.delete_blob(&key) {
                    error!("Failed to delete {key:?}: {e}");
                }
                let _ = done.send(());
            }
            WriterJob::Shutdown => break,
        }
    }
    debug!("Store writer stopped");
}
