use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::record::{EntityKey, EntityKind, ProgressRecord, SequenceProgress, TextProgress};
use super::tracker::ProgressSink;
use crate::store::{BlobStore, DebouncedStore, StoreError};

/// Logical store name of the progress blob
pub const PROGRESS_STORE_NAME: &str = "eriri-progress-storage";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct ProgressState {
    #[serde(default)]
    books: HashMap<String, TextProgress>,
    #[serde(default)]
    comics: HashMap<String, SequenceProgress>,
    #[serde(default)]
    videos: HashMap<String, SequenceProgress>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub key: EntityKey,
    pub record: ProgressRecord,
}

/// One progress record per entity, last write wins.
///
/// The whole map is serialized to a single JSON blob and written through the
/// debounced store on every change.
pub struct ProgressStore<B: BlobStore> {
    state: ProgressState,
    store: DebouncedStore<B>,
}

impl<B: BlobStore> ProgressStore<B> {
    /// Load saved progress. A missing, empty or unreadable blob means no prior
    /// progress.
    pub fn load(mut store: DebouncedStore<B>) -> Self {
        let state = match store.get_item(PROGRESS_STORE_NAME) {
            Ok(Some(raw)) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).unwrap_or_else(|e| {
                    warn!("Ignoring unreadable progress store: {e}");
                    ProgressState::default()
                })
            }
            Ok(_) => ProgressState::default(),
            Err(e) => {
                error!("Failed to load progress store: {e}");
                ProgressState::default()
            }
        };
        Self { state, store }
    }

    pub fn book(&self, id: &str) -> Option<&TextProgress> {
        self.state.books.get(id)
    }

    pub fn comic(&self, id: &str) -> Option<&SequenceProgress> {
        self.state.comics.get(id)
    }

    pub fn video(&self, id: &str) -> Option<&SequenceProgress> {
        self.state.videos.get(id)
    }

    pub fn get(&self, key: &EntityKey) -> Option<ProgressRecord> {
        match key.kind {
            EntityKind::Book => self.book(&key.id).cloned().map(ProgressRecord::Text),
            EntityKind::Comic => self.comic(&key.id).cloned().map(ProgressRecord::Sequence),
            EntityKind::Video => self.video(&key.id).cloned().map(ProgressRecord::Sequence),
        }
    }

    pub fn update_book(&mut self, id: &str, progress: TextProgress) {
        self.state.books.insert(id.to_string(), progress);
        self.persist();
    }

    pub fn update_comic(&mut self, id: &str, progress: SequenceProgress) {
        self.state.comics.insert(id.to_string(), progress);
        self.persist();
    }

    pub fn update_video(&mut self, id: &str, progress: SequenceProgress) {
        self.state.videos.insert(id.to_string(), progress);
        self.persist();
    }

    pub fn remove(&mut self, key: &EntityKey) -> bool {
        let removed = match key.kind {
            EntityKind::Book => self.state.books.remove(&key.id).is_some(),
            EntityKind::Comic => self.state.comics.remove(&key.id).is_some(),
            EntityKind::Video => self.state.videos.remove(&key.id).is_some(),
        };
        if removed {
            self.persist();
        }
        removed
    }

    pub fn remove_book_progress(&mut self, id: &str) -> bool {
        self.remove(&EntityKey::book(id))
    }

    pub fn remove_comic_progress(&mut self, id: &str) -> bool {
        self.remove(&EntityKey::comic(id))
    }

    pub fn remove_video_progress(&mut self, id: &str) -> bool {
        self.remove(&EntityKey::video(id))
    }

    /// Forget all progress and delete the blob.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.state = ProgressState::default();
        self.store.remove_item(PROGRESS_STORE_NAME)
    }

    /// Every record, most recently read first
    pub fn history(&self) -> Vec<HistoryEntry> {
        let books = self.state.books.iter().map(|(id, p)| HistoryEntry {
            key: EntityKey::book(id.as_str()),
            record: ProgressRecord::Text(p.clone()),
        });
        let comics = self.state.comics.iter().map(|(id, p)| HistoryEntry {
            key: EntityKey::comic(id.as_str()),
            record: ProgressRecord::Sequence(p.clone()),
        });
        let videos = self.state.videos.iter().map(|(id, p)| HistoryEntry {
            key: EntityKey::video(id.as_str()),
            record: ProgressRecord::Sequence(p.clone()),
        });

        let mut entries: Vec<HistoryEntry> = books.chain(comics).chain(videos).collect();
        entries.sort_by(|a, b| b.record.last_read().cmp(&a.record.last_read()));
        entries
    }

    pub fn most_recent(&self) -> Option<HistoryEntry> {
        self.history().into_iter().next()
    }

    pub fn tick(&mut self) -> bool {
        self.store.tick()
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.store.flush()
    }

    pub fn debounced(&self) -> &DebouncedStore<B> {
        &self.store
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.state)
            .map_err(StoreError::from)
            .and_then(|json| self.store.set_item(PROGRESS_STORE_NAME, json));
        if let Err(e) = result {
            error!("Failed to persist progress: {e}");
        }
    }
}

impl<B: BlobStore> ProgressSink for ProgressStore<B> {
    fn deliver(&mut self, key: &EntityKey, record: ProgressRecord) {
        match (key.kind, record) {
            (EntityKind::Book, ProgressRecord::Text(p)) => self.update_book(&key.id, p),
            (EntityKind::Comic, ProgressRecord::Sequence(p)) => self.update_comic(&key.id, p),
            (EntityKind::Video, ProgressRecord::Sequence(p)) => self.update_video(&key.id, p),
            (kind, record) => {
                warn!(
                    "Dropping {} progress with mismatched record {:?}",
                    kind.as_str(),
                    record
                );
            }
        }
    }
}
