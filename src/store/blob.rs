use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Raw key → string storage underneath the debounced store.
///
/// Implementations are shared between the caller's thread and the writer
/// thread, so every operation takes `&self`.
pub trait BlobStore: Send + Sync + 'static {
    fn read_blob(&self, key: &str) -> io::Result<Option<String>>;
    fn write_blob(&self, key: &str, data: &str) -> io::Result<()>;
    fn delete_blob(&self, key: &str) -> io::Result<()>;
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn read_blob(&self, key: &str) -> io::Result<Option<String>> {
        (**self).read_blob(key)
    }

    fn write_blob(&self, key: &str, data: &str) -> io::Result<()> {
        (**self).write_blob(key, data)
    }

    fn delete_blob(&self, key: &str) -> io::Result<()> {
        (**self).delete_blob(key)
    }
}

/// One `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl BlobStore for FileBlobStore {
    fn read_blob(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_blob(&self, key: &str, data: &str) -> io::Result<()> {
        let path = self.path_for(key);
        // Readers only ever see a complete blob
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        debug!("Wrote {} bytes to {path:?}", data.len());
        Ok(())
    }

    fn delete_blob(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Operation observed by a `MemoryBlobStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobOp {
    Write { key: String, data: String },
    Delete { key: String },
}

#[derive(Debug, Default)]
struct MemoryState {
    blobs: HashMap<String, String>,
    ops: Vec<BlobOp>,
    fail_writes: bool,
}

/// In-memory blob store that records every write and delete.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(self, key: &str, data: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.blobs.insert(key.to_string(), data.to_string());
        }
        self
    }

    /// Make subsequent writes fail with an I/O error
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_writes = fail;
        }
    }

    pub fn ops(&self) -> Vec<BlobOp> {
        self.state
            .lock()
            .map(|state| state.ops.clone())
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BlobOp::Write { key, data } => Some((key, data)),
                BlobOp::Delete { .. } => None,
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.blobs.get(key).cloned())
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| io::Error::other("memory blob store poisoned"))
    }
}

impl BlobStore for MemoryBlobStore {
    fn read_blob(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.blobs.get(key).cloned())
    }

    fn write_blob(&self, key: &str, data: &str) -> io::Result<()> {
        let mut state = self.lock()?;
        if state.fail_writes {
            return Err(io::Error::other("simulated write failure"));
        }
        state.blobs.insert(key.to_string(), data.to_string());
        state.ops.push(BlobOp::Write {
            key: key.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }

    fn delete_blob(&self, key: &str) -> io::Result<()> {
        let mut state = self.lock()?;
        state.blobs.remove(key);
        state.ops.push(BlobOp::Delete {
            key: key.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("store")).unwrap();

        assert_eq!(store.read_blob("eriri-progress-storage").unwrap(), None);

        store.write_blob("eriri-progress-storage", "{}").unwrap();
        assert_eq!(
            store.read_blob("eriri-progress-storage").unwrap().as_deref(),
            Some("{}")
        );

        store.delete_blob("eriri-progress-storage").unwrap();
        store.delete_blob("eriri-progress-storage").unwrap();
        assert_eq!(store.read_blob("eriri-progress-storage").unwrap(), None);
    }

    #[test]
    fn file_store_sanitizes_key_into_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        store.write_blob("../escape/attempt", "x").unwrap();

        assert!(dir.path().join("___escape_attempt.json").exists());
    }

    #[test]
    fn memory_store_records_ops() {
        let store = MemoryBlobStore::new();
        store.write_blob("k", "v").unwrap();
        store.delete_blob("k").unwrap();

        assert_eq!(
            store.ops(),
            vec![
                BlobOp::Write {
                    key: "k".into(),
                    data: "v".into()
                },
                BlobOp::Delete { key: "k".into() },
            ]
        );
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn memory_store_can_fail_writes() {
        let store = MemoryBlobStore::new();
        store.fail_writes(true);
        assert!(store.write_blob("k", "v").is_err());
        assert!(store.writes().is_empty());
    }
}
