//! Persistence: raw blob backends and the debounced key-value layer on top.

pub mod blob;
pub mod debounced;

pub use blob::{BlobOp, BlobStore, FileBlobStore, MemoryBlobStore};
pub use debounced::{DebouncedStore, STORE_DEBOUNCE_DELAY, StoreError};
