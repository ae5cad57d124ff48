pub mod backend;
pub mod book;
pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod library;
pub mod pairing;
pub mod panic_handler;
pub mod progress;
pub mod reader;
pub mod store;

pub use backend::{ComicImage, FetchError, FileTags, LibraryBackend, LocalBackend};
pub use book::{BookParser, Chapter, ParseError, TextContent};
pub use cache::ResultCache;
pub use catalog::ImageCatalog;
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use pairing::{ContainerSize, PageSize, PairingEngine, ViewMode};
pub use progress::{EntityKey, ProgressRecord, ProgressStore, ProgressTracker};
pub use reader::{BookReader, ComicReader};
pub use store::{BlobStore, DebouncedStore, FileBlobStore, MemoryBlobStore, StoreError};
