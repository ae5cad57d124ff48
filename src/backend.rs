//! Image listing and tag mutation for comic directories.

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::pairing::PageSize;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "avif"];
const TAGS_FILE_NAME: &str = "tags.json";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComicImage {
    pub index: usize,
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
    pub thumbnail_url: String,
    pub width: u32,
    pub height: u32,
    pub starred: bool,
    pub deleted: bool,
}

impl From<&ComicImage> for PageSize {
    fn from(image: &ComicImage) -> Self {
        PageSize::new(image.width, image.height)
    }
}

/// Partial tag update; `None` leaves that tag untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTags {
    pub starred: Option<bool>,
    pub deleted: Option<bool>,
}

impl FileTags {
    pub fn apply(&self, image: &mut ComicImage) {
        if let Some(starred) = self.starred {
            image.starred = starred;
        }
        if let Some(deleted) = self.deleted {
            image.deleted = deleted;
        }
    }
}

pub trait LibraryBackend {
    fn list_images(&self, path: &Path) -> Result<Vec<ComicImage>, FetchError>;

    /// Returns false when the tag could not be written.
    fn set_tag(&self, path: &Path, tags: FileTags) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredTags {
    #[serde(default)]
    starred: bool,
    #[serde(default)]
    deleted: bool,
}

/// Reads comic directories from the local filesystem. Tags live in a JSON
/// sidecar under the data directory, keyed by absolute image path.
pub struct LocalBackend {
    tags_path: PathBuf,
}

impl LocalBackend {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            tags_path: data_dir.join(TAGS_FILE_NAME),
        }
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
    }

    fn tag_key(path: &Path) -> String {
        fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .into_owned()
    }

    fn load_tags(&self) -> HashMap<String, StoredTags> {
        match fs::read_to_string(&self.tags_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring unreadable tags file {:?}: {e}", self.tags_path);
                HashMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                error!("Failed to read tags file {:?}: {e}", self.tags_path);
                HashMap::new()
            }
        }
    }

    fn save_tags(&self, tags: &HashMap<String, StoredTags>) -> anyhow::Result<()> {
        if let Some(parent) = self.tags_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(tags)?;
        fs::write(&self.tags_path, content)?;
        Ok(())
    }
}

impl LibraryBackend for LocalBackend {
    fn list_images(&self, path: &Path) -> Result<Vec<ComicImage>, FetchError> {
        if !path.is_dir() {
            return Err(FetchError::NotADirectory(path.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| FetchError::Io {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
            let file_path = entry.path();
            if entry.file_type().is_file()
                && !Self::is_hidden(file_path)
                && Self::is_image(file_path)
            {
                files.push(file_path.to_path_buf());
            }
        }
        files.sort_by_key(|p| {
            p.file_name()
                .map(|name| name.to_string_lossy().to_lowercase())
                .unwrap_or_default()
        });

        let tags = self.load_tags();
        let images: Vec<ComicImage> = files
            .into_iter()
            .enumerate()
            .map(|(index, file_path)| {
                let (width, height) = match imagesize::size(&file_path) {
                    Ok(size) => (size.width as u32, size.height as u32),
                    Err(e) => {
                        warn!("Could not read dimensions of {file_path:?}: {e}");
                        (0, 0)
                    }
                };
                let stored = tags
                    .get(&Self::tag_key(&file_path))
                    .copied()
                    .unwrap_or_default();
                let url = format!("file://{}", file_path.display());
                ComicImage {
                    index,
                    filename: file_path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    thumbnail_url: url.clone(),
                    url,
                    path: file_path,
                    width,
                    height,
                    starred: stored.starred,
                    deleted: stored.deleted,
                }
            })
            .collect();

        debug!("Listed {} images in {:?}", images.len(), path);
        Ok(images)
    }

    fn set_tag(&self, path: &Path, tags: FileTags) -> bool {
        if !path.exists() {
            warn!("Cannot tag missing file {path:?}");
            return false;
        }
        let mut all = self.load_tags();
        let entry = all.entry(Self::tag_key(path)).or_default();
        if let Some(starred) = tags.starred {
            entry.starred = starred;
        }
        if let Some(deleted) = tags.deleted {
            entry.deleted = deleted;
        }
        match self.save_tags(&all) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save tags for {path:?}: {e}");
                false
            }
        }
    }
}
