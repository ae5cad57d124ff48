use log::{debug, warn};
use std::path::Path;

use crate::backend::{ComicImage, FetchError, FileTags, LibraryBackend};
use crate::cache::ResultCache;

/// Image listings per comic, cached in front of the backend.
///
/// Failed listings are never cached, so the next request goes back to the
/// backend.
pub struct ImageCatalog<B: LibraryBackend> {
    backend: B,
    cache: ResultCache<Vec<ComicImage>>,
}

impl<B: LibraryBackend> ImageCatalog<B> {
    pub fn new(backend: B, cache: ResultCache<Vec<ComicImage>>) -> Self {
        Self { backend, cache }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &ResultCache<Vec<ComicImage>> {
        &self.cache
    }

    pub fn get_images(&mut self, comic_id: &str, path: &Path) -> Result<Vec<ComicImage>, FetchError> {
        if let Some(images) = self.cache.get(comic_id) {
            return Ok(images.clone());
        }

        match self.backend.list_images(path) {
            Ok(images) => {
                debug!("Caching {} images for {comic_id}", images.len());
                self.cache.put(comic_id, images.clone());
                Ok(images)
            }
            Err(e) => {
                warn!("Failed to list images for {comic_id}: {e}");
                Err(e)
            }
        }
    }

    pub fn remove_images(&mut self, comic_id: &str) {
        self.cache.remove(comic_id);
    }

    /// Drop every cached listing, e.g. after a library rescan.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Tag one image of a cached comic. The cached copy is patched only when
    /// the backend reports success.
    pub fn update_image_tags(&mut self, comic_id: &str, filename: &str, tags: FileTags) -> bool {
        let Some(path) = self
            .cache
            .peek(comic_id)
            .and_then(|images| images.iter().find(|i| i.filename == filename))
            .map(|image| image.path.clone())
        else {
            debug!("No cached image {filename} for {comic_id}; skipping tag update");
            return false;
        };

        if !self.backend.set_tag(&path, tags) {
            return false;
        }

        if let Some(image) = self
            .cache
            .peek_mut(comic_id)
            .and_then(|images| images.iter_mut().find(|i| i.filename == filename))
        {
            tags.apply(image);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::PathBuf;

    struct FakeBackend {
        list_calls: Cell<usize>,
        fail_listing: Cell<bool>,
        tag_succeeds: bool,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                list_calls: Cell::new(0),
                fail_listing: Cell::new(false),
                tag_succeeds: true,
            }
        }
    }

    fn image(index: usize) -> ComicImage {
        let filename = format!("{index:03}.jpg");
        ComicImage {
            index,
            path: PathBuf::from("/comics/c").join(&filename),
            url: String::new(),
            thumbnail_url: String::new(),
            filename,
            width: 700,
            height: 1000,
            starred: false,
            deleted: false,
        }
    }

    impl LibraryBackend for FakeBackend {
        fn list_images(&self, path: &Path) -> Result<Vec<ComicImage>, FetchError> {
            self.list_calls.set(self.list_calls.get() + 1);
            if self.fail_listing.get() {
                return Err(FetchError::Unavailable(path.display().to_string()));
            }
            Ok((0..3).map(image).collect())
        }

        fn set_tag(&self, _path: &Path, _tags: FileTags) -> bool {
            self.tag_succeeds
        }
    }

    fn catalog(backend: FakeBackend) -> ImageCatalog<FakeBackend> {
        ImageCatalog::new(backend, ResultCache::new(4))
    }

    #[test]
    fn second_request_is_served_from_cache() {
        let mut catalog = catalog(FakeBackend::new());
        let path = Path::new("/comics/c");

        assert_eq!(catalog.get_images("c", path).unwrap().len(), 3);
        assert_eq!(catalog.get_images("c", path).unwrap().len(), 3);
        assert_eq!(catalog.backend().list_calls.get(), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let mut catalog = catalog(FakeBackend::new());
        let path = Path::new("/comics/c");

        catalog.backend().fail_listing.set(true);
        assert!(catalog.get_images("c", path).is_err());
        assert!(catalog.get_images("c", path).is_err());
        catalog.backend().fail_listing.set(false);
        assert!(catalog.get_images("c", path).is_ok());

        assert_eq!(catalog.backend().list_calls.get(), 3);
    }

    #[test]
    fn removal_and_invalidation_force_refetch() {
        let mut catalog = catalog(FakeBackend::new());
        let path = Path::new("/comics/c");

        catalog.get_images("c", path).unwrap();
        catalog.remove_images("c");
        catalog.get_images("c", path).unwrap();
        catalog.invalidate_all();
        catalog.get_images("c", path).unwrap();

        assert_eq!(catalog.backend().list_calls.get(), 3);
    }

    #[test]
    fn successful_tag_patches_cached_image() {
        let mut catalog = catalog(FakeBackend::new());
        catalog.get_images("c", Path::new("/comics/c")).unwrap();

        let tags = FileTags {
            starred: Some(true),
            deleted: None,
        };
        assert!(catalog.update_image_tags("c", "001.jpg", tags));

        let images = catalog.cache().peek("c").unwrap();
        assert!(images[1].starred);
        assert!(!images[1].deleted);
        assert!(!images[0].starred);
    }

    #[test]
    fn failed_tag_leaves_cache_untouched() {
        let mut backend = FakeBackend::new();
        backend.tag_succeeds = false;
        let mut catalog = catalog(backend);
        catalog.get_images("c", Path::new("/comics/c")).unwrap();

        let tags = FileTags {
            starred: Some(true),
            deleted: Some(true),
        };
        assert!(!catalog.update_image_tags("c", "001.jpg", tags));
        assert!(!catalog.cache().peek("c").unwrap()[1].starred);
    }

    #[test]
    fn tagging_uncached_comic_is_a_no_op() {
        let mut catalog = catalog(FakeBackend::new());
        assert!(!catalog.update_image_tags("c", "001.jpg", FileTags::default()));
    }
}
