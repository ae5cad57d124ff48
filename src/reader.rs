//! Reading sessions: one open book or comic with its progress tracker.

use log::{debug, info};
use std::time::Instant;

use crate::backend::ComicImage;
use crate::book::{Chapter, TextContent};
use crate::pairing::{ContainerSize, PageSize, PairingEngine, ViewMode};
use crate::progress::{
    EntityKey, ProgressSink, ProgressTracker, SequenceProgress, TextProgress, ViewportRange,
    restore_sequence_position, restore_text_position,
};

pub struct BookReader<S: ProgressSink> {
    content: TextContent,
    tracker: ProgressTracker<S>,
    top_line: usize,
}

impl<S: ProgressSink> BookReader<S> {
    /// Start a session positioned from `saved`, if any.
    pub fn open(content: TextContent, saved: Option<&TextProgress>, tracker: ProgressTracker<S>) -> Self {
        let mut reader = Self {
            content,
            tracker,
            top_line: 0,
        };
        reader.restore(saved);
        info!(
            "Opened book {} ({} lines, {} chapters) at line {}",
            reader.tracker.key(),
            reader.content.line_count(),
            reader.content.chapters.len(),
            reader.top_line
        );
        reader
    }

    /// Swap in another book. Progress for the previous one is settled first.
    pub fn reload(&mut self, key: EntityKey, content: TextContent, saved: Option<&TextProgress>) {
        self.tracker.switch_to(key);
        self.content = content;
        self.top_line = 0;
        self.restore(saved);
    }

    fn restore(&mut self, saved: Option<&TextProgress>) {
        let content = &self.content;
        if let Some(line) = self
            .tracker
            .initial_position(|| restore_text_position(saved, content))
        {
            self.top_line = line;
        }
    }

    pub fn key(&self) -> &EntityKey {
        self.tracker.key()
    }

    pub fn content(&self) -> &TextContent {
        &self.content
    }

    pub fn top_line(&self) -> usize {
        self.top_line
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.content.chapters
    }

    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.content.chapter_at(self.top_line)
    }

    /// Lines from the top of the viewport, at most `count` of them.
    pub fn visible_lines(&self, count: usize) -> &[String] {
        let start = self.top_line.min(self.content.lines.len());
        let end = start.saturating_add(count).min(self.content.lines.len());
        &self.content.lines[start..end]
    }

    pub fn on_viewport_changed(&mut self, range: ViewportRange) {
        self.top_line = self.content.clamp_line(range.start_index);
        self.tracker.on_viewport_changed(&self.content, range);
    }

    pub fn scroll_to(&mut self, line_index: usize) -> usize {
        self.on_viewport_changed(ViewportRange::at(line_index));
        self.top_line
    }

    /// Scroll to the start of chapter `index`; `None` when there is no such
    /// chapter.
    pub fn jump_to_chapter(&mut self, index: usize) -> Option<usize> {
        let line_index = self.content.chapters.get(index)?.line_index;
        debug!("Jumping to chapter {index} at line {line_index}");
        Some(self.scroll_to(line_index))
    }

    pub fn tick(&mut self) -> bool {
        self.tracker.tick()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.tracker.next_deadline()
    }

    pub fn tracker(&self) -> &ProgressTracker<S> {
        &self.tracker
    }

    pub fn close(&mut self) {
        self.tracker.close();
    }
}

pub struct ComicReader<S: ProgressSink> {
    images: Vec<ComicImage>,
    engine: PairingEngine,
    tracker: ProgressTracker<S>,
    current: usize,
}

impl<S: ProgressSink> ComicReader<S> {
    pub fn open(
        images: Vec<ComicImage>,
        mode: ViewMode,
        container: ContainerSize,
        saved: Option<&SequenceProgress>,
        tracker: ProgressTracker<S>,
    ) -> Self {
        let pages: Vec<PageSize> = images.iter().map(PageSize::from).collect();
        let mut reader = Self {
            engine: PairingEngine::new(pages, mode, container),
            images,
            tracker,
            current: 0,
        };
        let total = reader.images.len();
        if let Some(page) = reader
            .tracker
            .initial_position(|| restore_sequence_position(saved, total))
        {
            reader.current = page;
        }
        info!(
            "Opened comic {} ({} pages, {} mode) at page {}",
            reader.tracker.key(),
            total,
            mode.as_str(),
            reader.current
        );
        reader
    }

    pub fn key(&self) -> &EntityKey {
        self.tracker.key()
    }

    pub fn images(&self) -> &[ComicImage] {
        &self.images
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn mode(&self) -> ViewMode {
        self.engine.mode()
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.engine.set_mode(mode);
    }

    pub fn set_container(&mut self, container: ContainerSize) {
        self.engine.set_container(container);
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.engine.set_epsilon(epsilon);
    }

    pub fn visible_indices(&self) -> Vec<usize> {
        self.engine.visible_indices(self.current)
    }

    pub fn visible_images(&self) -> Vec<&ComicImage> {
        self.visible_indices()
            .into_iter()
            .filter_map(|i| self.images.get(i))
            .collect()
    }

    pub fn next(&mut self) -> usize {
        let target = self.engine.next(self.current);
        self.go_to(target)
    }

    pub fn prev(&mut self) -> usize {
        let target = self.engine.prev(self.current);
        self.go_to(target)
    }

    pub fn jump_to(&mut self, index: usize) -> usize {
        let target = self.engine.jump_to(index);
        self.go_to(target)
    }

    fn go_to(&mut self, index: usize) -> usize {
        self.current = index;
        if !self.images.is_empty() {
            self.tracker.on_index_changed(index, self.images.len());
        }
        index
    }

    pub fn tick(&mut self) -> bool {
        self.tracker.tick()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.tracker.next_deadline()
    }

    pub fn tracker(&self) -> &ProgressTracker<S> {
        &self.tracker
    }

    pub fn close(&mut self) {
        self.tracker.close();
    }
}
