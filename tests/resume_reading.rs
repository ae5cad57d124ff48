use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use eriri::book::{BookParser, TextContent, parse_text};
use eriri::clock::ManualClock;
use eriri::progress::{EntityKey, PROGRESS_STORE_NAME, ProgressStore, ProgressTracker};
use eriri::reader::BookReader;
use eriri::store::{DebouncedStore, FileBlobStore};
use tempfile::TempDir;

type SharedStore = Rc<RefCell<ProgressStore<FileBlobStore>>>;

fn open_store(dir: &Path, clock: &ManualClock) -> SharedStore {
    let blobs = FileBlobStore::new(dir).unwrap();
    Rc::new(RefCell::new(ProgressStore::load(DebouncedStore::new(
        blobs,
        clock.shared(),
    ))))
}

fn novel() -> TextContent {
    let lines: Vec<String> = (0..200)
        .map(|i| {
            if i % 50 == 0 {
                format!("第{}章 标题", i / 50 + 1)
            } else {
                format!("line {i}")
            }
        })
        .collect();
    parse_text(&lines.join("\n"))
}

#[test]
fn book_position_survives_restart() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let content = novel();

    {
        let store = open_store(dir.path(), &clock);
        let tracker = ProgressTracker::new(EntityKey::book("novel"), store.clone(), clock.shared());
        let mut reader = BookReader::open(content.clone(), None, tracker);

        for line in 0..120 {
            reader.scroll_to(line);
            clock.advance_ms(10);
            reader.tick();
            store.borrow_mut().tick();
        }
        reader.close();
    }

    let store = open_store(dir.path(), &clock);
    let saved = store.borrow().book("novel").cloned();
    assert!(saved.is_some());

    let tracker = ProgressTracker::new(EntityKey::book("novel"), store.clone(), clock.shared());
    let reader = BookReader::open(content, saved.as_ref(), tracker);
    assert_eq!(reader.top_line(), 119);
    assert_eq!(
        reader.current_chapter().map(|c| c.title.as_str()),
        Some("第3章 标题")
    );
}

#[test]
fn teardown_writes_latest_value_without_waiting() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let content = novel();

    {
        let store = open_store(dir.path(), &clock);
        let tracker = ProgressTracker::new(EntityKey::book("novel"), store.clone(), clock.shared());
        let mut reader = BookReader::open(content, None, tracker);
        reader.scroll_to(10);
        reader.scroll_to(42);
    }

    let raw = fs::read_to_string(dir.path().join(format!("{PROGRESS_STORE_NAME}.json"))).unwrap();
    let saved: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(saved["books"]["novel"]["current_line_index"], 42);
    assert_eq!(saved["books"]["novel"]["current_chapter_title"], "第1章 标题");
}

#[test]
fn edited_book_restores_by_character_offset() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();

    {
        let store = open_store(dir.path(), &clock);
        let tracker = ProgressTracker::new(EntityKey::book("b"), store.clone(), clock.shared());
        let mut reader = BookReader::open(parse_text("one\ntwo\nthree\nfour"), None, tracker);
        reader.scroll_to(2);
    }

    // Blank lines added; content indices and char offsets are unchanged
    let edited = parse_text("one\n\ntwo\n\n\nthree\nfour\nfive\nsix");
    let store = open_store(dir.path(), &clock);
    let saved = store.borrow().book("b").cloned();
    let tracker = ProgressTracker::new(EntityKey::book("b"), store.clone(), clock.shared());
    let reader = BookReader::open(edited, saved.as_ref(), tracker);

    assert_eq!(reader.visible_lines(1), &["three".to_string()]);
}

#[test]
fn switching_books_keeps_both_positions() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();

    {
        let store = open_store(dir.path(), &clock);
        let tracker = ProgressTracker::new(EntityKey::book("a"), store.clone(), clock.shared());
        let mut reader = BookReader::open(novel(), None, tracker);
        reader.scroll_to(7);
        reader.reload(EntityKey::book("b"), parse_text("x\ny\nz"), None);
        reader.scroll_to(1);
    }

    let store = open_store(dir.path(), &clock);
    let store = store.borrow();
    assert_eq!(store.book("a").map(|p| p.current_line_index), Some(7));
    assert_eq!(store.book("b").map(|p| p.current_line_index), Some(1));
    assert_eq!(
        store.most_recent().map(|e| e.key),
        Some(EntityKey::book("b"))
    );
}

#[test]
fn unreadable_book_reports_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.txt");

    let err = BookParser::parse_file(&path).unwrap_err();
    assert!(err.to_string().contains("missing.txt"));
}
