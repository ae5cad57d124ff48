use std::cell::RefCell;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;
use simplelog::{Config, LevelFilter, WriteLogger};

use eriri::backend::{FileTags, LocalBackend};
use eriri::book::BookParser;
use eriri::cache::ResultCache;
use eriri::catalog::ImageCatalog;
use eriri::clock::{SharedClock, SystemClock};
use eriri::config;
use eriri::library::{LibraryPaths, absolute_path, entity_id, resolve_library_paths, resolve_log_path};
use eriri::pairing::ViewMode;
use eriri::panic_handler;
use eriri::progress::{
    EntityKey, ProgressRecord, ProgressStore, ProgressTracker, ViewportRange, restore_text_position,
};
use eriri::reader::{BookReader, ComicReader};
use eriri::store::{DebouncedStore, FileBlobStore};

type SharedStore = Rc<RefCell<ProgressStore<FileBlobStore>>>;

#[derive(Parser, Debug)]
#[command(name = "eriri", version, about = "Resume books and comics where you left off")]
struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity: off, error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the chapter headings of a text book
    Chapters { file: PathBuf },

    /// Print a page of a text book, resuming from saved progress
    Read {
        file: PathBuf,

        /// Content line to start at instead of the saved position
        #[arg(long)]
        at: Option<usize>,

        /// Number of content lines to print
        #[arg(long, default_value_t = 20)]
        lines: usize,

        /// Wrap width in columns
        #[arg(long, default_value_t = 80)]
        width: usize,
    },

    /// Show the current spread of a comic directory and optionally navigate
    Comic {
        dir: PathBuf,

        /// One page per screen
        #[arg(long)]
        single: bool,

        /// Jump to this page before stepping
        #[arg(long)]
        jump: Option<usize>,

        /// Spreads to step forward
        #[arg(long, default_value_t = 0)]
        next: usize,

        /// Spreads to step back
        #[arg(long, default_value_t = 0)]
        prev: usize,
    },

    /// Recently read entries, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Drop saved progress for a book, comic or video
    Forget { path: PathBuf },

    /// Star or mark an image of a comic as deleted
    Tag {
        path: PathBuf,

        #[arg(long)]
        starred: Option<bool>,

        #[arg(long)]
        deleted: Option<bool>,
    },
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level '{s}'"))
}

struct Session {
    paths: LibraryPaths,
    store: SharedStore,
    clock: SharedClock,
}

impl Session {
    fn open() -> Result<Self> {
        let clock = SystemClock::shared();
        let paths = resolve_library_paths(config::get_data_dir().as_deref())?;
        let blobs = FileBlobStore::new(&paths.store_dir)
            .with_context(|| format!("Failed to open store at {:?}", paths.store_dir))?;
        let debounced = DebouncedStore::with_delay(blobs, clock.clone(), config::get_store_debounce());
        let store = Rc::new(RefCell::new(ProgressStore::load(debounced)));
        Ok(Self {
            paths,
            store,
            clock,
        })
    }

    fn tracker(&self, key: EntityKey) -> ProgressTracker<SharedStore> {
        ProgressTracker::with_window(
            key,
            self.store.clone(),
            self.clock.clone(),
            config::get_progress_throttle(),
        )
    }

    fn catalog(&self) -> ImageCatalog<LocalBackend> {
        ImageCatalog::new(
            LocalBackend::new(&self.paths.data_dir),
            ResultCache::new(config::get_image_cache_capacity()),
        )
    }

    fn flush(&self) -> Result<()> {
        self.store
            .borrow_mut()
            .flush()
            .context("Failed to flush progress")
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    panic_handler::initialize_panic_handler();

    let log_path = resolve_log_path()?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {log_path:?}"))?;
    WriteLogger::init(args.log_level, Config::default(), log_file)?;

    info!("Starting eriri");

    match &args.config {
        Some(path) => config::load_settings_from_path(path),
        None => config::load_settings(),
    }

    let session = Session::open()?;
    let result = match args.command {
        Command::Chapters { file } => list_chapters(&session, &file),
        Command::Read {
            file,
            at,
            lines,
            width,
        } => read_book(&session, &file, at, lines, width),
        Command::Comic {
            dir,
            single,
            jump,
            next,
            prev,
        } => read_comic(&session, &dir, single, jump, next, prev),
        Command::History { limit } => print_history(&session, limit),
        Command::Forget { path } => forget(&session, &path),
        Command::Tag {
            path,
            starred,
            deleted,
        } => tag_image(&session, &path, FileTags { starred, deleted }),
    };

    let flushed = session.flush();
    info!("Shutting down eriri");
    result.and(flushed)
}

fn list_chapters(session: &Session, file: &Path) -> Result<()> {
    let abs = absolute_path(file)?;
    let content = BookParser::parse_file(&abs)?;
    let saved = session.store.borrow().book(&entity_id(&abs)).cloned();
    let active = saved
        .as_ref()
        .and_then(|p| content.chapter_at(restore_text_position(Some(p), &content)));

    if content.chapters.is_empty() {
        println!("No chapters found ({} lines)", content.line_count());
        return Ok(());
    }
    for (i, chapter) in content.chapters.iter().enumerate() {
        let marker = if active == Some(chapter) { "*" } else { " " };
        println!(
            "{marker} {i:>4}  line {:>7}  {}",
            chapter.line_index, chapter.title
        );
    }
    Ok(())
}

fn read_book(
    session: &Session,
    file: &Path,
    at: Option<usize>,
    lines: usize,
    width: usize,
) -> Result<()> {
    let abs = absolute_path(file)?;
    let id = entity_id(&abs);
    let content = BookParser::parse_file(&abs)?;
    let saved = session.store.borrow().book(&id).cloned();

    let mut reader = BookReader::open(content, saved.as_ref(), session.tracker(EntityKey::book(id)));
    let top = at.unwrap_or(reader.top_line());
    reader.on_viewport_changed(ViewportRange::new(top, top + lines.saturating_sub(1)));

    let chapter = reader
        .current_chapter()
        .map(|c| c.title.as_str())
        .unwrap_or("");
    println!(
        "{}  [{} / {}]  {chapter}",
        abs.display(),
        reader.top_line() + 1,
        reader.content().line_count()
    );
    println!();
    for line in reader.visible_lines(lines) {
        println!("{}", textwrap::fill(line, width.max(1)));
    }

    reader.close();
    Ok(())
}

fn read_comic(
    session: &Session,
    dir: &Path,
    single: bool,
    jump: Option<usize>,
    next: usize,
    prev: usize,
) -> Result<()> {
    let abs = absolute_path(dir)?;
    let id = entity_id(&abs);
    let images = session.catalog().get_images(&id, &abs)?;
    if images.is_empty() {
        bail!("No images found in {}", abs.display());
    }

    let mode = if single {
        ViewMode::Single
    } else {
        config::get_view_mode()
    };
    let saved = session.store.borrow().comic(&id).cloned();
    let mut reader = ComicReader::open(
        images,
        mode,
        config::get_container_size(),
        saved.as_ref(),
        session.tracker(EntityKey::comic(id)),
    );
    reader.set_epsilon(config::get_pairing_epsilon());

    if let Some(index) = jump {
        reader.jump_to(index);
    }
    for _ in 0..next {
        reader.next();
    }
    for _ in 0..prev {
        reader.prev();
    }

    println!(
        "{}  [page {} / {}]  {} mode",
        abs.display(),
        reader.current() + 1,
        reader.images().len(),
        reader.mode().as_str()
    );
    for image in reader.visible_images() {
        let mut flags = String::new();
        if image.starred {
            flags.push_str(" starred");
        }
        if image.deleted {
            flags.push_str(" deleted");
        }
        println!(
            "  {:>4}  {}  {}x{}{flags}",
            image.index + 1,
            image.filename,
            image.width,
            image.height
        );
    }

    reader.close();
    Ok(())
}

fn print_history(session: &Session, limit: usize) -> Result<()> {
    let history = session.store.borrow().history();
    if history.is_empty() {
        println!("Nothing read yet");
        return Ok(());
    }
    for entry in history.into_iter().take(limit) {
        let last_read = entry
            .record
            .last_read()
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M");
        let detail = match &entry.record {
            ProgressRecord::Text(p) => p.current_chapter_title.clone(),
            ProgressRecord::Sequence(p) => format!("{} / {}", p.current + 1, p.total),
        };
        println!(
            "{last_read}  {:<5}  {:>5.1}%  {}  {detail}",
            entry.key.kind.as_str(),
            entry.record.percent(),
            entry.key.id
        );
    }
    Ok(())
}

fn forget(session: &Session, path: &Path) -> Result<()> {
    let id = entity_id(&absolute_path(path)?);
    let mut store = session.store.borrow_mut();
    let removed = store.remove_book_progress(&id)
        | store.remove_comic_progress(&id)
        | store.remove_video_progress(&id);
    if removed {
        println!("Forgot progress for {}", path.display());
    } else {
        println!("No saved progress for {}", path.display());
    }
    Ok(())
}

fn tag_image(session: &Session, path: &Path, tags: FileTags) -> Result<()> {
    if tags.starred.is_none() && tags.deleted.is_none() {
        bail!("Nothing to change: pass --starred and/or --deleted");
    }
    let abs = absolute_path(path)?;
    let dir = abs
        .parent()
        .with_context(|| format!("{} has no parent directory", abs.display()))?;
    let filename = abs
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", abs.display()))?;

    let id = entity_id(dir);
    let mut catalog = session.catalog();
    catalog.get_images(&id, dir)?;
    if !catalog.update_image_tags(&id, &filename, tags) {
        bail!("Failed to tag {}", abs.display());
    }
    println!("Tagged {}", abs.display());
    Ok(())
}
