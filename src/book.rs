use log::{debug, error};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Heading grammar for chapter detection: `第` + arabic, full-width or CJK
/// numerals + a volume/chapter marker, then any trailing title text.
static CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(第[0-9０-９一二三四五六七八九十百千]+[章回节卷集幕].*)")
        .expect("chapter heading regex is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path:?} is not valid UTF-8 text")]
    Encoding { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    /// Index into `TextContent::lines` (content lines, not raw file lines)
    pub line_index: usize,
    pub char_index: usize,
}

/// A parsed plain-text book.
///
/// `lines` holds only non-blank lines, so every index in this struct is a
/// dense content index. Offsets are counted in characters, with one extra
/// character per removed line terminator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextContent {
    pub lines: Vec<String>,
    pub line_start_offsets: Vec<usize>,
    pub chapters: Vec<Chapter>,
    pub total_chars: usize,
}

impl TextContent {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Clamp an arbitrary index into the valid line range.
    pub fn clamp_line(&self, line_index: usize) -> usize {
        line_index.min(self.lines.len().saturating_sub(1))
    }

    pub fn line_start_offset(&self, line_index: usize) -> usize {
        self.line_start_offsets
            .get(self.clamp_line(line_index))
            .copied()
            .unwrap_or(0)
    }

    /// Last chapter starting at or before `line_index`.
    ///
    /// Scans from the end: a forward scan that stops at the first match would
    /// return the opening chapter for every line.
    pub fn chapter_at(&self, line_index: usize) -> Option<&Chapter> {
        self.chapters
            .iter()
            .rev()
            .find(|chapter| chapter.line_index <= line_index)
    }

    pub fn chapter_title_at(&self, line_index: usize) -> &str {
        self.chapter_at(line_index)
            .map(|c| c.title.as_str())
            .unwrap_or("")
    }

    /// Restore a saved character offset to the line containing it.
    pub fn line_for_offset(&self, offset: usize) -> usize {
        find_line_index(&self.line_start_offsets, offset)
    }
}

/// Greatest index whose start offset does not exceed `target`, or 0 when the
/// target precedes every line (or there are no lines at all).
pub fn find_line_index(offsets: &[usize], target: usize) -> usize {
    offsets
        .partition_point(|&offset| offset <= target)
        .saturating_sub(1)
}

/// Index raw text into content lines, start offsets and chapters.
pub fn parse_text(raw: &str) -> TextContent {
    let mut content = TextContent::default();
    let mut char_count = 0usize;

    for segment in raw.split('\n') {
        let line = segment.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let line_index = content.lines.len();
        content.line_start_offsets.push(char_count);

        if let Some(caps) = CHAPTER_RE.captures(line) {
            content.chapters.push(Chapter {
                title: caps[1].trim().to_string(),
                line_index,
                char_index: char_count,
            });
        }

        char_count += line.chars().count() + 1;
        content.lines.push(line.to_string());
    }

    content.total_chars = char_count;
    content
}

/// Reads a text file and indexes it. A failed read is returned, never turned
/// into empty content.
pub struct BookParser;

impl BookParser {
    pub fn parse_file(path: &Path) -> Result<TextContent, ParseError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            let err = if e.kind() == io::ErrorKind::InvalidData {
                ParseError::Encoding {
                    path: path.to_path_buf(),
                }
            } else {
                ParseError::Read {
                    path: path.to_path_buf(),
                    source: e,
                }
            };
            error!("Failed to parse book: {err}");
            err
        })?;

        let content = parse_text(&raw);
        debug!(
            "Parsed {:?}: {} lines, {} chapters, {} chars",
            path,
            content.line_count(),
            content.chapters.len(),
            content.total_chars
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "第一章 开端\nhello\n第二章 转折\nworld";

    #[test]
    fn blank_lines_are_dropped_from_content_indices() {
        let content = parse_text("first\n\n   \nsecond\r\n\nthird\n");

        assert_eq!(content.lines, vec!["first", "second", "third"]);
        assert_eq!(content.line_start_offsets, vec![0, 6, 13]);
        assert_eq!(content.total_chars, 19);
    }

    #[test]
    fn detects_cjk_chapter_headings() {
        let content = parse_text(SAMPLE);

        assert_eq!(content.chapters.len(), 2);
        assert_eq!(content.chapters[0].title, "第一章 开端");
        assert_eq!(content.chapters[0].line_index, 0);
        assert_eq!(content.chapters[1].title, "第二章 转折");
        assert_eq!(content.chapters[1].line_index, 2);
        assert_eq!(
            content.chapters[1].char_index,
            content.line_start_offsets[2]
        );
    }

    #[test]
    fn heading_grammar_accepts_leading_whitespace_and_other_markers() {
        let content = parse_text("  第１２回 夜宴\n第三卷\n第十幕 终\n第5节");
        let titles: Vec<&str> = content.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["第１２回 夜宴", "第三卷", "第十幕 终", "第5节"]);
    }

    #[test]
    fn latin_headings_are_not_chapters() {
        let content = parse_text("Chapter 3\nsome text\n我第一章");
        assert!(content.chapters.is_empty());
        assert_eq!(content.chapter_at(2), None);
        assert_eq!(content.chapter_title_at(2), "");
    }

    #[test]
    fn chapter_at_picks_last_chapter_not_after_line() {
        let mut content = TextContent::default();
        for (title, line_index) in [("a", 0), ("b", 10), ("c", 25)] {
            content.chapters.push(Chapter {
                title: title.to_string(),
                line_index,
                char_index: 0,
            });
        }

        assert_eq!(content.chapter_at(17).map(|c| c.line_index), Some(10));
        assert_eq!(content.chapter_at(10).map(|c| c.line_index), Some(10));
        assert_eq!(content.chapter_at(9).map(|c| c.line_index), Some(0));
        assert_eq!(content.chapter_at(99).map(|c| c.line_index), Some(25));
    }

    #[test]
    fn chapter_before_first_heading_is_none() {
        let content = parse_text("preface\n第一章 开端\nbody");
        assert_eq!(content.chapter_at(0), None);
        assert_eq!(content.chapter_title_at(2), "第一章 开端");
    }

    #[test]
    fn scenario_viewport_at_last_line_resolves_second_chapter() {
        let content = parse_text(SAMPLE);
        assert_eq!(content.chapter_title_at(3), "第二章 转折");
    }

    #[test]
    fn offset_lookup_round_trips_every_line() {
        let content = parse_text(SAMPLE);
        for (i, offset) in content.line_start_offsets.iter().enumerate() {
            assert_eq!(find_line_index(&content.line_start_offsets, *offset), i);
        }
    }

    #[test]
    fn offset_lookup_floors_and_clamps() {
        let offsets = [0, 10, 20];
        assert_eq!(find_line_index(&offsets, 15), 1);
        assert_eq!(find_line_index(&offsets, 999), 2);
        assert_eq!(find_line_index(&[5, 10], 0), 0);
        assert_eq!(find_line_index(&[], 42), 0);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let content = parse_text("开端\nab");
        assert_eq!(content.line_start_offsets, vec![0, 3]);
    }

    #[test]
    fn parse_file_reads_utf8_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let content = BookParser::parse_file(file.path()).unwrap();
        assert_eq!(content.line_count(), 4);
    }

    #[test]
    fn parse_file_propagates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BookParser::parse_file(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, ParseError::Read { .. }));
    }

    #[test]
    fn parse_file_rejects_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = BookParser::parse_file(file.path()).unwrap_err();
        assert!(matches!(err, ParseError::Encoding { .. }));
    }
}
