use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::book::TextContent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Book,
    Comic,
    Video,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Book => "book",
            EntityKind::Comic => "comic",
            EntityKind::Video => "video",
        }
    }
}

/// Identifies the entity a progress record belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn book(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Book,
            id: id.into(),
        }
    }

    pub fn comic(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Comic,
            id: id.into(),
        }
    }

    pub fn video(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Video,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Percent position of `current` within `total` items: 100 for one item or
/// fewer, otherwise `current / (total - 1) * 100` clamped to `[0, 100]`.
pub fn percent_of(current: usize, total: usize) -> f64 {
    if total <= 1 {
        return 100.0;
    }
    let last = (total - 1) as f64;
    (current as f64 / last * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextProgress {
    pub current_line_index: usize,
    pub total_lines: usize,
    pub percent: f64,
    #[serde(default)]
    pub current_chapter_title: String,
    /// Character offset of `current_line_index`, preferred when restoring
    #[serde(default)]
    pub start_char_index: Option<usize>,
    #[serde(default)]
    pub total_chars: usize,
    pub last_read: DateTime<Utc>,
}

impl TextProgress {
    /// Map the top-of-viewport line to a progress record.
    pub fn at_line(content: &TextContent, top_index: usize) -> Self {
        let total_lines = content.line_count();
        let safe_index = content.clamp_line(top_index);
        Self {
            current_line_index: safe_index,
            total_lines,
            percent: percent_of(safe_index, total_lines),
            current_chapter_title: content.chapter_title_at(safe_index).to_string(),
            start_char_index: content.line_start_offsets.get(safe_index).copied(),
            total_chars: content.total_chars,
            last_read: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceProgress {
    pub current: usize,
    pub total: usize,
    pub percent: f64,
    pub last_read: DateTime<Utc>,
}

impl SequenceProgress {
    pub fn new(current: usize, total: usize) -> Self {
        let current = current.min(total.saturating_sub(1));
        Self {
            current,
            total,
            percent: percent_of(current, total),
            last_read: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressRecord {
    Text(TextProgress),
    Sequence(SequenceProgress),
}

impl ProgressRecord {
    pub fn percent(&self) -> f64 {
        match self {
            ProgressRecord::Text(p) => p.percent,
            ProgressRecord::Sequence(p) => p.percent,
        }
    }

    pub fn last_read(&self) -> DateTime<Utc> {
        match self {
            ProgressRecord::Text(p) => p.last_read,
            ProgressRecord::Sequence(p) => p.last_read,
        }
    }

    /// Stamp the record with the moment it is handed to persistence
    pub fn touch(&mut self) {
        let now = Utc::now();
        match self {
            ProgressRecord::Text(p) => p.last_read = now,
            ProgressRecord::Sequence(p) => p.last_read = now,
        }
    }
}
