//! Core data models for the chapter cache.
//!
//! These types flow from a [`TextSource`](crate::source::TextSource) through
//! the [`ChapterWindowCache`](crate::cache::ChapterWindowCache) to whatever
//! presentation layer renders the reader view.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One verse, carrying both language variants as raw markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerseRecord {
    /// 1-based position within the chapter.
    pub verse_number: u32,
    pub primary_text: String,
    pub secondary_text: String,
}

/// Cached state for a single chapter of the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterEntry {
    /// 1-based chapter number within the book.
    pub chapter_number: u32,
    /// Verses in order; empty until the first successful fetch.
    pub verses: Vec<VerseRecord>,
    /// True while a fetch for this chapter is in flight.
    pub loading: bool,
    /// Message from the most recent failed attempt.
    pub error: Option<String>,
    /// When the verses were last replaced by a successful fetch.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ChapterEntry {
    pub(crate) fn new(chapter_number: u32) -> Self {
        Self {
            chapter_number,
            verses: Vec::new(),
            loading: false,
            error: None,
            fetched_at: None,
        }
    }

    /// Derived lifecycle state of the entry.
    pub fn state(&self) -> ChapterState {
        if self.loading {
            ChapterState::Loading
        } else if self.error.is_some() {
            ChapterState::Errored
        } else if self.verses.is_empty() {
            ChapterState::ReadyEmpty
        } else {
            ChapterState::Ready
        }
    }

    /// Whether a new fetch may be started for this entry.
    ///
    /// Only errored and empty entries are retry-eligible; a loading entry
    /// or one with verses is left alone.
    pub fn needs_fetch(&self) -> bool {
        !self.loading && self.verses.is_empty()
    }
}

/// Lifecycle state of a [`ChapterEntry`].
///
/// A chapter that has never been referenced has no entry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterState {
    Loading,
    /// Loaded with at least one verse. Terminal for the cache lifetime.
    Ready,
    /// Loaded, but the response held no verses. Retry-eligible.
    ReadyEmpty,
    Errored,
}

impl ChapterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterState::Loading => "loading",
            ChapterState::Ready => "ready",
            ChapterState::ReadyEmpty => "ready_empty",
            ChapterState::Errored => "errored",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verse(n: u32) -> VerseRecord {
        VerseRecord {
            verse_number: n,
            primary_text: format!("p{}", n),
            secondary_text: format!("s{}", n),
        }
    }

    #[test]
    fn test_new_entry_is_ready_empty() {
        let entry = ChapterEntry::new(3);
        assert_eq!(entry.state(), ChapterState::ReadyEmpty);
        assert!(entry.needs_fetch());
    }

    #[test]
    fn test_loading_takes_precedence() {
        let mut entry = ChapterEntry::new(3);
        entry.loading = true;
        entry.error = Some("stale".into());
        assert_eq!(entry.state(), ChapterState::Loading);
        assert!(!entry.needs_fetch());
    }

    #[test]
    fn test_errored_is_retry_eligible() {
        let mut entry = ChapterEntry::new(3);
        entry.error = Some("HTTP 503".into());
        assert_eq!(entry.state(), ChapterState::Errored);
        assert!(entry.needs_fetch());
    }

    #[test]
    fn test_ready_is_terminal() {
        let mut entry = ChapterEntry::new(3);
        entry.verses = vec![verse(1), verse(2)];
        assert_eq!(entry.state(), ChapterState::Ready);
        assert!(!entry.needs_fetch());
    }
}
