//! Text source abstraction.
//!
//! A [`TextSource`] fetches both language variants of one chapter. The
//! native crate implements it over HTTP; [`InMemorySource`] serves fixed
//! chapters for tests and offline use.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::parse::ChapterText;

/// A failed chapter fetch.
///
/// The message is what the reader shows inline where the chapter would
/// have appeared, so it should read well to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FetchError {}

/// A remote (or local) provider of chapter text.
///
/// Implementations must be `Send + Sync`; the cache calls
/// [`fetch_chapter`](TextSource::fetch_chapter) from spawned tasks.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use chapter_window_core::parse::ChapterText;
/// use chapter_window_core::source::{FetchError, TextSource};
///
/// struct Psalm117;
///
/// #[async_trait]
/// impl TextSource for Psalm117 {
///     async fn fetch_chapter(&self, _book: &str, _chapter: u32) -> Result<ChapterText, FetchError> {
///         Ok(ChapterText::new(
///             vec!["הַלְלוּ".into(), "כִּי".into()],
///             vec!["O praise".into(), "For his".into()],
///         ))
///     }
/// }
/// ```
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Fetch `chapter` (1-based) of `book`.
    async fn fetch_chapter(&self, book: &str, chapter: u32) -> Result<ChapterText, FetchError>;
}

/// In-memory text source.
///
/// Chapters that were never inserted come back as an empty
/// [`ChapterText`], the same shape a text API gives for a chapter past the
/// end of a book.
pub struct InMemorySource {
    chapters: RwLock<HashMap<(String, u32), ChapterText>>,
    failing: RwLock<HashSet<(String, u32)>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            chapters: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Add or replace a chapter.
    pub fn insert(&self, book: &str, chapter: u32, text: ChapterText) {
        if let Ok(mut chapters) = self.chapters.write() {
            chapters.insert((book.to_string(), chapter), text);
        }
    }

    /// Make fetches of `chapter` fail (`true`) or succeed again (`false`).
    pub fn set_failing(&self, book: &str, chapter: u32, failing: bool) {
        if let Ok(mut set) = self.failing.write() {
            let key = (book.to_string(), chapter);
            if failing {
                set.insert(key);
            } else {
                set.remove(&key);
            }
        }
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextSource for InMemorySource {
    async fn fetch_chapter(&self, book: &str, chapter: u32) -> Result<ChapterText, FetchError> {
        let key = (book.to_string(), chapter);

        let failing = self
            .failing
            .read()
            .map(|set| set.contains(&key))
            .unwrap_or(false);
        if failing {
            return Err(FetchError::new(format!(
                "{} {} is unavailable",
                book, chapter
            )));
        }

        let chapters = self
            .chapters
            .read()
            .map_err(|_| FetchError::new("text store lock poisoned"))?;
        Ok(chapters.get(&key).cloned().unwrap_or_default())
    }
}
