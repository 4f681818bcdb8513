//! Per-book chapter window cache.
//!
//! [`ChapterWindowCache`] maps chapter numbers to [`ChapterEntry`] values
//! for one book and fetches each chapter at most once, unless the previous
//! attempt failed or came back empty.
//!
//! # State machine
//!
//! ```text
//!             begin_fetch            complete(Ok, n>0)
//!   absent ──────────────▶ loading ──────────────────▶ ready   (terminal)
//!                            │  ▲
//!          complete(Ok, 0)   │  │ begin_fetch (retry)
//!          complete(Err)     ▼  │
//!                      ready_empty / errored
//! ```
//!
//! The guard check and the `loading = true` write happen under a single
//! write-lock acquisition ([`begin_fetch`](ChapterWindowCache::begin_fetch)),
//! so concurrent callers asking for the same chapter issue one request.
//! The lock is never held while the source is awaited.
//!
//! Closing the cache (when the reader view goes away) turns every later
//! call into a no-op and drops completions that arrive afterwards, so a
//! torn-down view never receives stale writes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;

use crate::models::ChapterEntry;
use crate::parse::{pair_verses, ChapterText};
use crate::source::{FetchError, TextSource};

/// Why [`ChapterWindowCache::ensure_chapter`] did not issue a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Chapter number ≤ 0. There is no chapter zero.
    InvalidChapter,
    /// Past the known last chapter of the book.
    PastEnd,
    /// The cache has been closed.
    Closed,
    /// A request for this chapter is already outstanding.
    InFlight,
    /// The chapter already has verses.
    AlreadyLoaded,
}

/// Result of one [`ChapterWindowCache::ensure_chapter`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum EnsureOutcome {
    Skipped { reason: SkipReason },
    Loaded { verses: usize },
    Failed { message: String },
    /// The cache was closed while the request was in flight.
    Discarded,
}

impl EnsureOutcome {
    /// True when a request was sent to the source.
    pub fn issued_request(&self) -> bool {
        !matches!(self, EnsureOutcome::Skipped { .. })
    }
}

/// Permission to fetch one chapter, handed out by
/// [`begin_fetch`](ChapterWindowCache::begin_fetch).
///
/// The entry stays `loading` until the ticket is passed back to
/// [`complete`](ChapterWindowCache::complete), or until the future from
/// [`fetch`](ChapterWindowCache::fetch) holding it is dropped.
#[derive(Debug)]
#[must_use = "a fetch ticket leaves its chapter loading until completed"]
pub struct FetchTicket {
    chapter: u32,
}

impl FetchTicket {
    pub fn chapter(&self) -> u32 {
        self.chapter
    }
}

/// Message recorded on a chapter whose request was dropped unfinished.
pub const CANCELLED_MESSAGE: &str = "request cancelled";

/// Chapter cache for a single book.
pub struct ChapterWindowCache {
    book: String,
    /// Known chapter count; 0 when unknown (there is no chapter zero).
    last_chapter: AtomicU32,
    source: Arc<dyn TextSource>,
    entries: RwLock<HashMap<u32, ChapterEntry>>,
    closed: AtomicBool,
}

impl ChapterWindowCache {
    pub fn new(book: impl Into<String>, source: Arc<dyn TextSource>) -> Self {
        Self {
            book: book.into(),
            last_chapter: AtomicU32::new(0),
            source,
            entries: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Bound requests to the book's chapter count, when it is known.
    pub fn with_last_chapter(self, last_chapter: Option<u32>) -> Self {
        self.set_last_chapter(last_chapter);
        self
    }

    /// Change the chapter-count bound in place. Existing entries are kept.
    pub fn set_last_chapter(&self, last_chapter: Option<u32>) {
        self.last_chapter
            .store(last_chapter.unwrap_or(0), Ordering::SeqCst);
    }

    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn last_chapter(&self) -> Option<u32> {
        match self.last_chapter.load(Ordering::SeqCst) {
            0 => None,
            last => Some(last),
        }
    }

    /// Fetch `chapter` unless it is loaded or already loading.
    ///
    /// Issues at most one request to the source. Failures are recorded on
    /// the chapter's entry and never affect other chapters.
    pub async fn ensure_chapter(&self, chapter: i64) -> EnsureOutcome {
        let ticket = match self.begin_fetch(chapter) {
            Ok(ticket) => ticket,
            Err(reason) => {
                tracing::debug!(book = %self.book, chapter, ?reason, "skipping chapter fetch");
                return EnsureOutcome::Skipped { reason };
            }
        };

        self.fetch(ticket).await
    }

    /// Run the request for a ticket from [`begin_fetch`](Self::begin_fetch)
    /// and record its result.
    ///
    /// The ticket is armed before the future is first polled: dropping the
    /// future at any point (timeout, `select!`, task abort, a panicking
    /// source) clears `loading` and records [`CANCELLED_MESSAGE`], leaving
    /// the chapter retry-eligible.
    pub fn fetch(&self, ticket: FetchTicket) -> impl Future<Output = EnsureOutcome> + Send + '_ {
        let pending = PendingFetch {
            cache: self,
            ticket: Some(ticket),
        };
        async move {
            let result = self.source.fetch_chapter(&self.book, pending.chapter()).await;
            pending.finish(result)
        }
    }

    /// Guard check plus `loading = true`, as one step.
    ///
    /// Creates the entry on first reference. Invalid and past-the-end
    /// chapters never get an entry.
    pub fn begin_fetch(&self, chapter: i64) -> Result<FetchTicket, SkipReason> {
        if chapter <= 0 {
            return Err(SkipReason::InvalidChapter);
        }
        let chapter = u32::try_from(chapter).map_err(|_| SkipReason::PastEnd)?;
        if matches!(self.last_chapter(), Some(last) if chapter > last) {
            return Err(SkipReason::PastEnd);
        }
        if self.is_closed() {
            return Err(SkipReason::Closed);
        }

        let mut entries = self.write_entries();
        let entry = entries
            .entry(chapter)
            .or_insert_with(|| ChapterEntry::new(chapter));

        if entry.loading {
            return Err(SkipReason::InFlight);
        }
        if !entry.verses.is_empty() {
            return Err(SkipReason::AlreadyLoaded);
        }

        entry.loading = true;
        entry.error = None;
        Ok(FetchTicket { chapter })
    }

    /// Record the result of the fetch started by `ticket`.
    pub fn complete(
        &self,
        ticket: FetchTicket,
        result: Result<ChapterText, FetchError>,
    ) -> EnsureOutcome {
        let mut entries = self.write_entries();

        // Checked under the lock so a concurrent close() cannot interleave.
        if self.is_closed() {
            tracing::debug!(book = %self.book, chapter = ticket.chapter, "discarding result for closed cache");
            return EnsureOutcome::Discarded;
        }

        let entry = entries
            .entry(ticket.chapter)
            .or_insert_with(|| ChapterEntry::new(ticket.chapter));
        entry.loading = false;

        match result {
            Ok(text) => {
                entry.verses = pair_verses(&text);
                entry.error = None;
                entry.fetched_at = Some(Utc::now());
                EnsureOutcome::Loaded {
                    verses: entry.verses.len(),
                }
            }
            Err(e) => {
                tracing::warn!(book = %self.book, chapter = ticket.chapter, error = %e, "chapter fetch failed");
                entry.error = Some(e.message.clone());
                EnsureOutcome::Failed { message: e.message }
            }
        }
    }

    /// Settle an entry whose request was dropped before completing.
    fn abandon(&self, ticket: FetchTicket) {
        let mut entries = self.write_entries();
        if self.is_closed() {
            return;
        }
        if let Some(entry) = entries.get_mut(&ticket.chapter) {
            tracing::debug!(book = %self.book, chapter = ticket.chapter, "chapter request dropped");
            entry.loading = false;
            entry.error = Some(CANCELLED_MESSAGE.to_string());
        }
    }

    /// Stop accepting requests and drop in-flight results.
    pub fn close(&self) {
        let _entries = self.write_entries();
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Clone of one entry, if the chapter has been referenced.
    pub fn entry(&self, chapter: u32) -> Option<ChapterEntry> {
        self.read_entries().get(&chapter).cloned()
    }

    /// All entries in ascending chapter order.
    pub fn snapshot(&self) -> Vec<ChapterEntry> {
        let mut entries: Vec<ChapterEntry> = self.read_entries().values().cloned().collect();
        entries.sort_by_key(|e| e.chapter_number);
        entries
    }

    /// Lowest and highest chapter numbers that hold verses.
    pub fn loaded_bounds(&self) -> Option<(u32, u32)> {
        let entries = self.read_entries();
        let mut loaded = entries
            .values()
            .filter(|e| !e.verses.is_empty())
            .map(|e| e.chapter_number);
        let first = loaded.next()?;
        Some(loaded.fold((first, first), |(lo, hi), n| (lo.min(n), hi.max(n))))
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned lock only means another task panicked mid-update; the map
    // itself is still consistent because every write is a plain field store.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<u32, ChapterEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<u32, ChapterEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// A ticket in flight; gives the entry back if dropped unfinished.
struct PendingFetch<'a> {
    cache: &'a ChapterWindowCache,
    ticket: Option<FetchTicket>,
}

impl PendingFetch<'_> {
    fn chapter(&self) -> u32 {
        self.ticket.as_ref().map(FetchTicket::chapter).unwrap_or_default()
    }

    fn finish(mut self, result: Result<ChapterText, FetchError>) -> EnsureOutcome {
        match self.ticket.take() {
            Some(ticket) => self.cache.complete(ticket, result),
            None => EnsureOutcome::Discarded,
        }
    }
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.cache.abandon(ticket);
        }
    }
}

/// Chapters seeded when a reader view mounts at `current`.
///
/// `current - 1` is included only when `current > 1`; `current + 1` is left
/// out when it would overflow.
pub fn initial_window(current: i64) -> Vec<i64> {
    let mut window = Vec::with_capacity(3);
    if current > 1 {
        window.push(current - 1);
    }
    window.push(current);
    if let Some(next) = current.checked_add(1) {
        window.push(next);
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChapterState;
    use crate::source::InMemorySource;

    fn cache() -> ChapterWindowCache {
        ChapterWindowCache::new("Genesis", Arc::new(InMemorySource::new()))
    }

    fn text(n: usize) -> ChapterText {
        ChapterText::new(
            (1..=n).map(|i| format!("p{}", i)).collect(),
            (1..=n).map(|i| format!("s{}", i)).collect(),
        )
    }

    #[test]
    fn test_non_positive_chapters_create_no_entry() {
        let cache = cache();
        for n in [0, -1, -42, i64::MIN] {
            assert_eq!(cache.begin_fetch(n).unwrap_err(), SkipReason::InvalidChapter);
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_past_end_is_skipped() {
        let cache = cache().with_last_chapter(Some(10));
        assert_eq!(cache.begin_fetch(11).unwrap_err(), SkipReason::PastEnd);
        assert!(cache.begin_fetch(10).is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_second_begin_while_loading_is_in_flight() {
        let cache = cache();
        let ticket = cache.begin_fetch(5).unwrap();
        assert_eq!(cache.begin_fetch(5).unwrap_err(), SkipReason::InFlight);
        assert_eq!(cache.entry(5).unwrap().state(), ChapterState::Loading);
        let _ = cache.complete(ticket, Ok(text(2)));
    }

    #[test]
    fn test_ready_chapter_is_terminal() {
        let cache = cache();
        let ticket = cache.begin_fetch(5).unwrap();
        assert_eq!(
            cache.complete(ticket, Ok(text(3))),
            EnsureOutcome::Loaded { verses: 3 }
        );
        let before = cache.entry(5).unwrap();
        assert_eq!(cache.begin_fetch(5).unwrap_err(), SkipReason::AlreadyLoaded);
        assert_eq!(cache.entry(5).unwrap(), before);
    }

    #[test]
    fn test_error_then_retry_clears_error() {
        let cache = cache();
        let ticket = cache.begin_fetch(4).unwrap();
        let outcome = cache.complete(ticket, Err(FetchError::new("HTTP 503")));
        assert_eq!(
            outcome,
            EnsureOutcome::Failed {
                message: "HTTP 503".into()
            }
        );

        let entry = cache.entry(4).unwrap();
        assert_eq!(entry.state(), ChapterState::Errored);
        assert!(!entry.loading);
        assert!(entry.verses.is_empty());
        assert_eq!(entry.error.as_deref(), Some("HTTP 503"));

        let ticket = cache.begin_fetch(4).unwrap();
        assert_eq!(cache.entry(4).unwrap().error, None);
        let _ = cache.complete(ticket, Ok(text(2)));
        let entry = cache.entry(4).unwrap();
        assert_eq!(entry.state(), ChapterState::Ready);
        assert_eq!(entry.verses.len(), 2);
        assert!(entry.fetched_at.is_some());
    }

    #[test]
    fn test_empty_result_is_retry_eligible() {
        let cache = cache();
        let ticket = cache.begin_fetch(7).unwrap();
        assert_eq!(
            cache.complete(ticket, Ok(ChapterText::empty())),
            EnsureOutcome::Loaded { verses: 0 }
        );
        assert_eq!(cache.entry(7).unwrap().state(), ChapterState::ReadyEmpty);
        assert!(cache.begin_fetch(7).is_ok());
    }

    #[test]
    fn test_close_discards_in_flight_result() {
        let cache = cache();
        let ticket = cache.begin_fetch(2).unwrap();
        cache.close();
        assert_eq!(cache.complete(ticket, Ok(text(4))), EnsureOutcome::Discarded);
        assert!(cache.entry(2).unwrap().verses.is_empty());
        assert_eq!(cache.begin_fetch(3).unwrap_err(), SkipReason::Closed);
    }

    #[test]
    fn test_snapshot_sorted_regardless_of_arrival() {
        let cache = cache();
        let t9 = cache.begin_fetch(9).unwrap();
        let t2 = cache.begin_fetch(2).unwrap();
        let t5 = cache.begin_fetch(5).unwrap();
        let _ = cache.complete(t5, Ok(text(1)));
        let _ = cache.complete(t9, Ok(text(1)));
        let _ = cache.complete(t2, Ok(text(1)));
        let order: Vec<u32> = cache.snapshot().iter().map(|e| e.chapter_number).collect();
        assert_eq!(order, vec![2, 5, 9]);
    }

    #[test]
    fn test_loaded_bounds_ignores_empty_entries() {
        let cache = cache();
        assert_eq!(cache.loaded_bounds(), None);
        for (n, verses) in [(3, 2), (4, 0), (6, 1)] {
            let ticket = cache.begin_fetch(n).unwrap();
            let _ = cache.complete(ticket, Ok(text(verses)));
        }
        let _pending = cache.begin_fetch(8).unwrap();
        assert_eq!(cache.loaded_bounds(), Some((3, 6)));
    }

    #[test]
    fn test_initial_window() {
        assert_eq!(initial_window(5), vec![4, 5, 6]);
        assert_eq!(initial_window(2), vec![1, 2, 3]);
        assert_eq!(initial_window(1), vec![1, 2]);
        assert_eq!(initial_window(i64::MAX), vec![i64::MAX - 1, i64::MAX]);
        assert_eq!(initial_window(i64::MIN), vec![i64::MIN, i64::MIN + 1]);
    }

    #[test]
    fn test_dropped_fetch_leaves_chapter_retry_eligible() {
        let cache = cache();
        let ticket = cache.begin_fetch(3).unwrap();
        drop(cache.fetch(ticket));

        let entry = cache.entry(3).unwrap();
        assert!(!entry.loading);
        assert_eq!(entry.state(), ChapterState::Errored);
        assert_eq!(entry.error.as_deref(), Some(CANCELLED_MESSAGE));
        assert!(cache.begin_fetch(3).is_ok());
    }

    #[test]
    fn test_dropped_fetch_after_close_writes_nothing() {
        let cache = cache();
        let ticket = cache.begin_fetch(3).unwrap();
        let pending = cache.fetch(ticket);
        cache.close();
        drop(pending);
        assert!(cache.entry(3).unwrap().error.is_none());
    }

    #[test]
    fn test_set_last_chapter_keeps_entries() {
        let cache = cache();
        let ticket = cache.begin_fetch(4).unwrap();
        let _ = cache.complete(ticket, Ok(text(1)));
        cache.set_last_chapter(Some(4));
        assert_eq!(cache.last_chapter(), Some(4));
        assert_eq!(cache.begin_fetch(5).unwrap_err(), SkipReason::PastEnd);
        assert_eq!(cache.entry(4).unwrap().verses.len(), 1);
        cache.set_last_chapter(None);
        assert_eq!(cache.last_chapter(), None);
    }
}
