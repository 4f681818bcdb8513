//! Reader view and scroll sentinel controller.
//!
//! A [`ReaderView`] owns the chapter cache for the book being read and
//! turns boundary-visibility signals into cache requests:
//!
//! | Signal | Request (fixed anchor) |
//! |--------|------------------------|
//! | mount | `anchor - 1` (if `anchor > 1`), `anchor`, `anchor + 1` |
//! | top boundary visible | `anchor - 1`, only if `anchor > 1` |
//! | bottom boundary visible | `anchor + 1` |
//!
//! The guard check and the `loading` mark run synchronously when a signal
//! arrives; only the network request runs on a spawned task. A signal that
//! repeats while its chapter is loading, or after it is loaded, issues
//! nothing. Nothing retries on its own: an errored chapter is fetched again
//! only when its boundary becomes visible again.
//!
//! Unmounting (or dropping) the view closes the cache and aborts
//! outstanding tasks, so late responses never land in a torn-down view.
//!
//! All methods that start fetches must be called inside a tokio runtime.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Result};
use chapter_window_core::cache::{self, ChapterWindowCache, EnsureOutcome};
use chapter_window_core::models::ChapterEntry;
use chapter_window_core::source::TextSource;
use tokio::task::JoinSet;

use crate::progress::{FetchProgressEvent, FetchProgressReporter, NoProgress};

/// Which edge of the rendered content became visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Top,
    Bottom,
}

/// How boundary signals choose the chapter to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPolicy {
    /// Always one chapter either side of the navigation chapter.
    #[default]
    Fixed,
    /// One chapter past the loaded range, so prefetch keeps pace with
    /// deep scrolling.
    Advancing,
}

impl FromStr for AnchorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(AnchorPolicy::Fixed),
            "advancing" => Ok(AnchorPolicy::Advancing),
            other => bail!("Unknown anchor policy: '{}'. Must be fixed or advancing.", other),
        }
    }
}

/// The reader view for one book at a time.
pub struct ReaderView {
    source: Arc<dyn TextSource>,
    cache: Arc<ChapterWindowCache>,
    anchor: i64,
    policy: AnchorPolicy,
    reporter: Arc<dyn FetchProgressReporter>,
    tasks: JoinSet<(i64, EnsureOutcome)>,
    settled: Vec<(i64, EnsureOutcome)>,
}

impl ReaderView {
    /// A view over `book`, anchored at `chapter`. Nothing is fetched until
    /// [`mount`](Self::mount).
    pub fn new(source: Arc<dyn TextSource>, book: &str, chapter: i64) -> Self {
        let cache = Arc::new(ChapterWindowCache::new(book, source.clone()));
        Self {
            source,
            cache,
            anchor: chapter,
            policy: AnchorPolicy::default(),
            reporter: Arc::new(NoProgress),
            tasks: JoinSet::new(),
            settled: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: AnchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound requests to the book's chapter count. Entries already in the
    /// cache, and requests already in flight, are kept.
    pub fn with_last_chapter(self, last_chapter: Option<u32>) -> Self {
        self.cache.set_last_chapter(last_chapter);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FetchProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Shared handle to the cache, for the presentation layer.
    pub fn cache(&self) -> &Arc<ChapterWindowCache> {
        &self.cache
    }

    pub fn book(&self) -> &str {
        self.cache.book()
    }

    pub fn anchor(&self) -> i64 {
        self.anchor
    }

    pub fn policy(&self) -> AnchorPolicy {
        self.policy
    }

    /// Seed the three-chapter window around the anchor.
    pub fn mount(&mut self) {
        for chapter in cache::initial_window(self.anchor) {
            self.request(chapter);
        }
    }

    /// Handle a boundary becoming visible. Returns the chapter requested,
    /// or `None` when the boundary has nothing to ask for.
    pub fn boundary_visible(&mut self, boundary: Boundary) -> Option<i64> {
        let target = self.target_for(boundary)?;
        self.request(target);
        Some(target)
    }

    /// Chapter a boundary signal would request under the current policy.
    pub fn target_for(&self, boundary: Boundary) -> Option<i64> {
        let (low, high) = match self.policy {
            AnchorPolicy::Fixed => (self.anchor, self.anchor),
            AnchorPolicy::Advancing => self
                .cache
                .loaded_bounds()
                .map(|(lo, hi)| (i64::from(lo), i64::from(hi)))
                .unwrap_or((self.anchor, self.anchor)),
        };

        match boundary {
            Boundary::Top if low > 1 => Some(low - 1),
            Boundary::Top => None,
            Boundary::Bottom => high.checked_add(1),
        }
    }

    /// Wait for every outstanding request and return all outcomes recorded
    /// since the last call, in completion order.
    pub async fn settle(&mut self) -> Vec<(i64, EnsureOutcome)> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(result) => self.settled.push(result),
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::warn!(error = %e, "chapter fetch task failed"),
            }
        }
        std::mem::take(&mut self.settled)
    }

    /// Number of requests still in flight.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Entries in chapter order.
    pub fn snapshot(&self) -> Vec<ChapterEntry> {
        self.cache.snapshot()
    }

    /// Move to another book (or another place in the same book).
    ///
    /// The old cache is closed and discarded; the caller mounts again.
    pub fn navigate(&mut self, book: &str, chapter: i64) {
        self.close_current();
        let last_chapter = if book == self.cache.book() {
            self.cache.last_chapter()
        } else {
            None
        };
        self.cache = Arc::new(
            ChapterWindowCache::new(book, self.source.clone()).with_last_chapter(last_chapter),
        );
        self.anchor = chapter;
        self.settled.clear();
    }

    /// Tear down the view: close the cache and abort in-flight requests.
    pub fn unmount(&mut self) {
        self.close_current();
    }

    fn close_current(&mut self) {
        self.cache.close();
        self.tasks.abort_all();
    }

    fn request(&mut self, chapter: i64) {
        let book = self.cache.book().to_string();
        let ticket = match self.cache.begin_fetch(chapter) {
            Ok(ticket) => ticket,
            Err(reason) => {
                let outcome = EnsureOutcome::Skipped { reason };
                self.reporter.report(FetchProgressEvent::Finished {
                    book,
                    chapter,
                    outcome: outcome.clone(),
                });
                self.settled.push((chapter, outcome));
                return;
            }
        };
        self.reporter.report(FetchProgressEvent::Requested {
            book: book.clone(),
            chapter,
        });

        let cache = self.cache.clone();
        let reporter = self.reporter.clone();
        self.tasks.spawn(async move {
            let outcome = cache.fetch(ticket).await;
            reporter.report(FetchProgressEvent::Finished {
                book,
                chapter,
                outcome: outcome.clone(),
            });
            (chapter, outcome)
        });
    }
}

impl Drop for ReaderView {
    fn drop(&mut self) {
        self.cache.close();
    }
}
