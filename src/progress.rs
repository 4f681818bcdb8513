//! Chapter fetch progress reporting.
//!
//! Reports what the reader view is fetching so users see chapters being
//! requested, loaded, or failing. Progress is emitted on **stderr** so
//! stdout (the rendered chapters or their JSON) stays parseable.

use std::io::Write;

use chapter_window_core::cache::{EnsureOutcome, SkipReason};

/// A single progress event for one chapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchProgressEvent {
    /// A request for this chapter was sent to the source.
    Requested { book: String, chapter: i64 },
    /// The call finished with this outcome.
    Finished {
        book: String,
        chapter: i64,
        outcome: EnsureOutcome,
    },
}

/// Reports fetch progress. Implementations write to stderr (human or JSON).
pub trait FetchProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the reader view.
    fn report(&self, event: FetchProgressEvent);
}

/// Human-friendly progress on stderr: "fetch Genesis 4  loaded 31 verses".
pub struct StderrProgress;

impl FetchProgressReporter for StderrProgress {
    fn report(&self, event: FetchProgressEvent) {
        let line = match &event {
            FetchProgressEvent::Requested { book, chapter } => {
                format!("fetch {} {}  requested\n", book, chapter)
            }
            FetchProgressEvent::Finished {
                book,
                chapter,
                outcome,
            } => format!("fetch {} {}  {}\n", book, chapter, describe(outcome)),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl FetchProgressReporter for JsonProgress {
    fn report(&self, event: FetchProgressEvent) {
        let obj = match &event {
            FetchProgressEvent::Requested { book, chapter } => serde_json::json!({
                "event": "requested",
                "book": book,
                "chapter": chapter,
            }),
            FetchProgressEvent::Finished {
                book,
                chapter,
                outcome,
            } => serde_json::json!({
                "event": "finished",
                "book": book,
                "chapter": chapter,
                "result": outcome,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl FetchProgressReporter for NoProgress {
    fn report(&self, _event: FetchProgressEvent) {}
}

fn describe(outcome: &EnsureOutcome) -> String {
    match outcome {
        EnsureOutcome::Loaded { verses: 1 } => "loaded 1 verse".to_string(),
        EnsureOutcome::Loaded { verses } => format!("loaded {} verses", verses),
        EnsureOutcome::Failed { message } => format!("failed: {}", message),
        EnsureOutcome::Discarded => "discarded (view closed)".to_string(),
        EnsureOutcome::Skipped { reason } => match reason {
            SkipReason::InvalidChapter => "skipped (no such chapter)",
            SkipReason::PastEnd => "skipped (past end of book)",
            SkipReason::Closed => "skipped (view closed)",
            SkipReason::InFlight => "skipped (already loading)",
            SkipReason::AlreadyLoaded => "skipped (already loaded)",
        }
        .to_string(),
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value; `None` means "pick for the terminal".
    pub fn from_flag(flag: Option<&str>) -> anyhow::Result<Self> {
        match flag {
            None => Ok(Self::default_for_tty()),
            Some("off") => Ok(ProgressMode::Off),
            Some("human") => Ok(ProgressMode::Human),
            Some("json") => Ok(ProgressMode::Json),
            Some(other) => anyhow::bail!(
                "Unknown progress mode: '{}'. Must be off, human, or json.",
                other
            ),
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn FetchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
