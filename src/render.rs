//! Plain-text and JSON dumps of the reader cache.
//!
//! Entries are rendered in chapter order with loading and error states
//! inline, the way a reader shows them where the chapter would appear.

use chapter_window_core::models::{ChapterEntry, ChapterState};
use serde::Serialize;

/// JSON shape of one entry, with its derived state spelled out.
#[derive(Debug, Serialize)]
pub struct EntryView<'a> {
    pub state: ChapterState,
    #[serde(flatten)]
    pub entry: &'a ChapterEntry,
}

/// Render entries as text, one verse per line.
pub fn render_text(book: &str, entries: &[ChapterEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!("== {} {} ==\n", book, entry.chapter_number));
        match entry.state() {
            ChapterState::Loading => out.push_str("(loading…)\n"),
            ChapterState::Errored => {
                let message = entry.error.as_deref().unwrap_or("unknown error");
                out.push_str(&format!("(could not load chapter: {})\n", message));
            }
            ChapterState::ReadyEmpty => out.push_str("(no text)\n"),
            ChapterState::Ready => {
                for verse in &entry.verses {
                    out.push_str(&format!(
                        "{:>3}  {}\n     {}\n",
                        verse.verse_number, verse.primary_text, verse.secondary_text
                    ));
                }
            }
        }
        out.push('\n');
    }
    out
}

/// Render entries as a pretty-printed JSON array.
pub fn render_json(entries: &[ChapterEntry]) -> serde_json::Result<String> {
    let views: Vec<EntryView<'_>> = entries
        .iter()
        .map(|entry| EntryView {
            state: entry.state(),
            entry,
        })
        .collect();
    serde_json::to_string_pretty(&views)
}
