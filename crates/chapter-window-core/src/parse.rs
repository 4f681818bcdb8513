//! Text API response parsing and verse pairing.
//!
//! The text API answers `GET /texts/{book}.{chapter}` with an object holding
//! a `versions` array. Each version carries a `language` tag and a `text`
//! array with one entry per verse:
//!
//! ```json
//! {
//!   "versions": [
//!     { "language": "he", "text": ["בְּרֵאשִׁית...", "וְהָאָרֶץ..."] },
//!     { "language": "en", "text": ["In the beginning...", "Now the earth..."] }
//!   ]
//! }
//! ```
//!
//! Missing fields never fail the parse. An absent `versions` array or an
//! absent language maps to [`LanguageText::Missing`], which pairs as zero
//! verses.
//!
//! # Example
//!
//! ```rust
//! use chapter_window_core::parse::{pair_verses, parse_chapter_response};
//!
//! let body = serde_json::json!({
//!     "versions": [
//!         { "language": "he", "text": ["a", "b", "c"] },
//!         { "language": "en", "text": ["A", "B"] }
//!     ]
//! });
//! let text = parse_chapter_response(&body, "he", "en");
//! let verses = pair_verses(&text);
//! assert_eq!(verses.len(), 2);
//! assert_eq!(verses[1].secondary_text, "B");
//! ```

use serde_json::Value;

use crate::models::VerseRecord;

/// Per-verse strings for one language variant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LanguageText {
    Present(Vec<String>),
    /// The response carried no version for this language.
    #[default]
    Missing,
}

impl LanguageText {
    pub fn segments(&self) -> &[String] {
        match self {
            LanguageText::Present(segments) => segments,
            LanguageText::Missing => &[],
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, LanguageText::Missing)
    }
}

/// Both language variants of a chapter, as returned by a text source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChapterText {
    pub primary: LanguageText,
    pub secondary: LanguageText,
}

impl ChapterText {
    pub fn new(primary: Vec<String>, secondary: Vec<String>) -> Self {
        Self {
            primary: LanguageText::Present(primary),
            secondary: LanguageText::Present(secondary),
        }
    }

    /// A chapter with neither variant present.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Extract the primary and secondary variants from a text API response.
pub fn parse_chapter_response(body: &Value, primary_lang: &str, secondary_lang: &str) -> ChapterText {
    let versions = match body.get("versions").and_then(|v| v.as_array()) {
        Some(versions) => versions,
        None => return ChapterText::empty(),
    };

    ChapterText {
        primary: find_language(versions, primary_lang),
        secondary: find_language(versions, secondary_lang),
    }
}

/// First version whose `language` equals `lang`.
fn find_language(versions: &[Value], lang: &str) -> LanguageText {
    let version = versions
        .iter()
        .find(|v| v.get("language").and_then(|l| l.as_str()) == Some(lang));

    match version.and_then(|v| v.get("text")) {
        Some(text) => {
            let mut segments = Vec::new();
            flatten_segments(text, &mut segments);
            LanguageText::Present(segments)
        }
        None => LanguageText::Missing,
    }
}

/// Flatten a (possibly jagged) text array into per-verse strings.
///
/// Nested arrays are walked depth-first in order. A bare string becomes a
/// single segment. Other scalars become empty segments so positions stay
/// aligned with the other language.
fn flatten_segments(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                flatten_segments(item, out);
            }
        }
        _ => out.push(String::new()),
    }
}

/// Pair the two variants by position.
///
/// Verse *i* takes index *i* of both variants. Pairing stops at the shorter
/// variant; the excess of the longer one is dropped.
pub fn pair_verses(text: &ChapterText) -> Vec<VerseRecord> {
    text.primary
        .segments()
        .iter()
        .zip(text.secondary.segments())
        .enumerate()
        .map(|(i, (primary, secondary))| VerseRecord {
            verse_number: i as u32 + 1,
            primary_text: primary.clone(),
            secondary_text: secondary.clone(),
        })
        .collect()
}
