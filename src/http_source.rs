//! HTTP text source.
//!
//! Fetches chapters from a text API:
//!
//! ```text
//! GET {base_url}/texts/{book}.{chapter}?version=<primary>&version=<secondary>&fill_in_missing_segments=1
//! ```
//!
//! The JSON body is handed to
//! [`parse_chapter_response`](chapter_window_core::parse::parse_chapter_response),
//! which selects the two variants by language tag. A body that is valid
//! JSON but lacks the expected fields yields empty text, not an error.
//!
//! # Errors
//!
//! | Condition | Message recorded on the chapter |
//! |-----------|---------------------------------|
//! | non-2xx status | `HTTP <status>` |
//! | connect / request failure | connection error text |
//! | timeout | timeout text |
//! | body is not JSON | unexpected response format text |
//!
//! There is no retry here. A failed chapter is retried when the reader asks
//! for it again.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chapter_window_core::parse::{parse_chapter_response, ChapterText};
use chapter_window_core::source::{FetchError, TextSource};
use reqwest::Url;
use std::time::Duration;

use crate::config::SourceConfig;

/// [`TextSource`] backed by the remote text API.
pub struct HttpTextSource {
    client: reqwest::Client,
    base_url: Url,
    config: SourceConfig,
}

impl HttpTextSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| anyhow!("Invalid source.base_url '{}': {}", config.base_url, e))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("source.base_url cannot be used as a base: {}", config.base_url);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            config: config.clone(),
        })
    }

    /// Full request URL for one chapter.
    pub fn chapter_url(&self, book: &str, chapter: u32) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("texts")
                .push(&format!("{}.{}", book, chapter));
        }
        url.query_pairs_mut()
            .append_pair("version", &self.config.primary_version)
            .append_pair("version", &self.config.secondary_version)
            .append_pair(
                "fill_in_missing_segments",
                if self.config.fill_in_missing_segments {
                    "1"
                } else {
                    "0"
                },
            );
        url
    }
}

#[async_trait]
impl TextSource for HttpTextSource {
    async fn fetch_chapter(&self, book: &str, chapter: u32) -> Result<ChapterText, FetchError> {
        let url = self.chapter_url(book, chapter);
        tracing::debug!(%url, "fetching chapter");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(e.to_user_friendly_message()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(format!("HTTP {}", status)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::new(e.to_user_friendly_message()))?;

        Ok(parse_chapter_response(
            &body,
            &self.config.primary_language,
            &self.config.secondary_language,
        ))
    }
}

/// Short, reader-facing descriptions of transport failures.
pub trait ReqwestErrorExt {
    fn to_user_friendly_message(&self) -> String;
}

impl ReqwestErrorExt for reqwest::Error {
    fn to_user_friendly_message(&self) -> String {
        if self.is_timeout() {
            "The request timed out. The text server might be slow right now.".to_string()
        } else if self.is_connect() || self.is_request() {
            "Connection error. Please check your internet connection and try again.".to_string()
        } else if self.is_decode() {
            "Received an unexpected response format from the text server.".to_string()
        } else {
            format!("A network error occurred: {}", self)
        }
    }
}
