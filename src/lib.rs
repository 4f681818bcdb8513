//! # Chapter Window
//!
//! Incremental, direction-aware chapter loading for a scrolling text reader.
//!
//! A reader view shows one book at a time. As the user scrolls, sentinels at
//! the top and bottom of the rendered text become visible and ask for the
//! neighbouring chapters. The chapter cache fetches each chapter from the
//! text API at most once, never twice concurrently, and keeps failures
//! confined to the chapter they happened to.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────────┐
//! │  Boundary    │──▶│  ReaderView      │──▶│ ChapterWindow │
//! │  Top/Bottom  │   │  (sentinels)     │   │ Cache         │
//! └──────────────┘   └──────────────────┘   └──────┬────────┘
//!                                                  │ fetch_chapter
//!                                                  ▼
//!                                          ┌───────────────┐
//!                                          │ HttpTextSource │
//!                                          │ GET /texts/…   │
//!                                          └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cw read Genesis 5               # mount at Genesis 5, print chapters 4-6
//! cw read Genesis 5 --down 3      # scroll to the bottom three times
//! cw fetch Ruth 1 --json          # one chapter as JSON
//! cw check                        # validate the configuration
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`http_source`] | Text API client |
//! | [`reader`] | Reader view and scroll sentinel controller |
//! | [`progress`] | Fetch progress reporting on stderr |
//! | [`render`] | Text and JSON output of the cache |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! The cache, models, and parser live in [`chapter_window_core`], re-exported
//! here.

pub use chapter_window_core;

pub mod config;
pub mod http_source;
pub mod logging;
pub mod progress;
pub mod reader;
pub mod render;
