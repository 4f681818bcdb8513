//! # Chapter Window Core
//!
//! Runtime-agnostic logic for chapter-window: data models, the parse step
//! that turns a text API response into paired verses, the per-book chapter
//! cache state machine, and the [`source::TextSource`] trait.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! native-only dependencies. The native `chapter-window` crate supplies the
//! HTTP source and the reader view that drives the cache.

pub mod cache;
pub mod models;
pub mod parse;
pub mod source;
