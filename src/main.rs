//! # Chapter Window CLI (`cw`)
//!
//! Drives a reader view against the configured text API and prints what
//! the chapter cache holds.
//!
//! ## Usage
//!
//! ```bash
//! cw --config ./config/cw.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cw read <book> <chapter>` | Mount a reader view, optionally scroll, print the cache |
//! | `cw fetch <book> <chapter>` | Fetch and print a single chapter |
//! | `cw check` | Validate and print the effective configuration |
//!
//! ## Examples
//!
//! ```bash
//! # Genesis 5 with its neighbours
//! cw read Genesis 5
//!
//! # Scroll down twice, following the loaded range
//! cw read Genesis 5 --down 2 --advancing
//!
//! # JSON on stdout, JSON progress on stderr
//! cw read Exodus 1 --json --progress json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chapter_window::config::{self, Config};
use chapter_window::http_source::HttpTextSource;
use chapter_window::logging;
use chapter_window::progress::ProgressMode;
use chapter_window::reader::{AnchorPolicy, Boundary, ReaderView};
use chapter_window::render;
use clap::{Parser, Subcommand};

/// Chapter Window CLI: incremental chapter loading for a text reader.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "cw",
    about = "Chapter Window: incremental, direction-aware chapter loading for a text reader",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cw.toml")]
    config: PathBuf,

    /// Progress on stderr: `off`, `human`, or `json`.
    ///
    /// Defaults to `human` when stderr is a terminal, otherwise `off`.
    #[arg(long, global = true)]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Mount a reader view at a chapter and print the cache.
    ///
    /// Seeds the window around the chapter, then fires the bottom and top
    /// boundaries the requested number of times, waiting for each round
    /// of requests to finish.
    Read {
        /// Book name as the text API knows it (e.g. `Genesis`).
        book: String,

        /// Chapter to anchor the view at (1-based).
        #[arg(allow_negative_numbers = true)]
        chapter: i64,

        /// Times the bottom boundary becomes visible.
        #[arg(long, default_value_t = 0)]
        down: usize,

        /// Times the top boundary becomes visible.
        #[arg(long, default_value_t = 0)]
        up: usize,

        /// Follow the loaded range instead of the navigation chapter.
        /// Overrides `reader.anchor_policy`.
        #[arg(long)]
        advancing: bool,

        /// Number of chapters in the book, if known.
        #[arg(long)]
        last_chapter: Option<u32>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Fetch a single chapter and print it.
    Fetch {
        book: String,
        #[arg(allow_negative_numbers = true)]
        chapter: i64,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and print the effective values.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let cfg = config::load_or_default(&cli.config)?;
    config::validate(&cfg)?;
    let progress = ProgressMode::from_flag(cli.progress.as_deref())?;

    match cli.command {
        Commands::Read {
            book,
            chapter,
            down,
            up,
            advancing,
            last_chapter,
            json,
        } => {
            let policy = if advancing {
                AnchorPolicy::Advancing
            } else {
                cfg.reader.anchor_policy.parse()?
            };
            let mut view = reader_view(&cfg, progress, &book, chapter)?
                .with_policy(policy)
                .with_last_chapter(last_chapter);

            view.mount();
            view.settle().await;
            for _ in 0..down {
                view.boundary_visible(Boundary::Bottom);
                view.settle().await;
            }
            for _ in 0..up {
                view.boundary_visible(Boundary::Top);
                view.settle().await;
            }

            print_entries(&view, json)?;
            view.unmount();
        }
        Commands::Fetch {
            book,
            chapter,
            json,
        } => {
            let view = reader_view(&cfg, progress, &book, chapter)?;
            view.cache().ensure_chapter(chapter).await;
            print_entries(&view, json)?;
        }
        Commands::Check => {
            print_config(&cfg);
        }
    }

    Ok(())
}

fn reader_view(cfg: &Config, progress: ProgressMode, book: &str, chapter: i64) -> Result<ReaderView> {
    let source = Arc::new(HttpTextSource::new(&cfg.source)?);
    Ok(ReaderView::new(source, book, chapter).with_reporter(Arc::from(progress.reporter())))
}

fn print_entries(view: &ReaderView, json: bool) -> Result<()> {
    let entries = view.snapshot();
    if json {
        println!("{}", render::render_json(&entries)?);
    } else if entries.is_empty() {
        println!("No chapters requested.");
    } else {
        print!("{}", render::render_text(view.book(), &entries));
    }
    Ok(())
}

fn print_config(cfg: &Config) {
    let source = &cfg.source;
    println!("{:<28} {}", "source.base_url", source.base_url);
    println!("{:<28} {}", "source.primary_language", source.primary_language);
    println!("{:<28} {}", "source.secondary_language", source.secondary_language);
    println!("{:<28} {}", "source.primary_version", source.primary_version);
    println!("{:<28} {}", "source.secondary_version", source.secondary_version);
    println!(
        "{:<28} {}",
        "source.fill_in_missing_segments", source.fill_in_missing_segments
    );
    println!("{:<28} {}", "source.timeout_secs", source.timeout_secs);
    println!("{:<28} {}", "reader.anchor_policy", cfg.reader.anchor_policy);
}
