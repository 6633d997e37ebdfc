//! epub-wordcount - Word and Character Counts for EPUB Books
//!
//! This crate provides an asynchronous, declarative API for measuring the
//! prose of EPUB books. Front matter (cover, copyright, dedication, table of
//! contents, ...) is left out, markup is stripped and the remaining text is
//! normalized before anything is counted.
//!
//! # Getting Started
//!
//! Configure a [`WordCountConfig`] via its builder, then open books and ask
//! for their statistics, or hand whole directory trees to
//! [`process_paths`](WordCountConfig::process_paths).
//!
//! ```rust,no_run
//! use epub_wordcount::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> epub_wordcount::error::Result<()> {
//!     // 1. Configure the counting task
//!     let config = WordCountConfig::builder()
//!         .throw_for_drm(false)
//!         .floating_dashes(true)
//!         .build()?;
//!
//!     // 2. Count a single book
//!     let book = config.parse_epub_at_path("books/jekyll-hyde.epub").await?;
//!     let stats = config.book_details(&book).await;
//!     println!("{}: {} words", book.title(), stats.word_count);
//!
//!     // 3. Or count everything below a directory
//!     for report in config.process_paths(&[PathBuf::from("books")]).await? {
//!         if let Some(stats) = report.stats() {
//!             println!("{:?}: {} characters", report.path(), stats.character_count);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! The building blocks ([`text::Normalizer`], [`chapters::ChapterReader`],
//! [`collector::Collector`]) can also be used on their own, and any container
//! format can be counted by implementing [`book::Book`].

pub mod book;
pub mod chapters;
pub mod collector;
pub mod diagnostics;
pub mod error;
pub mod path_utils;
pub mod text;
pub mod types;
pub mod wordcount;

// Publicly expose the main `WordCountConfig` struct and its builder
pub use wordcount::BookSource;
pub use wordcount::WordCountConfig;
pub use wordcount::WordCountConfigBuilder;

// Re-export core types for direct access
pub use book::{Book, EpubBook};
pub use diagnostics::{Diagnostics, LogDiagnostics, MemoryDiagnostics};
pub use text::{Normalizer, count_characters, count_words, normalize};
pub use types::{BookMetadata, BookReport, BookStats, CountMode, TocEntry};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use epub_wordcount::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        Book, BookMetadata, BookReport, BookSource, BookStats, CountMode, Diagnostics,
        EpubBook, LogDiagnostics, MemoryDiagnostics, Normalizer, TocEntry, WordCountConfig,
        WordCountConfigBuilder, error, types,
    };
    pub use crate::chapters::{ChapterReader, should_include};
    pub use crate::collector::Collector;
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}
