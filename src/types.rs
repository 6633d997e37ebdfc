//! Core data types shared by the reader, the statistics functions and the CLI.
//!
//! - Book description (`BookMetadata`, `TocEntry`)
//! - Results (`BookStats`, `BookReport`)
//! - Enumerations for output settings (`CountMode`)

use std::path::{Path, PathBuf};

/// Dublin Core metadata of a parsed book.
///
/// `title` is empty when the package document does not carry one.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BookMetadata {
    pub title: String,
    pub creator: Option<String>,
    pub creator_file_as: Option<String>,
    pub language: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
}

/// One node of the book's navigation structure, one per chapter candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TocEntry {
    /// Nesting depth in the table of contents, 0 for top level entries.
    pub level: usize,
    /// Position in reading order.
    pub order: usize,
    pub title: Option<String>,
    /// Manifest id, used to fetch the chapter content.
    pub id: String,
    pub href: Option<String>,
}

impl TocEntry {
    /// Creates an untitled entry for manifest item `id`.
    pub fn new(id: impl Into<String>, order: usize) -> Self {
        Self {
            id: id.into(),
            order,
            ..Default::default()
        }
    }

    /// Sets the entry title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Aggregate statistics over all included chapters of one book.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BookStats {
    pub title: Option<String>,
    /// Normalized chapter texts joined with a single newline.
    pub text: String,
    pub word_count: usize,
    /// Length of `text` in characters.
    pub character_count: usize,
    pub has_drm: bool,
}

impl BookStats {
    /// Returns the count selected by `mode`.
    pub fn count(&self, mode: CountMode) -> usize {
        match mode {
            CountMode::Words => self.word_count,
            CountMode::Characters => self.character_count,
        }
    }
}

/// Which quantity a report should show.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CountMode {
    #[default]
    Words,
    Characters,
}

impl CountMode {
    /// Plural noun used in human readable output.
    pub fn label(&self) -> &'static str {
        match self {
            CountMode::Words => "words",
            CountMode::Characters => "characters",
        }
    }
}

/// Outcome for a single file of a multi-path run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BookReport {
    Counted { path: PathBuf, stats: BookStats },
    Skipped { path: PathBuf, reason: String },
}

impl BookReport {
    pub fn path(&self) -> &Path {
        match self {
            BookReport::Counted { path, .. } | BookReport::Skipped { path, .. } => path,
        }
    }

    pub fn stats(&self) -> Option<&BookStats> {
        match self {
            BookReport::Counted { stats, .. } => Some(stats),
            BookReport::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, BookReport::Skipped { .. })
    }
}
