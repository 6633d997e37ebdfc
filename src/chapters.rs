//! Chapter selection and reading.
//!
//! [`should_include`] decides from a table-of-contents title whether an entry
//! is front matter, and [`ChapterReader`] fetches and normalizes every
//! remaining chapter of a [`Book`], in reading order.

use futures::stream::{self, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;

use crate::book::Book;
use crate::diagnostics::{Diagnostics, LogDiagnostics};
use crate::text::Normalizer;
use crate::types::TocEntry;

/// Default number of chapters fetched at the same time.
pub const DEFAULT_MAX_CONCURRENT_CHAPTERS: usize = 8;

lazy_static! {
    /// Titles of boilerplate sections that don't count towards a book's text.
    /// Matched anywhere in the title, ignoring case.
    pub static ref IGNORED_TITLES_REGEX: Regex =
        Regex::new(r"(?i)acknowledgment|copyright|cover|dedication|title|author|contents").unwrap();
}

/// Returns whether `entry` should contribute to the book statistics.
///
/// Entries without a title are always included; front matter can't be told
/// apart from content without one.
pub fn should_include(entry: &TocEntry) -> bool {
    match entry.title.as_deref() {
        Some(title) if !title.is_empty() => !IGNORED_TITLES_REGEX.is_match(title),
        _ => true,
    }
}

/// Fetches and normalizes the included chapters of a book.
#[derive(Debug)]
pub struct ChapterReader<'a> {
    normalizer: &'a Normalizer,
    diagnostics: &'a dyn Diagnostics,
    max_concurrent: usize,
}

impl<'a> ChapterReader<'a> {
    /// Creates a new reader.
    ///
    /// # Arguments
    ///
    /// * `normalizer` - Cleaner applied to each chapter's markup
    /// * `diagnostics` - Sink for chapters that fail to load
    /// * `max_concurrent` - Number of chapters fetched at once (at least 1)
    pub fn new(
        normalizer: &'a Normalizer,
        diagnostics: &'a dyn Diagnostics,
        max_concurrent: usize,
    ) -> Self {
        Self {
            normalizer,
            diagnostics,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Returns the normalized text of every included chapter, in reading order.
    ///
    /// A DRM encumbered book yields nothing unless `ignore_drm` is set. Chapters
    /// that fail to load or normalize to an empty string are left out.
    pub async fn read_chapters<B>(&self, book: &B, ignore_drm: bool) -> Vec<String>
    where
        B: Book + ?Sized,
    {
        if book.has_drm() && !ignore_drm {
            return Vec::new();
        }

        stream::iter(book.reading_order().iter().filter(|entry| should_include(entry)))
            .map(|entry| self.read_chapter(book, entry))
            // `buffered` yields in input order whatever order fetches finish in
            .buffered(self.max_concurrent)
            .filter_map(|text| async move { text })
            .collect()
            .await
    }

    async fn read_chapter<B>(&self, book: &B, entry: &TocEntry) -> Option<String>
    where
        B: Book + ?Sized,
    {
        match book.fetch_chapter(&entry.id).await {
            Ok(raw) => {
                let text = self.normalizer.normalize(&raw);
                (!text.is_empty()).then_some(text)
            }
            Err(e) => {
                self.diagnostics.debug(&format!(
                    "failed to parse chapter id: {} because of error: \"{}\" in book {}",
                    entry.id,
                    e,
                    book.metadata().title
                ));
                None
            }
        }
    }
}

/// Reads the chapters of `book` with the default normalizer, logging through
/// the `log` crate.
pub async fn read_chapters<B>(book: &B, ignore_drm: bool) -> Vec<String>
where
    B: Book + ?Sized,
{
    let normalizer = Normalizer::default();
    ChapterReader::new(&normalizer, &LogDiagnostics, DEFAULT_MAX_CONCURRENT_CHAPTERS)
        .read_chapters(book, ignore_drm)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(title: &str) -> TocEntry {
        TocEntry::new("id", 0).with_title(title)
    }

    #[test]
    fn test_boilerplate_titles_are_excluded() {
        for title in [
            "Copyright",
            "COVER",
            "Dedication",
            "Title Page",
            "About the Author",
            "Table of Contents",
            "Acknowledgments",
        ] {
            assert!(!should_include(&titled(title)), "{title} should be excluded");
        }
    }

    #[test]
    fn test_untitled_and_content_entries_are_included() {
        assert!(should_include(&titled("")));
        assert!(should_include(&TocEntry::new("id", 0)));
        assert!(should_include(&titled("Chapter 1")));
        assert!(should_include(&titled("Story of the Door")));
    }

    #[test]
    fn test_substring_match_is_kept() {
        // "Recovery" contains "cover"; the heuristic excludes it on purpose
        assert!(!should_include(&titled("Recovery")));
    }
}
