use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::book::{Book, EpubBook};
use crate::chapters::ChapterReader;
use crate::collector::Collector;
use crate::diagnostics::{Diagnostics, LogDiagnostics};
use crate::error::{Error, Result};
use crate::path_utils::{has_epub_extension, path_to_string_lossy};
use crate::text::{Normalizer, count_characters, count_words};
use crate::types::{BookReport, BookStats};

/// Where a book comes from: a path to parse, or a book parsed earlier.
#[derive(Debug, Clone)]
pub enum BookSource {
    Path(PathBuf),
    Book(EpubBook),
}

impl From<PathBuf> for BookSource {
    fn from(path: PathBuf) -> Self {
        BookSource::Path(path)
    }
}

impl From<&Path> for BookSource {
    fn from(path: &Path) -> Self {
        BookSource::Path(path.to_path_buf())
    }
}

impl From<&str> for BookSource {
    fn from(path: &str) -> Self {
        BookSource::Path(PathBuf::from(path))
    }
}

impl From<EpubBook> for BookSource {
    fn from(book: EpubBook) -> Self {
        BookSource::Book(book)
    }
}

fn default_chapter_concurrency() -> usize {
    num_cpus::get().clamp(1, 8)
}

fn default_book_concurrency() -> usize {
    num_cpus::get().clamp(1, 4)
}

/// The word counting configuration, built declaratively using the builder pattern.
///
/// Every statistics operation hangs off this struct, so DRM policy, text
/// normalization options and concurrency limits apply uniformly:
///
/// - [`parse_epub_at_path`](WordCountConfig::parse_epub_at_path) / [`resolve_book`](WordCountConfig::resolve_book): open a book and enforce the DRM policy
/// - [`text_from_book`](WordCountConfig::text_from_book): normalized text of every counted chapter
/// - [`count_words_in_book`](WordCountConfig::count_words_in_book) / [`count_characters_in_book`](WordCountConfig::count_characters_in_book)
/// - [`book_details`](WordCountConfig::book_details): everything above at once
/// - [`process_paths`](WordCountConfig::process_paths): files and directory trees, one report per EPUB
///
/// ## Builder Pattern
///
/// ```rust,no_run
/// # use epub_wordcount::prelude::*;
/// let config = WordCountConfig::builder()
///     .throw_for_drm(true)
///     .floating_dashes(true)
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct WordCountConfig {
    /// Fail with [`Error::DrmProtected`] when a book is DRM encumbered.
    ///
    /// When `false` the book is returned anyway and a debug message is logged;
    /// its chapters then count as empty unless [`ignore_drm`](WordCountConfig::ignore_drm) is set.
    #[builder(default = "false")]
    pub throw_for_drm: bool,

    /// Read chapters of DRM encumbered books regardless. Usually yields
    /// garbage, but some "protected" books only obfuscate their fonts.
    /// Overrides [`throw_for_drm`](WordCountConfig::throw_for_drm).
    #[builder(default = "false")]
    pub ignore_drm: bool,

    /// Abort [`process_paths`](WordCountConfig::process_paths) on the first
    /// file that can't be counted instead of reporting it as skipped.
    #[builder(default = "false")]
    pub fragile: bool,

    /// Treat `-` and `—` as punctuation that sticks to the preceding word.
    #[builder(default = "false")]
    pub floating_dashes: bool,

    /// Drop emphasis tags (`<i>`, `<em>`, `<b>`, `<strong>`) without
    /// leaving a space, so split words stay whole.
    #[builder(default = "true")]
    pub join_inline_tags: bool,

    /// Keep each book's normalized text in the reports of
    /// [`process_paths`](WordCountConfig::process_paths). Counts are
    /// unaffected.
    #[builder(default = "false")]
    pub keep_text: bool,

    /// Number of chapters of one book fetched at the same time.
    #[builder(default = "default_chapter_concurrency()")]
    pub max_concurrent_chapters: usize,

    /// Number of books [`process_paths`](WordCountConfig::process_paths) reads at the same time.
    #[builder(default = "default_book_concurrency()")]
    pub max_concurrent_books: usize,

    /// Receives warnings and debug notes. Defaults to the `log` crate.
    #[builder(default = "Arc::new(LogDiagnostics) as Arc<dyn Diagnostics>")]
    pub diagnostics: Arc<dyn Diagnostics>,
}

impl fmt::Debug for WordCountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordCountConfig")
            .field("throw_for_drm", &self.throw_for_drm)
            .field("ignore_drm", &self.ignore_drm)
            .field("fragile", &self.fragile)
            .field("floating_dashes", &self.floating_dashes)
            .field("join_inline_tags", &self.join_inline_tags)
            .field("keep_text", &self.keep_text)
            .field("max_concurrent_chapters", &self.max_concurrent_chapters)
            .field("max_concurrent_books", &self.max_concurrent_books)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl Default for WordCountConfig {
    fn default() -> Self {
        Self {
            throw_for_drm: false,
            ignore_drm: false,
            fragile: false,
            floating_dashes: false,
            join_inline_tags: true,
            keep_text: false,
            max_concurrent_chapters: default_chapter_concurrency(),
            max_concurrent_books: default_book_concurrency(),
            diagnostics: Arc::new(LogDiagnostics),
        }
    }
}

impl WordCountConfig {
    /// Creates a new builder for configuring `WordCountConfig`.
    pub fn builder() -> WordCountConfigBuilder {
        WordCountConfigBuilder::default()
    }

    /// The text normalizer matching this configuration.
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.floating_dashes, self.join_inline_tags)
    }

    /// Opens the EPUB at `path` and applies the DRM policy.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of a `.epub` file
    ///
    /// # Returns
    ///
    /// * `Ok(EpubBook)` - The parsed book, DRM encumbered or not unless
    ///   [`throw_for_drm`](WordCountConfig::throw_for_drm) is set
    /// * `Err(Error::NotEpub)` - The file name doesn't end in `.epub`
    /// * `Err(Error::Parse)` - The file is missing or malformed
    /// * `Err(Error::DrmProtected)` - DRM was detected and the configuration forbids it
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use epub_wordcount::prelude::*;
    /// # #[tokio::main]
    /// # async fn main() -> epub_wordcount::error::Result<()> {
    /// let config = WordCountConfig::default();
    /// let book = config.parse_epub_at_path("books/jekyll-hyde.epub").await?;
    /// println!("{} words", config.count_words_in_book(&book).await);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn parse_epub_at_path(&self, path: impl AsRef<Path>) -> Result<EpubBook> {
        let path = path.as_ref();
        if !has_epub_extension(path) {
            return Err(Error::NotEpub(path.to_path_buf()));
        }

        let book = EpubBook::open(path).await?;
        self.check_drm(&book)?;
        Ok(book)
    }

    /// Returns a validated book from either a path or an already parsed book.
    pub async fn resolve_book(&self, source: impl Into<BookSource>) -> Result<EpubBook> {
        match source.into() {
            BookSource::Path(path) => self.parse_epub_at_path(path).await,
            BookSource::Book(book) => {
                self.check_drm(&book)?;
                Ok(book)
            }
        }
    }

    fn check_drm<B: Book + ?Sized>(&self, book: &B) -> Result<()> {
        if !book.has_drm() || self.ignore_drm {
            return Ok(());
        }

        let err = Error::DrmProtected {
            title: book.title().to_string(),
        };
        if self.throw_for_drm {
            return Err(err);
        }
        self.diagnostics.debug(&err.to_string());
        Ok(())
    }

    async fn chapters<B: Book + ?Sized>(&self, book: &B) -> Vec<String> {
        let normalizer = self.normalizer();
        ChapterReader::new(
            &normalizer,
            self.diagnostics.as_ref(),
            self.max_concurrent_chapters,
        )
        .read_chapters(book, self.ignore_drm)
        .await
    }

    /// Normalized text of every counted chapter, joined with newlines.
    pub async fn text_from_book<B: Book + ?Sized>(&self, book: &B) -> String {
        self.chapters(book).await.join("\n")
    }

    /// Number of words in the counted chapters.
    pub async fn count_words_in_book<B: Book + ?Sized>(&self, book: &B) -> usize {
        self.chapters(book)
            .await
            .iter()
            .map(|chapter| count_words(chapter))
            .sum()
    }

    /// Number of characters in the counted chapters, newline separators
    /// included.
    pub async fn count_characters_in_book<B: Book + ?Sized>(&self, book: &B) -> usize {
        count_characters(&self.text_from_book(book).await)
    }

    /// Collects title, text, counts and DRM status in a single chapter pass.
    pub async fn book_details<B: Book + ?Sized>(&self, book: &B) -> BookStats {
        let chapters = self.chapters(book).await;
        let word_count = chapters.iter().map(|chapter| count_words(chapter)).sum();
        let text = chapters.join("\n");
        let title = book.title();

        BookStats {
            title: (!title.is_empty()).then(|| title.to_string()),
            character_count: count_characters(&text),
            text,
            word_count,
            has_drm: book.has_drm(),
        }
    }

    /// Resolves every path to the EPUB files it contains, then counts each one.
    ///
    /// Books are read concurrently, at most
    /// [`max_concurrent_books`](WordCountConfig::max_concurrent_books) at a
    /// time. Reports come back in path order. A file that can't be counted is
    /// reported as [`BookReport::Skipped`] with a warning, or aborts the run
    /// when [`fragile`](WordCountConfig::fragile) is set. Book texts are only
    /// kept in the reports when [`keep_text`](WordCountConfig::keep_text) is set.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BookReport>)` - One report per EPUB found
    /// * `Err(Error::NotFound)` - One of the roots doesn't exist
    /// * `Err(Error)` - The first file-level error, in fragile mode
    pub async fn process_paths(&self, paths: &[PathBuf]) -> Result<Vec<BookReport>> {
        let epub_paths = Collector::new(self.diagnostics.as_ref())
            .collect_many(paths)
            .await?;

        let mut reports = Vec::with_capacity(epub_paths.len());
        let mut outcomes = stream::iter(epub_paths)
            .map(|path| async move {
                let outcome = match self.parse_epub_at_path(&path).await {
                    Ok(book) => Ok(self.book_details(&book).await),
                    Err(e) => Err(e),
                };
                (path, outcome)
            })
            .buffered(self.max_concurrent_books.max(1));

        while let Some((path, outcome)) = outcomes.next().await {
            match outcome {
                Ok(mut stats) => {
                    if !self.keep_text {
                        stats.text = String::new();
                    }
                    reports.push(BookReport::Counted { path, stats });
                }
                // Dropping the stream cancels the books still in flight
                Err(e) if self.fragile => return Err(e),
                Err(e) => {
                    self.diagnostics.warn(&format!(
                        "Skipping {}: {}",
                        path_to_string_lossy(&path),
                        e
                    ));
                    reports.push(BookReport::Skipped {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(reports)
    }
}

impl WordCountConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(0) = self.max_concurrent_chapters {
            return Err("max_concurrent_chapters must be at least 1.".to_string());
        }
        if let Some(0) = self.max_concurrent_books {
            return Err("max_concurrent_books must be at least 1.".to_string());
        }
        Ok(())
    }
}
