//! Book module provides the capability trait for parsed e-books and the EPUB
//! implementation of it.
//!
//! The statistics functions only ever talk to a [`Book`], so any container
//! reader that can list chapters in reading order and fetch their markup can
//! be plugged in.

use crate::error::Result;
use crate::types::{BookMetadata, TocEntry};
use async_trait::async_trait;

pub mod epub;
pub mod parser;

pub use epub::EpubBook;

/// Common interface for parsed, read-only books.
#[async_trait]
pub trait Book: Send + Sync {
    /// Returns the book metadata.
    fn metadata(&self) -> &BookMetadata;

    /// Whether the container carries copy protection markers.
    fn has_drm(&self) -> bool;

    /// Returns the chapter candidates in reading order.
    fn reading_order(&self) -> &[TocEntry];

    /// Fetches the markup of chapter `id`.
    ///
    /// # Returns
    /// * `Result<String>` - The chapter markup, or [`Error::ChapterFetch`](crate::error::Error::ChapterFetch)
    async fn fetch_chapter(&self, id: &str) -> Result<String>;

    /// Shortcut for the metadata title.
    fn title(&self) -> &str {
        &self.metadata().title
    }
}
