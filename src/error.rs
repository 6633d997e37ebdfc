//! Custom error types and result handling for word counting operations.
//!
//! All fallible operations return a [`Result<T>`] which is a type alias for
//! `std::result::Result<T, Error>`. File-level variants ([`Error::NotEpub`],
//! [`Error::Parse`], [`Error::DrmProtected`]) abort a single book only;
//! [`Error::ChapterFetch`] never leaves the chapter reader.
//!
use std::path::PathBuf;

/// Type alias for Results with word count errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all word counting operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// ZIP container errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// XML errors from the OPF/NCX readers
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::wordcount::WordCountConfigBuilderError),
    /// The path does not name an `.epub` file
    #[error("unable to parse non-epub file: {0:?}")]
    NotEpub(PathBuf),
    /// The container or its package documents could not be parsed
    #[error("{message} :: (path: {path:?})")]
    Parse { path: PathBuf, message: String },
    /// The book is DRM encumbered and the configuration asked to fail on it
    #[error("Unable to accurately count \"{title}\" because it's DRM encumbered")]
    DrmProtected { title: String },
    /// A single chapter could not be read
    #[error("failed to read chapter '{id}': {message}")]
    ChapterFetch { id: String, message: String },
    /// Error for paths that don't exist
    #[error("Not found: {0:?}")]
    NotFound(PathBuf),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Wraps any displayable failure as a [`Error::Parse`] for `path`.
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Wraps any displayable failure as a [`Error::ChapterFetch`] for chapter `id`.
    pub fn chapter(id: impl Into<String>, message: impl ToString) -> Self {
        Error::ChapterFetch {
            id: id.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
