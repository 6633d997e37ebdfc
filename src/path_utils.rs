//! Path utilities for EPUB discovery.
//!
//! EPUB files are recognized by name only, never by sniffing their content.

use std::path::Path;

/// File extension of EPUB containers, without the dot.
pub const EPUB_EXTENSION: &str = "epub";

/// Checks whether the last segment of `path` ends in `.epub` (ASCII case
/// insensitive). Works for directories too, which is how fake EPUBs are
/// spotted.
///
/// # Arguments
///
/// * `path` - The path to check
///
/// # Returns
///
/// * `bool` - True if the name carries the EPUB extension
pub fn has_epub_extension(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| {
            name.rsplit_once('.')
                .map(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(EPUB_EXTENSION))
        })
        .unwrap_or(false)
}

/// Gets the file name from a path with fallback to lossy conversion.
///
/// # Arguments
///
/// * `path` - The path to extract the file name from
///
/// # Returns
///
/// * `String` - The file name, using lossy conversion if necessary
pub fn get_file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Checks if a filename is a macOS AppleDouble resource fork (`._book.epub`).
///
/// These carry the name of the file they shadow but hold no EPUB data. Other
/// dot-prefixed names are ordinary entries.
pub fn is_resource_fork(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with("._"))
        .unwrap_or(false)
}
