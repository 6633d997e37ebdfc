//! EPUB discovery module.
//!
//! This module walks a file or directory tree and collects the paths of every
//! EPUB file beneath it. Subdirectories are listed concurrently. Directories
//! that are themselves named like an EPUB ("fake EPUBs", usually an unzipped
//! book) are reported and skipped.

use std::path::{Path, PathBuf};

use futures::future::{BoxFuture, FutureExt, try_join_all};
use tokio::fs::{ReadDir, metadata, read_dir};

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::path_utils::{has_epub_extension, is_resource_fork, path_to_string_lossy};

/// Directory nesting below which the walk stops descending.
pub const MAX_DEPTH: usize = 64;

/// Collects EPUB paths from files and directory trees.
#[derive(Debug)]
pub struct Collector<'a> {
    diagnostics: &'a dyn Diagnostics,
    max_depth: usize,
}

impl<'a> Collector<'a> {
    /// Creates a new Collector reporting through `diagnostics`.
    pub fn new(diagnostics: &'a dyn Diagnostics) -> Self {
        Self {
            diagnostics,
            max_depth: MAX_DEPTH,
        }
    }

    /// Overrides how deep the walk may descend.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Collects every EPUB file at or below `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - A file or directory
    ///
    /// # Returns
    ///
    /// * `Result<Vec<PathBuf>>` - EPUB paths in no particular order, or
    ///   [`Error::NotFound`] if `path` doesn't exist
    pub async fn collect_epub_paths(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if let Err(e) = metadata(path).await {
            return Err(match e.kind() {
                std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
                _ => Error::Io(e),
            });
        }
        self.collect_recursive(path.to_path_buf(), 0).await
    }

    /// Collects from several roots; the result is sorted and free of duplicates.
    pub async fn collect_many(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let per_root = try_join_all(paths.iter().map(|p| self.collect_epub_paths(p))).await?;

        let mut all: Vec<PathBuf> = per_root.into_iter().flatten().collect();
        all.sort();
        all.dedup();
        Ok(all)
    }

    fn collect_recursive(&self, path: PathBuf, depth: usize) -> BoxFuture<'_, Result<Vec<PathBuf>>> {
        async move {
            let stat = match metadata(&path).await {
                Ok(stat) => stat,
                Err(e) => {
                    self.diagnostics.warn(&format!(
                        "Skipping {}: {}",
                        path_to_string_lossy(&path),
                        e
                    ));
                    return Ok(Vec::new());
                }
            };

            if stat.is_dir() {
                if has_epub_extension(&path) {
                    self.diagnostics.warn(&fake_epub_warning(&path));
                    return Ok(Vec::new());
                }
                if depth >= self.max_depth {
                    self.diagnostics.warn(&format!(
                        "Not descending into {}: nested deeper than {} directories",
                        path_to_string_lossy(&path),
                        self.max_depth
                    ));
                    return Ok(Vec::new());
                }

                let entries = self.list_entries(&path).await;
                let nested = try_join_all(
                    entries
                        .into_iter()
                        .map(|entry| self.collect_recursive(entry, depth + 1)),
                )
                .await?;
                Ok(nested.into_iter().flatten().collect())
            } else if stat.is_file() && has_epub_extension(&path) {
                Ok(vec![path])
            } else {
                Ok(Vec::new())
            }
        }
        .boxed()
    }

    /// Lists the entries of `directory`, minus resource forks.
    ///
    /// A directory that can't be read is warned about; whatever was listed
    /// before the failure is still returned.
    async fn list_entries(&self, directory: &Path) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = Vec::new();
        let mut paths: ReadDir = match read_dir(directory).await {
            Ok(paths) => paths,
            Err(e) => {
                self.warn_unlistable(directory, &e);
                return entries;
            }
        };

        loop {
            match paths.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if is_resource_fork(&path) {
                        continue;
                    }
                    entries.push(path);
                }
                Ok(None) => break,
                Err(e) => {
                    self.warn_unlistable(directory, &e);
                    break;
                }
            }
        }

        entries
    }

    fn warn_unlistable(&self, directory: &Path, error: &std::io::Error) {
        self.diagnostics.warn(&format!(
            "Unable to list {}: {}",
            path_to_string_lossy(directory),
            error
        ));
    }
}

fn fake_epub_warning(path: &Path) -> String {
    [
        "Fake ePub detected!".to_string(),
        format!(
            "\t{} looks like an ePub, but is actually a directory.",
            path_to_string_lossy(path)
        ),
        "\tZip its contents into a real .epub file to count it.".to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnostics;
    use log::Level;

    #[tokio::test]
    async fn test_unlistable_directory_warns_and_yields_nothing() {
        let sink = MemoryDiagnostics::new();
        let collector = Collector::new(&sink);

        let entries = collector
            .list_entries(Path::new("tests/tmp/never-created-dir"))
            .await;
        assert!(entries.is_empty());

        let warnings = sink.messages(Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Unable to list "));
        assert!(warnings[0].contains("never-created-dir"));
    }

    #[test]
    fn test_fake_epub_warning_names_path() {
        let warning = fake_epub_warning(Path::new("library/unzipped.epub"));
        assert!(warning.starts_with("Fake ePub detected!\n\t"));
        assert!(warning.contains("library/unzipped.epub"));
    }
}
