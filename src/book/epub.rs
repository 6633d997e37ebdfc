use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use memmap2::{Mmap, MmapOptions};
use regex::Regex;
use tokio::task::spawn_blocking;
use zip::ZipArchive;

use crate::book::Book;
use crate::book::parser::{
    ManifestItem, encryption_is_drm, parent_dir, parse_container_xml, parse_ncx, parse_opf,
    resolve_href, strip_bom,
};
use crate::error::{Error, Result};
use crate::types::{BookMetadata, TocEntry};

const CONTAINER_PATH: &str = "META-INF/container.xml";
const ENCRYPTION_PATH: &str = "META-INF/encryption.xml";
const RIGHTS_PATH: &str = "META-INF/rights.xml";

/// Message used when the file can't be opened at all.
pub const MISSING_FILE_MESSAGE: &str = "Invalid/missing file";

lazy_static! {
    static ref BODY_REGEX: Regex = Regex::new(r"(?is)<body[^>]*>(.*)</body\s*>").unwrap();
    static ref HEAD_REGEX: Regex = Regex::new(r"(?is)<head[\s>].*?</head\s*>").unwrap();
    static ref SCRIPT_REGEX: Regex = Regex::new(r"(?is)<script[\s>].*?</script\s*>").unwrap();
    static ref STYLE_REGEX: Regex = Regex::new(r"(?is)<style[\s>].*?</style\s*>").unwrap();
}

/// Archive bytes, either memory-mapped from disk or owned.
#[derive(Clone)]
enum ArchiveData {
    Mapped(Arc<Mmap>),
    Owned(Arc<[u8]>),
}

impl AsRef<[u8]> for ArchiveData {
    fn as_ref(&self) -> &[u8] {
        match self {
            ArchiveData::Mapped(map) => map,
            ArchiveData::Owned(bytes) => bytes,
        }
    }
}

type Archive = ZipArchive<Cursor<ArchiveData>>;

/// A parsed EPUB container.
///
/// Parsing reads the package documents once; chapter content is decompressed
/// on demand. Cloning is cheap and clones share the underlying archive bytes.
#[derive(Clone)]
pub struct EpubBook {
    path: PathBuf,
    archive: Archive,
    metadata: BookMetadata,
    manifest: HashMap<String, ManifestItem>,
    opf_dir: String,
    flow: Vec<TocEntry>,
    toc: Vec<TocEntry>,
    has_drm: bool,
}

impl fmt::Debug for EpubBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpubBook")
            .field("path", &self.path)
            .field("title", &self.metadata.title)
            .field("chapters", &self.flow.len())
            .field("has_drm", &self.has_drm)
            .finish()
    }
}

impl EpubBook {
    /// Opens and parses the EPUB at `path`.
    ///
    /// The file is memory-mapped on a blocking thread. Every failure is
    /// reported as [`Error::Parse`] naming `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::parse(&path, MISSING_FILE_MESSAGE),
            _ => Error::parse(&path, e),
        })?;
        if file.metadata().await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(Error::parse(&path, MISSING_FILE_MESSAGE));
        }

        let file_std = file.into_std().await;
        spawn_blocking(move || {
            let mmap = unsafe { MmapOptions::new().map(&file_std) }
                .map_err(|e| Error::parse(&path, e))?;
            Self::from_data(path, ArchiveData::Mapped(Arc::new(mmap)))
        })
        .await?
    }

    /// Parses an EPUB held in memory. `path` is only used for error messages
    /// and [`EpubBook::path`].
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self> {
        Self::from_data(path.into(), ArchiveData::Owned(bytes.into()))
    }

    fn from_data(path: PathBuf, data: ArchiveData) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data)).map_err(|e| Error::parse(&path, e))?;
        Self::from_archive(path.clone(), archive).map_err(|e| match e {
            Error::Parse { .. } => e,
            other => Error::parse(&path, other),
        })
    }

    fn from_archive(path: PathBuf, mut archive: Archive) -> Result<Self> {
        let container = read_entry(&mut archive, CONTAINER_PATH)?;
        let opf_path = parse_container_xml(&container)?;
        let opf = parse_opf(&read_entry_string(&mut archive, &opf_path)?)?;
        let opf_dir = parent_dir(&opf_path).to_string();

        // A broken NCX only costs the chapter titles
        let toc = match &opf.ncx_href {
            Some(href) => {
                let ncx_path = resolve_href(&opf_dir, href);
                read_entry_string(&mut archive, &ncx_path)
                    .and_then(|ncx| parse_ncx(&ncx))
                    .map(|points| {
                        let ncx_dir = parent_dir(&ncx_path).to_string();
                        points
                            .into_iter()
                            .enumerate()
                            .map(|(i, point)| TocEntry {
                                level: point.level,
                                order: point.play_order.unwrap_or(i + 1),
                                title: Some(point.label),
                                id: resolve_href(&ncx_dir, &point.src),
                                href: Some(point.src),
                            })
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            }
            None => Vec::new(),
        };

        let flow = opf
            .spine_ids
            .iter()
            .filter_map(|id| opf.manifest.get(id).map(|item| (id, item)))
            .enumerate()
            .map(|(order, (id, item))| {
                let target = resolve_href(&opf_dir, &item.href);
                let nav = toc.iter().find(|entry| entry.id == target);
                TocEntry {
                    level: nav.map(|entry| entry.level).unwrap_or_default(),
                    order,
                    title: nav.and_then(|entry| entry.title.clone()),
                    id: id.clone(),
                    href: Some(item.href.clone()),
                }
            })
            .collect();

        let has_drm = detect_drm(&mut archive)?;

        Ok(Self {
            path,
            archive,
            metadata: opf.metadata,
            manifest: opf.manifest,
            opf_dir,
            flow,
            toc,
            has_drm,
        })
    }

    /// The path this book was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The flattened navigation map. Entry ids are archive paths, not
    /// manifest ids.
    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    /// Returns the complete document of chapter `id`, markup included.
    pub async fn chapter_raw(&self, id: &str) -> Result<String> {
        let item = self
            .manifest
            .get(id)
            .ok_or_else(|| Error::chapter(id, "no such manifest item"))?;
        if !is_html_media_type(&item.media_type) {
            return Err(Error::chapter(
                id,
                format!("Invalid mime type for chapter: {}", item.media_type),
            ));
        }

        let entry_path = resolve_href(&self.opf_dir, &item.href);
        let mut archive = self.archive.clone();
        let chapter_id = id.to_string();
        spawn_blocking(move || {
            read_entry_string(&mut archive, &entry_path).map_err(|e| Error::chapter(chapter_id, e))
        })
        .await?
    }
}

#[async_trait]
impl Book for EpubBook {
    fn metadata(&self) -> &BookMetadata {
        &self.metadata
    }

    fn has_drm(&self) -> bool {
        self.has_drm
    }

    fn reading_order(&self) -> &[TocEntry] {
        &self.flow
    }

    async fn fetch_chapter(&self, id: &str) -> Result<String> {
        let raw = self.chapter_raw(id).await?;
        Ok(chapter_body(&raw))
    }
}

/// Reduces a chapter document to the inner markup of its `<body>`, without
/// scripts and style sheets.
pub fn chapter_body(document: &str) -> String {
    let body = match BODY_REGEX.captures(document).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().to_string(),
        None => HEAD_REGEX.replace_all(document, " ").into_owned(),
    };
    let body = SCRIPT_REGEX.replace_all(&body, " ");
    STYLE_REGEX.replace_all(&body, " ").into_owned()
}

fn is_html_media_type(media_type: &str) -> bool {
    matches!(
        media_type.trim().to_ascii_lowercase().as_str(),
        "application/xhtml+xml" | "text/html" | "application/html"
    )
}

fn detect_drm(archive: &mut Archive) -> Result<bool> {
    if archive.index_for_name(RIGHTS_PATH).is_some() {
        return Ok(true);
    }
    if archive.index_for_name(ENCRYPTION_PATH).is_none() {
        return Ok(false);
    }
    let encryption = read_entry_string(archive, ENCRYPTION_PATH)?;
    // Unreadable encryption data is treated like real protection
    Ok(encryption_is_drm(&encryption).unwrap_or(true))
}

fn read_entry(archive: &mut Archive, name: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| Error::Other(format!("{}: {}", name, e)))?;
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_entry_string(archive: &mut Archive, name: &str) -> Result<String> {
    let bytes = read_entry(archive, name)?;
    Ok(String::from_utf8_lossy(strip_bom(&bytes)).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_body_drops_head_script_and_style() {
        let doc = r#"<?xml version="1.0"?>
<html><head><title>Copyright</title><style>p { color: red; }</style></head>
<body class="x"><p>Hello</p><script type="text/javascript">var a = 1;</script>
<style>.b {}</style><p>World</p></body></html>"#;

        let body = chapter_body(doc);
        assert!(body.contains("<p>Hello</p>"));
        assert!(body.contains("<p>World</p>"));
        assert!(!body.contains("Copyright"));
        assert!(!body.contains("var a"));
        assert!(!body.contains("color"));
    }

    #[test]
    fn test_chapter_body_without_body_element() {
        let body = chapter_body("<head><title>T</title></head><p>Loose</p>");
        assert!(!body.contains("<title>"));
        assert!(body.contains("Loose"));
    }

    #[test]
    fn test_html_media_types() {
        assert!(is_html_media_type("application/xhtml+xml"));
        assert!(is_html_media_type("text/html"));
        assert!(!is_html_media_type("image/jpeg"));
        assert!(!is_html_media_type("text/css"));
    }
}
