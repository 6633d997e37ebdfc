//! Common test utilities and constants for the epub-wordcount crate.
//!
//! Provides functions for setting up and tearing down test directories,
//! writing small but well-formed EPUB files, and an in-memory [`Book`] whose
//! chapters can be slow or broken on demand.

use async_trait::async_trait;
use epub_wordcount::error::{Error, Result};
use epub_wordcount::{Book, BookMetadata, TocEntry};
use rand::{Rng, distributions::Alphanumeric};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

#[allow(dead_code)]
pub const FONT_OBFUSCATION: &str = "http://www.idpf.org/2008/embedding";
#[allow(dead_code)]
pub const ADEPT_ENCRYPTION: &str = "http://www.w3.org/2001/04/xmlenc#aes128-cbc";

/// Paths of a fresh, empty test directory.
#[allow(dead_code)]
pub struct TestDirs {
    pub base_dir: PathBuf,
    pub source_dir: PathBuf,
}

/// Helper function to create a clean test directory with a source subdirectory.
/// Ensures the base directory is empty before a test runs.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let unique_sub_path = format!("{}-{}", sub_path, rand_string);
    let base_dir = PathBuf::from(TEST_TMP_DIR).join(unique_sub_path);
    if base_dir.exists() {
        fs::remove_dir_all(&base_dir).await.unwrap();
    }
    let source_dir = base_dir.join("source");
    fs::create_dir_all(&source_dir).await.unwrap();

    TestDirs {
        base_dir,
        source_dir,
    }
}

/// Helper function to remove a single test directory.
#[allow(dead_code)]
pub async fn cleanup_test_dirs(dirs: &TestDirs) {
    if dirs.base_dir.exists() {
        let _ = fs::remove_dir_all(&dirs.base_dir).await;
    }
}

/// A chapter of an [`EpubFixture`].
#[derive(Clone)]
struct FixtureChapter {
    title: Option<String>,
    body: String,
    /// Listed in the manifest and spine but absent from the archive.
    missing: bool,
}

/// Builder for minimal EPUB 2 files: container, OPF under `OEBPS/`, NCX and
/// one XHTML document per chapter.
#[allow(dead_code)]
#[derive(Clone)]
pub struct EpubFixture {
    title: String,
    creator: Option<String>,
    chapters: Vec<FixtureChapter>,
    encryption_algorithm: Option<String>,
    rights: bool,
}

#[allow(dead_code)]
impl EpubFixture {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            creator: None,
            chapters: Vec::new(),
            encryption_algorithm: None,
            rights: false,
        }
    }

    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = Some(creator.to_string());
        self
    }

    /// Adds a chapter listed in the NCX under `title`. `body` is the inner
    /// markup of `<body>`.
    pub fn chapter(mut self, title: &str, body: &str) -> Self {
        self.chapters.push(FixtureChapter {
            title: Some(title.to_string()),
            body: body.to_string(),
            missing: false,
        });
        self
    }

    /// Adds a chapter that the NCX doesn't mention.
    pub fn untitled_chapter(mut self, body: &str) -> Self {
        self.chapters.push(FixtureChapter {
            title: None,
            body: body.to_string(),
            missing: false,
        });
        self
    }

    /// Adds a spine entry whose document is missing from the archive.
    pub fn missing_chapter(mut self, title: &str) -> Self {
        self.chapters.push(FixtureChapter {
            title: Some(title.to_string()),
            body: String::new(),
            missing: true,
        });
        self
    }

    /// Adds META-INF/encryption.xml with a single method.
    pub fn encrypted_with(mut self, algorithm: &str) -> Self {
        self.encryption_algorithm = Some(algorithm.to_string());
        self
    }

    /// Adds META-INF/rights.xml.
    pub fn with_rights(mut self) -> Self {
        self.rights = true;
        self
    }

    fn chapter_file(index: usize) -> String {
        format!("text/chapter_{:03}.xhtml", index + 1)
    }

    fn container_xml() -> String {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#
            .to_string()
    }

    fn content_opf(&self) -> String {
        let creator = self
            .creator
            .as_ref()
            .map(|c| format!("    <dc:creator opf:role=\"aut\">{}</dc:creator>\n", c))
            .unwrap_or_default();
        let manifest: String = (0..self.chapters.len())
            .map(|i| {
                format!(
                    "    <item id=\"chapter_{i}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                    Self::chapter_file(i)
                )
            })
            .collect();
        let spine: String = (0..self.chapters.len())
            .map(|i| format!("    <itemref idref=\"chapter_{i}\"/>\n"))
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>{}</dc:title>
{}    <dc:language>en</dc:language>
    <dc:identifier id="BookId">urn:uuid:00000000-0000-0000-0000-000000000000</dc:identifier>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
{}  </manifest>
  <spine toc="ncx">
{}  </spine>
</package>"#,
            self.title, creator, manifest, spine
        )
    }

    fn toc_ncx(&self) -> String {
        let nav_points: String = self
            .chapters
            .iter()
            .enumerate()
            .filter_map(|(i, chapter)| chapter.title.as_ref().map(|title| (i, title)))
            .map(|(i, title)| {
                format!(
                    r#"    <navPoint id="nav_{i}" playOrder="{}">
      <navLabel><text>{}</text></navLabel>
      <content src="{}"/>
    </navPoint>
"#,
                    i + 1,
                    title,
                    Self::chapter_file(i)
                )
            })
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="urn:uuid:00000000-0000-0000-0000-000000000000"/></head>
  <docTitle><text>{}</text></docTitle>
  <navMap>
{}  </navMap>
</ncx>"#,
            self.title, nav_points
        )
    }

    fn chapter_xhtml(chapter: &FixtureChapter) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{}</title><style type="text/css">p {{ margin: 0; }}</style></head>
<body>
{}
</body>
</html>"#,
            chapter.title.as_deref().unwrap_or("Untitled"),
            chapter.body
        )
    }

    fn encryption_xml(algorithm: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<encryption xmlns="urn:oasis:names:tc:opendocument:xmlns:container"
    xmlns:enc="http://www.w3.org/2001/04/xmlenc#">
  <enc:EncryptedData>
    <enc:EncryptionMethod Algorithm="{}"/>
    <enc:CipherData><enc:CipherReference URI="OEBPS/text/chapter_001.xhtml"/></enc:CipherData>
  </enc:EncryptedData>
</encryption>"#,
            algorithm
        )
    }

    /// Serializes the fixture into EPUB bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = CompressionMethod::Stored;
        let deflated = CompressionMethod::Deflated;

        let mut add = |name: &str, method: CompressionMethod, content: &str| {
            let options = SimpleFileOptions::default().compression_method(method);
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };

        add("mimetype", stored, "application/epub+zip");
        add("META-INF/container.xml", deflated, &Self::container_xml());
        if let Some(algorithm) = &self.encryption_algorithm {
            add("META-INF/encryption.xml", deflated, &Self::encryption_xml(algorithm));
        }
        if self.rights {
            add("META-INF/rights.xml", deflated, "<rights/>");
        }
        add("OEBPS/content.opf", deflated, &self.content_opf());
        add("OEBPS/toc.ncx", deflated, &self.toc_ncx());
        for (i, chapter) in self.chapters.iter().enumerate() {
            if chapter.missing {
                continue;
            }
            add(
                &format!("OEBPS/{}", Self::chapter_file(i)),
                deflated,
                &Self::chapter_xhtml(chapter),
            );
        }

        zip.finish().unwrap().into_inner()
    }

    /// Writes the fixture to `path`, creating parent directories.
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, self.to_bytes()).await?;
        Ok(())
    }
}

/// A short public-domain style book used across the tests: cover, copyright
/// and contents pages around two real chapters of 11 and 6 words.
#[allow(dead_code)]
pub fn jekyll_fixture() -> EpubFixture {
    EpubFixture::new("Strange Case of Dr. Jekyll &amp; Mr. Hyde")
        .creator("Robert Louis Stevenson")
        .chapter("Cover", "<p>Cover words should never count</p>")
        .chapter("Copyright", "<p>Public domain in the USA.</p>")
        .chapter(
            "Story of the Door",
            "<h1>Story of the Door</h1>\n<p>Mr. Utterson the lawyer was a man.</p>",
        )
        .chapter(
            "Search for Mr. Hyde",
            "<p>That evening Mr. Utterson came <em>home</em>.</p>",
        )
        .chapter("Contents", "<p>Story of the Door</p>")
}

/// An in-memory [`Book`] whose chapters can be slow or fail.
#[allow(dead_code)]
pub struct MockBook {
    pub metadata: BookMetadata,
    pub has_drm: bool,
    pub reading_order: Vec<TocEntry>,
    chapters: HashMap<String, (std::result::Result<String, String>, Duration)>,
}

#[allow(dead_code)]
impl MockBook {
    pub fn new(title: &str) -> Self {
        Self {
            metadata: BookMetadata {
                title: title.to_string(),
                ..Default::default()
            },
            has_drm: false,
            reading_order: Vec::new(),
            chapters: HashMap::new(),
        }
    }

    fn push(
        mut self,
        title: Option<&str>,
        content: std::result::Result<String, String>,
        delay: Duration,
    ) -> Self {
        let id = format!("item{}", self.reading_order.len());
        let mut entry = TocEntry::new(id.clone(), self.reading_order.len());
        if let Some(title) = title {
            entry = entry.with_title(title);
        }
        self.reading_order.push(entry);
        self.chapters.insert(id, (content, delay));
        self
    }

    pub fn chapter(self, title: &str, markup: &str) -> Self {
        self.push(Some(title), Ok(markup.to_string()), Duration::ZERO)
    }

    pub fn untitled(self, markup: &str) -> Self {
        self.push(None, Ok(markup.to_string()), Duration::ZERO)
    }

    /// A chapter that only resolves after `delay`.
    pub fn slow_chapter(self, title: &str, markup: &str, delay: Duration) -> Self {
        self.push(Some(title), Ok(markup.to_string()), delay)
    }

    pub fn failing_chapter(self, title: &str, message: &str) -> Self {
        self.push(Some(title), Err(message.to_string()), Duration::ZERO)
    }

    pub fn with_drm(mut self) -> Self {
        self.has_drm = true;
        self
    }
}

#[async_trait]
impl Book for MockBook {
    fn metadata(&self) -> &BookMetadata {
        &self.metadata
    }

    fn has_drm(&self) -> bool {
        self.has_drm
    }

    fn reading_order(&self) -> &[TocEntry] {
        &self.reading_order
    }

    async fn fetch_chapter(&self, id: &str) -> Result<String> {
        let (content, delay) = self
            .chapters
            .get(id)
            .ok_or_else(|| Error::chapter(id, "no such chapter"))?;
        if !delay.is_zero() {
            tokio::time::sleep(*delay).await;
        }
        content.clone().map_err(|message| Error::chapter(id, message))
    }
}
