//! EPUB package document parsing (container.xml, OPF, NCX, encryption.xml).

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::text::{decode_entities, resolve_entity};
use crate::types::BookMetadata;

/// Encryption algorithms that only obfuscate embedded fonts.
const FONT_OBFUSCATION_ALGORITHMS: &[&str] = &[
    "http://www.idpf.org/2008/embedding",
    "http://ns.adobe.com/pdf/enc#RC",
];

/// A manifest `<item>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub href: String,
    pub media_type: String,
}

/// Parsed OPF package data.
#[derive(Debug, Clone, Default)]
pub struct OpfData {
    pub metadata: BookMetadata,
    /// Maps manifest id -> item
    pub manifest: HashMap<String, ManifestItem>,
    pub spine_ids: Vec<String>,
    pub ncx_href: Option<String>,
}

/// One NCX `navPoint`, flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoint {
    pub level: usize,
    pub play_order: Option<usize>,
    pub label: String,
    pub src: String,
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8_lossy(strip_bom(bytes));
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attribute(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    Err(Error::Other("No rootfile found in container.xml".to_string()))
}

/// Parse OPF package document.
pub fn parse_opf(content: &str) -> Result<OpfData> {
    // Text is split around entity references, so values are trimmed once joined
    let mut reader = Reader::from_str(content);

    let mut opf = OpfData::default();
    let mut toc_id: Option<String> = None;

    let mut in_metadata = false;
    let mut current_element: Option<Vec<u8>> = None;
    let mut file_as: Option<String> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"metadata" => in_metadata = true,
                    b"title" | b"creator" | b"language" | b"subject" | b"date"
                    | b"description" | b"publisher"
                        if in_metadata =>
                    {
                        if local == b"creator" {
                            file_as = attribute(&e, b"file-as");
                        }
                        current_element = Some(local.to_vec());
                        buf_text.clear();
                    }
                    _ => read_package_element(&e, &mut opf, &mut toc_id),
                }
            }
            Ok(Event::Empty(e)) => read_package_element(&e, &mut opf, &mut toc_id),
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::CData(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"metadata" {
                    in_metadata = false;
                }

                if current_element.as_deref() == Some(local) {
                    let value = buf_text.trim().to_string();
                    let metadata = &mut opf.metadata;
                    // First occurrence wins
                    match local {
                        b"title" if metadata.title.is_empty() => metadata.title = value,
                        b"creator" if metadata.creator.is_none() => {
                            metadata.creator = Some(value);
                            metadata.creator_file_as = file_as.take();
                        }
                        b"language" => set_once(&mut metadata.language, value),
                        b"subject" => set_once(&mut metadata.subject, value),
                        b"date" => set_once(&mut metadata.date, value),
                        b"description" => set_once(&mut metadata.description, value),
                        b"publisher" => set_once(&mut metadata.publisher, value),
                        _ => {}
                    }
                    current_element = None;
                    buf_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    opf.ncx_href = toc_id
        .and_then(|id| opf.manifest.get(&id))
        .map(|item| item.href.clone())
        .or_else(|| {
            opf.manifest
                .values()
                .find(|item| item.media_type == "application/x-dtbncx+xml")
                .map(|item| item.href.clone())
        });

    Ok(opf)
}

fn read_package_element(e: &BytesStart, opf: &mut OpfData, toc_id: &mut Option<String>) {
    let name = e.name();
    match local_name(name.as_ref()) {
        b"item" => {
            if let (Some(id), Some(href)) = (attribute(e, b"id"), attribute(e, b"href")) {
                let media_type = attribute(e, b"media-type").unwrap_or_default();
                opf.manifest.insert(id, ManifestItem { href, media_type });
            }
        }
        b"itemref" => {
            if let Some(idref) = attribute(e, b"idref") {
                opf.spine_ids.push(idref);
            }
        }
        b"spine" => *toc_id = attribute(e, b"toc"),
        _ => {}
    }
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Parse NCX table of contents into a flat, document ordered list.
pub fn parse_ncx(content: &str) -> Result<Vec<NavPoint>> {
    // Text is split around entity references, so values are trimmed once joined
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<NavPointState> = Vec::new();
    let mut points: Vec<NavPoint> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navPoint" => stack.push(NavPointState {
                        play_order: attribute(&e, b"playOrder").and_then(|o| o.parse().ok()),
                        label: String::new(),
                    }),
                    b"text" => in_text = true,
                    b"content" => push_nav_point(&e, &stack, &mut points),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"content" {
                    push_nav_point(&e, &stack, &mut points);
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    state.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        state.label.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"text" => in_text = false,
                    b"navPoint" => {
                        stack.pop();
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    Ok(points)
}

struct NavPointState {
    play_order: Option<usize>,
    label: String,
}

fn push_nav_point(e: &BytesStart, stack: &[NavPointState], points: &mut Vec<NavPoint>) {
    let (Some(state), Some(src)) = (stack.last(), attribute(e, b"src")) else {
        return;
    };
    points.push(NavPoint {
        level: stack.len() - 1,
        play_order: state.play_order,
        label: state.label.trim().to_string(),
        src,
    });
}

/// Returns whether META-INF/encryption.xml protects anything beyond fonts.
///
/// A document that lists no algorithm at all is treated as protected.
pub fn encryption_is_drm(content: &str) -> Result<bool> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut algorithms: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if local_name(e.name().as_ref()) == b"EncryptionMethod" =>
            {
                if let Some(algorithm) = attribute(&e, b"Algorithm") {
                    algorithms.push(algorithm);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    Ok(algorithms.is_empty()
        || algorithms
            .iter()
            .any(|a| !FONT_OBFUSCATION_ALGORITHMS.contains(&a.as_str())))
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Value of the attribute whose local name is `key`, with references decoded.
fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == key)
        .map(|attr| decode_entities(&String::from_utf8_lossy(&attr.value)).into_owned())
}

/// Resolves `href` against the archive directory `base_dir` ("" or "OEBPS/"),
/// dropping any fragment and percent-decoding it.
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = strip_fragment(href);
    let decoded = percent_decode_str(href).decode_utf8_lossy();

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Directory part of an archive path, with a trailing slash ("" for the root).
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..=i]).unwrap_or("")
}

/// `chapter.xhtml#part2` -> `chapter.xhtml`
pub fn strip_fragment(href: &str) -> &str {
    href.split('#').next().unwrap_or(href)
}
