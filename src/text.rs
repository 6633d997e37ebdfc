//! Text normalization for chapter markup.
//!
//! A [`Normalizer`] turns the markup of one chapter into a single line of
//! clean prose: character references are decoded, tags are dropped, quote and
//! punctuation spacing left behind by tag removal is repaired and whitespace
//! is collapsed. The pass is repeated until the text stops changing, since a
//! repair (for example removing `"`) can expose spacing another rule fixes.

use std::borrow::Cow;

use lazy_static::lazy_static;
use quick_xml::escape::resolve_html5_entity;
use regex::{Captures, Regex};

/// Upper bound on cleaning passes; real input settles in two or three.
const MAX_PASSES: usize = 10;

/// Punctuation that should never be separated from the preceding word.
pub const FLOATING_PUNCTUATION: [char; 6] = ['.', '?', '!', ':', ';', ','];
/// Dashes, optionally treated as floating punctuation.
pub const FLOATING_DASHES: [char; 2] = ['-', '—'];

/// Emphasis elements that books wrap around parts of a word (`<i>K</i>ing`),
/// so removing them must not split the surrounding text. Any other tag,
/// `<span>` and `<a>` included, separates words.
const INLINE_TAGS: &[&str] = &["b", "em", "i", "strong"];

lazy_static! {
    /// Any markup tag, open or close, with no nested angle brackets.
    static ref HTML_TAG_REGEX: Regex = Regex::new(r"<[^<>]+>").unwrap();
    /// Element name of a tag, possibly namespaced (`<xhtml:i>`).
    static ref TAG_NAME_REGEX: Regex = Regex::new(r"^<\s*/?\s*([A-Za-z][\w:.-]*)").unwrap();
    /// Named, decimal and hexadecimal character references.
    static ref ENTITY_REGEX: Regex =
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap();
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

/// Configurable chapter text cleaner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    floating: Vec<char>,
    join_inline_tags: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(false, true)
    }
}

impl Normalizer {
    /// Creates a normalizer.
    ///
    /// # Arguments
    ///
    /// * `floating_dashes` - Also pull `-` and `—` onto the preceding word
    /// * `join_inline_tags` - Drop emphasis tags (`<i>`, `<em>`, `<b>`,
    ///   `<strong>`) without inserting a space; every other tag always
    ///   becomes a space
    pub fn new(floating_dashes: bool, join_inline_tags: bool) -> Self {
        let mut floating = FLOATING_PUNCTUATION.to_vec();
        if floating_dashes {
            floating.extend_from_slice(&FLOATING_DASHES);
        }
        Self {
            floating,
            join_inline_tags,
        }
    }

    /// The floating punctuation characters, in the order they are repaired.
    pub fn floating_punctuation(&self) -> &[char] {
        &self.floating
    }

    /// Normalizes raw chapter markup into clean, space separated text.
    ///
    /// The cleaning pass is repeated until the text stops changing, at most
    /// ten times. Each pass decodes one level of character references, so
    /// markup escaped more than eight levels deep (`&amp;amp;...lt;b&gt;`)
    /// comes out partially decoded, and normalizing that result again
    /// decodes it further. Anything shallower is a fixed point: normalizing
    /// the result again returns it unchanged.
    pub fn normalize(&self, raw: &str) -> String {
        let mut current = self.clean_pass(raw);
        for _ in 1..MAX_PASSES {
            let next = self.clean_pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn clean_pass(&self, text: &str) -> String {
        let decoded = decode_entities(text);
        let untagged =
            HTML_TAG_REGEX.replace_all(&decoded, |caps: &Captures| self.tag_replacement(&caps[0]));

        let unquoted = untagged
            .replace("“ ", "“")
            .replace(" ”", "”")
            .replace('"', "");

        let mut result = WHITESPACE_REGEX
            .replace_all(&unquoted, " ")
            .trim()
            .to_string();

        for c in &self.floating {
            result = result.replace(&format!(" {c}"), &c.to_string());
        }
        result
    }

    fn tag_replacement(&self, tag: &str) -> &'static str {
        if self.join_inline_tags && is_inline_tag(tag) {
            ""
        } else {
            " "
        }
    }
}

/// Normalizes `raw` with the default [`Normalizer`].
pub fn normalize(raw: &str) -> String {
    Normalizer::default().normalize(raw)
}

fn is_inline_tag(tag: &str) -> bool {
    TAG_NAME_REGEX
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .map(|name| {
            let local = name.as_str().rsplit(':').next().unwrap_or_default();
            INLINE_TAGS
                .iter()
                .any(|inline| inline.eq_ignore_ascii_case(local))
        })
        .unwrap_or(false)
}

/// Decodes every character reference in `text`. Unknown references are kept
/// verbatim.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    ENTITY_REGEX.replace_all(text, |caps: &Captures| {
        resolve_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    })
}

/// Resolves the body of a character reference (`amp`, `#8217`, `#x2019`).
pub fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(number) = entity.strip_prefix('#') {
        let code = match number.strip_prefix(|c: char| c == 'x' || c == 'X') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code)
            .filter(|c| *c != '\0')
            .map(String::from);
    }
    resolve_html5_entity(entity).map(str::to_string)
}

/// Counts whitespace delimited, non-empty tokens.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts characters (Unicode scalar values), not bytes.
pub fn count_characters(text: &str) -> usize {
    text.chars().count()
}
