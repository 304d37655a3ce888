//! Open Graph / Twitter card extraction
//!
//! Pages are parsed with html5ever (through `scraper`), which tolerates
//! malformed markup, decodes entities in attribute values and text, and
//! exposes attributes independent of their order or quoting style.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::bytes::Regex;
use scraper::node::Element;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::harvest::Metadata;

/// Title sources, highest priority first
const TITLE_KEYS: [&str; 2] = ["og:title", "twitter:title"];

/// Image sources, highest priority first
const IMAGE_KEYS: [&str; 4] = [
    "og:image",
    "og:image:secure_url",
    "twitter:image",
    "twitter:image:src",
];

/// How far into the document to look for a charset declaration
const CHARSET_SNIFF_BYTES: usize = 4096;

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("meta selector is valid"));

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector is valid"));

static SINGLE_BYTE_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)charset\s*=\s*["']?\s*(iso-8859-1|latin-?1|windows-1252|us-ascii)\b"#)
        .expect("charset pattern is valid")
});

/// Decode raw page bytes into text without ever failing.
///
/// Valid UTF-8 is borrowed as is. Invalid UTF-8 is decoded as windows-1252
/// when the page declares a single-byte charset (browsers treat latin-1 and
/// us-ascii labels the same way), and otherwise decoded lossily with
/// replacement characters.
pub fn decode_page(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) if declares_single_byte_charset(bytes) => {
            Cow::Owned(bytes.iter().map(|&b| windows_1252_char(b)).collect())
        }
        Err(_) => String::from_utf8_lossy(bytes),
    }
}

/// Code points of bytes 0x80..=0x9F in windows-1252; unassigned bytes map to
/// the matching C1 control
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20ac}', '\u{81}', '\u{201a}', '\u{192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{2c6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8d}', '\u{17d}', '\u{8f}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{2dc}', '\u{2122}', '\u{161}', '\u{203a}', '\u{153}', '\u{9d}', '\u{17e}', '\u{178}',
];

fn windows_1252_char(byte: u8) -> char {
    match byte {
        0x80..=0x9f => WINDOWS_1252_HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

fn declares_single_byte_charset(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(CHARSET_SNIFF_BYTES)];
    SINGLE_BYTE_CHARSET.is_match(head)
}

/// A `<meta>` tag that names a metadata key and carries a value
struct MetaTag {
    key: String,
    content: String,
}

impl MetaTag {
    /// Read `property` (or `name`) and `content` (or `value`).
    ///
    /// Returns `None` for tags that lack either part.
    fn from_element(element: &Element) -> Option<Self> {
        let key = first_non_blank(element, &["property", "name"])?.to_lowercase();
        let content = first_non_blank(element, &["content", "value"])?.to_string();
        Some(Self { key, content })
    }
}

fn first_non_blank<'a>(element: &'a Element, attrs: &[&str]) -> Option<&'a str> {
    attrs
        .iter()
        .filter_map(|name| element.attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

/// Extract the preview title and image of a page.
///
/// # Arguments
///
/// * `page` - Raw page bytes, already decompressed
/// * `base_url` - URL the page was fetched from; relative images resolve
///   against it
///
/// # Returns
///
/// The best-effort metadata. Missing fields are `None`; this never fails.
pub fn extract_metadata(page: &[u8], base_url: &str) -> Metadata {
    let text = decode_page(page);
    let document = Html::parse_document(&text);

    let mut found: HashMap<&'static str, String> = HashMap::new();
    for element in document.select(&META_SELECTOR) {
        let Some(tag) = MetaTag::from_element(element.value()) else {
            continue;
        };
        let Some(key) = TITLE_KEYS
            .iter()
            .chain(IMAGE_KEYS.iter())
            .find(|known| **known == tag.key)
        else {
            continue;
        };

        found.entry(*key).or_insert(tag.content);

        // Nothing later in the document can beat the top-priority keys.
        if found.contains_key(TITLE_KEYS[0]) && found.contains_key(IMAGE_KEYS[0]) {
            break;
        }
    }

    let title = take_by_priority(&mut found, &TITLE_KEYS).or_else(|| document_title(&document));
    let image = take_by_priority(&mut found, &IMAGE_KEYS).map(|raw| resolve_url(base_url, &raw));

    debug!(
        base_url,
        has_title = title.is_some(),
        has_image = image.is_some(),
        "Extracted metadata"
    );

    Metadata::new(title, image)
}

fn take_by_priority(
    found: &mut HashMap<&'static str, String>,
    keys: &[&'static str],
) -> Option<String> {
    keys.iter().find_map(|key| found.remove(key))
}

/// Text of the first `<title>` element with whitespace runs collapsed
fn document_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|element| element.text().collect::<String>())
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

/// Resolve a possibly relative URL against the page URL
fn resolve_url(base_url: &str, raw: &str) -> String {
    Url::parse(base_url)
        .and_then(|base| base.join(raw))
        .or_else(|_| Url::parse(raw))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| raw.to_string())
}
