//! Feed normalization: turning whatever a provider handed us into plain
//! text.
//!
//! Providers disagree about everything, including where the article body
//! lives. [`payload_text`] implements the fixed lookup policy over a raw
//! payload (a JSON mapping or an RSS item serialized as a string), and
//! [`strip_tags`] is the tag-stripping subroutine shared with the RSS and
//! extraction paths. Field lookup across alternate key spellings is the
//! generic [`first_field`], used by the hero resolver as well.

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Body-text field names, in priority order. `_extracted_text` leads so a
/// previously extracted full text always wins over provider teasers.
pub const TEXT_KEYS: &[&str] = &[
    "_extracted_text",
    "content",
    "description",
    "summary",
    "excerpt",
    "body",
    "text",
];

/// Fields checked one level deeper, under an `article` key.
const NESTED_TEXT_KEYS: &[&str] = &["content", "description", "summary"];

static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static RE_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static RE_P_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</p\s*>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// First present, non-empty value among `keys` of a payload mapping.
///
/// Accepts strings and numbers; an object value is treated as named by its
/// `name` field (providers commonly nest `source: {id, name}`). Returns
/// `None` for anything else so a caller can keep walking its candidate
/// list.
pub fn first_field(payload: &Value, keys: &[&str]) -> Option<String> {
    let object = payload.as_object()?;
    for key in keys {
        match object.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            Some(Value::Object(inner)) => {
                if let Some(Value::String(name)) = inner.get("name") {
                    if !name.trim().is_empty() {
                        return Some(name.trim().to_string());
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Best-effort plain text for a raw provider payload.
///
/// Mapping payloads are searched through [`TEXT_KEYS`], then one level
/// deeper under `article`. String payloads are treated as markup: parsed as
/// XML (description, then a content-module `encoded` element, then any
/// `<p>` elements), or tag-stripped wholesale when the parse fails.
/// Anything else is stringified and stripped.
pub fn payload_text(payload: &Value) -> String {
    match payload {
        Value::Object(_) => {
            if let Some(text) = first_field(payload, TEXT_KEYS) {
                return strip_tags(&text);
            }
            if let Some(nested) = payload.get("article") {
                if let Some(text) = first_field(nested, NESTED_TEXT_KEYS) {
                    return strip_tags(&text);
                }
            }
            String::new()
        }
        Value::String(s) => xml_text(s).unwrap_or_else(|| strip_tags(s)),
        Value::Null => String::new(),
        other => strip_tags(&other.to_string()),
    }
}

/// Pull text out of an RSS-item-shaped XML fragment.
///
/// Returns `None` when the reader chokes, so the caller can fall back to
/// raw tag stripping.
fn xml_text(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut description = String::new();
    let mut encoded = String::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current_tag = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
            }
            Ok(Event::End(_)) => current_tag.clear(),
            Ok(Event::Text(t)) => {
                let text = t
                    .decode()
                    .ok()
                    .and_then(|d| quick_xml::escape::unescape(&d).map(|c| c.into_owned()).ok())
                    .unwrap_or_else(|| String::from_utf8_lossy(t.as_ref()).into_owned());
                append_bucket(
                    &current_tag,
                    &text,
                    &mut description,
                    &mut encoded,
                    &mut paragraphs,
                );
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                append_bucket(
                    &current_tag,
                    &text,
                    &mut description,
                    &mut encoded,
                    &mut paragraphs,
                );
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "Payload is not parseable XML; stripping raw markup");
                return None;
            }
            _ => {}
        }
    }

    for candidate in [description, encoded, paragraphs.join("\n\n")] {
        let text = strip_tags(&candidate);
        if !text.is_empty() {
            return Some(text);
        }
    }
    Some(String::new())
}

fn append_bucket(
    tag: &str,
    text: &str,
    description: &mut String,
    encoded: &mut String,
    paragraphs: &mut Vec<String>,
) {
    match tag {
        "description" => description.push_str(text),
        "content:encoded" | "encoded" => encoded.push_str(text),
        "p" => paragraphs.push(text.to_string()),
        _ => {}
    }
}

/// Strip markup down to plain text.
///
/// Removes `<script>`/`<style>` blocks including their content, converts
/// `<br>` to a newline and `</p>` to a blank line, drops every remaining
/// tag, unescapes common HTML entities, collapses runs of spaces/tabs, and
/// trims leading/trailing blank lines. Idempotent on already-plain text.
pub fn strip_tags(input: &str) -> String {
    let text = RE_SCRIPT.replace_all(input, "");
    let text = RE_STYLE.replace_all(&text, "");
    let text = RE_BR.replace_all(&text, "\n");
    let text = RE_P_CLOSE.replace_all(&text, "\n\n");
    let text = RE_TAG.replace_all(&text, "");
    let text = unescape_entities(&text);
    let text = RE_SPACES.replace_all(&text, " ");
    text.trim_matches(|c: char| c == '\n' || c == '\r' || c == ' ' || c == '\t')
        .to_string()
}

fn unescape_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
