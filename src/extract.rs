//! Best-effort extraction of readable article text from a full HTML
//! document.
//!
//! Externally sourced stories arrive as links, not bodies, so the detail
//! page refetches the publisher's HTML and runs it through a layered
//! heuristic: site-specific selectors for the publisher we proxy most,
//! generic semantic containers, a largest-block scan, and finally a bare
//! regex pass over the raw markup. Each layer runs only when the previous
//! one produced nothing usable, and malformed markup never raises — a
//! failed layer is simply skipped.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use crate::normalize::strip_tags;

/// Blocks with less text than this are treated as navigation/boilerplate
/// noise by the largest-block scan.
pub const MIN_BLOCK_CHARS: usize = 120;

/// Site-specific selectors for the publisher's markup conventions: the
/// text-block component attribute first, then its class-name families.
static SITE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"[data-component="text-block"]"#,
        r#"div[class*="RichText"], div[class*="story-body"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

/// Generic semantic containers, in the order they are tried.
static SEMANTIC_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", "main", r#"[role="main"]"#]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

static BLOCK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div, section, td, blockquote").unwrap());

static PARAGRAPH_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

static RE_RAW_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").unwrap());

/// Extract the main article text from `html`, returning at most
/// `max_paragraphs` paragraphs, or an empty string when nothing usable is
/// found.
#[instrument(level = "debug", skip_all, fields(bytes = html.len(), max_paragraphs))]
pub fn article_text(html: &str, max_paragraphs: usize) -> String {
    let document = Html::parse_document(html);

    // Layer 1: publisher-specific containers.
    for selector in SITE_SELECTORS.iter() {
        let text = collect_paragraphs(
            document
                .select(selector)
                .flat_map(|el| el.select(&PARAGRAPH_SELECTOR)),
            max_paragraphs,
        );
        if !text.is_empty() {
            debug!(layer = "site", chars = text.len(), "Extracted article text");
            return text;
        }
    }

    // Layer 2: semantic containers; the longest-yielding one wins and
    // pre-empts the block scan regardless of what the scan would find.
    let mut container: Option<(ElementRef, String)> = None;
    for selector in SEMANTIC_SELECTORS.iter() {
        for el in document.select(selector) {
            let text = strip_tags(&el.inner_html());
            if text.is_empty() {
                continue;
            }
            if container.as_ref().is_none_or(|(_, best)| text.len() > best.len()) {
                container = Some((el, text));
            }
        }
    }

    // Layer 3: largest block container above the noise floor.
    if container.is_none() {
        for el in document.select(&BLOCK_SELECTOR) {
            let text = strip_tags(&el.inner_html());
            if text.chars().count() < MIN_BLOCK_CHARS {
                continue;
            }
            if container.as_ref().is_none_or(|(_, best)| text.len() > best.len()) {
                container = Some((el, text));
            }
        }
    }

    // Layer 4: paragraphs of the winning container, or its raw lines when
    // the markup has no paragraph structure.
    if let Some((el, plain)) = container {
        let text = collect_paragraphs(el.select(&PARAGRAPH_SELECTOR), max_paragraphs);
        if !text.is_empty() {
            debug!(layer = "container", chars = text.len(), "Extracted article text");
            return text;
        }
        // Over-collect lines to compensate for the missing structure.
        let line_cap = max_paragraphs * 5 / 2;
        let text = plain
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .unique()
            .take(line_cap)
            .join("\n");
        if !text.is_empty() {
            debug!(layer = "lines", chars = text.len(), "Extracted article text");
            return text;
        }
    }

    // Layer 5: no container at all; take the document's first paragraphs
    // wherever they sit.
    let text = collect_paragraphs(document.select(&PARAGRAPH_SELECTOR), max_paragraphs);
    if !text.is_empty() {
        debug!(layer = "document", chars = text.len(), "Extracted article text");
        return text;
    }

    // Terminal: the DOM gave us nothing; pull paragraph tags straight out
    // of the raw markup.
    raw_paragraphs(html, max_paragraphs)
}

fn collect_paragraphs<'a>(
    paragraphs: impl Iterator<Item = ElementRef<'a>>,
    cap: usize,
) -> String {
    paragraphs
        .map(|p| strip_tags(&p.inner_html()))
        .map(|text| text.split_whitespace().join(" "))
        .filter(|text| !text.is_empty())
        .unique()
        .take(cap)
        .join("\n\n")
}

fn raw_paragraphs(html: &str, cap: usize) -> String {
    RE_RAW_PARAGRAPH
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| strip_tags(m.as_str()))
        .filter(|text| !text.is_empty())
        .unique()
        .take(cap)
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text() -> String {
        "The quick brown fox jumps over the lazy dog near the riverbank every single morning. "
            .repeat(3)
    }

    #[test]
    fn test_site_specific_layer_wins() {
        let html = format!(
            r#"<html><body>
                <div data-component="text-block"><p>Publisher paragraph.</p></div>
                <div><p>{}</p></div>
            </body></html>"#,
            long_text()
        );
        assert_eq!(article_text(&html, 10), "Publisher paragraph.");
    }

    #[test]
    fn test_large_div_without_semantic_containers() {
        let body = long_text();
        let html = format!("<html><body><div><p>{body}</p></div></body></html>");
        let text = article_text(&html, 10);
        assert_eq!(text, body.trim());
    }

    #[test]
    fn test_short_blocks_are_noise() {
        let html = "<html><body><div>nav | home | about</div></body></html>";
        assert_eq!(article_text(html, 10), "");
    }

    #[test]
    fn test_semantic_container_preempts_larger_div() {
        let html = format!(
            "<html><body><article><p>Short semantic story.</p></article>\
             <div><p>{}</p></div></body></html>",
            long_text()
        );
        assert_eq!(article_text(&html, 10), "Short semantic story.");
    }

    #[test]
    fn test_paragraph_cap() {
        let html = "<html><body><article>\
                    <p>one</p><p>two</p><p>three</p><p>four</p>\
                    </article></body></html>";
        assert_eq!(article_text(html, 2), "one\n\ntwo");
    }

    #[test]
    fn test_line_fallback_without_paragraphs() {
        let html = "<html><body><article>first line<br>second line<br>first line\
                    </article></body></html>";
        let text = article_text(html, 10);
        assert_eq!(text, "first line\nsecond line");
    }

    #[test]
    fn test_loose_paragraphs_without_containers() {
        let html = "<html><body><p>one</p><p>two</p></body></html>";
        assert_eq!(article_text(html, 10), "one\n\ntwo");
    }

    #[test]
    fn test_script_content_never_leaks() {
        let body = long_text();
        let html = format!(
            "<html><body><div><script>var secret = 1;</script>{body}</div></body></html>"
        );
        let text = article_text(&html, 10);
        assert!(!text.contains("secret"));
        assert!(text.contains("quick brown fox"));
    }

    #[test]
    fn test_malformed_markup_does_not_panic() {
        let html = "<div><p>unclosed <article><main><<<>>";
        let _ = article_text(html, 5);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(article_text("", 5), "");
    }
}
