//! RSS fallback for the hero pipeline.
//!
//! When the primary news provider is down or unparseable, the resolver
//! degrades to a fixed public feed and takes the first `<item>` it can
//! find — the channel wrapper is not required. Images are looked for in
//! `<enclosure>`, then a media-namespace thumbnail, then a media-namespace
//! content element, in that order.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::json;
use tracing::debug;

use crate::models::ExternalArticle;
use crate::normalize::strip_tags;

fn url_attr(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"url")
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn mime_attr(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"type")
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Parse the first item of an RSS document into an [`ExternalArticle`].
///
/// Returns `None` when no item with at least a title or a link exists.
/// A reader error mid-document salvages whatever was already collected
/// rather than failing.
pub fn first_item(xml: &str) -> Option<ExternalArticle> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_item = false;
    let mut current_tag = String::new();
    let mut channel_title = String::new();
    let mut title = String::new();
    let mut link = String::new();
    let mut description = String::new();
    let mut pub_date = String::new();
    let mut enclosure: Option<String> = None;
    let mut media_thumbnail: Option<String> = None;
    let mut media_content: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" {
                    in_item = true;
                    current_tag.clear();
                } else {
                    if in_item {
                        handle_media(
                            &name,
                            &e,
                            &mut enclosure,
                            &mut media_thumbnail,
                            &mut media_content,
                        );
                    }
                    current_tag = name;
                }
            }
            Ok(Event::Empty(e)) => {
                if in_item {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    handle_media(
                        &name,
                        &e,
                        &mut enclosure,
                        &mut media_thumbnail,
                        &mut media_content,
                    );
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    break;
                }
                current_tag.clear();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .decode()
                    .ok()
                    .and_then(|d| quick_xml::escape::unescape(&d).map(|c| c.into_owned()).ok())
                    .unwrap_or_else(|| String::from_utf8_lossy(t.as_ref()).into_owned());
                route_text(
                    in_item,
                    &current_tag,
                    &text,
                    &mut channel_title,
                    &mut title,
                    &mut link,
                    &mut description,
                    &mut pub_date,
                );
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                route_text(
                    in_item,
                    &current_tag,
                    &text,
                    &mut channel_title,
                    &mut title,
                    &mut link,
                    &mut description,
                    &mut pub_date,
                );
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "RSS document ended abnormally; salvaging partial item");
                break;
            }
            _ => {}
        }
    }

    if title.is_empty() && link.is_empty() {
        return None;
    }

    let image_url = enclosure.or(media_thumbnail).or(media_content);
    Some(ExternalArticle {
        external_id: None,
        title: strip_tags(&title),
        url: Some(link.clone()).filter(|l| !l.is_empty()),
        internal_url: None,
        image_url,
        published_at: Some(pub_date.clone()).filter(|d| !d.is_empty()),
        source_name: Some(channel_title.clone()).filter(|t| !t.is_empty()),
        content: None,
        raw: json!({
            "title": title,
            "link": link,
            "description": description,
            "pubDate": pub_date,
        }),
    })
}

fn handle_media(
    name: &str,
    e: &BytesStart,
    enclosure: &mut Option<String>,
    thumb: &mut Option<String>,
    content: &mut Option<String>,
) {
    match name {
        "enclosure" => {
            let is_image = mime_attr(e).is_none_or(|m| m.starts_with("image/"));
            if is_image && enclosure.is_none() {
                *enclosure = url_attr(e);
            }
        }
        "media:thumbnail" => {
            if thumb.is_none() {
                *thumb = url_attr(e);
            }
        }
        "media:content" => {
            if content.is_none() {
                *content = url_attr(e);
            }
        }
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn route_text(
    in_item: bool,
    tag: &str,
    text: &str,
    channel_title: &mut String,
    title: &mut String,
    link: &mut String,
    description: &mut String,
    pub_date: &mut String,
) {
    if in_item {
        match tag {
            "title" => title.push_str(text),
            "link" => link.push_str(text),
            "description" => description.push_str(text),
            "pubDate" => pub_date.push_str(text),
            _ => {}
        }
    } else if tag == "title" && channel_title.is_empty() {
        channel_title.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Example Wire</title>
    <item>
      <title>First story</title>
      <link>https://example.com/first</link>
      <description><![CDATA[A <b>bold</b> teaser.]]></description>
      <pubDate>Mon, 06 May 2025 10:00:00 GMT</pubDate>
      <enclosure url="https://example.com/first.jpg" type="image/jpeg"/>
      <media:thumbnail url="https://example.com/thumb.jpg"/>
    </item>
    <item>
      <title>Second story</title>
      <link>https://example.com/second</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_first_item_only() {
        let article = first_item(SAMPLE_FEED).unwrap();
        assert_eq!(article.title, "First story");
        assert_eq!(article.url.as_deref(), Some("https://example.com/first"));
        assert_eq!(
            article.published_at.as_deref(),
            Some("Mon, 06 May 2025 10:00:00 GMT")
        );
        assert_eq!(article.source_name.as_deref(), Some("Example Wire"));
    }

    #[test]
    fn test_enclosure_beats_media_thumbnail() {
        let article = first_item(SAMPLE_FEED).unwrap();
        assert_eq!(
            article.image_url.as_deref(),
            Some("https://example.com/first.jpg")
        );
    }

    #[test]
    fn test_media_thumbnail_beats_media_content() {
        let xml = r#"<rss xmlns:media="x"><channel><title>W</title><item>
            <title>T</title><link>https://e.com/a</link>
            <media:content url="https://e.com/content.jpg"/>
            <media:thumbnail url="https://e.com/thumb.jpg"/>
        </item></channel></rss>"#;
        let article = first_item(xml).unwrap();
        assert_eq!(article.image_url.as_deref(), Some("https://e.com/thumb.jpg"));
    }

    #[test]
    fn test_item_without_channel_wrapper() {
        let xml = "<item><title>Bare item</title><link>https://e.com/x</link></item>";
        let article = first_item(xml).unwrap();
        assert_eq!(article.title, "Bare item");
        assert!(article.source_name.is_none());
    }

    #[test]
    fn test_description_lands_in_raw_payload() {
        let article = first_item(SAMPLE_FEED).unwrap();
        let description = article.raw["description"].as_str().unwrap();
        assert!(description.contains("teaser"));
    }

    #[test]
    fn test_empty_feed() {
        let xml = r#"<rss><channel><title>W</title></channel></rss>"#;
        assert!(first_item(xml).is_none());
    }

    #[test]
    fn test_truncated_feed_salvages_item_fields() {
        let xml = "<rss><channel><title>W</title><item><title>Cut off</title>\
                   <link>https://e.com/cut</link>";
        let article = first_item(xml).unwrap();
        assert_eq!(article.title, "Cut off");
    }
}
