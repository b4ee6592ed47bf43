//! Title and image backfill from plain HTML meta tags (Open Graph, `<title>`,
//! `<link rel="image_src">`). Lightweight regex scanning, no DOM.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("Invalid meta tag regex"));

static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("Invalid link tag regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("Invalid attribute regex")
});

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("Invalid title regex"));

/// Title and image found in the page head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaTags {
    pub title: Option<String>,
    pub image_url: Option<String>,
}

/// Decode the handful of entities that show up in titles and attribute values.
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Resolve a possibly relative URL against the page it was found on.
pub fn resolve_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    base.join(raw).ok().map(|u| u.to_string())
}

fn attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|cap| {
            let name = cap.get(1)?.as_str().to_ascii_lowercase();
            let value = cap.get(2).or(cap.get(3)).or(cap.get(4))?.as_str();
            Some((name, value.to_string()))
        })
        .collect()
}

/// Content of the first `<meta>` whose `property` or `name` equals `key`.
fn meta_content(html: &str, key: &str) -> Option<String> {
    META_TAG.find_iter(html).find_map(|m| {
        let attrs = attributes(m.as_str());
        let matches = ["property", "name"]
            .iter()
            .filter_map(|a| attrs.get(*a))
            .any(|v| v.trim().eq_ignore_ascii_case(key));
        if !matches {
            return None;
        }
        let content = decode_entities(attrs.get("content")?).trim().to_string();
        (!content.is_empty()).then_some(content)
    })
}

pub fn extract_og_title(html: &str) -> Option<String> {
    meta_content(html, "og:title")
}

/// Extract the og:image value as written in the page (may be relative).
pub fn extract_og_image(html: &str) -> Option<String> {
    meta_content(html, "og:image")
}

pub fn extract_title_tag(html: &str) -> Option<String> {
    let inner = TITLE_TAG.captures(html)?.get(1)?.as_str();
    let title = crate::dedup::normalize_whitespace(&decode_entities(inner));
    (!title.is_empty()).then_some(title)
}

/// `href` of `<link rel="image_src">`, an older high-resolution image hint.
pub fn extract_image_src_link(html: &str) -> Option<String> {
    LINK_TAG.find_iter(html).find_map(|m| {
        let attrs = attributes(m.as_str());
        let is_image_src = attrs
            .get("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("image_src")));
        if !is_image_src {
            return None;
        }
        let href = decode_entities(attrs.get("href")?).trim().to_string();
        (!href.is_empty()).then_some(href)
    })
}

/// Title (`og:title`, then `<title>`) and image (`og:image`, then
/// `image_src`), with the image resolved against `base`.
pub fn extract_meta(html: &str, base: &Url) -> MetaTags {
    let title = extract_og_title(html).or_else(|| extract_title_tag(html));
    let image_url = extract_og_image(html)
        .or_else(|| extract_image_src_link(html))
        .and_then(|raw| resolve_url(base, &raw));
    MetaTags { title, image_url }
}
