use crate::config::FetchSettings;
use crate::error::Result;
use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::StatusCode;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGES: &str = "en-US,en;q=0.9,sv;q=0.8";

/// How far into the body a `<meta charset>` declaration is looked for.
const CHARSET_SNIFF_BYTES: usize = 1024;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\b[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#)
        .expect("Invalid meta charset regex")
});

/// Result of fetching a recipe page. Only `Page` carries something to parse.
#[derive(Debug)]
pub enum FetchOutcome {
    Page { html: String, final_url: Url },
    TimedOut,
    Transport(String),
    BadStatus(StatusCode),
    NotHtml(String),
}

/// HTTP client with a fixed timeout and browser-like headers. Redirects use
/// reqwest's default policy.
pub fn build_client(settings: &FetchSettings) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGES));

    let client = reqwest::Client::builder()
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.as_str())
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Missing content types are given the benefit of the doubt.
fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml+xml")
        }
    }
}

fn content_type_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\''))
    })
}

fn meta_charset(body: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&body[..body.len().min(CHARSET_SNIFF_BYTES)]);
    META_CHARSET
        .captures(&head)
        .map(|caps| caps[1].to_string())
}

/// Decode the body using the header charset, then `<meta charset>`, then
/// UTF-8. A byte order mark wins over all of them.
pub fn decode_html(body: &[u8], content_type: Option<&str>) -> String {
    let label = content_type
        .and_then(content_type_charset)
        .map(str::to_string)
        .or_else(|| meta_charset(body));
    let encoding = match label.as_deref() {
        Some(label) => Encoding::for_label(label.as_bytes()).unwrap_or_else(|| {
            debug!(charset = %label, "Unknown charset, decoding as UTF-8");
            UTF_8
        }),
        None => UTF_8,
    };
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn classify(url: &Url, e: reqwest::Error) -> FetchOutcome {
    if e.is_timeout() {
        warn!(url = %url, "Page fetch timed out");
        FetchOutcome::TimedOut
    } else {
        warn!(url = %url, error = %e, "Page fetch failed");
        FetchOutcome::Transport(e.to_string())
    }
}

/// Fetch `url` and read up to `max_bytes` of its body as text.
pub async fn fetch_page(client: &reqwest::Client, url: &Url, max_bytes: usize) -> FetchOutcome {
    let mut response = match client.get(url.clone()).send().await {
        Ok(r) => r,
        Err(e) => return classify(url, e),
    };

    let status = response.status();
    if !status.is_success() {
        warn!(url = %url, status = status.as_u16(), "Page returned non-success status");
        return FetchOutcome::BadStatus(status);
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if !is_html(content_type.as_deref()) {
        let ct = content_type.unwrap_or_default();
        warn!(url = %url, content_type = %ct, "Page is not HTML");
        return FetchOutcome::NotHtml(ct);
    }

    let final_url = response.url().clone();
    let mut body: Vec<u8> = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                body.extend_from_slice(&chunk);
                if body.len() >= max_bytes {
                    body.truncate(max_bytes);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => return classify(url, e),
        }
    }

    FetchOutcome::Page {
        html: decode_html(&body, content_type.as_deref()),
        final_url,
    }
}
