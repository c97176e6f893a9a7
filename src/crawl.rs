use once_cell::sync::Lazy;
use readability::extractor;
use regex::Regex;
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::{Host, Url};

use crate::llm::generate_llm_response;
use crate::prompts;
use crate::verdict::strip_code_fences;
use crate::{LlmParams, TARGET_LLM_REQUEST, TARGET_WEB_REQUEST};

pub const MAX_URL_CHARS: usize = 2048;
/// Character budget for page text sent to the extraction model.
pub const PAGE_TEXT_BUDGET: usize = 8000;
pub const MAX_CLAIMS: usize = 3;
const TITLE_BUDGET: usize = 200;
const SUMMARY_BUDGET: usize = 500;
const MIN_PARAGRAPH_CHARS: usize = 50;

/// Hostname shapes that must never be fetched, checked in addition to the
/// typed IP checks. Catches private-range prefixes smuggled inside domain
/// names.
static PRIVATE_HOST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(192\.168\.|10\.|172\.(1[6-9]|2[0-9]|3[01])\.)").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CrawlError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("failed to fetch page: {0}")]
    Fetch(String),
    #[error("URL does not contain HTML content")]
    NotHtml,
}

/// What the crawl adapter learned about a page: a title, zero to three
/// candidate claims, and a short summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub title: String,
    pub claims: Vec<String>,
    pub summary: String,
}

/// Validates a submitted URL before any fetch is attempted: parseable,
/// http/https, and not aimed at loopback, unspecified, or private-range
/// hosts. Checked at the boundary and again inside the adapter.
pub fn validate_url(raw: &str) -> Result<Url, CrawlError> {
    if raw.len() > MAX_URL_CHARS {
        return Err(CrawlError::InvalidUrl("URL is too long".to_string()));
    }

    let url = Url::parse(raw)
        .map_err(|_| CrawlError::InvalidUrl("URL could not be parsed".to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(CrawlError::InvalidUrl(
            "Only HTTP and HTTPS URLs are allowed".to_string(),
        ));
    }

    match url.host() {
        Some(Host::Ipv4(addr)) => {
            if addr.is_loopback()
                || addr.is_private()
                || addr.is_unspecified()
                || addr.is_link_local()
            {
                return Err(CrawlError::InvalidUrl(
                    "Local or private network URLs are not allowed".to_string(),
                ));
            }
        }
        Some(Host::Ipv6(addr)) => {
            if addr.is_loopback() || addr.is_unspecified() {
                return Err(CrawlError::InvalidUrl(
                    "Local or private network URLs are not allowed".to_string(),
                ));
            }
        }
        Some(Host::Domain(domain)) => {
            let lowered = domain.to_ascii_lowercase();
            if lowered == "localhost"
                || lowered.ends_with(".localhost")
                || PRIVATE_HOST_PATTERN.is_match(&lowered)
            {
                return Err(CrawlError::InvalidUrl(
                    "Local or private network URLs are not allowed".to_string(),
                ));
            }
        }
        None => {
            return Err(CrawlError::InvalidUrl("URL has no host".to_string()));
        }
    }

    Ok(url)
}

/// Body text pulled out of a fetched page, before any model involvement.
struct PageText {
    title: String,
    text: String,
}

/// Fetches a page and extracts candidate claims from it. The page fetch is
/// bounded (timeout, redirect cap on the shared client, content-type gate);
/// the claim extraction falls back to heuristics whenever the model cannot
/// deliver structured output, so a fetched page always yields *some*
/// ExtractedContent.
pub struct Crawler {
    http: reqwest::Client,
    llm: Option<LlmParams>,
    fetch_timeout: Duration,
}

impl Crawler {
    pub fn new(http: reqwest::Client, llm: Option<LlmParams>, fetch_timeout: Duration) -> Self {
        Crawler {
            http,
            llm,
            fetch_timeout,
        }
    }

    pub async fn crawl(&self, raw_url: &str) -> Result<(Url, ExtractedContent), CrawlError> {
        // The boundary already validated, but the adapter must not rely on it.
        let url = validate_url(raw_url)?;

        let html = self.fetch_page(&url).await?;
        let page = extract_page_text(&html, &url);
        let content = self.extract_content(&url, &page).await;

        info!(
            target: TARGET_WEB_REQUEST,
            "Crawl of {} extracted {} claims", url, content.claims.len()
        );
        Ok((url, content))
    }

    async fn fetch_page(&self, url: &Url) -> Result<String, CrawlError> {
        debug!(target: TARGET_WEB_REQUEST, "Fetching {}", url);

        let request = self
            .http
            .get(url.as_str())
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send();

        let response = match timeout(self.fetch_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(CrawlError::Fetch(e.to_string())),
            Err(_) => {
                return Err(CrawlError::Fetch(
                    "request timeout - website took too long to respond".to_string(),
                ))
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Fetch(format!(
                "website returned error: {}",
                status
            )));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.contains("text/html") {
            return Err(CrawlError::NotHtml);
        }

        response
            .text()
            .await
            .map_err(|e| CrawlError::Fetch(e.to_string()))
    }

    async fn extract_content(&self, url: &Url, page: &PageText) -> ExtractedContent {
        let params = match &self.llm {
            Some(params) => params,
            None => {
                warn!(target: TARGET_LLM_REQUEST, "No extraction model configured, using heuristic extraction");
                return heuristic_extract(&page.title, &page.text);
            }
        };

        let collapsed = collapse_whitespace(&page.text);
        let budgeted = truncate_chars(&collapsed, PAGE_TEXT_BUDGET);
        let prompt = prompts::claim_extraction_prompt(url.as_str(), &budgeted);

        match generate_llm_response(&prompt, params).await {
            Some(response) => match parse_extraction_response(&response) {
                Some(content) => content,
                None => {
                    warn!(target: TARGET_LLM_REQUEST, "Extraction model returned unparseable output, using heuristic extraction");
                    heuristic_extract(&page.title, &page.text)
                }
            },
            None => heuristic_extract(&page.title, &page.text),
        }
    }
}

/// Runs readability over the fetched HTML to strip scripts, styles, and
/// navigation chrome. An unparseable page degrades to empty text, which
/// downstream turns into a "No Claims" result.
fn extract_page_text(html: &str, url: &Url) -> PageText {
    match extractor::extract(&mut Cursor::new(html.as_bytes()), url) {
        Ok(product) => PageText {
            title: product.title,
            text: product.text,
        },
        Err(e) => {
            warn!(target: TARGET_WEB_REQUEST, "Readability extraction failed for {}: {}", url, e);
            PageText {
                title: String::new(),
                text: String::new(),
            }
        }
    }
}

#[derive(Deserialize)]
struct RawExtraction {
    #[serde(default)]
    title: String,
    #[serde(default)]
    claims: Vec<String>,
    #[serde(default)]
    summary: String,
}

/// Parses the extraction model's JSON. Returns None on any shape problem so
/// the caller can fall back to heuristics.
pub fn parse_extraction_response(raw: &str) -> Option<ExtractedContent> {
    let cleaned = strip_code_fences(raw);
    let parsed: RawExtraction = serde_json::from_str(cleaned).ok()?;

    let claims: Vec<String> = parsed
        .claims
        .into_iter()
        .map(|claim| claim.trim().to_string())
        .filter(|claim| !claim.is_empty())
        .take(MAX_CLAIMS)
        .collect();

    Some(ExtractedContent {
        title: truncate_chars(&parsed.title, TITLE_BUDGET).to_string(),
        claims,
        summary: truncate_chars(&parsed.summary, SUMMARY_BUDGET).to_string(),
    })
}

/// Model-free extraction: the page title plus up to three paragraph-sized
/// chunks of body text. Guarantees the crawl path always produces a result
/// object, possibly with zero claims.
pub fn heuristic_extract(title: &str, text: &str) -> ExtractedContent {
    let title = if title.trim().is_empty() {
        "Unknown Title".to_string()
    } else {
        truncate_chars(title.trim(), TITLE_BUDGET).to_string()
    };

    let claims: Vec<String> = text
        .split('\n')
        .map(str::trim)
        .filter(|paragraph| paragraph.len() > MIN_PARAGRAPH_CHARS)
        .take(MAX_CLAIMS)
        .map(|paragraph| paragraph.to_string())
        .collect();

    let summary = truncate_chars(&claims.join(" "), SUMMARY_BUDGET).to_string();

    ExtractedContent {
        title,
        claims,
        summary,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates on a character boundary, never mid-codepoint.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_https_url() {
        let url = validate_url("https://example.com/news/article").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            validate_url("ftp://example.com/file"),
            Err(CrawlError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(CrawlError::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_loopback_and_private_hosts() {
        for blocked in [
            "http://localhost/page",
            "http://127.0.0.1/page",
            "http://0.0.0.0/page",
            "http://10.0.0.1/page",
            "http://192.168.1.1/admin",
            "http://172.16.0.1/",
            "http://172.31.255.255/",
            "http://[::1]/page",
        ] {
            assert!(
                matches!(validate_url(blocked), Err(CrawlError::InvalidUrl(_))),
                "{} should be blocked",
                blocked
            );
        }
    }

    #[test]
    fn allows_public_addresses_near_private_ranges() {
        assert!(validate_url("http://172.32.0.1/").is_ok());
        assert!(validate_url("http://11.0.0.1/").is_ok());
    }

    #[test]
    fn rejects_private_prefix_domains() {
        assert!(matches!(
            validate_url("http://192.168.1.1.evil.example/"),
            Err(CrawlError::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_overlong_urls() {
        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_CHARS));
        assert!(matches!(
            validate_url(&long),
            Err(CrawlError::InvalidUrl(_))
        ));
    }

    #[test]
    fn parses_structured_extraction() {
        let raw = r#"{"title": "Election results", "claims": ["Candidate A won 52% of the vote"], "summary": "Coverage of the results."}"#;
        let content = parse_extraction_response(raw).unwrap();
        assert_eq!(content.title, "Election results");
        assert_eq!(content.claims.len(), 1);
    }

    #[test]
    fn clamps_extraction_to_three_claims() {
        let raw = r#"{"title": "t", "claims": ["one", "two", "three", "four", "five"], "summary": "s"}"#;
        let content = parse_extraction_response(raw).unwrap();
        assert_eq!(content.claims, vec!["one", "two", "three"]);
    }

    #[test]
    fn extraction_claims_are_always_an_array() {
        let raw = r#"{"title": "t", "summary": "s"}"#;
        let content = parse_extraction_response(raw).unwrap();
        assert!(content.claims.is_empty());
    }

    #[test]
    fn bare_no_claims_reply_is_unparseable() {
        assert!(parse_extraction_response("NO_CLAIMS").is_none());
    }

    #[test]
    fn heuristic_extraction_filters_short_paragraphs() {
        let text = "Short line.\nThis paragraph is comfortably longer than fifty characters and should be kept.\nAlso short.\nAnother sufficiently long paragraph that clears the fifty character threshold easily.";
        let content = heuristic_extract("A Page", text);
        assert_eq!(content.claims.len(), 2);
        assert_eq!(content.title, "A Page");
        assert!(content.summary.len() <= SUMMARY_BUDGET);
    }

    #[test]
    fn heuristic_extraction_defaults_missing_title() {
        let content = heuristic_extract("  ", "");
        assert_eq!(content.title, "Unknown Title");
        assert!(content.claims.is_empty());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo wörld";
        assert_eq!(truncate_chars(text, 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(
            collapse_whitespace("a\n\n  b\t\tc   d"),
            "a b c d"
        );
    }
}
