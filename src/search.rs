use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::TARGET_WEB_REQUEST;

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

/// Results fetched per query. Only the top three links are later surfaced
/// as verdict sources.
pub const MAX_SEARCH_RESULTS: usize = 5;

/// One organic search hit, in provider relevance order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// Serper-backed search adapter. Strictly fail-open: a missing key, a
/// transport error, or an unexpected payload all yield an empty result list
/// and the pipeline continues without grounding.
pub struct SearchClient {
    http: reqwest::Client,
    api_key: Option<String>,
    region: String,
    recency: String,
    timeout: Duration,
}

impl SearchClient {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        region: String,
        recency: String,
        timeout: Duration,
    ) -> Self {
        SearchClient {
            http,
            api_key,
            region,
            recency,
            timeout,
        }
    }

    /// Searches recent news coverage of a claim.
    pub async fn search_claim(&self, claim: &str) -> Vec<SearchResult> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => {
                warn!(target: TARGET_WEB_REQUEST, "Serper API key not found. Skipping web search.");
                return Vec::new();
            }
        };

        let body = json!({
            "q": format!("latest news on \"{}\"", claim),
            "gl": self.region,
            "tbs": self.recency,
        });

        let request = self
            .http
            .post(SERPER_ENDPOINT)
            .header("X-API-KEY", api_key)
            .json(&body)
            .send();

        let response = match timeout(self.timeout, request).await {
            Ok(Ok(response)) if response.status().is_success() => response,
            Ok(Ok(response)) => {
                warn!(target: TARGET_WEB_REQUEST, "Search request failed with status {}", response.status());
                return Vec::new();
            }
            Ok(Err(e)) => {
                warn!(target: TARGET_WEB_REQUEST, "Search request failed: {}", e);
                return Vec::new();
            }
            Err(_) => {
                warn!(target: TARGET_WEB_REQUEST, "Search request timed out after {:?}", self.timeout);
                return Vec::new();
            }
        };

        match response.json::<Value>().await {
            Ok(payload) => {
                let results = parse_organic_results(&payload);
                debug!(target: TARGET_WEB_REQUEST, "Search returned {} results", results.len());
                results
            }
            Err(e) => {
                warn!(target: TARGET_WEB_REQUEST, "Failed to decode search response: {}", e);
                Vec::new()
            }
        }
    }
}

/// Maps the provider's `organic` array into search results, keeping the
/// provider's ordering and capping at MAX_SEARCH_RESULTS.
pub fn parse_organic_results(payload: &Value) -> Vec<SearchResult> {
    payload["organic"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .take(MAX_SEARCH_RESULTS)
                .map(|result| SearchResult {
                    title: result["title"].as_str().unwrap_or_default().to_string(),
                    snippet: result["snippet"].as_str().unwrap_or_default().to_string(),
                    link: result["link"].as_str().unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn organic_entry(i: usize) -> Value {
        json!({
            "title": format!("Title {}", i),
            "snippet": format!("Snippet {}", i),
            "link": format!("https://example.com/{}", i),
        })
    }

    #[test]
    fn parses_and_caps_organic_results() {
        let entries: Vec<Value> = (0..8).map(organic_entry).collect();
        let payload = json!({ "organic": entries });

        let results = parse_organic_results(&payload);
        assert_eq!(results.len(), MAX_SEARCH_RESULTS);
        assert_eq!(results[0].title, "Title 0");
        assert_eq!(results[4].link, "https://example.com/4");
    }

    #[test]
    fn missing_organic_array_is_empty() {
        let payload = json!({ "searchParameters": {} });
        assert!(parse_organic_results(&payload).is_empty());
    }

    #[test]
    fn tolerates_partial_entries() {
        let payload = json!({ "organic": [{ "title": "Only a title" }] });
        let results = parse_organic_results(&payload);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Only a title");
        assert_eq!(results[0].snippet, "");
        assert_eq!(results[0].link, "");
    }

    #[tokio::test]
    async fn missing_credential_degrades_to_empty() {
        let client = SearchClient::new(
            reqwest::Client::new(),
            None,
            "in".to_string(),
            "qdr:w".to_string(),
            Duration::from_secs(10),
        );
        assert!(client.search_claim("any claim").await.is_empty());
    }
}
