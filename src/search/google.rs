use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{SearchItem, Source};
use super::{BackendError, SearchBackend, classify_status, read_body};
use crate::config::{ApiKey, GoogleConfig};

const API_URL: &str = "https://www.googleapis.com/customsearch/v1";
/// Custom Search returns at most 10 items per request.
const PAGE_SIZE: usize = 10;
/// The API rejects any page where `start + num` exceeds 100.
const MAX_RESULTS: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Option<Vec<Item>>,
    queries: Option<Queries>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    pagemap: Option<PageMap>,
}

#[derive(Debug, Deserialize)]
struct PageMap {
    metatags: Option<Vec<HashMap<String, Value>>>,
}

#[derive(Debug, Deserialize)]
struct Queries {
    #[serde(rename = "nextPage")]
    next_page: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// Google Custom Search JSON API client.
#[derive(Clone)]
pub struct GoogleClient {
    http: Client,
    api_key: ApiKey,
    cse_id: String,
    base_url: String,
    top_k: usize,
}

impl GoogleClient {
    pub fn new(http: Client, config: &GoogleConfig, top_k: usize) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            cse_id: config.cse_id.clone(),
            base_url: API_URL.to_string(),
            top_k: top_k.clamp(1, MAX_RESULTS),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str, top_k: usize) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            cse_id: "test-cx".to_string(),
            base_url: base_url.to_string(),
            top_k: top_k.clamp(1, MAX_RESULTS),
        }
    }

    async fn page(
        &self,
        query: &str,
        start: usize,
        num: usize,
    ) -> Result<SearchResponse, BackendError> {
        let num = num.to_string();
        let start = start.to_string();
        let url = url::Url::parse_with_params(
            &self.base_url,
            &[
                ("key", self.api_key.expose()),
                ("cx", self.cse_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
                ("start", start.as_str()),
                ("safe", "off"),
            ],
        )
        .map_err(|e| BackendError::Malformed(format!("bad endpoint URL: {e}")))?;

        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        let text = read_body(response).await?;

        if !status.is_success() {
            let message = serde_json::from_str::<SearchResponse>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|err| err.message)
                .unwrap_or_else(|| {
                    let end = text.floor_char_boundary(200);
                    format!("HTTP {status}: {}", &text[..end])
                });
            warn!(backend = "google", status = %status, "search API error");
            return Err(classify_status(status, message));
        }

        serde_json::from_str(&text).map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

impl SearchBackend for GoogleClient {
    fn source(&self) -> Source {
        Source::Google
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, BackendError> {
        let mut items: Vec<SearchItem> = Vec::new();
        let mut start = 1;

        while items.len() < self.top_k {
            let num = (self.top_k - items.len())
                .min(PAGE_SIZE)
                .min(MAX_RESULTS.saturating_sub(start));
            if num == 0 {
                break;
            }
            let body = match self.page(query, start, num).await {
                Ok(body) => body,
                Err(e) if !items.is_empty() => {
                    warn!(backend = "google", error = %e, start, "pagination stopped early");
                    break;
                }
                Err(e) => return Err(e),
            };

            let page: Vec<Item> = body.items.unwrap_or_default();
            if page.is_empty() {
                break;
            }
            items.extend(page.into_iter().filter_map(to_search_item));

            let has_next = body
                .queries
                .and_then(|q| q.next_page)
                .is_some_and(|next| !next.is_empty());
            if !has_next {
                break;
            }
            start += num;
        }

        items.truncate(self.top_k);
        debug!(backend = "google", count = items.len(), "search complete");
        Ok(items)
    }
}

fn to_search_item(item: Item) -> Option<SearchItem> {
    let url = item.link.filter(|link| !link.trim().is_empty())?;
    let metatags = item
        .pagemap
        .and_then(|p| p.metatags)
        .and_then(|tags| tags.into_iter().next())
        .unwrap_or_default();

    let mut snippet = item.snippet.unwrap_or_default();
    let description = ["og:description", "description"]
        .iter()
        .find_map(|key| metatags.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if let Some(desc) = description
        && !snippet.contains(desc)
    {
        if !snippet.is_empty() {
            snippet.push(' ');
        }
        snippet.push_str(desc);
    }

    let published = metatags
        .get("article:published_time")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(SearchItem {
        source: Source::Google,
        title: item.title.unwrap_or_default(),
        snippet,
        url,
        published,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: Value) -> Item {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn metatag_description_is_appended() {
        let converted = to_search_item(item(serde_json::json!({
            "title": "2008 Olympics",
            "link": "http://x",
            "snippet": "Beijing hosted...",
            "pagemap": {"metatags": [{"og:description": "The Games of the XXIX Olympiad"}]}
        })))
        .unwrap();
        assert_eq!(converted.snippet, "Beijing hosted... The Games of the XXIX Olympiad");
    }

    #[test]
    fn description_already_in_snippet_is_not_repeated() {
        let converted = to_search_item(item(serde_json::json!({
            "link": "http://x",
            "snippet": "Beijing hosted the Games.",
            "pagemap": {"metatags": [{"description": "hosted the Games"}]}
        })))
        .unwrap();
        assert_eq!(converted.snippet, "Beijing hosted the Games.");
    }

    #[test]
    fn published_time_is_read_from_metatags() {
        let converted = to_search_item(item(serde_json::json!({
            "link": "http://x",
            "snippet": "s",
            "pagemap": {"metatags": [{"article:published_time": "2008-08-08"}]}
        })))
        .unwrap();
        assert_eq!(converted.published.as_deref(), Some("2008-08-08"));
    }

    #[test]
    fn item_without_link_is_skipped() {
        assert!(to_search_item(item(serde_json::json!({"title": "t", "snippet": "s"}))).is_none());
        assert!(to_search_item(item(serde_json::json!({"link": " ", "snippet": "s"}))).is_none());
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_of(range: std::ops::Range<usize>, next: bool) -> Value {
        let items: Vec<Value> = range
            .map(|i| {
                serde_json::json!({
                    "title": format!("Result {i}"),
                    "link": format!("https://example.com/{i}"),
                    "snippet": format!("Snippet number {i}")
                })
            })
            .collect();
        let mut body = serde_json::json!({"items": items, "queries": {}});
        if next {
            body["queries"]["nextPage"] = serde_json::json!([{"startIndex": 11}]);
        }
        body
    }

    #[tokio::test]
    async fn single_page_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "2008 Summer Olympics"))
            .and(query_param("cx", "test-cx"))
            .and(query_param("num", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(0..5, true)))
            .mount(&server)
            .await;

        let client = GoogleClient::with_base_url(Client::new(), &server.uri(), 5);
        let items = client.search("2008 Summer Olympics").await.unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(items[0].source, Source::Google);
        assert_eq!(items[0].url, "https://example.com/0");
    }

    #[tokio::test]
    async fn paginates_past_ten() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("start", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(0..10, true)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("start", "11"))
            .and(query_param("num", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(10..15, true)))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleClient::with_base_url(Client::new(), &server.uri(), 15);
        let items = client.search("q").await.unwrap();
        assert_eq!(items.len(), 15);
        assert_eq!(items[14].url, "https://example.com/14");
    }

    #[tokio::test]
    async fn stops_without_next_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(0..3, false)))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleClient::with_base_url(Client::new(), &server.uri(), 20);
        let items = client.search("q").await.unwrap();
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn no_items_is_empty_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "searchInformation": {"totalResults": "0"}
            })))
            .mount(&server)
            .await;

        let client = GoogleClient::with_base_url(Client::new(), &server.uri(), 10);
        assert!(client.search("q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quota_error_is_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "Daily Limit Exceeded"}
            })))
            .mount(&server)
            .await;

        let client = GoogleClient::with_base_url(Client::new(), &server.uri(), 10);
        match client.search("q").await {
            Err(BackendError::Denied(message)) => assert!(message.contains("Daily Limit")),
            other => panic!("expected Denied, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = GoogleClient::with_base_url(Client::new(), &server.uri(), 10);
        assert!(matches!(
            client.search("q").await,
            Err(BackendError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
            .mount(&server)
            .await;

        let client = GoogleClient::with_base_url(Client::new(), &server.uri(), 10);
        assert!(matches!(
            client.search("q").await,
            Err(BackendError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn slow_response_times_out_as_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_of(0..3, false))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let http = Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let client = GoogleClient::with_base_url(http, &server.uri(), 10);
        match client.search("q").await {
            Err(BackendError::Network(err)) => assert!(err.is_timeout(), "got: {err}"),
            other => panic!("expected timeout, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn last_page_stays_within_result_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(0..10, true)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("start", "91"))
            .and(query_param("num", "9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(90..99, false)))
            .with_priority(1)
            .mount(&server)
            .await;

        let client = GoogleClient::with_base_url(Client::new(), &server.uri(), 100);
        let items = client.search("q").await.unwrap();
        assert_eq!(items.len(), 99);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 10);
        for request in requests {
            let param = |name: &str| -> usize {
                request
                    .url
                    .query_pairs()
                    .find(|(k, _)| k == name)
                    .and_then(|(_, v)| v.parse().ok())
                    .unwrap()
            };
            assert!(param("start") + param("num") <= MAX_RESULTS);
        }
    }

    #[tokio::test]
    async fn later_page_failure_keeps_earlier_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("start", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(0..10, true)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("start", "11"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GoogleClient::with_base_url(Client::new(), &server.uri(), 20);
        let items = client.search("q").await.unwrap();
        assert_eq!(items.len(), 10);
    }
}
