//! Multi-source web search: Google Custom Search and Baidu AppBuilder queried side by side.

pub mod baidu;
pub mod google;
pub mod query;
pub mod types;

pub use baidu::BaiduClient;
pub use google::GoogleClient;
pub use query::build_query;
pub use types::{SearchItem, Source};

use futures::future::join_all;
use reqwest::{Response, StatusCode};
use tracing::{debug, warn};

use crate::extract::ConstraintSet;

/// Largest response body read from a search API.
const MAX_BODY_BYTES: usize = 5_000_000;

/// Failure of a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("access denied or quota exhausted: {0}")]
    Denied(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug)]
pub struct BackendFailure {
    pub backend: Source,
    pub error: BackendError,
}

/// Every configured backend failed for one query.
#[derive(Debug, thiserror::Error)]
#[error("all search backends failed: {}", describe_failures(.failures))]
pub struct SearchUnavailableError {
    pub failures: Vec<BackendFailure>,
}

fn describe_failures(failures: &[BackendFailure]) -> String {
    if failures.is_empty() {
        return "no backend configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.backend, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// One search provider.
pub trait SearchBackend {
    fn source(&self) -> Source;

    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, BackendError>;
}

/// Collects raw results for a constraint set from every configured source.
pub trait Search {
    async fn search(
        &self,
        constraints: &ConstraintSet,
    ) -> Result<Vec<SearchItem>, SearchUnavailableError>;
}

/// The production backends, dispatched statically.
#[derive(Clone)]
pub enum Backend {
    Google(GoogleClient),
    Baidu(BaiduClient),
}

impl SearchBackend for Backend {
    fn source(&self) -> Source {
        match self {
            Backend::Google(c) => c.source(),
            Backend::Baidu(c) => c.source(),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, BackendError> {
        match self {
            Backend::Google(c) => c.search(query).await,
            Backend::Baidu(c) => c.search(query).await,
        }
    }
}

/// Fans one query out to all backends concurrently.
///
/// Results are concatenated in backend order, each backend's own ranking
/// preserved, so earlier backends take priority in later de-duplication.
pub struct MultiSearch<B = Backend> {
    backends: Vec<B>,
}

impl<B: SearchBackend> MultiSearch<B> {
    pub fn new(backends: Vec<B>) -> Self {
        Self { backends }
    }

    pub async fn search_query(&self, query: &str) -> Result<Vec<SearchItem>, SearchUnavailableError> {
        let outcomes = join_all(
            self.backends
                .iter()
                .map(|backend| async move { (backend.source(), backend.search(query).await) }),
        )
        .await;

        let mut items = Vec::new();
        let mut failures = Vec::new();
        let mut succeeded = 0;

        for (backend, outcome) in outcomes {
            match outcome {
                Ok(found) => {
                    debug!(%backend, count = found.len(), "backend returned results");
                    succeeded += 1;
                    items.extend(found);
                }
                Err(error) => {
                    warn!(%backend, %error, "backend search failed (continuing with others)");
                    failures.push(BackendFailure { backend, error });
                }
            }
        }

        if succeeded == 0 {
            return Err(SearchUnavailableError { failures });
        }
        Ok(items)
    }
}

impl<B: SearchBackend> Search for MultiSearch<B> {
    async fn search(
        &self,
        constraints: &ConstraintSet,
    ) -> Result<Vec<SearchItem>, SearchUnavailableError> {
        self.search_query(&build_query(constraints)).await
    }
}

pub(crate) fn classify_status(status: StatusCode, message: String) -> BackendError {
    match status.as_u16() {
        429 => BackendError::RateLimited,
        401 | 403 => BackendError::Denied(message),
        code => BackendError::Api { code, message },
    }
}

/// Reads a response body as text, refusing anything over [`MAX_BODY_BYTES`].
pub(crate) async fn read_body(mut response: Response) -> Result<String, BackendError> {
    if let Some(len) = response.content_length()
        && len as usize > MAX_BODY_BYTES
    {
        return Err(BackendError::Malformed(format!("response too large ({len} bytes)")));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_BODY_BYTES {
            return Err(BackendError::Malformed("response too large".to_string()));
        }
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}



#[cfg(test)]
mod http_tests {
    use std::time::Duration;

    use super::*;
    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn timed_out_sole_backend_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"references": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let http = Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let search = MultiSearch::new(vec![Backend::Baidu(BaiduClient::with_base_url(
            http,
            &server.uri(),
            10,
        ))]);

        let err = search.search_query("2008 Olympics").await.unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].backend, Source::Baidu);
        match &err.failures[0].error {
            BackendError::Network(e) => assert!(e.is_timeout(), "got: {e}"),
            other => panic!("expected timeout, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn google_down_baidu_up_through_real_clients() {
        let google_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&google_server)
            .await;

        let baidu_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "references": [{"title": "t", "content": "Beijing hosted the 2008 Games", "url": "https://b.com"}]
            })))
            .mount(&baidu_server)
            .await;

        let http = Client::new();
        let search = MultiSearch::new(vec![
            Backend::Google(GoogleClient::with_base_url(http.clone(), &google_server.uri(), 10)),
            Backend::Baidu(BaiduClient::with_base_url(http, &baidu_server.uri(), 10)),
        ]);

        let items = search.search_query("2008 Olympics").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, Source::Baidu);
    }
}
