use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{SearchItem, Source};
use super::{BackendError, SearchBackend, classify_status, read_body};
use crate::config::{ApiKey, BaiduConfig};

const API_BASE: &str = "https://qianfan.baidubce.com";
const SEARCH_PATH: &str = "/v2/ai_search/web_search";
const MAX_TOP_K: usize = 50;
const EDITION: &str = "standard";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    messages: Vec<Message<'a>>,
    edition: &'a str,
    search_source: &'a str,
    resource_type_filter: Vec<ResourceFilter>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResourceFilter {
    #[serde(rename = "type")]
    kind: &'static str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    references: Option<Vec<Reference>>,
    code: Option<Value>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    title: Option<String>,
    content: Option<String>,
    url: Option<String>,
    date: Option<String>,
}

impl SearchResponse {
    /// Non-empty, non-zero `code`, the way AppBuilder reports failures.
    fn error_code(&self) -> Option<String> {
        match self.code.as_ref()? {
            Value::String(s) if !s.is_empty() && s != "0" => Some(s.clone()),
            Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
            _ => None,
        }
    }

    fn error_message(&self) -> Option<String> {
        let code = self.error_code()?;
        let message = self.message.as_deref().unwrap_or("unknown error");
        Some(format!("{code}: {message}"))
    }
}

/// Baidu AppBuilder (Qianfan) AI web search client.
#[derive(Clone)]
pub struct BaiduClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
    top_k: usize,
}

impl BaiduClient {
    pub fn new(http: Client, config: &BaiduConfig, top_k: usize) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            base_url: API_BASE.to_string(),
            top_k: top_k.clamp(1, MAX_TOP_K),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str, top_k: usize) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            base_url: base_url.to_string(),
            top_k: top_k.clamp(1, MAX_TOP_K),
        }
    }
}

impl SearchBackend for BaiduClient {
    fn source(&self) -> Source {
        Source::Baidu
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, BackendError> {
        let url = format!("{}{SEARCH_PATH}", self.base_url);
        let request = SearchRequest {
            messages: vec![Message {
                role: "user",
                content: query,
            }],
            edition: EDITION,
            search_source: "baidu_search_v2",
            resource_type_filter: vec![ResourceFilter {
                kind: "web",
                top_k: self.top_k,
            }],
        };

        let response = self
            .http
            .post(&url)
            .header(
                "X-Appbuilder-Authorization",
                format!("Bearer {}", self.api_key.expose()),
            )
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = read_body(response).await?;
        let parsed = serde_json::from_str::<SearchResponse>(&text);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|body| body.error_message())
                .unwrap_or_else(|| {
                    let end = text.floor_char_boundary(200);
                    format!("HTTP {status}: {}", &text[..end])
                });
            warn!(backend = "baidu", status = %status, "search API error");
            return Err(classify_status(status, message));
        }

        let body = parsed.map_err(|e| BackendError::Malformed(e.to_string()))?;
        if body.references.is_none()
            && let Some(message) = body.error_message()
        {
            warn!(backend = "baidu", %message, "search API error in 200 response");
            return Err(BackendError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let items: Vec<SearchItem> = body
            .references
            .unwrap_or_default()
            .into_iter()
            .filter_map(to_search_item)
            .collect();
        debug!(backend = "baidu", count = items.len(), "search complete");
        Ok(items)
    }
}

fn to_search_item(reference: Reference) -> Option<SearchItem> {
    let url = reference.url.filter(|u| !u.trim().is_empty())?;
    Some(SearchItem {
        source: Source::Baidu,
        title: reference.title.unwrap_or_default(),
        snippet: reference.content.unwrap_or_default(),
        url,
        published: reference.date.filter(|d| !d.trim().is_empty()),
    })
}
