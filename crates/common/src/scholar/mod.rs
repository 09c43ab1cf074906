//! Paper search service client
//!
//! Provides:
//! - Keyword search, exact title match and batch detail lookup
//! - Retry with exponential backoff on rate limiting and 5xx responses
//! - Optional raw response dumps for offline inspection
//!
//! Every [`PaperSource`] operation is infallible from the caller's point of
//! view: failures are logged and surface as empty results.

use crate::config::ScholarConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{PaperRecord, RawPaper};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// Fields requested from keyword search
pub const SEARCH_FIELDS: &str = "title,authors,year,abstract,citationCount,venue,openAccessPdf,url,referenceCount,influentialCitationCount,publicationDate";

/// Fields requested from batch lookup; adds the citation graph edges
pub const BATCH_FIELDS: &str = "title,authors,year,abstract,citationCount,venue,openAccessPdf,url,referenceCount,influentialCitationCount,publicationDate,citations,references";

const SERVICE: &str = "scholar";
const CLIENT_USER_AGENT: &str = concat!("litgraph/", env!("CARGO_PKG_VERSION"));

/// Source of paper metadata
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Keyword search; returns up to `limit` papers without graph edges
    async fn search_by_keyword(&self, query: &str, limit: usize) -> Vec<PaperRecord>;

    /// Best title match, if any
    async fn search_by_title(&self, title: &str) -> Option<PaperRecord>;

    /// Full records including references and citations
    async fn batch_details(&self, ids: &[String]) -> Vec<PaperRecord>;
}

/// HTTP client for the paper search service
pub struct ScholarClient {
    client: reqwest::Client,
    config: ScholarConfig,
}

impl ScholarClient {
    /// Create a new client
    pub fn new(config: ScholarConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e| {
                AppError::Configuration {
                    message: format!("Invalid search API key: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Keyword search, surfacing errors
    pub async fn try_search_by_keyword(&self, query: &str, limit: usize) -> Result<Vec<PaperRecord>> {
        let url = self.url("search");
        let limit = limit.to_string();

        let body = self
            .send_json(|| {
                self.client.get(&url).query(&[
                    ("query", query),
                    ("limit", limit.as_str()),
                    ("offset", "0"),
                    ("fields", SEARCH_FIELDS),
                ])
            })
            .await?;

        self.dump("search_papers", &body).await;
        Ok(papers_from(body))
    }

    /// Title match, surfacing errors. A 404 means no match.
    pub async fn try_search_by_title(&self, title: &str) -> Result<Option<PaperRecord>> {
        let url = self.url("search/match");

        match self
            .send_json(|| self.client.get(&url).query(&[("query", title)]))
            .await
        {
            Ok(body) => Ok(papers_from(body).into_iter().next()),
            Err(AppError::UpstreamStatus { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Batch lookup of one chunk, surfacing errors
    pub async fn try_batch_details(&self, ids: &[String]) -> Result<Vec<PaperRecord>> {
        let url = self.url("batch");
        let payload = json!({ "ids": ids });

        let body = self
            .send_json(|| {
                self.client
                    .post(&url)
                    .query(&[("fields", BATCH_FIELDS)])
                    .json(&payload)
            })
            .await?;

        self.dump("batch_details", &body).await;
        Ok(papers_from(body))
    }

    /// Send a request, retrying transient failures with exponential backoff
    async fn send_json<F>(&self, build: F) -> Result<Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_retries = self.config.max_retries;
        let timeout_ms = self.config.timeout_secs * 1000;
        let attempts = AtomicU32::new(0);

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(8))
            .with_max_elapsed_time(Some(Duration::from_secs(120)))
            .build();

        let attempts = &attempts;
        let build = &build;

        backoff::future::retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            match send_once(build(), timeout_ms).await {
                Ok(body) => Ok(body),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries,
                        error = %e,
                        "Search request failed, retrying"
                    );
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    /// Write a raw response body under the dump directory, if configured
    async fn dump(&self, prefix: &str, body: &Value) {
        let Some(dir) = self.config.dump_dir.as_deref().filter(|d| !d.is_empty()) else {
            return;
        };

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = PathBuf::from(dir).join(format!("{}_{}.json", prefix, timestamp));

        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            let bytes = serde_json::to_vec_pretty(body)?;
            tokio::fs::write(&path, bytes).await?;
            Ok::<_, AppError>(())
        }
        .await;

        match result {
            Ok(()) => info!(path = %path.display(), "Saved raw search response"),
            Err(e) => error!(path = %path.display(), error = %e, "Failed to save raw search response"),
        }
    }
}

async fn send_once(request: reqwest::RequestBuilder, timeout_ms: u64) -> Result<Value> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            AppError::UpstreamTimeout { timeout_ms }
        } else {
            AppError::HttpClient(e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(512)
            .collect();
        return Err(AppError::UpstreamStatus {
            service: SERVICE.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    response.json::<Value>().await.map_err(|e| AppError::Upstream {
        service: SERVICE.to_string(),
        message: format!("Failed to parse response: {}", e),
    })
}

/// Normalise a response body that is either a bare array or `{"data": [...]}`
fn papers_from(body: Value) -> Vec<PaperRecord> {
    let entries = match body {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(RawPaper::from_value)
        .map(RawPaper::normalize)
        .collect()
}

#[async_trait]
impl PaperSource for ScholarClient {
    async fn search_by_keyword(&self, query: &str, limit: usize) -> Vec<PaperRecord> {
        info!(query = %query, limit, "Keyword search");
        let result = self.try_search_by_keyword(query, limit).await;
        metrics::record_upstream(SERVICE, "search", result.is_ok());
        result.unwrap_or_else(|e| {
            error!(error = %e, "Keyword search failed");
            Vec::new()
        })
    }

    async fn search_by_title(&self, title: &str) -> Option<PaperRecord> {
        info!(title = %title, "Title match");
        let result = self.try_search_by_title(title).await;
        metrics::record_upstream(SERVICE, "search_match", result.is_ok());
        result.unwrap_or_else(|e| {
            error!(error = %e, "Title match failed");
            None
        })
    }

    async fn batch_details(&self, ids: &[String]) -> Vec<PaperRecord> {
        if ids.is_empty() {
            return Vec::new();
        }
        info!(count = ids.len(), "Batch detail lookup");

        let mut papers = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.config.batch_size.max(1)) {
            let result = self.try_batch_details(chunk).await;
            metrics::record_upstream(SERVICE, "batch", result.is_ok());
            match result {
                Ok(found) => {
                    debug!(requested = chunk.len(), found = found.len(), "Batch chunk resolved");
                    papers.extend(found);
                }
                Err(e) => error!(error = %e, chunk = chunk.len(), "Batch chunk failed, skipping"),
            }
        }
        papers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Query, State},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct Calls {
        batch: AtomicU32,
        search: AtomicU32,
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(api_base: String, batch_size: usize, max_retries: u32) -> ScholarClient {
        ScholarClient::new(ScholarConfig {
            api_base,
            batch_size,
            max_retries,
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_papers_from_accepts_both_shapes() {
        let bare = json!([{"paperId": "a"}, null, {"paperId": "b"}]);
        assert_eq!(papers_from(bare).len(), 2);

        let wrapped = json!({"total": 1, "data": [{"paperId": "a"}]});
        assert_eq!(papers_from(wrapped)[0].id(), Some("a"));

        assert!(papers_from(json!({"message": "nope"})).is_empty());
    }

    #[tokio::test]
    async fn test_batch_details_chunks_requests() {
        let calls = Arc::new(Calls::default());
        let router = Router::new()
            .route(
                "/batch",
                post(|State(calls): State<Arc<Calls>>, Json(body): Json<Value>| async move {
                    calls.batch.fetch_add(1, Ordering::SeqCst);
                    let papers: Vec<Value> = body["ids"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|id| json!({"paperId": id, "references": [{"paperId": "r"}]}))
                        .collect();
                    Json(Value::Array(papers))
                }),
            )
            .with_state(calls.clone());

        let source = client(spawn(router).await, 2, 0);
        let ids: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        let papers = source.batch_details(&ids).await;

        assert_eq!(papers.len(), 5);
        assert_eq!(calls.batch.load(Ordering::SeqCst), 3);
        assert_eq!(papers[4].references[0].paper_id, "r");
    }

    #[tokio::test]
    async fn test_keyword_search_retries_rate_limit() {
        let calls = Arc::new(Calls::default());
        let router = Router::new()
            .route(
                "/search",
                get(
                    |State(calls): State<Arc<Calls>>, Query(params): Query<HashMap<String, String>>| async move {
                        if calls.search.fetch_add(1, Ordering::SeqCst) == 0 {
                            return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"message": "slow down"})));
                        }
                        assert_eq!(params.get("limit").map(String::as_str), Some("10"));
                        (StatusCode::OK, Json(json!({"data": [{"paperId": "s1", "title": "Seed"}]})))
                    },
                ),
            )
            .with_state(calls.clone());

        let source = client(spawn(router).await, 500, 2);
        let papers = source.search_by_keyword("graph neural networks", 10).await;

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Seed");
        assert_eq!(calls.search.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let calls = Arc::new(Calls::default());
        let router = Router::new()
            .route(
                "/search",
                get(|State(calls): State<Arc<Calls>>| async move {
                    calls.search.fetch_add(1, Ordering::SeqCst);
                    StatusCode::BAD_REQUEST
                }),
            )
            .with_state(calls.clone());

        let source = client(spawn(router).await, 500, 3);
        assert!(source.search_by_keyword("x", 10).await.is_empty());
        assert_eq!(calls.search.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_title_match_not_found_is_none() {
        let router = Router::new().route("/search/match", get(|| async { StatusCode::NOT_FOUND }));
        let source = client(spawn(router).await, 500, 0);

        assert!(source.try_search_by_title("Unknown Paper").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dump_writes_raw_body() {
        let router = Router::new().route(
            "/search",
            get(|| async { Json(json!({"data": [{"paperId": "s1"}]})) }),
        );

        let dir = std::env::temp_dir().join(format!("litgraph-dump-{}", std::process::id()));
        let mut source = client(spawn(router).await, 500, 0);
        source.config.dump_dir = Some(dir.to_string_lossy().into_owned());

        source.search_by_keyword("x", 1).await;

        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        assert!(entry.file_name().to_string_lossy().starts_with("search_papers_"));
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
