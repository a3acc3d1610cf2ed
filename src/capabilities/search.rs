//! Web search capability: used by root-query building and the guards to
//! probe whether a candidate question uniquely surfaces its answer.
//!
//! On failure this must return an empty snippet list, never fabricate
//! results — callers treat an empty list as "no evidence", which in turn
//! drives rejection rather than silent success.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::types::SearchSnippet;

/// Search transport contract.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Fetch up to `k` snippets for `query`. Returns `Ok(vec![])` on any
    /// failure (timeout, non-2xx, empty result set) rather than an error,
    /// since an empty result is itself meaningful signal to callers.
    async fn search(&self, query: &str, k: usize) -> Vec<SearchSnippet>;
}

#[derive(Debug, Deserialize)]
struct RawSearchResult {
    title: String,
    url: String,
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    results: Vec<RawSearchResult>,
}

/// HTTP-backed `WebSearch`. Swallows transport errors per the trait contract
/// instead of surfacing them, since a failed search is recoverable (the
/// caller falls back to rejecting the candidate, not to crashing the tree).
#[derive(Debug)]
pub struct HttpWebSearch {
    client: reqwest::Client,
    endpoint: String,
    default_k: usize,
}

impl HttpWebSearch {
    pub fn new(endpoint: impl Into<String>, config: &SearchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            default_k: config.snippets_per_call,
        }
    }
}

#[async_trait]
impl WebSearch for HttpWebSearch {
    async fn search(&self, query: &str, k: usize) -> Vec<SearchSnippet> {
        let k = if k == 0 { self.default_k } else { k };
        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("k", &k.to_string())])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%query, "web search request failed: {e}");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            tracing::warn!(%query, status = %response.status(), "web search returned non-success status");
            return Vec::new();
        }

        let parsed: RawSearchResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(%query, "web search response parse failed: {e}");
                return Vec::new();
            }
        };

        parsed
            .results
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(position, r)| SearchSnippet {
                query: query.to_string(),
                title: r.title,
                url: r.url,
                text: r.snippet,
                position,
            })
            .collect()
    }
}
