//! Document ingestion contract. Topic grouping, quality screening, and
//! corpus classification live upstream; this crate only consumes the result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where a document originated, carried through but not interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    WebCrawl,
    AcademicPaper,
    Other(String),
}

/// A UTF-8 text record consumed by `ShortAnswerExtractor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub topic_id: String,
    pub content: String,
    pub source_kind: SourceKind,
}

impl Document {
    /// Documents up to ~200k characters are expected; larger inputs are still
    /// accepted but extractors may truncate their working window.
    pub const MAX_RECOMMENDED_CHARS: usize = 200_000;
}

/// Upstream capability: ingestion, topic grouping, and quality screening are
/// treated as already having happened by the time a `Document` reaches this
/// crate. Implementations may stream from a crawl store, a dataset file, or
/// a database; the pipeline only needs ordered, topic-grouped batches.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Fetch the next batch of documents for a given topic, or all topics if
    /// `topic_id` is `None`. An empty vector signals exhaustion.
    async fn next_batch(&self, topic_id: Option<&str>, limit: usize) -> anyhow::Result<Vec<Document>>;
}

/// In-memory `DocumentProvider` for tests and small offline runs.
#[derive(Debug, Default)]
pub struct StaticDocumentProvider {
    documents: Vec<Document>,
}

impl StaticDocumentProvider {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl DocumentProvider for StaticDocumentProvider {
    async fn next_batch(&self, topic_id: Option<&str>, limit: usize) -> anyhow::Result<Vec<Document>> {
        let filtered: Vec<Document> = self
            .documents
            .iter()
            .filter(|d| topic_id.is_none_or(|t| d.topic_id == t))
            .take(limit)
            .cloned()
            .collect();
        Ok(filtered)
    }
}
