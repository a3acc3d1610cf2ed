//! Tree construction orchestration and the worker pool that runs it
//! across documents in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::capabilities::completion::{CompletionRequest, CompletionResponse};
use crate::capabilities::{CompletionClient, ResultSink, WebSearch};
use crate::config::TreeConfig;
use crate::document::Document;
use crate::error::{BuilderError, BuilderResult};
use crate::extenders::{ExtensionContext, ParallelExtender, SeriesExtender};
use crate::extractor::ShortAnswerExtractor;
use crate::guards::CircularGuard;
use crate::root_builder::RootQueryBuilder;
use crate::synthesizer::CompositeSynthesizer;
use crate::trajectory::TrajectoryRecorder;
use crate::types::{AgentTree, SearchSnippet, TreeNode, TreeStatistics, ValidationResults};

/// Wraps a `CompletionClient` to count calls and sum token usage over one
/// tree's construction, adapted from a process-wide Prometheus-backed token
/// timer to per-tree atomics since statistics here travel on the
/// `AgentTree` record itself rather than to a metrics exporter.
struct MeteredCompletion<'a> {
    inner: &'a dyn CompletionClient,
    calls: AtomicU32,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl<'a> MeteredCompletion<'a> {
    fn new(inner: &'a dyn CompletionClient) -> Self {
        Self {
            inner,
            calls: AtomicU32::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl<'a> CompletionClient for MeteredCompletion<'a> {
    async fn complete(&self, request: CompletionRequest<'_>) -> BuilderResult<CompletionResponse> {
        let response = self.inner.complete(request).await?;
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens.fetch_add(u64::from(response.prompt_tokens), Ordering::Relaxed);
        self.completion_tokens.fetch_add(u64::from(response.completion_tokens), Ordering::Relaxed);
        Ok(response)
    }
}

/// Wraps a `WebSearch` to count snippets returned over one tree's
/// construction; stays at zero if every call comes back empty (a search
/// outage), which is exactly the signal the emitted statistics should carry.
struct MeteredSearch<'a> {
    inner: &'a dyn WebSearch,
    snippets_used: AtomicU32,
}

impl<'a> MeteredSearch<'a> {
    fn new(inner: &'a dyn WebSearch) -> Self {
        Self {
            inner,
            snippets_used: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl<'a> WebSearch for MeteredSearch<'a> {
    async fn search(&self, query: &str, k: usize) -> Vec<SearchSnippet> {
        let results = self.inner.search(query, k).await;
        self.snippets_used.fetch_add(results.len() as u32, Ordering::Relaxed);
        results
    }
}

/// A unit of work submitted to the pool: build every tree rooted in one
/// document's extracted short answers.
struct TreeJob {
    id: String,
    document: Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

struct JobState {
    status: JobStatus,
}

/// Drives the six-step construction protocol for a single document.
pub struct TreeBuilder<'a> {
    completion: &'a dyn CompletionClient,
    search: &'a dyn WebSearch,
    tree_config: &'a TreeConfig,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(completion: &'a dyn CompletionClient, search: &'a dyn WebSearch, tree_config: &'a TreeConfig) -> Self {
        Self {
            completion,
            search,
            tree_config,
        }
    }

    /// Build every tree that can be rooted in `document`'s top-K short
    /// answers. A fatal failure for one short answer skips to the next;
    /// partial trees are never emitted.
    pub async fn build_trees(&self, document: &Document) -> Vec<AgentTree> {
        let extractor = ShortAnswerExtractor::new(self.tree_config.top_k_answers_per_doc);
        let short_answers = match extractor.extract(document) {
            Ok(answers) => answers,
            Err(err) => {
                tracing::warn!(doc_id = %document.doc_id, "short answer extraction failed: {err}");
                return Vec::new();
            }
        };

        let mut trees = Vec::new();
        for short_answer in short_answers {
            let mut recorder = TrajectoryRecorder::new();
            match self.build_one_tree(document, &short_answer, &mut recorder).await {
                Ok(tree) => trees.push(tree),
                Err(err) => {
                    tracing::info!(doc_id = %document.doc_id, answer = %short_answer.text, "tree construction abandoned: {err}");
                }
            }
        }
        trees
    }

    async fn build_one_tree(
        &self,
        document: &Document,
        short_answer: &crate::types::ShortAnswer,
        recorder: &mut TrajectoryRecorder,
    ) -> BuilderResult<AgentTree> {
        let start = Instant::now();
        let metered_completion = MeteredCompletion::new(self.completion);
        let metered_search = MeteredSearch::new(self.search);
        let completion: &dyn CompletionClient = &metered_completion;
        let search: &dyn WebSearch = &metered_search;

        // S1: build the root query.
        let root_builder = RootQueryBuilder::new(completion, search, self.tree_config);
        let root_query = root_builder.build_root(short_answer, &short_answer.context_window).await?;
        recorder.record(
            "S1_root",
            0,
            root_query.generation_method,
            None,
            None,
            Some(root_query.text.clone()),
            Some(root_query.answer.clone()),
            ValidationResults::default(),
            1,
            start.elapsed().as_millis() as u64,
            None,
        );

        // S2 is folded into S1 (RootQueryBuilder already runs KeywordMinimizer).

        let mut root_node = TreeNode::new_root(root_query.clone());

        let ext_ctx = ExtensionContext {
            completion,
            search,
            tree_config: self.tree_config,
            root_answer: short_answer,
        };

        // S3: series extensions at layer 1, optionally recursed to layer 2.
        let series_extender = SeriesExtender::new(ExtensionContext {
            completion,
            search,
            tree_config: self.tree_config,
            root_answer: short_answer,
        });

        for keyword in root_query.essential_keywords() {
            let path = vec![&root_query];
            match series_extender.extend(&root_query, &keyword.text, &path, &path).await {
                Ok(layer1_node) => {
                    let layer1_query = layer1_node.query.clone();
                    let mut layer1_node = layer1_node;

                    if self.tree_config.series_depth_cap > 0 {
                        let path2 = vec![&root_query, &layer1_query];
                        for layer1_keyword in layer1_query.essential_keywords().take(self.tree_config.series_depth_cap) {
                            if let Ok(layer2_node) = series_extender
                                .extend(&layer1_query, &layer1_keyword.text, &path2, &path2)
                                .await
                            {
                                layer1_node.children.push(layer2_node);
                            }
                        }
                    }
                    root_node.children.push(layer1_node);
                }
                Err(err) => {
                    tracing::debug!(keyword = %keyword.text, "series extension skipped: {err}");
                }
            }
        }

        // S4: parallel extensions at layer 1.
        let parallel_extender = ParallelExtender::new(ext_ctx);
        let path = vec![&root_query];
        let parallel_children = parallel_extender.extend_all(&root_query, &path, &path).await?;
        root_node.children.extend(parallel_children);

        // S5: structural invariants (depth bound, defense-in-depth sweep).
        if root_node.max_layer() > self.tree_config.depth_cap {
            return Err(BuilderError::TreeStructureInvalid(format!(
                "tree exceeds depth cap {}",
                self.tree_config.depth_cap
            )));
        }
        CircularGuard::new().sweep(&root_node)?;

        // S6: composite synthesis.
        let synthesizer = CompositeSynthesizer::new(completion);
        let (composites, fallback_flags) = synthesizer.synthesize(&root_node, short_answer).await?;

        recorder.record(
            "S6_synthesis",
            root_node.max_layer(),
            root_query.generation_method,
            None,
            None,
            Some(composites.nested.clone()),
            None,
            ValidationResults::default(),
            0,
            start.elapsed().as_millis() as u64,
            None,
        );

        let statistics = TreeStatistics {
            node_count: root_node.iter().count(),
            llm_call_count: metered_completion.calls.load(Ordering::Relaxed),
            prompt_tokens: metered_completion.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: metered_completion.completion_tokens.load(Ordering::Relaxed),
            search_snippets_used: metered_search.snippets_used.load(Ordering::Relaxed),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        Ok(AgentTree {
            id: format!("tree-{}", Uuid::new_v4()),
            root_short_answer: short_answer.clone(),
            root: root_node,
            composites,
            fallback_flags,
            trajectory: std::mem::take(recorder).into_entries(),
            statistics,
        })
    }
}

/// Worker-pool driver that processes documents concurrently, grounded in the
/// teacher's bounded-channel/worker-loop research pool shape. Trees
/// are emitted to the sink as soon as each document completes; there is no
/// cross-document ordering guarantee.
pub struct TreeOrchestrator {
    jobs: Arc<RwLock<HashMap<String, JobState>>>,
    job_sender: mpsc::Sender<(TreeJob, oneshot::Sender<()>)>,
    shutdown: Arc<RwLock<bool>>,
}

impl TreeOrchestrator {
    /// Spawn `worker_count` workers, each pulling documents from a bounded
    /// queue (`queue_capacity`) and running the full per-document build.
    pub fn spawn(
        completion: Arc<dyn CompletionClient>,
        search: Arc<dyn WebSearch>,
        sink: Arc<dyn ResultSink>,
        tree_config: TreeConfig,
    ) -> Self {
        let (job_sender, job_receiver) = mpsc::channel(tree_config.queue_capacity);
        let job_receiver = Arc::new(tokio::sync::Mutex::new(job_receiver));
        let jobs = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = Arc::new(RwLock::new(false));

        for worker_id in 0..tree_config.worker_count.max(1) {
            let job_receiver = job_receiver.clone();
            let jobs = jobs.clone();
            let shutdown = shutdown.clone();
            let completion = completion.clone();
            let search = search.clone();
            let sink = sink.clone();
            let tree_config = tree_config.clone();

            tokio::spawn(async move {
                Self::worker_loop(worker_id, job_receiver, jobs, shutdown, completion, search, sink, tree_config).await;
            });
        }

        Self {
            jobs,
            job_sender,
            shutdown,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn worker_loop(
        worker_id: usize,
        job_receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<(TreeJob, oneshot::Sender<()>)>>>,
        jobs: Arc<RwLock<HashMap<String, JobState>>>,
        shutdown: Arc<RwLock<bool>>,
        completion: Arc<dyn CompletionClient>,
        search: Arc<dyn WebSearch>,
        sink: Arc<dyn ResultSink>,
        tree_config: TreeConfig,
    ) {
        tracing::info!(worker_id, "tree builder worker started");
        loop {
            if *shutdown.read() {
                break;
            }
            let next = { job_receiver.lock().await.recv().await };
            let Some((job, done)) = next else {
                break;
            };

            {
                let mut guard = jobs.write();
                guard.insert(
                    job.id.clone(),
                    JobState {
                        status: JobStatus::Running,
                    },
                );
            }

            let builder = TreeBuilder::new(completion.as_ref(), search.as_ref(), &tree_config);
            let trees = builder.build_trees(&job.document).await;

            let mut status = JobStatus::Completed;
            for tree in &trees {
                if let Err(err) = sink.write(tree).await {
                    tracing::error!(worker_id, "result sink write failed: {err}");
                    status = JobStatus::Failed;
                }
            }

            if let Some(state) = jobs.write().get_mut(&job.id) {
                state.status = status;
            }
            let _ = done.send(());
        }
        tracing::info!(worker_id, "tree builder worker stopped");
    }

    /// Submit a document for tree construction and wait for completion.
    pub async fn submit_and_wait(&self, document: Document) -> BuilderResult<()> {
        let job_id = Uuid::new_v4().to_string();
        let (done_tx, done_rx) = oneshot::channel();
        self.jobs.write().insert(
            job_id.clone(),
            JobState {
                status: JobStatus::Queued,
            },
        );

        self.job_sender
            .send((TreeJob { id: job_id, document }, done_tx))
            .await
            .map_err(|e| BuilderError::TreeStructureInvalid(format!("job queue closed: {e}")))?;

        done_rx
            .await
            .map_err(|e| BuilderError::TreeStructureInvalid(format!("worker dropped job: {e}")))
    }

    pub fn active_job_count(&self) -> usize {
        self.jobs
            .read()
            .values()
            .filter(|s| matches!(s.status, JobStatus::Queued | JobStatus::Running))
            .count()
    }
}

impl Drop for TreeOrchestrator {
    fn drop(&mut self) {
        *self.shutdown.write() = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::completion::mock::MockCompletionClient;
    use crate::capabilities::search::mock::MockWebSearch;
    use crate::config::TreeConfig;
    use crate::document::SourceKind;

    fn config() -> TreeConfig {
        TreeConfig {
            top_k_answers_per_doc: 1,
            breadth_cap_parallel: 1,
            depth_cap: 2,
            semantic_similarity_reject_threshold: 0.30,
            keyword_min: 1,
            worker_count: 1,
            queue_capacity: 4,
            regeneration_attempts: 1,
            series_depth_cap: 0,
        }
    }

    #[tokio::test]
    async fn test_build_trees_returns_empty_when_extraction_fails() {
        let completion = MockCompletionClient::single("NO");
        let search = MockWebSearch::empty();
        let tree_config = config();
        let builder = TreeBuilder::new(&completion, &search, &tree_config);
        let document = Document {
            doc_id: "doc-1".to_string(),
            topic_id: "t".to_string(),
            content: "I believe it is said allegedly.".to_string(),
            source_kind: SourceKind::WebCrawl,
        };
        let trees = builder.build_trees(&document).await;
        assert!(trees.is_empty());
    }
}
