//! Thin operator entry point: wires the capability implementations to the
//! orchestrator and drives a batch run over a document source.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use research_tree_builder::capabilities::{FanOutSink, HttpCompletionClient, HttpWebSearch, JsonFileSink, WorkbookSink};
use research_tree_builder::config::BuilderConfig;
use research_tree_builder::document::{DocumentProvider, StaticDocumentProvider};
use research_tree_builder::orchestrator::TreeOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    research_tree_builder::init_tracing();
    info!("starting tree builder run");

    let config = BuilderConfig::initialize()?;
    BuilderConfig::require_credentials()?;

    let completion_base_url =
        std::env::var("COMPLETION_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let search_endpoint = std::env::var("SEARCH_ENDPOINT").unwrap_or_else(|_| "http://localhost:8081/search".to_string());
    let input_path = std::env::var("TREE_BUILDER_INPUT_PATH").ok();

    let completion = Arc::new(HttpCompletionClient::new(completion_base_url, &config.llm)?);
    let search = Arc::new(HttpWebSearch::new(search_endpoint, &config.search));

    let output_dir = PathBuf::from(&config.sink.output_dir);
    let sink = Arc::new(FanOutSink::new(vec![
        Box::new(JsonFileSink::new(output_dir.clone())),
        Box::new(WorkbookSink::new(output_dir)),
    ]));

    let orchestrator = TreeOrchestrator::spawn(completion, search, sink, config.tree.clone());

    let documents = match input_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        }
        None => Vec::new(),
    };

    let provider = StaticDocumentProvider::new(documents);
    let batch = provider.next_batch(None, usize::MAX).await?;
    info!(count = batch.len(), "submitting documents for tree construction");

    for document in batch {
        orchestrator.submit_and_wait(document).await?;
    }

    info!("tree builder run complete");
    Ok(())
}
