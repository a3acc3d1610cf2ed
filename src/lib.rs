//! Builds interlinked agent-reasoning-tree benchmarks for evaluating
//! deep-research agents.
//!
//! Given a document, this crate extracts a short factual answer, builds a
//! minimal root question around it, grows series (depth) and parallel
//! (breadth) extensions up to two layers while enforcing non-correlation,
//! no-answer-exposure, and acyclicity invariants, and finally synthesizes
//! three composite query forms (nested, LLM-fused, ambiguated) from the
//! resulting tree.
//!
//! # Architecture
//!
//! - [`extractor`] finds the short answer anchor.
//! - [`root_builder`] and [`minimizer`] build and minimize the layer-0 root question.
//! - [`extenders`] grow series and parallel children at layers 1 and 2.
//! - [`guards`] enforce non-correlation, answer-exposure, and cycle invariants.
//! - [`synthesizer`] produces the final composite query forms.
//! - [`orchestrator`] drives the six-step protocol per document and fans
//!   construction out across a worker pool.
//! - [`capabilities`] holds the external collaborator contracts (LLM
//!   completion, web search, result export) that the rest of the crate is
//!   written against.
//!
//! # Usage
//!
//! ```rust,ignore
//! use research_tree_builder::config::BuilderConfig;
//! use research_tree_builder::orchestrator::TreeOrchestrator;
//!
//! let config = BuilderConfig::load()?;
//! let orchestrator = TreeOrchestrator::spawn(completion, search, sink, config.tree.clone());
//! orchestrator.submit_and_wait(document).await?;
//! ```

pub mod capabilities;
pub mod config;
pub mod document;
pub mod error;
pub mod extenders;
pub mod extractor;
pub mod guards;
pub mod minimizer;
pub mod orchestrator;
pub mod prompts;
pub mod root_builder;
pub mod synthesizer;
pub mod trajectory;
pub mod types;

pub use config::BuilderConfig;
pub use document::{Document, DocumentProvider};
pub use error::{BuilderError, BuilderResult};
pub use orchestrator::TreeOrchestrator;
pub use types::AgentTree;

/// Initialize structured logging for the tree builder, honoring `RUST_LOG`
/// if set and defaulting to `info` otherwise.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).json().try_init();
}
