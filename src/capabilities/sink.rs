//! Result export capability: emitted `AgentTree`s leave the pipeline
//! through a `ResultSink`, never through ad hoc file writes scattered across
//! the orchestrator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rust_xlsxwriter::{Format, Workbook};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{BuilderError, BuilderResult};
use crate::types::AgentTree;

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn write(&self, tree: &AgentTree) -> BuilderResult<()>;
}

/// Appends one JSON document per tree to `<output_dir>/<tree_id>.json`.
#[derive(Debug)]
pub struct JsonFileSink {
    output_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn write(&self, tree: &AgentTree) -> BuilderResult<()> {
        fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{}.json", tree.id));
        let body = serde_json::to_vec_pretty(tree)?;
        let mut file = fs::File::create(&path).await?;
        file.write_all(&body).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Emits a multi-sheet spreadsheet per tree: overview, all queries,
/// trajectory, and composite forms, for manual benchmark review.
#[derive(Debug)]
pub struct WorkbookSink {
    output_dir: PathBuf,
}

impl WorkbookSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn build_workbook(tree: &AgentTree) -> BuilderResult<Workbook> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();

        let overview = workbook.add_worksheet().set_name("Tree").map_err(sheet_err)?;
        overview.write_with_format(0, 0, "tree_id", &header).map_err(sheet_err)?;
        overview.write(0, 1, tree.id.as_str()).map_err(sheet_err)?;
        overview.write_with_format(1, 0, "root_answer", &header).map_err(sheet_err)?;
        overview
            .write(1, 1, tree.root_short_answer.text.as_str())
            .map_err(sheet_err)?;
        overview.write_with_format(2, 0, "node_count", &header).map_err(sheet_err)?;
        overview
            .write(2, 1, tree.all_queries().len() as f64)
            .map_err(sheet_err)?;
        overview.write_with_format(3, 0, "llm_call_count", &header).map_err(sheet_err)?;
        overview
            .write(3, 1, f64::from(tree.statistics.llm_call_count))
            .map_err(sheet_err)?;
        overview.write_with_format(4, 0, "prompt_tokens", &header).map_err(sheet_err)?;
        overview
            .write(4, 1, tree.statistics.prompt_tokens as f64)
            .map_err(sheet_err)?;
        overview.write_with_format(5, 0, "completion_tokens", &header).map_err(sheet_err)?;
        overview
            .write(5, 1, tree.statistics.completion_tokens as f64)
            .map_err(sheet_err)?;
        overview
            .write_with_format(6, 0, "search_snippets_used", &header)
            .map_err(sheet_err)?;
        overview
            .write(6, 1, f64::from(tree.statistics.search_snippets_used))
            .map_err(sheet_err)?;
        overview.write_with_format(7, 0, "elapsed_ms", &header).map_err(sheet_err)?;
        overview
            .write(7, 1, tree.statistics.elapsed_ms as f64)
            .map_err(sheet_err)?;

        let queries = workbook.add_worksheet().set_name("Queries").map_err(sheet_err)?;
        for (col, label) in ["id", "layer", "method", "text", "answer", "confidence"]
            .iter()
            .enumerate()
        {
            queries.write_with_format(0, col as u16, *label, &header).map_err(sheet_err)?;
        }
        for (row, query) in tree.all_queries().into_iter().enumerate() {
            let row = row as u32 + 1;
            queries.write(row, 0, query.id.as_str()).map_err(sheet_err)?;
            queries.write(row, 1, query.layer as f64).map_err(sheet_err)?;
            queries
                .write(row, 2, format!("{:?}", query.generation_method))
                .map_err(sheet_err)?;
            queries.write(row, 3, query.text.as_str()).map_err(sheet_err)?;
            queries.write(row, 4, query.answer.as_str()).map_err(sheet_err)?;
            queries.write(row, 5, query.confidence).map_err(sheet_err)?;
        }

        let trajectory = workbook.add_worksheet().set_name("Trajectory").map_err(sheet_err)?;
        for (col, label) in ["step", "layer", "current_question", "error"].iter().enumerate() {
            trajectory.write_with_format(0, col as u16, *label, &header).map_err(sheet_err)?;
        }
        for (row, entry) in tree.trajectory.iter().enumerate() {
            let row = row as u32 + 1;
            trajectory.write(row, 0, entry.step.as_str()).map_err(sheet_err)?;
            trajectory.write(row, 1, entry.layer as f64).map_err(sheet_err)?;
            trajectory
                .write(row, 2, entry.current_question.as_deref().unwrap_or(""))
                .map_err(sheet_err)?;
            trajectory
                .write(row, 3, entry.error.as_deref().unwrap_or(""))
                .map_err(sheet_err)?;
        }

        let composites = workbook.add_worksheet().set_name("Composites").map_err(sheet_err)?;
        composites.write_with_format(0, 0, "nested", &header).map_err(sheet_err)?;
        composites.write(0, 1, tree.composites.nested.as_str()).map_err(sheet_err)?;
        composites.write_with_format(1, 0, "fused", &header).map_err(sheet_err)?;
        composites.write(1, 1, tree.composites.fused.as_str()).map_err(sheet_err)?;
        composites
            .write_with_format(2, 0, "ambiguated", &header)
            .map_err(sheet_err)?;
        composites.write(2, 1, tree.composites.ambiguated.as_str()).map_err(sheet_err)?;

        Ok(workbook)
    }
}

fn sheet_err(e: rust_xlsxwriter::XlsxError) -> BuilderError {
    BuilderError::SinkError(e.to_string())
}

#[async_trait]
impl ResultSink for WorkbookSink {
    async fn write(&self, tree: &AgentTree) -> BuilderResult<()> {
        fs::create_dir_all(&self.output_dir).await?;
        let path: PathBuf = self.output_dir.join(format!("{}.xlsx", tree.id));
        let mut workbook = Self::build_workbook(tree)?;
        // rust_xlsxwriter's save is synchronous file IO; the trees are small
        // enough per-call that blocking the worker briefly is acceptable.
        workbook.save(&path).map_err(sheet_err)?;
        Ok(())
    }
}

/// Fan-out sink writing to every inner sink; used when both JSON and
/// spreadsheet exports are wanted for the same run.
pub struct FanOutSink {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Box<dyn ResultSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ResultSink for FanOutSink {
    async fn write(&self, tree: &AgentTree) -> BuilderResult<()> {
        for sink in &self.sinks {
            sink.write(tree).await?;
        }
        Ok(())
    }
}

pub(crate) fn ensure_dir_exists(dir: &Path) -> BuilderResult<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| BuilderError::SinkError(format!("failed to create output dir: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnswerKind, Composites, FallbackFlags, GenerationMethod, Query, ShortAnswer, TreeNode, TreeStatistics};

    fn sample_tree() -> AgentTree {
        let root_query = Query {
            id: "root".to_string(),
            text: "In what year was Sputnik 1 launched?".to_string(),
            answer: "1957".to_string(),
            keywords: Vec::new(),
            layer: 0,
            generation_method: GenerationMethod::Root,
            confidence: 0.9,
            complexity: 0.1,
        };
        AgentTree {
            id: "tree-test".to_string(),
            root_short_answer: ShortAnswer {
                text: "1957".to_string(),
                kind: AnswerKind::Date,
                char_offset: 0,
                context_window: "in 1957".to_string(),
                confidence: 0.9,
            },
            root: TreeNode::new_root(root_query),
            composites: Composites::default(),
            fallback_flags: FallbackFlags::default(),
            trajectory: Vec::new(),
            statistics: TreeStatistics::default(),
        }
    }

    #[tokio::test]
    async fn test_json_sink_writes_file() {
        let dir = std::env::temp_dir().join(format!("tree-builder-test-{}", std::process::id()));
        let sink = JsonFileSink::new(&dir);
        let tree = sample_tree();
        sink.write(&tree).await.unwrap();
        let path = dir.join("tree-test.json");
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_build_workbook_succeeds() {
        let tree = sample_tree();
        let workbook = WorkbookSink::build_workbook(&tree);
        assert!(workbook.is_ok());
    }
}
