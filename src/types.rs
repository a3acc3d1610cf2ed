//! Core data model: immutable value records for the reasoning-tree pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Surface type of an extracted short answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerKind {
    Name,
    Number,
    Date,
    Technical,
}

/// A brief, objective, span-level factual answer extracted from a document.
///
/// Created once by [`crate::extractor::ShortAnswerExtractor`] and owned by
/// exactly one [`AgentTree`]; never mutated after extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortAnswer {
    pub text: String,
    pub kind: AnswerKind,
    pub char_offset: usize,
    pub context_window: String,
    pub confidence: f64,
}

/// A keyword within a `Query`'s text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub position_in_question: usize,
    pub importance: f64,
    pub uniqueness: f64,
    /// True iff masking this keyword breaks unique determination of the answer.
    pub essential: bool,
}

/// Which step generated a `Query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationMethod {
    Root,
    Series,
    Parallel,
}

/// Branch kind of a `TreeNode` relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Branch {
    Root,
    Series,
    Parallel,
}

/// A generated question with its unique answer and supporting keywords.
///
/// Invariants (enforced by construction, not just asserted): `keywords.len() >= 2`,
/// every essential keyword's text appears literally in `text`, and `answer`
/// is uniquely determined by `text` under the reference probe (validated by
/// the component that built this `Query`, not re-checked here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub text: String,
    pub answer: String,
    pub keywords: Vec<Keyword>,
    pub layer: u8,
    pub generation_method: GenerationMethod,
    pub confidence: f64,
    pub complexity: f64,
}

impl Query {
    /// Essential keywords only, in question-position order.
    pub fn essential_keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter().filter(|k| k.essential)
    }

    pub fn essential_keyword_count(&self) -> usize {
        self.essential_keywords().count()
    }
}

/// A node in an `AgentTree`. Depth (layer) is bounded to `0..=2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub query: Query,
    pub branch: Branch,
    /// Id of the parent node's query, or `None` for the root.
    pub parent_id: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new_root(query: Query) -> Self {
        Self {
            query,
            branch: Branch::Root,
            parent_id: None,
            children: Vec::new(),
        }
    }

    pub fn new_child(query: Query, branch: Branch, parent_id: impl Into<String>) -> Self {
        Self {
            query,
            branch,
            parent_id: Some(parent_id.into()),
            children: Vec::new(),
        }
    }

    /// Depth-first iterator over this node and every descendant.
    pub fn iter(&self) -> TreeNodeIter<'_> {
        TreeNodeIter { stack: vec![self] }
    }

    pub fn max_layer(&self) -> u8 {
        self.iter().map(|n| n.query.layer).max().unwrap_or(0)
    }
}

/// Depth-first, pre-order iterator over a `TreeNode` and its descendants.
pub struct TreeNodeIter<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for TreeNodeIter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// The three final composite query forms produced by `CompositeSynthesizer`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Composites {
    pub nested: String,
    pub fused: String,
    pub ambiguated: String,
}

/// Whether a composite form fell back to the deterministic nested form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackFlags {
    pub fused: bool,
    pub ambiguated: bool,
}

/// Counts, timings, and token usage aggregated over one tree's construction.
/// Populated from the metered completion/search clients `TreeBuilder` wraps
/// around the shared capability handles for the duration of a single build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeStatistics {
    pub node_count: usize,
    pub llm_call_count: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub search_snippets_used: u32,
    pub elapsed_ms: u64,
}

/// A complete, emitted reasoning tree: root short answer, node graph,
/// composite query forms, the full construction trajectory, and summary
/// statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTree {
    pub id: String,
    pub root_short_answer: ShortAnswer,
    pub root: TreeNode,
    pub composites: Composites,
    pub fallback_flags: FallbackFlags,
    pub trajectory: Vec<TrajectoryEntry>,
    pub statistics: TreeStatistics,
}

impl AgentTree {
    /// Every query in the tree, depth-first from the root.
    pub fn all_queries(&self) -> Vec<&Query> {
        self.root.iter().map(|n| &n.query).collect()
    }
}

/// Per-signal verdicts recorded alongside a trajectory entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResults {
    pub keyword_overlap_ok: Option<bool>,
    pub topical_domain_ok: Option<bool>,
    pub semantic_similarity: Option<f64>,
    pub logical_dependency_ok: Option<bool>,
    pub root_exposure_risk: Option<String>,
    pub cycle_pattern: Option<String>,
}

/// A single append-only audit entry recorded by `TrajectoryRecorder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryEntry {
    pub step: String,
    pub layer: u8,
    pub parent_question: Option<String>,
    pub parent_answer: Option<String>,
    pub parent_keywords: Option<Vec<String>>,
    pub current_question: Option<String>,
    pub current_answer: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub validation_results: ValidationResults,
    pub keyword_necessity_scores: Option<Vec<f64>>,
    pub generation_method: GenerationMethod,
    pub api_call_count: u32,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

/// A single retrieved snippet from a `WebSearch` call. Never fabricated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub query: String,
    pub title: String,
    pub url: String,
    pub text: String,
    pub position: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(text: &str, essential: bool) -> Keyword {
        Keyword {
            text: text.to_string(),
            position_in_question: 0,
            importance: 0.5,
            uniqueness: 0.5,
            essential,
        }
    }

    fn query(id: &str, layer: u8, method: GenerationMethod) -> Query {
        Query {
            id: id.to_string(),
            text: format!("What is {id}?"),
            answer: "answer".to_string(),
            keywords: vec![kw("alpha", true), kw("beta", true)],
            layer,
            generation_method: method,
            confidence: 0.9,
            complexity: 0.5,
        }
    }

    #[test]
    fn test_essential_keyword_count() {
        let q = query("root", 0, GenerationMethod::Root);
        assert_eq!(q.essential_keyword_count(), 2);
    }

    #[test]
    fn test_tree_node_iter_depth_first() {
        let mut root = TreeNode::new_root(query("root", 0, GenerationMethod::Root));
        let child = TreeNode::new_child(query("child", 1, GenerationMethod::Series), Branch::Series, "root");
        root.children.push(child);

        let ids: Vec<&str> = root.iter().map(|n| n.query.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "child"]);
    }

    #[test]
    fn test_max_layer() {
        let mut root = TreeNode::new_root(query("root", 0, GenerationMethod::Root));
        let mut l1 = TreeNode::new_child(query("l1", 1, GenerationMethod::Series), Branch::Series, "root");
        let l2 = TreeNode::new_child(query("l2", 2, GenerationMethod::Series), Branch::Series, "l1");
        l1.children.push(l2);
        root.children.push(l1);

        assert_eq!(root.max_layer(), 2);
    }

    #[test]
    fn test_all_queries_count() {
        let mut root = TreeNode::new_root(query("root", 0, GenerationMethod::Root));
        root.children.push(TreeNode::new_child(
            query("p1", 1, GenerationMethod::Parallel),
            Branch::Parallel,
            "root",
        ));
        let tree = AgentTree {
            id: "tree-1".to_string(),
            root_short_answer: ShortAnswer {
                text: "1957".to_string(),
                kind: AnswerKind::Date,
                char_offset: 0,
                context_window: "in 1957".to_string(),
                confidence: 0.9,
            },
            root,
            composites: Composites::default(),
            fallback_flags: FallbackFlags::default(),
            trajectory: Vec::new(),
            statistics: TreeStatistics::default(),
        };
        assert_eq!(tree.all_queries().len(), 2);
    }
}
