//! Cycle detection, run on every candidate insertion and again as an
//! end-of-tree sweep before composite synthesis.

use std::collections::HashSet;

use crate::error::BuilderError;
use crate::types::{Query, TreeNode};

const EDIT_DISTANCE_DUPLICATE_THRESHOLD: f64 = 0.1;
const SEMANTIC_CYCLE_THRESHOLD: f64 = 0.30;

use super::{cosine_similarity, normalized_edit_distance};

/// Detects the four cycle patterns: direct repetition, reverse cycles,
/// semantic loops, and keyword reuse across ancestors.
#[derive(Debug, Default)]
pub struct CircularGuard;

impl CircularGuard {
    pub fn new() -> Self {
        Self
    }

    /// Checks a candidate against its ancestor path and existing siblings.
    pub fn check(&self, candidate: &Query, parent: &Query, path: &[&Query]) -> Result<(), BuilderError> {
        if let Some(dup) = path
            .iter()
            .find(|node| normalized_edit_distance(&candidate.text, &node.text) < EDIT_DISTANCE_DUPLICATE_THRESHOLD)
        {
            return Err(BuilderError::CycleDetected {
                pattern: "direct_repetition".to_string(),
                reason: format!("near-duplicate of '{}'", dup.id),
            });
        }

        if is_reverse_cycle(candidate, parent) {
            return Err(BuilderError::CycleDetected {
                pattern: "reverse_cycle".to_string(),
                reason: format!("candidate reverses parent '{}'", parent.id),
            });
        }

        if let Some(cycle) = find_semantic_cycle(candidate, path) {
            return Err(BuilderError::CycleDetected {
                pattern: "semantic_cycle".to_string(),
                reason: cycle,
            });
        }

        let candidate_keywords: HashSet<&str> = candidate.essential_keywords().map(|k| k.text.as_str()).collect();
        for ancestor in path {
            let ancestor_keywords: HashSet<&str> = ancestor.essential_keywords().map(|k| k.text.as_str()).collect();
            if candidate_keywords.intersection(&ancestor_keywords).next().is_some() {
                return Err(BuilderError::CycleDetected {
                    pattern: "keyword_cycle".to_string(),
                    reason: format!("keyword reused from ancestor '{}'", ancestor.id),
                });
            }
        }

        Ok(())
    }

    /// Defense-in-depth sweep over a fully-assembled tree, invoked before
    /// composite synthesis. Re-checks all four cycle patterns: direct
    /// repetition across every node pair, and reverse/semantic/keyword
    /// cycles along every root-to-node ancestor path.
    pub fn sweep(&self, root: &TreeNode) -> Result<(), BuilderError> {
        let nodes: Vec<&TreeNode> = root.iter().collect();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let a = &nodes[i].query;
                let b = &nodes[j].query;
                if a.id == b.id {
                    continue;
                }
                if normalized_edit_distance(&a.text, &b.text) < EDIT_DISTANCE_DUPLICATE_THRESHOLD {
                    return Err(BuilderError::CycleDetected {
                        pattern: "direct_repetition".to_string(),
                        reason: format!("tree sweep found near-duplicate nodes '{}' and '{}'", a.id, b.id),
                    });
                }
            }
        }

        self.sweep_structural(root, &[])
    }

    /// Walks every root-to-node path, applying the same reverse/semantic/
    /// keyword cycle checks `check` applies per-candidate, so a cycle that
    /// slipped past insertion-time validation is still caught in the
    /// assembled tree.
    fn sweep_structural(&self, node: &TreeNode, path: &[&Query]) -> Result<(), BuilderError> {
        if let Some(parent) = path.last().copied() {
            if is_reverse_cycle(&node.query, parent) {
                return Err(BuilderError::CycleDetected {
                    pattern: "reverse_cycle".to_string(),
                    reason: format!("tree sweep found reverse cycle between '{}' and parent '{}'", node.query.id, parent.id),
                });
            }
        }

        if let Some(cycle) = find_semantic_cycle(&node.query, path) {
            return Err(BuilderError::CycleDetected {
                pattern: "semantic_cycle".to_string(),
                reason: format!("tree sweep found {cycle}"),
            });
        }

        let node_keywords: HashSet<&str> = node.query.essential_keywords().map(|k| k.text.as_str()).collect();
        for ancestor in path {
            let ancestor_keywords: HashSet<&str> = ancestor.essential_keywords().map(|k| k.text.as_str()).collect();
            if node_keywords.intersection(&ancestor_keywords).next().is_some() {
                return Err(BuilderError::CycleDetected {
                    pattern: "keyword_cycle".to_string(),
                    reason: format!("tree sweep found keyword reused from ancestor '{}'", ancestor.id),
                });
            }
        }

        let mut next_path = path.to_vec();
        next_path.push(&node.query);
        for child in &node.children {
            self.sweep_structural(child, &next_path)?;
        }
        Ok(())
    }
}

fn is_reverse_cycle(candidate: &Query, parent: &Query) -> bool {
    let parent_answer = parent.answer.to_lowercase();
    let candidate_mentions_parent_answer = candidate.text.to_lowercase().contains(&parent_answer);
    let parent_mentions_candidate_answer = parent
        .text
        .to_lowercase()
        .contains(&candidate.answer.to_lowercase());
    candidate_mentions_parent_answer && parent_mentions_candidate_answer
}

fn find_semantic_cycle(candidate: &Query, path: &[&Query]) -> Option<String> {
    if path.len() < 2 {
        return None;
    }
    // A closed loop of 3+ nodes: the candidate is pairwise similar to at
    // least two distinct ancestors, which are themselves pairwise similar.
    let similar_to_candidate: Vec<&&Query> = path
        .iter()
        .filter(|ancestor| cosine_similarity(&candidate.text, &ancestor.text) > SEMANTIC_CYCLE_THRESHOLD)
        .collect();

    if similar_to_candidate.len() < 2 {
        return None;
    }

    for i in 0..similar_to_candidate.len() {
        for j in (i + 1)..similar_to_candidate.len() {
            let a = similar_to_candidate[i];
            let b = similar_to_candidate[j];
            if cosine_similarity(&a.text, &b.text) > SEMANTIC_CYCLE_THRESHOLD {
                return Some(format!("closed semantic loop among '{}', '{}', candidate", a.id, b.id));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Branch, GenerationMethod, Keyword};

    fn query(id: &str, text: &str, answer: &str, keyword: &str) -> Query {
        Query {
            id: id.to_string(),
            text: text.to_string(),
            answer: answer.to_string(),
            keywords: vec![Keyword {
                text: keyword.to_string(),
                position_in_question: 0,
                importance: 0.5,
                uniqueness: 0.5,
                essential: true,
            }],
            layer: 1,
            generation_method: GenerationMethod::Series,
            confidence: 0.9,
            complexity: 0.3,
        }
    }

    #[test]
    fn test_check_rejects_direct_repetition() {
        let guard = CircularGuard::new();
        let parent = query("root", "What satellite launched in 1957?", "Sputnik", "Sputnik");
        let candidate = query("c1", "What satellite launched in 1957?", "Sputnik", "Sputnik");
        let result = guard.check(&candidate, &parent, &[&parent]);
        assert!(matches!(result, Err(BuilderError::CycleDetected { .. })));
    }

    #[test]
    fn test_check_rejects_keyword_cycle() {
        let guard = CircularGuard::new();
        let parent = query("root", "What satellite launched in 1957?", "Sputnik", "Sputnik");
        let candidate = query("c1", "Who designed the spacecraft named Sputnik?", "Korolev", "Sputnik");
        let result = guard.check(&candidate, &parent, &[&parent]);
        assert!(matches!(result, Err(BuilderError::CycleDetected { .. })));
    }

    #[test]
    fn test_check_accepts_distinct_candidate() {
        let guard = CircularGuard::new();
        let parent = query("root", "What satellite launched in 1957?", "Sputnik", "Sputnik");
        let candidate = query("c1", "Which agency built the first orbital craft?", "Soviet space program", "agency");
        let result = guard.check(&candidate, &parent, &[&parent]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_sweep_detects_duplicate_nodes() {
        let guard = CircularGuard::new();
        let root_query = query("root", "What satellite launched in 1957?", "Sputnik", "Sputnik");
        let mut root_node = TreeNode::new_root(root_query);
        let duplicate = query("c1", "What satellite launched in 1957?", "Sputnik", "Sputnik");
        root_node
            .children
            .push(TreeNode::new_child(duplicate, Branch::Series, "root"));
        let result = guard.sweep(&root_node);
        assert!(result.is_err());
    }

    #[test]
    fn test_sweep_detects_reverse_cycle() {
        let guard = CircularGuard::new();
        let root_query = query("root", "What satellite launched in 1957?", "Sputnik", "Sputnik");
        let mut root_node = TreeNode::new_root(root_query);
        let child = query("c1", "What was launched by Sputnik in the year?", "1957", "year");
        root_node.children.push(TreeNode::new_child(child, Branch::Series, "root"));
        let result = guard.sweep(&root_node);
        assert!(matches!(
            result,
            Err(BuilderError::CycleDetected { pattern, .. }) if pattern == "reverse_cycle"
        ));
    }

    #[test]
    fn test_sweep_detects_keyword_cycle_at_grandchild_depth() {
        let guard = CircularGuard::new();
        let root_query = query("root", "What satellite launched in 1957?", "Sputnik", "Sputnik");
        let mut root_node = TreeNode::new_root(root_query);
        let mut child = query("c1", "Which agency built the orbiting craft?", "Soviet space program", "agency");
        child.layer = 1;
        let mut child_node = TreeNode::new_child(child, Branch::Series, "root");
        let mut grandchild = query("c2", "What Sputnik design bureau led the agency?", "Korolev", "Sputnik");
        grandchild.layer = 2;
        child_node
            .children
            .push(TreeNode::new_child(grandchild, Branch::Series, "c1"));
        root_node.children.push(child_node);

        let result = guard.sweep(&root_node);
        assert!(matches!(
            result,
            Err(BuilderError::CycleDetected { pattern, .. }) if pattern == "keyword_cycle"
        ));
    }
}
