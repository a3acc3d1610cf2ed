//! Composite query synthesis: nested, LLM-fused, and ambiguated forms
//! derived from a complete tree, each honoring the no-exposure invariant.

use std::sync::LazyLock;

use regex::Regex;

use crate::capabilities::CompletionClient;
use crate::capabilities::completion::CompletionRequest;
use crate::error::BuilderResult;
use crate::prompts::synthesize;
use crate::types::{Composites, FallbackFlags, Query, ShortAnswer, TreeNode};

static INTERROGATIVE_ARTEFACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(question\s*:|q\d*\s*:|###\s*q\s*:|^\d+[.)]\s*)").unwrap());

const FORBIDDEN_META_TOKENS: &[&str] = &["analyze", "determine", "consider", "figure out", "work out"];

/// Strip leading interrogative artefacts, surrounding quotes, numbering, and
/// collapse whitespace. Applied uniformly before any downstream use.
pub fn clean_question_text(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    loop {
        let stripped = INTERROGATIVE_ARTEFACT_RE.replace(&text, "").trim().to_string();
        if stripped == text {
            break;
        }
        text = stripped;
    }
    let text = text.trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”');
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds the three composite forms from a complete tree.
pub struct CompositeSynthesizer<'a> {
    completion: &'a dyn CompletionClient,
}

impl<'a> CompositeSynthesizer<'a> {
    pub fn new(completion: &'a dyn CompletionClient) -> Self {
        Self { completion }
    }

    pub async fn synthesize(&self, root: &TreeNode, root_answer: &ShortAnswer) -> BuilderResult<(Composites, FallbackFlags)> {
        let path = deepest_path(root);
        let layered: Vec<String> = path.iter().map(|q| q.text.clone()).collect();
        let layer_answers: Vec<String> = path.iter().map(|q| q.answer.clone()).collect();
        let nested = nested_form(&layered);

        let mut flags = FallbackFlags::default();

        let fused = match self.try_fused(&layered, &layer_answers, root_answer).await? {
            Some(text) => text,
            None => {
                flags.fused = true;
                nested.clone()
            }
        };

        let ambiguated = match self.try_ambiguated(&fused, &layer_answers, root_answer).await? {
            Some(text) => text,
            None => {
                flags.ambiguated = true;
                nested.clone()
            }
        };

        Ok((
            Composites {
                nested,
                fused,
                ambiguated,
            },
            flags,
        ))
    }

    async fn try_fused(
        &self,
        layered: &[String],
        layer_answers: &[String],
        root_answer: &ShortAnswer,
    ) -> BuilderResult<Option<String>> {
        let response = self
            .completion
            .complete(CompletionRequest {
                system: synthesize::fused_system(),
                user: &synthesize::fused_user(layered),
                temperature: 0.4,
                max_tokens: 256,
            })
            .await?;
        let cleaned = clean_question_text(&response.text);
        if violates_composite_constraints(&cleaned, layer_answers, root_answer) {
            return Ok(None);
        }
        Ok(Some(cleaned))
    }

    async fn try_ambiguated(
        &self,
        fused: &str,
        layer_answers: &[String],
        root_answer: &ShortAnswer,
    ) -> BuilderResult<Option<String>> {
        let response = self
            .completion
            .complete(CompletionRequest {
                system: synthesize::ambiguated_system(),
                user: &synthesize::ambiguated_user(fused),
                temperature: 0.4,
                max_tokens: 256,
            })
            .await?;
        let cleaned = clean_question_text(&response.text);
        if violates_composite_constraints(&cleaned, layer_answers, root_answer) {
            return Ok(None);
        }
        Ok(Some(cleaned))
    }
}

/// Picks the deepest path from root to a leaf and returns the queries along
/// it, root-first, so callers can read both question text and answer for
/// every layer without walking the tree twice.
fn deepest_path(root: &TreeNode) -> Vec<&Query> {
    fn deepest<'a>(node: &'a TreeNode) -> Vec<&'a TreeNode> {
        match node.children.iter().max_by_key(|c| c.query.layer) {
            Some(child) => {
                let mut path = vec![node];
                path.extend(deepest(child));
                path
            }
            None => vec![node],
        }
    }
    deepest(root).into_iter().map(|n| &n.query).collect()
}

fn nested_form(layered: &[String]) -> String {
    if layered.is_empty() {
        return String::new();
    }
    let mut iter = layered.iter().rev();
    let mut acc = iter.next().cloned().unwrap_or_default();
    for question in iter {
        acc = format!("({question}, {acc})");
    }
    acc
}

fn violates_composite_constraints(text: &str, layer_answers: &[String], root_answer: &ShortAnswer) -> bool {
    if text.is_empty() {
        return true;
    }
    let lower = text.to_lowercase();
    if FORBIDDEN_META_TOKENS.iter().any(|token| lower.contains(token)) {
        return true;
    }
    if lower.contains(&root_answer.text.to_lowercase()) {
        return true;
    }
    // Every layer's answer, not just the root's, must stay out of the
    // composite: a mid-tree answer leaking through is as much a violation
    // as the root answer leaking.
    layer_answers
        .iter()
        .filter(|answer| !answer.trim().is_empty())
        .any(|answer| lower.contains(&answer.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::capabilities::completion::mock::MockCompletionClient;
    use crate::types::{AnswerKind, Branch, GenerationMethod, Keyword, Query};

    fn query(id: &str, text: &str, answer: &str, layer: u8) -> Query {
        Query {
            id: id.to_string(),
            text: text.to_string(),
            answer: answer.to_string(),
            keywords: vec![Keyword {
                text: "kw".to_string(),
                position_in_question: 0,
                importance: 0.5,
                uniqueness: 0.5,
                essential: true,
            }],
            layer,
            generation_method: if layer == 0 { GenerationMethod::Root } else { GenerationMethod::Series },
            confidence: 0.9,
            complexity: 0.3,
        }
    }

    fn root_answer() -> ShortAnswer {
        ShortAnswer {
            text: "1957".to_string(),
            kind: AnswerKind::Date,
            char_offset: 0,
            context_window: "in 1957".to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_clean_question_text_strips_artefacts() {
        assert_eq!(clean_question_text("Question: What year was it?"), "What year was it?");
        assert_eq!(clean_question_text("Q1: \"What satellite?\""), "What satellite?");
        assert_eq!(clean_question_text("  ### Q:  Who built it?  "), "Who built it?");
    }

    #[test]
    fn test_nested_form_wraps_right_to_left() {
        let layered = vec!["Q_root".to_string(), "Q_mid".to_string(), "Q_deep".to_string()];
        let nested = nested_form(&layered);
        assert_eq!(nested, "(Q_deep, (Q_mid, Q_root))");
    }

    #[tokio::test]
    async fn test_synthesize_falls_back_when_fused_leaks_non_root_layer_answer() {
        let completion = MockCompletionClient::single("Who designed the craft Korolev built?");
        let synthesizer = CompositeSynthesizer::new(&completion);
        let mut root_node = TreeNode::new_root(query("root", "What satellite launched in 1957?", "Sputnik 1", 0));
        root_node
            .children
            .push(TreeNode::new_child(query("c1", "Who built Sputnik?", "Korolev", 1), Branch::Series, "root"));
        let (composites, flags) = synthesizer.synthesize(&root_node, &root_answer()).await.unwrap();
        assert!(flags.fused);
        assert_eq!(composites.fused, composites.nested);
    }

    #[tokio::test]
    async fn test_synthesize_falls_back_when_fused_leaks_root_answer() {
        let completion = MockCompletionClient::single("The answer is 1957, obviously.");
        let synthesizer = CompositeSynthesizer::new(&completion);
        let mut root_node = TreeNode::new_root(query("root", "What satellite launched in 1957?", "Sputnik 1", 0));
        root_node
            .children
            .push(TreeNode::new_child(query("c1", "Who built Sputnik?", "Korolev", 1), Branch::Series, "root"));
        let (composites, flags) = synthesizer.synthesize(&root_node, &root_answer()).await.unwrap();
        assert!(flags.fused);
        assert_eq!(composites.fused, composites.nested);
    }

    fn tree_with_words(words: &[String]) -> TreeNode {
        let mut root_node = TreeNode::new_root(query(
            "root",
            &format!("What connects {}?", words.join(" ")),
            "Sputnik 1",
            0,
        ));
        root_node
            .children
            .push(TreeNode::new_child(query("c1", "Who designed the orbiting craft?", "Korolev", 1), Branch::Series, "root"));
        root_node
    }

    proptest! {
        /// P8 (determinism of nested form): the nested form is built purely
        /// from frozen tree structure, never from the completion response,
        /// so it is byte-identical across independent synthesis runs.
        #[test]
        fn nested_form_is_deterministic_across_runs(words in prop::collection::vec("[a-zA-Z]{3,10}", 3..6)) {
            let root_node = tree_with_words(&words);
            let rt = tokio::runtime::Runtime::new().unwrap();
            let run = || {
                let completion = MockCompletionClient::single("a harmless restatement of the chained questions");
                let synthesizer = CompositeSynthesizer::new(&completion);
                rt.block_on(synthesizer.synthesize(&root_node, &root_answer())).unwrap()
            };

            let (first, _) = run();
            let (second, _) = run();
            prop_assert_eq!(first.nested, second.nested);
        }

        /// P7 (composite leak-freeness): when the completion response never
        /// mentions the root answer, every accepted composite form stays
        /// clean of it too (fallback-to-nested also satisfies this, since
        /// the nested form is built only from non-root question text).
        #[test]
        fn composites_never_leak_root_answer_when_completion_is_clean(words in prop::collection::vec("[a-zA-Z]{3,10}", 3..6)) {
            let root_node = tree_with_words(&words);
            let completion = MockCompletionClient::single("a harmless restatement of the chained questions");
            let synthesizer = CompositeSynthesizer::new(&completion);
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (composites, _) = rt.block_on(synthesizer.synthesize(&root_node, &root_answer())).unwrap();

            let answer_lower = root_answer().text.to_lowercase();
            prop_assert!(!composites.nested.to_lowercase().contains(&answer_lower));
            prop_assert!(!composites.fused.to_lowercase().contains(&answer_lower));
            prop_assert!(!composites.ambiguated.to_lowercase().contains(&answer_lower));
        }
    }
}
