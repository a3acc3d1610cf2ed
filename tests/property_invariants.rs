//! Property tests for the structural invariants (P5, P6) and the similarity
//! primitives they're built on, exercised against the public guard API.
//! These need no LLM mock, so they run as ordinary integration tests rather
//! than in-crate unit tests.

use proptest::prelude::*;
use research_tree_builder::guards::circular::CircularGuard;
use research_tree_builder::guards::{cosine_similarity, normalized_edit_distance};
use research_tree_builder::minimizer::uniqueness_score;
use research_tree_builder::types::{Branch, GenerationMethod, Keyword, Query, TreeNode};

fn question(id: &str, text: &str, answer: &str, layer: u8) -> Query {
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

fn word() -> impl Strategy<Value = String> {
    "[a-zA-Z]{3,10}"
}

fn distinct_sentence(seed: &[String]) -> String {
    format!("What connects {}?", seed.join(" "))
}

proptest! {
    /// P5 (acyclicity): two structurally distinct question texts built from
    /// disjoint word sets never trigger the tree-sweep duplicate check.
    #[test]
    fn sweep_accepts_structurally_distinct_nodes(
        words_a in prop::collection::vec(word(), 3..6),
        words_b in prop::collection::vec(word(), 3..6),
    ) {
        let text_a = distinct_sentence(&words_a);
        let text_b = distinct_sentence(&words_b);
        // Random word sets can coincidentally produce near-anagram text; only
        // assert on pairs the edit-distance check itself would call distinct.
        prop_assume!(normalized_edit_distance(&text_a, &text_b) >= 0.1);

        let root_query = question("root", &text_a, "answer-a", 0);
        let mut root = TreeNode::new_root(root_query);
        let child = question("c1", &text_b, "answer-b", 1);
        root.children.push(TreeNode::new_child(child, Branch::Series, "root"));

        prop_assert!(CircularGuard::new().sweep(&root).is_ok());
    }

    /// P5 (acyclicity): a node whose text is byte-identical to its parent's
    /// is always caught by the sweep, regardless of the words involved.
    #[test]
    fn sweep_rejects_exact_duplicate_nodes(words in prop::collection::vec(word(), 3..6)) {
        let text = distinct_sentence(&words);
        let root_query = question("root", &text, "answer-a", 0);
        let mut root = TreeNode::new_root(root_query);
        let child = question("c1", &text, "answer-a", 1);
        root.children.push(TreeNode::new_child(child, Branch::Series, "root"));

        prop_assert!(CircularGuard::new().sweep(&root).is_err());
    }

    /// P5 (acyclicity): a grandchild that reuses one of the root's essential
    /// keywords is caught by the sweep's keyword-cycle pass, not just the
    /// direct-repetition pass, regardless of which keyword text is reused.
    #[test]
    fn sweep_rejects_keyword_reused_two_layers_down(
        keyword in word(),
        words_a in prop::collection::vec(word(), 3..6),
        words_b in prop::collection::vec(word(), 3..6),
    ) {
        let mut root_query = question("root", &distinct_sentence(&words_a), "answer-a", 0);
        root_query.keywords[0].text = keyword.clone();
        let mut root = TreeNode::new_root(root_query);

        let child_query = question("c1", &distinct_sentence(&words_b), "answer-b", 1);
        let mut child = TreeNode::new_child(child_query, Branch::Series, "root");

        let mut grandchild_query = question("c2", &format!("What is {keyword} here?"), "answer-c", 2);
        grandchild_query.keywords[0].text = keyword;
        child.children.push(TreeNode::new_child(grandchild_query, Branch::Series, "c1"));
        root.children.push(child);

        prop_assert!(CircularGuard::new().sweep(&root).is_err());
    }

    /// P6 (depth bound): `max_layer` always reports the true maximum layer
    /// value present among a node and its descendants, for any chain depth
    /// the guard's acyclicity check would itself accept.
    #[test]
    fn max_layer_matches_deepest_child_layer(depth in 0u8..=2) {
        let mut node = TreeNode::new_root(question("n0", "What is the root?", "a0", 0));
        let mut cursor = &mut node;
        for layer in 1..=depth {
            let child = TreeNode::new_child(
                question(&format!("n{layer}"), &format!("What is layer {layer}?"), &format!("a{layer}"), layer),
                Branch::Series,
                format!("n{}", layer - 1),
            );
            cursor.children.push(child);
            cursor = cursor.children.last_mut().unwrap();
        }
        prop_assert_eq!(node.max_layer(), depth);
    }

    /// Edit distance is always normalized into [0, 1] regardless of input.
    #[test]
    fn edit_distance_is_normalized(a in ".*", b in ".*") {
        let d = normalized_edit_distance(&a, &b);
        prop_assert!((0.0..=1.0).contains(&d));
    }

    /// Cosine similarity is always normalized into [0, 1], and a non-empty
    /// alphanumeric text is always maximally similar to itself.
    #[test]
    fn cosine_similarity_is_normalized_and_reflexive(text in "[a-zA-Z ]{1,40}") {
        let self_sim = cosine_similarity(&text, &text);
        prop_assert!((0.0..=1.0).contains(&self_sim));
        if text.split_whitespace().next().is_some() {
            prop_assert!((self_sim - 1.0).abs() < 1e-9);
        }
    }

    /// P1 (keyword minimality) relies on `uniqueness_score` as its masking
    /// order heuristic; whatever the inputs, the blended score stays in the
    /// weighted range its four factors define.
    #[test]
    fn uniqueness_score_is_bounded(
        keyword in "[a-zA-Z0-9]{1,15}",
        answer in "[a-zA-Z0-9 ]{1,30}",
        question in "[a-zA-Z0-9 ]{1,60}",
    ) {
        let score = uniqueness_score(&keyword, &answer, &question);
        prop_assert!((0.0..=1.0).contains(&score));
    }
}
