//! Non-correlation and no-root-answer-exposure gates.

use std::collections::HashSet;

use crate::capabilities::CompletionClient;
use crate::capabilities::completion::CompletionRequest;
use crate::error::{BuilderError, BuilderResult};
use crate::types::{Query, ShortAnswer};

use super::cosine_similarity;

/// Cosine similarity above which an essential keyword counts as belonging to
/// the same semantic cluster as the root answer.
const CLUE_CLUSTER_THRESHOLD: f64 = 0.5;

/// Keywords clustering with the root answer at or above this count make the
/// candidate's essential keywords read as a paraphrase of the answer itself.
const CLUE_CLUSTER_REJECT_COUNT: usize = 2;

/// Risk level returned by the root-answer-exposure LLM probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Safe,
}

impl RiskLevel {
    fn parse(text: &str) -> Self {
        let upper = text.to_uppercase();
        if upper.contains("HIGH") {
            RiskLevel::High
        } else if upper.contains("MEDIUM") {
            RiskLevel::Medium
        } else if upper.contains("LOW") {
            RiskLevel::Low
        } else {
            RiskLevel::Safe
        }
    }

    fn is_acceptable(self) -> bool {
        matches!(self, RiskLevel::Low | RiskLevel::Safe)
    }
}

/// Validates a candidate question against non-correlation and answer-exposure
/// requirements before it can be added to the tree.
pub struct CorrelationGuard<'a> {
    completion: &'a dyn CompletionClient,
    similarity_threshold: f64,
}

impl<'a> CorrelationGuard<'a> {
    pub fn new(completion: &'a dyn CompletionClient, similarity_threshold: f64) -> Self {
        Self {
            completion,
            similarity_threshold,
        }
    }

    /// Non-correlation gate: the candidate must be sufficiently distinct from
    /// every ancestor on a different layer, except for the specific keyword
    /// it was extended from.
    pub async fn check_non_correlation(
        &self,
        candidate: &Query,
        target_keyword: &str,
        ancestors: &[&Query],
    ) -> BuilderResult<()> {
        let candidate_keywords: HashSet<&str> =
            candidate.essential_keywords().map(|k| k.text.as_str()).collect();

        for ancestor in ancestors {
            let ancestor_keywords: HashSet<&str> =
                ancestor.essential_keywords().map(|k| k.text.as_str()).collect();
            let overlap: Vec<&&str> = candidate_keywords
                .intersection(&ancestor_keywords)
                .filter(|kw| **kw != target_keyword)
                .collect();
            if !overlap.is_empty() {
                return Err(BuilderError::CorrelationTooHigh {
                    reason: format!("keyword overlap with ancestor '{}': {overlap:?}", ancestor.id),
                });
            }

            let similarity = cosine_similarity(&candidate.text, &ancestor.text);
            if similarity > self.similarity_threshold {
                return Err(BuilderError::CorrelationTooHigh {
                    reason: format!(
                        "semantic similarity {similarity:.2} with ancestor '{}' exceeds threshold {:.2}",
                        ancestor.id, self.similarity_threshold
                    ),
                });
            }

            if self.same_topical_domain(&candidate.text, &ancestor.text).await? {
                return Err(BuilderError::CorrelationTooHigh {
                    reason: format!("same topical domain as ancestor '{}'", ancestor.id),
                });
            }

            if self.logically_entails(&candidate.answer, &ancestor.answer).await? {
                return Err(BuilderError::CorrelationTooHigh {
                    reason: format!("answer entails or is entailed by ancestor '{}'", ancestor.id),
                });
            }
        }

        Ok(())
    }

    /// No-root-answer-exposure gate for a non-root candidate.
    pub async fn check_no_exposure(&self, candidate: &Query, root_answer: &ShortAnswer) -> BuilderResult<()> {
        if contains_token_bounded(&candidate.text, &root_answer.text) {
            return Err(BuilderError::ExposesRootAnswer {
                reason: "candidate text directly mentions the root answer".to_string(),
            });
        }

        let risk = self.exposure_risk(&candidate.text, &root_answer.text).await?;
        if !risk.is_acceptable() {
            return Err(BuilderError::ExposesRootAnswer {
                reason: format!("exposure risk probe returned {risk:?}"),
            });
        }

        if let Some(clustered) = clue_density_violation(candidate, root_answer) {
            return Err(BuilderError::ExposesRootAnswer {
                reason: format!(
                    "{} essential keywords cluster with the root answer: {clustered:?}",
                    clustered.len()
                ),
            });
        }

        if self.reference_probe_answers_directly(&candidate.text, &root_answer.text).await? {
            return Err(BuilderError::ExposesRootAnswer {
                reason: "reference probe answered the root answer in one step".to_string(),
            });
        }

        Ok(())
    }

    async fn same_topical_domain(&self, a: &str, b: &str) -> BuilderResult<bool> {
        let system = "You judge whether two questions belong to the same narrow knowledge \
                      domain (e.g. the same historical episode or the same specific entity). \
                      Reply with only YES or NO.";
        let user = format!("Question A: {a}\nQuestion B: {b}");
        let response = self
            .completion
            .complete(CompletionRequest {
                system,
                user: &user,
                temperature: 0.0,
                max_tokens: 8,
            })
            .await?;
        Ok(response.text.trim().to_uppercase().starts_with("YES"))
    }

    async fn logically_entails(&self, candidate_answer: &str, ancestor_answer: &str) -> BuilderResult<bool> {
        let system = "You judge whether one factual statement trivially implies the other \
                      (temporal or causal entailment). Reply with only YES or NO.";
        let user = format!("Statement A: {candidate_answer}\nStatement B: {ancestor_answer}");
        let response = self
            .completion
            .complete(CompletionRequest {
                system,
                user: &user,
                temperature: 0.0,
                max_tokens: 8,
            })
            .await?;
        Ok(response.text.trim().to_uppercase().starts_with("YES"))
    }

    async fn exposure_risk(&self, question: &str, root_answer: &str) -> BuilderResult<RiskLevel> {
        let system = "You rate how obviously a question reveals a hidden answer if someone \
                      reads only the question. Reply with exactly one word: HIGH, MEDIUM, LOW, or SAFE.";
        let user = format!("Question: {question}\nHidden answer: {root_answer}\n\nDoes reading this question make the answer immediately obvious?");
        let response = self
            .completion
            .complete(CompletionRequest {
                system,
                user: &user,
                temperature: 0.0,
                max_tokens: 8,
            })
            .await?;
        Ok(RiskLevel::parse(&response.text))
    }

    async fn reference_probe_answers_directly(&self, question: &str, root_answer: &str) -> BuilderResult<bool> {
        let system = "Answer the question in as few words as possible.";
        let response = self
            .completion
            .complete(CompletionRequest {
                system,
                user: question,
                temperature: 0.0,
                max_tokens: 16,
            })
            .await?;
        Ok(response
            .text
            .to_lowercase()
            .contains(&root_answer.to_lowercase()))
    }
}

/// Contextual clue density: a candidate can avoid mentioning the root answer
/// outright and still give it away if its essential keywords are all drawn
/// from the same semantic neighborhood as the answer. Returns the offending
/// keyword texts when two or more cluster with `root_answer.text`.
fn clue_density_violation(candidate: &Query, root_answer: &ShortAnswer) -> Option<Vec<String>> {
    let clustered: Vec<String> = candidate
        .essential_keywords()
        .filter(|kw| cosine_similarity(&kw.text, &root_answer.text) >= CLUE_CLUSTER_THRESHOLD)
        .map(|kw| kw.text.clone())
        .collect();

    if clustered.len() >= CLUE_CLUSTER_REJECT_COUNT {
        Some(clustered)
    } else {
        None
    }
}

fn contains_token_bounded(haystack: &str, needle: &str) -> bool {
    if needle.trim().is_empty() {
        return false;
    }
    let haystack_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    haystack_lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == needle_lower)
        || haystack_lower.contains(&needle_lower)
}
