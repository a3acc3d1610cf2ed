//! Keyword minimization: reduces a question's supporting keywords to
//! the smallest set that still uniquely determines its answer, verified
//! against the same LLM used for generation rather than a static heuristic.

use crate::capabilities::CompletionClient;
use crate::capabilities::completion::CompletionRequest;
use crate::config::TreeConfig;
use crate::error::{BuilderError, BuilderResult};
use crate::types::Keyword;

const MASK_TOKEN: &str = "[MASKED]";

static GENERIC_WORDS: &[&str] = &[
    "the", "a", "an", "this", "that", "which", "what", "who", "where", "when", "how", "is", "was",
    "were", "did", "does", "in", "on", "at", "of", "to", "for",
];

/// Reduces an initial keyword candidate set to the minimal essential subset.
pub struct KeywordMinimizer<'a> {
    completion: &'a dyn CompletionClient,
    keyword_min: usize,
}

impl<'a> KeywordMinimizer<'a> {
    pub fn new(completion: &'a dyn CompletionClient, config: &TreeConfig) -> Self {
        Self {
            completion,
            keyword_min: config.keyword_min,
        }
    }

    /// Run the masking test over `candidates`, returning the final keyword
    /// set with `essential` flags set per the masking protocol below.
    pub async fn minimize(
        &self,
        question_text: &str,
        answer: &str,
        mut candidates: Vec<Keyword>,
    ) -> BuilderResult<Vec<Keyword>> {
        candidates.sort_by(|a, b| a.uniqueness.partial_cmp(&b.uniqueness).unwrap_or(std::cmp::Ordering::Equal));

        let mut essential_flags = vec![true; candidates.len()];
        for (i, candidate) in candidates.iter().enumerate() {
            let masked_text = mask_occurrences(question_text, &candidate.text);
            let still_unique = self.probe_uniqueness(&masked_text, answer).await?;
            essential_flags[i] = !still_unique;
        }

        let mut finalized: Vec<Keyword> = candidates
            .into_iter()
            .zip(essential_flags)
            .map(|(mut k, essential)| {
                k.essential = essential;
                k
            })
            .collect();
        finalized.sort_by_key(|k| k.position_in_question);

        let essential_count = finalized.iter().filter(|k| k.essential).count();
        if essential_count < self.keyword_min {
            return Err(BuilderError::RootNotMinimal {
                essential_count,
                required: self.keyword_min,
            });
        }

        Ok(finalized)
    }

    async fn probe_uniqueness(&self, masked_text: &str, answer: &str) -> BuilderResult<bool> {
        let system = "You determine whether a question with a masked term still has exactly \
                      one correct answer. Reply with only YES or NO.";
        let user = format!(
            "Masked question: {masked_text}\nProposed answer: {answer}\n\n\
             Does the masked question still uniquely determine this answer?"
        );
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
}

fn mask_occurrences(text: &str, term: &str) -> String {
    if term.is_empty() {
        return text.to_string();
    }
    text.replace(term, MASK_TOKEN)
}

/// Computes the uniqueness score used for tie-break ordering, blending
/// length, specificity, answer association, and a generic-word penalty.
pub fn uniqueness_score(keyword_text: &str, answer: &str, full_question: &str) -> f64 {
    let _ = full_question;
    let length_factor = (keyword_text.len() as f64 / 15.0).min(1.0);
    let specificity_factor = specificity_factor(keyword_text);
    let association_factor = association_factor(keyword_text, answer);
    let generic_penalty = if is_generic(keyword_text) { 0.0 } else { 1.0 };

    0.2 * length_factor + 0.4 * specificity_factor + 0.3 * association_factor + 0.1 * generic_penalty
}

fn specificity_factor(term: &str) -> f64 {
    let starts_upper = term.chars().next().is_some_and(char::is_uppercase);
    let has_digit = term.chars().any(|c| c.is_ascii_digit());
    if starts_upper || has_digit {
        0.9
    } else {
        0.3
    }
}

fn association_factor(term: &str, answer: &str) -> f64 {
    if answer.contains(term) {
        // An essential keyword should help distinguish the answer, not
        // literally contain it; treat overlap as a weak signal, not strong.
        0.2
    } else {
        0.6
    }
}

fn is_generic(term: &str) -> bool {
    GENERIC_WORDS.contains(&term.to_lowercase().as_str())
}
