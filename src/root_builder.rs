//! Root question construction: turns a single extracted `ShortAnswer`
//! into a minimal, uniquely-determining root `Query`.

use uuid::Uuid;

use crate::capabilities::completion::CompletionRequest;
use crate::capabilities::{CompletionClient, WebSearch};
use crate::config::TreeConfig;
use crate::error::{BuilderError, BuilderResult};
use crate::minimizer::{KeywordMinimizer, uniqueness_score};
use crate::prompts::{Strictness, root};
use crate::synthesizer::clean_question_text;
use crate::types::{GenerationMethod, Keyword, Query, ShortAnswer};

/// Builds the layer-0 root `Query` for one `ShortAnswer`.
pub struct RootQueryBuilder<'a> {
    completion: &'a dyn CompletionClient,
    search: &'a dyn WebSearch,
    tree_config: &'a TreeConfig,
}

impl<'a> RootQueryBuilder<'a> {
    pub fn new(completion: &'a dyn CompletionClient, search: &'a dyn WebSearch, tree_config: &'a TreeConfig) -> Self {
        Self {
            completion,
            search,
            tree_config,
        }
    }

    pub async fn build_root(&self, short_answer: &ShortAnswer, doc_context: &str) -> BuilderResult<Query> {
        let snippets = self.search.search(&short_answer.text, 5).await;
        let background = if snippets.is_empty() {
            doc_context.to_string()
        } else {
            snippets.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ")
        };

        let mut last_err: Option<BuilderError> = None;
        for attempt in 0..self.tree_config.regeneration_attempts {
            let strictness = match attempt {
                0 => Strictness::Initial,
                n if n + 1 == self.tree_config.regeneration_attempts => Strictness::Final,
                _ => Strictness::Retry,
            };

            let system = root::system(strictness);
            let user = root::user(&short_answer.text, &background);

            let response = self
                .completion
                .complete(CompletionRequest {
                    system: &system,
                    user: &user,
                    temperature: 0.6,
                    max_tokens: 128,
                })
                .await?;

            let question_text = clean_question_text(&response.text);
            if question_text.is_empty() || !question_text.trim_end().ends_with('?') {
                last_err = Some(BuilderError::AnswerNotUnique {
                    question: question_text,
                    answer: short_answer.text.clone(),
                });
                continue;
            }

            let candidates = extract_candidate_keywords(&question_text, &short_answer.text);
            let minimizer = KeywordMinimizer::new(self.completion, self.tree_config);
            let keywords = match minimizer.minimize(&question_text, &short_answer.text, candidates).await {
                Ok(keywords) => keywords,
                Err(err) => {
                    last_err = Some(err);
                    continue;
                }
            };

            if !self.reference_probe_confirms(&question_text, &short_answer.text).await? {
                last_err = Some(BuilderError::AnswerNotUnique {
                    question: question_text,
                    answer: short_answer.text.clone(),
                });
                continue;
            }

            return Ok(Query {
                id: Uuid::new_v4().to_string(),
                text: question_text,
                answer: short_answer.text.clone(),
                keywords,
                layer: 0,
                generation_method: GenerationMethod::Root,
                confidence: short_answer.confidence,
                complexity: 0.2,
            });
        }

        Err(last_err.unwrap_or(BuilderError::RootNotMinimal {
            essential_count: 0,
            required: self.tree_config.keyword_min,
        }))
    }

    async fn reference_probe_confirms(&self, question: &str, expected_answer: &str) -> BuilderResult<bool> {
        let response = self
            .completion
            .complete(CompletionRequest {
                system: "Answer the question as briefly as possible.",
                user: question,
                temperature: 0.0,
                max_tokens: 16,
            })
            .await?;
        Ok(response.text.to_lowercase().contains(&expected_answer.to_lowercase()))
    }
}

fn extract_candidate_keywords(question_text: &str, answer: &str) -> Vec<Keyword> {
    question_text
        .split_whitespace()
        .enumerate()
        .filter_map(|(position, token)| {
            let cleaned: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
            if cleaned.len() < 3 {
                return None;
            }
            let starts_upper = cleaned.chars().next().is_some_and(char::is_uppercase);
            let has_digit = cleaned.chars().any(|c| c.is_ascii_digit());
            if !starts_upper && !has_digit {
                return None;
            }
            let uniqueness = uniqueness_score(&cleaned, answer, question_text);
            Some(Keyword {
                text: cleaned,
                position_in_question: position,
                importance: 0.6,
                uniqueness,
                essential: true,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::completion::mock::MockCompletionClient;
    use crate::capabilities::search::mock::MockWebSearch;
    use crate::types::AnswerKind;

    fn config() -> TreeConfig {
        TreeConfig {
            top_k_answers_per_doc: 5,
            breadth_cap_parallel: 3,
            depth_cap: 2,
            semantic_similarity_reject_threshold: 0.30,
            keyword_min: 1,
            worker_count: 1,
            queue_capacity: 32,
            regeneration_attempts: 3,
            series_depth_cap: 2,
        }
    }

    fn short_answer() -> ShortAnswer {
        ShortAnswer {
            text: "1957".to_string(),
            kind: AnswerKind::Date,
            char_offset: 0,
            context_window: "The satellite Sputnik 1 was launched in 1957.".to_string(),
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn test_build_root_fails_when_question_lacks_question_mark() {
        let completion = MockCompletionClient::single("This is not a question.");
        let search = MockWebSearch::empty();
        let tree_config = config();
        let builder = RootQueryBuilder::new(&completion, &search, &tree_config);
        let result = builder.build_root(&short_answer(), "background text").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_root_succeeds_with_well_formed_question() {
        let completion = MockCompletionClient::new(vec![
            "In what year was the satellite Sputnik 1 launched?",
            "NO",
            "1957",
        ]);
        let search = MockWebSearch::empty();
        let tree_config = config();
        let builder = RootQueryBuilder::new(&completion, &search, &tree_config);
        let result = builder.build_root(&short_answer(), "background text").await;
        assert!(result.is_ok());
        let query = result.unwrap();
        assert_eq!(query.answer, "1957");
        assert_eq!(query.layer, 0);
    }
}
