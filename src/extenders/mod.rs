//! Series and parallel tree extension: both grow a parent `Query`
//! into children whose answer is one of the parent's essential keywords,
//! sharing the same generate → guard → minimize → guard pipeline and
//! differing only in branching shape.

pub mod parallel;
pub mod series;

pub use parallel::ParallelExtender;
pub use series::SeriesExtender;

use uuid::Uuid;

use crate::capabilities::completion::CompletionRequest;
use crate::capabilities::{CompletionClient, WebSearch};
use crate::config::TreeConfig;
use crate::error::{BuilderError, BuilderResult};
use crate::guards::{CircularGuard, CorrelationGuard};
use crate::minimizer::{KeywordMinimizer, uniqueness_score};
use crate::prompts::{Strictness, extend};
use crate::synthesizer::clean_question_text;
use crate::types::{Branch, GenerationMethod, Keyword, Query, ShortAnswer};

/// Shared collaborators threaded through both extenders.
pub struct ExtensionContext<'a> {
    pub completion: &'a dyn CompletionClient,
    pub search: &'a dyn WebSearch,
    pub tree_config: &'a TreeConfig,
    pub root_answer: &'a ShortAnswer,
}

/// Attempts to build one child `Query` whose answer is `target_keyword`,
/// running the full generate/guard/minimize protocol with up to
/// `tree_config.regeneration_attempts` retries.
pub(crate) async fn build_extension(
    ctx: &ExtensionContext<'_>,
    branch: Branch,
    parent: &Query,
    target_keyword: &str,
    ancestors: &[&Query],
    path: &[&Query],
) -> BuilderResult<Query> {
    let snippets = ctx.search.search(target_keyword, ctx.tree_config.breadth_cap_parallel.max(5)).await;
    let context_hint = snippets
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let mut last_err: Option<BuilderError> = None;
    for attempt in 0..ctx.tree_config.regeneration_attempts {
        let strictness = match attempt {
            0 => Strictness::Initial,
            n if n + 1 == ctx.tree_config.regeneration_attempts => Strictness::Final,
            _ => Strictness::Retry,
        };

        let system = extend::system(branch, strictness);
        let user = format!("{}\nBackground: {context_hint}", extend::user(&parent.text, target_keyword));

        let response = ctx
            .completion
            .complete(CompletionRequest {
                system: &system,
                user: &user,
                temperature: 0.7,
                max_tokens: 128,
            })
            .await?;

        let question_text = clean_question_text(&response.text);
        if question_text.is_empty() {
            last_err = Some(BuilderError::AnswerNotUnique {
                question: String::new(),
                answer: target_keyword.to_string(),
            });
            continue;
        }

        let candidate_keywords = extract_candidate_keywords(&question_text, target_keyword);
        let mut candidate = Query {
            id: Uuid::new_v4().to_string(),
            text: question_text,
            answer: target_keyword.to_string(),
            keywords: candidate_keywords,
            layer: parent.layer + 1,
            generation_method: match branch {
                Branch::Series => GenerationMethod::Series,
                Branch::Parallel => GenerationMethod::Parallel,
                Branch::Root => unreachable!("extenders never produce root nodes"),
            },
            confidence: response_confidence(&response.text),
            complexity: 0.5,
        };

        let correlation_guard = CorrelationGuard::new(ctx.completion, ctx.tree_config.semantic_similarity_reject_threshold);
        if let Err(err) = correlation_guard
            .check_non_correlation(&candidate, target_keyword, ancestors)
            .await
        {
            last_err = Some(err);
            continue;
        }
        if let Err(err) = correlation_guard.check_no_exposure(&candidate, ctx.root_answer).await {
            last_err = Some(err);
            continue;
        }

        let minimizer = KeywordMinimizer::new(ctx.completion, ctx.tree_config);
        match minimizer
            .minimize(&candidate.text, &candidate.answer, std::mem::take(&mut candidate.keywords))
            .await
        {
            Ok(keywords) => candidate.keywords = keywords,
            Err(err) => {
                last_err = Some(err);
                continue;
            }
        }

        let circular_guard = CircularGuard::new();
        if let Err(err) = circular_guard.check(&candidate, parent, path) {
            last_err = Some(err);
            continue;
        }

        return Ok(candidate);
    }

    Err(last_err.unwrap_or(BuilderError::TreeStructureInvalid(format!(
        "exhausted regeneration attempts for keyword '{target_keyword}'"
    ))))
}

fn extract_candidate_keywords(question_text: &str, target_keyword: &str) -> Vec<Keyword> {
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
            let uniqueness = uniqueness_score(&cleaned, target_keyword, question_text);
            Some(Keyword {
                text: cleaned,
                position_in_question: position,
                importance: 0.5,
                uniqueness,
                essential: true,
            })
        })
        .collect()
}

fn response_confidence(text: &str) -> f64 {
    if text.trim_end().ends_with('?') { 0.85 } else { 0.6 }
}
