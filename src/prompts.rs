//! Centralized prompt templates: versioned and addressed by
//! purpose rather than inlined at each call site, so a failing attempt can
//! retry with a stricter variant without duplicating the surrounding text).

/// Which attempt of a regeneration loop a prompt should target. Later
/// attempts are stricter and spell out the failure that triggered the retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    Initial,
    Retry,
    Final,
}

pub mod root {
    use super::Strictness;

    pub fn system(strictness: Strictness) -> String {
        let base = r#"You write a single factual question whose answer is an exact short
span given to you. The question must use the fewest possible keywords from
the supporting context while still uniquely determining that answer. Do not
restate the answer. Output only the question, nothing else."#;
        match strictness {
            Strictness::Initial => base.to_string(),
            Strictness::Retry => format!(
                "{base}\n\nYour previous question was rejected for using more keywords than \
                 necessary or for not uniquely determining the answer. Use fewer distinguishing \
                 terms this time, while still making the answer unambiguous."
            ),
            Strictness::Final => format!(
                "{base}\n\nThis is the final attempt. Prefer a slightly less minimal question \
                 over another rejection: the answer must be uniquely determined."
            ),
        }
    }

    pub fn user(answer: &str, context_window: &str) -> String {
        format!(
            "Answer: {answer}\nSupporting context: {context_window}\n\n\
             Write one question whose unique answer is exactly \"{answer}\"."
        )
    }
}

pub mod extend {
    use super::Strictness;
    use crate::types::Branch;

    pub fn system(branch: Branch, strictness: Strictness) -> String {
        let role = match branch {
            Branch::Series => {
                "You extend a question chain by writing a new question whose answer is a \
                 keyword drawn from the PARENT question's text, not from the parent's answer. \
                 The new question must not mention or restate the parent's answer."
            }
            Branch::Parallel => {
                "You write a sibling question about a DIFFERENT keyword from the same parent \
                 question, independent in topic from any other sibling already produced. The \
                 new question must not mention or restate the parent's answer."
            }
            Branch::Root => unreachable!("root nodes are not extended"),
        };
        match strictness {
            Strictness::Initial => role.to_string(),
            Strictness::Retry => format!(
                "{role}\n\nYour previous attempt overlapped too closely with an existing \
                 question or exposed an answer it should not have. Pick a different keyword \
                 or phrase the question in clearly distinct terms."
            ),
            Strictness::Final => format!(
                "{role}\n\nThis is the final attempt before this branch is abandoned."
            ),
        }
    }

    pub fn user(parent_question: &str, target_keyword: &str) -> String {
        format!(
            "Parent question: {parent_question}\nTarget keyword: {target_keyword}\n\n\
             Write one question whose answer is exactly \"{target_keyword}\"."
        )
    }
}

pub mod synthesize {
    pub fn nested_fallback(layered: &[String]) -> String {
        layered.join(" Specifically, ")
    }

    pub fn fused_system() -> &'static str {
        r#"You merge a chain of related questions into one fluent multi-hop question
that preserves every constraint from the originals. Do not answer any of the
questions. Output only the merged question."#
    }

    pub fn fused_user(layered: &[String]) -> String {
        let numbered: Vec<String> = layered
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {q}", i + 1))
            .collect();
        format!("Questions to merge:\n{}", numbered.join("\n"))
    }

    pub fn ambiguated_system() -> &'static str {
        r#"You rewrite a question to replace one or more specific terms with vaguer
paraphrases, while keeping the question answerable by the same unique answer.
Output only the rewritten question."#
    }

    pub fn ambiguated_user(question: &str) -> String {
        format!("Question: {question}\n\nRewrite it with vaguer phrasing.")
    }
}
