use thiserror::Error;

/// Error taxonomy for the tree builder pipeline.
///
/// Variants are split along clear lines: transient external failures,
/// candidate-level quality failures (recoverable — the orchestrator moves to
/// the next candidate), and fatal configuration failures (abort the run).
#[derive(Error, Debug)]
pub enum BuilderError {
    /// No objective anchor span survived filtering for a document.
    #[error("no anchor found in document '{doc_id}'")]
    NoAnchorFound { doc_id: String },

    /// The minimized keyword set collapsed below `keyword_min`.
    #[error("root question is not minimal: {essential_count} essential keyword(s), need at least {required}")]
    RootNotMinimal {
        essential_count: usize,
        required: usize,
    },

    /// The reference probe could not uniquely re-derive the expected answer.
    #[error("answer '{answer}' is not uniquely determined by: {question}")]
    AnswerNotUnique { question: String, answer: String },

    /// `CorrelationGuard` rejected a candidate.
    #[error("candidate too correlated with an ancestor: {reason}")]
    CorrelationTooHigh { reason: String },

    /// `CorrelationGuard` rejected a candidate for exposing the root answer.
    #[error("candidate exposes root answer: {reason}")]
    ExposesRootAnswer { reason: String },

    /// `CircularGuard` rejected a candidate.
    #[error("cycle detected ({pattern}): {reason}")]
    CycleDetected { pattern: String, reason: String },

    /// A tree-level structural failure (e.g. zero valid extensions).
    #[error("tree structure invalid: {0}")]
    TreeStructureInvalid(String),

    /// An external call exhausted its retry budget.
    #[error("external service unavailable after {attempts} attempt(s): {reason}")]
    ExternalUnavailable { attempts: u32, reason: String },

    /// Missing `OPENAI_API_KEY`/`ANTHROPIC_API_KEY` at startup.
    #[error("missing LLM credentials: set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    MissingCredentials,

    /// Configuration could not be parsed or read.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Network/HTTP transport failure.
    #[error("network request failed: {0}")]
    NetworkError(String),

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    /// Failed to serialize or deserialize a response.
    #[error("failed to parse response: {0}")]
    ParseError(String),

    /// Result sink I/O failure.
    #[error("result sink error: {0}")]
    SinkError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for tree-builder operations.
pub type BuilderResult<T> = Result<T, BuilderError>;

impl From<std::io::Error> for BuilderError {
    fn from(err: std::io::Error) -> Self {
        BuilderError::SinkError(err.to_string())
    }
}

impl From<serde_json::Error> for BuilderError {
    fn from(err: serde_json::Error) -> Self {
        BuilderError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for BuilderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BuilderError::ExternalUnavailable {
                attempts: 1,
                reason: "request timed out".to_string(),
            }
        } else if err.is_connect() {
            BuilderError::NetworkError(format!("connection failed: {err}"))
        } else if let Some(status) = err.status() {
            BuilderError::HttpError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            BuilderError::NetworkError(err.to_string())
        }
    }
}

/// A recoverable candidate-level rejection, distinct from a fatal [`BuilderError`].
///
/// Guards return this instead of raising, preferring "result variants, not
/// exceptions" redesign note. The orchestrator logs the reason to the
/// trajectory and tries the next candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    RootNotMinimal,
    AnswerNotUnique,
    CorrelationTooHigh,
    ExposesRootAnswer,
    CycleDetected,
    SearchUnavailable,
    CompletionEmpty,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RejectionReason::RootNotMinimal => "RootNotMinimal",
            RejectionReason::AnswerNotUnique => "AnswerNotUnique",
            RejectionReason::CorrelationTooHigh => "CorrelationTooHigh",
            RejectionReason::ExposesRootAnswer => "ExposesRootAnswer",
            RejectionReason::CycleDetected => "CycleDetected",
            RejectionReason::SearchUnavailable => "SearchUnavailable",
            RejectionReason::CompletionEmpty => "CompletionEmpty",
        };
        f.write_str(label)
    }
}

/// Outcome of attempting to build a candidate `Query`: either a validated
/// query, or a closed-enum rejection reason with a human-readable note.
#[derive(Debug, Clone)]
pub enum Candidate<T> {
    Accepted(T),
    Rejected {
        reason: RejectionReason,
        detail: String,
    },
}

impl<T> Candidate<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Candidate::Accepted(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Candidate::Accepted(value) => Some(value),
            Candidate::Rejected { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BuilderError::RootNotMinimal {
            essential_count: 1,
            required: 2,
        };
        assert_eq!(
            err.to_string(),
            "root question is not minimal: 1 essential keyword(s), need at least 2"
        );
    }

    #[test]
    fn test_http_error_display() {
        let err = BuilderError::HttpError {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 503: Service Unavailable");
    }

    #[test]
    fn test_rejection_reason_display() {
        assert_eq!(RejectionReason::CycleDetected.to_string(), "CycleDetected");
    }

    #[test]
    fn test_candidate_into_option() {
        let accepted: Candidate<u32> = Candidate::Accepted(42);
        assert_eq!(accepted.into_option(), Some(42));

        let rejected: Candidate<u32> = Candidate::Rejected {
            reason: RejectionReason::AnswerNotUnique,
            detail: "ambiguous".to_string(),
        };
        assert_eq!(rejected.into_option(), None);
    }
}
