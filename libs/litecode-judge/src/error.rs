use litecode_common::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// The only failure the judge client reports.
/// Connection errors, timeouts, non-2xx responses and malformed bodies
/// all collapse into this one variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JudgeError {
    #[error("judge unavailable: {0}")]
    Unavailable(String),
}

impl JudgeError {
    pub(crate) fn unavailable(reason: impl ToString) -> Self {
        JudgeError::Unavailable(reason.to_string())
    }
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("language `{0}` is not supported for this problem")]
    UnsupportedLanguage(String),

    #[error("code template for `{0}` has no user code marker")]
    MissingTemplate(String),

    #[error("problem has no visible test cases")]
    NoVisibleTestCases,

    #[error("problem has no hidden test cases")]
    NoHiddenTestCases,

    #[error("problem `{0}` not found")]
    ProblemNotFound(String),

    #[error("submission {0} not found")]
    SubmissionNotFound(Uuid),

    #[error(transparent)]
    JudgeUnavailable(#[from] JudgeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EvaluationError {
    /// Errors caused by the caller's input rather than infrastructure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EvaluationError::UnsupportedLanguage(_)
                | EvaluationError::MissingTemplate(_)
                | EvaluationError::NoVisibleTestCases
                | EvaluationError::NoHiddenTestCases
        )
    }
}
